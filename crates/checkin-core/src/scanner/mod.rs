// ── Scanner ──
//
// Host surface of the scan loop. Each `ScannerHandle` owns its own
// capture session and machine; nothing is shared process-wide.

mod driver;
pub mod machine;
pub mod timer;

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureControl, CaptureSession, DecodeBackend};
use crate::config::ScannerSettings;
use crate::error::CoreError;
use crate::feedback::FeedbackSignaler;
use crate::history::{ScanHistory, ScanStats};
use crate::scan::{ScanEvent, ScanOrigin};
use crate::token::NormalizedToken;
use crate::validator::{CheckInService, CheckInValidator};

use driver::{Driver, ScanCommand};

pub use machine::{Effect, ScanInput, ScanMachine, ScanNotice, ScanState};
pub use timer::DelayedTransition;

const NOTICE_CHANNEL_SIZE: usize = 64;
const RECENT_SCANS: usize = 10;

/// Handle to a running scanner.
///
/// Cheaply cloneable via `Arc<ScannerInner>`. Dropping the last handle
/// releases the capture device immediately and lets the task wind down;
/// [`shutdown`](Self::shutdown) also waits for it to finish.
#[derive(Clone)]
pub struct ScannerHandle {
    inner: Arc<ScannerInner>,
}

struct ScannerInner {
    commands: mpsc::UnboundedSender<ScanCommand>,
    state: watch::Receiver<ScanState>,
    notices: broadcast::Sender<ScanNotice>,
    history: Arc<Mutex<ScanHistory>>,
    capture: CaptureControl,
    cancel: CancellationToken,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl Drop for ScannerInner {
    fn drop(&mut self) {
        self.capture.release();
        self.cancel.cancel();
    }
}

impl ScannerHandle {
    /// Spawn the scan loop on the current runtime.
    pub fn spawn<B, S>(
        backend: B,
        validator: CheckInValidator<S>,
        feedback: Arc<dyn FeedbackSignaler>,
        settings: &ScannerSettings,
    ) -> Self
    where
        B: DecodeBackend,
        S: CheckInService,
    {
        let (session, signals) = CaptureSession::new(backend, settings.facing);
        let capture = session.control();
        let history = Arc::new(Mutex::new(ScanHistory::new(settings.history_capacity)));
        let (state_tx, state_rx) = watch::channel(ScanState::Idle);
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let driver = Driver {
            machine: ScanMachine::new(),
            session,
            signals,
            validator,
            feedback,
            history: Arc::clone(&history),
            dwell: settings.dwell,
            state_tx,
            notice_tx: notice_tx.clone(),
        };
        let task = tokio::spawn(driver.run(command_rx, cancel.clone()));

        Self {
            inner: Arc::new(ScannerInner {
                commands,
                state: state_rx,
                notices: notice_tx,
                history,
                capture,
                cancel,
                task: AsyncMutex::new(Some(task)),
            }),
        }
    }

    fn send(&self, command: ScanCommand) -> Result<(), CoreError> {
        self.inner
            .commands
            .send(command)
            .map_err(|_| CoreError::ScannerClosed)
    }

    // ── Operator actions ─────────────────────────────────────────────

    /// Begin camera capture. Also the explicit retry after a permission
    /// denial.
    pub fn start_scanning(&self) -> Result<(), CoreError> {
        self.send(ScanCommand::Start)
    }

    /// Stop scanning. The device is released before this returns; an
    /// in-flight validation completes but its result is discarded.
    pub fn stop_scanning(&self) -> Result<(), CoreError> {
        self.inner.capture.release();
        self.send(ScanCommand::Stop)
    }

    /// Submit a hand-typed token. Works without a camera session.
    pub fn submit_manual_token(&self, text: &str) -> Result<(), CoreError> {
        let token = NormalizedToken::normalize(text);
        if token.is_empty() {
            return Err(CoreError::EmptyToken);
        }
        self.send(ScanCommand::Manual(ScanEvent::new(
            token,
            ScanOrigin::Manual,
        )))
    }

    /// Dismiss the displayed result early.
    pub fn acknowledge(&self) -> Result<(), CoreError> {
        self.send(ScanCommand::Acknowledge)
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn state(&self) -> ScanState {
        self.inner.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ScanState> {
        self.inner.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanNotice> {
        self.inner.notices.subscribe()
    }

    pub fn capture_active(&self) -> bool {
        self.inner.capture.is_active()
    }

    pub fn scan_stats(&self) -> ScanStats {
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats(Utc::now(), RECENT_SCANS)
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Release the device, stop the loop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.capture.release();
        self.inner.cancel.cancel();
        if let Some(task) = self.inner.task.lock().await.take() {
            let _ = task.await;
        }
    }
}
