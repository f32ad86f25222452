// ── Capture session ──
//
// Owns the capture device lifecycle: acquire through a pluggable decode
// backend, run the decode loop on its own task, emit decoded payloads to
// the owner, release. Only one device lease exists per session at a time.

mod channel;
mod line;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CameraError;
use crate::scan::{ScanEvent, ScanOrigin};
use crate::token::NormalizedToken;

pub use channel::{ChannelBackend, ChannelFeeder};
pub use line::LineBackend;

/// Which camera to prefer when several are present.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CameraFacing {
    /// Rear camera, pointed at the attendee.
    #[default]
    Environment,
    /// Front camera, pointed at the operator.
    User,
}

/// Unexpected failure inside a running decode loop.
#[derive(Debug, Clone, thiserror::Error)]
#[error("decoder fault: {message}")]
pub struct DecodeFault {
    pub message: String,
}

impl DecodeFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ── Device lease ─────────────────────────────────────────────────────

/// Proof of holding the capture device.
///
/// [`release`](Self::release) runs the backend's release hook exactly once;
/// further calls and the eventual drop are no-ops.
pub struct DeviceLease {
    label: String,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl DeviceLease {
    pub fn new(label: impl Into<String>, on_release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            on_release: Some(Box::new(on_release)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_released(&self) -> bool {
        self.on_release.is_none()
    }

    pub fn release(&mut self) {
        if let Some(hook) = self.on_release.take() {
            debug!(device = %self.label, "releasing capture device");
            hook();
        }
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DeviceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLease")
            .field("label", &self.label)
            .field("released", &self.is_released())
            .finish()
    }
}

// ── Backend seam ─────────────────────────────────────────────────────

/// A running decode loop yielding raw payloads.
pub trait PayloadStream: Send + 'static {
    /// Next decoded payload; `Ok(None)` once the source is exhausted.
    fn next_payload(&mut self) -> impl Future<Output = Result<Option<String>, DecodeFault>> + Send;
}

/// A device plus decode algorithm.
pub trait DecodeBackend: Send + Sync + 'static {
    type Stream: PayloadStream;

    /// Acquire the device and start decoding.
    fn open(
        &self,
        facing: CameraFacing,
    ) -> impl Future<Output = Result<(Self::Stream, DeviceLease), CameraError>> + Send;
}

// ── Signals ──────────────────────────────────────────────────────────

/// What a capture task reports to its owner. Every signal carries the
/// generation of the `start` that produced it.
#[derive(Debug, Clone)]
pub enum CaptureSignal {
    Decoded { generation: u64, event: ScanEvent },
    Ended { generation: u64 },
    Fault { generation: u64, fault: DecodeFault },
}

impl CaptureSignal {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Decoded { generation, .. }
            | Self::Ended { generation }
            | Self::Fault { generation, .. } => *generation,
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────

struct ActiveCapture {
    generation: u64,
    cancel: CancellationToken,
    lease: DeviceLease,
    task: Option<JoinHandle<()>>,
}

impl ActiveCapture {
    fn shut_down(mut self) {
        self.cancel.cancel();
        self.lease.release();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

type ActiveSlot = Arc<Mutex<Option<ActiveCapture>>>;

fn take_active(slot: &ActiveSlot) -> Option<ActiveCapture> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Cloneable handle that can release the device from any thread.
#[derive(Clone)]
pub struct CaptureControl {
    slot: ActiveSlot,
}

impl CaptureControl {
    /// Release the device now. Idempotent.
    pub fn release(&self) {
        if let Some(active) = take_active(&self.slot) {
            debug!(generation = active.generation, "capture released by control");
            active.shut_down();
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Bridges one decode backend to its owner.
///
/// Each successful [`start`](Self::start) opens a new generation that may
/// emit at most one [`CaptureSignal::Decoded`]; later payloads from the same
/// generation are swallowed until the owner starts again.
pub struct CaptureSession<B: DecodeBackend> {
    backend: Arc<B>,
    facing: CameraFacing,
    signals: mpsc::UnboundedSender<CaptureSignal>,
    slot: ActiveSlot,
    generation: u64,
    denied: bool,
}

impl<B: DecodeBackend> CaptureSession<B> {
    pub fn new(
        backend: B,
        facing: CameraFacing,
    ) -> (Self, mpsc::UnboundedReceiver<CaptureSignal>) {
        let (signals, rx) = mpsc::unbounded_channel();
        let session = Self {
            backend: Arc::new(backend),
            facing,
            signals,
            slot: Arc::new(Mutex::new(None)),
            generation: 0,
            denied: false,
        };
        (session, rx)
    }

    pub fn control(&self) -> CaptureControl {
        CaptureControl {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Generation of the most recent successful start.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.control().is_active()
    }

    /// Clear a previous permission denial. Only an operator action calls this.
    pub fn allow_retry(&mut self) {
        self.denied = false;
    }

    /// Acquire the device and start the decode loop.
    ///
    /// Any running capture is stopped first, so a restart never holds two
    /// leases. After a `PermissionDenied` failure every start fails fast
    /// until [`allow_retry`](Self::allow_retry).
    pub async fn start(&mut self) -> Result<(), CameraError> {
        self.stop();

        if self.denied {
            return Err(CameraError::PermissionDenied);
        }

        let (stream, lease) = match self.backend.open(self.facing).await {
            Ok(opened) => opened,
            Err(err) => {
                if err == CameraError::PermissionDenied {
                    self.denied = true;
                }
                warn!(error = %err, "capture start failed");
                return Err(err);
            }
        };

        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        info!(generation, device = %lease.label(), "capture started");

        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(ActiveCapture {
            generation,
            cancel: cancel.clone(),
            lease,
            task: None,
        });

        let task = tokio::spawn(decode_task(
            stream,
            generation,
            cancel,
            self.signals.clone(),
            Arc::clone(&self.slot),
        ));

        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(active) if active.generation == generation => active.task = Some(task),
            // Task already finished and released its own slot.
            _ => drop(task),
        }
        Ok(())
    }

    /// Release the device. Safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        if let Some(active) = take_active(&self.slot) {
            debug!(generation = active.generation, "capture stopped");
            active.shut_down();
        }
    }
}

impl<B: DecodeBackend> Drop for CaptureSession<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn decode_task<S: PayloadStream>(
    mut stream: S,
    generation: u64,
    cancel: CancellationToken,
    signals: mpsc::UnboundedSender<CaptureSignal>,
    slot: ActiveSlot,
) {
    let mut armed = true;

    let terminal = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break None,
            next = stream.next_payload() => match next {
                Ok(Some(raw)) => {
                    if !armed {
                        continue;
                    }
                    let token = NormalizedToken::normalize(&raw);
                    if token.is_empty() {
                        debug!(generation, "ignoring payload without token characters");
                        continue;
                    }
                    armed = false;
                    debug!(generation, token = %token, "payload decoded");
                    let event = ScanEvent::new(token, ScanOrigin::Camera);
                    let _ = signals.send(CaptureSignal::Decoded { generation, event });
                }
                Ok(None) => break Some(CaptureSignal::Ended { generation }),
                Err(fault) => {
                    warn!(generation, error = %fault, "decode loop faulted");
                    break Some(CaptureSignal::Fault { generation, fault });
                }
            },
        }
    };

    // Release before reporting so the owner never sees an end while the
    // device is still held.
    let own = {
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(active) if active.generation == generation => guard.take(),
            _ => None,
        }
    };
    if let Some(mut active) = own {
        active.cancel.cancel();
        active.lease.release();
    }

    if let Some(signal) = terminal {
        let _ = signals.send(signal);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn next_signal(rx: &mut mpsc::UnboundedReceiver<CaptureSignal>) -> CaptureSignal {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn emits_one_decode_per_start() {
        let (backend, feeder) = ChannelBackend::new();
        let (mut session, mut rx) = CaptureSession::new(backend, CameraFacing::Environment);

        session.start().await.unwrap();
        feeder.feed("abc-123");
        feeder.feed("abc-123");
        feeder.feed("xyz-999");

        let CaptureSignal::Decoded { generation, event } = next_signal(&mut rx).await else {
            panic!("expected decode");
        };
        assert_eq!(generation, 1);
        assert_eq!(event.token.as_str(), "ABC123");

        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err(), "sustained view must not flood");
        session.stop();
    }

    #[tokio::test]
    async fn restart_rearms_and_bumps_generation() {
        let (backend, feeder) = ChannelBackend::new();
        let (mut session, mut rx) = CaptureSession::new(backend, CameraFacing::Environment);

        session.start().await.unwrap();
        feeder.feed("first");
        assert_eq!(next_signal(&mut rx).await.generation(), 1);

        session.start().await.unwrap();
        feeder.feed("second");
        let signal = next_signal(&mut rx).await;
        assert_eq!(signal.generation(), 2);
        assert_eq!(feeder.active_leases(), 1);
    }

    #[tokio::test]
    async fn stop_twice_is_a_noop_and_releases() {
        let (backend, feeder) = ChannelBackend::new();
        let (mut session, _rx) = CaptureSession::new(backend, CameraFacing::Environment);

        session.start().await.unwrap();
        assert_eq!(feeder.active_leases(), 1);

        session.stop();
        assert_eq!(feeder.active_leases(), 0);
        session.stop();
        assert_eq!(feeder.active_leases(), 0);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn permission_denied_blocks_restart_until_allowed() {
        let (backend, feeder) = ChannelBackend::new();
        let (mut session, _rx) = CaptureSession::new(backend, CameraFacing::Environment);

        feeder.reject_next_open(CameraError::PermissionDenied);
        assert_eq!(session.start().await, Err(CameraError::PermissionDenied));

        // No device access attempted while denied.
        assert_eq!(session.start().await, Err(CameraError::PermissionDenied));
        assert_eq!(feeder.open_count(), 1);

        session.allow_retry();
        session.start().await.unwrap();
        assert_eq!(feeder.open_count(), 2);
    }

    #[tokio::test]
    async fn busy_device_is_distinct_and_retryable() {
        let (backend, feeder) = ChannelBackend::new();
        let (mut session, _rx) = CaptureSession::new(backend, CameraFacing::Environment);

        feeder.reject_next_open(CameraError::DeviceBusy);
        assert_eq!(session.start().await, Err(CameraError::DeviceBusy));
        session.start().await.unwrap();
    }

    #[tokio::test]
    async fn fault_releases_device_before_reporting() {
        let (backend, feeder) = ChannelBackend::new();
        let (mut session, mut rx) = CaptureSession::new(backend, CameraFacing::Environment);

        session.start().await.unwrap();
        feeder.fault("decoder crashed");

        let signal = next_signal(&mut rx).await;
        assert!(matches!(signal, CaptureSignal::Fault { generation: 1, .. }));
        assert_eq!(feeder.active_leases(), 0);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn control_release_from_outside() {
        let (backend, feeder) = ChannelBackend::new();
        let (mut session, _rx) = CaptureSession::new(backend, CameraFacing::Environment);
        let control = session.control();

        session.start().await.unwrap();
        control.release();
        control.release();
        assert_eq!(feeder.active_leases(), 0);
    }

    #[tokio::test]
    async fn drop_releases_device() {
        let (backend, feeder) = ChannelBackend::new();
        {
            let (mut session, _rx) = CaptureSession::new(backend, CameraFacing::Environment);
            session.start().await.unwrap();
            assert_eq!(feeder.active_leases(), 1);
        }
        assert_eq!(feeder.active_leases(), 0);
    }
}
