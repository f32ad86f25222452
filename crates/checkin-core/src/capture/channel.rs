// Channel-fed decode backend.
//
// Bridges an external decoder (a helper process, a test, a kiosk daemon)
// that pushes payloads into the console. Each `open` creates a fresh
// stream; the feeder always writes to the newest one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use super::{CameraFacing, DecodeBackend, DecodeFault, DeviceLease, PayloadStream};
use crate::error::CameraError;

enum Feed {
    Payload(String),
    Fault(String),
}

#[derive(Default)]
struct Shared {
    current: Mutex<Option<mpsc::UnboundedSender<Feed>>>,
    rejections: Mutex<VecDeque<CameraError>>,
    opens: AtomicUsize,
    active: AtomicUsize,
}

/// Backend half: handed to the [`CaptureSession`](super::CaptureSession).
pub struct ChannelBackend {
    shared: Arc<Shared>,
}

/// Producer half: pushes payloads into whichever stream is open.
#[derive(Clone)]
pub struct ChannelFeeder {
    shared: Arc<Shared>,
}

impl ChannelBackend {
    pub fn new() -> (Self, ChannelFeeder) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            ChannelFeeder { shared },
        )
    }
}

impl ChannelFeeder {
    /// Deliver one decoded payload. Dropped when no stream is open.
    pub fn feed(&self, payload: impl Into<String>) -> bool {
        self.send(Feed::Payload(payload.into()))
    }

    /// Make the running decode loop fail.
    pub fn fault(&self, message: impl Into<String>) -> bool {
        self.send(Feed::Fault(message.into()))
    }

    /// End the current stream as if the source was unplugged.
    pub fn close(&self) {
        self.shared
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Fail the next `open` with the given error.
    pub fn reject_next_open(&self, error: CameraError) {
        self.shared
            .rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Number of `open` attempts that reached the device.
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Leases handed out and not yet released.
    pub fn active_leases(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    fn send(&self, feed: Feed) -> bool {
        let guard = self
            .shared
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => tx.send(feed).is_ok(),
            None => {
                debug!("no open capture stream; payload dropped");
                false
            }
        }
    }
}

pub struct ChannelStream {
    rx: mpsc::UnboundedReceiver<Feed>,
}

impl PayloadStream for ChannelStream {
    async fn next_payload(&mut self) -> Result<Option<String>, DecodeFault> {
        match self.rx.recv().await {
            Some(Feed::Payload(raw)) => Ok(Some(raw)),
            Some(Feed::Fault(message)) => Err(DecodeFault::new(message)),
            None => Ok(None),
        }
    }
}

impl DecodeBackend for ChannelBackend {
    type Stream = ChannelStream;

    async fn open(&self, facing: CameraFacing) -> Result<(ChannelStream, DeviceLease), CameraError> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        let rejection = self
            .shared
            .rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(err) = rejection {
            return Err(err);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self
            .shared
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        self.shared.active.fetch_add(1, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let lease = DeviceLease::new(format!("channel:{facing}"), move || {
            shared.active.fetch_sub(1, Ordering::SeqCst);
        });
        Ok((ChannelStream { rx }, lease))
    }
}
