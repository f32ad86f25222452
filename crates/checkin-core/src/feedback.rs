// ── Audible feedback ──
//
// Short cues that accompany each validation result. Implementations must
// return immediately; the scan loop calls `signal` from its event task.

use std::io::Write;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use strum::Display;
use tracing::{debug, warn};

use crate::validator::ValidationKind;

/// Which cue to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Cue {
    /// Single short cue.
    Success,
    /// Double cue. Expected but noteworthy (duplicate scan).
    Warning,
    /// Long cue.
    Failure,
}

impl Cue {
    /// Pulse pattern as gaps between bell strokes.
    fn pattern(self) -> &'static [Duration] {
        const SHORT: Duration = Duration::from_millis(0);
        const GAP: Duration = Duration::from_millis(120);
        const TIGHT: Duration = Duration::from_millis(60);
        match self {
            Self::Success => &[SHORT],
            Self::Warning => &[SHORT, GAP],
            Self::Failure => &[SHORT, TIGHT, TIGHT, TIGHT],
        }
    }
}

impl From<ValidationKind> for Cue {
    fn from(kind: ValidationKind) -> Self {
        match kind {
            ValidationKind::Accepted => Self::Success,
            ValidationKind::AlreadyUsed => Self::Warning,
            ValidationKind::NotFound
            | ValidationKind::Expired
            | ValidationKind::NetworkFailure
            | ValidationKind::Unauthorized => Self::Failure,
        }
    }
}

/// Non-blocking cue sink.
pub trait FeedbackSignaler: Send + Sync {
    fn signal(&self, cue: Cue);
}

/// Silent signaler for headless kiosks and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSignaler;

impl FeedbackSignaler for NoopSignaler {
    fn signal(&self, cue: Cue) {
        debug!(%cue, "feedback suppressed");
    }
}

/// Pulses the terminal bell (`BEL`) from a dedicated thread.
///
/// `signal` only enqueues; the worker exits when the signaler is dropped.
pub struct TerminalBell {
    tx: mpsc::Sender<Cue>,
}

impl TerminalBell {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Cue>();
        let spawned = thread::Builder::new()
            .name("checkin-bell".into())
            .spawn(move || {
                let mut err = std::io::stderr();
                while let Ok(cue) = rx.recv() {
                    for gap in cue.pattern() {
                        thread::sleep(*gap);
                        let _ = err.write_all(b"\x07");
                        let _ = err.flush();
                    }
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "could not start bell thread; cues disabled");
        }
        Self { tx }
    }
}

impl Default for TerminalBell {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackSignaler for TerminalBell {
    fn signal(&self, cue: Cue) {
        // Disconnected only when the worker failed to spawn.
        let _ = self.tx.send(cue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_per_outcome_kind() {
        assert_eq!(Cue::from(ValidationKind::Accepted), Cue::Success);
        assert_eq!(Cue::from(ValidationKind::AlreadyUsed), Cue::Warning);
        assert_eq!(Cue::from(ValidationKind::NotFound), Cue::Failure);
        assert_eq!(Cue::from(ValidationKind::Unauthorized), Cue::Failure);
    }

    #[test]
    fn patterns_are_distinct() {
        assert_eq!(Cue::Success.pattern().len(), 1);
        assert_eq!(Cue::Warning.pattern().len(), 2);
        assert!(Cue::Failure.pattern().len() > 2);
    }

    #[test]
    fn bell_signal_does_not_block() {
        let bell = TerminalBell::new();
        let started = std::time::Instant::now();
        for _ in 0..3 {
            bell.signal(Cue::Failure);
        }
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
