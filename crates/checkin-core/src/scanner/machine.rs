// ── Scan state machine ──
//
// Pure transition function: (state, input) -> (state', effects). The
// driver performs the effects (device, network, timers, audio) and feeds
// their results back in as inputs. Nothing here awaits.

use std::sync::Arc;

use serde::Serialize;
use strum::Display;
use tracing::debug;

use crate::error::CameraError;
use crate::feedback::Cue;
use crate::scan::{ScanEvent, ScanOrigin};
use crate::validator::{ValidationKind, ValidationOutcome};

/// Operator-visible scanner state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Display)]
#[serde(tag = "state", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanState {
    /// No capture device held.
    Idle,
    /// Device held, waiting for a decode or a manual token.
    Capturing,
    /// Exactly one validation in flight. The device is released.
    Submitting { ticket: u64, origin: ScanOrigin },
    /// Outcome on screen until the dwell elapses or the operator acknowledges.
    ResultShown { outcome: Arc<ValidationOutcome> },
}

impl ScanState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting { .. })
    }
}

/// Something that happened.
#[derive(Debug, Clone)]
pub enum ScanInput {
    Start,
    Stop,
    Decoded(ScanEvent),
    Manual(ScanEvent),
    CaptureFailed(CameraError),
    CaptureEnded,
    CaptureFault(String),
    Completed {
        ticket: u64,
        outcome: ValidationOutcome,
    },
    /// The validator refused the event as already consumed.
    Dropped {
        ticket: u64,
    },
    DwellElapsed,
    Acknowledge,
}

/// Host-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanNotice {
    Outcome(Arc<ValidationOutcome>),
    /// The operator credential is no longer valid. Scanning will not resume.
    SessionExpired,
    CameraFailed(CameraError),
    CaptureEnded,
    CaptureFault(String),
    /// Manual token refused because a validation is already in flight.
    Busy,
}

/// Something the driver must do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartCapture,
    StopCapture,
    Submit { ticket: u64, event: ScanEvent },
    ScheduleResume,
    CancelResume,
    Feedback(Cue),
    Publish(ScanNotice),
}

/// The scanner controller.
///
/// `camera_wanted` remembers whether the operator asked for scanning, so
/// a manual entry from `Idle` returns to `Idle` while one from `Capturing`
/// returns to `Capturing`.
#[derive(Debug, Clone)]
pub struct ScanMachine {
    state: ScanState,
    camera_wanted: bool,
    next_ticket: u64,
}

impl Default for ScanMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanMachine {
    pub fn new() -> Self {
        Self {
            state: ScanState::Idle,
            camera_wanted: false,
            next_ticket: 0,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn camera_wanted(&self) -> bool {
        self.camera_wanted
    }

    /// Apply one input.
    pub fn step(&mut self, input: ScanInput) -> Vec<Effect> {
        let mut effects = Vec::new();
        match input {
            ScanInput::Start => self.on_start(&mut effects),
            ScanInput::Stop => {
                self.camera_wanted = false;
                self.state = ScanState::Idle;
                effects.push(Effect::CancelResume);
                effects.push(Effect::StopCapture);
            }
            ScanInput::Decoded(event) => {
                if self.state == ScanState::Capturing {
                    // Release the device before the validator is called.
                    effects.push(Effect::StopCapture);
                    self.submit(event, &mut effects);
                } else {
                    debug!(state = %self.state, "decode ignored");
                }
            }
            ScanInput::Manual(event) => self.on_manual(event, &mut effects),
            ScanInput::CaptureFailed(err) => {
                if self.state == ScanState::Capturing {
                    self.camera_wanted = false;
                    self.state = ScanState::Idle;
                    effects.push(Effect::StopCapture);
                    effects.push(Effect::Publish(ScanNotice::CameraFailed(err)));
                }
            }
            ScanInput::CaptureEnded => {
                if self.state == ScanState::Capturing {
                    self.camera_wanted = false;
                    self.state = ScanState::Idle;
                    effects.push(Effect::Publish(ScanNotice::CaptureEnded));
                }
            }
            ScanInput::CaptureFault(message) => {
                if self.state == ScanState::Capturing {
                    self.camera_wanted = false;
                    self.state = ScanState::Idle;
                    effects.push(Effect::StopCapture);
                    effects.push(Effect::Publish(ScanNotice::CaptureFault(message)));
                }
            }
            ScanInput::Completed { ticket, outcome } => {
                self.on_completed(ticket, outcome, &mut effects);
            }
            ScanInput::Dropped { ticket } => {
                if self.is_current(ticket) {
                    self.resume(&mut effects);
                }
            }
            ScanInput::DwellElapsed => {
                if self.showing_resumable() {
                    self.resume(&mut effects);
                }
            }
            ScanInput::Acknowledge => {
                if let ScanState::ResultShown { outcome } = &self.state {
                    let expired = outcome.kind == ValidationKind::Unauthorized;
                    effects.push(Effect::CancelResume);
                    if expired {
                        self.state = ScanState::Idle;
                    } else {
                        self.resume(&mut effects);
                    }
                }
            }
        }
        effects
    }

    fn on_start(&mut self, effects: &mut Vec<Effect>) {
        self.camera_wanted = true;
        match self.state {
            ScanState::Idle | ScanState::ResultShown { .. } => {
                effects.push(Effect::CancelResume);
                self.state = ScanState::Capturing;
                effects.push(Effect::StartCapture);
            }
            // Capture resumes once the in-flight result has been shown.
            ScanState::Capturing | ScanState::Submitting { .. } => {}
        }
    }

    fn on_manual(&mut self, event: ScanEvent, effects: &mut Vec<Effect>) {
        if event.token.is_empty() {
            debug!("empty manual token ignored");
            return;
        }
        match self.state {
            ScanState::Submitting { .. } => {
                effects.push(Effect::Publish(ScanNotice::Busy));
            }
            ScanState::Capturing => {
                effects.push(Effect::StopCapture);
                self.submit(event, effects);
            }
            ScanState::ResultShown { .. } => {
                effects.push(Effect::CancelResume);
                self.submit(event, effects);
            }
            ScanState::Idle => self.submit(event, effects),
        }
    }

    fn on_completed(&mut self, ticket: u64, outcome: ValidationOutcome, effects: &mut Vec<Effect>) {
        if !self.is_current(ticket) {
            debug!(ticket, kind = %outcome.kind, "stale validation result discarded");
            return;
        }

        let outcome = Arc::new(outcome);
        effects.push(Effect::Feedback(Cue::from(outcome.kind)));
        effects.push(Effect::Publish(ScanNotice::Outcome(Arc::clone(&outcome))));

        if outcome.kind == ValidationKind::Unauthorized {
            self.camera_wanted = false;
            effects.push(Effect::Publish(ScanNotice::SessionExpired));
        } else {
            effects.push(Effect::ScheduleResume);
        }
        self.state = ScanState::ResultShown { outcome };
    }

    fn submit(&mut self, event: ScanEvent, effects: &mut Vec<Effect>) {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.state = ScanState::Submitting {
            ticket,
            origin: event.origin,
        };
        effects.push(Effect::Submit { ticket, event });
    }

    fn resume(&mut self, effects: &mut Vec<Effect>) {
        if self.camera_wanted {
            self.state = ScanState::Capturing;
            effects.push(Effect::StartCapture);
        } else {
            self.state = ScanState::Idle;
        }
    }

    fn is_current(&self, ticket: u64) -> bool {
        matches!(self.state, ScanState::Submitting { ticket: t, .. } if t == ticket)
    }

    fn showing_resumable(&self) -> bool {
        matches!(
            &self.state,
            ScanState::ResultShown { outcome } if outcome.kind != ValidationKind::Unauthorized
        )
    }
}
