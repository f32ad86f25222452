// ── Scanner driver ──
//
// One task owns the machine, the capture session and the resume timer.
// Validations run on spawned tasks and report back through a channel, so
// the loop keeps handling stop/acknowledge while a request is in flight.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::machine::{Effect, ScanInput, ScanMachine, ScanNotice, ScanState};
use super::timer::DelayedTransition;
use crate::capture::{CaptureSession, CaptureSignal, DecodeBackend};
use crate::feedback::FeedbackSignaler;
use crate::history::{ScanHistory, ScanRecord};
use crate::scan::{ScanEvent, ScanOrigin};
use crate::validator::{CheckInService, CheckInValidator, ValidationOutcome};

/// Commands from the host.
#[derive(Debug)]
pub(crate) enum ScanCommand {
    Start,
    Stop,
    Manual(ScanEvent),
    Acknowledge,
}

struct Completion {
    ticket: u64,
    origin: ScanOrigin,
    outcome: Option<ValidationOutcome>,
}

pub(crate) struct Driver<B: DecodeBackend, S: CheckInService> {
    pub machine: ScanMachine,
    pub session: CaptureSession<B>,
    pub signals: mpsc::UnboundedReceiver<CaptureSignal>,
    pub validator: CheckInValidator<S>,
    pub feedback: Arc<dyn FeedbackSignaler>,
    pub history: Arc<Mutex<ScanHistory>>,
    pub dwell: Duration,
    pub state_tx: watch::Sender<ScanState>,
    pub notice_tx: broadcast::Sender<ScanNotice>,
}

impl<B: DecodeBackend, S: CheckInService> Driver<B, S> {
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ScanCommand>,
        cancel: CancellationToken,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let mut resume = DelayedTransition::<()>::new();
        // Generation of the capture the machine is currently waiting on.
        let mut live_generation: Option<u64> = None;

        loop {
            let input = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    match cmd {
                        ScanCommand::Start => {
                            self.session.allow_retry();
                            ScanInput::Start
                        }
                        ScanCommand::Stop => ScanInput::Stop,
                        ScanCommand::Manual(event) => ScanInput::Manual(event),
                        ScanCommand::Acknowledge => ScanInput::Acknowledge,
                    }
                }
                Some(signal) = self.signals.recv() => {
                    if live_generation != Some(signal.generation()) {
                        debug!(generation = signal.generation(), "stale capture signal dropped");
                        continue;
                    }
                    match signal {
                        CaptureSignal::Decoded { event, .. } => ScanInput::Decoded(event),
                        CaptureSignal::Ended { .. } => {
                            live_generation = None;
                            ScanInput::CaptureEnded
                        }
                        CaptureSignal::Fault { fault, .. } => {
                            live_generation = None;
                            ScanInput::CaptureFault(fault.message)
                        }
                    }
                }
                Some(done) = done_rx.recv() => match done.outcome {
                    Some(outcome) => {
                        self.record(&outcome, done.origin);
                        ScanInput::Completed { ticket: done.ticket, outcome }
                    }
                    None => ScanInput::Dropped { ticket: done.ticket },
                },
                () = resume.fired() => ScanInput::DwellElapsed,
            };

            self.apply(input, &done_tx, &mut resume, &mut live_generation)
                .await;
        }

        self.session.stop();
        info!("scanner stopped");
    }

    async fn apply(
        &mut self,
        input: ScanInput,
        done_tx: &mpsc::UnboundedSender<Completion>,
        resume: &mut DelayedTransition<()>,
        live_generation: &mut Option<u64>,
    ) {
        let mut queue = VecDeque::from([input]);

        while let Some(input) = queue.pop_front() {
            let effects = self.machine.step(input);
            for effect in effects {
                match effect {
                    Effect::StartCapture => match self.session.start().await {
                        Ok(()) => *live_generation = Some(self.session.generation()),
                        Err(err) => {
                            *live_generation = None;
                            queue.push_back(ScanInput::CaptureFailed(err));
                        }
                    },
                    Effect::StopCapture => {
                        self.session.stop();
                        *live_generation = None;
                    }
                    Effect::Submit { ticket, event } => {
                        let validator = self.validator.clone();
                        let done_tx = done_tx.clone();
                        tokio::spawn(async move {
                            let origin = event.origin;
                            let outcome = validator.submit(&event).await;
                            let _ = done_tx.send(Completion {
                                ticket,
                                origin,
                                outcome,
                            });
                        });
                    }
                    Effect::ScheduleResume => resume.schedule(self.dwell, ()),
                    Effect::CancelResume => {
                        resume.cancel();
                    }
                    Effect::Feedback(cue) => self.feedback.signal(cue),
                    Effect::Publish(notice) => {
                        if notice == ScanNotice::SessionExpired {
                            warn!("operator session expired; scanning halted");
                        }
                        let _ = self.notice_tx.send(notice);
                    }
                }
            }
        }

        self.state_tx.send_if_modified(|current| {
            let next = self.machine.state();
            if current == next {
                false
            } else {
                debug!(from = %current, to = %next, "scanner state changed");
                *current = next.clone();
                true
            }
        });
    }

    fn record(&self, outcome: &ValidationOutcome, origin: ScanOrigin) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(ScanRecord::from_outcome(outcome, origin));
    }
}
