// In-memory validation backend for rehearsals and tests.
//
// Honors the same contract as the real endpoint: idempotent by token,
// duplicate calls report `already_used`, an invalid operator session
// answers 401.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use checkin_api::{ParticipantSummary, ValidateResponse, WireOutcome};

use crate::token::NormalizedToken;
use crate::validator::CheckInService;

#[derive(Debug, Clone)]
struct Ticket {
    summary: ParticipantSummary,
    eligible: bool,
    scanned_at: Option<DateTime<Utc>>,
}

/// Offline check-in backend keyed by normalized token.
#[derive(Debug, Default)]
pub struct MemoryCheckIn {
    tickets: DashMap<String, Ticket>,
    revoked: AtomicBool,
    offline: AtomicBool,
    submissions: AtomicUsize,
}

impl MemoryCheckIn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a valid, unused ticket.
    pub fn register(&self, token: &str, name: &str, event_title: &str) {
        self.insert(token, name, event_title, true);
    }

    /// Register a ticket that resolves but may not enter (cancelled
    /// booking, other event).
    pub fn register_ineligible(&self, token: &str, name: &str, event_title: &str) {
        self.insert(token, name, event_title, false);
    }

    fn insert(&self, token: &str, name: &str, event_title: &str, eligible: bool) {
        let key = NormalizedToken::normalize(token).as_str().to_owned();
        self.tickets.insert(
            key,
            Ticket {
                summary: ParticipantSummary {
                    name: name.to_owned(),
                    event_title: event_title.to_owned(),
                },
                eligible,
                scanned_at: None,
            },
        );
    }

    /// Invalidate the operator session; every call answers 401 afterwards.
    pub fn revoke_session(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    /// Simulate an unreachable backend.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of validation calls received.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Tokens already checked in.
    pub fn present_count(&self) -> usize {
        self.tickets
            .iter()
            .filter(|t| t.value().scanned_at.is_some())
            .count()
    }

    fn answer(&self, token: &str) -> Result<ValidateResponse, checkin_api::Error> {
        self.submissions.fetch_add(1, Ordering::SeqCst);

        if self.revoked.load(Ordering::SeqCst) {
            return Err(checkin_api::Error::Unauthorized { status: 401 });
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(checkin_api::Error::Timeout { timeout_secs: 30 });
        }

        let key = NormalizedToken::normalize(token);
        let Some(mut ticket) = self.tickets.get_mut(key.as_str()) else {
            return Ok(response(WireOutcome::NotFound, None, None));
        };

        let summary = Some(ticket.summary.clone());
        if !ticket.eligible {
            return Ok(response(WireOutcome::Expired, summary, None));
        }
        if let Some(at) = ticket.scanned_at {
            return Ok(response(WireOutcome::AlreadyUsed, summary, Some(at)));
        }

        let now = Utc::now();
        ticket.scanned_at = Some(now);
        Ok(response(WireOutcome::Accepted, summary, Some(now)))
    }
}

fn response(
    outcome: WireOutcome,
    participant_summary: Option<ParticipantSummary>,
    scanned_at: Option<DateTime<Utc>>,
) -> ValidateResponse {
    ValidateResponse {
        outcome,
        message: None,
        participant_summary,
        scanned_at,
    }
}

impl CheckInService for MemoryCheckIn {
    async fn check_in(&self, token: &str) -> Result<ValidateResponse, checkin_api::Error> {
        self.answer(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepted_then_already_used_with_original_time() {
        let backend = MemoryCheckIn::new();
        backend.register("abc-123", "Ada", "Gala");

        let first = backend.answer("ABC123").unwrap();
        let second = backend.answer("abc 123").unwrap();

        assert_eq!(first.outcome, WireOutcome::Accepted);
        assert_eq!(second.outcome, WireOutcome::AlreadyUsed);
        assert_eq!(first.scanned_at, second.scanned_at);
        assert_eq!(backend.present_count(), 1);
    }

    #[test]
    fn unknown_and_ineligible_tokens() {
        let backend = MemoryCheckIn::new();
        backend.register_ineligible("OLD1", "Bob", "Gala");

        assert_eq!(backend.answer("NOPE").unwrap().outcome, WireOutcome::NotFound);
        assert_eq!(backend.answer("OLD1").unwrap().outcome, WireOutcome::Expired);
        assert_eq!(backend.present_count(), 0);
    }

    #[test]
    fn offline_has_no_side_effect() {
        let backend = MemoryCheckIn::new();
        backend.register("T1", "Ada", "Gala");
        backend.set_offline(true);
        assert!(backend.answer("T1").is_err());

        backend.set_offline(false);
        assert_eq!(backend.answer("T1").unwrap().outcome, WireOutcome::Accepted);
    }
}
