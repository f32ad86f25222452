// ── Check-in validation ──
//
// Submits one normalized token to the backend and classifies whatever
// comes back (business outcome, HTTP error, transport failure) into a
// closed taxonomy. Nothing here retries.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};
use uuid::Uuid;

use checkin_api::{CheckInClient, ParticipantSummary, ValidateResponse, WireOutcome};

use crate::scan::ScanEvent;
use crate::token::NormalizedToken;

const CONSUMED_EVENT_CAPACITY: usize = 1024;

/// The external validation contract.
pub trait CheckInService: Send + Sync + 'static {
    fn check_in(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ValidateResponse, checkin_api::Error>> + Send;
}

impl CheckInService for CheckInClient {
    async fn check_in(&self, token: &str) -> Result<ValidateResponse, checkin_api::Error> {
        self.validate(token).await
    }
}

/// Closed outcome taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationKind {
    Accepted,
    AlreadyUsed,
    NotFound,
    Expired,
    NetworkFailure,
    Unauthorized,
}

impl ValidationKind {
    pub fn is_success(self) -> bool {
        self == Self::Accepted
    }

    /// A duplicate scan is expected, not an error.
    pub fn is_warning(self) -> bool {
        self == Self::AlreadyUsed
    }
}

/// Result of one validation call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub kind: ValidationKind,
    pub participant: Option<ParticipantSummary>,
    pub scanned_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    /// Redacted token fingerprint.
    pub token: String,
    pub completed_at: DateTime<Utc>,
}

impl ValidationOutcome {
    fn new(kind: ValidationKind, token: &NormalizedToken) -> Self {
        Self {
            kind,
            participant: None,
            scanned_at: None,
            message: None,
            token: token.fingerprint(),
            completed_at: Utc::now(),
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Map a business outcome from a 2xx response.
fn kind_from_wire(outcome: WireOutcome) -> ValidationKind {
    match outcome {
        WireOutcome::Accepted => ValidationKind::Accepted,
        WireOutcome::AlreadyUsed => ValidationKind::AlreadyUsed,
        WireOutcome::Expired => ValidationKind::Expired,
        WireOutcome::NotFound | WireOutcome::Unknown => ValidationKind::NotFound,
    }
}

/// Map a failed call. 401/403 never fold into token invalidity.
fn kind_from_error(err: &checkin_api::Error) -> ValidationKind {
    use checkin_api::Error as E;
    match err {
        E::Unauthorized { .. } | E::InvalidToken { .. } => ValidationKind::Unauthorized,
        E::Api { status, .. } => match *status {
            409 => ValidationKind::AlreadyUsed,
            410 => ValidationKind::Expired,
            408 | 429 | 500.. => ValidationKind::NetworkFailure,
            _ => ValidationKind::NotFound,
        },
        E::Transport(_)
        | E::Timeout { .. }
        | E::Tls(_)
        | E::InvalidUrl(_)
        | E::Deserialization { .. } => ValidationKind::NetworkFailure,
    }
}

/// Classify one backend result.
pub fn classify(
    token: &NormalizedToken,
    result: Result<ValidateResponse, checkin_api::Error>,
) -> ValidationOutcome {
    match result {
        Ok(resp) => {
            let mut outcome = ValidationOutcome::new(kind_from_wire(resp.outcome), token);
            outcome.participant = resp.participant_summary;
            outcome.scanned_at = resp.scanned_at;
            outcome.message = resp.message;
            outcome
        }
        Err(err) => {
            let kind = kind_from_error(&err);
            ValidationOutcome::new(kind, token).with_message(err.to_string())
        }
    }
}

/// Validates tokens against a [`CheckInService`].
///
/// Cheap to clone. Remembers which [`ScanEvent`]s it has already consumed
/// (bounded), so a decode event is never submitted twice.
pub struct CheckInValidator<S> {
    service: Arc<S>,
    consumed: Arc<Mutex<IndexSet<Uuid>>>,
}

impl<S> Clone for CheckInValidator<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            consumed: Arc::clone(&self.consumed),
        }
    }
}

impl<S: CheckInService> CheckInValidator<S> {
    pub fn new(service: S) -> Self {
        Self::from_arc(Arc::new(service))
    }

    pub fn from_arc(service: Arc<S>) -> Self {
        Self {
            service,
            consumed: Arc::new(Mutex::new(IndexSet::new())),
        }
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Call the backend exactly once and classify the result.
    ///
    /// An empty token never leaves the process and reports `NotFound`.
    pub async fn validate(&self, token: &NormalizedToken) -> ValidationOutcome {
        if token.is_empty() {
            return ValidationOutcome::new(ValidationKind::NotFound, token)
                .with_message("token is empty");
        }

        debug!(token = %token, "submitting check-in");
        let result = self.service.check_in(token.as_str()).await;
        let outcome = classify(token, result);

        match outcome.kind {
            ValidationKind::Accepted | ValidationKind::AlreadyUsed => {
                info!(token = %token, kind = %outcome.kind, "check-in validated");
            }
            ValidationKind::NotFound | ValidationKind::Expired => {
                info!(token = %token, kind = %outcome.kind, "check-in refused");
            }
            ValidationKind::NetworkFailure | ValidationKind::Unauthorized => {
                warn!(
                    token = %token,
                    kind = %outcome.kind,
                    message = outcome.message.as_deref().unwrap_or_default(),
                    "check-in failed"
                );
            }
        }
        outcome
    }

    /// Mark a decode event as consumed. `false` if it already was.
    pub fn claim(&self, event: &ScanEvent) -> bool {
        let mut consumed = self.consumed.lock().unwrap_or_else(PoisonError::into_inner);
        if !consumed.insert(event.id) {
            return false;
        }
        if consumed.len() > CONSUMED_EVENT_CAPACITY {
            consumed.shift_remove_index(0);
        }
        true
    }

    /// Validate a scan event, at most once per event.
    ///
    /// Returns `None` when this event was already submitted.
    pub async fn submit(&self, event: &ScanEvent) -> Option<ValidationOutcome> {
        if !self.claim(event) {
            warn!(event = %event.id, "scan event already submitted; ignoring");
            return None;
        }
        Some(self.validate(&event.token).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryCheckIn;

    fn api(status: u16) -> checkin_api::Error {
        checkin_api::Error::Api {
            message: "x".into(),
            code: None,
            status,
        }
    }

    #[test]
    fn http_errors_classify_into_taxonomy() {
        assert_eq!(kind_from_error(&api(404)), ValidationKind::NotFound);
        assert_eq!(kind_from_error(&api(422)), ValidationKind::NotFound);
        assert_eq!(kind_from_error(&api(409)), ValidationKind::AlreadyUsed);
        assert_eq!(kind_from_error(&api(410)), ValidationKind::Expired);
        assert_eq!(kind_from_error(&api(503)), ValidationKind::NetworkFailure);
        assert_eq!(kind_from_error(&api(429)), ValidationKind::NetworkFailure);
        assert_eq!(kind_from_error(&api(408)), ValidationKind::NetworkFailure);
        assert_eq!(
            kind_from_error(&checkin_api::Error::Unauthorized { status: 403 }),
            ValidationKind::Unauthorized
        );
        assert_eq!(
            kind_from_error(&checkin_api::Error::Timeout { timeout_secs: 30 }),
            ValidationKind::NetworkFailure
        );
    }

    #[test]
    fn unknown_wire_outcome_is_not_found() {
        assert_eq!(kind_from_wire(WireOutcome::Unknown), ValidationKind::NotFound);
    }

    #[tokio::test]
    async fn second_validation_is_already_used() {
        let backend = MemoryCheckIn::new();
        backend.register("ABC123", "Ada Lovelace", "Gala");
        let validator = CheckInValidator::new(backend);

        let first = validator
            .validate(&NormalizedToken::normalize("abc-123 "))
            .await;
        let second = validator.validate(&NormalizedToken::normalize("ABC123")).await;

        assert_eq!(first.kind, ValidationKind::Accepted);
        assert_eq!(second.kind, ValidationKind::AlreadyUsed);
        assert_eq!(first.participant.unwrap().name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn same_event_is_never_submitted_twice() {
        let backend = MemoryCheckIn::new();
        backend.register("ABC123", "Ada Lovelace", "Gala");
        let validator = CheckInValidator::new(backend);
        let event = ScanEvent::camera("ABC123");

        assert!(validator.submit(&event).await.is_some());
        assert!(validator.submit(&event).await.is_none());
        assert_eq!(validator.service().submissions(), 1);
    }

    #[tokio::test]
    async fn revoked_session_is_unauthorized_not_invalid_token() {
        let backend = MemoryCheckIn::new();
        backend.register("ABC123", "Ada Lovelace", "Gala");
        backend.revoke_session();
        let validator = CheckInValidator::new(backend);

        let outcome = validator.validate(&NormalizedToken::normalize("ABC123")).await;
        assert_eq!(outcome.kind, ValidationKind::Unauthorized);
    }

    #[tokio::test]
    async fn empty_token_never_reaches_backend() {
        let validator = CheckInValidator::new(MemoryCheckIn::new());
        let outcome = validator.validate(&NormalizedToken::normalize(" - ")).await;
        assert_eq!(outcome.kind, ValidationKind::NotFound);
        assert_eq!(validator.service().submissions(), 0);
    }

    #[test]
    fn consumed_set_is_bounded() {
        let validator = CheckInValidator::new(MemoryCheckIn::new());
        let first = ScanEvent::manual("A1");
        assert!(validator.claim(&first));
        for _ in 0..CONSUMED_EVENT_CAPACITY {
            assert!(validator.claim(&ScanEvent::manual("B2")));
        }
        // Oldest entry was evicted.
        assert!(validator.claim(&first));
    }
}
