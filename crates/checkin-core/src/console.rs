// ── Console facade ──
//
// Wires a configured backend client to the validator, scanners and the
// attendance board. One `Console` per operator session; scanners and
// boards are created per surface and never shared process-wide.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use checkin_api::{CheckInClient, TlsMode, TransportConfig};

use crate::aggregate::{
    DashboardStats, EventAttendance, GlobalStats, compute_dashboard, compute_global_stats,
    merge_participants,
};
use crate::capture::{DecodeBackend, LineBackend};
use crate::config::{ConsoleConfig, ScannerSettings, TlsVerification};
use crate::error::CoreError;
use crate::feedback::{FeedbackSignaler, NoopSignaler, TerminalBell};
use crate::refresh::{AttendanceBoard, RefreshOutcome};
use crate::scanner::ScannerHandle;
use crate::token::NormalizedToken;
use crate::validator::{CheckInValidator, ValidationOutcome};

/// Entry point for hosts.
///
/// Cheaply cloneable via `Arc<ConsoleInner>`.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    config: ConsoleConfig,
    validator: CheckInValidator<CheckInClient>,
    board: AttendanceBoard<CheckInClient>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Console {
    /// Build the HTTP client. Does not contact the backend.
    pub fn new(config: ConsoleConfig) -> Result<Self, CoreError> {
        let transport = build_transport(&config);
        let client = CheckInClient::new(config.url.as_str(), &config.token, &transport)?;
        debug!(url = %client.base_url(), "check-in client ready");
        Ok(Self::with_client(config, client))
    }

    /// Use a prebuilt client (tests, custom middleware).
    pub fn with_client(config: ConsoleConfig, client: CheckInClient) -> Self {
        let client = Arc::new(client);
        Self {
            inner: Arc::new(ConsoleInner {
                config,
                validator: CheckInValidator::from_arc(Arc::clone(&client)),
                board: AttendanceBoard::new(client),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &Arc<CheckInClient> {
        self.inner.validator.service()
    }

    pub fn validator(&self) -> &CheckInValidator<CheckInClient> {
        &self.inner.validator
    }

    pub fn board(&self) -> &AttendanceBoard<CheckInClient> {
        &self.inner.board
    }

    // ── Scanning ─────────────────────────────────────────────────

    /// One-shot validation outside any scanner.
    pub async fn validate(&self, raw: &str) -> Result<ValidationOutcome, CoreError> {
        let token = NormalizedToken::normalize(raw);
        if token.is_empty() {
            return Err(CoreError::EmptyToken);
        }
        Ok(self.inner.validator.validate(&token).await)
    }

    /// Spawn a scanner over an arbitrary decode backend.
    ///
    /// `settings` overrides the configured scanner tuning when given.
    pub fn scanner<B: DecodeBackend>(
        &self,
        backend: B,
        feedback: Arc<dyn FeedbackSignaler>,
        settings: Option<&ScannerSettings>,
    ) -> ScannerHandle {
        ScannerHandle::spawn(
            backend,
            self.inner.validator.clone(),
            feedback,
            settings.unwrap_or(&self.inner.config.scanner),
        )
    }

    /// Spawn a scanner reading a line device (barcode reader), ringing
    /// the terminal bell when `settings.bell` is set.
    pub fn line_scanner(&self, settings: Option<&ScannerSettings>) -> ScannerHandle {
        let settings = settings.unwrap_or(&self.inner.config.scanner);
        let feedback: Arc<dyn FeedbackSignaler> = if settings.bell {
            Arc::new(TerminalBell::new())
        } else {
            Arc::new(NoopSignaler)
        };
        self.scanner(
            LineBackend::new(settings.device.clone()),
            feedback,
            Some(settings),
        )
    }

    // ── Statistics ───────────────────────────────────────────────

    pub async fn refresh(&self, event_id: Option<&str>) -> Result<RefreshOutcome, CoreError> {
        self.inner.board.refresh(event_id).await
    }

    pub fn get_event_attendance(&self, event_id: &str) -> Option<EventAttendance> {
        self.inner.board.event_attendance(event_id)
    }

    pub fn get_global_stats(&self) -> Option<GlobalStats> {
        self.inner.board.global_stats()
    }

    /// Fetch members and participants and summarize them.
    pub async fn dashboard(&self) -> Result<DashboardStats, CoreError> {
        let client = self.client();
        let (members, participants) = tokio::join!(client.members(), client.participants(None));
        let members = members?;
        let participants = participants?;

        let rows = merge_participants(&participants.bookings, &participants.guests);
        let bookings = compute_global_stats(&rows).total_bookings;
        Ok(compute_dashboard(
            &members.members,
            &participants.events,
            bookings,
            Utc::now(),
        ))
    }

    /// Start the periodic refresh task. Returns `false` when the
    /// configured interval is zero.
    pub async fn start_periodic_refresh(&self, event_id: Option<String>) -> bool {
        let every = self.inner.config.refresh_interval;
        if every.is_zero() {
            return false;
        }
        let handle = self
            .inner
            .board
            .spawn_periodic(event_id, every, self.inner.cancel.child_token());
        self.inner.task_handles.lock().await.push(handle);
        info!(interval_secs = every.as_secs(), "periodic statistics refresh started");
        true
    }

    /// Cancel background tasks and wait for them.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("console shut down");
    }
}

fn build_transport(config: &ConsoleConfig) -> TransportConfig {
    let tls = match &config.tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    };
    TransportConfig {
        tls,
        timeout: config.timeout,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::validator::ValidationKind;

    async fn console(server: &MockServer) -> Console {
        let url = Url::parse(&server.uri()).unwrap();
        let mut config = ConsoleConfig::new(url, SecretString::from("operator".to_string()));
        config.timeout = Duration::from_secs(5);
        Console::new(config).unwrap()
    }

    #[test]
    fn tls_settings_map_to_transport() {
        let url = Url::parse("https://checkin.example.org/").unwrap();
        let mut config = ConsoleConfig::new(url, SecretString::from("t".to_string()));
        config.tls = TlsVerification::DangerAcceptInvalid;
        config.timeout = Duration::from_secs(7);
        let transport = build_transport(&config);
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(transport.timeout, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn empty_manual_token_never_reaches_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = console(&server).await.validate(" - ").await.unwrap_err();
        assert!(matches!(err, CoreError::EmptyToken));
    }

    #[tokio::test]
    async fn validate_normalizes_before_submitting() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/checkin/validate"))
            .and(wiremock::matchers::body_json(json!({ "token": "ABC123" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "outcome": "accepted",
                "participantSummary": { "name": "Ada Lovelace", "eventTitle": "Gala" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = console(&server).await.validate("abc-123 ").await.unwrap();
        assert_eq!(outcome.kind, ValidationKind::Accepted);
    }

    #[tokio::test]
    async fn dashboard_combines_members_and_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/members"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "members": [
                    { "id": "m1", "email": "a@example.org", "subscriptionStatus": "ACTIVE" },
                    { "id": "m2", "email": "b@example.org", "subscriptionStatus": "INACTIVE" }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/participants"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bookings": [{
                    "id": "b1",
                    "eventId": "e1",
                    "holder": { "userId": "u1", "email": "", "firstName": "Ada", "lastName": "L" },
                    "isPaid": true,
                    "totalPlaces": 1,
                    "totalPriceCents": 1500
                }],
                "events": [{ "id": "e1", "title": "Gala" }]
            })))
            .mount(&server)
            .await;

        let stats = console(&server).await.dashboard().await.unwrap();
        assert_eq!(stats.members, 2);
        assert_eq!(stats.active_subscriptions, 1);
        assert_eq!(stats.total_bookings, 1);
        assert!((stats.conversion_rate - 50.0).abs() < f64::EPSILON);
        assert!((stats.average_bookings_per_event - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn line_scanner_without_device_reports_missing_camera() {
        let server = MockServer::start().await;
        let console = console(&server).await;
        let settings = crate::config::ScannerSettings {
            bell: false,
            ..crate::config::ScannerSettings::default()
        };
        let scanner = console.line_scanner(Some(&settings));
        let mut notices = scanner.subscribe();

        scanner.start_scanning().unwrap();
        let notice = tokio::time::timeout(Duration::from_secs(5), notices.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            notice,
            crate::scanner::ScanNotice::CameraFailed(crate::error::CameraError::DeviceNotFound)
        );
        scanner.shutdown().await;
    }

    #[tokio::test]
    async fn zero_interval_disables_periodic_refresh() {
        let server = MockServer::start().await;
        let url = Url::parse(&server.uri()).unwrap();
        let mut config = ConsoleConfig::new(url, SecretString::from("operator".to_string()));
        config.refresh_interval = Duration::ZERO;
        let console = Console::new(config).unwrap();
        assert!(!console.start_periodic_refresh(None).await);
        console.shutdown().await;
    }
}
