// Async HTTP client for the check-in backend.
//
// Auth: `Authorization: Bearer <token>` on every request.
// Non-2xx responses are parsed into `Error::Api`; 401/403 short-circuit
// into `Error::Unauthorized` so the caller never mistakes an expired
// operator session for an invalid ticket.

use reqwest::StatusCode;
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::BearerToken;
use crate::error::Error;
use crate::models::{MembersResponse, ParticipantsResponse, ValidateRequest, ValidateResponse};
use crate::transport::TransportConfig;

// ── Error response shape ─────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the check-in backend.
pub struct CheckInClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

impl CheckInClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a bearer token and transport config.
    pub fn new(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let headers = BearerToken::new(token.clone()).headers()?;
        let http = transport.build_client_with_headers(headers)?;
        let base_url = Self::normalize_base_url(base_url)?;

        Ok(Self {
            http,
            base_url,
            timeout_secs: transport.timeout.as_secs(),
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        let base_url = Self::ensure_trailing_slash(base_url);
        Self {
            http,
            base_url,
            timeout_secs: TransportConfig::default().timeout.as_secs(),
        }
    }

    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let url = Url::parse(raw)?;
        Ok(Self::ensure_trailing_slash(url))
    }

    fn ensure_trailing_slash(mut url: Url) -> Url {
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        self.handle_response(resp).await
    }

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await.map_err(|e| self.map_send_error(e))?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Error::Unauthorized {
                status: status.as_u16(),
            };
        }

        let raw = resp.text().await.unwrap_or_default();

        if let Ok(err) = serde_json::from_str::<ErrorResponse>(&raw) {
            Error::Api {
                status: status.as_u16(),
                message: err.message.unwrap_or_else(|| status.to_string()),
                code: err.code,
            }
        } else {
            Error::Api {
                status: status.as_u16(),
                message: if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
                code: None,
            }
        }
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Submit a normalized credential to the validation endpoint.
    ///
    /// Called exactly once per scan. The backend is idempotent by token,
    /// so a second call for the same token reports `already_used`.
    pub async fn validate(&self, token: &str) -> Result<ValidateResponse, Error> {
        self.post("checkin/validate", &ValidateRequest { token })
            .await
    }

    /// Fetch bookings, guests and events, optionally scoped to one event.
    pub async fn participants(&self, event_id: Option<&str>) -> Result<ParticipantsResponse, Error> {
        let params: Vec<(&str, String)> = event_id
            .map(|id| vec![("eventId", id.to_owned())])
            .unwrap_or_default();
        self.get_with_params("participants", &params).await
    }

    /// Fetch the member listing used by the dashboard summary.
    pub async fn members(&self) -> Result<MembersResponse, Error> {
        self.get_with_params("members", &[]).await
    }
}
