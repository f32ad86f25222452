use thiserror::Error;

/// Top-level error type for the `checkin-api` crate.
///
/// Covers every failure mode of the backend contract: authentication,
/// transport, structured API errors, and malformed payloads.
/// `checkin-core` maps these into validation outcomes and user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The backend rejected the operator credential (HTTP 401 or 403).
    #[error("Operator session rejected (HTTP {status}) -- sign in again")]
    Unauthorized { status: u16 },

    /// The configured bearer token cannot be sent as a header.
    #[error("Invalid bearer token: {message}")]
    InvalidToken { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Backend ─────────────────────────────────────────────────────
    /// Non-success response carrying a structured or plain-text error.
    #[error("Backend error (HTTP {status}): {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the operator credential is no longer accepted.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::InvalidToken { .. })
    }

    /// Returns `true` if this is a transient error worth an operator retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// The HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status } | Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Extract the API error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_auth_expired_not_transient() {
        let err = Error::Unauthorized { status: 403 };
        assert!(err.is_auth_expired());
        assert!(!err.is_transient());
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Api {
            message: "bad gateway".into(),
            code: None,
            status: 502,
        };
        assert!(err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn api_404_is_not_found() {
        let err = Error::Api {
            message: "no such route".into(),
            code: Some("route.missing".into()),
            status: 404,
        };
        assert!(err.is_not_found());
        assert_eq!(err.api_error_code(), Some("route.missing"));
    }
}
