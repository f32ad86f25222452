// ── Core error types ──
//
// User-facing errors from checkin-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<checkin_api::Error>`
// impl translates transport-layer errors into domain variants.
//
// Validation results are NOT errors: they travel as `ValidationOutcome`.
// `CoreError` covers the aggregation/refresh path and the host surface.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach check-in backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Operator session expired: {message}")]
    SessionExpired { message: String },

    #[error("Check-in backend timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Event not found: {identifier}")]
    EventNotFound { identifier: String },

    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Scanner errors ───────────────────────────────────────────────
    #[error("Token is empty after normalization")]
    EmptyToken,

    #[error("Scanner is shut down")]
    ScannerClosed,

    #[error(transparent)]
    Camera(#[from] CameraError),

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` when the operator, not the data, is the problem.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }
}

// ── Camera errors ────────────────────────────────────────────────────

/// Why a capture device could not be started.
///
/// Every variant maps to distinct operator guidance via
/// [`remediation()`](Self::remediation). None of them is retried
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera access denied")]
    PermissionDenied,

    #[error("No camera device found")]
    DeviceNotFound,

    #[error("Camera is in use by another application")]
    DeviceBusy,

    #[error("Camera capture unsupported: {reason}")]
    Unsupported { reason: String },
}

impl CameraError {
    /// Operator-facing guidance for fixing the condition.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Grant camera access to this console, then start scanning again."
            }
            Self::DeviceNotFound => {
                "Connect a camera or barcode reader, or enter tokens manually."
            }
            Self::DeviceBusy => {
                "Close other applications using the camera, then start scanning again."
            }
            Self::Unsupported { .. } => {
                "Camera capture needs a secure context (HTTPS or a local device). \
                 Enter tokens manually instead."
            }
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<checkin_api::Error> for CoreError {
    fn from(err: checkin_api::Error) -> Self {
        match err {
            checkin_api::Error::Unauthorized { status } => CoreError::SessionExpired {
                message: format!("backend rejected the operator token (HTTP {status})"),
            },
            checkin_api::Error::InvalidToken { message } => CoreError::SessionExpired { message },
            checkin_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            checkin_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            checkin_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            checkin_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            checkin_api::Error::Api {
                message,
                code,
                status,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            checkin_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_becomes_session_expired() {
        let err = CoreError::from(checkin_api::Error::Unauthorized { status: 401 });
        assert!(err.is_session_expired());
    }

    #[test]
    fn api_status_is_kept() {
        let err = CoreError::from(checkin_api::Error::Api {
            message: "boom".into(),
            code: None,
            status: 503,
        });
        assert!(matches!(err, CoreError::Api { status: Some(503), .. }));
    }

    #[test]
    fn every_camera_error_has_distinct_guidance() {
        let all = [
            CameraError::PermissionDenied,
            CameraError::DeviceNotFound,
            CameraError::DeviceBusy,
            CameraError::Unsupported {
                reason: "insecure".into(),
            },
        ];
        let mut texts: Vec<&str> = all.iter().map(CameraError::remediation).collect();
        texts.sort_unstable();
        texts.dedup();
        assert_eq!(texts.len(), all.len());
    }
}
