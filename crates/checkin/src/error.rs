//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use checkin_config::ConfigError;
use checkin_core::{CameraError, CoreError, ValidationKind};

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the check-in backend at {url}")]
    #[diagnostic(
        code(checkin::connection_failed),
        help(
            "Check the server URL and your network connection.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(checkin::timeout),
        help("Increase the timeout with --timeout or check backend responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Operator session expired: {message}")]
    #[diagnostic(
        code(checkin::session_expired),
        help(
            "Sign in again and store the new token with:\n  \
             checkin config set-token --profile {profile}"
        )
    )]
    SessionExpired { message: String, profile: String },

    #[error("No API token configured for profile '{profile}'")]
    #[diagnostic(
        code(checkin::no_credentials),
        help(
            "Store one with: checkin config set-token --profile {profile}\n\
             Or set the CHECKIN_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Scanning ─────────────────────────────────────────────────────
    #[error("Ticket rejected: {kind}")]
    #[diagnostic(code(checkin::rejected))]
    Rejected { kind: ValidationKind },

    #[error("{message}")]
    #[diagnostic(code(checkin::camera), help("{remediation}"))]
    Camera {
        message: String,
        remediation: &'static str,
    },

    #[error("Token is empty")]
    #[diagnostic(
        code(checkin::empty_token),
        help("Type the code printed under the QR code.")
    )]
    EmptyToken,

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(checkin::not_found),
        help("Run: checkin {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(checkin::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(checkin::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(checkin::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: checkin config set server <URL> --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(checkin::no_config),
        help(
            "Pass --server and --token, or create a profile with:\n  \
             checkin config set server <URL>\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(checkin::config))]
    Config(Box<figment::Error>),

    #[error("Keyring unavailable: {0}")]
    #[diagnostic(
        code(checkin::keyring),
        help("Set api_token_env in the profile, or export CHECKIN_TOKEN.")
    )]
    Keyring(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Output serialization failed: {0}")]
    #[diagnostic(code(checkin::serialize))]
    Serialize(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::SessionExpired { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Rejected { kind } => outcome_exit_code(*kind),
            Self::Validation { .. } | Self::EmptyToken => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

/// Exit code reported for a validation outcome.
pub fn outcome_exit_code(kind: ValidationKind) -> i32 {
    match kind {
        ValidationKind::Accepted => exit_code::SUCCESS,
        ValidationKind::AlreadyUsed => exit_code::CONFLICT,
        ValidationKind::NotFound | ValidationKind::Expired => exit_code::NOT_FOUND,
        ValidationKind::Unauthorized => exit_code::AUTH,
        ValidationKind::NetworkFailure => exit_code::CONNECTION,
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::SessionExpired { message } => CliError::SessionExpired {
                message,
                profile: "current".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::EventNotFound { identifier } => CliError::NotFound {
                resource_type: "event".into(),
                identifier,
                list_command: "attendance".into(),
            },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                list_command: format!("{entity_type}s"),
                resource_type: entity_type,
                identifier,
            },

            CoreError::EmptyToken => CliError::EmptyToken,

            CoreError::Camera(err) => CliError::from(err),

            CoreError::ScannerClosed => CliError::ApiError {
                code: "scanner_closed".into(),
                message: "scanner stopped unexpectedly".into(),
            },

            CoreError::Api {
                message,
                code,
                status,
            } => CliError::ApiError {
                code: code
                    .or_else(|| status.map(|s| s.to_string()))
                    .unwrap_or_default(),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

impl From<CameraError> for CliError {
    fn from(err: CameraError) -> Self {
        CliError::Camera {
            message: err.to_string(),
            remediation: err.remediation(),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Keyring(e) => CliError::Keyring(e.to_string()),
            ConfigError::Serialization(e) => CliError::Serialize(e.to_string()),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_map_to_distinct_codes() {
        assert_eq!(outcome_exit_code(ValidationKind::Accepted), 0);
        assert_eq!(outcome_exit_code(ValidationKind::AlreadyUsed), 6);
        assert_eq!(outcome_exit_code(ValidationKind::Expired), 4);
        assert_eq!(outcome_exit_code(ValidationKind::Unauthorized), 3);
        assert_eq!(outcome_exit_code(ValidationKind::NetworkFailure), 7);
    }

    #[test]
    fn session_expiry_is_an_auth_failure() {
        let err = CliError::from(CoreError::SessionExpired {
            message: "revoked".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn missing_credentials_keep_profile_name() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "door".into(),
        });
        assert!(matches!(err, CliError::NoCredentials { ref profile } if profile == "door"));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
