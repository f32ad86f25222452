// ── Runtime console configuration ──
//
// These types describe how to reach the check-in backend and how the
// scanner behaves. They carry credential data but never touch disk:
// the CLI builds a `ConsoleConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::capture::CameraFacing;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default: the backend is a public service.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (staging backends with self-signed certs).
    DangerAcceptInvalid,
}

/// Scanner tuning.
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    /// How long a result stays on screen before capture resumes.
    pub dwell: Duration,
    /// Preferred camera.
    pub facing: CameraFacing,
    /// Capacity of the recent-scan history behind scan statistics.
    pub history_capacity: usize,
    /// Line-oriented reader device (USB/HID scanner), if any.
    pub device: Option<PathBuf>,
    /// Pulse the terminal bell on outcomes.
    pub bell: bool,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            dwell: Duration::from_secs(3),
            facing: CameraFacing::Environment,
            history_capacity: 50,
            device: None,
            bell: true,
        }
    }
}

/// Configuration for one check-in console session.
///
/// Built by the CLI, passed to [`Console`](crate::Console).
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Backend base URL (e.g., `https://api.example.org/admin/`).
    pub url: Url,
    /// Operator bearer token.
    pub token: SecretString,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout. Also the only deadline on a validation call.
    pub timeout: Duration,
    /// Statistics refresh interval. Zero disables periodic refresh.
    pub refresh_interval: Duration,
    /// Scanner tuning.
    pub scanner: ScannerSettings,
}

impl ConsoleConfig {
    pub fn new(url: Url, token: SecretString) -> Self {
        Self {
            url,
            token,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(30),
            scanner: ScannerSettings::default(),
        }
    }
}
