//! Shared configuration for the check-in console.
//!
//! TOML profiles, bearer token resolution (env + keyring + plaintext),
//! and translation to `checkin_core::ConsoleConfig`. The CLI adds
//! `GlobalOpts`-aware overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use checkin_core::{CameraFacing, ConsoleConfig, ScannerSettings, TlsVerification};

const KEYRING_SERVICE: &str = "checkin";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring unavailable: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named backend profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Backend base URL (e.g., "https://api.example.org/admin/").
    pub server: String,

    /// Operator API token (plaintext; prefer keyring or env var).
    pub api_token: Option<String>,

    /// Environment variable name containing the API token.
    pub api_token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    #[serde(default)]
    pub scanner: ScannerSection,

    #[serde(default)]
    pub stats: StatsSection,
}

impl Profile {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            api_token: None,
            api_token_env: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            scanner: ScannerSection::default(),
            stats: StatsSection::default(),
        }
    }
}

/// `[profiles.<name>.scanner]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScannerSection {
    /// Seconds a result stays displayed before capture resumes.
    #[serde(default = "default_dwell")]
    pub dwell_secs: u64,

    #[serde(default)]
    pub camera: CameraFacing,

    /// Recent scans kept for scan statistics.
    #[serde(default = "default_history")]
    pub history: usize,

    /// Line-oriented reader (USB/HID scanner). No camera capture when
    /// unset; manual entry still works.
    pub device: Option<PathBuf>,

    #[serde(default = "default_bell")]
    pub bell: bool,
}

impl Default for ScannerSection {
    fn default() -> Self {
        Self {
            dwell_secs: default_dwell(),
            camera: CameraFacing::default(),
            history: default_history(),
            device: None,
            bell: default_bell(),
        }
    }
}

fn default_dwell() -> u64 {
    3
}
fn default_history() -> usize {
    50
}
fn default_bell() -> bool {
    true
}

/// `[profiles.<name>.stats]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatsSection {
    /// Seconds between statistics refreshes; 0 disables.
    #[serde(default = "default_refresh")]
    pub refresh_interval_secs: u64,

    /// ISO currency code used when displaying amounts.
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for StatsSection {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh(),
            currency: default_currency(),
        }
    }
}

fn default_refresh() -> u64 {
    30
}
fn default_currency() -> String {
    "EUR".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "checkin", "checkin").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("checkin");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
///
/// `CHECKIN_` variables override file values; nested keys use a double
/// underscore (`CHECKIN_DEFAULTS__TIMEOUT=60`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CHECKIN_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/api-token"))
}

/// Resolve the operator token: `api_token_env`, then the system
/// keyring, then the plaintext `api_token`.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's api_token_env → env var lookup
    if let Some(ref env_name) = profile.api_token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.api_token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(token)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Scanner settings from a profile section.
pub fn scanner_settings(section: &ScannerSection) -> ScannerSettings {
    ScannerSettings {
        dwell: Duration::from_secs(section.dwell_secs),
        facing: section.camera,
        history_capacity: section.history.max(1),
        device: section.device.clone(),
        bell: section.bell,
    }
}

/// TLS strategy for a profile. `insecure` wins over `ca_cert`.
pub fn tls_verification(profile: &Profile, force_insecure: bool) -> TlsVerification {
    if force_insecure || profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

pub fn parse_server(server: &str) -> Result<url::Url, ConfigError> {
    server.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {server}"),
    })
}

/// Build a `ConsoleConfig` from a profile, no CLI flag overrides.
pub fn profile_to_console_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ConsoleConfig, ConfigError> {
    let url = parse_server(&profile.server)?;
    let token = resolve_token(profile, profile_name)?;

    let mut config = ConsoleConfig::new(url, token);
    config.tls = tls_verification(profile, false);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(default_timeout()));
    config.refresh_interval = Duration::from_secs(profile.stats.refresh_interval_secs);
    config.scanner = scanner_settings(&profile.scanner);
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "gala"

[defaults]
output = "json"
timeout = 45

[profiles.gala]
server = "https://api.example.org/admin/"
api_token = "plain-token"
timeout = 20

[profiles.gala.scanner]
dwell_secs = 5
camera = "user"
device = "/dev/hidraw0"
bell = false

[profiles.gala.stats]
refresh_interval_secs = 0
currency = "CHF"

[profiles.door]
server = "https://door.example.org/"
"#;

    fn write_sample() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.output, "table");
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profiles_and_sections_parse() {
        let (_dir, path) = write_sample();
        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg.default_profile.as_deref(), Some("gala"));
        assert_eq!(cfg.defaults.timeout, 45);

        let gala = &cfg.profiles["gala"];
        assert_eq!(gala.scanner.dwell_secs, 5);
        assert_eq!(gala.scanner.camera, CameraFacing::User);
        assert!(!gala.scanner.bell);
        assert_eq!(gala.stats.currency, "CHF");

        let door = &cfg.profiles["door"];
        assert_eq!(door.scanner, ScannerSection::default());
        assert_eq!(door.stats, StatsSection::default());
    }

    #[test]
    fn profile_translates_to_console_config() {
        let (_dir, path) = write_sample();
        let cfg = load_config_from(&path).unwrap();
        let console = profile_to_console_config(&cfg.profiles["gala"], "gala-test-only").unwrap();

        assert_eq!(console.url.as_str(), "https://api.example.org/admin/");
        assert_eq!(console.token.expose_secret(), "plain-token");
        assert_eq!(console.timeout, Duration::from_secs(20));
        assert!(console.refresh_interval.is_zero());
        assert_eq!(console.scanner.dwell, Duration::from_secs(5));
        assert_eq!(console.scanner.device, Some(PathBuf::from("/dev/hidraw0")));
        assert_eq!(console.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn missing_token_is_reported_per_profile() {
        let profile = Profile::new("https://door.example.org/");
        let err = resolve_token(&profile, "door-test-only").unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { profile } if profile == "door-test-only"));
    }

    #[test]
    fn invalid_server_is_a_validation_error() {
        let mut profile = Profile::new("not a url");
        profile.api_token = Some("t".into());
        let err = profile_to_console_config(&profile, "broken-test-only").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "server"));
    }

    #[test]
    fn insecure_wins_over_custom_ca() {
        let mut profile = Profile::new("https://x.example.org/");
        profile.ca_cert = Some(PathBuf::from("/etc/ca.pem"));
        assert_eq!(
            tls_verification(&profile, false),
            TlsVerification::CustomCa(PathBuf::from("/etc/ca.pem"))
        );
        assert_eq!(
            tls_verification(&profile, true),
            TlsVerification::DangerAcceptInvalid
        );
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles
            .insert("main".into(), Profile::new("https://api.example.org/"));

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["main"].server, "https://api.example.org/");
        assert_eq!(loaded.profiles["main"].scanner.history, 50);
    }
}
