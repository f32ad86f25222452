//! CLI-side configuration: profile selection and `GlobalOpts` overrides
//! on top of `checkin-config`.
//!
//! This is the single boundary where CLI flags cross into core types.

use std::time::Duration;

use secrecy::SecretString;

use checkin_config::{Config, Profile, StatsSection};
use checkin_core::{ConsoleConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use checkin_config::{config_path, load_config, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Everything a connected command needs besides the console itself.
#[derive(Debug)]
pub struct Resolved {
    pub console: ConsoleConfig,
    pub profile_name: String,
    pub currency: String,
}

/// Build a `ConsoleConfig` from the config file, active profile and CLI
/// overrides.
///
/// Without a matching profile, `--server` and `--token` alone suffice.
pub fn resolve(global: &GlobalOpts, cfg: &Config) -> Result<Resolved, CliError> {
    let profile_name = active_profile_name(global, cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        let console = resolve_profile(profile, &profile_name, global, cfg.defaults.timeout)?;
        return Ok(Resolved {
            console,
            profile_name,
            currency: profile.stats.currency.clone(),
        });
    }

    // A profile asked for by name must exist.
    if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(cfg),
        });
    }

    let server = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = checkin_config::parse_server(server)?;

    let token = global
        .token
        .as_ref()
        .map(|t| SecretString::from(t.clone()))
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.clone(),
        })?;

    let mut console = ConsoleConfig::new(url, token);
    console.tls = if global.insecure || cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };
    console.timeout = Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout));

    Ok(Resolved {
        console,
        profile_name,
        currency: StatsSection::default().currency,
    })
}

/// Translate a profile plus global flags into a `ConsoleConfig`.
fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
    default_timeout: u64,
) -> Result<ConsoleConfig, CliError> {
    // 1. Server URL (flag > env > profile)
    let server = global.server.as_deref().unwrap_or(&profile.server);
    let url = checkin_config::parse_server(server)?;

    // 2. Token (flag > profile chain)
    let token = match global.token {
        Some(ref token) => SecretString::from(token.clone()),
        None => checkin_config::resolve_token(profile, profile_name)?,
    };

    let mut console = ConsoleConfig::new(url, token);

    // 3. TLS
    console.tls = checkin_config::tls_verification(profile, global.insecure);

    // 4. Timeout (flag > profile > defaults)
    let secs = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(default_timeout);
    console.timeout = Duration::from_secs(secs);

    // 5. Scanner and statistics sections
    console.refresh_interval = Duration::from_secs(profile.stats.refresh_interval_secs);
    console.scanner = checkin_config::scanner_settings(&profile.scanner);

    Ok(console)
}

pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["checkin"];
        argv.extend_from_slice(args);
        argv.push("dashboard");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with(name: &str, mut profile: Profile) -> Config {
        profile.api_token = Some("from-profile".into());
        let mut cfg = Config::default();
        cfg.default_profile = Some(name.into());
        cfg.profiles.insert(name.into(), profile);
        cfg
    }

    #[test]
    fn flags_override_profile_values() {
        let mut profile = Profile::new("https://api.example.org/");
        profile.timeout = Some(12);
        let cfg = config_with("gala-cli-test", profile);

        let resolved = resolve(
            &global(&["--server", "https://staging.example.org/", "--timeout", "3", "-k"]),
            &cfg,
        )
        .unwrap();

        assert_eq!(resolved.console.url.as_str(), "https://staging.example.org/");
        assert_eq!(resolved.console.timeout, Duration::from_secs(3));
        assert_eq!(resolved.console.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(resolved.console.token.expose_secret(), "from-profile");
        assert_eq!(resolved.currency, "EUR");
    }

    #[test]
    fn profile_timeout_beats_defaults() {
        let mut profile = Profile::new("https://api.example.org/");
        profile.timeout = Some(12);
        let cfg = config_with("gala-cli-test", profile);

        let resolved = resolve(&global(&[]), &cfg).unwrap();
        assert_eq!(resolved.console.timeout, Duration::from_secs(12));
        assert_eq!(resolved.profile_name, "gala-cli-test");
    }

    #[test]
    fn flags_alone_build_a_console() {
        let cfg = Config::default();
        let resolved = resolve(
            &global(&["--server", "https://api.example.org/", "--token", "t0k"]),
            &cfg,
        )
        .unwrap();
        assert_eq!(resolved.console.token.expose_secret(), "t0k");
        assert_eq!(resolved.console.timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_server_points_at_config_file() {
        let err = resolve(&global(&[]), &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn unknown_named_profile_lists_available_ones() {
        let cfg = config_with("gala", Profile::new("https://api.example.org/"));
        let err = resolve(&global(&["--profile", "door"]), &cfg).unwrap_err();
        match err {
            CliError::ProfileNotFound { name, available } => {
                assert_eq!(name, "door");
                assert_eq!(available, "gala");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
