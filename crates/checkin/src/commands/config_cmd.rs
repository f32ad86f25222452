//! Config subcommand handlers.

use std::io::BufRead;
use std::path::PathBuf;

use checkin_config::{Config, Profile};
use checkin_core::CameraFacing;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, active_profile_name, available_profiles};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "server = \"{}\"", p.server);
        if p.api_token.is_some() {
            let _ = writeln!(out, "api_token = \"****\"");
        }
        if let Some(ref env) = p.api_token_env {
            let _ = writeln!(out, "api_token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }

        let s = &p.scanner;
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}.scanner]");
        let _ = writeln!(out, "dwell_secs = {}", s.dwell_secs);
        let _ = writeln!(out, "camera = \"{}\"", s.camera);
        let _ = writeln!(out, "history = {}", s.history);
        if let Some(ref device) = s.device {
            let _ = writeln!(out, "device = \"{}\"", device.display());
        }
        let _ = writeln!(out, "bell = {}", s.bell);

        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}.stats]");
        let _ = writeln!(
            out,
            "refresh_interval_secs = {}",
            p.stats.refresh_interval_secs
        );
        let _ = writeln!(out, "currency = \"{}\"", p.stats.currency);
    }

    out
}

fn invalid(key: &str, reason: impl Into<String>) -> CliError {
    CliError::Validation {
        field: key.into(),
        reason: reason.into(),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CliError> {
    value
        .parse()
        .map_err(|_| invalid(key, format!("expected a number, got '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CliError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, format!("expected true or false, got '{value}'"))),
    }
}

/// `None` for an empty value, so `set scanner.device ""` clears it.
fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

/// Apply one `key = value` assignment to a profile.
fn apply_setting(profile: &mut Profile, key: &str, value: &str) -> Result<(), CliError> {
    match key {
        "server" => {
            checkin_config::parse_server(value)?;
            profile.server = value.to_owned();
        }
        "api_token_env" => profile.api_token_env = optional(value),
        "ca_cert" => profile.ca_cert = optional(value).map(PathBuf::from),
        "insecure" => profile.insecure = Some(parse_bool(key, value)?),
        "timeout" => profile.timeout = Some(parse_num(key, value)?),
        "scanner.dwell_secs" => profile.scanner.dwell_secs = parse_num(key, value)?,
        "scanner.camera" => {
            profile.scanner.camera = value
                .parse::<CameraFacing>()
                .map_err(|_| invalid(key, "expected 'environment' or 'user'"))?;
        }
        "scanner.history" => {
            let history: usize = parse_num(key, value)?;
            if history == 0 {
                return Err(invalid(key, "must be at least 1"));
            }
            profile.scanner.history = history;
        }
        "scanner.device" => profile.scanner.device = optional(value).map(PathBuf::from),
        "scanner.bell" => profile.scanner.bell = parse_bool(key, value)?,
        "stats.refresh_interval_secs" => {
            profile.stats.refresh_interval_secs = parse_num(key, value)?;
        }
        "stats.currency" => {
            if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(invalid(key, "expected a three-letter currency code"));
            }
            profile.stats.currency = value.to_ascii_uppercase();
        }
        "api_token" => {
            return Err(invalid(
                key,
                "tokens are not written in plain text; use: checkin config set-token",
            ));
        }
        other => return Err(invalid("key", format!("unknown setting '{other}'"))),
    }
    Ok(())
}

fn read_token(from_stdin: bool) -> Result<String, CliError> {
    let token = if from_stdin {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        line
    } else {
        rpassword::prompt_password("Operator token: ")?
    };
    let token = token.trim().to_owned();
    if token.is_empty() {
        return Err(invalid("token", "cannot be empty"));
    }
    Ok(token)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            output::print_output(format_config_redacted(&cfg).trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let active = active_profile_name(global, &cfg);
            let mut names: Vec<&String> = cfg.profiles.keys().collect();
            names.sort();
            let lines: Vec<String> = names
                .into_iter()
                .map(|name| {
                    let marker = if *name == active { "*" } else { " " };
                    format!("{marker} {name}  {}", cfg.profiles[name].server)
                })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            output::print_output(&format!("Default profile is now '{name}'"), global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config()?;
            let name = active_profile_name(global, &cfg);

            if !cfg.profiles.contains_key(&name) {
                // A new profile starts from its server URL.
                if key != "server" {
                    return Err(CliError::ProfileNotFound {
                        available: available_profiles(&cfg),
                        name,
                    });
                }
                checkin_config::parse_server(&value)?;
                cfg.profiles.insert(name.clone(), Profile::new(value.clone()));
            }
            if let Some(profile) = cfg.profiles.get_mut(&name) {
                apply_setting(profile, &key, &value)?;
            }

            config::save_config(&cfg)?;
            output::print_output(&format!("Set {key} for profile '{name}'"), global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { stdin } => {
            let cfg = config::load_config()?;
            let name = active_profile_name(global, &cfg);
            let token = read_token(stdin)?;
            checkin_config::store_token(&name, &token)?;
            output::print_output(
                &format!("Stored token for profile '{name}' in the system keyring"),
                global.quiet,
            );
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn settings_update_nested_sections() {
        let mut profile = Profile::new("https://api.example.org/");
        apply_setting(&mut profile, "scanner.dwell_secs", "5").unwrap();
        apply_setting(&mut profile, "scanner.camera", "user").unwrap();
        apply_setting(&mut profile, "scanner.bell", "off").unwrap();
        apply_setting(&mut profile, "stats.currency", "chf").unwrap();

        assert_eq!(profile.scanner.dwell_secs, 5);
        assert_eq!(profile.scanner.camera, CameraFacing::User);
        assert!(!profile.scanner.bell);
        assert_eq!(profile.stats.currency, "CHF");
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut profile = Profile::new("https://api.example.org/");
        assert!(apply_setting(&mut profile, "server", "not a url").is_err());
        assert!(apply_setting(&mut profile, "timeout", "soon").is_err());
        assert!(apply_setting(&mut profile, "scanner.history", "0").is_err());
        assert!(apply_setting(&mut profile, "api_token", "secret").is_err());
        assert!(apply_setting(&mut profile, "colour", "red").is_err());
        assert_eq!(profile.server, "https://api.example.org/");
    }

    #[test]
    fn empty_value_clears_optional_paths() {
        let mut profile = Profile::new("https://api.example.org/");
        apply_setting(&mut profile, "scanner.device", "/dev/hidraw0").unwrap();
        apply_setting(&mut profile, "scanner.device", "").unwrap();
        assert!(profile.scanner.device.is_none());
    }

    #[test]
    fn redacted_view_hides_tokens() {
        let mut cfg = Config::default();
        let mut profile = Profile::new("https://api.example.org/");
        profile.api_token = Some("super-secret".into());
        cfg.profiles.insert("gala".into(), profile);

        let text = format_config_redacted(&cfg);
        assert!(text.contains("api_token = \"****\""));
        assert!(!text.contains("super-secret"));
        assert!(text.contains("[profiles.gala.scanner]"));
    }
}
