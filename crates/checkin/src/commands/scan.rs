//! Interactive scanning console.
//!
//! A barcode reader (if configured) feeds the scanner; stdin carries
//! manual tokens and `:` commands. Results are printed as they arrive.

use std::time::Duration;

use owo_colors::OwoColorize;
use tabled::Tabled;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use checkin_core::{
    CameraError, CameraFacing, CoreError, ScanNotice, ScanRecord, ScanStats, ScannerHandle,
    ScannerSettings, ValidationOutcome,
};

use crate::cli::{CameraArg, GlobalOpts, OutputFormat, ScanArgs};
use crate::commands::Context;
use crate::error::CliError;
use crate::output;

const HELP: &str = "Type a ticket code and press Enter to validate it.\n\
    Commands: :start  :stop  :ack  :stats  :help  :quit";

// ── Console input ────────────────────────────────────────────────────

/// One line typed at the console.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput<'a> {
    Blank,
    Start,
    Stop,
    Ack,
    Stats,
    Help,
    Quit,
    Token(&'a str),
    Unknown(&'a str),
}

pub fn parse_console_line(line: &str) -> ConsoleInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleInput::Blank;
    }
    let Some(command) = line.strip_prefix(':') else {
        return ConsoleInput::Token(line);
    };
    match command.trim().to_ascii_lowercase().as_str() {
        "start" | "s" => ConsoleInput::Start,
        "stop" | "x" => ConsoleInput::Stop,
        "ack" | "a" | "ok" => ConsoleInput::Ack,
        "stats" | "st" => ConsoleInput::Stats,
        "help" | "h" | "?" => ConsoleInput::Help,
        "quit" | "q" | "exit" => ConsoleInput::Quit,
        _ => ConsoleInput::Unknown(line),
    }
}

/// Profile scanner settings with command-line overrides applied.
pub fn session_settings(base: &ScannerSettings, args: &ScanArgs) -> ScannerSettings {
    let mut settings = base.clone();
    if let Some(ref device) = args.device {
        settings.device = Some(device.clone());
    }
    if let Some(camera) = args.camera {
        settings.facing = match camera {
            CameraArg::Environment => CameraFacing::Environment,
            CameraArg::User => CameraFacing::User,
        };
    }
    if let Some(dwell) = args.dwell {
        settings.dwell = dwell;
    }
    if args.no_bell {
        settings.bell = false;
    }
    settings
}

// ── Printer ──────────────────────────────────────────────────────────

struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Printer {
    /// Operator chatter goes to stderr so stdout stays machine-readable.
    fn info(&self, text: &str) {
        if !self.quiet {
            eprintln!("{text}");
        }
    }

    fn warn(&self, text: &str) {
        if self.color {
            eprintln!("{}", text.yellow());
        } else {
            eprintln!("{text}");
        }
    }

    fn outcome(&self, outcome: &ValidationOutcome) -> Result<(), CliError> {
        let text = match self.format {
            OutputFormat::Table => outcome_line(outcome, self.color),
            OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(outcome)?,
            OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(outcome)?),
            OutputFormat::Plain => outcome.kind.to_string(),
        };
        output::print_output(&text, self.quiet);
        Ok(())
    }

    fn camera_failed(&self, err: &CameraError) {
        self.warn(&format!("{err}. {}", err.remediation()));
    }

    fn stats(&self, stats: &ScanStats) -> Result<(), CliError> {
        let text = match self.format {
            OutputFormat::Table => stats_block(stats),
            other => output::render_single(other, stats, stats_block, |s| s.total_scans.to_string())?,
        };
        output::print_output(&text, false);
        Ok(())
    }
}

fn outcome_line(outcome: &ValidationOutcome, color: bool) -> String {
    let mut line = format!(
        "{}  {}",
        outcome.completed_at.format("%H:%M:%S"),
        output::outcome_label(outcome.kind, color)
    );
    if let Some(ref p) = outcome.participant {
        line.push_str(&format!("  {} ({})", p.name, p.event_title));
    }
    if let Some(at) = outcome.scanned_at {
        line.push_str(&format!("  first scanned {}", at.format("%H:%M")));
    }
    if let Some(ref message) = outcome.message {
        line.push_str(&format!("  {message}"));
    }
    line
}

#[derive(Tabled)]
struct RecentRow {
    #[tabled(rename = "Time")]
    at: String,
    #[tabled(rename = "Result")]
    kind: String,
    #[tabled(rename = "Participant")]
    participant: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Via")]
    origin: String,
}

fn recent_row(r: &ScanRecord) -> RecentRow {
    RecentRow {
        at: r.at.format("%H:%M:%S").to_string(),
        kind: r.kind.to_string(),
        participant: r.participant.clone().unwrap_or_default(),
        event: r.event_title.clone().unwrap_or_default(),
        origin: r.origin.to_string(),
    }
}

fn stats_block(stats: &ScanStats) -> String {
    let mut text = output::detail_block(&[
        ("Scans", stats.total_scans.to_string()),
        ("  successful", stats.successful.to_string()),
        ("  failed", stats.failed.to_string()),
        ("  duplicates", stats.duplicates.to_string()),
        ("  success rate", output::percent(stats.success_rate())),
        ("Today", stats.today.to_string()),
    ]);
    if !stats.scans_per_hour.is_empty() {
        let hours: Vec<String> = stats
            .scans_per_hour
            .iter()
            .map(|(hour, n)| format!("{hour:02}h:{n}"))
            .collect();
        text.push_str(&format!("\nPer hour      {}", hours.join(" ")));
    }
    if !stats.recent.is_empty() {
        let rows: Vec<RecentRow> = stats.recent.iter().map(recent_row).collect();
        text.push('\n');
        text.push_str(
            &tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string(),
        );
    }
    text
}

// ── Console loop ─────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: &ScanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let settings = session_settings(&ctx.console.config().scanner, args);
    let scanner = ctx.console.line_scanner(Some(&settings));
    let printer = Printer {
        format: global.output,
        color: output::should_color(global.color),
        quiet: global.quiet,
    };

    let result = run_console(ctx, &scanner, &settings, &printer).await;
    scanner.shutdown().await;
    result
}

async fn run_console(
    ctx: &Context,
    scanner: &ScannerHandle,
    settings: &ScannerSettings,
    printer: &Printer,
) -> Result<(), CliError> {
    let mut notices = scanner.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    printer.info(HELP);
    if let Some(ref device) = settings.device {
        printer.info(&format!("Reading codes from {}", device.display()));
        scanner.start_scanning()?;
    }

    // With a reader attached the console keeps running after stdin
    // closes; otherwise EOF ends it once manual submissions are answered.
    let reader_attached = settings.device.is_some();
    let mut pending = 0usize;
    let mut stdin_open = true;
    let drain_limit = ctx.console.config().timeout + Duration::from_secs(1);
    let mut drain_deadline = Instant::now();

    loop {
        if !stdin_open && !reader_attached && pending == 0 {
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => return Ok(()),
            notice = notices.recv() => match notice {
                Ok(ScanNotice::Outcome(outcome)) => {
                    pending = pending.saturating_sub(1);
                    printer.outcome(&outcome)?;
                }
                Ok(ScanNotice::SessionExpired) => {
                    return Err(CliError::SessionExpired {
                        message: "backend rejected the operator token; scanning stopped".into(),
                        profile: ctx.profile.clone(),
                    });
                }
                Ok(ScanNotice::CameraFailed(err)) => printer.camera_failed(&err),
                Ok(ScanNotice::CaptureEnded) => {
                    printer.warn("Reader disconnected. Type :start to reconnect.");
                }
                Ok(ScanNotice::CaptureFault(message)) => {
                    printer.warn(&format!("Reader error: {message}. Type :start to retry."));
                }
                Ok(ScanNotice::Busy) => {
                    pending = pending.saturating_sub(1);
                    printer.warn("Still validating the previous ticket; enter it again afterwards.");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "scanner notices lagged");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => match parse_console_line(&line) {
                    ConsoleInput::Quit => return Ok(()),
                    ConsoleInput::Blank => {}
                    ConsoleInput::Help => printer.info(HELP),
                    ConsoleInput::Start => scanner.start_scanning()?,
                    ConsoleInput::Stop => scanner.stop_scanning()?,
                    ConsoleInput::Ack => scanner.acknowledge()?,
                    ConsoleInput::Stats => printer.stats(&scanner.scan_stats())?,
                    ConsoleInput::Unknown(cmd) => {
                        printer.warn(&format!("Unknown command {cmd}. Type :help."));
                    }
                    ConsoleInput::Token(token) => match scanner.submit_manual_token(token) {
                        Ok(()) => pending += 1,
                        Err(CoreError::EmptyToken) => {
                            printer.warn("Nothing to validate: the code is empty.");
                        }
                        Err(e) => return Err(e.into()),
                    },
                },
                None => {
                    stdin_open = false;
                    drain_deadline = Instant::now() + drain_limit;
                }
            },
            () = tokio::time::sleep_until(drain_deadline), if !stdin_open && !reader_attached => {
                tracing::warn!(pending, "gave up waiting for pending validations");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn bare_lines_are_tokens() {
        assert_eq!(parse_console_line("  abc-123 \n"), ConsoleInput::Token("abc-123"));
        assert_eq!(parse_console_line("   "), ConsoleInput::Blank);
    }

    #[test]
    fn colon_commands_are_recognized() {
        assert_eq!(parse_console_line(":start"), ConsoleInput::Start);
        assert_eq!(parse_console_line(":STOP"), ConsoleInput::Stop);
        assert_eq!(parse_console_line(":ack"), ConsoleInput::Ack);
        assert_eq!(parse_console_line(":stats"), ConsoleInput::Stats);
        assert_eq!(parse_console_line(": q"), ConsoleInput::Quit);
        assert_eq!(parse_console_line(":dance"), ConsoleInput::Unknown(":dance"));
    }

    #[test]
    fn flags_override_profile_scanner_settings() {
        let args = ScanArgs {
            device: Some(PathBuf::from("/dev/hidraw1")),
            camera: Some(CameraArg::User),
            dwell: Some(Duration::from_secs(5)),
            no_bell: true,
        };
        let settings = session_settings(&ScannerSettings::default(), &args);
        assert_eq!(settings.device, Some(PathBuf::from("/dev/hidraw1")));
        assert_eq!(settings.facing, CameraFacing::User);
        assert_eq!(settings.dwell, Duration::from_secs(5));
        assert!(!settings.bell);
        assert_eq!(settings.history_capacity, 50);
    }

    #[test]
    fn absent_flags_keep_profile_values() {
        let args = ScanArgs {
            device: None,
            camera: None,
            dwell: None,
            no_bell: false,
        };
        let base = ScannerSettings {
            dwell: Duration::from_secs(7),
            ..ScannerSettings::default()
        };
        let settings = session_settings(&base, &args);
        assert_eq!(settings.dwell, Duration::from_secs(7));
        assert!(settings.bell);
        assert!(settings.device.is_none());
    }

    #[test]
    fn empty_stats_render_without_tables() {
        let text = stats_block(&ScanStats::default());
        assert!(text.contains("Scans"));
        assert!(!text.contains("Participant"));
    }
}
