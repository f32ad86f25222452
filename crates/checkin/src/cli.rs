//! Clap derive structures for the `checkin` CLI.
//!
//! Defines the command tree, global flags and shared value types.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// checkin -- event check-in console
#[derive(Debug, Parser)]
#[command(
    name = "checkin",
    version,
    about = "Scan tickets and follow event attendance from the terminal",
    long_about = "Operator console for event check-in.\n\n\
        Validates ticket tokens against the check-in backend, from a barcode\n\
        reader or typed by hand, and reports attendance statistics.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "CHECKIN_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend base URL (overrides profile)
    #[arg(long, short = 's', env = "CHECKIN_SERVER", global = true)]
    pub server: Option<String>,

    /// Operator API token
    #[arg(long, env = "CHECKIN_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CHECKIN_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "CHECKIN_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "CHECKIN_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Camera selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CameraArg {
    /// Rear camera
    Environment,
    /// Front camera
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Booking holders
    Holder,
    /// Invited guests
    Guest,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the interactive scanning console
    #[command(alias = "s")]
    Scan(ScanArgs),

    /// Validate a single ticket token
    #[command(alias = "v")]
    Validate(ValidateArgs),

    /// Show per-event attendance
    #[command(alias = "att")]
    Attendance(EventScopeArgs),

    /// Show booking, guest and attendance totals
    Stats(EventScopeArgs),

    /// List participants (holders and guests)
    #[command(alias = "ls")]
    Participants(ParticipantsArgs),

    /// Members, subscriptions and events summary
    Dashboard,

    /// Refresh attendance periodically and print each update
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Scanning ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Barcode reader device delivering one token per line
    #[arg(long)]
    pub device: Option<PathBuf>,

    /// Preferred camera
    #[arg(long, value_enum)]
    pub camera: Option<CameraArg>,

    /// How long a result stays shown before capture resumes (e.g. "3s")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub dwell: Option<Duration>,

    /// Do not ring the terminal bell on results
    #[arg(long)]
    pub no_bell: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Ticket token as printed or encoded in the QR code
    pub token: String,
}

// ── Statistics ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EventScopeArgs {
    /// Restrict to one event
    #[arg(long, short = 'e')]
    pub event: Option<String>,
}

#[derive(Debug, Args)]
pub struct ParticipantsArgs {
    /// Restrict to one event
    #[arg(long, short = 'e')]
    pub event: Option<String>,

    /// Case-insensitive match on name or email
    #[arg(long, short = 'f')]
    pub search: Option<String>,

    /// Only holders or only guests
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Restrict to one event
    #[arg(long, short = 'e')]
    pub event: Option<String>,

    /// Refresh interval (overrides profile, e.g. "30s")
    #[arg(long, short = 'i', value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Stop after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the current configuration (tokens redacted)
    Show,

    /// Print the configuration file path
    Path,

    /// Store the operator token for a profile in the system keyring
    SetToken {
        /// Read the token from stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },

    /// Set a profile value (e.g. `server https://api.example.org/`)
    Set {
        /// Key: server, api_token_env, ca_cert, insecure, timeout,
        /// scanner.dwell_secs, scanner.camera, scanner.history,
        /// scanner.device, scanner.bell, stats.refresh_interval_secs,
        /// stats.currency
        key: String,
        /// Value
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
