//! Command handlers, one module per subcommand.

pub mod attendance;
pub mod config_cmd;
pub mod dashboard;
pub mod participants;
pub mod scan;
pub mod stats;
pub mod validate;
pub mod watch;

use indicatif::{ProgressBar, ProgressStyle};

use checkin_core::Console;

use crate::cli::{Command, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Shared state for commands that talk to the backend.
pub struct Context {
    pub console: Console,
    pub profile: String,
    /// Currency code for amounts.
    pub currency: String,
}

pub async fn dispatch(cmd: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Scan(args) => scan::handle(ctx, &args, global).await,
        Command::Validate(args) => validate::handle(ctx, &args, global).await,
        Command::Attendance(args) => attendance::handle(ctx, &args, global).await,
        Command::Stats(args) => stats::handle(ctx, &args, global).await,
        Command::Participants(args) => participants::handle(ctx, args, global).await,
        Command::Dashboard => dashboard::handle(ctx, global).await,
        Command::Watch(args) => watch::handle(ctx, &args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "handled before connecting".into(),
        }),
    }
}

/// Refresh the attendance board once, with a spinner on interactive
/// table output.
pub async fn refresh_board(
    ctx: &Context,
    event: Option<&str>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let spinner = (global.output == OutputFormat::Table && !global.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Loading participants...");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    });

    let result = ctx.console.refresh(event).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    result?;
    Ok(())
}
