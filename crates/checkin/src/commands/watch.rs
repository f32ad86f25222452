//! Periodic attendance refresh, printing each completed update.

use std::time::Duration;

use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use checkin_core::RefreshStatus;

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::commands::{Context, attendance};
use crate::error::CliError;
use crate::output;

pub async fn handle(ctx: &Context, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let every = args
        .interval
        .unwrap_or(ctx.console.config().refresh_interval);
    if every.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "periodic refresh is disabled for this profile; pass --interval".into(),
        });
    }

    let board = ctx.console.board();
    let mut status_rx = board.watch_status();
    let cancel = CancellationToken::new();
    let task = board.spawn_periodic(args.event.clone(), every, cancel.clone());
    let color = output::should_color(global.color);

    let mut updates = 0usize;
    let result = loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break Ok(()),
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let status = status_rx.borrow_and_update().clone();
                if status.refreshing {
                    continue;
                }
                if let Err(err) = print_update(ctx, args, global, &status, every, color) {
                    break Err(err);
                }
                updates += 1;
                if args.count.is_some_and(|n| updates >= n) {
                    break Ok(());
                }
            }
        }
    };

    cancel.cancel();
    let _ = task.await;
    result
}

fn print_update(
    ctx: &Context,
    args: &WatchArgs,
    global: &GlobalOpts,
    status: &RefreshStatus,
    every: Duration,
    color: bool,
) -> Result<(), CliError> {
    if let Some(ref error) = status.last_error {
        let line = format!("refresh failed, showing previous figures: {error}");
        if color {
            eprintln!("{}", line.yellow());
        } else {
            eprintln!("{line}");
        }
    }

    let Some(at) = status.last_success else {
        return Ok(());
    };

    if global.output == OutputFormat::Table && !global.quiet {
        let stats = ctx.console.get_global_stats().unwrap_or_default();
        let header = format!(
            "{}  {}  (every {})",
            at.format("%H:%M:%S"),
            attendance::summary_line(&stats),
            humantime::format_duration(every)
        );
        if color {
            println!("{}", header.bold());
        } else {
            println!("{header}");
        }
    }

    let out = attendance::render(ctx, args.event.as_deref(), global.output)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
