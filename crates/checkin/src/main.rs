mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use checkin_core::Console;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a backend connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "checkin", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = config::load_config()?;
            let resolved = config::resolve(&cli.global, &cfg)?;
            let ctx = commands::Context {
                console: Console::new(resolved.console)?,
                profile: resolved.profile_name,
                currency: resolved.currency,
            };

            tracing::debug!(command = ?cmd, profile = %ctx.profile, "dispatching command");
            let result = commands::dispatch(cmd, &ctx, &cli.global).await;
            ctx.console.shutdown().await;
            result.map_err(|err| with_profile(err, &ctx.profile))
        }
    }
}

/// Name the active profile in session-expiry guidance.
fn with_profile(err: CliError, profile: &str) -> CliError {
    match err {
        CliError::SessionExpired { message, .. } => CliError::SessionExpired {
            message,
            profile: profile.to_owned(),
        },
        other => other,
    }
}
