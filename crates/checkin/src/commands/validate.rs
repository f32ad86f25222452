//! One-shot ticket validation.

use checkin_core::{ValidationKind, ValidationOutcome};

use crate::cli::{GlobalOpts, ValidateArgs};
use crate::commands::Context;
use crate::error::CliError;
use crate::output;

pub async fn handle(ctx: &Context, args: &ValidateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let outcome = ctx.console.validate(&args.token).await?;
    let color = output::should_color(global.color);

    let out = output::render_single(
        global.output,
        &outcome,
        |o| outcome_detail(o, color),
        |o| o.kind.to_string(),
    )?;
    output::print_output(&out, global.quiet);

    match outcome.kind {
        ValidationKind::Accepted => Ok(()),
        ValidationKind::Unauthorized => Err(CliError::SessionExpired {
            message: outcome
                .message
                .unwrap_or_else(|| "backend rejected the operator token".into()),
            profile: ctx.profile.clone(),
        }),
        kind => Err(CliError::Rejected { kind }),
    }
}

/// Human-readable outcome block shared with the scan console.
pub fn outcome_detail(outcome: &ValidationOutcome, color: bool) -> String {
    let mut pairs = vec![("Result", output::outcome_label(outcome.kind, color))];
    if let Some(ref p) = outcome.participant {
        pairs.push(("Participant", p.name.clone()));
        pairs.push(("Event", p.event_title.clone()));
    }
    if let Some(at) = outcome.scanned_at {
        pairs.push(("First scan", at.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
    }
    if let Some(ref message) = outcome.message {
        pairs.push(("Message", message.clone()));
    }
    pairs.push(("Token", outcome.token.clone()));
    output::detail_block(&pairs)
}
