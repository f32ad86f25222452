//! Booking, guest and attendance totals.

use checkin_core::{GlobalStats, format_cents};

use crate::cli::{EventScopeArgs, GlobalOpts};
use crate::commands::{Context, refresh_board};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    ctx: &Context,
    args: &EventScopeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    refresh_board(ctx, args.event.as_deref(), global).await?;
    let stats = ctx.console.get_global_stats().unwrap_or_default();

    let out = output::render_single(
        global.output,
        &stats,
        |s| detail(s, &ctx.currency),
        |s| s.present_count.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(s: &GlobalStats, currency: &str) -> String {
    output::detail_block(&[
        ("Bookings", s.total_bookings.to_string()),
        ("  paid", s.paid_bookings.to_string()),
        ("  unpaid", s.unpaid_bookings.to_string()),
        ("  payment rate", output::percent(s.payment_rate)),
        ("Places", s.total_places.to_string()),
        ("Revenue", format_cents(s.total_revenue_cents, currency)),
        ("Guests", s.total_guests.to_string()),
        ("  validated", s.guests_validated.to_string()),
        ("  pending", s.guests_pending.to_string()),
        ("  refused", s.guests_refused.to_string()),
        ("Participants", s.total_participants.to_string()),
        ("  present", s.present_count.to_string()),
        ("  attendance", output::percent(s.attendance_rate)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revenue_uses_profile_currency() {
        let stats = GlobalStats {
            total_bookings: 2,
            total_revenue_cents: 4550,
            ..GlobalStats::default()
        };
        let text = detail(&stats, "CHF");
        assert!(text.contains("45.50 CHF"));
        assert!(text.contains("Bookings"));
    }
}
