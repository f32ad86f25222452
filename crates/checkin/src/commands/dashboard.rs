//! Members, subscriptions and events summary.

use checkin_core::DashboardStats;

use crate::cli::GlobalOpts;
use crate::commands::Context;
use crate::error::CliError;
use crate::output;

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let stats = ctx.console.dashboard().await?;
    let out = output::render_single(global.output, &stats, detail, |s| s.members.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(s: &DashboardStats) -> String {
    output::detail_block(&[
        ("Members", s.members.to_string()),
        ("  active", s.active_subscriptions.to_string()),
        ("  inactive", s.inactive_subscriptions.to_string()),
        ("  expired", s.expired_subscriptions.to_string()),
        ("  conversion", output::percent(s.conversion_rate)),
        ("  churn", output::percent(s.churn_rate)),
        ("Bookings", s.total_bookings.to_string()),
        ("  per member", output::percent(s.booking_conversion_rate)),
        ("  per event", format!("{:.1}", s.average_bookings_per_event)),
        ("Events", s.total_events.to_string()),
        ("  upcoming", s.upcoming_events.to_string()),
        ("  past", s.past_events.to_string()),
        ("  cancelled", s.cancelled_events.to_string()),
        ("  online", s.online_events.to_string()),
    ])
}
