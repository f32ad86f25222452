// ── Attendance aggregation ──
//
// Pure functions from the raw participant collections to derived
// statistics. Every refresh recomputes from scratch; nothing is patched
// incrementally. Money stays in integer cents until `format_cents`.

mod dashboard;
mod participant;
mod stats;

pub use dashboard::{DashboardStats, compute_dashboard};
pub use participant::{
    Participant, ParticipantDetails, ParticipantFilter, ParticipantKind, filter_participants,
    merge_participants,
};
pub use stats::{
    EventAttendance, EventAttendanceRow, GlobalStats, compute_event_attendance,
    compute_event_rows, compute_global_stats,
};

/// `part / whole` as a percentage; `0.0` when `whole` is zero.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn rate_percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// `numerator / denominator`; `0.0` when the denominator is zero.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Render integer minor units for display, e.g. `1234 -> "12.34 EUR"`.
pub fn format_cents(cents: u64, currency: &str) -> String {
    format!("{}.{:02} {currency}", cents / 100, cents % 100)
}
