//! Per-event attendance.

use tabled::Tabled;

use checkin_core::{EventAttendanceRow, GlobalStats};

use crate::cli::{EventScopeArgs, GlobalOpts, OutputFormat};
use crate::commands::{Context, refresh_board};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct AttendanceRow {
    #[tabled(rename = "Event")]
    title: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Participants")]
    total: usize,
    #[tabled(rename = "Present")]
    present: usize,
    #[tabled(rename = "Awaiting")]
    awaiting: usize,
    #[tabled(rename = "Rate")]
    rate: String,
}

fn to_row(r: &EventAttendanceRow) -> AttendanceRow {
    AttendanceRow {
        title: r.title.clone(),
        id: r.attendance.event_id.clone(),
        total: r.attendance.total_participants,
        present: r.attendance.present_count,
        awaiting: r.attendance.awaiting_count,
        rate: output::percent(r.attendance.attendance_rate),
    }
}

fn detail(r: &EventAttendanceRow) -> String {
    output::detail_block(&[
        ("Event", r.title.clone()),
        ("ID", r.attendance.event_id.clone()),
        ("Participants", r.attendance.total_participants.to_string()),
        ("Present", r.attendance.present_count.to_string()),
        ("Awaiting", r.attendance.awaiting_count.to_string()),
        ("Attendance", output::percent(r.attendance.attendance_rate)),
    ])
}

pub async fn handle(
    ctx: &Context,
    args: &EventScopeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    refresh_board(ctx, args.event.as_deref(), global).await?;
    let out = render(ctx, args.event.as_deref(), global.output)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Render the current board contents. Also used by `watch`.
pub fn render(ctx: &Context, event: Option<&str>, format: OutputFormat) -> Result<String, CliError> {
    let rows = ctx.console.board().event_rows();

    match event {
        Some(event_id) => {
            let row = single_row(ctx, &rows, event_id)?;
            output::render_single(format, &row, detail, |r| {
                output::percent(r.attendance.attendance_rate)
            })
        }
        None => output::render_list(format, &rows, to_row, |r| r.attendance.event_id.clone()),
    }
}

/// An event with no participants is a valid zero row.
fn single_row(
    ctx: &Context,
    rows: &[EventAttendanceRow],
    event_id: &str,
) -> Result<EventAttendanceRow, CliError> {
    if let Some(row) = rows.iter().find(|r| r.attendance.event_id == event_id) {
        return Ok(row.clone());
    }
    let attendance = ctx
        .console
        .get_event_attendance(event_id)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "event".into(),
            identifier: event_id.into(),
            list_command: "attendance".into(),
        })?;
    Ok(EventAttendanceRow {
        title: event_id.to_owned(),
        attendance,
    })
}

/// One-line summary used in the scan console and `watch`.
pub fn summary_line(global: &GlobalStats) -> String {
    format!(
        "{} / {} present ({})",
        global.present_count,
        global.total_participants,
        output::percent(global.attendance_rate)
    )
}
