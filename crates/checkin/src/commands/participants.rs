//! Participant listing with search and kind filter.

use tabled::Tabled;

use checkin_core::{GuestStatus, Participant, ParticipantDetails, ParticipantFilter, ParticipantKind};

use crate::cli::{GlobalOpts, KindArg, ParticipantsArgs};
use crate::commands::{Context, refresh_board};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ParticipantRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Present")]
    present: String,
}

fn to_row(p: &Participant) -> ParticipantRow {
    ParticipantRow {
        name: p.full_name(),
        kind: p.kind().to_string(),
        email: p.email.clone().unwrap_or_default(),
        event: p.event_id.clone().unwrap_or_else(|| "-".into()),
        status: status_label(&p.details),
        present: match p.scanned_at {
            Some(at) if p.present => at.format("%H:%M").to_string(),
            _ if p.present => "yes".into(),
            _ => String::new(),
        },
    }
}

fn status_label(details: &ParticipantDetails) -> String {
    match details {
        ParticipantDetails::Holder { is_paid, .. } => {
            if *is_paid { "paid" } else { "unpaid" }.into()
        }
        ParticipantDetails::Guest { status, .. } => match status {
            GuestStatus::Pending => "pending",
            GuestStatus::Validated => "validated",
            GuestStatus::Refused => "refused",
            GuestStatus::Unknown => "-",
        }
        .into(),
    }
}

pub fn build_filter(args: ParticipantsArgs) -> ParticipantFilter {
    ParticipantFilter {
        event_id: args.event,
        kind: args.kind.map(|k| match k {
            KindArg::Holder => ParticipantKind::Holder,
            KindArg::Guest => ParticipantKind::Guest,
        }),
        search: args.search,
    }
}

pub async fn handle(
    ctx: &Context,
    args: ParticipantsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let filter = build_filter(args);
    refresh_board(ctx, filter.event_id.as_deref(), global).await?;

    let rows = ctx.console.board().participants(&filter);
    let out = output::render_list(global.output, &rows, to_row, |p| p.id.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_flag_maps_to_filter() {
        let filter = build_filter(ParticipantsArgs {
            event: Some("e1".into()),
            search: Some("ada".into()),
            kind: Some(KindArg::Guest),
        });
        assert_eq!(filter.kind, Some(ParticipantKind::Guest));
        assert_eq!(filter.event_id.as_deref(), Some("e1"));
        assert_eq!(filter.search.as_deref(), Some("ada"));
    }

    #[test]
    fn guest_status_is_readable() {
        let details = ParticipantDetails::Guest {
            referred_by: Some("Ada Lovelace".into()),
            status: GuestStatus::Refused,
        };
        assert_eq!(status_label(&details), "refused");
    }
}
