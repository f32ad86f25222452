use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumString};

use checkin_api::{BookingRecord, GuestRecord, GuestStatus, PresenceStatus};

/// The two participant kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ParticipantKind {
    Holder,
    Guest,
}

/// Kind-specific attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParticipantDetails {
    #[serde(rename_all = "camelCase")]
    Holder {
        association: Option<String>,
        is_paid: bool,
        /// Belongs to the booking; counted once per booking.
        total_places: u32,
        /// Belongs to the booking; counted once per booking.
        total_price_cents: u64,
        booking_status: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Guest {
        /// Display name of the inviting holder. Not an ownership link.
        referred_by: Option<String>,
        status: GuestStatus,
    },
}

/// One row of the unified participant view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub booking_id: String,
    pub event_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub present: bool,
    pub scanned_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: ParticipantDetails,
}

impl Participant {
    pub fn kind(&self) -> ParticipantKind {
        match self.details {
            ParticipantDetails::Holder { .. } => ParticipantKind::Holder,
            ParticipantDetails::Guest { .. } => ParticipantKind::Guest,
        }
    }

    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }

    pub fn in_event(&self, event_id: &str) -> bool {
        self.event_id.as_deref() == Some(event_id)
    }
}

fn full_name(first: &str, last: &str) -> String {
    match (first.is_empty(), last.is_empty()) {
        (false, false) => format!("{first} {last}"),
        (false, true) => first.to_owned(),
        (true, _) => last.to_owned(),
    }
}

fn is_present(status: Option<PresenceStatus>) -> bool {
    status == Some(PresenceStatus::Present)
}

/// Build the unified view: one row per booking holder, one per guest.
///
/// Duplicate ids within a source keep the first record. Guests inherit
/// the booking's event when the record carries none, and show the
/// holder's name as `referred_by`.
pub fn merge_participants(bookings: &[BookingRecord], guests: &[GuestRecord]) -> Vec<Participant> {
    let mut rows = Vec::with_capacity(bookings.len() + guests.len());
    let mut by_booking: HashMap<&str, &BookingRecord> = HashMap::with_capacity(bookings.len());

    for booking in bookings {
        if by_booking.contains_key(booking.id.as_str()) {
            continue;
        }
        by_booking.insert(booking.id.as_str(), booking);

        let holder = &booking.holder;
        rows.push(Participant {
            id: booking.id.clone(),
            booking_id: booking.id.clone(),
            event_id: Some(booking.event_id.clone()),
            first_name: holder.first_name.clone(),
            last_name: holder.last_name.clone(),
            email: (!holder.email.is_empty()).then(|| holder.email.clone()),
            present: is_present(booking.presence_status),
            scanned_at: booking.scanned_at,
            details: ParticipantDetails::Holder {
                association: holder.association.clone(),
                is_paid: booking.is_paid,
                total_places: booking.total_places,
                total_price_cents: booking.total_price_cents,
                booking_status: booking.status.clone(),
            },
        });
    }

    let mut seen_guests: HashSet<&str> = HashSet::with_capacity(guests.len());
    for guest in guests {
        if !seen_guests.insert(guest.id.as_str()) {
            continue;
        }
        let booking = by_booking.get(guest.booking_id.as_str());
        let event_id = guest
            .event_id
            .clone()
            .or_else(|| booking.map(|b| b.event_id.clone()));
        let referred_by =
            booking.map(|b| full_name(&b.holder.first_name, &b.holder.last_name));

        rows.push(Participant {
            id: guest.id.clone(),
            booking_id: guest.booking_id.clone(),
            event_id,
            first_name: guest.first_name.clone(),
            last_name: guest.last_name.clone(),
            email: guest.email.clone(),
            present: is_present(guest.presence_status),
            scanned_at: guest.scanned_at,
            details: ParticipantDetails::Guest {
                referred_by,
                status: guest.status,
            },
        });
    }

    rows
}

/// Row filter for participant listings.
#[derive(Debug, Clone, Default)]
pub struct ParticipantFilter {
    pub event_id: Option<String>,
    pub kind: Option<ParticipantKind>,
    /// Case-insensitive match on first, last or full name, or email.
    pub search: Option<String>,
}

impl ParticipantFilter {
    pub fn matches(&self, participant: &Participant) -> bool {
        if let Some(event_id) = &self.event_id {
            if !participant.in_event(event_id) {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if participant.kind() != kind {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                participant.first_name.to_lowercase().contains(&term)
                    || participant.last_name.to_lowercase().contains(&term)
                    || participant.full_name().to_lowercase().contains(&term)
                    || participant
                        .email
                        .as_deref()
                        .is_some_and(|e| e.to_lowercase().contains(&term))
            }
        }
    }
}

pub fn filter_participants<'a>(
    participants: &'a [Participant],
    filter: &ParticipantFilter,
) -> Vec<&'a Participant> {
    participants.iter().filter(|p| filter.matches(p)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use checkin_api::HolderRecord;
    use pretty_assertions::assert_eq;

    use super::*;

    pub(crate) fn booking(id: &str, event: &str, places: u32, cents: u64, paid: bool) -> BookingRecord {
        BookingRecord {
            id: id.into(),
            event_id: event.into(),
            holder: HolderRecord {
                user_id: format!("u-{id}"),
                email: format!("{id}@example.org"),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                association: None,
            },
            is_paid: paid,
            total_places: places,
            total_price_cents: cents,
            status: Some("confirmed".into()),
            presence_status: Some(PresenceStatus::Absent),
            scanned_at: None,
            created_at: None,
        }
    }

    pub(crate) fn guest(id: &str, booking_id: &str, status: GuestStatus) -> GuestRecord {
        GuestRecord {
            id: id.into(),
            booking_id: booking_id.into(),
            event_id: None,
            first_name: "Charles".into(),
            last_name: "Babbage".into(),
            email: None,
            status,
            presence_status: Some(PresenceStatus::Absent),
            scanned_at: None,
            created_at: None,
        }
    }

    #[test]
    fn one_row_per_holder_and_guest() {
        let bookings = vec![booking("b1", "e1", 2, 5000, true)];
        let guests = vec![guest("g1", "b1", GuestStatus::Validated)];

        let rows = merge_participants(&bookings, &guests);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind(), ParticipantKind::Holder);
        assert_eq!(rows[1].kind(), ParticipantKind::Guest);
        assert_eq!(rows[1].event_id.as_deref(), Some("e1"));
        assert_eq!(
            rows[1].details,
            ParticipantDetails::Guest {
                referred_by: Some("Ada Lovelace".into()),
                status: GuestStatus::Validated,
            }
        );
    }

    #[test]
    fn duplicate_records_are_merged_once() {
        let bookings = vec![
            booking("b1", "e1", 2, 5000, true),
            booking("b1", "e1", 2, 5000, true),
        ];
        let guests = vec![
            guest("g1", "b1", GuestStatus::Pending),
            guest("g1", "b1", GuestStatus::Pending),
        ];
        assert_eq!(merge_participants(&bookings, &guests).len(), 2);
    }

    #[test]
    fn orphan_guest_is_kept_without_invented_holder() {
        let guests = vec![guest("g1", "missing", GuestStatus::Pending)];
        let rows = merge_participants(&[], &guests);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].event_id.is_none());
        assert!(matches!(
            rows[0].details,
            ParticipantDetails::Guest { referred_by: None, .. }
        ));
    }

    #[test]
    fn search_matches_names_and_email() {
        let rows = merge_participants(
            &[booking("b1", "e1", 1, 1000, true)],
            &[guest("g1", "b1", GuestStatus::Pending)],
        );

        let by = |term: &str| ParticipantFilter {
            search: Some(term.into()),
            ..ParticipantFilter::default()
        };
        assert_eq!(filter_participants(&rows, &by("lovelace")).len(), 1);
        assert_eq!(filter_participants(&rows, &by("ADA LOVE")).len(), 1);
        assert_eq!(filter_participants(&rows, &by("b1@example")).len(), 1);
        assert_eq!(filter_participants(&rows, &by("   ")).len(), 2);
        assert_eq!(filter_participants(&rows, &by("nobody")).len(), 0);
    }

    #[test]
    fn kind_and_event_filters() {
        let rows = merge_participants(
            &[booking("b1", "e1", 1, 1000, true), booking("b2", "e2", 1, 1000, true)],
            &[guest("g1", "b1", GuestStatus::Pending)],
        );
        let guests_only = ParticipantFilter {
            kind: Some(ParticipantKind::Guest),
            ..ParticipantFilter::default()
        };
        let event_two = ParticipantFilter {
            event_id: Some("e2".into()),
            ..ParticipantFilter::default()
        };
        assert_eq!(filter_participants(&rows, &guests_only).len(), 1);
        assert_eq!(filter_participants(&rows, &event_two).len(), 1);
        assert_eq!("GUEST".parse::<ParticipantKind>().unwrap(), ParticipantKind::Guest);
    }
}
