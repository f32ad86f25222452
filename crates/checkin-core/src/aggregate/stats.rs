use std::cmp::Ordering;
use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use checkin_api::{EventRecord, GuestStatus};

use super::participant::{Participant, ParticipantDetails};
use super::rate_percent;

/// Presence rollup for one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendance {
    pub event_id: String,
    pub total_participants: usize,
    pub present_count: usize,
    pub awaiting_count: usize,
    /// Percent; `0` when the event has no participants.
    pub attendance_rate: f64,
}

/// Attendance plus the event's display title.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendanceRow {
    pub title: String,
    #[serde(flatten)]
    pub attendance: EventAttendance,
}

/// Organization-wide rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_bookings: usize,
    pub total_places: u64,
    /// Sum of booking totals, once per booking.
    pub total_revenue_cents: u64,
    pub paid_bookings: usize,
    pub unpaid_bookings: usize,
    pub total_guests: usize,
    pub guests_validated: usize,
    pub guests_pending: usize,
    pub guests_refused: usize,
    pub total_participants: usize,
    pub present_count: usize,
    /// Percent of participants present.
    pub attendance_rate: f64,
    /// Percent of bookings paid.
    pub payment_rate: f64,
}

/// Presence counts for the participants of one event.
pub fn compute_event_attendance(participants: &[Participant], event_id: &str) -> EventAttendance {
    let mut total = 0;
    let mut present = 0;
    for p in participants.iter().filter(|p| p.in_event(event_id)) {
        total += 1;
        if p.present {
            present += 1;
        }
    }
    EventAttendance {
        event_id: event_id.to_owned(),
        total_participants: total,
        present_count: present,
        awaiting_count: total - present,
        attendance_rate: rate_percent(present, total),
    }
}

/// Attendance for every event that has participants or is listed,
/// largest first, ties broken by title.
pub fn compute_event_rows(
    participants: &[Participant],
    events: &[EventRecord],
) -> Vec<EventAttendanceRow> {
    let mut titles: IndexMap<&str, &str> = IndexMap::new();
    for event in events {
        titles.entry(event.id.as_str()).or_insert(event.title.as_str());
    }
    for p in participants {
        if let Some(event_id) = p.event_id.as_deref() {
            titles.entry(event_id).or_insert(event_id);
        }
    }

    let mut rows: Vec<EventAttendanceRow> = titles
        .into_iter()
        .map(|(id, title)| EventAttendanceRow {
            title: title.to_owned(),
            attendance: compute_event_attendance(participants, id),
        })
        .collect();

    rows.sort_by(|a, b| {
        match b
            .attendance
            .total_participants
            .cmp(&a.attendance.total_participants)
        {
            Ordering::Equal => a.title.cmp(&b.title),
            other => other,
        }
    });
    rows
}

/// Single pass over the unified view.
pub fn compute_global_stats(participants: &[Participant]) -> GlobalStats {
    let mut stats = GlobalStats::default();
    let mut counted_bookings: HashSet<&str> = HashSet::new();

    for p in participants {
        stats.total_participants += 1;
        if p.present {
            stats.present_count += 1;
        }

        match &p.details {
            ParticipantDetails::Holder {
                is_paid,
                total_places,
                total_price_cents,
                ..
            } => {
                if !counted_bookings.insert(p.booking_id.as_str()) {
                    continue;
                }
                stats.total_bookings += 1;
                stats.total_places = stats.total_places.saturating_add(u64::from(*total_places));
                stats.total_revenue_cents =
                    stats.total_revenue_cents.saturating_add(*total_price_cents);
                if *is_paid {
                    stats.paid_bookings += 1;
                } else {
                    stats.unpaid_bookings += 1;
                }
            }
            ParticipantDetails::Guest { status, .. } => {
                stats.total_guests += 1;
                match status {
                    GuestStatus::Validated => stats.guests_validated += 1,
                    GuestStatus::Refused => stats.guests_refused += 1,
                    GuestStatus::Pending | GuestStatus::Unknown => stats.guests_pending += 1,
                }
            }
        }
    }

    stats.attendance_rate = rate_percent(stats.present_count, stats.total_participants);
    stats.payment_rate = rate_percent(stats.paid_bookings, stats.total_bookings);
    stats
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use checkin_api::PresenceStatus;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::aggregate::merge_participants;
    use crate::aggregate::participant::tests::{booking, guest};

    fn event(id: &str, title: &str) -> EventRecord {
        EventRecord {
            id: id.into(),
            title: title.into(),
            starts_at: None,
            status: None,
            publication_status: None,
        }
    }

    #[test]
    fn paid_booking_with_one_guest_is_half_present() {
        let mut b = booking("b1", "e1", 2, 5000, true);
        b.presence_status = Some(PresenceStatus::Present);
        let g = guest("g1", "b1", GuestStatus::Validated);

        let rows = merge_participants(&[b], &[g]);
        let attendance = compute_event_attendance(&rows, "e1");

        assert_eq!(attendance.total_participants, 2);
        assert_eq!(attendance.present_count, 1);
        assert_eq!(attendance.awaiting_count, 1);
        assert!((attendance.attendance_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_event_rate_is_zero() {
        let attendance = compute_event_attendance(&[], "nothing");
        assert_eq!(attendance.total_participants, 0);
        assert!(attendance.attendance_rate.is_finite());
        assert!(attendance.attendance_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn revenue_counts_booking_once_regardless_of_guests() {
        let bookings = [booking("b1", "e1", 4, 5000, true)];
        let guests: Vec<_> = (0..3)
            .map(|i| guest(&format!("g{i}"), "b1", GuestStatus::Validated))
            .collect();

        let stats = compute_global_stats(&merge_participants(&bookings, &guests));
        assert_eq!(stats.total_revenue_cents, 5000);
        assert_eq!(stats.total_places, 4);
        assert_eq!(stats.total_bookings, 1);
        assert_eq!(stats.total_guests, 3);
        assert_eq!(stats.guests_validated, 3);
    }

    #[test]
    fn oversized_backend_amounts_saturate() {
        let bookings = [
            booking("b1", "e1", u32::MAX, u64::MAX - 10, true),
            booking("b2", "e1", 3, 500, true),
        ];
        let stats = compute_global_stats(&merge_participants(&bookings, &[]));
        assert_eq!(stats.total_revenue_cents, u64::MAX);
        assert_eq!(stats.total_places, u64::from(u32::MAX) + 3);
        assert_eq!(stats.total_bookings, 2);
    }

    #[test]
    fn global_stats_over_nothing_are_zero() {
        let stats = compute_global_stats(&[]);
        assert_eq!(stats, GlobalStats::default());
        assert!(stats.attendance_rate.abs() < f64::EPSILON);
        assert!(stats.payment_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn partitions_guests_and_payments() {
        let bookings = [
            booking("b1", "e1", 1, 1000, true),
            booking("b2", "e1", 1, 2500, false),
        ];
        let guests = [
            guest("g1", "b1", GuestStatus::Pending),
            guest("g2", "b2", GuestStatus::Refused),
            guest("g3", "b2", GuestStatus::Validated),
        ];
        let stats = compute_global_stats(&merge_participants(&bookings, &guests));
        assert_eq!(stats.paid_bookings, 1);
        assert_eq!(stats.unpaid_bookings, 1);
        assert_eq!(stats.total_revenue_cents, 3500);
        assert_eq!(
            (stats.guests_pending, stats.guests_validated, stats.guests_refused),
            (1, 1, 1)
        );
        assert!((stats.payment_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn event_rows_sorted_by_size_then_title() {
        let bookings = [
            booking("b1", "e1", 1, 0, true),
            booking("b2", "e2", 1, 0, true),
            booking("b3", "e2", 1, 0, true),
            booking("b4", "e3", 1, 0, true),
        ];
        let events = [
            event("e1", "Zoo night"),
            event("e2", "Gala"),
            event("e3", "Afterwork"),
            event("e4", "Empty"),
        ];
        let rows = compute_event_rows(&merge_participants(&bookings, &[]), &events);
        let titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Gala", "Afterwork", "Zoo night", "Empty"]);
        assert!(rows[3].attendance.attendance_rate.abs() < f64::EPSILON);
    }
}
