use chrono::{DateTime, Utc};
use serde::Serialize;

use checkin_api::{EventRecord, EventStatus, MemberRecord, PublicationStatus, SubscriptionStatus};

use super::{rate_percent, ratio};

/// Read-only summary over members, events and bookings.
///
/// Displays figures the backend already owns; no billing is derived here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub members: usize,
    pub active_subscriptions: usize,
    pub inactive_subscriptions: usize,
    pub expired_subscriptions: usize,
    /// Active members, percent of all members.
    pub conversion_rate: f64,
    /// Expired members, percent of all members.
    pub churn_rate: f64,
    pub total_bookings: usize,
    /// Bookings per member, percent.
    pub booking_conversion_rate: f64,
    pub average_bookings_per_event: f64,
    pub total_events: usize,
    pub upcoming_events: usize,
    pub past_events: usize,
    pub cancelled_events: usize,
    pub online_events: usize,
}

pub fn compute_dashboard(
    members: &[MemberRecord],
    events: &[EventRecord],
    total_bookings: usize,
    now: DateTime<Utc>,
) -> DashboardStats {
    let mut stats = DashboardStats {
        members: members.len(),
        total_bookings,
        total_events: events.len(),
        ..DashboardStats::default()
    };

    for member in members {
        match member.subscription_status {
            Some(SubscriptionStatus::Active) => stats.active_subscriptions += 1,
            Some(SubscriptionStatus::Inactive) => stats.inactive_subscriptions += 1,
            Some(SubscriptionStatus::Expired) => stats.expired_subscriptions += 1,
            Some(SubscriptionStatus::Unknown) | None => {}
        }
    }

    for event in events {
        let cancelled = event.status == Some(EventStatus::Cancelled);
        if cancelled {
            stats.cancelled_events += 1;
        }
        if let Some(starts_at) = event.starts_at {
            if starts_at > now {
                if !cancelled {
                    stats.upcoming_events += 1;
                }
            } else {
                stats.past_events += 1;
            }
        }
        if event.publication_status == Some(PublicationStatus::Online) {
            stats.online_events += 1;
        }
    }

    stats.conversion_rate = rate_percent(stats.active_subscriptions, stats.members);
    stats.churn_rate = rate_percent(stats.expired_subscriptions, stats.members);
    stats.booking_conversion_rate = rate_percent(total_bookings, stats.members);
    stats.average_bookings_per_event = ratio(total_bookings, stats.total_events);
    stats
}
