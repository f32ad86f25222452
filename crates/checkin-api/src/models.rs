// Wire types for the check-in backend.
//
// Field names follow the backend's camelCase JSON. Unknown enum values
// deserialize into an `Unknown` catch-all so a newer backend never breaks
// an older console mid-event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Validation ───────────────────────────────────────────────────────

/// Body of `POST /checkin/validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateRequest<'a> {
    pub token: &'a str,
}

/// Business outcome reported by the backend for a validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireOutcome {
    Accepted,
    AlreadyUsed,
    NotFound,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub name: String,
    pub event_title: String,
}

/// Response of `POST /checkin/validate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub outcome: WireOutcome,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub participant_summary: Option<ParticipantSummary>,
    #[serde(default)]
    pub scanned_at: Option<DateTime<Utc>>,
}

// ── Participants ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresenceStatus {
    Present,
    Absent,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestStatus {
    Pending,
    Validated,
    Refused,
    #[serde(other)]
    Unknown,
}

/// The user who made a booking.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderRecord {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub association: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: String,
    pub event_id: String,
    pub holder: HolderRecord,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub total_places: u32,
    /// Integer minor units.
    #[serde(default)]
    pub total_price_cents: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub presence_status: Option<PresenceStatus>,
    #[serde(default)]
    pub scanned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRecord {
    pub id: String,
    pub booking_id: String,
    /// Older backends omit it; the owning booking's event applies.
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub status: GuestStatus,
    #[serde(default)]
    pub presence_status: Option<PresenceStatus>,
    #[serde(default)]
    pub scanned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// `Online` events are visible to members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    Online,
    Offline,
    Draft,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub publication_status: Option<PublicationStatus>,
}

/// Response of `GET /participants`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsResponse {
    #[serde(default)]
    pub bookings: Vec<BookingRecord>,
    #[serde(default)]
    pub guests: Vec<GuestRecord>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

// ── Members ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    EventBased,
    Unlimited,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subscription_type: Option<SubscriptionType>,
    #[serde(default)]
    pub subscription_status: Option<SubscriptionStatus>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Response of `GET /members`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MembersResponse {
    #[serde(default)]
    pub members: Vec<MemberRecord>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_outcome_falls_back() {
        let resp: ValidateResponse =
            serde_json::from_value(json!({ "outcome": "revoked_by_admin" })).unwrap();
        assert_eq!(resp.outcome, WireOutcome::Unknown);
        assert!(resp.participant_summary.is_none());
    }

    #[test]
    fn guest_without_event_id_parses() {
        let guest: GuestRecord = serde_json::from_value(json!({
            "id": "g1",
            "bookingId": "b1",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "status": "validated",
            "presenceStatus": "ABSENT"
        }))
        .unwrap();
        assert!(guest.event_id.is_none());
        assert_eq!(guest.status, GuestStatus::Validated);
        assert_eq!(guest.presence_status, Some(PresenceStatus::Absent));
    }
}
