// checkin-api: Async Rust client for the event check-in backend
//
// Two read/write surfaces are consumed:
//   POST /checkin/validate   -- submit a scanned credential
//   GET  /participants       -- bookings, guests and events for aggregation
// plus the read-only GET /members listing used by the dashboard.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::BearerToken;
pub use client::CheckInClient;
pub use error::Error;
pub use models::{
    BookingRecord, EventRecord, EventStatus, GuestRecord, GuestStatus, HolderRecord,
    MemberRecord, MembersResponse, ParticipantSummary, ParticipantsResponse, PresenceStatus,
    PublicationStatus, SubscriptionStatus, SubscriptionType, ValidateRequest, ValidateResponse,
    WireOutcome,
};
pub use transport::{TlsMode, TransportConfig};
