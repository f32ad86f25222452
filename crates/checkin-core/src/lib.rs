// checkin-core: Scan loop, ticket validation and attendance aggregation
// between checkin-api and its hosts (CLI, kiosks).

pub mod aggregate;
pub mod capture;
pub mod config;
pub mod console;
pub mod error;
pub mod feedback;
pub mod history;
pub mod memory;
pub mod refresh;
pub mod scan;
pub mod scanner;
pub mod token;
pub mod validator;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConsoleConfig, ScannerSettings, TlsVerification};
pub use console::Console;
pub use error::{CameraError, CoreError};
pub use scanner::{ScanNotice, ScanState, ScannerHandle};

pub use aggregate::{
    DashboardStats, EventAttendance, EventAttendanceRow, GlobalStats, Participant,
    ParticipantDetails, ParticipantFilter, ParticipantKind, format_cents,
};
pub use capture::{
    CameraFacing, CaptureSession, ChannelBackend, ChannelFeeder, DecodeBackend, LineBackend,
};
pub use feedback::{Cue, FeedbackSignaler, NoopSignaler, TerminalBell};
pub use history::{ScanRecord, ScanStats};
pub use memory::MemoryCheckIn;
pub use refresh::{
    AttendanceBoard, AttendanceSnapshot, ParticipantSource, RefreshOutcome, RefreshStatus,
};
pub use scan::{ScanEvent, ScanOrigin};
pub use token::NormalizedToken;
pub use validator::{CheckInService, CheckInValidator, ValidationKind, ValidationOutcome};

// Wire types that appear in the public surface.
pub use checkin_api::{GuestStatus, ParticipantSummary};
