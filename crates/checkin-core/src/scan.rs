use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use uuid::Uuid;

use crate::token::NormalizedToken;

/// Where a scan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanOrigin {
    Camera,
    Manual,
}

/// One decode or manual-entry occurrence.
///
/// Immutable once created. The `id` identifies this occurrence, not the
/// credential: two physical scans of the same ticket get different ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub id: Uuid,
    pub token: NormalizedToken,
    pub origin: ScanOrigin,
    pub observed_at: DateTime<Utc>,
}

impl ScanEvent {
    pub fn new(token: NormalizedToken, origin: ScanOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            origin,
            observed_at: Utc::now(),
        }
    }

    pub fn camera(raw: &str) -> Self {
        Self::new(NormalizedToken::normalize(raw), ScanOrigin::Camera)
    }

    pub fn manual(raw: &str) -> Self {
        Self::new(NormalizedToken::normalize(raw), ScanOrigin::Manual)
    }
}
