// Bounded recent-scan history and the statistics derived from it.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

use crate::scan::ScanOrigin;
use crate::validator::{ValidationKind, ValidationOutcome};

/// One completed scan as shown in the recent list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub token: String,
    pub origin: ScanOrigin,
    pub kind: ValidationKind,
    pub participant: Option<String>,
    pub event_title: Option<String>,
    pub at: DateTime<Utc>,
}

impl ScanRecord {
    pub fn from_outcome(outcome: &ValidationOutcome, origin: ScanOrigin) -> Self {
        Self {
            token: outcome.token.clone(),
            origin,
            kind: outcome.kind,
            participant: outcome.participant.as_ref().map(|p| p.name.clone()),
            event_title: outcome.participant.as_ref().map(|p| p.event_title.clone()),
            at: outcome.completed_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind.is_success()
    }
}

/// Statistics over the retained history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub total_scans: usize,
    pub successful: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub today: usize,
    /// Today's scans bucketed by UTC hour of day.
    pub scans_per_hour: BTreeMap<u32, usize>,
    /// Most recent first.
    pub recent: Vec<ScanRecord>,
}

impl ScanStats {
    /// Share of successful scans, zero-safe, in percent.
    pub fn success_rate(&self) -> f64 {
        crate::aggregate::rate_percent(self.successful, self.total_scans)
    }
}

/// Ring buffer of recent scans. Oldest entries fall off at capacity.
#[derive(Debug, Clone)]
pub struct ScanHistory {
    capacity: usize,
    entries: VecDeque<ScanRecord>,
}

impl ScanHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, record: ScanRecord) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self, now: DateTime<Utc>, recent_limit: usize) -> ScanStats {
        let mut stats = ScanStats {
            total_scans: self.entries.len(),
            ..ScanStats::default()
        };

        let today = now.date_naive();
        for record in &self.entries {
            match record.kind {
                ValidationKind::Accepted => stats.successful += 1,
                ValidationKind::AlreadyUsed => stats.duplicates += 1,
                ValidationKind::NotFound
                | ValidationKind::Expired
                | ValidationKind::NetworkFailure
                | ValidationKind::Unauthorized => stats.failed += 1,
            }
            if record.at.date_naive() == today {
                stats.today += 1;
                *stats.scans_per_hour.entry(record.at.hour()).or_default() += 1;
            }
        }

        stats.recent = self
            .entries
            .iter()
            .rev()
            .take(recent_limit)
            .cloned()
            .collect();
        stats
    }
}
