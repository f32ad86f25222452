// ── Statistics refresh ──
//
// Pull-based attendance board. Each refresh fetches the participant
// collections, recomputes every statistic from scratch and swaps the
// snapshot in atomically. Concurrent requests for the same scope are
// coalesced; completions are applied in initiation order.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use checkin_api::{CheckInClient, EventRecord, MembersResponse, ParticipantsResponse};

use crate::aggregate::{
    EventAttendance, EventAttendanceRow, GlobalStats, Participant, ParticipantFilter,
    compute_event_attendance, compute_event_rows, compute_global_stats, merge_participants,
};
use crate::error::CoreError;

// ── Source seam ─────────────────────────────────────────────────

/// Read-only participant and member listings.
pub trait ParticipantSource: Send + Sync + 'static {
    fn participants(
        &self,
        event_id: Option<&str>,
    ) -> impl Future<Output = Result<ParticipantsResponse, checkin_api::Error>> + Send;

    fn members(&self) -> impl Future<Output = Result<MembersResponse, checkin_api::Error>> + Send;
}

impl ParticipantSource for CheckInClient {
    async fn participants(
        &self,
        event_id: Option<&str>,
    ) -> Result<ParticipantsResponse, checkin_api::Error> {
        CheckInClient::participants(self, event_id).await
    }

    async fn members(&self) -> Result<MembersResponse, checkin_api::Error> {
        CheckInClient::members(self).await
    }
}

// ── Snapshot ────────────────────────────────────────────────────

/// Immutable result of one successful refresh.
#[derive(Debug, Clone)]
pub struct AttendanceSnapshot {
    pub generation: u64,
    /// Event the fetch was scoped to, `None` for everything.
    pub scope: Option<String>,
    pub participants: Vec<Participant>,
    pub events: Vec<EventRecord>,
    pub global: GlobalStats,
    pub refreshed_at: DateTime<Utc>,
}

/// What happened to a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { generation: u64 },
    /// A fetch for the same scope was already running.
    Coalesced,
    /// A later-started fetch was applied first; this result was dropped.
    Stale { generation: u64 },
}

/// Observable board status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    pub refreshing: bool,
    pub last_success: Option<DateTime<Utc>>,
    /// Kept until the next successful refresh. The previous snapshot
    /// stays readable meanwhile.
    pub last_error: Option<String>,
}

// ── Board ───────────────────────────────────────────────────────

/// Generations of the fetches currently running, keyed by scope.
#[derive(Debug, Default)]
struct Bookkeeping {
    next_generation: u64,
    applied_generation: u64,
    in_flight: IndexMap<Option<String>, u64>,
}

struct BoardInner<S> {
    source: Arc<S>,
    book: Mutex<Bookkeeping>,
    snapshot: ArcSwapOption<AttendanceSnapshot>,
    status: watch::Sender<RefreshStatus>,
}

/// Attendance statistics owned by the view that asked for them.
///
/// Cheaply cloneable; clones share the snapshot.
pub struct AttendanceBoard<S> {
    inner: Arc<BoardInner<S>>,
}

impl<S> Clone for AttendanceBoard<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ParticipantSource> AttendanceBoard<S> {
    pub fn new(source: Arc<S>) -> Self {
        let (status, _) = watch::channel(RefreshStatus::default());
        Self {
            inner: Arc::new(BoardInner {
                source,
                book: Mutex::new(Bookkeeping::default()),
                snapshot: ArcSwapOption::empty(),
                status,
            }),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.inner.source
    }

    /// Fetch and recompute.
    ///
    /// A request for a scope that is already being fetched is coalesced.
    /// A completion that started before the last applied one is dropped,
    /// failures included. Otherwise a failure keeps the previous snapshot
    /// and is recorded in [`RefreshStatus::last_error`].
    pub async fn refresh(&self, scope: Option<&str>) -> Result<RefreshOutcome, CoreError> {
        let key = scope.map(str::to_owned);
        let generation = {
            let mut book = self.lock_book();
            if let Some(&running) = book.in_flight.get(&key) {
                debug!(generation = running, "refresh coalesced");
                return Ok(RefreshOutcome::Coalesced);
            }
            book.next_generation += 1;
            let generation = book.next_generation;
            book.in_flight.insert(key.clone(), generation);
            self.inner.status.send_modify(|s| s.refreshing = true);
            generation
        };
        debug!(generation, scope = ?scope, "refresh started");

        let result = self.inner.source.participants(scope).await;

        let mut book = self.lock_book();
        if book.in_flight.get(&key) == Some(&generation) {
            book.in_flight.shift_remove(&key);
        }
        let refreshing = !book.in_flight.is_empty();

        if generation < book.applied_generation {
            self.inner.status.send_modify(|s| s.refreshing = refreshing);
            debug!(generation, failed = result.is_err(), "discarding stale refresh");
            return Ok(RefreshOutcome::Stale { generation });
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let err = CoreError::from(e);
                warn!(generation, error = %err, "refresh failed, keeping previous statistics");
                self.inner.status.send_modify(|s| {
                    s.refreshing = refreshing;
                    s.last_error = Some(err.to_string());
                });
                return Err(err);
            }
        };
        book.applied_generation = generation;

        let participants = merge_participants(&response.bookings, &response.guests);
        let global = compute_global_stats(&participants);
        let now = Utc::now();
        self.inner.snapshot.store(Some(Arc::new(AttendanceSnapshot {
            generation,
            scope: key,
            participants,
            events: response.events,
            global,
            refreshed_at: now,
        })));
        self.inner.status.send_modify(|s| {
            s.refreshing = refreshing;
            s.last_success = Some(now);
            s.last_error = None;
        });
        drop(book);

        debug!(generation, "refresh applied");
        Ok(RefreshOutcome::Applied { generation })
    }

    fn lock_book(&self) -> std::sync::MutexGuard<'_, Bookkeeping> {
        self.inner.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Option<Arc<AttendanceSnapshot>> {
        self.inner.snapshot.load_full()
    }

    /// `None` until the first successful refresh.
    pub fn event_attendance(&self, event_id: &str) -> Option<EventAttendance> {
        self.snapshot()
            .map(|s| compute_event_attendance(&s.participants, event_id))
    }

    pub fn global_stats(&self) -> Option<GlobalStats> {
        self.snapshot().map(|s| s.global.clone())
    }

    pub fn event_rows(&self) -> Vec<EventAttendanceRow> {
        self.snapshot()
            .map(|s| compute_event_rows(&s.participants, &s.events))
            .unwrap_or_default()
    }

    pub fn participants(&self, filter: &ParticipantFilter) -> Vec<Participant> {
        self.snapshot()
            .map(|s| {
                s.participants
                    .iter()
                    .filter(|p| filter.matches(p))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn status(&self) -> RefreshStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<RefreshStatus> {
        self.inner.status.subscribe()
    }

    // ── Background ───────────────────────────────────────────────

    /// Refresh on a fixed interval until `cancel` fires.
    ///
    /// The first refresh happens immediately.
    pub fn spawn_periodic(
        &self,
        scope: Option<String>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(refresh_task(self.clone(), scope, every, cancel))
    }
}

async fn refresh_task<S: ParticipantSource>(
    board: AttendanceBoard<S>,
    scope: Option<String>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = board.refresh(scope.as_deref()).await {
                    warn!(error = %e, "periodic refresh failed");
                }
            }
        }
    }
    debug!("refresh task stopped");
}
