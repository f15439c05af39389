//! The acquisition service: the only way to get fresh data.
//!
//! One refresh cycle runs fetch → parse → trend → history and publishes the
//! result into a [`StatsView`]. At most one cycle is in flight at a time; a
//! trigger that arrives while a cycle runs is dropped, since the running
//! cycle will publish the newest data anyway.
//!
//! # Status policy
//!
//! - `Fresh`: the snapshot replaces the displayed one and any error is cleared.
//! - `Unreachable`: every strategy failed. Shown as a connection problem only
//!   when nothing has been displayed yet; otherwise the old snapshot stays.
//! - `SynchronizerFailure`: something broke inside the cycle itself. The old
//!   snapshot stays and the loop carries on with the next tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Local, NaiveDate, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregation::update_trends;
use crate::error::SyncResult;
use crate::fetcher::{FallbackFetcher, FetchOutcome};
use crate::history::HistoryStore;
use crate::model::{HistoryPoint, Snapshot, StatsView, SyncStatus, TrendBoard};
use crate::parser::parse_stats_text;

/// Shown when nothing has ever been fetched and the feed is unreachable.
pub const UNREACHABLE_MESSAGE: &str = "Cluster connection timed out.";

/// Shown when a cycle fails for a reason other than the network.
pub const SYNC_FAILURE_MESSAGE: &str = "Synchronizer failure.";

/// What a call to [`AcquisitionService::refresh`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A cycle ran to completion.
    Completed {
        status: SyncStatus,
        /// Snapshot produced by this cycle; zero-valued unless `Fresh`.
        snapshot: Snapshot,
    },

    /// Another cycle was already in flight.
    Skipped,
}

/// Process-wide state mutated only by refresh cycles.
#[derive(Debug, Default)]
struct PipelineState {
    /// Last fresh snapshot; also the baseline for the next trend.
    latest: Option<Snapshot>,
    trends: TrendBoard,
    history: Vec<HistoryPoint>,
    status: Option<SyncStatus>,
    error: Option<String>,
    last_attempt: Option<chrono::DateTime<Utc>>,
}

/// Composes the fetcher and parser and owns trend and history state.
pub struct AcquisitionService {
    fetcher: Arc<FallbackFetcher>,
    resource: String,
    history: HistoryStore,
    state: RwLock<PipelineState>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AcquisitionService {
    pub fn new(fetcher: FallbackFetcher, resource: &str, history: HistoryStore) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            resource: resource.to_string(),
            history,
            state: RwLock::new(PipelineState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Current read model.
    pub async fn view(&self) -> StatsView {
        let state = self.state.read().await;
        StatsView {
            snapshot: state.latest.clone(),
            trends: state.trends,
            history: state.history.clone(),
            status: state.status,
            error: state.error.clone(),
            syncing: self.is_syncing(),
            last_attempt: state.last_attempt,
        }
    }

    /// The seven-point history series as last published.
    pub async fn history(&self) -> Vec<HistoryPoint> {
        self.state.read().await.history.clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Load the persisted history series without recording anything.
    pub async fn restore_history(&self) {
        let series = self.history.series(local_today()).await;
        self.state.write().await.history = series;
    }

    /// Start a refresh in the background and return immediately.
    pub fn trigger_refresh(self: &Arc<Self>) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let RefreshOutcome::Skipped = service.refresh().await {
                debug!("Refresh already in flight, trigger coalesced");
            }
        });
    }

    /// Refresh every `interval` until the task is aborted. The first tick fires immediately.
    pub fn spawn_periodic(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                service.refresh().await;
            }
        })
    }

    /// Run one acquisition cycle, unless one is already running.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_on(local_today()).await
    }

    /// Run one cycle, bucketing history under the given calendar day.
    #[instrument(skip(self), fields(resource = %self.resource))]
    pub async fn refresh_on(&self, today: NaiveDate) -> RefreshOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return RefreshOutcome::Skipped;
        }
        let _guard = FlightGuard(&self.in_flight);

        self.state.write().await.last_attempt = Some(Utc::now());

        let (status, snapshot) = match self.acquire().await {
            Ok(Some(snapshot)) => (SyncStatus::Fresh, snapshot),
            Ok(None) => (SyncStatus::Unreachable, Snapshot::empty(Utc::now())),
            Err(e) => {
                error!(error = %e, "Acquisition cycle failed");
                (SyncStatus::SynchronizerFailure, Snapshot::empty(Utc::now()))
            }
        };

        if status == SyncStatus::Fresh {
            self.publish_fresh(&snapshot, today).await;
            return RefreshOutcome::Completed { status, snapshot };
        }

        // Keep the seven-day window aligned with the calendar while the feed is down.
        let series = self.history.series(today).await;

        let mut state = self.state.write().await;
        state.history = series;
        state.status = Some(status);
        match status {
            SyncStatus::Unreachable if state.latest.is_none() => {
                state.error = Some(UNREACHABLE_MESSAGE.to_string());
            }
            // Any earlier message, including a synchronizer failure, stays until a fresh cycle.
            SyncStatus::Unreachable => warn!("Feed unreachable, keeping previous snapshot"),
            _ => state.error = Some(SYNC_FAILURE_MESSAGE.to_string()),
        }
        drop(state);

        RefreshOutcome::Completed { status, snapshot }
    }

    /// Fetch and parse in a separate task, so a panic in either is contained.
    ///
    /// `Ok(None)` means every strategy failed.
    async fn acquire(&self) -> SyncResult<Option<Snapshot>> {
        let fetcher = Arc::clone(&self.fetcher);
        let resource = self.resource.clone();

        let task = tokio::spawn(async move {
            let snapshot = match fetcher.fetch(&resource).await? {
                FetchOutcome::Payload { body, strategy } => {
                    debug!(strategy, "Parsing payload");
                    Some(parse_stats_text(&body))
                }
                FetchOutcome::Exhausted => None,
            };
            SyncResult::Ok(snapshot)
        });

        task.await?
    }

    async fn publish_fresh(&self, snapshot: &Snapshot, today: NaiveDate) {
        let series = self.history.record(snapshot.online, snapshot.today, today).await;

        let mut state = self.state.write().await;
        let PipelineState { latest, trends, .. } = &mut *state;
        update_trends(trends, snapshot, latest.as_ref());

        state.latest = Some(snapshot.clone());
        state.history = series;
        state.status = Some(SyncStatus::Fresh);
        state.error = None;

        info!(
            online = snapshot.online,
            today = snapshot.today,
            countries = snapshot.countries.len(),
            "Snapshot refreshed"
        );
    }
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}
