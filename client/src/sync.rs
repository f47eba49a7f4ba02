//! Run synchronization engine.
//!
//! One engine instance owns the cached state for every backend resource the
//! dashboards display. It replaces the original product's per-page polling
//! loops with three guarantees the loose `fetch` calls never had:
//!
//! - **Request coalescing**: a `refresh` issued while a fetch for the same
//!   key is in flight joins that fetch instead of hitting the backend again.
//! - **Issuance-order application**: every fetch carries a per-key sequence
//!   number; a completed response is applied only if it outranks the highest
//!   sequence already applied, so a slow early response can never clobber a
//!   fast later one (or an action's injected write).
//! - **Stale-while-revalidate**: failures and invalidations never clear
//!   cached data. Subscribers keep rendering the last good snapshot and can
//!   inspect `stale` and `last_error` instead of blanking the screen.
//!
//! All cache writes go through this module. The action dispatcher folds
//! confirmed results in via [`SyncEngine::inject_run`] /
//! [`SyncEngine::inject_analysis`]; nothing else mutates state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{TransportError, TransportResult};
use crate::model::{
    AnalysisSnapshot, ReportRecord, RunRecord, map_reports, map_runs, sort_runs_newest_first,
};
use crate::transport::Transport;

/// Cacheable backend resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Runs,
    Reports,
    LatestAnalysis,
}

impl ResourceKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Runs => "runs",
            Self::Reports => "reports",
            Self::LatestAnalysis => "analysis:latest",
        }
    }

    /// Every key the polling timer covers by default.
    pub const ALL: [ResourceKey; 3] = [Self::Runs, Self::Reports, Self::LatestAnalysis];
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached payload for one resource key. `Arc`ed so snapshots clone cheaply
/// through the watch channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResourceData {
    /// Nothing fetched yet.
    #[default]
    Empty,
    Runs(Arc<Vec<RunRecord>>),
    Reports(Arc<Vec<ReportRecord>>),
    Analysis(Arc<AnalysisSnapshot>),
}

/// What a subscriber sees for one resource key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub data: ResourceData,
    /// Set by [`SyncEngine::invalidate`]; cleared by the next successful
    /// refresh. Data stays visible while stale.
    pub stale: bool,
    /// Error from the most recent failed refresh, cleared on success.
    pub last_error: Option<TransportError>,
    /// Bumps on every published change, for cheap change detection.
    pub revision: u64,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        matches!(self.data, ResourceData::Empty)
    }

    pub fn runs(&self) -> Option<&[RunRecord]> {
        match &self.data {
            ResourceData::Runs(runs) => Some(runs),
            _ => None,
        }
    }

    pub fn reports(&self) -> Option<&[ReportRecord]> {
        match &self.data {
            ResourceData::Reports(reports) => Some(reports),
            _ => None,
        }
    }

    pub fn analysis(&self) -> Option<&AnalysisSnapshot> {
        match &self.data {
            ResourceData::Analysis(analysis) => Some(analysis),
            _ => None,
        }
    }
}

/// Seam between the engine and the backend, so tests can script fetch
/// outcomes and interleavings without a server.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, key: ResourceKey) -> TransportResult<ResourceData>;
}

/// Production fetcher: one GET per key, mapped through the domain mappers.
pub struct HttpFetcher {
    transport: Transport,
}

impl HttpFetcher {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, key: ResourceKey) -> TransportResult<ResourceData> {
        match key {
            ResourceKey::Runs => {
                let raw = self.transport.get("/api/runs").await?;
                Ok(ResourceData::Runs(Arc::new(map_runs(&raw))))
            }
            ResourceKey::Reports => {
                let raw = self.transport.get("/api/reports").await?;
                Ok(ResourceData::Reports(Arc::new(map_reports(&raw))))
            }
            ResourceKey::LatestAnalysis => {
                let raw = self.transport.get("/api/analysis/latest").await?;
                Ok(ResourceData::Analysis(Arc::new(AnalysisSnapshot::from_value(&raw))))
            }
        }
    }
}

/// Per-key cache state. The watch channel holds the published snapshot;
/// sequence counters enforce issuance-order application.
struct KeyState {
    notify: watch::Sender<Snapshot>,
    /// Sequence number the next issued fetch (or injection) will take.
    next_seq: u64,
    /// Highest sequence number whose completion has been applied or
    /// discarded. Failures advance this too.
    applied_seq: u64,
    inflight: Option<Inflight>,
}

struct Inflight {
    seq: u64,
    /// Completion signal; joiners wait for `true`.
    done: watch::Receiver<bool>,
}

impl KeyState {
    fn new() -> Self {
        let (notify, _) = watch::channel(Snapshot::default());
        Self {
            notify,
            next_seq: 1,
            applied_seq: 0,
            inflight: None,
        }
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn current(&self) -> Snapshot {
        self.notify.borrow().clone()
    }

    /// Mutate a copy of the current snapshot, bump its revision, publish.
    fn publish<F: FnOnce(&mut Snapshot)>(&self, mutate: F) {
        let mut snapshot = self.current();
        mutate(&mut snapshot);
        snapshot.revision += 1;
        self.notify.send_replace(snapshot);
    }

    /// Apply a completed fetch under the ordering rule: only the highest
    /// sequence seen so far wins; anything older is a harmless no-op.
    fn apply(&mut self, key: ResourceKey, seq: u64, result: TransportResult<ResourceData>) {
        if seq <= self.applied_seq {
            tracing::debug!(
                "discarding response #{seq} for {key}: superseded by #{}",
                self.applied_seq
            );
            return;
        }
        self.applied_seq = seq;

        match result {
            Ok(data) => {
                self.publish(|snapshot| {
                    snapshot.data = data;
                    snapshot.stale = false;
                    snapshot.last_error = None;
                });
            }
            Err(error) => {
                tracing::warn!("refresh #{seq} for {key} failed: {error}");
                self.publish(|snapshot| {
                    snapshot.last_error = Some(error);
                });
            }
        }
    }
}

struct EngineInner {
    fetcher: Arc<dyn ResourceFetcher>,
    state: Mutex<HashMap<ResourceKey, KeyState>>,
    poll_interval: Duration,
}

/// The synchronization facade. Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                fetcher,
                state: Mutex::new(HashMap::new()),
                poll_interval,
            }),
        }
    }

    /// Engine backed by live HTTP fetches through `transport`.
    pub fn with_transport(transport: Transport, poll_interval: Duration) -> Self {
        Self::new(Arc::new(HttpFetcher::new(transport)), poll_interval)
    }

    /// Lock scope is always synchronous; never held across an await.
    fn state(&self) -> MutexGuard<'_, HashMap<ResourceKey, KeyState>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Observe a key. The receiver sees the current snapshot immediately
    /// (possibly empty) via `borrow()` and every later publish via
    /// `changed()`. Dropping the receiver unsubscribes.
    pub fn subscribe(&self, key: ResourceKey) -> watch::Receiver<Snapshot> {
        let mut state = self.state();
        state
            .entry(key)
            .or_insert_with(KeyState::new)
            .notify
            .subscribe()
    }

    /// Current cached snapshot, without touching the network.
    pub fn snapshot(&self, key: ResourceKey) -> Snapshot {
        let mut state = self.state();
        state.entry(key).or_insert_with(KeyState::new).current()
    }

    /// Fetch `key` and return the snapshot after the fetch completed.
    ///
    /// Coalesced: if a fetch for `key` is already in flight this joins it
    /// rather than issuing a second transport call. The underlying fetch
    /// runs in a detached task, so cancelling a joiner never cancels the
    /// fetch; late responses are neutralized by the sequence rule rather
    /// than by abort plumbing.
    pub async fn refresh(&self, key: ResourceKey) -> Snapshot {
        let mut done = {
            let mut state = self.state();
            let entry = state.entry(key).or_insert_with(KeyState::new);
            if let Some(inflight) = &entry.inflight {
                tracing::debug!("refresh joined in-flight fetch #{} for {key}", inflight.seq);
                inflight.done.clone()
            } else {
                let seq = entry.take_seq();
                let (done_tx, done_rx) = watch::channel(false);
                entry.inflight = Some(Inflight {
                    seq,
                    done: done_rx.clone(),
                });
                let engine = self.clone();
                tokio::spawn(async move {
                    engine.run_fetch(key, seq, done_tx).await;
                });
                done_rx
            }
        };

        // A dropped sender also counts as completion.
        let _ = done.wait_for(|finished| *finished).await;
        self.snapshot(key)
    }

    async fn run_fetch(self, key: ResourceKey, seq: u64, done: watch::Sender<bool>) {
        tracing::debug!("fetch #{seq} for {key} started");
        let result = self.inner.fetcher.fetch(key).await;
        {
            let mut state = self.state();
            let entry = state.entry(key).or_insert_with(KeyState::new);
            if entry.inflight.as_ref().is_some_and(|i| i.seq == seq) {
                entry.inflight = None;
            }
            entry.apply(key, seq, result);
        }
        let _ = done.send(true);
    }

    /// Mark `key` stale without clearing its data. Subscribers keep the
    /// last good snapshot visible until a refresh lands.
    pub fn invalidate(&self, key: ResourceKey) {
        tracing::debug!("invalidating {key}");
        let mut state = self.state();
        let entry = state.entry(key).or_insert_with(KeyState::new);
        entry.publish(|snapshot| snapshot.stale = true);
    }

    /// Upsert one confirmed run into the runs cache at a fresh sequence
    /// number, so any poll already in flight completes as superseded and
    /// cannot remove it. The next poll overwrites the set wholesale.
    pub fn inject_run(&self, run: RunRecord) {
        let mut state = self.state();
        let entry = state.entry(ResourceKey::Runs).or_insert_with(KeyState::new);
        let seq = entry.take_seq();
        entry.applied_seq = seq;
        tracing::debug!("injecting run '{}' into cache as #{seq}", run.run_id);

        entry.publish(move |snapshot| {
            let mut runs = match &snapshot.data {
                ResourceData::Runs(existing) => existing.as_ref().clone(),
                _ => Vec::new(),
            };
            runs.retain(|existing| existing.run_id != run.run_id);
            runs.push(run);
            sort_runs_newest_first(&mut runs);
            snapshot.data = ResourceData::Runs(Arc::new(runs));
            snapshot.stale = false;
            snapshot.last_error = None;
        });
    }

    /// Replace the latest-analysis cache wholesale at a fresh sequence
    /// number.
    pub fn inject_analysis(&self, analysis: AnalysisSnapshot) {
        let mut state = self.state();
        let entry = state
            .entry(ResourceKey::LatestAnalysis)
            .or_insert_with(KeyState::new);
        let seq = entry.take_seq();
        entry.applied_seq = seq;
        tracing::debug!("injecting analysis for '{}' as #{seq}", analysis.project_id);

        entry.publish(move |snapshot| {
            snapshot.data = ResourceData::Analysis(Arc::new(analysis));
            snapshot.stale = false;
            snapshot.last_error = None;
        });
    }

    /// Start the shared polling timer over `keys`.
    ///
    /// The first refresh fires immediately, then every `poll_interval` from
    /// config. One timer serves all pages; pause it when the view is hidden
    /// and resume it when visible. Dropping the handle stops the timer.
    pub fn start_polling(&self, keys: &[ResourceKey]) -> PollerHandle {
        let (control, paused) = watch::channel(false);
        let engine = self.clone();
        let keys = keys.to_vec();
        let interval = self.inner.poll_interval;
        tracing::debug!(
            "starting poller over {:?} every {:?}",
            keys.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            interval
        );
        let task = tokio::spawn(run_poller(engine, keys, paused, interval));
        PollerHandle { control, task }
    }
}

async fn refresh_all(engine: &SyncEngine, keys: &[ResourceKey]) {
    let refreshes = keys.iter().map(|key| engine.refresh(*key));
    futures::future::join_all(refreshes).await;
}

async fn run_poller(
    engine: SyncEngine,
    keys: Vec<ResourceKey>,
    mut paused: watch::Receiver<bool>,
    interval: Duration,
) {
    // tokio panics on a zero period; floor it rather than crash on a
    // pathological config value.
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *paused.borrow_and_update() {
            // Parked until resumed; resume refreshes immediately and
            // restarts the cadence from now.
            if paused.wait_for(|p| !*p).await.is_err() {
                return;
            }
            tracing::debug!("poller resumed, refreshing immediately");
            ticker.reset();
            refresh_all(&engine, &keys).await;
            continue;
        }

        tokio::select! {
            _ = ticker.tick() => {
                refresh_all(&engine, &keys).await;
            }
            changed = paused.changed() => {
                if changed.is_err() {
                    // All handles dropped; the abort in Drop usually wins,
                    // but exit cleanly either way.
                    return;
                }
            }
        }
    }
}

/// Controls the polling timer spawned by [`SyncEngine::start_polling`].
/// Dropping the handle aborts the timer task, so pages cannot leak timers.
pub struct PollerHandle {
    control: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop refreshing until [`PollerHandle::resume`]. Idempotent.
    pub fn pause(&self) {
        tracing::debug!("poller paused");
        self.control.send_replace(true);
    }

    /// Refresh immediately and restart the polling cadence. Idempotent; a
    /// no-op when not paused.
    pub fn resume(&self) {
        self.control.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.control.borrow()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
