// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The single source of truth for how much loading work remains.

use crate::guard::LoadGuard;
use crate::state::{LoaderSnapshot, LoaderState, LoadingSnapshot};
use crate::watchdog::{StallWatchdog, StalledLoader};
use folio_core::{
    EventBus, LoaderId, LoadingConfig, LoadingEvent, LoadingResult, LoadingSignal, TriState,
    WatchdogConfig,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Pool {
    state: LoaderState,
    signal: LoadingSignal,
}

struct AggregatorInner {
    pools: BTreeMap<LoaderId, Pool>,
    gate_loader: Option<LoaderId>,
    is_main_load: bool,
}

#[cold]
fn unknown_loader(loader: &LoaderId) -> ! {
    panic!("unknown loader `{loader}`: loaders are fixed when the aggregator is built")
}

impl AggregatorInner {
    fn pool(&self, loader: &LoaderId) -> &Pool {
        match self.pools.get(loader) {
            Some(pool) => pool,
            None => unknown_loader(loader),
        }
    }

    fn pool_mut(&mut self, loader: &LoaderId) -> &mut Pool {
        match self.pools.get_mut(loader) {
            Some(pool) => pool,
            None => unknown_loader(loader),
        }
    }

    /// Sums `f` over the given pools, or over every pool if `loaders` is empty.
    fn sum_over(&self, loaders: &[LoaderId], f: impl Fn(&LoaderState) -> u64) -> u64 {
        if loaders.is_empty() {
            self.pools.values().map(|pool| f(&pool.state)).sum()
        } else {
            loaders.iter().map(|id| f(&self.pool(id).state)).sum()
        }
    }

    fn any_over(&self, loaders: &[LoaderId], f: impl Fn(&LoaderState) -> bool) -> bool {
        if loaders.is_empty() {
            self.pools.values().any(|pool| f(&pool.state))
        } else {
            // Every id is resolved so that an unknown one fails even after a hit.
            loaders
                .iter()
                .map(|id| f(&self.pool(id).state))
                .fold(false, |acc, hit| acc | hit)
        }
    }
}

fn percent(outstanding: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    ((1.0 - outstanding as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}

/// Tracks outstanding work per loader and publishes the loading state.
///
/// The aggregator is a cheaply clonable handle: every clone shares the same
/// pools and signals, so it is handed to trackers and UI consumers by value.
/// All operations complete synchronously; signal emissions happen while the
/// internal lock is held, so subscribers observe updates in call order.
///
/// # Panics
///
/// Every method taking a [`LoaderId`] panics if the loader was not part of
/// the [`LoadingConfig`] the aggregator was built from.
#[derive(Clone)]
pub struct LoadingAggregator {
    inner: Arc<Mutex<AggregatorInner>>,
    any: LoadingSignal,
    events: EventBus<LoadingEvent>,
    watchdog: Option<WatchdogConfig>,
    created_at: Instant,
}

impl LoadingAggregator {
    /// Builds an aggregator for the pools declared in `config`.
    pub fn new(config: LoadingConfig) -> LoadingResult<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: LoadingConfig) -> Self {
        let LoadingConfig {
            loaders,
            gate_loader,
            watchdog,
        } = config;

        let pools = loaders
            .into_iter()
            .map(|id| {
                let state = if gate_loader.as_ref() == Some(&id) {
                    LoaderState::gated()
                } else {
                    LoaderState::default()
                };
                let pool = Pool {
                    state,
                    signal: LoadingSignal::default(),
                };
                (id, pool)
            })
            .collect::<BTreeMap<_, _>>();

        log::info!(
            "Loading aggregator initialized with {} loaders (gate: {}).",
            pools.len(),
            gate_loader
                .as_ref()
                .map_or_else(|| "none".to_string(), LoaderId::to_string)
        );

        Self {
            inner: Arc::new(Mutex::new(AggregatorInner {
                pools,
                is_main_load: gate_loader.is_some(),
                gate_loader,
            })),
            any: LoadingSignal::default(),
            events: EventBus::new(),
            watchdog,
            created_at: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorInner> {
        // Counter updates are plain field writes; a poisoned state is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `qty` more outstanding units on `loader`.
    ///
    /// The pool is marked as loading even when `qty` is zero, and `Loading` is
    /// emitted on both the pool signal and the aggregate signal.
    pub fn to_load(&self, loader: &LoaderId, qty: u32) {
        let now = Instant::now();
        let mut inner = self.lock();
        let pool = inner.pool_mut(loader);
        pool.state.register(qty, now);
        let outstanding = pool.state.outstanding;

        log::trace!("[{loader}] +{qty} units, {outstanding} outstanding.");
        pool.signal.emit(TriState::Loading);
        self.any.emit(TriState::Loading);
        self.events.publish(LoadingEvent::Registered {
            loader: loader.clone(),
            qty,
            outstanding,
        });
    }

    /// Reports `qty` units of `loader` as complete.
    ///
    /// Reporting more units than are outstanding clamps the counter to zero
    /// and publishes [`LoadingEvent::OverCompletion`]. When the pool reaches
    /// zero it drains: its signal emits `Idle`, the aggregate signal is
    /// recomputed from the other pools, and the splash-screen gate is lifted
    /// if this was the gate pool.
    pub fn loaded(&self, loader: &LoaderId, qty: u32) {
        let now = Instant::now();
        let mut inner = self.lock();
        let pool = inner.pool_mut(loader);
        let before = pool.state.complete(qty, now);
        let remaining = pool.state.outstanding;

        if qty > before {
            log::warn!(
                "[{loader}] {qty} units reported loaded but only {before} were outstanding; clamping to zero."
            );
            self.events.publish(LoadingEvent::OverCompletion {
                loader: loader.clone(),
                reported: qty,
                outstanding: before,
            });
        }
        log::trace!("[{loader}] -{qty} units, {remaining} outstanding.");
        self.events.publish(LoadingEvent::Completed {
            loader: loader.clone(),
            qty,
            outstanding: remaining,
        });

        if remaining > 0 {
            return;
        }

        pool.signal.emit(TriState::Idle);
        log::debug!("[{loader}] drained.");
        self.events.publish(LoadingEvent::Drained {
            loader: loader.clone(),
        });

        let others_loading = inner
            .pools
            .iter()
            .any(|(id, pool)| id != loader && pool.state.is_loading);
        self.any.emit(others_loading.into());

        if inner.is_main_load && inner.gate_loader.as_ref() == Some(loader) {
            inner.is_main_load = false;
            log::info!("[{loader}] drained for the first time, lifting the splash-screen gate.");
            self.events.publish(LoadingEvent::GateCleared {
                loader: loader.clone(),
            });
        }
    }

    /// Registers `qty` units and returns a guard that reports them loaded
    /// when dropped.
    pub fn begin(&self, loader: &LoaderId, qty: u32) -> LoadGuard {
        self.to_load(loader, qty);
        LoadGuard::new(self.clone(), loader.clone(), qty)
    }

    /// Whether `loader` is loading. Always `true` while the gate is up.
    pub fn is_loading(&self, loader: &LoaderId) -> bool {
        let inner = self.lock();
        let loading = inner.pool(loader).state.is_loading;
        inner.is_main_load || loading
    }

    /// Whether any of `loaders` (every loader if empty) is loading. Always
    /// `true` while the gate is up.
    pub fn is_any_loading(&self, loaders: &[LoaderId]) -> bool {
        let inner = self.lock();
        let loading = inner.any_over(loaders, |state| state.is_loading);
        inner.is_main_load || loading
    }

    /// Whether the splash-screen gate is still up.
    pub fn is_main_load(&self) -> bool {
        self.lock().is_main_load
    }

    /// Outstanding units of a single pool.
    pub fn outstanding(&self, loader: &LoaderId) -> u32 {
        self.lock().pool(loader).state.outstanding
    }

    /// Panics unless every one of `loaders` is a configured pool.
    pub(crate) fn ensure_known(&self, loaders: &[LoaderId]) {
        let inner = self.lock();
        for loader in loaders {
            inner.pool(loader);
        }
    }

    /// Sum of outstanding units over `loaders` (every loader if empty).
    pub fn total_to_load(&self, loaders: &[LoaderId]) -> u64 {
        self.lock().sum_over(loaders, |state| u64::from(state.outstanding))
    }

    /// Sum of peak outstanding units since each pool last drained, over
    /// `loaders` (every loader if empty).
    pub fn total_max_to_load(&self, loaders: &[LoaderId]) -> u64 {
        self.lock().sum_over(loaders, |state| u64::from(state.max_observed))
    }

    /// Completion of `loaders` (every loader if empty) in percent.
    ///
    /// `0.0` while the gate is up; `100.0` when no work was observed since
    /// the pools last drained; otherwise the completed share of the peak
    /// amount of work.
    pub fn progression_percent(&self, loaders: &[LoaderId]) -> f64 {
        let inner = self.lock();
        let outstanding = inner.sum_over(loaders, |state| u64::from(state.outstanding));
        let total = inner.sum_over(loaders, |state| u64::from(state.max_observed));
        if inner.is_main_load {
            return 0.0;
        }
        percent(outstanding, total)
    }

    /// The configured pools, ordered by name.
    pub fn loaders(&self) -> Vec<LoaderId> {
        self.lock().pools.keys().cloned().collect()
    }

    /// The loading signal of one pool.
    pub fn signal(&self, loader: &LoaderId) -> LoadingSignal {
        self.lock().pool(loader).signal.clone()
    }

    /// The aggregate signal: `Loading` while any pool is loading.
    pub fn any_signal(&self) -> LoadingSignal {
        self.any.clone()
    }

    /// The diagnostic event bus shared by this aggregator and its trackers.
    pub fn event_bus(&self) -> &EventBus<LoadingEvent> {
        &self.events
    }

    /// A receiver on the diagnostic event bus.
    pub fn events(&self) -> flume::Receiver<LoadingEvent> {
        self.events.receiver()
    }

    /// Pools that are loading and saw no activity for at least `threshold`
    /// as of `now`. A pool that never saw any activity counts from the
    /// aggregator's creation.
    pub fn stalled_loaders(&self, threshold: Duration, now: Instant) -> Vec<StalledLoader> {
        let inner = self.lock();
        inner
            .pools
            .iter()
            .filter(|(_, pool)| pool.state.is_loading)
            .filter_map(|(id, pool)| {
                let last = pool.state.last_activity.unwrap_or(self.created_at);
                let idle = now.saturating_duration_since(last);
                (idle >= threshold).then(|| StalledLoader {
                    loader: id.clone(),
                    outstanding: pool.state.outstanding,
                    since: last,
                    idle,
                })
            })
            .collect()
    }

    /// A watchdog for this aggregator, if one was configured.
    pub fn watchdog(&self) -> Option<StallWatchdog> {
        self.watchdog.map(|config| StallWatchdog::new(self.clone(), config))
    }

    /// A serializable view of every pool.
    pub fn snapshot(&self) -> LoadingSnapshot {
        let inner = self.lock();
        let loaders = inner
            .pools
            .iter()
            .map(|(id, pool)| LoaderSnapshot {
                loader: id.clone(),
                outstanding: pool.state.outstanding,
                max_observed: pool.state.max_observed,
                is_loading: pool.state.is_loading,
                signal: pool.signal.get(),
            })
            .collect();
        let progress = if inner.is_main_load {
            0.0
        } else {
            percent(
                inner.sum_over(&[], |state| u64::from(state.outstanding)),
                inner.sum_over(&[], |state| u64::from(state.max_observed)),
            )
        };

        LoadingSnapshot {
            is_main_load: inner.is_main_load,
            any: self.any.get(),
            progress,
            loaders,
        }
    }
}

impl Default for LoadingAggregator {
    /// An aggregator over `MAIN` and `TEXTS`, gated on `MAIN`.
    fn default() -> Self {
        Self::from_valid(LoadingConfig::default())
    }
}

impl fmt::Debug for LoadingAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("LoadingAggregator")
            .field("loaders", &inner.pools.keys().collect::<Vec<_>>())
            .field("gate_loader", &inner.gate_loader)
            .field("is_main_load", &inner.is_main_load)
            .field("any", &self.any.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GALLERY: LoaderId = LoaderId::from_static("GALLERY");

    fn lift_gate(aggregator: &LoadingAggregator) {
        aggregator.to_load(&LoaderId::MAIN, 1);
        aggregator.loaded(&LoaderId::MAIN, 1);
        assert!(!aggregator.is_main_load());
    }

    #[test]
    fn fresh_aggregator_reports_loading_behind_the_gate() {
        let aggregator = LoadingAggregator::default();
        assert!(aggregator.is_main_load());
        assert!(aggregator.is_any_loading(&[]));
        assert!(aggregator.is_loading(&LoaderId::TEXTS));
        assert_eq!(aggregator.progression_percent(&[]), 0.0);
        assert_eq!(aggregator.any_signal().get(), TriState::Unknown);
        assert_eq!(aggregator.signal(&LoaderId::MAIN).get(), TriState::Unknown);
    }

    #[test]
    fn gate_lifts_on_first_main_drain_only() {
        let aggregator = LoadingAggregator::default();

        aggregator.to_load(&LoaderId::TEXTS, 1);
        aggregator.loaded(&LoaderId::TEXTS, 1);
        assert!(aggregator.is_main_load());

        lift_gate(&aggregator);
        assert!(!aggregator.is_any_loading(&[]));
        assert_eq!(aggregator.progression_percent(&[]), 100.0);

        aggregator.to_load(&LoaderId::MAIN, 1);
        assert!(!aggregator.is_main_load());
        assert!(aggregator.is_loading(&LoaderId::MAIN));
    }

    #[test]
    fn ungated_aggregator_starts_idle() {
        let config = LoadingConfig::default().gated_on(None);
        let aggregator = LoadingAggregator::new(config).unwrap();
        assert!(!aggregator.is_main_load());
        assert!(!aggregator.is_any_loading(&[]));
        assert!(!aggregator.is_loading(&LoaderId::MAIN));
        assert_eq!(aggregator.progression_percent(&[]), 100.0);
    }

    #[test]
    fn drain_resets_flags_and_emits_idle() {
        let aggregator = LoadingAggregator::default();
        lift_gate(&aggregator);
        let rx = aggregator.signal(&LoaderId::TEXTS).subscribe();

        aggregator.to_load(&LoaderId::TEXTS, 3);
        aggregator.loaded(&LoaderId::TEXTS, 3);

        assert!(!aggregator.is_loading(&LoaderId::TEXTS));
        assert_eq!(aggregator.total_max_to_load(&[LoaderId::TEXTS]), 0);
        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![TriState::Unknown, TriState::Loading, TriState::Idle]
        );
    }

    #[test]
    fn partial_completion_does_not_flip_pool_signal() {
        let aggregator = LoadingAggregator::default();
        aggregator.to_load(&LoaderId::TEXTS, 2);
        let rx = aggregator.signal(&LoaderId::TEXTS).subscribe();

        aggregator.loaded(&LoaderId::TEXTS, 1);

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![TriState::Loading]);
        assert_eq!(aggregator.outstanding(&LoaderId::TEXTS), 1);
    }

    #[test]
    fn aggregate_stays_loading_until_last_pool_drains() {
        let aggregator = LoadingAggregator::default();
        lift_gate(&aggregator);

        aggregator.to_load(&LoaderId::MAIN, 1);
        aggregator.to_load(&LoaderId::TEXTS, 1);
        aggregator.loaded(&LoaderId::MAIN, 1);
        assert!(aggregator.is_any_loading(&[]));
        assert_eq!(aggregator.any_signal().get(), TriState::Loading);

        aggregator.loaded(&LoaderId::TEXTS, 1);
        assert!(!aggregator.is_any_loading(&[]));
        assert_eq!(aggregator.any_signal().get(), TriState::Idle);
    }

    #[test]
    fn is_any_loading_respects_the_selection() {
        let aggregator = LoadingAggregator::default();
        lift_gate(&aggregator);
        aggregator.to_load(&LoaderId::TEXTS, 1);

        assert!(aggregator.is_any_loading(&[LoaderId::TEXTS]));
        assert!(!aggregator.is_any_loading(&[LoaderId::MAIN]));
        assert!(aggregator.is_any_loading(&[LoaderId::MAIN, LoaderId::TEXTS]));
    }

    #[test]
    fn over_completion_is_clamped_and_reported() {
        let aggregator = LoadingAggregator::default();
        let events = aggregator.events();
        aggregator.to_load(&LoaderId::TEXTS, 1);
        aggregator.loaded(&LoaderId::TEXTS, 4);

        assert_eq!(aggregator.outstanding(&LoaderId::TEXTS), 0);
        let anomalies: Vec<_> = events.try_iter().filter(LoadingEvent::is_anomaly).collect();
        assert_eq!(
            anomalies,
            vec![LoadingEvent::OverCompletion {
                loader: LoaderId::TEXTS,
                reported: 4,
                outstanding: 1,
            }]
        );
    }

    #[test]
    fn totals_cover_selected_or_all_pools() {
        let config = LoadingConfig::with_loaders([LoaderId::MAIN, LoaderId::TEXTS, GALLERY]);
        let aggregator = LoadingAggregator::new(config).unwrap();
        aggregator.to_load(&LoaderId::TEXTS, 2);
        aggregator.to_load(&GALLERY, 5);
        aggregator.loaded(&GALLERY, 1);

        assert_eq!(aggregator.total_to_load(&[]), 6);
        assert_eq!(aggregator.total_max_to_load(&[]), 7);
        assert_eq!(aggregator.total_to_load(&[GALLERY]), 4);
        assert_eq!(aggregator.total_max_to_load(&[GALLERY]), 5);
    }

    #[test]
    fn progress_follows_peak_work() {
        let aggregator = LoadingAggregator::default();
        lift_gate(&aggregator);

        aggregator.to_load(&LoaderId::MAIN, 4);
        let mut seen = vec![aggregator.progression_percent(&[LoaderId::MAIN])];
        for _ in 0..4 {
            aggregator.loaded(&LoaderId::MAIN, 1);
            seen.push(aggregator.progression_percent(&[LoaderId::MAIN]));
        }
        assert_eq!(seen, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn snapshot_lists_every_pool() {
        let aggregator = LoadingAggregator::default();
        aggregator.to_load(&LoaderId::TEXTS, 2);
        let snapshot = aggregator.snapshot();

        assert!(snapshot.is_main_load);
        assert_eq!(snapshot.any, TriState::Loading);
        assert_eq!(snapshot.progress, 0.0);
        let names: Vec<_> = snapshot.loaders.iter().map(|l| l.loader.as_str()).collect();
        assert_eq!(names, vec!["MAIN", "TEXTS"]);
        assert_eq!(snapshot.loaders[1].outstanding, 2);
        assert_eq!(snapshot.loaders[1].signal, TriState::Loading);
    }

    #[test]
    fn clones_share_counters() {
        let aggregator = LoadingAggregator::default();
        let consumer = aggregator.clone();
        aggregator.to_load(&LoaderId::TEXTS, 1);
        assert_eq!(consumer.outstanding(&LoaderId::TEXTS), 1);
    }

    #[test]
    #[should_panic(expected = "unknown loader `GALLERY`")]
    fn unknown_loader_fails_fast() {
        let aggregator = LoadingAggregator::default();
        aggregator.to_load(&GALLERY, 1);
    }

    #[test]
    #[should_panic(expected = "unknown loader")]
    fn unknown_loader_in_selection_fails_fast() {
        let aggregator = LoadingAggregator::default();
        aggregator.to_load(&LoaderId::MAIN, 1);
        aggregator.is_any_loading(&[LoaderId::MAIN, GALLERY]);
    }
}
