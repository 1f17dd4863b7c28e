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

//! Deduplication of per-resource load notifications.
//!
//! Elements such as images may fire their `load`/`error` events more than
//! once, and a retry path may announce the same resource as loading again.
//! The [`ResourceLoadTracker`] remembers, for every (resource, loader) pair,
//! whether the resource is currently counted as pending, so each pair adds
//! at most one unit and removes at most one unit per loading episode.

use crate::aggregator::LoadingAggregator;
use folio_core::{LoaderId, LoadingEvent, ResourceId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Adapts "started" / "finished" events of many resources into idempotent
/// aggregator updates.
///
/// Generic over the resource handle; [`ResourceId`] is the default.
#[derive(Debug)]
pub struct ResourceLoadTracker<K = ResourceId> {
    aggregator: LoadingAggregator,
    /// resource -> loader -> done
    resources: HashMap<K, HashMap<LoaderId, bool>>,
}

impl<K> ResourceLoadTracker<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Creates a tracker that reports to `aggregator`.
    pub fn new(aggregator: LoadingAggregator) -> Self {
        Self {
            aggregator,
            resources: HashMap::new(),
        }
    }

    /// Counts `resource` as one pending unit on each of `loaders`, unless it
    /// is already pending there.
    ///
    /// A resource that completed earlier is counted again: it starts a new
    /// loading episode.
    ///
    /// # Panics
    ///
    /// Panics if one of `loaders` is unknown to the aggregator.
    pub fn resource_loading(&mut self, resource: &K, loaders: &[LoaderId]) {
        for loader in loaders {
            let already_pending = self
                .resources
                .get(resource)
                .and_then(|flags| flags.get(loader))
                .is_some_and(|done| !done);
            if already_pending {
                log::trace!("[{loader}] {resource:?} is already counted as pending.");
                continue;
            }

            self.aggregator.to_load(loader, 1);
            self.resources
                .entry(resource.clone())
                .or_default()
                .insert(loader.clone(), false);

            let outstanding = self.aggregator.outstanding(loader);
            log::trace!("[{loader}] now {outstanding} units loading.");
            self.aggregator.event_bus().publish(LoadingEvent::ResourcePending {
                loader: loader.clone(),
                outstanding,
            });
        }
    }

    /// Reports `resource` as finished (loaded or failed) on each of
    /// `loaders` where it is pending. Other pairs are left untouched.
    ///
    /// # Panics
    ///
    /// Panics if one of `loaders` is unknown to the aggregator, even when the
    /// resource was never tracked.
    pub fn resource_loaded_or_errored(&mut self, resource: &K, loaders: &[LoaderId]) {
        self.aggregator.ensure_known(loaders);
        let Some(flags) = self.resources.get_mut(resource) else {
            log::trace!("{resource:?} finished without being tracked.");
            return;
        };

        for loader in loaders {
            match flags.get_mut(loader) {
                Some(done) if !*done => {
                    *done = true;
                    self.aggregator.loaded(loader, 1);
                }
                _ => log::trace!("[{loader}] {resource:?} is not pending, ignoring."),
            }
        }
    }

    /// Whether `resource` currently counts as a pending unit on `loader`.
    pub fn is_pending(&self, resource: &K, loader: &LoaderId) -> bool {
        self.resources
            .get(resource)
            .and_then(|flags| flags.get(loader))
            .is_some_and(|done| !done)
    }

    /// Number of resources with at least one recorded flag.
    pub fn tracked_len(&self) -> usize {
        self.resources.len()
    }

    /// Forgets resources that are done on every loader and returns how many
    /// were removed. Pruning never changes any count.
    pub fn prune_settled(&mut self) -> usize {
        let before = self.resources.len();
        self.resources.retain(|_, flags| flags.values().any(|done| !done));
        let removed = before - self.resources.len();
        if removed > 0 {
            log::debug!("Pruned {removed} settled resources.");
        }
        removed
    }

    /// The aggregator this tracker reports to.
    pub fn aggregator(&self) -> &LoadingAggregator {
        &self.aggregator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ResourceLoadTracker {
        ResourceLoadTracker::new(LoadingAggregator::default())
    }

    #[test]
    fn duplicate_loading_counts_once() {
        let mut tracker = tracker();
        let img = ResourceId::from_locator("img/avatar.png");

        tracker.resource_loading(&img, &[LoaderId::MAIN]);
        tracker.resource_loading(&img, &[LoaderId::MAIN]);

        assert_eq!(tracker.aggregator().outstanding(&LoaderId::MAIN), 1);
        assert!(tracker.is_pending(&img, &LoaderId::MAIN));
    }

    #[test]
    fn duplicate_completion_counts_once() {
        let mut tracker = tracker();
        let img = ResourceId::from_locator("img/avatar.png");
        tracker.aggregator().to_load(&LoaderId::MAIN, 1);
        tracker.resource_loading(&img, &[LoaderId::MAIN]);

        tracker.resource_loaded_or_errored(&img, &[LoaderId::MAIN]);
        tracker.resource_loaded_or_errored(&img, &[LoaderId::MAIN]);

        assert_eq!(tracker.aggregator().outstanding(&LoaderId::MAIN), 1);
        assert!(!tracker.is_pending(&img, &LoaderId::MAIN));
    }

    #[test]
    fn completion_of_unknown_resource_is_ignored() {
        let mut tracker = tracker();
        tracker.aggregator().to_load(&LoaderId::TEXTS, 1);
        tracker.resource_loaded_or_errored(&ResourceId::new(), &[LoaderId::TEXTS]);
        assert_eq!(tracker.aggregator().outstanding(&LoaderId::TEXTS), 1);
    }

    #[test]
    fn completion_on_untracked_loader_is_ignored() {
        let mut tracker = tracker();
        let img = ResourceId::new();
        tracker.aggregator().to_load(&LoaderId::TEXTS, 1);
        tracker.resource_loading(&img, &[LoaderId::MAIN]);

        tracker.resource_loaded_or_errored(&img, &[LoaderId::MAIN, LoaderId::TEXTS]);

        assert_eq!(tracker.aggregator().outstanding(&LoaderId::MAIN), 0);
        assert_eq!(tracker.aggregator().outstanding(&LoaderId::TEXTS), 1);
    }

    #[test]
    fn completed_resource_can_start_a_new_episode() {
        let mut tracker = tracker();
        let img = ResourceId::new();
        tracker.aggregator().to_load(&LoaderId::TEXTS, 1);

        tracker.resource_loading(&img, &[LoaderId::TEXTS]);
        tracker.resource_loaded_or_errored(&img, &[LoaderId::TEXTS]);
        tracker.resource_loading(&img, &[LoaderId::TEXTS]);

        assert_eq!(tracker.aggregator().outstanding(&LoaderId::TEXTS), 2);
    }

    #[test]
    fn one_resource_on_several_loaders() {
        let mut tracker = tracker();
        let img = ResourceId::new();

        tracker.resource_loading(&img, &[LoaderId::MAIN, LoaderId::TEXTS]);
        assert_eq!(tracker.aggregator().total_to_load(&[]), 2);

        tracker.resource_loaded_or_errored(&img, &[LoaderId::TEXTS]);
        assert!(tracker.is_pending(&img, &LoaderId::MAIN));
        assert!(!tracker.is_pending(&img, &LoaderId::TEXTS));
        assert_eq!(tracker.aggregator().total_to_load(&[]), 1);
    }

    #[test]
    fn pending_events_carry_the_new_count() {
        let mut tracker = tracker();
        let events = tracker.aggregator().events();
        tracker.aggregator().to_load(&LoaderId::MAIN, 2);
        tracker.resource_loading(&ResourceId::new(), &[LoaderId::MAIN]);

        let pending: Vec<_> = events
            .try_iter()
            .filter(|e| matches!(e, LoadingEvent::ResourcePending { .. }))
            .collect();
        assert_eq!(
            pending,
            vec![LoadingEvent::ResourcePending {
                loader: LoaderId::MAIN,
                outstanding: 3,
            }]
        );
    }

    #[test]
    fn prune_drops_only_settled_resources() {
        let mut tracker = tracker();
        let done = ResourceId::new();
        let pending = ResourceId::new();
        tracker.resource_loading(&done, &[LoaderId::TEXTS]);
        tracker.resource_loading(&pending, &[LoaderId::TEXTS]);
        tracker.resource_loaded_or_errored(&done, &[LoaderId::TEXTS]);

        assert_eq!(tracker.prune_settled(), 1);
        assert_eq!(tracker.tracked_len(), 1);
        assert!(tracker.is_pending(&pending, &LoaderId::TEXTS));
        assert_eq!(tracker.aggregator().outstanding(&LoaderId::TEXTS), 1);
    }

    #[test]
    #[should_panic(expected = "unknown loader `GALLERY`")]
    fn completion_on_unknown_loader_fails_fast() {
        let mut tracker = tracker();
        let img = ResourceId::new();
        tracker.resource_loading(&img, &[LoaderId::MAIN]);
        tracker.resource_loaded_or_errored(&img, &[LoaderId::new("GALLERY")]);
    }

    #[test]
    #[should_panic(expected = "unknown loader `GALLERY`")]
    fn completion_of_untracked_resource_still_checks_loaders() {
        let mut tracker = tracker();
        tracker.resource_loaded_or_errored(&ResourceId::new(), &[LoaderId::new("GALLERY")]);
    }

    #[test]
    fn string_handles_work_too() {
        let mut tracker: ResourceLoadTracker<&'static str> =
            ResourceLoadTracker::new(LoadingAggregator::default());
        tracker.resource_loading(&"hero.jpg", &[LoaderId::MAIN]);
        tracker.resource_loading(&"hero.jpg", &[LoaderId::MAIN]);
        assert_eq!(tracker.aggregator().outstanding(&LoaderId::MAIN), 1);
    }
}
