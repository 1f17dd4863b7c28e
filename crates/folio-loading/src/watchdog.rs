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

//! Report-only detection of pools that never finish.
//!
//! A resource that never reports completion keeps its pool loading forever.
//! The watchdog only makes that visible: it logs and publishes
//! [`LoadingEvent::Stalled`], and never touches the counters.

use crate::aggregator::LoadingAggregator;
use folio_core::{LoaderId, LoadingEvent, WatchdogConfig};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A pool that has been loading without activity for too long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledLoader {
    /// The idle pool.
    pub loader: LoaderId,
    /// Its outstanding units.
    pub outstanding: u32,
    /// Its last activity, or the aggregator's creation if it never saw any.
    pub since: Instant,
    /// Time since its last activity.
    pub idle: Duration,
}

/// Periodically sweeps an aggregator for stalled pools.
#[derive(Debug)]
pub struct StallWatchdog {
    aggregator: LoadingAggregator,
    config: WatchdogConfig,
    last_check: Instant,
    /// loader -> `since` of the stall last reported
    reported: HashMap<LoaderId, Instant>,
}

impl StallWatchdog {
    /// Creates a watchdog over `aggregator`.
    pub fn new(aggregator: LoadingAggregator, config: WatchdogConfig) -> Self {
        Self {
            aggregator,
            config,
            last_check: Instant::now(),
            reported: HashMap::new(),
        }
    }

    /// Should be called periodically (e.g., once per frame).
    /// Sweeps the aggregator if the check interval has passed and returns the
    /// newly stalled pools.
    pub fn tick(&mut self) -> Vec<StalledLoader> {
        if self.last_check.elapsed() < self.config.check_interval() {
            return Vec::new();
        }
        self.check_at(Instant::now())
    }

    /// Sweeps the aggregator as of `now`, ignoring the check interval.
    ///
    /// Each stall episode is reported once; a pool is reported again only
    /// after it saw activity or drained in between, even if both happened
    /// between two sweeps.
    pub fn check_at(&mut self, now: Instant) -> Vec<StalledLoader> {
        self.last_check = now;
        let stalled = self.aggregator.stalled_loaders(self.config.stall_after(), now);

        self.reported.retain(|loader, _| stalled.iter().any(|s| &s.loader == loader));

        let mut fresh = Vec::new();
        for entry in stalled {
            if self.reported.insert(entry.loader.clone(), entry.since) == Some(entry.since) {
                continue;
            }
            log::warn!(
                "[{}] still loading {} units after {:?} without activity.",
                entry.loader,
                entry.outstanding,
                entry.idle
            );
            self.aggregator.event_bus().publish(LoadingEvent::Stalled {
                loader: entry.loader.clone(),
                outstanding: entry.outstanding,
                idle: entry.idle,
            });
            fresh.push(entry);
        }
        fresh
    }
}
