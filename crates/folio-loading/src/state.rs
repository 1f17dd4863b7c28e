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

//! Per-pool counters and their serializable snapshots.

use folio_core::{LoaderId, TriState};
use serde::Serialize;
use std::time::Instant;

/// The counters of one loading pool.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoaderState {
    /// Units still to load. Never negative.
    pub(crate) outstanding: u32,
    /// Set on registration, cleared when `outstanding` returns to zero.
    pub(crate) is_loading: bool,
    /// High-water mark of `outstanding` since the last drain.
    pub(crate) max_observed: u32,
    /// Last `to_load` / `loaded` on this pool.
    pub(crate) last_activity: Option<Instant>,
}

impl LoaderState {
    pub(crate) fn gated() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub(crate) fn register(&mut self, qty: u32, now: Instant) {
        self.outstanding = self.outstanding.saturating_add(qty);
        self.is_loading = true;
        self.max_observed = self.max_observed.max(self.outstanding);
        self.last_activity = Some(now);
    }

    /// Applies a completion and returns the number of units that were
    /// outstanding before it.
    pub(crate) fn complete(&mut self, qty: u32, now: Instant) -> u32 {
        let before = self.outstanding;
        self.outstanding = before.saturating_sub(qty);
        self.last_activity = Some(now);
        if self.outstanding == 0 {
            self.is_loading = false;
            self.max_observed = 0;
        }
        before
    }
}

/// A point-in-time view of one pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoaderSnapshot {
    /// The pool.
    pub loader: LoaderId,
    /// Units still to load.
    pub outstanding: u32,
    /// Peak outstanding units since the last drain.
    pub max_observed: u32,
    /// The raw loading flag, ignoring the splash-screen gate.
    pub is_loading: bool,
    /// The last value emitted on the pool's signal.
    pub signal: TriState,
}

/// A point-in-time view of a whole aggregator, suitable for a debug overlay
/// or a JSON dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadingSnapshot {
    /// Whether the splash-screen gate is still up.
    pub is_main_load: bool,
    /// The last value emitted on the aggregate signal.
    pub any: TriState,
    /// Progress over all pools, in percent.
    pub progress: f64,
    /// Every pool, ordered by name.
    pub loaders: Vec<LoaderSnapshot>,
}
