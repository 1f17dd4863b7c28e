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

use crate::loader::LoaderId;
use std::time::Duration;

/// A diagnostic notification produced by the loading services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadingEvent {
    /// Units were registered as outstanding.
    Registered {
        /// The pool that grew.
        loader: LoaderId,
        /// How many units were added.
        qty: u32,
        /// Outstanding units after the update.
        outstanding: u32,
    },
    /// Units were reported complete.
    Completed {
        /// The pool that shrank.
        loader: LoaderId,
        /// How many units were reported.
        qty: u32,
        /// Outstanding units after the update.
        outstanding: u32,
    },
    /// More units were reported complete than were outstanding. The counter
    /// was clamped to zero.
    OverCompletion {
        /// The affected pool.
        loader: LoaderId,
        /// Units reported by the caller.
        reported: u32,
        /// Units that were actually outstanding.
        outstanding: u32,
    },
    /// A pool went back to zero outstanding units.
    Drained {
        /// The drained pool.
        loader: LoaderId,
    },
    /// The splash-screen gate was lifted because its pool drained for the
    /// first time.
    GateCleared {
        /// The gate pool.
        loader: LoaderId,
    },
    /// A tracked resource started loading; `outstanding` is the pool count
    /// right after it was counted.
    ResourcePending {
        /// The pool the resource was counted against.
        loader: LoaderId,
        /// Outstanding units in that pool.
        outstanding: u32,
    },
    /// A pool has been loading without any activity for longer than the
    /// watchdog threshold. Nothing was changed.
    Stalled {
        /// The idle pool.
        loader: LoaderId,
        /// Outstanding units in that pool.
        outstanding: u32,
        /// Time since the pool last saw a `to_load` or `loaded` call.
        idle: Duration,
    },
}

impl LoadingEvent {
    /// Returns the pool this event is about.
    pub fn loader(&self) -> &LoaderId {
        match self {
            LoadingEvent::Registered { loader, .. }
            | LoadingEvent::Completed { loader, .. }
            | LoadingEvent::OverCompletion { loader, .. }
            | LoadingEvent::Drained { loader }
            | LoadingEvent::GateCleared { loader }
            | LoadingEvent::ResourcePending { loader, .. }
            | LoadingEvent::Stalled { loader, .. } => loader,
        }
    }

    /// Returns `true` for events a host should surface as warnings.
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            LoadingEvent::OverCompletion { .. } | LoadingEvent::Stalled { .. }
        )
    }
}
