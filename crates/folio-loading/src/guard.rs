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

//! RAII-based completion reporting for directly registered work.

use crate::aggregator::LoadingAggregator;
use folio_core::LoaderId;

/// Reports its units as loaded when it goes out of scope.
///
/// Returned by [`LoadingAggregator::begin`]. Because the report happens in
/// `Drop`, an early return or a `?` on the fetch path cannot leave the pool
/// stuck in the loading state.
#[must_use = "dropping the guard immediately reports its units as loaded"]
#[derive(Debug)]
pub struct LoadGuard {
    aggregator: LoadingAggregator,
    loader: LoaderId,
    qty: u32,
    armed: bool,
}

impl LoadGuard {
    pub(crate) fn new(aggregator: LoadingAggregator, loader: LoaderId, qty: u32) -> Self {
        Self {
            aggregator,
            loader,
            qty,
            armed: true,
        }
    }

    /// The pool the units were registered on.
    pub fn loader(&self) -> &LoaderId {
        &self.loader
    }

    /// The number of units this guard will report.
    pub fn qty(&self) -> u32 {
        self.qty
    }

    /// Reports the units as loaded now.
    pub fn finish(self) {
        drop(self);
    }

    /// Disarms the guard; the caller becomes responsible for calling
    /// [`LoadingAggregator::loaded`].
    pub fn forget(mut self) {
        self.armed = false;
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            self.aggregator.loaded(&self.loader, self.qty);
        }
    }
}
