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

//! # Folio Loading
//!
//! Tracks how much asynchronous work (translated texts, images...) is still
//! outstanding across named pools, and turns it into the two things a loading
//! overlay needs: an "is anything still loading" signal and a progress
//! percentage.
//!
//! - [`LoadingAggregator`] owns the per-pool counters and signals.
//! - [`ResourceLoadTracker`] sits in front of it for resources that may report
//!   the same transition several times.
//! - [`LoadGuard`] reports directly registered work when dropped.
//! - [`StallWatchdog`] reports pools that stopped making progress.

#![warn(missing_docs)]

pub mod aggregator;
pub mod guard;
pub mod state;
pub mod tracker;
pub mod watchdog;

pub use aggregator::LoadingAggregator;
pub use guard::LoadGuard;
pub use state::{LoaderSnapshot, LoadingSnapshot};
pub use tracker::ResourceLoadTracker;
pub use watchdog::{StallWatchdog, StalledLoader};
