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

//! # Folio Core
//!
//! Foundational crate containing the identifiers, observable primitives, and
//! configuration contracts shared by the loading-progress services.
//!
//! Nothing in here decides *how* loading is counted; that policy lives in
//! `folio-loading`. This crate only defines the common language: which pools
//! exist ([`LoaderId`]), which resources are reported ([`ResourceId`]), how a
//! loading flag is observed ([`Signal`], [`TriState`]) and which diagnostics are
//! published ([`LoadingEvent`] over an [`EventBus`]).

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod loader;
pub mod resource;
pub mod signal;

pub use config::{LoadingConfig, WatchdogConfig};
pub use error::{LoadingError, LoadingResult};
pub use event::{EventBus, LoadingEvent};
pub use loader::LoaderId;
pub use resource::ResourceId;
pub use signal::{LoadingSignal, Signal, TriState};
