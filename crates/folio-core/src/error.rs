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

//! Recoverable errors of the loading services.
//!
//! Only configuration problems are errors. Counter anomalies are clamped and
//! reported as [`LoadingEvent`](crate::LoadingEvent)s; an unknown loader passed
//! to a running aggregator is a contract violation and panics.

use crate::loader::LoaderId;
use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for loading configuration.
pub type LoadingResult<T> = Result<T, LoadingError>;

/// An error that can occur while building or reading a loading configuration.
#[derive(Debug, Error)]
pub enum LoadingError {
    /// The configuration declares no loader at all.
    #[error("no loaders configured")]
    NoLoaders,
    /// The same loader name appears twice.
    #[error("loader `{0}` is declared more than once")]
    DuplicateLoader(LoaderId),
    /// The gate loader is not part of the declared loaders.
    #[error("gate loader `{0}` is not one of the configured loaders")]
    UnknownGateLoader(LoaderId),
    /// The watchdog section is unusable.
    #[error("invalid watchdog settings: {0}")]
    InvalidWatchdog(String),
    /// Reading or writing the configuration file failed.
    #[error("failed to access loading config at {}", path.display())]
    Io {
        /// The file that was accessed.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The configuration is not valid JSON or does not match the schema.
    #[error("malformed loading config: {0}")]
    Json(#[from] serde_json::Error),
}
