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

//! Configuration of the loading services.

use crate::error::{LoadingError, LoadingResult};
use crate::loader::LoaderId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Settings of the optional, report-only stall watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// A loading pool with no activity for this long is reported as stalled.
    pub stall_after_ms: u64,
    /// Minimum time between two watchdog sweeps.
    #[serde(default = "WatchdogConfig::default_check_interval_ms")]
    pub check_interval_ms: u64,
}

impl WatchdogConfig {
    fn default_check_interval_ms() -> u64 {
        1_000
    }

    /// The stall threshold as a [`Duration`].
    pub fn stall_after(&self) -> Duration {
        Duration::from_millis(self.stall_after_ms)
    }

    /// The sweep interval as a [`Duration`].
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

/// The complete configuration of a loading aggregator.
///
/// Missing fields take their value from [`LoadingConfig::default`], so `{}` is
/// a valid configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    /// Every pool the aggregator will know about. Fixed for its lifetime.
    pub loaders: Vec<LoaderId>,
    /// The pool whose first drain lifts the splash-screen gate. `None` disables
    /// the gate.
    pub gate_loader: Option<LoaderId>,
    /// Optional stall watchdog.
    pub watchdog: Option<WatchdogConfig>,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            loaders: vec![LoaderId::MAIN, LoaderId::TEXTS],
            gate_loader: Some(LoaderId::MAIN),
            watchdog: None,
        }
    }
}

impl LoadingConfig {
    /// Creates a configuration with the given loaders, gated on the first one.
    pub fn with_loaders(loaders: impl IntoIterator<Item = LoaderId>) -> Self {
        let loaders: Vec<LoaderId> = loaders.into_iter().collect();
        let gate_loader = loaders.first().cloned();
        Self {
            loaders,
            gate_loader,
            watchdog: None,
        }
    }

    /// Replaces the gate loader.
    pub fn gated_on(mut self, loader: Option<LoaderId>) -> Self {
        self.gate_loader = loader;
        self
    }

    /// Enables the stall watchdog.
    pub fn with_watchdog(mut self, watchdog: WatchdogConfig) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// Checks the invariants an aggregator relies on.
    pub fn validate(&self) -> LoadingResult<()> {
        if self.loaders.is_empty() {
            return Err(LoadingError::NoLoaders);
        }

        let mut seen = HashSet::with_capacity(self.loaders.len());
        for loader in &self.loaders {
            if !seen.insert(loader) {
                return Err(LoadingError::DuplicateLoader(loader.clone()));
            }
        }

        if let Some(gate) = &self.gate_loader {
            if !seen.contains(gate) {
                return Err(LoadingError::UnknownGateLoader(gate.clone()));
            }
        }

        if let Some(watchdog) = &self.watchdog {
            if watchdog.stall_after_ms == 0 {
                return Err(LoadingError::InvalidWatchdog(
                    "stall_after_ms must be greater than zero".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Parses and validates a configuration from a JSON string.
    pub fn from_json(json: &str) -> LoadingResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> LoadingResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn to_file(&self, path: impl AsRef<Path>) -> LoadingResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| LoadingError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
