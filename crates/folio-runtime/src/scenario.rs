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

//! Scripted page loads.
//!
//! A scenario is a JSON document listing the events a page would produce
//! while it loads: texts registered and completed directly, images reported
//! through the resource tracker, and report points.

use anyhow::{bail, Context, Result};
use folio_core::{LoaderId, LoadingConfig, ResourceId};
use folio_loading::{LoadingAggregator, ResourceLoadTracker, StallWatchdog};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt::{self, Display};
use std::path::Path;

fn one() -> u32 {
    1
}

/// One event of a scripted page load.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Direct registration of units, as a text fetch does.
    ToLoad {
        loader: LoaderId,
        #[serde(default = "one")]
        qty: u32,
    },
    /// Direct completion of units.
    Loaded {
        loader: LoaderId,
        #[serde(default = "one")]
        qty: u32,
    },
    /// A resource (identified by its URL) started loading.
    ResourceLoading {
        resource: String,
        loaders: Vec<LoaderId>,
    },
    /// A resource finished loading or failed.
    ResourceLoaded {
        resource: String,
        loaders: Vec<LoaderId>,
    },
    /// Drop tracker entries for settled resources.
    Prune,
    /// Log a full snapshot.
    Report,
}

impl Step {
    fn loaders(&self) -> Vec<&LoaderId> {
        match self {
            Step::ToLoad { loader, .. } | Step::Loaded { loader, .. } => vec![loader],
            Step::ResourceLoading { loaders, .. } | Step::ResourceLoaded { loaders, .. } => {
                loaders.iter().collect()
            }
            Step::Prune | Step::Report => Vec::new(),
        }
    }
}

fn join(loaders: &[LoaderId]) -> String {
    loaders
        .iter()
        .map(LoaderId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

impl Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::ToLoad { loader, qty } => write!(f, "to_load {loader} x{qty}"),
            Step::Loaded { loader, qty } => write!(f, "loaded {loader} x{qty}"),
            Step::ResourceLoading { resource, loaders } => {
                write!(f, "loading {resource} [{}]", join(loaders))
            }
            Step::ResourceLoaded { resource, loaders } => {
                write!(f, "loaded {resource} [{}]", join(loaders))
            }
            Step::Prune => f.write_str("prune"),
            Step::Report => f.write_str("report"),
        }
    }
}

/// A complete scripted page load.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Inline aggregator settings; the defaults apply when absent.
    #[serde(default)]
    pub config: Option<LoadingConfig>,
    /// The events, in the order the page produces them.
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parses a scenario from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse scenario")
    }

    /// Reads a scenario from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json(&content)
    }

    /// Rejects steps naming loaders that `config` does not declare, so the
    /// replay never trips the aggregator's unknown-loader check.
    pub fn check_loaders(&self, config: &LoadingConfig) -> Result<()> {
        let known: HashSet<&LoaderId> = config.loaders.iter().collect();
        for (index, step) in self.steps.iter().enumerate() {
            if let Some(unknown) = step.loaders().into_iter().find(|l| !known.contains(l)) {
                bail!("step {} ({step}) uses undeclared loader `{unknown}`", index + 1);
            }
        }
        Ok(())
    }
}

/// The state of the page after one step.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    /// 1-based step number.
    pub index: usize,
    /// What the step did.
    pub step: String,
    /// Overall progress in percent.
    pub percent: f64,
    /// Whether the loading overlay is shown.
    pub any_loading: bool,
}

impl Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:<3} {:<40} {:>6.1}%  {}",
            self.index,
            self.step,
            self.percent,
            if self.any_loading { "loading" } else { "ready" }
        )
    }
}

/// Replays steps against a fresh aggregator.
pub struct ScenarioRunner {
    aggregator: LoadingAggregator,
    tracker: ResourceLoadTracker,
    watchdog: Option<StallWatchdog>,
}

impl ScenarioRunner {
    /// Builds the aggregator, tracker and optional watchdog for `config`.
    pub fn new(config: LoadingConfig) -> Result<Self> {
        let aggregator =
            LoadingAggregator::new(config).context("Invalid loading configuration")?;
        let tracker = ResourceLoadTracker::new(aggregator.clone());
        let watchdog = aggregator.watchdog();
        Ok(Self {
            aggregator,
            tracker,
            watchdog,
        })
    }

    /// Applies one step.
    pub fn apply(&mut self, step: &Step) {
        match step {
            Step::ToLoad { loader, qty } => self.aggregator.to_load(loader, *qty),
            Step::Loaded { loader, qty } => self.aggregator.loaded(loader, *qty),
            Step::ResourceLoading { resource, loaders } => self
                .tracker
                .resource_loading(&ResourceId::from_locator(resource), loaders),
            Step::ResourceLoaded { resource, loaders } => self
                .tracker
                .resource_loaded_or_errored(&ResourceId::from_locator(resource), loaders),
            Step::Prune => {
                let removed = self.tracker.prune_settled();
                log::info!("Pruned {removed} settled resources.");
            }
            Step::Report => {
                let snapshot = self.aggregator.snapshot();
                for pool in &snapshot.loaders {
                    log::info!(
                        "[{}] {}/{} outstanding, signal {:?}",
                        pool.loader,
                        pool.outstanding,
                        pool.max_observed,
                        pool.signal
                    );
                }
            }
        }

        if let Some(watchdog) = &mut self.watchdog {
            watchdog.tick();
        }
    }

    /// Applies every step and returns the progress after each one.
    pub fn run(&mut self, steps: &[Step]) -> Vec<ProgressLine> {
        steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                self.apply(step);
                ProgressLine {
                    index: index + 1,
                    step: step.to_string(),
                    percent: self.aggregator.progression_percent(&[]),
                    any_loading: self.aggregator.is_any_loading(&[]),
                }
            })
            .collect()
    }

    /// The aggregator driven by this runner.
    pub fn aggregator(&self) -> &LoadingAggregator {
        &self.aggregator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "steps": [
            { "op": "to_load", "loader": "TEXTS", "qty": 2 },
            { "op": "resource_loading", "resource": "img/hero.jpg", "loaders": ["MAIN"] },
            { "op": "resource_loading", "resource": "img/hero.jpg", "loaders": ["MAIN"] },
            { "op": "resource_loading", "resource": "img/me.png", "loaders": ["MAIN"] },
            { "op": "loaded", "loader": "TEXTS", "qty": 2 },
            { "op": "resource_loaded", "resource": "img/hero.jpg", "loaders": ["MAIN"] },
            { "op": "resource_loaded", "resource": "img/hero.jpg", "loaders": ["MAIN"] },
            { "op": "resource_loaded", "resource": "img/me.png", "loaders": ["MAIN"] },
            { "op": "prune" },
            { "op": "report" }
        ]
    }"#;

    #[test]
    fn parses_steps_with_default_quantity() {
        let scenario =
            Scenario::from_json(r#"{ "steps": [{ "op": "loaded", "loader": "MAIN" }] }"#).unwrap();
        assert!(scenario.config.is_none());
        assert_eq!(
            scenario.steps,
            vec![Step::Loaded {
                loader: LoaderId::MAIN,
                qty: 1
            }]
        );
    }

    #[test]
    fn replays_a_page_load() {
        let scenario = Scenario::from_json(PAGE).unwrap();
        let mut runner = ScenarioRunner::new(LoadingConfig::default()).unwrap();
        let lines = runner.run(&scenario.steps);

        assert_eq!(lines.len(), 10);
        assert!(lines[..7].iter().all(|l| l.any_loading && l.percent == 0.0));
        assert!(!lines[7].any_loading);
        assert_eq!(lines[7].percent, 100.0);
        assert_eq!(lines[7].step, "loaded img/me.png [MAIN]");
        assert!(!runner.aggregator().is_main_load());
    }

    #[test]
    fn undeclared_loader_is_rejected_before_replay() {
        let scenario = Scenario::from_json(
            r#"{ "steps": [{ "op": "to_load", "loader": "GALLERY", "qty": 1 }] }"#,
        )
        .unwrap();
        let err = scenario
            .check_loaders(&LoadingConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("GALLERY"));
    }

    #[test]
    fn inline_config_is_parsed() {
        let scenario = Scenario::from_json(
            r#"{ "config": { "loaders": ["GALLERY"], "gate_loader": null }, "steps": [] }"#,
        )
        .unwrap();
        let config = scenario.config.unwrap();
        assert_eq!(config.loaders, vec![LoaderId::new("GALLERY")]);
        assert_eq!(config.gate_loader, None);
    }

    #[test]
    fn reads_scenario_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.json");
        std::fs::write(&path, PAGE).unwrap();
        assert_eq!(Scenario::from_file(&path).unwrap().steps.len(), 10);
        assert!(Scenario::from_file(dir.path().join("missing.json")).is_err());
    }
}
