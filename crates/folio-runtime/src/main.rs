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

// Folio Runtime
// Replays a scripted page load and prints the loading overlay state.

mod scenario;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use folio_core::LoadingConfig;

use crate::scenario::{Scenario, ScenarioRunner};

const USAGE: &str = "Usage: folio-runtime [--config LOADING.json] SCENARIO.json";

struct Args {
    config: Option<PathBuf>,
    scenario: PathBuf,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut config = None;
        let mut scenario = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    let path = args.next().context("--config expects a path")?;
                    config = Some(PathBuf::from(path));
                }
                "-h" | "--help" => bail!("{USAGE}"),
                _ if scenario.is_none() => scenario = Some(PathBuf::from(&arg)),
                _ => bail!("unexpected argument `{arg}`\n{USAGE}"),
            }
        }

        let scenario = scenario.with_context(|| format!("missing scenario file\n{USAGE}"))?;
        Ok(Self { config, scenario })
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse(std::env::args().skip(1))?;
    let scenario = Scenario::from_file(&args.scenario)?;

    let config = match &args.config {
        Some(path) => LoadingConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => scenario.config.clone().unwrap_or_default(),
    };
    scenario.check_loaders(&config)?;

    log::info!(
        "Replaying {} steps from {}.",
        scenario.steps.len(),
        args.scenario.display()
    );
    let mut runner = ScenarioRunner::new(config)?;
    for line in runner.run(&scenario.steps) {
        println!("{line}");
    }

    for event in runner.aggregator().event_bus().drain() {
        if event.is_anomaly() {
            log::warn!("{event:?}");
        } else {
            log::debug!("{event:?}");
        }
    }

    let snapshot = runner.aggregator().snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
