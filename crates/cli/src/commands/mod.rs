//! CLI Commands

pub mod list;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::debug;

use apiverify_engine::Suite;

/// Where suites are loaded from and which scenarios to keep
#[derive(Args, Debug, Clone)]
pub struct SuiteArgs {
    /// Directory searched recursively for `.yaml` suites
    #[arg(long, default_value = "suites", env = "APIVERIFY_SUITES")]
    pub suites: PathBuf,

    /// Only scenarios tagged with this (or in a suite tagged with it)
    #[arg(long, env = "APIVERIFY_TAG")]
    pub tag: Option<String>,

    /// Only the scenario with this name
    #[arg(long)]
    pub name: Option<String>,
}

impl SuiteArgs {
    /// Load every suite and apply the tag and name filters. Suites left with
    /// no scenarios are dropped.
    pub fn load(&self) -> Result<Vec<Suite>> {
        let suites = Suite::load_all(&self.suites)
            .with_context(|| format!("Failed to load suites from {}", self.suites.display()))?;
        debug!("Loaded {} suite(s) from {}", suites.len(), self.suites.display());

        Ok(suites
            .iter()
            .map(|suite| suite.select(self.tag.as_deref(), self.name.as_deref()))
            .filter(|suite| !suite.scenarios.is_empty())
            .collect())
    }
}
