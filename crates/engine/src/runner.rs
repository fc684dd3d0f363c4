//! Suite runner that drives compiled scenarios and collects reports

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use apiverify_common::{Configuration, Result};

use crate::executor::{Exchange, Executor};
use crate::scenario::{Scenario, ScenarioReport, ScenarioRunner};
use crate::suite::Suite;

/// File written by [`write_results`]
pub const RESULTS_FILE: &str = "results.json";

/// Result of running one suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs suites through a [`ScenarioRunner`]
pub struct SuiteRunner<E> {
    scenarios: ScenarioRunner<E>,
    concurrency: usize,
}

impl SuiteRunner<Executor> {
    /// Runner backed by a real HTTP executor
    pub fn from_config(config: Arc<Configuration>) -> Result<Self> {
        Ok(Self::new(Executor::new(config)?))
    }
}

impl<E: Exchange> SuiteRunner<E> {
    pub fn new(exchange: E) -> Self {
        Self {
            scenarios: ScenarioRunner::new(exchange),
            concurrency: 1,
        }
    }

    /// Number of scenarios in flight at once. Suites that build on
    /// server-side state from earlier scenarios need the default of 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn scenario_runner(&self) -> &ScenarioRunner<E> {
        &self.scenarios
    }

    /// Run every scenario of `suite`. The whole suite is compiled first, so a
    /// broken definition fails before any request is sent.
    pub async fn run_suite(&self, suite: &Suite) -> Result<SuiteReport> {
        let compiled = suite.compile()?;
        Ok(self.run_compiled(suite, &compiled).await)
    }

    /// Run suites one after another. Every suite is compiled before the first
    /// request goes out.
    pub async fn run_suites(&self, suites: &[Suite]) -> Result<Vec<SuiteReport>> {
        let compiled = suites
            .iter()
            .map(Suite::compile)
            .collect::<Result<Vec<_>>>()?;

        let mut reports = Vec::with_capacity(suites.len());
        for (suite, scenarios) in suites.iter().zip(&compiled) {
            reports.push(self.run_compiled(suite, scenarios).await);
        }
        Ok(reports)
    }

    async fn run_compiled(&self, suite: &Suite, compiled: &[Scenario]) -> SuiteReport {
        let start = Instant::now();

        info!("Running suite {} ({} scenario(s))...", suite.name, compiled.len());

        let outcomes: Vec<_> = stream::iter(compiled.iter().map(|scenario| async move {
            (scenario, self.scenarios.run(scenario).await)
        }))
        .buffered(self.concurrency)
        .collect()
        .await;

        let mut scenarios = Vec::with_capacity(outcomes.len());
        let mut passed = 0;
        let mut failed = 0;

        for (scenario, outcome) in outcomes {
            let report = match outcome {
                Ok(report) => report,
                Err(e) => ScenarioReport::errored(scenario, &e),
            };
            if report.passed() {
                passed += 1;
                info!("✓ {} ({} ms)", report.name, report.duration_ms);
            } else {
                failed += 1;
                error!(
                    "✗ {} - {}",
                    report.name,
                    report.failure_summary().as_deref().unwrap_or("unknown failure")
                );
            }
            scenarios.push(report);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Suite {}: {} passed, {} failed ({} ms)",
            suite.name, passed, failed, duration_ms
        );

        SuiteReport {
            name: suite.name.clone(),
            total: scenarios.len(),
            passed,
            failed,
            duration_ms,
            scenarios,
        }
    }
}

/// Write reports to `dir/results.json`
pub fn write_results(dir: &Path, reports: &[SuiteReport]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(RESULTS_FILE);
    let json = serde_json::to_string_pretty(reports)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}
