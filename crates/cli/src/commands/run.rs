//! Run Command

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use apiverify_common::{install, ConfigFile, Configuration};
use apiverify_engine::{write_results, SuiteReport, SuiteRunner, TracingObserver};

use super::SuiteArgs;
use crate::output::{print_structured, print_success, print_warning, render_table, OutputFormat, TableDisplay};

/// Configuration file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "apiverify.toml";

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub suites: SuiteArgs,

    /// TOML configuration file
    #[arg(long, env = "APIVERIFY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the service under test
    #[arg(long, env = "APIVERIFY_BASE_URL")]
    pub base_url: Option<String>,

    /// Path prefix joined between the base URL and every request path
    #[arg(long, env = "APIVERIFY_BASE_PATH")]
    pub base_path: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "APIVERIFY_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Log every request and response
    #[arg(long, env = "APIVERIFY_LOG_EXCHANGES")]
    pub log_exchanges: bool,

    /// Scenarios in flight at once
    #[arg(long, default_value = "1", env = "APIVERIFY_CONCURRENCY")]
    pub concurrency: usize,

    /// Directory for results.json
    #[arg(long, default_value = "test-results", env = "APIVERIFY_OUTPUT")]
    pub output: PathBuf,
}

impl RunArgs {
    /// File settings with command-line overrides applied
    pub fn resolve_config(&self) -> Result<ConfigFile> {
        let mut file = match &self.config {
            Some(path) => Configuration::from_file(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Configuration::from_file(Path::new(DEFAULT_CONFIG_FILE))
                    .with_context(|| format!("Failed to read config {DEFAULT_CONFIG_FILE}"))?
            }
            None => ConfigFile::default(),
        };

        if let Some(base_url) = &self.base_url {
            file.base_url = base_url.clone();
        }
        if let Some(base_path) = &self.base_path {
            file.base_path = base_path.clone();
        }
        if let Some(timeout_secs) = self.timeout_secs {
            file.timeout_secs = timeout_secs;
        }
        file.log_exchanges |= self.log_exchanges;

        Ok(file)
    }
}

/// One scenario row in the run summary
#[derive(Serialize)]
pub struct ScenarioRow {
    pub suite: String,
    pub scenario: String,
    pub shape: String,
    pub passed: bool,
    pub duration_ms: u64,
    pub details: String,
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Scenario", "Shape", "Result", "Duration", "Details"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.suite.clone(),
            self.scenario.clone(),
            self.shape.clone(),
            if self.passed { "✓".green().to_string() } else { "✗".red().to_string() },
            format!("{}ms", self.duration_ms),
            self.details.clone(),
        ]
    }
}

pub fn scenario_rows(reports: &[SuiteReport]) -> Vec<ScenarioRow> {
    reports
        .iter()
        .flat_map(|report| {
            report.scenarios.iter().map(move |scenario| ScenarioRow {
                suite: report.name.clone(),
                scenario: scenario.name.clone(),
                shape: scenario.shape.clone(),
                passed: scenario.passed(),
                duration_ms: scenario.duration_ms,
                details: scenario.failure_summary().unwrap_or_default(),
            })
        })
        .collect()
}

pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<bool> {
    let file = args.resolve_config()?;
    let log_exchanges = file.log_exchanges;

    let mut builder = file.into_builder();
    if log_exchanges {
        builder = builder.observer(Arc::new(TracingObserver));
    }
    let config = install(builder.build()?)?;
    debug!("Using {:?}", config);

    let suites = args.suites.load()?;
    if suites.is_empty() {
        bail!("No scenarios matched in {}", args.suites.suites.display());
    }

    let runner = SuiteRunner::from_config(config)?.with_concurrency(args.concurrency);
    let reports = runner.run_suites(&suites).await?;
    let path = write_results(&args.output, &reports)?;

    let total: usize = reports.iter().map(|r| r.total).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    let duration_ms: u64 = reports.iter().map(|r| r.duration_ms).sum();

    match format {
        OutputFormat::Table => {
            println!("{}", render_table(&scenario_rows(&reports)));
            println!(
                "{} passed, {} failed ({} ms)",
                (total - failed).to_string().green().bold(),
                failed.to_string().red().bold(),
                duration_ms
            );
            if failed == 0 {
                print_success(&format!("All {} scenario(s) passed", total));
            } else {
                print_warning(&format!("{} of {} scenario(s) failed", failed, total));
            }
        }
        _ => print_structured(&reports, format),
    }

    info!("Results written to {}", path.display());
    Ok(failed == 0)
}
