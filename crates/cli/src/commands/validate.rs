//! Validate Command
//!
//! Compiles every suite without sending a request, so broken paths,
//! ambiguous scenarios and malformed expectations surface early.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::SuiteArgs;
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub suites: SuiteArgs,
}

#[derive(Serialize)]
pub struct SuiteValidation {
    pub suite: String,
    pub file: String,
    pub scenarios: usize,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableDisplay for SuiteValidation {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "File", "Scenarios", "Status"]
    }

    fn row(&self) -> Vec<String> {
        let status = match &self.error {
            None => "✓ valid".green().to_string(),
            Some(e) => format!("{} {}", "✗".red(), e),
        };
        vec![
            self.suite.clone(),
            self.file.clone(),
            self.scenarios.to_string(),
            status,
        ]
    }
}

pub async fn execute(args: ValidateArgs, format: OutputFormat) -> Result<bool> {
    let suites = args.suites.load()?;

    let results: Vec<SuiteValidation> = suites
        .iter()
        .map(|suite| {
            let error = suite.compile().err().map(|e| e.to_string());
            SuiteValidation {
                suite: suite.name.clone(),
                file: suite
                    .source
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                scenarios: suite.scenarios.len(),
                valid: error.is_none(),
                error,
            }
        })
        .collect();

    print_list(&results, format);
    Ok(results.iter().all(|r| r.valid))
}
