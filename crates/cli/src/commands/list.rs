//! List Command

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::SuiteArgs;
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub suites: SuiteArgs,
}

/// One scenario as shown by `apiverify list`
#[derive(Serialize)]
pub struct ScenarioEntry {
    pub suite: String,
    pub scenario: String,
    pub shape: String,
    pub method: String,
    pub path: String,
    pub runs: usize,
    pub tags: Vec<String>,
}

impl TableDisplay for ScenarioEntry {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Scenario", "Shape", "Method", "Path", "Runs", "Tags"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.suite.clone(),
            self.scenario.clone(),
            self.shape.clone(),
            self.method.clone(),
            self.path.clone(),
            self.runs.to_string(),
            self.tags.join(", "),
        ]
    }
}

pub async fn execute(args: ListArgs, format: OutputFormat) -> Result<bool> {
    let suites = args.suites.load()?;

    let entries: Vec<ScenarioEntry> = suites
        .iter()
        .flat_map(|suite| {
            suite.scenarios.iter().map(move |spec| ScenarioEntry {
                suite: suite.name.clone(),
                scenario: spec.name.clone(),
                shape: spec.shape().to_string(),
                method: spec.request.method().to_string(),
                path: spec.request.path().to_string(),
                runs: spec.each.as_ref().map_or(1, Vec::len),
                tags: spec.tags.clone(),
            })
        })
        .collect();

    print_list(&entries, format);
    Ok(true)
}
