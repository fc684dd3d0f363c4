//! Declarative YAML suites
//!
//! A suite file lists scenarios by name. Each entry compiles to a fixed,
//! parameterized (`each`) or conditional (`branches`) [`Scenario`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use apiverify_common::types::map_json_strings;
use apiverify_common::{Error, ExpectationSet, RequestDescriptor, Result};

use crate::scenario::{Branch, Scenario, StatusPredicate};

/// Placeholder replaced by the current element of `each`
pub const VALUE_PLACEHOLDER: &str = "{{value}}";

/// A suite of scenarios parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering suites
    #[serde(default)]
    pub tags: Vec<String>,

    /// Scenarios in declaration order
    pub scenarios: Vec<ScenarioSpec>,

    /// File the suite was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// One scenario entry in a suite file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Data values for a parameterized scenario
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub each: Option<Vec<String>>,

    pub request: RequestDescriptor,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<ExpectationSet>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<BranchSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchSpec {
    pub when: WhenSpec,
    #[serde(default)]
    pub expect: ExpectationSet,
}

/// `when:` accepts a status, a list of statuses, a class such as `"4xx"`,
/// or `"otherwise"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhenSpec {
    Code(u16),
    Codes(Vec<u16>),
    Keyword(String),
}

impl WhenSpec {
    pub fn to_predicate(&self) -> Result<StatusPredicate> {
        match self {
            WhenSpec::Code(code) => Ok(StatusPredicate::Exact(*code)),
            WhenSpec::Codes(codes) if codes.is_empty() => {
                Err(Error::SuiteParse("`when` list is empty".to_string()))
            }
            WhenSpec::Codes(codes) => Ok(StatusPredicate::OneOf(codes.clone())),
            WhenSpec::Keyword(keyword) => parse_keyword(keyword),
        }
    }
}

fn parse_keyword(keyword: &str) -> Result<StatusPredicate> {
    let keyword = keyword.trim().to_ascii_lowercase();
    if keyword == "otherwise" {
        return Ok(StatusPredicate::Otherwise);
    }
    if let Ok(code) = keyword.parse::<u16>() {
        return Ok(StatusPredicate::Exact(code));
    }
    match keyword.as_bytes() {
        [class @ b'1'..=b'5', b'x', b'x'] => {
            let min = u16::from(class - b'0') * 100;
            Ok(StatusPredicate::Range { min, max: min + 99 })
        }
        _ => Err(Error::SuiteParse(format!(
            "unknown `when` value `{keyword}`; use a status, a list, `2xx` or `otherwise`"
        ))),
    }
}

impl ScenarioSpec {
    pub fn shape(&self) -> &'static str {
        if !self.branches.is_empty() {
            "conditional"
        } else if self.each.is_some() {
            "parameterized"
        } else {
            "fixed"
        }
    }

    /// Build the runnable scenario, rejecting ambiguous or incomplete entries
    pub fn compile(&self) -> Result<Scenario> {
        let invalid = |reason: &str| Error::SuiteParse(format!("scenario `{}`: {}", self.name, reason));

        if !self.branches.is_empty() {
            if self.each.is_some() {
                return Err(invalid("`each` cannot be combined with `branches`"));
            }
            if self.expect.is_some() {
                return Err(invalid("use `expect` inside each branch, not alongside `branches`"));
            }
            let branches = self
                .branches
                .iter()
                .map(|b| Ok(Branch::expect(b.when.to_predicate()?, b.expect.clone())))
                .collect::<Result<Vec<_>>>()?;
            return Scenario::conditional(&self.name, self.request.clone(), branches);
        }

        let expect = self
            .expect
            .clone()
            .ok_or_else(|| invalid("missing `expect`"))?;

        match &self.each {
            Some(data) => Scenario::parameterized(&self.name, data.iter().cloned(), |value| {
                Ok((
                    render_request(&self.request, value),
                    render_expectation(&expect, value),
                ))
            }),
            None => Scenario::fixed(&self.name, self.request.clone(), expect),
        }
    }
}

fn render(template: &str, value: &str) -> String {
    template.replace(VALUE_PLACEHOLDER, value)
}

/// Substitute `{{value}}` in every string the request carries
pub fn render_request(request: &RequestDescriptor, value: &str) -> RequestDescriptor {
    request.map_strings(&|s| render(s, value))
}

/// Substitute `{{value}}` in assertion paths, expected strings and `body_contains`
pub fn render_expectation(expect: &ExpectationSet, value: &str) -> ExpectationSet {
    let mut rendered = expect.clone();
    for assertion in &mut rendered.assertions {
        assertion.path = render(&assertion.path, value);
        assertion.expected = assertion
            .expected
            .as_ref()
            .map(|expected| map_json_strings(expected, &|s| render(s, value)));
    }
    rendered.body_contains = rendered.body_contains.map(|fragment| render(&fragment, value));
    rendered
}

impl Suite {
    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut suite = Self::from_yaml(&content)
            .map_err(|e| Error::SuiteParse(format!("{}: {}", path.display(), e)))?;
        suite.source = Some(path.to_path_buf());
        Ok(suite)
    }

    /// Load every `.yaml`/`.yml` suite under `dir`, ordered by path
    pub fn load_all(dir: &Path) -> Result<Vec<Self>> {
        if !dir.is_dir() {
            return Err(Error::SuiteParse(format!(
                "suite directory {} does not exist",
                dir.display()
            )));
        }

        let mut suites = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path()
                        .extension()
                        .map(|ext| ext == "yaml" || ext == "yml")
                        .unwrap_or(false)
            })
        {
            suites.push(Self::from_file(entry.path())?);
        }

        Ok(suites)
    }

    /// Filter suites by tag
    pub fn filter_by_tag<'a>(suites: &'a [Self], tag: &str) -> Vec<&'a Self> {
        suites.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    pub fn find_scenario(&self, name: &str) -> Option<&ScenarioSpec> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// Copy holding only the scenarios that match both filters. A tag matches
    /// when either the suite or the scenario carries it.
    pub fn select(&self, tag: Option<&str>, name: Option<&str>) -> Self {
        let suite_tagged = tag.is_some_and(|tag| self.tags.iter().any(|t| t == tag));
        let scenarios = self
            .scenarios
            .iter()
            .filter(|s| match tag {
                Some(tag) => suite_tagged || s.tags.iter().any(|t| t == tag),
                None => true,
            })
            .filter(|s| name.map_or(true, |name| s.name == name))
            .cloned()
            .collect();

        Self {
            scenarios,
            ..self.clone()
        }
    }

    /// Compile every scenario in order. Names must be unique within a suite.
    pub fn compile(&self) -> Result<Vec<Scenario>> {
        let mut seen = HashSet::new();
        self.scenarios
            .iter()
            .map(|spec| {
                if !seen.insert(spec.name.as_str()) {
                    return Err(Error::SuiteParse(format!(
                        "suite `{}`: duplicate scenario name `{}`",
                        self.name, spec.name
                    )));
                }
                spec.compile()
            })
            .collect()
    }
}
