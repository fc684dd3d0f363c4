//! Declarative expectations and verification outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a JSON-path assertion compares the resolved value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    Equals,
    NotNull,
    Contains,
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionKind::Equals => write!(f, "equals"),
            AssertionKind::NotNull => write!(f, "not_null"),
            AssertionKind::Contains => write!(f, "contains"),
        }
    }
}

/// A single check on a value reachable by a path expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPathAssertion {
    pub path: String,
    pub kind: AssertionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<serde_json::Value>,
}

impl JsonPathAssertion {
    pub fn equals(path: impl Into<String>, expected: impl Into<serde_json::Value>) -> Self {
        Self {
            path: path.into(),
            kind: AssertionKind::Equals,
            expected: Some(expected.into()),
        }
    }

    pub fn not_null(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: AssertionKind::NotNull,
            expected: None,
        }
    }

    pub fn contains(path: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: AssertionKind::Contains,
            expected: Some(serde_json::Value::String(fragment.into())),
        }
    }
}

/// Bundle of checks a response must satisfy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectationSet {
    #[serde(default, rename = "status", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, rename = "body", skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<JsonPathAssertion>,
    /// Substring the raw body must contain, for plain-text responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_contains: Option<String>,
}

impl ExpectationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(status_code: u16) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_assertion(mut self, assertion: JsonPathAssertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_equals(self, path: impl Into<String>, expected: impl Into<serde_json::Value>) -> Self {
        self.with_assertion(JsonPathAssertion::equals(path, expected))
    }

    pub fn with_not_null(self, path: impl Into<String>) -> Self {
        self.with_assertion(JsonPathAssertion::not_null(path))
    }

    pub fn with_contains(self, path: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.with_assertion(JsonPathAssertion::contains(path, fragment))
    }

    pub fn with_body_contains(mut self, fragment: impl Into<String>) -> Self {
        self.body_contains = Some(fragment.into());
        self
    }

    /// Number of checks this set will perform
    pub fn len(&self) -> usize {
        self.assertions.len()
            + usize::from(self.status_code.is_some())
            + usize::from(self.body_contains.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One mismatch between an expectation and the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub description: String,
    pub expected: String,
    pub actual: String,
}

impl Failure {
    pub fn new(
        description: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.description, self.expected, self.actual
        )
    }
}

/// Pass/fail plus every itemized mismatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub passed: bool,
    pub failures: Vec<Failure>,
}

impl VerificationOutcome {
    pub fn from_failures(failures: Vec<Failure>) -> Self {
        Self {
            passed: failures.is_empty(),
            failures,
        }
    }

    pub fn pass() -> Self {
        Self::from_failures(Vec::new())
    }

    pub fn fail(failure: Failure) -> Self {
        Self::from_failures(vec![failure])
    }

    /// Failures joined into one line, for logs and reports
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(Failure::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
