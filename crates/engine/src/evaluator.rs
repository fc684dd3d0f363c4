//! Expectation evaluation against received responses
//!
//! Evaluation is pure: the same response and expectation set always yield the
//! same outcome, and every check runs even after an earlier one failed.

use serde_json::{Number, Value};

use apiverify_common::{
    AssertionKind, Error, ExpectationSet, Failure, JsonPathAssertion, ResponseResult, Result,
    VerificationOutcome,
};

use crate::jsonpath::JsonPath;

const PATH_NOT_FOUND: &str = "path not found";
const MAX_BODY_EXCERPT: usize = 200;

/// Check that an expectation set is well-formed, returning the parsed paths
/// in assertion order.
pub fn validate(expectation: &ExpectationSet) -> Result<Vec<JsonPath>> {
    expectation
        .assertions
        .iter()
        .map(validate_assertion)
        .collect()
}

fn validate_assertion(assertion: &JsonPathAssertion) -> Result<JsonPath> {
    let path = JsonPath::parse(&assertion.path)?;

    match (assertion.kind, &assertion.expected) {
        (AssertionKind::Equals, None) => Err(Error::MalformedExpectation(format!(
            "`{}` equals assertion has no expected value",
            assertion.path
        ))),
        (AssertionKind::Contains, None) => Err(Error::MalformedExpectation(format!(
            "`{}` contains assertion has no expected value",
            assertion.path
        ))),
        (AssertionKind::Contains, Some(expected)) if !expected.is_string() => {
            Err(Error::MalformedExpectation(format!(
                "`{}` contains assertion expects a string, got {}",
                assertion.path, expected
            )))
        }
        _ => Ok(path),
    }
}

/// Evaluate every check in `expectation` against `result`.
///
/// Mismatches are returned inside the outcome; only a malformed expectation
/// is an error, and it is reported before any comparison runs.
pub fn evaluate(result: &ResponseResult, expectation: &ExpectationSet) -> Result<VerificationOutcome> {
    let paths = validate(expectation)?;
    let mut failures = Vec::new();

    if let Some(expected) = expectation.status_code {
        if expected != result.status_code {
            failures.push(Failure::new(
                "statusCode",
                expected.to_string(),
                result.status_code.to_string(),
            ));
        }
    }

    for (assertion, path) in expectation.assertions.iter().zip(&paths) {
        if let Some(failure) = check_assertion(assertion, path, result.parsed_body.as_ref()) {
            failures.push(failure);
        }
    }

    if let Some(fragment) = &expectation.body_contains {
        if !result.raw_body.contains(fragment.as_str()) {
            failures.push(Failure::new(
                "body contains",
                format!("{:?}", fragment),
                format!("{:?}", excerpt(&result.raw_body)),
            ));
        }
    }

    Ok(VerificationOutcome::from_failures(failures))
}

fn check_assertion(
    assertion: &JsonPathAssertion,
    path: &JsonPath,
    body: Option<&Value>,
) -> Option<Failure> {
    let description = format!("{} {}", assertion.path, assertion.kind);
    let expected_text = match (&assertion.kind, &assertion.expected) {
        (AssertionKind::NotNull, _) => "not null".to_string(),
        (_, Some(expected)) => expected.to_string(),
        (_, None) => String::new(),
    };

    let Some(actual) = body.and_then(|body| path.resolve(body)) else {
        return Some(Failure::new(description, expected_text, PATH_NOT_FOUND));
    };

    let passed = match assertion.kind {
        AssertionKind::Equals => assertion
            .expected
            .as_ref()
            .is_some_and(|expected| json_equals(actual, expected)),
        AssertionKind::NotNull => !actual.is_null(),
        AssertionKind::Contains => match (actual, &assertion.expected) {
            (Value::String(haystack), Some(Value::String(needle))) => haystack.contains(needle.as_str()),
            _ => false,
        },
    };

    if passed {
        None
    } else {
        Some(Failure::new(description, expected_text, actual.to_string()))
    }
}

/// Deep equality where numbers compare by value (`1 == 1.0`) rather than by
/// their textual form.
pub fn json_equals(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| json_equals(x, y)))
        }
        _ => actual == expected,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_EXCERPT {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_BODY_EXCERPT).collect();
    cut.push('…');
    cut
}
