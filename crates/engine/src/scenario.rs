//! Scenarios and the runner that executes them
//!
//! A scenario is one logical test case: a single request checked against one
//! expectation set (fixed), the same shape repeated over a list of values
//! (parameterized), or one request whose checks depend on the status that
//! came back (conditional).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use apiverify_common::{
    Error, ExpectationSet, RequestDescriptor, ResponseResult, Result, TransportErrorKind,
    VerificationOutcome,
};

use crate::evaluator::{evaluate, validate};
use crate::executor::Exchange;

/// Hand-written check for a conditional branch
pub type CustomCheck = Arc<dyn Fn(&ResponseResult) -> VerificationOutcome + Send + Sync>;

/// Which statuses a conditional branch handles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPredicate {
    Exact(u16),
    OneOf(Vec<u16>),
    /// Inclusive range
    Range { min: u16, max: u16 },
    /// Any status not handled by an earlier branch
    Otherwise,
}

impl StatusPredicate {
    pub fn matches(&self, status: u16) -> bool {
        match self {
            StatusPredicate::Exact(code) => *code == status,
            StatusPredicate::OneOf(codes) => codes.contains(&status),
            StatusPredicate::Range { min, max } => (*min..=*max).contains(&status),
            StatusPredicate::Otherwise => true,
        }
    }

    /// Inclusive status ranges this predicate covers. `None` for `Otherwise`.
    fn spans(&self) -> Option<Vec<(u16, u16)>> {
        match self {
            StatusPredicate::Exact(code) => Some(vec![(*code, *code)]),
            StatusPredicate::OneOf(codes) => Some(codes.iter().map(|c| (*c, *c)).collect()),
            StatusPredicate::Range { min, max } => Some(vec![(*min, *max)]),
            StatusPredicate::Otherwise => None,
        }
    }

    /// Whether some status matches both predicates
    pub fn overlaps(&self, other: &StatusPredicate) -> bool {
        match (self.spans(), other.spans()) {
            (Some(ours), Some(theirs)) => ours
                .iter()
                .any(|(a, b)| theirs.iter().any(|(c, d)| a <= d && c <= b)),
            _ => true,
        }
    }
}

impl fmt::Display for StatusPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusPredicate::Exact(code) => write!(f, "{code}"),
            StatusPredicate::OneOf(codes) => {
                let codes: Vec<String> = codes.iter().map(u16::to_string).collect();
                write!(f, "{}", codes.join("|"))
            }
            StatusPredicate::Range { min, max } => write!(f, "{min}-{max}"),
            StatusPredicate::Otherwise => write!(f, "otherwise"),
        }
    }
}

#[derive(Clone)]
pub enum BranchCheck {
    Expect(ExpectationSet),
    Custom(CustomCheck),
}

impl fmt::Debug for BranchCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchCheck::Expect(set) => f.debug_tuple("Expect").field(set).finish(),
            BranchCheck::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One arm of a conditional scenario
#[derive(Debug, Clone)]
pub struct Branch {
    pub when: StatusPredicate,
    pub check: BranchCheck,
}

impl Branch {
    pub fn expect(when: StatusPredicate, expectation: ExpectationSet) -> Self {
        Self {
            when,
            check: BranchCheck::Expect(expectation),
        }
    }

    pub fn custom(
        when: StatusPredicate,
        check: impl Fn(&ResponseResult) -> VerificationOutcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            when,
            check: BranchCheck::Custom(Arc::new(check)),
        }
    }
}

/// One data value of a parameterized scenario, built and validated
#[derive(Debug, Clone)]
pub struct ParameterizedCase {
    pub value: String,
    pub request: RequestDescriptor,
    pub expect: ExpectationSet,
}

#[derive(Clone)]
pub enum ScenarioKind {
    Fixed {
        request: RequestDescriptor,
        expect: ExpectationSet,
    },
    Parameterized {
        cases: Vec<ParameterizedCase>,
    },
    Conditional {
        request: RequestDescriptor,
        branches: Vec<Branch>,
    },
}

/// A named, validated test case
#[derive(Clone)]
pub struct Scenario {
    name: String,
    kind: ScenarioKind,
}

impl Scenario {
    pub fn fixed(
        name: impl Into<String>,
        request: RequestDescriptor,
        expect: ExpectationSet,
    ) -> Result<Self> {
        validate(&expect)?;
        Ok(Self {
            name: name.into(),
            kind: ScenarioKind::Fixed { request, expect },
        })
    }

    /// Repeat the fixed flow once per value, in order. The builder runs for
    /// every value up front, so a bad value fails here and not mid-sweep.
    pub fn parameterized<I, S, F>(name: impl Into<String>, data: I, builder: F) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str) -> Result<(RequestDescriptor, ExpectationSet)>,
    {
        let name: String = name.into();
        let cases = data
            .into_iter()
            .map(|value| {
                let value: String = value.into();
                let (request, expect) = builder(&value)?;
                validate(&expect).map_err(|e| match e {
                    Error::MalformedExpectation(reason) => Error::MalformedExpectation(format!(
                        "parameterized scenario `{name}` [{value}]: {reason}"
                    )),
                    other => other,
                })?;
                Ok(ParameterizedCase {
                    value,
                    request,
                    expect,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if cases.is_empty() {
            return Err(Error::MalformedExpectation(format!(
                "parameterized scenario `{name}` has no data values"
            )));
        }
        Ok(Self {
            name,
            kind: ScenarioKind::Parameterized { cases },
        })
    }

    /// Branches are tried in order and the first match wins. `Otherwise`
    /// may appear once, as the last branch.
    pub fn conditional(
        name: impl Into<String>,
        request: RequestDescriptor,
        branches: Vec<Branch>,
    ) -> Result<Self> {
        let name: String = name.into();
        if branches.is_empty() {
            return Err(Error::MalformedExpectation(format!(
                "conditional scenario `{name}` has no branches"
            )));
        }
        for (i, branch) in branches.iter().enumerate() {
            if branch.when == StatusPredicate::Otherwise && i + 1 != branches.len() {
                return Err(Error::MalformedExpectation(format!(
                    "conditional scenario `{name}`: `otherwise` must be the last branch"
                )));
            }
            match &branch.when {
                StatusPredicate::Range { min, max } if min > max => {
                    return Err(Error::MalformedExpectation(format!(
                        "conditional scenario `{name}`: empty status range {min}-{max}"
                    )));
                }
                StatusPredicate::OneOf(codes) if codes.is_empty() => {
                    return Err(Error::MalformedExpectation(format!(
                        "conditional scenario `{name}`: empty status list"
                    )));
                }
                StatusPredicate::Otherwise => {}
                when => {
                    if let Some(earlier) = branches[..i].iter().find(|b| b.when.overlaps(when)) {
                        return Err(Error::MalformedExpectation(format!(
                            "conditional scenario `{name}`: branch {when} overlaps earlier branch {}",
                            earlier.when
                        )));
                    }
                }
            }
            if let BranchCheck::Expect(set) = &branch.check {
                validate(set)?;
            }
        }
        Ok(Self {
            name,
            kind: ScenarioKind::Conditional { request, branches },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ScenarioKind {
        &self.kind
    }

    pub fn shape(&self) -> &'static str {
        match self.kind {
            ScenarioKind::Fixed { .. } => "fixed",
            ScenarioKind::Parameterized { .. } => "parameterized",
            ScenarioKind::Conditional { .. } => "conditional",
        }
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("shape", &self.shape())
            .finish()
    }
}

/// Lifecycle of one scenario execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    NotStarted,
    Executing,
    Evaluating,
    Passed,
    Failed,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Passed | ExecutionState::Failed)
    }

    pub fn advance(self, next: ExecutionState) -> Result<ExecutionState> {
        use ExecutionState::*;

        let allowed = matches!(
            (self, next),
            (NotStarted, Executing)
                | (Executing, Evaluating)
                | (Executing, Failed)
                | (Evaluating, Passed)
                | (Evaluating, Failed)
        );
        if !allowed {
            return Err(Error::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        debug!("state {} -> {}", self, next);
        Ok(next)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::NotStarted => write!(f, "not_started"),
            ExecutionState::Executing => write!(f, "executing"),
            ExecutionState::Evaluating => write!(f, "evaluating"),
            ExecutionState::Passed => write!(f, "passed"),
            ExecutionState::Failed => write!(f, "failed"),
        }
    }
}

/// How a single execution ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum RunVerdict {
    /// The service answered and the response was evaluated
    Verified {
        status_code: u16,
        outcome: VerificationOutcome,
    },
    /// The service could not be reached
    TransportFailed {
        kind: TransportErrorKind,
        message: String,
    },
    /// The service answered with a status no branch handles
    UnhandledStatus { status_code: u16, message: String },
}

impl RunVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, RunVerdict::Verified { outcome, .. } if outcome.passed)
    }

    pub fn describe(&self) -> String {
        match self {
            RunVerdict::Verified { outcome, .. } if outcome.passed => "passed".to_string(),
            RunVerdict::Verified { outcome, .. } => outcome.summary(),
            RunVerdict::TransportFailed { message, .. } => message.clone(),
            RunVerdict::UnhandledStatus { message, .. } => message.clone(),
        }
    }
}

/// Result of one execution of the fixed flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Data value for parameterized runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Predicate of the branch that ran, for conditional runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub state: ExecutionState,
    #[serde(flatten)]
    pub verdict: RunVerdict,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.state == ExecutionState::Passed
    }
}

/// Aggregated result of one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub shape: String,
    pub state: ExecutionState,
    pub duration_ms: u64,
    pub runs: Vec<RunReport>,
    /// Set when the scenario could not be run at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioReport {
    /// Report for a scenario whose definition stopped it before any verdict
    pub fn errored(scenario: &Scenario, error: &Error) -> Self {
        Self {
            name: scenario.name().to_string(),
            shape: scenario.shape().to_string(),
            state: ExecutionState::Failed,
            duration_ms: 0,
            runs: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn passed(&self) -> bool {
        self.state == ExecutionState::Passed
    }

    pub fn failing_runs(&self) -> impl Iterator<Item = &RunReport> {
        self.runs.iter().filter(|run| !run.passed())
    }

    /// One line per failing run, prefixed by its data value when there is one
    pub fn failure_summary(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        let lines: Vec<String> = self
            .failing_runs()
            .map(|run| match &run.label {
                Some(label) => format!("[{}] {}", label, run.verdict.describe()),
                None => run.verdict.describe(),
            })
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("; "))
        }
    }
}

enum Exchanged {
    Response(ResponseResult),
    Aborted(RunVerdict),
}

/// Executes scenarios through an [`Exchange`]
pub struct ScenarioRunner<E> {
    exchange: E,
}

impl<E: Exchange> ScenarioRunner<E> {
    pub fn new(exchange: E) -> Self {
        Self { exchange }
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    /// Run a scenario to completion.
    ///
    /// Errors are reserved for mistakes in the scenario definition; transport
    /// failures and unhandled statuses are reported as failed runs.
    pub async fn run(&self, scenario: &Scenario) -> Result<ScenarioReport> {
        let started = Instant::now();
        debug!("Running scenario: {} ({})", scenario.name(), scenario.shape());

        let runs = match scenario.kind() {
            ScenarioKind::Fixed { request, expect } => {
                vec![self.run_fixed(request, expect, None).await?]
            }
            ScenarioKind::Parameterized { cases } => {
                let mut runs = Vec::with_capacity(cases.len());
                for case in cases {
                    runs.push(
                        self.run_fixed(&case.request, &case.expect, Some(case.value.clone()))
                            .await?,
                    );
                }
                runs
            }
            ScenarioKind::Conditional { request, branches } => {
                vec![self.run_conditional(request, branches).await?]
            }
        };

        let state = if runs.iter().all(RunReport::passed) {
            ExecutionState::Passed
        } else {
            ExecutionState::Failed
        };

        Ok(ScenarioReport {
            name: scenario.name().to_string(),
            shape: scenario.shape().to_string(),
            state,
            duration_ms: started.elapsed().as_millis() as u64,
            runs,
            error: None,
        })
    }

    /// Execute once and evaluate once
    pub async fn run_fixed(
        &self,
        request: &RequestDescriptor,
        expect: &ExpectationSet,
        label: Option<String>,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let state = ExecutionState::NotStarted.advance(ExecutionState::Executing)?;

        let result = match self.send(request).await? {
            Exchanged::Response(result) => result,
            Exchanged::Aborted(verdict) => {
                let state = state.advance(ExecutionState::Failed)?;
                return Ok(finish(label, None, state, verdict, started));
            }
        };

        let state = state.advance(ExecutionState::Evaluating)?;
        let outcome = evaluate(&result, expect)?;
        let state = state.advance(terminal_state(&outcome))?;

        let verdict = RunVerdict::Verified {
            status_code: result.status_code,
            outcome,
        };
        Ok(finish(label, None, state, verdict, started))
    }

    async fn run_conditional(
        &self,
        request: &RequestDescriptor,
        branches: &[Branch],
    ) -> Result<RunReport> {
        let started = Instant::now();
        let state = ExecutionState::NotStarted.advance(ExecutionState::Executing)?;

        let result = match self.send(request).await? {
            Exchanged::Response(result) => result,
            Exchanged::Aborted(verdict) => {
                let state = state.advance(ExecutionState::Failed)?;
                return Ok(finish(None, None, state, verdict, started));
            }
        };

        let state = state.advance(ExecutionState::Evaluating)?;
        let Some(branch) = branches.iter().find(|b| b.when.matches(result.status_code)) else {
            let err = Error::UnhandledStatus {
                status: result.status_code,
            };
            warn!("{} {}: {}", request.method(), request.path(), err);
            let state = state.advance(ExecutionState::Failed)?;
            let verdict = RunVerdict::UnhandledStatus {
                status_code: result.status_code,
                message: err.to_string(),
            };
            return Ok(finish(None, None, state, verdict, started));
        };

        debug!("status {} routed to branch {}", result.status_code, branch.when);
        let outcome = match &branch.check {
            BranchCheck::Expect(set) => evaluate(&result, set)?,
            BranchCheck::Custom(check) => check(&result),
        };
        let state = state.advance(terminal_state(&outcome))?;

        let verdict = RunVerdict::Verified {
            status_code: result.status_code,
            outcome,
        };
        Ok(finish(None, Some(branch.when.to_string()), state, verdict, started))
    }

    async fn send(&self, request: &RequestDescriptor) -> Result<Exchanged> {
        match self.exchange.exchange(request).await {
            Ok(result) => Ok(Exchanged::Response(result)),
            Err(Error::Transport { kind, message }) => {
                Ok(Exchanged::Aborted(RunVerdict::TransportFailed { kind, message }))
            }
            Err(e) => Err(e),
        }
    }
}

fn terminal_state(outcome: &VerificationOutcome) -> ExecutionState {
    if outcome.passed {
        ExecutionState::Passed
    } else {
        ExecutionState::Failed
    }
}

fn finish(
    label: Option<String>,
    branch: Option<String>,
    state: ExecutionState,
    verdict: RunVerdict,
    started: Instant,
) -> RunReport {
    RunReport {
        label,
        branch,
        state,
        verdict,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
