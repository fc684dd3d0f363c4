//! apiverify engine
//!
//! Turns declarative request descriptors and expectation sets into verified
//! HTTP exchanges:
//! - Sends requests to the configured endpoint through `reqwest`
//! - Resolves JSON paths in response bodies and evaluates expectations
//! - Runs fixed, parameterized and conditional scenarios
//! - Loads scenarios from YAML suites and writes JSON reports
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SuiteRunner                           │
//! │    ├── Suite::load_all(dir) -> Vec<Suite>    (YAML)         │
//! │    ├── Suite::compile() -> Vec<Scenario>                    │
//! │    └── write_results(dir, reports) -> results.json          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── fixed:         execute ─> evaluate                   │
//! │    ├── parameterized: (execute ─> evaluate) per value       │
//! │    └── conditional:   execute ─> route on status ─> check   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Executor (Exchange)          │  evaluate()                 │
//! │    RequestDescriptor          │    ResponseResult           │
//! │      ─> ResponseResult        │    + ExpectationSet         │
//! │                               │      ─> VerificationOutcome │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod evaluator;
pub mod executor;
pub mod jsonpath;
pub mod observer;
pub mod runner;
pub mod scenario;
pub mod suite;

pub use evaluator::{evaluate, validate};
pub use executor::{Exchange, Executor};
pub use jsonpath::JsonPath;
pub use observer::TracingObserver;
pub use runner::{write_results, SuiteReport, SuiteRunner};
pub use scenario::{
    Branch, BranchCheck, ExecutionState, ParameterizedCase, RunReport, RunVerdict, Scenario,
    ScenarioKind, ScenarioReport, ScenarioRunner, StatusPredicate,
};
pub use suite::{ScenarioSpec, Suite};
