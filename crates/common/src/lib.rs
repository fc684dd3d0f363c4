//! apiverify Common Library
//!
//! Shared types for the apiverify engine: endpoint configuration, request
//! descriptors, response results, expectations and the error taxonomy.

pub mod config;
pub mod error;
pub mod expectation;
pub mod observer;
pub mod types;

// Re-export commonly used types
pub use config::{install, installed, ConfigFile, Configuration, ConfigurationBuilder};
pub use error::{Error, Result, TransportErrorKind};
pub use expectation::{
    AssertionKind, ExpectationSet, Failure, JsonPathAssertion, VerificationOutcome,
};
pub use observer::ExchangeObserver;
pub use types::{Body, HttpMethod, QueryValue, RequestDescriptor, ResponseResult};

/// apiverify version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
