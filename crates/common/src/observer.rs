//! Diagnostic hooks around each HTTP exchange

use crate::error::Error;
use crate::types::{RequestDescriptor, ResponseResult};

/// Observes exchanges for diagnostics. Observers see every exchange in
/// registration order and have no way to influence its outcome.
pub trait ExchangeObserver: Send + Sync {
    /// Called with the fully resolved URL just before the request is sent
    fn on_request(&self, _descriptor: &RequestDescriptor, _url: &str) {}

    /// Called once the response body has been read
    fn on_response(&self, _descriptor: &RequestDescriptor, _result: &ResponseResult) {}

    /// Called when no response arrived at all
    fn on_transport_error(&self, _descriptor: &RequestDescriptor, _error: &Error) {}
}
