//! Exchange logging through `tracing`

use tracing::{info, warn};

use apiverify_common::{Error, ExchangeObserver, RequestDescriptor, ResponseResult};

/// Logs every request and response at `info` level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ExchangeObserver for TracingObserver {
    fn on_request(&self, descriptor: &RequestDescriptor, url: &str) {
        info!("→ {} {}", descriptor.method(), url);
        for (name, value) in descriptor.headers() {
            info!("  {}: {}", name, value);
        }
        if let Some(body) = descriptor.body() {
            match body.to_text() {
                Ok(text) => info!("  body: {}", text),
                Err(e) => warn!("  body not serializable: {}", e),
            }
        }
    }

    fn on_response(&self, descriptor: &RequestDescriptor, result: &ResponseResult) {
        info!(
            "← {} {} {} ({} ms)",
            result.status_code,
            descriptor.method(),
            descriptor.path(),
            result.duration_ms
        );
        if !result.raw_body.is_empty() {
            info!("  body: {}", result.raw_body);
        }
    }

    fn on_transport_error(&self, descriptor: &RequestDescriptor, error: &Error) {
        warn!("✗ {} {}: {}", descriptor.method(), descriptor.path(), error);
    }
}
