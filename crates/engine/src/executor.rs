//! Request execution - the only part of the engine that performs I/O

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use apiverify_common::{
    Configuration, Error, HttpMethod, RequestDescriptor, ResponseResult, Result,
    TransportErrorKind,
};

/// Something that can turn a request descriptor into a response.
///
/// [`Executor`] is the HTTP implementation; the scenario runner only depends
/// on this trait.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn exchange(&self, descriptor: &RequestDescriptor) -> Result<ResponseResult>;
}

#[async_trait]
impl<T: Exchange + ?Sized> Exchange for Arc<T> {
    async fn exchange(&self, descriptor: &RequestDescriptor) -> Result<ResponseResult> {
        (**self).exchange(descriptor).await
    }
}

/// Sends request descriptors to the configured endpoint
#[derive(Clone)]
pub struct Executor {
    config: Arc<Configuration>,
    client: reqwest::Client,
}

impl Executor {
    pub fn new(config: Arc<Configuration>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    /// Full URL for a descriptor: base URL, base path, resolved path, then
    /// query parameters in the order they were supplied.
    pub fn build_url(&self, descriptor: &RequestDescriptor) -> Result<reqwest::Url> {
        let path = descriptor.resolve_path()?;
        let raw = self.config.url_for(&path);
        let mut url = reqwest::Url::parse(&raw)
            .map_err(|e| Error::InvalidConfig(format!("Invalid URL `{raw}`: {e}")))?;

        if !descriptor.query().is_empty() {
            let mut query_pairs = url.query_pairs_mut();
            for (name, value) in descriptor.query() {
                for v in value.values() {
                    query_pairs.append_pair(name, v);
                }
            }
        }

        Ok(url)
    }

    /// Default headers overridden by the descriptor's own headers
    pub fn build_headers(&self, descriptor: &RequestDescriptor) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        for (key, value) in self
            .config
            .default_headers()
            .iter()
            .chain(descriptor.headers())
        {
            let header_name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::InvalidHeader(format!("Invalid header key `{key}`: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidHeader(format!("Invalid header value `{value}`: {e}")))?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<ResponseResult> {
        let url = self.build_url(descriptor)?;
        let headers = self.build_headers(descriptor)?;

        for observer in self.config.observers() {
            observer.on_request(descriptor, url.as_str());
        }
        debug!("{} {}", descriptor.method(), url);

        let mut req_builder = self
            .client
            .request(to_reqwest_method(descriptor.method()), url)
            .headers(headers);
        if let Some(body) = descriptor.body() {
            req_builder = req_builder.body(body.to_text()?);
        }

        let started = Instant::now();
        let response = match req_builder.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.transport_failure(descriptor, e)),
        };

        let status_code = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.transport_failure(descriptor, e)),
        };
        let elapsed = started.elapsed().as_millis() as u64;

        let result = ResponseResult::new(status_code, String::from_utf8_lossy(&bytes).into_owned())
            .with_headers(headers)
            .with_duration_ms(elapsed);

        for observer in self.config.observers() {
            observer.on_response(descriptor, &result);
        }

        Ok(result)
    }

    fn transport_failure(&self, descriptor: &RequestDescriptor, e: reqwest::Error) -> Error {
        let err = classify(&e);
        warn!("{} {} failed: {}", descriptor.method(), descriptor.path(), err);
        for observer in self.config.observers() {
            observer.on_transport_error(descriptor, &err);
        }
        err
    }
}

#[async_trait]
impl Exchange for Executor {
    async fn exchange(&self, descriptor: &RequestDescriptor) -> Result<ResponseResult> {
        self.execute(descriptor).await
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn classify(e: &reqwest::Error) -> Error {
    let kind = if e.is_timeout() {
        TransportErrorKind::Timeout
    } else if e.is_connect() {
        TransportErrorKind::ConnectionRefused
    } else {
        TransportErrorKind::Other
    };
    Error::transport(kind, e.to_string())
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected = BTreeMap::new();
    for (name, value) in headers {
        let value = value.to_str().unwrap_or("<binary>");
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    collected
}
