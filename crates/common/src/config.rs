//! Endpoint configuration shared read-only by every scenario

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::observer::ExchangeObserver;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/";
pub const DEFAULT_BASE_PATH: &str = "/api/v3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

static INSTALLED: OnceCell<Arc<Configuration>> = OnceCell::new();

/// Where requests go and what every request carries by default
#[derive(Clone)]
pub struct Configuration {
    base_url: String,
    base_path: String,
    default_headers: BTreeMap<String, String>,
    timeout: Duration,
    observers: Vec<Arc<dyn ExchangeObserver>>,
}

impl Configuration {
    pub fn builder(base_url: impl Into<String>) -> ConfigurationBuilder {
        ConfigurationBuilder::new(base_url)
    }

    /// Build a configuration from base URL, base path and default headers
    pub fn configure(
        base_url: impl Into<String>,
        base_path: impl Into<String>,
        default_headers: BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut builder = Self::builder(base_url).base_path(base_path);
        for (name, value) in default_headers {
            builder = builder.default_header(name, value);
        }
        builder.build()
    }

    /// Parse a TOML configuration document
    pub fn from_toml_str(content: &str) -> Result<ConfigFile> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML configuration file
    pub fn from_file(path: &Path) -> Result<ConfigFile> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn default_headers(&self) -> &BTreeMap<String, String> {
        &self.default_headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn observers(&self) -> &[Arc<dyn ExchangeObserver>] {
        &self.observers
    }

    /// Join base URL, base path and a resolved request path with exactly one
    /// `/` at each seam.
    pub fn url_for(&self, resolved_path: &str) -> String {
        let mut url = self.base_url.trim_end_matches('/').to_string();
        for segment in [self.base_path.as_str(), resolved_path] {
            let segment = segment.trim_matches('/');
            if segment.is_empty() {
                continue;
            }
            url.push('/');
            url.push_str(segment);
        }
        if resolved_path.ends_with('/') && !resolved_path.trim_matches('/').is_empty() {
            url.push('/');
        }
        url
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("base_url", &self.base_url)
            .field("base_path", &self.base_path)
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            default_headers,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            observers: Vec::new(),
        }
    }
}

/// Builder for [`Configuration`]
pub struct ConfigurationBuilder {
    base_url: String,
    base_path: String,
    default_headers: BTreeMap<String, String>,
    timeout: Duration,
    observers: Vec<Arc<dyn ExchangeObserver>>,
}

impl ConfigurationBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            base_path: String::new(),
            default_headers: BTreeMap::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            observers: Vec::new(),
        }
    }

    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register an observer; observers run in registration order
    pub fn observer(mut self, observer: Arc<dyn ExchangeObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Result<Configuration> {
        if self.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("base_url must not be empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be greater than zero".to_string()));
        }

        Ok(Configuration {
            base_url: self.base_url,
            base_path: self.base_path,
            default_headers: self.default_headers,
            timeout: self.timeout,
            observers: self.observers,
        })
    }
}

/// On-disk configuration (`apiverify.toml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_base_path")]
    pub base_path: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Log every request and response through `tracing`
    #[serde(default)]
    pub log_exchanges: bool,

    #[serde(default = "default_headers")]
    pub default_headers: BTreeMap<String, String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_headers() -> BTreeMap<String, String> {
    Configuration::default().default_headers
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            base_path: default_base_path(),
            timeout_secs: default_timeout_secs(),
            log_exchanges: false,
            default_headers: default_headers(),
        }
    }
}

impl ConfigFile {
    /// Builder seeded with this file's values; observers are left to the caller
    pub fn into_builder(self) -> ConfigurationBuilder {
        let mut builder = Configuration::builder(self.base_url)
            .base_path(self.base_path)
            .timeout(Duration::from_secs(self.timeout_secs));
        for (name, value) in self.default_headers {
            builder = builder.default_header(name, value);
        }
        builder
    }
}

/// Publish the process-wide configuration. May be called once; later calls
/// fail with [`Error::ConfigurationReuse`].
pub fn install(config: Configuration) -> Result<Arc<Configuration>> {
    let shared = Arc::new(config);
    INSTALLED
        .set(Arc::clone(&shared))
        .map_err(|_| Error::ConfigurationReuse)?;
    debug!(
        "Configuration installed: {}{}",
        shared.base_url(),
        shared.base_path()
    );
    Ok(shared)
}

/// The configuration published by [`install`], if any
pub fn installed() -> Option<Arc<Configuration>> {
    INSTALLED.get().cloned()
}
