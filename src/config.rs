//! Provider configuration.
//!
//! The provider block accepts the Lightdash host and API token plus the HTTP
//! client limits. `host` and `token` fall back to the `LIGHTDASH_URL` and
//! `LIGHTDASH_API_KEY` environment variables when they are not set in
//! configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};

/// Environment variable consulted when `host` is not configured.
pub const HOST_ENV: &str = "LIGHTDASH_URL";

/// Environment variable consulted when `token` is not configured.
pub const TOKEN_ENV: &str = "LIGHTDASH_API_KEY";

/// Default cap on in-flight API requests.
fn default_max_concurrent_requests() -> i64 {
    5
}

/// Default per-request timeout in seconds.
fn default_request_timeout() -> i64 {
    30
}

/// Default number of retries for throttled or failed requests.
fn default_retries() -> i64 {
    3
}

/// Settings from the provider block.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the Lightdash instance, e.g. `https://app.lightdash.cloud`.
    #[serde(default)]
    pub host: Option<String>,
    /// Personal access token.
    #[serde(default)]
    pub token: Option<String>,
    /// Maximum number of API requests in flight at once.
    ///
    /// Must be > 0.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: i64,
    /// Per-request timeout in seconds.
    ///
    /// Must be > 0.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: i64,
    /// Extra attempts for requests that fail with a retryable error.
    ///
    /// Must be >= 0.
    #[serde(default = "default_retries")]
    pub retries: i64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("request_timeout", &self.request_timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: None,
            token: None,
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout: default_request_timeout(),
            retries: default_retries(),
        }
    }
}

/// Validated settings ready to build an API client from.
#[derive(Clone)]
pub struct ClientSettings {
    /// Base URL with any trailing slash removed.
    pub base_url: Url,
    /// Personal access token.
    pub token: String,
    /// Maximum number of API requests in flight at once.
    pub max_concurrent_requests: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Extra attempts for retryable failures.
    pub retries: u32,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url.as_str())
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("request_timeout", &self.request_timeout)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl ProviderConfig {
    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description(include_str!("../docs/index.md"))
            .with_attribute(
                "host",
                Attribute::optional_string().with_description(format!(
                    "Base URL of the Lightdash instance. Defaults to ${}.",
                    HOST_ENV
                )),
            )
            .with_attribute(
                "token",
                Attribute::optional_string().sensitive().with_description(format!(
                    "Lightdash personal access token. Defaults to ${}.",
                    TOKEN_ENV
                )),
            )
            .with_attribute(
                "max_concurrent_requests",
                Attribute::optional_int64()
                    .with_description("Maximum number of API requests in flight at once. Defaults to 5."),
            )
            .with_attribute(
                "request_timeout",
                Attribute::optional_int64()
                    .with_description("Timeout for a single API request, in seconds. Defaults to 30."),
            )
            .with_attribute(
                "retries",
                Attribute::optional_int64()
                    .with_description("Number of retries for throttled or failed requests. Defaults to 3."),
            )
    }

    /// Parse the provider block. `null` is treated as an empty block.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        let mut value = value;
        if let serde_json::Value::Object(map) = &mut value {
            // Unset optional attributes arrive as explicit nulls
            map.retain(|_, v| !v.is_null());
        }
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Fill `host` and `token` from the environment when they are unset.
    pub fn with_env_fallback(self) -> Self {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`with_env_fallback`](Self::with_env_fallback) with a custom lookup.
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.host.as_deref().map_or(true, str::is_empty) {
            self.host = lookup(HOST_ENV).filter(|v| !v.is_empty());
        }
        if self.token.as_deref().map_or(true, str::is_empty) {
            self.token = lookup(TOKEN_ENV).filter(|v| !v.is_empty());
        }
        self
    }

    /// Check every setting, returning one diagnostic per problem.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        match self.host.as_deref() {
            None | Some("") => diagnostics.push(
                Diagnostic::error("Missing Lightdash host")
                    .with_detail(format!("Set `host` or the {} environment variable", HOST_ENV))
                    .with_attribute("host"),
            ),
            Some(host) => {
                if let Err(detail) = parse_host(host) {
                    diagnostics.push(
                        Diagnostic::error("Invalid Lightdash host")
                            .with_detail(detail)
                            .with_attribute("host"),
                    );
                }
            }
        }

        if self.token.as_deref().map_or(true, str::is_empty) {
            diagnostics.push(
                Diagnostic::error("Missing Lightdash API token")
                    .with_detail(format!("Set `token` or the {} environment variable", TOKEN_ENV))
                    .with_attribute("token"),
            );
        }

        if self.max_concurrent_requests <= 0 {
            diagnostics.push(
                Diagnostic::error("max_concurrent_requests must be > 0")
                    .with_attribute("max_concurrent_requests"),
            );
        }
        if self.request_timeout <= 0 {
            diagnostics.push(
                Diagnostic::error("request_timeout must be > 0").with_attribute("request_timeout"),
            );
        }
        if self.retries < 0 {
            diagnostics.push(Diagnostic::error("retries must be >= 0").with_attribute("retries"));
        }

        diagnostics
    }

    /// Convert into client settings, failing on the first invalid value.
    pub fn into_settings(self) -> Result<ClientSettings, ProviderError> {
        if let Some(first) = self.validate().into_iter().next() {
            return Err(ProviderError::Configuration(match first.detail {
                Some(detail) => format!("{}: {}", first.summary, detail),
                None => first.summary,
            }));
        }

        let host = self.host.unwrap_or_default();
        let base_url = parse_host(&host).map_err(ProviderError::Configuration)?;

        Ok(ClientSettings {
            base_url,
            token: self.token.unwrap_or_default(),
            max_concurrent_requests: usize::try_from(self.max_concurrent_requests)
                .map_err(|e| ProviderError::Configuration(e.to_string()))?,
            request_timeout: Duration::from_secs(
                u64::try_from(self.request_timeout)
                    .map_err(|e| ProviderError::Configuration(e.to_string()))?,
            ),
            retries: u32::try_from(self.retries)
                .map_err(|e| ProviderError::Configuration(e.to_string()))?,
        })
    }
}

fn parse_host(host: &str) -> Result<Url, String> {
    let url = Url::parse(host.trim_end_matches('/')).map_err(|e| format!("'{}': {}", host, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("'{}': unsupported scheme '{}'", host, other)),
    }
}
