//! Remote API client configuration.
//!
//! # Example
//!
//! ```toml
//! [client]
//! org_name = "dev-123456"
//! base_url = "okta.com"
//! api_token = "${OKTA_API_TOKEN}"
//!
//! [client.retry]
//! max_retries = 5
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;

/// Maximum page size accepted by the listing endpoints.
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Connection settings for the identity API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Organization subdomain, e.g. `dev-123456` for `dev-123456.okta.com`.
    #[serde(default)]
    pub org_name: Option<String>,

    /// Base domain of the organization.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Full endpoint override (`https://login.example.com`). Takes precedence
    /// over `org_name` + `base_url`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API token sent as `Authorization: SSWS <token>`.
    #[serde(default)]
    pub api_token: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Page size for listing endpoints.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// User-Agent header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            org_name: None,
            base_url: default_base_url(),
            endpoint: None,
            api_token: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            page_limit: default_page_limit(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "client.api_token must be set".into(),
            ));
        }
        if self.page_limit == 0 || self.page_limit > MAX_PAGE_LIMIT {
            return Err(ConfigError::Validation(format!(
                "client.page_limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "client.request_timeout_secs must be greater than 0".into(),
            ));
        }
        self.retry.validate()?;
        self.org_url().map(|_| ())
    }

    /// Resolve the organization URL requests are issued against.
    pub fn org_url(&self) -> Result<Url, ConfigError> {
        let raw = match (&self.endpoint, &self.org_name) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Some(org)) if !org.is_empty() => {
                format!("https://{}.{}", org, self.base_url.trim_start_matches('.'))
            }
            _ => {
                return Err(ConfigError::Validation(
                    "either client.endpoint or client.org_name must be set".into(),
                ));
            }
        };
        let url = Url::parse(&raw)
            .map_err(|e| ConfigError::Validation(format!("invalid org URL '{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "org URL '{raw}' must use http or https"
            )));
        }
        Ok(url)
    }
}

fn default_base_url() -> String {
    "okta.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_page_limit() -> u32 {
    MAX_PAGE_LIMIT
}

fn default_user_agent() -> String {
    concat!("okta-provider/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Retry configuration for remote calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Whether retries are enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of retry attempts (not including the initial request).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay before first retry in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (percentage, 0.0-1.0).
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Status codes that should trigger a retry.
    /// Default: 429 (rate limit), 500, 502, 503, 504 (server errors).
    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            retryable_status_codes: default_retryable_status_codes(),
        }
    }
}

impl RetryConfig {
    /// A policy that issues every request exactly once.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Check if a status code should trigger a retry.
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.enabled && self.retryable_status_codes.contains(&status)
    }

    /// Calculate the delay for a given retry attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let base_delay =
            (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let jitter_range = capped_delay * self.jitter;
        let jitter = if jitter_range > 0.0 {
            use rand::Rng;
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        let final_delay = (capped_delay + jitter).max(0.0);
        std::time::Duration::from_millis(final_delay as u64)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Validation(
                "client.retry.jitter must be between 0.0 and 1.0".into(),
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Validation(
                "client.retry.backoff_multiplier must be at least 1.0".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

fn default_retryable_status_codes() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

fn default_true() -> bool {
    true
}
