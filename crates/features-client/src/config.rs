//! Client configuration loaded from the environment.

use std::time::Duration;

use thiserror::Error;

use features_protocol::telemetry::DEFAULT_FILTER_LENGTH_LIMIT;

pub const DEFAULT_BASE_URL: &str = "https://api.os.uk/features/ngd/ofa/v1";
pub const DEFAULT_TOKEN_URL: &str = "https://api.os.uk/oauth2/token/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Retry policy for transport failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure (doubles each retry)
    pub initial_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given 0-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// A policy that never sleeps, for tests against local servers.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

/// Configuration shared by every layer of the pipeline.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Feature API root, without trailing slash.
    pub base_url: String,
    pub token_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Timeout applied to each outbound call.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// `filter` values longer than this are redacted in telemetry.
    pub telemetry_filter_limit: usize,
    /// Default for requests that do not set `log_request_details`.
    pub log_request_details: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: None,
            client_secret: None,
            request_timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
            telemetry_filter_limit: DEFAULT_FILTER_LENGTH_LIMIT,
            log_request_details: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("NGD_API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        let token_url = lookup("NGD_TOKEN_URL").unwrap_or(defaults.token_url);

        let timeout_secs: u64 = parse_var(&lookup, "NGD_REQUEST_TIMEOUT_SECS")?.unwrap_or(20);
        let max_attempts: u32 = parse_var(&lookup, "NGD_MAX_ATTEMPTS")?.unwrap_or(3);
        let initial_delay_ms: u64 =
            parse_var(&lookup, "NGD_RETRY_INITIAL_DELAY_MS")?.unwrap_or(1000);
        let telemetry_filter_limit = parse_var(&lookup, "QUERY_PARAM_TELEMETRY_LENGTH_LIMIT")?
            .unwrap_or(defaults.telemetry_filter_limit);

        let log_request_details = match lookup("LOG_REQUEST_DETAILS") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
                name: "LOG_REQUEST_DETAILS",
                value,
            })?,
            None => defaults.log_request_details,
        };

        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "NGD_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            base_url,
            token_url,
            client_id: lookup("CLIENT_ID").filter(|s| !s.is_empty()),
            client_secret: lookup("CLIENT_SECRET").filter(|s| !s.is_empty()),
            request_timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(initial_delay_ms),
            },
            telemetry_filter_limit,
            log_request_details,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(None),
    }
}

/// Parse the boolean spellings accepted in environment variables and query strings.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
