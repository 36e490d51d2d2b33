//! Provider, model, transport and retry configuration.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;
use crate::model::Provider;

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Where and how to reach a provider. Immutable for the duration of a call.
///
/// # Example
/// ```rust
/// use streamchat::model::Provider;
/// use streamchat::options::StreamConfig;
///
/// let config = StreamConfig::new(Provider::OpenAi, "https://api.openai.com/v1", "gpt-4o")
///     .with_api_key("sk-...");
/// assert!(config.api_key.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub provider: Provider,

    /// Optional credential. Sent as a bearer token (OpenAI-compatible) or as
    /// the `key` query parameter (Gemini).
    pub api_key: Option<SecretString>,

    /// Base endpoint URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,

    /// Model identifier.
    pub model: String,
}

impl StreamConfig {
    pub fn new(provider: Provider, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: None,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Config pointing at the provider's default endpoint and model.
    pub fn for_provider(provider: Provider) -> Self {
        Self::new(provider, provider.default_base_url(), provider.default_model())
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Base URL without trailing slashes.
    pub(crate) fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Model behavior parameters sent with OpenAI-compatible requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: Some(1000),
        }
    }
}

impl ModelOptions {
    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// HTTP transport options.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Whole-request timeout enforced by the HTTP client.
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl TransportOptions {
    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

/// Which failed attempts [`crate::retry::stream_with_retry`] tries again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicy {
    /// Every failure, until the attempts run out.
    #[default]
    Always,

    /// Only failures for which [`ClientError::is_retryable`] holds.
    Transient,
}

impl RetryPolicy {
    pub fn should_retry(&self, error: &ClientError) -> bool {
        match self {
            RetryPolicy::Always => true,
            RetryPolicy::Transient => error.is_retryable(),
        }
    }
}

/// Options for [`crate::retry::stream_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Maximum number of attempts, including the first one.
    pub max_retries: u32,

    /// Per-attempt timeout; the attempt is cancelled when it elapses.
    pub timeout: Duration,

    /// Delay before the second attempt. Doubles for every further attempt.
    pub base_delay: Duration,

    pub policy: RetryPolicy,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_millis(30_000),
            base_delay: Duration::from_secs(1),
            policy: RetryPolicy::Always,
        }
    }
}

impl RetryOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Delay after the failed `attempt` (1-based): `base_delay * 2^(attempt-1)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = StreamConfig::for_provider(Provider::OpenAi).with_api_key("sk-secret");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn test_base_trims_trailing_slash() {
        let config = StreamConfig::new(Provider::OpenAi, "http://localhost:1234/v1/", "m");
        assert_eq!(config.base(), "http://localhost:1234/v1");
    }

    #[test]
    fn test_model_option_defaults() {
        let options = ModelOptions::default();
        assert_eq!(options.temperature, Some(0.7));
        assert_eq!(options.max_tokens, Some(1000));
    }

    #[test]
    fn test_backoff_doubles() {
        let retry = RetryOptions::default();
        assert_eq!(retry.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(retry.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(retry.backoff_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_defaults() {
        let retry = RetryOptions::default();
        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.timeout, Duration::from_millis(30_000));
        assert_eq!(retry.policy, RetryPolicy::Always);
    }

    #[test]
    fn test_retry_policy() {
        let unauthorized = ClientError::Api {
            status: reqwest::StatusCode::UNAUTHORIZED,
            message: "bad key".to_string(),
        };
        assert!(RetryPolicy::Always.should_retry(&unauthorized));
        assert!(!RetryPolicy::Transient.should_retry(&unauthorized));
        assert!(RetryPolicy::Transient.should_retry(&ClientError::Cancelled));
    }
}
