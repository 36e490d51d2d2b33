//! TOML configuration file.
//!
//! Every field is optional; anything missing falls back to the provider's
//! defaults.
//!
//! ```toml
//! provider = "gemini"
//! model = "gemini-2.5-pro"
//!
//! [retry]
//! max_retries = 5
//! timeout_ms = 60000
//! policy = "transient"
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::client::ClientError;
use crate::model::Provider;
use crate::options::{
    ModelOptions, RetryOptions, RetryPolicy, SecretString, StreamConfig, TransportOptions,
};
use crate::providers::ProviderClient;
use crate::tokens::{CostTable, ModelPrice};

/// Environment variable checked for an API key before the provider's own.
pub const API_KEY_ENV: &str = "STREAMCHAT_API_KEY";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "STREAMCHAT_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider tag (`openai`, `ollama`, `gemini`); unknown tags mean OpenAI-compatible.
    pub provider: Option<Provider>,

    pub base_url: Option<String>,

    pub model: Option<String>,

    /// Takes precedence over the environment.
    pub api_key: Option<SecretString>,

    pub generation: ModelOptions,

    pub retry: RetrySection,

    pub transport: TransportSection,

    /// Extra or replacement prices, USD per million tokens.
    pub pricing: HashMap<String, ModelPrice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub base_delay_ms: Option<u64>,
    /// `always` (default) or `transient`.
    pub policy: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    pub timeout_ms: Option<u64>,
    pub proxy: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

impl Config {
    /// Load config if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let cfg = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(Some(cfg))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// `$STREAMCHAT_CONFIG`, else `$XDG_CONFIG_HOME/streamchat/config.toml`,
    /// else `$HOME/.config/streamchat/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        let config_home = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(config_home.join("streamchat").join("config.toml"))
    }

    pub fn provider(&self) -> Provider {
        self.provider.unwrap_or_default()
    }

    /// Resolve the stream config, reading credentials from the process environment.
    pub fn stream_config(&self) -> StreamConfig {
        self.stream_config_with_env(|key| env::var(key).ok())
    }

    /// Resolve the stream config with an explicit environment lookup.
    ///
    /// The API key comes from the file, else [`API_KEY_ENV`], else the
    /// provider's conventional variable.
    pub fn stream_config_with_env<F>(&self, lookup: F) -> StreamConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = self.provider();
        let api_key = self.api_key.clone().or_else(|| {
            lookup(API_KEY_ENV)
                .or_else(|| provider.api_key_env().and_then(|key| lookup(key)))
                .filter(|key| !key.is_empty())
                .map(SecretString::new)
        });

        StreamConfig {
            provider,
            api_key,
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
        }
    }

    pub fn model_options(&self) -> ModelOptions {
        self.generation
    }

    pub fn retry_options(&self) -> RetryOptions {
        let mut options = RetryOptions::default();
        if let Some(max_retries) = self.retry.max_retries {
            options = options.with_max_retries(max_retries);
        }
        if let Some(ms) = self.retry.timeout_ms {
            options = options.with_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.retry.base_delay_ms {
            options = options.with_base_delay(Duration::from_millis(ms));
        }
        if let Some(policy) = self.retry.policy {
            options = options.with_policy(policy);
        }
        options
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            timeout: self.transport.timeout_ms.map(Duration::from_millis),
            proxy: self.transport.proxy.clone(),
            extra_headers: self.transport.headers.clone(),
        }
    }

    /// Built-in price snapshot extended with the `[pricing]` entries.
    pub fn cost_table(&self) -> CostTable {
        let mut table = CostTable::default();
        table.extend(self.pricing.clone());
        table
    }

    /// Build the client for the configured provider.
    pub fn client(&self) -> Result<ProviderClient, ClientError> {
        ProviderClient::with_options(
            self.stream_config(),
            self.model_options(),
            self.transport_options(),
        )
    }
}
