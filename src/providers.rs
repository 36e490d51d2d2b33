//! LLM provider implementations and the dispatcher over them.

pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use crate::client::{ClientError, StreamingClient};
use crate::model::{Provider, WireFormat};
use crate::options::{ModelOptions, StreamConfig, TransportOptions};
use crate::stream::FragmentStream;

/// A client for whichever wire format the configured provider speaks.
#[derive(Debug, Clone)]
pub enum ProviderClient {
    OpenAi(OpenAiClient),
    Gemini(GeminiClient),
}

impl ProviderClient {
    /// Pick the client for `config.provider` with default options.
    pub fn new(config: StreamConfig) -> Result<Self, ClientError> {
        Self::with_options(config, ModelOptions::default(), TransportOptions::default())
    }

    /// Pick the client for `config.provider`.
    ///
    /// `model_options` only affect OpenAI-compatible requests; the Gemini
    /// request carries the message alone.
    pub fn with_options(
        config: StreamConfig,
        model_options: ModelOptions,
        transport_options: TransportOptions,
    ) -> Result<Self, ClientError> {
        match config.provider.wire_format() {
            WireFormat::Gemini => Ok(ProviderClient::Gemini(GeminiClient::with_options(
                config,
                transport_options,
            )?)),
            WireFormat::OpenAiCompatible => Ok(ProviderClient::OpenAi(OpenAiClient::with_options(
                config,
                model_options,
                transport_options,
            )?)),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        match self {
            ProviderClient::OpenAi(client) => client.config(),
            ProviderClient::Gemini(client) => client.config(),
        }
    }
}

#[async_trait]
impl StreamingClient for ProviderClient {
    fn provider(&self) -> Provider {
        match self {
            ProviderClient::OpenAi(client) => client.provider(),
            ProviderClient::Gemini(client) => client.provider(),
        }
    }

    async fn request_stream(
        &self,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, ClientError> {
        match self {
            ProviderClient::OpenAi(client) => client.request_stream(message, cancel).await,
            ProviderClient::Gemini(client) => client.request_stream(message, cancel).await,
        }
    }
}

/// Stream a single message with default options.
///
/// # Example
/// ```no_run
/// use futures::StreamExt;
/// use streamchat::model::Provider;
/// use streamchat::options::StreamConfig;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), streamchat::ClientError> {
/// let config = StreamConfig::for_provider(Provider::OpenAi).with_api_key("sk-...");
/// let mut fragments = streamchat::providers::stream("Hello!", &config, CancellationToken::new()).await?;
/// while let Some(fragment) = fragments.next().await {
///     print!("{}", fragment?);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn stream(
    message: &str,
    config: &StreamConfig,
    cancel: CancellationToken,
) -> Result<FragmentStream, ClientError> {
    ProviderClient::new(config.clone())?
        .request_stream(message, cancel)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_tag_selects_gemini_client() {
        let client = ProviderClient::new(StreamConfig::for_provider(Provider::Gemini)).unwrap();
        assert!(matches!(client, ProviderClient::Gemini(_)));
        assert_eq!(client.provider(), Provider::Gemini);
    }

    #[test]
    fn test_other_tags_select_openai_compatible_client() {
        for tag in ["openai", "ollama", "lmstudio", "together"] {
            let config = StreamConfig::for_provider(Provider::from(tag));
            let client = ProviderClient::new(config).unwrap();
            assert!(matches!(client, ProviderClient::OpenAi(_)), "tag {}", tag);
        }
    }

    #[test]
    fn test_config_is_kept() {
        let config = StreamConfig::new(Provider::Ollama, "http://localhost:11434/v1", "qwen2");
        let client = ProviderClient::new(config).unwrap();
        assert_eq!(client.config().model, "qwen2");
        assert_eq!(client.provider(), Provider::Ollama);
    }
}
