//! Streaming from an OpenAI-compatible endpoint.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! cargo run --example openai_streaming
//! ```
//!
//! Set `OPENAI_BASE_URL` to point at another OpenAI-compatible server.

use std::io::Write;

use futures::StreamExt;
use streamchat::model::Provider;
use streamchat::options::{ModelOptions, StreamConfig, TransportOptions};
use streamchat::providers::ProviderClient;
use streamchat::{CancellationToken, StreamingClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("OPENAI_API_KEY")?;
    let base_url = std::env::var("OPENAI_BASE_URL")
        .unwrap_or_else(|_| Provider::OpenAi.default_base_url().to_string());

    let config = StreamConfig::new(Provider::OpenAi, base_url, "gpt-4o-mini").with_api_key(api_key);
    let model_options = ModelOptions::default()
        .with_temperature(0.9)
        .with_max_tokens(256);
    let transport_options =
        TransportOptions::default().with_timeout(std::time::Duration::from_secs(60));

    let client = ProviderClient::with_options(config, model_options, transport_options)?;

    println!("Streaming response from {}...\n", client.config().model);

    let mut fragments = client
        .request_stream("Write a haiku about Rust programming.", CancellationToken::new())
        .await?;

    while let Some(fragment) = fragments.next().await {
        print!("{}", fragment?);
        std::io::stdout().flush()?;
    }

    println!("\n\n--- Stream complete ---");
    Ok(())
}
