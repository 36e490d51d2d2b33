//! Streaming from Gemini with retries.
//!
//! Run with:
//! ```bash
//! export GEMINI_API_KEY="your-api-key"
//! cargo run --example gemini_streaming
//! ```

use std::io::Write;
use std::time::Duration;

use streamchat::model::Provider;
use streamchat::options::{RetryOptions, StreamConfig};
use streamchat::providers::ProviderClient;
use streamchat::{stream_with_retry, CancellationToken, ClientError, StreamSink};

/// Prints fragments as they arrive.
struct Stdout;

impl StreamSink for Stdout {
    fn on_chunk(&mut self, chunk: &str) {
        print!("{}", chunk);
        let _ = std::io::stdout().flush();
    }

    fn on_error(&mut self, error: &ClientError) {
        eprintln!("\n[error] {}", error);
    }

    fn on_complete(&mut self) {
        println!("\n\n--- Stream complete ---");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("GEMINI_API_KEY")?;

    let config = StreamConfig::for_provider(Provider::Gemini).with_api_key(api_key);
    let client = ProviderClient::new(config)?;

    let retry = RetryOptions::default()
        .with_max_retries(3)
        .with_timeout(Duration::from_secs(60));

    println!("Streaming response from Gemini...\n");

    stream_with_retry(
        &client,
        "Write a haiku about Rust programming.",
        &retry,
        &mut Stdout,
        &CancellationToken::new(),
    )
    .await?;

    Ok(())
}
