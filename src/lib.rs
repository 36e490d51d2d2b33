//! # streamchat - streaming chat client for OpenAI-compatible and Gemini APIs
//!
//! A small async library that sends a user message to an AI provider and
//! yields the reply as text fragments while it is generated.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - OpenAI-compatible (`data:` framed SSE) and Gemini (line-delimited JSON) decoders
//! - Cooperative cancellation through `tokio_util::sync::CancellationToken`
//! - Retry wrapper with per-attempt timeout and exponential backoff
//! - [`session::StreamSession`] for front ends that display a live response
//!
//! ## Architecture
//!
//! - **[`StreamingClient`]**: the provider seam; one implementation per wire format
//! - **[`providers::ProviderClient`]**: picks the implementation for a [`model::Provider`]
//! - **[`retry::stream_with_retry`]**: drives a client into a [`stream::StreamSink`]
//! - **[`config::Config`]**: TOML configuration with environment credentials
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use streamchat::model::Provider;
//! use streamchat::options::StreamConfig;
//! use streamchat::providers::ProviderClient;
//! use streamchat::StreamingClient;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StreamConfig::new(Provider::OpenAi, "https://api.openai.com/v1", "gpt-4o")
//!         .with_api_key("your-api-key");
//!     let client = ProviderClient::new(config)?;
//!
//!     let mut fragments = client.request_stream("Hello!", CancellationToken::new()).await?;
//!     while let Some(fragment) = fragments.next().await {
//!         print!("{}", fragment?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod retry;
pub mod session;
pub mod sse;
pub mod stream;
pub mod tokens;

// Re-exports for convenience
pub use client::{ClientError, StreamingClient};
pub use model::Provider;
pub use options::StreamConfig;
pub use retry::stream_with_retry;
pub use stream::{FragmentStream, StreamSink};
pub use tokio_util::sync::CancellationToken;
