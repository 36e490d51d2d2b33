//! Core client trait and error types.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::Provider;
use crate::stream::FragmentStream;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request could not be sent or the connection failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be read to the end.
    #[error("Response body is not readable: {0}")]
    Body(#[source] reqwest::Error),

    /// The provider answered with a non-success status.
    ///
    /// Displays as the provider's own error message.
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("Stream cancelled")]
    Cancelled,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures, cancellation and timeouts are retryable, as are
    /// HTTP 408, 429 and 5xx responses. Any other provider error and all
    /// configuration errors are final. Consulted by
    /// [`RetryPolicy::Transient`](crate::options::RetryPolicy::Transient).
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_)
            | ClientError::Body(_)
            | ClientError::Cancelled
            | ClientError::Timeout(_) => true,
            ClientError::Api { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
            }
            ClientError::Config(_) => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

/// Streaming client trait for LLM providers.
///
/// Implement this trait to add support for a new provider wire format.
/// The returned stream is lazy and can be consumed once; it ends after the
/// provider's final frame or with the first error.
///
/// # Example
/// ```rust,ignore
/// #[async_trait]
/// impl StreamingClient for MyClient {
///     fn provider(&self) -> Provider {
///         Provider::OpenAi
///     }
///
///     async fn request_stream(
///         &self,
///         message: &str,
///         cancel: CancellationToken,
///     ) -> Result<FragmentStream, ClientError> {
///         // Send the request, then decode the body into fragments
///     }
/// }
/// ```
#[async_trait]
pub trait StreamingClient: Send + Sync {
    /// The provider this client talks to.
    fn provider(&self) -> Provider;

    /// Send `message` and return the stream of text fragments.
    ///
    /// Firing `cancel` aborts the request, or the read in flight, with
    /// [`ClientError::Cancelled`].
    async fn request_stream(
        &self,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, ClientError>;
}
