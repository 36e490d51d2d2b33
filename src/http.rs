//! HTTP client utilities shared by the providers.
//!
//! This module provides client construction, extra headers and decoding of
//! provider error bodies.

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::client::ClientError;
use crate::options::TransportOptions;

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, ClientError> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => tracing::warn!("Ignoring invalid proxy {}: {}", proxy_url, e),
        }
    }

    builder
        .build()
        .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Send a request, giving up with [`ClientError::Cancelled`] if `cancel` fires first.
pub async fn send(request: RequestBuilder, cancel: &CancellationToken) -> Result<Response, ClientError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        response = request.send() => Ok(response?),
    }
}

/// Turn a non-success response into [`ClientError::Api`].
///
/// The message is the provider's `error.message` when the body carries one,
/// otherwise `"{fallback}: {status text}"`. Reading the body races `cancel`;
/// if the token fires first the result is [`ClientError::Cancelled`].
pub async fn error_from_response(
    response: Response,
    fallback: &str,
    cancel: &CancellationToken,
) -> ClientError {
    let status = response.status();
    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return ClientError::Cancelled,
        body = response.text() => body.unwrap_or_default(),
    };

    let message = provider_error_message(&body).unwrap_or_else(|| {
        format!(
            "{}: {}",
            fallback,
            status.canonical_reason().unwrap_or(status.as_str())
        )
    });

    ClientError::Api { status, message }
}

/// Extract `error.message` from an error body.
///
/// Gemini sometimes wraps the error object in a one-element array.
fn provider_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.pointer("/0/error/message"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}
