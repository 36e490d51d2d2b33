//! OpenAI-compatible Chat Completions streaming client.
//!
//! Works with OpenAI itself and with servers that mirror its API (Ollama,
//! LM Studio, Together, ...).
//! See: <https://platform.openai.com/docs/api-reference/chat/streaming>

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::client::{ClientError, StreamingClient};
use crate::http::{add_extra_headers, build_http_client, error_from_response, send};
use crate::model::Provider;
use crate::options::{ModelOptions, StreamConfig, TransportOptions};
use crate::sse::{is_done_marker, lines, parse_sse_line};
use crate::stream::FragmentStream;

const ERROR_PREFIX: &str = "API error";

/// OpenAI-compatible client using HTTP transport.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: StreamConfig,
    model_options: ModelOptions,
    transport_options: TransportOptions,
    http: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client with default model and transport options.
    pub fn new(config: StreamConfig) -> Result<Self, ClientError> {
        Self::with_options(config, ModelOptions::default(), TransportOptions::default())
    }

    pub fn with_options(
        config: StreamConfig,
        model_options: ModelOptions,
        transport_options: TransportOptions,
    ) -> Result<Self, ClientError> {
        let http = build_http_client(&transport_options)?;
        Ok(Self {
            config,
            model_options,
            transport_options,
            http,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.base())
    }

    /// Decode an SSE body into content deltas.
    fn process_stream<S>(body: S, cancel: CancellationToken) -> FragmentStream
    where
        S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    {
        Box::pin(async_stream::stream! {
            let mut lines = Box::pin(lines(body, cancel));
            let mut fragments = 0usize;

            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                match parse_frame(&line) {
                    Frame::Done => break,
                    Frame::Content(text) => {
                        fragments += 1;
                        yield Ok(text);
                    }
                    Frame::Skip => {}
                }
            }

            debug!("OpenAI-compatible stream ended after {} fragments", fragments);
        })
    }
}

#[async_trait]
impl StreamingClient for OpenAiClient {
    fn provider(&self) -> Provider {
        self.config.provider
    }

    async fn request_stream(
        &self,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, ClientError> {
        let url = self.url();
        let request_body = ChatCompletionRequest::new(&self.config.model, message, &self.model_options);

        let mut req = self.http.post(&url).header(CONTENT_TYPE, "application/json");
        if let Some(api_key) = &self.config.api_key {
            req = req.header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()));
        }
        req = add_extra_headers(req, &self.transport_options.extra_headers);

        debug!("Starting {} stream: model={} url={}", self.config.provider, self.config.model, url);

        let response = send(req.json(&request_body), &cancel).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, ERROR_PREFIX, &cancel).await);
        }

        Ok(Self::process_stream(response.bytes_stream(), cancel))
    }
}

/// What a single body line means to the decoder.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// `data: [DONE]`; stop reading.
    Done,
    Content(String),
    /// Not a data line, no content, or unparseable.
    Skip,
}

fn parse_frame(line: &str) -> Frame {
    let Some(data) = parse_sse_line(line) else {
        return Frame::Skip;
    };
    if is_done_marker(data) {
        return Frame::Done;
    }
    if data.is_empty() {
        return Frame::Skip;
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk.into_content().map_or(Frame::Skip, Frame::Content),
        Err(e) => {
            // Partial or garbled frames are expected noise.
            trace!("Skipping unparseable frame: {}", e);
            Frame::Skip
        }
    }
}

// --- OpenAI API Request/Response Types ---

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(model: &'a str, message: &'a str, options: &ModelOptions) -> Self {
        Self {
            model,
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: message,
            }],
            stream: true,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ChatRole {
    User,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: ChatRole,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionChunk {
    /// `choices[0].delta.content`, if present and non-empty.
    fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()?
            .delta?
            .content
            .filter(|content| !content.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn body(chunks: Vec<&'static str>) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send {
        stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))))
    }

    async fn decode(chunks: Vec<&'static str>) -> Vec<String> {
        OpenAiClient::process_stream(body(chunks), CancellationToken::new())
            .map(|fragment| fragment.unwrap())
            .collect()
            .await
    }

    #[test]
    fn test_parse_frame() {
        assert_eq!(
            parse_frame(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
            Frame::Content("Hi".to_string())
        );
        assert_eq!(parse_frame("data: [DONE]"), Frame::Done);
        assert_eq!(parse_frame("data:  [DONE]  "), Frame::Done);
        assert_eq!(parse_frame(": keep-alive"), Frame::Skip);
        assert_eq!(parse_frame(""), Frame::Skip);
        assert_eq!(parse_frame("data: "), Frame::Skip);
        assert_eq!(parse_frame("data: not-json"), Frame::Skip);
        assert_eq!(parse_frame(r#"data: {"choices":[{"delta":{"con"#), Frame::Skip);
    }

    #[test]
    fn test_parse_frame_without_content() {
        assert_eq!(parse_frame(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#), Frame::Skip);
        assert_eq!(parse_frame(r#"data: {"choices":[{"delta":{"content":""}}]}"#), Frame::Skip);
        assert_eq!(parse_frame(r#"data: {"choices":[{"delta":{"content":null}}]}"#), Frame::Skip);
        assert_eq!(parse_frame(r#"data: {"choices":[]}"#), Frame::Skip);
        assert_eq!(parse_frame(r#"data: {"choices":[{"finish_reason":"stop"}]}"#), Frame::Skip);
    }

    #[tokio::test]
    async fn test_invalid_frame_is_skipped() {
        let fragments = decode(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n",
            "data: not-json\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"!\"}}]}\n",
            "data: [DONE]\n",
        ])
        .await;
        assert_eq!(fragments, vec!["Hi", "!"]);
    }

    #[tokio::test]
    async fn test_fragments_concatenate_to_full_content() {
        let fragments = decode(vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"The \"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"quick \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"fox\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;
        assert_eq!(fragments.concat(), "The quick fox");
        assert_eq!(fragments.len(), 3);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads_is_reassembled() {
        let fragments = decode(vec![
            "data: {\"choices\":[{\"delta\":",
            "{\"content\":\"joined\"}}]}\n",
            "data: [DONE]\n",
        ])
        .await;
        assert_eq!(fragments, vec!["joined"]);
    }

    #[tokio::test]
    async fn test_done_marker_stops_reading() {
        let fragments = decode(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\ndata: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        ])
        .await;
        assert_eq!(fragments, vec!["a"]);
    }

    #[tokio::test]
    async fn test_stream_without_done_marker_ends_with_body() {
        let fragments = decode(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"]).await;
        assert_eq!(fragments, vec!["tail"]);
    }

    #[tokio::test]
    async fn test_cancel_during_read_is_an_error() {
        let cancel = CancellationToken::new();
        let pending = body(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n"])
            .chain(stream::pending());
        let mut fragments = OpenAiClient::process_stream(pending, cancel.clone());

        assert_eq!(fragments.next().await.unwrap().unwrap(), "x");
        cancel.cancel();
        assert!(matches!(fragments.next().await, Some(Err(ClientError::Cancelled))));
        assert!(fragments.next().await.is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatCompletionRequest::new("gpt-4o", "hello", &ModelOptions::default());
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "hello"}],
                "stream": true,
                "temperature": 0.7,
                "max_tokens": 1000
            })
        );
    }

    #[test]
    fn test_url_joins_base() {
        let config = StreamConfig::new(Provider::Ollama, "http://localhost:11434/v1/", "llama3.1");
        let client = OpenAiClient::new(config).unwrap();
        assert_eq!(client.url(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(client.provider(), Provider::Ollama);
    }
}
