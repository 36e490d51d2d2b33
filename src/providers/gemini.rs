//! Google Gemini streaming client.
//!
//! Calls `streamGenerateContent` and reads the body as one JSON object per line.
//! See: <https://ai.google.dev/api/rest>

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::client::{ClientError, StreamingClient};
use crate::http::{add_extra_headers, build_http_client, error_from_response, send};
use crate::model::Provider;
use crate::options::{StreamConfig, TransportOptions};
use crate::sse::lines;
use crate::stream::FragmentStream;

const ERROR_PREFIX: &str = "Gemini API error";

/// Gemini client using HTTP transport.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: StreamConfig,
    transport_options: TransportOptions,
    http: reqwest::Client,
}

impl GeminiClient {
    /// Create a client with default transport options.
    pub fn new(config: StreamConfig) -> Result<Self, ClientError> {
        Self::with_options(config, TransportOptions::default())
    }

    pub fn with_options(
        config: StreamConfig,
        transport_options: TransportOptions,
    ) -> Result<Self, ClientError> {
        let http = build_http_client(&transport_options)?;
        Ok(Self {
            config,
            transport_options,
            http,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// `{base}/models/{model}:streamGenerateContent?key={api_key}`
    fn url(&self) -> Result<Url, ClientError> {
        let raw = format!(
            "{}/models/{}:streamGenerateContent",
            self.config.base(),
            self.config.model
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| ClientError::Config(format!("invalid Gemini URL {}: {}", raw, e)))?;

        if let Some(api_key) = &self.config.api_key {
            url.query_pairs_mut().append_pair("key", api_key.expose_secret());
        }
        Ok(url)
    }

    /// Decode a line-delimited JSON body into candidate text.
    fn process_stream<S>(body: S, cancel: CancellationToken) -> FragmentStream
    where
        S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    {
        Box::pin(async_stream::stream! {
            let mut lines = Box::pin(lines(body, cancel));
            let mut fragments = 0usize;

            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => {
                        if let Some(text) = parse_line(&line) {
                            fragments += 1;
                            yield Ok(text);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }

            debug!("Gemini stream ended after {} fragments", fragments);
        })
    }
}

#[async_trait]
impl StreamingClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn request_stream(
        &self,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, ClientError> {
        let url = self.url()?;
        let request_body = GenerateContentRequest::new(message);

        let mut req = self.http.post(url).header(CONTENT_TYPE, "application/json");
        req = add_extra_headers(req, &self.transport_options.extra_headers);

        debug!("Starting gemini stream: model={}", self.config.model);

        let response = send(req.json(&request_body), &cancel).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, ERROR_PREFIX, &cancel).await);
        }

        Ok(Self::process_stream(response.bytes_stream(), cancel))
    }
}

/// `candidates[0].content.parts[0].text` of a non-blank line.
fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<GenerateContentResponse>(line) {
        Ok(response) => response.into_text(),
        Err(e) => {
            trace!("Skipping unparseable line: {}", e);
            None
        }
    }
}

// --- Gemini API Request/Response Types ---

#[derive(Debug, Clone, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(message: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: message }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
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
        GeminiClient::process_stream(body(chunks), CancellationToken::new())
            .map(|fragment| fragment.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_one_fragment_per_line() {
        let fragments = decode(vec![
            "{\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"A\"}]}}]}\n",
            "{\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"B\"}]}}]}\n",
        ])
        .await;
        assert_eq!(fragments, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_blank_and_malformed_lines_are_skipped() {
        let fragments = decode(vec![
            "\n   \n",
            "{\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ok\"}]}}]}\n",
            "[\n",
            "{\"candidates\":[{\"content\":{\"parts\":[{\"te\n",
            "{\"usageMetadata\":{\"promptTokenCount\":3}}\n",
        ])
        .await;
        assert_eq!(fragments, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_line_split_across_reads_is_reassembled() {
        let fragments = decode(vec![
            "{\"candidates\":[{\"content\":",
            "{\"parts\":[{\"text\":\"whole\"}]}}]}",
        ])
        .await;
        assert_eq!(fragments, vec!["whole"]);
    }

    #[test]
    fn test_parse_line_takes_first_part_only() {
        let line = r#"{"candidates":[{"content":{"parts":[{"text":"first"},{"text":"second"}]}},{"content":{"parts":[{"text":"other"}]}}]}"#;
        assert_eq!(parse_line(line), Some("first".to_string()));
        assert_eq!(parse_line(r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#), None);
        assert_eq!(parse_line(r#"{"candidates":[{"finishReason":"STOP"}]}"#), None);
    }

    #[tokio::test]
    async fn test_cancel_during_read_is_an_error() {
        let cancel = CancellationToken::new();
        let pending = body(vec!["{\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"A\"}]}}]}\n"])
            .chain(stream::pending());
        let mut fragments = GeminiClient::process_stream(pending, cancel.clone());

        assert_eq!(fragments.next().await.unwrap().unwrap(), "A");
        cancel.cancel();
        assert!(matches!(fragments.next().await, Some(Err(ClientError::Cancelled))));
    }

    #[test]
    fn test_request_body_shape() {
        let value = serde_json::to_value(GenerateContentRequest::new("hello")).unwrap();
        assert_eq!(value, json!({"contents": [{"parts": [{"text": "hello"}]}]}));
    }

    #[test]
    fn test_url_embeds_model_and_key() {
        let config = StreamConfig::new(
            Provider::Gemini,
            "https://generativelanguage.googleapis.com/v1beta/",
            "gemini-2.5-pro",
        )
        .with_api_key("k&y");
        let url = GeminiClient::new(config).unwrap().url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:streamGenerateContent?key=k%26y"
        );
    }

    #[test]
    fn test_url_without_key() {
        let config = StreamConfig::new(Provider::Gemini, "http://localhost:8080/v1beta", "m");
        let url = GeminiClient::new(config).unwrap().url().unwrap();
        assert_eq!(url.query(), None);
    }
}
