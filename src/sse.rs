//! Line-oriented decoding of streamed response bodies.
//!
//! Both provider families stream newline-delimited text. OpenAI-compatible
//! servers frame every event as an SSE data line:
//! ```text
//! data: {"key": "value"}
//!
//! data: [DONE]
//! ```
//! while Gemini writes one JSON object per line. [`lines`] turns the raw body
//! into complete lines; the helpers below interpret SSE framing.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::client::ClientError;

enum Read {
    Cancelled,
    Next(Option<Result<Bytes, reqwest::Error>>),
}

/// Split a response body into lines as they arrive.
///
/// Bytes are buffered until a `\n` is seen, so a line cut in half by the
/// network is reassembled before it is yielded. The `\n` and an optional
/// trailing `\r` are removed. A final line without terminator is yielded when
/// the body ends.
///
/// Every read races `cancel`; if the token fires first the stream yields
/// [`ClientError::Cancelled`] and ends. A failing read yields
/// [`ClientError::Body`] and ends. The body is dropped as soon as the stream
/// finishes or is dropped itself.
pub fn lines<S>(body: S, cancel: CancellationToken) -> impl Stream<Item = Result<String, ClientError>> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    async_stream::stream! {
        let mut body = Box::pin(body);
        let mut buffer = BytesMut::new();

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => Read::Cancelled,
                next = body.next() => Read::Next(next),
            };

            match read {
                Read::Cancelled => {
                    yield Err(ClientError::Cancelled);
                    break;
                }
                Read::Next(Some(Ok(chunk))) => {
                    buffer.extend_from_slice(&chunk);
                    while let Some(line) = take_line(&mut buffer) {
                        yield Ok(line);
                    }
                }
                Read::Next(Some(Err(e))) => {
                    yield Err(ClientError::Body(e));
                    break;
                }
                Read::Next(None) => {
                    if !buffer.is_empty() {
                        yield Ok(decode_line(&buffer.split()));
                    }
                    break;
                }
            }
        }

        drop(body);
        trace!("Response body released");
    }
}

/// Remove the first complete line from `buffer`, if there is one.
///
/// `split_to` only moves the start of the buffer, so draining a chunk line by
/// line stays linear in its length.
fn take_line(buffer: &mut BytesMut) -> Option<String> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let line = buffer.split_to(pos + 1);
    Some(decode_line(&line[..pos]))
}

fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`
///
/// # Example
/// ```
/// use streamchat::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data: ").map(|s| s.trim())
}

/// Check if an SSE data line indicates the stream is done.
///
/// # Example
/// ```
/// use streamchat::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}
