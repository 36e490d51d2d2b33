//! Streaming types shared by the providers and the retry wrapper.

use futures::stream::BoxStream;

use crate::client::ClientError;

/// Lazy, finite stream of text fragments produced by one request.
pub type FragmentStream = BoxStream<'static, Result<String, ClientError>>;

/// Receives the events of a streamed response.
///
/// All methods default to doing nothing, so a sink only overrides what it needs.
pub trait StreamSink: Send {
    /// Called with every fragment as it arrives.
    fn on_chunk(&mut self, _chunk: &str) {}

    /// Called when an attempt fails. May be called more than once per request.
    fn on_error(&mut self, _error: &ClientError) {}

    /// Called once when the response was received completely.
    fn on_complete(&mut self) {}
}

/// Sink that ignores every event.
impl StreamSink for () {}

/// Collects fragments into the string.
impl StreamSink for String {
    fn on_chunk(&mut self, chunk: &str) {
        self.push_str(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_sink_accumulates() {
        let mut out = String::new();
        out.on_chunk("Hel");
        out.on_chunk("lo");
        out.on_error(&ClientError::Cancelled);
        out.on_complete();
        assert_eq!(out, "Hello");
    }
}
