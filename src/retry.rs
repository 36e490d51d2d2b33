//! Retry wrapper with per-attempt timeout and exponential backoff.

use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{ClientError, StreamingClient};
use crate::options::RetryOptions;
use crate::stream::StreamSink;

/// Stream `message` through `client`, retrying failed attempts.
///
/// Every fragment is forwarded to `sink.on_chunk` as it arrives, including
/// fragments of attempts that fail later. Each attempt runs under a child of
/// `cancel` that is cancelled once `options.timeout` has elapsed; such a
/// failure is first reported to the sink as [`ClientError::Timeout`].
///
/// Returns after the first successful attempt, with `sink.on_complete()`
/// called. Any failure is retried after `base_delay * 2^(attempt-1)` unless
/// `options.policy` rejects it. When the last attempt fails, or the policy
/// rejects the error, it is passed to `sink.on_error` and returned.
/// Cancelling `cancel` stops the wrapper without further attempts.
pub async fn stream_with_retry<C>(
    client: &C,
    message: &str,
    options: &RetryOptions,
    sink: &mut dyn StreamSink,
    cancel: &CancellationToken,
) -> Result<(), ClientError>
where
    C: StreamingClient + ?Sized,
{
    let max_retries = options.max_retries.max(1);
    let mut attempt = 1;

    loop {
        let attempt_cancel = cancel.child_token();
        let (result, timed_out) =
            run_attempt(client, message, sink, &attempt_cancel, options.timeout).await;

        let error = match result {
            Ok(()) => {
                debug!("Stream completed on attempt {}/{}", attempt, max_retries);
                sink.on_complete();
                return Ok(());
            }
            Err(e) => e,
        };

        if cancel.is_cancelled() {
            debug!("Stream cancelled by caller on attempt {}", attempt);
            sink.on_error(&error);
            return Err(error);
        }

        if timed_out {
            sink.on_error(&ClientError::Timeout(options.timeout));
        }

        if attempt >= max_retries || !options.policy.should_retry(&error) {
            warn!("Attempt {}/{} failed, giving up: {}", attempt, max_retries, error);
            sink.on_error(&error);
            return Err(error);
        }

        let delay = options.backoff_delay(attempt);
        warn!(
            "Attempt {}/{} failed: {}; retrying in {:?}",
            attempt, max_retries, error, delay
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let error = ClientError::Cancelled;
                sink.on_error(&error);
                return Err(error);
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}

/// Drive one attempt to completion. The flag reports whether the timeout fired.
async fn run_attempt<C>(
    client: &C,
    message: &str,
    sink: &mut dyn StreamSink,
    cancel: &CancellationToken,
    timeout: Duration,
) -> (Result<(), ClientError>, bool)
where
    C: StreamingClient + ?Sized,
{
    let attempt = async {
        let mut fragments = client.request_stream(message, cancel.clone()).await?;
        while let Some(fragment) = fragments.next().await {
            sink.on_chunk(&fragment?);
        }
        Ok::<(), ClientError>(())
    };
    tokio::pin!(attempt);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    tokio::select! {
        biased;
        result = &mut attempt => (result, false),
        _ = &mut deadline => {
            // The decoder observes the token and fails the read in flight.
            cancel.cancel();
            (attempt.await, true)
        }
    }
}
