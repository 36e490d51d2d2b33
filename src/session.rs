//! A reusable streaming session that accumulates output and tracks state.
//!
//! [`StreamSession`] is what a chat front end binds to: it owns a client,
//! collects the fragments of the current response and exposes whether a
//! response is in flight, finished, failed or was stopped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{ClientError, StreamingClient};

/// Lifecycle of the current (or last) response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
    /// Stopped through a [`StopHandle`], or the run was dropped. No error is recorded.
    Cancelled,
}

/// Stops the response a [`StreamSession`] is currently streaming.
///
/// Cloneable and usable from any task. Stopping while nothing is streaming
/// does nothing.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl StopHandle {
    pub fn stop(&self) {
        if let Some(token) = self.lock().as_ref() {
            token.cancel();
        }
    }

    /// Whether a response is being streamed right now.
    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.lock() = Some(token.clone());
        token
    }

    fn finish(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Streams one response at a time and keeps its output.
pub struct StreamSession<C> {
    client: C,
    output: String,
    state: SessionState,
    error: Option<String>,
    stop: StopHandle,
}

impl<C: StreamingClient> StreamSession<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            output: String::new(),
            state: SessionState::Idle,
            error: None,
            stop: StopHandle::default(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Text received so far for the current or last response.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Message of the last failure, if the last response failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.state == SessionState::Streaming
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Stream a response to `message`, replacing the previous output.
    pub async fn run(&mut self, message: &str) -> SessionState {
        self.run_with(message, |_| {}).await
    }

    /// Like [`run`](Self::run), also passing every fragment to `on_chunk`.
    pub async fn run_with<F>(&mut self, message: &str, mut on_chunk: F) -> SessionState
    where
        F: FnMut(&str),
    {
        self.output.clear();
        self.error = None;
        self.state = SessionState::Streaming;

        let cancel = self.stop.begin();
        let run = ActiveRun {
            stop: &self.stop,
            state: &mut self.state,
        };
        let result = consume(&self.client, message, cancel, &mut self.output, &mut on_chunk).await;

        *run.state = match result {
            Ok(()) => SessionState::Completed,
            Err(e) if e.is_cancelled() => {
                debug!("Session stopped after {} bytes", self.output.len());
                SessionState::Cancelled
            }
            Err(e) => {
                self.error = Some(e.to_string());
                SessionState::Failed
            }
        };
        drop(run);
        self.state
    }
}

/// Ends the run on every exit path. A run whose future is dropped mid-stream
/// counts as stopped.
struct ActiveRun<'a> {
    stop: &'a StopHandle,
    state: &'a mut SessionState,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.stop.finish();
        if *self.state == SessionState::Streaming {
            *self.state = SessionState::Cancelled;
        }
    }
}

async fn consume<C, F>(
    client: &C,
    message: &str,
    cancel: CancellationToken,
    output: &mut String,
    on_chunk: &mut F,
) -> Result<(), ClientError>
where
    C: StreamingClient,
    F: FnMut(&str),
{
    let mut fragments = client.request_stream(message, cancel).await?;
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        on_chunk(&fragment);
        output.push_str(&fragment);
    }
    Ok(())
}
