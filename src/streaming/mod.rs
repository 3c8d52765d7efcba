// Streaming completions
//
// `StreamingCompletionClient::open` sends the adapter's request and hands back
// a `CompletionStream`, an async iterator over text deltas. Every await point
// races the caller's `CancelHandle`; once cancellation is observed the body
// is dropped and the stream ends quietly with `Cancelled`.
//
// State machine: Idle -> Sending -> Streaming -> {Completed | Cancelled | Errored}

mod cancel;
pub mod sse;

pub use cancel::CancelHandle;
pub use sse::SseDecoder;

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

use crate::config::ProviderSettings;
use crate::conversation::Message;
use crate::errors::{ParleyError, Result};
use crate::providers::{check_status, error_message, http_client, ProviderAdapter, StreamDialect, StreamFrame};

/// Response body as a stream of raw chunks.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Cancelled,
    Errored,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Errored)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Delta(String),
    Completed,
    Cancelled,
}

/// Passed to the `complete` callback for every delta.
#[derive(Debug)]
pub struct TextUpdate<'a> {
    pub delta: &'a str,
    /// Everything received so far, including `delta`
    pub text: &'a str,
    pub cancel: CancelHandle,
}

#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub text: String,
    /// `Completed` or `Cancelled`
    pub state: StreamState,
    pub request_id: Uuid,
}

pub struct StreamingCompletionClient {
    client: Client,
}

impl StreamingCompletionClient {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(http_client()?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Send the completion request and open its response.
    ///
    /// Cancelling before the response arrives yields a stream that is
    /// already `Cancelled`, not an error.
    pub async fn open(
        &self,
        adapter: &dyn ProviderAdapter,
        conversation: &[Message],
        settings: &ProviderSettings,
        cancel: CancelHandle,
    ) -> Result<CompletionStream> {
        let request = adapter.build_request(conversation, settings)?;
        let dialect = adapter.dialect();
        let request_id = Uuid::new_v4();

        if cancel.is_cancelled() {
            return Ok(CompletionStream::cancelled(dialect, cancel, request_id));
        }

        tracing::debug!(
            %request_id,
            provider = adapter.name(),
            url = %request.url,
            state = ?StreamState::Sending,
            "Sending completion request"
        );

        let send = request.into_builder(&self.client).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            response = send => Some(response),
        };
        let Some(response) = response else {
            return Ok(CompletionStream::cancelled(dialect, cancel, request_id));
        };
        let response = check_status(response?).await?;

        if settings.stream {
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ParleyError::from))
                .boxed();
            let mut stream = CompletionStream::from_byte_stream(body, dialect, cancel);
            stream.request_id = request_id;
            return Ok(stream);
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            body = response.text() => Some(body),
        };
        match body {
            None => Ok(CompletionStream::cancelled(dialect, cancel, request_id)),
            Some(body) => {
                let text = dialect.parse_completion(&body?)?;
                Ok(CompletionStream::from_text(text, dialect, cancel, request_id))
            }
        }
    }
}

pub struct CompletionStream {
    body: Option<ByteStream>,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamFrame>>,
    dialect: StreamDialect,
    cancel: CancelHandle,
    text: String,
    state: StreamState,
    request_id: Uuid,
    saw_frame: bool,
}

impl CompletionStream {
    /// Wrap an already-open SSE body.
    pub fn from_byte_stream(body: ByteStream, dialect: StreamDialect, cancel: CancelHandle) -> Self {
        Self {
            body: Some(body),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            dialect,
            cancel,
            text: String::new(),
            state: StreamState::Streaming,
            request_id: Uuid::new_v4(),
            saw_frame: false,
        }
    }

    /// A whole non-streamed completion, delivered as a single delta.
    fn from_text(text: String, dialect: StreamDialect, cancel: CancelHandle, request_id: Uuid) -> Self {
        let mut pending = VecDeque::new();
        if !text.is_empty() {
            pending.push_back(Ok(StreamFrame::Delta(text)));
        }
        pending.push_back(Ok(StreamFrame::Done));
        Self {
            body: None,
            pending,
            saw_frame: true,
            request_id,
            ..Self::from_byte_stream(futures::stream::empty().boxed(), dialect, cancel)
        }
    }

    fn cancelled(dialect: StreamDialect, cancel: CancelHandle, request_id: Uuid) -> Self {
        tracing::debug!(%request_id, "Completion cancelled before response");
        Self {
            body: None,
            state: StreamState::Cancelled,
            request_id,
            ..Self::from_byte_stream(futures::stream::empty().boxed(), dialect, cancel)
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Next event, or `None` once a terminal event or error has been returned.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent>> {
        loop {
            if self.state.is_terminal() {
                return None;
            }
            if self.cancel.is_cancelled() {
                return Some(Ok(self.mark_cancelled()));
            }

            if let Some(frame) = self.pending.pop_front() {
                match frame {
                    Ok(StreamFrame::Delta(delta)) => {
                        self.text.push_str(&delta);
                        return Some(Ok(StreamEvent::Delta(delta)));
                    }
                    Ok(StreamFrame::Done) => return Some(Ok(self.mark_completed())),
                    Ok(StreamFrame::Error(message)) => {
                        return Some(Err(self.fail(ParleyError::Provider(message))))
                    }
                    Ok(StreamFrame::Ignore) => continue,
                    Err(e) => return Some(Err(self.fail(e))),
                }
            }

            let Some(body) = self.body.as_mut() else {
                return Some(self.end_of_body());
            };

            let cancel = self.cancel.clone();
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = body.next() => Some(chunk),
            };

            match next {
                None => return Some(Ok(self.mark_cancelled())),
                Some(Some(Ok(chunk))) => {
                    for payload in self.decoder.push(&chunk) {
                        self.queue(&payload);
                    }
                }
                Some(Some(Err(e))) => return Some(Err(self.fail(e))),
                Some(None) => {
                    self.body = None;
                    if let Some(payload) = self.decoder.finish() {
                        self.queue(&payload);
                    }
                }
            }
        }
    }

    /// Drive the stream to its end, calling `on_update` for every delta.
    pub async fn complete<F>(mut self, mut on_update: F) -> Result<CompletionOutcome>
    where
        F: FnMut(TextUpdate<'_>),
    {
        while let Some(event) = self.next_event().await {
            match event? {
                StreamEvent::Delta(delta) => on_update(TextUpdate {
                    delta: &delta,
                    text: &self.text,
                    cancel: self.cancel.clone(),
                }),
                StreamEvent::Completed | StreamEvent::Cancelled => break,
            }
        }
        Ok(CompletionOutcome {
            text: self.text,
            state: self.state,
            request_id: self.request_id,
        })
    }

    fn queue(&mut self, payload: &str) {
        self.saw_frame = true;
        self.pending.push_back(self.dialect.parse_frame(payload));
    }

    /// Body ended without a terminal frame.
    fn end_of_body(&mut self) -> Result<StreamEvent> {
        if !self.saw_frame {
            let stray = self.decoder.stray_text().trim();
            if let Some(error) = serde_json::from_str::<serde_json::Value>(stray)
                .ok()
                .and_then(|body| body.get("error").map(error_message))
            {
                return Err(self.fail(ParleyError::Provider(error)));
            }
        }
        Ok(self.mark_completed())
    }

    fn mark_completed(&mut self) -> StreamEvent {
        self.body = None;
        self.state = StreamState::Completed;
        tracing::debug!(request_id = %self.request_id, chars = self.text.len(), "Completion finished");
        StreamEvent::Completed
    }

    fn mark_cancelled(&mut self) -> StreamEvent {
        // Dropping the body aborts the underlying request.
        self.body = None;
        self.pending.clear();
        self.state = StreamState::Cancelled;
        tracing::debug!(request_id = %self.request_id, chars = self.text.len(), "Completion cancelled");
        StreamEvent::Cancelled
    }

    fn fail(&mut self, error: ParleyError) -> ParleyError {
        self.body = None;
        self.pending.clear();
        self.state = StreamState::Errored;
        tracing::warn!(request_id = %self.request_id, error = %error, "Completion failed");
        error
    }
}
