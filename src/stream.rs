use crate::{
    error::Result,
    response::{CompletionAccess, OrchestrationResponse},
    transport::ChunkStream,
    types::{CompletionPostResponse, CompletionPostResponseChunk, LlmChoice, ResponseChatMessage},
    OrchestrationError,
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Lifecycle of an [`OrchestrationStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Accepting chunks.
    Open,
    /// The chunk sequence ended normally; accessors see the final response.
    Closed,
    /// Cancellation was requested; content holds whatever arrived before it.
    Cancelled,
    /// The chunk sequence failed; content holds whatever arrived before it.
    Failed,
}

/// Rebuilds a full completion from a sequence of partial chunks.
///
/// Chunks are merged strictly in arrival order: content fragments are
/// appended per choice `index`, finish reasons and usage keep the last value
/// seen. Once the stream is [`StreamState::Closed`] the
/// [`CompletionAccess`] accessors behave exactly like a non-streaming
/// [`OrchestrationResponse`]. In any other state they expose the partial
/// result and [`is_complete`](Self::is_complete) returns `false`.
///
/// The underlying transport stream is released exactly once, on close,
/// cancellation, failure, or drop, whichever happens first.
pub struct OrchestrationStream {
    inner: Option<ChunkStream>,
    cancel: CancellationToken,
    state: StreamState,
    data: CompletionPostResponse,
    failure: Option<OrchestrationError>,
}

enum Polled {
    Cancelled,
    Chunk(Option<Result<CompletionPostResponseChunk>>),
}

impl std::fmt::Debug for OrchestrationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestrationStream")
            .field("state", &self.state)
            .field("released", &self.inner.is_none())
            .field("choices", &self.data.orchestration_result.choices.len())
            .field("failure", &self.failure)
            .finish()
    }
}

impl OrchestrationStream {
    /// Wrap a chunk sequence, observing `cancel` between chunks.
    pub fn new(chunks: ChunkStream, cancel: CancellationToken) -> Self {
        Self {
            inner: Some(chunks),
            cancel,
            state: StreamState::Open,
            data: CompletionPostResponse::default(),
            failure: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// True only when the chunk sequence ended normally.
    pub fn is_complete(&self) -> bool {
        self.state == StreamState::Closed
    }

    /// The error that ended the stream, if it failed.
    pub fn failure(&self) -> Option<&OrchestrationError> {
        self.failure.as_ref()
    }

    /// The token this stream and its transport call observe.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request cancellation and stop consuming immediately.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if self.state == StreamState::Open {
            self.transition(StreamState::Cancelled);
        }
    }

    /// Wait for the next chunk and merge it.
    ///
    /// Returns the chunk as received so callers can consume the stream
    /// progressively. Returns `None` once the stream is closed, cancelled
    /// or failed. A failure is returned once, as `Some(Err(_))`.
    pub async fn next(&mut self) -> Option<Result<CompletionPostResponseChunk>> {
        if self.state != StreamState::Open {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.transition(StreamState::Cancelled);
            return None;
        }
        let Some(inner) = self.inner.as_mut() else {
            self.transition(StreamState::Closed);
            return None;
        };

        let polled = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Polled::Cancelled,
            item = inner.next() => Polled::Chunk(item),
        };

        match polled {
            Polled::Cancelled => {
                self.transition(StreamState::Cancelled);
                None
            }
            Polled::Chunk(None) => {
                self.transition(StreamState::Closed);
                None
            }
            Polled::Chunk(Some(Ok(chunk))) => {
                self.merge(&chunk);
                Some(Ok(chunk))
            }
            Polled::Chunk(Some(Err(e))) => {
                self.failure = Some(e.replay());
                self.transition(StreamState::Failed);
                Some(Err(e))
            }
        }
    }

    /// Consume the remaining chunks and report how the stream ended.
    pub async fn finish(&mut self) -> Result<()> {
        while let Some(item) = self.next().await {
            item?;
        }
        match self.state {
            StreamState::Cancelled => Err(OrchestrationError::Cancelled),
            StreamState::Failed => Err(self
                .failure
                .as_ref()
                .map(OrchestrationError::replay)
                .unwrap_or_else(|| OrchestrationError::Stream("stream failed".to_string()))),
            StreamState::Open | StreamState::Closed => Ok(()),
        }
    }

    /// Finish the stream and hand back the reassembled response.
    pub async fn into_response(mut self) -> Result<OrchestrationResponse> {
        self.finish().await?;
        Ok(OrchestrationResponse::new(std::mem::take(&mut self.data)))
    }

    fn merge(&mut self, chunk: &CompletionPostResponseChunk) {
        if let Some(request_id) = &chunk.request_id {
            if self.data.request_id.is_empty() {
                self.data.request_id = request_id.clone();
            }
        }
        if let Some(results) = &chunk.module_results {
            self.data
                .module_results
                .get_or_insert_with(Default::default)
                .merge(results.clone());
        }

        let Some(result) = &chunk.orchestration_result else {
            return;
        };
        let acc = &mut self.data.orchestration_result;

        if let Some(id) = &result.id {
            acc.id = id.clone();
        }
        if let Some(object) = &result.object {
            acc.object = object.clone();
        }
        if let Some(created) = result.created {
            acc.created = created;
        }
        if let Some(model) = &result.model {
            acc.model = model.clone();
        }
        if result.system_fingerprint.is_some() {
            acc.system_fingerprint = result.system_fingerprint.clone();
        }

        for delta in &result.choices {
            let pos = match acc.choices.iter().position(|c| c.index == delta.index) {
                Some(pos) => pos,
                None => {
                    acc.choices.push(LlmChoice {
                        index: delta.index,
                        message: ResponseChatMessage {
                            role: None,
                            content: Some(String::new()),
                        },
                        finish_reason: None,
                    });
                    acc.choices.len() - 1
                }
            };
            let choice = &mut acc.choices[pos];

            if let Some(role) = delta.delta.role {
                choice.message.role = Some(role);
            }
            if let Some(content) = &delta.delta.content {
                choice
                    .message
                    .content
                    .get_or_insert_with(String::new)
                    .push_str(content);
            }
            if let Some(reason) = &delta.finish_reason {
                choice.finish_reason = Some(reason.clone());
            }
        }

        if let Some(usage) = &result.usage {
            acc.usage = Some(usage.clone());
        }

        tracing::trace!(choices = result.choices.len(), "merged stream chunk");
    }

    fn transition(&mut self, state: StreamState) {
        self.state = state;
        match state {
            StreamState::Closed => tracing::debug!(
                request_id = %self.data.request_id,
                "orchestration stream closed"
            ),
            StreamState::Cancelled => tracing::info!(
                request_id = %self.data.request_id,
                "orchestration stream cancelled"
            ),
            StreamState::Failed => tracing::warn!(
                request_id = %self.data.request_id,
                error = ?self.failure,
                "orchestration stream failed"
            ),
            StreamState::Open => {}
        }
        self.release();
    }

    fn release(&mut self) {
        if let Some(inner) = self.inner.take() {
            drop(inner);
            tracing::debug!("released orchestration stream transport");
        }
    }
}

impl CompletionAccess for OrchestrationStream {
    fn data(&self) -> &CompletionPostResponse {
        &self.data
    }
}

impl Drop for OrchestrationStream {
    fn drop(&mut self) {
        if self.state == StreamState::Open {
            self.cancel.cancel();
        }
        self.release();
    }
}
