//! Streaming reconstruction.
//!
//! Adapters decode one wire event at a time into a [`StreamChunk`];
//! [`StreamAccumulator`] folds those chunks, in arrival order, into the
//! final [`CanonicalResponse`].

pub mod merge;
pub mod sse;

pub use merge::{FunctionCallMerger, MergeState};
pub use sse::{parse_sse_frame, SseEvent, SseParser};

use crate::error::CanonicalError;
use crate::protocol::canonical::{
    CanonicalResponse, ChatResult, FinishReason, FunctionCall, ResultDelta, StreamChunk,
    UsageDelta,
};

/// How far past the highest result seen so far a new result index may land.
const MAX_RESULT_GAP: usize = 16;

#[derive(Debug, Clone, Default)]
struct PartialResult {
    content: Option<String>,
    name: Option<String>,
    calls: FunctionCallMerger,
    finish_reason: Option<FinishReason>,
}

impl PartialResult {
    fn apply(&mut self, delta: &ResultDelta, finalized: &mut Vec<FunctionCall>) {
        if let Some(text) = delta.content.as_deref().filter(|t| !t.is_empty()) {
            self.content.get_or_insert_with(String::new).push_str(text);
        }
        if let Some(name) = delta.name.as_deref().filter(|n| !n.is_empty()) {
            self.name = Some(name.to_owned());
        }
        for call in &delta.function_calls {
            finalized.extend(self.calls.merge_one(call));
        }
        if delta.finish_reason.is_some() {
            self.finish_reason = delta.finish_reason;
        }
    }

    fn snapshot(&self) -> ChatResult {
        ChatResult {
            content: self.content.clone(),
            name: self.name.clone(),
            function_calls: self.calls.calls().to_vec(),
            finish_reason: self.finish_reason,
        }
    }

    fn into_result(self) -> ChatResult {
        ChatResult {
            content: self.content,
            name: self.name,
            function_calls: self.calls.into_calls(),
            finish_reason: self.finish_reason,
        }
    }
}

/// Owned state of one in-flight stream. Not shared across streams.
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    remote_id: Option<String>,
    results: Vec<PartialResult>,
    usage: UsageDelta,
    done: bool,
}

impl StreamAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decoded event. Returns the function calls this event
    /// finalized, in the order they completed.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::BackendProtocol`] when a result index lies
    /// implausibly far past the results seen so far. Nothing is applied then.
    pub fn push(&mut self, chunk: StreamChunk) -> Result<Vec<FunctionCall>, CanonicalError> {
        let mut finalized = Vec::new();
        match chunk {
            StreamChunk::Ignored => {}
            StreamChunk::Done => self.done = true,
            StreamChunk::Delta(delta) => {
                let limit = self.results.len() + MAX_RESULT_GAP;
                if let Some(result) = delta.results.iter().find(|r| r.index > limit) {
                    return Err(CanonicalError::protocol(format!(
                        "stream result index {} out of range",
                        result.index
                    )));
                }
                if let Some(remote_id) = delta.remote_id {
                    self.remote_id = Some(remote_id);
                }
                for result in &delta.results {
                    if self.results.len() <= result.index {
                        self.results.resize_with(result.index + 1, PartialResult::default);
                    }
                    self.results[result.index].apply(result, &mut finalized);
                }
                if let Some(usage) = delta.usage {
                    self.usage.overlay(&usage);
                }
            }
        }
        Ok(finalized)
    }

    /// Whether the backend signalled the end of the stream.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    /// Current partial results, including calls still accumulating.
    #[must_use]
    pub fn results(&self) -> Vec<ChatResult> {
        self.results.iter().map(PartialResult::snapshot).collect()
    }

    /// Calls no later fragment has finalized yet, one per result at most.
    #[must_use]
    pub fn pending_calls(&self) -> Vec<&FunctionCall> {
        self.results
            .iter()
            .filter_map(|result| result.calls.pending())
            .collect()
    }

    /// Final response. Pending calls are flushed into their results.
    #[must_use]
    pub fn finish(self) -> CanonicalResponse {
        let mut results: Vec<ChatResult> = self
            .results
            .into_iter()
            .map(PartialResult::into_result)
            .collect();
        if results.is_empty() {
            results.push(ChatResult::default());
        }
        tracing::debug!(
            remote_id = self.remote_id.as_deref().unwrap_or(""),
            results = results.len(),
            done = self.done,
            "stream accumulated"
        );
        CanonicalResponse {
            session_id: None,
            remote_id: self.remote_id,
            results,
            model_usage: self.usage.to_usage(),
            embed_model_usage: None,
        }
    }
}
