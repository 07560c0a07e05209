use crate::error::CanonicalError;
use crate::protocol::canonical::{CanonicalResponse, ResponseDelta, StreamChunk};
use crate::protocol::gemini::response_decoder::{decode_candidates, decode_usage};
use crate::protocol::gemini::GeminiResponse;

/// Parse one `alt=sse` data payload.
///
/// # Errors
///
/// Returns [`CanonicalError::BackendProtocol`] when the payload is not a
/// Gemini response chunk.
pub fn parse_gemini_sse(data: &[u8]) -> Result<GeminiResponse, CanonicalError> {
    serde_json::from_slice(data)
        .map_err(|e| CanonicalError::protocol(format!("malformed gemini stream chunk: {e}")))
}

/// Decode one Gemini stream chunk.
///
/// Gemini streams full response shapes: text is incremental, while function
/// calls arrive complete with structured arguments. A chunk with neither
/// candidates nor usage is ignored.
///
/// # Errors
///
/// Same as [`super::response_decoder::decode_gemini_response`], minus the
/// empty-candidates check.
pub fn decode_gemini_stream_chunk(chunk: &GeminiResponse) -> Result<StreamChunk, CanonicalError> {
    let results = decode_candidates(chunk)?;
    let model_usage = decode_usage(chunk);
    if results.is_empty() && model_usage.is_none() {
        tracing::trace!("ignoring empty gemini stream chunk");
        return Ok(StreamChunk::Ignored);
    }
    Ok(StreamChunk::Delta(ResponseDelta::from(CanonicalResponse {
        session_id: None,
        remote_id: chunk.response_id.clone(),
        results,
        model_usage,
        embed_model_usage: None,
    })))
}
