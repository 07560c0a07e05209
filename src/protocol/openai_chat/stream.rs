use crate::error::CanonicalError;
use crate::protocol::canonical::{
    FunctionArguments, FunctionCallDelta, ResponseDelta, ResultDelta, StreamChunk, UsageDelta,
};
use crate::protocol::mapping::openai_finish_to_canonical;
use crate::protocol::openai_chat::response_decoder::usage_to_canonical;
use crate::protocol::openai_chat::{OpenAiStreamChoice, OpenAiStreamChunk, OpenAiStreamToolCall};

/// Terminal sentinel of an `OpenAI` SSE stream.
pub const DONE_SENTINEL: &[u8] = b"[DONE]";

/// Parse one SSE `data:` payload. `Ok(None)` is the `[DONE]` sentinel.
///
/// # Errors
///
/// Returns [`CanonicalError::BackendProtocol`] when the payload is neither
/// the sentinel nor a chunk.
pub fn parse_openai_sse(data: &[u8]) -> Result<Option<OpenAiStreamChunk>, CanonicalError> {
    if data.trim_ascii() == DONE_SENTINEL {
        return Ok(None);
    }
    serde_json::from_slice(data)
        .map(Some)
        .map_err(|e| CanonicalError::protocol(format!("malformed openai stream chunk: {e}")))
}

/// Decode one `OpenAI` stream chunk.
///
/// Tool-call fragments keep the wire `index`; ids and names arrive only on a
/// call's first fragment.
///
/// # Errors
///
/// Returns [`CanonicalError::BackendProtocol`] for an unknown finish reason.
pub fn decode_openai_stream_chunk(chunk: &OpenAiStreamChunk) -> Result<StreamChunk, CanonicalError> {
    let results = chunk
        .choices
        .iter()
        .map(decode_choice)
        .collect::<Result<_, CanonicalError>>()?;
    Ok(StreamChunk::Delta(ResponseDelta {
        remote_id: Some(chunk.id.clone()).filter(|id| !id.is_empty()),
        results,
        usage: chunk
            .usage
            .map(|usage| UsageDelta::from(usage_to_canonical(usage))),
    }))
}

fn decode_choice(choice: &OpenAiStreamChoice) -> Result<ResultDelta, CanonicalError> {
    Ok(ResultDelta {
        index: choice.index as usize,
        content: choice.delta.content.clone().filter(|c| !c.is_empty()),
        name: None,
        function_calls: choice
            .delta
            .tool_calls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(decode_tool_call)
            .collect(),
        finish_reason: choice
            .finish_reason
            .as_deref()
            .map(openai_finish_to_canonical)
            .transpose()?,
    })
}

fn decode_tool_call(call: &OpenAiStreamToolCall) -> FunctionCallDelta {
    let function = call.function.as_ref();
    FunctionCallDelta {
        index: Some(call.index),
        id: call.id.clone().filter(|id| !id.is_empty()),
        name: function
            .and_then(|f| f.name.clone())
            .filter(|name| !name.is_empty()),
        arguments: function
            .and_then(|f| f.arguments.clone())
            .map(FunctionArguments::Raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::canonical::FinishReason;

    fn decode(data: &str) -> ResponseDelta {
        let chunk = parse_openai_sse(data.as_bytes()).unwrap().unwrap();
        match decode_openai_stream_chunk(&chunk).unwrap() {
            StreamChunk::Delta(delta) => delta,
            other => panic!("expected delta, got {other:?}"),
        }
    }

    #[test]
    fn test_done_sentinel() {
        assert!(parse_openai_sse(b"[DONE]").unwrap().is_none());
        assert!(parse_openai_sse(b" [DONE]\n").unwrap().is_none());
        assert!(matches!(
            parse_openai_sse(b"{\"id\":"),
            Err(CanonicalError::BackendProtocol(_))
        ));
    }

    #[test]
    fn test_text_delta() {
        let delta = decode(
            r#"{"id":"chatcmpl-1","object":"chat.completion.chunk","model":"gpt-4o","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"},"finish_reason":null}]}"#,
        );
        assert_eq!(delta.remote_id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(delta.results[0].content.as_deref(), Some("Hel"));
        assert!(delta.usage.is_none());
    }

    #[test]
    fn test_tool_call_fragments() {
        let first = decode(
            r#"{"id":"c","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_","arguments":""}}]}}]}"#,
        );
        let call = &first.results[0].function_calls[0];
        assert_eq!(call.index, Some(0));
        assert_eq!(call.id.as_deref(), Some("call_1"));
        assert_eq!(call.name.as_deref(), Some("get_"));

        let next = decode(
            r#"{"id":"c","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\""}}]}}]}"#,
        );
        let call = &next.results[0].function_calls[0];
        assert_eq!(call.id, None);
        assert_eq!(call.name, None);
        assert_eq!(
            call.arguments,
            Some(FunctionArguments::Raw("{\"city\"".into()))
        );
    }

    #[test]
    fn test_finish_and_trailing_usage() {
        let finish = decode(
            r#"{"id":"c","choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
        );
        assert_eq!(
            finish.results[0].finish_reason,
            Some(FinishReason::FunctionCall)
        );
        let usage = decode(
            r#"{"id":"c","choices":[],"usage":{"prompt_tokens":5,"completion_tokens":7,"total_tokens":12}}"#,
        );
        assert!(usage.results.is_empty());
        assert_eq!(usage.usage.unwrap().total_tokens, Some(12));
    }
}
