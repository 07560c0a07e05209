use crate::error::CanonicalError;
use crate::protocol::canonical::{CanonicalResponse, ChatResult, ProviderKind, TokenUsage};
use crate::protocol::gemini::decoder::{concat_text, function_call_to_canonical};
use crate::protocol::gemini::{GeminiCandidate, GeminiResponse};
use crate::protocol::mapping::{gemini_finish_to_canonical, gemini_usage_to_canonical};

/// Decode a Gemini `generateContent` response into canonical form.
///
/// # Errors
///
/// Returns [`CanonicalError::ContentPolicy`] when the prompt was blocked or a
/// candidate ended on a safety reason, and [`CanonicalError::BackendProtocol`]
/// when there are no candidates or a finish reason is unknown.
pub fn decode_gemini_response(response: &GeminiResponse) -> Result<CanonicalResponse, CanonicalError> {
    CanonicalResponse {
        session_id: None,
        remote_id: response.response_id.clone(),
        results: decode_candidates(response)?,
        model_usage: decode_usage(response),
        embed_model_usage: None,
    }
    .ensure_results(ProviderKind::Gemini)
}

/// Candidates of a full response or a stream chunk, in wire order.
///
/// # Errors
///
/// Same as [`decode_gemini_response`], except that an empty candidate list
/// is not an error here.
pub(crate) fn decode_candidates(response: &GeminiResponse) -> Result<Vec<ChatResult>, CanonicalError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(CanonicalError::ContentPolicy {
            provider: ProviderKind::Gemini,
            reason: format!("Blocked reason: {reason}"),
        });
    }
    response
        .candidates
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(decode_candidate)
        .collect()
}

fn decode_candidate(candidate: &GeminiCandidate) -> Result<ChatResult, CanonicalError> {
    let function_calls: Vec<_> = candidate
        .content
        .parts
        .iter()
        .filter_map(|p| p.function_call.as_ref())
        .map(function_call_to_canonical)
        .collect();
    let finish_reason = candidate
        .finish_reason
        .as_deref()
        .map(|reason| gemini_finish_to_canonical(reason, !function_calls.is_empty()))
        .transpose()?;
    let text = concat_text(&candidate.content);
    Ok(ChatResult {
        content: Some(text).filter(|t| !t.is_empty()),
        name: None,
        function_calls,
        finish_reason,
    })
}

pub(crate) fn decode_usage(response: &GeminiResponse) -> Option<TokenUsage> {
    response.usage_metadata.map(|usage| {
        gemini_usage_to_canonical(
            usage.prompt_token_count,
            usage.candidates_token_count,
            usage.total_token_count,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::canonical::{FinishReason, FunctionArguments};
    use serde_json::json;

    fn response(value: serde_json::Value) -> GeminiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_parts_are_concatenated() {
        let decoded = decode_gemini_response(&response(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "world"}]},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        })))
        .unwrap();
        assert_eq!(decoded.results[0].content.as_deref(), Some("Hello world"));
        assert_eq!(decoded.results[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(decoded.model_usage, Some(TokenUsage::new(4, 2)));
    }

    #[test]
    fn test_function_call_uses_wire_id_or_generated() {
        let decoded = decode_gemini_response(&response(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "get_weather", "args": {"city": "SF"}}},
                    {"functionCall": {"id": "fc_2", "name": "get_time", "args": {}}}
                ]},
                "finishReason": "STOP"
            }]
        })))
        .unwrap();
        let result = &decoded.results[0];
        assert_eq!(result.finish_reason, Some(FinishReason::FunctionCall));
        assert_eq!(result.content, None);
        assert!(result.function_calls[0].id.starts_with("call_"));
        assert_eq!(result.function_calls[0].function.name, "get_weather");
        assert_eq!(
            result.function_calls[0].function.arguments,
            FunctionArguments::Parsed(json!({"city": "SF"}))
        );
        assert_eq!(result.function_calls[1].id, "fc_2");
    }

    #[test]
    fn test_parallel_calls_to_one_function_stay_distinct() {
        let decoded = decode_gemini_response(&response(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "get_weather", "args": {"city": "SF"}}},
                    {"functionCall": {"name": "get_weather", "args": {"city": "NY"}}}
                ]},
                "finishReason": "STOP"
            }]
        })))
        .unwrap();
        let calls = &decoded.results[0].function_calls;
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].id, calls[1].id);
        assert_eq!(calls[0].function.arguments, FunctionArguments::Parsed(json!({"city": "SF"})));
        assert_eq!(calls[1].function.arguments, FunctionArguments::Parsed(json!({"city": "NY"})));
    }

    #[test]
    fn test_safety_stop_is_content_policy() {
        let err = decode_gemini_response(&response(json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
        })))
        .unwrap_err();
        assert!(matches!(err, CanonicalError::ContentPolicy { ref reason, .. } if reason == "Finish reason: SAFETY"));
    }

    #[test]
    fn test_blocked_prompt_is_content_policy() {
        let err = decode_gemini_response(&response(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .unwrap_err();
        assert!(matches!(err, CanonicalError::ContentPolicy { .. }));
    }

    #[test]
    fn test_missing_candidates_is_protocol_error() {
        assert!(matches!(
            decode_gemini_response(&response(json!({}))),
            Err(CanonicalError::BackendProtocol(_))
        ));
    }
}
