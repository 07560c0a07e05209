//! Folding of complete responses, e.g. the rounds of a tool-use loop, into
//! one logical transcript.

use crate::protocol::canonical::{CanonicalResponse, ChatResult, FunctionCallDelta};
use crate::stream::FunctionCallMerger;

/// Fold `responses` in order into a single response.
///
/// Only the first result of each response contributes. Text is
/// concatenated, function calls are merged by id, and every scalar field
/// comes from the last response. Never fails: an empty input yields one
/// empty result.
#[must_use]
pub fn merge_responses(responses: &[CanonicalResponse]) -> CanonicalResponse {
    let mut content = String::new();
    let mut calls = FunctionCallMerger::new();
    for result in responses.iter().filter_map(|r| r.results.first()) {
        if let Some(text) = result.content.as_deref() {
            content.push_str(text);
        }
        calls.extend(result.function_calls.iter().map(FunctionCallDelta::from));
    }

    let Some(last) = responses.last() else {
        return CanonicalResponse {
            results: vec![ChatResult {
                content: Some(String::new()),
                ..Default::default()
            }],
            ..Default::default()
        };
    };
    let tail = last.results.first();
    tracing::trace!(responses = responses.len(), calls = calls.calls().len(), "responses merged");
    CanonicalResponse {
        session_id: last.session_id.clone(),
        remote_id: last.remote_id.clone(),
        results: vec![ChatResult {
            content: Some(content),
            name: tail.and_then(|r| r.name.clone()),
            function_calls: calls.into_calls(),
            finish_reason: tail.and_then(|r| r.finish_reason),
        }],
        model_usage: last.model_usage,
        embed_model_usage: last.embed_model_usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::canonical::{FinishReason, FunctionArguments, FunctionCall};
    use serde_json::json;

    fn response(content: Option<&str>, calls: Vec<FunctionCall>) -> CanonicalResponse {
        CanonicalResponse {
            results: vec![ChatResult {
                content: content.map(str::to_string),
                function_calls: calls,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_calls_merge_by_id_across_rounds() {
        let first = response(
            None,
            vec![FunctionCall::new("a", "get_", FunctionArguments::Raw("{\"x\"".into()))],
        );
        let mut second = response(
            Some("done"),
            vec![
                FunctionCall::new("a", "weather", FunctionArguments::Raw(":1}".into())),
                FunctionCall::new("b", "echo", FunctionArguments::Parsed(json!({}))),
            ],
        );
        second.results[0].finish_reason = Some(FinishReason::FunctionCall);

        let merged = merge_responses(&[first, second]);
        let result = &merged.results[0];
        assert_eq!(result.content.as_deref(), Some("done"));
        assert_eq!(result.finish_reason, Some(FinishReason::FunctionCall));
        assert_eq!(result.function_calls.len(), 2);
        assert_eq!(result.function_calls[0].function.name, "get_weather");
        assert_eq!(
            result.function_calls[0].function.arguments,
            FunctionArguments::Raw("{\"x\":1}".into())
        );
    }

    #[test]
    fn test_scalars_come_from_last_response() {
        let mut first = response(Some("a"), Vec::new());
        first.session_id = Some("s1".into());
        first.remote_id = Some("r1".into());
        let mut second = response(Some("b"), Vec::new());
        second.remote_id = Some("r2".into());

        let merged = merge_responses(&[first, second]);
        assert_eq!(merged.session_id, None);
        assert_eq!(merged.remote_id.as_deref(), Some("r2"));
    }

    #[test]
    fn test_response_without_results_contributes_nothing() {
        let merged = merge_responses(&[response(Some("x"), Vec::new()), CanonicalResponse::default()]);
        assert_eq!(merged.results[0].content.as_deref(), Some("x"));
        assert_eq!(merged.results[0].finish_reason, None);
    }
}
