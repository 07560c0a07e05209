use crate::error::CanonicalError;
use crate::protocol::canonical::{CanonicalRole, ChatTurn, FunctionArguments, FunctionCall};
use crate::protocol::gemini::{GeminiContent, GeminiFunctionCall, GeminiRequest};
use crate::protocol::mapping::gemini_role_to_canonical;
use crate::util::next_call_id;

/// Decode a Gemini `generateContent` request back into canonical turns.
///
/// # Errors
///
/// Returns [`CanonicalError::UnsupportedRole`] for a content role Gemini does
/// not define and [`CanonicalError::BackendProtocol`] for a function call
/// outside a model turn.
pub fn decode_gemini_request(request: &GeminiRequest) -> Result<Vec<ChatTurn>, CanonicalError> {
    let mut turns = Vec::with_capacity(request.contents.len() + 1);

    if let Some(system) = &request.system_instruction {
        let text = concat_text(system);
        if !text.is_empty() {
            turns.push(ChatTurn::system(text));
        }
    }

    for (index, content) in request.contents.iter().enumerate() {
        let role = gemini_role_to_canonical(content.role.as_deref().unwrap_or("user"), Some(index))?;
        match role {
            CanonicalRole::Assistant => {
                let text = concat_text(content);
                turns.push(ChatTurn::Assistant {
                    content: Some(text).filter(|t| !t.is_empty()),
                    name: None,
                    function_calls: request_calls_to_canonical(content),
                });
            }
            _ => {
                // Newer clients send function responses under the `user` role.
                for part in &content.parts {
                    if part.function_call.is_some() {
                        return Err(CanonicalError::protocol(format!(
                            "functionCall part outside a model turn at index {index}"
                        )));
                    }
                    if let Some(response) = &part.function_response {
                        turns.push(ChatTurn::function_result(
                            response.id.clone().unwrap_or_else(|| response.name.clone()),
                            function_response_text(&response.response),
                        ));
                    }
                }
                let text = concat_text(content);
                if !text.is_empty() {
                    turns.push(ChatTurn::user(text));
                }
            }
        }
    }

    Ok(turns)
}

/// All non-thought text parts of one content, concatenated.
pub(crate) fn concat_text(content: &GeminiContent) -> String {
    content
        .parts
        .iter()
        .filter(|p| p.thought != Some(true))
        .filter_map(|p| p.text.as_deref())
        .collect()
}

/// Calls of one model turn inside a request. Unidentified calls are keyed by
/// function name, since their `functionResponse` parts refer back by name; a
/// repeated name gets a generated id so ids stay unique within the turn.
fn request_calls_to_canonical(content: &GeminiContent) -> Vec<FunctionCall> {
    let mut calls: Vec<FunctionCall> = Vec::new();
    for call in content.parts.iter().filter_map(|p| p.function_call.as_ref()) {
        let id = match &call.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ if calls.iter().any(|c| c.id == call.name) => next_call_id(),
            _ => call.name.clone(),
        };
        calls.push(function_call_with_id(call, id));
    }
    calls
}

/// A call from a response or stream chunk. Gemini only sometimes assigns
/// ids; a missing one is generated so parallel calls to the same function
/// stay distinct, also across stream chunks.
pub(crate) fn function_call_to_canonical(call: &GeminiFunctionCall) -> FunctionCall {
    let id = call
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(next_call_id);
    function_call_with_id(call, id)
}

fn function_call_with_id(call: &GeminiFunctionCall, id: String) -> FunctionCall {
    FunctionCall::new(id, call.name.clone(), FunctionArguments::Parsed(call.args.clone()))
}

fn function_response_text(response: &serde_json::Value) -> String {
    match response.get("result") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => response.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_function_cycle() {
        let request: GeminiRequest = serde_json::from_value(json!({
            "systemInstruction": {"role": "user", "parts": [{"text": "Be terse."}]},
            "contents": [
                {"role": "user", "parts": [{"text": "Weather?"}]},
                {"role": "model", "parts": [
                    {"text": "Checking."},
                    {"functionCall": {"name": "get_weather", "args": {"city": "SF"}}}
                ]},
                {"role": "function", "parts": [
                    {"functionResponse": {"name": "get_weather", "response": {"result": "72F"}}}
                ]}
            ]
        }))
        .unwrap();
        let turns = decode_gemini_request(&request).unwrap();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0], ChatTurn::system("Be terse."));
        match &turns[2] {
            ChatTurn::Assistant {
                content,
                function_calls,
                ..
            } => {
                assert_eq!(content.as_deref(), Some("Checking."));
                assert_eq!(function_calls[0].id, "get_weather");
            }
            other => panic!("expected assistant turn, got {other:?}"),
        }
        assert_eq!(turns[3], ChatTurn::function_result("get_weather", "72F"));
    }

    #[test]
    fn test_repeated_call_names_get_distinct_ids() {
        let request: GeminiRequest = serde_json::from_value(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "Weather in SF and NY?"}]},
                {"role": "model", "parts": [
                    {"functionCall": {"name": "get_weather", "args": {"city": "SF"}}},
                    {"functionCall": {"name": "get_weather", "args": {"city": "NY"}}},
                    {"functionCall": {"id": "fc_9", "name": "get_time", "args": {}}}
                ]},
                {"role": "user", "parts": [
                    {"functionResponse": {"id": "fc_9", "name": "get_time", "response": {"result": "noon"}}}
                ]}
            ]
        }))
        .unwrap();
        let turns = decode_gemini_request(&request).unwrap();
        let ChatTurn::Assistant { function_calls, .. } = &turns[1] else {
            panic!("expected assistant turn, got {:?}", turns[1]);
        };
        assert_eq!(function_calls[0].id, "get_weather");
        assert!(function_calls[1].id.starts_with("call_"));
        assert_eq!(function_calls[2].id, "fc_9");
        assert_eq!(turns[2], ChatTurn::function_result("fc_9", "noon"));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let request: GeminiRequest = serde_json::from_value(json!({
            "contents": [{"role": "assistant", "parts": [{"text": "x"}]}]
        }))
        .unwrap();
        assert!(matches!(
            decode_gemini_request(&request),
            Err(CanonicalError::UnsupportedRole { index: Some(0), .. })
        ));
    }
}
