use crate::error::CanonicalError;
use crate::protocol::canonical::{ChatRequest, ChatTurn, FunctionCall, ModelConfig};

/// Check the preconditions every adapter shares before encoding.
///
/// # Errors
///
/// Returns [`CanonicalError::Validation`] for an empty prompt, an empty user
/// turn, or a function turn without a function id.
pub fn validate_chat_prompt(turns: &[ChatTurn]) -> Result<(), CanonicalError> {
    if turns.is_empty() {
        return Err(CanonicalError::validation(
            "chatPrompt",
            None,
            "chat prompt is empty",
        ));
    }
    for (index, turn) in turns.iter().enumerate() {
        match turn {
            ChatTurn::User { content, .. } if content.is_empty() => {
                return Err(CanonicalError::validation(
                    "content",
                    Some(index),
                    "chat prompt content is empty",
                ));
            }
            ChatTurn::Function { function_id, .. } if function_id.is_empty() => {
                return Err(CanonicalError::validation(
                    "functionId",
                    Some(index),
                    "chat prompt functionId is empty",
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Join all system turns with a single space, for backends that carry system
/// instructions out-of-band.
#[must_use]
pub fn joined_system_prompt(turns: &[ChatTurn]) -> Option<String> {
    let parts: Vec<&str> = turns
        .iter()
        .filter_map(|turn| match turn {
            ChatTurn::System { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Request-level `stream` wins over the adapter default; absent both, no streaming.
#[must_use]
pub fn resolve_stream(request: &ChatRequest, defaults: &ModelConfig) -> bool {
    request
        .model_config
        .as_ref()
        .and_then(|c| c.stream)
        .or(defaults.stream)
        .unwrap_or(false)
}

/// Structured arguments for backends that require a JSON value.
///
/// # Errors
///
/// Returns [`CanonicalError::Validation`] naming the call when a raw argument
/// string is not valid JSON.
pub fn structured_arguments(
    call: &FunctionCall,
    turn_index: usize,
) -> Result<serde_json::Value, CanonicalError> {
    call.function.arguments.to_value().map_err(|e| {
        CanonicalError::validation(
            format!("functionCalls[{}].function.arguments", call.id),
            Some(turn_index),
            format!("arguments are not valid JSON: {e}"),
        )
    })
}
