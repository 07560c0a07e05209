use crate::error::CanonicalError;
use crate::protocol::canonical::{CanonicalRole, ChatTurn, FunctionArguments, FunctionCall};
use crate::protocol::mapping::openai_role_to_canonical;
use crate::protocol::openai_chat::{OpenAiChatRequest, OpenAiMessage, OpenAiToolCall};

/// Decode an `OpenAI` Chat Completions request back into canonical turns.
///
/// # Errors
///
/// Returns [`CanonicalError::UnsupportedRole`] for a role outside the chat
/// vocabulary and [`CanonicalError::BackendProtocol`] for a tool message
/// without `tool_call_id`.
pub fn decode_openai_chat_request(
    request: &OpenAiChatRequest,
) -> Result<Vec<ChatTurn>, CanonicalError> {
    request
        .messages
        .iter()
        .enumerate()
        .map(|(index, message)| decode_message(message, index))
        .collect()
}

fn decode_message(message: &OpenAiMessage, index: usize) -> Result<ChatTurn, CanonicalError> {
    let content = message.content.as_ref().map(|c| c.text());
    Ok(match openai_role_to_canonical(&message.role, Some(index))? {
        CanonicalRole::System => ChatTurn::system(content.unwrap_or_default()),
        CanonicalRole::User => ChatTurn::User {
            content: content.unwrap_or_default(),
            name: message.name.clone(),
        },
        CanonicalRole::Assistant => ChatTurn::Assistant {
            content,
            name: message.name.clone(),
            function_calls: message
                .tool_calls
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(tool_call_to_canonical)
                .collect(),
        },
        CanonicalRole::Function => ChatTurn::Function {
            content: content.unwrap_or_default(),
            function_id: message.tool_call_id.clone().ok_or_else(|| {
                CanonicalError::protocol(format!("tool message without tool_call_id at index {index}"))
            })?,
        },
    })
}

/// Wire arguments are a JSON string; keep them raw when they do not parse.
pub(crate) fn tool_call_to_canonical(call: &OpenAiToolCall) -> FunctionCall {
    FunctionCall::new(
        call.id.clone(),
        call.function.name.clone(),
        FunctionArguments::from_wire_string(&call.function.arguments),
    )
}
