use crate::error::CanonicalError;
use crate::protocol::anthropic::{AnthropicContent, AnthropicContentBlock, AnthropicRequest};
use crate::protocol::canonical::{CanonicalRole, ChatTurn, FunctionArguments, FunctionCall};
use crate::protocol::mapping::anthropic_role_to_canonical;

/// Decode an Anthropic Messages API request back into canonical turns.
///
/// Text blocks of a user message become user turns and `tool_result` blocks
/// become function turns, in block order. An assistant message becomes one
/// assistant turn.
///
/// # Errors
///
/// Returns [`CanonicalError::UnsupportedRole`] for roles other than
/// `user`/`assistant` and [`CanonicalError::BackendProtocol`] for blocks
/// that cannot appear under the message's role.
pub fn decode_anthropic_request(request: &AnthropicRequest) -> Result<Vec<ChatTurn>, CanonicalError> {
    let mut turns = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
        turns.push(ChatTurn::system(system));
    }

    for (index, message) in request.messages.iter().enumerate() {
        let role = anthropic_role_to_canonical(&message.role, Some(index))?;
        let blocks = match &message.content {
            AnthropicContent::Text(text) => {
                turns.push(match role {
                    CanonicalRole::Assistant => ChatTurn::assistant(text.clone()),
                    _ => ChatTurn::user(text.clone()),
                });
                continue;
            }
            AnthropicContent::Blocks(blocks) => blocks,
        };

        match role {
            CanonicalRole::Assistant => turns.push(decode_assistant_blocks(blocks, index)?),
            _ => decode_user_blocks(blocks, index, &mut turns)?,
        }
    }

    Ok(turns)
}

fn decode_user_blocks(
    blocks: &[AnthropicContentBlock],
    index: usize,
    turns: &mut Vec<ChatTurn>,
) -> Result<(), CanonicalError> {
    for block in blocks {
        match block {
            AnthropicContentBlock::Text { text } => turns.push(ChatTurn::user(text.clone())),
            AnthropicContentBlock::ToolResult {
                tool_use_id,
                content,
            } => turns.push(ChatTurn::function_result(
                tool_use_id.clone(),
                tool_result_text(content),
            )),
            AnthropicContentBlock::ToolUse { .. } => {
                return Err(CanonicalError::protocol(format!(
                    "tool_use block in user message at index {index}"
                )));
            }
            AnthropicContentBlock::Thinking { .. } | AnthropicContentBlock::Unknown => {
                tracing::trace!(index, "skipping non-text block in user message");
            }
        }
    }
    Ok(())
}

fn decode_assistant_blocks(
    blocks: &[AnthropicContentBlock],
    index: usize,
) -> Result<ChatTurn, CanonicalError> {
    let mut text = String::new();
    let mut function_calls = Vec::new();
    for block in blocks {
        match block {
            AnthropicContentBlock::Text { text: t } => text.push_str(t),
            AnthropicContentBlock::ToolUse { id, name, input } => function_calls.push(
                FunctionCall::new(id.clone(), name.clone(), FunctionArguments::Parsed(input.clone())),
            ),
            AnthropicContentBlock::ToolResult { .. } => {
                return Err(CanonicalError::protocol(format!(
                    "tool_result block in assistant message at index {index}"
                )));
            }
            AnthropicContentBlock::Thinking { .. } | AnthropicContentBlock::Unknown => {}
        }
    }
    Ok(ChatTurn::Assistant {
        content: Some(text).filter(|t| !t.is_empty()),
        name: None,
        function_calls,
    })
}

/// `tool_result.content` is either a string or a list of text blocks.
fn tool_result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(serde_json::Value::as_str))
            .collect(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
