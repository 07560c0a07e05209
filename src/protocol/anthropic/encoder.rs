use crate::config::ModelDefaults;
use crate::error::CanonicalError;
use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicTool,
    AnthropicToolChoice,
};
use crate::protocol::canonical::{ChatRequest, ChatTurn, FunctionCallMode, FunctionSpec};
use crate::protocol::mapping::canonical_role_to_anthropic;
use crate::protocol::validate::{
    joined_system_prompt, resolve_stream, structured_arguments, validate_chat_prompt,
};

const FALLBACK_MAX_TOKENS: u32 = 4096;

/// Encode a canonical request into the Anthropic Messages API wire format.
///
/// # Errors
///
/// Returns [`CanonicalError::Validation`] when the prompt fails the shared
/// preconditions or an assistant call carries unparsable arguments.
pub fn encode_anthropic_request(
    request: &ChatRequest,
    defaults: &ModelDefaults,
) -> Result<AnthropicRequest, CanonicalError> {
    validate_chat_prompt(&request.chat_prompt)?;
    let config = defaults.generation.resolve(request.model_config.as_ref());

    // --- messages ---
    let mut messages: Vec<AnthropicMessage> = Vec::with_capacity(request.chat_prompt.len());
    for (index, turn) in request.chat_prompt.iter().enumerate() {
        let blocks = match turn {
            ChatTurn::System { .. } => continue,
            ChatTurn::User { content, name } => {
                if name.is_some() {
                    tracing::trace!(index, "anthropic has no per-message name, dropping it");
                }
                vec![AnthropicContentBlock::Text {
                    text: content.clone(),
                }]
            }
            ChatTurn::Assistant {
                content,
                function_calls,
                ..
            } => {
                let mut blocks = Vec::with_capacity(function_calls.len() + 1);
                if let Some(text) = content.as_deref().filter(|t| !t.is_empty()) {
                    blocks.push(AnthropicContentBlock::Text {
                        text: text.to_owned(),
                    });
                }
                for call in function_calls {
                    blocks.push(AnthropicContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        input: structured_arguments(call, index)?,
                    });
                }
                blocks
            }
            ChatTurn::Function {
                content,
                function_id,
            } => vec![AnthropicContentBlock::ToolResult {
                tool_use_id: function_id.clone(),
                content: serde_json::Value::String(content.clone()),
            }],
        };
        if blocks.is_empty() {
            tracing::debug!(index, "skipping assistant turn with neither text nor calls");
            continue;
        }
        push_coalesced(&mut messages, canonical_role_to_anthropic(turn.role()), blocks);
    }
    for message in &mut messages {
        tool_results_first(message);
    }

    // --- tools ---
    let tools = if request.functions.is_empty() {
        None
    } else {
        Some(request.functions.iter().map(encode_tool).collect())
    };

    Ok(AnthropicRequest {
        model: request
            .model
            .clone()
            .unwrap_or_else(|| defaults.model.clone()),
        max_tokens: config.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS),
        system: joined_system_prompt(&request.chat_prompt),
        messages,
        tools,
        tool_choice: encode_tool_choice(request.function_call.as_ref(), &request.functions),
        stream: resolve_stream(request, &defaults.generation).then_some(true),
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: config.top_k,
        stop_sequences: config.stop_sequences,
    })
}

/// The Messages API requires alternating roles, so consecutive turns that
/// land on the same wire role share one message.
fn push_coalesced(
    messages: &mut Vec<AnthropicMessage>,
    role: &str,
    blocks: Vec<AnthropicContentBlock>,
) {
    if let Some(last) = messages.last_mut() {
        if last.role == role {
            if let AnthropicContent::Blocks(existing) = &mut last.content {
                existing.extend(blocks);
                return;
            }
        }
    }
    messages.push(AnthropicMessage {
        role: role.to_string(),
        content: AnthropicContent::Blocks(blocks),
    });
}

/// `tool_result` blocks must lead a user message.
fn tool_results_first(message: &mut AnthropicMessage) {
    if let AnthropicContent::Blocks(blocks) = &mut message.content {
        blocks.sort_by_key(|block| !matches!(block, AnthropicContentBlock::ToolResult { .. }));
    }
}

fn encode_tool(spec: &FunctionSpec) -> AnthropicTool {
    AnthropicTool {
        name: spec.name.clone(),
        description: Some(spec.description.clone()).filter(|d| !d.is_empty()),
        input_schema: spec
            .parameters
            .clone()
            .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
    }
}

fn encode_tool_choice(
    mode: Option<&FunctionCallMode>,
    functions: &[FunctionSpec],
) -> Option<AnthropicToolChoice> {
    if functions.is_empty() {
        return None;
    }
    Some(match mode? {
        FunctionCallMode::None => AnthropicToolChoice::None,
        FunctionCallMode::Auto => AnthropicToolChoice::Auto,
        FunctionCallMode::Required => AnthropicToolChoice::Any,
        FunctionCallMode::Function(name) => AnthropicToolChoice::Tool { name: name.clone() },
    })
}
