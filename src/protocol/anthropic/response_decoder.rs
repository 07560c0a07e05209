use crate::error::CanonicalError;
use crate::protocol::anthropic::{AnthropicContentBlock, AnthropicResponse};
use crate::protocol::canonical::{
    CanonicalResponse, ChatResult, FunctionArguments, FunctionCall, ProviderKind,
};
use crate::protocol::mapping::{anthropic_finish_to_canonical, anthropic_usage_to_canonical};

/// Decode an Anthropic Messages API response into canonical form.
///
/// Text blocks are concatenated into the single result's content; `tool_use`
/// blocks become function calls with structured arguments.
///
/// # Errors
///
/// Returns [`CanonicalError::ContentPolicy`] for a `refusal` stop reason and
/// [`CanonicalError::BackendProtocol`] for an unknown stop reason or a
/// `tool_result` block in model output.
pub fn decode_anthropic_response(
    response: &AnthropicResponse,
) -> Result<CanonicalResponse, CanonicalError> {
    // --- content blocks ---
    let mut text = String::new();
    let mut function_calls = Vec::new();
    for block in &response.content {
        match block {
            AnthropicContentBlock::Text { text: t } => text.push_str(t),
            AnthropicContentBlock::ToolUse { id, name, input } => {
                function_calls.push(FunctionCall::new(
                    id.clone(),
                    name.clone(),
                    FunctionArguments::Parsed(input.clone()),
                ));
            }
            AnthropicContentBlock::ToolResult { .. } => {
                return Err(CanonicalError::protocol(
                    "anthropic response contains a tool_result block",
                ));
            }
            AnthropicContentBlock::Thinking { .. } => {
                tracing::trace!(id = %response.id, "dropping thinking block");
            }
            AnthropicContentBlock::Unknown => {
                tracing::debug!(id = %response.id, "dropping unknown content block");
            }
        }
    }

    // --- stop reason ---
    let finish_reason = response
        .stop_reason
        .as_deref()
        .map(anthropic_finish_to_canonical)
        .transpose()?;

    // --- usage ---
    let model_usage = response.usage.map(|usage| {
        anthropic_usage_to_canonical(
            usage.input_tokens.unwrap_or(0),
            usage.output_tokens.unwrap_or(0),
        )
    });

    CanonicalResponse {
        session_id: None,
        remote_id: Some(response.id.clone()),
        results: vec![ChatResult {
            content: Some(text).filter(|t| !t.is_empty()),
            name: None,
            function_calls,
            finish_reason,
        }],
        model_usage,
        embed_model_usage: None,
    }
    .ensure_results(ProviderKind::Anthropic)
}
