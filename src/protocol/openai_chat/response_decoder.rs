use crate::error::CanonicalError;
use crate::protocol::canonical::{CanonicalResponse, ChatResult, ProviderKind, TokenUsage};
use crate::protocol::mapping::openai_finish_to_canonical;
use crate::protocol::openai_chat::decoder::tool_call_to_canonical;
use crate::protocol::openai_chat::{OpenAiChatResponse, OpenAiUsage};

/// Decode an `OpenAI` Chat Completions response into canonical form.
///
/// # Errors
///
/// Returns [`CanonicalError::BackendProtocol`] when there are no choices or
/// a finish reason is unknown.
pub fn decode_openai_chat_response(
    response: &OpenAiChatResponse,
) -> Result<CanonicalResponse, CanonicalError> {
    let mut choices: Vec<_> = response.choices.iter().collect();
    choices.sort_by_key(|choice| choice.index);

    let results = choices
        .into_iter()
        .map(|choice| {
            let message = &choice.message;
            if message.refusal.is_some() {
                tracing::debug!(id = %response.id, index = choice.index, "openai choice carries a refusal");
            }
            Ok(ChatResult {
                content: message.content.as_ref().map(|c| c.text()),
                name: message.name.clone(),
                function_calls: message
                    .tool_calls
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(tool_call_to_canonical)
                    .collect(),
                finish_reason: choice
                    .finish_reason
                    .as_deref()
                    .map(openai_finish_to_canonical)
                    .transpose()?,
            })
        })
        .collect::<Result<Vec<_>, CanonicalError>>()?;

    CanonicalResponse {
        session_id: None,
        remote_id: Some(response.id.clone()),
        results,
        model_usage: response.usage.map(usage_to_canonical),
        embed_model_usage: None,
    }
    .ensure_results(ProviderKind::OpenAi)
}

#[must_use]
pub fn usage_to_canonical(usage: OpenAiUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}
