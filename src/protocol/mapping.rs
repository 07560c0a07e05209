use super::canonical::{CanonicalRole, FinishReason, ProviderKind, TokenUsage, UsageDelta};
use crate::error::CanonicalError;

// ---------------------------------------------------------------------------
// Role mappings
// ---------------------------------------------------------------------------

#[must_use]
pub fn canonical_role_to_openai(role: CanonicalRole) -> &'static str {
    match role {
        CanonicalRole::System => "system",
        CanonicalRole::User => "user",
        CanonicalRole::Assistant => "assistant",
        CanonicalRole::Function => "tool",
    }
}

/// # Errors
///
/// Returns [`CanonicalError::UnsupportedRole`] for roles outside the chat vocabulary.
pub fn openai_role_to_canonical(s: &str, index: Option<usize>) -> Result<CanonicalRole, CanonicalError> {
    match s {
        "system" | "developer" => Ok(CanonicalRole::System),
        "user" => Ok(CanonicalRole::User),
        "assistant" => Ok(CanonicalRole::Assistant),
        "tool" | "function" => Ok(CanonicalRole::Function),
        other => Err(unsupported_role(ProviderKind::OpenAi, other, index)),
    }
}

#[must_use]
pub fn canonical_role_to_anthropic(role: CanonicalRole) -> &'static str {
    match role {
        // System is top-level; function results travel as user tool_result blocks.
        CanonicalRole::System | CanonicalRole::User | CanonicalRole::Function => "user",
        CanonicalRole::Assistant => "assistant",
    }
}

/// # Errors
///
/// Returns [`CanonicalError::UnsupportedRole`] for anything but `user`/`assistant`.
pub fn anthropic_role_to_canonical(
    s: &str,
    index: Option<usize>,
) -> Result<CanonicalRole, CanonicalError> {
    match s {
        "user" => Ok(CanonicalRole::User),
        "assistant" => Ok(CanonicalRole::Assistant),
        other => Err(unsupported_role(ProviderKind::Anthropic, other, index)),
    }
}

#[must_use]
pub fn canonical_role_to_gemini(role: CanonicalRole) -> &'static str {
    match role {
        CanonicalRole::System | CanonicalRole::User => "user", // system is handled via systemInstruction
        CanonicalRole::Assistant => "model",
        CanonicalRole::Function => "function",
    }
}

/// # Errors
///
/// Returns [`CanonicalError::UnsupportedRole`] for roles Gemini does not define.
pub fn gemini_role_to_canonical(
    s: &str,
    index: Option<usize>,
) -> Result<CanonicalRole, CanonicalError> {
    match s {
        "user" => Ok(CanonicalRole::User),
        "model" => Ok(CanonicalRole::Assistant),
        "function" => Ok(CanonicalRole::Function),
        other => Err(unsupported_role(ProviderKind::Gemini, other, index)),
    }
}

fn unsupported_role(provider: ProviderKind, role: &str, index: Option<usize>) -> CanonicalError {
    CanonicalError::UnsupportedRole {
        provider,
        role: role.to_string(),
        index,
    }
}

// ---------------------------------------------------------------------------
// Finish reason mappings
// ---------------------------------------------------------------------------

fn unknown_finish_reason(provider: ProviderKind, s: &str) -> CanonicalError {
    CanonicalError::protocol(format!("{provider} returned unknown finish reason: {s}"))
}

/// # Errors
///
/// Returns [`CanonicalError::BackendProtocol`] for an unknown finish reason.
pub fn openai_finish_to_canonical(s: &str) -> Result<FinishReason, CanonicalError> {
    match s {
        "stop" => Ok(FinishReason::Stop),
        "length" => Ok(FinishReason::Length),
        "content_filter" => Ok(FinishReason::ContentFilter),
        "tool_calls" | "function_call" => Ok(FinishReason::FunctionCall),
        other => Err(unknown_finish_reason(ProviderKind::OpenAi, other)),
    }
}

/// # Errors
///
/// Returns [`CanonicalError::ContentPolicy`] for `refusal` and
/// [`CanonicalError::BackendProtocol`] for an unknown stop reason.
pub fn anthropic_finish_to_canonical(s: &str) -> Result<FinishReason, CanonicalError> {
    match s {
        "end_turn" | "stop_sequence" | "pause_turn" => Ok(FinishReason::Stop),
        "max_tokens" => Ok(FinishReason::Length),
        "tool_use" => Ok(FinishReason::FunctionCall),
        "refusal" => Err(CanonicalError::ContentPolicy {
            provider: ProviderKind::Anthropic,
            reason: s.to_string(),
        }),
        other => Err(unknown_finish_reason(ProviderKind::Anthropic, other)),
    }
}

/// `STOP` on a candidate that carries a function call is reported as
/// [`FinishReason::FunctionCall`].
///
/// # Errors
///
/// Returns [`CanonicalError::ContentPolicy`] for safety terminations and
/// [`CanonicalError::BackendProtocol`] for an unknown finish reason.
pub fn gemini_finish_to_canonical(
    s: &str,
    has_function_call: bool,
) -> Result<FinishReason, CanonicalError> {
    match s {
        "STOP" | "FINISH_REASON_UNSPECIFIED" | "OTHER" | "LANGUAGE" | "MALFORMED_FUNCTION_CALL" => {
            Ok(if has_function_call {
                FinishReason::FunctionCall
            } else {
                FinishReason::Stop
            })
        }
        "MAX_TOKENS" => Ok(FinishReason::Length),
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY" => {
            Err(CanonicalError::ContentPolicy {
                provider: ProviderKind::Gemini,
                reason: format!("Finish reason: {s}"),
            })
        }
        other => Err(unknown_finish_reason(ProviderKind::Gemini, other)),
    }
}

// ---------------------------------------------------------------------------
// Usage mappings
// ---------------------------------------------------------------------------

#[must_use]
pub fn anthropic_usage_to_canonical(input_tokens: u64, output_tokens: u64) -> TokenUsage {
    TokenUsage::new(input_tokens, output_tokens)
}

/// Anthropic `message_delta` usage only reliably carries output tokens.
#[must_use]
pub fn anthropic_usage_delta(input_tokens: Option<u64>, output_tokens: Option<u64>) -> UsageDelta {
    UsageDelta {
        prompt_tokens: input_tokens,
        completion_tokens: output_tokens,
        total_tokens: None,
    }
}

#[must_use]
pub fn gemini_usage_to_canonical(
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
) -> TokenUsage {
    let prompt_tokens = prompt_token_count.unwrap_or(0);
    let completion_tokens = candidates_token_count.unwrap_or(0);
    TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: total_token_count.unwrap_or(prompt_tokens + completion_tokens),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
