use crate::protocol::canonical::{CanonicalResponse, EmbedResponse, ProviderKind};
use tracing_subscriber::EnvFilter;

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Map a config log level onto a tracing filter.
///
/// - "DISABLED" -> `None`
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, WARN, ERROR)
#[must_use]
pub fn level_filter(log_level: &str) -> Option<EnvFilter> {
    let level = log_level.to_uppercase();
    let tracing_level = match level.as_str() {
        "DISABLED" => return None,
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    };
    Some(EnvFilter::try_new(tracing_level).unwrap_or_else(|_| EnvFilter::new("INFO")))
}

/// Install a global tracing subscriber for the configured log level.
///
/// Returns `false` when logging is disabled or another subscriber is
/// already installed.
pub fn init_tracing(log_level: &str, format: LogFormat) -> bool {
    let Some(filter) = level_filter(log_level) else {
        return false;
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.is_ok()
}

/// Record the token usage of a decoded chat response.
pub fn log_response_usage(provider: ProviderKind, response: &CanonicalResponse) {
    let Some(usage) = response.model_usage else {
        tracing::debug!(
            %provider,
            remote_id = response.remote_id.as_deref().unwrap_or(""),
            "response carried no usage"
        );
        return;
    };
    tracing::debug!(
        %provider,
        remote_id = response.remote_id.as_deref().unwrap_or(""),
        session_id = response.session_id.as_deref().unwrap_or(""),
        results = response.results.len(),
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        "chat usage"
    );
}

/// Record the token usage of a decoded embedding response.
pub fn log_embed_usage(provider: ProviderKind, response: &EmbedResponse) {
    tracing::debug!(
        %provider,
        vectors = response.embeddings.len(),
        prompt_tokens = response.model_usage.map_or(0, |u| u.prompt_tokens),
        total_tokens = response.model_usage.map_or(0, |u| u.total_tokens),
        "embed usage"
    );
}
