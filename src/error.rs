use crate::protocol::canonical::ProviderKind;

/// Canonical error type used across all modules.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    #[error("Validation error: {field}{}: {message}", index_suffix(.index))]
    Validation {
        field: String,
        index: Option<usize>,
        message: String,
    },
    #[error("Unsupported role for {provider}: {role}{}", index_suffix(.index))]
    UnsupportedRole {
        provider: ProviderKind,
        role: String,
        index: Option<usize>,
    },
    #[error("Content policy refusal from {provider}: {reason}")]
    ContentPolicy {
        provider: ProviderKind,
        reason: String,
    },
    #[error("Backend protocol error: {0}")]
    BackendProtocol(String),
    #[error("Upstream error: type={error_type}, message={message}")]
    Upstream { error_type: String, message: String },
    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: ProviderKind,
        operation: &'static str,
    },
    #[error("Configuration error: {0}")]
    Configuration(String),
}

fn index_suffix(index: &Option<usize>) -> String {
    index.map_or_else(String::new, |i| format!(" (index: {i})"))
}

/// Broad error category used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    ContentPolicy,
    Protocol,
    Upstream,
    Configuration,
}

impl CanonicalError {
    #[must_use]
    pub fn validation(field: impl Into<String>, index: Option<usize>, message: impl Into<String>) -> Self {
        CanonicalError::Validation {
            field: field.into(),
            index,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        CanonicalError::BackendProtocol(message.into())
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            CanonicalError::Validation { .. }
            | CanonicalError::UnsupportedRole { .. }
            | CanonicalError::Unsupported { .. } => ErrorCategory::InvalidRequest,
            CanonicalError::ContentPolicy { .. } => ErrorCategory::ContentPolicy,
            CanonicalError::BackendProtocol(_) => ErrorCategory::Protocol,
            CanonicalError::Upstream { .. } => ErrorCategory::Upstream,
            CanonicalError::Configuration(_) => ErrorCategory::Configuration,
        }
    }

    /// Only errors reported by the backend mid-stream (e.g. `overloaded_error`)
    /// may succeed on a second attempt; everything else is deterministic.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Upstream
    }
}
