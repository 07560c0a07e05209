use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::error::CanonicalError;

/// The kind of backend an adapter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// Canonical message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalRole {
    System,
    User,
    Assistant,
    Function,
}

impl CanonicalRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalRole::System => "system",
            CanonicalRole::User => "user",
            CanonicalRole::Assistant => "assistant",
            CanonicalRole::Function => "function",
        }
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    FunctionCall,
}

/// Function-call arguments: a raw string while streaming, a structured value
/// once the backend delivered the call complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FunctionArguments {
    Raw(String),
    Parsed(serde_json::Value),
}

impl Default for FunctionArguments {
    fn default() -> Self {
        FunctionArguments::Raw(String::new())
    }
}

impl FunctionArguments {
    /// Structured view of the arguments. An empty raw string is an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when a raw argument string is not valid JSON.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            FunctionArguments::Parsed(value) => Ok(value.clone()),
            FunctionArguments::Raw(raw) if raw.trim().is_empty() => {
                Ok(serde_json::Value::Object(serde_json::Map::new()))
            }
            FunctionArguments::Raw(raw) => serde_json::from_str(raw),
        }
    }

    /// JSON text of the arguments, serializing structured values.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        match self {
            FunctionArguments::Raw(raw) => raw.clone(),
            FunctionArguments::Parsed(value) => value.to_string(),
        }
    }

    /// Parse a wire argument string, keeping it raw when it is not valid JSON.
    #[must_use]
    pub fn from_wire_string(raw: &str) -> Self {
        serde_json::from_str(raw)
            .map_or_else(|_| FunctionArguments::Raw(raw.to_owned()), FunctionArguments::Parsed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            FunctionArguments::Raw(raw) => raw.is_empty(),
            FunctionArguments::Parsed(serde_json::Value::Null) => true,
            FunctionArguments::Parsed(_) => false,
        }
    }
}

/// Only `function` exists today; kept as an enum so the wire tag is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionCallType {
    #[default]
    Function,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: FunctionArguments,
}

/// A structured tool-invocation request produced by an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub id: String,
    #[serde(rename = "type", default)]
    pub type_: FunctionCallType,
    pub function: FunctionCallBody,
}

impl FunctionCall {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: FunctionArguments) -> Self {
        Self {
            id: id.into(),
            type_: FunctionCallType::Function,
            function: FunctionCallBody {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// A partial function call received while a stream is in flight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionCallDelta {
    pub index: Option<u32>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<FunctionArguments>,
}

impl From<FunctionCall> for FunctionCallDelta {
    fn from(call: FunctionCall) -> Self {
        Self {
            index: None,
            id: Some(call.id),
            name: Some(call.function.name),
            arguments: Some(call.function.arguments),
        }
    }
}

impl From<&FunctionCall> for FunctionCallDelta {
    fn from(call: &FunctionCall) -> Self {
        Self::from(call.clone())
    }
}

/// One message in a conversation. The variant fixes which fields a role carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatTurn {
    System {
        content: String,
    },
    User {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(
            default,
            rename = "functionCalls",
            skip_serializing_if = "Vec::is_empty"
        )]
        function_calls: Vec<FunctionCall>,
    },
    Function {
        content: String,
        #[serde(rename = "functionId")]
        function_id: String,
    },
}

impl ChatTurn {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        ChatTurn::System {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        ChatTurn::User {
            content: content.into(),
            name: None,
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        ChatTurn::Assistant {
            content: Some(content.into()),
            name: None,
            function_calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn function_result(function_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatTurn::Function {
            content: content.into(),
            function_id: function_id.into(),
        }
    }

    #[must_use]
    pub fn role(&self) -> CanonicalRole {
        match self {
            ChatTurn::System { .. } => CanonicalRole::System,
            ChatTurn::User { .. } => CanonicalRole::User,
            ChatTurn::Assistant { .. } => CanonicalRole::Assistant,
            ChatTurn::Function { .. } => CanonicalRole::Function,
        }
    }

    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            ChatTurn::System { content }
            | ChatTurn::User { content, .. }
            | ChatTurn::Function { content, .. } => Some(content),
            ChatTurn::Assistant { content, .. } => content.as_deref(),
        }
    }
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Request-level directive controlling whether the model calls functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionCallMode {
    None,
    Auto,
    Required,
    Function(String),
}

/// Sampling and transport knobs. Used both as adapter defaults and as
/// per-request overrides; a request value wins when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ModelConfig {
    /// Overlay `overrides` on top of `self`.
    #[must_use]
    pub fn resolve(&self, overrides: Option<&ModelConfig>) -> ModelConfig {
        let Some(o) = overrides else {
            return self.clone();
        };
        ModelConfig {
            max_tokens: o.max_tokens.or(self.max_tokens),
            temperature: o.temperature.or(self.temperature),
            top_p: o.top_p.or(self.top_p),
            top_k: o.top_k.or(self.top_k),
            stop_sequences: o
                .stop_sequences
                .clone()
                .or_else(|| self.stop_sequences.clone()),
            stream: o.stream.or(self.stream),
        }
    }
}

/// The provider-agnostic chat request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: Option<String>,
    pub chat_prompt: Vec<ChatTurn>,
    pub functions: Vec<FunctionSpec>,
    pub function_call: Option<FunctionCallMode>,
    pub model_config: Option<ModelConfig>,
    pub session_id: Option<String>,
}

/// The provider-agnostic embedding request.
#[derive(Debug, Clone, Default)]
pub struct EmbedRequest {
    pub embed_model: Option<String>,
    pub texts: Vec<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    #[must_use]
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// One backend-reported candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResult {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_calls: Vec<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// The provider-agnostic response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    pub results: Vec<ChatResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_model_usage: Option<TokenUsage>,
}

impl CanonicalResponse {
    #[must_use]
    pub fn with_session_id(mut self, session_id: Option<&str>) -> Self {
        self.session_id = session_id.map(str::to_owned);
        self
    }

    /// Guard for the "results is never empty once final" invariant.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::BackendProtocol`] when `results` is empty.
    pub fn ensure_results(self, provider: ProviderKind) -> Result<Self, CanonicalError> {
        if self.results.is_empty() {
            return Err(CanonicalError::protocol(format!(
                "{provider} response has no candidates"
            )));
        }
        Ok(self)
    }
}

/// Ordered embedding vectors, index-aligned with the request texts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model_usage: Option<TokenUsage>,
}

/// Usage fields reported by a single stream event; absent fields keep their
/// previously accumulated value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageDelta {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl UsageDelta {
    pub fn overlay(&mut self, other: &UsageDelta) {
        if other.prompt_tokens.is_some() {
            self.prompt_tokens = other.prompt_tokens;
        }
        if other.completion_tokens.is_some() {
            self.completion_tokens = other.completion_tokens;
        }
        if other.total_tokens.is_some() {
            self.total_tokens = other.total_tokens;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none() && self.completion_tokens.is_none() && self.total_tokens.is_none()
    }

    /// Final usage, or `None` when nothing was ever reported.
    #[must_use]
    pub fn to_usage(&self) -> Option<TokenUsage> {
        if self.is_empty() {
            return None;
        }
        let prompt_tokens = self.prompt_tokens.unwrap_or(0);
        let completion_tokens = self.completion_tokens.unwrap_or(0);
        Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: self
                .total_tokens
                .unwrap_or(prompt_tokens + completion_tokens),
        })
    }
}

impl From<TokenUsage> for UsageDelta {
    fn from(usage: TokenUsage) -> Self {
        Self {
            prompt_tokens: Some(usage.prompt_tokens),
            completion_tokens: Some(usage.completion_tokens),
            total_tokens: Some(usage.total_tokens),
        }
    }
}

/// Partial state of one candidate carried by a single stream event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultDelta {
    pub index: usize,
    pub content: Option<String>,
    pub name: Option<String>,
    pub function_calls: Vec<FunctionCallDelta>,
    pub finish_reason: Option<FinishReason>,
}

/// Everything a single stream event contributed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseDelta {
    pub remote_id: Option<String>,
    pub results: SmallVec<[ResultDelta; 1]>,
    pub usage: Option<UsageDelta>,
}

impl From<CanonicalResponse> for ResponseDelta {
    /// Backends that stream full response shapes deliver complete calls, so
    /// each call becomes a delta carrying its final structured arguments.
    fn from(response: CanonicalResponse) -> Self {
        let results = response
            .results
            .into_iter()
            .enumerate()
            .map(|(index, result)| ResultDelta {
                index,
                content: result.content,
                name: result.name,
                function_calls: result
                    .function_calls
                    .into_iter()
                    .map(FunctionCallDelta::from)
                    .collect(),
                finish_reason: result.finish_reason,
            })
            .collect();
        Self {
            remote_id: response.remote_id,
            results,
            usage: response.model_usage.map(UsageDelta::from),
        }
    }
}

/// Outcome of decoding one wire stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Delta(ResponseDelta),
    /// Structurally empty events (pings, block stops, empty starts).
    Ignored,
    /// The backend signalled the end of the stream.
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_turn_serde_shape() {
        let turn: ChatTurn = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "functionCalls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"city\":\"SF\"}"}
            }]
        }))
        .unwrap();
        match &turn {
            ChatTurn::Assistant { function_calls, .. } => {
                assert_eq!(function_calls[0].function.name, "get_weather");
                assert!(matches!(
                    function_calls[0].function.arguments,
                    FunctionArguments::Raw(_)
                ));
            }
            other => panic!("expected assistant turn, got {other:?}"),
        }

        let function_turn: ChatTurn = serde_json::from_value(json!({
            "role": "function",
            "content": "72F",
            "functionId": "call_1"
        }))
        .unwrap();
        assert_eq!(function_turn.role(), CanonicalRole::Function);
        assert_eq!(function_turn.content(), Some("72F"));
    }

    #[test]
    fn test_function_arguments_untagged() {
        let raw: FunctionArguments = serde_json::from_value(json!("{\"a\":")).unwrap();
        assert_eq!(raw, FunctionArguments::Raw("{\"a\":".into()));
        let parsed: FunctionArguments = serde_json::from_value(json!({"a": 1})).unwrap();
        assert_eq!(parsed, FunctionArguments::Parsed(json!({"a": 1})));
    }

    #[test]
    fn test_function_arguments_to_value() {
        assert_eq!(
            FunctionArguments::Raw(String::new()).to_value().unwrap(),
            json!({})
        );
        assert_eq!(
            FunctionArguments::Raw("{\"city\":\"SF\"}".into())
                .to_value()
                .unwrap(),
            json!({"city": "SF"})
        );
        assert!(FunctionArguments::Raw("{\"city\"".into()).to_value().is_err());
        assert_eq!(
            FunctionArguments::from_wire_string("not json"),
            FunctionArguments::Raw("not json".into())
        );
    }

    #[test]
    fn test_model_config_request_overrides_defaults() {
        let defaults = ModelConfig {
            max_tokens: Some(500),
            temperature: Some(0.0),
            stream: Some(false),
            ..Default::default()
        };
        let overrides = ModelConfig {
            stream: Some(true),
            temperature: Some(0.7),
            ..Default::default()
        };
        let resolved = defaults.resolve(Some(&overrides));
        assert_eq!(resolved.max_tokens, Some(500));
        assert_eq!(resolved.temperature, Some(0.7));
        assert_eq!(resolved.stream, Some(true));
        assert_eq!(defaults.resolve(None), defaults);
    }

    #[test]
    fn test_usage_delta_overlay_and_total() {
        let mut usage = UsageDelta {
            prompt_tokens: Some(12),
            completion_tokens: Some(1),
            total_tokens: None,
        };
        usage.overlay(&UsageDelta {
            completion_tokens: Some(30),
            ..Default::default()
        });
        assert_eq!(usage.to_usage(), Some(TokenUsage::new(12, 30)));
        assert_eq!(UsageDelta::default().to_usage(), None);
    }

    #[test]
    fn test_ensure_results_rejects_empty() {
        let err = CanonicalResponse::default()
            .ensure_results(ProviderKind::OpenAi)
            .unwrap_err();
        assert!(matches!(err, CanonicalError::BackendProtocol(_)));
    }
}
