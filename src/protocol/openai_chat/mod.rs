pub mod decoder;
pub mod embed;
pub mod encoder;
pub mod response_decoder;
pub mod stream;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ModelDefaults;
use crate::error::CanonicalError;
use crate::protocol::canonical::{
    CanonicalResponse, ChatRequest, ChatTurn, EmbedRequest, EmbedResponse, ProviderKind,
    StreamChunk,
};
use crate::protocol::{parse_base_url, require_api_key, ChatAdapter, EmbedAdapter, Endpoint};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// `OpenAI` Chat Completion request wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChatRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiTool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<OpenAiToolChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<OpenAiStreamOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<OpenAiStop>,
}

/// `tool_choice` field in `OpenAI` Chat requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAiToolChoice {
    Mode(String),
    Function(OpenAiToolChoiceFunctionCall),
}

/// `tool_choice` object form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiToolChoiceFunctionCall {
    #[serde(rename = "type")]
    pub type_: String,
    pub function: OpenAiToolChoiceFunction,
}

/// Nested function selector in `tool_choice`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiToolChoiceFunction {
    pub name: String,
}

/// `stop` field in `OpenAI` Chat requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAiStop {
    Single(String),
    Multi(Vec<String>),
}

/// Stream options for `include_usage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiStreamOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_usage: Option<bool>,
}

/// `OpenAI` Chat Completion response wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChatResponse {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<OpenAiChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAiUsage>,
}

/// A single choice in the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiChoice {
    pub index: u32,
    pub message: OpenAiMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// `OpenAI` message wire type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<OpenAiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

/// Message content: a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAiContent {
    Text(String),
    Parts(Vec<OpenAiContentPart>),
}

impl OpenAiContent {
    /// Text of the content, joining text parts and skipping everything else.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            OpenAiContent::Text(text) => text.clone(),
            OpenAiContent::Parts(parts) => parts
                .iter()
                .filter(|p| p.type_ == "text")
                .filter_map(|p| p.text.as_deref())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiContentPart {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A tool call within a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub type_: String,
    pub function: OpenAiToolCallFunction,
}

fn function_type() -> String {
    "function".to_string()
}

/// The function part of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiTool {
    #[serde(rename = "type")]
    pub type_: String,
    pub function: OpenAiToolFunction,
}

/// A function declaration within a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Usage info in the response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OpenAiUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// A streaming chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiStreamChunk {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAiUsage>,
}

/// A choice within a stream chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiStreamChoice {
    pub index: u32,
    #[serde(default)]
    pub delta: OpenAiDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Delta content within a stream choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAiDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiStreamToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

/// A tool call delta in streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiStreamToolCall {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<OpenAiStreamToolCallFunction>,
}

/// Function delta within a streaming tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiStreamToolCallFunction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// `/embeddings` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiEmbedRequest {
    pub model: String,
    pub input: Vec<String>,
}

/// `/embeddings` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiEmbedResponse {
    pub data: Vec<OpenAiEmbedding>,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiEmbedding {
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// Backend C: `OpenAI` Chat Completions.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    api_key: String,
    base_url: Url,
    defaults: ModelDefaults,
}

impl OpenAiAdapter {
    /// # Errors
    ///
    /// Returns [`CanonicalError::Configuration`] for a blank key or a bad base URL.
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        defaults: ModelDefaults,
    ) -> Result<Self, CanonicalError> {
        let api_key = api_key.into();
        require_api_key(ProviderKind::OpenAi, &api_key)?;
        Ok(Self {
            api_key,
            base_url: parse_base_url(base_url, DEFAULT_BASE_URL)?,
            defaults,
        })
    }

    /// Bearer token for the `Authorization` header the transport attaches.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[must_use]
    pub fn defaults(&self) -> &ModelDefaults {
        &self.defaults
    }
}

impl ChatAdapter for OpenAiAdapter {
    type Request = OpenAiChatRequest;
    type Response = OpenAiChatResponse;
    type StreamEvent = OpenAiStreamChunk;

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn encode_chat_request(
        &self,
        request: &ChatRequest,
    ) -> Result<(Endpoint, OpenAiChatRequest), CanonicalError> {
        let wire = encoder::encode_openai_chat_request(request, &self.defaults)?;
        let endpoint = Endpoint::post(
            &self.base_url,
            &["chat", "completions"],
            wire.stream.unwrap_or(false),
        )?;
        Ok((endpoint, wire))
    }

    fn decode_chat_request(
        &self,
        request: &OpenAiChatRequest,
    ) -> Result<Vec<ChatTurn>, CanonicalError> {
        decoder::decode_openai_chat_request(request)
    }

    fn decode_chat_response(
        &self,
        response: &OpenAiChatResponse,
    ) -> Result<CanonicalResponse, CanonicalError> {
        response_decoder::decode_openai_chat_response(response)
    }

    fn decode_stream_event(&self, event: &OpenAiStreamChunk) -> Result<StreamChunk, CanonicalError> {
        stream::decode_openai_stream_chunk(event)
    }
}

impl EmbedAdapter for OpenAiAdapter {
    type EmbedRequest = OpenAiEmbedRequest;
    type EmbedResponse = OpenAiEmbedResponse;

    fn encode_embed_request(
        &self,
        request: &EmbedRequest,
    ) -> Result<(Endpoint, OpenAiEmbedRequest), CanonicalError> {
        let wire = embed::encode_openai_embed_request(request, &self.defaults)?;
        let endpoint = Endpoint::post(&self.base_url, &["embeddings"], false)?;
        Ok((endpoint, wire))
    }

    fn decode_embed_response(
        &self,
        response: &OpenAiEmbedResponse,
    ) -> Result<EmbedResponse, CanonicalError> {
        embed::decode_openai_embed_response(response)
    }
}
