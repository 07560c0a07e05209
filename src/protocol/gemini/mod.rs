pub mod decoder;
pub mod embed;
pub mod encoder;
pub mod response_decoder;
pub mod stream;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{default_safety_settings, ModelDefaults, SafetySetting};
use crate::error::CanonicalError;
use crate::protocol::canonical::{
    CanonicalResponse, ChatRequest, ChatTurn, EmbedRequest, EmbedResponse, ProviderKind,
    StreamChunk,
};
use crate::protocol::{parse_base_url, require_api_key, ChatAdapter, EmbedAdapter, Endpoint};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini v1beta generateContent request wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiToolDeclaration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<GeminiToolConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,
}

/// A content message in Gemini format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// A single part within a Gemini content message. Exactly one payload field
/// is set; unknown sibling keys (e.g. `thoughtSignature`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl GeminiPart {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Value,
}

/// Gemini generateContent response wire type. Stream chunks share this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<GeminiCandidate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

/// A candidate in the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: GeminiContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPromptFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

/// Usage metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates_token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_token_count: Option<u64>,
}

/// A tool declaration (contains function declarations).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiToolDeclaration {
    pub function_declarations: Vec<GeminiFunctionDeclaration>,
}

/// A function declaration within a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Tool configuration (function calling mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiToolConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_calling_config: Option<GeminiFunctionCallingConfig>,
}

/// Function calling config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionCallingConfig {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_function_names: Option<Vec<String>>,
}

/// Generation config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// `batchEmbedText` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiBatchEmbedRequest {
    pub requests: Vec<GeminiEmbedTextRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiEmbedTextRequest {
    pub model: String,
    pub text: String,
}

/// `batchEmbedText` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiBatchEmbedResponse {
    #[serde(default)]
    pub embeddings: Vec<GeminiEmbedding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiEmbedding {
    pub value: Vec<f32>,
}

/// Backend B: Google Gemini `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    api_key: String,
    base_url: Url,
    defaults: ModelDefaults,
    safety_settings: Vec<SafetySetting>,
}

impl GeminiAdapter {
    /// # Errors
    ///
    /// Returns [`CanonicalError::Configuration`] for a blank key or a bad base URL.
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        defaults: ModelDefaults,
    ) -> Result<Self, CanonicalError> {
        let api_key = api_key.into();
        require_api_key(ProviderKind::Gemini, &api_key)?;
        Ok(Self {
            api_key,
            base_url: parse_base_url(base_url, DEFAULT_BASE_URL)?,
            defaults,
            safety_settings: default_safety_settings(),
        })
    }

    #[must_use]
    pub fn with_safety_settings(mut self, safety_settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = safety_settings;
        self
    }

    #[must_use]
    pub fn defaults(&self) -> &ModelDefaults {
        &self.defaults
    }

    /// Gemini authenticates through the `key` query parameter.
    fn model_endpoint(
        &self,
        model: &str,
        method: &str,
        stream: bool,
    ) -> Result<Endpoint, CanonicalError> {
        let segment = format!("{model}:{method}");
        let endpoint = Endpoint::post(&self.base_url, &["models", &segment], stream)?;
        Ok(if stream {
            endpoint.with_query(&[("alt", "sse"), ("key", &self.api_key)])
        } else {
            endpoint.with_query(&[("key", &self.api_key)])
        })
    }
}

impl ChatAdapter for GeminiAdapter {
    type Request = GeminiRequest;
    type Response = GeminiResponse;
    type StreamEvent = GeminiResponse;

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn encode_chat_request(
        &self,
        request: &ChatRequest,
    ) -> Result<(Endpoint, GeminiRequest), CanonicalError> {
        let encoded = encoder::encode_gemini_request(request, &self.defaults, &self.safety_settings)?;
        let method = if encoded.stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        let endpoint = self.model_endpoint(&encoded.model, method, encoded.stream)?;
        Ok((endpoint, encoded.request))
    }

    fn decode_chat_request(&self, request: &GeminiRequest) -> Result<Vec<ChatTurn>, CanonicalError> {
        decoder::decode_gemini_request(request)
    }

    fn decode_chat_response(
        &self,
        response: &GeminiResponse,
    ) -> Result<CanonicalResponse, CanonicalError> {
        response_decoder::decode_gemini_response(response)
    }

    fn decode_stream_event(&self, event: &GeminiResponse) -> Result<StreamChunk, CanonicalError> {
        stream::decode_gemini_stream_chunk(event)
    }
}

impl EmbedAdapter for GeminiAdapter {
    type EmbedRequest = GeminiBatchEmbedRequest;
    type EmbedResponse = GeminiBatchEmbedResponse;

    fn encode_embed_request(
        &self,
        request: &EmbedRequest,
    ) -> Result<(Endpoint, GeminiBatchEmbedRequest), CanonicalError> {
        let wire = embed::encode_gemini_embed_request(request, &self.defaults)?;
        let model = wire
            .requests
            .first()
            .map(|r| r.model.clone())
            .unwrap_or_default();
        let endpoint = self.model_endpoint(&model, "batchEmbedText", false)?;
        Ok((endpoint, wire))
    }

    fn decode_embed_response(
        &self,
        response: &GeminiBatchEmbedResponse,
    ) -> Result<EmbedResponse, CanonicalError> {
        Ok(embed::decode_gemini_embed_response(response))
    }
}
