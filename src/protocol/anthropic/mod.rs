pub mod decoder;
pub mod encoder;
pub mod response_decoder;
pub mod stream;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ModelDefaults;
use crate::error::CanonicalError;
use crate::protocol::canonical::{
    CanonicalResponse, ChatRequest, ChatTurn, ProviderKind, StreamChunk,
};
use crate::protocol::{parse_base_url, require_api_key, ChatAdapter, Endpoint};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic Messages API request wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<AnthropicToolChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Anthropic message wire type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: AnthropicContent,
}

/// Message content: the shorthand string form or a list of typed blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

/// A content block in an Anthropic message or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "thinking")]
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: serde_json::Value,
    },
    #[serde(other)]
    Unknown,
}

/// Anthropic tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicToolChoice {
    Auto,
    Any,
    None,
    Tool { name: String },
}

/// Anthropic Messages API response wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicResponse {
    pub id: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub model: String,
    pub content: Vec<AnthropicContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<AnthropicUsage>,
}

/// Anthropic usage. Stream deltas may carry only one of the two counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
}

/// Anthropic SSE stream event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicStreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: AnthropicMessageStart },
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        index: u32,
        content_block: AnthropicContentBlock,
    },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: u32, delta: AnthropicDelta },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop { index: u32 },
    #[serde(rename = "message_delta")]
    MessageDelta {
        delta: AnthropicMessageDeltaBody,
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    #[serde(rename = "message_stop")]
    MessageStop {},
    #[serde(rename = "ping")]
    Ping {},
    #[serde(rename = "error")]
    Error { error: AnthropicErrorBody },
}

/// Message start payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessageStart {
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Delta variants for content block deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { thinking: String },
    #[serde(rename = "signature_delta")]
    SignatureDelta { signature: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
}

/// Message delta body (`stop_reason` etc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessageDeltaBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
}

/// Error body in stream and error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicErrorBody {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
}

/// Backend A: the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    api_key: String,
    base_url: Url,
    defaults: ModelDefaults,
}

impl AnthropicAdapter {
    /// # Errors
    ///
    /// Returns [`CanonicalError::Configuration`] for a blank key or a bad base URL.
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        defaults: ModelDefaults,
    ) -> Result<Self, CanonicalError> {
        let api_key = api_key.into();
        require_api_key(ProviderKind::Anthropic, &api_key)?;
        Ok(Self {
            api_key,
            base_url: parse_base_url(base_url, DEFAULT_BASE_URL)?,
            defaults,
        })
    }

    /// Key for the `x-api-key` header the transport attaches.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[must_use]
    pub fn defaults(&self) -> &ModelDefaults {
        &self.defaults
    }

    fn endpoint(&self, stream: bool) -> Result<Endpoint, CanonicalError> {
        Endpoint::post(&self.base_url, &["messages"], stream)
    }
}

impl ChatAdapter for AnthropicAdapter {
    type Request = AnthropicRequest;
    type Response = AnthropicResponse;
    type StreamEvent = AnthropicStreamEvent;

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn encode_chat_request(
        &self,
        request: &ChatRequest,
    ) -> Result<(Endpoint, AnthropicRequest), CanonicalError> {
        let wire = encoder::encode_anthropic_request(request, &self.defaults)?;
        let endpoint = self.endpoint(wire.stream.unwrap_or(false))?;
        Ok((endpoint, wire))
    }

    fn decode_chat_request(
        &self,
        request: &AnthropicRequest,
    ) -> Result<Vec<ChatTurn>, CanonicalError> {
        decoder::decode_anthropic_request(request)
    }

    fn decode_chat_response(
        &self,
        response: &AnthropicResponse,
    ) -> Result<CanonicalResponse, CanonicalError> {
        response_decoder::decode_anthropic_response(response)
    }

    fn decode_stream_event(
        &self,
        event: &AnthropicStreamEvent,
    ) -> Result<StreamChunk, CanonicalError> {
        stream::decode_anthropic_stream_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_accepts_string_and_blocks() {
        let short: AnthropicMessage =
            serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(short.content, AnthropicContent::Text("hi".into()));

        let blocks: AnthropicMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "tool_result", "tool_use_id": "toolu_1", "content": "42"},
                {"type": "image", "source": {"type": "url", "url": "https://x"}}
            ]
        }))
        .unwrap();
        match blocks.content {
            AnthropicContent::Blocks(blocks) => {
                assert!(matches!(blocks[0], AnthropicContentBlock::ToolResult { .. }));
                assert_eq!(blocks[1], AnthropicContentBlock::Unknown);
            }
            other => panic!("expected blocks, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_choice_wire_shape() {
        assert_eq!(
            serde_json::to_value(AnthropicToolChoice::Tool { name: "f".into() }).unwrap(),
            json!({"type": "tool", "name": "f"})
        );
        assert_eq!(
            serde_json::to_value(AnthropicToolChoice::Any).unwrap(),
            json!({"type": "any"})
        );
    }

    #[test]
    fn test_adapter_requires_key() {
        let defaults = ModelDefaults::for_provider(ProviderKind::Anthropic);
        assert!(matches!(
            AnthropicAdapter::new("", None, defaults.clone()),
            Err(CanonicalError::Configuration(_))
        ));
        let adapter = AnthropicAdapter::new("sk-ant", None, defaults).unwrap();
        assert_eq!(
            adapter.endpoint(true).unwrap().url.as_str(),
            "https://api.anthropic.com/v1/messages"
        );
    }
}
