//! Dynamic provider facade.
//!
//! [`Provider`] picks the typed adapter once, from configuration, and works
//! on JSON bodies so callers never name a wire type. Transport stays with
//! the caller: encode returns the endpoint plus the body to send, decode
//! takes the bytes that came back.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::CanonicalError;
use crate::observability::{log_embed_usage, log_response_usage};
use crate::protocol::anthropic::stream::parse_anthropic_sse;
use crate::protocol::anthropic::AnthropicAdapter;
use crate::protocol::canonical::{
    CanonicalResponse, ChatRequest, ChatTurn, EmbedRequest, EmbedResponse, ProviderKind,
    StreamChunk,
};
use crate::protocol::gemini::stream::parse_gemini_sse;
use crate::protocol::gemini::GeminiAdapter;
use crate::protocol::openai_chat::stream::parse_openai_sse;
use crate::protocol::openai_chat::OpenAiAdapter;
use crate::protocol::{ChatAdapter, EmbedAdapter, Endpoint};
use crate::stream::{SseEvent, SseParser, StreamAccumulator};

/// One configured backend.
#[derive(Debug, Clone)]
pub enum Provider {
    Anthropic(AnthropicAdapter),
    Gemini(GeminiAdapter),
    OpenAi(OpenAiAdapter),
}

/// `{"error": {...}}` as returned by all three backends on failure.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    type_: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl From<ErrorBody> for CanonicalError {
    fn from(body: ErrorBody) -> Self {
        let error_type = body
            .type_
            .or(body.status)
            .or_else(|| body.code.map(|code| code.to_string()))
            .unwrap_or_else(|| "error".to_string());
        CanonicalError::Upstream {
            error_type,
            message: body.message.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventTag {
    #[serde(rename = "type")]
    type_: String,
}

fn upstream_error(body: &[u8]) -> Option<CanonicalError> {
    memchr::memmem::find(body, b"\"error\"")?;
    serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.into())
}

fn parse_body<T: DeserializeOwned>(kind: ProviderKind, what: &str, body: &[u8]) -> Result<T, CanonicalError> {
    if let Some(err) = upstream_error(body) {
        return Err(err);
    }
    serde_json::from_slice(body)
        .map_err(|e| CanonicalError::protocol(format!("malformed {kind} {what}: {e}")))
}

fn to_body<T: Serialize>(kind: ProviderKind, wire: &T) -> Result<serde_json::Value, CanonicalError> {
    serde_json::to_value(wire)
        .map_err(|e| CanonicalError::protocol(format!("failed to serialize {kind} request: {e}")))
}

impl Provider {
    /// Build the adapter a provider entry names.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::Configuration`] for a blank key or a bad base URL.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, CanonicalError> {
        let defaults = config.resolved_defaults();
        let base_url = config.base_url.as_deref();
        let provider = match config.provider {
            ProviderKind::Anthropic => {
                Provider::Anthropic(AnthropicAdapter::new(&config.api_key, base_url, defaults)?)
            }
            ProviderKind::Gemini => {
                let adapter = GeminiAdapter::new(&config.api_key, base_url, defaults)?;
                Provider::Gemini(match &config.safety_settings {
                    Some(settings) => adapter.with_safety_settings(settings.clone()),
                    None => adapter,
                })
            }
            ProviderKind::OpenAi => {
                Provider::OpenAi(OpenAiAdapter::new(&config.api_key, base_url, defaults)?)
            }
        };
        tracing::debug!(name = %config.name, provider = %config.provider, "provider configured");
        Ok(provider)
    }

    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Anthropic(a) => a.kind(),
            Provider::Gemini(a) => a.kind(),
            Provider::OpenAi(a) => a.kind(),
        }
    }

    /// # Errors
    ///
    /// Returns [`CanonicalError::Validation`] for malformed canonical input.
    pub fn encode_chat_request(
        &self,
        request: &ChatRequest,
    ) -> Result<(Endpoint, serde_json::Value), CanonicalError> {
        let kind = self.kind();
        match self {
            Provider::Anthropic(a) => {
                let (endpoint, wire) = a.encode_chat_request(request)?;
                Ok((endpoint, to_body(kind, &wire)?))
            }
            Provider::Gemini(a) => {
                let (endpoint, wire) = a.encode_chat_request(request)?;
                Ok((endpoint, to_body(kind, &wire)?))
            }
            Provider::OpenAi(a) => {
                let (endpoint, wire) = a.encode_chat_request(request)?;
                Ok((endpoint, to_body(kind, &wire)?))
            }
        }
    }

    /// Decode a wire request body back into canonical turns.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::BackendProtocol`] when the body is not this
    /// backend's request schema.
    pub fn decode_chat_request(&self, body: &serde_json::Value) -> Result<Vec<ChatTurn>, CanonicalError> {
        let kind = self.kind();
        let invalid = |e: serde_json::Error| CanonicalError::protocol(format!("malformed {kind} request: {e}"));
        match self {
            Provider::Anthropic(a) => a.decode_chat_request(&serde_json::from_value(body.clone()).map_err(invalid)?),
            Provider::Gemini(a) => a.decode_chat_request(&serde_json::from_value(body.clone()).map_err(invalid)?),
            Provider::OpenAi(a) => a.decode_chat_request(&serde_json::from_value(body.clone()).map_err(invalid)?),
        }
    }

    /// Decode a non-streaming response body and attach the caller's session.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::Upstream`] for an error envelope,
    /// [`CanonicalError::ContentPolicy`] for a refusal and
    /// [`CanonicalError::BackendProtocol`] for anything that does not parse.
    pub fn decode_chat_response(
        &self,
        body: &[u8],
        session_id: Option<&str>,
    ) -> Result<CanonicalResponse, CanonicalError> {
        let kind = self.kind();
        let response = match self {
            Provider::Anthropic(a) => a.decode_chat_response(&parse_body(kind, "response", body)?)?,
            Provider::Gemini(a) => a.decode_chat_response(&parse_body(kind, "response", body)?)?,
            Provider::OpenAi(a) => a.decode_chat_response(&parse_body(kind, "response", body)?)?,
        }
        .with_session_id(session_id);
        log_response_usage(kind, &response);
        Ok(response)
    }

    /// Decode one SSE frame of a stream.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::Upstream`] for error frames and
    /// [`CanonicalError::BackendProtocol`] for payloads that do not parse.
    pub fn decode_stream_event(&self, event: &SseEvent) -> Result<StreamChunk, CanonicalError> {
        let data = event.data.trim().as_bytes();
        if data.is_empty() {
            return Ok(StreamChunk::Ignored);
        }
        match self {
            Provider::Anthropic(a) => {
                let parsed = match event.event.as_deref() {
                    Some(name) => parse_anthropic_sse(name, data)?,
                    None => {
                        let tag: EventTag = serde_json::from_slice(data).map_err(|e| {
                            CanonicalError::protocol(format!("anthropic stream frame without type: {e}"))
                        })?;
                        parse_anthropic_sse(&tag.type_, data)?
                    }
                };
                parsed.map_or(Ok(StreamChunk::Ignored), |event| a.decode_stream_event(&event))
            }
            Provider::Gemini(a) => {
                if let Some(err) = upstream_error(data) {
                    return Err(err);
                }
                a.decode_stream_event(&parse_gemini_sse(data)?)
            }
            Provider::OpenAi(a) => {
                if let Some(err) = upstream_error(data) {
                    return Err(err);
                }
                match parse_openai_sse(data)? {
                    Some(chunk) => a.decode_stream_event(&chunk),
                    None => Ok(StreamChunk::Done),
                }
            }
        }
    }

    /// Decode a complete SSE body into one response. Frames after the
    /// backend's end-of-stream signal are not read.
    ///
    /// # Errors
    ///
    /// Propagates the first error any frame decodes to.
    pub fn decode_stream(
        &self,
        body: &str,
        session_id: Option<&str>,
    ) -> Result<CanonicalResponse, CanonicalError> {
        let mut parser = SseParser::new();
        let mut frames = parser.feed(body);
        frames.extend(parser.finish());

        let mut accumulator = StreamAccumulator::new();
        for frame in &frames {
            accumulator.push(self.decode_stream_event(frame)?)?;
            if accumulator.is_done() {
                break;
            }
        }
        let response = accumulator.finish().with_session_id(session_id);
        log_response_usage(self.kind(), &response);
        Ok(response)
    }

    /// # Errors
    ///
    /// Returns [`CanonicalError::Unsupported`] for Anthropic and
    /// [`CanonicalError::Validation`] when there is nothing to embed.
    pub fn encode_embed_request(
        &self,
        request: &EmbedRequest,
    ) -> Result<(Endpoint, serde_json::Value), CanonicalError> {
        let kind = self.kind();
        match self {
            Provider::Anthropic(_) => Err(CanonicalError::Unsupported {
                provider: kind,
                operation: "embeddings",
            }),
            Provider::Gemini(a) => {
                let (endpoint, wire) = a.encode_embed_request(request)?;
                Ok((endpoint, to_body(kind, &wire)?))
            }
            Provider::OpenAi(a) => {
                let (endpoint, wire) = a.encode_embed_request(request)?;
                Ok((endpoint, to_body(kind, &wire)?))
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`CanonicalError::Unsupported`] for Anthropic,
    /// [`CanonicalError::Upstream`] for an error envelope and
    /// [`CanonicalError::BackendProtocol`] for anything that does not parse.
    pub fn decode_embed_response(&self, body: &[u8]) -> Result<EmbedResponse, CanonicalError> {
        let kind = self.kind();
        let response = match self {
            Provider::Anthropic(_) => {
                return Err(CanonicalError::Unsupported {
                    provider: kind,
                    operation: "embeddings",
                })
            }
            Provider::Gemini(a) => a.decode_embed_response(&parse_body(kind, "embed response", body)?)?,
            Provider::OpenAi(a) => a.decode_embed_response(&parse_body(kind, "embed response", body)?)?,
        };
        log_embed_usage(kind, &response);
        Ok(response)
    }
}
