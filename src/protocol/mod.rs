pub mod anthropic;
pub mod canonical;
pub mod function;
pub mod gemini;
pub mod mapping;
pub mod openai_chat;
pub mod validate;

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::CanonicalError;
use crate::protocol::canonical::{
    CanonicalResponse, ChatRequest, ChatTurn, EmbedRequest, EmbedResponse, ProviderKind,
    StreamChunk,
};

/// Where an encoded request must be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: http::Method,
    pub url: Url,
    pub stream: bool,
}

impl Endpoint {
    /// `POST` to `base` extended with `segments`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::Configuration`] when `base` cannot carry path segments.
    pub fn post(base: &Url, segments: &[&str], stream: bool) -> Result<Self, CanonicalError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| CanonicalError::Configuration(format!("base URL cannot be a base: {base}")))?
            .pop_if_empty()
            .extend(segments);
        Ok(Self {
            method: http::Method::POST,
            url,
            stream,
        })
    }

    #[must_use]
    pub fn with_query(mut self, pairs: &[(&str, &str)]) -> Self {
        if !pairs.is_empty() {
            let mut query = self.url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        self
    }
}

/// Parse an adapter base URL, falling back to the backend default.
///
/// # Errors
///
/// Returns [`CanonicalError::Configuration`] when the URL does not parse.
pub fn parse_base_url(base_url: Option<&str>, default: &str) -> Result<Url, CanonicalError> {
    let raw = base_url.unwrap_or(default);
    Url::parse(raw).map_err(|e| CanonicalError::Configuration(format!("invalid base URL {raw:?}: {e}")))
}

/// Reject empty API keys at construction time.
///
/// # Errors
///
/// Returns [`CanonicalError::Configuration`] when the key is blank.
pub fn require_api_key(provider: ProviderKind, api_key: &str) -> Result<(), CanonicalError> {
    if api_key.trim().is_empty() {
        return Err(CanonicalError::Configuration(format!(
            "{provider} API key not set"
        )));
    }
    Ok(())
}

/// Bidirectional mapping between the canonical schema and one backend's chat wire schema.
pub trait ChatAdapter {
    type Request: Serialize + DeserializeOwned;
    type Response: DeserializeOwned;
    type StreamEvent: DeserializeOwned;

    fn kind(&self) -> ProviderKind;

    /// Encode a canonical request and pick the streaming or non-streaming endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::Validation`] for malformed canonical input.
    fn encode_chat_request(
        &self,
        request: &ChatRequest,
    ) -> Result<(Endpoint, Self::Request), CanonicalError>;

    /// Decode a wire request back into canonical turns.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::UnsupportedRole`] for roles with no canonical
    /// equivalent and [`CanonicalError::BackendProtocol`] for malformed content.
    fn decode_chat_request(&self, request: &Self::Request) -> Result<Vec<ChatTurn>, CanonicalError>;

    /// # Errors
    ///
    /// Returns [`CanonicalError::ContentPolicy`] when the backend refused to
    /// generate and [`CanonicalError::BackendProtocol`] for unexpected shapes.
    fn decode_chat_response(
        &self,
        response: &Self::Response,
    ) -> Result<CanonicalResponse, CanonicalError>;

    /// Decode one event of a strictly ordered stream. Holds no state between calls.
    ///
    /// # Errors
    ///
    /// Same as [`ChatAdapter::decode_chat_response`], plus
    /// [`CanonicalError::Upstream`] for error events.
    fn decode_stream_event(&self, event: &Self::StreamEvent) -> Result<StreamChunk, CanonicalError>;
}

/// Embedding support for backends that expose an embedding endpoint.
pub trait EmbedAdapter {
    type EmbedRequest: Serialize;
    type EmbedResponse: DeserializeOwned;

    /// # Errors
    ///
    /// Returns [`CanonicalError::Validation`] when there is nothing to embed or
    /// no embedding model is configured.
    fn encode_embed_request(
        &self,
        request: &EmbedRequest,
    ) -> Result<(Endpoint, Self::EmbedRequest), CanonicalError>;

    /// # Errors
    ///
    /// Returns [`CanonicalError::BackendProtocol`] for unexpected shapes.
    fn decode_embed_response(
        &self,
        response: &Self::EmbedResponse,
    ) -> Result<EmbedResponse, CanonicalError>;
}
