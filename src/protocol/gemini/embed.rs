use crate::config::ModelDefaults;
use crate::error::CanonicalError;
use crate::protocol::canonical::{EmbedRequest, EmbedResponse};
use crate::protocol::gemini::{
    GeminiBatchEmbedRequest, GeminiBatchEmbedResponse, GeminiEmbedTextRequest,
};

/// Encode a canonical embedding request as a `batchEmbedText` body.
///
/// # Errors
///
/// Returns [`CanonicalError::Validation`] when there are no texts or no
/// embedding model is configured.
pub fn encode_gemini_embed_request(
    request: &EmbedRequest,
    defaults: &ModelDefaults,
) -> Result<GeminiBatchEmbedRequest, CanonicalError> {
    let model = request
        .embed_model
        .as_deref()
        .or(defaults.embed_model.as_deref())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| CanonicalError::validation("embedModel", None, "embed model not set"))?;
    if request.texts.is_empty() {
        return Err(CanonicalError::validation("texts", None, "embed texts is empty"));
    }
    Ok(GeminiBatchEmbedRequest {
        requests: request
            .texts
            .iter()
            .map(|text| GeminiEmbedTextRequest {
                model: model.to_string(),
                text: text.clone(),
            })
            .collect(),
    })
}

/// Vectors come back in request order; Gemini reports no usage here.
#[must_use]
pub fn decode_gemini_embed_response(response: &GeminiBatchEmbedResponse) -> EmbedResponse {
    EmbedResponse {
        embeddings: response
            .embeddings
            .iter()
            .map(|embedding| embedding.value.clone())
            .collect(),
        model_usage: None,
    }
}
