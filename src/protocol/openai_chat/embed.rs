use crate::config::ModelDefaults;
use crate::error::CanonicalError;
use crate::protocol::canonical::{EmbedRequest, EmbedResponse};
use crate::protocol::openai_chat::response_decoder::usage_to_canonical;
use crate::protocol::openai_chat::{OpenAiEmbedRequest, OpenAiEmbedResponse};

/// # Errors
///
/// Returns [`CanonicalError::Validation`] when there are no texts or no
/// embedding model is configured.
pub fn encode_openai_embed_request(
    request: &EmbedRequest,
    defaults: &ModelDefaults,
) -> Result<OpenAiEmbedRequest, CanonicalError> {
    let model = request
        .embed_model
        .as_deref()
        .or(defaults.embed_model.as_deref())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| CanonicalError::validation("embedModel", None, "embed model not set"))?;
    if request.texts.is_empty() {
        return Err(CanonicalError::validation("texts", None, "embed texts is empty"));
    }
    Ok(OpenAiEmbedRequest {
        model: model.to_string(),
        input: request.texts.clone(),
    })
}

/// Vectors are ordered by `data[].index`, which is not guaranteed to match
/// array order.
///
/// # Errors
///
/// Returns [`CanonicalError::BackendProtocol`] when the indices are not a
/// permutation of `0..n`.
pub fn decode_openai_embed_response(
    response: &OpenAiEmbedResponse,
) -> Result<EmbedResponse, CanonicalError> {
    let mut data: Vec<_> = response.data.iter().collect();
    data.sort_by_key(|d| d.index);
    if data.iter().enumerate().any(|(position, d)| d.index != position) {
        return Err(CanonicalError::protocol(
            "openai embedding indices are not contiguous",
        ));
    }
    Ok(EmbedResponse {
        embeddings: data.into_iter().map(|d| d.embedding.clone()).collect(),
        model_usage: response.usage.map(usage_to_canonical),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::canonical::{ProviderKind, TokenUsage};
    use serde_json::json;

    #[test]
    fn test_decode_sorts_by_index() {
        let response: OpenAiEmbedResponse = serde_json::from_value(json!({
            "object": "list",
            "model": "text-embedding-ada-002",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.5]},
                {"object": "embedding", "index": 0, "embedding": [0.25]}
            ],
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }))
        .unwrap();
        let decoded = decode_openai_embed_response(&response).unwrap();
        assert_eq!(decoded.embeddings, vec![vec![0.25], vec![0.5]]);
        assert_eq!(
            decoded.model_usage,
            Some(TokenUsage {
                prompt_tokens: 4,
                completion_tokens: 0,
                total_tokens: 4,
            })
        );
    }

    #[test]
    fn test_decode_rejects_gaps() {
        let response: OpenAiEmbedResponse = serde_json::from_value(json!({
            "data": [{"index": 2, "embedding": [0.5]}]
        }))
        .unwrap();
        assert!(matches!(
            decode_openai_embed_response(&response),
            Err(CanonicalError::BackendProtocol(_))
        ));
    }

    #[test]
    fn test_encode_request_model_override() {
        let wire = encode_openai_embed_request(
            &EmbedRequest {
                embed_model: Some("text-embedding-3-small".into()),
                texts: vec!["a".into(), "b".into()],
            },
            &ModelDefaults::for_provider(ProviderKind::OpenAi),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({"model": "text-embedding-3-small", "input": ["a", "b"]})
        );
    }
}
