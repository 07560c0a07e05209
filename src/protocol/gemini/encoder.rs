use rustc_hash::FxHashMap;

use crate::config::{ModelDefaults, SafetySetting};
use crate::error::CanonicalError;
use crate::protocol::canonical::{ChatRequest, ChatTurn, FunctionCallMode, FunctionSpec};
use crate::protocol::gemini::{
    GeminiContent, GeminiFunctionCall, GeminiFunctionCallingConfig, GeminiFunctionDeclaration,
    GeminiFunctionResponse, GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiToolConfig,
    GeminiToolDeclaration,
};
use crate::protocol::mapping::canonical_role_to_gemini;
use crate::protocol::validate::{
    joined_system_prompt, resolve_stream, structured_arguments, validate_chat_prompt,
};

/// An encoded request plus the routing facts the endpoint needs.
#[derive(Debug, Clone)]
pub struct EncodedGeminiRequest {
    pub model: String,
    pub stream: bool,
    pub request: GeminiRequest,
}

/// Encode a canonical request into the Gemini `generateContent` wire format.
///
/// # Errors
///
/// Returns [`CanonicalError::Validation`] when the prompt fails the shared
/// preconditions or an assistant call carries unparsable arguments.
pub fn encode_gemini_request(
    request: &ChatRequest,
    defaults: &ModelDefaults,
    safety_settings: &[SafetySetting],
) -> Result<EncodedGeminiRequest, CanonicalError> {
    validate_chat_prompt(&request.chat_prompt)?;
    let config = defaults.generation.resolve(request.model_config.as_ref());

    // --- systemInstruction ---
    let system_instruction = joined_system_prompt(&request.chat_prompt).map(|text| GeminiContent {
        role: Some("user".to_string()),
        parts: vec![GeminiPart::text(text)],
    });

    // --- contents ---
    // Call id -> function name, so a function result can name its function.
    let mut call_names: FxHashMap<&str, &str> = FxHashMap::default();
    let mut contents = Vec::with_capacity(request.chat_prompt.len());
    for (index, turn) in request.chat_prompt.iter().enumerate() {
        let parts = match turn {
            ChatTurn::System { .. } => continue,
            ChatTurn::User { content, .. } => vec![GeminiPart::text(content.clone())],
            ChatTurn::Assistant {
                content,
                function_calls,
                ..
            } => {
                let mut parts = Vec::with_capacity(function_calls.len() + 1);
                if let Some(text) = content.as_deref().filter(|t| !t.is_empty()) {
                    parts.push(GeminiPart::text(text));
                }
                for call in function_calls {
                    call_names.insert(&call.id, &call.function.name);
                    parts.push(GeminiPart {
                        function_call: Some(GeminiFunctionCall {
                            id: wire_id(&call.id, &call.function.name),
                            name: call.function.name.clone(),
                            args: structured_arguments(call, index)?,
                        }),
                        ..Default::default()
                    });
                }
                parts
            }
            ChatTurn::Function {
                content,
                function_id,
            } => {
                let name = call_names
                    .get(function_id.as_str())
                    .copied()
                    .unwrap_or(function_id.as_str());
                vec![GeminiPart {
                    function_response: Some(GeminiFunctionResponse {
                        id: wire_id(function_id, name),
                        name: name.to_string(),
                        response: serde_json::json!({ "result": content }),
                    }),
                    ..Default::default()
                }]
            }
        };
        contents.push(GeminiContent {
            role: Some(canonical_role_to_gemini(turn.role()).to_string()),
            parts,
        });
    }

    // --- tools ---
    let tools = if request.functions.is_empty() {
        None
    } else {
        Some(vec![GeminiToolDeclaration {
            function_declarations: request.functions.iter().map(encode_function).collect(),
        }])
    };

    let generation_config = GeminiGenerationConfig {
        max_output_tokens: config.max_tokens,
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: config.top_k,
        candidate_count: Some(1),
        stop_sequences: config.stop_sequences,
    };

    Ok(EncodedGeminiRequest {
        model: request
            .model
            .clone()
            .unwrap_or_else(|| defaults.model.clone()),
        stream: resolve_stream(request, &defaults.generation),
        request: GeminiRequest {
            contents,
            tools,
            tool_config: request
                .function_call
                .as_ref()
                .filter(|_| !request.functions.is_empty())
                .map(encode_tool_config),
            system_instruction,
            generation_config: Some(generation_config),
            safety_settings: safety_settings.to_vec(),
        },
    })
}

/// Ids equal to the function name were derived from it and are not sent.
fn wire_id(id: &str, name: &str) -> Option<String> {
    (id != name).then(|| id.to_string())
}

fn encode_function(spec: &FunctionSpec) -> GeminiFunctionDeclaration {
    GeminiFunctionDeclaration {
        name: spec.name.clone(),
        description: Some(spec.description.clone()).filter(|d| !d.is_empty()),
        parameters: spec.parameters.clone(),
    }
}

fn encode_tool_config(mode: &FunctionCallMode) -> GeminiToolConfig {
    let (mode, allowed_function_names) = match mode {
        FunctionCallMode::None => ("NONE", None),
        FunctionCallMode::Auto => ("AUTO", None),
        FunctionCallMode::Required => ("ANY", None),
        FunctionCallMode::Function(name) => ("ANY", Some(vec![name.clone()])),
    };
    GeminiToolConfig {
        function_calling_config: Some(GeminiFunctionCallingConfig {
            mode: mode.to_string(),
            allowed_function_names,
        }),
    }
}
