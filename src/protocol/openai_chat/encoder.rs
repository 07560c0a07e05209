use crate::config::ModelDefaults;
use crate::error::CanonicalError;
use crate::protocol::canonical::{
    ChatRequest, ChatTurn, FunctionCall, FunctionCallMode, FunctionSpec,
};
use crate::protocol::mapping::canonical_role_to_openai;
use crate::protocol::openai_chat::{
    OpenAiChatRequest, OpenAiContent, OpenAiMessage, OpenAiStop, OpenAiStreamOptions, OpenAiTool,
    OpenAiToolCall, OpenAiToolCallFunction, OpenAiToolChoice, OpenAiToolChoiceFunction,
    OpenAiToolChoiceFunctionCall, OpenAiToolFunction,
};
use crate::protocol::validate::{resolve_stream, validate_chat_prompt};

/// Encode a canonical request into the `OpenAI` Chat Completions wire format.
///
/// # Errors
///
/// Returns [`CanonicalError::Validation`] when the prompt fails the shared
/// preconditions.
pub fn encode_openai_chat_request(
    request: &ChatRequest,
    defaults: &ModelDefaults,
) -> Result<OpenAiChatRequest, CanonicalError> {
    validate_chat_prompt(&request.chat_prompt)?;
    let config = defaults.generation.resolve(request.model_config.as_ref());
    if config.top_k.is_some() {
        tracing::trace!("openai has no top_k, dropping it");
    }

    let messages = request.chat_prompt.iter().map(encode_turn).collect();

    // --- tools ---
    let tools = if request.functions.is_empty() {
        None
    } else {
        Some(request.functions.iter().map(encode_tool).collect())
    };
    let tool_choice = if request.functions.is_empty() {
        None
    } else {
        request.function_call.as_ref().map(encode_tool_choice)
    };

    let stream = resolve_stream(request, &defaults.generation);

    Ok(OpenAiChatRequest {
        model: request
            .model
            .clone()
            .unwrap_or_else(|| defaults.model.clone()),
        messages,
        tools,
        tool_choice,
        stream: stream.then_some(true),
        stream_options: stream.then_some(OpenAiStreamOptions {
            include_usage: Some(true),
        }),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        top_p: config.top_p,
        stop: config.stop_sequences.map(OpenAiStop::Multi),
    })
}

fn encode_turn(turn: &ChatTurn) -> OpenAiMessage {
    let role = canonical_role_to_openai(turn.role()).to_string();
    match turn {
        ChatTurn::System { content } => OpenAiMessage {
            role,
            content: Some(OpenAiContent::Text(content.clone())),
            name: None,
            tool_calls: None,
            tool_call_id: None,
            refusal: None,
        },
        ChatTurn::User { content, name } => OpenAiMessage {
            role,
            content: Some(OpenAiContent::Text(content.clone())),
            name: name.clone(),
            tool_calls: None,
            tool_call_id: None,
            refusal: None,
        },
        ChatTurn::Assistant {
            content,
            name,
            function_calls,
        } => OpenAiMessage {
            role,
            content: content.clone().map(OpenAiContent::Text),
            name: name.clone(),
            tool_calls: if function_calls.is_empty() {
                None
            } else {
                Some(function_calls.iter().map(encode_tool_call).collect())
            },
            tool_call_id: None,
            refusal: None,
        },
        ChatTurn::Function {
            content,
            function_id,
        } => OpenAiMessage {
            role,
            content: Some(OpenAiContent::Text(content.clone())),
            name: None,
            tool_calls: None,
            tool_call_id: Some(function_id.clone()),
            refusal: None,
        },
    }
}

fn encode_tool_call(call: &FunctionCall) -> OpenAiToolCall {
    let arguments = if call.function.arguments.is_empty() {
        "{}".to_string()
    } else {
        call.function.arguments.to_json_string()
    };
    OpenAiToolCall {
        id: call.id.clone(),
        type_: "function".to_string(),
        function: OpenAiToolCallFunction {
            name: call.function.name.clone(),
            arguments,
        },
    }
}

fn encode_tool(spec: &FunctionSpec) -> OpenAiTool {
    OpenAiTool {
        type_: "function".to_string(),
        function: OpenAiToolFunction {
            name: spec.name.clone(),
            description: Some(spec.description.clone()).filter(|d| !d.is_empty()),
            parameters: spec.parameters.clone(),
        },
    }
}

fn encode_tool_choice(mode: &FunctionCallMode) -> OpenAiToolChoice {
    match mode {
        FunctionCallMode::None => OpenAiToolChoice::Mode("none".to_string()),
        FunctionCallMode::Auto => OpenAiToolChoice::Mode("auto".to_string()),
        FunctionCallMode::Required => OpenAiToolChoice::Mode("required".to_string()),
        FunctionCallMode::Function(name) => {
            OpenAiToolChoice::Function(OpenAiToolChoiceFunctionCall {
                type_: "function".to_string(),
                function: OpenAiToolChoiceFunction { name: name.clone() },
            })
        }
    }
}
