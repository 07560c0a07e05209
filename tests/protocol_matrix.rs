use serde_json::json;
use toolify_canon::config::ProviderConfig;
use toolify_canon::protocol::canonical::{
    CanonicalRole, ChatRequest, ChatTurn, FunctionArguments, FunctionCall, FunctionCallMode,
    FunctionSpec, ModelConfig, ProviderKind,
};
use toolify_canon::{CanonicalError, Provider};

const ALL_PROVIDERS: [ProviderKind; 3] = [
    ProviderKind::Anthropic,
    ProviderKind::Gemini,
    ProviderKind::OpenAi,
];

fn provider(kind: ProviderKind) -> Provider {
    Provider::from_config(&ProviderConfig {
        name: kind.to_string(),
        provider: kind,
        api_key: "test-key".to_string(),
        base_url: None,
        defaults: None,
        safety_settings: None,
    })
    .expect("provider")
}

fn weather_request() -> ChatRequest {
    ChatRequest {
        model: Some("matrix-model".to_string()),
        chat_prompt: vec![
            ChatTurn::system("You are helpful."),
            ChatTurn::user("What's the weather in SF?"),
            ChatTurn::Assistant {
                content: Some("Let me check.".to_string()),
                name: None,
                function_calls: vec![FunctionCall::new(
                    "call_1",
                    "get_weather",
                    FunctionArguments::Raw("{\"city\":\"SF\"}".to_string()),
                )],
            },
            ChatTurn::function_result("call_1", "{\"temp\":72}"),
        ],
        functions: vec![FunctionSpec {
            name: "get_weather".to_string(),
            description: "Get weather".to_string(),
            parameters: Some(json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            })),
        }],
        function_call: Some(FunctionCallMode::Auto),
        model_config: None,
        session_id: None,
    }
}

fn non_function_turns(turns: &[ChatTurn]) -> Vec<(CanonicalRole, Option<String>)> {
    turns
        .iter()
        .filter(|turn| turn.role() != CanonicalRole::Function)
        .map(|turn| (turn.role(), turn.content().map(str::to_string)))
        .collect()
}

#[test]
fn test_round_trip_preserves_roles_and_content() {
    let request = weather_request();
    let expected = non_function_turns(&request.chat_prompt);
    for kind in ALL_PROVIDERS {
        let provider = provider(kind);
        let (_, body) = provider.encode_chat_request(&request).expect("encode");
        let turns = provider.decode_chat_request(&body).expect("decode");
        assert_eq!(non_function_turns(&turns), expected, "{kind}");

        let calls = turns
            .iter()
            .find_map(|turn| match turn {
                ChatTurn::Assistant { function_calls, .. } if !function_calls.is_empty() => {
                    Some(function_calls.clone())
                }
                _ => None,
            })
            .unwrap_or_else(|| panic!("{kind}: assistant call lost"));
        assert_eq!(calls[0].function.name, "get_weather", "{kind}");
        assert_eq!(
            calls[0].function.arguments.to_value().expect("arguments"),
            json!({"city": "SF"}),
            "{kind}"
        );
        assert!(
            turns.iter().any(|turn| turn.role() == CanonicalRole::Function),
            "{kind}: function result lost"
        );
    }
}

#[test]
fn test_empty_prompt_is_rejected_by_every_backend() {
    let request = ChatRequest::default();
    for kind in ALL_PROVIDERS {
        let err = provider(kind)
            .encode_chat_request(&request)
            .expect_err("empty prompt");
        assert!(
            matches!(err, CanonicalError::Validation { .. }),
            "{kind}: {err:?}"
        );
    }
}

#[test]
fn test_empty_user_content_is_rejected_by_every_backend() {
    let request = ChatRequest {
        chat_prompt: vec![ChatTurn::system("sys"), ChatTurn::user("")],
        ..Default::default()
    };
    for kind in ALL_PROVIDERS {
        let err = provider(kind)
            .encode_chat_request(&request)
            .expect_err("empty user content");
        match err {
            CanonicalError::Validation { index, .. } => assert_eq!(index, Some(1), "{kind}"),
            other => panic!("{kind}: expected validation error, got {other:?}"),
        }
    }
}

#[test]
fn test_empty_function_id_is_rejected_by_every_backend() {
    let request = ChatRequest {
        chat_prompt: vec![ChatTurn::user("hi"), ChatTurn::function_result("", "42")],
        ..Default::default()
    };
    for kind in ALL_PROVIDERS {
        let err = provider(kind)
            .encode_chat_request(&request)
            .expect_err("empty function id");
        assert!(
            matches!(err, CanonicalError::Validation { index: Some(1), .. }),
            "{kind}: {err:?}"
        );
    }
}

#[test]
fn test_stream_flag_selects_endpoint() {
    let mut request = weather_request();
    request.model_config = Some(ModelConfig {
        stream: Some(true),
        ..Default::default()
    });

    let (endpoint, body) = provider(ProviderKind::OpenAi)
        .encode_chat_request(&request)
        .expect("openai");
    assert!(endpoint.stream);
    assert_eq!(endpoint.url.as_str(), "https://api.openai.com/v1/chat/completions");
    assert_eq!(body["stream"], true);
    assert_eq!(body["stream_options"]["include_usage"], true);

    let (endpoint, body) = provider(ProviderKind::Anthropic)
        .encode_chat_request(&request)
        .expect("anthropic");
    assert!(endpoint.stream);
    assert_eq!(endpoint.url.as_str(), "https://api.anthropic.com/v1/messages");
    assert_eq!(body["stream"], true);
    assert_eq!(body["system"], "You are helpful.");

    let (endpoint, body) = provider(ProviderKind::Gemini)
        .encode_chat_request(&request)
        .expect("gemini");
    assert!(endpoint.stream);
    assert_eq!(
        endpoint.url.as_str(),
        "https://generativelanguage.googleapis.com/v1beta/models/matrix-model:streamGenerateContent?alt=sse&key=test-key"
    );
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are helpful.");
}

#[test]
fn test_non_streaming_gemini_uses_generate_content() {
    let (endpoint, _) = provider(ProviderKind::Gemini)
        .encode_chat_request(&weather_request())
        .expect("gemini");
    assert!(!endpoint.stream);
    assert_eq!(
        endpoint.url.as_str(),
        "https://generativelanguage.googleapis.com/v1beta/models/matrix-model:generateContent?key=test-key"
    );
}

#[test]
fn test_content_policy_is_a_hard_failure() {
    let anthropic = provider(ProviderKind::Anthropic).decode_chat_response(
        json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude",
            "content": [],
            "stop_reason": "refusal",
            "usage": {"input_tokens": 1, "output_tokens": 0}
        })
        .to_string()
        .as_bytes(),
        None,
    );
    assert!(matches!(anthropic, Err(CanonicalError::ContentPolicy { .. })));

    let gemini = provider(ProviderKind::Gemini).decode_chat_response(
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": []},
                "finishReason": "SAFETY",
                "index": 0
            }]
        })
        .to_string()
        .as_bytes(),
        None,
    );
    assert!(matches!(gemini, Err(CanonicalError::ContentPolicy { .. })));

    let blocked = provider(ProviderKind::Gemini).decode_chat_response(
        br#"{"promptFeedback":{"blockReason":"SAFETY"}}"#,
        None,
    );
    assert!(matches!(blocked, Err(CanonicalError::ContentPolicy { .. })));
}

#[test]
fn test_absent_usage_stays_absent() {
    let response = provider(ProviderKind::OpenAi)
        .decode_chat_response(
            json!({
                "id": "chatcmpl-1",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "hi"},
                    "finish_reason": "stop"
                }]
            })
            .to_string()
            .as_bytes(),
            None,
        )
        .expect("decode");
    assert!(response.model_usage.is_none());
    assert_eq!(response.results[0].content.as_deref(), Some("hi"));
}

#[test]
fn test_gemini_call_ids_survive_the_tool_loop() {
    let gemini = provider(ProviderKind::Gemini);
    let response = gemini
        .decode_chat_response(
            json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [
                        {"functionCall": {"id": "fc_2", "name": "get_time", "args": {}}}
                    ]},
                    "finishReason": "STOP"
                }]
            })
            .to_string()
            .as_bytes(),
            None,
        )
        .expect("decode");
    let calls = response.results[0].function_calls.clone();
    assert_eq!(calls[0].id, "fc_2");

    let request = ChatRequest {
        chat_prompt: vec![
            ChatTurn::user("What time is it?"),
            ChatTurn::Assistant {
                content: None,
                name: None,
                function_calls: calls,
            },
            ChatTurn::function_result("fc_2", "noon"),
        ],
        ..Default::default()
    };
    let (_, body) = gemini.encode_chat_request(&request).expect("encode");
    assert_eq!(
        body["contents"][1]["parts"][0]["functionCall"],
        json!({"id": "fc_2", "name": "get_time", "args": {}})
    );
    assert_eq!(
        body["contents"][2]["parts"][0]["functionResponse"],
        json!({"id": "fc_2", "name": "get_time", "response": {"result": "noon"}})
    );

    let turns = gemini.decode_chat_request(&body).expect("decode request");
    assert_eq!(turns.last(), Some(&ChatTurn::function_result("fc_2", "noon")));
}

#[test]
fn test_gemini_tool_choice_needs_declared_functions() {
    let request = ChatRequest {
        chat_prompt: vec![ChatTurn::user("hi")],
        function_call: Some(FunctionCallMode::Required),
        ..Default::default()
    };
    for kind in ALL_PROVIDERS {
        let (_, body) = provider(kind).encode_chat_request(&request).expect("encode");
        assert!(body.get("toolConfig").is_none(), "{kind}");
        assert!(body.get("tool_choice").is_none(), "{kind}");
    }
}
