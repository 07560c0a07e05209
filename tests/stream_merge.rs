use serde_json::json;
use toolify_canon::config::ProviderConfig;
use toolify_canon::protocol::canonical::{
    FinishReason, FunctionArguments, FunctionCallDelta, ProviderKind,
};
use toolify_canon::stream::{parse_sse_frame, FunctionCallMerger, SseParser};
use toolify_canon::{CanonicalError, Provider, StreamAccumulator};

fn provider(kind: ProviderKind) -> Provider {
    Provider::from_config(&ProviderConfig {
        name: kind.to_string(),
        provider: kind,
        api_key: "sk-test".to_string(),
        base_url: None,
        defaults: None,
        safety_settings: None,
    })
    .expect("provider")
}

fn named(id: &str, name: &str) -> FunctionCallDelta {
    FunctionCallDelta {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

fn args(id: &str, raw: &str) -> FunctionCallDelta {
    FunctionCallDelta {
        id: Some(id.to_string()),
        arguments: Some(FunctionArguments::Raw(raw.to_string())),
        ..Default::default()
    }
}

#[test]
fn test_name_fragments_for_one_id_concatenate() {
    let mut merger = FunctionCallMerger::new();
    assert!(merger.merge(&[named("x", "get_")]).is_none());
    assert!(merger.merge(&[named("x", "weather")]).is_none());
    assert_eq!(merger.calls().len(), 1);
    assert_eq!(merger.calls()[0].function.name, "get_weather");
}

#[test]
fn test_previous_call_is_finalized_exactly_once_on_id_change() {
    let mut merger = FunctionCallMerger::new();
    let steps = [
        vec![named("a", "lookup"), args("a", "{\"q\":")],
        vec![args("a", "1}")],
        vec![named("b", "fetch")],
        vec![args("b", "{}")],
    ];
    let finalized: Vec<_> = steps.iter().map(|step| merger.merge(step)).collect();

    assert!(finalized[0].is_none());
    assert!(finalized[1].is_none());
    let a = finalized[2].as_ref().expect("a finalized at step 3");
    assert_eq!(a.id, "a");
    assert_eq!(a.function.arguments.to_value().expect("json"), serde_json::json!({"q": 1}));
    assert!(finalized[3].is_none());

    // The last call is only reachable through the explicit flush.
    assert_eq!(merger.pending().map(|c| c.id.as_str()), Some("b"));
    let ids: Vec<_> = merger.into_calls().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, ["a", "b"]);
}

#[test]
fn test_merged_ids_are_never_duplicated() {
    let mut merger = FunctionCallMerger::new();
    for step in [named("a", "f"), named("b", "g"), named("a", ""), named("b", "")] {
        merger.merge(&[step]);
    }
    let mut ids: Vec<_> = merger.calls().iter().map(|c| c.id.clone()).collect();
    ids.dedup();
    assert_eq!(ids.len(), 2);
}

#[test]
fn test_openai_stream_split_across_network_chunks() {
    let provider = provider(ProviderKind::OpenAi);

    let body = concat!(
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Checking\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"type\":\"function\",\"function\":{\"name\":\"get_\",\"arguments\":\"\"}}]}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"name\":\"weather\",\"arguments\":\"{\\\"city\\\":\\\"SF\\\"}\"}}]}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":1,\"id\":\"call_b\",\"type\":\"function\",\"function\":{\"name\":\"get_time\",\"arguments\":\"{}\"}}]}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":4,\"total_tokens\":13}}\n\n",
        "data: [DONE]\n\n",
    );

    let mut parser = SseParser::new();
    let mut accumulator = StreamAccumulator::new();
    let mut finalized = Vec::new();
    let bytes = body.as_bytes();
    for piece in bytes.chunks(37) {
        let text = std::str::from_utf8(piece).expect("ascii body");
        for frame in parser.feed(text) {
            let chunk = provider.decode_stream_event(&frame).expect("decode");
            finalized.extend(accumulator.push(chunk).expect("push"));
        }
    }
    assert!(accumulator.is_done());
    assert_eq!(finalized.len(), 1);
    assert_eq!(finalized[0].function.name, "get_weather");

    let response = accumulator.finish();
    let result = &response.results[0];
    assert_eq!(result.content.as_deref(), Some("Checking"));
    assert_eq!(result.function_calls.len(), 2);
    assert_eq!(result.function_calls[1].id, "call_b");
    assert_eq!(response.model_usage.map(|u| u.total_tokens), Some(13));
}

#[test]
fn test_single_frame_helper_handles_unterminated_input() {
    let frame = parse_sse_frame("event: ping\ndata: {\"type\":\"ping\"}").expect("frame");
    assert_eq!(frame.event.as_deref(), Some("ping"));
    assert!(parse_sse_frame(": comment only\n\n").is_none());
}

#[test]
fn test_gemini_parallel_calls_to_one_function_stay_separate() {
    let body = concat!(
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[",
        "{\"functionCall\":{\"name\":\"get_weather\",\"args\":{\"city\":\"SF\"}}},",
        "{\"functionCall\":{\"name\":\"get_weather\",\"args\":{\"city\":\"NY\"}}}",
        "]},\"index\":0}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[",
        "{\"functionCall\":{\"name\":\"get_weather\",\"args\":{\"city\":\"LA\"}}}",
        "]},\"finishReason\":\"STOP\",\"index\":0}]}\n\n",
    );
    let response = provider(ProviderKind::Gemini)
        .decode_stream(body, None)
        .expect("decode stream");
    let calls = &response.results[0].function_calls;
    let names: Vec<_> = calls.iter().map(|c| c.function.name.as_str()).collect();
    assert_eq!(names, ["get_weather", "get_weather", "get_weather"]);
    let cities: Vec<_> = calls
        .iter()
        .map(|c| c.function.arguments.to_value().expect("json")["city"].clone())
        .collect();
    assert_eq!(cities, [json!("SF"), json!("NY"), json!("LA")]);
    assert_eq!(response.results[0].finish_reason, Some(FinishReason::FunctionCall));
}

#[test]
fn test_out_of_range_choice_index_is_a_protocol_error() {
    let body = concat!(
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"ok\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":4294967295,\"delta\":{\"content\":\"x\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    let err = provider(ProviderKind::OpenAi)
        .decode_stream(body, None)
        .expect_err("runaway index");
    assert!(matches!(err, CanonicalError::BackendProtocol(_)), "{err:?}");
}
