use toolify_canon::config::{load_config, parse_config, ConfigError};
use toolify_canon::protocol::canonical::ProviderKind;
use toolify_canon::{Provider, SessionMemory};

#[test]
fn test_example_config_builds_every_provider() {
    let config = load_config("config.example.yaml").expect("example config");
    assert_eq!(config.log_level, "INFO");
    let kinds: Vec<_> = config
        .providers
        .iter()
        .map(|entry| Provider::from_config(entry).expect("provider").kind())
        .collect();
    assert_eq!(
        kinds,
        [ProviderKind::Anthropic, ProviderKind::Gemini, ProviderKind::OpenAi]
    );
    let memory = SessionMemory::from_config(&config.memory).expect("memory");
    assert_eq!(memory.limit(), 50);

    let gemini = config.provider("gemini").expect("gemini entry");
    let settings = gemini.safety_settings.as_ref().expect("safety settings");
    assert_eq!(settings[0].threshold, "BLOCK_ONLY_HIGH");
}

#[test]
fn test_missing_file_is_io_error() {
    assert!(matches!(
        load_config("does-not-exist.yaml"),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn test_malformed_yaml_is_yaml_error() {
    assert!(matches!(
        parse_config("providers: [unterminated"),
        Err(ConfigError::Yaml(_))
    ));
    assert!(matches!(
        parse_config("providers:\n  - name: x\n    provider: mistral\n    api_key: k\n"),
        Err(ConfigError::Yaml(_))
    ));
}

#[test]
fn test_semantic_errors_are_validation_errors() {
    let err = parse_config(
        r"
memory:
  limit: 0
providers:
  - name: main
    provider: openai
    api_key: sk-test
",
    )
    .expect_err("zero limit");
    assert!(matches!(err, ConfigError::Validation(_)));

    let err = parse_config(
        r"
providers:
  - name: main
    provider: anthropic
    api_key: sk-test
    base_url: ftp://example.com
",
    )
    .expect_err("bad scheme");
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn test_request_overrides_beat_configured_defaults() {
    let config = parse_config(
        r"
providers:
  - name: main
    provider: openai
    api_key: sk-test
    defaults:
      model: gpt-4o-mini
      max_tokens: 256
      temperature: 0.2
",
    )
    .expect("config");
    let provider = Provider::from_config(&config.providers[0]).expect("provider");
    let request = toolify_canon::protocol::canonical::ChatRequest {
        chat_prompt: vec![toolify_canon::protocol::canonical::ChatTurn::user("hi")],
        model_config: Some(toolify_canon::protocol::canonical::ModelConfig {
            temperature: Some(0.9),
            ..Default::default()
        }),
        ..Default::default()
    };
    let (endpoint, body) = provider.encode_chat_request(&request).expect("encode");
    assert!(!endpoint.stream);
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["max_tokens"], 256);
    assert_eq!(body["temperature"], 0.9);
}
