mod harness;

use council_llm::probe::{PROBE_KEYWORD, needs_system_downgrade};
use council_llm::{GenerateRequest, GenerateResponse, Provider, Turn, build_provider, test_connection};
use futures_util::StreamExt;
use harness::config::ConfigBuilder;
use harness::mock_llm::MockLlm;
use tempfile::TempDir;

fn binding(kind: &str, base_url: &str) -> council_config::LlmProviderConfig {
    let dir = TempDir::new().unwrap();
    let builder = ConfigBuilder::new(dir.path());
    let builder = match kind {
        "anthropic" => builder.anthropic("main", base_url),
        _ => builder.openai("main", base_url),
    };
    let mut config = builder.default_provider("main").build().unwrap();
    config.llm.providers.shift_remove("main").unwrap()
}

#[tokio::test]
async fn probe_keeps_system_role_when_keyword_echoed() {
    let mock = MockLlm::start_with_response(PROBE_KEYWORD).await.unwrap();

    assert!(!needs_system_downgrade("main", &binding("openai", &mock.base_url())).await);

    let sent = &mock.requests()[0];
    assert_eq!(sent["messages"][0]["role"], "system");
    assert_eq!(sent["max_tokens"], 30);
}

#[tokio::test]
async fn probe_downgrades_when_keyword_missing() {
    let mock = MockLlm::start_with_response("Sure, how can I help?").await.unwrap();

    assert!(needs_system_downgrade("main", &binding("openai", &mock.base_url())).await);
}

#[tokio::test]
async fn probe_downgrades_on_rejected_request() {
    let mock = MockLlm::start_failing(1, PROBE_KEYWORD).await.unwrap();

    assert!(needs_system_downgrade("main", &binding("openai", &mock.base_url())).await);
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn probe_skips_anthropic_bindings() {
    let mock = MockLlm::start().await.unwrap();

    assert!(!needs_system_downgrade("main", &binding("anthropic", &mock.base_url())).await);
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn connection_test_reports_backend_state() {
    let healthy = MockLlm::start().await.unwrap();
    let provider = build_provider("main", &binding("openai", &healthy.base_url()), false);
    test_connection(provider.as_ref()).await.unwrap();
    assert_eq!(healthy.requests()[0]["max_tokens"], 1);

    let broken = MockLlm::start_failing(1, "unused").await.unwrap();
    let provider = build_provider("main", &binding("anthropic", &broken.base_url()), false);
    assert!(test_connection(provider.as_ref()).await.is_err());
}

#[tokio::test]
async fn system_role_is_folded_into_first_user_turn() {
    let mock = MockLlm::start().await.unwrap();
    let provider = build_provider("main", &binding("openai", &mock.base_url()), true);

    let request = GenerateRequest {
        turns: vec![Turn::user_text("茅台怎么看？")],
        system_instruction: Some("你是技术分析师。".into()),
        ..GenerateRequest::default()
    };
    provider.generate(&request).await.unwrap();

    let messages = mock.requests()[0]["messages"].as_array().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    let content = messages[0]["content"].as_str().unwrap();
    assert!(content.contains("你是技术分析师。"));
    assert!(content.contains("茅台怎么看？"));
}

#[tokio::test]
async fn anthropic_stream_ends_with_the_full_reply() {
    let reply = "资金持续流入，主力在低位吸筹。";
    let mock = MockLlm::start_with_response(reply).await.unwrap();
    let provider = build_provider("main", &binding("anthropic", &mock.base_url()), false);

    let request = GenerateRequest {
        turns: vec![Turn::user_text("资金面如何？")],
        ..GenerateRequest::default()
    };
    let mut stream = provider.generate_content(&request, true).await.unwrap();

    let mut streamed = String::new();
    let mut last = None;
    while let Some(item) = stream.next().await {
        match item.unwrap() {
            GenerateResponse::Partial(council_llm::Delta::Text(text)) => streamed.push_str(&text),
            GenerateResponse::Partial(_) => {}
            GenerateResponse::Final(aggregate) => last = Some(aggregate),
        }
    }

    assert_eq!(streamed, reply);
    let aggregate = last.expect("stream ends with a final response");
    assert_eq!(aggregate.text(), reply);
    assert_eq!(mock.stream_count(), 1);
}
