// tests/provider_send.rs
// Provider adapter integration tests against mocked backends.

use fabula::config::{
    ClaudeConfig, InstructTemplate, KoboldCppConfig, ProviderConfig, SamplerSettings,
};
use fabula::provider::{send_message, ChatMessage, SendMessageOptions};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn kobold_options(base_url: String) -> SendMessageOptions {
    SendMessageOptions {
        system_context: "sys".to_string(),
        messages: vec![ChatMessage::user("hi")],
        provider_type: "koboldcpp".to_string(),
        provider_config: ProviderConfig::KoboldCpp(KoboldCppConfig {
            base_url,
            api_key: None,
        }),
        samplers: None,
        instruct: None,
    }
}

fn claude_options(base_url: String) -> SendMessageOptions {
    SendMessageOptions {
        system_context: "sys".to_string(),
        messages: vec![ChatMessage::user("hi")],
        provider_type: "claude".to_string(),
        provider_config: ProviderConfig::Claude(ClaudeConfig {
            base_url,
            api_key: "".to_string(),
            model: "m".to_string(),
        }),
        samplers: None,
        instruct: None,
    }
}

#[tokio::test]
async fn koboldcpp_success_returns_trimmed_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/generate"))
        .and(body_partial_json(json!({ "prompt": "sys\nUser: hi" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "results": [{ "text": "  hello  " }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = send_message(&kobold_options(server.uri())).await;
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.content, "hello");
}

#[tokio::test]
async fn koboldcpp_flattens_with_instruct_sequences() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/generate"))
        .and(body_partial_json(
            json!({ "prompt": "sys\n<|user|>\nhi<|end|>\n<|assistant|>" }),
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "results": [{ "text": "ok" }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut options = kobold_options(server.uri());
    options.instruct = Some(InstructTemplate {
        input_sequence: "<|user|>".to_string(),
        input_suffix: "<|end|>".to_string(),
        output_sequence: "<|assistant|>".to_string(),
        ..Default::default()
    });

    let outcome = send_message(&options).await;
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.content, "ok");
}

#[tokio::test]
async fn koboldcpp_forwards_samplers_without_the_name_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/generate"))
        .and(body_partial_json(json!({ "max_length": 200, "temp": 0.7 })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "results": [{ "text": "ok" }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut options = kobold_options(server.uri());
    options.samplers = Some(SamplerSettings {
        name: "my preset".to_string(),
        max_length: Some(200),
        temp: Some(0.7),
        ..Default::default()
    });

    let outcome = send_message(&options).await;
    assert_eq!(outcome.error, None);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("name").is_none());
    assert!(body.get("top_p").is_none());
}

#[tokio::test]
async fn koboldcpp_sends_bearer_auth_when_key_is_set() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/generate"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "results": [{ "text": "ok" }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut options = kobold_options(server.uri());
    options.provider_config = ProviderConfig::KoboldCpp(KoboldCppConfig {
        base_url: server.uri(),
        api_key: Some("secret".to_string()),
    });

    let outcome = send_message(&options).await;
    assert_eq!(outcome.error, None);
}

#[tokio::test]
async fn koboldcpp_surfaces_status_and_body_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("out of memory"))
        .mount(&server)
        .await;

    let outcome = send_message(&kobold_options(server.uri())).await;
    assert_eq!(outcome.content, "");
    assert_eq!(
        outcome.error.as_deref(),
        Some("koboldcpp error 500: out of memory")
    );
}

#[tokio::test]
async fn claude_success_extracts_first_content_block() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "m",
            "system": "sys",
            "max_tokens": 4096,
            "messages": [{ "role": "user", "content": "hi" }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({ "content": [{ "type": "text", "text": "Hello!" }] }),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = send_message(&claude_options(server.uri())).await;
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.content, "Hello!");
}

#[tokio::test]
async fn claude_maps_samplers_into_api_names() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({
            "max_tokens": 512,
            "temperature": 0.8,
            "top_p": 0.9,
            "top_k": 40,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({ "content": [{ "type": "text", "text": "ok" }] }),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut options = claude_options(server.uri());
    options.samplers = Some(SamplerSettings {
        max_length: Some(512),
        temp: Some(0.8),
        top_p: Some(0.9),
        top_k: Some(40),
        ..Default::default()
    });

    let outcome = send_message(&options).await;
    assert_eq!(outcome.error, None);
}

#[tokio::test]
async fn claude_auth_failure_yields_error_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let outcome = send_message(&claude_options(server.uri())).await;
    assert_eq!(outcome.content, "");
    assert_eq!(
        outcome.error.as_deref(),
        Some("claude error 401: invalid x-api-key")
    );
}

#[tokio::test]
async fn unknown_provider_fails_without_any_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut options = kobold_options(server.uri());
    options.provider_type = "foo".to_string();

    let outcome = send_message(&options).await;
    assert_eq!(outcome.content, "");
    assert_eq!(outcome.error.as_deref(), Some("unknown provider: foo"));
}

#[tokio::test]
async fn mismatched_config_shape_fails_without_any_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut options = kobold_options(server.uri());
    options.provider_type = "claude".to_string();

    let outcome = send_message(&options).await;
    assert_eq!(outcome.content, "");
    assert_eq!(
        outcome.error.as_deref(),
        Some("provider config does not match provider type: claude")
    );
}
