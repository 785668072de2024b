//! Integration tests for the chat-completions providers
//!
//! Both providers are pointed at a wiremock server; no real endpoint or key
//! is needed.

use dreamteam_engine::config::{AzureOpenAIConfig, OpenAIConfig};
use dreamteam_engine::llm::{
    AzureOpenAIProvider, LLMError, LLMProvider, LLMResponse, Message, OpenAIProvider,
};
use dreamteam_engine::secrets::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn openai(server: &MockServer) -> OpenAIProvider {
    OpenAIProvider::new(
        OpenAIConfig {
            base_url: format!("{}/v1", server.uri()),
            model: "gpt-4o".to_string(),
        },
        SecretString::new("sk-test"),
    )
}

fn azure(server: &MockServer) -> AzureOpenAIProvider {
    AzureOpenAIProvider::new(
        AzureOpenAIConfig {
            endpoint: server.uri(),
            deployment: "team-gpt".to_string(),
            api_version: "2024-06-01".to_string(),
        },
        SecretString::new("azure-test"),
    )
}

#[tokio::test]
async fn test_openai_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hello!")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = openai(&server);
    assert_eq!(provider.name(), "openai");
    assert_eq!(provider.model(), "gpt-4o");

    let reply = provider
        .complete(&[Message::system("be brief"), Message::user("hi")])
        .await
        .unwrap();
    assert_eq!(reply, "Hello!");
}

#[tokio::test]
async fn test_azure_completion_uses_deployment_url_and_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/team-gpt/chat/completions"))
        .and(query_param("api-version", "2024-06-01"))
        .and(header("api-key", "azure-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("From Azure")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = azure(&server);
    assert_eq!(provider.name(), "azure");
    assert_eq!(provider.model(), "team-gpt");
    assert!(provider.check_health().await);

    let reply = provider.complete(&[Message::user("hi")]).await.unwrap();
    assert_eq!(reply, "From Azure");
}

#[tokio::test]
async fn test_generate_detects_tool_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "```json\n{\"function\": \"fetch_url\", \"arguments\": {\"url\": \"https://example.com\"}}\n```",
        )))
        .mount(&server)
        .await;

    let response = openai(&server)
        .generate(&[Message::user("open example.com")])
        .await
        .unwrap();
    match response {
        LLMResponse::ToolCall(call) => {
            assert_eq!(call.name, "fetch_url");
            assert!(call.arguments.contains("https://example.com"));
        }
        other => panic!("expected a tool call, got {:?}", other),
    }
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let cases = [
        (401, "auth"),
        (403, "auth"),
        (429, "rate"),
        (400, "invalid"),
        (503, "unavailable"),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = openai(&server)
            .complete(&[Message::user("hi")])
            .await
            .unwrap_err();
        let matched = match (expected, &err) {
            ("auth", LLMError::AuthenticationFailed(_)) => true,
            ("rate", LLMError::RateLimitExceeded) => true,
            ("invalid", LLMError::InvalidRequest(_)) => true,
            ("unavailable", LLMError::ProviderUnavailable(_)) => true,
            _ => false,
        };
        assert!(matched, "status {} produced {:?}", status, err);
    }
}

#[tokio::test]
async fn test_error_body_is_scrubbed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            "Incorrect API key provided: sk-proj-abcdefghijklmnopqrstuvwxyz",
        ))
        .mount(&server)
        .await;

    let err = openai(&server)
        .complete(&[Message::user("hi")])
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("[REDACTED]"));
    assert!(!text.contains("sk-proj-abcdefghijklmnopqrstuvwxyz"));
}

#[tokio::test]
async fn test_response_without_choices_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = azure(&server)
        .complete(&[Message::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, LLMError::ParseError(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let provider = OpenAIProvider::new(
        OpenAIConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            model: "gpt-4o".to_string(),
        },
        SecretString::new("sk-test"),
    );

    let err = provider.complete(&[Message::user("hi")]).await.unwrap_err();
    assert!(matches!(err, LLMError::NetworkError(_)));
}
