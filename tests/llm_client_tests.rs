//! # LLM Client Tests
//!
//! The OpenAI-compatible client against a mock completion endpoint.

use pitchbot::config::GenerationConfig;
use pitchbot::llm_client::{OpenAiClient, TextGenerator};
use pitchbot::pitch_errors::GenerationError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(&GenerationConfig {
        api_key: "test-key".to_string(),
        base_url: format!("{}/v1", server.uri()),
        model: "test-model".to_string(),
        timeout_secs: 5,
        ..GenerationConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_completion_text_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "messages": [
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "scope this" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  ## Overview\nText  " } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 5 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server).generate("be brief", "scope this").await.unwrap();
    assert_eq!(text, "## Overview\nText");
}

#[tokio::test]
async fn test_api_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Rate limit reached" }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).generate("s", "p").await.unwrap_err();
    match err {
        GenerationError::Api { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "Rate limit reached");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_completion_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "   " } }]
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).generate("s", "p").await.unwrap_err();
    assert!(matches!(err, GenerationError::EmptyContent));
}

#[tokio::test]
async fn test_no_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = client_for(&server).generate("s", "p").await.unwrap_err();
    assert!(matches!(err, GenerationError::EmptyContent));
}
