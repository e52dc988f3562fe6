//! GeminiClient against a mocked generateContent endpoint.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wayfinder::config::GeminiConfig;
use wayfinder::providers::{GeminiClient, TextGenerator, VisionGenerator};

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(&GeminiConfig {
        api_key: Some("test-key".into()),
        base_url: server.uri(),
        text_model: "gemini-2.0-flash-latest".into(),
        vision_model: "gemini-2.0-flash-exp".into(),
        timeout_secs: 5,
        max_retries: 0,
    })
}

fn candidate_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }] }
        }]
    })
}

#[tokio::test]
async fn generate_json_returns_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash-latest:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate_body(r#"{"intent": "help", "confidence": 1.0}"#)),
        )
        .mount(&server)
        .await;

    let text = client_for(&server).generate_json("classify this").await.unwrap();
    assert_eq!(text, r#"{"intent": "help", "confidence": 1.0}"#);
}

#[tokio::test]
async fn vision_requests_go_to_the_vision_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash-exp:generateContent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(candidate_body(
                r#"{"status": "clear", "obstacles": [], "guidance": "", "recommendation": "continue"}"#,
            )),
        )
        .mount(&server)
        .await;

    let text = client_for(&server)
        .analyze_image("describe", &[0xFF, 0xD8], "image/jpeg")
        .await
        .unwrap();
    assert!(text.contains("clear"));
}

#[tokio::test]
async fn rejected_credentials_are_a_configuration_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client_for(&server).generate_json("anything").await.unwrap_err();
    assert_eq!(err.code(), "CONFIGURATION_ERROR");
}

#[tokio::test]
async fn empty_candidates_are_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = client_for(&server).generate_json("anything").await.unwrap_err();
    assert_eq!(err.code(), "PARSE_ERROR");
}

#[tokio::test]
async fn server_errors_are_retried_within_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("{}")))
        .mount(&server)
        .await;

    let client = GeminiClient::new(&GeminiConfig {
        api_key: Some("test-key".into()),
        base_url: server.uri(),
        text_model: "gemini-2.0-flash-latest".into(),
        vision_model: "gemini-2.0-flash-exp".into(),
        timeout_secs: 5,
        max_retries: 2,
    });
    assert_eq!(client.generate_json("anything").await.unwrap(), "{}");
}
