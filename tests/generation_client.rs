//! Generation client against a mock completion server

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kioskrag::config::GenerationConfig;
use kioskrag::errors::PipelineError;
use kioskrag::generation::fallback::TIMEOUT_MESSAGE;
use kioskrag::generation::{AnswerSource, BackendState, GenerationClient, GenerationParams};
use kioskrag::rag::{AssembledContext, SourceBlock};
use kioskrag::types::RankedDocuments;

fn client_for(server: &MockServer) -> GenerationClient {
    let config = GenerationConfig {
        server_url: server.uri(),
        ..Default::default()
    };
    GenerationClient::new(&config).expect("client")
}

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"index": 0, "text": text, "finish_reason": "stop"}]
    }))
}

fn library_context() -> AssembledContext {
    let text = "[Document 1] Library (score: 0.910)\nThe library opens at 8 AM.".to_string();
    AssembledContext::Sources {
        blocks: vec![SourceBlock {
            document_id: "library".to_string(),
            title: "Library".to_string(),
            score: 0.91,
            excerpt: "The library opens at 8 AM.".to_string(),
            text: text.clone(),
        }],
        char_count: text.chars().count(),
        text,
    }
}

fn unranked() -> RankedDocuments {
    RankedDocuments::Similarity(Vec::new())
}

#[tokio::test]
async fn test_request_body_carries_sampling_params_and_stops() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_partial_json(json!({
            "prompt": "Question: When does the library open?\nAnswer:",
            "max_tokens": 200,
            "top_k": 40,
            "stream": false,
            "stop": ["User:", "Assistant:", "Question:", "\n\n\n", "==="]
        })))
        .respond_with(completion(" The library opens at 8 AM."))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let completion = client
        .generate(
            "Question: When does the library open?\nAnswer:",
            &GenerationParams::default(),
        )
        .await
        .unwrap();

    assert_eq!(completion.raw, " The library opens at 8 AM.");
    assert_eq!(completion.text, "The library opens at 8 AM.");
    assert_eq!(client.state(), BackendState::Healthy);
}

#[tokio::test]
async fn test_leaked_prompt_is_cut() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(completion(
            "Hostel rooms are allocated in August.\n\n\n\nCONTEXT:\n[Document 2]",
        ))
        .mount(&server)
        .await;

    let answer = client_for(&server)
        .answer_or_fallback("prompt", &GenerationParams::default(), &library_context(), &unranked())
        .await;
    assert_eq!(answer.source, AnswerSource::Generated);
    assert_eq!(answer.text, "Hostel rooms are allocated in August.");
}

#[tokio::test]
async fn test_server_error_falls_back_to_extractive() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate("prompt", &GenerationParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::GenerationServer { status: 500, .. }));
    assert_eq!(client.state(), BackendState::Unavailable);

    let answer = client
        .answer_or_fallback("prompt", &GenerationParams::default(), &library_context(), &unranked())
        .await;
    assert_eq!(answer.source, AnswerSource::Extractive);
    assert_eq!(
        answer.text,
        "Here is what I found about Library: The library opens at 8 AM."
    );
}

#[tokio::test]
async fn test_empty_completion_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(completion("User: and hostels?"))
        .mount(&server)
        .await;

    let answer = client_for(&server)
        .answer_or_fallback("prompt", &GenerationParams::default(), &library_context(), &unranked())
        .await;
    assert_eq!(answer.source, AnswerSource::Extractive);
}

#[tokio::test]
async fn test_no_choices_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate("prompt", &GenerationParams::default())
        .await
        .unwrap_err();
    assert!(err.is_generation_failure());
}

#[tokio::test]
async fn test_timeout_reports_took_too_long() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(completion("late").set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = client_for(&server)
        .with_timeouts(Duration::from_millis(200), Duration::from_millis(200));

    let err = client
        .generate("prompt", &GenerationParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::GenerationTimeout { duration_ms: 200 }));

    let answer = client
        .answer_or_fallback("prompt", &GenerationParams::default(), &library_context(), &unranked())
        .await;
    assert_eq!(answer.text, TIMEOUT_MESSAGE);
}

#[tokio::test]
async fn test_health_check_transitions() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    assert_eq!(client.state(), BackendState::Unknown);

    // Nothing mounted yet: wiremock answers 404
    assert!(!client.health_check().await);
    assert_eq!(client.state(), BackendState::Unavailable);

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;
    assert!(client.health_check().await);
    assert_eq!(client.state(), BackendState::Healthy);
}

#[tokio::test]
async fn test_unavailable_recovers_on_successful_call() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    assert!(!client.health_check().await);
    assert_eq!(client.state(), BackendState::Unavailable);

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(completion("Apply online."))
        .mount(&server)
        .await;

    // Generation is attempted even while marked unavailable
    let completion = client
        .generate("prompt", &GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(completion.text, "Apply online.");
    assert_eq!(client.state(), BackendState::Healthy);
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    let config = GenerationConfig {
        server_url: "http://127.0.0.1:9".to_string(),
        ..Default::default()
    };
    let client = GenerationClient::new(&config)
        .unwrap()
        .with_timeouts(Duration::from_secs(2), Duration::from_millis(500));

    assert!(!client.health_check().await);
    let answer = client
        .answer_or_fallback(
            "prompt",
            &GenerationParams::default(),
            &AssembledContext::NoContext,
            &unranked(),
        )
        .await;
    assert_eq!(answer.source, AnswerSource::Apology);
}
