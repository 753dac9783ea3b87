//! Integration tests for the answer pipeline against a mock backend.

#![allow(clippy::unwrap_used, clippy::panic, clippy::clone_on_ref_ptr)]

use std::time::Duration;

use jobpilot::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1,
        "model": "test",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn sse_body(fragments: &[&str]) -> String {
    let mut body: String = fragments
        .iter()
        .map(|f| {
            let chunk = json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "choices": [{"index": 0, "delta": {"content": f}, "finish_reason": null}]
            });
            format!("data: {chunk}\n\n")
        })
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn config(server: &MockServer, model: &str) -> AiConfig {
    AiConfig::new(format!("{}/v1", server.uri()), model).with_api_key("sk-test")
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().ends_with("/chat/completions"))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

/// Rejects requests whose `response_format.type` is listed, answers the rest.
struct RejectFormats {
    rejected: &'static [&'static str],
    error: &'static str,
    reply: &'static str,
}

impl Respond for RejectFormats {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        if let Some(format) = body["response_format"]["type"].as_str()
            && self.rejected.contains(&format)
        {
            return ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": self.error, "type": "invalid_request_error", "code": null}
            }));
        }
        ResponseTemplate::new(200).set_body_json(completion(self.reply))
    }
}

#[tokio::test]
async fn test_batch_answer_question() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("  5\n")))
        .expect(1)
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "llama3")).unwrap();
    let session = AiSession::new(conn, AlertGate::silent());
    let answer = session
        .answer_question(&QuestionRequest::new("Years of experience with Rust?").with_user_information("5 years of Rust"))
        .await;
    assert_eq!(answer.as_deref(), Some("5"));

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies[0]["model"], "llama3");
    assert_eq!(bodies[0]["stream"], false);
    assert!(bodies[0].get("temperature").is_none());
    assert!(bodies[0].get("response_format").is_none());
    assert!(bodies[0]["messages"][0]["content"].as_str().unwrap().contains("5 years of Rust"));
}

#[tokio::test]
async fn test_request_payload_follows_capabilities() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .mount(&server)
        .await;

    let request = CompletionRequest::user("hi").with_response_format(ResponseFormat::JsonObject);

    let openai = Connection::new(config(&server, "gpt-4o")).unwrap();
    openai.invoke(&request, &CallOptions::default()).await.unwrap();

    let gemini = Connection::new(config(&server, "gemini-1.5-flash").with_family(BackendFamily::Gemini)).unwrap();
    let result = gemini.invoke(&request, &CallOptions::default()).await.unwrap();
    assert_eq!(result, CompletionResult::Structured(json!({})));

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies[0]["temperature"], 0.0);
    assert_eq!(bodies[0]["response_format"], json!({"type": "json_object"}));
    assert!(bodies[1].get("temperature").is_none());
    assert!(bodies[1].get("response_format").is_none());
}

#[tokio::test]
async fn test_batch_without_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x", "object": "chat.completion"})))
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "llama3")).unwrap();
    let err = conn
        .invoke(&CompletionRequest::user("hi"), &CallOptions::default())
        .await
        .unwrap_err();
    let backend = err.as_backend().unwrap();
    assert_eq!(backend.kind, BackendErrorKind::ResponseFormat);
    assert!(backend.message.contains("No choices found in response"));
}

#[tokio::test]
async fn test_batch_in_band_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [],
            "error": {"message": "model is loading"}
        })))
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "llama3")).unwrap();
    let err = conn
        .invoke(&CompletionRequest::user("hi"), &CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.as_backend().unwrap().kind, BackendErrorKind::InBand);
    assert!(err.to_string().contains("model is loading"));
}

#[tokio::test]
async fn test_streaming_concatenates_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(&["Hel", "lo, ", "world"])),
        )
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "llama3").with_streaming(true)).unwrap();
    let result = conn
        .invoke(&CompletionRequest::user("greet"), &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(result, CompletionResult::Text("Hello, world".to_owned()));
    assert_eq!(request_bodies(&server).await[0]["stream"], true);
}

#[tokio::test]
async fn test_streaming_in_band_error() {
    let server = MockServer::start().await;
    let body = format!(
        "{}data: {}\n\n",
        sse_body(&["par"]).trim_end_matches("data: [DONE]\n\n"),
        json!({"error": {"message": "upstream crashed"}})
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "llama3")).unwrap();
    let err = conn
        .invoke(&CompletionRequest::user("hi").with_stream(true), &CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.as_backend().unwrap().kind, BackendErrorKind::InBand);
    assert!(err.to_string().contains("upstream crashed"));
}

#[tokio::test]
async fn test_streaming_status_error_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model is warming up"))
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "llama3").with_streaming(true)).unwrap();
    let err = conn
        .invoke(&CompletionRequest::user("hi"), &CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.as_backend().unwrap().status, Some(503));
    assert!(err.to_string().contains("model is warming up"));
}

#[tokio::test]
async fn test_schema_incapable_model_falls_to_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(RejectFormats {
            rejected: &["json_schema", "json_object"],
            error: "response_format not supported",
            reply: r#"{"tech_stack":["Rust"]}"#,
        })
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "gpt-3.5-turbo")).unwrap();
    let session = AiSession::new(conn, AlertGate::silent());
    let resolution = session.try_extract_skills("We need Rust.", None).await.unwrap();

    assert_eq!(
        resolution.attempts,
        vec![Strategy::ObjectConstrained, Strategy::PlainTextInstructed]
    );
    assert_eq!(resolution.strategy, Strategy::PlainTextInstructed);
    assert_eq!(resolution.value, json!({"tech_stack": ["Rust"]}));

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["response_format"]["type"], "json_object");
    assert!(bodies[1].get("response_format").is_none());
    let prompt = bodies[1]["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("We need Rust."));
    assert!(prompt.contains("Respond with ONLY a valid JSON object"));
}

#[tokio::test]
async fn test_schema_rejection_demotes_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(RejectFormats {
            rejected: &["json_schema"],
            error: "Invalid parameter: 'response_format' of type 'json_schema' is not supported with this model",
            reply: r#"{"tech_stack":[],"technical_skills":["SQL"],"other_skills":[],"required_skills":[],"nice_to_have":[]}"#,
        })
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "my-gpt-4o-mini-custom")).unwrap();
    let session = AiSession::new(conn, AlertGate::silent());
    let value = session.extract_skills("SQL everywhere").await.unwrap();
    assert_eq!(value["technical_skills"], json!(["SQL"]));

    let bodies = request_bodies(&server).await;
    let formats: Vec<&str> = bodies
        .iter()
        .map(|b| b["response_format"]["type"].as_str().unwrap_or("none"))
        .collect();
    assert_eq!(formats, vec!["json_schema", "json_object"]);
    assert_eq!(bodies[0]["response_format"]["json_schema"]["name"], "Skills_Extraction_Response");
}

#[tokio::test]
async fn test_plain_text_garbage_becomes_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(RejectFormats {
            rejected: &["json_schema", "json_object"],
            error: "400 bad request",
            reply: "Sure! Here are the skills: Rust, Go",
        })
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "gpt-4o")).unwrap();
    let request = StructuredRequest::new("skills?", OutputSchema::new("s", json!({"type": "object"})));
    let resolution = conn.resolve_structured(&request, &CallOptions::default()).await.unwrap();

    assert_eq!(resolution.attempts.len(), 3);
    assert!(is_sentinel(&resolution.value));
    assert_eq!(resolution.value["data"], "Sure! Here are the skills: Rust, Go");
}

#[tokio::test]
async fn test_unrelated_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": {"message": "internal failure"}})))
        .expect(1)
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "gpt-4o")).unwrap();
    let request = StructuredRequest::new("skills?", OutputSchema::new("s", json!({"type": "object"})));
    let err = conn
        .resolve_structured(&request, &CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.as_backend().unwrap().status, Some(500));
}

#[tokio::test]
async fn test_call_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "llama3")).unwrap();
    let options = CallOptions::default().with_timeout(Duration::from_millis(100));
    let err = conn
        .invoke(&CompletionRequest::user("hi"), &options)
        .await
        .unwrap_err();
    assert_eq!(err.as_backend().unwrap().kind, BackendErrorKind::Timeout);
}

#[tokio::test]
async fn test_create_survives_missing_models_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .expect(1)
        .mount(&server)
        .await;

    let conn = Connection::create(config(&server, "local-model"), &CallOptions::default()).await.unwrap();
    assert_eq!(conn.model(), "local-model");
    conn.close();
    conn.close();
    assert!(conn.is_closed());
}

#[tokio::test]
async fn test_create_with_unlisted_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "qwen2.5:7b", "object": "model"}]
        })))
        .mount(&server)
        .await;

    let conn = Connection::create(config(&server, "gpt-4o"), &CallOptions::default()).await.unwrap();
    assert_eq!(conn.list_models(&CallOptions::default()).await.unwrap(), vec!["qwen2.5:7b".to_owned()]);
}

#[tokio::test]
async fn test_create_with_empty_model_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "list", "data": []})))
        .mount(&server)
        .await;

    let err = Connection::create(config(&server, "gpt-4o"), &CallOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::InvalidValue(_))));
}

#[tokio::test]
async fn test_create_bounds_slow_models_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"id": "gpt-4o"}]}))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let conn = Connection::create(config(&server, "gpt-4o").with_timeout(1), &CallOptions::default())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));

    let options = CallOptions::default().with_timeout(Duration::from_millis(100));
    let err = conn.list_models(&options).await.unwrap_err();
    assert_eq!(err.as_backend().unwrap().kind, BackendErrorKind::Timeout);
}

#[tokio::test]
async fn test_create_stops_when_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"id": "gpt-4o"}]}))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;

    let options = CallOptions::default();
    let cancel = options.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = std::time::Instant::now();
    let err = Connection::create(config(&server, "gpt-4o"), &options).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_create_rejects_disabled_config() {
    let err = Connection::create(AiConfig::default(), &CallOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Disabled)));
}

#[tokio::test]
async fn test_session_degrades_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let conn = Connection::new(config(&server, "gpt-4o")).unwrap();
    let session = AiSession::new(conn, AlertGate::silent());
    assert!(session.answer_question(&QuestionRequest::new("Why us?")).await.is_none());
    assert!(session.extract_skills("anything").await.is_none());

    session.close();
    let err = session
        .try_answer_question(&QuestionRequest::new("Still there?"))
        .await
        .unwrap_err();
    assert_eq!(err.as_backend().unwrap().kind, BackendErrorKind::Internal);
}
