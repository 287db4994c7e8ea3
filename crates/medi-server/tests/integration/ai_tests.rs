use std::sync::Arc;

use axum::http::StatusCode;

use medi_core::testutil::MockGenerator;
use medi_core::traits::DisabledGenerator;

use crate::integration::common::{
    EDUCATOR_TOKEN, STUDENT_TOKEN, case_body, setup_test_app, setup_test_app_with,
};

#[tokio::test]
async fn chat_forwards_conversation_with_tutor_prompt() {
    let generator = MockGenerator::default();
    let app = setup_test_app_with(Arc::new(generator.clone())).await;

    let (status, body) = app
        .post(
            "/v1/ai/chat",
            STUDENT_TOKEN,
            serde_json::json!({
                "messages": [
                    { "role": "user", "content": "What does a U wave mean?" },
                    { "role": "assistant", "content": "Often hypokalaemia." },
                    { "role": "user", "content": "What else?" }
                ]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["reply"], "echo: What else?");
    assert_eq!(body["model"], "mock-model");

    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 3);
    assert!(requests[0].system.as_deref().is_some_and(|s| !s.is_empty()));
    assert!(!requests[0].json_output);
}

#[tokio::test]
async fn chat_about_a_case_includes_case_context() {
    let generator = MockGenerator::new("Think about the ECG leads involved.");
    let app = setup_test_app_with(Arc::new(generator.clone())).await;
    app.make_educator(EDUCATOR_TOKEN).await;

    let (_, case) = app
        .post("/v1/cases", EDUCATOR_TOKEN, case_body("Chest pain", true))
        .await;

    let (status, body) = app
        .post(
            "/v1/ai/chat",
            STUDENT_TOKEN,
            serde_json::json!({
                "case_id": case["id"],
                "messages": [{ "role": "user", "content": "Where is the infarct?" }]
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Think about the ECG leads involved.");
    let system = generator.requests()[0].system.clone().unwrap();
    assert!(system.contains("Chest pain"));
}

#[tokio::test]
async fn chat_rejects_empty_or_malformed_conversations() {
    let app = setup_test_app().await;

    let (status, body) = app
        .post("/v1/ai/chat", STUDENT_TOKEN, serde_json::json!({ "messages": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = app
        .post(
            "/v1/ai/chat",
            STUDENT_TOKEN,
            serde_json::json!({ "messages": [{ "role": "narrator", "content": "hi" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ai_routes_return_503_without_provider() {
    let app = setup_test_app_with(Arc::new(DisabledGenerator)).await;

    let (status, body) = app
        .post(
            "/v1/ai/chat",
            STUDENT_TOKEN,
            serde_json::json!({ "messages": [{ "role": "user", "content": "Hello" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "ai_unavailable");
    assert!(body["message"].is_string());

    let (status, body) = app
        .post(
            "/v1/ai/generate",
            STUDENT_TOKEN,
            serde_json::json!({ "prompt": "Summarise the Wells score" }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "ai_unavailable");
}

#[tokio::test]
async fn generate_passes_system_and_json_flags() {
    let generator = MockGenerator::new(r#"{"answer": 42}"#);
    let app = setup_test_app_with(Arc::new(generator.clone())).await;

    let (status, body) = app
        .post(
            "/v1/ai/generate",
            STUDENT_TOKEN,
            serde_json::json!({
                "prompt": "Give me a number",
                "system": "Reply in JSON",
                "json": true
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], r#"{"answer": 42}"#);

    let request = &generator.requests()[0];
    assert_eq!(request.system.as_deref(), Some("Reply in JSON"));
    assert!(request.json_output);

    let (status, _) = app
        .post("/v1/ai/generate", STUDENT_TOKEN, serde_json::json!({ "prompt": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ai_routes_require_authentication() {
    let app = setup_test_app().await;

    let (status, body) = app
        .post(
            "/v1/ai/chat",
            "unknown-token",
            serde_json::json!({ "messages": [{ "role": "user", "content": "Hello" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}
