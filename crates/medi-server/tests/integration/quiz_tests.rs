use std::sync::Arc;

use axum::http::{Method, StatusCode};

use medi_core::AppError;
use medi_core::testutil::MockGenerator;
use medi_core::traits::DisabledGenerator;

use crate::integration::common::{
    OTHER_TOKEN, STUDENT_TOKEN, quiz_body, setup_test_app, setup_test_app_with,
};

const GENERATED: &str = r#"```json
{"questions": [
  {"prompt": "First-line treatment for anaphylaxis?",
   "options": ["IM adrenaline", "IV hydrocortisone", "Oral cetirizine"],
   "correct_index": 0,
   "explanation": "0.5 mg IM, repeat after 5 minutes if needed"},
  {"prompt": "Which drug reverses opioid toxicity?",
   "options": ["Flumazenil", "Naloxone"],
   "correct_index": 1},
  {"prompt": "Antidote for paracetamol overdose?",
   "options": ["N-acetylcysteine", "Atropine"],
   "correct_index": 0}
]}
```"#;

#[tokio::test]
async fn answers_are_hidden_from_non_owners() {
    let app = setup_test_app().await;

    let (status, created) = app.post("/v1/quizzes", STUDENT_TOKEN, quiz_body(true)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["source"], "manual");
    assert_eq!(created["question_count"], 2);
    assert_eq!(created["questions"][0]["correct_index"], 1);
    let uri = format!("/v1/quizzes/{}", created["id"].as_str().unwrap());

    let (status, seen) = app.get(&uri, OTHER_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert!(seen["questions"][0]["correct_index"].is_null());
    assert!(seen["questions"][1]["explanation"].is_null());
    assert_eq!(seen["questions"][0]["options"][1], "3.5-5.0");
}

#[tokio::test]
async fn private_quizzes_are_owner_only() {
    let app = setup_test_app().await;

    let (_, created) = app.post("/v1/quizzes", STUDENT_TOKEN, quiz_body(false)).await;
    let uri = format!("/v1/quizzes/{}", created["id"].as_str().unwrap());

    let (status, _) = app.get(&uri, OTHER_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, mine) = app.get("/v1/quizzes?mine=true", STUDENT_TOKEN).await;
    assert_eq!(mine["count"], 1);
    let (_, theirs) = app.get("/v1/quizzes", OTHER_TOKEN).await;
    assert_eq!(theirs["count"], 0);

    let mut update = quiz_body(false);
    update["title"] = "Potassium".into();
    let (status, _) = app.json(Method::PUT, &uri, OTHER_TOKEN, update.clone()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, updated) = app.json(Method::PUT, &uri, STUDENT_TOKEN, update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Potassium");

    let (status, _) = app.delete(&uri, STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn question_without_answer_is_rejected() {
    let app = setup_test_app().await;

    let mut body = quiz_body(true);
    body["questions"][0]["correct_index"] = serde_json::Value::Null;
    let (status, err) = app.post("/v1/quizzes", STUDENT_TOKEN, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    let mut body = quiz_body(true);
    body["questions"][1]["correct_index"] = 7.into();
    let (status, _) = app.post("/v1/quizzes", STUDENT_TOKEN, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn perfect_attempt_awards_xp_and_feeds_analytics() {
    let app = setup_test_app().await;

    let (_, created) = app.post("/v1/quizzes", STUDENT_TOKEN, quiz_body(true)).await;
    let id = created["id"].as_str().unwrap();
    let attempts_uri = format!("/v1/quizzes/{id}/attempts");

    let (status, result) = app
        .post(
            &attempts_uri,
            OTHER_TOKEN,
            serde_json::json!({ "answers": [1, 1], "duration_secs": 40 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{result}");
    assert_eq!(result["attempt"]["score"], 100.0);
    assert_eq!(result["attempt"]["correct_count"], 2);
    assert_eq!(result["attempt"]["xp_awarded"], 39);
    assert_eq!(result["progress"]["xp_gained"], 39);
    assert_eq!(result["outcomes"][0]["is_correct"], true);
    assert_eq!(result["outcomes"][0]["explanation"], "Reference range in mmol/L");
    let unlocked: Vec<&str> = result["progress"]["unlocked"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["code"].as_str().unwrap())
        .collect();
    assert!(unlocked.contains(&"first_quiz"));
    assert!(unlocked.contains(&"perfect_score"));

    let (status, result) = app
        .post(
            &attempts_uri,
            OTHER_TOKEN,
            serde_json::json!({ "answers": [0, null], "duration_secs": 20 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(result["attempt"]["score"], 0.0);
    assert_eq!(result["progress"]["xp_gained"], 10);

    let (status, _) = app
        .post(&attempts_uri, OTHER_TOKEN, serde_json::json!({ "answers": [1] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Non-owners only see their own attempts.
    let (_, own) = app.get(&attempts_uri, OTHER_TOKEN).await;
    assert_eq!(own["count"], 2);
    let (_, owner_view) = app.get(&attempts_uri, STUDENT_TOKEN).await;
    assert_eq!(owner_view["count"], 2);

    let analytics_uri = format!("/v1/quizzes/{id}/analytics");
    let (status, _) = app.get(&analytics_uri, OTHER_TOKEN).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, analytics) = app.get(&analytics_uri, STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analytics["quiz_id"], id);
    assert_eq!(analytics["attempt_count"], 2);
    assert_eq!(analytics["unique_participants"], 1);
    assert_eq!(analytics["average_score"], 50.0);
    assert_eq!(analytics["min_score"], 0.0);
    assert_eq!(analytics["max_score"], 100.0);
    assert_eq!(analytics["average_duration_secs"], 30.0);
    assert_eq!(analytics["question_correct_rates"], serde_json::json!([0.5, 0.5]));
}

#[tokio::test]
async fn generate_quiz_stores_model_output() {
    let generator = MockGenerator::new(GENERATED);
    let app = setup_test_app_with(Arc::new(generator.clone())).await;

    let (status, quiz) = app
        .post(
            "/v1/quizzes/generate",
            STUDENT_TOKEN,
            serde_json::json!({ "topic": "Toxicology", "difficulty": "advanced", "question_count": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{quiz}");
    assert_eq!(quiz["source"], "generated");
    assert_eq!(quiz["title"], "Toxicology quiz");
    assert_eq!(quiz["difficulty"], "advanced");
    assert_eq!(quiz["question_count"], 2);
    assert_eq!(quiz["questions"][1]["correct_index"], 1);

    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].json_output);
    assert!(requests[0].messages[0].content.contains("Toxicology"));
}

#[tokio::test]
async fn generate_quiz_rejects_bad_counts_and_bad_output() {
    let app = setup_test_app_with(Arc::new(MockGenerator::new("I cannot help with that"))).await;

    let (status, _) = app
        .post(
            "/v1/quizzes/generate",
            STUDENT_TOKEN,
            serde_json::json!({ "topic": "Renal", "question_count": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/v1/quizzes/generate",
            STUDENT_TOKEN,
            serde_json::json!({ "topic": "Renal" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "llm_error");

    let (_, list) = app.get("/v1/quizzes?mine=true", STUDENT_TOKEN).await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn generate_quiz_without_ai_returns_503() {
    let app = setup_test_app_with(Arc::new(DisabledGenerator)).await;

    let (status, body) = app
        .post(
            "/v1/quizzes/generate",
            STUDENT_TOKEN,
            serde_json::json!({ "topic": "Renal" }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "ai_unavailable");
}

#[tokio::test]
async fn provider_errors_map_to_502() {
    let generator = MockGenerator::with_error(AppError::LlmError {
        message: "upstream overloaded".into(),
        status_code: 529,
        retryable: true,
    });
    let app = setup_test_app_with(Arc::new(generator)).await;

    let (status, body) = app
        .post(
            "/v1/quizzes/generate",
            STUDENT_TOKEN,
            serde_json::json!({ "topic": "Renal" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "llm_error");
}
