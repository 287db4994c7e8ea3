use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::integration::common::{STUDENT_TOKEN, setup_test_app};

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let (status, body) = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn missing_credentials_return_401_json() {
    let app = setup_test_app().await;

    let (status, body) = app
        .send(Request::get("/v1/cases").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert!(body["message"].as_str().unwrap().contains("Bearer"));
}

#[tokio::test]
async fn every_protected_route_requires_credentials() {
    let app = setup_test_app().await;
    let id = uuid::Uuid::new_v4();

    let routes = [
        (Method::DELETE, "/v1/auth/session".to_string()),
        (Method::GET, "/v1/auth/me".to_string()),
        (Method::GET, "/v1/users/me".to_string()),
        (Method::PATCH, "/v1/users/me".to_string()),
        (Method::GET, "/v1/users/me/progress".to_string()),
        (Method::POST, "/v1/users/me/xp".to_string()),
        (Method::GET, "/v1/users/me/activity".to_string()),
        (Method::POST, "/v1/users/me/study-time".to_string()),
        (Method::GET, "/v1/users/me/stats".to_string()),
        (Method::GET, "/v1/users/leaderboard".to_string()),
        (Method::GET, "/v1/cases".to_string()),
        (Method::POST, "/v1/cases".to_string()),
        (Method::GET, format!("/v1/cases/{id}")),
        (Method::PUT, format!("/v1/cases/{id}")),
        (Method::DELETE, format!("/v1/cases/{id}")),
        (Method::GET, format!("/v1/cases/{id}/rating")),
        (Method::PUT, format!("/v1/cases/{id}/rating")),
        (Method::DELETE, format!("/v1/cases/{id}/rating")),
        (Method::GET, "/v1/quizzes".to_string()),
        (Method::POST, "/v1/quizzes".to_string()),
        (Method::POST, "/v1/quizzes/generate".to_string()),
        (Method::GET, format!("/v1/quizzes/{id}")),
        (Method::PUT, format!("/v1/quizzes/{id}")),
        (Method::DELETE, format!("/v1/quizzes/{id}")),
        (Method::GET, format!("/v1/quizzes/{id}/attempts")),
        (Method::POST, format!("/v1/quizzes/{id}/attempts")),
        (Method::GET, format!("/v1/quizzes/{id}/analytics")),
        (Method::GET, "/v1/flashcards".to_string()),
        (Method::POST, "/v1/flashcards".to_string()),
        (Method::GET, format!("/v1/flashcards/{id}")),
        (Method::PUT, format!("/v1/flashcards/{id}")),
        (Method::DELETE, format!("/v1/flashcards/{id}")),
        (Method::POST, format!("/v1/flashcards/{id}/confidence")),
        (Method::GET, "/v1/flashcard-categories".to_string()),
        (Method::POST, "/v1/flashcard-categories".to_string()),
        (Method::PUT, format!("/v1/flashcard-categories/{id}")),
        (Method::DELETE, format!("/v1/flashcard-categories/{id}")),
        (Method::GET, "/v1/flashcard-sessions".to_string()),
        (Method::POST, "/v1/flashcard-sessions".to_string()),
        (Method::POST, "/v1/uploads".to_string()),
        (Method::GET, format!("/v1/uploads/{id}")),
        (Method::DELETE, format!("/v1/uploads/{id}")),
        (Method::POST, "/v1/ai/chat".to_string()),
        (Method::POST, "/v1/ai/generate".to_string()),
    ];

    for (method, uri) in routes {
        let request = Request::builder()
            .method(method.clone())
            .uri(&uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = app.send(request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        let fields = body.as_object().unwrap();
        assert_eq!(fields.len(), 2, "{method} {uri} leaked data: {body}");
        assert_eq!(body["error"], "unauthorized", "{method} {uri}");
    }
}

#[tokio::test]
async fn unknown_bearer_token_returns_401() {
    let app = setup_test_app().await;

    let (status, body) = app.get("/v1/auth/me", "not-a-real-token").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn identity_token_works_as_bearer() {
    let app = setup_test_app().await;

    let (status, body) = app.get("/v1/auth/me", STUDENT_TOKEN).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "student@example.test");
    assert_eq!(body["role"], "student");
    assert_eq!(body["level"], 1);
}

#[tokio::test]
async fn session_login_sets_cookie_and_token() {
    let app = setup_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/v1/auth/session")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "id_token": STUDENT_TOKEN }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("medi_session="));
    assert!(cookie.contains("HttpOnly"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let token = json["token"].as_str().unwrap().to_string();
    assert_eq!(json["user"]["email"], "student@example.test");
    assert!(cookie.contains(&token));
    let calls_after_login = app.verifier.call_count();

    // The session token works as a bearer credential...
    let (status, _) = app.get("/v1/users/me", &token).await;
    assert_eq!(status, StatusCode::OK);

    // ...and as a cookie, without consulting the identity service again.
    let (status, me) = app
        .send(
            Request::get("/v1/auth/me")
                .header("cookie", format!("theme=dark; medi_session={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "student@example.test");
    assert_eq!(app.verifier.call_count(), calls_after_login);
}

#[tokio::test]
async fn login_with_bad_identity_token_returns_401() {
    let app = setup_test_app().await;

    let (status, body) = app
        .send(
            Request::post("/v1/auth/session")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "id_token": "forged" }).to_string(),
                ))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn logout_revokes_session() {
    let app = setup_test_app().await;

    let (status, session) = app
        .send(
            Request::post("/v1/auth/session")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "id_token": STUDENT_TOKEN }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = session["token"].as_str().unwrap().to_string();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::delete("/v1/auth/session")
                .header("cookie", format!("medi_session={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cleared.to_str().unwrap().contains("Max-Age=0"));

    let (status, _) = app
        .send(
            Request::get("/v1/auth/me")
                .header("cookie", format!("medi_session={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_and_validation() {
    let app = setup_test_app().await;

    let (status, body) = app
        .json(
            axum::http::Method::PATCH,
            "/v1/users/me",
            STUDENT_TOKEN,
            serde_json::json!({ "display_name": "Dr. House", "specialty": "Diagnostics" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Dr. House");
    assert_eq!(body["specialty"], "Diagnostics");

    let (status, body) = app
        .json(
            axum::http::Method::PATCH,
            "/v1/users/me",
            STUDENT_TOKEN,
            serde_json::json!({ "display_name": "   " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn xp_and_study_time_update_progress() {
    let app = setup_test_app().await;

    let (status, body) = app
        .post(
            "/v1/users/me/xp",
            STUDENT_TOKEN,
            serde_json::json!({ "amount": 150, "reason": "attended ward round" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["xp_gained"], 150);
    assert_eq!(body["level"], 2);
    assert_eq!(body["leveled_up"], true);
    assert_eq!(body["streak_days"], 1);

    let (status, _) = app
        .post("/v1/users/me/xp", STUDENT_TOKEN, serde_json::json!({ "amount": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/v1/users/me/study-time",
            STUDENT_TOKEN,
            serde_json::json!({ "minutes": 30 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["xp"], 180);

    let (status, progress) = app.get("/v1/users/me/progress", STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["xp"], 180);
    assert_eq!(progress["study_minutes"], 30);
    assert_eq!(progress["next_level_xp"], 400);

    let (status, activity) = app.get("/v1/users/me/activity?limit=10", STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(activity["count"], 2);
    assert_eq!(activity["activities"][0]["kind"], "study_time");

    let (status, board) = app.get("/v1/users/leaderboard", STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["entries"][0]["rank"], 1);
    assert_eq!(board["entries"][0]["xp"], 180);
}
