use axum::http::{Method, StatusCode};

use crate::integration::common::{
    EDUCATOR_TOKEN, OTHER_TOKEN, STUDENT_TOKEN, case_body, setup_test_app,
};

#[tokio::test]
async fn students_cannot_author_cases() {
    let app = setup_test_app().await;

    let (status, body) = app
        .post("/v1/cases", STUDENT_TOKEN, case_body("Chest pain", true))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn educator_creates_and_reads_case() {
    let app = setup_test_app().await;
    let educator = app.make_educator(EDUCATOR_TOKEN).await;

    let (status, created) = app
        .post("/v1/cases", EDUCATOR_TOKEN, case_body("Chest pain", true))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["author_id"], educator.id.to_string());
    assert_eq!(created["difficulty"], "intermediate");
    assert_eq!(created["rating_count"], 0);
    let id = created["id"].as_str().unwrap();

    let (status, fetched) = app.get(&format!("/v1/cases/{id}"), STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Chest pain");
    assert_eq!(fetched["view_count"], 1);

    let (status, list) = app
        .get("/v1/cases?specialty=cardiology&search=stemi", STUDENT_TOKEN)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 0, "search matches title, summary, or tags only");

    let (status, list) = app.get("/v1/cases?search=crushing", STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);
    assert_eq!(list["cases"][0]["id"], id);
}

#[tokio::test]
async fn invalid_case_is_rejected() {
    let app = setup_test_app().await;
    app.make_educator(EDUCATOR_TOKEN).await;

    let mut body = case_body("", true);
    let (status, err) = app.post("/v1/cases", EDUCATOR_TOKEN, body.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    body["title"] = "Valid".into();
    body["difficulty"] = "impossible".into();
    let (status, _) = app.post("/v1/cases", EDUCATOR_TOKEN, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn drafts_are_hidden_from_other_users() {
    let app = setup_test_app().await;
    app.make_educator(EDUCATOR_TOKEN).await;

    let (_, draft) = app
        .post("/v1/cases", EDUCATOR_TOKEN, case_body("Unfinished", false))
        .await;
    let id = draft["id"].as_str().unwrap();

    let (status, _) = app.get(&format!("/v1/cases/{id}"), EDUCATOR_TOKEN).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&format!("/v1/cases/{id}"), STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (_, list) = app.get("/v1/cases", STUDENT_TOKEN).await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn only_author_can_modify_case() {
    let app = setup_test_app().await;
    app.make_educator(EDUCATOR_TOKEN).await;
    app.make_educator(OTHER_TOKEN).await;

    let (_, created) = app
        .post("/v1/cases", EDUCATOR_TOKEN, case_body("Syncope", true))
        .await;
    let uri = format!("/v1/cases/{}", created["id"].as_str().unwrap());

    let (status, _) = app
        .json(Method::PUT, &uri, OTHER_TOKEN, case_body("Hijacked", true))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .json(Method::PUT, &uri, EDUCATOR_TOKEN, case_body("Vasovagal syncope", true))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Vasovagal syncope");

    let (status, _) = app.delete(&uri, EDUCATOR_TOKEN).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&uri, EDUCATOR_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rating_aggregate_tracks_create_update_and_remove() {
    let app = setup_test_app().await;
    app.make_educator(EDUCATOR_TOKEN).await;

    let (_, created) = app
        .post("/v1/cases", EDUCATOR_TOKEN, case_body("Sepsis", true))
        .await;
    let id = created["id"].as_str().unwrap();
    let rating_uri = format!("/v1/cases/{id}/rating");

    let (status, body) = app
        .json(
            Method::PUT,
            &rating_uri,
            STUDENT_TOKEN,
            serde_json::json!({ "rating": 4, "comment": "Great teaching case" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["rating"]["rating"], 4);
    assert_eq!(body["summary"]["rating_count"], 1);
    assert_eq!(body["summary"]["rating_avg"], 4.0);

    let (status, body) = app
        .json(Method::PUT, &rating_uri, OTHER_TOKEN, serde_json::json!({ "rating": 2 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["summary"]["rating_count"], 2);
    assert_eq!(body["summary"]["rating_avg"], 3.0);

    // Re-rating replaces the old value instead of adding a new one.
    let (status, body) = app
        .json(Method::PUT, &rating_uri, STUDENT_TOKEN, serde_json::json!({ "rating": 5 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["rating_count"], 2);
    assert_eq!(body["summary"]["rating_avg"], 3.5);

    let (status, mine) = app.get(&rating_uri, STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["rating"], 5);

    let (_, case) = app.get(&format!("/v1/cases/{id}"), STUDENT_TOKEN).await;
    assert_eq!(case["rating_count"], 2);
    assert_eq!(case["rating_avg"], 3.5);

    let (status, summary) = app.delete(&rating_uri, OTHER_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["rating_count"], 1);
    assert_eq!(summary["rating_avg"], 5.0);

    let (status, _) = app.delete(&rating_uri, OTHER_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Only the first rating by a user earns XP.
    let (_, progress) = app.get("/v1/users/me/progress", STUDENT_TOKEN).await;
    assert_eq!(progress["xp"], 5);
}

#[tokio::test]
async fn out_of_range_rating_is_rejected() {
    let app = setup_test_app().await;
    app.make_educator(EDUCATOR_TOKEN).await;

    let (_, created) = app
        .post("/v1/cases", EDUCATOR_TOKEN, case_body("Anaphylaxis", true))
        .await;
    let rating_uri = format!("/v1/cases/{}/rating", created["id"].as_str().unwrap());

    for rating in [0, 6] {
        let (status, body) = app
            .json(Method::PUT, &rating_uri, STUDENT_TOKEN, serde_json::json!({ "rating": rating }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    let (_, case) = app
        .get(&format!("/v1/cases/{}", created["id"].as_str().unwrap()), STUDENT_TOKEN)
        .await;
    assert_eq!(case["rating_count"], 0);
}

#[tokio::test]
async fn list_count_reflects_page_size() {
    let app = setup_test_app().await;
    app.make_educator(EDUCATOR_TOKEN).await;
    for title in ["Chest pain", "Syncope", "Palpitations"] {
        app.post("/v1/cases", EDUCATOR_TOKEN, case_body(title, true))
            .await;
    }

    let (status, page) = app.get("/v1/cases?limit=2", STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2);
    assert_eq!(page["cases"].as_array().unwrap().len(), 2);

    let (_, rest) = app.get("/v1/cases?limit=2&offset=2", STUDENT_TOKEN).await;
    assert_eq!(rest["count"], 1);
}
