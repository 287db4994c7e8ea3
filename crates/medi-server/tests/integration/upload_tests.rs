use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::integration::common::{
    OTHER_TOKEN, STUDENT_TOKEN, TEST_UPLOAD_LIMIT, TestApp, setup_test_app,
};

const BOUNDARY: &str = "medi-test-boundary";
const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(
    app: &TestApp,
    token: &str,
    filename: &str,
    content_type: &str,
    data: &[u8],
) -> (StatusCode, serde_json::Value) {
    app.send(
        Request::post("/v1/uploads")
            .header("authorization", format!("Bearer {token}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body("file", filename, content_type, data)))
            .unwrap(),
    )
    .await
}

fn png(len: usize) -> Vec<u8> {
    let mut data = PNG_HEADER.to_vec();
    data.resize(len, 0x42);
    data
}

fn stored_files(app: &TestApp) -> usize {
    std::fs::read_dir(app.upload_dir.path()).unwrap().count()
}

#[tokio::test]
async fn upload_and_download_image() {
    let app = setup_test_app().await;
    let data = png(512);

    let (status, created) = upload(&app, STUDENT_TOKEN, "../../tmp/ecg strip.png", "image/png", &data).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["content_type"], "image/png");
    assert_eq!(created["size_bytes"], 512);
    assert_eq!(created["original_name"], "ecg strip.png");
    let id = created["id"].as_str().unwrap();
    assert_eq!(created["url"], format!("/v1/uploads/{id}"));
    assert_eq!(stored_files(&app), 1);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/v1/uploads/{id}"))
                .header("authorization", format!("Bearer {OTHER_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "512");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), data.as_slice());
}

#[tokio::test]
async fn oversized_upload_returns_413() {
    let app = setup_test_app().await;
    let data = png(TEST_UPLOAD_LIMIT as usize + 1);

    let (status, body) = upload(&app, STUDENT_TOKEN, "big.png", "image/png", &data).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "payload_too_large");
    assert_eq!(stored_files(&app), 0);
}

#[tokio::test]
async fn upload_at_exact_limit_is_accepted() {
    let app = setup_test_app().await;
    let data = png(TEST_UPLOAD_LIMIT as usize);

    let (status, body) = upload(&app, STUDENT_TOKEN, "edge.png", "image/png", &data).await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["size_bytes"], TEST_UPLOAD_LIMIT);
}

#[tokio::test]
async fn disallowed_type_returns_415() {
    let app = setup_test_app().await;

    let (status, body) = upload(
        &app,
        STUDENT_TOKEN,
        "page.html",
        "text/html",
        b"<script>alert(1)</script>",
    )
    .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "unsupported_media_type");
    assert_eq!(stored_files(&app), 0);
}

#[tokio::test]
async fn missing_file_field_returns_400() {
    let app = setup_test_app().await;

    let (status, body) = app
        .send(
            Request::post("/v1/uploads")
                .header("authorization", format!("Bearer {STUDENT_TOKEN}"))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(
                    "attachment",
                    "a.png",
                    "image/png",
                    &png(16),
                )))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn only_owner_can_delete_upload() {
    let app = setup_test_app().await;

    let (_, created) = upload(&app, STUDENT_TOKEN, "xray.png", "image/png", &png(64)).await;
    let uri = format!("/v1/uploads/{}", created["id"].as_str().unwrap());

    let (status, body) = app.delete(&uri, OTHER_TOKEN).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert_eq!(stored_files(&app), 1);

    let (status, _) = app.delete(&uri, STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(stored_files(&app), 0);

    let (status, _) = app.get(&uri, STUDENT_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
