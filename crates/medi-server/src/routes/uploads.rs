use std::path::Path as FsPath;
use std::sync::Arc;

use axum::Extension;
use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use medi_core::AppError;
use medi_core::upload::sanitize_filename;

use crate::auth::AuthUser;
use crate::dto::UploadResponse;
use crate::error::ApiError;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

fn multipart_error(err: MultipartError, limit: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge {
            size: limit + 1,
            limit,
        }
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Stream one multipart field to `path`, stopping as soon as it exceeds `limit`.
async fn write_field(field: &mut Field<'_>, path: &FsPath, limit: u64) -> Result<u64, AppError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut size: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
        size += chunk.len() as u64;
        if size > limit {
            return Err(AppError::PayloadTooLarge { size, limit });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(size)
}

async fn remove_stored_file(path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove stored upload");
    }
}

#[utoipa::path(
    post,
    path = "/v1/uploads",
    request_body(content = crate::dto::UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing or empty file field", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 413, description = "File exceeds the size limit", body = crate::dto::ErrorResponse),
        (status = 415, description = "File type not allowed", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "uploads"
)]
pub async fn create_upload(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let policy = &state.uploads.policy;
    let limit = policy.max_bytes;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase()
            })
            .ok_or_else(|| AppError::UnsupportedMediaType("missing content type".into()))?;
        let extension = policy.check_type(&content_type)?;

        let original_name = sanitize_filename(field.file_name().unwrap_or_default());
        let id = Uuid::new_v4();
        let stored_name = policy.stored_name(id, extension);
        let path = state.uploads.path_for(&stored_name);

        let size = match write_field(&mut field, &path, limit).await {
            Ok(size) => size,
            Err(e) => {
                remove_stored_file(&path).await;
                return Err(e.into());
            }
        };
        if let Err(e) = policy.check_size(size) {
            remove_stored_file(&path).await;
            return Err(e.into());
        }

        let upload = match state
            .db
            .upload_repo()
            .create(
                id,
                auth.user.id,
                &original_name,
                &stored_name,
                &content_type,
                size as i64,
            )
            .await
        {
            Ok(upload) => upload,
            Err(e) => {
                remove_stored_file(&path).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            upload_id = %upload.id,
            user_id = %auth.user.id,
            content_type = %upload.content_type,
            size_bytes = upload.size_bytes,
            "Upload stored"
        );
        return Ok((StatusCode::CREATED, axum::Json(UploadResponse::from(upload))));
    }

    Err(AppError::Validation(format!("multipart field '{FILE_FIELD}' is required")).into())
}

#[utoipa::path(
    get,
    path = "/v1/uploads/{id}",
    params(("id" = Uuid, Path, description = "Upload ID")),
    responses(
        (status = 200, description = "The stored file"),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 404, description = "Upload not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "uploads"
)]
pub async fn get_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let upload = state
        .db
        .upload_repo()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Upload {id} not found")))?;

    let path = state.uploads.path_for(&upload.stored_name);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(upload_id = %id, path = %path.display(), "Upload metadata without file");
            return Err(AppError::NotFound(format!("Upload {id} not found")).into());
        }
        Err(e) => return Err(AppError::from(e).into()),
    };

    let disposition = format!(
        "inline; filename=\"{}\"",
        upload.original_name.replace(['"', '\\'], "_")
    );
    let headers = [
        (header::CONTENT_TYPE, upload.content_type),
        (header::CONTENT_LENGTH, upload.size_bytes.to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(file))))
}

#[utoipa::path(
    delete,
    path = "/v1/uploads/{id}",
    params(("id" = Uuid, Path, description = "Upload ID")),
    responses(
        (status = 204, description = "Upload deleted"),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::dto::ErrorResponse),
        (status = 404, description = "Upload not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "uploads"
)]
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = state.db.upload_repo();
    let upload = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Upload {id} not found")))?;
    if !auth.user.can_modify(upload.owner_id) {
        return Err(AppError::Forbidden("Only the owner can delete this upload".into()).into());
    }

    if let Some(deleted) = repo.delete(id).await? {
        remove_stored_file(&state.uploads.path_for(&deleted.stored_name)).await;
    }

    Ok(StatusCode::NO_CONTENT)
}
