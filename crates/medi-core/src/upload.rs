use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// Default maximum upload size (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Allowed MIME types and the extension stored files get.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

/// Metadata of a stored upload.
#[derive(Debug, Clone, Serialize)]
pub struct Upload {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub original_name: String,
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Size and MIME-type limits for uploads.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadPolicy {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Returns the file extension to store the upload under.
    pub fn check_type(&self, content_type: &str) -> Result<&'static str, AppError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        ALLOWED_TYPES
            .iter()
            .find(|(mime, _)| *mime == essence)
            .map(|(_, ext)| *ext)
            .ok_or_else(|| AppError::UnsupportedMediaType(content_type.to_string()))
    }

    pub fn check_size(&self, size: u64) -> Result<(), AppError> {
        if size == 0 {
            return Err(AppError::Validation("uploaded file is empty".into()));
        }
        if size > self.max_bytes {
            return Err(AppError::PayloadTooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Name on disk: the upload id plus the canonical extension. Never
    /// derived from the client-supplied filename.
    pub fn stored_name(&self, id: Uuid, extension: &str) -> String {
        format!("{}.{}", id.simple(), extension)
    }
}

/// Strip directory components and control characters from a client filename.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
