use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for an uploaded attachment. The bytes live on disk at
/// `storage_path`; deleting hard-removes the blob but only soft-deletes this
/// record, so the two are allowed to diverge and read paths check both.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: Uuid,
    pub task_id: Uuid,
    pub uploaded_by: i32,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Per-file upload cap: 10 MiB, matching the upload middleware limit.
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// MIME types accepted by the upload endpoint.
pub const ALLOWED_MIME_TYPES: [&str; 4] = [
    "image/png",
    "image/jpeg",
    "application/pdf",
    "text/plain",
];

/// Builds the on-disk name for an upload: a millisecond timestamp prefix and
/// the original name with whitespace collapsed to dashes.
pub fn storage_filename(original: &str) -> String {
    let safe: String = original
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    format!("{}-{}", Utc::now().timestamp_millis(), safe)
}
