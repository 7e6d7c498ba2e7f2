use crate::{
    auth::AuthUser,
    config::Config,
    error::AppError,
    models::{file::storage_filename, FileRecord, ALLOWED_MIME_TYPES, MAX_FILE_SIZE},
    policy,
};
use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Responder};
use futures::TryStreamExt;
use serde_json::json;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const FILE_COLUMNS: &str =
    "id, task_id, uploaded_by, filename, mime_type, size_bytes, storage_path, deleted_at, created_at";

async fn load_file(pool: &PgPool, id: Uuid) -> Result<FileRecord, AppError> {
    let record = sqlx::query_as::<_, FileRecord>(&format!(
        "SELECT {} FROM files WHERE id = $1 AND deleted_at IS NULL",
        FILE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    record.ok_or_else(|| AppError::NotFound("File not found".into()))
}

/// A file accepted from the multipart stream, written to disk but not yet
/// recorded in the database.
struct PendingFile {
    filename: String,
    mime_type: String,
    size: usize,
    disk_path: PathBuf,
}

async fn discard_blobs(pending: &[PendingFile]) {
    for file in pending {
        let _ = tokio::fs::remove_file(&file.disk_path).await;
    }
}

/// Streams every file field of `payload` to disk under `dir`, validating the
/// MIME allow-list and the per-file size cap as the bytes arrive. Blobs of a
/// rejected payload are removed before the error is returned.
async fn receive_files(payload: &mut Multipart, dir: &Path) -> Result<Vec<PendingFile>, AppError> {
    let mut pending: Vec<PendingFile> = Vec::new();

    loop {
        let mut field = match payload
            .try_next()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {}", e)))
        {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(pending),
            Err(e) => {
                discard_blobs(&pending).await;
                return Err(e);
            }
        };

        let filename = match field.content_disposition().get_filename() {
            Some(name) if !name.is_empty() => name.to_owned(),
            // Non-file form fields are ignored.
            _ => continue,
        };

        let mime_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            discard_blobs(&pending).await;
            return Err(AppError::Validation("Invalid file type".into()));
        }

        let disk_path = dir.join(storage_filename(&filename));

        let written = async {
            let mut out = tokio::fs::File::create(&disk_path).await?;
            let mut size: usize = 0;

            while let Some(chunk) = field
                .try_next()
                .await
                .map_err(|e| AppError::Validation(format!("Upload stream error: {}", e)))?
            {
                size += chunk.len();
                if size > MAX_FILE_SIZE {
                    return Err(AppError::Validation("File too large".into()));
                }
                out.write_all(&chunk).await?;
            }
            out.flush().await?;
            Ok(size)
        }
        .await;

        match written {
            Ok(size) => pending.push(PendingFile {
                filename,
                mime_type,
                size,
                disk_path,
            }),
            Err(e) => {
                let _ = tokio::fs::remove_file(&disk_path).await;
                discard_blobs(&pending).await;
                return Err(e);
            }
        }
    }
}

/// Uploads one or more files to a task the caller can access.
///
/// Each file is checked against the MIME allow-list and the 10 MiB per-file
/// cap while streaming; a violation fails the whole request, and a failed
/// request leaves no metadata rows behind. Accepted files land under
/// `UPLOAD_DIR/<task_id>/`; their metadata rows are written in one
/// transaction only after the entire payload has been accepted.
#[post("/upload/{task_id}")]
pub async fn upload_files(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    task_id: web::Path<Uuid>,
    mut payload: Multipart,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let task = policy::load_task_for(&pool, task_id.into_inner(), auth.id).await?;

    let dir = Path::new(&config.upload_dir).join(task.id.to_string());
    tokio::fs::create_dir_all(&dir).await?;

    let pending = receive_files(&mut payload, &dir).await?;

    if pending.is_empty() {
        return Err(AppError::Validation("No files uploaded".into()));
    }

    let persisted = async {
        let mut tx = pool.begin().await?;
        let mut saved: Vec<FileRecord> = Vec::with_capacity(pending.len());

        for file in &pending {
            let record = sqlx::query_as::<_, FileRecord>(&format!(
                "INSERT INTO files (id, task_id, uploaded_by, filename, mime_type, size_bytes, storage_path) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
                FILE_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(task.id)
            .bind(auth.id)
            .bind(&file.filename)
            .bind(&file.mime_type)
            .bind(file.size as i64)
            .bind(file.disk_path.to_string_lossy().to_string())
            .fetch_one(&mut *tx)
            .await?;

            saved.push(record);
        }

        tx.commit().await?;
        Ok::<_, AppError>(saved)
    }
    .await;

    let saved = match persisted {
        Ok(saved) => saved,
        Err(e) => {
            discard_blobs(&pending).await;
            return Err(e);
        }
    };

    Ok(HttpResponse::Created().json(json!({ "ok": true, "data": saved })))
}

/// Lists a task's attachments newest first, soft-deleted records excluded.
#[get("/task/{task_id}")]
pub async fn get_task_files(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let task = policy::load_task_for(&pool, task_id.into_inner(), auth.id).await?;

    let files = sqlx::query_as::<_, FileRecord>(&format!(
        "SELECT {} FROM files WHERE task_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC",
        FILE_COLUMNS
    ))
    .bind(task.id)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "data": files })))
}

/// Downloads an attachment as `Content-Disposition: attachment` under its
/// original filename.
///
/// Metadata and the on-disk blob may diverge; both are checked, and either
/// one missing is a 404.
#[get("/download/{id}")]
pub async fn download_file(
    pool: web::Data<PgPool>,
    file_id: web::Path<Uuid>,
    auth: AuthUser,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let record = load_file(&pool, file_id.into_inner()).await?;

    policy::load_task_for(&pool, record.task_id, auth.id).await?;

    if tokio::fs::metadata(&record.storage_path).await.is_err() {
        return Err(AppError::NotFound("File missing on disk".into()));
    }

    let file = NamedFile::open_async(&record.storage_path)
        .await?
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(record.filename.clone())],
        });

    Ok(file.into_response(&req))
}

/// Deletes an attachment: the blob is hard-removed from disk, the metadata
/// row only soft-deleted. A blob that is already gone is not an error; any
/// other disk failure aborts before the metadata is touched.
#[delete("/{id}")]
pub async fn delete_file(
    pool: web::Data<PgPool>,
    file_id: web::Path<Uuid>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let record = load_file(&pool, file_id.into_inner()).await?;

    policy::load_task_for(&pool, record.task_id, auth.id).await?;

    match tokio::fs::remove_file(&record.storage_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    sqlx::query("UPDATE files SET deleted_at = now() WHERE id = $1")
        .bind(record.id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "File deleted successfully" })))
}
