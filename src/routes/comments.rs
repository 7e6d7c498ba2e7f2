use crate::{
    auth::AuthUser,
    error::AppError,
    models::{Comment, CommentInput, CommentUpdate},
    policy,
    security::sanitize_text,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

const COMMENT_COLUMNS: &str = "id, task_id, author_id, body, parent_id, deleted_at, created_at";

async fn load_comment(pool: &PgPool, id: Uuid) -> Result<Comment, AppError> {
    let comment = sqlx::query_as::<_, Comment>(&format!(
        "SELECT {} FROM comments WHERE id = $1 AND deleted_at IS NULL",
        COMMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    comment.ok_or_else(|| AppError::NotFound("Comment not found".into()))
}

/// Adds a comment to a task the caller can access.
///
/// A supplied `parent_id` must reference an existing, non-deleted comment of
/// the same task. Parents therefore always pre-exist and `parent_id` is
/// immutable afterwards, so reply chains cannot form cycles.
#[post("/tasks/{task_id}")]
pub async fn add_comment(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    input: web::Json<CommentInput>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let input = input.into_inner();
    if input.body.trim().is_empty() {
        return Err(AppError::Validation("Comment body required".into()));
    }

    let task = policy::load_task_for(&pool, task_id.into_inner(), auth.id).await?;

    if let Some(parent_id) = input.parent_id {
        let parent = match load_comment(&pool, parent_id).await {
            Ok(parent) => parent,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Validation("Parent comment not found".into()))
            }
            Err(e) => return Err(e),
        };
        if parent.task_id != task.id {
            return Err(AppError::Validation(
                "Parent comment belongs to a different task".into(),
            ));
        }
    }

    let comment = sqlx::query_as::<_, Comment>(&format!(
        "INSERT INTO comments (id, task_id, author_id, body, parent_id) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {}",
        COMMENT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(task.id)
    .bind(auth.id)
    .bind(sanitize_text(&input.body))
    .bind(input.parent_id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(json!({ "ok": true, "data": comment })))
}

/// Lists a task's comments oldest first, soft-deleted ones excluded.
#[get("/tasks/{task_id}")]
pub async fn get_comments(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let task = policy::load_task_for(&pool, task_id.into_inner(), auth.id).await?;

    let comments = sqlx::query_as::<_, Comment>(&format!(
        "SELECT {} FROM comments WHERE task_id = $1 AND deleted_at IS NULL ORDER BY created_at ASC",
        COMMENT_COLUMNS
    ))
    .bind(task.id)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "data": comments })))
}

/// Edits a comment body. Task access is re-checked, and only the author or
/// an admin may edit.
#[put("/{id}")]
pub async fn update_comment(
    pool: web::Data<PgPool>,
    comment_id: web::Path<Uuid>,
    input: web::Json<CommentUpdate>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let input = input.into_inner();
    if input.body.trim().is_empty() {
        return Err(AppError::Validation("Body required".into()));
    }

    let comment = load_comment(&pool, comment_id.into_inner()).await?;

    // Task access may have changed since the comment was written.
    policy::load_task_for(&pool, comment.task_id, auth.id).await?;

    if comment.author_id != auth.id && !auth.is_admin() {
        return Err(AppError::Forbidden("You can only edit your own comment".into()));
    }

    let comment = sqlx::query_as::<_, Comment>(&format!(
        "UPDATE comments SET body = $1 WHERE id = $2 RETURNING {}",
        COMMENT_COLUMNS
    ))
    .bind(sanitize_text(&input.body))
    .bind(comment.id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "data": comment })))
}

/// Soft-deletes a comment, with the same checks as editing.
#[delete("/{id}")]
pub async fn delete_comment(
    pool: web::Data<PgPool>,
    comment_id: web::Path<Uuid>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let comment = load_comment(&pool, comment_id.into_inner()).await?;

    policy::load_task_for(&pool, comment.task_id, auth.id).await?;

    if comment.author_id != auth.id && !auth.is_admin() {
        return Err(AppError::Forbidden(
            "You can only delete your own comment".into(),
        ));
    }

    sqlx::query("UPDATE comments SET deleted_at = now() WHERE id = $1")
        .bind(comment.id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "Comment deleted" })))
}
