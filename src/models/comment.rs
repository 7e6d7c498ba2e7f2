use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A comment on a task. `parent_id` points at another comment of the same
/// task for reply threading and is immutable after creation, which is what
/// keeps reply chains acyclic.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: i32,
    pub body: String,
    pub parent_id: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Payload for `POST /api/comments/tasks/:taskId`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentInput {
    pub body: String,
    pub parent_id: Option<Uuid>,
}

/// Payload for `PUT /api/comments/:id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentUpdate {
    pub body: String,
}
