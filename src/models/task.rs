use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
    Archived,
}

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// A task as stored in the database and returned by the API.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    /// User ids this task is assigned to.
    pub assigned_to: Vec<i32>,
    /// User id of the creator.
    pub created_by: i32,
    /// Soft-delete marker; a non-null value hides the task everywhere.
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// True iff `user_id` created the task or is one of its assignees.
    pub fn is_accessible_by(&self, user_id: i32) -> bool {
        self.created_by == user_id || self.assigned_to.contains(&user_id)
    }
}

/// Payload for creating a task. `status` and `priority` fall back to their
/// documented defaults (`open`, `medium`) when omitted.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub assigned_to: Option<Vec<i32>>,
}

/// Payload for updating a task. Only the whitelisted fields present here can
/// be mutated; anything else in the request body is ignored by serde.
#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub assigned_to: Option<Vec<i32>>,
}

/// Query parameters accepted by `GET /api/tasks`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Free-text search over title and description, case-insensitive.
    pub q: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub tag: Option<String>,
    /// Filter to tasks assigned to this user id.
    pub assigned: Option<i32>,
}

/// One item of a `POST /api/tasks/bulk` request. Unlike `TaskInput`, `title`
/// is optional at the type level so a missing title is recorded per item
/// instead of failing deserialization of the whole batch.
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub assigned_to: Option<Vec<i32>>,
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateRequest {
    pub tasks: Vec<BulkTaskInput>,
}

/// Per-item failure in a bulk create response.
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkError {
    pub index: usize,
    pub reason: String,
}
