//! Central authorization policy.
//!
//! Every task-scoped operation funnels through `load_task_for`: comments and
//! files inherit their parent task's access rule transitively by calling it
//! with the parent task id, re-checked on every operation.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Task;

/// Column list matching the `Task` struct, for `query_as` selects.
pub const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, tags, \
     assigned_to, created_by, deleted_at, created_at, updated_at";

/// SQL fragment restricting a `tasks` query to rows visible to the user bound
/// at `$<param>`: not soft-deleted, and created by or assigned to the user.
pub fn visibility_clause(param: usize) -> String {
    format!(
        "deleted_at IS NULL AND (created_by = ${p} OR ${p} = ANY(assigned_to))",
        p = param
    )
}

/// Loads the task `task_id` on behalf of `user_id`.
///
/// Fails with `NotFound` when the task is missing or soft-deleted, and with
/// `Forbidden` when the caller is neither its creator nor an assignee.
pub async fn load_task_for(
    pool: &PgPool,
    task_id: Uuid,
    user_id: i32,
) -> Result<Task, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE id = $1 AND deleted_at IS NULL",
        TASK_COLUMNS
    ))
    .bind(task_id)
    .fetch_optional(pool)
    .await?;

    let task = task.ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    if !task.is_accessible_by(user_id) {
        return Err(AppError::Forbidden("No access to this task".into()));
    }

    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_clause_reuses_one_parameter() {
        let clause = visibility_clause(3);
        assert_eq!(
            clause,
            "deleted_at IS NULL AND (created_by = $3 OR $3 = ANY(assigned_to))"
        );
    }
}
