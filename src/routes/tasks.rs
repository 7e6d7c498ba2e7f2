use crate::{
    auth::AuthUser,
    error::AppError,
    models::{BulkCreateRequest, BulkError, Task, TaskInput, TaskPriority, TaskQuery, TaskStatus, TaskUpdate},
    policy::{self, visibility_clause, TASK_COLUMNS},
    security::sanitize_text,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Builds the WHERE clause for task listing: soft-delete exclusion plus the
/// visibility predicate (always, bound at `$1`), then one condition per
/// supplied filter. Returns the clause and the number of the next free
/// bind parameter.
fn build_list_filter(query: &TaskQuery) -> (String, usize) {
    let mut clause = visibility_clause(1);
    let mut param = 2;

    if query.status.is_some() {
        clause.push_str(&format!(" AND status = ${}", param));
        param += 1;
    }
    if query.priority.is_some() {
        clause.push_str(&format!(" AND priority = ${}", param));
        param += 1;
    }
    if query.tag.is_some() {
        clause.push_str(&format!(" AND ${} = ANY(tags)", param));
        param += 1;
    }
    if query.assigned.is_some() {
        clause.push_str(&format!(" AND ${} = ANY(assigned_to)", param));
        param += 1;
    }
    if query.q.is_some() {
        // One parameter, matched against both free-text columns.
        clause.push_str(&format!(
            " AND (title ILIKE ${p} OR description ILIKE ${p})",
            p = param
        ));
        param += 1;
    }

    (clause, param)
}

/// Lists tasks visible to the caller.
///
/// Supports equality filters (`status`, `priority`, `tag`, `assigned`), a
/// case-insensitive substring search (`q`) over title and description, and
/// skip/limit pagination. The `total` in the response meta is counted with
/// the same filter, without pagination.
#[get("")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    query: web::Query<TaskQuery>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;

    let (filter, param) = build_list_filter(&query);

    let list_sql = format!(
        "SELECT {} FROM tasks WHERE {} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
        TASK_COLUMNS,
        filter,
        param,
        param + 1
    );
    let count_sql = format!("SELECT COUNT(*) FROM tasks WHERE {}", filter);

    let mut list_query = sqlx::query_as::<_, Task>(&list_sql).bind(auth.id);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(auth.id);

    if let Some(status) = query.status {
        list_query = list_query.bind(status);
        count_query = count_query.bind(status);
    }
    if let Some(priority) = query.priority {
        list_query = list_query.bind(priority);
        count_query = count_query.bind(priority);
    }
    if let Some(tag) = &query.tag {
        list_query = list_query.bind(tag.clone());
        count_query = count_query.bind(tag.clone());
    }
    if let Some(assigned) = query.assigned {
        list_query = list_query.bind(assigned);
        count_query = count_query.bind(assigned);
    }
    if let Some(q) = &query.q {
        let pattern = format!("%{}%", q);
        list_query = list_query.bind(pattern.clone());
        count_query = count_query.bind(pattern);
    }

    let tasks = list_query.bind(limit).bind(offset).fetch_all(&**pool).await?;
    let total = count_query.fetch_one(&**pool).await?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "data": tasks,
        "meta": { "total": total, "page": page, "limit": limit }
    })))
}

/// Creates a task owned by the caller.
///
/// `status` defaults to `open` and `priority` to `medium`; free-text fields
/// are sanitized against script injection before persisting.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    task_data: web::Json<TaskInput>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let input = task_data.into_inner();

    let task = insert_task(
        &pool,
        auth.id,
        &input.title,
        input.description.as_deref().unwrap_or(""),
        input.status.unwrap_or(TaskStatus::Open),
        input.priority.unwrap_or(TaskPriority::Medium),
        input.due_date,
        input.tags.unwrap_or_default(),
        input.assigned_to.unwrap_or_default(),
    )
    .await?;

    Ok(HttpResponse::Created().json(json!({ "ok": true, "data": task })))
}

#[allow(clippy::too_many_arguments)]
async fn insert_task(
    pool: &PgPool,
    created_by: i32,
    title: &str,
    description: &str,
    status: TaskStatus,
    priority: TaskPriority,
    due_date: Option<chrono::DateTime<chrono::Utc>>,
    tags: Vec<String>,
    assigned_to: Vec<i32>,
) -> Result<Task, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (id, title, description, status, priority, due_date, tags, assigned_to, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(sanitize_text(title))
    .bind(sanitize_text(description))
    .bind(status)
    .bind(priority)
    .bind(due_date)
    .bind(tags)
    .bind(assigned_to)
    .bind(created_by)
    .fetch_one(pool)
    .await?;

    Ok(task)
}

/// Fetches one task; 404 when missing or soft-deleted, 403 when the caller
/// is neither creator nor assignee.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let task = policy::load_task_for(&pool, task_id.into_inner(), auth.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "data": task })))
}

/// Updates a task. Only whitelisted fields (title, description, status,
/// priority, due_date, tags, assigned_to) can change; anything else in the
/// payload is ignored. Concurrent updates are last-write-wins.
#[put("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskUpdate>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let update = task_data.into_inner();

    let mut task = policy::load_task_for(&pool, task_id.into_inner(), auth.id).await?;

    if let Some(title) = update.title {
        task.title = sanitize_text(&title);
    }
    if let Some(description) = update.description {
        task.description = sanitize_text(&description);
    }
    if let Some(status) = update.status {
        task.status = status;
    }
    if let Some(priority) = update.priority {
        task.priority = priority;
    }
    if let Some(due_date) = update.due_date {
        task.due_date = Some(due_date);
    }
    if let Some(tags) = update.tags {
        task.tags = tags;
    }
    if let Some(assigned_to) = update.assigned_to {
        task.assigned_to = assigned_to;
    }

    let task = sqlx::query_as::<_, Task>(&format!(
        "UPDATE tasks SET title = $1, description = $2, status = $3, priority = $4, \
         due_date = $5, tags = $6, assigned_to = $7, updated_at = now() \
         WHERE id = $8 RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status)
    .bind(task.priority)
    .bind(task.due_date)
    .bind(&task.tags)
    .bind(&task.assigned_to)
    .bind(task.id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "data": task })))
}

/// Soft-deletes a task by setting `deleted_at`. The row is never removed.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let task = policy::load_task_for(&pool, task_id.into_inner(), auth.id).await?;

    sqlx::query("UPDATE tasks SET deleted_at = now() WHERE id = $1")
        .bind(task.id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "Task deleted" })))
}

/// Creates a batch of tasks, item by item. A failing item (missing or blank
/// title) is recorded with its index and does not abort the rest.
#[post("/bulk")]
pub async fn bulk_create(
    pool: web::Data<PgPool>,
    request: web::Json<BulkCreateRequest>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let items = request.into_inner().tasks;
    if items.is_empty() {
        return Err(AppError::Validation("Tasks must be a non-empty array".into()));
    }

    let mut created = Vec::new();
    let mut errors: Vec<BulkError> = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        let title = match item.title {
            Some(ref title) if !title.trim().is_empty() => title.clone(),
            _ => {
                errors.push(BulkError {
                    index,
                    reason: "Title required".into(),
                });
                continue;
            }
        };

        let task = insert_task(
            &pool,
            auth.id,
            &title,
            item.description.as_deref().unwrap_or(""),
            item.status.unwrap_or(TaskStatus::Open),
            item.priority.unwrap_or(TaskPriority::Medium),
            item.due_date,
            item.tags.unwrap_or_default(),
            item.assigned_to.unwrap_or_default(),
        )
        .await?;

        created.push(json!({
            "id": task.id,
            "title": task.title,
            "status": task.status
        }));
    }

    Ok(HttpResponse::Created().json(json!({
        "ok": true,
        "message": "Bulk create completed",
        "createdCount": created.len(),
        "failedCount": errors.len(),
        "created": created,
        "errors": errors
    })))
}
