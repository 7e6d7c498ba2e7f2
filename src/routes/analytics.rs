use crate::{auth::AuthUser, error::AppError, policy::visibility_clause};
use actix_web::{get, web, HttpResponse, Responder};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use crate::models::{TaskPriority, TaskStatus};

/// Bucketing granularity for `GET /api/analytics/trends`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    /// The Postgres `to_char` pattern for this bucket size. Chosen from a
    /// fixed set, never from user text, so it is safe to splice into SQL.
    fn to_char_pattern(self) -> &'static str {
        match self {
            Granularity::Day => "YYYY-MM-DD",
            Granularity::Week => "IYYY-IW",
            Granularity::Month => "YYYY-MM",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub granularity: Option<Granularity>,
}

/// Resolves the reporting window: an absent range defaults to the trailing
/// 30 days ending now.
fn resolve_range(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (from.unwrap_or(now - Duration::days(30)), to.unwrap_or(now))
}

/// Counts the caller's visible tasks grouped by status and by priority.
#[get("/overview")]
pub async fn overview(pool: web::Data<PgPool>, auth: AuthUser) -> Result<impl Responder, AppError> {
    let by_status: Vec<(TaskStatus, i64)> = sqlx::query_as(&format!(
        "SELECT status, COUNT(*) FROM tasks WHERE {} GROUP BY status",
        visibility_clause(1)
    ))
    .bind(auth.id)
    .fetch_all(&**pool)
    .await?;

    let by_priority: Vec<(TaskPriority, i64)> = sqlx::query_as(&format!(
        "SELECT priority, COUNT(*) FROM tasks WHERE {} GROUP BY priority",
        visibility_clause(1)
    ))
    .bind(auth.id)
    .fetch_all(&**pool)
    .await?;

    let by_status: Vec<_> = by_status
        .into_iter()
        .map(|(status, count)| json!({ "status": status, "count": count }))
        .collect();
    let by_priority: Vec<_> = by_priority
        .into_iter()
        .map(|(priority, count)| json!({ "priority": priority, "count": count }))
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "data": { "byStatus": by_status, "byPriority": by_priority }
    })))
}

/// Reports completed and overdue counts for tasks assigned to a user.
/// Accessible only to that user themself or an admin.
#[get("/user/{user_id}")]
pub async fn user_performance(
    pool: web::Data<PgPool>,
    target: web::Path<i32>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let target = target.into_inner();

    if !auth.is_admin() && auth.id != target {
        return Err(AppError::Forbidden(
            "Cannot access another user's performance".into(),
        ));
    }

    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tasks \
         WHERE deleted_at IS NULL AND $1 = ANY(assigned_to) AND status = 'done'",
    )
    .bind(target)
    .fetch_one(&**pool)
    .await?;

    let overdue: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tasks \
         WHERE deleted_at IS NULL AND $1 = ANY(assigned_to) \
         AND status <> 'done' AND due_date < now()",
    )
    .bind(target)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "data": { "tasksCompleted": completed, "overdue": overdue }
    })))
}

/// Buckets the caller's visible tasks by creation time.
///
/// Granularity defaults to `day`, the range to the trailing 30 days, and
/// buckets come back in ascending time order.
#[get("/trends")]
pub async fn trends(
    pool: web::Data<PgPool>,
    query: web::Query<TrendsQuery>,
    auth: AuthUser,
) -> Result<impl Responder, AppError> {
    let granularity = query.granularity.unwrap_or(Granularity::Day);
    let (from, to) = resolve_range(query.from, query.to, Utc::now());

    let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
        "SELECT to_char(created_at, '{}') AS bucket, COUNT(*) FROM tasks \
         WHERE {} AND created_at >= $2 AND created_at <= $3 \
         GROUP BY bucket ORDER BY bucket ASC",
        granularity.to_char_pattern(),
        visibility_clause(1)
    ))
    .bind(auth.id)
    .bind(from)
    .bind(to)
    .fetch_all(&**pool)
    .await?;

    let data: Vec<_> = rows
        .into_iter()
        .map(|(bucket, count)| json!({ "bucket": bucket, "count": count }))
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "data": data })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_range_is_trailing_thirty_days() {
        let now = Utc::now();
        let (from, to) = resolve_range(None, None, now);
        assert_eq!(to, now);
        assert_eq!(now - from, Duration::days(30));
    }

    #[test]
    fn test_explicit_range_is_kept() {
        let now = Utc::now();
        let from = now - Duration::days(7);
        let to = now - Duration::days(1);
        assert_eq!(resolve_range(Some(from), Some(to), now), (from, to));
    }

    #[test]
    fn test_granularity_patterns() {
        assert_eq!(Granularity::Day.to_char_pattern(), "YYYY-MM-DD");
        assert_eq!(Granularity::Week.to_char_pattern(), "IYYY-IW");
        assert_eq!(Granularity::Month.to_char_pattern(), "YYYY-MM");
    }

    #[test]
    fn test_granularity_deserializes_lowercase() {
        let g: Granularity = serde_json::from_str("\"week\"").unwrap();
        assert_eq!(g, Granularity::Week);
    }
}
