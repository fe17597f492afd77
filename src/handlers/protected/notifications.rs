use axum::extract::{Path, Query};
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db;
use crate::db::models::Notification;
use crate::db::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::query::{Pagination, WhereBuilder};

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    pub unread: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/notifications - own notifications, newest first
pub async fn list(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<NotificationListQuery>,
) -> ApiResult<Vec<Notification>> {
    let mut wb = WhereBuilder::without_delete_guard();
    wb.eq_uuid("user_id", current.id);
    if query.unread.unwrap_or(false) {
        wb.eq_bool("read", false);
    }

    let page = Pagination::new(query.limit, query.offset)?;

    let pool = db::pool().await?;
    let notifications = Repository::<Notification>::new("notifications", pool.clone())
        .select_where(&wb, "ORDER BY \"created_at\" DESC", &page)
        .await?;

    Ok(ApiResponse::success(notifications))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(Extension(current): Extension<CurrentUser>) -> ApiResult<Value> {
    let pool = db::pool().await?;
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = false",
    )
    .bind(current.id)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success(json!({ "unread": count })))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Notification> {
    let pool = db::pool().await?;
    let notification: Option<Notification> = sqlx::query_as(
        "UPDATE notifications SET read = true WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(current.id)
    .fetch_optional(pool)
    .await?;

    let notification =
        notification.ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(ApiResponse::success(notification))
}

/// POST /api/notifications/read-all
pub async fn read_all(Extension(current): Extension<CurrentUser>) -> ApiResult<Value> {
    let pool = db::pool().await?;
    let result = sqlx::query(
        "UPDATE notifications SET read = true WHERE user_id = $1 AND read = false",
    )
    .bind(current.id)
    .execute(pool)
    .await?;

    Ok(ApiResponse::success(json!({ "updated": result.rows_affected() })))
}

/// DELETE /api/notifications/:id - hard delete, notifications are ephemeral
pub async fn remove(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let pool = db::pool().await?;
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(current.id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }

    Ok(ApiResponse::no_content())
}
