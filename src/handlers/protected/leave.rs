use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{can_view_record, ensure_can_review, list_scope};
use crate::db;
use crate::db::models::{
    EntityType, LeaveRequest, LeaveStatus, LeaveType, NotificationPriority, Settings,
};
use crate::db::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::query::{order_clause, Pagination, WhereBuilder};
use crate::services::leave::{self, LeaveBalance};
use crate::services::notify;

const SORTABLE: &[&str] = &["start_date", "end_date", "status", "leave_type", "created_at"];

fn parse_status(request: &LeaveRequest) -> Result<LeaveStatus, ApiError> {
    LeaveStatus::parse(&request.status).ok_or_else(|| {
        tracing::error!("Leave request {} has unknown status '{}'", request.id, request.status);
        ApiError::internal_server_error("Record is in an unknown state")
    })
}

async fn fetch_settings(pool: &PgPool) -> Result<Settings, ApiError> {
    let settings: Settings = sqlx::query_as("SELECT * FROM settings WHERE id = 1")
        .fetch_one(pool)
        .await?;
    Ok(settings)
}

#[derive(Debug, Deserialize)]
pub struct LeaveListQuery {
    pub user_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub status: Option<String>,
    pub leave_type: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/leave
pub async fn list(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<LeaveListQuery>,
) -> ApiResult<Vec<LeaveRequest>> {
    let scope = list_scope(&current, query.user_id, query.department_id)?;

    let mut wb = WhereBuilder::new();
    wb.maybe_eq_uuid("user_id", scope.user_id)
        .maybe_eq_text("status", query.status.as_deref())
        .maybe_eq_text("leave_type", query.leave_type.as_deref())
        .maybe_date_from("start_date", query.from)
        .maybe_date_to("end_date", query.to);
    if let Some(department) = scope.department_id {
        wb.department_members("user_id", department);
    }

    let order = order_clause(query.order.as_deref(), SORTABLE, "start_date desc")?;
    let page = Pagination::new(query.limit, query.offset)?;

    let pool = db::pool().await?;
    let requests = Repository::<LeaveRequest>::new("leave_requests", pool.clone())
        .select_where(&wb, &order, &page)
        .await?;

    Ok(ApiResponse::success(requests))
}

#[derive(Debug, Deserialize)]
pub struct CreateLeaveRequest {
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: String,
}

/// POST /api/leave - request leave for the calling user. Spans are checked
/// against overlapping requests and the remaining balance before insert.
pub async fn create(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateLeaveRequest>,
) -> ApiResult<LeaveRequest> {
    let leave_type = LeaveType::parse(&payload.leave_type).ok_or_else(|| {
        ApiError::unprocessable_entity(format!("Unknown leave type: {}", payload.leave_type))
    })?;

    if payload.end_date < payload.start_date {
        return Err(ApiError::unprocessable_entity("End date must not precede start date"));
    }

    let days = leave::business_days(payload.start_date, payload.end_date);
    if days == 0 {
        return Err(ApiError::unprocessable_entity("Span contains no working days"));
    }

    let pool = db::pool().await?;

    if leave::has_overlap(pool, current.id, payload.start_date, payload.end_date).await? {
        return Err(ApiError::conflict("Overlaps an existing pending or approved request"));
    }

    // Balance check against the allocation year the leave starts in
    let settings = fetch_settings(pool).await?;
    if settings.allocation_for(leave_type).is_some() {
        let (year_start, year_end) = leave::year_bounds(payload.start_date.year())
            .ok_or_else(|| ApiError::bad_request("Invalid start date"))?;
        let balances =
            leave::balances_for_user(pool, &settings, current.id, year_start, year_end).await?;
        let remaining = balances
            .iter()
            .find(|b| b.leave_type == leave_type)
            .and_then(|b| b.remaining)
            .unwrap_or(0);
        if days > remaining {
            return Err(ApiError::unprocessable_entity(format!(
                "Insufficient {} balance: requested {} day(s), {} remaining",
                leave_type.as_str(),
                days,
                remaining.max(0)
            )));
        }
    }

    let request: LeaveRequest = sqlx::query_as(
        "INSERT INTO leave_requests (user_id, leave_type, start_date, end_date, days, reason) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(current.id)
    .bind(leave_type.as_str())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(days as i32)
    .bind(payload.reason.trim())
    .fetch_one(pool)
    .await?;

    // Best effort: tell the department manager
    if let Some(department) = current.department_id {
        let manager: Option<Option<Uuid>> = sqlx::query_scalar(
            "SELECT manager_id FROM departments WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(department)
        .fetch_optional(pool)
        .await?;
        if let Some(Some(manager_id)) = manager {
            if manager_id != current.id {
                notify::notify(
                    pool,
                    manager_id,
                    "Leave requested",
                    &format!(
                        "{} {} requested {} day(s) of {} leave ({} to {})",
                        current.first_name,
                        current.last_name,
                        days,
                        leave_type.as_str(),
                        request.start_date,
                        request.end_date
                    ),
                    NotificationPriority::Normal,
                    Some((EntityType::Leave, request.id)),
                )
                .await?;
            }
        }
    }

    Ok(ApiResponse::created(request))
}

/// GET /api/leave/:id
pub async fn get(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<LeaveRequest> {
    let pool = db::pool().await?;
    let request = Repository::<LeaveRequest>::new("leave_requests", pool.clone())
        .select_404(id)
        .await?;

    let department: Option<Option<Uuid>> =
        sqlx::query_scalar("SELECT department_id FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(request.user_id)
            .fetch_optional(pool)
            .await?;
    if !can_view_record(&current, request.user_id, department.flatten()) {
        return Err(ApiError::forbidden("Not allowed to view this leave request"));
    }

    Ok(ApiResponse::success(request))
}

#[derive(Debug, Deserialize, Default)]
pub struct ReviewRequest {
    pub note: Option<String>,
}

async fn review_leave(
    pool: &PgPool,
    current: &CurrentUser,
    id: Uuid,
    approve: bool,
    note: Option<&str>,
) -> Result<LeaveRequest, ApiError> {
    let request = Repository::<LeaveRequest>::new("leave_requests", pool.clone())
        .select_404(id)
        .await?;

    ensure_can_review(pool, current, request.user_id).await?;
    if !parse_status(&request)?.can_review() {
        return Err(ApiError::conflict(format!(
            "Cannot review a leave request in '{}' status",
            request.status
        )));
    }

    let status = if approve { LeaveStatus::Approved } else { LeaveStatus::Rejected };
    let updated: LeaveRequest = sqlx::query_as(
        "UPDATE leave_requests SET status = $2, review_note = $3, reviewed_by = $4, \
         reviewed_at = now(), updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(note)
    .bind(current.id)
    .fetch_one(pool)
    .await?;

    let (title, priority) = if approve {
        ("Leave approved", NotificationPriority::Normal)
    } else {
        ("Leave rejected", NotificationPriority::High)
    };
    notify::notify(
        pool,
        updated.user_id,
        title,
        &format!(
            "Your {} leave from {} to {} was {}",
            updated.leave_type, updated.start_date, updated.end_date, updated.status
        ),
        priority,
        Some((EntityType::Leave, updated.id)),
    )
    .await?;

    Ok(updated)
}

/// POST /api/leave/:id/approve - note is optional, body may be absent
pub async fn approve(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReviewRequest>>,
) -> ApiResult<LeaveRequest> {
    let note = payload.and_then(|Json(p)| p.note);
    let pool = db::pool().await?;
    let updated = review_leave(pool, &current, id, true, note.as_deref()).await?;
    Ok(ApiResponse::success(updated))
}

/// POST /api/leave/:id/reject
pub async fn reject(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReviewRequest>>,
) -> ApiResult<LeaveRequest> {
    let note = payload.and_then(|Json(p)| p.note);
    let pool = db::pool().await?;
    let updated = review_leave(pool, &current, id, false, note.as_deref()).await?;
    Ok(ApiResponse::success(updated))
}

/// POST /api/leave/:id/cancel - owner withdraws a pending request, or an
/// approved one that has not started yet
pub async fn cancel(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<LeaveRequest> {
    let pool = db::pool().await?;
    let request = Repository::<LeaveRequest>::new("leave_requests", pool.clone())
        .select_404(id)
        .await?;

    if request.user_id != current.id {
        return Err(ApiError::forbidden("Only the owner can cancel a leave request"));
    }
    let status = parse_status(&request)?;
    if !status.can_cancel() {
        return Err(ApiError::conflict(format!(
            "Cannot cancel a leave request in '{}' status",
            request.status
        )));
    }
    if status == LeaveStatus::Approved && request.start_date <= Utc::now().date_naive() {
        return Err(ApiError::conflict("Leave has already started"));
    }

    let updated: LeaveRequest = sqlx::query_as(
        "UPDATE leave_requests SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(LeaveStatus::Cancelled.as_str())
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success(updated))
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub user_id: Option<Uuid>,
    pub year: Option<i32>,
}

/// GET /api/leave/balance - own balance per type; reviewers may pass
/// `?user_id=` for someone in their scope
pub async fn balance(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<BalanceQuery>,
) -> ApiResult<Vec<LeaveBalance>> {
    let pool = db::pool().await?;

    let user_id = match query.user_id {
        Some(target) if target != current.id => {
            ensure_can_review(pool, &current, target).await?;
            target
        }
        _ => current.id,
    };

    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let (year_start, year_end) =
        leave::year_bounds(year).ok_or_else(|| ApiError::bad_request("Invalid year"))?;

    let settings = fetch_settings(pool).await?;
    let balances =
        leave::balances_for_user(pool, &settings, user_id, year_start, year_end).await?;

    Ok(ApiResponse::success(balances))
}
