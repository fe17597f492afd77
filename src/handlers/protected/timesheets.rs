use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{can_view_record, ensure_can_review, list_scope};
use crate::db;
use crate::db::models::{EntityType, NotificationPriority, Timesheet, TimesheetStatus};
use crate::db::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::query::{order_clause, Pagination, WhereBuilder};
use crate::services::notify;

const SORTABLE: &[&str] = &["work_date", "status", "hours", "created_at"];

fn validate_hours(hours: Decimal) -> Result<(), ApiError> {
    if hours <= Decimal::ZERO || hours > Decimal::from(24) {
        return Err(ApiError::unprocessable_entity("Hours must be between 0 and 24"));
    }
    Ok(())
}

fn parse_status(timesheet: &Timesheet) -> Result<TimesheetStatus, ApiError> {
    TimesheetStatus::parse(&timesheet.status).ok_or_else(|| {
        tracing::error!("Timesheet {} has unknown status '{}'", timesheet.id, timesheet.status);
        ApiError::internal_server_error("Record is in an unknown state")
    })
}

async fn owner_department(pool: &PgPool, user_id: Uuid) -> Result<Option<Uuid>, ApiError> {
    let department: Option<Option<Uuid>> =
        sqlx::query_scalar("SELECT department_id FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(department.flatten())
}

#[derive(Debug, Deserialize)]
pub struct TimesheetListQuery {
    pub user_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub status: Option<String>,
    pub project_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/timesheets
pub async fn list(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<TimesheetListQuery>,
) -> ApiResult<Vec<Timesheet>> {
    let scope = list_scope(&current, query.user_id, query.department_id)?;

    let mut wb = WhereBuilder::new();
    wb.maybe_eq_uuid("user_id", scope.user_id)
        .maybe_eq_text("status", query.status.as_deref())
        .maybe_eq_uuid("project_id", query.project_id)
        .maybe_date_from("work_date", query.from)
        .maybe_date_to("work_date", query.to);
    if let Some(department) = scope.department_id {
        wb.department_members("user_id", department);
    }

    let order = order_clause(query.order.as_deref(), SORTABLE, "work_date desc")?;
    let page = Pagination::new(query.limit, query.offset)?;

    let pool = db::pool().await?;
    let timesheets = Repository::<Timesheet>::new("timesheets", pool.clone())
        .select_where(&wb, &order, &page)
        .await?;

    Ok(ApiResponse::success(timesheets))
}

#[derive(Debug, Deserialize)]
pub struct CreateTimesheetRequest {
    pub work_date: NaiveDate,
    pub hours: Decimal,
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
}

/// POST /api/timesheets - create a draft for the calling user. One per day:
/// duplicates come back as 409 via the partial unique index.
pub async fn create(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateTimesheetRequest>,
) -> ApiResult<Timesheet> {
    validate_hours(payload.hours)?;

    let pool = db::pool().await?;
    let timesheet: Timesheet = sqlx::query_as(
        "INSERT INTO timesheets (user_id, work_date, hours, project_id, description) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(current.id)
    .bind(payload.work_date)
    .bind(payload.hours)
    .bind(payload.project_id)
    .bind(payload.description.trim())
    .fetch_one(pool)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(_) => {
            ApiError::conflict(format!("A timesheet for {} already exists", payload.work_date))
        }
        other => other,
    })?;

    Ok(ApiResponse::created(timesheet))
}

/// GET /api/timesheets/:id
pub async fn get(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Timesheet> {
    let pool = db::pool().await?;
    let timesheet = Repository::<Timesheet>::new("timesheets", pool.clone())
        .select_404(id)
        .await?;

    let department = owner_department(pool, timesheet.user_id).await?;
    if !can_view_record(&current, timesheet.user_id, department) {
        return Err(ApiError::forbidden("Not allowed to view this timesheet"));
    }

    Ok(ApiResponse::success(timesheet))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTimesheetRequest {
    pub work_date: Option<NaiveDate>,
    pub hours: Option<Decimal>,
    pub project_id: Option<Uuid>,
    pub description: Option<String>,
}

/// PUT /api/timesheets/:id - owner edits while draft or rejected
pub async fn update(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTimesheetRequest>,
) -> ApiResult<Timesheet> {
    if let Some(hours) = payload.hours {
        validate_hours(hours)?;
    }

    let pool = db::pool().await?;
    let repo = Repository::<Timesheet>::new("timesheets", pool.clone());
    let timesheet = repo.select_404(id).await?;

    if timesheet.user_id != current.id {
        return Err(ApiError::forbidden("Only the owner can edit a timesheet"));
    }
    if !parse_status(&timesheet)?.can_edit() {
        return Err(ApiError::conflict(format!(
            "Cannot edit a timesheet in '{}' status",
            timesheet.status
        )));
    }

    let updated: Timesheet = sqlx::query_as(
        "UPDATE timesheets SET \
         work_date = COALESCE($2, work_date), \
         hours = COALESCE($3, hours), \
         project_id = COALESCE($4, project_id), \
         description = COALESCE($5, description), \
         updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.work_date)
    .bind(payload.hours)
    .bind(payload.project_id)
    .bind(payload.description.as_deref().map(str::trim))
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success(updated))
}

/// POST /api/timesheets/:id/submit - owner sends a draft (or a rejected
/// timesheet again) for review; the department manager is notified.
pub async fn submit(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Timesheet> {
    let pool = db::pool().await?;
    let repo = Repository::<Timesheet>::new("timesheets", pool.clone());
    let timesheet = repo.select_404(id).await?;

    if timesheet.user_id != current.id {
        return Err(ApiError::forbidden("Only the owner can submit a timesheet"));
    }
    if !parse_status(&timesheet)?.can_submit() {
        return Err(ApiError::conflict(format!(
            "Cannot submit a timesheet in '{}' status",
            timesheet.status
        )));
    }

    let updated: Timesheet = sqlx::query_as(
        "UPDATE timesheets SET status = $2, review_note = NULL, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(TimesheetStatus::Submitted.as_str())
    .fetch_one(pool)
    .await?;

    // Best effort: tell the department manager there is something to review
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
                    "Timesheet submitted",
                    &format!(
                        "{} {} submitted a timesheet for {}",
                        current.first_name, current.last_name, updated.work_date
                    ),
                    NotificationPriority::Normal,
                    Some((EntityType::Timesheet, updated.id)),
                )
                .await?;
            }
        }
    }

    Ok(ApiResponse::success(updated))
}

#[derive(Debug, Deserialize, Default)]
pub struct ReviewRequest {
    pub note: Option<String>,
}

async fn review_timesheet(
    pool: &PgPool,
    current: &CurrentUser,
    id: Uuid,
    approve: bool,
    note: Option<&str>,
) -> Result<Timesheet, ApiError> {
    let repo = Repository::<Timesheet>::new("timesheets", pool.clone());
    let timesheet = repo.select_404(id).await?;

    ensure_can_review(pool, current, timesheet.user_id).await?;
    if !parse_status(&timesheet)?.can_review() {
        return Err(ApiError::conflict(format!(
            "Cannot review a timesheet in '{}' status",
            timesheet.status
        )));
    }

    let status = if approve { TimesheetStatus::Approved } else { TimesheetStatus::Rejected };
    let updated: Timesheet = sqlx::query_as(
        "UPDATE timesheets SET status = $2, review_note = $3, reviewed_by = $4, \
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
        ("Timesheet approved", NotificationPriority::Normal)
    } else {
        ("Timesheet rejected", NotificationPriority::High)
    };
    let mut body = format!("Your timesheet for {} was {}", updated.work_date, updated.status);
    if let Some(note) = note {
        if !note.is_empty() {
            body.push_str(&format!(": {}", note));
        }
    }
    notify::notify(
        pool,
        updated.user_id,
        title,
        &body,
        priority,
        Some((EntityType::Timesheet, updated.id)),
    )
    .await?;

    Ok(updated)
}

/// POST /api/timesheets/:id/approve - note is optional, body may be absent
pub async fn approve(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReviewRequest>>,
) -> ApiResult<Timesheet> {
    let note = payload.and_then(|Json(p)| p.note);
    let pool = db::pool().await?;
    let updated = review_timesheet(pool, &current, id, true, note.as_deref()).await?;
    Ok(ApiResponse::success(updated))
}

/// POST /api/timesheets/:id/reject
pub async fn reject(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReviewRequest>>,
) -> ApiResult<Timesheet> {
    let note = payload.and_then(|Json(p)| p.note);
    let pool = db::pool().await?;
    let updated = review_timesheet(pool, &current, id, false, note.as_deref()).await?;
    Ok(ApiResponse::success(updated))
}

#[derive(Debug, Deserialize)]
pub struct BulkApproveRequest {
    pub ids: Vec<Uuid>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkOutcome {
    pub id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/timesheets/bulk-approve - per-id outcomes; one failure does not
/// abort the batch.
pub async fn bulk_approve(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<BulkApproveRequest>,
) -> ApiResult<Vec<BulkOutcome>> {
    if payload.ids.is_empty() {
        return Err(ApiError::bad_request("No timesheet ids given"));
    }
    if !current.role.can_review() {
        return Err(ApiError::forbidden("Reviewer access required"));
    }

    let pool = db::pool().await?;
    let mut outcomes = Vec::with_capacity(payload.ids.len());
    for id in payload.ids {
        match review_timesheet(pool, &current, id, true, payload.note.as_deref()).await {
            Ok(_) => outcomes.push(BulkOutcome { id, success: true, error: None }),
            Err(e) => outcomes.push(BulkOutcome {
                id,
                success: false,
                error: Some(e.message().to_string()),
            }),
        }
    }

    Ok(ApiResponse::success(outcomes))
}

/// DELETE /api/timesheets/:id - owner removes an unsubmitted draft
pub async fn remove(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let pool = db::pool().await?;
    let repo = Repository::<Timesheet>::new("timesheets", pool.clone());
    let timesheet = repo.select_404(id).await?;

    if timesheet.user_id != current.id && !current.role.is_admin() {
        return Err(ApiError::forbidden("Only the owner can delete a timesheet"));
    }
    if !parse_status(&timesheet)?.can_delete() {
        return Err(ApiError::conflict(format!(
            "Cannot delete a timesheet in '{}' status",
            timesheet.status
        )));
    }

    sqlx::query(
        "UPDATE timesheets SET deleted_at = now(), updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(ApiResponse::no_content())
}
