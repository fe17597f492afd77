use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::{can_view_record, ensure_can_review, list_scope};
use crate::db;
use crate::db::models::{DailyReport, EntityType, NotificationPriority, ReportStatus};
use crate::db::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::query::{order_clause, Pagination, WhereBuilder};
use crate::services::notify;

const SORTABLE: &[&str] = &["report_date", "status", "created_at"];

fn parse_status(report: &DailyReport) -> Result<ReportStatus, ApiError> {
    ReportStatus::parse(&report.status).ok_or_else(|| {
        tracing::error!("Report {} has unknown status '{}'", report.id, report.status);
        ApiError::internal_server_error("Record is in an unknown state")
    })
}

fn trimmed(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub user_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/reports
pub async fn list(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ReportListQuery>,
) -> ApiResult<Vec<DailyReport>> {
    let scope = list_scope(&current, query.user_id, query.department_id)?;

    let mut wb = WhereBuilder::new();
    wb.maybe_eq_uuid("user_id", scope.user_id)
        .maybe_eq_text("status", query.status.as_deref())
        .maybe_date_from("report_date", query.from)
        .maybe_date_to("report_date", query.to);
    if let Some(department) = scope.department_id {
        wb.department_members("user_id", department);
    }

    let order = order_clause(query.order.as_deref(), SORTABLE, "report_date desc")?;
    let page = Pagination::new(query.limit, query.offset)?;

    let pool = db::pool().await?;
    let reports = Repository::<DailyReport>::new("daily_reports", pool.clone())
        .select_where(&wb, &order, &page)
        .await?;

    Ok(ApiResponse::success(reports))
}

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub report_date: NaiveDate,
    #[serde(default)]
    pub tasks_completed: Vec<String>,
    #[serde(default)]
    pub accomplishments: Vec<String>,
    #[serde(default)]
    pub challenges: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// POST /api/reports - one per user per day
pub async fn create(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateReportRequest>,
) -> ApiResult<DailyReport> {
    let tasks_completed = trimmed(payload.tasks_completed);
    let accomplishments = trimmed(payload.accomplishments);
    let challenges = trimmed(payload.challenges);
    if tasks_completed.is_empty() && accomplishments.is_empty() {
        return Err(ApiError::unprocessable_entity(
            "Report needs at least one completed task or accomplishment",
        ));
    }

    let pool = db::pool().await?;
    let report: DailyReport = sqlx::query_as(
        "INSERT INTO daily_reports \
         (user_id, report_date, tasks_completed, accomplishments, challenges, notes) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(current.id)
    .bind(payload.report_date)
    .bind(&tasks_completed)
    .bind(&accomplishments)
    .bind(&challenges)
    .bind(payload.notes.trim())
    .fetch_one(pool)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(_) => {
            ApiError::conflict(format!("A report for {} already exists", payload.report_date))
        }
        other => other,
    })?;

    Ok(ApiResponse::created(report))
}

/// GET /api/reports/:id
pub async fn get(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<DailyReport> {
    let pool = db::pool().await?;
    let report = Repository::<DailyReport>::new("daily_reports", pool.clone())
        .select_404(id)
        .await?;

    let department: Option<Option<Uuid>> =
        sqlx::query_scalar("SELECT department_id FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(report.user_id)
            .fetch_optional(pool)
            .await?;
    if !can_view_record(&current, report.user_id, department.flatten()) {
        return Err(ApiError::forbidden("Not allowed to view this report"));
    }

    Ok(ApiResponse::success(report))
}

#[derive(Debug, Deserialize)]
pub struct UpdateReportRequest {
    pub tasks_completed: Option<Vec<String>>,
    pub accomplishments: Option<Vec<String>>,
    pub challenges: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// PUT /api/reports/:id - author amends until reviewed
pub async fn update(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReportRequest>,
) -> ApiResult<DailyReport> {
    let pool = db::pool().await?;
    let repo = Repository::<DailyReport>::new("daily_reports", pool.clone());
    let report = repo.select_404(id).await?;

    if report.user_id != current.id {
        return Err(ApiError::forbidden("Only the author can edit a report"));
    }
    if !parse_status(&report)?.can_edit() {
        return Err(ApiError::conflict("Report has already been reviewed"));
    }

    let updated: DailyReport = sqlx::query_as(
        "UPDATE daily_reports SET \
         tasks_completed = COALESCE($2, tasks_completed), \
         accomplishments = COALESCE($3, accomplishments), \
         challenges = COALESCE($4, challenges), \
         notes = COALESCE($5, notes), \
         updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.tasks_completed.map(trimmed))
    .bind(payload.accomplishments.map(trimmed))
    .bind(payload.challenges.map(trimmed))
    .bind(payload.notes.as_deref().map(str::trim))
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success(updated))
}

#[derive(Debug, Deserialize, Default)]
pub struct ReviewReportRequest {
    pub note: Option<String>,
}

/// POST /api/reports/:id/review - lead/manager/admin marks reviewed and the
/// author is notified
pub async fn review(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReviewReportRequest>>,
) -> ApiResult<DailyReport> {
    let note = payload.and_then(|Json(p)| p.note);
    let pool = db::pool().await?;
    let repo = Repository::<DailyReport>::new("daily_reports", pool.clone());
    let report = repo.select_404(id).await?;

    ensure_can_review(pool, &current, report.user_id).await?;
    if !parse_status(&report)?.can_review() {
        return Err(ApiError::conflict("Report has already been reviewed"));
    }

    let updated: DailyReport = sqlx::query_as(
        "UPDATE daily_reports SET status = $2, review_note = $3, reviewed_by = $4, \
         reviewed_at = now(), updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(ReportStatus::Reviewed.as_str())
    .bind(note.as_deref())
    .bind(current.id)
    .fetch_one(pool)
    .await?;

    if updated.user_id != current.id {
        notify::notify(
            pool,
            updated.user_id,
            "Report reviewed",
            &format!("Your daily report for {} was reviewed", updated.report_date),
            NotificationPriority::Normal,
            Some((EntityType::Report, updated.id)),
        )
        .await?;
    }

    Ok(ApiResponse::success(updated))
}
