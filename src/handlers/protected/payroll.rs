use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::ensure_admin;
use crate::db;
use crate::db::models::{PayrollPeriod, PayrollStatus, Settings};
use crate::db::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::query::{order_clause, Pagination, WhereBuilder};
use crate::services::payroll::{self, PayrollSummary};

const SORTABLE: &[&str] = &["start_date", "end_date", "name", "status", "created_at"];

fn parse_status(period: &PayrollPeriod) -> Result<PayrollStatus, ApiError> {
    PayrollStatus::parse(&period.status).ok_or_else(|| {
        tracing::error!("Payroll period {} has unknown status '{}'", period.id, period.status);
        ApiError::internal_server_error("Record is in an unknown state")
    })
}

async fn overtime_rules(pool: &PgPool) -> Result<Settings, ApiError> {
    let settings: Settings = sqlx::query_as("SELECT * FROM settings WHERE id = 1")
        .fetch_one(pool)
        .await?;
    Ok(settings)
}

#[derive(Debug, Deserialize)]
pub struct PayrollListQuery {
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/payroll (admin)
pub async fn list(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<PayrollListQuery>,
) -> ApiResult<Vec<PayrollPeriod>> {
    ensure_admin(&current)?;

    let mut wb = WhereBuilder::new();
    wb.maybe_eq_text("status", query.status.as_deref())
        .maybe_date_from("start_date", query.from)
        .maybe_date_to("end_date", query.to);

    let order = order_clause(query.order.as_deref(), SORTABLE, "start_date desc")?;
    let page = Pagination::new(query.limit, query.offset)?;

    let pool = db::pool().await?;
    let periods = Repository::<PayrollPeriod>::new("payroll_periods", pool.clone())
        .select_where(&wb, &order, &page)
        .await?;

    Ok(ApiResponse::success(periods))
}

#[derive(Debug, Deserialize)]
pub struct CreatePeriodRequest {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// POST /api/payroll - periods may not overlap (admin)
pub async fn create(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreatePeriodRequest>,
) -> ApiResult<PayrollPeriod> {
    ensure_admin(&current)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::unprocessable_entity("Period name is required"));
    }
    if payload.end_date < payload.start_date {
        return Err(ApiError::unprocessable_entity("End date must not precede start date"));
    }

    let pool = db::pool().await?;

    let overlaps: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM payroll_periods \
         WHERE deleted_at IS NULL AND start_date <= $2 AND end_date >= $1)",
    )
    .bind(payload.start_date)
    .bind(payload.end_date)
    .fetch_one(pool)
    .await?;
    if overlaps {
        return Err(ApiError::conflict("Overlaps an existing payroll period"));
    }

    let period: PayrollPeriod = sqlx::query_as(
        "INSERT INTO payroll_periods (name, start_date, end_date) \
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(name)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .fetch_one(pool)
    .await?;

    tracing::info!("Payroll period created: {} ({} to {})", period.name, period.start_date, period.end_date);

    Ok(ApiResponse::created(period))
}

/// GET /api/payroll/:id (admin)
pub async fn get(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<PayrollPeriod> {
    ensure_admin(&current)?;
    let pool = db::pool().await?;
    let period = Repository::<PayrollPeriod>::new("payroll_periods", pool.clone())
        .select_404(id)
        .await?;
    Ok(ApiResponse::success(period))
}

/// GET /api/payroll/:id/summary - per-employee aggregation, read-only (admin)
pub async fn summary(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<PayrollSummary> {
    ensure_admin(&current)?;

    let pool = db::pool().await?;
    let period = Repository::<PayrollPeriod>::new("payroll_periods", pool.clone())
        .select_404(id)
        .await?;

    let settings = overtime_rules(pool).await?;
    let summary = payroll::period_summary(
        pool,
        period.start_date,
        period.end_date,
        settings.standard_hours_per_day,
        settings.overtime_multiplier,
    )
    .await?;

    Ok(ApiResponse::success(summary))
}

/// POST /api/payroll/:id/process - open -> processing, snapshotting totals
/// from the aggregation (admin)
pub async fn process(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<PayrollPeriod> {
    ensure_admin(&current)?;

    let pool = db::pool().await?;
    let period = Repository::<PayrollPeriod>::new("payroll_periods", pool.clone())
        .select_404(id)
        .await?;

    if !parse_status(&period)?.can_process() {
        return Err(ApiError::conflict(format!(
            "Cannot process a period in '{}' status",
            period.status
        )));
    }

    let settings = overtime_rules(pool).await?;
    let summary = payroll::period_summary(
        pool,
        period.start_date,
        period.end_date,
        settings.standard_hours_per_day,
        settings.overtime_multiplier,
    )
    .await?;

    let updated: PayrollPeriod = sqlx::query_as(
        "UPDATE payroll_periods SET status = $2, employee_count = $3, total_hours = $4, \
         total_amount = $5, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(PayrollStatus::Processing.as_str())
    .bind(summary.employee_count)
    .bind(summary.total_hours)
    .bind(summary.total_amount)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        "Payroll period {} processing: {} employees, {} hours",
        updated.name,
        updated.employee_count,
        updated.total_hours
    );

    Ok(ApiResponse::success(updated))
}

/// POST /api/payroll/:id/complete - processing -> completed (admin)
pub async fn complete(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<PayrollPeriod> {
    ensure_admin(&current)?;

    let pool = db::pool().await?;
    let period = Repository::<PayrollPeriod>::new("payroll_periods", pool.clone())
        .select_404(id)
        .await?;

    if !parse_status(&period)?.can_complete() {
        return Err(ApiError::conflict(format!(
            "Cannot complete a period in '{}' status",
            period.status
        )));
    }

    let updated: PayrollPeriod = sqlx::query_as(
        "UPDATE payroll_periods SET status = $2, processed_at = now(), updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(PayrollStatus::Completed.as_str())
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success(updated))
}

/// DELETE /api/payroll/:id - only while still open (admin)
pub async fn remove(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    ensure_admin(&current)?;

    let pool = db::pool().await?;
    let period = Repository::<PayrollPeriod>::new("payroll_periods", pool.clone())
        .select_404(id)
        .await?;

    if !parse_status(&period)?.can_delete() {
        return Err(ApiError::conflict(format!(
            "Cannot delete a period in '{}' status",
            period.status
        )));
    }

    sqlx::query(
        "UPDATE payroll_periods SET deleted_at = now(), updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(ApiResponse::no_content())
}
