use axum::extract::{Path, Query};
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::ensure_admin;
use crate::db;
use crate::db::models::{Department, User};
use crate::db::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::query::{order_clause, Pagination, WhereBuilder};

const SORTABLE: &[&str] = &["name", "created_at", "budget"];

#[derive(Debug, Deserialize)]
pub struct DepartmentListQuery {
    pub q: Option<String>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/departments - visible to all authenticated users
pub async fn list(Query(query): Query<DepartmentListQuery>) -> ApiResult<Vec<Department>> {
    let mut wb = WhereBuilder::new();
    if let Some(q) = query.q.as_deref() {
        wb.search(&["name", "description"], q);
    }

    let order = order_clause(query.order.as_deref(), SORTABLE, "name")?;
    let page = Pagination::new(query.limit, query.offset)?;

    let pool = db::pool().await?;
    let departments = Repository::<Department>::new("departments", pool.clone())
        .select_where(&wb, &order, &page)
        .await?;

    Ok(ApiResponse::success(departments))
}

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub manager_id: Option<Uuid>,
    pub budget: Option<Decimal>,
}

/// POST /api/departments (admin)
pub async fn create(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateDepartmentRequest>,
) -> ApiResult<Department> {
    ensure_admin(&current)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::unprocessable_entity("Department name is required"));
    }
    if let Some(budget) = payload.budget {
        if budget < Decimal::ZERO {
            return Err(ApiError::unprocessable_entity("Budget cannot be negative"));
        }
    }

    let pool = db::pool().await?;
    let department: Department = sqlx::query_as(
        "INSERT INTO departments (name, description, manager_id, budget) \
         VALUES ($1, $2, $3, COALESCE($4, 0)) RETURNING *",
    )
    .bind(name)
    .bind(payload.description.trim())
    .bind(payload.manager_id)
    .bind(payload.budget)
    .fetch_one(pool)
    .await?;

    tracing::info!("Department created: {}", department.name);

    Ok(ApiResponse::created(department))
}

/// GET /api/departments/:id
pub async fn get(Path(id): Path<Uuid>) -> ApiResult<Department> {
    let pool = db::pool().await?;
    let department = Repository::<Department>::new("departments", pool.clone())
        .select_404(id)
        .await?;
    Ok(ApiResponse::success(department))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    pub budget: Option<Decimal>,
    pub budget_spent: Option<Decimal>,
}

/// PUT /api/departments/:id (admin)
pub async fn update(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDepartmentRequest>,
) -> ApiResult<Department> {
    ensure_admin(&current)?;

    for amount in [payload.budget, payload.budget_spent].into_iter().flatten() {
        if amount < Decimal::ZERO {
            return Err(ApiError::unprocessable_entity("Budget values cannot be negative"));
        }
    }

    let pool = db::pool().await?;
    let department: Option<Department> = sqlx::query_as(
        "UPDATE departments SET \
         name = COALESCE($2, name), \
         description = COALESCE($3, description), \
         manager_id = COALESCE($4, manager_id), \
         budget = COALESCE($5, budget), \
         budget_spent = COALESCE($6, budget_spent), \
         updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING *",
    )
    .bind(id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.description.as_deref().map(str::trim))
    .bind(payload.manager_id)
    .bind(payload.budget)
    .bind(payload.budget_spent)
    .fetch_optional(pool)
    .await?;

    let department = department.ok_or_else(|| ApiError::not_found("Department not found"))?;
    Ok(ApiResponse::success(department))
}

/// GET /api/departments/:id/members
pub async fn members(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<User>> {
    // Employees may look up their own department only
    if !current.role.can_review() && current.department_id != Some(id) {
        return Err(ApiError::forbidden("Not allowed to view this department's members"));
    }

    let pool = db::pool().await?;
    // 404 for unknown departments rather than an empty list
    Repository::<Department>::new("departments", pool.clone())
        .select_404(id)
        .await?;

    let members: Vec<User> = sqlx::query_as(
        "SELECT * FROM users WHERE department_id = $1 AND deleted_at IS NULL \
         ORDER BY last_name, first_name",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(members))
}

/// DELETE /api/departments/:id - refused while members remain (admin)
pub async fn remove(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    ensure_admin(&current)?;

    let pool = db::pool().await?;

    let mut members = WhereBuilder::new();
    members.eq_uuid("department_id", id);
    let member_count = Repository::<User>::new("users", pool.clone())
        .count(&members)
        .await?;
    if member_count > 0 {
        return Err(ApiError::conflict(format!(
            "Department still has {} member(s)",
            member_count
        )));
    }

    let result = sqlx::query(
        "UPDATE departments SET deleted_at = now(), updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Department not found"));
    }

    Ok(ApiResponse::no_content())
}
