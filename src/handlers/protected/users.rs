use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::ensure_admin;
use crate::auth::{self, Role};
use crate::db;
use crate::db::models::{User, UserStatus};
use crate::db::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::query::{order_clause, Pagination, WhereBuilder};

const SORTABLE: &[&str] = &[
    "created_at",
    "first_name",
    "last_name",
    "email",
    "role",
    "status",
    "hire_date",
];

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub status: Option<String>,
    pub department_id: Option<Uuid>,
    pub q: Option<String>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/users - directory listing for admins, managers and leads
pub async fn list(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Vec<User>> {
    if current.role == Role::Employee {
        return Err(ApiError::forbidden("Directory access requires a management role"));
    }

    // Managers and leads are pinned to their own department
    let department_id = if current.role.is_admin() {
        query.department_id
    } else {
        Some(
            current
                .department_id
                .ok_or_else(|| ApiError::forbidden("No department assigned"))?,
        )
    };

    let mut wb = WhereBuilder::new();
    wb.maybe_eq_text("role", query.role.as_deref())
        .maybe_eq_text("status", query.status.as_deref())
        .maybe_eq_uuid("department_id", department_id);
    if let Some(q) = query.q.as_deref() {
        wb.search(&["first_name", "last_name", "email", "position"], q);
    }

    let order = order_clause(query.order.as_deref(), SORTABLE, "last_name")?;
    let page = Pagination::new(query.limit, query.offset)?;

    let pool = db::pool().await?;
    let users = Repository::<User>::new("users", pool.clone())
        .select_where(&wb, &order, &page)
        .await?;

    Ok(ApiResponse::success(users))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub position: String,
    pub hourly_rate: Option<Decimal>,
    pub hire_date: Option<NaiveDate>,
}

/// POST /api/users - create an account (admin). Starts `pending` until
/// activated.
pub async fn create(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<User> {
    ensure_admin(&current)?;

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::unprocessable_entity("A valid email is required"));
    }
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ApiError::unprocessable_entity("First and last name are required"));
    }
    Role::parse(&payload.role)
        .ok_or_else(|| ApiError::unprocessable_entity(format!("Unknown role: {}", payload.role)))?;
    auth::validate_password(&payload.password).map_err(ApiError::unprocessable_entity)?;
    if let Some(rate) = payload.hourly_rate {
        if rate < Decimal::ZERO {
            return Err(ApiError::unprocessable_entity("Hourly rate cannot be negative"));
        }
    }

    let password_hash = auth::hash_password(&payload.password)?;

    let pool = db::pool().await?;
    let user: User = sqlx::query_as(
        "INSERT INTO users \
         (first_name, last_name, email, password_hash, role, department_id, position, hourly_rate, hire_date) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, 0), $9) \
         RETURNING *",
    )
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&email)
    .bind(&password_hash)
    .bind(&payload.role)
    .bind(payload.department_id)
    .bind(payload.position.trim())
    .bind(payload.hourly_rate)
    .bind(payload.hire_date)
    .fetch_one(pool)
    .await?;

    tracing::info!("User created: {} ({})", user.email, user.role);

    Ok(ApiResponse::created(user))
}

/// GET /api/users/:id
pub async fn get(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    let pool = db::pool().await?;
    let user = Repository::<User>::new("users", pool.clone())
        .select_404(id)
        .await?;

    let allowed = current.id == id
        || current.role.is_admin()
        || (current.role.can_review()
            && current.department_id.is_some()
            && current.department_id == user.department_id);
    if !allowed {
        return Err(ApiError::forbidden("Not allowed to view this user"));
    }

    Ok(ApiResponse::success(user))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub role: Option<String>,
    pub department_id: Option<Uuid>,
    pub clear_department: Option<bool>,
    pub hourly_rate: Option<Decimal>,
    pub hire_date: Option<NaiveDate>,
}

/// PUT /api/users/:id - admins update anything; users update their own
/// name and position.
pub async fn update(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<User> {
    let is_self = current.id == id;
    if !current.role.is_admin() && !is_self {
        return Err(ApiError::forbidden("Not allowed to update this user"));
    }

    let touches_admin_fields = payload.role.is_some()
        || payload.department_id.is_some()
        || payload.clear_department.unwrap_or(false)
        || payload.hourly_rate.is_some()
        || payload.hire_date.is_some();
    if touches_admin_fields && !current.role.is_admin() {
        return Err(ApiError::forbidden("Only administrators can change these fields"));
    }

    if let Some(role) = payload.role.as_deref() {
        Role::parse(role)
            .ok_or_else(|| ApiError::unprocessable_entity(format!("Unknown role: {}", role)))?;
    }
    if let Some(rate) = payload.hourly_rate {
        if rate < Decimal::ZERO {
            return Err(ApiError::unprocessable_entity("Hourly rate cannot be negative"));
        }
    }

    let pool = db::pool().await?;

    let user: Option<User> = sqlx::query_as(
        "UPDATE users SET \
         first_name = COALESCE($2, first_name), \
         last_name = COALESCE($3, last_name), \
         position = COALESCE($4, position), \
         role = COALESCE($5, role), \
         department_id = CASE WHEN $9 THEN NULL ELSE COALESCE($6, department_id) END, \
         hourly_rate = COALESCE($7, hourly_rate), \
         hire_date = COALESCE($8, hire_date), \
         updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING *",
    )
    .bind(id)
    .bind(payload.first_name.as_deref().map(str::trim))
    .bind(payload.last_name.as_deref().map(str::trim))
    .bind(payload.position.as_deref().map(str::trim))
    .bind(payload.role.as_deref())
    .bind(payload.department_id)
    .bind(payload.hourly_rate)
    .bind(payload.hire_date)
    .bind(payload.clear_department.unwrap_or(false))
    .fetch_optional(pool)
    .await?;

    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(user))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// PATCH /api/users/:id/status - activate or deactivate an account (admin)
pub async fn set_status(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> ApiResult<User> {
    ensure_admin(&current)?;

    let status = UserStatus::parse(&payload.status).ok_or_else(|| {
        ApiError::unprocessable_entity(format!("Unknown status: {}", payload.status))
    })?;

    if current.id == id && status != UserStatus::Active {
        return Err(ApiError::conflict("Cannot deactivate your own account"));
    }

    let pool = db::pool().await?;
    let user: Option<User> = sqlx::query_as(
        "UPDATE users SET status = $2, updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING *",
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?;

    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;
    tracing::info!("User {} set to {}", user.email, user.status);

    Ok(ApiResponse::success(user))
}

/// DELETE /api/users/:id - soft delete (admin)
pub async fn remove(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    ensure_admin(&current)?;

    if current.id == id {
        return Err(ApiError::conflict("Cannot delete your own account"));
    }

    let pool = db::pool().await?;
    let result = sqlx::query(
        "UPDATE users SET deleted_at = now(), updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(ApiResponse::no_content())
}
