use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{self, access};
use crate::db;
use crate::db::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};

/// GET /api/auth/whoami - current account profile
pub async fn whoami(Extension(current): Extension<CurrentUser>) -> ApiResult<User> {
    let pool = db::pool().await?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(current.id)
        .fetch_one(pool)
        .await?;

    Ok(ApiResponse::success(user))
}

/// GET /api/auth/navigation - the caller's role and its API sections
pub async fn navigation(Extension(current): Extension<CurrentUser>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "role": current.role.as_str(),
        "sections": access::navigation_sections(current.role),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// PUT /api/auth/password - change own password
pub async fn change_password(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    auth::validate_password(&payload.new_password).map_err(ApiError::unprocessable_entity)?;

    let pool = db::pool().await?;

    let stored_hash: String =
        sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(current.id)
            .fetch_one(pool)
            .await?;

    if !auth::verify_password(&payload.current_password, &stored_hash)? {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let new_hash = auth::hash_password(&payload.new_password)?;

    sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
        .bind(current.id)
        .bind(&new_hash)
        .execute(pool)
        .await?;

    tracing::info!("Password changed for {}", current.email);

    Ok(ApiResponse::no_content())
}
