use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{self, Claims, Role};
use crate::config;
use crate::db;
use crate::db::models::{User, UserStatus};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
    pub expires_in: u64,
}

/// POST /auth/login - authenticate and receive a JWT token
pub async fn login(Json(payload): Json<LoginRequest>) -> ApiResult<LoginResponse> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let pool = db::pool().await?;

    let user: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE email = $1 AND deleted_at IS NULL")
            .bind(&email)
            .fetch_optional(pool)
            .await?;

    // Same message for unknown email and wrong password
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !auth::verify_password(&payload.password, &user.password_hash)? {
        tracing::warn!("Failed login attempt for {}", email);
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if UserStatus::parse(&user.status) != Some(UserStatus::Active) {
        return Err(ApiError::forbidden("Account is not active"));
    }

    let role = Role::parse(&user.role).ok_or_else(|| {
        tracing::error!("Unknown role '{}' for user {}", user.role, user.email);
        ApiError::internal_server_error("Account is misconfigured")
    })?;

    let claims = Claims::new(user.id, user.email.clone(), role, user.department_id);
    let token = auth::generate_jwt(&claims)?;
    let expires_in = config::config().security.jwt_expiry_hours * 3600;

    tracing::info!("Login: {} ({})", user.email, user.role);

    Ok(ApiResponse::success(LoginResponse { token, user, expires_in }))
}
