use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::auth::Role;
use crate::db;
use crate::db::models::{User, UserStatus};
use crate::error::ApiError;

/// User context validated against the users table on every request
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
}

/// Middleware that re-checks JWT claims against the users table: the account
/// must still exist, be active, and hold the role the token was issued for.
pub async fn validate_user_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let pool = db::pool().await?;

    let user: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(auth_user.user_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                tracing::error!("Database error validating user {}: {}", auth_user.user_id, e);
                ApiError::from(e)
            })?;

    let user = user.ok_or_else(|| {
        tracing::warn!("User validation failed: {} not found", auth_user.user_id);
        ApiError::forbidden("Account no longer exists")
    })?;

    if UserStatus::parse(&user.status) != Some(UserStatus::Active) {
        tracing::warn!("User validation failed: {} is {}", user.email, user.status);
        return Err(ApiError::forbidden("Account is not active"));
    }

    if user.role != auth_user.role {
        tracing::warn!(
            "User validation failed: token role '{}' does not match current role '{}' for {}",
            auth_user.role,
            user.role,
            user.email
        );
        return Err(ApiError::forbidden("Role has changed, please sign in again"));
    }

    let role = Role::parse(&user.role).ok_or_else(|| {
        tracing::error!("Unknown role '{}' for user {}", user.role, user.email);
        ApiError::internal_server_error("Account is misconfigured")
    })?;

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        role,
        department_id: user.department_id,
    });

    Ok(next.run(request).await)
}
