use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::ensure_admin;
use crate::db;
use crate::db::models::Settings;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};

/// GET /api/settings - all authenticated users; clients need the leave
/// allocations and workday rules
pub async fn get() -> ApiResult<Settings> {
    let pool = db::pool().await?;
    let settings: Settings = sqlx::query_as("SELECT * FROM settings WHERE id = 1")
        .fetch_one(pool)
        .await?;
    Ok(ApiResponse::success(settings))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub company_name: Option<String>,
    pub standard_hours_per_day: Option<Decimal>,
    pub overtime_multiplier: Option<Decimal>,
    pub vacation_days_per_year: Option<i32>,
    pub sick_days_per_year: Option<i32>,
    pub personal_days_per_year: Option<i32>,
}

/// PUT /api/settings (admin)
pub async fn update(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> ApiResult<Settings> {
    ensure_admin(&current)?;

    if let Some(hours) = payload.standard_hours_per_day {
        if hours <= Decimal::ZERO || hours > Decimal::from(24) {
            return Err(ApiError::unprocessable_entity(
                "Standard hours per day must be between 0 and 24",
            ));
        }
    }
    if let Some(multiplier) = payload.overtime_multiplier {
        if multiplier < Decimal::ONE {
            return Err(ApiError::unprocessable_entity("Overtime multiplier must be at least 1"));
        }
    }
    for days in [
        payload.vacation_days_per_year,
        payload.sick_days_per_year,
        payload.personal_days_per_year,
    ]
    .into_iter()
    .flatten()
    {
        if days < 0 {
            return Err(ApiError::unprocessable_entity("Leave allocations cannot be negative"));
        }
    }

    let pool = db::pool().await?;
    let settings: Settings = sqlx::query_as(
        "UPDATE settings SET \
         company_name = COALESCE($1, company_name), \
         standard_hours_per_day = COALESCE($2, standard_hours_per_day), \
         overtime_multiplier = COALESCE($3, overtime_multiplier), \
         vacation_days_per_year = COALESCE($4, vacation_days_per_year), \
         sick_days_per_year = COALESCE($5, sick_days_per_year), \
         personal_days_per_year = COALESCE($6, personal_days_per_year), \
         updated_at = now() \
         WHERE id = 1 RETURNING *",
    )
    .bind(payload.company_name.as_deref().map(str::trim))
    .bind(payload.standard_hours_per_day)
    .bind(payload.overtime_multiplier)
    .bind(payload.vacation_days_per_year)
    .bind(payload.sick_days_per_year)
    .bind(payload.personal_days_per_year)
    .fetch_one(pool)
    .await?;

    tracing::info!("Settings updated by {}", current.email);

    Ok(ApiResponse::success(settings))
}
