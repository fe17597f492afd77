use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::db::models::{Department, Project, ProjectStatus};
use crate::db::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::query::{order_clause, Pagination, WhereBuilder};

const SORTABLE: &[&str] = &["name", "status", "start_date", "created_at"];

fn can_manage_project(current: &CurrentUser, department_id: Uuid) -> bool {
    current.role.is_admin()
        || (current.role.can_assign_work() && current.department_id == Some(department_id))
}

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub department_id: Option<Uuid>,
    pub status: Option<String>,
    pub q: Option<String>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/projects - readable by everyone (timesheets reference projects)
pub async fn list(Query(query): Query<ProjectListQuery>) -> ApiResult<Vec<Project>> {
    let mut wb = WhereBuilder::new();
    wb.maybe_eq_uuid("department_id", query.department_id)
        .maybe_eq_text("status", query.status.as_deref());
    if let Some(q) = query.q.as_deref() {
        wb.search(&["name", "description"], q);
    }

    let order = order_clause(query.order.as_deref(), SORTABLE, "name")?;
    let page = Pagination::new(query.limit, query.offset)?;

    let pool = db::pool().await?;
    let projects = Repository::<Project>::new("projects", pool.clone())
        .select_where(&wb, &order, &page)
        .await?;

    Ok(ApiResponse::success(projects))
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub department_id: Uuid,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// POST /api/projects - managers/leads within their department, admins
/// anywhere
pub async fn create(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<Project> {
    if !can_manage_project(&current, payload.department_id) {
        return Err(ApiError::forbidden("Not allowed to create projects for this department"));
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::unprocessable_entity("Project name is required"));
    }
    if let (Some(start), Some(end)) = (payload.start_date, payload.end_date) {
        if end < start {
            return Err(ApiError::unprocessable_entity("End date must not precede start date"));
        }
    }

    let pool = db::pool().await?;
    Repository::<Department>::new("departments", pool.clone())
        .select_by_id(payload.department_id)
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity("Department does not exist"))?;

    let project: Project = sqlx::query_as(
        "INSERT INTO projects (name, description, department_id, start_date, end_date) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(name)
    .bind(payload.description.trim())
    .bind(payload.department_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::created(project))
}

/// GET /api/projects/:id
pub async fn get(Path(id): Path<Uuid>) -> ApiResult<Project> {
    let pool = db::pool().await?;
    let project = Repository::<Project>::new("projects", pool.clone())
        .select_404(id)
        .await?;
    Ok(ApiResponse::success(project))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// PUT /api/projects/:id
pub async fn update(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> ApiResult<Project> {
    if let Some(status) = payload.status.as_deref() {
        ProjectStatus::parse(status)
            .ok_or_else(|| ApiError::unprocessable_entity(format!("Unknown status: {}", status)))?;
    }

    let pool = db::pool().await?;
    let repo = Repository::<Project>::new("projects", pool.clone());
    let project = repo.select_404(id).await?;

    if !can_manage_project(&current, project.department_id) {
        return Err(ApiError::forbidden("Not allowed to edit this project"));
    }

    let updated: Project = sqlx::query_as(
        "UPDATE projects SET \
         name = COALESCE($2, name), \
         description = COALESCE($3, description), \
         status = COALESCE($4, status), \
         start_date = COALESCE($5, start_date), \
         end_date = COALESCE($6, end_date), \
         updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.description.as_deref().map(str::trim))
    .bind(payload.status.as_deref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success(updated))
}

/// DELETE /api/projects/:id - soft delete
pub async fn remove(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let pool = db::pool().await?;
    let repo = Repository::<Project>::new("projects", pool.clone());
    let project = repo.select_404(id).await?;

    if !can_manage_project(&current, project.department_id) {
        return Err(ApiError::forbidden("Not allowed to delete this project"));
    }

    sqlx::query("UPDATE projects SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(ApiResponse::no_content())
}
