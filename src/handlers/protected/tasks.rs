use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Role;
use crate::db;
use crate::db::models::{
    EntityType, NotificationPriority, Task, TaskPriority, TaskStatus, User,
};
use crate::db::models::task::normalize_progress;
use crate::db::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::query::{order_clause, Pagination, WhereBuilder};
use crate::services::notify;

const SORTABLE: &[&str] = &["due_date", "priority", "status", "progress", "created_at", "title"];

fn can_edit_task(current: &CurrentUser, task: &Task) -> bool {
    if current.role.is_admin() || task.created_by == current.id {
        return true;
    }
    current.role.can_assign_work()
        && current.department_id.is_some()
        && current.department_id == task.department_id
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub assignee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/tasks - employees see their assignments, managers and leads
/// their department, admins everything
pub async fn list(
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Vec<Task>> {
    let mut wb = WhereBuilder::new();

    match current.role {
        Role::Admin => {
            wb.maybe_eq_uuid("assignee_id", query.assignee_id)
                .maybe_eq_uuid("department_id", query.department_id);
        }
        Role::Manager | Role::Lead => {
            let department = current
                .department_id
                .ok_or_else(|| ApiError::forbidden("No department assigned"))?;
            wb.eq_uuid("department_id", department)
                .maybe_eq_uuid("assignee_id", query.assignee_id);
        }
        Role::Employee => {
            wb.eq_uuid("assignee_id", current.id);
        }
    }

    wb.maybe_eq_uuid("project_id", query.project_id)
        .maybe_eq_text("status", query.status.as_deref())
        .maybe_eq_text("priority", query.priority.as_deref())
        .maybe_date_from("due_date", query.due_from)
        .maybe_date_to("due_date", query.due_to);

    let order = order_clause(query.order.as_deref(), SORTABLE, "created_at desc")?;
    let page = Pagination::new(query.limit, query.offset)?;

    let pool = db::pool().await?;
    let tasks = Repository::<Task>::new("tasks", pool.clone())
        .select_where(&wb, &order, &page)
        .await?;

    Ok(ApiResponse::success(tasks))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assignee_id: Uuid,
    pub project_id: Option<Uuid>,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// POST /api/tasks - managers, leads and admins assign work; the assignee is
/// notified. The task lands in the assignee's department.
pub async fn create(
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateTaskRequest>,
) -> ApiResult<Task> {
    if !current.role.can_assign_work() {
        return Err(ApiError::forbidden("Not allowed to assign tasks"));
    }

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::unprocessable_entity("Task title is required"));
    }
    let priority = match payload.priority.as_deref() {
        None => TaskPriority::Medium,
        Some(p) => TaskPriority::parse(p)
            .ok_or_else(|| ApiError::unprocessable_entity(format!("Unknown priority: {}", p)))?,
    };

    let pool = db::pool().await?;
    let assignee = Repository::<User>::new("users", pool.clone())
        .select_by_id(payload.assignee_id)
        .await?
        .ok_or_else(|| ApiError::unprocessable_entity("Assignee does not exist"))?;

    // Managers and leads stay inside their own department
    if !current.role.is_admin() && assignee.department_id != current.department_id {
        return Err(ApiError::forbidden("Assignee is outside your department"));
    }

    let task: Task = sqlx::query_as(
        "INSERT INTO tasks \
         (title, description, assignee_id, created_by, department_id, project_id, priority, due_date) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(title)
    .bind(payload.description.trim())
    .bind(assignee.id)
    .bind(current.id)
    .bind(assignee.department_id)
    .bind(payload.project_id)
    .bind(priority.as_str())
    .bind(payload.due_date)
    .fetch_one(pool)
    .await?;

    if assignee.id != current.id {
        let priority_note = match priority {
            TaskPriority::Urgent | TaskPriority::High => NotificationPriority::High,
            _ => NotificationPriority::Normal,
        };
        notify::notify(
            pool,
            assignee.id,
            "Task assigned",
            &format!("{} assigned you: {}", current.first_name, task.title),
            priority_note,
            Some((EntityType::Task, task.id)),
        )
        .await?;
    }

    Ok(ApiResponse::created(task))
}

/// GET /api/tasks/:id
pub async fn get(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Task> {
    let pool = db::pool().await?;
    let task = Repository::<Task>::new("tasks", pool.clone())
        .select_404(id)
        .await?;

    let visible = task.assignee_id == current.id || can_edit_task(&current, &task);
    if !visible {
        return Err(ApiError::forbidden("Not allowed to view this task"));
    }

    Ok(ApiResponse::success(task))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// PUT /api/tasks/:id - creator, admins, or the department's managers/leads
pub async fn update(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> ApiResult<Task> {
    if let Some(p) = payload.priority.as_deref() {
        TaskPriority::parse(p)
            .ok_or_else(|| ApiError::unprocessable_entity(format!("Unknown priority: {}", p)))?;
    }

    let pool = db::pool().await?;
    let repo = Repository::<Task>::new("tasks", pool.clone());
    let task = repo.select_404(id).await?;

    if !can_edit_task(&current, &task) {
        return Err(ApiError::forbidden("Not allowed to edit this task"));
    }

    let reassigned = payload
        .assignee_id
        .map(|a| a != task.assignee_id)
        .unwrap_or(false);
    if let Some(assignee_id) = payload.assignee_id {
        Repository::<User>::new("users", pool.clone())
            .select_by_id(assignee_id)
            .await?
            .ok_or_else(|| ApiError::unprocessable_entity("Assignee does not exist"))?;
    }

    let updated: Task = sqlx::query_as(
        "UPDATE tasks SET \
         title = COALESCE($2, title), \
         description = COALESCE($3, description), \
         assignee_id = COALESCE($4, assignee_id), \
         project_id = COALESCE($5, project_id), \
         priority = COALESCE($6, priority), \
         due_date = COALESCE($7, due_date), \
         updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.title.as_deref().map(str::trim))
    .bind(payload.description.as_deref().map(str::trim))
    .bind(payload.assignee_id)
    .bind(payload.project_id)
    .bind(payload.priority.as_deref())
    .bind(payload.due_date)
    .fetch_one(pool)
    .await?;

    if reassigned && updated.assignee_id != current.id {
        notify::notify(
            pool,
            updated.assignee_id,
            "Task assigned",
            &format!("{} assigned you: {}", current.first_name, updated.title),
            NotificationPriority::Normal,
            Some((EntityType::Task, updated.id)),
        )
        .await?;
    }

    Ok(ApiResponse::success(updated))
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub status: Option<String>,
    pub progress: Option<i32>,
}

/// PATCH /api/tasks/:id/progress - assignee (or an editor) moves the work
/// along; status and progress are kept consistent.
pub async fn progress(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProgressRequest>,
) -> ApiResult<Task> {
    let pool = db::pool().await?;
    let repo = Repository::<Task>::new("tasks", pool.clone());
    let task = repo.select_404(id).await?;

    if task.assignee_id != current.id && !can_edit_task(&current, &task) {
        return Err(ApiError::forbidden("Not allowed to update this task"));
    }

    let status = match payload.status.as_deref() {
        None => TaskStatus::parse(&task.status).ok_or_else(|| {
            tracing::error!("Task {} has unknown status '{}'", task.id, task.status);
            ApiError::internal_server_error("Record is in an unknown state")
        })?,
        Some(s) => TaskStatus::parse(s)
            .ok_or_else(|| ApiError::unprocessable_entity(format!("Unknown status: {}", s)))?,
    };
    let progress = payload.progress.unwrap_or(task.progress);
    if !(0..=100).contains(&progress) {
        return Err(ApiError::unprocessable_entity("Progress must be between 0 and 100"));
    }

    let (status, progress) = normalize_progress(status, progress);

    let updated: Task = sqlx::query_as(
        "UPDATE tasks SET status = $2, progress = $3, updated_at = now() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(progress)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success(updated))
}

/// DELETE /api/tasks/:id - creator or admin, soft delete
pub async fn remove(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let pool = db::pool().await?;
    let repo = Repository::<Task>::new("tasks", pool.clone());
    let task = repo.select_404(id).await?;

    if !current.role.is_admin() && task.created_by != current.id {
        return Err(ApiError::forbidden("Not allowed to delete this task"));
    }

    sqlx::query("UPDATE tasks SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(ApiResponse::no_content())
}
