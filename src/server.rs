use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{delete, get, patch, post, put};
use axum::{middleware as layers, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config;
use crate::db;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, validate_user_middleware};

pub fn app() -> Router {
    let cfg = config::config();

    // Everything under /api requires a valid token and an active account
    let protected_routes = Router::new()
        .merge(auth_routes())
        .merge(user_routes())
        .merge(department_routes())
        .merge(timesheet_routes())
        .merge(leave_routes())
        .merge(payroll_routes())
        .merge(task_routes())
        .merge(report_routes())
        .merge(notification_routes())
        .merge(file_routes())
        .merge(settings_routes())
        .merge(project_routes())
        .layer(layers::from_fn(validate_user_middleware))
        .layer(layers::from_fn(jwt_auth_middleware));

    let mut app = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/login", post(public::auth::login))
        .merge(protected_routes)
        // Global middleware
        .layer(DefaultBodyLimit::max(cfg.api.max_request_size_bytes))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http());

    if cfg.security.enable_cors {
        app = app.layer(cors_layer());
    }

    app
}

fn cors_layer() -> CorsLayer {
    let origins = &config::config().security.cors_origins;
    if origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let list: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(list))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

fn auth_routes() -> Router {
    use protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/auth/navigation", get(auth::navigation))
        .route("/api/auth/password", put(auth::change_password))
}

fn user_routes() -> Router {
    use protected::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::create))
        .route(
            "/api/users/:id",
            get(users::get).put(users::update).delete(users::remove),
        )
        .route("/api/users/:id/status", patch(users::set_status))
}

fn department_routes() -> Router {
    use protected::departments;

    Router::new()
        .route(
            "/api/departments",
            get(departments::list).post(departments::create),
        )
        .route(
            "/api/departments/:id",
            get(departments::get)
                .put(departments::update)
                .delete(departments::remove),
        )
        .route("/api/departments/:id/members", get(departments::members))
}

fn timesheet_routes() -> Router {
    use protected::timesheets;

    Router::new()
        .route(
            "/api/timesheets",
            get(timesheets::list).post(timesheets::create),
        )
        .route("/api/timesheets/bulk-approve", post(timesheets::bulk_approve))
        .route(
            "/api/timesheets/:id",
            get(timesheets::get)
                .put(timesheets::update)
                .delete(timesheets::remove),
        )
        .route("/api/timesheets/:id/submit", post(timesheets::submit))
        .route("/api/timesheets/:id/approve", post(timesheets::approve))
        .route("/api/timesheets/:id/reject", post(timesheets::reject))
}

fn leave_routes() -> Router {
    use protected::leave;

    Router::new()
        .route("/api/leave", get(leave::list).post(leave::create))
        .route("/api/leave/balance", get(leave::balance))
        .route("/api/leave/:id", get(leave::get))
        .route("/api/leave/:id/approve", post(leave::approve))
        .route("/api/leave/:id/reject", post(leave::reject))
        .route("/api/leave/:id/cancel", post(leave::cancel))
}

fn payroll_routes() -> Router {
    use protected::payroll;

    Router::new()
        .route("/api/payroll", get(payroll::list).post(payroll::create))
        .route(
            "/api/payroll/:id",
            get(payroll::get).delete(payroll::remove),
        )
        .route("/api/payroll/:id/summary", get(payroll::summary))
        .route("/api/payroll/:id/process", post(payroll::process))
        .route("/api/payroll/:id/complete", post(payroll::complete))
}

fn task_routes() -> Router {
    use protected::tasks;

    Router::new()
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/api/tasks/:id",
            get(tasks::get).put(tasks::update).delete(tasks::remove),
        )
        .route("/api/tasks/:id/progress", patch(tasks::progress))
}

fn report_routes() -> Router {
    use protected::reports;

    Router::new()
        .route("/api/reports", get(reports::list).post(reports::create))
        .route("/api/reports/:id", get(reports::get).put(reports::update))
        .route("/api/reports/:id/review", post(reports::review))
}

fn notification_routes() -> Router {
    use protected::notifications;

    Router::new()
        .route("/api/notifications", get(notifications::list))
        .route(
            "/api/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route("/api/notifications/read-all", post(notifications::read_all))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        .route("/api/notifications/:id", delete(notifications::remove))
}

fn file_routes() -> Router {
    use protected::files;

    // Uploads get their own, larger body cap
    let upload_cap = config::config().storage.max_upload_bytes + 64 * 1024;

    Router::new()
        .route(
            "/api/files/:entity_type/:entity_id",
            get(files::list).post(files::upload),
        )
        .route("/api/attachments/:id/download", get(files::download))
        .route("/api/attachments/:id", delete(files::remove))
        .layer(DefaultBodyLimit::max(upload_cap))
}

fn settings_routes() -> Router {
    use protected::settings;

    Router::new().route("/api/settings", get(settings::get).put(settings::update))
}

fn project_routes() -> Router {
    use protected::projects;

    Router::new()
        .route("/api/projects", get(projects::list).post(projects::create))
        .route(
            "/api/projects/:id",
            get(projects::get)
                .put(projects::update)
                .delete(projects::remove),
        )
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Workforce API",
            "version": version,
            "description": "Workforce management and payroll backend API",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "login": "/auth/login (public - token acquisition)",
                "auth": "/api/auth/* (protected)",
                "users": "/api/users (protected)",
                "departments": "/api/departments (protected)",
                "timesheets": "/api/timesheets (protected)",
                "leave": "/api/leave (protected)",
                "payroll": "/api/payroll (protected, admin)",
                "tasks": "/api/tasks (protected)",
                "reports": "/api/reports (protected)",
                "notifications": "/api/notifications (protected)",
                "files": "/api/files/:entity_type/:entity_id (protected)",
                "settings": "/api/settings (protected)",
                "projects": "/api/projects (protected)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match db::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}

/// Bind and serve until shutdown. Shared by the main binary and `wfm serve`.
pub async fn run() -> anyhow::Result<()> {
    let config = config::config();
    tracing::info!("Starting Workforce API in {:?} mode", config.environment);

    let app = app();

    // Allow tests or deployments to override the port via env
    let port = std::env::var("WORKFORCE_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Workforce API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
