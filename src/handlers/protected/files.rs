use axum::extract::{Multipart, Path};
use axum::http::{header, HeaderValue};
use axum::response::IntoResponse;
use axum::Extension;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

use crate::config;
use crate::db;
use crate::db::models::{EntityType, FileAttachment};
use crate::db::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::query::WhereBuilder;

fn storage_path(id: Uuid) -> PathBuf {
    PathBuf::from(&config::config().storage.upload_dir).join(id.to_string())
}

fn parse_entity_type(s: &str) -> Result<EntityType, ApiError> {
    EntityType::parse(s)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown entity type: {}", s)))
}

/// POST /api/files/:entity_type/:entity_id - multipart upload. The first
/// field carrying a filename becomes the attachment; bytes land on disk
/// keyed by the new row's id.
pub async fn upload(
    Extension(current): Extension<CurrentUser>,
    Path((entity_type, entity_id)): Path<(String, Uuid)>,
    mut multipart: Multipart,
) -> ApiResult<FileAttachment> {
    let entity = parse_entity_type(&entity_type)?;

    // Profile attachments: self or admin only
    if entity == EntityType::User && entity_id != current.id && !current.role.is_admin() {
        return Err(ApiError::forbidden("Not allowed to attach files to this user"));
    }

    let mut found: Option<(String, String, axum::body::Bytes)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field.bytes().await?;
        found = Some((file_name, content_type, data));
        break;
    }

    let (file_name, content_type, data) =
        found.ok_or_else(|| ApiError::bad_request("No file field in upload"))?;

    let cfg = &config::config().storage;
    if data.is_empty() {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    if data.len() > cfg.max_upload_bytes {
        return Err(ApiError::unprocessable_entity(format!(
            "File exceeds the {} byte limit",
            cfg.max_upload_bytes
        )));
    }
    if !cfg.allowed_content_types.iter().any(|t| t == &content_type) {
        return Err(ApiError::unprocessable_entity(format!(
            "Content type '{}' is not allowed",
            content_type
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(&data);
    let checksum = format!("{:x}", hasher.finalize());

    let id = Uuid::new_v4();
    fs::create_dir_all(&cfg.upload_dir).await?;
    fs::write(storage_path(id), &data).await?;

    let pool = db::pool().await?;
    let inserted: Result<FileAttachment, sqlx::Error> = sqlx::query_as(
        "INSERT INTO file_attachments \
         (id, entity_type, entity_id, file_name, content_type, size_bytes, checksum, uploaded_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(id)
    .bind(entity.as_str())
    .bind(entity_id)
    .bind(&file_name)
    .bind(&content_type)
    .bind(data.len() as i64)
    .bind(&checksum)
    .bind(current.id)
    .fetch_one(pool)
    .await;

    let attachment = match inserted {
        Ok(attachment) => attachment,
        Err(e) => {
            // Don't leave an orphaned blob behind
            let _ = fs::remove_file(storage_path(id)).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        "Attachment {} uploaded for {}/{} by {}",
        attachment.file_name,
        attachment.entity_type,
        attachment.entity_id,
        current.email
    );

    Ok(ApiResponse::created(attachment))
}

/// GET /api/files/:entity_type/:entity_id - attachments for one entity
pub async fn list(
    Path((entity_type, entity_id)): Path<(String, Uuid)>,
) -> ApiResult<Vec<FileAttachment>> {
    let entity = parse_entity_type(&entity_type)?;

    let mut wb = WhereBuilder::new();
    wb.eq_text("entity_type", entity.as_str())
        .eq_uuid("entity_id", entity_id);

    let pool = db::pool().await?;
    let attachments = Repository::<FileAttachment>::new("file_attachments", pool.clone())
        .select_where(
            &wb,
            "ORDER BY \"created_at\" DESC",
            &crate::query::Pagination::default(),
        )
        .await?;

    Ok(ApiResponse::success(attachments))
}

/// GET /api/files/:id/download - stream the stored bytes with the original
/// name and content type
pub async fn download(Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let pool = db::pool().await?;
    let attachment = Repository::<FileAttachment>::new("file_attachments", pool.clone())
        .select_404(id)
        .await?;

    let bytes = fs::read(storage_path(attachment.id)).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            tracing::error!("Blob missing for attachment {}", attachment.id);
            ApiError::not_found("File data is missing")
        } else {
            ApiError::from(e)
        }
    })?;

    let content_type = HeaderValue::from_str(&attachment.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        attachment.file_name.replace(['"', '\\'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// DELETE /api/files/:id - uploader or admin; removes the row (soft) and the
/// blob
pub async fn remove(
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    let pool = db::pool().await?;
    let attachment = Repository::<FileAttachment>::new("file_attachments", pool.clone())
        .select_404(id)
        .await?;

    if attachment.uploaded_by != current.id && !current.role.is_admin() {
        return Err(ApiError::forbidden("Not allowed to delete this attachment"));
    }

    sqlx::query("UPDATE file_attachments SET deleted_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if let Err(e) = fs::remove_file(storage_path(id)).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove blob for attachment {}: {}", id, e);
        }
    }

    Ok(ApiResponse::no_content())
}
