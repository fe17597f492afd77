//! Notification rows created by the workflow handlers (timesheet and leave
//! decisions, task assignment, report reviews).

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{EntityType, NotificationPriority};

pub async fn notify(
    pool: &PgPool,
    user_id: Uuid,
    title: &str,
    body: &str,
    priority: NotificationPriority,
    entity: Option<(EntityType, Uuid)>,
) -> Result<(), sqlx::Error> {
    let (entity_type, entity_id) = match entity {
        Some((t, id)) => (Some(t.as_str()), Some(id)),
        None => (None, None),
    };

    sqlx::query(
        "INSERT INTO notifications (user_id, title, body, priority, entity_type, entity_id) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(user_id)
    .bind(title)
    .bind(body)
    .bind(priority.as_str())
    .bind(entity_type)
    .bind(entity_id)
    .execute(pool)
    .await?;

    Ok(())
}
