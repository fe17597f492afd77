use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// File metadata row; bytes live on disk under the configured upload dir,
/// named by the attachment id. Linked to its owner through the polymorphic
/// (entity_type, entity_id) pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileAttachment {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Entities that accept attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Timesheet,
    Leave,
    Task,
    Report,
    User,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Timesheet => "timesheet",
            EntityType::Leave => "leave",
            EntityType::Task => "task",
            EntityType::Report => "report",
            EntityType::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<EntityType> {
        match s {
            "timesheet" => Some(EntityType::Timesheet),
            "leave" => Some(EntityType::Leave),
            "task" => Some(EntityType::Task),
            "report" => Some(EntityType::Report),
            "user" => Some(EntityType::User),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_round_trip() {
        for t in [
            EntityType::Timesheet,
            EntityType::Leave,
            EntityType::Task,
            EntityType::Report,
            EntityType::User,
        ] {
            assert_eq!(EntityType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EntityType::parse("invoice"), None);
    }
}
