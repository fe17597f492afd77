use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Employee-submitted end-of-day record, reviewed by a department lead.
/// Unique per (user_id, report_date) among live rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyReport {
    pub id: Uuid,
    pub user_id: Uuid,
    pub report_date: NaiveDate,
    pub tasks_completed: Vec<String>,
    pub accomplishments: Vec<String>,
    pub challenges: Vec<String>,
    pub notes: String,
    pub status: String,
    pub review_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Submitted,
    Reviewed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Submitted => "submitted",
            ReportStatus::Reviewed => "reviewed",
        }
    }

    pub fn parse(s: &str) -> Option<ReportStatus> {
        match s {
            "submitted" => Some(ReportStatus::Submitted),
            "reviewed" => Some(ReportStatus::Reviewed),
            _ => None,
        }
    }

    /// Authors may amend until a lead has looked at it
    pub fn can_edit(&self) -> bool {
        matches!(self, ReportStatus::Submitted)
    }

    pub fn can_review(&self) -> bool {
        matches!(self, ReportStatus::Submitted)
    }
}
