use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One worked day for one user. Unique per (user_id, work_date) among live
/// rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Timesheet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub work_date: NaiveDate,
    pub hours: Decimal,
    pub project_id: Option<Uuid>,
    pub description: String,
    pub status: String,
    pub review_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Status values are guarded field updates, not a workflow engine: the guard
/// methods below are the complete rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimesheetStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl TimesheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimesheetStatus::Draft => "draft",
            TimesheetStatus::Submitted => "submitted",
            TimesheetStatus::Approved => "approved",
            TimesheetStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<TimesheetStatus> {
        match s {
            "draft" => Some(TimesheetStatus::Draft),
            "submitted" => Some(TimesheetStatus::Submitted),
            "approved" => Some(TimesheetStatus::Approved),
            "rejected" => Some(TimesheetStatus::Rejected),
            _ => None,
        }
    }

    /// Owner may edit content while draft, or after a rejection
    pub fn can_edit(&self) -> bool {
        matches!(self, TimesheetStatus::Draft | TimesheetStatus::Rejected)
    }

    /// Owner may submit a draft, or resubmit after rejection
    pub fn can_submit(&self) -> bool {
        matches!(self, TimesheetStatus::Draft | TimesheetStatus::Rejected)
    }

    /// Reviewers act only on submitted timesheets
    pub fn can_review(&self) -> bool {
        matches!(self, TimesheetStatus::Submitted)
    }

    /// Only unsubmitted drafts may be removed
    pub fn can_delete(&self) -> bool {
        matches!(self, TimesheetStatus::Draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_can_be_edited_submitted_and_deleted() {
        assert!(TimesheetStatus::Draft.can_edit());
        assert!(TimesheetStatus::Draft.can_submit());
        assert!(TimesheetStatus::Draft.can_delete());
        assert!(!TimesheetStatus::Draft.can_review());
    }

    #[test]
    fn submitted_is_only_reviewable() {
        assert!(TimesheetStatus::Submitted.can_review());
        assert!(!TimesheetStatus::Submitted.can_edit());
        assert!(!TimesheetStatus::Submitted.can_submit());
        assert!(!TimesheetStatus::Submitted.can_delete());
    }

    #[test]
    fn rejected_can_be_resubmitted() {
        assert!(TimesheetStatus::Rejected.can_submit());
        assert!(TimesheetStatus::Rejected.can_edit());
        assert!(!TimesheetStatus::Rejected.can_delete());
    }

    #[test]
    fn approved_is_terminal() {
        assert!(!TimesheetStatus::Approved.can_edit());
        assert!(!TimesheetStatus::Approved.can_submit());
        assert!(!TimesheetStatus::Approved.can_review());
        assert!(!TimesheetStatus::Approved.can_delete());
    }
}
