use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeaveRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Business days in the span, computed at creation
    pub days: i32,
    pub reason: String,
    pub status: String,
    pub review_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Vacation,
    Sick,
    Personal,
    Unpaid,
}

impl LeaveType {
    pub const ALL: [LeaveType; 4] = [
        LeaveType::Vacation,
        LeaveType::Sick,
        LeaveType::Personal,
        LeaveType::Unpaid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveType::Vacation => "vacation",
            LeaveType::Sick => "sick",
            LeaveType::Personal => "personal",
            LeaveType::Unpaid => "unpaid",
        }
    }

    pub fn parse(s: &str) -> Option<LeaveType> {
        match s {
            "vacation" => Some(LeaveType::Vacation),
            "sick" => Some(LeaveType::Sick),
            "personal" => Some(LeaveType::Personal),
            "unpaid" => Some(LeaveType::Unpaid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<LeaveStatus> {
        match s {
            "pending" => Some(LeaveStatus::Pending),
            "approved" => Some(LeaveStatus::Approved),
            "rejected" => Some(LeaveStatus::Rejected),
            "cancelled" => Some(LeaveStatus::Cancelled),
            _ => None,
        }
    }

    pub fn can_review(&self) -> bool {
        matches!(self, LeaveStatus::Pending)
    }

    /// Owner may withdraw a pending request, or an approved one that has not
    /// started yet (checked against the start date by the handler)
    pub fn can_cancel(&self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_type_round_trip() {
        for t in LeaveType::ALL {
            assert_eq!(LeaveType::parse(t.as_str()), Some(t));
        }
        assert_eq!(LeaveType::parse("sabbatical"), None);
    }

    #[test]
    fn only_pending_is_reviewable() {
        assert!(LeaveStatus::Pending.can_review());
        assert!(!LeaveStatus::Approved.can_review());
        assert!(!LeaveStatus::Rejected.can_review());
        assert!(!LeaveStatus::Cancelled.can_review());
    }

    #[test]
    fn cancel_rules() {
        assert!(LeaveStatus::Pending.can_cancel());
        assert!(LeaveStatus::Approved.can_cancel());
        assert!(!LeaveStatus::Rejected.can_cancel());
        assert!(!LeaveStatus::Cancelled.can_cancel());
    }
}
