use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A date range over which approved timesheets are aggregated for payment.
/// Totals are snapshots taken when the period moves to `processing`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PayrollPeriod {
    pub id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub employee_count: i32,
    pub total_hours: Decimal,
    pub total_amount: Decimal,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayrollStatus {
    Open,
    Processing,
    Completed,
}

impl PayrollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollStatus::Open => "open",
            PayrollStatus::Processing => "processing",
            PayrollStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<PayrollStatus> {
        match s {
            "open" => Some(PayrollStatus::Open),
            "processing" => Some(PayrollStatus::Processing),
            "completed" => Some(PayrollStatus::Completed),
            _ => None,
        }
    }

    pub fn can_process(&self) -> bool {
        matches!(self, PayrollStatus::Open)
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, PayrollStatus::Processing)
    }

    pub fn can_delete(&self) -> bool {
        matches!(self, PayrollStatus::Open)
    }

    pub fn can_edit(&self) -> bool {
        matches!(self, PayrollStatus::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_moves_one_way() {
        assert!(PayrollStatus::Open.can_process());
        assert!(!PayrollStatus::Open.can_complete());

        assert!(PayrollStatus::Processing.can_complete());
        assert!(!PayrollStatus::Processing.can_process());

        assert!(!PayrollStatus::Completed.can_process());
        assert!(!PayrollStatus::Completed.can_complete());
    }

    #[test]
    fn only_open_periods_are_mutable() {
        assert!(PayrollStatus::Open.can_edit());
        assert!(PayrollStatus::Open.can_delete());
        assert!(!PayrollStatus::Processing.can_delete());
        assert!(!PayrollStatus::Completed.can_edit());
    }
}
