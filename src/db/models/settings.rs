use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Single-row organization settings (id is always 1). Feeds leave
/// allocations and payroll overtime rules.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Settings {
    #[serde(skip_serializing, default)]
    pub id: i16,
    pub company_name: String,
    pub standard_hours_per_day: Decimal,
    pub overtime_multiplier: Decimal,
    pub vacation_days_per_year: i32,
    pub sick_days_per_year: i32,
    pub personal_days_per_year: i32,
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    pub fn allocation_for(&self, leave_type: super::LeaveType) -> Option<i32> {
        use super::LeaveType;
        match leave_type {
            LeaveType::Vacation => Some(self.vacation_days_per_year),
            LeaveType::Sick => Some(self.sick_days_per_year),
            LeaveType::Personal => Some(self.personal_days_per_year),
            // Unpaid leave is uncapped
            LeaveType::Unpaid => None,
        }
    }
}
