//! Leave balance arithmetic. Balances are computed on demand from Settings
//! allocations and approved requests; nothing is stored.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{LeaveType, Settings};

/// Weekdays in the inclusive span; weekends do not consume allocation
pub fn business_days(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return 0;
    }
    let mut days = 0;
    let mut date = start;
    while date <= end {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            days += 1;
        }
        date = date + chrono::Duration::days(1);
    }
    days
}

pub fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaveBalance {
    pub leave_type: LeaveType,
    /// None means uncapped (unpaid leave)
    pub allocated: Option<i32>,
    pub used: i64,
    pub remaining: Option<i64>,
}

/// Fold per-type used days against the Settings allocations
pub fn compute_balances(settings: &Settings, used_days: &[(LeaveType, i64)]) -> Vec<LeaveBalance> {
    LeaveType::ALL
        .iter()
        .map(|&leave_type| {
            let used = used_days
                .iter()
                .filter(|(t, _)| *t == leave_type)
                .map(|(_, d)| *d)
                .sum();
            let allocated = settings.allocation_for(leave_type);
            LeaveBalance {
                leave_type,
                allocated,
                used,
                remaining: allocated.map(|a| a as i64 - used),
            }
        })
        .collect()
}

/// Approved days per leave type for requests starting in the given year
pub async fn used_days_for_user(
    pool: &PgPool,
    user_id: Uuid,
    year_start: NaiveDate,
    year_end: NaiveDate,
) -> Result<Vec<(LeaveType, i64)>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT leave_type, SUM(days)::bigint FROM leave_requests \
         WHERE user_id = $1 AND status = 'approved' AND deleted_at IS NULL \
         AND start_date >= $2 AND start_date <= $3 \
         GROUP BY leave_type",
    )
    .bind(user_id)
    .bind(year_start)
    .bind(year_end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(t, days)| LeaveType::parse(&t).map(|t| (t, days)))
        .collect())
}

pub async fn balances_for_user(
    pool: &PgPool,
    settings: &Settings,
    user_id: Uuid,
    year_start: NaiveDate,
    year_end: NaiveDate,
) -> Result<Vec<LeaveBalance>, sqlx::Error> {
    let used = used_days_for_user(pool, user_id, year_start, year_end).await?;
    Ok(compute_balances(settings, &used))
}

/// True when the user already has a pending or approved request touching the
/// span
pub async fn has_overlap(
    pool: &PgPool,
    user_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM leave_requests \
         WHERE user_id = $1 AND deleted_at IS NULL \
         AND status IN ('pending', 'approved') \
         AND start_date <= $3 AND end_date >= $2)",
    )
    .bind(user_id)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn settings() -> Settings {
        Settings {
            id: 1,
            company_name: "Test Co".to_string(),
            standard_hours_per_day: Decimal::from(8),
            overtime_multiplier: Decimal::new(15, 1),
            vacation_days_per_year: 20,
            sick_days_per_year: 10,
            personal_days_per_year: 5,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn single_weekday_counts_one() {
        // 2024-03-06 is a Wednesday
        assert_eq!(business_days(date(2024, 3, 6), date(2024, 3, 6)), 1);
    }

    #[test]
    fn weekend_only_span_counts_zero() {
        // Saturday and Sunday
        assert_eq!(business_days(date(2024, 3, 9), date(2024, 3, 10)), 0);
    }

    #[test]
    fn full_week_counts_five() {
        // Monday through Sunday
        assert_eq!(business_days(date(2024, 3, 4), date(2024, 3, 10)), 5);
    }

    #[test]
    fn span_across_weekend() {
        // Friday through Tuesday: Fri, Mon, Tue
        assert_eq!(business_days(date(2024, 3, 8), date(2024, 3, 12)), 3);
    }

    #[test]
    fn inverted_span_counts_zero() {
        assert_eq!(business_days(date(2024, 3, 10), date(2024, 3, 1)), 0);
    }

    #[test]
    fn balances_subtract_used_days() {
        let balances = compute_balances(&settings(), &[(LeaveType::Vacation, 7)]);
        let vacation = balances
            .iter()
            .find(|b| b.leave_type == LeaveType::Vacation)
            .unwrap();
        assert_eq!(vacation.allocated, Some(20));
        assert_eq!(vacation.used, 7);
        assert_eq!(vacation.remaining, Some(13));

        let sick = balances.iter().find(|b| b.leave_type == LeaveType::Sick).unwrap();
        assert_eq!(sick.used, 0);
        assert_eq!(sick.remaining, Some(10));
    }

    #[test]
    fn unpaid_leave_is_uncapped() {
        let balances = compute_balances(&settings(), &[(LeaveType::Unpaid, 30)]);
        let unpaid = balances
            .iter()
            .find(|b| b.leave_type == LeaveType::Unpaid)
            .unwrap();
        assert_eq!(unpaid.allocated, None);
        assert_eq!(unpaid.used, 30);
        assert_eq!(unpaid.remaining, None);
    }

    #[test]
    fn overdrawn_balance_goes_negative() {
        let balances = compute_balances(&settings(), &[(LeaveType::Personal, 9)]);
        let personal = balances
            .iter()
            .find(|b| b.leave_type == LeaveType::Personal)
            .unwrap();
        assert_eq!(personal.remaining, Some(-4));
    }

    #[test]
    fn year_bounds_cover_the_year() {
        let (start, end) = year_bounds(2025).unwrap();
        assert_eq!(start, date(2025, 1, 1));
        assert_eq!(end, date(2025, 12, 31));
    }
}
