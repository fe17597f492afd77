//! Payroll period aggregation: arithmetic over approved timesheets in a date
//! range. Overtime is computed per worked day against the configured
//! standard day length.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ApprovedHoursRow {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub hourly_rate: Decimal,
    pub work_date: NaiveDate,
    pub hours: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayrollLine {
    pub user_id: Uuid,
    pub employee: String,
    pub hours: Decimal,
    pub overtime_hours: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayrollSummary {
    pub lines: Vec<PayrollLine>,
    pub employee_count: i32,
    pub total_hours: Decimal,
    pub total_amount: Decimal,
}

/// Split one day's hours into (regular, overtime)
pub fn split_overtime(hours: Decimal, standard_day: Decimal) -> (Decimal, Decimal) {
    if hours > standard_day {
        (standard_day, hours - standard_day)
    } else {
        (hours, Decimal::ZERO)
    }
}

/// Fold per-day rows into one line per employee. Lines are ordered by
/// employee name for stable output.
pub fn aggregate(
    rows: Vec<ApprovedHoursRow>,
    standard_day: Decimal,
    overtime_multiplier: Decimal,
) -> PayrollSummary {
    use std::collections::BTreeMap;

    // Keyed by (name, user_id) so iteration order is already by name
    let mut by_employee: BTreeMap<(String, Uuid), PayrollLine> = BTreeMap::new();

    for row in rows {
        let (regular, overtime) = split_overtime(row.hours, standard_day);
        let amount = regular * row.hourly_rate + overtime * row.hourly_rate * overtime_multiplier;

        let employee = format!("{} {}", row.first_name, row.last_name);
        let entry = by_employee
            .entry((employee.clone(), row.user_id))
            .or_insert_with(|| PayrollLine {
                user_id: row.user_id,
                employee,
                hours: Decimal::ZERO,
                overtime_hours: Decimal::ZERO,
                amount: Decimal::ZERO,
            });

        entry.hours += row.hours;
        entry.overtime_hours += overtime;
        entry.amount += amount;
    }

    let lines: Vec<PayrollLine> = by_employee.into_values().collect();
    let employee_count = lines.len() as i32;
    let total_hours = lines.iter().map(|l| l.hours).sum();
    let total_amount = lines.iter().map(|l| l.amount).sum();

    PayrollSummary { lines, employee_count, total_hours, total_amount }
}

/// Approved timesheet hours joined with employee rates for the period span
pub async fn approved_hours(
    pool: &PgPool,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<ApprovedHoursRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT t.user_id, u.first_name, u.last_name, u.hourly_rate, t.work_date, t.hours \
         FROM timesheets t \
         JOIN users u ON u.id = t.user_id \
         WHERE t.status = 'approved' AND t.deleted_at IS NULL AND u.deleted_at IS NULL \
         AND t.work_date >= $1 AND t.work_date <= $2",
    )
    .bind(start_date)
    .bind(end_date)
    .fetch_all(pool)
    .await
}

pub async fn period_summary(
    pool: &PgPool,
    start_date: NaiveDate,
    end_date: NaiveDate,
    standard_day: Decimal,
    overtime_multiplier: Decimal,
) -> Result<PayrollSummary, sqlx::Error> {
    let rows = approved_hours(pool, start_date, end_date).await?;
    Ok(aggregate(rows, standard_day, overtime_multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn row(user: Uuid, name: &str, rate: i64, day: u32, hours: &str) -> ApprovedHoursRow {
        ApprovedHoursRow {
            user_id: user,
            first_name: name.to_string(),
            last_name: "Doe".to_string(),
            hourly_rate: Decimal::from(rate),
            work_date: date(day),
            hours: hours.parse().unwrap(),
        }
    }

    #[test]
    fn splits_overtime_per_day() {
        let standard = Decimal::from(8);
        assert_eq!(
            split_overtime(Decimal::from(10), standard),
            (Decimal::from(8), Decimal::from(2))
        );
        assert_eq!(
            split_overtime(Decimal::from(6), standard),
            (Decimal::from(6), Decimal::ZERO)
        );
        assert_eq!(
            split_overtime(Decimal::from(8), standard),
            (Decimal::from(8), Decimal::ZERO)
        );
    }

    #[test]
    fn aggregates_one_employee_with_overtime() {
        let user = Uuid::new_v4();
        let multiplier = Decimal::new(15, 1); // 1.5
        let rows = vec![
            row(user, "Ann", 20, 3, "8"),
            row(user, "Ann", 20, 4, "10"), // 2h overtime
        ];
        let summary = aggregate(rows, Decimal::from(8), multiplier);

        assert_eq!(summary.employee_count, 1);
        assert_eq!(summary.total_hours, Decimal::from(18));
        let line = &summary.lines[0];
        assert_eq!(line.overtime_hours, Decimal::from(2));
        // 16 regular * 20 + 2 overtime * 20 * 1.5 = 320 + 60
        assert_eq!(line.amount, Decimal::from(380));
        assert_eq!(summary.total_amount, Decimal::from(380));
    }

    #[test]
    fn aggregates_multiple_employees_sorted_by_name() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rows = vec![
            row(b, "Zoe", 30, 3, "8"),
            row(a, "Ann", 20, 3, "8"),
        ];
        let summary = aggregate(rows, Decimal::from(8), Decimal::new(15, 1));

        assert_eq!(summary.employee_count, 2);
        assert_eq!(summary.lines[0].employee, "Ann Doe");
        assert_eq!(summary.lines[1].employee, "Zoe Doe");
        assert_eq!(summary.total_amount, Decimal::from(160 + 240));
    }

    #[test]
    fn empty_period_is_all_zero() {
        let summary = aggregate(vec![], Decimal::from(8), Decimal::new(15, 1));
        assert_eq!(summary.employee_count, 0);
        assert_eq!(summary.total_hours, Decimal::ZERO);
        assert_eq!(summary.total_amount, Decimal::ZERO);
        assert!(summary.lines.is_empty());
    }
}
