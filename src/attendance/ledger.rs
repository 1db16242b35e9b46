use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySqlConnection, MySqlPool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::{EngineError, EngineResult};
use crate::model::attendance::{AttendanceRecord, AttendanceStats, AttendanceStatus};

const RECORD_COLUMNS: &str = r#"
    id, tenant_id, teacher_id, attendance_date, status,
    check_in_time, check_out_time, working_hours, remarks, marked_by
"#;

/// Hours between check-in and check-out, 2 dp. A check-out earlier than the
/// check-in is an overnight shift and gains a day.
pub(crate) fn working_hours_between(check_in: NaiveTime, check_out: NaiveTime) -> Decimal {
    let mut seconds = (check_out - check_in).num_seconds();
    if seconds < 0 {
        seconds += 24 * 3600;
    }
    (Decimal::from(seconds) / Decimal::from(3600)).round_dp(2)
}

pub(crate) async fn fetch_record_on(
    conn: &mut MySqlConnection,
    teacher_id: u64,
    date: NaiveDate,
    lock: bool,
) -> EngineResult<Option<AttendanceRecord>> {
    let mut sql = format!(
        "SELECT {} FROM teacher_attendance WHERE teacher_id = ? AND attendance_date = ?",
        RECORD_COLUMNS
    );
    if lock {
        sql.push_str(" FOR UPDATE");
    }
    let row = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(teacher_id)
        .bind(date)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Mark or re-mark one teacher's day. Upserts by (teacher, date): the second
/// mark replaces the first entirely, including derived working hours.
#[allow(clippy::too_many_arguments)]
pub async fn mark(
    pool: &MySqlPool,
    teacher_id: u64,
    tenant_id: u64,
    date: NaiveDate,
    status: AttendanceStatus,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    remarks: Option<String>,
    marked_by: Option<u64>,
    today: NaiveDate,
) -> EngineResult<AttendanceRecord> {
    if date > today {
        return Err(EngineError::validation(
            "Cannot mark attendance for future dates",
        ));
    }

    let working_hours = match (check_in, check_out) {
        (Some(cin), Some(cout)) => Some(working_hours_between(cin, cout)),
        _ => None,
    };

    let mut tx = pool.begin().await?;

    match fetch_record_on(&mut tx, teacher_id, date, true).await? {
        Some(existing) => {
            sqlx::query(
                r#"
                UPDATE teacher_attendance
                SET status = ?, check_in_time = ?, check_out_time = ?,
                    working_hours = ?, remarks = ?, marked_by = ?
                WHERE id = ?
                "#,
            )
            .bind(status.as_ref())
            .bind(check_in)
            .bind(check_out)
            .bind(working_hours)
            .bind(&remarks)
            .bind(marked_by)
            .bind(existing.id)
            .execute(&mut *tx)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO teacher_attendance
                    (tenant_id, teacher_id, attendance_date, status,
                     check_in_time, check_out_time, working_hours, remarks, marked_by)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(tenant_id)
            .bind(teacher_id)
            .bind(date)
            .bind(status.as_ref())
            .bind(check_in)
            .bind(check_out)
            .bind(working_hours)
            .bind(&remarks)
            .bind(marked_by)
            .execute(&mut *tx)
            .await?;
        }
    }

    let record = fetch_record_on(&mut tx, teacher_id, date, false)
        .await?
        .ok_or_else(|| EngineError::not_found("Attendance record missing after write"))?;
    tx.commit().await?;

    info!(teacher_id, %date, status = status.as_ref(), "attendance marked");
    Ok(record)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkEntry {
    pub teacher_id: u64,
    #[schema(value_type = String, format = "date")]
    pub attendance_date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(value_type = Option<String>, format = "time")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, format = "time")]
    pub check_out: Option<NaiveTime>,
    pub remarks: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkMarkError {
    pub teacher_id: u64,
    #[schema(value_type = String, format = "date")]
    pub attendance_date: NaiveDate,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkMarkOutcome {
    pub success_count: u32,
    pub errors: Vec<BulkMarkError>,
}

/// Mark a batch of teachers independently; one bad entry is reported, not
/// fatal to the rest.
pub async fn bulk_mark(
    pool: &MySqlPool,
    entries: Vec<BulkEntry>,
    tenant_id: u64,
    marked_by: Option<u64>,
    today: NaiveDate,
) -> BulkMarkOutcome {
    let mut outcome = BulkMarkOutcome {
        success_count: 0,
        errors: Vec::new(),
    };

    for entry in entries {
        let result = mark(
            pool,
            entry.teacher_id,
            tenant_id,
            entry.attendance_date,
            entry.status,
            entry.check_in,
            entry.check_out,
            entry.remarks,
            marked_by,
            today,
        )
        .await;

        match result {
            Ok(_) => outcome.success_count += 1,
            Err(e) => {
                warn!(teacher_id = entry.teacher_id, date = %entry.attendance_date, error = %e, "bulk mark entry failed");
                outcome.errors.push(BulkMarkError {
                    teacher_id: entry.teacher_id,
                    attendance_date: entry.attendance_date,
                    error: e.to_string(),
                });
            }
        }
    }

    outcome
}

pub(crate) fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
            .unwrap()
            .pred_opt()
            .unwrap()
    }
}

/// Aggregate a month's records. Holiday and Week Off stay out of the
/// working-day denominator; a half-day counts as half a present day.
pub(crate) fn compute_stats(statuses: &[AttendanceStatus]) -> AttendanceStats {
    let mut stats = AttendanceStats::default();

    for status in statuses {
        match status {
            AttendanceStatus::Present => stats.present_count += 1,
            AttendanceStatus::HalfDay => stats.half_day_count += 1,
            AttendanceStatus::Absent => stats.absent_count += 1,
            AttendanceStatus::OnLeave => stats.on_leave_count += 1,
            AttendanceStatus::Holiday => stats.holiday_count += 1,
            AttendanceStatus::WeekOff => stats.week_off_count += 1,
        }
        if status.is_working_day() {
            stats.total_working_days += 1;
        }
    }

    if stats.total_working_days > 0 {
        let present_days = f64::from(stats.present_count) + 0.5 * f64::from(stats.half_day_count);
        let raw = present_days / f64::from(stats.total_working_days) * 100.0;
        stats.percentage = (raw * 100.0).round() / 100.0;
    }

    stats
}

/// Monthly statistics for one teacher.
pub async fn monthly_stats(
    pool: &MySqlPool,
    teacher_id: u64,
    month: u32,
    year: i32,
) -> EngineResult<AttendanceStats> {
    let records = monthly_records(pool, teacher_id, month, year).await?;
    let statuses: Vec<AttendanceStatus> = records
        .iter()
        .filter_map(|r| AttendanceStatus::from_str(&r.status).ok())
        .collect();
    Ok(compute_stats(&statuses))
}

/// All of one teacher's records for a month, ordered by date.
pub async fn monthly_records(
    pool: &MySqlPool,
    teacher_id: u64,
    month: u32,
    year: i32,
) -> EngineResult<Vec<AttendanceRecord>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| EngineError::validation("Invalid month"))?;
    let last = last_day_of_month(year, month);

    let sql = format!(
        "SELECT {} FROM teacher_attendance
         WHERE teacher_id = ? AND attendance_date BETWEEN ? AND ?
         ORDER BY attendance_date",
        RECORD_COLUMNS
    );
    let rows = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(teacher_id)
        .bind(first)
        .bind(last)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Every teacher's record for one date, keyed by teacher id.
pub async fn day_map(
    pool: &MySqlPool,
    tenant_id: u64,
    date: NaiveDate,
) -> EngineResult<HashMap<u64, AttendanceRecord>> {
    let sql = format!(
        "SELECT {} FROM teacher_attendance WHERE tenant_id = ? AND attendance_date = ?",
        RECORD_COLUMNS
    );
    let rows = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(tenant_id)
        .bind(date)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| (r.teacher_id, r)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn working_hours_for_a_regular_day() {
        assert_eq!(working_hours_between(t(9, 0), t(17, 30)), Decimal::new(85, 1));
        assert_eq!(working_hours_between(t(8, 0), t(16, 0)), Decimal::from(8));
    }

    #[test]
    fn overnight_shift_gains_a_day() {
        // 22:00 -> 06:00 is 8 hours, not -16
        assert_eq!(working_hours_between(t(22, 0), t(6, 0)), Decimal::from(8));
    }

    #[test]
    fn odd_minutes_round_to_two_decimals() {
        // 9:00 -> 17:10 = 8h10m = 8.1666.. -> 8.17
        assert_eq!(working_hours_between(t(9, 0), t(17, 10)), Decimal::new(817, 2));
    }

    #[test]
    fn last_day_of_month_handles_leap_years_and_december() {
        assert_eq!(last_day_of_month(2023, 2), NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());
        assert_eq!(last_day_of_month(2024, 2), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(last_day_of_month(2023, 12), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn stats_percentage_weights_half_days() {
        let mut statuses = vec![AttendanceStatus::Present; 18];
        statuses.extend([AttendanceStatus::Absent, AttendanceStatus::Absent]);
        let stats = compute_stats(&statuses);
        assert_eq!(stats.total_working_days, 20);
        assert_eq!(stats.present_count, 18);
        assert_eq!(stats.absent_count, 2);
        assert_eq!(stats.percentage, 90.0);
    }

    #[test]
    fn holidays_and_week_offs_stay_out_of_the_denominator() {
        let statuses = [
            AttendanceStatus::Present,
            AttendanceStatus::HalfDay,
            AttendanceStatus::Holiday,
            AttendanceStatus::WeekOff,
        ];
        let stats = compute_stats(&statuses);
        assert_eq!(stats.total_working_days, 2);
        assert_eq!(stats.holiday_count, 1);
        assert_eq!(stats.week_off_count, 1);
        // (1 + 0.5) / 2 * 100
        assert_eq!(stats.percentage, 75.0);
    }

    #[test]
    fn empty_month_yields_zero_percentage() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.total_working_days, 0);
        assert_eq!(stats.percentage, 0.0);
    }
}
