use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::error::{EngineError, EngineResult};
use crate::leave::academic_year::resolve_academic_year;
use crate::leave::balance::{fetch_balance_on, store_balance_counters};
use crate::leave::quota;
use crate::model::leave::{
    HalfDayPeriod, LeaveApplication, LeaveBalance, LeaveStatus, LeaveType, QuotaSettings,
};

const APPLICATION_COLUMNS: &str = r#"
    id, tenant_id, teacher_id, leave_type, start_date, end_date,
    is_half_day, half_day_period, total_days,
    reason, contact_during_leave, address_during_leave,
    status, applied_date, approved_by, approved_date,
    rejection_reason, admin_notes, academic_year
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LeaveRequest {
    pub leave_type: LeaveType,
    #[schema(value_type = String, format = "date", example = "2026-01-05")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-01-07")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_half_day: bool,
    pub half_day_period: Option<HalfDayPeriod>,
    pub reason: String,
    pub contact_during_leave: Option<String>,
    pub address_during_leave: Option<String>,
}

/// Date checks shared by every submission, independent of the ledger.
pub(crate) fn validate_leave_dates(
    start_date: NaiveDate,
    end_date: NaiveDate,
    is_half_day: bool,
    min_advance_days: u32,
    today: NaiveDate,
) -> EngineResult<()> {
    if start_date < today {
        return Err(EngineError::validation(
            "Leave cannot be applied for past dates",
        ));
    }

    let days_ahead = (start_date - today).num_days();
    if days_ahead < i64::from(min_advance_days) {
        return Err(EngineError::validation(format!(
            "Minimum {} day(s) advance notice required",
            min_advance_days
        )));
    }

    if end_date < start_date {
        return Err(EngineError::validation(
            "End date cannot be before start date",
        ));
    }

    if is_half_day && start_date != end_date {
        return Err(EngineError::validation(
            "Half-day leave must have same start and end date",
        ));
    }

    Ok(())
}

/// Number of days a span consumes: 0.5 for a half-day, otherwise the
/// inclusive day count. Saturday/Sunday are skipped unless the tenant counts
/// weekends.
pub(crate) fn calculate_leave_days(
    start_date: NaiveDate,
    end_date: NaiveDate,
    is_half_day: bool,
    count_weekends: bool,
) -> Decimal {
    if is_half_day {
        return Decimal::new(5, 1);
    }

    if count_weekends {
        return Decimal::from((end_date - start_date).num_days() + 1);
    }

    let weekdays = start_date
        .iter_days()
        .take_while(|d| *d <= end_date)
        .filter(|d| d.weekday().num_days_from_monday() < 5)
        .count();
    Decimal::from(weekdays as u64)
}

fn validate_against_policy(request: &LeaveRequest, settings: &QuotaSettings) -> EngineResult<()> {
    if request.reason.trim().is_empty() {
        return Err(EngineError::validation("Reason is required"));
    }
    if request.is_half_day {
        if !settings.allow_half_day {
            return Err(EngineError::validation(
                "Half-day leave is not allowed by school policy",
            ));
        }
        if request.half_day_period.is_none() {
            return Err(EngineError::validation(
                "Half-day leave requires a half-day period",
            ));
        }
    }
    if request.leave_type == LeaveType::Lop && !settings.allow_lop {
        return Err(EngineError::validation(
            "Loss-of-pay leave is not allowed by school policy",
        ));
    }
    Ok(())
}

async fn fetch_application_on(
    conn: &mut MySqlConnection,
    application_id: u64,
    lock: bool,
) -> EngineResult<Option<LeaveApplication>> {
    let mut sql = format!(
        "SELECT {} FROM teacher_leave_applications WHERE id = ?",
        APPLICATION_COLUMNS
    );
    if lock {
        sql.push_str(" FOR UPDATE");
    }
    let row = sqlx::query_as::<_, LeaveApplication>(&sql)
        .bind(application_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

async fn locked_balance(
    conn: &mut MySqlConnection,
    teacher_id: u64,
    academic_year: &str,
) -> EngineResult<LeaveBalance> {
    fetch_balance_on(conn, teacher_id, academic_year, true)
        .await?
        .ok_or_else(|| {
            EngineError::not_found("Leave balance not initialized. Contact admin.")
        })
}

fn ensure_pending(application: &LeaveApplication) -> EngineResult<()> {
    match application.state()? {
        LeaveStatus::Pending => Ok(()),
        other => Err(EngineError::InvalidState(format!(
            "Leave is already {}",
            other
        ))),
    }
}

/// Validate, reserve balance and persist a Pending application as one unit.
/// The balance row is locked before the check so two concurrent submissions
/// for the same teacher serialize instead of both passing the check.
pub async fn submit(
    pool: &MySqlPool,
    teacher_id: u64,
    tenant_id: u64,
    request: LeaveRequest,
    academic_year: Option<String>,
    now: NaiveDateTime,
) -> EngineResult<LeaveApplication> {
    let today = now.date();
    let year = resolve_academic_year(academic_year.clone(), today);
    let settings = quota::get_or_create(pool, tenant_id, academic_year, today).await?;

    validate_against_policy(&request, &settings)?;
    validate_leave_dates(
        request.start_date,
        request.end_date,
        request.is_half_day,
        settings.min_advance_days,
        today,
    )?;

    let total_days = calculate_leave_days(
        request.start_date,
        request.end_date,
        request.is_half_day,
        settings.weekend_counted,
    );

    if total_days > Decimal::from(settings.max_continuous_days) {
        return Err(EngineError::validation(format!(
            "Maximum {} continuous days allowed",
            settings.max_continuous_days
        )));
    }

    let mut tx = pool.begin().await?;

    if let Some(category) = request.leave_type.quota_category() {
        let mut balance = locked_balance(&mut tx, teacher_id, &year).await?;
        let available = balance.balance(category);
        if available < total_days {
            return Err(EngineError::InsufficientBalance { available });
        }
        balance.add_pending(category, total_days);
        store_balance_counters(&mut tx, &balance).await?;
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO teacher_leave_applications
            (tenant_id, teacher_id, leave_type, start_date, end_date,
             is_half_day, half_day_period, total_days,
             reason, contact_during_leave, address_during_leave,
             status, applied_date, academic_year)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'Pending', ?, ?)
        "#,
    )
    .bind(tenant_id)
    .bind(teacher_id)
    .bind(request.leave_type.as_ref())
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(request.is_half_day)
    .bind(request.half_day_period.map(|p| p.as_ref().to_owned()))
    .bind(total_days)
    .bind(&request.reason)
    .bind(&request.contact_during_leave)
    .bind(&request.address_during_leave)
    .bind(now)
    .bind(&year)
    .execute(&mut *tx)
    .await?;

    let application_id = inserted.last_insert_id();
    let application = fetch_application_on(&mut tx, application_id, false)
        .await?
        .ok_or_else(|| EngineError::not_found("Application missing after insert"))?;

    tx.commit().await?;
    info!(
        teacher_id,
        leave_type = request.leave_type.as_ref(),
        days = %total_days,
        "leave application submitted"
    );
    Ok(application)
}

/// Cancel a Pending application; only the owning teacher may do so. Releases
/// the pending reservation for quota categories.
pub async fn cancel(
    pool: &MySqlPool,
    application_id: u64,
    teacher_id: u64,
) -> EngineResult<LeaveApplication> {
    let mut tx = pool.begin().await?;

    let application = fetch_application_on(&mut tx, application_id, true)
        .await?
        .filter(|a| a.teacher_id == teacher_id)
        .ok_or_else(|| EngineError::not_found("Leave application not found"))?;
    ensure_pending(&application)?;

    sqlx::query("UPDATE teacher_leave_applications SET status = 'Cancelled' WHERE id = ?")
        .bind(application_id)
        .execute(&mut *tx)
        .await?;

    if let Some(category) = application.kind()?.quota_category() {
        let mut balance =
            locked_balance(&mut tx, application.teacher_id, &application.academic_year).await?;
        balance.release_pending(category, application.total_days);
        store_balance_counters(&mut tx, &balance).await?;
    }

    tx.commit().await?;
    info!(application_id, teacher_id, "leave application cancelled");

    let mut cancelled = application;
    cancelled.status = LeaveStatus::Cancelled.to_string();
    Ok(cancelled)
}

/// Approve a Pending application: quota categories move the reservation into
/// taken days; LOP and Duty Leave only bump their unconditional counters.
pub async fn approve(
    pool: &MySqlPool,
    application_id: u64,
    approver_id: u64,
    admin_notes: Option<String>,
    now: NaiveDateTime,
) -> EngineResult<LeaveApplication> {
    let mut tx = pool.begin().await?;

    let application = fetch_application_on(&mut tx, application_id, true)
        .await?
        .ok_or_else(|| EngineError::not_found("Leave application not found"))?;
    ensure_pending(&application)?;

    sqlx::query(
        r#"
        UPDATE teacher_leave_applications
        SET status = 'Approved', approved_by = ?, approved_date = ?, admin_notes = ?
        WHERE id = ?
        "#,
    )
    .bind(approver_id)
    .bind(now)
    .bind(&admin_notes)
    .bind(application_id)
    .execute(&mut *tx)
    .await?;

    let kind = application.kind()?;
    let mut balance =
        locked_balance(&mut tx, application.teacher_id, &application.academic_year).await?;
    match kind.quota_category() {
        Some(category) => balance.settle_pending_to_taken(category, application.total_days),
        None => balance.credit_quota_free(kind, application.total_days),
    }
    store_balance_counters(&mut tx, &balance).await?;

    tx.commit().await?;
    info!(application_id, approver_id, "leave application approved");

    let mut approved = application;
    approved.status = LeaveStatus::Approved.to_string();
    approved.approved_by = Some(approver_id);
    approved.approved_date = Some(now);
    approved.admin_notes = admin_notes;
    Ok(approved)
}

/// Reject a Pending application with a mandatory reason; mirrors cancel on
/// the ledger side.
pub async fn reject(
    pool: &MySqlPool,
    application_id: u64,
    approver_id: u64,
    rejection_reason: String,
    now: NaiveDateTime,
) -> EngineResult<LeaveApplication> {
    if rejection_reason.trim().is_empty() {
        return Err(EngineError::validation("Rejection reason is required"));
    }

    let mut tx = pool.begin().await?;

    let application = fetch_application_on(&mut tx, application_id, true)
        .await?
        .ok_or_else(|| EngineError::not_found("Leave application not found"))?;
    ensure_pending(&application)?;

    sqlx::query(
        r#"
        UPDATE teacher_leave_applications
        SET status = 'Rejected', approved_by = ?, approved_date = ?, rejection_reason = ?
        WHERE id = ?
        "#,
    )
    .bind(approver_id)
    .bind(now)
    .bind(&rejection_reason)
    .bind(application_id)
    .execute(&mut *tx)
    .await?;

    if let Some(category) = application.kind()?.quota_category() {
        let mut balance =
            locked_balance(&mut tx, application.teacher_id, &application.academic_year).await?;
        balance.release_pending(category, application.total_days);
        store_balance_counters(&mut tx, &balance).await?;
    }

    tx.commit().await?;
    info!(application_id, approver_id, "leave application rejected");

    let mut rejected = application;
    rejected.status = LeaveStatus::Rejected.to_string();
    rejected.approved_by = Some(approver_id);
    rejected.approved_date = Some(now);
    rejected.rejection_reason = Some(rejection_reason);
    Ok(rejected)
}

pub async fn get_application(
    pool: &MySqlPool,
    application_id: u64,
) -> EngineResult<Option<LeaveApplication>> {
    let sql = format!(
        "SELECT {} FROM teacher_leave_applications WHERE id = ?",
        APPLICATION_COLUMNS
    );
    let row = sqlx::query_as::<_, LeaveApplication>(&sql)
        .bind(application_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ApplicationFilter {
    /// Filter by tenant
    pub tenant_id: Option<u64>,
    /// Filter by teacher
    pub teacher_id: Option<u64>,
    /// Filter by status (Pending/Approved/Rejected/Cancelled)
    pub status: Option<String>,
    /// Filter by academic year ("2024-25")
    pub academic_year: Option<String>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Pagination per page number
    pub per_page: Option<u64>,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
}

/// Filtered, paginated listing ordered by application date, newest first.
pub async fn list_applications(
    pool: &MySqlPool,
    filter: &ApplicationFilter,
) -> EngineResult<(Vec<LeaveApplication>, i64)> {
    let per_page = filter.per_page.unwrap_or(10).min(100);
    let page = filter.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(tenant_id) = filter.tenant_id {
        where_sql.push_str(" AND tenant_id = ?");
        args.push(FilterValue::U64(tenant_id));
    }
    if let Some(teacher_id) = filter.teacher_id {
        where_sql.push_str(" AND teacher_id = ?");
        args.push(FilterValue::U64(teacher_id));
    }
    if let Some(status) = &filter.status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.clone()));
    }
    if let Some(year) = &filter.academic_year {
        where_sql.push_str(" AND academic_year = ?");
        args.push(FilterValue::Str(year.clone()));
    }

    let count_sql = format!(
        "SELECT COUNT(*) FROM teacher_leave_applications{}",
        where_sql
    );
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(s.clone()),
        };
    }
    let total = count_q.fetch_one(pool).await?;

    let data_sql = format!(
        "SELECT {} FROM teacher_leave_applications{} ORDER BY applied_date DESC LIMIT ? OFFSET ?",
        APPLICATION_COLUMNS, where_sql
    );
    let mut data_q = sqlx::query_as::<_, LeaveApplication>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }
    let applications = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok((applications, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn past_start_date_is_rejected() {
        let today = d(2024, 6, 10);
        let err = validate_leave_dates(d(2024, 6, 9), d(2024, 6, 9), false, 0, today);
        assert!(matches!(err, Err(EngineError::Validation(_))));
    }

    #[test]
    fn advance_notice_is_enforced() {
        let today = d(2024, 6, 10);
        // same-day application with 1 day notice required
        let err = validate_leave_dates(d(2024, 6, 10), d(2024, 6, 10), false, 1, today);
        assert!(err.is_err());
        // tomorrow is fine
        assert!(validate_leave_dates(d(2024, 6, 11), d(2024, 6, 11), false, 1, today).is_ok());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let today = d(2024, 6, 10);
        let err = validate_leave_dates(d(2024, 6, 20), d(2024, 6, 18), false, 0, today);
        assert!(err.is_err());
    }

    #[test]
    fn half_day_must_be_a_single_date() {
        let today = d(2024, 6, 10);
        let err = validate_leave_dates(d(2024, 6, 12), d(2024, 6, 13), true, 0, today);
        assert!(err.is_err());
        assert!(validate_leave_dates(d(2024, 6, 12), d(2024, 6, 12), true, 0, today).is_ok());
    }

    #[test]
    fn half_day_is_half_regardless_of_weekend_policy() {
        let day = d(2024, 6, 8); // a Saturday
        assert_eq!(calculate_leave_days(day, day, true, false), Decimal::new(5, 1));
        assert_eq!(calculate_leave_days(day, day, true, true), Decimal::new(5, 1));
    }

    #[test]
    fn weekday_span_counts_only_weekdays() {
        // Mon 2024-06-03 .. Fri 2024-06-07
        let days = calculate_leave_days(d(2024, 6, 3), d(2024, 6, 7), false, false);
        assert_eq!(days, Decimal::from(5));

        // Mon .. next Mon spans a weekend: 6 weekdays
        let days = calculate_leave_days(d(2024, 6, 3), d(2024, 6, 10), false, false);
        assert_eq!(days, Decimal::from(6));
    }

    #[test]
    fn weekend_counting_uses_the_inclusive_span() {
        let days = calculate_leave_days(d(2024, 6, 3), d(2024, 6, 10), false, true);
        assert_eq!(days, Decimal::from(8));
    }

    #[test]
    fn weekend_only_span_consumes_nothing_when_weekends_skipped() {
        // Sat .. Sun
        let days = calculate_leave_days(d(2024, 6, 8), d(2024, 6, 9), false, false);
        assert_eq!(days, Decimal::ZERO);
    }

    #[test]
    fn policy_flags_block_half_day_and_lop() {
        let mut settings = QuotaSettings {
            id: 1,
            tenant_id: 1,
            academic_year: "2024-25".into(),
            cl_quota: Decimal::from(12),
            sl_quota: Decimal::from(12),
            el_quota: Decimal::from(15),
            maternity_quota: Decimal::from(180),
            paternity_quota: Decimal::from(15),
            allow_half_day: false,
            allow_lop: false,
            duty_leave_unlimited: true,
            max_continuous_days: 30,
            min_advance_days: 1,
            weekend_counted: false,
            is_active: true,
        };

        let half_day = LeaveRequest {
            leave_type: LeaveType::HalfDay,
            start_date: d(2024, 6, 12),
            end_date: d(2024, 6, 12),
            is_half_day: true,
            half_day_period: Some(HalfDayPeriod::FirstHalf),
            reason: "errand".into(),
            contact_during_leave: None,
            address_during_leave: None,
        };
        assert!(validate_against_policy(&half_day, &settings).is_err());

        let lop = LeaveRequest {
            leave_type: LeaveType::Lop,
            start_date: d(2024, 6, 12),
            end_date: d(2024, 6, 12),
            is_half_day: false,
            half_day_period: None,
            reason: "personal".into(),
            contact_during_leave: None,
            address_during_leave: None,
        };
        assert!(validate_against_policy(&lop, &settings).is_err());

        settings.allow_half_day = true;
        settings.allow_lop = true;
        assert!(validate_against_policy(&half_day, &settings).is_ok());
        assert!(validate_against_policy(&lop, &settings).is_ok());
    }

    #[test]
    fn half_day_without_period_is_rejected() {
        let settings = QuotaSettings {
            id: 1,
            tenant_id: 1,
            academic_year: "2024-25".into(),
            cl_quota: Decimal::from(12),
            sl_quota: Decimal::from(12),
            el_quota: Decimal::from(15),
            maternity_quota: Decimal::from(180),
            paternity_quota: Decimal::from(15),
            allow_half_day: true,
            allow_lop: true,
            duty_leave_unlimited: true,
            max_continuous_days: 30,
            min_advance_days: 1,
            weekend_counted: false,
            is_active: true,
        };
        let request = LeaveRequest {
            leave_type: LeaveType::HalfDay,
            start_date: d(2024, 6, 12),
            end_date: d(2024, 6, 12),
            is_half_day: true,
            half_day_period: None,
            reason: "errand".into(),
            contact_during_leave: None,
            address_during_leave: None,
        };
        assert!(validate_against_policy(&request, &settings).is_err());
    }
}
