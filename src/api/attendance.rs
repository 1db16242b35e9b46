use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::attendance::ledger::{BulkEntry, BulkMarkOutcome};
use crate::attendance::{ledger, reconcile};
use crate::model::attendance::{AttendanceRecord, AttendanceStats, AttendanceStatus};

#[derive(Deserialize, ToSchema)]
pub struct MarkAttendance {
    #[schema(example = 42)]
    pub teacher_id: u64,
    #[schema(example = 1)]
    pub tenant_id: u64,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub attendance_date: NaiveDate,
    #[schema(example = "Present")]
    pub status: AttendanceStatus,
    #[schema(example = "09:00:00", format = "time", value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    #[schema(example = "17:30:00", format = "time", value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
    pub remarks: Option<String>,
    pub marked_by: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkMarkAttendance {
    #[schema(example = 1)]
    pub tenant_id: u64,
    pub marked_by: Option<u64>,
    pub records: Vec<BulkEntry>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct MonthQuery {
    #[param(example = 42)]
    pub teacher_id: u64,
    #[param(example = 6)]
    pub month: u32,
    #[param(example = 2026)]
    pub year: i32,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct DayQuery {
    #[param(example = 1)]
    pub tenant_id: u64,
    /// Date to snapshot
    #[param(example = "2026-01-05")]
    pub date: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct AutoMark {
    #[schema(example = 1)]
    pub tenant_id: u64,
    /// Defaults to today
    #[schema(example = "2026-01-05", format = "date", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
}

/// Mark (or re-mark) one teacher's day
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 200, description = "Attendance stored", body = AttendanceRecord),
        (status = 400, description = "Future date", body = Object, example = json!({
            "message": "Cannot mark attendance for future dates"
        }))
    ),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    pool: web::Data<MySqlPool>,
    payload: web::Json<MarkAttendance>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let today = Utc::now().date_naive();

    let record = ledger::mark(
        pool.get_ref(),
        payload.teacher_id,
        payload.tenant_id,
        payload.attendance_date,
        payload.status,
        payload.check_in,
        payload.check_out,
        payload.remarks,
        payload.marked_by,
        today,
    )
    .await?;

    Ok(HttpResponse::Ok().json(record))
}

/// Mark a whole staff list; failed entries are reported, not fatal
#[utoipa::path(
    post,
    path = "/api/v1/attendance/bulk",
    request_body = BulkMarkAttendance,
    responses(
        (status = 200, description = "Per-entry outcome", body = BulkMarkOutcome)
    ),
    tag = "Attendance"
)]
pub async fn bulk_mark_attendance(
    pool: web::Data<MySqlPool>,
    payload: web::Json<BulkMarkAttendance>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let today = Utc::now().date_naive();

    let outcome = ledger::bulk_mark(
        pool.get_ref(),
        payload.records,
        payload.tenant_id,
        payload.marked_by,
        today,
    )
    .await;

    Ok(HttpResponse::Ok().json(outcome))
}

/// One teacher's records for a month, ordered by date
#[utoipa::path(
    get,
    path = "/api/v1/attendance/monthly",
    params(MonthQuery),
    responses(
        (status = 200, description = "Attendance records", body = [AttendanceRecord])
    ),
    tag = "Attendance"
)]
pub async fn monthly_attendance(
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();

    let records =
        ledger::monthly_records(pool.get_ref(), query.teacher_id, query.month, query.year).await?;

    Ok(HttpResponse::Ok().json(records))
}

/// Monthly aggregate counts and attendance percentage
#[utoipa::path(
    get,
    path = "/api/v1/attendance/stats",
    params(MonthQuery),
    responses(
        (status = 200, description = "Monthly statistics", body = AttendanceStats)
    ),
    tag = "Attendance"
)]
pub async fn attendance_stats(
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();

    let stats =
        ledger::monthly_stats(pool.get_ref(), query.teacher_id, query.month, query.year).await?;

    Ok(HttpResponse::Ok().json(stats))
}

/// Tenant-wide snapshot for one date, keyed by teacher id
#[utoipa::path(
    get,
    path = "/api/v1/attendance/day",
    params(DayQuery),
    responses(
        (status = 200, description = "teacher_id -> record map")
    ),
    tag = "Attendance"
)]
pub async fn day_attendance(
    pool: web::Data<MySqlPool>,
    query: web::Query<DayQuery>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();

    let map = ledger::day_map(pool.get_ref(), query.tenant_id, query.date).await?;

    Ok(HttpResponse::Ok().json(map))
}

/// Create "On Leave" entries from approved applications covering the date.
/// Invoked once per day per tenant by the external scheduler; safe to re-run.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/auto-mark",
    request_body = AutoMark,
    responses(
        (status = 200, description = "Number of teachers marked", body = Object, example = json!({
            "marked_count": 3
        }))
    ),
    tag = "Attendance"
)]
pub async fn auto_mark_leave(
    pool: web::Data<MySqlPool>,
    payload: web::Json<AutoMark>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let date = payload.date.unwrap_or_else(|| Utc::now().date_naive());

    let marked =
        reconcile::auto_mark_from_approved_leave(pool.get_ref(), payload.tenant_id, date).await?;

    Ok(HttpResponse::Ok().json(json!({
        "marked_count": marked
    })))
}
