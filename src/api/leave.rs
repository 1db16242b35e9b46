use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::leave::workflow::{self, ApplicationFilter, LeaveRequest};
use crate::model::leave::{HalfDayPeriod, LeaveApplication, LeaveType};

#[derive(Deserialize, ToSchema)]
pub struct ApplyLeave {
    #[schema(example = 42)]
    pub teacher_id: u64,
    #[schema(example = 1)]
    pub tenant_id: u64,
    #[schema(example = "CL")]
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_half_day: bool,
    pub half_day_period: Option<HalfDayPeriod>,
    #[schema(example = "Family function")]
    pub reason: String,
    pub contact_during_leave: Option<String>,
    pub address_during_leave: Option<String>,
    /// Defaults to the current academic year
    pub academic_year: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CancelLeave {
    #[schema(example = 42)]
    pub teacher_id: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct ApproveLeave {
    #[schema(example = 7)]
    pub approver_id: u64,
    pub admin_notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = 7)]
    pub approver_id: u64,
    #[schema(example = "Exam week, no substitutes available")]
    pub rejection_reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveApplication>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/* =========================
Submit leave application
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body = ApplyLeave,
    responses(
        (status = 200, description = "Leave application submitted", body = LeaveApplication),
        (status = 400, description = "Validation failure or insufficient balance"),
        (status = 404, description = "Balance not initialized")
    ),
    tag = "Leave"
)]
pub async fn apply_leave(
    pool: web::Data<MySqlPool>,
    payload: web::Json<ApplyLeave>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let now = Utc::now().naive_utc();

    let request = LeaveRequest {
        leave_type: payload.leave_type,
        start_date: payload.start_date,
        end_date: payload.end_date,
        is_half_day: payload.is_half_day,
        half_day_period: payload.half_day_period,
        reason: payload.reason,
        contact_during_leave: payload.contact_during_leave,
        address_during_leave: payload.address_during_leave,
    };

    let application = workflow::submit(
        pool.get_ref(),
        payload.teacher_id,
        payload.tenant_id,
        request,
        payload.academic_year,
        now,
    )
    .await?;

    Ok(HttpResponse::Ok().json(application))
}

/* =========================
Cancel leave (owning teacher)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave application to cancel")
    ),
    request_body = CancelLeave,
    responses(
        (status = 200, description = "Leave cancelled", body = Object, example = json!({
            "message": "Leave application cancelled successfully"
        })),
        (status = 404, description = "Leave application not found"),
        (status = 409, description = "Application is no longer pending")
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CancelLeave>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    workflow::cancel(pool.get_ref(), leave_id, payload.teacher_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave application cancelled successfully"
    })))
}

/* =========================
Approve leave (admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave application to approve")
    ),
    request_body = ApproveLeave,
    responses(
        (status = 200, description = "Leave approved", body = Object, example = json!({
            "message": "Leave approved successfully"
        })),
        (status = 404, description = "Leave application not found"),
        (status = 409, description = "Application is no longer pending")
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ApproveLeave>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();
    let payload = payload.into_inner();
    let now = Utc::now().naive_utc();

    workflow::approve(pool.get_ref(), leave_id, payload.approver_id, payload.admin_notes, now)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave approved successfully"
    })))
}

/* =========================
Reject leave (admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave application to reject")
    ),
    request_body = RejectLeave,
    responses(
        (status = 200, description = "Leave rejected", body = Object, example = json!({
            "message": "Leave rejected successfully"
        })),
        (status = 400, description = "Missing rejection reason"),
        (status = 404, description = "Leave application not found"),
        (status = 409, description = "Application is no longer pending")
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RejectLeave>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();
    let payload = payload.into_inner();
    let now = Utc::now().naive_utc();

    workflow::reject(
        pool.get_ref(),
        leave_id,
        payload.approver_id,
        payload.rejection_reason,
        now,
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave rejected successfully"
    })))
}

/// Leave application details
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave application to fetch")
    ),
    responses(
        (status = 200, description = "Leave application found", body = LeaveApplication),
        (status = 404, description = "Leave application not found", body = Object, example = json!({
            "message": "Leave application not found"
        }))
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let application = workflow::get_application(pool.get_ref(), leave_id).await?;

    match application {
        Some(app) => Ok(HttpResponse::Ok().json(app)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Leave application not found"
        }))),
    }
}

/// Paginated leave application list
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(ApplicationFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse)
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    pool: web::Data<MySqlPool>,
    query: web::Query<ApplicationFilter>,
) -> actix_web::Result<impl Responder> {
    let filter = query.into_inner();
    let per_page = filter.per_page.unwrap_or(10).min(100);
    let page = filter.page.unwrap_or(1).max(1);

    let (applications, total) = workflow::list_applications(pool.get_ref(), &filter).await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: applications,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}
