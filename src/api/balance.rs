use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::leave::balance::{self, BalancePatch, InitStats};
use crate::leave::quota::{self, QuotaSettingsPatch};
use crate::model::leave::{LeaveBalanceView, QuotaSettings};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct YearQuery {
    /// Academic year ("2024-25"), defaults to the current one
    pub academic_year: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct TenantYearQuery {
    #[param(example = 1)]
    pub tenant_id: u64,
    /// Academic year ("2024-25"), defaults to the current one
    pub academic_year: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct InitializeBalances {
    #[schema(example = 1)]
    pub tenant_id: u64,
    pub academic_year: Option<String>,
    /// Re-seed the five totals from current quota, preserving taken/pending
    #[serde(default)]
    pub force_reset: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct InitializeBalance {
    #[schema(example = 1)]
    pub tenant_id: u64,
    pub academic_year: Option<String>,
}

/// One teacher's balance with derived per-category numbers
#[utoipa::path(
    get,
    path = "/api/v1/balances/{teacher_id}",
    params(
        ("teacher_id" = u64, Path, description = "Teacher ID"),
        YearQuery
    ),
    responses(
        (status = 200, description = "Balance found", body = LeaveBalanceView),
        (status = 404, description = "Balance not initialized", body = Object, example = json!({
            "message": "Balance not found"
        }))
    ),
    tag = "Balance"
)]
pub async fn get_balance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<YearQuery>,
) -> actix_web::Result<impl Responder> {
    let teacher_id = path.into_inner();
    let today = Utc::now().date_naive();

    let balance = balance::get_balance(
        pool.get_ref(),
        teacher_id,
        query.into_inner().academic_year,
        today,
    )
    .await?;

    match balance {
        Some(b) => Ok(HttpResponse::Ok().json(b.view())),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Balance not found"
        }))),
    }
}

/// All balances of a tenant for the year
#[utoipa::path(
    get,
    path = "/api/v1/balances",
    params(TenantYearQuery),
    responses(
        (status = 200, description = "Balance list", body = [LeaveBalanceView])
    ),
    tag = "Balance"
)]
pub async fn list_balances(
    pool: web::Data<MySqlPool>,
    query: web::Query<TenantYearQuery>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();
    let today = Utc::now().date_naive();

    let balances =
        balance::get_all_balances(pool.get_ref(), query.tenant_id, query.academic_year, today)
            .await?;
    let views: Vec<_> = balances.iter().map(|b| b.view()).collect();

    Ok(HttpResponse::Ok().json(views))
}

/// Admin adjustment of totals / carry-forward / notes
#[utoipa::path(
    put,
    path = "/api/v1/balances/{teacher_id}",
    params(
        ("teacher_id" = u64, Path, description = "Teacher ID"),
        YearQuery
    ),
    request_body = BalancePatch,
    responses(
        (status = 200, description = "Balance updated", body = LeaveBalanceView),
        (status = 400, description = "Patch outside the allow-list bounds"),
        (status = 404, description = "Balance not initialized")
    ),
    tag = "Balance"
)]
pub async fn update_balance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<YearQuery>,
    payload: web::Json<BalancePatch>,
) -> actix_web::Result<impl Responder> {
    let teacher_id = path.into_inner();
    let today = Utc::now().date_naive();
    let year = crate::leave::academic_year::resolve_academic_year(
        query.into_inner().academic_year,
        today,
    );

    let updated =
        balance::update_balance(pool.get_ref(), teacher_id, &year, payload.into_inner()).await?;

    Ok(HttpResponse::Ok().json(updated.view()))
}

/// Seed one teacher's balance from the tenant quota (onboarding)
#[utoipa::path(
    post,
    path = "/api/v1/balances/{teacher_id}/initialize",
    params(
        ("teacher_id" = u64, Path, description = "Teacher ID")
    ),
    request_body = InitializeBalance,
    responses(
        (status = 200, description = "Balance present (created or already there)", body = LeaveBalanceView)
    ),
    tag = "Balance"
)]
pub async fn initialize_balance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<InitializeBalance>,
) -> actix_web::Result<impl Responder> {
    let teacher_id = path.into_inner();
    let payload = payload.into_inner();
    let today = Utc::now().date_naive();

    let settings = quota::get_or_create(
        pool.get_ref(),
        payload.tenant_id,
        payload.academic_year.clone(),
        today,
    )
    .await?;
    let created = balance::initialize_one(
        pool.get_ref(),
        teacher_id,
        payload.tenant_id,
        &settings,
        payload.academic_year,
        today,
    )
    .await?;

    Ok(HttpResponse::Ok().json(created.view()))
}

/// Seed/reset balances for every active teacher of the tenant
#[utoipa::path(
    post,
    path = "/api/v1/balances/initialize",
    request_body = InitializeBalances,
    responses(
        (status = 200, description = "Batch outcome", body = InitStats)
    ),
    tag = "Balance"
)]
pub async fn initialize_balances(
    pool: web::Data<MySqlPool>,
    payload: web::Json<InitializeBalances>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let today = Utc::now().date_naive();

    let stats = balance::initialize_all(
        pool.get_ref(),
        payload.tenant_id,
        payload.academic_year,
        payload.force_reset,
        today,
    )
    .await?;

    Ok(HttpResponse::Ok().json(stats))
}

/// Tenant quota settings (created with defaults on first read)
#[utoipa::path(
    get,
    path = "/api/v1/quota-settings",
    params(TenantYearQuery),
    responses(
        (status = 200, description = "Quota settings", body = QuotaSettings)
    ),
    tag = "Balance"
)]
pub async fn get_quota_settings(
    pool: web::Data<MySqlPool>,
    query: web::Query<TenantYearQuery>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();
    let today = Utc::now().date_naive();

    let settings =
        quota::get_or_create(pool.get_ref(), query.tenant_id, query.academic_year, today).await?;

    Ok(HttpResponse::Ok().json(settings))
}

/// Admin update of quotas and policy flags
#[utoipa::path(
    put,
    path = "/api/v1/quota-settings",
    params(TenantYearQuery),
    request_body = QuotaSettingsPatch,
    responses(
        (status = 200, description = "Updated settings", body = QuotaSettings),
        (status = 400, description = "Invalid quota or policy value")
    ),
    tag = "Balance"
)]
pub async fn update_quota_settings(
    pool: web::Data<MySqlPool>,
    query: web::Query<TenantYearQuery>,
    payload: web::Json<QuotaSettingsPatch>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();
    let today = Utc::now().date_naive();

    let settings = quota::update_settings(
        pool.get_ref(),
        query.tenant_id,
        query.academic_year,
        payload.into_inner(),
        today,
    )
    .await?;

    Ok(HttpResponse::Ok().json(settings))
}
