use anyhow::Result;
use chrono::NaiveDate;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{EngineError, EngineResult};
use crate::leave::academic_year::{academic_year_for, resolve_academic_year};
use crate::model::leave::QuotaSettings;

/// Settings are read on every submission; cache per (tenant, year) and
/// invalidate on admin update.
static QUOTA_CACHE: Lazy<Cache<String, QuotaSettings>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(12 * 3600))
        .build()
});

fn cache_key(tenant_id: u64, academic_year: &str) -> String {
    format!("{}:{}", tenant_id, academic_year)
}

const SELECT_SETTINGS: &str = r#"
    SELECT id, tenant_id, academic_year,
           cl_quota, sl_quota, el_quota, maternity_quota, paternity_quota,
           allow_half_day, allow_lop, duty_leave_unlimited,
           max_continuous_days, min_advance_days, weekend_counted, is_active
    FROM leave_quota_settings
    WHERE tenant_id = ? AND academic_year = ?
"#;

async fn fetch_settings(
    pool: &MySqlPool,
    tenant_id: u64,
    academic_year: &str,
) -> EngineResult<Option<QuotaSettings>> {
    let settings = sqlx::query_as::<_, QuotaSettings>(SELECT_SETTINGS)
        .bind(tenant_id)
        .bind(academic_year)
        .fetch_optional(pool)
        .await?;
    Ok(settings)
}

/// Returns the tenant's settings row for the year, creating it with the
/// stock defaults on first read (CL 12, SL 12, EL 15, maternity 180,
/// paternity 15, 30 continuous days max, 1 day advance notice).
pub async fn get_or_create(
    pool: &MySqlPool,
    tenant_id: u64,
    academic_year: Option<String>,
    today: NaiveDate,
) -> EngineResult<QuotaSettings> {
    let year = resolve_academic_year(academic_year, today);
    let key = cache_key(tenant_id, &year);

    if let Some(cached) = QUOTA_CACHE.get(&key).await {
        return Ok(cached);
    }

    if let Some(existing) = fetch_settings(pool, tenant_id, &year).await? {
        QUOTA_CACHE.insert(key, existing.clone()).await;
        return Ok(existing);
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO leave_quota_settings (tenant_id, academic_year)
        VALUES (?, ?)
        "#,
    )
    .bind(tenant_id)
    .bind(&year)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => info!(tenant_id, year = %year, "created default quota settings"),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            // lost a concurrent-create race; the row is there now
        }
        Err(e) => return Err(e.into()),
    }

    let settings = fetch_settings(pool, tenant_id, &year)
        .await?
        .ok_or_else(|| EngineError::not_found("Quota settings missing after create"))?;
    QUOTA_CACHE.insert(key, settings.clone()).await;
    Ok(settings)
}

/// Admin patch for quotas and policy flags. Absent fields keep their value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct QuotaSettingsPatch {
    #[schema(value_type = Option<f64>)]
    pub cl_quota: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub sl_quota: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub el_quota: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub maternity_quota: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub paternity_quota: Option<Decimal>,
    pub allow_half_day: Option<bool>,
    pub allow_lop: Option<bool>,
    pub duty_leave_unlimited: Option<bool>,
    pub max_continuous_days: Option<u32>,
    pub min_advance_days: Option<u32>,
    pub weekend_counted: Option<bool>,
    pub is_active: Option<bool>,
}

pub fn apply_settings_patch(
    settings: &mut QuotaSettings,
    patch: &QuotaSettingsPatch,
) -> EngineResult<()> {
    if let Some(v) = patch.cl_quota {
        settings.cl_quota = v;
    }
    if let Some(v) = patch.sl_quota {
        settings.sl_quota = v;
    }
    if let Some(v) = patch.el_quota {
        settings.el_quota = v;
    }
    if let Some(v) = patch.maternity_quota {
        settings.maternity_quota = v;
    }
    if let Some(v) = patch.paternity_quota {
        settings.paternity_quota = v;
    }
    if let Some(v) = patch.allow_half_day {
        settings.allow_half_day = v;
    }
    if let Some(v) = patch.allow_lop {
        settings.allow_lop = v;
    }
    if let Some(v) = patch.duty_leave_unlimited {
        settings.duty_leave_unlimited = v;
    }
    if let Some(v) = patch.max_continuous_days {
        settings.max_continuous_days = v;
    }
    if let Some(v) = patch.min_advance_days {
        settings.min_advance_days = v;
    }
    if let Some(v) = patch.weekend_counted {
        settings.weekend_counted = v;
    }
    if let Some(v) = patch.is_active {
        settings.is_active = v;
    }

    let quotas = [
        settings.cl_quota,
        settings.sl_quota,
        settings.el_quota,
        settings.maternity_quota,
        settings.paternity_quota,
    ];
    if quotas.iter().any(|q| q.is_sign_negative()) {
        return Err(EngineError::validation("Quotas cannot be negative"));
    }
    if settings.max_continuous_days < 1 {
        return Err(EngineError::validation("max_continuous_days must be at least 1"));
    }
    Ok(())
}

/// Overwrite the tenant's settings for the year (creating defaults first if
/// this is the first touch) and drop the cached copy.
pub async fn update_settings(
    pool: &MySqlPool,
    tenant_id: u64,
    academic_year: Option<String>,
    patch: QuotaSettingsPatch,
    today: NaiveDate,
) -> EngineResult<QuotaSettings> {
    let mut settings = get_or_create(pool, tenant_id, academic_year, today).await?;
    apply_settings_patch(&mut settings, &patch)?;

    sqlx::query(
        r#"
        UPDATE leave_quota_settings
        SET cl_quota = ?, sl_quota = ?, el_quota = ?,
            maternity_quota = ?, paternity_quota = ?,
            allow_half_day = ?, allow_lop = ?, duty_leave_unlimited = ?,
            max_continuous_days = ?, min_advance_days = ?, weekend_counted = ?,
            is_active = ?
        WHERE id = ?
        "#,
    )
    .bind(settings.cl_quota)
    .bind(settings.sl_quota)
    .bind(settings.el_quota)
    .bind(settings.maternity_quota)
    .bind(settings.paternity_quota)
    .bind(settings.allow_half_day)
    .bind(settings.allow_lop)
    .bind(settings.duty_leave_unlimited)
    .bind(settings.max_continuous_days)
    .bind(settings.min_advance_days)
    .bind(settings.weekend_counted)
    .bind(settings.is_active)
    .bind(settings.id)
    .execute(pool)
    .await?;

    QUOTA_CACHE
        .invalidate(&cache_key(tenant_id, &settings.academic_year))
        .await;
    info!(tenant_id, year = %settings.academic_year, "quota settings updated");
    Ok(settings)
}

async fn batch_cache(rows: &[QuotaSettings]) {
    let futures: Vec<_> = rows
        .iter()
        .map(|s| QUOTA_CACHE.insert(cache_key(s.tenant_id, &s.academic_year), s.clone()))
        .collect();
    futures::future::join_all(futures).await;
}

/// Preload every active tenant's current-year settings at startup (batched).
pub async fn warmup_settings_cache(pool: &MySqlPool, today: NaiveDate, batch_size: usize) -> Result<()> {
    let year = academic_year_for(today);

    let mut stream = sqlx::query_as::<_, QuotaSettings>(
        r#"
        SELECT id, tenant_id, academic_year,
               cl_quota, sl_quota, el_quota, maternity_quota, paternity_quota,
               allow_half_day, allow_lop, duty_leave_unlimited,
               max_continuous_days, min_advance_days, weekend_counted, is_active
        FROM leave_quota_settings
        WHERE academic_year = ? AND is_active = TRUE
        "#,
    )
    .bind(&year)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        batch.push(row?);
        total += 1;

        if batch.len() >= batch_size {
            batch_cache(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        batch_cache(&batch).await;
    }

    info!(year = %year, tenants = total, "quota settings cache warmup complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_settings() -> QuotaSettings {
        QuotaSettings {
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
        }
    }

    #[test]
    fn patch_overrides_only_supplied_fields() {
        let mut s = default_settings();
        let patch = QuotaSettingsPatch {
            cl_quota: Some(Decimal::from(10)),
            weekend_counted: Some(true),
            ..Default::default()
        };
        apply_settings_patch(&mut s, &patch).unwrap();
        assert_eq!(s.cl_quota, Decimal::from(10));
        assert!(s.weekend_counted);
        assert_eq!(s.sl_quota, Decimal::from(12));
        assert_eq!(s.max_continuous_days, 30);
    }

    #[test]
    fn patch_rejects_negative_quota_and_zero_span() {
        let mut s = default_settings();
        let negative = QuotaSettingsPatch {
            el_quota: Some(Decimal::from(-1)),
            ..Default::default()
        };
        assert!(apply_settings_patch(&mut s, &negative).is_err());

        let mut s = default_settings();
        let zero_span = QuotaSettingsPatch {
            max_continuous_days: Some(0),
            ..Default::default()
        };
        assert!(apply_settings_patch(&mut s, &zero_span).is_err());
    }
}
