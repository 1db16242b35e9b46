use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlConnection, MySqlPool};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::error::{EngineError, EngineResult};
use crate::leave::academic_year::resolve_academic_year;
use crate::leave::quota;
use crate::model::leave::{LeaveBalance, LeaveCategory, QuotaSettings};

const BALANCE_COLUMNS: &str = r#"
    id, tenant_id, teacher_id, academic_year,
    cl_total, cl_taken, cl_pending,
    sl_total, sl_taken, sl_pending,
    el_total, el_taken, el_pending,
    maternity_total, maternity_taken, maternity_pending,
    paternity_total, paternity_taken, paternity_pending,
    lop_taken, duty_leave_taken, el_carried_forward,
    notes, last_reset_date
"#;

/// Fetch one ledger row, optionally locking it for the enclosing
/// transaction. Every workflow mutation goes through the locked form so
/// concurrent submits serialize on the row.
pub(crate) async fn fetch_balance_on(
    conn: &mut MySqlConnection,
    teacher_id: u64,
    academic_year: &str,
    lock: bool,
) -> EngineResult<Option<LeaveBalance>> {
    let mut sql = format!(
        "SELECT {} FROM teacher_leave_balance WHERE teacher_id = ? AND academic_year = ?",
        BALANCE_COLUMNS
    );
    if lock {
        sql.push_str(" FOR UPDATE");
    }

    let row = sqlx::query_as::<_, LeaveBalance>(&sql)
        .bind(teacher_id)
        .bind(academic_year)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Persist the mutable counters of an already-loaded row.
pub(crate) async fn store_balance_counters(
    conn: &mut MySqlConnection,
    balance: &LeaveBalance,
) -> EngineResult<()> {
    sqlx::query(
        r#"
        UPDATE teacher_leave_balance
        SET cl_total = ?, cl_taken = ?, cl_pending = ?,
            sl_total = ?, sl_taken = ?, sl_pending = ?,
            el_total = ?, el_taken = ?, el_pending = ?,
            maternity_total = ?, maternity_taken = ?, maternity_pending = ?,
            paternity_total = ?, paternity_taken = ?, paternity_pending = ?,
            lop_taken = ?, duty_leave_taken = ?, el_carried_forward = ?,
            notes = ?, last_reset_date = ?
        WHERE id = ?
        "#,
    )
    .bind(balance.cl_total)
    .bind(balance.cl_taken)
    .bind(balance.cl_pending)
    .bind(balance.sl_total)
    .bind(balance.sl_taken)
    .bind(balance.sl_pending)
    .bind(balance.el_total)
    .bind(balance.el_taken)
    .bind(balance.el_pending)
    .bind(balance.maternity_total)
    .bind(balance.maternity_taken)
    .bind(balance.maternity_pending)
    .bind(balance.paternity_total)
    .bind(balance.paternity_taken)
    .bind(balance.paternity_pending)
    .bind(balance.lop_taken)
    .bind(balance.duty_leave_taken)
    .bind(balance.el_carried_forward)
    .bind(&balance.notes)
    .bind(balance.last_reset_date)
    .bind(balance.id)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_seeded_balance(
    conn: &mut MySqlConnection,
    teacher_id: u64,
    tenant_id: u64,
    settings: &QuotaSettings,
    academic_year: &str,
    today: NaiveDate,
) -> EngineResult<()> {
    sqlx::query(
        r#"
        INSERT INTO teacher_leave_balance
            (tenant_id, teacher_id, academic_year,
             cl_total, sl_total, el_total, maternity_total, paternity_total,
             last_reset_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(tenant_id)
    .bind(teacher_id)
    .bind(academic_year)
    .bind(settings.cl_quota)
    .bind(settings.sl_quota)
    .bind(settings.el_quota)
    .bind(settings.maternity_quota)
    .bind(settings.paternity_quota)
    .bind(today)
    .execute(conn)
    .await?;
    Ok(())
}

/// Seed a zero-taken/zero-pending row from quota totals. Returns the
/// existing row unchanged when one is already there (a no-op, not an error).
pub async fn initialize_one(
    pool: &MySqlPool,
    teacher_id: u64,
    tenant_id: u64,
    settings: &QuotaSettings,
    academic_year: Option<String>,
    today: NaiveDate,
) -> EngineResult<LeaveBalance> {
    let year = resolve_academic_year(academic_year, today);
    let mut tx = pool.begin().await?;

    if let Some(existing) = fetch_balance_on(&mut tx, teacher_id, &year, false).await? {
        warn!(teacher_id, year = %year, "balance already initialized");
        tx.commit().await?;
        return Ok(existing);
    }

    insert_seeded_balance(&mut tx, teacher_id, tenant_id, settings, &year, today).await?;
    let created = fetch_balance_on(&mut tx, teacher_id, &year, false)
        .await?
        .ok_or_else(|| EngineError::not_found("Balance missing after insert"))?;
    tx.commit().await?;

    info!(teacher_id, year = %year, "initialized leave balance");
    Ok(created)
}

/// Overwrite the five quota totals from current settings, leaving taken and
/// pending untouched.
pub(crate) fn apply_quota_reset(
    balance: &mut LeaveBalance,
    settings: &QuotaSettings,
    today: NaiveDate,
) {
    for category in LeaveCategory::ALL {
        balance.set_total(category, settings.quota(category));
    }
    balance.last_reset_date = Some(today);
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct InitStats {
    pub total_teachers: u32,
    pub initialized: u32,
    pub already_exists: u32,
    pub reset: u32,
    pub errors: u32,
}

/// Walk all active teachers of the tenant, creating missing balance rows (or
/// resetting totals when `force_reset`). Per-teacher failures are counted
/// and skipped; the batch commits once at the end.
pub async fn initialize_all(
    pool: &MySqlPool,
    tenant_id: u64,
    academic_year: Option<String>,
    force_reset: bool,
    today: NaiveDate,
) -> EngineResult<InitStats> {
    let year = resolve_academic_year(academic_year.clone(), today);
    let settings = quota::get_or_create(pool, tenant_id, academic_year, today).await?;

    let mut tx = pool.begin().await?;

    let teacher_ids: Vec<u64> = sqlx::query_scalar::<MySql, u64>(
        "SELECT id FROM teachers WHERE tenant_id = ? AND employee_status = 'Active'",
    )
    .bind(tenant_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut stats = InitStats {
        total_teachers: teacher_ids.len() as u32,
        ..Default::default()
    };

    for teacher_id in teacher_ids {
        let outcome: EngineResult<()> = async {
            match fetch_balance_on(&mut tx, teacher_id, &year, false).await? {
                Some(mut existing) => {
                    if force_reset {
                        apply_quota_reset(&mut existing, &settings, today);
                        store_balance_counters(&mut tx, &existing).await?;
                        stats.reset += 1;
                        info!(teacher_id, year = %year, "reset balance totals from quota");
                    } else {
                        stats.already_exists += 1;
                    }
                }
                None => {
                    insert_seeded_balance(&mut tx, teacher_id, tenant_id, &settings, &year, today)
                        .await?;
                    stats.initialized += 1;
                }
            }
            Ok(())
        }
        .await;

        if let Err(e) = outcome {
            error!(teacher_id, year = %year, error = %e, "balance initialization failed");
            stats.errors += 1;
        }
    }

    tx.commit().await?;
    info!(tenant_id, year = %year, ?stats, "batch balance initialization complete");
    Ok(stats)
}

/// Admin patch. The struct itself is the allow-list: only the five totals,
/// the EL carry-forward and the notes are reachable.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BalancePatch {
    #[schema(value_type = Option<f64>)]
    pub cl_total: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub sl_total: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub el_total: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub maternity_total: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub paternity_total: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub el_carried_forward: Option<Decimal>,
    pub notes: Option<String>,
}

pub(crate) fn apply_balance_patch(
    balance: &mut LeaveBalance,
    patch: &BalancePatch,
) -> EngineResult<()> {
    let updates = [
        (LeaveCategory::Cl, patch.cl_total),
        (LeaveCategory::Sl, patch.sl_total),
        (LeaveCategory::El, patch.el_total),
        (LeaveCategory::Maternity, patch.maternity_total),
        (LeaveCategory::Paternity, patch.paternity_total),
    ];
    for (category, value) in updates {
        if let Some(v) = value {
            if v.is_sign_negative() {
                return Err(EngineError::validation(format!(
                    "{} total cannot be negative",
                    category
                )));
            }
            balance.set_total(category, v);
        }
    }
    if let Some(v) = patch.el_carried_forward {
        if v.is_sign_negative() {
            return Err(EngineError::validation("el_carried_forward cannot be negative"));
        }
        balance.el_carried_forward = v;
    }
    if let Some(notes) = &patch.notes {
        balance.notes = Some(notes.clone());
    }
    Ok(())
}

/// Apply an admin patch to one teacher's ledger row for the year.
pub async fn update_balance(
    pool: &MySqlPool,
    teacher_id: u64,
    academic_year: &str,
    patch: BalancePatch,
) -> EngineResult<LeaveBalance> {
    let mut tx = pool.begin().await?;

    let mut balance = fetch_balance_on(&mut tx, teacher_id, academic_year, true)
        .await?
        .ok_or_else(|| {
            EngineError::not_found(format!(
                "Balance not found for teacher {} in {}",
                teacher_id, academic_year
            ))
        })?;

    apply_balance_patch(&mut balance, &patch)?;
    store_balance_counters(&mut tx, &balance).await?;
    tx.commit().await?;

    info!(teacher_id, year = %academic_year, "balance updated by admin");
    Ok(balance)
}

pub async fn get_balance(
    pool: &MySqlPool,
    teacher_id: u64,
    academic_year: Option<String>,
    today: NaiveDate,
) -> EngineResult<Option<LeaveBalance>> {
    let year = resolve_academic_year(academic_year, today);
    let sql = format!(
        "SELECT {} FROM teacher_leave_balance WHERE teacher_id = ? AND academic_year = ?",
        BALANCE_COLUMNS
    );
    let row = sqlx::query_as::<_, LeaveBalance>(&sql)
        .bind(teacher_id)
        .bind(&year)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn get_all_balances(
    pool: &MySqlPool,
    tenant_id: u64,
    academic_year: Option<String>,
    today: NaiveDate,
) -> EngineResult<Vec<LeaveBalance>> {
    let year = resolve_academic_year(academic_year, today);
    let sql = format!(
        "SELECT {} FROM teacher_leave_balance WHERE tenant_id = ? AND academic_year = ? ORDER BY teacher_id",
        BALANCE_COLUMNS
    );
    let rows = sqlx::query_as::<_, LeaveBalance>(&sql)
        .bind(tenant_id)
        .bind(&year)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> QuotaSettings {
        QuotaSettings {
            id: 1,
            tenant_id: 1,
            academic_year: "2024-25".into(),
            cl_quota: Decimal::from(10),
            sl_quota: Decimal::from(8),
            el_quota: Decimal::from(20),
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

    fn balance_with_activity() -> LeaveBalance {
        LeaveBalance {
            id: 1,
            tenant_id: 1,
            teacher_id: 5,
            academic_year: "2024-25".into(),
            cl_total: Decimal::from(12),
            cl_taken: Decimal::from(4),
            cl_pending: Decimal::from(2),
            sl_total: Decimal::from(12),
            sl_taken: Decimal::ONE,
            sl_pending: Decimal::ZERO,
            el_total: Decimal::from(15),
            el_taken: Decimal::ZERO,
            el_pending: Decimal::ZERO,
            maternity_total: Decimal::from(180),
            maternity_taken: Decimal::ZERO,
            maternity_pending: Decimal::ZERO,
            paternity_total: Decimal::from(15),
            paternity_taken: Decimal::ZERO,
            paternity_pending: Decimal::ZERO,
            lop_taken: Decimal::ZERO,
            duty_leave_taken: Decimal::ZERO,
            el_carried_forward: Decimal::ZERO,
            notes: None,
            last_reset_date: None,
        }
    }

    #[test]
    fn quota_reset_overwrites_totals_but_preserves_activity() {
        let mut b = balance_with_activity();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        apply_quota_reset(&mut b, &settings(), today);

        assert_eq!(b.cl_total, Decimal::from(10));
        assert_eq!(b.sl_total, Decimal::from(8));
        assert_eq!(b.el_total, Decimal::from(20));
        assert_eq!(b.cl_taken, Decimal::from(4));
        assert_eq!(b.cl_pending, Decimal::from(2));
        assert_eq!(b.last_reset_date, Some(today));
    }

    #[test]
    fn patch_is_limited_to_totals_carry_forward_and_notes() {
        let mut b = balance_with_activity();
        let patch = BalancePatch {
            cl_total: Some(Decimal::from(20)),
            el_carried_forward: Some(Decimal::from(3)),
            notes: Some("adjusted after audit".into()),
            ..Default::default()
        };
        apply_balance_patch(&mut b, &patch).unwrap();

        assert_eq!(b.cl_total, Decimal::from(20));
        assert_eq!(b.el_carried_forward, Decimal::from(3));
        assert_eq!(b.notes.as_deref(), Some("adjusted after audit"));
        // taken/pending can only move through the workflow
        assert_eq!(b.cl_taken, Decimal::from(4));
        assert_eq!(b.cl_pending, Decimal::from(2));
    }

    #[test]
    fn patch_rejects_negative_totals_but_allows_negative_derived_balance() {
        let mut b = balance_with_activity();
        let bad = BalancePatch {
            sl_total: Some(Decimal::from(-2)),
            ..Default::default()
        };
        assert!(apply_balance_patch(&mut b, &bad).is_err());

        // lowering CL total below taken+pending is allowed; the derived
        // balance just goes negative
        let lowering = BalancePatch {
            cl_total: Some(Decimal::from(3)),
            ..Default::default()
        };
        apply_balance_patch(&mut b, &lowering).unwrap();
        assert_eq!(b.balance(LeaveCategory::Cl), Decimal::from(-3));
    }
}
