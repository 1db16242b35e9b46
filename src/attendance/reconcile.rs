use chrono::NaiveDate;
use sqlx::MySqlPool;
use tracing::info;

use crate::error::EngineResult;
use crate::model::attendance::AttendanceStatus;

use super::ledger::fetch_record_on;

/// Attendance-side echo of approved leave: every teacher whose approved
/// application covers `date` and who has no attendance row for that day gets
/// an "On Leave" entry. Manual entries are never overwritten, so a repeat
/// run creates nothing new.
pub async fn auto_mark_from_approved_leave(
    pool: &MySqlPool,
    tenant_id: u64,
    date: NaiveDate,
) -> EngineResult<u64> {
    let mut tx = pool.begin().await?;

    let on_leave: Vec<(u64, String)> = sqlx::query_as(
        r#"
        SELECT teacher_id, leave_type
        FROM teacher_leave_applications
        WHERE tenant_id = ? AND status = 'Approved'
          AND start_date <= ? AND end_date >= ?
        "#,
    )
    .bind(tenant_id)
    .bind(date)
    .bind(date)
    .fetch_all(&mut *tx)
    .await?;

    let mut marked = 0u64;
    for (teacher_id, leave_type) in on_leave {
        if fetch_record_on(&mut tx, teacher_id, date, false).await?.is_some() {
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO teacher_attendance
                (tenant_id, teacher_id, attendance_date, status, remarks)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant_id)
        .bind(teacher_id)
        .bind(date)
        .bind(AttendanceStatus::OnLeave.as_ref())
        .bind(format!("Auto-marked: {} leave", leave_type))
        .execute(&mut *tx)
        .await?;
        marked += 1;
    }

    tx.commit().await?;
    info!(tenant_id, %date, marked, "auto-marked approved leave as attendance");
    Ok(marked)
}
