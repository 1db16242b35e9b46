use crate::api::attendance::{
    AutoMark, BulkMarkAttendance, DayQuery, MarkAttendance, MonthQuery,
};
use crate::api::balance::{InitializeBalance, InitializeBalances, TenantYearQuery, YearQuery};
use crate::api::leave::{
    ApplyLeave, ApproveLeave, CancelLeave, LeaveListResponse, RejectLeave,
};
use crate::attendance::ledger::{BulkEntry, BulkMarkError, BulkMarkOutcome};
use crate::leave::balance::{BalancePatch, InitStats};
use crate::leave::quota::QuotaSettingsPatch;
use crate::leave::workflow::ApplicationFilter;
use crate::model::attendance::{AttendanceRecord, AttendanceStats, AttendanceStatus};
use crate::model::leave::{
    CategoryBalance, HalfDayPeriod, LeaveApplication, LeaveBalance, LeaveBalanceView,
    LeaveCategory, LeaveStatus, LeaveType, QuotaSettings,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School Administration - Leave & Attendance API",
        version = "1.0.0",
        description = r#"
## Leave & Attendance Accounting Engine

Per-teacher leave quota accounting and day-level attendance for a
multi-tenant school administration system.

### 🔹 Key Features
- **Leave Balances**
  - Per-category total/taken/pending counters with derived balances
  - Bulk initialization for all active staff, admin resets and patches
- **Leave Applications**
  - Submit, cancel, approve and reject with atomic ledger updates
- **Attendance**
  - Daily marking with check-in/out derived working hours
  - Monthly statistics and tenant-wide day snapshots
  - Automatic "On Leave" marking from approved applications

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::leave::apply_leave,
        crate::api::leave::cancel_leave,
        crate::api::leave::approve_leave,
        crate::api::leave::reject_leave,
        crate::api::leave::get_leave,
        crate::api::leave::leave_list,

        crate::api::balance::get_balance,
        crate::api::balance::list_balances,
        crate::api::balance::update_balance,
        crate::api::balance::initialize_balance,
        crate::api::balance::initialize_balances,
        crate::api::balance::get_quota_settings,
        crate::api::balance::update_quota_settings,

        crate::api::attendance::mark_attendance,
        crate::api::attendance::bulk_mark_attendance,
        crate::api::attendance::monthly_attendance,
        crate::api::attendance::attendance_stats,
        crate::api::attendance::day_attendance,
        crate::api::attendance::auto_mark_leave
    ),
    components(
        schemas(
            LeaveType,
            LeaveStatus,
            LeaveCategory,
            HalfDayPeriod,
            QuotaSettings,
            QuotaSettingsPatch,
            LeaveBalance,
            LeaveBalanceView,
            CategoryBalance,
            LeaveApplication,
            ApplicationFilter,
            ApplyLeave,
            CancelLeave,
            ApproveLeave,
            RejectLeave,
            LeaveListResponse,
            BalancePatch,
            InitStats,
            InitializeBalance,
            InitializeBalances,
            YearQuery,
            TenantYearQuery,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceStats,
            MarkAttendance,
            BulkMarkAttendance,
            BulkEntry,
            BulkMarkError,
            BulkMarkOutcome,
            MonthQuery,
            DayQuery,
            AutoMark
        )
    ),
    tags(
        (name = "Leave", description = "Leave application workflow APIs"),
        (name = "Balance", description = "Leave balance ledger and quota settings APIs"),
        (name = "Attendance", description = "Attendance marking and reporting APIs"),
    )
)]
pub struct ApiDoc;
