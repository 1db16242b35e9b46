use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Attendance states as stored in the `status` DB enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
pub enum AttendanceStatus {
    Present,
    Absent,
    #[serde(rename = "Half-Day")]
    #[strum(serialize = "Half-Day")]
    HalfDay,
    #[serde(rename = "On Leave")]
    #[strum(serialize = "On Leave")]
    OnLeave,
    Holiday,
    #[serde(rename = "Week Off")]
    #[strum(serialize = "Week Off")]
    WeekOff,
}

impl AttendanceStatus {
    /// Holiday and Week Off fall outside the working-day denominator.
    pub fn is_working_day(self) -> bool {
        !matches!(self, AttendanceStatus::Holiday | AttendanceStatus::WeekOff)
    }
}

/// One row per (teacher, date); a second mark for the day updates in place.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub tenant_id: u64,
    pub teacher_id: u64,
    #[schema(value_type = String, format = "date")]
    pub attendance_date: NaiveDate,
    pub status: String,
    #[schema(value_type = Option<String>, format = "time")]
    pub check_in_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, format = "time")]
    pub check_out_time: Option<NaiveTime>,
    #[schema(value_type = Option<f64>)]
    pub working_hours: Option<Decimal>,
    pub remarks: Option<String>,
    pub marked_by: Option<u64>,
}

/// Monthly aggregate for one teacher.
#[derive(Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceStats {
    pub present_count: u32,
    pub half_day_count: u32,
    pub absent_count: u32,
    pub on_leave_count: u32,
    pub holiday_count: u32,
    pub week_off_count: u32,
    pub total_working_days: u32,
    /// (present + 0.5 * half-day) / working days * 100, 2 dp.
    pub percentage: f64,
}
