use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{EngineError, EngineResult};

/// Leave types as stored in the `leave_type` DB enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
pub enum LeaveType {
    #[serde(rename = "CL")]
    #[strum(serialize = "CL")]
    Cl,
    #[serde(rename = "SL")]
    #[strum(serialize = "SL")]
    Sl,
    #[serde(rename = "EL")]
    #[strum(serialize = "EL")]
    El,
    #[serde(rename = "Half-day")]
    #[strum(serialize = "Half-day")]
    HalfDay,
    #[serde(rename = "LOP")]
    #[strum(serialize = "LOP")]
    Lop,
    #[serde(rename = "Duty Leave")]
    #[strum(serialize = "Duty Leave")]
    DutyLeave,
    #[serde(rename = "Maternity")]
    #[strum(serialize = "Maternity")]
    Maternity,
    #[serde(rename = "Paternity")]
    #[strum(serialize = "Paternity")]
    Paternity,
}

impl LeaveType {
    /// The balance category this leave type draws on. Half-day draws on CL;
    /// LOP and Duty Leave are outside the quota ledger entirely.
    pub fn quota_category(self) -> Option<LeaveCategory> {
        match self {
            LeaveType::Cl | LeaveType::HalfDay => Some(LeaveCategory::Cl),
            LeaveType::Sl => Some(LeaveCategory::Sl),
            LeaveType::El => Some(LeaveCategory::El),
            LeaveType::Maternity => Some(LeaveCategory::Maternity),
            LeaveType::Paternity => Some(LeaveCategory::Paternity),
            LeaveType::Lop | LeaveType::DutyLeave => None,
        }
    }
}

/// Application workflow states. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
pub enum HalfDayPeriod {
    #[serde(rename = "First Half")]
    #[strum(serialize = "First Half")]
    FirstHalf,
    #[serde(rename = "Second Half")]
    #[strum(serialize = "Second Half")]
    SecondHalf,
}

/// The five quota-backed ledger categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
pub enum LeaveCategory {
    #[serde(rename = "CL")]
    #[strum(serialize = "CL")]
    Cl,
    #[serde(rename = "SL")]
    #[strum(serialize = "SL")]
    Sl,
    #[serde(rename = "EL")]
    #[strum(serialize = "EL")]
    El,
    #[serde(rename = "Maternity")]
    #[strum(serialize = "Maternity")]
    Maternity,
    #[serde(rename = "Paternity")]
    #[strum(serialize = "Paternity")]
    Paternity,
}

impl LeaveCategory {
    pub const ALL: [LeaveCategory; 5] = [
        LeaveCategory::Cl,
        LeaveCategory::Sl,
        LeaveCategory::El,
        LeaveCategory::Maternity,
        LeaveCategory::Paternity,
    ];
}

/// Per-tenant leave policy row, one per academic year.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct QuotaSettings {
    pub id: u64,
    pub tenant_id: u64,
    pub academic_year: String,

    #[schema(value_type = f64)]
    pub cl_quota: Decimal,
    #[schema(value_type = f64)]
    pub sl_quota: Decimal,
    #[schema(value_type = f64)]
    pub el_quota: Decimal,
    #[schema(value_type = f64)]
    pub maternity_quota: Decimal,
    #[schema(value_type = f64)]
    pub paternity_quota: Decimal,

    pub allow_half_day: bool,
    pub allow_lop: bool,
    pub duty_leave_unlimited: bool,
    pub max_continuous_days: u32,
    pub min_advance_days: u32,
    pub weekend_counted: bool,

    pub is_active: bool,
}

impl QuotaSettings {
    pub fn quota(&self, category: LeaveCategory) -> Decimal {
        match category {
            LeaveCategory::Cl => self.cl_quota,
            LeaveCategory::Sl => self.sl_quota,
            LeaveCategory::El => self.el_quota,
            LeaveCategory::Maternity => self.maternity_quota,
            LeaveCategory::Paternity => self.paternity_quota,
        }
    }
}

/// Per-teacher ledger row, one per academic year. Balances are derived on
/// read and never stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    pub id: u64,
    pub tenant_id: u64,
    pub teacher_id: u64,
    pub academic_year: String,

    #[schema(value_type = f64)]
    pub cl_total: Decimal,
    #[schema(value_type = f64)]
    pub cl_taken: Decimal,
    #[schema(value_type = f64)]
    pub cl_pending: Decimal,

    #[schema(value_type = f64)]
    pub sl_total: Decimal,
    #[schema(value_type = f64)]
    pub sl_taken: Decimal,
    #[schema(value_type = f64)]
    pub sl_pending: Decimal,

    #[schema(value_type = f64)]
    pub el_total: Decimal,
    #[schema(value_type = f64)]
    pub el_taken: Decimal,
    #[schema(value_type = f64)]
    pub el_pending: Decimal,

    #[schema(value_type = f64)]
    pub maternity_total: Decimal,
    #[schema(value_type = f64)]
    pub maternity_taken: Decimal,
    #[schema(value_type = f64)]
    pub maternity_pending: Decimal,

    #[schema(value_type = f64)]
    pub paternity_total: Decimal,
    #[schema(value_type = f64)]
    pub paternity_taken: Decimal,
    #[schema(value_type = f64)]
    pub paternity_pending: Decimal,

    #[schema(value_type = f64)]
    pub lop_taken: Decimal,
    #[schema(value_type = f64)]
    pub duty_leave_taken: Decimal,
    #[schema(value_type = f64)]
    pub el_carried_forward: Decimal,

    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub last_reset_date: Option<NaiveDate>,
}

impl LeaveBalance {
    pub fn total(&self, category: LeaveCategory) -> Decimal {
        match category {
            LeaveCategory::Cl => self.cl_total,
            LeaveCategory::Sl => self.sl_total,
            LeaveCategory::El => self.el_total,
            LeaveCategory::Maternity => self.maternity_total,
            LeaveCategory::Paternity => self.paternity_total,
        }
    }

    pub fn taken(&self, category: LeaveCategory) -> Decimal {
        match category {
            LeaveCategory::Cl => self.cl_taken,
            LeaveCategory::Sl => self.sl_taken,
            LeaveCategory::El => self.el_taken,
            LeaveCategory::Maternity => self.maternity_taken,
            LeaveCategory::Paternity => self.paternity_taken,
        }
    }

    pub fn pending(&self, category: LeaveCategory) -> Decimal {
        match category {
            LeaveCategory::Cl => self.cl_pending,
            LeaveCategory::Sl => self.sl_pending,
            LeaveCategory::El => self.el_pending,
            LeaveCategory::Maternity => self.maternity_pending,
            LeaveCategory::Paternity => self.paternity_pending,
        }
    }

    /// Derived balance: total − taken − pending. Can go negative after an
    /// admin lowers a total; submit checks keep new applications out then.
    pub fn balance(&self, category: LeaveCategory) -> Decimal {
        self.total(category) - self.taken(category) - self.pending(category)
    }

    pub fn set_total(&mut self, category: LeaveCategory, value: Decimal) {
        match category {
            LeaveCategory::Cl => self.cl_total = value,
            LeaveCategory::Sl => self.sl_total = value,
            LeaveCategory::El => self.el_total = value,
            LeaveCategory::Maternity => self.maternity_total = value,
            LeaveCategory::Paternity => self.paternity_total = value,
        }
    }

    fn set_taken(&mut self, category: LeaveCategory, value: Decimal) {
        match category {
            LeaveCategory::Cl => self.cl_taken = value,
            LeaveCategory::Sl => self.sl_taken = value,
            LeaveCategory::El => self.el_taken = value,
            LeaveCategory::Maternity => self.maternity_taken = value,
            LeaveCategory::Paternity => self.paternity_taken = value,
        }
    }

    fn set_pending(&mut self, category: LeaveCategory, value: Decimal) {
        match category {
            LeaveCategory::Cl => self.cl_pending = value,
            LeaveCategory::Sl => self.sl_pending = value,
            LeaveCategory::El => self.el_pending = value,
            LeaveCategory::Maternity => self.maternity_pending = value,
            LeaveCategory::Paternity => self.paternity_pending = value,
        }
    }

    /// Reserve days against the category on submission.
    pub fn add_pending(&mut self, category: LeaveCategory, days: Decimal) {
        self.set_pending(category, self.pending(category) + days);
    }

    /// Release a reservation on cancel/reject. Saturates at zero so a
    /// repeated release can never poison the derived balance.
    pub fn release_pending(&mut self, category: LeaveCategory, days: Decimal) {
        let next = (self.pending(category) - days).max(Decimal::ZERO);
        self.set_pending(category, next);
    }

    /// Approval: move the reservation into consumed days.
    pub fn settle_pending_to_taken(&mut self, category: LeaveCategory, days: Decimal) {
        self.release_pending(category, days);
        self.set_taken(category, self.taken(category) + days);
    }

    /// LOP / Duty Leave approval: unconditional counters, no quota involved.
    pub fn credit_quota_free(&mut self, leave_type: LeaveType, days: Decimal) {
        match leave_type {
            LeaveType::Lop => self.lop_taken += days,
            LeaveType::DutyLeave => self.duty_leave_taken += days,
            _ => {}
        }
    }
}

/// Nested per-category view used by balance responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryBalance {
    #[schema(value_type = f64)]
    pub total: Decimal,
    #[schema(value_type = f64)]
    pub taken: Decimal,
    #[schema(value_type = f64)]
    pub pending: Decimal,
    #[schema(value_type = f64)]
    pub balance: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveBalanceView {
    pub id: u64,
    pub teacher_id: u64,
    pub academic_year: String,
    pub cl: CategoryBalance,
    pub sl: CategoryBalance,
    pub el: CategoryBalance,
    pub maternity: CategoryBalance,
    pub paternity: CategoryBalance,
    #[schema(value_type = f64)]
    pub lop_taken: Decimal,
    #[schema(value_type = f64)]
    pub duty_leave_taken: Decimal,
    #[schema(value_type = f64)]
    pub el_carried_forward: Decimal,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub last_reset_date: Option<NaiveDate>,
}

impl LeaveBalance {
    pub fn view(&self) -> LeaveBalanceView {
        let cat = |c: LeaveCategory| CategoryBalance {
            total: self.total(c),
            taken: self.taken(c),
            pending: self.pending(c),
            balance: self.balance(c),
        };
        LeaveBalanceView {
            id: self.id,
            teacher_id: self.teacher_id,
            academic_year: self.academic_year.clone(),
            cl: cat(LeaveCategory::Cl),
            sl: cat(LeaveCategory::Sl),
            el: cat(LeaveCategory::El),
            maternity: cat(LeaveCategory::Maternity),
            paternity: cat(LeaveCategory::Paternity),
            lop_taken: self.lop_taken,
            duty_leave_taken: self.duty_leave_taken,
            el_carried_forward: self.el_carried_forward,
            notes: self.notes.clone(),
            last_reset_date: self.last_reset_date,
        }
    }
}

/// One leave request row. Enum-valued columns stay `String` in the row
/// struct (they come back from MySQL as text) and parse on demand.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveApplication {
    pub id: u64,
    pub tenant_id: u64,
    pub teacher_id: u64,

    pub leave_type: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub is_half_day: bool,
    pub half_day_period: Option<String>,
    #[schema(value_type = f64)]
    pub total_days: Decimal,

    pub reason: String,
    pub contact_during_leave: Option<String>,
    pub address_during_leave: Option<String>,

    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub applied_date: NaiveDateTime,
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_date: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
    pub admin_notes: Option<String>,

    pub academic_year: String,
}

impl LeaveApplication {
    pub fn kind(&self) -> EngineResult<LeaveType> {
        self.leave_type
            .parse()
            .map_err(|_| EngineError::validation(format!("Unknown leave type: {}", self.leave_type)))
    }

    pub fn state(&self) -> EngineResult<LeaveStatus> {
        self.status
            .parse()
            .map_err(|_| EngineError::validation(format!("Unknown leave status: {}", self.status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn fresh_balance() -> LeaveBalance {
        LeaveBalance {
            id: 1,
            tenant_id: 1,
            teacher_id: 7,
            academic_year: "2024-25".into(),
            cl_total: Decimal::from(12),
            cl_taken: Decimal::ZERO,
            cl_pending: Decimal::ZERO,
            sl_total: Decimal::from(12),
            sl_taken: Decimal::ZERO,
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
    fn balance_is_total_minus_taken_minus_pending() {
        let mut b = fresh_balance();
        b.add_pending(LeaveCategory::Cl, Decimal::from(3));
        for c in LeaveCategory::ALL {
            assert_eq!(b.balance(c), b.total(c) - b.taken(c) - b.pending(c));
        }
        assert_eq!(b.balance(LeaveCategory::Cl), Decimal::from(9));
    }

    #[test]
    fn submit_then_cancel_round_trips_pending() {
        for c in LeaveCategory::ALL {
            let mut b = fresh_balance();
            let before = b.pending(c);
            b.add_pending(c, Decimal::new(25, 1));
            b.release_pending(c, Decimal::new(25, 1));
            assert_eq!(b.pending(c), before);
        }
    }

    #[test]
    fn approve_moves_pending_to_taken_total_unchanged() {
        let mut b = fresh_balance();
        b.add_pending(LeaveCategory::Cl, Decimal::from(3));
        assert_eq!(b.balance(LeaveCategory::Cl), Decimal::from(9));

        b.settle_pending_to_taken(LeaveCategory::Cl, Decimal::from(3));
        assert_eq!(b.cl_taken, Decimal::from(3));
        assert_eq!(b.cl_pending, Decimal::ZERO);
        assert_eq!(b.cl_total, Decimal::from(12));
        assert_eq!(b.balance(LeaveCategory::Cl), Decimal::from(9));
    }

    #[test]
    fn release_pending_saturates_at_zero() {
        let mut b = fresh_balance();
        b.add_pending(LeaveCategory::Sl, Decimal::ONE);
        b.release_pending(LeaveCategory::Sl, Decimal::from(5));
        assert_eq!(b.sl_pending, Decimal::ZERO);
    }

    #[test]
    fn half_day_draws_on_cl_and_quota_free_types_have_no_category() {
        assert_eq!(LeaveType::HalfDay.quota_category(), Some(LeaveCategory::Cl));
        assert_eq!(LeaveType::Lop.quota_category(), None);
        assert_eq!(LeaveType::DutyLeave.quota_category(), None);
    }

    #[test]
    fn quota_free_credit_targets_the_right_counter() {
        let mut b = fresh_balance();
        b.credit_quota_free(LeaveType::Lop, Decimal::from(2));
        b.credit_quota_free(LeaveType::DutyLeave, Decimal::ONE);
        assert_eq!(b.lop_taken, Decimal::from(2));
        assert_eq!(b.duty_leave_taken, Decimal::ONE);
        // quota ledger untouched
        for c in LeaveCategory::ALL {
            assert_eq!(b.pending(c), Decimal::ZERO);
            assert_eq!(b.taken(c), Decimal::ZERO);
        }
    }

    #[test]
    fn enum_strings_match_db_values() {
        assert_eq!(LeaveType::HalfDay.to_string(), "Half-day");
        assert_eq!(LeaveType::DutyLeave.to_string(), "Duty Leave");
        assert_eq!("LOP".parse::<LeaveType>().unwrap(), LeaveType::Lop);
        assert_eq!("Cancelled".parse::<LeaveStatus>().unwrap(), LeaveStatus::Cancelled);
        assert_eq!(HalfDayPeriod::FirstHalf.to_string(), "First Half");
    }
}
