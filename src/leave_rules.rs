//! Pure leave calendar, balance, probation and allocation rules.
//!
//! The API handlers fetch rows and delegate every decision here, so the
//! whole rule set is testable without a database.

use chrono::{Days, Months, NaiveDate};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

pub const PAID_LEAVE: &str = "Paid Leave";
pub const PROBATION_MONTHS: u32 = 3;
/// Permission durations are minutes; anything below this was typed in
/// hours by mistake.
pub const PERMISSION_MIN_MINUTES: f64 = 10.0;
/// Paid Leave carry-forward resets at the start of each interval.
pub const PAID_LEAVE_RESET_INTERVAL: u32 = 3;

/// Standard monthly grants: days for leave types, minutes for Permission.
pub const STANDARD_ALLOCATIONS: [(&str, f64); 3] =
    [(PAID_LEAVE, 1.0), ("Unpaid Leave", 30.0), ("Permission", 120.0)];

#[derive(Debug, Error, PartialEq)]
pub enum LeaveRuleError {
    #[error("start date cannot be after end date")]
    InvertedDateRange,
    #[error("Permission duration should be entered in minutes only.")]
    PermissionTooShort,
    #[error("Please enter the permission duration in minutes")]
    PermissionMissing,
    #[error("Paid Leave is not available during probation period (ends on {0}).")]
    PaidLeaveInProbation(NaiveDate),
}

pub fn is_permission(leave_type: &str) -> bool {
    leave_type.eq_ignore_ascii_case("permission")
}

/// Inclusive day count of the range, minus half a day when `half_day`.
pub fn total_days(from: NaiveDate, to: NaiveDate, half_day: bool) -> Result<f64, LeaveRuleError> {
    if from > to {
        return Err(LeaveRuleError::InvertedDateRange);
    }
    let mut days = (to - from).num_days() as f64 + 1.0;
    if half_day {
        days -= 0.5;
    }
    Ok(days)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum BalanceUnit {
    Days,
    Minutes,
}

impl fmt::Display for BalanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceUnit::Days => write!(f, "Days"),
            BalanceUnit::Minutes => write!(f, "Minutes"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct BalanceCheck {
    pub allowed: bool,
    pub remaining: f64,
    pub requested: f64,
    pub unit: BalanceUnit,
}

/// Requested amount for a balance check. Permission requests count in
/// minutes; a half-day request counts half a day regardless of the range.
pub fn requested_amount(
    leave_type: &str,
    from: NaiveDate,
    to: NaiveDate,
    half_day: bool,
    permission_minutes: Option<f64>,
) -> Result<(f64, BalanceUnit), LeaveRuleError> {
    if is_permission(leave_type) {
        let minutes = permission_minutes.unwrap_or(0.0);
        if minutes <= 0.0 {
            return Err(LeaveRuleError::PermissionMissing);
        }
        if minutes < PERMISSION_MIN_MINUTES {
            return Err(LeaveRuleError::PermissionTooShort);
        }
        return Ok((minutes, BalanceUnit::Minutes));
    }

    if from > to {
        return Err(LeaveRuleError::InvertedDateRange);
    }
    let days = if half_day {
        0.5
    } else {
        (to - from).num_days() as f64 + 1.0
    };
    Ok((days, BalanceUnit::Days))
}

/// Compares the remaining balance of the overlapping approved allocations
/// against the requested amount.
pub fn check_balance(
    remaining: f64,
    leave_type: &str,
    from: NaiveDate,
    to: NaiveDate,
    half_day: bool,
    permission_minutes: Option<f64>,
) -> Result<BalanceCheck, LeaveRuleError> {
    let (requested, unit) = requested_amount(leave_type, from, to, half_day, permission_minutes)?;
    Ok(BalanceCheck {
        allowed: remaining >= requested,
        remaining,
        requested,
        unit,
    })
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct ProbationInfo {
    pub in_probation: bool,
    #[schema(value_type = String, format = "date", nullable = true)]
    pub probation_end_date: Option<NaiveDate>,
}

pub fn probation_end(date_of_joining: NaiveDate) -> NaiveDate {
    date_of_joining
        .checked_add_months(Months::new(PROBATION_MONTHS))
        .unwrap_or(NaiveDate::MAX)
}

/// Probation status as of a given date; the end date itself still counts
/// as probation. Missing joining date or the skip flag means no probation.
pub fn probation_info(
    date_of_joining: Option<NaiveDate>,
    skip_probation: bool,
    as_of: NaiveDate,
) -> ProbationInfo {
    let Some(joined) = date_of_joining else {
        return ProbationInfo { in_probation: false, probation_end_date: None };
    };
    if skip_probation {
        return ProbationInfo { in_probation: false, probation_end_date: None };
    }
    let end = probation_end(joined);
    ProbationInfo {
        in_probation: end >= as_of,
        probation_end_date: Some(end),
    }
}

/// Rejects a Paid Leave selection while the employee is in probation.
pub fn ensure_leave_type_allowed(
    leave_type: &str,
    probation: &ProbationInfo,
) -> Result<(), LeaveRuleError> {
    if probation.in_probation && leave_type == PAID_LEAVE {
        let end = probation.probation_end_date.unwrap_or(NaiveDate::MAX);
        return Err(LeaveRuleError::PaidLeaveInProbation(end));
    }
    Ok(())
}

/// Probation test used by the allocation sweep: strictly past the month
/// start, not inclusive like the per-application check.
pub fn in_probation_at_month_start(
    date_of_joining: Option<NaiveDate>,
    skip_probation: bool,
    month_start: NaiveDate,
) -> bool {
    match date_of_joining {
        Some(joined) if !skip_probation => probation_end(joined) > month_start,
        _ => false,
    }
}

pub fn month_start(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

pub fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    month_start(year, month)?
        .checked_add_months(Months::new(1))?
        .checked_sub_days(Days::new(1))
}

/// The allocation proposals for one employee; Paid Leave is withheld in
/// probation.
pub fn proposed_allocations(in_probation: bool) -> Vec<(&'static str, f64)> {
    STANDARD_ALLOCATIONS
        .iter()
        .copied()
        .filter(|(leave_type, _)| !(in_probation && *leave_type == PAID_LEAVE))
        .collect()
}

/// Months where Paid Leave restarts instead of carrying forward.
pub fn is_reset_month(month: u32) -> bool {
    (month - 1) % PAID_LEAVE_RESET_INTERVAL == 0
}

/// Unused balance carried into the next month within a reset period.
pub fn carry_forward(prev_allocated: f64, prev_taken: f64) -> f64 {
    (prev_allocated - prev_taken).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn total_days_counts_inclusive_range() {
        assert_eq!(total_days(d(2024, 1, 10), d(2024, 1, 12), false), Ok(3.0));
        assert_eq!(total_days(d(2024, 1, 10), d(2024, 1, 12), true), Ok(2.5));
        assert_eq!(total_days(d(2024, 1, 10), d(2024, 1, 10), false), Ok(1.0));
        assert_eq!(
            total_days(d(2024, 1, 12), d(2024, 1, 10), false),
            Err(LeaveRuleError::InvertedDateRange)
        );
    }

    #[test]
    fn half_day_requests_half_a_day_of_balance() {
        let (requested, unit) =
            requested_amount("Unpaid Leave", d(2024, 1, 10), d(2024, 1, 12), true, None).unwrap();
        assert_eq!(requested, 0.5);
        assert_eq!(unit, BalanceUnit::Days);
    }

    #[test]
    fn permission_requests_are_minutes() {
        let (requested, unit) =
            requested_amount("Permission", d(2024, 1, 10), d(2024, 1, 10), false, Some(45.0))
                .unwrap();
        assert_eq!(requested, 45.0);
        assert_eq!(unit, BalanceUnit::Minutes);

        assert_eq!(
            requested_amount("Permission", d(2024, 1, 10), d(2024, 1, 10), false, Some(5.0)),
            Err(LeaveRuleError::PermissionTooShort)
        );
        assert_eq!(
            requested_amount("Permission", d(2024, 1, 10), d(2024, 1, 10), false, None),
            Err(LeaveRuleError::PermissionMissing)
        );
    }

    #[test]
    fn balance_check_compares_remaining_against_requested() {
        let ok = check_balance(3.0, "Paid Leave", d(2024, 1, 10), d(2024, 1, 12), false, None)
            .unwrap();
        assert!(ok.allowed);
        assert_eq!(ok.requested, 3.0);

        let short = check_balance(2.0, "Paid Leave", d(2024, 1, 10), d(2024, 1, 12), false, None)
            .unwrap();
        assert!(!short.allowed);
        assert_eq!(short.remaining, 2.0);
    }

    #[test]
    fn probation_end_date_is_inclusive() {
        let info = probation_info(Some(d(2024, 1, 15)), false, d(2024, 4, 15));
        assert!(info.in_probation);
        assert_eq!(info.probation_end_date, Some(d(2024, 4, 15)));

        let after = probation_info(Some(d(2024, 1, 15)), false, d(2024, 4, 16));
        assert!(!after.in_probation);
    }

    #[test]
    fn skip_flag_and_missing_joining_date_disable_probation() {
        assert!(!probation_info(Some(d(2025, 6, 1)), true, d(2025, 6, 2)).in_probation);
        assert!(!probation_info(None, false, d(2025, 6, 2)).in_probation);
    }

    #[test]
    fn paid_leave_is_blocked_in_probation_only() {
        let in_probation = probation_info(Some(d(2025, 5, 1)), false, d(2025, 6, 1));
        assert_eq!(
            ensure_leave_type_allowed(PAID_LEAVE, &in_probation),
            Err(LeaveRuleError::PaidLeaveInProbation(d(2025, 8, 1)))
        );
        assert_eq!(ensure_leave_type_allowed("Unpaid Leave", &in_probation), Ok(()));

        let permanent = probation_info(Some(d(2020, 1, 1)), false, d(2025, 6, 1));
        assert_eq!(ensure_leave_type_allowed(PAID_LEAVE, &permanent), Ok(()));
    }

    #[test]
    fn proposals_withhold_paid_leave_for_probationers() {
        let full = proposed_allocations(false);
        assert_eq!(full.len(), 3);
        assert!(full.iter().any(|(t, _)| *t == PAID_LEAVE));

        let probation = proposed_allocations(true);
        assert_eq!(probation.len(), 2);
        assert!(probation.iter().all(|(t, _)| *t != PAID_LEAVE));
    }

    #[test]
    fn reset_months_repeat_every_quarter() {
        assert!(is_reset_month(1));
        assert!(is_reset_month(4));
        assert!(is_reset_month(7));
        assert!(is_reset_month(10));
        assert!(!is_reset_month(2));
        assert!(!is_reset_month(12));
    }

    #[test]
    fn carry_forward_never_goes_negative() {
        assert_eq!(carry_forward(1.0, 0.0), 1.0);
        assert_eq!(carry_forward(1.0, 2.5), 0.0);
    }

    #[test]
    fn month_window() {
        assert_eq!(month_start(2025, 6), Some(d(2025, 6, 1)));
        assert_eq!(month_end(2025, 6), Some(d(2025, 6, 30)));
        assert_eq!(month_end(2024, 2), Some(d(2024, 2, 29)));
        assert_eq!(month_start(2025, 13), None);
    }
}
