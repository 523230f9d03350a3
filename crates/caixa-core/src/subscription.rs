//! # Subscription Module
//!
//! Billing periods, the grace window and the trial countdown for the
//! tenant's own Caixa subscription.
//!
//! ## Access Timeline
//! ```text
//!   started_on          trial_ends_on            +14 days
//!       │────── Trial ──────│──── PastDue ────│──── Blocked ────▶
//!
//!   (after the first payment)
//!   period start          paid_through             +14 days
//!       │────── Active ─────│──── PastDue ────│──── Blocked ────▶
//! ```
//!
//! Periods roll over on the anchor day. When a month is shorter than the
//! anchor day the period ends on that month's last day, and the next period
//! goes back to the anchor day:
//!
//! ```text
//! anchor 31:  Jan 31 → Feb 28 → Mar 31 → Apr 30 → May 31
//! ```

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::GRACE_DAYS;

// =============================================================================
// Plan
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[default]
    Monthly,
    Quarterly,
    Annual,
}

impl Plan {
    /// Length of one billing period.
    pub const fn months(&self) -> i32 {
        match self {
            Plan::Monthly => 1,
            Plan::Quarterly => 3,
            Plan::Annual => 12,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Plan::Monthly => "monthly",
            Plan::Quarterly => "quarterly",
            Plan::Annual => "annual",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Plan::Monthly),
            "quarterly" => Ok(Plan::Quarterly),
            "annual" => Ok(Plan::Annual),
            _ => Err(ValidationError::NotAllowed {
                field: "plan".to_string(),
                allowed: vec![
                    "monthly".to_string(),
                    "quarterly".to_string(),
                    "annual".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Date Arithmetic
// =============================================================================

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Moves `date` by `months` (may be negative), landing on `anchor_day` or the
/// last day of the target month, whichever comes first.
///
/// ## Example
/// ```rust
/// use caixa_core::subscription::add_months_anchored;
/// use chrono::NaiveDate;
///
/// let jan31 = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
/// let feb = add_months_anchored(jan31, 1, 31);
/// assert_eq!(feb, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
/// assert_eq!(add_months_anchored(feb, 1, 31), NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());
/// ```
pub fn add_months_anchored(date: NaiveDate, months: i32, anchor_day: u32) -> NaiveDate {
    let index = date.year() * 12 + date.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    let day = anchor_day.clamp(1, 31).min(days_in_month(year, month));

    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

/// A billing period, `start` inclusive and `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Period {
    #[ts(as = "String")]
    pub start: NaiveDate,
    #[ts(as = "String")]
    pub end: NaiveDate,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// The period of `plan` that contains `date`, counting from
/// `first_period_start`. Dates before the first period get the first period.
pub fn period_containing(
    plan: Plan,
    anchor_day: u32,
    first_period_start: NaiveDate,
    date: NaiveDate,
) -> Period {
    let step = plan.months();
    let mut n = 0;
    loop {
        // Always measured from the first start so short months never drift
        let start = if n == 0 {
            first_period_start
        } else {
            add_months_anchored(first_period_start, step * n, anchor_day)
        };
        let end = add_months_anchored(first_period_start, step * (n + 1), anchor_day);
        if date < end || end <= start {
            return Period { start, end };
        }
        n += 1;
    }
}

pub fn trial_end(started_on: NaiveDate, trial_days: i64) -> NaiveDate {
    started_on + Duration::days(trial_days.max(0))
}

// =============================================================================
// Terms and Access
// =============================================================================

/// What the stored subscription row says about billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SubscriptionTerms {
    pub plan: Plan,
    pub anchor_day: u32,
    #[ts(as = "String")]
    pub trial_ends_on: NaiveDate,
    /// End (exclusive) of the last paid period. `None` until the first payment.
    #[ts(as = "Option<String>")]
    pub paid_through: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub canceled_on: Option<NaiveDate>,
}

impl SubscriptionTerms {
    /// Terms for a tenant that just signed up.
    pub fn start_trial(plan: Plan, started_on: NaiveDate, trial_days: i64) -> Self {
        SubscriptionTerms {
            plan,
            anchor_day: started_on.day(),
            trial_ends_on: trial_end(started_on, trial_days),
            paid_through: None,
            canceled_on: None,
        }
    }

    /// Last day of access that was paid for (or granted by the trial).
    #[inline]
    pub fn coverage_end(&self) -> NaiveDate {
        self.paid_through.unwrap_or(self.trial_ends_on)
    }

    /// The period that ends at `paid_through`.
    pub fn current_period(&self) -> Option<Period> {
        let end = self.paid_through?;
        Some(Period {
            start: add_months_anchored(end, -self.plan.months(), self.anchor_day),
            end,
        })
    }

    pub fn cancel(&mut self, on: NaiveDate) {
        self.canceled_on = Some(on);
    }
}

/// Dashboard status bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AccessTone {
    Trial,
    Active,
    PastDue,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccessState {
    pub tone: AccessTone,
    /// Trial: days left in the trial. Active: days until renewal.
    /// PastDue: days of grace left. Blocked: 0.
    pub days_remaining: i64,
    pub can_write: bool,
}

impl AccessState {
    fn new(tone: AccessTone, days_remaining: i64) -> Self {
        AccessState {
            tone,
            days_remaining: days_remaining.max(0),
            can_write: tone != AccessTone::Blocked,
        }
    }
}

/// Classifies the subscription on `today`.
pub fn evaluate(terms: &SubscriptionTerms, today: NaiveDate) -> AccessState {
    let coverage_end = terms.coverage_end();

    if terms.canceled_on.is_some() && today >= coverage_end {
        return AccessState::new(AccessTone::Blocked, 0);
    }

    if today < coverage_end {
        let tone = if terms.paid_through.is_some() {
            AccessTone::Active
        } else {
            AccessTone::Trial
        };
        return AccessState::new(tone, (coverage_end - today).num_days());
    }

    let grace_end = coverage_end + Duration::days(GRACE_DAYS);
    if today < grace_end {
        AccessState::new(AccessTone::PastDue, (grace_end - today).num_days())
    } else {
        AccessState::new(AccessTone::Blocked, 0)
    }
}

/// Applies one period's payment made on `paid_on`.
///
/// Within the grace window the paid period simply extends from the old
/// `paid_through`. The first payment, or a payment after the subscription
/// was blocked, starts a fresh period on `paid_on` and re-anchors billing to
/// that day. Paying also lifts a cancellation.
pub fn apply_payment(terms: &SubscriptionTerms, paid_on: NaiveDate) -> SubscriptionTerms {
    let months = terms.plan.months();
    let mut next = *terms;
    next.canceled_on = None;

    match terms.paid_through {
        Some(paid_through) if paid_on < paid_through + Duration::days(GRACE_DAYS) => {
            next.paid_through = Some(add_months_anchored(paid_through, months, terms.anchor_day));
        }
        _ => {
            next.anchor_day = paid_on.day();
            next.paid_through = Some(add_months_anchored(paid_on, months, next.anchor_day));
        }
    }

    next
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn paid_terms(paid_through: NaiveDate, anchor_day: u32) -> SubscriptionTerms {
        SubscriptionTerms {
            plan: Plan::Monthly,
            anchor_day,
            trial_ends_on: d(2026, 1, 15),
            paid_through: Some(paid_through),
            canceled_on: None,
        }
    }

    #[test]
    fn test_add_months_clamps_and_recovers() {
        assert_eq!(add_months_anchored(d(2026, 1, 31), 1, 31), d(2026, 2, 28));
        assert_eq!(add_months_anchored(d(2026, 2, 28), 1, 31), d(2026, 3, 31));
        assert_eq!(add_months_anchored(d(2024, 1, 31), 1, 31), d(2024, 2, 29));
        assert_eq!(add_months_anchored(d(2024, 2, 29), 12, 29), d(2025, 2, 28));
        assert_eq!(add_months_anchored(d(2026, 11, 30), 3, 30), d(2027, 2, 28));
        assert_eq!(add_months_anchored(d(2026, 1, 10), -1, 10), d(2025, 12, 10));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2026, 2), 28);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2026, 12), 31);
        assert_eq!(days_in_month(2026, 4), 30);
    }

    #[test]
    fn test_period_containing() {
        let p = period_containing(Plan::Monthly, 31, d(2026, 1, 31), d(2026, 3, 15));
        assert_eq!(p.start, d(2026, 2, 28));
        assert_eq!(p.end, d(2026, 3, 31));
        assert!(p.contains(d(2026, 3, 15)));

        let p = period_containing(Plan::Quarterly, 10, d(2026, 1, 10), d(2026, 4, 10));
        assert_eq!(p.start, d(2026, 4, 10));
        assert_eq!(p.end, d(2026, 7, 10));

        // Before the first period
        let p = period_containing(Plan::Annual, 1, d(2026, 1, 1), d(2025, 6, 1));
        assert_eq!(p.start, d(2026, 1, 1));
    }

    #[test]
    fn test_trial_countdown_then_grace_then_blocked() {
        let terms = SubscriptionTerms::start_trial(Plan::Monthly, d(2026, 3, 1), 14);
        assert_eq!(terms.trial_ends_on, d(2026, 3, 15));

        let s = evaluate(&terms, d(2026, 3, 10));
        assert_eq!(s.tone, AccessTone::Trial);
        assert_eq!(s.days_remaining, 5);

        let s = evaluate(&terms, d(2026, 3, 15));
        assert_eq!(s.tone, AccessTone::PastDue);
        assert_eq!(s.days_remaining, 14);
        assert!(s.can_write);

        let s = evaluate(&terms, d(2026, 3, 29));
        assert_eq!(s.tone, AccessTone::Blocked);
        assert!(!s.can_write);
    }

    #[test]
    fn test_active_past_due_blocked() {
        let terms = paid_terms(d(2026, 4, 10), 10);

        let s = evaluate(&terms, d(2026, 4, 1));
        assert_eq!(s.tone, AccessTone::Active);
        assert_eq!(s.days_remaining, 9);

        let s = evaluate(&terms, d(2026, 4, 10));
        assert_eq!(s.tone, AccessTone::PastDue);
        assert_eq!(s.days_remaining, 14);

        let s = evaluate(&terms, d(2026, 4, 23));
        assert_eq!(s.tone, AccessTone::PastDue);
        assert_eq!(s.days_remaining, 1);

        assert_eq!(evaluate(&terms, d(2026, 4, 24)).tone, AccessTone::Blocked);
    }

    #[test]
    fn test_canceled_runs_out_paid_period() {
        let mut terms = paid_terms(d(2026, 4, 10), 10);
        terms.cancel(d(2026, 4, 1));

        assert_eq!(evaluate(&terms, d(2026, 4, 5)).tone, AccessTone::Active);
        // No grace after a cancellation
        assert_eq!(evaluate(&terms, d(2026, 4, 10)).tone, AccessTone::Blocked);
    }

    #[test]
    fn test_apply_payment_extends_within_grace() {
        let terms = paid_terms(d(2026, 4, 10), 10);

        let early = apply_payment(&terms, d(2026, 4, 2));
        assert_eq!(early.paid_through, Some(d(2026, 5, 10)));

        let late = apply_payment(&terms, d(2026, 4, 20));
        assert_eq!(late.paid_through, Some(d(2026, 5, 10)));
        assert_eq!(late.anchor_day, 10);
    }

    #[test]
    fn test_apply_payment_after_lapse_reanchors() {
        let terms = paid_terms(d(2026, 4, 10), 10);
        let next = apply_payment(&terms, d(2026, 4, 24));
        assert_eq!(next.anchor_day, 24);
        assert_eq!(next.paid_through, Some(d(2026, 5, 24)));
        assert_eq!(evaluate(&next, d(2026, 4, 24)).tone, AccessTone::Active);
    }

    #[test]
    fn test_first_payment_sets_anchor() {
        let terms = SubscriptionTerms::start_trial(Plan::Quarterly, d(2026, 3, 1), 14);
        let paid = apply_payment(&terms, d(2026, 3, 12));
        assert_eq!(paid.anchor_day, 12);
        assert_eq!(paid.paid_through, Some(d(2026, 6, 12)));

        let period = paid.current_period().unwrap();
        assert_eq!(period.start, d(2026, 3, 12));
    }

    #[test]
    fn test_anchor_survives_short_month() {
        let terms = paid_terms(d(2026, 1, 31), 31);
        let feb = apply_payment(&terms, d(2026, 1, 30));
        assert_eq!(feb.paid_through, Some(d(2026, 2, 28)));
        let mar = apply_payment(&feb, d(2026, 2, 27));
        assert_eq!(mar.paid_through, Some(d(2026, 3, 31)));
    }

    #[test]
    fn test_payment_lifts_cancellation() {
        let mut terms = paid_terms(d(2026, 4, 10), 10);
        terms.cancel(d(2026, 4, 1));
        assert!(apply_payment(&terms, d(2026, 4, 5)).canceled_on.is_none());
    }

    #[test]
    fn test_plan_parse() {
        assert_eq!("annual".parse::<Plan>().unwrap(), Plan::Annual);
        assert!("weekly".parse::<Plan>().is_err());
        assert_eq!(Plan::Quarterly.to_string(), "quarterly");
    }
}
