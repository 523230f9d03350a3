//! # Goal Module
//!
//! Progress of a [`Goal`] towards its target over an inclusive date range.
//!
//! `on_track` compares what was achieved against a straight line from zero
//! on `starts_on` to the target on `ends_on`:
//!
//! ```text
//!   target ┤                         ╱
//!          │                     ╱
//!          │  expected ──►   ╱ ●  achieved (on track)
//!          │             ╱
//!        0 ┼─────────╱───┬────────────┤
//!       starts_on       today      ends_on
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Goal, GoalMetric};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GoalProgress {
    pub goal_id: String,
    pub metric: GoalMetric,
    /// Cents for money metrics, a count for `SalesCount`.
    pub achieved: i64,
    pub target: i64,
    pub remaining: i64,
    /// Progress in basis points, capped at 10000.
    pub percent_bps: i64,
    /// Uncapped progress; above 10000 when the goal was exceeded.
    pub raw_percent_bps: i64,
    pub days_total: i64,
    pub days_elapsed: i64,
    pub days_left: i64,
    /// What still has to be achieved per remaining day (rounded up).
    pub required_per_day: i64,
    pub reached: bool,
    pub on_track: bool,
}

pub fn progress(goal: &Goal, achieved: i64, today: NaiveDate) -> GoalProgress {
    let target = goal.target_value;
    let days_total = (goal.ends_on - goal.starts_on).num_days() + 1;
    let days_elapsed = if today < goal.starts_on {
        0
    } else if today > goal.ends_on {
        days_total
    } else {
        (today - goal.starts_on).num_days() + 1
    };
    let days_left = days_total - days_elapsed;

    let remaining = (target - achieved).max(0);
    let raw_percent_bps = if target > 0 {
        (achieved as i128 * 10_000 / target as i128) as i64
    } else {
        10_000
    };
    let reached = achieved >= target;

    let required_per_day = if remaining == 0 {
        0
    } else if days_left > 0 {
        (remaining + days_left - 1) / days_left
    } else {
        remaining
    };

    let expected = if days_total > 0 {
        (target as i128 * days_elapsed as i128 / days_total as i128) as i64
    } else {
        target
    };

    GoalProgress {
        goal_id: goal.id.clone(),
        metric: goal.metric,
        achieved,
        target,
        remaining,
        percent_bps: raw_percent_bps.clamp(0, 10_000),
        raw_percent_bps,
        days_total,
        days_elapsed,
        days_left,
        required_per_day,
        reached,
        on_track: reached || achieved >= expected,
    }
}
