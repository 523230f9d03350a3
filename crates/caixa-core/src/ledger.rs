//! # Ledger Module
//!
//! Cash-flow arithmetic over [`LedgerEntry`] rows: signed amounts, running
//! balances, period summaries and per-day totals.
//!
//! ```text
//!   opening R$ 100,00
//!   03-01  income   R$ 50,00   → R$ 150,00
//!   03-01  expense  R$ 30,00   → R$ 120,00
//!   03-02  income   R$ 10,00   → R$ 130,00
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{EntryKind, LedgerEntry};

/// Income is positive, expense negative.
pub fn signed_amount(entry: &LedgerEntry) -> Money {
    match entry.kind {
        EntryKind::Income => entry.amount(),
        EntryKind::Expense => -entry.amount(),
    }
}

/// One step of a running balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BalancePoint {
    pub entry_id: String,
    #[ts(as = "String")]
    pub occurred_on: NaiveDate,
    pub delta: Money,
    pub balance: Money,
}

/// Running balance starting at `opening`.
///
/// Entries are ordered by `(occurred_on, created_at, id)` so the result does
/// not depend on the order rows came back from the database.
pub fn running_balance(opening: Money, entries: &[LedgerEntry]) -> Vec<BalancePoint> {
    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| {
        a.occurred_on
            .cmp(&b.occurred_on)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut balance = opening;
    ordered
        .into_iter()
        .map(|entry| {
            let delta = signed_amount(entry);
            balance += delta;
            BalancePoint {
                entry_id: entry.id.clone(),
                occurred_on: entry.occurred_on,
                delta,
                balance,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashFlowSummary {
    pub income: Money,
    /// Positive total of expenses.
    pub expense: Money,
    pub net: Money,
    pub count: usize,
}

impl CashFlowSummary {
    fn push(&mut self, entry: &LedgerEntry) {
        match entry.kind {
            EntryKind::Income => self.income += entry.amount(),
            EntryKind::Expense => self.expense += entry.amount(),
        }
        self.net = self.income - self.expense;
        self.count += 1;
    }
}

pub fn summarize(entries: &[LedgerEntry]) -> CashFlowSummary {
    let mut summary = CashFlowSummary::default();
    for entry in entries {
        summary.push(entry);
    }
    summary
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyTotal {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub income: Money,
    pub expense: Money,
    pub net: Money,
}

/// Per-day totals in ascending date order. Days without entries are absent.
pub fn daily_totals(entries: &[LedgerEntry]) -> Vec<DailyTotal> {
    let mut days: BTreeMap<NaiveDate, CashFlowSummary> = BTreeMap::new();
    for entry in entries {
        days.entry(entry.occurred_on).or_default().push(entry);
    }

    days.into_iter()
        .map(|(date, s)| DailyTotal {
            date,
            income: s.income,
            expense: s.expense,
            net: s.net,
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntrySource;
    use chrono::{TimeZone, Utc};

    fn entry(id: &str, day: u32, hour: u32, kind: EntryKind, cents: i64) -> LedgerEntry {
        LedgerEntry {
            id: id.to_string(),
            tenant_id: crate::DEFAULT_TENANT_ID.to_string(),
            kind,
            source: EntrySource::Manual,
            amount_cents: cents,
            category: None,
            description: format!("entry {}", id),
            occurred_on: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            reference_id: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 20, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_running_balance_orders_by_date_then_creation() {
        let entries = vec![
            entry("c", 2, 8, EntryKind::Income, 1000),
            entry("b", 1, 9, EntryKind::Expense, 3000),
            entry("a", 1, 8, EntryKind::Income, 5000),
        ];

        let points = running_balance(Money::from_cents(10_000), &entries);
        let ids: Vec<&str> = points.iter().map(|p| p.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let balances: Vec<i64> = points.iter().map(|p| p.balance.cents()).collect();
        assert_eq!(balances, vec![15_000, 12_000, 13_000]);
        assert_eq!(points[1].delta.cents(), -3000);
    }

    #[test]
    fn test_running_balance_can_go_negative() {
        let entries = vec![entry("a", 1, 8, EntryKind::Expense, 500)];
        let points = running_balance(Money::zero(), &entries);
        assert_eq!(points[0].balance.cents(), -500);
    }

    #[test]
    fn test_summarize() {
        let entries = vec![
            entry("a", 1, 8, EntryKind::Income, 5000),
            entry("b", 1, 9, EntryKind::Expense, 3000),
            entry("c", 2, 8, EntryKind::Income, 1000),
        ];
        let s = summarize(&entries);
        assert_eq!(s.income.cents(), 6000);
        assert_eq!(s.expense.cents(), 3000);
        assert_eq!(s.net.cents(), 3000);
        assert_eq!(s.count, 3);

        assert_eq!(summarize(&[]), CashFlowSummary::default());
    }

    #[test]
    fn test_daily_totals() {
        let entries = vec![
            entry("c", 2, 8, EntryKind::Income, 1000),
            entry("a", 1, 8, EntryKind::Income, 5000),
            entry("b", 1, 9, EntryKind::Expense, 3000),
        ];
        let days = daily_totals(&entries);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(days[0].net.cents(), 2000);
        assert_eq!(days[1].income.cents(), 1000);
    }
}
