//! # Pendency Module
//!
//! A pendency is what a customer still owes from on-account ("fiado")
//! purchases. Payments are spread over the open purchases, oldest first.
//!
//! ## Allocation
//! ```text
//! Payment: R$ 80,00
//!
//!   Purchase (oldest → newest)   remaining   applied   remaining after
//!   ───────────────────────────  ─────────   ───────   ───────────────
//!   2026-03-01  Compra #1         R$ 30,00   R$ 30,00   R$ 0,00  settled
//!   2026-03-05  Compra #2         R$ 40,00   R$ 40,00   R$ 0,00  settled
//!   2026-03-09  Compra #3         R$ 25,00   R$ 10,00   R$ 15,00
//!
//!   applied = R$ 80,00   unapplied = R$ 0,00
//! ```
//!
//! ## Invariants
//! - `applied + unapplied == payment`
//! - every line has `applied > 0`
//! - `settles` holds exactly when `remaining_after` is zero

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// What allocation needs to know about a purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPurchase {
    pub id: String,
    pub amount: Money,
    pub paid: Money,
    pub created_at: DateTime<Utc>,
}

impl OpenPurchase {
    #[inline]
    pub fn remaining(&self) -> Money {
        self.amount - self.paid
    }
}

/// One purchase's share of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationLine {
    pub purchase_id: String,
    pub applied: Money,
    pub remaining_after: Money,
    /// The purchase is fully paid after this payment.
    pub settles: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Allocation {
    pub lines: Vec<AllocationLine>,
    pub applied: Money,
    /// Left over after every open purchase was settled (customer credit).
    pub unapplied: Money,
}

impl Allocation {
    pub fn settled_ids(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|l| l.settles)
            .map(|l| l.purchase_id.as_str())
    }
}

/// Allocates `payment` across `purchases`, oldest first.
///
/// Purchases are ordered by `created_at`, then `id`. Purchases with nothing
/// remaining are skipped.
///
/// ## Example
/// ```rust
/// use caixa_core::money::Money;
/// use caixa_core::pendency::{allocate, OpenPurchase};
/// use chrono::{TimeZone, Utc};
///
/// let purchases = vec![OpenPurchase {
///     id: "c1".into(),
///     amount: Money::from_cents(3000),
///     paid: Money::zero(),
///     created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
/// }];
///
/// let allocation = allocate(Money::from_cents(5000), &purchases).unwrap();
/// assert_eq!(allocation.applied.cents(), 3000);
/// assert_eq!(allocation.unapplied.cents(), 2000);
/// assert!(allocation.lines[0].settles);
/// ```
pub fn allocate(payment: Money, purchases: &[OpenPurchase]) -> CoreResult<Allocation> {
    if !payment.is_positive() {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!("payment must be positive, got {} cents", payment.cents()),
        });
    }

    let mut ordered: Vec<&OpenPurchase> = purchases
        .iter()
        .filter(|p| p.remaining().is_positive())
        .collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut left = payment;
    let mut lines = Vec::new();

    for purchase in ordered {
        if left.is_zero() {
            break;
        }
        let remaining = purchase.remaining();
        let applied = remaining.min(left);
        left -= applied;

        let remaining_after = remaining - applied;
        lines.push(AllocationLine {
            purchase_id: purchase.id.clone(),
            applied,
            remaining_after,
            settles: remaining_after.is_zero(),
        });
    }

    Ok(Allocation {
        lines,
        applied: payment - left,
        unapplied: left,
    })
}

// =============================================================================
// Balance
// =============================================================================

/// A customer's outstanding balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PendencyBalance {
    pub open_count: usize,
    pub outstanding: Money,
    #[ts(as = "Option<String>")]
    pub oldest_open_on: Option<NaiveDate>,
    /// Age in days of the oldest open purchase.
    pub oldest_open_days: Option<i64>,
}

pub fn summarize(purchases: &[OpenPurchase], today: NaiveDate) -> PendencyBalance {
    let open: Vec<&OpenPurchase> = purchases
        .iter()
        .filter(|p| p.remaining().is_positive())
        .collect();

    let oldest_open_on = open.iter().map(|p| p.created_at.date_naive()).min();

    PendencyBalance {
        open_count: open.len(),
        outstanding: open.iter().map(|p| p.remaining()).sum(),
        oldest_open_on,
        oldest_open_days: oldest_open_on.map(|d| (today - d).num_days().max(0)),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
