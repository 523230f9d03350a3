//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A R$ 10,00 discount split over 3 lines:                                │
//! │    3.33 + 3.33 + 3.33 = 9.99        → Lost R$ 0,01!                     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Centavos + explicit remainders                   │
//! │    split_proportionally(1000, [1, 1, 1]) = [334, 333, 333]              │
//! │    The sum is always exact                                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caixa_core::money::Money;
//!
//! let price = Money::from_cents(1099); // R$ 10,99
//!
//! let doubled = price * 2;                    // R$ 21,98
//! let total = price + Money::from_cents(500); // R$ 15,99
//! assert_eq!(total.cents(), 1599);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (centavos).
///
/// ## Design Decisions
/// - **i64 (signed)**: Returns, refunds and expenses are negative deltas
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// Product.price_cents ──► CartLine.gross ──► CartTotals.total ──► Tender
///
/// Purchase.amount ──► pendency::allocate ──► AllocationLine.applied
///
/// LedgerEntry.amount ──► ledger::running_balance ──► BalancePoint.balance
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    ///
    /// ## Note
    /// For negative amounts, only the major unit should be negative.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (reais) portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the smaller of two values.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Returns the larger of two values.
    #[inline]
    pub fn max(self, other: Money) -> Money {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    /// Calculates tax on a tax-exclusive amount.
    ///
    /// ## Implementation
    /// Half-up integer rounding: `(amount * bps + 5000) / 10000`, computed on
    /// the absolute value so that returns round symmetrically.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    /// use caixa_core::types::TaxRate;
    ///
    /// let price = Money::from_cents(1000);
    /// let rate = TaxRate::from_bps(825);
    /// // R$ 10,00 × 8.25% = R$ 0,825 → R$ 0,83
    /// assert_eq!(price.calculate_tax(rate).cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percentage(rate.bps())
    }

    /// Returns the tax already contained in a tax-inclusive amount.
    ///
    /// `tax = amount × bps / (10000 + bps)`, rounded half-up.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    /// use caixa_core::types::TaxRate;
    ///
    /// // R$ 11,00 with 10% included → R$ 1,00 of tax
    /// let gross = Money::from_cents(1100);
    /// assert_eq!(gross.extract_tax(TaxRate::from_bps(1000)).cents(), 100);
    /// ```
    pub fn extract_tax(&self, rate: TaxRate) -> Money {
        if rate.is_zero() {
            return Money::zero();
        }
        let divisor = 10_000i128 + rate.bps() as i128;
        let magnitude = (self.0.unsigned_abs() as i128 * rate.bps() as i128 * 2 + divisor)
            / (divisor * 2);
        Money::from_cents(self.signum() * magnitude as i64)
    }

    /// Returns `bps` basis points of this amount, rounded half-up.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(10000).percentage(1000).cents(), 1000);
    /// assert_eq!(Money::from_cents(-10000).percentage(1000).cents(), -1000);
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        // i128 prevents overflow on large amounts
        let magnitude = (self.0.unsigned_abs() as i128 * bps as i128 + 5000) / 10000;
        Money::from_cents(self.signum() * magnitude as i64)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(10000);
    /// assert_eq!(subtotal.apply_percentage_discount(1000).cents(), 9000);
    /// ```
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Money {
        *self - self.percentage(discount_bps)
    }

    /// Splits this amount across `weights`, proportionally, so that the parts
    /// sum exactly to `self`.
    ///
    /// Largest-remainder method: every part gets the floor of its share, then
    /// the leftover cents go one by one to the parts with the largest
    /// fractional remainder (earlier index wins ties). Negative weights are
    /// treated as zero. If all weights are zero, everything goes to the first
    /// part.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// let parts = Money::from_cents(1000).split_proportionally(&[1, 1, 1]);
    /// let cents: Vec<i64> = parts.iter().map(|m| m.cents()).collect();
    /// assert_eq!(cents, vec![334, 333, 333]);
    /// ```
    pub fn split_proportionally(&self, weights: &[i64]) -> Vec<Money> {
        if weights.is_empty() {
            return Vec::new();
        }

        let total_weight: i128 = weights.iter().map(|w| (*w).max(0) as i128).sum();
        let mut parts = vec![Money::zero(); weights.len()];

        if total_weight == 0 {
            parts[0] = *self;
            return parts;
        }

        let amount = self.0.unsigned_abs() as i128;
        let sign = self.signum();
        let mut remainders: Vec<(usize, i128)> = Vec::with_capacity(weights.len());
        let mut allocated: i128 = 0;

        for (idx, weight) in weights.iter().enumerate() {
            let weight = (*weight).max(0) as i128;
            let share = amount * weight;
            let floor = share / total_weight;
            allocated += floor;
            parts[idx] = Money::from_cents(sign * floor as i64);
            remainders.push((idx, share % total_weight));
        }

        // Stable sort keeps the earlier index first on equal remainders
        remainders.sort_by(|a, b| b.1.cmp(&a.1));

        let leftover = (amount - allocated) as usize;
        for (idx, _) in remainders.iter().take(leftover) {
            parts[*idx] += Money::from_cents(sign);
        }

        parts
    }

    #[inline]
    const fn signum(&self) -> i64 {
        if self.0 < 0 {
            -1
        } else {
            1
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering for logs. Currency symbols and separators are a
/// presentation concern handled by the server configuration.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i32) -> Self {
        Money(self.0 * qty as i64)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
