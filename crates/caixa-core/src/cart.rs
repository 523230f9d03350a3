//! # Cart Module
//!
//! Point-of-sale cart: lines, discounts, tax and change.
//!
//! The cart is a plain value. The server receives it whole with every quote
//! or checkout request, so [`Cart::validate`] re-checks every invariant that
//! the mutating methods maintain.
//!
//! ## Computation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         quote(cart, mode)                               │
//! │                                                                         │
//! │  per line:  gross = unit × qty            (qty < 0 is a return)         │
//! │             line discount on |gross|, clamped, carries gross sign       │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │  cart:      cart discount on the SALE part only (positive lines)        │
//! │             split across sale lines by net (largest remainder)          │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │  per line:  net = gross − line discount − cart share                    │
//! │             Exclusive: tax = net × rate,  total = net + tax             │
//! │             Inclusive: tax = extracted,   total = net                   │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │  tender(total, received) → change / refund                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use caixa_core::cart::{quote, tender, Cart, CartLine, Discount};
//! use caixa_core::money::Money;
//! use caixa_core::types::TaxMode;
//!
//! let mut cart = Cart::new();
//! cart.add(CartLine::new("p1", "CAFE-500", "Café 500g", Money::from_cents(1500), 0), 2)
//!     .unwrap();
//! cart.set_cart_discount(Some(Discount::Percent { bps: 1000 })).unwrap();
//!
//! let quote = quote(&cart, TaxMode::Exclusive).unwrap();
//! assert_eq!(quote.totals.total.cents(), 2700);
//!
//! let paid = tender(quote.totals.total, Money::from_cents(3000)).unwrap();
//! assert_eq!(paid.change.cents(), 300);
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Product, TaxMode, TaxRate};
use crate::validation::{
    validate_cart_quantity, validate_discount, validate_price_cents, validate_tax_rate_bps,
};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Discount
// =============================================================================

/// A discount applied to a single line or to the whole cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discount {
    /// Fixed amount in cents.
    Flat { cents: i64 },
    /// Percentage in basis points (1000 = 10%).
    Percent { bps: u32 },
}

impl Discount {
    /// Discount amount for a non-negative `base`, never more than `base`.
    pub fn amount_on(&self, base: Money) -> Money {
        let base = base.max(Money::zero());
        let amount = match *self {
            Discount::Flat { cents } => Money::from_cents(cents.max(0)),
            Discount::Percent { bps } => base.percentage(bps),
        };
        amount.min(base)
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One line of the cart. Product data is frozen when the line is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    /// Positive for a sale, negative for a return.
    pub quantity: i64,
    pub tax_rate_bps: u32,
    #[serde(default)]
    pub discount: Option<Discount>,
}

impl CartLine {
    /// Creates a line with zero quantity; [`Cart::add`] sets the quantity.
    pub fn new(
        product_id: impl Into<String>,
        sku: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        tax_rate_bps: u32,
    ) -> Self {
        CartLine {
            product_id: product_id.into(),
            sku: sku.into(),
            name: name.into(),
            unit_price,
            quantity: 0,
            tax_rate_bps,
            discount: None,
        }
    }

    pub fn from_product(product: &Product) -> Self {
        CartLine::new(
            product.id.clone(),
            product.sku.clone(),
            product.name.clone(),
            product.price(),
            product.tax_rate_bps,
        )
    }

    #[inline]
    pub fn is_return(&self) -> bool {
        self.quantity < 0
    }

    #[inline]
    pub fn gross(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Signed line discount: computed on |gross| and carrying the gross sign.
    pub fn line_discount(&self) -> Money {
        let Some(discount) = self.discount else {
            return Money::zero();
        };
        let gross = self.gross();
        let amount = discount.amount_on(gross.abs());
        if gross.is_negative() {
            -amount
        } else {
            amount
        }
    }

    fn same_direction(&self, product_id: &str, quantity: i64) -> bool {
        self.product_id == product_id && (self.quantity > 0) == (quantity > 0)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The POS cart.
///
/// ## Invariants
/// - At most one line per (product, direction); sale and return lines for the
///   same product are kept apart
/// - Quantity is never 0 and never above 999 in absolute value
/// - At most 100 lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub discount: Option<Discount>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds `quantity` of the product in `line`.
    ///
    /// A line for the same product and the same sign absorbs the quantity.
    /// An opposite-sign quantity gets its own line.
    ///
    /// ## Returns
    /// The index of the line that now holds the quantity.
    pub fn add(&mut self, mut line: CartLine, quantity: i64) -> CoreResult<usize> {
        validate_cart_quantity(quantity)?;

        if let Some(idx) = self
            .lines
            .iter()
            .position(|l| l.same_direction(&line.product_id, quantity))
        {
            let merged = self.lines[idx].quantity + quantity;
            check_quantity(merged)?;
            self.lines[idx].quantity = merged;
            return Ok(idx);
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        line.quantity = quantity;
        self.lines.push(line);
        Ok(self.lines.len() - 1)
    }

    /// Sets the quantity of the line at `index`. Zero removes the line.
    ///
    /// If the new sign collides with another line of the same product, the
    /// two lines are merged.
    pub fn update_quantity(&mut self, index: usize, quantity: i64) -> CoreResult<()> {
        self.line(index)?;

        if quantity == 0 {
            self.lines.remove(index);
            return Ok(());
        }
        validate_cart_quantity(quantity)?;

        let product_id = self.lines[index].product_id.clone();
        let twin = self
            .lines
            .iter()
            .enumerate()
            .position(|(i, l)| i != index && l.same_direction(&product_id, quantity));

        match twin {
            Some(other) => {
                let merged = self.lines[other].quantity + quantity;
                check_quantity(merged)?;
                self.lines[other].quantity = merged;
                self.lines.remove(index);
            }
            None => self.lines[index].quantity = quantity,
        }
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> CoreResult<CartLine> {
        self.line(index)?;
        Ok(self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.discount = None;
    }

    pub fn set_line_discount(&mut self, index: usize, discount: Option<Discount>) -> CoreResult<()> {
        if let Some(d) = &discount {
            validate_discount(d)?;
        }
        self.line(index)?;
        self.lines[index].discount = discount;
        Ok(())
    }

    pub fn set_cart_discount(&mut self, discount: Option<Discount>) -> CoreResult<()> {
        if let Some(d) = &discount {
            validate_discount(d)?;
        }
        self.discount = discount;
        Ok(())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Checks every invariant of a cart that arrived from outside.
    pub fn validate(&self) -> CoreResult<()> {
        if self.lines.len() > MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }
        if let Some(d) = &self.discount {
            validate_discount(d)?;
        }

        for (idx, line) in self.lines.iter().enumerate() {
            check_quantity(line.quantity)?;
            validate_price_cents(line.unit_price.cents())?;
            validate_tax_rate_bps(line.tax_rate_bps)?;
            if let Some(d) = &line.discount {
                validate_discount(d)?;
            }
            let duplicate = self.lines[..idx]
                .iter()
                .any(|l| l.same_direction(&line.product_id, line.quantity));
            if duplicate {
                return Err(ValidationError::Duplicate {
                    field: "cart line".to_string(),
                    value: line.sku.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn line(&self, index: usize) -> CoreResult<&CartLine> {
        self.lines
            .get(index)
            .ok_or_else(|| CoreError::LineNotFound(index.to_string()))
    }
}

fn check_quantity(quantity: i64) -> CoreResult<()> {
    if quantity.abs() > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }
    validate_cart_quantity(quantity)?;
    Ok(())
}

// =============================================================================
// Quote
// =============================================================================

/// The computed breakdown of one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineQuote {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub gross: Money,
    pub line_discount: Money,
    /// This line's share of the cart discount.
    pub cart_discount: Money,
    pub net: Money,
    pub tax: Money,
    pub total: Money,
}

impl LineQuote {
    /// Line discount plus cart share.
    pub fn discount(&self) -> Money {
        self.line_discount + self.cart_discount
    }
}

/// Cart totals. A negative `total` means money goes back to the customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub line_count: usize,
    /// Signed sum of quantities.
    pub total_quantity: i64,
    pub gross: Money,
    pub line_discounts: Money,
    pub cart_discount: Money,
    /// Gross after all discounts.
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quote {
    pub lines: Vec<LineQuote>,
    pub totals: CartTotals,
}

/// Computes the per-line breakdown and the totals of `cart`.
pub fn quote(cart: &Cart, mode: TaxMode) -> CoreResult<Quote> {
    cart.validate()?;

    let pre_cart: Vec<(Money, Money)> = cart
        .lines
        .iter()
        .map(|l| {
            let discount = l.line_discount();
            (discount, l.gross() - discount)
        })
        .collect();

    // Cart discount only reduces what is being sold
    let weights: Vec<i64> = cart
        .lines
        .iter()
        .zip(&pre_cart)
        .map(|(l, (_, net))| if l.is_return() { 0 } else { net.cents() })
        .collect();
    let sale_part = Money::from_cents(weights.iter().sum());
    let cart_discount = cart
        .discount
        .map(|d| d.amount_on(sale_part))
        .unwrap_or_default();
    let shares = cart_discount.split_proportionally(&weights);

    let mut totals = CartTotals {
        line_count: cart.lines.len(),
        cart_discount,
        ..CartTotals::default()
    };

    let lines = cart
        .lines
        .iter()
        .zip(pre_cart)
        .zip(shares)
        .map(|((line, (line_discount, net_before)), share)| {
            let net = net_before - share;
            let rate = TaxRate::from_bps(line.tax_rate_bps);
            let (tax, total) = match mode {
                TaxMode::Exclusive => {
                    let tax = net.calculate_tax(rate);
                    (tax, net + tax)
                }
                TaxMode::Inclusive => (net.extract_tax(rate), net),
            };

            totals.total_quantity += line.quantity;
            totals.gross += line.gross();
            totals.line_discounts += line_discount;
            totals.subtotal += net;
            totals.tax += tax;
            totals.total += total;

            LineQuote {
                product_id: line.product_id.clone(),
                sku: line.sku.clone(),
                name: line.name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                gross: line.gross(),
                line_discount,
                cart_discount: share,
                net,
                tax,
                total,
            }
        })
        .collect();

    Ok(Quote { lines, totals })
}

// =============================================================================
// Tender
// =============================================================================

/// Outcome of taking payment for a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tender {
    pub total: Money,
    pub received: Money,
    /// Money handed back to the customer.
    pub change: Money,
    /// Portion of `change` that is a refund for a net return.
    pub refund: Money,
}

/// Takes `received` for `total`.
///
/// ## Rules
/// ```text
/// total > 0:   received < total → InsufficientPayment
///              change = received − total
/// total ≤ 0:   refund = −total
///              change = received + refund
/// ```
pub fn tender(total: Money, received: Money) -> CoreResult<Tender> {
    if received.is_negative() {
        return Err(CoreError::InvalidPaymentAmount {
            reason: "received amount cannot be negative".to_string(),
        });
    }

    if total.is_positive() {
        if received < total {
            return Err(CoreError::InsufficientPayment {
                total: total.cents(),
                received: received.cents(),
            });
        }
        return Ok(Tender {
            total,
            received,
            change: received - total,
            refund: Money::zero(),
        });
    }

    let refund = -total;
    Ok(Tender {
        total,
        received,
        change: received + refund,
        refund,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, price: i64, tax_bps: u32) -> CartLine {
        CartLine::new(id, id.to_uppercase(), format!("Produto {}", id), Money::from_cents(price), tax_bps)
    }

    #[test]
    fn test_add_merges_same_sign() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line("a", 1000, 0), 2).unwrap(), 0);
        assert_eq!(cart.add(line("a", 1000, 0), 3).unwrap(), 0);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
    }

    #[test]
    fn test_add_keeps_returns_apart() {
        let mut cart = Cart::new();
        cart.add(line("a", 1000, 0), 2).unwrap();
        assert_eq!(cart.add(line("a", 1000, 0), -1).unwrap(), 1);
        assert_eq!(cart.add(line("a", 1000, 0), -1).unwrap(), 1);

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].quantity, 2);
        assert_eq!(cart.lines[1].quantity, -2);
    }

    #[test]
    fn test_add_rejects_zero_and_overflow() {
        let mut cart = Cart::new();
        assert!(cart.add(line("a", 1000, 0), 0).is_err());

        cart.add(line("a", 1000, 0), 999).unwrap();
        assert!(matches!(
            cart.add(line("a", 1000, 0), 1),
            Err(CoreError::QuantityTooLarge { requested: 1000, .. })
        ));
    }

    #[test]
    fn test_cart_line_limit() {
        let mut cart = Cart::new();
        for i in 0..MAX_CART_ITEMS {
            cart.add(line(&format!("p{}", i), 100, 0), 1).unwrap();
        }
        assert!(matches!(
            cart.add(line("extra", 100, 0), 1),
            Err(CoreError::CartTooLarge { .. })
        ));
    }

    #[test]
    fn test_update_quantity() {
        let mut cart = Cart::new();
        cart.add(line("a", 1000, 0), 2).unwrap();
        cart.add(line("a", 1000, 0), -1).unwrap();

        // Flipping the return line to positive merges it into the sale line
        cart.update_quantity(1, 3).unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);

        cart.update_quantity(0, 0).unwrap();
        assert!(cart.is_empty());
        assert!(matches!(cart.update_quantity(0, 1), Err(CoreError::LineNotFound(_))));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add(line("a", 1000, 0), 1).unwrap();
        cart.add(line("b", 500, 0), 1).unwrap();
        cart.set_cart_discount(Some(Discount::Flat { cents: 100 })).unwrap();

        let removed = cart.remove(0).unwrap();
        assert_eq!(removed.product_id, "a");
        assert_eq!(cart.lines[0].product_id, "b");

        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.discount.is_none());
    }

    #[test]
    fn test_line_discount_on_return_keeps_sign() {
        let mut l = line("c", 300, 0);
        l.quantity = -1;
        l.discount = Some(Discount::Percent { bps: 5000 });
        assert_eq!(l.line_discount().cents(), -150);

        // Flat discounts are clamped to the line
        l.discount = Some(Discount::Flat { cents: 1000 });
        assert_eq!(l.line_discount().cents(), -300);
    }

    #[test]
    fn test_quote_cart_discount_only_on_sales() {
        let mut cart = Cart::new();
        cart.add(line("a", 1000, 1000), 2).unwrap();
        cart.add(line("b", 500, 0), 1).unwrap();
        cart.add(line("c", 300, 0), -1).unwrap();
        cart.set_cart_discount(Some(Discount::Flat { cents: 250 })).unwrap();

        let q = quote(&cart, TaxMode::Exclusive).unwrap();

        assert_eq!(q.lines[0].cart_discount.cents(), 200);
        assert_eq!(q.lines[1].cart_discount.cents(), 50);
        assert_eq!(q.lines[2].cart_discount.cents(), 0);

        assert_eq!(q.lines[0].net.cents(), 1800);
        assert_eq!(q.lines[0].tax.cents(), 180);
        assert_eq!(q.lines[2].net.cents(), -300);

        assert_eq!(q.totals.line_count, 3);
        assert_eq!(q.totals.total_quantity, 2);
        assert_eq!(q.totals.gross.cents(), 2200);
        assert_eq!(q.totals.cart_discount.cents(), 250);
        assert_eq!(q.totals.subtotal.cents(), 1950);
        assert_eq!(q.totals.tax.cents(), 180);
        assert_eq!(q.totals.total.cents(), 2130);
    }

    #[test]
    fn test_quote_flat_cart_discount_clamped_to_sales() {
        let mut cart = Cart::new();
        cart.add(line("a", 500, 0), 1).unwrap();
        cart.set_cart_discount(Some(Discount::Flat { cents: 10_000 })).unwrap();

        let q = quote(&cart, TaxMode::Exclusive).unwrap();
        assert_eq!(q.totals.cart_discount.cents(), 500);
        assert_eq!(q.totals.total.cents(), 0);
    }

    #[test]
    fn test_quote_split_is_exact() {
        let mut cart = Cart::new();
        cart.add(line("a", 100, 0), 1).unwrap();
        cart.add(line("b", 100, 0), 1).unwrap();
        cart.add(line("c", 100, 0), 1).unwrap();
        cart.set_cart_discount(Some(Discount::Flat { cents: 100 })).unwrap();

        let q = quote(&cart, TaxMode::Exclusive).unwrap();
        let shares: Money = q.lines.iter().map(|l| l.cart_discount).sum();
        assert_eq!(shares.cents(), 100);
        assert_eq!(q.lines[0].cart_discount.cents(), 34);
        assert_eq!(q.totals.total.cents(), 200);
    }

    #[test]
    fn test_quote_inclusive_tax() {
        let mut cart = Cart::new();
        cart.add(line("a", 11_000, 1000), 1).unwrap();

        let q = quote(&cart, TaxMode::Inclusive).unwrap();
        assert_eq!(q.totals.tax.cents(), 1000);
        assert_eq!(q.totals.total.cents(), 11_000);
    }

    #[test]
    fn test_quote_rejects_tampered_cart() {
        let mut cart = Cart::new();
        cart.add(line("a", 1000, 0), 1).unwrap();
        cart.lines.push(cart.lines[0].clone());
        assert!(quote(&cart, TaxMode::Exclusive).is_err());

        cart.lines.pop();
        cart.lines[0].quantity = 0;
        assert!(quote(&cart, TaxMode::Exclusive).is_err());
    }

    #[test]
    fn test_tender_sale() {
        let t = tender(Money::from_cents(2500), Money::from_cents(3000)).unwrap();
        assert_eq!(t.change.cents(), 500);
        assert_eq!(t.refund.cents(), 0);

        assert!(matches!(
            tender(Money::from_cents(2500), Money::from_cents(2000)),
            Err(CoreError::InsufficientPayment { total: 2500, received: 2000 })
        ));
    }

    #[test]
    fn test_tender_net_return() {
        let t = tender(Money::from_cents(-800), Money::zero()).unwrap();
        assert_eq!(t.refund.cents(), 800);
        assert_eq!(t.change.cents(), 800);

        let t = tender(Money::from_cents(-800), Money::from_cents(200)).unwrap();
        assert_eq!(t.change.cents(), 1000);

        assert!(tender(Money::zero(), Money::from_cents(-1)).is_err());
    }
}
