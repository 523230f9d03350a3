//! # Report Module
//!
//! Aggregations behind the dashboard. Voided sales never count.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ledger::CashFlowSummary;
use crate::money::Money;
use crate::pendency::PendencyBalance;
use crate::types::{PaymentMethod, Sale, SaleItem, SaleStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub count: usize,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSales {
    pub product_id: Option<String>,
    pub sku: String,
    pub name: String,
    /// Net units (returns subtract).
    pub quantity: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub sale_count: usize,
    pub gross: Money,
    pub discounts: Money,
    pub tax: Money,
    /// Sum of sale totals.
    pub net: Money,
    pub average_ticket: Money,
    pub by_method: Vec<MethodTotal>,
    pub top_products: Vec<ProductSales>,
}

/// Summarizes completed `sales`. `items` may include items of other sales;
/// only those belonging to a completed sale in `sales` are counted.
pub fn sales_summary(sales: &[Sale], items: &[SaleItem], top_n: usize) -> SalesSummary {
    let completed: Vec<&Sale> = sales
        .iter()
        .filter(|s| s.status == SaleStatus::Completed)
        .collect();
    let completed_ids: HashSet<&str> = completed.iter().map(|s| s.id.as_str()).collect();

    let mut summary = SalesSummary {
        sale_count: completed.len(),
        ..SalesSummary::default()
    };

    let mut methods: HashMap<PaymentMethod, MethodTotal> = HashMap::new();
    for sale in &completed {
        summary.gross += Money::from_cents(sale.gross_cents);
        summary.discounts += Money::from_cents(sale.discount_cents);
        summary.tax += Money::from_cents(sale.tax_cents);
        summary.net += sale.total();

        let slot = methods.entry(sale.payment_method).or_insert(MethodTotal {
            method: sale.payment_method,
            count: 0,
            total: Money::zero(),
        });
        slot.count += 1;
        slot.total += sale.total();
    }

    if summary.sale_count > 0 {
        summary.average_ticket = Money::from_cents(summary.net.cents() / summary.sale_count as i64);
    }

    let mut by_method: Vec<MethodTotal> = methods.into_values().collect();
    by_method.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.method.to_string().cmp(&b.method.to_string()))
    });
    summary.by_method = by_method;

    let mut products: HashMap<String, ProductSales> = HashMap::new();
    for item in items
        .iter()
        .filter(|i| completed_ids.contains(i.sale_id.as_str()))
    {
        let key = item
            .product_id
            .clone()
            .unwrap_or_else(|| item.sku_snapshot.clone());
        let slot = products.entry(key).or_insert_with(|| ProductSales {
            product_id: item.product_id.clone(),
            sku: item.sku_snapshot.clone(),
            name: item.name_snapshot.clone(),
            quantity: 0,
            revenue: Money::zero(),
        });
        slot.quantity += item.quantity;
        slot.revenue += Money::from_cents(item.net_cents);
    }

    let mut top: Vec<ProductSales> = products.into_values().collect();
    top.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| b.quantity.cmp(&a.quantity))
            .then_with(|| a.sku.cmp(&b.sku))
    });
    top.truncate(top_n);
    summary.top_products = top;

    summary
}

/// Everything the dashboard home shows for a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardReport {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
    pub sales: SalesSummary,
    pub cash_flow: CashFlowSummary,
    /// Outstanding on-account balance across all customers.
    pub pendencies: PendencyBalance,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sale(id: &str, status: SaleStatus, method: PaymentMethod, total: i64) -> Sale {
        Sale {
            id: id.to_string(),
            tenant_id: crate::DEFAULT_TENANT_ID.to_string(),
            receipt_number: format!("R-{}", id),
            status,
            customer_id: None,
            payment_method: method,
            gross_cents: total + 100,
            discount_cents: 100,
            subtotal_cents: total,
            tax_cents: 0,
            total_cents: total,
            received_cents: total,
            change_cents: 0,
            notes: None,
            created_at: Utc::now(),
            voided_at: None,
        }
    }

    fn item(sale_id: &str, product: &str, qty: i64, net: i64) -> SaleItem {
        SaleItem {
            id: format!("{}-{}", sale_id, product),
            sale_id: sale_id.to_string(),
            product_id: Some(product.to_string()),
            sku_snapshot: product.to_uppercase(),
            name_snapshot: product.to_string(),
            unit_price_cents: net / qty.abs().max(1),
            quantity: qty,
            gross_cents: net,
            discount_cents: 0,
            tax_cents: 0,
            net_cents: net,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sales_summary_skips_voided() {
        let sales = vec![
            sale("s1", SaleStatus::Completed, PaymentMethod::Cash, 3000),
            sale("s2", SaleStatus::Completed, PaymentMethod::Pix, 1000),
            sale("s3", SaleStatus::Voided, PaymentMethod::Cash, 9000),
            sale("s4", SaleStatus::Completed, PaymentMethod::Cash, 2000),
        ];
        let items = vec![
            item("s1", "cafe", 2, 3500),
            item("s2", "pao", 5, 1000),
            item("s3", "cafe", 6, 9000),
            item("s4", "pao", 10, 2000),
        ];

        let s = sales_summary(&sales, &items, 10);
        assert_eq!(s.sale_count, 3);
        assert_eq!(s.net.cents(), 6000);
        assert_eq!(s.discounts.cents(), 300);
        assert_eq!(s.average_ticket.cents(), 2000);

        assert_eq!(s.by_method[0].method, PaymentMethod::Cash);
        assert_eq!(s.by_method[0].count, 2);
        assert_eq!(s.by_method[0].total.cents(), 5000);

        assert_eq!(s.top_products[0].sku, "CAFE");
        assert_eq!(s.top_products[0].quantity, 2);
        assert_eq!(s.top_products[1].quantity, 15);
    }

    #[test]
    fn test_sales_summary_top_n_and_returns() {
        let sales = vec![sale("s1", SaleStatus::Completed, PaymentMethod::Cash, 500)];
        let items = vec![
            item("s1", "cafe", 1, 1500),
            item("s1", "pao", -2, -1000),
        ];

        let s = sales_summary(&sales, &items, 1);
        assert_eq!(s.top_products.len(), 1);
        assert_eq!(s.top_products[0].sku, "CAFE");

        let all = sales_summary(&sales, &items, 10);
        assert_eq!(all.top_products[1].quantity, -2);
    }

    #[test]
    fn test_sales_summary_empty() {
        let s = sales_summary(&[], &[], 5);
        assert_eq!(s, SalesSummary::default());
    }
}
