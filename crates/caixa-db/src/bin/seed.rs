//! # Demo Data Seeder
//!
//! Populates a database with a small shop's worth of data for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./caixa_dev.db
//! cargo run -p caixa-db --bin seed
//!
//! # Specify database path and how many products per category
//! cargo run -p caixa-db --bin seed -- --db ./data/caixa.db --variants 4
//! ```
//!
//! ## Generated Data
//! - Products across categories, SKU `{CATEGORY}-{NNN}`
//! - Customers with open on-account purchases
//! - A month of manual cash-flow entries (rent, suppliers, deposits)
//! - A revenue goal for the current month

use chrono::{Datelike, Duration, NaiveDate, Utc};
use std::env;

use caixa_core::{EntryKind, GoalMetric};
use caixa_db::repository::customer::{CustomerInput, PurchaseInput};
use caixa_db::repository::goal::GoalInput;
use caixa_db::repository::ledger::NewEntry;
use caixa_db::repository::product::ProductInput;
use caixa_db::{Database, DbConfig};

/// Product categories and base names.
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "MER",
        "Mercearia",
        &["Arroz", "Feijão", "Açúcar", "Café", "Macarrão", "Farinha", "Óleo", "Sal"],
    ),
    (
        "BEB",
        "Bebidas",
        &["Refrigerante", "Suco", "Água", "Cerveja", "Energético", "Chá"],
    ),
    (
        "LAT",
        "Laticínios",
        &["Leite", "Queijo", "Iogurte", "Manteiga", "Requeijão"],
    ),
    (
        "PAD",
        "Padaria",
        &["Pão Francês", "Pão de Queijo", "Bolo", "Biscoito"],
    ),
    (
        "LIM",
        "Limpeza",
        &["Detergente", "Sabão em Pó", "Desinfetante", "Esponja"],
    ),
];

/// Size variants with a price addon in centavos.
const SIZES: &[(&str, i64)] = &[
    ("Pequeno", 0),
    ("Médio", 150),
    ("Grande", 300),
    ("Família", 550),
];

const CUSTOMERS: &[(&str, &[(&str, i64)])] = &[
    ("Dona Maria", &[("Compras da semana", 8790), ("Gás", 11000)]),
    ("Seu João", &[("Cigarros e café", 2350)]),
    ("Ana Paula", &[("Festa de aniversário", 15400), ("Refrigerantes", 3200)]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut variants: usize = SIZES.len();
    let mut db_path = String::from("./caixa_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--variants" | "-v" => {
                if i + 1 < args.len() {
                    variants = args[i + 1].parse().unwrap_or(SIZES.len()).min(SIZES.len());
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Caixa Demo Data Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -v, --variants <N>  Size variants per product (default: {})", SIZES.len());
                println!("  -d, --db <PATH>     Database file path (default: ./caixa_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Caixa Demo Data Seeder");
    println!("=========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Products
    let mut generated = 0;
    for (category_idx, (code, category, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, addon)) in SIZES.iter().take(variants).enumerate() {
                let seed = category_idx * 100 + name_idx * 10 + size_idx;
                let input = product_input(code, category, name, size, *addon, seed);
                if let Err(e) = db.products().insert(&input).await {
                    eprintln!("Failed to insert {}: {}", input.sku, e);
                    continue;
                }
                generated += 1;
            }
        }
    }
    println!("✓ Generated {} products", generated);

    // Customers with pendencies
    for (name, purchases) in CUSTOMERS {
        let customer = db
            .customers()
            .create(&CustomerInput {
                name: name.to_string(),
                phone: None,
                email: None,
                notes: None,
            })
            .await?;
        for (description, amount_cents) in purchases.iter() {
            db.customers()
                .add_purchase(
                    &customer.id,
                    &PurchaseInput {
                        description: description.to_string(),
                        amount_cents: *amount_cents,
                    },
                )
                .await?;
        }
    }
    println!("✓ Generated {} customers", CUSTOMERS.len());

    // A month of cash flow
    let today = Utc::now().date_naive();
    let month_start =
        NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let entries = [
        (EntryKind::Income, 50_000, "Aporte inicial", "Caixa", 0),
        (EntryKind::Expense, 180_000, "Aluguel", "Fixas", 4),
        (EntryKind::Expense, 42_350, "Fornecedor de bebidas", "Fornecedores", 6),
        (EntryKind::Expense, 9_870, "Conta de luz", "Fixas", 9),
        (EntryKind::Income, 125_000, "Vendas de balcão", "Vendas", 10),
    ];
    for (kind, amount_cents, description, category, offset) in entries {
        let occurred_on = month_start + Duration::days(offset);
        if occurred_on > today {
            continue;
        }
        db.ledger()
            .insert(&NewEntry {
                kind,
                amount_cents,
                category: Some(category.to_string()),
                description: description.to_string(),
                occurred_on,
            })
            .await?;
    }
    println!("✓ Generated cash-flow entries");

    // Goal for the month
    let next_month = if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
    };
    let month_end = next_month.map(|d| d - Duration::days(1)).unwrap_or(today);
    db.goals()
        .insert(&GoalInput {
            title: "Faturamento do mês".to_string(),
            metric: GoalMetric::Revenue,
            target_value: 1_000_000,
            starts_on: month_start,
            ends_on: month_end,
        })
        .await?;
    println!("✓ Generated monthly goal");

    let search_results = db.products().search("café", 10).await?;
    println!();
    println!("  Search 'café': {} results", search_results.len());
    let low = db.products().low_stock(100).await?;
    println!("  Low stock: {} products", low.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one product with deterministic, plausible data.
fn product_input(
    code: &str,
    category: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
) -> ProductInput {
    // R$ 1,99 - R$ 9,98 plus size addon
    let price_cents = 199 + ((seed * 17) % 800) as i64 + price_addon;
    let cost_pct = 55 + (seed % 25) as i64;
    let stock = (seed % 40) as i64;

    ProductInput {
        sku: format!("{}-{:03}", code, seed),
        barcode: Some(format!("789{:010}", seed)),
        name: format!("{} {}", name, size),
        description: None,
        category: Some(category.to_string()),
        price_cents,
        cost_cents: Some(price_cents * cost_pct / 100),
        tax_rate_bps: 0,
        track_inventory: true,
        allow_negative_stock: false,
        current_stock: Some(stock),
        min_stock: Some(5),
    }
}
