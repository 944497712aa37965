//! # Seed Data Generator
//!
//! Populates the database with catalog items (and optionally some sales)
//! for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 items (default)
//! cargo run -p tally-db --bin seed
//!
//! # Generate custom amount, then ring up 25 sample sales
//! cargo run -p tally-db --bin seed -- --count 1000 --sales 25
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! Each item has:
//! - Unique SKU: `{CATEGORY}-{NAME}-{INDEX}`
//! - Price: $1.99 - $9.99 plus a size addon (every 25th item has no
//!   catalog price, to exercise client-priced lines)
//! - Stock: 0 - 60, min stock level 10

use std::env;
use tally_core::{NewItem, SaleLine, SaleRequest};
use tally_db::{Database, DbConfig, SaleError};

/// Item categories for realistic test data
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "BEV",
        "Beverages",
        &["Cola", "Lemon Soda", "Mineral Water", "Orange Juice", "Iced Tea", "Coffee"],
    ),
    (
        "SNK",
        "Snacks",
        &["Potato Chips", "Salted Peanuts", "Chocolate Bar", "Butter Cookies", "Pretzels"],
    ),
    (
        "DRY",
        "Dairy",
        &["Whole Milk", "Cheddar Cheese", "Greek Yogurt", "Butter", "Paneer"],
    ),
    (
        "GRC",
        "Grocery",
        &["Basmati Rice", "Penne Pasta", "Lentils", "Olive Oil", "Tomato Paste", "Sugar"],
    ),
    (
        "HSE",
        "Household",
        &["Dish Soap", "Paper Towels", "Trash Bags", "Sponges", "Laundry Powder"],
    ),
];

/// Size variants with price addon (cents)
const SIZES: &[(&str, i64)] = &[("Small", 0), ("Regular", 50), ("Large", 120), ("Family", 300)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut sales: usize = 0;
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales = args[i + 1].parse().unwrap_or(0);
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
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of items to generate (default: 200)");
                println!("  -s, --sales <N>    Sample sales to record afterwards (default: 0)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Items:    {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.items().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} items", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating items...");

    let start = std::time::Instant::now();
    let mut skus = Vec::with_capacity(count);

    'outer: for (category_code, category, names) in CATEGORIES {
        for name in names.iter() {
            for (size, price_addon) in SIZES {
                if skus.len() >= count {
                    break 'outer;
                }

                let item = generate_item(category_code, category, name, size, *price_addon, skus.len());
                match db.items().insert(&item).await {
                    Ok(item) => skus.push(item.sku),
                    Err(e) => eprintln!("Failed to insert {}: {}", item.sku, e),
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!("✓ Generated {} items in {:?}", skus.len(), elapsed);

    if sales > 0 && !skus.is_empty() {
        println!();
        println!("Recording {} sample sales...", sales);

        let mut recorded = 0;
        for n in 0..sales {
            let sku = &skus[(n * 7) % skus.len()];
            let request = SaleRequest::new(vec![SaleLine::new(sku, 1 + (n % 3) as i64).with_price(199)]);

            match db.sales().create_sale(request).await {
                Ok(receipt) => {
                    recorded += 1;
                    println!("  {} total {}", receipt.slip.slip_number, receipt.slip.total());
                }
                Err(SaleError::Rejected(reason)) => println!("  skipped {}: {}", sku, reason),
                Err(e) => return Err(e.into()),
            }
        }

        println!("✓ Recorded {} sales", recorded);
    }

    let low = db.items().low_stock(None).await?;
    println!();
    println!("  Low-stock items: {}", low.len());
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Generates a single catalog item.
fn generate_item(
    category_code: &str,
    category: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
) -> NewItem {
    let compact: String = name.chars().filter(|c| c.is_ascii_alphanumeric()).take(3).collect();
    let sku = format!("{}-{}-{:03}", category_code, compact.to_uppercase(), seed);

    // $1.99 - $9.99 + size addon
    let price_cents = 199 + ((seed * 17) % 800) as i64 + price_addon;
    let cost_cents = price_cents * (60 + (seed % 20) as i64) / 100;

    let mut item = NewItem::new(
        &sku,
        &format!("{} {}", name, size),
        (seed % 61) as i64,
        (seed % 25 != 0).then_some(price_cents),
    );
    item.category = category.to_string();
    item.cost_cents = cost_cents;
    item.supplier = format!("{} Wholesale", category);
    item
}
