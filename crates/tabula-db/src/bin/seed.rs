//! # Seed Data Generator
//!
//! Populates a database with catalog items through the generic repository,
//! then exercises listing, paging and counting against them.
//!
//! ## Usage
//! ```bash
//! # Generate 1,000 items (default)
//! cargo run -p tabula-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p tabula-db --bin seed -- --count 5000
//!
//! # Specify database path (otherwise TABULA_DATABASE_PATH or ./tabula.db)
//! cargo run -p tabula-db --bin seed -- --db ./data/tabula.db
//!
//! # More logging
//! RUST_LOG=tabula_db=debug cargo run -p tabula-db --bin seed
//! ```
//!
//! ## Generated Items
//! Each item has:
//! - Unique SKU: `{CATEGORY}-{NAME}-{INDEX}`
//! - Random price: $1.99 - $9.99 plus a size addon
//! - Stock: 0 - 100, or unknown for every seventh item

use chrono::{DateTime, Utc};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tabula_db::{Context, Database, DbConfig, QueryOption, Row, SortOrder, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Item categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    ("BEV", &["Cola", "Lemonade", "Iced Tea", "Orange Juice", "Sparkling Water"]),
    ("SNK", &["Pretzels", "Popcorn", "Trail Mix", "Rice Crackers", "Granola Bar"]),
    ("DRY", &["Whole Milk", "Butter", "Greek Yogurt", "Cheddar", "Cream Cheese"]),
    ("GRC", &["Pasta", "Rice", "Flour", "Honey", "Peanut Butter"]),
];

/// Size variants with their price addon in cents
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 100),
    ("Large", 200),
    ("6-Pack", 300),
    ("12-Pack", 500),
];

/// Rows are inserted in chunks of this many, one statement per chunk.
const BATCH_SIZE: usize = 100;

/// A catalog item row.
#[derive(Debug, Clone, sqlx::FromRow)]
struct Item {
    id: String,
    sku: String,
    name: String,
    price_cents: i64,
    stock: Option<i64>,
    created_at: DateTime<Utc>,
}

impl Row for Item {
    type Id = String;

    fn table_name() -> &'static str {
        "items"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "sku", "name", "price_cents", "stock", "created_at"]
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.clone().into(),
            self.sku.clone().into(),
            self.name.clone().into(),
            self.price_cents.into(),
            self.stock.into(),
            self.created_at.into(),
        ]
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 1000;
    let mut db_path: Option<String> = None;
    let mut migrations_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(1000);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--migrations" | "-m" => {
                if i + 1 < args.len() {
                    migrations_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tabula Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>         Number of items to generate (default: 1000)");
                println!("  -d, --db <PATH>         Database file path (default: $TABULA_DATABASE_PATH)");
                println!("  -m, --migrations <DIR>  Migrations directory");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = DbConfig::from_env()?;
    if let Some(path) = db_path {
        config.database_path = PathBuf::from(path);
    }

    info!(
        database = %config.database_path.display(),
        count,
        "Starting seed"
    );

    let db = Database::new(config).await?;
    db.run_migrations(&migrations_dir).await?;

    let items = db.repository::<Item>()?;
    let ctx = Context::background().with_timeout(Duration::from_secs(60));

    let existing = items.count(&ctx, &[]).await?;
    if existing > 0 {
        warn!(existing, "Database already has items, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut batch = Vec::with_capacity(BATCH_SIZE);
    let mut generated = 0;

    // Walk the catalog round-robin; the index keeps SKUs unique
    while generated < count {
        let (category, names) = CATEGORIES[generated % CATEGORIES.len()];
        let name = names[generated % names.len()];
        let (size, price_addon) = SIZES[generated % SIZES.len()];
        batch.push(generate_item(category, name, size, price_addon, generated));
        generated += 1;

        if batch.len() == BATCH_SIZE {
            items.insert(&ctx, &batch).await?;
            batch.clear();
        }
    }
    items.insert(&ctx, &batch).await?;

    let elapsed = start.elapsed();
    info!(
        generated,
        elapsed_ms = elapsed.as_millis() as u64,
        "Items generated"
    );

    // Verify listing and counting
    let beverages = [QueryOption::filter("sku LIKE ?", ["BEV-%"])];
    let total = items.count(&ctx, &beverages).await?;

    let mut priciest = beverages.to_vec();
    priciest.push(QueryOption::sort("price_cents", SortOrder::Desc));
    priciest.push(QueryOption::page(1, 5));
    let top = items.list(&ctx, &priciest).await?;

    info!(total, "Beverage items");
    for item in &top {
        info!(sku = %item.sku, name = %item.name, price_cents = item.price_cents, "Top beverage");
    }

    let unknown_stock = items.count(&ctx, &[QueryOption::filter_expr("stock IS NULL")]).await?;
    info!(unknown_stock, "Items with unknown stock");

    db.close().await;
    info!("Seed complete");

    Ok(())
}

/// Generates a single item with deterministic pseudo-random data.
fn generate_item(category: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> Item {
    let compact: String = name.chars().filter(|c| !c.is_whitespace()).take(3).collect();
    let sku = format!("{}-{}-{:05}", category, compact.to_uppercase(), seed);

    let base_price = 199 + ((seed * 17) % 800) as i64;
    let stock = if seed % 7 == 0 {
        None
    } else {
        Some((seed % 101) as i64)
    };

    Item {
        id: Uuid::new_v4().to_string(),
        sku,
        name: format!("{} {}", name, size),
        price_cents: base_price + price_addon,
        stock,
        created_at: Utc::now(),
    }
}
