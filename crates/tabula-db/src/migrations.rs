//! # Database Migrations
//!
//! SQL migrations loaded from a directory at runtime.
//!
//! ## How Migrations Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  Database::run_migrations(dir)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Read dir/*.sql  (Migrator::new)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Check _sqlx_migrations table                                          │
//! │       │                                                                 │
//! │       ├── Table doesn't exist? Create it                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Compare directory migrations vs applied                               │
//! │       │                                                                 │
//! │       ├── 0001_users.sql   ✓ (already applied)                        │
//! │       └── 0002_orders.sql  ⬜ (NEW - needs to run)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Run pending migrations in order, record in _sqlx_migrations           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The repository layer never creates tables itself. Callers own their
//! schema and hand its directory in here.
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in the directory with the next sequence number
//! 2. Name format: `NNNN_description.sql` (e.g., `0003_add_orders.sql`)
//! 3. **NEVER** modify existing migrations - always add new ones

use std::path::Path;

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

/// Runs all pending migrations found in `dir`.
///
/// ## Safety
/// - Idempotent: safe to run multiple times
/// - Transactional: each migration runs in a transaction
/// - Ordered: migrations run in version order
///
/// ## Returns
/// * `Err(DbError::MigrationFailed)` - directory unreadable, checksum
///   mismatch, or a migration's SQL failed
pub async fn run_migrations(pool: &SqlitePool, dir: &Path) -> DbResult<()> {
    info!(dir = %dir.display(), "Checking for pending migrations");

    let migrator = Migrator::new(dir).await?;
    debug!(count = migrator.migrations.len(), "Migrations loaded");

    migrator.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns information about migrations.
///
/// ## Returns
/// Tuple of (total_migrations, applied_migrations)
///
/// ## Usage
/// For diagnostics and health checks. A database that never ran
/// migrations reports zero applied; any other query failure is returned.
pub async fn migration_status(pool: &SqlitePool, dir: &Path) -> DbResult<(usize, usize)> {
    let migrator = Migrator::new(dir).await?;
    let total = migrator.migrations.len();

    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    if tracked == 0 {
        debug!("No migrations table yet");
        return Ok((total, 0));
    }

    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    Ok((total, applied as usize))
}

// =============================================================================
// Unit Tests
// =============================================================================
