//! # tabula-db: Generic Repository over SQLite
//!
//! This crate executes the statements built by `tabula-core` against a
//! SQLite pool, giving every table the same typed CRUD surface.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tabula Data Flow                                 │
//! │                                                                         │
//! │  Service code: users.list(&ctx, &[filter, sort, page])                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tabula-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  Repository   │    │   Executor    │    │   Database   │  │   │
//! │  │   │(repository.rs)│───►│ (executor.rs) │───►│  (pool.rs)   │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ options → SQL │    │ bind + run    │    │ SqlitePool   │  │   │
//! │  │   │ classify errs │    │ decode rows   │    │ migrations   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │          ▲                                                      │   │
//! │  │          │ Context: deadline + cancellation (context.rs)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment configuration
//! - [`migrations`] - Runtime directory migrations
//! - [`context`] - Per-call deadline and cancellation
//! - [`executor`] - Statement binding and execution
//! - [`repository`] - The generic repository
//! - [`transaction`] - Shareable transaction handle
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tabula_db::{Context, Database, DbConfig, QueryOption, SortOrder};
//!
//! let db = Database::new(DbConfig::from_env()?).await?;
//! db.run_migrations("migrations").await?;
//!
//! let users = db.repository::<User>()?;
//! let ctx = Context::background().with_timeout(Duration::from_secs(2));
//! let page = users
//!     .list(&ctx, &[QueryOption::sort("age", SortOrder::Desc), QueryOption::page(2, 20)])
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod transaction;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::ConfigError;
pub use context::Context;
pub use error::{DbError, DbResult};
pub use executor::Executor;
pub use pool::{Database, DbConfig};
pub use repository::Repository;
pub use transaction::Transaction;

pub use tabula_core::{
    Dialect, LockMode, Predicate, QueryError, QueryOption, Row, RowSchema, SortOrder, Value,
};
