//! # tabula-core: Pure Query Model for Tabula
//!
//! Everything about a repository call that can be decided without a
//! database: what a row looks like, which fragments a caller attached, and
//! the SQL those fragments render to.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tabula Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Caller (service code)                        │   │
//! │  │    repo.list(&ctx, &[filter(..), sort(..), page(..)])           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tabula-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │    row    │  │  options  │  │   query   │  │   value   │  │   │
//! │  │   │  Row      │  │ Filter    │  │SelectQuery│  │  Value    │  │   │
//! │  │   │ RowSchema │  │ Sort/Page │  │ Statement │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • PURE FUNCTIONS                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tabula-db (Database Layer)                   │   │
//! │  │          binds Statement args, runs them, maps errors           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`row`] - The `Row` trait and validated `RowSchema`
//! - [`options`] - Filter / sort / page options
//! - [`query`] - `SelectQuery` builder state and `Statement` rendering
//! - [`value`] - Dynamically typed argument values
//! - [`types`] - `SortOrder`, `LockMode`, `Dialect`
//! - [`error`] - Rendering errors
//!
//! ## Example Usage
//!
//! ```rust
//! use tabula_core::{Dialect, QueryOption, SelectQuery, SortOrder};
//! use tabula_core::options::apply_all;
//!
//! let opts = [
//!     QueryOption::filter("age > ?", [18]),
//!     QueryOption::sort("name", SortOrder::Desc),
//!     QueryOption::page(2, 10),
//! ];
//!
//! let stmt = apply_all(SelectQuery::new("users"), &opts)
//!     .to_select(Dialect::Sqlite)
//!     .unwrap();
//!
//! assert_eq!(
//!     stmt.sql,
//!     r#"SELECT * FROM "users" WHERE (age > ?1) ORDER BY "name" DESC LIMIT 10 OFFSET 10"#
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod options;
pub mod query;
pub mod row;
pub mod types;
pub mod value;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{QueryError, QueryResult};
pub use options::QueryOption;
pub use query::{OrderTerm, Predicate, SelectQuery, Statement, Window};
pub use row::{Row, RowSchema};
pub use types::{Dialect, LockMode, SortOrder};
pub use value::Value;
