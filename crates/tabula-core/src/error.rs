//! # Error Types
//!
//! Errors raised while turning a query description into SQL.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tabula-core errors (this file)                                        │
//! │  └── QueryError       - Statement could not be rendered                │
//! │                                                                         │
//! │  tabula-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: QueryError → DbError::InvalidQuery → caller                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rendering errors are caller bugs (bad identifiers, placeholder/argument
//! mismatch). They are caught before anything reaches the database.

use thiserror::Error;

/// Statement rendering errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Table or column name that cannot be used as an identifier.
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// The number of `?` placeholders does not match the arguments given.
    #[error("Expression '{expr}' has {placeholders} placeholder(s) but {args} argument(s)")]
    ArgumentCount {
        expr: String,
        placeholders: usize,
        args: usize,
    },

    /// A row produced a different number of values than it declares columns.
    #[error("Row for table {table} has {values} value(s) for {columns} column(s)")]
    RowWidth {
        table: String,
        columns: usize,
        values: usize,
    },

    /// A statement that needs at least one column or row got none.
    #[error("Nothing to write to table {0}")]
    Empty(String),

    /// UPDATE or DELETE with a blank filter, which would touch every row.
    #[error("Refusing to modify every row of {0} without a filter")]
    MissingFilter(String),

    /// An unsigned integer too large for SQLite's signed 64-bit INTEGER.
    #[error("Integer {0} does not fit in a signed 64-bit column")]
    OutOfRange(u64),
}

/// Convenience type alias for Results with QueryError.
pub type QueryResult<T> = Result<T, QueryError>;

// =============================================================================
// Unit Tests
// =============================================================================
