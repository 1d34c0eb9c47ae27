//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)     QueryError (tabula-core)               │
//! │       │                               │                                 │
//! │       ▼                               ▼                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├── NotFound on get / exist  → absorbed (None / false)           │
//! │       ├── UniqueViolation on upsert → absorbed (falls back to update)  │
//! │       ▼                                                                 │
//! │  Caller branches on the variant, never on the message                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::migrate::MigrateError;
use tabula_core::QueryError;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A repository call failed; names the operation and table.
    ///
    /// ## When This Occurs
    /// - Wraps every error raised while a repository call runs against the
    ///   database. Use [`DbError::inner`] to branch on the underlying kind.
    #[error("{op} on {table}: {source}")]
    Operation {
        op: &'static str,
        table: &'static str,
        #[source]
        source: Box<DbError>,
    },

    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `update` matched no row with the given key
    /// - raw `fetch_one` returned no rows
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate primary key
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: {source}")]
    UniqueViolation {
        field: String,
        #[source]
        source: sqlx::Error,
    },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {source}")]
    ForeignKeyViolation {
        #[source]
        source: sqlx::Error,
    },

    /// Row type metadata is unusable.
    ///
    /// ## When This Occurs
    /// - Raised once, when a repository is constructed
    /// - Bad table/column names, primary key not among the columns
    #[error("Invalid row configuration for {row_type}: {source}")]
    Configuration {
        row_type: &'static str,
        #[source]
        source: QueryError,
    },

    /// Statement could not be rendered from the supplied options.
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// Row data could not be decoded into the row type.
    #[error("Decode failed: {0}")]
    Decode(#[source] sqlx::Error),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[from] MigrateError),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// The transaction was already committed or rolled back.
    #[error("Transaction already finished")]
    TransactionClosed,

    /// The call context's deadline passed before the call finished.
    #[error("Deadline exceeded during {0}")]
    Timeout(&'static str),

    /// The call context was cancelled before the call finished.
    #[error("Cancelled during {0}")]
    Cancelled(&'static str),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(#[source] sqlx::Error),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Attaches the repository operation and table to an error.
    pub fn in_operation(self, op: &'static str, table: &'static str) -> Self {
        DbError::Operation {
            op,
            table,
            source: Box::new(self),
        }
    }

    /// The error beneath any [`DbError::Operation`] context.
    pub fn inner(&self) -> &DbError {
        match self {
            DbError::Operation { source, .. } => source.inner(),
            other => other,
        }
    }

    /// Checks for [`DbError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self.inner(), DbError::NotFound { .. })
    }

    /// Checks for [`DbError::UniqueViolation`].
    pub fn is_unique_violation(&self) -> bool {
        matches!(self.inner(), DbError::UniqueViolation { .. })
    }
}

// =============================================================================
// Duplicate-Key Signatures
// =============================================================================

/// Engine messages that mean "unique constraint violated".
///
/// Only consulted when the driver does not report a typed constraint kind.
/// Message text depends on engine, version and locale, so this list is a
/// fallback and not the primary signal.
const DUPLICATE_KEY_SIGNATURES: &[&str] = &[
    // SQLite
    "UNIQUE constraint failed",
    // PostgreSQL
    "duplicate key value violates unique constraint",
    // MySQL
    "Duplicate entry",
];

/// Checks a raw engine message for a known duplicate-key signature.
pub fn is_duplicate_key_message(msg: &str) -> bool {
    DUPLICATE_KEY_SIGNATURES.iter().any(|sig| msg.contains(sig))
}

/// Extracts `<table>.<column>` from SQLite's "UNIQUE constraint failed: ..." text.
fn duplicate_field(msg: &str) -> String {
    msg.split("UNIQUE constraint failed: ")
        .nth(1)
        .unwrap_or("unknown")
        .to_string()
}

/// Convert sqlx errors to DbError. The sqlx error is kept as the source.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound      → DbError::NotFound
/// sqlx::Error::Database         → typed constraint kind, then message signature
/// sqlx::Error::PoolTimedOut     → DbError::PoolExhausted
/// sqlx::Error::PoolClosed / Io  → DbError::ConnectionFailed
/// sqlx::Error::ColumnDecode etc → DbError::Decode
/// Other                         → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if db_err.is_unique_violation() || is_duplicate_key_message(msg) {
                    let field = db_err
                        .constraint()
                        .map(str::to_string)
                        .unwrap_or_else(|| duplicate_field(msg));
                    DbError::UniqueViolation { field, source: err }
                } else if db_err.is_foreign_key_violation()
                    || msg.contains("FOREIGN KEY constraint failed")
                {
                    DbError::ForeignKeyViolation { source: err }
                } else {
                    DbError::QueryFailed(err)
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed | sqlx::Error::Io(_) => DbError::ConnectionFailed(err),

            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => DbError::Decode(err),

            _ => DbError::Internal(err),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
