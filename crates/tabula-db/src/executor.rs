//! # Statement Executor
//!
//! Binds a rendered [`Statement`] and runs it on the SQLite pool, or on the
//! connection of a caller's [`Transaction`].
//!
//! ## Binding
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Statement { sql: "... WHERE (age > ?1 AND name = ?2)",                │
//! │              args: [Int(18), Text("Ann")] }                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sqlx::query(sql).bind(18_i64).bind("Ann")                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Transaction connection (if set)  or  SqlitePool                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The executor knows nothing about rows or options; it is the only place
//! that touches sqlx query types.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Sqlite, SqlitePool};
use tabula_core::{Dialect, Statement, Value};
use tracing::trace;

use crate::error::{DbError, DbResult};
use crate::transaction::Transaction;

/// Binds every argument of a statement onto a sqlx query, in order.
///
/// Works for `query`, `query_as` and `query_scalar`, which share a `bind`
/// method but no trait.
macro_rules! bind_args {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for value in $args {
            query = match value {
                Value::Null => query.bind(None::<i64>),
                Value::Bool(v) => query.bind(*v),
                Value::Int(v) => query.bind(*v),
                Value::Real(v) => query.bind(*v),
                Value::Text(v) => query.bind(v.as_str()),
                Value::Blob(v) => query.bind(v.as_slice()),
            };
        }
        query
    }};
}

/// Runs a bound query on the transaction's connection if there is one,
/// otherwise on the pool.
macro_rules! run_on {
    ($self:ident, $query:ident . $method:ident()) => {
        match &$self.tx {
            Some(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(DbError::TransactionClosed)?;
                $query.$method(&mut **conn).await?
            }
            None => $query.$method(&$self.pool).await?,
        }
    };
}

/// Runs statements against a SQLite pool, or inside a caller's transaction.
#[derive(Debug, Clone)]
pub struct Executor {
    pool: SqlitePool,
    tx: Option<Transaction>,
}

impl Executor {
    /// Creates an executor over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Executor { pool, tx: None }
    }

    /// An executor over the same pool that runs every statement in `tx`.
    pub fn in_transaction(&self, tx: &Transaction) -> Self {
        Executor {
            pool: self.pool.clone(),
            tx: Some(tx.clone()),
        }
    }

    /// The transaction statements run in, if any.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.tx.as_ref()
    }

    /// Dialect statements must be rendered in.
    ///
    /// Always SQLite; Postgres rendering in tabula-core serves callers that
    /// bring their own driver.
    pub fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    /// Returns a reference to the connection pool.
    ///
    /// For statements the repository does not cover, and for opening
    /// transactions.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs a write statement, returning the number of affected rows.
    pub async fn execute(&self, stmt: &Statement) -> DbResult<u64> {
        trace!(sql = %stmt.sql, args = stmt.args.len(), in_tx = self.tx.is_some(), "Executing statement");

        let query = bind_args!(sqlx::query::<Sqlite>(&stmt.sql), &stmt.args);
        let result = run_on!(self, query.execute());

        Ok(result.rows_affected())
    }

    /// Runs a query, decoding every row.
    pub async fn fetch_all<T>(&self, stmt: &Statement) -> DbResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        trace!(sql = %stmt.sql, args = stmt.args.len(), in_tx = self.tx.is_some(), "Fetching rows");

        let query = bind_args!(sqlx::query_as::<Sqlite, T>(&stmt.sql), &stmt.args);
        Ok(run_on!(self, query.fetch_all()))
    }

    /// Runs a query, decoding the first row if there is one.
    pub async fn fetch_optional<T>(&self, stmt: &Statement) -> DbResult<Option<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        trace!(sql = %stmt.sql, args = stmt.args.len(), in_tx = self.tx.is_some(), "Fetching one row");

        let query = bind_args!(sqlx::query_as::<Sqlite, T>(&stmt.sql), &stmt.args);
        Ok(run_on!(self, query.fetch_optional()))
    }

    /// Runs a `SELECT COUNT(*)` statement.
    pub async fn fetch_count(&self, stmt: &Statement) -> DbResult<i64> {
        trace!(sql = %stmt.sql, args = stmt.args.len(), in_tx = self.tx.is_some(), "Counting rows");

        let query = bind_args!(sqlx::query_scalar::<Sqlite, i64>(&stmt.sql), &stmt.args);
        Ok(run_on!(self, query.fetch_one()))
    }
}
