//! # Transactions
//!
//! A shareable handle over one sqlx transaction, so repository calls for
//! different row types can run on the same connection.
//!
//! ## Usage Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  let tx = db.begin().await?;         ← BEGIN on one pooled connection  │
//! │       │                                                                 │
//! │       ├── users.with_transaction(&tx).get_with_lock(..)                │
//! │       ├── users.with_transaction(&tx).upsert(..)                       │
//! │       └── orders.with_transaction(&tx).insert(..)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tx.commit().await?  /  tx.rollback().await?                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## SQLite Locking
//! SQLite has no row locks. A deferred transaction takes the database's
//! SHARED lock on its first read and the RESERVED lock on its first write,
//! and holds both until commit or rollback. `LockMode` requests rely on that.
//!
//! Calls through one handle are serialized. A handle dropped without
//! commit rolls back when the last clone goes.

use std::sync::Arc;

use sqlx::Sqlite;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{DbError, DbResult};

type Inner = Option<sqlx::Transaction<'static, Sqlite>>;

/// An open transaction, cloneable across repositories.
#[derive(Debug, Clone)]
pub struct Transaction {
    inner: Arc<Mutex<Inner>>,
}

impl Transaction {
    /// Wraps a transaction started with `pool.begin()`.
    pub fn new(tx: sqlx::Transaction<'static, Sqlite>) -> Self {
        Transaction {
            inner: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Commits. Later calls on any clone fail with `TransactionClosed`.
    pub async fn commit(&self) -> DbResult<()> {
        let tx = self.take().await?;
        tx.commit().await?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Rolls back. Later calls on any clone fail with `TransactionClosed`.
    pub async fn rollback(&self) -> DbResult<()> {
        let tx = self.take().await?;
        tx.rollback().await?;
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Whether commit or rollback has not happened yet.
    pub async fn is_open(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Locks the transaction for one statement.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().await
    }

    async fn take(&self) -> DbResult<sqlx::Transaction<'static, Sqlite>> {
        self.inner.lock().await.take().ok_or(DbError::TransactionClosed)
    }
}

impl From<sqlx::Transaction<'static, Sqlite>> for Transaction {
    fn from(tx: sqlx::Transaction<'static, Sqlite>) -> Self {
        Transaction::new(tx)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
