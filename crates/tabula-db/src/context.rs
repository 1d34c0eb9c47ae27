//! # Call Context
//!
//! Deadline and cancellation carried into every repository call.
//!
//! ## How A Call Ends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ctx.run("list", executor_future)                                      │
//! │       │                                                                 │
//! │       ├── future completes first    → its result                       │
//! │       ├── deadline passes first     → DbError::Timeout("list")         │
//! │       └── token cancelled first     → DbError::Cancelled("list")       │
//! │                                                                         │
//! │  The losing branch is dropped, which aborts the in-flight statement    │
//! │  and returns its connection to the pool.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A context is cheap to clone and can be shared by many calls; a derived
//! context never extends the deadline of its parent.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Deadline and cancellation for repository calls.
///
/// ## Usage
/// ```rust,ignore
/// let ctx = Context::background().with_timeout(Duration::from_secs(2));
/// let user = repo.get(&ctx, 5).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl Context {
    /// A context that never expires and is never cancelled.
    pub fn background() -> Self {
        Context::default()
    }

    /// Adds a deadline `timeout` from now, keeping an earlier one.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Adds an absolute deadline, keeping an earlier one.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Attaches a cancellation token, replacing any earlier one.
    ///
    /// Use [`Context::with_cancel`] to derive a token that is also
    /// cancelled together with the current one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Derives a cancellable context.
    ///
    /// The returned token is a child of this context's token, if any, so
    /// cancelling the parent also ends calls made with the derived context.
    pub fn with_cancel(self) -> (Self, CancellationToken) {
        let token = match &self.cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        (self.with_cancellation(token.clone()), token)
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Checks if the context can no longer run a call.
    pub fn is_done(&self) -> bool {
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        let cancelled = self.cancel.as_ref().is_some_and(|t| t.is_cancelled());
        expired || cancelled
    }

    /// Fails fast if the context is already expired or cancelled.
    pub fn check(&self, op: &'static str) -> DbResult<()> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(DbError::Cancelled(op));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(DbError::Timeout(op));
        }
        Ok(())
    }

    /// Runs `fut` under this context's deadline and cancellation.
    pub async fn run<T, F>(&self, op: &'static str, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        self.check(op)?;

        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = fut => result,
            _ = deadline => {
                debug!(op, "Call context deadline exceeded");
                Err(DbError::Timeout(op))
            }
            _ = cancelled => {
                debug!(op, "Call context cancelled");
                Err(DbError::Cancelled(op))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
