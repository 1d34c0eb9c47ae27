//! # Query Types
//!
//! Small enumerations shared by the option protocol and the renderer.
//!
//! ```text
//! ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐
//! │    SortOrder    │   │    LockMode     │   │     Dialect     │
//! │  ─────────────  │   │  ─────────────  │   │  ─────────────  │
//! │  Asc            │   │  None           │   │  Sqlite         │
//! │  Desc           │   │  Shared         │   │  Postgres       │
//! │                 │   │  Exclusive      │   │                 │
//! └─────────────────┘   └─────────────────┘   └─────────────────┘
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Sort Order
// =============================================================================

/// Direction of one ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// SQL keyword for this direction.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

// =============================================================================
// Lock Mode
// =============================================================================

/// Row-locking strength requested by a point lookup.
///
/// ## Mapping
/// ```text
/// LockMode::None      → (no clause)
/// LockMode::Shared    → FOR SHARE
/// LockMode::Exclusive → FOR UPDATE
/// ```
///
/// The clause is only meaningful inside a transaction managed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    #[default]
    None,
    Shared,
    Exclusive,
}

impl LockMode {
    /// Locking strength keyword, or `None` when no lock is requested.
    pub const fn strength(&self) -> Option<&'static str> {
        match self {
            LockMode::None => None,
            LockMode::Shared => Some("SHARE"),
            LockMode::Exclusive => Some("UPDATE"),
        }
    }

    /// Checks if a lock is requested at all.
    #[inline]
    pub const fn is_locking(&self) -> bool {
        !matches!(self, LockMode::None)
    }
}

// =============================================================================
// Dialect
// =============================================================================

/// SQL dialect a statement is rendered for.
///
/// Only the fragments this crate emits differ between dialects:
/// placeholder syntax, open-ended LIMIT, and row-locking clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Placeholder for the 1-based argument position `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", n),
            Dialect::Postgres => format!("${}", n),
        }
    }

    /// Whether the engine understands `FOR SHARE` / `FOR UPDATE`.
    ///
    /// SQLite has no row locks; a write transaction locks the whole database.
    pub const fn supports_row_locks(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Row-locking clause for `lock`, if this dialect can express it.
    pub fn lock_clause(&self, lock: LockMode) -> Option<String> {
        if !self.supports_row_locks() {
            return None;
        }
        lock.strength().map(|s| format!("FOR {}", s))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_sql() {
        assert_eq!(SortOrder::Asc.as_sql(), "ASC");
        assert_eq!(SortOrder::Desc.as_sql(), "DESC");
        assert_eq!(SortOrder::default(), SortOrder::Asc);
    }

    #[test]
    fn test_lock_strength() {
        assert_eq!(LockMode::None.strength(), None);
        assert_eq!(LockMode::Shared.strength(), Some("SHARE"));
        assert_eq!(LockMode::Exclusive.strength(), Some("UPDATE"));
        assert!(!LockMode::None.is_locking());
    }

    #[test]
    fn test_lock_clause_by_dialect() {
        assert_eq!(
            Dialect::Postgres.lock_clause(LockMode::Exclusive).as_deref(),
            Some("FOR UPDATE")
        );
        assert_eq!(Dialect::Postgres.lock_clause(LockMode::None), None);
        assert_eq!(Dialect::Sqlite.lock_clause(LockMode::Shared), None);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
    }
}
