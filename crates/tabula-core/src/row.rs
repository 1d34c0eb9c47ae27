//! # Row Contract
//!
//! The capability set a type needs to be managed by a repository.
//!
//! ## What A Row Declares
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  impl Row for User                                                     │
//! │                                                                         │
//! │  table_name()  → "users"                 which relation                │
//! │  primary_key() → "id"                    which column identifies a row │
//! │  columns()     → ["id", "name", "age"]   what gets written             │
//! │  id(&self)     → 5                       this row's key                │
//! │  values(&self) → [5, "Ann", 31]          column values, same order     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reading rows back is the database layer's job (`sqlx::FromRow`), so
//! this crate stays free of any driver types.

use std::hash::Hash;

use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// A persisted row type.
///
/// ## Example
/// ```rust
/// use tabula_core::{Row, Value};
///
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl Row for User {
///     type Id = i64;
///
///     fn table_name() -> &'static str {
///         "users"
///     }
///
///     fn columns() -> &'static [&'static str] {
///         &["id", "name"]
///     }
///
///     fn id(&self) -> i64 {
///         self.id
///     }
///
///     fn values(&self) -> Vec<Value> {
///         vec![self.id.into(), self.name.clone().into()]
///     }
/// }
/// ```
pub trait Row {
    /// Primary key type. Must be usable as a map key.
    ///
    /// `u64` and `usize` only convert through `Value::try_from`, so unsigned
    /// 64-bit keys need to be stored as `i64` or wrapped in a newtype whose
    /// `Into<Value>` decides how to handle overflow.
    type Id: Clone + Eq + Hash + Into<Value> + Send + Sync;

    /// Table this row type is stored in.
    fn table_name() -> &'static str;

    /// Primary key column.
    fn primary_key() -> &'static str {
        "id"
    }

    /// Every persisted column, primary key included.
    fn columns() -> &'static [&'static str];

    /// This row's primary key.
    fn id(&self) -> Self::Id;

    /// Column values, index-aligned with [`Row::columns`].
    fn values(&self) -> Vec<Value>;
}

// =============================================================================
// Row Schema
// =============================================================================

/// Validated table metadata for a [`Row`] type.
///
/// Built once when a repository is constructed so that every later call can
/// rely on the identifiers being well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    table: &'static str,
    primary_key: &'static str,
    columns: &'static [&'static str],
    key_index: usize,
}

impl RowSchema {
    /// Reads and validates the metadata of `T`.
    ///
    /// ## Checks
    /// - table, key and column names are plain identifiers
    /// - at least one column, no duplicates
    /// - the primary key is one of the columns
    pub fn of<T: Row>() -> QueryResult<Self> {
        let table = T::table_name();
        let primary_key = T::primary_key();
        let columns = T::columns();

        check_identifier(table)?;
        check_identifier(primary_key)?;

        if columns.is_empty() {
            return Err(QueryError::Empty(table.to_string()));
        }

        for (i, column) in columns.iter().enumerate() {
            check_identifier(column)?;
            if columns[..i].contains(column) {
                return Err(QueryError::InvalidIdentifier(format!(
                    "{}.{} (duplicate column)",
                    table, column
                )));
            }
        }

        let key_index = columns
            .iter()
            .position(|c| *c == primary_key)
            .ok_or_else(|| {
                QueryError::InvalidIdentifier(format!(
                    "{}.{} (primary key is not a column)",
                    table, primary_key
                ))
            })?;

        Ok(RowSchema {
            table,
            primary_key,
            columns,
            key_index,
        })
    }

    /// Table name.
    #[inline]
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Primary key column.
    #[inline]
    pub fn primary_key(&self) -> &'static str {
        self.primary_key
    }

    /// All columns in declaration order.
    #[inline]
    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    /// Position of the primary key within [`RowSchema::columns`].
    #[inline]
    pub fn key_index(&self) -> usize {
        self.key_index
    }

    /// Values of `row`, checked against the declared column count.
    pub fn values_of<T: Row>(&self, row: &T) -> QueryResult<Vec<Value>> {
        let values = row.values();
        if values.len() != self.columns.len() {
            return Err(QueryError::RowWidth {
                table: self.table.to_string(),
                columns: self.columns.len(),
                values: values.len(),
            });
        }
        Ok(values)
    }

    /// Non-key columns of `row` that carry a value.
    ///
    /// `Value::Null` means "leave unchanged" for updates, which is how
    /// `Option::None` fields behave.
    pub fn settable_of<T: Row>(&self, row: &T) -> QueryResult<Vec<(&'static str, Value)>> {
        let values = self.values_of(row)?;
        Ok(self
            .columns
            .iter()
            .copied()
            .zip(values)
            .enumerate()
            .filter(|(i, (_, v))| *i != self.key_index && !v.is_null())
            .map(|(_, pair)| pair)
            .collect())
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`.
pub fn check_identifier(name: &str) -> QueryResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier(name.to_string()))
    }
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Account {
        id: i64,
        email: Option<String>,
        age: i32,
    }

    impl Row for Account {
        type Id = i64;

        fn table_name() -> &'static str {
            "accounts"
        }

        fn columns() -> &'static [&'static str] {
            &["id", "email", "age"]
        }

        fn id(&self) -> i64 {
            self.id
        }

        fn values(&self) -> Vec<Value> {
            vec![self.id.into(), self.email.clone().into(), self.age.into()]
        }
    }

    struct Keyless;

    impl Row for Keyless {
        type Id = i64;

        fn table_name() -> &'static str {
            "keyless"
        }

        fn columns() -> &'static [&'static str] {
            &["name"]
        }

        fn id(&self) -> i64 {
            0
        }

        fn values(&self) -> Vec<Value> {
            vec![Value::Null]
        }
    }

    #[test]
    fn test_schema_of_valid_row() {
        let schema = RowSchema::of::<Account>().unwrap();
        assert_eq!(schema.table(), "accounts");
        assert_eq!(schema.primary_key(), "id");
        assert_eq!(schema.key_index(), 0);
    }

    #[test]
    fn test_schema_rejects_missing_primary_key() {
        let err = RowSchema::of::<Keyless>().unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_settable_skips_key_and_nulls() {
        let schema = RowSchema::of::<Account>().unwrap();
        let row = Account {
            id: 9,
            email: None,
            age: 40,
        };
        let settable = schema.settable_of(&row).unwrap();
        assert_eq!(settable, vec![("age", Value::Int(40))]);
    }

    #[test]
    fn test_identifier_rules() {
        assert!(check_identifier("user_id").is_ok());
        assert!(check_identifier("_hidden").is_ok());
        assert!(check_identifier("1st").is_err());
        assert!(check_identifier("name; DROP TABLE x").is_err());
        assert!(check_identifier("").is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("name"), "\"name\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
