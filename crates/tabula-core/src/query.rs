//! # Query Builder
//!
//! Builder state for one repository call, and the SQL it renders to.
//!
//! ## Rendering Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SelectQuery::new("users")                                             │
//! │       │  .filter(Predicate::new("age > ?", [18]))                      │
//! │       │  .order_by("name", SortOrder::Desc)                            │
//! │       │  .offset_limit(10, 10)                                         │
//! │       ▼                                                                 │
//! │  to_select(Dialect::Sqlite)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Statement {                                                           │
//! │    sql:  SELECT * FROM "users" WHERE (age > ?1)                        │
//! │          ORDER BY "name" DESC LIMIT 10 OFFSET 10                       │
//! │    args: [Int(18)]                                                     │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Placeholders
//! Predicates are written with bare `?` placeholders. Rendering numbers them
//! in order (`?1`, `?2` on SQLite, `$1`, `$2` on Postgres) and checks the
//! count against the supplied arguments. A `?` inside a quoted string or
//! quoted identifier is left alone.

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::row::{check_identifier, quote_identifier};
use crate::types::{Dialect, LockMode, SortOrder};
use crate::value::Value;

// =============================================================================
// Predicate
// =============================================================================

/// A raw SQL boolean expression with positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    expr: String,
    args: Vec<Value>,
}

impl Predicate {
    /// Creates a predicate from an expression such as `"age > ? AND name = ?"`.
    pub fn new<I, V>(expr: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate {
            expr: expr.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `"column" = ?`
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Predicate {
            expr: format!("{} = ?", quote_identifier(column)),
            args: vec![value.into()],
        }
    }

    /// `"column" IN (?, ?, ...)`. An empty list matches nothing.
    pub fn in_list<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let args: Vec<Value> = values.into_iter().map(Into::into).collect();
        if args.is_empty() {
            return Predicate {
                expr: "1 = 0".to_string(),
                args,
            };
        }

        let marks = vec!["?"; args.len()].join(", ");
        Predicate {
            expr: format!("{} IN ({})", quote_identifier(column), marks),
            args,
        }
    }

    /// The raw expression.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Positional arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

// =============================================================================
// Select Query
// =============================================================================

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub field: String,
    pub order: SortOrder,
}

/// OFFSET/LIMIT window. `limit: None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Window {
    pub offset: u64,
    pub limit: Option<u64>,
}

/// Builder state for a SELECT against one table.
///
/// Every method consumes and returns the builder, so a query is assembled
/// by folding options over a fresh value.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    filter: Option<Predicate>,
    order: Vec<OrderTerm>,
    window: Option<Window>,
    lock: LockMode,
}

impl SelectQuery {
    /// Starts a query over `table` with no filter, order, window or lock.
    pub fn new(table: impl Into<String>) -> Self {
        SelectQuery {
            table: table.into(),
            filter: None,
            order: Vec::new(),
            window: None,
            lock: LockMode::None,
        }
    }

    /// Sets the filter. A later call replaces an earlier one.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    /// Appends an ORDER BY term.
    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order.push(OrderTerm {
            field: field.into(),
            order,
        });
        self
    }

    /// Sets the window. A later call replaces an earlier one.
    pub fn offset_limit(mut self, offset: u64, limit: u64) -> Self {
        self.window = Some(Window {
            offset,
            limit: Some(limit),
        });
        self
    }

    /// Caps the result size, keeping any offset already set.
    pub fn limit(mut self, limit: u64) -> Self {
        let offset = self.window.map_or(0, |w| w.offset);
        self.window = Some(Window {
            offset,
            limit: Some(limit),
        });
        self
    }

    /// Requests a row-locking clause.
    pub fn lock(mut self, lock: LockMode) -> Self {
        self.lock = lock;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filter_predicate(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    pub fn order_terms(&self) -> &[OrderTerm] {
        &self.order
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    pub fn lock_mode(&self) -> LockMode {
        self.lock
    }

    /// Renders `SELECT * ...` with every fragment applied.
    pub fn to_select(&self, dialect: Dialect) -> QueryResult<Statement> {
        check_identifier(&self.table)?;

        let mut w = SqlWriter::new(dialect);
        w.push("SELECT * FROM ");
        w.push(&quote_identifier(&self.table));
        w.push_where(self.filter.as_ref())?;

        if !self.order.is_empty() {
            w.push(" ORDER BY ");
            for (i, term) in self.order.iter().enumerate() {
                check_identifier(&term.field)?;
                if i > 0 {
                    w.push(", ");
                }
                w.push(&quote_identifier(&term.field));
                w.push(" ");
                w.push(term.order.as_sql());
            }
        }

        if let Some(window) = self.window {
            match (window.limit, dialect) {
                (Some(limit), _) => w.push(&format!(" LIMIT {}", limit)),
                // SQLite only accepts OFFSET after a LIMIT
                (None, Dialect::Sqlite) if window.offset > 0 => w.push(" LIMIT -1"),
                (None, _) => {}
            }
            if window.offset > 0 {
                w.push(&format!(" OFFSET {}", window.offset));
            }
        }

        if let Some(clause) = dialect.lock_clause(self.lock) {
            w.push(" ");
            w.push(&clause);
        }

        Ok(w.finish())
    }

    /// Renders `SELECT COUNT(*) ...`.
    ///
    /// Only the filter takes part; order, window and lock have no meaning
    /// for an aggregate over the whole match set.
    pub fn to_count(&self, dialect: Dialect) -> QueryResult<Statement> {
        check_identifier(&self.table)?;

        let mut w = SqlWriter::new(dialect);
        w.push("SELECT COUNT(*) FROM ");
        w.push(&quote_identifier(&self.table));
        w.push_where(self.filter.as_ref())?;
        Ok(w.finish())
    }
}

// =============================================================================
// Statement
// =============================================================================

/// Rendered SQL plus the arguments to bind, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    /// Multi-row `INSERT INTO table (cols) VALUES (...), (...)`.
    pub fn insert(
        dialect: Dialect,
        table: &str,
        columns: &[&str],
        rows: &[Vec<Value>],
    ) -> QueryResult<Statement> {
        check_identifier(table)?;
        if columns.is_empty() || rows.is_empty() {
            return Err(QueryError::Empty(table.to_string()));
        }

        let mut w = SqlWriter::new(dialect);
        w.push("INSERT INTO ");
        w.push(&quote_identifier(table));
        w.push(" (");
        for (i, column) in columns.iter().enumerate() {
            check_identifier(column)?;
            if i > 0 {
                w.push(", ");
            }
            w.push(&quote_identifier(column));
        }
        w.push(") VALUES ");

        for (r, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(QueryError::RowWidth {
                    table: table.to_string(),
                    columns: columns.len(),
                    values: row.len(),
                });
            }
            if r > 0 {
                w.push(", ");
            }
            w.push("(");
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.push_arg(value.clone());
            }
            w.push(")");
        }

        Ok(w.finish())
    }

    /// `UPDATE table SET a = ?, b = ? WHERE (filter)`.
    pub fn update(
        dialect: Dialect,
        table: &str,
        assignments: &[(&str, Value)],
        filter: &Predicate,
    ) -> QueryResult<Statement> {
        check_identifier(table)?;
        if assignments.is_empty() {
            return Err(QueryError::Empty(table.to_string()));
        }
        require_filter(table, filter)?;

        let mut w = SqlWriter::new(dialect);
        w.push("UPDATE ");
        w.push(&quote_identifier(table));
        w.push(" SET ");
        for (i, (column, value)) in assignments.iter().enumerate() {
            check_identifier(column)?;
            if i > 0 {
                w.push(", ");
            }
            w.push(&quote_identifier(column));
            w.push(" = ");
            w.push_arg(value.clone());
        }
        w.push_where(Some(filter))?;

        Ok(w.finish())
    }

    /// `DELETE FROM table WHERE (filter)`.
    pub fn delete(dialect: Dialect, table: &str, filter: &Predicate) -> QueryResult<Statement> {
        check_identifier(table)?;
        require_filter(table, filter)?;

        let mut w = SqlWriter::new(dialect);
        w.push("DELETE FROM ");
        w.push(&quote_identifier(table));
        w.push_where(Some(filter))?;
        Ok(w.finish())
    }
}

/// Writes always need a WHERE clause; a blank one is a caller mistake.
fn require_filter(table: &str, filter: &Predicate) -> QueryResult<()> {
    if filter.expr.trim().is_empty() {
        return Err(QueryError::MissingFilter(table.to_string()));
    }
    Ok(())
}

// =============================================================================
// SQL Writer
// =============================================================================

/// Accumulates SQL text and numbers placeholders as arguments are added.
struct SqlWriter {
    dialect: Dialect,
    sql: String,
    args: Vec<Value>,
}

impl SqlWriter {
    fn new(dialect: Dialect) -> Self {
        SqlWriter {
            dialect,
            sql: String::with_capacity(128),
            args: Vec::new(),
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn push_arg(&mut self, value: Value) {
        self.args.push(value);
        let mark = self.dialect.placeholder(self.args.len());
        self.sql.push_str(&mark);
    }

    fn push_where(&mut self, filter: Option<&Predicate>) -> QueryResult<()> {
        if let Some(predicate) = filter {
            // A blank filter with no arguments selects everything
            if predicate.expr.trim().is_empty() && predicate.args.is_empty() {
                return Ok(());
            }
            self.push(" WHERE (");
            self.push_predicate(predicate)?;
            self.push(")");
        }
        Ok(())
    }

    /// Copies the expression, replacing each bare `?` with the next
    /// numbered placeholder.
    fn push_predicate(&mut self, predicate: &Predicate) -> QueryResult<()> {
        let mut args = predicate.args.iter();
        let mut quote: Option<char> = None;
        let mut placeholders = 0;

        for c in predicate.expr.chars() {
            match (quote, c) {
                (Some(q), c) if c == q => {
                    quote = None;
                    self.sql.push(c);
                }
                (Some(_), c) => self.sql.push(c),
                (None, '\'') | (None, '"') => {
                    quote = Some(c);
                    self.sql.push(c);
                }
                (None, '?') => {
                    placeholders += 1;
                    match args.next() {
                        Some(value) => self.push_arg(value.clone()),
                        None => self.sql.push('?'),
                    }
                }
                (None, c) => self.sql.push(c),
            }
        }

        if placeholders != predicate.args.len() {
            return Err(QueryError::ArgumentCount {
                expr: predicate.expr.clone(),
                placeholders,
                args: predicate.args.len(),
            });
        }
        Ok(())
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            args: self.args,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_select() {
        let stmt = SelectQuery::new("users").to_select(Dialect::Sqlite).unwrap();
        assert_eq!(stmt.sql, r#"SELECT * FROM "users""#);
        assert!(stmt.args.is_empty());
    }

    #[test]
    fn test_full_select_sqlite() {
        let stmt = SelectQuery::new("users")
            .filter(Predicate::new("age > ? AND name <> ?", [Value::from(18), "x".into()]))
            .order_by("name", SortOrder::Desc)
            .order_by("id", SortOrder::Asc)
            .offset_limit(20, 10)
            .to_select(Dialect::Sqlite)
            .unwrap();

        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM "users" WHERE (age > ?1 AND name <> ?2) ORDER BY "name" DESC, "id" ASC LIMIT 10 OFFSET 20"#
        );
        assert_eq!(stmt.args, vec![Value::Int(18), Value::Text("x".to_string())]);
    }

    #[test]
    fn test_later_filter_replaces_earlier() {
        let query = SelectQuery::new("users")
            .filter(Predicate::new("age > ?", [1]))
            .filter(Predicate::new("age < ?", [9]));

        let stmt = query.to_select(Dialect::Sqlite).unwrap();
        assert_eq!(stmt.sql, r#"SELECT * FROM "users" WHERE (age < ?1)"#);
        assert_eq!(stmt.args, vec![Value::Int(9)]);
    }

    #[test]
    fn test_offset_without_limit() {
        let mut query = SelectQuery::new("t");
        query.window = Some(Window {
            offset: 5,
            limit: None,
        });

        assert_eq!(
            query.to_select(Dialect::Sqlite).unwrap().sql,
            r#"SELECT * FROM "t" LIMIT -1 OFFSET 5"#
        );
        assert_eq!(
            query.to_select(Dialect::Postgres).unwrap().sql,
            r#"SELECT * FROM "t" OFFSET 5"#
        );
    }

    #[test]
    fn test_limit_keeps_offset() {
        let query = SelectQuery::new("t").offset_limit(3, 10).limit(1);
        assert_eq!(
            query.window(),
            Some(Window {
                offset: 3,
                limit: Some(1)
            })
        );
    }

    #[test]
    fn test_lock_clause_postgres_only() {
        let query = SelectQuery::new("users")
            .filter(Predicate::eq("id", 5))
            .limit(1)
            .lock(LockMode::Exclusive);

        assert_eq!(
            query.to_select(Dialect::Postgres).unwrap().sql,
            r#"SELECT * FROM "users" WHERE ("id" = $1) LIMIT 1 FOR UPDATE"#
        );
        assert_eq!(
            query.to_select(Dialect::Sqlite).unwrap().sql,
            r#"SELECT * FROM "users" WHERE ("id" = ?1) LIMIT 1"#
        );
    }

    #[test]
    fn test_count_ignores_order_window_lock() {
        let stmt = SelectQuery::new("users")
            .filter(Predicate::new("age > ?", [18]))
            .order_by("age", SortOrder::Desc)
            .offset_limit(10, 10)
            .lock(LockMode::Shared)
            .to_count(Dialect::Postgres)
            .unwrap();

        assert_eq!(stmt.sql, r#"SELECT COUNT(*) FROM "users" WHERE (age > $1)"#);
    }

    #[test]
    fn test_placeholder_count_mismatch() {
        let err = SelectQuery::new("users")
            .filter(Predicate::new("age > ? AND age < ?", [1]))
            .to_select(Dialect::Sqlite)
            .unwrap_err();

        assert_eq!(
            err,
            QueryError::ArgumentCount {
                expr: "age > ? AND age < ?".to_string(),
                placeholders: 2,
                args: 1,
            }
        );
    }

    #[test]
    fn test_question_mark_inside_literal_is_kept() {
        let stmt = SelectQuery::new("faq")
            .filter(Predicate::new("title = 'why?' AND id = ?", [3]))
            .to_select(Dialect::Sqlite)
            .unwrap();

        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM "faq" WHERE (title = 'why?' AND id = ?1)"#
        );
    }

    #[test]
    fn test_invalid_sort_field_rejected() {
        let err = SelectQuery::new("users")
            .order_by("name; --", SortOrder::Asc)
            .to_select(Dialect::Sqlite)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_in_list() {
        let p = Predicate::in_list("id", [1, 2, 3]);
        assert_eq!(p.expr(), r#""id" IN (?, ?, ?)"#);
        assert_eq!(p.args().len(), 3);

        let empty = Predicate::in_list("id", Vec::<i64>::new());
        assert_eq!(empty.expr(), "1 = 0");
    }

    #[test]
    fn test_insert_batch() {
        let stmt = Statement::insert(
            Dialect::Sqlite,
            "users",
            &["name", "age"],
            &[
                vec!["John".into(), 18.into()],
                vec!["Mary".into(), 20.into()],
            ],
        )
        .unwrap();

        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "users" ("name", "age") VALUES (?1, ?2), (?3, ?4)"#
        );
        assert_eq!(stmt.args.len(), 4);
    }

    #[test]
    fn test_insert_row_width_checked() {
        let err = Statement::insert(Dialect::Sqlite, "users", &["a", "b"], &[vec![1.into()]])
            .unwrap_err();
        assert!(matches!(err, QueryError::RowWidth { .. }));
    }

    #[test]
    fn test_update_numbers_set_before_where() {
        let stmt = Statement::update(
            Dialect::Postgres,
            "users",
            &[("name", "John".into()), ("age", 18.into())],
            &Predicate::eq("id", 4),
        )
        .unwrap();

        assert_eq!(
            stmt.sql,
            r#"UPDATE "users" SET "name" = $1, "age" = $2 WHERE ("id" = $3)"#
        );
        assert_eq!(
            stmt.args,
            vec![Value::Text("John".to_string()), Value::Int(18), Value::Int(4)]
        );
    }

    #[test]
    fn test_update_without_assignments() {
        let err =
            Statement::update(Dialect::Sqlite, "users", &[], &Predicate::eq("id", 1)).unwrap_err();
        assert_eq!(err, QueryError::Empty("users".to_string()));
    }

    #[test]
    fn test_blank_filter_rejected_for_writes() {
        let blank = Predicate::new("  ", Vec::<Value>::new());
        assert_eq!(
            Statement::delete(Dialect::Sqlite, "users", &blank).unwrap_err(),
            QueryError::MissingFilter("users".to_string())
        );
        assert_eq!(
            Statement::update(Dialect::Sqlite, "users", &[("age", 1.into())], &blank).unwrap_err(),
            QueryError::MissingFilter("users".to_string())
        );
    }

    #[test]
    fn test_delete() {
        let stmt =
            Statement::delete(Dialect::Sqlite, "users", &Predicate::new("age < ?", [18])).unwrap();
        assert_eq!(stmt.sql, r#"DELETE FROM "users" WHERE (age < ?1)"#);
    }

    #[test]
    fn test_blank_filter_selects_everything() {
        let stmt = SelectQuery::new("users")
            .filter(Predicate::new("  ", Vec::<Value>::new()))
            .to_select(Dialect::Sqlite)
            .unwrap();
        assert_eq!(stmt.sql, r#"SELECT * FROM "users""#);
    }
}
