//! # Generic Repository
//!
//! One implementation of CRUD, listing and counting for every [`Row`] type.
//!
//! ## Call Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository<User>::list                               │
//! │                                                                         │
//! │  caller options  [filter, sort, page]                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SelectQuery::new("users")  ← fresh builder per call                   │
//! │       │  fold options in order                                         │
//! │       ▼                                                                 │
//! │  Statement (sql + args)     ← tabula-core, no I/O                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ctx.run(executor.fetch_all)  ← deadline / cancellation                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Vec<User> or DbError                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Not-Found Contract
//! Point lookups (`get*`) return `Ok(None)` when nothing matches and
//! `exist` returns `Ok(false)`. Every other failure is returned as a typed
//! [`DbError`]; nothing is retried.
//!
//! ## Concurrency
//! A repository holds the executor and the validated table metadata,
//! nothing else. It is `Clone`, `Send` and `Sync`, and calls never share
//! mutable state.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;
use tabula_core::options::{apply_all, apply_for_count};
use tabula_core::{
    LockMode, Predicate, QueryOption, Row, RowSchema, SelectQuery, SortOrder, Statement, Value,
};
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{DbError, DbResult};
use crate::executor::Executor;
use crate::transaction::Transaction;

/// Repository for any row type `T`.
///
/// ## Usage
/// ```rust,ignore
/// let users = db.repository::<User>()?;
/// let ctx = Context::background();
///
/// users.insert(&ctx, &[ann, bob]).await?;
/// let page = users
///     .list(&ctx, &[QueryOption::sort("age", SortOrder::Desc), QueryOption::page(2, 10)])
///     .await?;
/// ```
pub struct Repository<T> {
    executor: Executor,
    schema: RowSchema,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Repository {
            executor: self.executor.clone(),
            schema: self.schema.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("row_type", &type_name::<T>())
            .field("table", &self.schema.table())
            .finish()
    }
}

impl<T> Repository<T>
where
    T: Row + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    /// Creates a repository, validating `T`'s table metadata once.
    ///
    /// ## Returns
    /// * `Ok(Repository)` - Metadata is usable
    /// * `Err(DbError::Configuration)` - Bad identifiers or missing primary key;
    ///   this is a startup error and should stop the process
    pub fn new(executor: Executor) -> DbResult<Self> {
        let schema = RowSchema::of::<T>().map_err(|source| DbError::Configuration {
            row_type: type_name::<T>(),
            source,
        })?;

        debug!(
            row_type = type_name::<T>(),
            table = schema.table(),
            "Repository created"
        );

        Ok(Repository {
            executor,
            schema,
            _marker: PhantomData,
        })
    }

    /// The underlying executor, for statements this type does not cover.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// A repository over the same table whose calls all run inside `tx`.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let tx = db.begin().await?;
    /// let in_tx = users.with_transaction(&tx);
    /// if let Some(user) = in_tx.get_with_lock(&ctx, LockMode::Exclusive, id).await? {
    ///     in_tx.upsert(&ctx, &User { age: user.age + 1, ..user }).await?;
    /// }
    /// tx.commit().await?;
    /// ```
    pub fn with_transaction(&self, tx: &Transaction) -> Self {
        Repository {
            executor: self.executor.in_transaction(tx),
            schema: self.schema.clone(),
            _marker: PhantomData,
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts all rows in a single statement.
    ///
    /// An empty slice is a no-op and does not touch the database.
    pub async fn insert(&self, ctx: &Context, rows: &[T]) -> DbResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let values = rows
            .iter()
            .map(|row| self.schema.values_of(row))
            .collect::<Result<Vec<_>, _>>()?;
        let stmt = Statement::insert(
            self.executor.dialect(),
            self.schema.table(),
            self.schema.columns(),
            &values,
        )?;

        debug!(table = self.schema.table(), rows = rows.len(), "Inserting rows");

        ctx.run("insert", self.executor.execute(&stmt))
            .await
            .map_err(|e| self.traced("insert", e))?;
        Ok(())
    }

    /// Inserts `row`, or updates it by primary key if the insert hits a
    /// unique constraint.
    ///
    /// A conflict on some other unique column, with no row holding this
    /// primary key, is returned as the insert's `UniqueViolation`.
    ///
    /// ## Not Atomic
    /// Insert and fallback update are two statements. Run the call through
    /// [`Repository::with_transaction`] when another writer may race on the
    /// same key.
    pub async fn upsert(&self, ctx: &Context, row: &T) -> DbResult<()> {
        let conflict = match self.insert(ctx, std::slice::from_ref(row)).await {
            Err(err) if err.is_unique_violation() => err,
            other => return other,
        };

        let id: Value = row.id().into();
        warn!(
            table = self.schema.table(),
            id = %id,
            error = %conflict,
            "Insert conflicted, updating instead"
        );

        match self.update(ctx, row).await {
            Err(err) if err.is_not_found() => Err(conflict),
            other => other,
        }
    }

    /// Updates the non-key columns of `row` that carry a value.
    ///
    /// `Value::Null` columns (`Option::None` fields) are left unchanged.
    ///
    /// ## Returns
    /// * `Ok(())` - Row updated, or nothing to set
    /// * `Err(DbError::NotFound)` - No row has this primary key
    pub async fn update(&self, ctx: &Context, row: &T) -> DbResult<()> {
        let assignments = self.schema.settable_of(row)?;
        let id: Value = row.id().into();

        if assignments.is_empty() {
            debug!(table = self.schema.table(), id = %id, "Nothing to update");
            return Ok(());
        }

        let filter = Predicate::eq(self.schema.primary_key(), id.clone());
        let stmt = Statement::update(
            self.executor.dialect(),
            self.schema.table(),
            &assignments,
            &filter,
        )?;

        debug!(table = self.schema.table(), id = %id, "Updating row");

        let affected = ctx
            .run("update", self.executor.execute(&stmt))
            .await
            .map_err(|e| self.traced("update", e))?;

        if affected == 0 {
            return Err(DbError::not_found(self.schema.table(), id.to_string()));
        }
        Ok(())
    }

    /// Sets `fields` on every row matching `expr`.
    ///
    /// ## Returns
    /// Number of rows changed. An empty field list changes nothing.
    pub async fn update_batch(
        &self,
        ctx: &Context,
        fields: &[(&str, Value)],
        expr: &str,
        args: &[Value],
    ) -> DbResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }

        let filter = Predicate::new(expr, args.iter().cloned());
        let stmt = Statement::update(
            self.executor.dialect(),
            self.schema.table(),
            fields,
            &filter,
        )?;

        debug!(
            table = self.schema.table(),
            fields = fields.len(),
            filter = expr,
            "Batch updating rows"
        );

        ctx.run("update_batch", self.executor.execute(&stmt))
            .await
            .map_err(|e| self.traced("update_batch", e))
    }

    /// Deletes `row` by primary key. Deleting a missing row succeeds.
    pub async fn delete(&self, ctx: &Context, row: &T) -> DbResult<()> {
        let filter = Predicate::eq(self.schema.primary_key(), row.id());
        let stmt = Statement::delete(self.executor.dialect(), self.schema.table(), &filter)?;

        debug!(table = self.schema.table(), "Deleting row");

        ctx.run("delete", self.executor.execute(&stmt))
            .await
            .map_err(|e| self.traced("delete", e))?;
        Ok(())
    }

    /// Deletes every row matching `expr`, returning how many went.
    pub async fn delete_batch(&self, ctx: &Context, expr: &str, args: &[Value]) -> DbResult<u64> {
        let filter = Predicate::new(expr, args.iter().cloned());
        let stmt = Statement::delete(self.executor.dialect(), self.schema.table(), &filter)?;

        debug!(table = self.schema.table(), filter = expr, "Batch deleting rows");

        ctx.run("delete_batch", self.executor.execute(&stmt))
            .await
            .map_err(|e| self.traced("delete_batch", e))
    }

    // =========================================================================
    // Point Lookups
    // =========================================================================

    /// Gets a row by primary key.
    ///
    /// ## Returns
    /// * `Ok(Some(row))` - Row found
    /// * `Ok(None)` - No such row
    pub async fn get(&self, ctx: &Context, id: T::Id) -> DbResult<Option<T>> {
        self.get_with_lock(ctx, LockMode::None, id).await
    }

    /// Gets a row by primary key with a row-locking clause.
    pub async fn get_with_lock(&self, ctx: &Context, lock: LockMode, id: T::Id) -> DbResult<Option<T>> {
        let filter = Predicate::eq(self.schema.primary_key(), id);
        self.find_one(ctx, "get", lock, filter).await
    }

    /// Gets the first row (by primary key) matching `expr`.
    pub async fn get_by(&self, ctx: &Context, expr: &str, args: &[Value]) -> DbResult<Option<T>> {
        self.get_with_lock_by(ctx, LockMode::None, expr, args).await
    }

    /// Gets the first row (by primary key) matching `expr`, with a lock.
    pub async fn get_with_lock_by(
        &self,
        ctx: &Context,
        lock: LockMode,
        expr: &str,
        args: &[Value],
    ) -> DbResult<Option<T>> {
        let filter = Predicate::new(expr, args.iter().cloned());
        self.find_one(ctx, "get_by", lock, filter).await
    }

    /// Checks whether any row matches `expr`.
    ///
    /// Never reports not-found as an error.
    pub async fn exist(&self, ctx: &Context, expr: &str, args: &[Value]) -> DbResult<bool> {
        Ok(self.get_by(ctx, expr, args).await?.is_some())
    }

    async fn find_one(
        &self,
        ctx: &Context,
        op: &'static str,
        lock: LockMode,
        filter: Predicate,
    ) -> DbResult<Option<T>> {
        let dialect = self.executor.dialect();
        let stmt = SelectQuery::new(self.schema.table())
            .filter(filter)
            .order_by(self.schema.primary_key(), SortOrder::Asc)
            .limit(1)
            .lock(lock)
            .to_select(dialect)?;

        if lock.is_locking() && !dialect.supports_row_locks() {
            debug!(
                table = self.schema.table(),
                ?lock,
                in_tx = self.executor.transaction().is_some(),
                "No row locks in this dialect; the transaction's database lock applies"
            );
        }

        match ctx.run(op, self.executor.fetch_optional::<T>(&stmt)).await {
            Ok(row) => Ok(row),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(self.traced(op, err)),
        }
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Lists rows, applying every option in order.
    ///
    /// No filter returns all rows; no page option is unbounded.
    pub async fn list(&self, ctx: &Context, opts: &[QueryOption]) -> DbResult<Vec<T>> {
        let query = apply_all(SelectQuery::new(self.schema.table()), opts);
        let stmt = query.to_select(self.executor.dialect())?;

        debug!(table = self.schema.table(), options = opts.len(), "Listing rows");

        let rows = ctx
            .run("list", self.executor.fetch_all::<T>(&stmt))
            .await
            .map_err(|e| self.traced("list", e))?;

        debug!(table = self.schema.table(), count = rows.len(), "List returned rows");
        Ok(rows)
    }

    /// Lists rows keyed by primary key. A repeated key keeps the last row.
    pub async fn list_map(&self, ctx: &Context, opts: &[QueryOption]) -> DbResult<HashMap<T::Id, T>> {
        let rows = self.list(ctx, opts).await?;
        Ok(index_by_id(rows))
    }

    /// Lists the rows whose primary key is in `ids`.
    ///
    /// An empty id set returns nothing without touching the database.
    pub async fn list_by_ids(&self, ctx: &Context, ids: &[T::Id]) -> DbResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Predicate::in_list(self.schema.primary_key(), ids.iter().cloned());
        let stmt = SelectQuery::new(self.schema.table())
            .filter(filter)
            .to_select(self.executor.dialect())?;

        debug!(table = self.schema.table(), ids = ids.len(), "Listing rows by id");

        ctx.run("list_by_ids", self.executor.fetch_all::<T>(&stmt))
            .await
            .map_err(|e| self.traced("list_by_ids", e))
    }

    /// Like [`Repository::list_by_ids`], keyed by primary key.
    pub async fn list_map_by_ids(&self, ctx: &Context, ids: &[T::Id]) -> DbResult<HashMap<T::Id, T>> {
        let rows = self.list_by_ids(ctx, ids).await?;
        Ok(index_by_id(rows))
    }

    /// Counts rows, applying only count-eligible (filter) options.
    ///
    /// Sort and page options are skipped, so the option list used for a
    /// `list` call can be passed here unchanged.
    pub async fn count(&self, ctx: &Context, opts: &[QueryOption]) -> DbResult<i64> {
        let query = apply_for_count(SelectQuery::new(self.schema.table()), opts);
        let stmt = query.to_count(self.executor.dialect())?;

        debug!(table = self.schema.table(), "Counting rows");

        ctx.run("count", self.executor.fetch_count(&stmt))
            .await
            .map_err(|e| self.traced("count", e))
    }

    /// Logs a failed call and attaches its operation and table.
    fn traced(&self, op: &'static str, err: DbError) -> DbError {
        debug!(op, table = self.schema.table(), error = %err, "Repository call failed");
        err.in_operation(op, self.schema.table())
    }
}

fn index_by_id<T: Row>(rows: Vec<T>) -> HashMap<T::Id, T> {
    rows.into_iter().map(|row| (row.id(), row)).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::error::Error as _;
    use std::path::PathBuf;
    use std::time::Duration;
    use tabula_core::QueryError;

    #[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
    struct User {
        id: i64,
        name: String,
        age: i64,
        email: Option<String>,
    }

    impl Row for User {
        type Id = i64;

        fn table_name() -> &'static str {
            "users"
        }

        fn columns() -> &'static [&'static str] {
            &["id", "name", "age", "email"]
        }

        fn id(&self) -> i64 {
            self.id
        }

        fn values(&self) -> Vec<Value> {
            vec![
                self.id.into(),
                self.name.clone().into(),
                self.age.into(),
                self.email.clone().into(),
            ]
        }
    }

    fn user(id: i64, name: &str, age: i64) -> User {
        User {
            id,
            name: name.to_string(),
            age,
            email: Some(format!("{}@example.com", name.to_lowercase())),
        }
    }

    async fn setup() -> (Database, Repository<User>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.run_migrations(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/migrations"))
            .await
            .unwrap();
        let users = db.repository::<User>().unwrap();
        (db, users)
    }

    async fn seeded() -> (Database, Repository<User>) {
        let (db, users) = setup().await;
        users
            .insert(
                &Context::background(),
                &[
                    user(1, "Ann", 31),
                    user(2, "Bob", 17),
                    user(3, "Cid", 45),
                    user(4, "Dee", 28),
                ],
            )
            .await
            .unwrap();
        (db, users)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (_db, users) = setup().await;
        let ctx = Context::background();

        users
            .insert(&ctx, &[user(1, "Ann", 31), user(2, "Bob", 17)])
            .await
            .unwrap();

        assert_eq!(users.get(&ctx, 2).await.unwrap(), Some(user(2, "Bob", 17)));
        assert_eq!(users.count(&ctx, &[]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();

        for _ in 0..2 {
            assert_eq!(users.get(&ctx, 99).await.unwrap(), None);
            assert_eq!(users.get_by(&ctx, "name = ?", &["Zed".into()]).await.unwrap(), None);
            assert!(!users.exist(&ctx, "id = ?", &[99.into()]).await.unwrap());
        }
        assert_eq!(users.count(&ctx, &[]).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_get_by_returns_lowest_key() {
        let (_db, users) = seeded().await;

        let found = users
            .get_by(&Context::background(), "age > ?", &[20.into()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, 1);
    }

    #[tokio::test]
    async fn test_get_with_lock_on_sqlite() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();

        let locked = users
            .get_with_lock(&ctx, LockMode::Exclusive, 3)
            .await
            .unwrap();
        assert_eq!(locked.map(|u| u.name), Some("Cid".to_string()));

        let shared = users
            .get_with_lock_by(&ctx, LockMode::Shared, "name = ?", &["Dee".into()])
            .await
            .unwrap();
        assert_eq!(shared.map(|u| u.id), Some(4));
    }

    #[tokio::test]
    async fn test_exist() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();

        assert!(users.exist(&ctx, "name = ?", &["Ann".into()]).await.unwrap());
        assert!(!users.exist(&ctx, "age > ?", &[100.into()]).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_sort_and_page() {
        let (_db, users) = seeded().await;

        // Ages descending: Cid 45, Ann 31, Dee 28, Bob 17
        let page = users
            .list(
                &Context::background(),
                &[QueryOption::sort("age", SortOrder::Desc), QueryOption::page(2, 1)],
            )
            .await
            .unwrap();
        assert_eq!(page, vec![user(1, "Ann", 31)]);
    }

    #[tokio::test]
    async fn test_list_without_options_returns_everything() {
        let (_db, users) = seeded().await;
        let all = users.list(&Context::background(), &[]).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_count_ignores_sort_and_page() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();
        let adults = QueryOption::filter("age >= ?", [18]);

        let mixed = users
            .count(
                &ctx,
                &[
                    adults.clone(),
                    QueryOption::sort("age", SortOrder::Asc),
                    QueryOption::page(1, 1),
                ],
            )
            .await
            .unwrap();
        let filtered = users.count(&ctx, &[adults]).await.unwrap();

        assert_eq!(mixed, 3);
        assert_eq!(mixed, filtered);
    }

    #[tokio::test]
    async fn test_list_map_and_by_ids() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();

        let by_id = users
            .list_map(&ctx, &[QueryOption::filter("age < ?", [30])])
            .await
            .unwrap();
        assert_eq!(by_id.len(), 2);
        assert_eq!(by_id[&2].name, "Bob");
        assert_eq!(by_id[&4].name, "Dee");

        let mut picked = users.list_by_ids(&ctx, &[3, 1, 42]).await.unwrap();
        picked.sort_by_key(|u| u.id);
        assert_eq!(picked.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 3]);

        let mapped = users.list_map_by_ids(&ctx, &[4]).await.unwrap();
        assert_eq!(mapped.keys().copied().collect::<Vec<_>>(), vec![4]);

        assert!(users.list_by_ids(&ctx, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_null_columns() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();

        let changed = User {
            id: 1,
            name: "Anne".to_string(),
            age: 32,
            email: None,
        };
        users.update(&ctx, &changed).await.unwrap();

        let stored = users.get(&ctx, 1).await.unwrap().unwrap();
        assert_eq!(stored.name, "Anne");
        assert_eq!(stored.age, 32);
        assert_eq!(stored.email.as_deref(), Some("ann@example.com"));
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let (_db, users) = seeded().await;

        let err = users
            .update(&Context::background(), &user(77, "Ghost", 1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let (_db, users) = setup().await;
        let ctx = Context::background();

        users.upsert(&ctx, &user(5, "Eve", 22)).await.unwrap();
        users.upsert(&ctx, &user(5, "Eve", 23)).await.unwrap();

        assert_eq!(users.count(&ctx, &[]).await.unwrap(), 1);
        assert_eq!(users.get(&ctx, 5).await.unwrap().map(|u| u.age), Some(23));
    }

    #[tokio::test]
    async fn test_insert_duplicate_is_unique_violation() {
        let (_db, users) = seeded().await;

        let err = users
            .insert(&Context::background(), &[user(9, "Ann", 50)])
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert!(matches!(
            err,
            DbError::Operation {
                op: "insert",
                table: "users",
                ..
            }
        ));

        // Operation -> UniqueViolation -> the driver's error
        let classified = err.source().unwrap();
        assert!(classified.to_string().starts_with("Duplicate"));
        let driver = classified
            .source()
            .and_then(|e| e.downcast_ref::<sqlx::Error>());
        assert!(matches!(driver, Some(sqlx::Error::Database(_))));
    }

    #[tokio::test]
    async fn test_upsert_conflict_on_other_column_keeps_unique_violation() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();

        // New key, but "Ann" is already taken by id 1
        let err = users.upsert(&ctx, &user(9, "Ann", 50)).await.unwrap_err();

        assert!(err.is_unique_violation());
        assert!(!err.is_not_found());
        assert_eq!(users.get(&ctx, 9).await.unwrap(), None);
        assert_eq!(users.get(&ctx, 1).await.unwrap(), Some(user(1, "Ann", 31)));
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_calls() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();

        let tx = Transaction::from(users.executor().pool().begin().await.unwrap());
        let in_tx = users.with_transaction(&tx);

        let ann = in_tx
            .get_with_lock(&ctx, LockMode::Exclusive, 1)
            .await
            .unwrap()
            .unwrap();
        in_tx
            .upsert(&ctx, &User { age: ann.age + 1, ..ann })
            .await
            .unwrap();
        in_tx.upsert(&ctx, &user(6, "Fay", 40)).await.unwrap();

        assert_eq!(in_tx.count(&ctx, &[]).await.unwrap(), 5);
        assert_eq!(in_tx.get(&ctx, 1).await.unwrap().map(|u| u.age), Some(32));

        tx.rollback().await.unwrap();

        assert_eq!(users.count(&ctx, &[]).await.unwrap(), 4);
        assert_eq!(users.get(&ctx, 1).await.unwrap().map(|u| u.age), Some(31));

        let err = in_tx.get(&ctx, 1).await.unwrap_err();
        assert!(matches!(err.inner(), DbError::TransactionClosed));
    }

    #[tokio::test]
    async fn test_transaction_commit_persists_calls() {
        let (db, users) = seeded().await;
        let ctx = Context::background();

        let tx = db.begin().await.unwrap();
        let in_tx = users.with_transaction(&tx);

        let bob = in_tx
            .get_with_lock_by(&ctx, LockMode::Shared, "name = ?", &["Bob".into()])
            .await
            .unwrap()
            .unwrap();
        in_tx.delete(&ctx, &bob).await.unwrap();
        in_tx
            .update_batch(&ctx, &[("age", 50.into())], "age > ?", &[40.into()])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(users.get(&ctx, 2).await.unwrap(), None);
        assert_eq!(users.get(&ctx, 3).await.unwrap().map(|u| u.age), Some(50));
    }

    #[tokio::test]
    async fn test_update_batch() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();

        let changed = users
            .update_batch(&ctx, &[("email", Value::Null)], "age < ?", &[30.into()])
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let cleared = users
            .count(&ctx, &[QueryOption::filter_expr("email IS NULL")])
            .await
            .unwrap();
        assert_eq!(cleared, 2);

        assert_eq!(
            users.update_batch(&ctx, &[], "age < ?", &[30.into()]).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_writes_require_filter() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();

        let err = users.delete_batch(&ctx, "  ", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery(QueryError::MissingFilter(_))));

        let err = users
            .update_batch(&ctx, &[("age", 1.into())], "", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery(QueryError::MissingFilter(_))));
        assert_eq!(users.count(&ctx, &[]).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_delete_and_delete_batch() {
        let (_db, users) = seeded().await;
        let ctx = Context::background();

        users.delete(&ctx, &user(2, "Bob", 17)).await.unwrap();
        // Already gone; still fine
        users.delete(&ctx, &user(2, "Bob", 17)).await.unwrap();
        assert_eq!(users.get(&ctx, 2).await.unwrap(), None);

        let removed = users.delete_batch(&ctx, "age > ?", &[30.into()]).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(users.count(&ctx, &[]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_insert_skips_database() {
        let (db, users) = setup().await;
        db.close().await;
        let ctx = Context::background();

        users.insert(&ctx, &[]).await.unwrap();
        assert!(users.insert(&ctx, &[user(1, "Ann", 31)]).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_context() {
        let (_db, users) = seeded().await;
        let ctx = Context::background().with_timeout(Duration::ZERO);

        let err = users.list(&ctx, &[]).await.unwrap_err();
        assert!(matches!(err.inner(), DbError::Timeout("list")));
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let (_db, users) = seeded().await;
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();

        let err = users.get(&ctx, 1).await.unwrap_err();
        assert!(matches!(err.inner(), DbError::Cancelled("get")));
    }

    #[tokio::test]
    async fn test_bad_row_metadata_is_configuration_error() {
        #[derive(Debug, sqlx::FromRow)]
        struct Broken {
            id: i64,
        }

        impl Row for Broken {
            type Id = i64;

            fn table_name() -> &'static str {
                "bad table"
            }

            fn columns() -> &'static [&'static str] {
                &["id"]
            }

            fn id(&self) -> i64 {
                self.id
            }

            fn values(&self) -> Vec<Value> {
                vec![self.id.into()]
            }
        }

        let (db, _users) = setup().await;
        let err = db.repository::<Broken>().unwrap_err();
        assert!(matches!(
            err,
            DbError::Configuration {
                source: QueryError::InvalidIdentifier(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_sort_field_is_rejected() {
        let (_db, users) = seeded().await;

        let err = users
            .list(
                &Context::background(),
                &[QueryOption::sort("age; DROP TABLE users", SortOrder::Asc)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery(QueryError::InvalidIdentifier(_))));
    }
}
