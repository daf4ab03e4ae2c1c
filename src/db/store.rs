//! Table-parameterized record store.
//!
//! A [`Record`] binds its table name and column set at compile time, so the
//! only text ever spliced into SQL comes from `'static` identifiers declared in
//! this crate. Every value goes through `push_bind`.

use std::marker::PhantomData;

use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

/// A column of a [`Record`] table.
pub trait Column: Copy + Send + Sync + 'static {
    fn name(self) -> &'static str;
}

/// A row type stored in its own table with `id`, `created_at` and
/// `updated_at` columns.
pub trait Record: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    type Column: Column;
    const TABLE: &'static str;
}

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Text(String),
    Uuid(Uuid),
    Null,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Equality predicates combined with `AND`.
///
/// Null values never become predicates: `eq(col, None::<bool>)` leaves the
/// filter set untouched instead of matching `IS NULL`.
#[derive(Debug, Clone)]
pub struct Filters<C> {
    clauses: Vec<(C, Value)>,
}

impl<C: Column> Filters<C> {
    pub fn new() -> Self {
        Self { clauses: Vec::new() }
    }

    pub fn eq(mut self, column: C, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value != Value::Null {
            self.clauses.push((column, value));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(C, Value)> {
        self.clauses.iter()
    }
}

impl<C: Column> Default for Filters<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Column assignments for an insert or a partial update.
#[derive(Debug, Clone)]
pub struct Changeset<C> {
    values: Vec<(C, Value)>,
}

impl<C: Column> Changeset<C> {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Assigns `value`, including an explicit `Value::Null`.
    pub fn set(mut self, column: C, value: impl Into<Value>) -> Self {
        self.values.push((column, value.into()));
        self
    }

    /// Assigns `value` only when it was supplied.
    pub fn set_opt<V: Into<Value>>(self, column: C, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl<C: Column> Default for Changeset<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Limit/offset window over a newest-first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    #[error("not-null constraint violated: {0}")]
    NotNullViolation(String),
    #[error("No valid fields to update")]
    EmptyChangeset,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let classified = match &err {
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                match db.code().as_deref() {
                    Some("23505") => Some(StoreError::UniqueViolation(message)),
                    Some("23503") => Some(StoreError::ForeignKeyViolation(message)),
                    Some("23502") => Some(StoreError::NotNullViolation(message)),
                    _ => None,
                }
            }
            _ => None,
        };
        classified.unwrap_or(StoreError::Database(err))
    }
}

pub struct RecordStore<R> {
    pool: PgPool,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for RecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> RecordStore<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, StoreError> {
        let mut qb = find_one_query::<R>("id", Value::Uuid(id));
        let row = qb.build_query_as::<R>().fetch_optional(&self.pool).await?;
        Ok(row)
    }

    pub async fn find_one_by(
        &self,
        column: R::Column,
        value: impl Into<Value>,
    ) -> Result<Option<R>, StoreError> {
        let mut qb = find_one_query::<R>(column.name(), value.into());
        let row = qb.build_query_as::<R>().fetch_optional(&self.pool).await?;
        Ok(row)
    }

    pub async fn find_all(
        &self,
        filters: &Filters<R::Column>,
        page: Page,
    ) -> Result<Vec<R>, StoreError> {
        let mut qb = select_query::<R>(filters, page);
        let rows = qb.build_query_as::<R>().fetch_all(&self.pool).await?;
        debug!(table = R::TABLE, rows = rows.len(), "find_all");
        Ok(rows)
    }

    pub async fn count(&self, filters: &Filters<R::Column>) -> Result<i64, StoreError> {
        let mut qb = count_query::<R>(filters);
        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    pub async fn create(&self, changes: Changeset<R::Column>) -> Result<R, StoreError> {
        let mut qb = insert_query::<R>(&changes)?;
        let row = qb.build_query_as::<R>().fetch_one(&self.pool).await?;
        debug!(table = R::TABLE, "record created");
        Ok(row)
    }

    pub async fn update(
        &self,
        id: Uuid,
        changes: Changeset<R::Column>,
    ) -> Result<Option<R>, StoreError> {
        let mut qb = update_query::<R>(id, &changes)?;
        let row = qb.build_query_as::<R>().fetch_optional(&self.pool).await?;
        debug!(table = R::TABLE, %id, matched = row.is_some(), "record updated");
        Ok(row)
    }

    pub async fn delete(&self, id: Uuid) -> Result<Option<R>, StoreError> {
        let mut qb: QueryBuilder<'static, Postgres> =
            QueryBuilder::new(format!("DELETE FROM {} WHERE id = ", R::TABLE));
        qb.push_bind(id);
        qb.push(" RETURNING *");
        let row = qb.build_query_as::<R>().fetch_optional(&self.pool).await?;
        debug!(table = R::TABLE, %id, matched = row.is_some(), "record deleted");
        Ok(row)
    }
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: &Value) {
    match value.clone() {
        Value::Bool(v) => qb.push_bind(v),
        Value::Text(v) => qb.push_bind(v),
        Value::Uuid(v) => qb.push_bind(v),
        Value::Null => qb.push_bind(None::<String>),
    };
}

fn push_filters<C: Column>(qb: &mut QueryBuilder<'static, Postgres>, filters: &Filters<C>) {
    for (i, (column, value)) in filters.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(column.name());
        qb.push(" = ");
        push_value(qb, value);
    }
}

fn find_one_query<R: Record>(column: &'static str, value: Value) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT * FROM {} WHERE {} = ", R::TABLE, column));
    push_value(&mut qb, &value);
    qb
}

fn select_query<R: Record>(filters: &Filters<R::Column>, page: Page) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT * FROM {}", R::TABLE));
    push_filters(&mut qb, filters);
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(page.limit);
    qb.push(" OFFSET ");
    qb.push_bind(page.offset);
    qb
}

fn count_query<R: Record>(filters: &Filters<R::Column>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", R::TABLE));
    push_filters(&mut qb, filters);
    qb
}

fn insert_query<R: Record>(
    changes: &Changeset<R::Column>,
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    if changes.is_empty() {
        return Err(StoreError::EmptyChangeset);
    }
    let mut qb = QueryBuilder::new(format!("INSERT INTO {} (", R::TABLE));
    for (i, (column, _)) in changes.values.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(column.name());
    }
    qb.push(") VALUES (");
    for (i, (_, value)) in changes.values.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(&mut qb, value);
    }
    qb.push(") RETURNING *");
    Ok(qb)
}

fn update_query<R: Record>(
    id: Uuid,
    changes: &Changeset<R::Column>,
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    if changes.is_empty() {
        return Err(StoreError::EmptyChangeset);
    }
    let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", R::TABLE));
    for (column, value) in &changes.values {
        qb.push(column.name());
        qb.push(" = ");
        push_value(&mut qb, value);
        qb.push(", ");
    }
    qb.push("updated_at = CURRENT_TIMESTAMP WHERE id = ");
    qb.push_bind(id);
    qb.push(" RETURNING *");
    Ok(qb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    enum WidgetColumn {
        Name,
        Enabled,
    }

    impl Column for WidgetColumn {
        fn name(self) -> &'static str {
            match self {
                WidgetColumn::Name => "name",
                WidgetColumn::Enabled => "enabled",
            }
        }
    }

    #[derive(Debug, sqlx::FromRow)]
    struct Widget {
        #[allow(dead_code)]
        id: Uuid,
    }

    impl Record for Widget {
        type Column = WidgetColumn;
        const TABLE: &'static str = "widgets";
    }

    #[test]
    fn select_without_filters_only_paginates() {
        let qb = select_query::<Widget>(&Filters::new(), Page::default());
        assert_eq!(
            qb.sql(),
            "SELECT * FROM widgets ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn select_with_filters_binds_each_value() {
        let filters = Filters::new()
            .eq(WidgetColumn::Enabled, true)
            .eq(WidgetColumn::Name, "gear");
        let qb = select_query::<Widget>(&filters, Page::new(10, 20));
        assert_eq!(
            qb.sql(),
            "SELECT * FROM widgets WHERE enabled = $1 AND name = $2 \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        );
    }

    #[test]
    fn absent_filter_values_are_not_predicates() {
        let filters = Filters::new()
            .eq(WidgetColumn::Enabled, None::<bool>)
            .eq(WidgetColumn::Name, Value::Null);
        assert!(filters.is_empty());

        let qb = count_query::<Widget>(&filters);
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM widgets");
    }

    #[test]
    fn count_shares_filter_semantics() {
        let filters = Filters::new().eq(WidgetColumn::Enabled, Some(false));
        let qb = count_query::<Widget>(&filters);
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM widgets WHERE enabled = $1");
    }

    #[test]
    fn insert_lists_columns_and_placeholders() {
        let changes = Changeset::new()
            .set(WidgetColumn::Name, "gear")
            .set_opt(WidgetColumn::Enabled, None::<bool>);
        assert_eq!(changes.len(), 1);

        let qb = insert_query::<Widget>(&changes).unwrap();
        assert_eq!(
            qb.sql(),
            "INSERT INTO widgets (name) VALUES ($1) RETURNING *"
        );
    }

    #[test]
    fn update_always_refreshes_updated_at() {
        let changes = Changeset::new()
            .set(WidgetColumn::Name, Value::Null)
            .set(WidgetColumn::Enabled, false);
        let qb = update_query::<Widget>(Uuid::new_v4(), &changes).unwrap();
        assert_eq!(
            qb.sql(),
            "UPDATE widgets SET name = $1, enabled = $2, \
             updated_at = CURRENT_TIMESTAMP WHERE id = $3 RETURNING *"
        );
    }

    #[test]
    fn empty_changesets_are_rejected() {
        let empty = Changeset::<WidgetColumn>::new();
        assert!(matches!(
            insert_query::<Widget>(&empty),
            Err(StoreError::EmptyChangeset)
        ));
        assert!(matches!(
            update_query::<Widget>(Uuid::new_v4(), &empty),
            Err(StoreError::EmptyChangeset)
        ));
    }

    #[test]
    fn find_one_binds_lookup_value() {
        let qb = find_one_query::<Widget>(WidgetColumn::Name.name(), "gear".into());
        assert_eq!(qb.sql(), "SELECT * FROM widgets WHERE name = $1");
    }

    #[test]
    fn non_database_errors_stay_unclassified() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
