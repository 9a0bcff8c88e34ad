//! `SQLite` implementation of the record store port.
//!
//! All SQL text is produced by [`crate::sql`]; this module binds values,
//! runs statements and maps rows and errors back into core types. The
//! `SqlitePool` never crosses the port boundary.

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::{Row, Sqlite, SqlitePool};
use std::time::Instant;

use shark_core::{
    EntitySchema, OrmError, PRIMARY_KEY_COLUMN, QuerySpec, RawResults, Record, RecordStore,
    StoreTransaction, Value,
};

use crate::row_mappers::{
    DateEncoding, bind_all, bind_value, column_value, row_to_record, rows_to_raw_results,
};
use crate::sql;

/// Map `SQLx` errors to `OrmError`.
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> OrmError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(
            db.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        ) {
            return OrmError::Constraint(db.message().to_string());
        }
    }
    OrmError::Storage(e.to_string())
}

fn log_statement(sql: &str, started: Instant) {
    tracing::debug!(
        sql,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "statement executed"
    );
}

/// Columns and values of `record` to write, checked against `schema`.
fn writable<'r>(
    schema: &EntitySchema,
    record: &'r Record,
    include_key: bool,
) -> Result<(Vec<&'static str>, Vec<&'r Value>), OrmError> {
    let columns = sql::checked_columns(schema, record)?;
    Ok(columns
        .into_iter()
        .zip(record.iter().map(|(_, value)| value))
        .filter(|(column, _)| include_key || *column != PRIMARY_KEY_COLUMN)
        .unzip())
}

fn count_from(value: i64) -> Result<u64, OrmError> {
    u64::try_from(value).map_err(|e| OrmError::Storage(e.to_string()))
}

/// `SQLite` implementation of [`RecordStore`].
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    dates: DateEncoding,
}

impl SqliteRecordStore {
    /// Create a store writing dates as RFC 3339 text.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            dates: DateEncoding::default(),
        }
    }

    #[must_use]
    pub fn with_date_encoding(mut self, dates: DateEncoding) -> Self {
        self.dates = dates;
        self
    }

    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub const fn date_encoding(&self) -> DateEncoding {
        self.dates
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn ensure_schema(&self, schema: &EntitySchema) -> Result<(), OrmError> {
        let epoch_dates = self.dates == DateEncoding::EpochSeconds;
        let mut statements = vec![sql::create_table(schema, epoch_dates)];
        statements.extend(schema.indexes.iter().map(|index| sql::create_index(schema, index)));

        for statement in &statements {
            let started = Instant::now();
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            log_statement(statement, started);
        }
        tracing::info!(entity = schema.entity, "table ready");
        Ok(())
    }

    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<Record>, OrmError> {
        let statement = sql::select(spec);
        let started = Instant::now();
        let rows = bind_all(sqlx::query(&statement), &spec.parameters, self.dates)
            .bind(i64::from(spec.limit))
            .bind(i64::from(spec.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        log_statement(&statement, started);

        rows.iter().map(row_to_record).collect()
    }

    async fn count(&self, spec: &QuerySpec) -> Result<u64, OrmError> {
        let statement = sql::count(spec);
        let started = Instant::now();
        let row = bind_all(sqlx::query(&statement), &spec.parameters, self.dates)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        log_statement(&statement, started);

        count_from(row.try_get::<i64, _>(0).map_err(map_sqlx_error)?)
    }

    async fn sum(&self, spec: &QuerySpec, column: &str) -> Result<f64, OrmError> {
        let statement = sql::sum(spec, column);
        let started = Instant::now();
        let row = bind_all(sqlx::query(&statement), &spec.parameters, self.dates)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        log_statement(&statement, started);

        row.try_get::<f64, _>(0).map_err(map_sqlx_error)
    }

    async fn distinct(&self, spec: &QuerySpec, column: &str) -> Result<Vec<Value>, OrmError> {
        let statement = sql::distinct(spec, column);
        let started = Instant::now();
        let rows = bind_all(sqlx::query(&statement), &spec.parameters, self.dates)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        log_statement(&statement, started);

        rows.iter().map(|row| column_value(row, 0)).collect()
    }

    async fn raw_query(&self, sql: &str) -> Result<RawResults, OrmError> {
        let started = Instant::now();
        let rows = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        log_statement(sql, started);

        rows_to_raw_results(&rows)
    }

    async fn table_names(&self) -> Result<Vec<String>, OrmError> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, OrmError> {
        // Take the write lock up front: a deferred transaction that reads
        // before writing cannot wait out a concurrent writer.
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(map_sqlx_error)?;
        tracing::trace!("transaction started");
        Ok(Box::new(SqliteStoreTransaction {
            tx,
            dates: self.dates,
        }))
    }
}

/// An open `SQLite` transaction. Dropping it without commit rolls back.
pub struct SqliteStoreTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
    dates: DateEncoding,
}

#[async_trait]
impl StoreTransaction for SqliteStoreTransaction {
    async fn find(&mut self, schema: &EntitySchema, id: i64) -> Result<Option<Record>, OrmError> {
        let statement = sql::find(schema);
        let started = Instant::now();
        let row = sqlx::query(&statement)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        log_statement(&statement, started);

        row.as_ref().map(row_to_record).transpose()
    }

    async fn insert(&mut self, schema: &EntitySchema, record: &Record) -> Result<i64, OrmError> {
        let (columns, values) = writable(schema, record, true)?;
        let statement = sql::insert(schema, &columns);
        let started = Instant::now();

        let mut query = sqlx::query(&statement);
        for value in values {
            query = bind_value(query, value, self.dates);
        }
        let result = query
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        log_statement(&statement, started);

        Ok(result.last_insert_rowid())
    }

    async fn update(
        &mut self,
        schema: &EntitySchema,
        id: i64,
        record: &Record,
    ) -> Result<u64, OrmError> {
        let (columns, values) = writable(schema, record, false)?;
        let statement = sql::update(schema, &columns);
        let started = Instant::now();

        let mut query = sqlx::query(&statement);
        for value in values {
            query = bind_value(query, value, self.dates);
        }
        let result = query
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        log_statement(&statement, started);

        Ok(result.rows_affected())
    }

    async fn delete(&mut self, schema: &EntitySchema, id: i64) -> Result<u64, OrmError> {
        let statement = sql::delete(schema);
        let started = Instant::now();
        let result = sqlx::query(&statement)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        log_statement(&statement, started);

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), OrmError> {
        let Self { tx, .. } = *self;
        tx.commit().await.map_err(map_sqlx_error)?;
        tracing::trace!("transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), OrmError> {
        let Self { tx, .. } = *self;
        tx.rollback().await.map_err(map_sqlx_error)?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;
    use shark_core::samples::{Department, TestClass};
    use shark_core::{Entity, Persistable};

    async fn store() -> SqliteRecordStore {
        SqliteRecordStore::new(setup_test_database().await.unwrap())
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let store = store().await;
        store.ensure_schema(TestClass::entity_schema()).await.unwrap();
        store.ensure_schema(TestClass::entity_schema()).await.unwrap();

        assert_eq!(store.table_names().await.unwrap(), vec!["TestClass"]);
    }

    #[tokio::test]
    async fn test_table_names_only_skip_internal_tables() {
        let store = store().await;
        store.ensure_schema(Department::entity_schema()).await.unwrap();
        store
            .raw_query("CREATE TABLE sqliteXcache (x INTEGER)")
            .await
            .unwrap();

        assert_eq!(
            store.table_names().await.unwrap(),
            vec!["Department", "sqliteXcache"]
        );
    }

    #[test]
    fn test_writable_drops_key_unless_requested() {
        let schema = Department::entity_schema();
        let record = Record::new().with("name", "Sales").with("Id", 7_i64);

        let (columns, values) = writable(schema, &record, false).unwrap();
        assert_eq!(columns, vec!["name"]);
        assert_eq!(values, vec![&Value::Text("Sales".into())]);

        let (columns, _) = writable(schema, &record, true).unwrap();
        assert_eq!(columns, vec!["Id", "name"]);
    }

    #[tokio::test]
    async fn test_column_default_applies() {
        let store = store().await;
        let schema = TestClass::entity_schema();
        store.ensure_schema(schema).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(schema, &Record::new()).await.unwrap();
        let row = tx.find(schema, id).await.unwrap().unwrap();
        tx.commit().await.unwrap();

        assert_eq!(row.get("isdeleted"), Some(&Value::Integer(0)));
        assert_eq!(row.get("SwiftTestString"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = store().await;
        let schema = Department::entity_schema();
        store.ensure_schema(schema).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert(schema, &Department::named("Sales").to_record())
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let spec = QuerySpec::new(schema);
        assert_eq!(store.count(&spec).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_undeclared_column_is_rejected() {
        let store = store().await;
        let schema = Department::entity_schema();
        store.ensure_schema(schema).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert(schema, &Record::new().with("budget", 10_i64))
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::UnknownProperty { .. }));
    }

    #[tokio::test]
    async fn test_sum_of_no_rows_is_zero() {
        let store = store().await;
        let schema = TestClass::entity_schema();
        store.ensure_schema(schema).await.unwrap();

        let total = store
            .sum(&QuerySpec::new(schema), "SwiftTestNumber")
            .await
            .unwrap();
        assert!(total.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_bad_sql_is_a_storage_error() {
        let store = store().await;
        let err = store.raw_query("SELECT * FROM nowhere").await.unwrap_err();
        assert!(matches!(err, OrmError::Storage(_)));
    }
}
