//! Record store trait definitions.
//!
//! A record store owns the physical tables. It knows nothing about entity
//! types, hooks or events; the `Orm` service layers those on top.

use async_trait::async_trait;

use crate::error::OrmError;
use crate::query::QuerySpec;
use crate::record::{RawResults, Record};
use crate::schema::EntitySchema;
use crate::value::Value;

/// Read access and transaction factory for one database.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Creates the table and indexes for `schema` if they do not exist.
    async fn ensure_schema(&self, schema: &EntitySchema) -> Result<(), OrmError>;

    /// Rows matching `spec`, in query order.
    async fn fetch(&self, spec: &QuerySpec) -> Result<Vec<Record>, OrmError>;

    /// Number of rows matching `spec`, ignoring its limit and offset.
    async fn count(&self, spec: &QuerySpec) -> Result<u64, OrmError>;

    /// Sum of `column` over matching rows; 0 when nothing matches.
    async fn sum(&self, spec: &QuerySpec, column: &str) -> Result<f64, OrmError>;

    /// Distinct values of `column` over matching rows.
    async fn distinct(&self, spec: &QuerySpec, column: &str) -> Result<Vec<Value>, OrmError>;

    /// Executes a free-text statement and returns whatever rows it produced.
    async fn raw_query(&self, sql: &str) -> Result<RawResults, OrmError>;

    /// Names of the user tables in the database.
    async fn table_names(&self) -> Result<Vec<String>, OrmError>;

    /// Opens a write transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, OrmError>;
}

/// An open write transaction.
///
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait StoreTransaction: Send {
    /// The stored row with primary key `id`, if any.
    async fn find(&mut self, schema: &EntitySchema, id: i64) -> Result<Option<Record>, OrmError>;

    /// Inserts `record` and returns its primary key. A record carrying an
    /// `Id` column is inserted with that key.
    async fn insert(&mut self, schema: &EntitySchema, record: &Record) -> Result<i64, OrmError>;

    /// Overwrites the row `id` with `record`, returning the affected row count.
    async fn update(
        &mut self,
        schema: &EntitySchema,
        id: i64,
        record: &Record,
    ) -> Result<u64, OrmError>;

    /// Deletes the row `id`, returning the affected row count.
    async fn delete(&mut self, schema: &EntitySchema, id: i64) -> Result<u64, OrmError>;

    async fn commit(self: Box<Self>) -> Result<(), OrmError>;

    async fn rollback(self: Box<Self>) -> Result<(), OrmError>;
}
