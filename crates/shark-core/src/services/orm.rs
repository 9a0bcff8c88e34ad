//! The `Orm` service - entry point for reads and writes of entities.
//!
//! `Orm` is a thin orchestrator over the `RecordStore` port. It adds the
//! entity-level behaviour (lazy table creation, hooks, events, cascading
//! child commits) that the store itself knows nothing about.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::commit_options::CommitOptions;
use crate::entity::{Entity, Related};
use crate::error::OrmError;
use crate::events::EventHub;
use crate::ports::RecordStore;
use crate::query::{Query, QuerySpec};
use crate::record::RawResults;
use crate::schema::EntitySchema;
use crate::value::Value;

use super::transaction::Transaction;

/// Persistence service for entity types.
pub struct Orm {
    store: Arc<dyn RecordStore>,
    events: Arc<EventHub>,
    options: CommitOptions,
    /// Entities whose tables are known to exist.
    ensured: Mutex<HashSet<&'static str>>,
}

impl Orm {
    /// Create a service over `store` with default commit options.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            events: Arc::new(EventHub::new()),
            options: CommitOptions::default(),
            ensured: Mutex::new(HashSet::new()),
        }
    }

    /// Replace the default commit options used by `commit`, `remove` and
    /// new transactions.
    #[must_use]
    pub fn with_options(mut self, options: CommitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Event hub on which change callbacks are registered.
    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    pub const fn options(&self) -> &CommitOptions {
        &self.options
    }

    /// Creates the tables of `schemas` up front instead of on first use.
    pub async fn setup_tables(&self, schemas: &[&'static EntitySchema]) -> Result<(), OrmError> {
        for schema in schemas {
            self.ensure_schema(schema).await?;
        }
        Ok(())
    }

    /// Makes sure the table for `schema` exists, once per entity and service.
    pub async fn ensure_schema(&self, schema: &'static EntitySchema) -> Result<(), OrmError> {
        if self.is_ensured(schema.entity) {
            return Ok(());
        }
        self.store.ensure_schema(schema).await?;
        self.ensured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(schema.entity);
        tracing::debug!(entity = schema.entity, "table ensured");
        Ok(())
    }

    fn is_ensured(&self, entity: &str) -> bool {
        self.ensured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(entity)
    }

    /// Makes sure every table read by `spec` exists.
    pub async fn ensure_query_tables(&self, spec: &QuerySpec) -> Result<(), OrmError> {
        for schema in spec.schemas() {
            self.ensure_schema(schema).await?;
        }
        Ok(())
    }

    /// Starts a fluent query over `E`.
    pub fn query<E: Entity>(&self) -> Query<'_, E> {
        Query::new(self)
    }

    /// Starts a transaction using the service's commit options.
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self, self.options.clone())
    }

    /// Starts a transaction with explicit commit options.
    pub fn transaction_with_options(&self, options: CommitOptions) -> Transaction<'_> {
        Transaction::new(self, options)
    }

    /// Inserts `entity` (no id yet) or updates it (has an id), together with
    /// any loaded related entities.
    pub async fn commit<E: Entity>(&self, entity: &mut E) -> Result<(), OrmError> {
        let mut transaction = self.transaction();
        transaction.commit_entity(entity);
        transaction.commit().await
    }

    /// Deletes `entity` and clears its id.
    pub async fn remove<E: Entity>(&self, entity: &mut E) -> Result<(), OrmError> {
        let mut transaction = self.transaction();
        transaction.remove_entity(entity);
        transaction.commit().await
    }

    /// The entity with primary key `id`, if stored.
    pub async fn object_with_primary_key<E: Entity>(&self, id: i64) -> Result<Option<E>, OrmError> {
        self.first_match_of::<E>(crate::schema::PRIMARY_KEY_COLUMN, id)
            .await
    }

    /// The first entity whose `property` equals `value`.
    pub async fn first_match_of<E: Entity>(
        &self,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<Option<E>, OrmError> {
        let spec = QuerySpec::matching(E::entity_schema(), property, value)?;
        Ok(self.fetch_spec::<E>(&spec).await?.into_iter().next())
    }

    /// Loads the target of an association.
    ///
    /// A loaded association is returned as is; an unresolved one is fetched.
    pub async fn resolve<E: Entity + Clone>(&self, related: &Related<E>) -> Result<Option<E>, OrmError> {
        match related {
            Related::Loaded(entity) => Ok(Some(entity.as_ref().clone())),
            Related::Unresolved(id) => self.object_with_primary_key::<E>(*id).await,
        }
    }

    /// Runs a free-text SQL statement.
    pub async fn raw_query(&self, sql: &str) -> Result<RawResults, OrmError> {
        self.store.raw_query(sql).await
    }

    pub async fn table_names(&self) -> Result<Vec<String>, OrmError> {
        self.store.table_names().await
    }

    pub(crate) async fn fetch_spec<E: Entity>(&self, spec: &QuerySpec) -> Result<Vec<E>, OrmError> {
        spec.validate()?;
        self.ensure_query_tables(spec).await?;
        self.store
            .fetch(spec)
            .await?
            .iter()
            .map(E::from_record)
            .collect()
    }
}
