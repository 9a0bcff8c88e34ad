//! Atomic groups of entity writes.
//!
//! A `Transaction` stages commits and removals and applies them all inside
//! one store transaction. Either everything is written or nothing is: on
//! failure the store is rolled back and every staged entity gets back the
//! primary key it had before, so a retry sees the same state.

use futures_util::future::BoxFuture;

use crate::commit_options::CommitOptions;
use crate::entity::{Entity, Persistable};
use crate::error::OrmError;
use crate::events::{EntityEvent, EventKind, EventSink};
use crate::ports::StoreTransaction;
use crate::record::Record;
use crate::schema::{EntitySchema, PRIMARY_KEY_COLUMN};

use super::orm::Orm;

enum Staged<'a> {
    Commit(&'a mut dyn Persistable),
    Remove(&'a mut dyn Persistable),
}

impl Staged<'_> {
    fn entity(&self) -> &dyn Persistable {
        match self {
            Self::Commit(entity) | Self::Remove(entity) => &**entity,
        }
    }
}

/// Primary keys of an entity tree captured before writing.
struct IdSnapshot {
    id: Option<i64>,
    children: Vec<IdSnapshot>,
}

impl IdSnapshot {
    fn capture(entity: &dyn Persistable) -> Self {
        Self {
            id: entity.id(),
            children: entity.children().into_iter().map(Self::capture).collect(),
        }
    }

    fn restore(&self, entity: &mut dyn Persistable) {
        entity.set_id(self.id);
        for (snapshot, child) in self.children.iter().zip(entity.children_mut()) {
            snapshot.restore(child);
        }
    }
}

/// A write performed inside the store transaction, replayed as hooks and
/// events once the transaction has committed.
struct Applied {
    /// Staged index followed by child positions.
    path: Vec<usize>,
    kind: EventKind,
    entity: &'static str,
    id: i64,
    changed: Vec<String>,
    raises_events: bool,
}

/// Staged entity writes applied atomically by [`Transaction::commit`].
///
/// ```ignore
/// let mut tx = orm.transaction();
/// tx.commit_entity(&mut department);
/// tx.remove_entity(&mut old_person);
/// tx.commit().await?;
/// ```
pub struct Transaction<'a> {
    orm: &'a Orm,
    options: CommitOptions,
    staged: Vec<Staged<'a>>,
}

impl<'a> Transaction<'a> {
    pub(crate) const fn new(orm: &'a Orm, options: CommitOptions) -> Self {
        Self {
            orm,
            options,
            staged: Vec::new(),
        }
    }

    /// Stages an insert or update of `entity`.
    pub fn commit_entity(&mut self, entity: &'a mut dyn Persistable) {
        self.staged.push(Staged::Commit(entity));
    }

    /// Stages the deletion of `entity`.
    pub fn remove_entity(&mut self, entity: &'a mut dyn Persistable) {
        self.staged.push(Staged::Remove(entity));
    }

    /// True if an entity of type `E` with primary key `id` is staged.
    pub fn contains<E: Entity>(&self, id: i64) -> bool {
        let name = E::entity_schema().entity;
        self.staged
            .iter()
            .map(Staged::entity)
            .any(|e| e.entity_name() == name && e.id() == Some(id))
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub const fn options(&self) -> &CommitOptions {
        &self.options
    }

    /// Applies every staged write in one store transaction, then runs the
    /// post-write hooks and publishes events.
    pub async fn commit(self) -> Result<(), OrmError> {
        let Self {
            orm,
            options,
            mut staged,
        } = self;

        if staged.is_empty() {
            return Ok(());
        }

        let mut schemas = Vec::new();
        for item in &staged {
            collect_schemas(item.entity(), &options, &mut schemas);
        }
        for schema in schemas {
            orm.ensure_schema(schema).await?;
        }

        let snapshots: Vec<IdSnapshot> = staged
            .iter()
            .map(|item| IdSnapshot::capture(item.entity()))
            .collect();

        let mut applied = Vec::new();
        let outcome = match orm.store().begin().await {
            Ok(mut tx) => match apply_all(tx.as_mut(), &mut staged, &options, &mut applied).await {
                Ok(()) => tx.commit().await,
                Err(e) => {
                    if let Err(rollback_error) = tx.rollback().await {
                        tracing::warn!(error = %rollback_error, "rollback failed");
                    }
                    Err(e)
                }
            },
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            for (snapshot, item) in snapshots.iter().zip(staged.iter_mut()) {
                match item {
                    Staged::Commit(entity) | Staged::Remove(entity) => snapshot.restore(&mut **entity),
                }
            }
            if !options.raise_errors && e.is_storage() {
                tracing::warn!(error = %e, "transaction rolled back, error suppressed by commit options");
                return Ok(());
            }
            tracing::debug!(error = %e, "transaction rolled back");
            return Err(e);
        }

        for write in applied {
            if let Some(entity) = entity_at_path(&mut staged, &write.path) {
                if write.kind == EventKind::INSERT {
                    entity.did_insert();
                } else if write.kind == EventKind::UPDATE {
                    entity.did_update();
                } else {
                    entity.did_delete();
                }
            }
            if options.trigger_events && write.raises_events {
                orm.events().publish(&EntityEvent {
                    kind: write.kind,
                    entity: write.entity.to_string(),
                    id: write.id,
                    changed_properties: write.changed,
                });
            }
        }
        Ok(())
    }
}

fn collect_schemas(
    entity: &dyn Persistable,
    options: &CommitOptions,
    out: &mut Vec<&'static EntitySchema>,
) {
    if options.ignores(entity.entity_name()) {
        return;
    }
    let schema = entity.schema();
    if !out.iter().any(|s| s.entity == schema.entity) {
        out.push(schema);
    }
    if options.commit_child_objects {
        for child in entity.children() {
            collect_schemas(child, options, out);
        }
    }
}

fn entity_at_path<'s>(
    staged: &'s mut [Staged<'_>],
    path: &[usize],
) -> Option<&'s mut dyn Persistable> {
    let (first, rest) = path.split_first()?;
    let mut current: &'s mut dyn Persistable = match staged.get_mut(*first)? {
        Staged::Commit(entity) | Staged::Remove(entity) => &mut **entity,
    };
    for index in rest {
        current = current.children_mut().into_iter().nth(*index)?;
    }
    Some(current)
}

async fn apply_all(
    tx: &mut dyn StoreTransaction,
    staged: &mut [Staged<'_>],
    options: &CommitOptions,
    applied: &mut Vec<Applied>,
) -> Result<(), OrmError> {
    for (index, item) in staged.iter_mut().enumerate() {
        match item {
            Staged::Commit(entity) => {
                persist(tx, &mut **entity, vec![index], options, applied).await?;
            }
            Staged::Remove(entity) => {
                delete(tx, &mut **entity, vec![index], options, applied).await?;
            }
        }
    }
    Ok(())
}

/// Writes `entity`, children first, recording what was done.
fn persist<'e>(
    tx: &'e mut dyn StoreTransaction,
    entity: &'e mut dyn Persistable,
    path: Vec<usize>,
    options: &'e CommitOptions,
    applied: &'e mut Vec<Applied>,
) -> BoxFuture<'e, Result<(), OrmError>> {
    Box::pin(async move {
        if options.ignores(entity.entity_name()) {
            return Ok(());
        }

        if options.commit_child_objects {
            for (position, child) in entity.children_mut().into_iter().enumerate() {
                let mut child_path = path.clone();
                child_path.push(position);
                persist(&mut *tx, child, child_path, options, &mut *applied).await?;
            }
        }

        let schema = entity.schema();
        let stored = match entity.id() {
            Some(id) => tx.find(schema, id).await?,
            None => None,
        };

        match (entity.id(), stored) {
            (Some(id), Some(stored)) => {
                if !entity.will_update() {
                    return Err(OrmError::Vetoed {
                        entity: schema.entity,
                        operation: "update",
                    });
                }
                let record = entity.to_record();
                let changed = changed_columns(&stored, &record);
                if changed.is_empty() {
                    tracing::trace!(entity = schema.entity, id, "no changes to write");
                    return Ok(());
                }
                tx.update(schema, id, &record).await?;
                applied.push(Applied {
                    path,
                    kind: EventKind::UPDATE,
                    entity: schema.entity,
                    id,
                    changed,
                    raises_events: entity.raises_events(),
                });
            }
            (preset, _) => {
                if !entity.will_insert() {
                    return Err(OrmError::Vetoed {
                        entity: schema.entity,
                        operation: "insert",
                    });
                }
                let mut record = entity.to_record();
                let changed: Vec<String> = record.columns().map(str::to_string).collect();
                if let Some(id) = preset {
                    record.set(PRIMARY_KEY_COLUMN, id);
                }
                let id = tx.insert(schema, &record).await?;
                entity.set_id(Some(id));
                applied.push(Applied {
                    path,
                    kind: EventKind::INSERT,
                    entity: schema.entity,
                    id,
                    changed,
                    raises_events: entity.raises_events(),
                });
            }
        }
        Ok(())
    })
}

async fn delete(
    tx: &mut dyn StoreTransaction,
    entity: &mut dyn Persistable,
    path: Vec<usize>,
    options: &CommitOptions,
    applied: &mut Vec<Applied>,
) -> Result<(), OrmError> {
    let schema = entity.schema();
    if options.ignores(schema.entity) {
        return Ok(());
    }
    let id = entity.id().ok_or(OrmError::NotPersisted(schema.entity))?;
    if !entity.will_delete() {
        return Err(OrmError::Vetoed {
            entity: schema.entity,
            operation: "delete",
        });
    }
    if tx.delete(schema, id).await? == 0 {
        return Err(OrmError::NotFound(format!("{} with Id {id}", schema.entity)));
    }
    entity.set_id(None);
    applied.push(Applied {
        path,
        kind: EventKind::DELETE,
        entity: schema.entity,
        id,
        changed: Vec::new(),
        raises_events: entity.raises_events(),
    });
    Ok(())
}

/// Columns of `record` whose value differs from the stored row.
fn changed_columns(stored: &Record, record: &Record) -> Vec<String> {
    record
        .iter()
        .filter(|(column, value)| {
            stored
                .get(column)
                .is_none_or(|previous| !value.matches_stored(previous))
        })
        .map(|(column, _)| column.to_string())
        .collect()
}
