//! The contract between user records and the ORM.
//!
//! There is no runtime reflection: a persistable type states its table
//! through [`Persistable::schema`] and converts itself to and from a
//! [`Record`]. Fields left out of `to_record` are never stored.

use crate::error::OrmError;
use crate::record::Record;
use crate::schema::EntitySchema;
use crate::value::Value;

/// Object-safe half of the entity contract.
///
/// The ORM drives commits through `&mut dyn Persistable`, which lets a
/// transaction stage entities of different types together.
pub trait Persistable: Send {
    fn schema(&self) -> &'static EntitySchema;

    /// Primary key, `None` until the entity has been inserted.
    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: Option<i64>);

    /// Declared fields as a row, without the primary key.
    fn to_record(&self) -> Record;

    /// Loaded related entities, committed before this one when
    /// child commits are enabled.
    fn children_mut(&mut self) -> Vec<&mut dyn Persistable> {
        Vec::new()
    }

    /// Read-only view of the loaded related entities.
    fn children(&self) -> Vec<&dyn Persistable> {
        Vec::new()
    }

    /// Returning `false` vetoes the insert.
    fn will_insert(&mut self) -> bool {
        true
    }

    /// Returning `false` vetoes the update.
    fn will_update(&mut self) -> bool {
        true
    }

    /// Returning `false` vetoes the delete.
    fn will_delete(&mut self) -> bool {
        true
    }

    fn did_insert(&mut self) {}

    fn did_update(&mut self) {}

    fn did_delete(&mut self) {}

    /// Whether insert/update/delete notifications are published for this type.
    fn raises_events(&self) -> bool {
        true
    }

    fn entity_name(&self) -> &'static str {
        self.schema().entity
    }
}

/// A persistable record type that can be rebuilt from a stored row.
pub trait Entity: Persistable + Default + Sized + 'static {
    /// Schema of the type, available without an instance.
    fn entity_schema() -> &'static EntitySchema;

    /// Builds an instance from a stored row, including its primary key.
    fn from_record(record: &Record) -> Result<Self, OrmError>;
}

/// Association to another entity.
///
/// Stored as the target's primary key. The target is either only known by
/// id (as after a fetch) or held in memory, in which case it can be
/// committed along with its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum Related<E> {
    Unresolved(i64),
    Loaded(Box<E>),
}

impl<E: Entity> Related<E> {
    pub fn loaded(entity: E) -> Self {
        Self::Loaded(Box::new(entity))
    }

    /// Primary key of the target, `None` for a loaded entity not yet committed.
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Unresolved(id) => Some(*id),
            Self::Loaded(entity) => entity.id(),
        }
    }

    pub fn get(&self) -> Option<&E> {
        match self {
            Self::Loaded(entity) => Some(entity),
            Self::Unresolved(_) => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut E> {
        match self {
            Self::Loaded(entity) => Some(entity),
            Self::Unresolved(_) => None,
        }
    }

    /// Column value for an optional association.
    pub fn to_value(related: Option<&Self>) -> Value {
        related.and_then(Self::id).map_or(Value::Null, Value::Integer)
    }

    /// Reads an association column back as an unresolved reference.
    pub fn from_column(record: &Record, column: &str) -> Result<Option<Self>, OrmError> {
        Ok(record.integer(column)?.map(Self::Unresolved))
    }

    /// The loaded target as a child for cascading commits.
    pub fn as_child_mut(related: Option<&mut Self>) -> Option<&mut dyn Persistable> {
        match related {
            Some(Self::Loaded(entity)) => Some(entity.as_mut() as &mut dyn Persistable),
            _ => None,
        }
    }

    pub fn as_child(related: Option<&Self>) -> Option<&dyn Persistable> {
        match related {
            Some(Self::Loaded(entity)) => Some(entity.as_ref() as &dyn Persistable),
            _ => None,
        }
    }
}
