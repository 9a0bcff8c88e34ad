//! Error types shared by every layer of the ORM.
//!
//! `OrmError` abstracts away storage implementation details (e.g., sqlx
//! errors) so that callers only ever match on domain-level failures.

use thiserror::Error;

/// Domain-specific errors for persistence operations.
#[derive(Debug, Error)]
pub enum OrmError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation needs a primary key but the entity has never been committed.
    #[error("Entity '{0}' has not been persisted")]
    NotPersisted(&'static str),

    /// A lifecycle hook declined the operation.
    #[error("{operation} of '{entity}' was vetoed by the entity")]
    Vetoed {
        entity: &'static str,
        operation: &'static str,
    },

    /// A property name that the entity schema does not declare.
    #[error("Unknown property '{property}' on entity '{entity}'")]
    UnknownProperty {
        entity: &'static str,
        property: String,
    },

    /// The query could not be built (bad placeholders, empty clause, ...).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A stored value could not be read as the requested type.
    #[error("Type mismatch for column '{column}': expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
    },

    /// A constraint was violated (e.g., unique constraint).
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Settings or environment could not be resolved.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl OrmError {
    /// Shorthand for an unknown property on `entity`.
    pub fn unknown_property(entity: &'static str, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            entity,
            property: property.into(),
        }
    }

    /// Returns true for failures raised by the storage backend rather than by
    /// entity or query validation.
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Constraint(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = OrmError::unknown_property("Person", "shoeSize");
        assert_eq!(
            err.to_string(),
            "Unknown property 'shoeSize' on entity 'Person'"
        );

        let err = OrmError::Vetoed {
            entity: "Department",
            operation: "delete",
        };
        assert_eq!(
            err.to_string(),
            "delete of 'Department' was vetoed by the entity"
        );
    }

    #[test]
    fn test_is_storage() {
        assert!(OrmError::Storage("disk I/O".into()).is_storage());
        assert!(OrmError::Constraint("UNIQUE".into()).is_storage());
        assert!(!OrmError::NotPersisted("Person").is_storage());
    }
}
