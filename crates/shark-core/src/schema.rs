//! Static table descriptions for persistable entities.
//!
//! Each entity type owns one `EntitySchema`, normally held in a `static`.
//! Only the fields listed here are stored; anything else on the struct is
//! transient.

use crate::error::OrmError;
use crate::value::Value;

/// Name of the integer primary key column present on every table.
pub const PRIMARY_KEY_COLUMN: &str = "Id";

/// Order applied when a query does not specify one.
pub const DEFAULT_ORDER: &str = "Id ASC";

/// Row limit applied when a query does not specify one.
pub const DEFAULT_LIMIT: u32 = 9_999_999;

pub const DEFAULT_OFFSET: u32 = 0;

/// Storage class of a persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Bool,
    Date,
    Blob,
    /// Reference to another entity, stored as that entity's `Id`.
    Entity(&'static str),
}

/// Column default, restricted to values that can live in a `static`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Null,
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(&'static str),
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer(v) => Value::Integer(v),
            Self::Real(v) => Value::Real(v),
            Self::Bool(v) => Value::Bool(v),
            Self::Text(v) => Value::Text(v.to_string()),
        }
    }
}

/// A single persisted field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDef {
    /// Column name, which is also the property name used in queries.
    pub name: &'static str,
    pub column_type: ColumnType,
    /// Column default applied by the database when no value is written.
    pub default: Option<DefaultValue>,
    pub unique: bool,
}

impl FieldDef {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            default: None,
            unique: false,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub const fn real(name: &'static str) -> Self {
        Self::new(name, ColumnType::Real)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnType::Bool)
    }

    pub const fn date(name: &'static str) -> Self {
        Self::new(name, ColumnType::Date)
    }

    pub const fn blob(name: &'static str) -> Self {
        Self::new(name, ColumnType::Blob)
    }

    pub const fn entity(name: &'static str, target: &'static str) -> Self {
        Self::new(name, ColumnType::Entity(target))
    }

    #[must_use]
    pub const fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Sort order of an indexed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexSortOrder {
    #[default]
    Ascending = 1,
    Descending = 2,
    NoCase = 3,
}

impl IndexSortOrder {
    /// Column suffix used in `CREATE INDEX`.
    pub const fn sql_suffix(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
            Self::NoCase => "COLLATE NOCASE",
        }
    }
}

/// An index over one property, optionally with a secondary property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDefinition {
    pub property: &'static str,
    pub order: IndexSortOrder,
    pub secondary: Option<(&'static str, IndexSortOrder)>,
}

impl IndexDefinition {
    pub const fn new(property: &'static str, order: IndexSortOrder) -> Self {
        Self {
            property,
            order,
            secondary: None,
        }
    }

    pub const fn composite(
        property: &'static str,
        order: IndexSortOrder,
        secondary: &'static str,
        secondary_order: IndexSortOrder,
    ) -> Self {
        Self {
            property,
            order,
            secondary: Some((secondary, secondary_order)),
        }
    }

    /// Index name, unique per table and property combination.
    pub fn name(&self, entity: &str) -> String {
        match self.secondary {
            Some((secondary, _)) => format!("idx_{entity}_{}_{secondary}", self.property),
            None => format!("idx_{entity}_{}", self.property),
        }
    }
}

/// Table description of one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    /// Entity name, used verbatim as the table name.
    pub entity: &'static str,
    /// Persisted fields, excluding the primary key.
    pub fields: &'static [FieldDef],
    pub indexes: &'static [IndexDefinition],
}

impl EntitySchema {
    pub const fn new(entity: &'static str, fields: &'static [FieldDef]) -> Self {
        Self {
            entity,
            fields,
            indexes: &[],
        }
    }

    #[must_use]
    pub const fn with_indexes(mut self, indexes: &'static [IndexDefinition]) -> Self {
        self.indexes = indexes;
        self
    }

    pub fn property(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True for declared fields and the primary key.
    pub fn has_property(&self, name: &str) -> bool {
        name == PRIMARY_KEY_COLUMN || self.property(name).is_some()
    }

    /// All column names, primary key first.
    pub fn column_names(&self) -> Vec<&'static str> {
        std::iter::once(PRIMARY_KEY_COLUMN)
            .chain(self.fields.iter().map(|f| f.name))
            .collect()
    }

    /// Returns the canonical property name or `UnknownProperty`.
    pub fn validate_property(&self, name: &str) -> Result<&'static str, OrmError> {
        if name == PRIMARY_KEY_COLUMN {
            return Ok(PRIMARY_KEY_COLUMN);
        }
        self.property(name)
            .map(|f| f.name)
            .ok_or_else(|| OrmError::unknown_property(self.entity, name))
    }

    /// Fields that reference other entities.
    pub fn relationships(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.fields.iter().filter_map(|f| match f.column_type {
            ColumnType::Entity(target) => Some((f.name, target)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static FIELDS: &[FieldDef] = &[
        FieldDef::text("Name").unique(),
        FieldDef::integer("age"),
        FieldDef::boolean("isdeleted").with_default(DefaultValue::Bool(false)),
        FieldDef::entity("department", "Department"),
    ];

    static INDEXES: &[IndexDefinition] = &[
        IndexDefinition::new("Name", IndexSortOrder::NoCase),
        IndexDefinition::composite(
            "age",
            IndexSortOrder::Descending,
            "Name",
            IndexSortOrder::Ascending,
        ),
    ];

    static SCHEMA: EntitySchema = EntitySchema::new("Person", FIELDS).with_indexes(INDEXES);

    #[test]
    fn test_column_names_start_with_primary_key() {
        assert_eq!(
            SCHEMA.column_names(),
            vec!["Id", "Name", "age", "isdeleted", "department"]
        );
    }

    #[test]
    fn test_validate_property() {
        assert_eq!(SCHEMA.validate_property("Id").unwrap(), "Id");
        assert_eq!(SCHEMA.validate_property("age").unwrap(), "age");
        assert!(matches!(
            SCHEMA.validate_property("age; DROP TABLE Person"),
            Err(OrmError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_index_names() {
        assert_eq!(INDEXES[0].name("Person"), "idx_Person_Name");
        assert_eq!(INDEXES[1].name("Person"), "idx_Person_age_Name");
    }

    #[test]
    fn test_relationships() {
        let rels: Vec<_> = SCHEMA.relationships().collect();
        assert_eq!(rels, vec![("department", "Department")]);
    }

    #[test]
    fn test_field_flags() {
        assert!(SCHEMA.property("Name").unwrap().unique);
        assert_eq!(
            SCHEMA.property("isdeleted").unwrap().default,
            Some(DefaultValue::Bool(false))
        );
        assert_eq!(DefaultValue::Bool(false).to_value(), Value::Bool(false));
    }
}
