//! Entity mixing persisted and in-memory-only fields.

use crate::entity::{Entity, Persistable};
use crate::error::OrmError;
use crate::record::Record;
use crate::schema::{DefaultValue, EntitySchema, FieldDef};

static FIELDS: &[FieldDef] = &[
    FieldDef::text("SwiftTestString"),
    FieldDef::real("SwiftTestNumber"),
    FieldDef::text("lowercaseField"),
    FieldDef::boolean("isdeleted").with_default(DefaultValue::Bool(false)),
];
static SCHEMA: EntitySchema = EntitySchema::new("TestClass", FIELDS);

static PRIVATE_FIELDS: &[FieldDef] = &[
    FieldDef::text("SwiftTestString"),
    FieldDef::real("SwiftTestNumber"),
];
static PRIVATE_SCHEMA: EntitySchema = EntitySchema::new("PrivateTestClass", PRIVATE_FIELDS);

/// Sample entity. `non_dynamic_variable` and `test_var` are never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestClass {
    pub id: Option<i64>,
    pub swift_test_string: Option<String>,
    pub swift_test_number: Option<f64>,
    pub lowercase_field: Option<String>,
    pub is_deleted: bool,
    pub non_dynamic_variable: Option<String>,
    pub test_var: Option<i64>,
}

impl TestClass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instance whose stored string and in-memory string both hold `value`.
    pub fn with_default_string(value: Option<&str>) -> Self {
        let value = value.map(str::to_string);
        Self {
            swift_test_string: value.clone(),
            non_dynamic_variable: value,
            ..Self::default()
        }
    }

    pub const fn test_thyself(&self) {}
}

impl Persistable for TestClass {
    fn schema(&self) -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("SwiftTestString", self.swift_test_string.clone())
            .with("SwiftTestNumber", self.swift_test_number)
            .with("lowercaseField", self.lowercase_field.clone())
            .with("isdeleted", self.is_deleted)
    }
}

impl Entity for TestClass {
    fn entity_schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn from_record(record: &Record) -> Result<Self, OrmError> {
        Ok(Self {
            id: record.id()?,
            swift_test_string: record.text("SwiftTestString")?,
            swift_test_number: record.real("SwiftTestNumber")?,
            lowercase_field: record.text("lowercaseField")?,
            is_deleted: record.boolean("isdeleted")?.unwrap_or(false),
            non_dynamic_variable: None,
            test_var: None,
        })
    }
}

/// Nested sample entity with only optional columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrivateTestClass {
    pub id: Option<i64>,
    pub swift_test_string: Option<String>,
    pub swift_test_number: Option<f64>,
}

impl PrivateTestClass {
    pub const fn test_thyself(&self) {}
}

impl Persistable for PrivateTestClass {
    fn schema(&self) -> &'static EntitySchema {
        &PRIVATE_SCHEMA
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("SwiftTestString", self.swift_test_string.clone())
            .with("SwiftTestNumber", self.swift_test_number)
    }
}

impl Entity for PrivateTestClass {
    fn entity_schema() -> &'static EntitySchema {
        &PRIVATE_SCHEMA
    }

    fn from_record(record: &Record) -> Result<Self, OrmError> {
        Ok(Self {
            id: record.id()?,
            swift_test_string: record.text("SwiftTestString")?,
            swift_test_number: record.real("SwiftTestNumber")?,
        })
    }
}
