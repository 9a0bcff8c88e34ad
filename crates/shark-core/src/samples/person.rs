//! `Person` and its extension `SmallPerson`.
//!
//! `SmallPerson` embeds a `Person` and stores every inherited column in its
//! own table next to `height`.

use crate::entity::{Entity, Persistable, Related};
use crate::error::OrmError;
use crate::record::Record;
use crate::schema::{EntitySchema, FieldDef, IndexDefinition, IndexSortOrder};

use super::Department;

static PERSON_FIELDS: &[FieldDef] = &[
    FieldDef::text("Name"),
    FieldDef::integer("age"),
    FieldDef::entity("department", "Department"),
];
static PERSON_INDEXES: &[IndexDefinition] = &[IndexDefinition::new("Name", IndexSortOrder::NoCase)];
static PERSON_SCHEMA: EntitySchema =
    EntitySchema::new("Person", PERSON_FIELDS).with_indexes(PERSON_INDEXES);

static SMALL_PERSON_FIELDS: &[FieldDef] = &[
    FieldDef::text("Name"),
    FieldDef::integer("age"),
    FieldDef::entity("department", "Department"),
    FieldDef::real("height"),
];
static SMALL_PERSON_SCHEMA: EntitySchema = EntitySchema::new("SmallPerson", SMALL_PERSON_FIELDS);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub department: Option<Related<Department>>,
}

impl Person {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            name: Some(name.to_string()),
            age: Some(age),
            ..Self::default()
        }
    }

    /// Record of the person columns, shared with `SmallPerson`.
    fn columns(&self) -> Record {
        Record::new()
            .with("Name", self.name.clone())
            .with("age", self.age)
            .with("department", Related::to_value(self.department.as_ref()))
    }

    fn read_columns(record: &Record) -> Result<Self, OrmError> {
        Ok(Self {
            id: record.id()?,
            name: record.text("Name")?,
            age: record.integer("age")?,
            department: Related::from_column(record, "department")?,
        })
    }
}

impl Persistable for Person {
    fn schema(&self) -> &'static EntitySchema {
        &PERSON_SCHEMA
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn to_record(&self) -> Record {
        self.columns()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Persistable> {
        Related::as_child_mut(self.department.as_mut())
            .into_iter()
            .collect()
    }

    fn children(&self) -> Vec<&dyn Persistable> {
        Related::as_child(self.department.as_ref())
            .into_iter()
            .collect()
    }
}

impl Entity for Person {
    fn entity_schema() -> &'static EntitySchema {
        &PERSON_SCHEMA
    }

    fn from_record(record: &Record) -> Result<Self, OrmError> {
        Self::read_columns(record)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmallPerson {
    pub person: Person,
    pub height: Option<f64>,
}

impl Persistable for SmallPerson {
    fn schema(&self) -> &'static EntitySchema {
        &SMALL_PERSON_SCHEMA
    }

    fn id(&self) -> Option<i64> {
        self.person.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.person.id = id;
    }

    fn to_record(&self) -> Record {
        self.person.columns().with("height", self.height)
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Persistable> {
        self.person.children_mut()
    }

    fn children(&self) -> Vec<&dyn Persistable> {
        self.person.children()
    }
}

impl Entity for SmallPerson {
    fn entity_schema() -> &'static EntitySchema {
        &SMALL_PERSON_SCHEMA
    }

    fn from_record(record: &Record) -> Result<Self, OrmError> {
        Ok(Self {
            person: Person::read_columns(record)?,
            height: record.real("height")?,
        })
    }
}
