use crate::entity::{Entity, Persistable};
use crate::error::OrmError;
use crate::record::Record;
use crate::schema::{EntitySchema, FieldDef};

static FIELDS: &[FieldDef] = &[FieldDef::text("name")];
static SCHEMA: EntitySchema = EntitySchema::new("Department", FIELDS);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Department {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl Department {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: Some(name.to_string()),
        }
    }
}

impl Persistable for Department {
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
        Record::new().with("name", self.name.clone())
    }
}

impl Entity for Department {
    fn entity_schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn from_record(record: &Record) -> Result<Self, OrmError> {
        Ok(Self {
            id: record.id()?,
            name: record.text("name")?,
        })
    }
}
