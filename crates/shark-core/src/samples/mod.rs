//! Sample entities shared by the test suites of every crate.
//!
//! Compiled for tests and with the `test-utils` feature.

mod department;
mod person;
pub mod test_class;

pub use department::Department;
pub use person::{Person, SmallPerson};
pub use test_class::TestClass;

use crate::schema::EntitySchema;

/// Schemas of every sample entity, for `Orm::setup_tables`.
pub fn all_schemas() -> [&'static EntitySchema; 5] {
    use crate::entity::Entity;
    [
        Department::entity_schema(),
        Person::entity_schema(),
        SmallPerson::entity_schema(),
        TestClass::entity_schema(),
        test_class::PrivateTestClass::entity_schema(),
    ]
}
