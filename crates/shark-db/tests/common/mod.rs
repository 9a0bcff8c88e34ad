//! Common test utilities.
//!
//! Provides seeded databases built from the sample entities.

#![allow(dead_code)]

use shark_core::samples::{self, Department, Person};
use shark_core::{Orm, Related};
use shark_db::TestDb;

/// Ages of the seeded people, by name.
pub const PEOPLE: [(&str, i64); 4] = [("Adrian", 38), ("Neil", 34), ("Michael", 30), ("Sarah", 27)];

/// Commits two departments and four people: Adrian and Neil in Sales,
/// Michael in Finance, Sarah without a department.
pub async fn seed(orm: &Orm) -> (Department, Department) {
    let mut sales = Department::named("Sales");
    let mut finance = Department::named("Finance");
    orm.commit(&mut sales).await.unwrap();
    orm.commit(&mut finance).await.unwrap();

    for (name, age) in PEOPLE {
        let mut person = Person::new(name, age);
        person.department = match name {
            "Adrian" | "Neil" => sales.id.map(Related::Unresolved),
            "Michael" => finance.id.map(Related::Unresolved),
            _ => None,
        };
        orm.commit(&mut person).await.unwrap();
    }
    (sales, finance)
}

pub async fn seeded_db() -> TestDb {
    let db = TestDb::new().await.unwrap();
    seed(db.orm()).await;
    db
}

/// An empty database with every sample table already created.
pub async fn sample_tables_db() -> TestDb {
    let db = TestDb::new().await.unwrap();
    db.orm().setup_tables(&samples::all_schemas()).await.unwrap();
    db
}
