//! File-backed databases, date encodings and raw statements.

mod common;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use shark_core::samples::Department;
use shark_core::{
    Entity, EntitySchema, EventKind, FieldDef, OrmError, Persistable, Record, Settings, Value,
};
use shark_db::{DateEncoding, Shark, TestDb};

static MEETING_FIELDS: &[FieldDef] = &[FieldDef::text("title"), FieldDef::date("at")];
static MEETING_SCHEMA: EntitySchema = EntitySchema::new("Meeting", MEETING_FIELDS);

#[derive(Debug, Clone, Default, PartialEq)]
struct Meeting {
    id: Option<i64>,
    title: Option<String>,
    at: Option<DateTime<Utc>>,
}

impl Persistable for Meeting {
    fn schema(&self) -> &'static EntitySchema {
        &MEETING_SCHEMA
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("title", self.title.clone())
            .with("at", self.at)
    }
}

impl Entity for Meeting {
    fn entity_schema() -> &'static EntitySchema {
        &MEETING_SCHEMA
    }

    fn from_record(record: &Record) -> Result<Self, OrmError> {
        Ok(Self {
            id: record.id()?,
            title: record.text("title")?,
            at: record.date("at")?,
        })
    }
}

fn planning() -> Meeting {
    Meeting {
        id: None,
        title: Some("Planning".into()),
        at: Some(Utc.with_ymd_and_hms(2016, 5, 4, 9, 0, 0).unwrap()),
    }
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        database_location: Some(dir.path().to_path_buf()),
        ..Settings::with_defaults()
    };

    let shark = Shark::open(&settings).await.unwrap();
    let mut department = Department::named("Sales");
    shark.commit(&mut department).await.unwrap();
    shark.close().await;

    assert!(dir.path().join("database.db").exists());

    let shark = Shark::open(&settings).await.unwrap();
    let stored: Option<Department> = shark
        .object_with_primary_key(department.id.unwrap())
        .await
        .unwrap();
    assert_eq!(stored, Some(department));
}

#[tokio::test]
async fn test_dates_as_text() {
    let db = TestDb::new().await.unwrap();
    let mut meeting = planning();
    db.orm().commit(&mut meeting).await.unwrap();

    let raw = db.orm().raw_query("SELECT at FROM Meeting").await.unwrap();
    assert_eq!(
        raw.value_for_column("at", 0),
        Some(&Value::Text("2016-05-04T09:00:00+00:00".into()))
    );

    let stored: Meeting = db.orm().query().first().await.unwrap().unwrap();
    assert_eq!(stored, meeting);
}

#[tokio::test]
async fn test_dates_as_epoch_seconds() {
    let db = TestDb::with_dates(DateEncoding::EpochSeconds).await.unwrap();
    let mut meeting = planning();
    db.orm().commit(&mut meeting).await.unwrap();

    let raw = db.orm().raw_query("SELECT at FROM Meeting").await.unwrap();
    assert_eq!(
        raw.value_for_column("at", 0),
        Some(&Value::Real(1_462_352_400.0))
    );

    let stored: Meeting = db.orm().query().first().await.unwrap().unwrap();
    assert_eq!(stored.at, meeting.at);
}

#[tokio::test]
async fn test_epoch_dates_before_1970_round_trip() {
    let db = TestDb::with_dates(DateEncoding::EpochSeconds).await.unwrap();
    let orm = db.orm();
    let landing = Utc.with_ymd_and_hms(1969, 7, 20, 20, 17, 40).unwrap() + Duration::milliseconds(500);
    let mut meeting = Meeting {
        id: None,
        title: Some("Landing".into()),
        at: Some(landing),
    };
    orm.commit(&mut meeting).await.unwrap();

    let stored: Meeting = orm.query().first().await.unwrap().unwrap();
    assert_eq!(stored.at, Some(landing));

    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    orm.events().register(EventKind::UPDATE, Some("Meeting"), move |event| {
        sink.lock().unwrap().push(event.changed_properties.clone());
    });

    meeting.title = Some("Moon landing".into());
    orm.commit(&mut meeting).await.unwrap();
    assert_eq!(*updates.lock().unwrap(), vec![vec!["title".to_string()]]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        database_location: Some(dir.path().to_path_buf()),
        ..Settings::with_defaults()
    };
    let shark = Arc::new(Shark::open(&settings).await.unwrap());
    shark
        .setup_tables(&[Department::entity_schema()])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for team in 0..8 {
        let shark = Arc::clone(&shark);
        handles.push(tokio::spawn(async move {
            let mut department = Department::named(&format!("Team {team}"));
            shark.commit(&mut department).await?;
            for round in 0..25 {
                department.name = Some(format!("Team {team} rev {round}"));
                shark.commit(&mut department).await?;
            }
            Ok::<_, OrmError>(department)
        }));
    }

    for handle in handles {
        let department = handle.await.unwrap().unwrap();
        let stored: Department = shark
            .object_with_primary_key(department.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, department);
    }
    assert_eq!(shark.query::<Department>().count().await.unwrap(), 8);
}

#[tokio::test]
async fn test_raw_query_and_table_names() {
    let db = common::seeded_db().await;
    let orm = db.orm();

    let raw = orm
        .raw_query("SELECT Name, age FROM Person WHERE age < 31 ORDER BY age")
        .await
        .unwrap();
    assert_eq!(raw.column_count(), 2);
    assert_eq!(raw.column_name_for_index(0), Some("Name"));
    assert_eq!(raw.value_for_column("Name", 0), Some(&Value::Text("Sarah".into())));
    assert_eq!(raw.value_for_column("age", 1), Some(&Value::Integer(30)));

    assert_eq!(
        orm.table_names().await.unwrap(),
        vec!["Department", "Person"]
    );
}
