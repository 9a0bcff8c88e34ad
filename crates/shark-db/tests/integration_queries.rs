//! Fluent queries against a seeded database.

mod common;

use common::seeded_db;
use shark_core::samples::{Department, Person, TestClass};
use shark_core::{OrmError, Value, make_like_parameter};

fn names(people: &[Person]) -> Vec<&str> {
    people.iter().filter_map(|p| p.name.as_deref()).collect()
}

#[tokio::test]
async fn test_fetch_defaults_to_primary_key_order() {
    let db = seeded_db().await;
    let people = db.orm().query::<Person>().fetch().await.unwrap();

    assert_eq!(names(&people), vec!["Adrian", "Neil", "Michael", "Sarah"]);
    let ids: Vec<i64> = people.iter().filter_map(|p| p.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_where_with_parameters_and_order() {
    let db = seeded_db().await;
    let people = db
        .orm()
        .query::<Person>()
        .where_with_params("age > ?", vec![Value::Integer(30)])
        .order_by("Name")
        .fetch()
        .await
        .unwrap();

    assert_eq!(names(&people), vec!["Adrian", "Neil"]);
}

#[tokio::test]
async fn test_descending_order_limit_and_offset() {
    let db = seeded_db().await;
    let people = db
        .orm()
        .query::<Person>()
        .order_by_descending("age")
        .limit(2)
        .offset(1)
        .fetch()
        .await
        .unwrap();

    assert_eq!(names(&people), vec!["Neil", "Michael"]);
}

#[tokio::test]
async fn test_like_parameter() {
    let db = seeded_db().await;
    let people = db
        .orm()
        .query::<Person>()
        .where_with_params("Name LIKE ?", vec![make_like_parameter("ich").into()])
        .fetch()
        .await
        .unwrap();

    assert_eq!(names(&people), vec!["Michael"]);
}

#[tokio::test]
async fn test_first_and_no_match() {
    let db = seeded_db().await;
    let orm = db.orm();

    let youngest = orm
        .query::<Person>()
        .order_by("age")
        .first()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(youngest.name.as_deref(), Some("Sarah"));

    let nobody = orm
        .query::<Person>()
        .where_with_params("age > ?", vec![Value::Integer(100)])
        .first()
        .await
        .unwrap();
    assert!(nobody.is_none());
}

#[tokio::test]
async fn test_aggregates() {
    let db = seeded_db().await;
    let orm = db.orm();

    assert_eq!(orm.query::<Person>().count().await.unwrap(), 4);
    assert_eq!(
        orm.query::<Person>()
            .where_clause("department IS NULL")
            .count()
            .await
            .unwrap(),
        1
    );

    let total = orm.query::<Person>().sum_of("age").await.unwrap();
    assert!((total - 129.0).abs() < f64::EPSILON);

    let departments = orm.query::<Person>().distinct("department").await.unwrap();
    assert_eq!(departments.len(), 3);
    assert_eq!(departments[0], Value::Null);
}

#[tokio::test]
async fn test_group_by_keeps_first_seen_order() {
    let db = seeded_db().await;
    let groups = db.orm().query::<Person>().group_by("department").await.unwrap();

    let sizes: Vec<usize> = groups.iter().map(|(_, members)| members.len()).collect();
    assert_eq!(sizes, vec![2, 1, 1]);
    assert_eq!(groups[2].0, Value::Null);
    assert_eq!(names(&groups[0].1), vec!["Adrian", "Neil"]);
}

#[tokio::test]
async fn test_ids_and_lookup_helpers() {
    let db = seeded_db().await;
    let orm = db.orm();

    let ids = orm.query::<Person>().ids().await.unwrap();
    assert_eq!(ids.len(), 4);

    let neil: Person = orm.first_match_of("Name", "Neil").await.unwrap().unwrap();
    assert_eq!(neil.age, Some(34));

    let department = orm.resolve(neil.department.as_ref().unwrap()).await.unwrap();
    assert_eq!(
        department.and_then(|d: Department| d.name).as_deref(),
        Some("Sales")
    );

    let missing: Option<Person> = orm.object_with_primary_key(9_999).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_filter_by_department_id() {
    let db = seeded_db().await;
    let orm = db.orm();
    let sales: Department = orm.first_match_of("name", "Sales").await.unwrap().unwrap();

    let members = orm
        .query::<Person>()
        .where_with_params("department = ?", vec![Value::Integer(sales.id.unwrap())])
        .count()
        .await
        .unwrap();
    assert_eq!(members, 2);
}

#[tokio::test]
async fn test_invalid_queries_are_reported() {
    let db = seeded_db().await;
    let orm = db.orm();

    let err = orm
        .query::<Person>()
        .order_by("salary")
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::UnknownProperty { .. }));

    let err = orm
        .query::<Person>()
        .where_clause("age > ?")
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidQuery(_)));

    let err = orm.query::<Person>().where_clause("  ").count().await.unwrap_err();
    assert!(matches!(err, OrmError::InvalidQuery(_)));

    let err = orm.query::<Person>().sum_of("height").await.unwrap_err();
    assert!(matches!(err, OrmError::UnknownProperty { .. }));

    let err = orm
        .query::<Person>()
        .where_with_params("age > ?1", vec![Value::Integer(30)])
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidQuery(_)));
}

#[tokio::test]
async fn test_join_exposes_joined_columns() {
    let db = seeded_db().await;
    let orm = db.orm();

    let sales = orm
        .query::<Person>()
        .join_to::<Department>("department", "Id")
        .where_with_params("Department.name = ?", vec![Value::from("Sales")])
        .order_by("age")
        .fetch()
        .await
        .unwrap();
    assert_eq!(names(&sales), vec!["Neil", "Adrian"]);
    for index in 0..sales.len() {
        let joined = sales.joined_results(index).unwrap();
        assert_eq!(joined.get("Department.name"), Some(&Value::Text("Sales".into())));
        assert_eq!(
            joined.get("Department.Id").and_then(Value::as_i64),
            sales[index].department.as_ref().and_then(|d| d.id())
        );
    }

    let everyone = orm.query::<Person>().join::<Department>().fetch().await.unwrap();
    let departments: Vec<(Option<String>, Value)> = everyone
        .into_joined()
        .into_iter()
        .map(|(person, joined)| {
            (
                person.name,
                joined.get("Department.name").cloned().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        departments,
        vec![
            (Some("Adrian".into()), Value::Text("Sales".into())),
            (Some("Neil".into()), Value::Text("Sales".into())),
            (Some("Michael".into()), Value::Text("Finance".into())),
            (Some("Sarah".into()), Value::Null),
        ]
    );

    let in_sales = || {
        orm.query::<Person>()
            .join::<Department>()
            .where_with_params("Department.name = ?", vec![Value::from("Sales")])
    };
    assert_eq!(in_sales().count().await.unwrap(), 2);
    assert!((in_sales().sum_of("age").await.unwrap() - 72.0).abs() < f64::EPSILON);

    let plain = orm.query::<Person>().fetch().await.unwrap();
    assert!(plain.joined_results(0).is_none());
}

#[tokio::test]
async fn test_invalid_joins_are_reported() {
    let db = seeded_db().await;
    let orm = db.orm();

    let err = orm
        .query::<Person>()
        .join_to::<Department>("salary", "Id")
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::UnknownProperty { .. }));

    let err = orm.query::<Department>().join::<TestClass>().fetch().await.unwrap_err();
    assert!(matches!(err, OrmError::InvalidQuery(_)));

    let err = orm
        .query::<Person>()
        .join::<Department>()
        .join_to::<Department>("department", "Id")
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidQuery(_)));
}

#[tokio::test]
async fn test_remove_all_in_one_transaction() {
    let db = seeded_db().await;
    let orm = db.orm();

    let mut over_thirty = orm
        .query::<Person>()
        .where_with_params("age > ?", vec![Value::Integer(30)])
        .fetch()
        .await
        .unwrap();
    over_thirty.remove_all(orm).await.unwrap();

    assert!(over_thirty.iter().all(|p| p.id.is_none()));
    assert_eq!(orm.query::<Person>().count().await.unwrap(), 2);
}
