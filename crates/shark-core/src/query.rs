//! Query description and the fluent builder on top of it.
//!
//! `QuerySpec` is the backend-agnostic description handed to a
//! `RecordStore`. Property names in it have already been checked against
//! the entity schema, so adapters may quote and embed them directly. The
//! where clause is a caller-supplied SQL fragment whose values travel as
//! `?` parameters.
//!
//! Joined tables are matched with a `LEFT JOIN`; their columns come back
//! keyed `Table.column` and can be named the same way in the where clause.

use std::marker::PhantomData;
use std::ops::Deref;

use crate::entity::Entity;
use crate::error::OrmError;
use crate::record::Record;
use crate::schema::{DEFAULT_LIMIT, DEFAULT_OFFSET, EntitySchema, PRIMARY_KEY_COLUMN};
use crate::services::Orm;
use crate::value::Value;

/// Sort direction of one order term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// A validated `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub property: &'static str,
    pub direction: Direction,
}

/// A validated `LEFT JOIN` of another entity's table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinSpec {
    pub schema: &'static EntitySchema,
    /// Property of the queried entity.
    pub left_property: &'static str,
    /// Property of the joined entity matched against `left_property`.
    pub target_property: &'static str,
}

/// Everything a store needs to select rows of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub schema: &'static EntitySchema,
    /// SQL condition with `?` placeholders, `None` for all rows.
    pub where_clause: Option<String>,
    pub parameters: Vec<Value>,
    /// Empty means the default `Id ASC` order.
    pub order: Vec<OrderTerm>,
    pub limit: u32,
    pub offset: u32,
    pub joins: Vec<JoinSpec>,
}

impl QuerySpec {
    pub const fn new(schema: &'static EntitySchema) -> Self {
        Self {
            schema,
            where_clause: None,
            parameters: Vec::new(),
            order: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
            joins: Vec::new(),
        }
    }

    /// Spec selecting the single row whose `property` equals `value`.
    pub fn matching(
        schema: &'static EntitySchema,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<Self, OrmError> {
        let property = schema.validate_property(property)?;
        let value = value.into();
        let mut spec = Self::new(schema);
        if value.is_null() {
            spec.where_clause = Some(format!("\"{property}\" IS NULL"));
        } else {
            spec.where_clause = Some(format!("\"{property}\" = ?"));
            spec.parameters.push(value);
        }
        spec.limit = 1;
        Ok(spec)
    }

    /// Every table the query reads: the entity's own, then joined ones.
    pub fn schemas(&self) -> impl Iterator<Item = &'static EntitySchema> + '_ {
        std::iter::once(self.schema).chain(self.joins.iter().map(|join| join.schema))
    }

    /// Checks that the where clause and its parameters line up.
    pub fn validate(&self) -> Result<(), OrmError> {
        let placeholders = self.where_clause.as_deref().map_or(0, count_placeholders);
        if placeholders != self.parameters.len() {
            return Err(OrmError::InvalidQuery(format!(
                "where clause has {placeholders} placeholder(s) but {} parameter(s) were supplied",
                self.parameters.len()
            )));
        }
        Ok(())
    }
}

/// Counts `?` placeholders outside of quoted literals and identifiers.
///
/// Only anonymous `?` placeholders are understood: numbered (`?1`) or named
/// (`:name`) parameters and SQL comments are rejected by
/// [`check_where_clause`].
pub fn count_placeholders(clause: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in clause.chars() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '?') => count += 1,
            _ => {}
        }
    }
    count
}

/// Rejects where clause syntax that `count_placeholders` cannot follow.
pub fn check_where_clause(clause: &str) -> Result<(), OrmError> {
    if clause.trim().is_empty() {
        return Err(OrmError::InvalidQuery("empty where clause".into()));
    }
    let mut quote: Option<char> = None;
    let mut chars = clause.chars().peekable();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '?') if chars.peek().is_some_and(char::is_ascii_digit) => {
                return Err(OrmError::InvalidQuery(
                    "numbered placeholders are not supported, use `?`".into(),
                ));
            }
            (None, ':' | '@' | '$') if chars.peek().is_some_and(|n| n.is_ascii_alphabetic()) => {
                return Err(OrmError::InvalidQuery(
                    "named parameters are not supported, use `?`".into(),
                ));
            }
            (None, '-') if chars.peek() == Some(&'-') => {
                return Err(OrmError::InvalidQuery("comments are not allowed in a where clause".into()));
            }
            (None, '/') if chars.peek() == Some(&'*') => {
                return Err(OrmError::InvalidQuery("comments are not allowed in a where clause".into()));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Wraps `param` for use as a `LIKE` parameter matching anywhere in a value.
pub fn make_like_parameter(param: &str) -> String {
    format!("%{param}%")
}

/// Fluent query over entity type `E`, obtained from [`Orm::query`].
///
/// Builder methods never fail; the first invalid input is remembered and
/// reported by the terminal operation.
pub struct Query<'a, E: Entity> {
    orm: &'a Orm,
    spec: QuerySpec,
    error: Option<OrmError>,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> Query<'a, E> {
    pub(crate) fn new(orm: &'a Orm) -> Self {
        Self {
            orm,
            spec: QuerySpec::new(E::entity_schema()),
            error: None,
            _entity: PhantomData,
        }
    }

    /// Restricts rows with a raw SQL condition.
    #[must_use]
    pub fn where_clause(self, clause: &str) -> Self {
        self.where_with_params(clause, Vec::new())
    }

    /// Restricts rows with a SQL condition whose `?` placeholders bind `params`.
    #[must_use]
    pub fn where_with_params(mut self, clause: &str, params: Vec<Value>) -> Self {
        if let Err(e) = check_where_clause(clause) {
            self.fail(e);
            return self;
        }
        self.spec.where_clause = Some(clause.to_string());
        self.spec.parameters = params;
        self
    }

    /// Left-joins the table of `J`, matching `left_property` of this entity
    /// against `target_property` of `J`.
    ///
    /// Joined columns are available from [`ResultSet::joined_results`] and
    /// can be referenced as `Table.column` in the where clause.
    #[must_use]
    pub fn join_to<J: Entity>(mut self, left_property: &str, target_property: &str) -> Self {
        let target = J::entity_schema();
        let join = self
            .spec
            .schema
            .validate_property(left_property)
            .and_then(|left| {
                Ok(JoinSpec {
                    schema: target,
                    left_property: left,
                    target_property: target.validate_property(target_property)?,
                })
            });
        match join {
            Ok(join) => self.push_join(join),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Left-joins the entity that one of this entity's association fields
    /// points at, on that field and the target's primary key.
    #[must_use]
    pub fn join<J: Entity>(self) -> Self {
        let target = J::entity_schema().entity;
        let field = self
            .spec
            .schema
            .relationships()
            .find(|(_, related)| *related == target)
            .map(|(field, _)| field);
        match field {
            Some(field) => self.join_to::<J>(field, PRIMARY_KEY_COLUMN),
            None => {
                let message = format!("{} has no association to {target}", self.spec.schema.entity);
                let mut query = self;
                query.fail(OrmError::InvalidQuery(message));
                query
            }
        }
    }

    #[must_use]
    pub fn order_by(self, property: &str) -> Self {
        self.push_order(property, Direction::Ascending)
    }

    #[must_use]
    pub fn order_by_descending(self, property: &str) -> Self {
        self.push_order(property, Direction::Descending)
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.spec.limit = limit;
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.spec.offset = offset;
        self
    }

    /// The `QuerySpec` as built so far.
    pub const fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Matching entities, with the joined columns of each row when the
    /// query has joins.
    pub async fn fetch(self) -> Result<ResultSet<E>, OrmError> {
        let (orm, spec) = self.finish()?;
        orm.ensure_query_tables(&spec).await?;
        ResultSet::from_records(&orm.store().fetch(&spec).await?)
    }

    /// The first matching entity.
    pub async fn first(self) -> Result<Option<E>, OrmError> {
        let results = self.limit(1).fetch().await?;
        Ok(results.into_vec().into_iter().next())
    }

    /// Number of matching rows (limit and offset are ignored).
    pub async fn count(self) -> Result<u64, OrmError> {
        let (orm, spec) = self.finish()?;
        orm.ensure_query_tables(&spec).await?;
        orm.store().count(&spec).await
    }

    pub async fn sum_of(self, property: &str) -> Result<f64, OrmError> {
        let (orm, spec) = self.finish()?;
        let column = spec.schema.validate_property(property)?;
        orm.ensure_query_tables(&spec).await?;
        orm.store().sum(&spec, column).await
    }

    pub async fn distinct(self, property: &str) -> Result<Vec<Value>, OrmError> {
        let (orm, spec) = self.finish()?;
        let column = spec.schema.validate_property(property)?;
        orm.ensure_query_tables(&spec).await?;
        orm.store().distinct(&spec, column).await
    }

    /// Matching entities grouped by the stored value of `property`, groups
    /// in order of first appearance.
    pub async fn group_by(self, property: &str) -> Result<Vec<(Value, Vec<E>)>, OrmError> {
        let (orm, spec) = self.finish()?;
        let column = spec.schema.validate_property(property)?;
        orm.ensure_query_tables(&spec).await?;

        let mut groups: Vec<(Value, Vec<E>)> = Vec::new();
        for record in orm.store().fetch(&spec).await? {
            let key = record.get(column).cloned().unwrap_or_default();
            let entity = E::from_record(&record)?;
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(entity),
                None => groups.push((key, vec![entity])),
            }
        }
        Ok(groups)
    }

    /// Primary keys of the matching rows.
    pub async fn ids(self) -> Result<Vec<i64>, OrmError> {
        let (orm, spec) = self.finish()?;
        orm.ensure_query_tables(&spec).await?;
        orm.store()
            .fetch(&spec)
            .await?
            .iter()
            .map(|record| {
                record
                    .id()?
                    .ok_or_else(|| OrmError::Storage("row without primary key".into()))
            })
            .collect()
    }

    fn push_order(mut self, property: &str, direction: Direction) -> Self {
        match self.spec.schema.validate_property(property) {
            Ok(property) => self.spec.order.push(OrderTerm {
                property,
                direction,
            }),
            Err(e) => self.fail(e),
        }
        self
    }

    fn push_join(&mut self, join: JoinSpec) {
        if self.spec.schemas().any(|schema| schema.entity == join.schema.entity) {
            self.fail(OrmError::InvalidQuery(format!(
                "{} is already part of the query",
                join.schema.entity
            )));
        } else {
            self.spec.joins.push(join);
        }
    }

    fn fail(&mut self, error: OrmError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn finish(self) -> Result<(&'a Orm, QuerySpec), OrmError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.spec.validate()?;
        Ok((self.orm, self.spec))
    }
}

/// Entities returned by a fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet<E> {
    items: Vec<E>,
    /// Joined columns per item, keyed `Table.column`; empty without joins.
    joined: Vec<Record>,
}

impl<E: Entity> ResultSet<E> {
    pub const fn new(items: Vec<E>) -> Self {
        Self {
            items,
            joined: Vec::new(),
        }
    }

    /// Builds entities from fetched rows, setting aside qualified
    /// `Table.column` values as joined results.
    pub fn from_records(records: &[Record]) -> Result<Self, OrmError> {
        let mut items = Vec::with_capacity(records.len());
        let mut joined = Vec::with_capacity(records.len());
        for record in records {
            let (own, other): (Vec<_>, Vec<_>) =
                record.iter().partition(|(column, _)| !column.contains('.'));
            let own: Record = own
                .into_iter()
                .map(|(column, value)| (column.to_string(), value.clone()))
                .collect();
            items.push(E::from_record(&own)?);
            joined.push(
                other
                    .into_iter()
                    .map(|(column, value)| (column.to_string(), value.clone()))
                    .collect(),
            );
        }
        if joined.iter().all(Record::is_empty) {
            joined.clear();
        }
        Ok(Self { items, joined })
    }

    /// Joined columns of the item at `index`, `None` when the query had no
    /// joins.
    pub fn joined_results(&self, index: usize) -> Option<&Record> {
        self.joined.get(index)
    }

    pub fn into_vec(self) -> Vec<E> {
        self.items
    }

    /// Items paired with their joined columns.
    pub fn into_joined(self) -> Vec<(E, Record)> {
        let mut joined = self.joined.into_iter();
        self.items
            .into_iter()
            .map(|item| (item, joined.next().unwrap_or_default()))
            .collect()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, E> {
        self.items.iter_mut()
    }

    /// Deletes every entity in the set within a single transaction.
    pub async fn remove_all(&mut self, orm: &Orm) -> Result<(), OrmError> {
        let mut transaction = orm.transaction();
        for entity in &mut self.items {
            transaction.remove_entity(entity);
        }
        transaction.commit().await
    }
}

impl<E> Deref for ResultSet<E> {
    type Target = [E];

    fn deref(&self) -> &[E] {
        &self.items
    }
}

impl<E> IntoIterator for ResultSet<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'r, E> IntoIterator for &'r ResultSet<E> {
    type Item = &'r E;
    type IntoIter = std::slice::Iter<'r, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    static FIELDS: &[FieldDef] = &[FieldDef::text("name"), FieldDef::integer("age")];
    static SCHEMA: EntitySchema = EntitySchema::new("Person", FIELDS);

    #[test]
    fn test_count_placeholders_skips_literals() {
        assert_eq!(count_placeholders("age > ? AND name = ?"), 2);
        assert_eq!(count_placeholders("name = 'who?' AND age = ?"), 1);
        assert_eq!(count_placeholders("\"odd?col\" = 1"), 0);
        assert_eq!(count_placeholders("1 = 1"), 0);
    }

    #[test]
    fn test_validate_parameter_count() {
        let mut spec = QuerySpec::new(&SCHEMA);
        spec.where_clause = Some("age > ?".into());
        assert!(matches!(spec.validate(), Err(OrmError::InvalidQuery(_))));

        spec.parameters.push(Value::Integer(30));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let spec = QuerySpec::new(&SCHEMA);
        assert_eq!(spec.limit, DEFAULT_LIMIT);
        assert_eq!(spec.offset, 0);
        assert!(spec.order.is_empty());
        assert!(spec.where_clause.is_none());
    }

    #[test]
    fn test_matching_query_spec() {
        let spec = QuerySpec::matching(&SCHEMA, "name", "Adrian").unwrap();
        assert_eq!(spec.where_clause.as_deref(), Some("\"name\" = ?"));
        assert_eq!(spec.parameters, vec![Value::Text("Adrian".into())]);
        assert_eq!(spec.limit, 1);

        let spec = QuerySpec::matching(&SCHEMA, "age", Value::Null).unwrap();
        assert_eq!(spec.where_clause.as_deref(), Some("\"age\" IS NULL"));
        assert!(spec.parameters.is_empty());

        assert!(QuerySpec::matching(&SCHEMA, "height", 1_i64).is_err());
    }

    #[test]
    fn test_where_clause_syntax_checks() {
        assert!(check_where_clause("age > ? AND Department.name = ?").is_ok());
        assert!(check_where_clause("name = 'a -- b ?1 :x'").is_ok());
        assert!(check_where_clause("age > -1").is_ok());

        for clause in [
            "  ",
            "age > ?1",
            "name = :name",
            "age > ? -- and more",
            "age > ? /* note */",
        ] {
            assert!(
                matches!(check_where_clause(clause), Err(OrmError::InvalidQuery(_))),
                "{clause}"
            );
        }
    }

    #[test]
    fn test_schemas_include_joins() {
        static OTHER: EntitySchema = EntitySchema::new("Department", &[]);
        let mut spec = QuerySpec::new(&SCHEMA);
        spec.joins.push(JoinSpec {
            schema: &OTHER,
            left_property: "age",
            target_property: PRIMARY_KEY_COLUMN,
        });
        let names: Vec<&str> = spec.schemas().map(|s| s.entity).collect();
        assert_eq!(names, vec!["Person", "Department"]);
    }

    #[test]
    fn test_like_parameter() {
        assert_eq!(make_like_parameter("dri"), "%dri%");
    }
}
