//! SQL text rendering for entity schemas and query specs.
//!
//! Every identifier that reaches SQL text is either a schema-declared name
//! or the primary key, and is always double-quoted. Values never appear in
//! the text; they are bound as `?` parameters.

use shark_core::{
    ColumnType, DefaultValue, EntitySchema, IndexDefinition, OrmError, PRIMARY_KEY_COLUMN,
    QuerySpec, Record,
};

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `SQLite` column type for a field.
pub const fn column_affinity(column_type: ColumnType, epoch_dates: bool) -> &'static str {
    match column_type {
        ColumnType::Text => "TEXT",
        ColumnType::Integer | ColumnType::Bool | ColumnType::Entity(_) => "INTEGER",
        ColumnType::Real => "REAL",
        ColumnType::Date if epoch_dates => "REAL",
        ColumnType::Date => "TEXT",
        ColumnType::Blob => "BLOB",
    }
}

fn default_literal(default: DefaultValue) -> String {
    match default {
        DefaultValue::Null => "NULL".to_string(),
        DefaultValue::Integer(i) => i.to_string(),
        DefaultValue::Real(r) => r.to_string(),
        DefaultValue::Bool(b) => i32::from(b).to_string(),
        DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

pub fn create_table(schema: &EntitySchema, epoch_dates: bool) -> String {
    let mut columns = vec![format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(PRIMARY_KEY_COLUMN)
    )];
    for field in schema.fields {
        let mut column = format!(
            "{} {}",
            quote_ident(field.name),
            column_affinity(field.column_type, epoch_dates)
        );
        if let Some(default) = field.default {
            column.push_str(" DEFAULT ");
            column.push_str(&default_literal(default));
        }
        if field.unique {
            column.push_str(" UNIQUE");
        }
        columns.push(column);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(schema.entity),
        columns.join(", ")
    )
}

pub fn create_index(schema: &EntitySchema, index: &IndexDefinition) -> String {
    let mut terms = vec![format!(
        "{} {}",
        quote_ident(index.property),
        index.order.sql_suffix()
    )];
    if let Some((property, order)) = index.secondary {
        terms.push(format!("{} {}", quote_ident(property), order.sql_suffix()));
    }
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quote_ident(&index.name(schema.entity)),
        quote_ident(schema.entity),
        terms.join(", ")
    )
}

/// Base table followed by its `LEFT JOIN`s.
fn from_sql(spec: &QuerySpec) -> String {
    let base = quote_ident(spec.schema.entity);
    let mut from = base.clone();
    for join in &spec.joins {
        let table = quote_ident(join.schema.entity);
        from.push_str(&format!(
            " LEFT JOIN {table} ON {base}.{} = {table}.{}",
            quote_ident(join.left_property),
            quote_ident(join.target_property)
        ));
    }
    from
}

/// A column of the queried entity, table-qualified once other tables are
/// joined in.
fn column_sql(spec: &QuerySpec, column: &str) -> String {
    if spec.joins.is_empty() {
        quote_ident(column)
    } else {
        format!("{}.{}", quote_ident(spec.schema.entity), quote_ident(column))
    }
}

/// `*` for a single table; otherwise the entity's columns plus every joined
/// column aliased as `Table.column`.
fn projection_sql(spec: &QuerySpec) -> String {
    if spec.joins.is_empty() {
        return "*".to_string();
    }
    let mut terms = vec![format!("{}.*", quote_ident(spec.schema.entity))];
    for join in &spec.joins {
        let table = quote_ident(join.schema.entity);
        for column in join.schema.column_names() {
            terms.push(format!(
                "{table}.{} AS {}",
                quote_ident(column),
                quote_ident(&format!("{}.{column}", join.schema.entity))
            ));
        }
    }
    terms.join(", ")
}

fn where_sql(spec: &QuerySpec) -> String {
    spec.where_clause
        .as_deref()
        .map(|clause| format!(" WHERE {clause}"))
        .unwrap_or_default()
}

fn order_sql(spec: &QuerySpec) -> String {
    if spec.order.is_empty() {
        return format!(" ORDER BY {} ASC", column_sql(spec, PRIMARY_KEY_COLUMN));
    }
    let terms: Vec<String> = spec
        .order
        .iter()
        .map(|term| format!("{} {}", column_sql(spec, term.property), term.direction.as_sql()))
        .collect();
    format!(" ORDER BY {}", terms.join(", "))
}

/// Full-row select; the limit and offset are bound after the where parameters.
pub fn select(spec: &QuerySpec) -> String {
    format!(
        "SELECT {} FROM {}{}{} LIMIT ? OFFSET ?",
        projection_sql(spec),
        from_sql(spec),
        where_sql(spec),
        order_sql(spec)
    )
}

pub fn count(spec: &QuerySpec) -> String {
    format!(
        "SELECT COUNT(*) FROM {}{}",
        from_sql(spec),
        where_sql(spec)
    )
}

pub fn sum(spec: &QuerySpec, column: &str) -> String {
    format!(
        "SELECT TOTAL({}) FROM {}{}",
        column_sql(spec, column),
        from_sql(spec),
        where_sql(spec)
    )
}

pub fn distinct(spec: &QuerySpec, column: &str) -> String {
    let column = column_sql(spec, column);
    format!(
        "SELECT DISTINCT {column} FROM {}{} ORDER BY {column} ASC",
        from_sql(spec),
        where_sql(spec)
    )
}

pub fn find(schema: &EntitySchema) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = ?",
        quote_ident(schema.entity),
        quote_ident(PRIMARY_KEY_COLUMN)
    )
}

/// Column names of `record` checked against `schema`, in record order.
pub fn checked_columns(schema: &EntitySchema, record: &Record) -> Result<Vec<&'static str>, OrmError> {
    record
        .columns()
        .map(|column| schema.validate_property(column))
        .collect()
}

pub fn insert(schema: &EntitySchema, columns: &[&str]) -> String {
    let table = quote_ident(schema.entity);
    if columns.is_empty() {
        return format!("INSERT INTO {table} DEFAULT VALUES");
    }
    let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders = vec!["?"; columns.len()];
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    )
}

pub fn update(schema: &EntitySchema, columns: &[&str]) -> String {
    let key = quote_ident(PRIMARY_KEY_COLUMN);
    let assignments: Vec<String> = if columns.is_empty() {
        vec![format!("{key} = {key}")]
    } else {
        columns
            .iter()
            .map(|c| format!("{} = ?", quote_ident(c)))
            .collect()
    };
    format!(
        "UPDATE {} SET {} WHERE {key} = ?",
        quote_ident(schema.entity),
        assignments.join(", ")
    )
}

pub fn delete(schema: &EntitySchema) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(schema.entity),
        quote_ident(PRIMARY_KEY_COLUMN)
    )
}
