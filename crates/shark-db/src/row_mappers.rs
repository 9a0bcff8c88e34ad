//! Conversions between `Value` and `SQLite` parameters and rows.

use chrono::{DateTime, Utc};
use shark_core::{OrmError, RawResults, Record, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

use crate::record_store::map_sqlx_error;

/// A query under construction against `SQLite`.
pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// How timestamps are written to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateEncoding {
    /// RFC 3339 text.
    #[default]
    Rfc3339,
    /// Seconds since the Unix epoch as a real number.
    EpochSeconds,
}

impl DateEncoding {
    pub const fn from_settings(use_epoch_dates: bool) -> Self {
        if use_epoch_dates {
            Self::EpochSeconds
        } else {
            Self::Rfc3339
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn epoch_seconds(date: &DateTime<Utc>) -> f64 {
    date.timestamp_micros() as f64 / 1_000_000.0
}

/// Binds one value as the next `?` parameter.
pub fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value, dates: DateEncoding) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(Option::<i64>::None),
        Value::Integer(i) => query.bind(*i),
        Value::Real(r) => query.bind(*r),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bool(b) => query.bind(*b),
        Value::Blob(bytes) => query.bind(bytes.clone()),
        Value::Date(date) => match dates {
            DateEncoding::Rfc3339 => query.bind(date.to_rfc3339()),
            DateEncoding::EpochSeconds => query.bind(epoch_seconds(date)),
        },
    }
}

pub fn bind_all<'q>(
    mut query: SqliteQuery<'q>,
    values: &[Value],
    dates: DateEncoding,
) -> SqliteQuery<'q> {
    for value in values {
        query = bind_value(query, value, dates);
    }
    query
}

/// Reads column `index` according to the storage class of the stored value.
pub fn column_value(row: &SqliteRow, index: usize) -> Result<Value, OrmError> {
    let raw = row.try_get_raw(index).map_err(map_sqlx_error)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage_class = raw.type_info().name().to_string();

    let value = match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => Value::Integer(row.try_get(index).map_err(map_sqlx_error)?),
        "REAL" => Value::Real(row.try_get(index).map_err(map_sqlx_error)?),
        "BLOB" => Value::Blob(row.try_get(index).map_err(map_sqlx_error)?),
        _ => Value::Text(row.try_get(index).map_err(map_sqlx_error)?),
    };
    Ok(value)
}

/// Parse a database row into a Record keyed by column name.
pub fn row_to_record(row: &SqliteRow) -> Result<Record, OrmError> {
    row.columns()
        .iter()
        .map(|column| Ok((column.name().to_string(), column_value(row, column.ordinal())?)))
        .collect()
}

/// Collects the rows of a free-text statement.
pub fn rows_to_raw_results(rows: &[SqliteRow]) -> Result<RawResults, OrmError> {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        })
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(|row| {
            (0..row.columns().len())
                .map(|index| column_value(row, index))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawResults { columns, rows })
}
