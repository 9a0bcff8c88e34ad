//! Row-shaped containers passed between entities and storage.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error::OrmError;
use crate::schema::PRIMARY_KEY_COLUMN;
use crate::value::Value;

/// A stored row keyed by column name.
///
/// Missing columns read back as absent, exactly like a `NULL` column, so
/// entities can be rebuilt from rows written before a field existed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.values.insert(column.to_string(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Columns in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Primary key of the row, if present.
    pub fn id(&self) -> Result<Option<i64>, OrmError> {
        self.integer(PRIMARY_KEY_COLUMN)
    }

    pub fn text(&self, column: &str) -> Result<Option<String>, OrmError> {
        self.typed(column, "text", |v| v.as_str().map(str::to_string))
    }

    pub fn integer(&self, column: &str) -> Result<Option<i64>, OrmError> {
        self.typed(column, "integer", Value::as_i64)
    }

    pub fn real(&self, column: &str) -> Result<Option<f64>, OrmError> {
        self.typed(column, "real", Value::as_f64)
    }

    pub fn boolean(&self, column: &str) -> Result<Option<bool>, OrmError> {
        self.typed(column, "bool", Value::as_bool)
    }

    pub fn date(&self, column: &str) -> Result<Option<DateTime<Utc>>, OrmError> {
        self.typed(column, "date", Value::as_date)
    }

    pub fn blob(&self, column: &str) -> Result<Option<Vec<u8>>, OrmError> {
        self.typed(column, "blob", |v| match v {
            Value::Blob(b) => Some(b.clone()),
            _ => None,
        })
    }

    fn typed<T>(
        &self,
        column: &str,
        expected: &'static str,
        convert: impl Fn(&Value) -> Option<T>,
    ) -> Result<Option<T>, OrmError> {
        match self.values.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => convert(value).map(Some).ok_or_else(|| OrmError::TypeMismatch {
                column: column.to_string(),
                expected,
            }),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Results of a free-text SQL statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResults {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawResults {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_name_for_index(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    /// Value at `row` for the named column.
    pub fn value_for_column(&self, column: &str, row: usize) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }
}
