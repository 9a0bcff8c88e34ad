//! Core types for shark, an embedded `SQLite` object persistence library.
//!
//! This crate is backend-agnostic: entities describe themselves through
//! [`EntitySchema`] and [`Record`], the [`Orm`] service turns commits and
//! queries into calls on the [`RecordStore`] port, and adapters such as
//! `shark-db` implement that port for a concrete database.

#![deny(unused_crate_dependencies)]

pub mod commit_options;
pub mod entity;
pub mod error;
pub mod events;
pub mod ports;
pub mod query;
pub mod record;
pub mod schema;
pub mod services;
pub mod settings;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod samples;

pub use commit_options::CommitOptions;
pub use entity::{Entity, Persistable, Related};
pub use error::OrmError;
pub use events::{
    EntityEvent, EventCallback, EventHub, EventKind, EventSink, NoopEventSink, RegistrationId,
};
pub use ports::{RecordStore, StoreTransaction};
pub use query::{
    Direction, JoinSpec, OrderTerm, Query, QuerySpec, ResultSet, check_where_clause,
    count_placeholders, make_like_parameter,
};
pub use record::{RawResults, Record};
pub use schema::{
    ColumnType, DEFAULT_LIMIT, DEFAULT_OFFSET, DEFAULT_ORDER, DefaultValue, EntitySchema,
    FieldDef, IndexDefinition, IndexSortOrder, PRIMARY_KEY_COLUMN,
};
pub use services::{Orm, Transaction};
pub use settings::{JournalMode, Settings, SettingsError, validate_settings};
pub use value::Value;
