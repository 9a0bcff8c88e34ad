//! `SQLite` storage for shark.
//!
//! Implements the `RecordStore` port from `shark-core` on top of `sqlx`,
//! plus helpers to open databases and compose a ready `Orm`.

#![deny(unsafe_code)]

pub mod factory;
pub mod record_store;
pub mod row_mappers;
pub mod setup;
pub mod sql;

// Re-export factory for convenient access
pub use factory::Shark;

// Re-export TestDb for integration tests
pub use factory::TestDb;

pub use record_store::{SqliteRecordStore, SqliteStoreTransaction};
pub use row_mappers::DateEncoding;

// Re-export setup functions for convenient access
pub use setup::{
    close_database, open_database_at, open_database_named, setup_database, setup_test_database,
};
