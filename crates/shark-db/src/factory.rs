//! Composition utilities for building an `Orm` over `SQLite`.
//!
//! This module only wires pools, stores and services together; it holds
//! no persistence logic of its own.

use sqlx::SqlitePool;
use std::ops::Deref;
use std::sync::Arc;

use shark_core::{Orm, Settings};

use crate::record_store::SqliteRecordStore;
use crate::row_mappers::DateEncoding;
use crate::setup::{close_database, open_database_named};

/// An open database together with the `Orm` that persists into it.
///
/// Derefs to [`Orm`], so queries and commits can be issued directly:
///
/// ```ignore
/// let shark = Shark::open(&Settings::from_env()?).await?;
/// let adults = shark.query::<Person>().where_clause("age >= 18").fetch().await?;
/// ```
pub struct Shark {
    pool: SqlitePool,
    orm: Orm,
}

impl Shark {
    /// Open the default database from `settings`.
    pub async fn open(settings: &Settings) -> anyhow::Result<Self> {
        Self::open_named(settings, &settings.default_database_name).await
    }

    /// Open the database called `name` in the configured location.
    pub async fn open_named(settings: &Settings, name: &str) -> anyhow::Result<Self> {
        let pool = open_database_named(settings, name).await?;
        Ok(Self::from_pool(
            pool,
            DateEncoding::from_settings(settings.use_epoch_dates),
        ))
    }

    /// Build over an existing pool.
    pub fn from_pool(pool: SqlitePool, dates: DateEncoding) -> Self {
        let store = SqliteRecordStore::new(pool.clone()).with_date_encoding(dates);
        Self {
            pool,
            orm: Orm::new(Arc::new(store)),
        }
    }

    pub const fn orm(&self) -> &Orm {
        &self.orm
    }

    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the underlying pool.
    pub async fn close(self) {
        close_database(self.pool).await;
    }
}

impl Deref for Shark {
    type Target = Orm;

    fn deref(&self) -> &Orm {
        &self.orm
    }
}

/// Test database helper for integration tests.
///
/// Provides a single-connection in-memory database behind a ready `Orm`.
pub struct TestDb {
    shark: Shark,
}

impl TestDb {
    /// Create a new in-memory test database. Tables are created on first use.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_dates(DateEncoding::default()).await
    }

    /// Create a test database with a specific date encoding.
    pub async fn with_dates(dates: DateEncoding) -> anyhow::Result<Self> {
        let pool = crate::setup::setup_test_database().await?;
        Ok(Self {
            shark: Shark::from_pool(pool, dates),
        })
    }

    pub const fn orm(&self) -> &Orm {
        self.shark.orm()
    }

    /// Get the underlying pool.
    pub const fn pool(&self) -> &SqlitePool {
        self.shark.pool()
    }

    /// A second store over the same database, for inspecting raw rows.
    pub fn store(&self) -> SqliteRecordStore {
        SqliteRecordStore::new(self.pool().clone())
    }
}
