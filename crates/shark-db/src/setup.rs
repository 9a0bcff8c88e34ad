//! Database setup and initialization.
//!
//! Tables are created lazily per entity by the record store, so opening a
//! database only needs a path and a journaling mode.

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use std::path::Path;
use std::time::Duration;

use shark_core::{JournalMode, Settings, validate_settings};

/// How long a connection waits for another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn sqlite_journal_mode(mode: JournalMode) -> SqliteJournalMode {
    match mode {
        JournalMode::Wal => SqliteJournalMode::Wal,
        JournalMode::Delete => SqliteJournalMode::Delete,
        JournalMode::Truncate => SqliteJournalMode::Truncate,
        JournalMode::Memory => SqliteJournalMode::Memory,
        JournalMode::Off => SqliteJournalMode::Off,
    }
}

/// Opens the default database named in `settings`.
///
/// # Example
///
/// ```rust,no_run
/// use shark_core::Settings;
/// use shark_db::setup_database;
///
/// # async fn example() -> anyhow::Result<()> {
/// let pool = setup_database(&Settings::from_env()?).await?;
/// # Ok(())
/// # }
/// ```
pub async fn setup_database(settings: &Settings) -> Result<SqlitePool> {
    validate_settings(settings)?;
    open_database_named(settings, &settings.default_database_name).await
}

/// Opens `<location>/<name>.db`, creating it if needed.
pub async fn open_database_named(settings: &Settings, name: &str) -> Result<SqlitePool> {
    let path = settings.database_path(name)?;
    open_database_at(&path, settings.journal_mode).await
}

/// Opens the database file at `db_path`, creating the file and its parent
/// directory if they do not exist.
pub async fn open_database_at(db_path: &Path, journal_mode: JournalMode) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlite_journal_mode(journal_mode))
            .busy_timeout(BUSY_TIMEOUT),
    )
    .await?;

    tracing::info!(path = %db_path.display(), journal = %journal_mode, "database opened");
    Ok(pool)
}

/// Closes every connection of `pool`, checkpointing the journal.
pub async fn close_database(pool: SqlitePool) {
    pool.close().await;
    tracing::info!("database closed");
}

/// Sets up an in-memory `SQLite` database for testing.
///
/// The pool holds a single connection that is never recycled: every
/// connection to `sqlite::memory:` would otherwise see its own empty
/// database.
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_setup_test_database() {
        let pool = setup_test_database().await.unwrap();

        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_open_named_database_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            database_location: Some(dir.path().join("nested")),
            ..Settings::with_defaults()
        };

        let pool = open_database_named(&settings, "people").await.unwrap();
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        close_database(pool).await;

        assert_eq!(mode.to_lowercase(), "wal");
        assert!(dir.path().join("nested").join("people.db").exists());
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected() {
        let settings = Settings {
            database_location: Some(PathBuf::from("/tmp")),
            default_database_name: "a/b".into(),
            ..Settings::with_defaults()
        };
        assert!(setup_database(&settings).await.is_err());
    }
}
