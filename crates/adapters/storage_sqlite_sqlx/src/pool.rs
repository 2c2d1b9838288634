//! `SQLite` connection pool setup and migration runner.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::StorageError;

/// Default database location when nothing is configured.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:kadernim.db";

/// Configuration for the `SQLite` storage adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:kadernim.db` or `sqlite::memory:`).
    pub database_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Read configuration from `KADERNIM_DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if `KADERNIM_DATABASE_URL` is not set.
    pub fn from_env() -> Result<Self, std::env::VarError> {
        Ok(Self {
            database_url: std::env::var("KADERNIM_DATABASE_URL")?,
        })
    }

    fn is_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }

    /// Build a [`Database`] from this configuration.
    ///
    /// Creates the connection pool, creates the database file if missing,
    /// and runs all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the connection or migrations fail.
    pub async fn build(self) -> Result<Database, StorageError> {
        Database::initialize(&self).await
    }
}

/// Holds the `SQLite` connection pool and provides access to it.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn initialize(config: &Config) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives as long as its last connection, and
        // shared-cache connections would contend on table locks.
        let pool = if config.is_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePool::connect_with(options.journal_mode(SqliteJournalMode::Wal)).await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(url = %config.database_url, "database ready");

        Ok(Self { pool })
    }

    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
