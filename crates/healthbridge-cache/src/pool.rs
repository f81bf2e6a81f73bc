//! SQLite pool for the metrics store
//!
//! File databases run in WAL mode so the daemon's periodic writer never
//! blocks a reader. In-memory databases exist per connection, so they get
//! exactly one connection that is never recycled.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::CacheError;

/// Embedded migrations, applied in order on every open
///
/// Each script is idempotent (`IF NOT EXISTS`), so there is no version table.
const MIGRATIONS: &[(&str, &str)] = &[(
    "20261019_initial",
    include_str!("migrations/20261019_initial.sql"),
)];

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const FILE_POOL_SIZE: u32 = 5;

/// Owns the SQLite pool shared by every store handle
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database at `db_path`, creating the file and its directory
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| CacheError::Directory {
                path: dir.display().to_string(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(FILE_POOL_SIZE)
            .connect_with(options)
            .await
            .map_err(|source| CacheError::Open {
                target: db_path.display().to_string(),
                source,
            })?;

        let db = Self { pool };
        db.migrate().await?;
        info!(path = %db_path.display(), "Opened metrics database");
        Ok(db)
    }

    /// Opens a private in-memory database
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|source| CacheError::Open {
                target: ":memory:".to_string(),
                source,
            })?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), CacheError> {
        for &(name, script) in MIGRATIONS {
            sqlx::raw_sql(script)
                .execute(&self.pool)
                .await
                .map_err(|source| CacheError::Migration { name, source })?;
            debug!(migration = name, "Applied migration");
        }
        Ok(())
    }
}
