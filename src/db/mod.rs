use crate::errors::{CatalogError, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Embedded migrations, run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Database connection pool for the catalog store.
#[derive(Debug)]
pub struct DbConnection {
    pub pool: SqlitePool,
}

impl DbConnection {
    /// Connect to the catalog database file, creating it if missing, and
    /// run migrations.
    pub async fn new(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let options = Self::base_options()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::connect(options, DB_MAX_CONNECTIONS).await
    }

    /// Connect to a throwaway in-memory database.
    ///
    /// Not gated behind `#[cfg(test)]` so integration tests can use it too.
    /// In-memory databases must be limited to a single connection, otherwise
    /// pool connections see independent empty databases.
    pub async fn new_in_memory() -> Result<Arc<Self>> {
        let options = Self::base_options().filename(":memory:");
        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Arc<Self>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                CatalogError::database_connection(format!("Failed to open catalog database: {e}"))
            })?;

        info!("Running catalog database migrations");
        MIGRATOR.run(&pool).await.map_err(|e| {
            CatalogError::database_connection(format!("Failed to run database migrations: {e}"))
        })?;

        Ok(Arc::new(Self { pool }))
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // WAL keeps search reads unblocked while a run is writing.
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(1500))
    }
}

/// Verifies the database is reachable. Used by the health endpoint.
pub async fn check_db_connection(db: &DbConnection) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(&db.pool)
        .await
        .map_err(|e| CatalogError::database_connection(format!("Health check failed: {e}")))?;
    Ok(())
}
