pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod timeout;
pub mod trait_def;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use timeout::TimeoutStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

use std::sync::Arc;
use tracing::info;

use crate::config::{DatabaseBackend, DatabaseConfig};

/// Draws performed by the unique-code call before it gives up.
pub const UNIQUE_CODE_ATTEMPTS: usize = 8;

/// Map a sqlx error onto the storage error vocabulary.
pub(crate) fn classify_sqlx_error(err: sqlx::Error) -> StorageError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db_err.is_foreign_key_violation() {
            return StorageError::LinkNotFound;
        }
    }
    StorageError::Other(err.into())
}

/// Open the configured backend, create its schema and bound every call with
/// the configured timeout.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn Storage>> {
    let backend: Arc<dyn Storage> = match config.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.url);
            Arc::new(SqliteStorage::new(&config.url, config.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(PostgresStorage::new(&config.url, config.max_connections).await?)
        }
        DatabaseBackend::Memory => {
            info!("Using in-memory storage, links will not survive a restart");
            Arc::new(MemoryStorage::new())
        }
    };

    info!("Initializing database...");
    backend.init().await?;
    info!("Database initialized successfully");

    Ok(Arc::new(TimeoutStorage::new(backend, config.timeout())))
}
