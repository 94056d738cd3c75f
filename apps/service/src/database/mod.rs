/// Database abstraction layer
///
/// The engine only talks to the [`Store`] trait. [`LibsqlStore`] persists to a
/// local libsql database through a deadpool-managed pool, [`MemoryStore`]
/// keeps everything in process for ephemeral runs and tests.

pub mod memory;
pub mod migrations;
pub mod models;
pub mod repository;

pub use memory::MemoryStore;
pub use repository::{LibsqlStore, Store};

use deadpool::managed::{self, Pool, PoolError, RecycleError, RecycleResult};
use libsql::{Connection, Database};
use thiserror::Error;

/// Applied to every pooled connection before first use
const CONNECTION_PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA busy_timeout = 5000;
";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    QueryFailure(#[from] libsql::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Record not found")]
    NotFound,

    #[error("Stored value is invalid: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<PoolError<libsql::Error>> for StoreError {
    fn from(err: PoolError<libsql::Error>) -> Self {
        match err {
            PoolError::Backend(e) => StoreError::QueryFailure(e),
            other => StoreError::Pool(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Hands out connections to one local database file.
///
/// Concurrent writers wait on the file lock for up to five seconds instead of
/// failing with `SQLITE_BUSY`. A connection handed back while a transaction is
/// still open gets discarded.
pub struct ConnectionManager {
    database: Database,
}

impl ConnectionManager {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl managed::Manager for ConnectionManager {
    type Type = Connection;
    type Error = libsql::Error;

    async fn create(&self) -> Result<Connection, libsql::Error> {
        let conn = self.database.connect()?;
        conn.execute_batch(CONNECTION_PRAGMAS).await?;
        Ok(conn)
    }

    async fn recycle(&self, conn: &mut Connection, _: &managed::Metrics) -> RecycleResult<libsql::Error> {
        if conn.is_autocommit() {
            Ok(())
        } else {
            Err(RecycleError::Message("connection returned inside a transaction".into()))
        }
    }
}

pub type ConnectionPool = Pool<ConnectionManager>;

/// Open (or create) the database at `path`, build a pool and bring the schema up to date
pub async fn open_pool(path: &str, max_connections: usize) -> StoreResult<ConnectionPool> {
    let database = libsql::Builder::new_local(path).build().await?;
    let pool: ConnectionPool = Pool::builder(ConnectionManager::new(database))
        .max_size(max_connections.max(1))
        .build()
        .map_err(|e| StoreError::Pool(e.to_string()))?;

    let conn = pool.get().await?;
    migrations::run_migrations(&conn).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pooled_connections_wait_on_busy_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vigil.db");
        let pool = open_pool(&path.to_string_lossy(), 2).await.expect("pool");

        let first = pool.get().await.expect("first");
        let second = pool.get().await.expect("second");
        for conn in [&first, &second] {
            let mut rows = conn.query("PRAGMA busy_timeout", ()).await.expect("query");
            let row = rows.next().await.expect("row").expect("some row");
            assert_eq!(row.get::<i64>(0).expect("timeout"), 5000);
        }
    }

    #[tokio::test]
    async fn test_connection_left_in_transaction_is_not_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vigil.db");
        let pool = open_pool(&path.to_string_lossy(), 1).await.expect("pool");

        let conn = pool.get().await.expect("conn");
        conn.execute("BEGIN", ()).await.expect("begin");
        drop(conn);

        let conn = pool.get().await.expect("fresh conn");
        assert!(conn.is_autocommit());
    }
}
