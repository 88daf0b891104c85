use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;

use crate::error::{AskragError, Result};

const PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA foreign_keys = ON; \
     PRAGMA temp_store = MEMORY;";

/// Tables for the persisted vector index. Only one index is active at a time;
/// ingesting a new document replaces it.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS indexes (
    index_id     TEXT PRIMARY KEY,
    filename     TEXT NOT NULL,
    source_hash  TEXT NOT NULL,
    chunk_count  INTEGER NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS index_chunks (
    index_id     TEXT NOT NULL REFERENCES indexes(index_id) ON DELETE CASCADE,
    position     INTEGER NOT NULL,
    content      TEXT NOT NULL,
    embedding    BLOB NOT NULL,
    PRIMARY KEY (index_id, position)
);
";

/// SQLite handle. Connections are opened per operation on the blocking pool.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(path: &Path) -> Result<Connection> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(PRAGMAS)?;
        Ok(conn)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Self::open(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| AskragError::Retrieval(format!("Database task failed: {}", e)))?
    }

    /// Create tables if they do not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
    }
}
