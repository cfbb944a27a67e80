//! SQLite database for durable conference job snapshots
//!
//! Each job is stored as one JSON document plus a few indexed columns for
//! ad-hoc inspection. Writes are last-writer-wins on the job id.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::JobStore;
use crate::types::Job;

/// SQLite-based job store
#[derive(Clone)]
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            "#,
        )
        .map_err(|e| Error::storage(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS conference_jobs (
                id TEXT PRIMARY KEY,
                conference_type TEXT NOT NULL,
                status TEXT NOT NULL,
                total_files INTEGER NOT NULL,
                processed_files INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                document TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conference_jobs_status ON conference_jobs(status);
            CREATE INDEX IF NOT EXISTS idx_conference_jobs_created_at ON conference_jobs(created_at);
            "#,
        )?;

        Ok(())
    }

    fn upsert(&self, job: &Job) -> Result<()> {
        let document = serde_json::to_string(job)?;
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO conference_jobs
                (id, conference_type, status, total_files, processed_files, error,
                 created_at, updated_at, document)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                processed_files = excluded.processed_files,
                error = excluded.error,
                updated_at = excluded.updated_at,
                document = excluded.document
            "#,
            params![
                job.id.to_string(),
                job.conference_type.to_string(),
                job.status.as_str(),
                job.total_files as i64,
                job.processed_files as i64,
                job.error,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
                document,
            ],
        )?;
        Ok(())
    }

    fn load(&self, id: Uuid) -> Result<Option<Job>> {
        let conn = self.conn.lock();
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM conference_jobs WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        document
            .map(|doc| serde_json::from_str(&doc).map_err(Error::from))
            .transpose()
    }

    /// Run a blocking database call off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SqliteJobStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| Error::storage(format!("Database task failed: {}", e)))?
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert_job(&self, job: &Job) -> Result<()> {
        let job = job.clone();
        self.blocking(move |db| db.upsert(&job)).await
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let job = job.clone();
        self.blocking(move |db| db.upsert(&job)).await
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        self.blocking(move |db| db.load(id)).await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
