/// SQLite transcript store
///
/// Append-only log of completed transcripts, newest first. Opens with
/// write-ahead journaling and a 5-second busy timeout so a reader (the
/// `transcript` CLI) never wedges an in-flight append.
use crate::domain::models::TranscriptRecord;
use crate::error::{AppError, Result};
use crate::ports::storage::TranscriptStorePort;
use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// SQLite storage implementation
pub struct SqliteTranscriptStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTranscriptStore {
    /// Open (or create) the store at the given path and migrate to latest.
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::configure(&conn)?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an existing store read-only, for the transcript CLI.
    pub fn open_read_only(db_path: PathBuf) -> Result<Self> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(())
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        use rusqlite_migration::{Migrations, M};

        let migrations =
            Migrations::new(vec![M::up(include_str!("../../../migrations/001_initial.sql"))]);

        let mut conn = self.conn.lock().unwrap();
        migrations
            .to_latest(&mut conn)
            .map_err(|e| AppError::PersistenceFailed(format!("migration: {}", e)))?;
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<TranscriptRecord> {
        Ok(TranscriptRecord {
            id: Some(row.get(0)?),
            timestamp: row.get(1)?,
            duration_ms: row.get(2)?,
            text: row.get(3)?,
            audio_path: row.get(4)?,
            model_name: row.get(5)?,
        })
    }
}

#[async_trait]
impl TranscriptStorePort for SqliteTranscriptStore {
    async fn append(
        &self,
        duration_ms: i64,
        text: &str,
        audio_path: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO transcripts (duration_ms, text, audio_path, model_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![duration_ms, text, audio_path, model_name],
        )
        .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    }

    async fn get_last(&self) -> Result<Option<TranscriptRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, duration_ms, text, audio_path, model_name
             FROM transcripts ORDER BY timestamp DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_record(row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: Option<u32>) -> Result<Vec<TranscriptRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, duration_ms, text, audio_path, model_name
             FROM transcripts ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let limit = limit.map(i64::from).unwrap_or(-1);
        let rows = stmt.query_map(params![limit], Self::row_to_record)?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }
}
