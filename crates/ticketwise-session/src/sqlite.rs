//! SQLite-backed history store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, params};

use crate::error::{Result, SessionError};
use crate::history::{EntryRole, History, HistoryEntry};
use crate::store::SessionStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS history_entries (
    conversation_id TEXT NOT NULL,
    seq             INTEGER NOT NULL,
    role            TEXT NOT NULL,
    content         TEXT NOT NULL,
    task_type       TEXT,
    created_at      TEXT NOT NULL,
    PRIMARY KEY (conversation_id, seq)
);
";

/// History store persisted in a SQLite database.
///
/// Each `save` replaces a conversation's rows inside one transaction.
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
    max_history_entries: usize,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path, max_history_entries: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SessionError::Storage(format!("{}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, max_history_entries)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(max_history_entries: usize) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, max_history_entries)
    }

    fn init(conn: Connection, max_history_entries: usize) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            max_history_entries: max_history_entries.max(1),
        })
    }

    /// Number of distinct conversations stored.
    pub fn conversation_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT conversation_id) FROM history_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn load_blocking(conn: &Connection, conversation_id: &str) -> Result<History> {
        let mut stmt = conn.prepare(
            "SELECT role, content, task_type, created_at FROM history_entries
             WHERE conversation_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut history = History::new();
        for row in rows {
            let (role, content, task_type, created_at) = row?;
            let role = EntryRole::parse(&role)
                .ok_or_else(|| SessionError::Serialization(format!("unknown role {:?}", role)))?;
            let at = DateTime::parse_from_rfc3339(&created_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| SessionError::Serialization(e.to_string()))?;
            history.push(HistoryEntry {
                role,
                content,
                task_type,
                at,
            });
        }
        Ok(history)
    }

    fn save_blocking(conn: &mut Connection, conversation_id: &str, history: &History) -> Result<()> {
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM history_entries WHERE conversation_id = ?1",
            params![conversation_id],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO history_entries (conversation_id, seq, role, content, task_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (seq, entry) in history.entries().iter().enumerate() {
                insert.execute(params![
                    conversation_id,
                    seq as i64,
                    entry.role.as_str(),
                    entry.content,
                    entry.task_type,
                    entry.at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, conversation_id: &str) -> Result<History> {
        let conn = Arc::clone(&self.conn);
        let id = conversation_id.to_string();
        tokio::task::spawn_blocking(move || Self::load_blocking(&conn.lock(), &id)).await?
    }

    async fn save(&self, conversation_id: &str, mut history: History) -> Result<()> {
        if conversation_id.is_empty() {
            return Err(SessionError::InvalidId(conversation_id.to_string()));
        }
        history.truncate_front(self.max_history_entries);

        let conn = Arc::clone(&self.conn);
        let id = conversation_id.to_string();
        tokio::task::spawn_blocking(move || Self::save_blocking(&mut conn.lock(), &id, &history))
            .await?
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
