use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use tracing::{debug, info};

use super::record::{InteractionMeta, InteractionRecord, NewInteraction};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS interactions (
         id        INTEGER PRIMARY KEY AUTOINCREMENT,
         timestamp TEXT,
         prompt    TEXT,
         response  TEXT,
         image     BLOB,
         model     TEXT,
         meta      TEXT
     );
     CREATE INDEX IF NOT EXISTS idx_interactions_prompt ON interactions(prompt);";

const SELECT_COLUMNS: &str = "SELECT id, timestamp, prompt, response, image, model, meta FROM interactions";

/// Append-only SQLite log of interactions.
///
/// Rows are never updated or deleted; every write is a single INSERT.
pub struct InteractionStore {
    conn: Mutex<Connection>,
}

impl InteractionStore {
    /// Opens (or creates) the database at `path` and ensures the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open interaction store {}", path.display()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        info!("interaction store opened at {}", path.display());
        Ok(store)
    }

    /// Opens an existing database without touching the schema. Writes fail.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open interaction store {} read-only", path.display()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create-if-absent; safe to call on every start.
    pub fn initialize(&self) -> Result<()> {
        self.lock()?
            .execute_batch(SCHEMA)
            .context("failed to initialize interactions schema")?;
        Ok(())
    }

    pub fn append(&self, entry: &NewInteraction) -> Result<i64> {
        let meta = entry
            .meta
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO interactions (timestamp, prompt, response, image, model, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                now_utc_iso(),
                entry.prompt,
                entry.response,
                entry.image,
                entry.model,
                meta,
            ],
        )
        .context("failed to append interaction")?;
        let id = conn.last_insert_rowid();
        debug!(id, model = %entry.model, "interaction appended");
        Ok(id)
    }

    /// Newest record whose prompt equals `prompt` exactly.
    ///
    /// Prompts are not unique; when the same text was asked more than once the
    /// most recent row wins.
    pub fn find_latest_by_prompt(&self, prompt: &str) -> Result<Option<InteractionRecord>> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} WHERE prompt = ?1 ORDER BY id DESC LIMIT 1");
        let record = conn
            .query_row(&sql, params![prompt], row_to_record)
            .optional()
            .context("failed to look up interaction by prompt")?;
        Ok(record)
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<InteractionRecord>> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("interaction store lock poisoned"))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<InteractionRecord> {
    let meta: Option<String> = row.get(6)?;
    Ok(InteractionRecord {
        id: row.get(0)?,
        timestamp: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        prompt: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        response: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        image: row.get(4)?,
        model: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        meta: meta.as_deref().and_then(InteractionMeta::parse),
    })
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
