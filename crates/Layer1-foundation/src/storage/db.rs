//! SQLite storage for agent process records
//!
//! One row per `(chatroom_id, role)` holding the pid of the agent process a
//! supervisor spawned, the driver it used, and the pid of the owning
//! supervisor. A freshly started supervisor reads these rows to reconcile
//! processes left behind by a previous instance.
//!
//! Every mutation runs in its own `IMMEDIATE` transaction so two supervisors
//! starting at the same time never both believe they own the same pid.

use crate::core::{ChatroomId, Role};
use crate::{signal, Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Database file name inside the data directory
pub const PROCESS_DB_FILE: &str = "huddle.db";

/// A persisted agent process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub chatroom_id: ChatroomId,
    pub role: Role,
    pub pid: u32,
    pub tool: String,
    /// Pid of the supervisor that currently owns this process
    pub owner_pid: u32,
    pub started_at: DateTime<Utc>,
}

impl ProcessRecord {
    pub fn new(
        chatroom_id: ChatroomId,
        role: Role,
        pid: u32,
        tool: impl Into<String>,
        owner_pid: u32,
    ) -> Self {
        Self {
            chatroom_id,
            role,
            pid,
            tool: tool.into(),
            owner_pid,
            started_at: Utc::now(),
        }
    }
}

type RawRecord = (String, String, i64, String, i64, String);

/// Durable process-record store
#[derive(Clone)]
pub struct ProcessRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl ProcessRecordStore {
    /// Open (or create) the store under `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;

        let db_path = data_dir.join(PROCESS_DB_FILE);
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        // WAL lets status queries read while a supervisor writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| Error::Storage(format!("Failed to set busy timeout: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        debug!("Opened process record store at {}", db_path.display());
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS agent_processes (
                chatroom_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK(role IN ('planner', 'builder', 'reviewer', 'user')),
                pid INTEGER NOT NULL,
                tool TEXT NOT NULL,
                owner_pid INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                PRIMARY KEY (chatroom_id, role)
            );

            CREATE INDEX IF NOT EXISTS idx_agent_processes_owner
                ON agent_processes(owner_pid);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| Error::Storage(format!("Failed to record schema version: {}", e)))?;
        Ok(())
    }

    /// Insert or replace the record for `(chatroom_id, role)`.
    ///
    /// Fails with [`Error::RecordOwned`] when the existing row belongs to a
    /// different supervisor that is still alive.
    pub fn upsert(&self, record: &ProcessRecord) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing_owner: Option<i64> = tx
            .query_row(
                "SELECT owner_pid FROM agent_processes WHERE chatroom_id = ?1 AND role = ?2",
                params![record.chatroom_id.as_str(), record.role.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(owner) = existing_owner {
            let owner = owner as u32;
            if owner != record.owner_pid && signal::is_alive(owner) {
                return Err(Error::RecordOwned {
                    chatroom_id: record.chatroom_id.to_string(),
                    role: record.role.to_string(),
                    owner,
                });
            }
        }

        tx.execute(
            r#"
            INSERT INTO agent_processes (chatroom_id, role, pid, tool, owner_pid, started_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(chatroom_id, role) DO UPDATE SET
                pid = excluded.pid,
                tool = excluded.tool,
                owner_pid = excluded.owner_pid,
                started_at = excluded.started_at
            "#,
            params![
                record.chatroom_id.as_str(),
                record.role.as_str(),
                record.pid as i64,
                record.tool,
                record.owner_pid as i64,
                record.started_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        debug!(
            chatroom = %record.chatroom_id,
            role = %record.role,
            pid = record.pid,
            "Persisted process record"
        );
        Ok(())
    }

    /// Delete the record only if it still points at `pid`.
    ///
    /// Returns `false` when there was nothing to delete, so a second stop of
    /// the same process never removes a newer record.
    pub fn remove(&self, chatroom_id: &ChatroomId, role: Role, pid: u32) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM agent_processes WHERE chatroom_id = ?1 AND role = ?2 AND pid = ?3",
            params![chatroom_id.as_str(), role.as_str(), pid as i64],
        )?;
        Ok(changed > 0)
    }

    /// Hand a record from `from_owner` to `to_owner` if nobody else took it first
    pub fn transfer_ownership(
        &self,
        chatroom_id: &ChatroomId,
        role: Role,
        pid: u32,
        from_owner: u32,
        to_owner: u32,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            r#"
            UPDATE agent_processes SET owner_pid = ?5
            WHERE chatroom_id = ?1 AND role = ?2 AND pid = ?3 AND owner_pid = ?4
            "#,
            params![
                chatroom_id.as_str(),
                role.as_str(),
                pid as i64,
                from_owner as i64,
                to_owner as i64
            ],
        )?;
        if changed > 0 {
            info!(
                chatroom = %chatroom_id,
                role = %role,
                pid,
                from_owner,
                to_owner,
                "Transferred process record ownership"
            );
        }
        Ok(changed > 0)
    }

    pub fn get(&self, chatroom_id: &ChatroomId, role: Role) -> Result<Option<ProcessRecord>> {
        let conn = self.lock()?;
        let raw: Option<RawRecord> = conn
            .query_row(
                r#"
                SELECT chatroom_id, role, pid, tool, owner_pid, started_at
                FROM agent_processes
                WHERE chatroom_id = ?1 AND role = ?2
                "#,
                params![chatroom_id.as_str(), role.as_str()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;
        raw.map(Self::decode).transpose()
    }

    pub fn list(&self) -> Result<Vec<ProcessRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT chatroom_id, role, pid, tool, owner_pid, started_at
            FROM agent_processes
            ORDER BY chatroom_id, role
            "#,
        )?;
        let rows: Vec<RawRecord> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;
        rows.into_iter().map(Self::decode).collect()
    }

    fn decode(raw: RawRecord) -> Result<ProcessRecord> {
        let (chatroom_id, role, pid, tool, owner_pid, started_at) = raw;
        let started_at = DateTime::parse_from_rfc3339(&started_at)
            .map_err(|e| Error::Storage(format!("Bad started_at '{}': {}", started_at, e)))?
            .with_timezone(&Utc);
        Ok(ProcessRecord {
            chatroom_id: ChatroomId::new(chatroom_id),
            role: role.parse()?,
            pid: pid as u32,
            tool,
            owner_pid: owner_pid as u32,
            started_at,
        })
    }
}
