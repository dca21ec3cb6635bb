//! SQLite task store
//!
//! Shared by every `huddle` invocation on the machine: the CLI writes tasks,
//! the daemon polls them. The claim guarantee comes from
//! `UPDATE ... WHERE id = ? AND status = ?` succeeding for exactly one writer.

use super::{CasOutcome, TaskFilter, TaskStore};
use crate::error::{Result, TaskError};
use crate::state::TaskStatus;
use crate::task::{Task, TaskId, TaskOrigin};
use chrono::{DateTime, SecondsFormat, Utc};
use huddle_foundation::{ChatroomId, Error, Role};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Database file name inside the data directory
pub const TASK_DB_FILE: &str = "tasks.db";

const TASK_COLUMNS: &str =
    "id, chatroom_id, origin, status, assigned_role, content, created_at, updated_at, revision";

type RawTask = (
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    i64,
);

#[derive(Clone)]
pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    /// Open (or create) `tasks.db` under `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;

        let db_path = data_dir.join(TASK_DB_FILE);
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::Storage(format!("Failed to open task database: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| Error::Storage(format!("Failed to set busy timeout: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        debug!("Opened task store at {}", db_path.display());
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
            .map_err(|_| Error::Internal("Lock poisoned".to_string()).into())
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                chatroom_id TEXT NOT NULL,
                origin TEXT NOT NULL CHECK(origin IN ('chat', 'backlog')),
                status TEXT NOT NULL,
                assigned_role TEXT,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                revision INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_chatroom ON tasks(chatroom_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_tasks_revision ON tasks(revision);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to initialize task schema: {}", e)))?;
        Ok(())
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Invalid timestamp '{}': {}", s, e)).into())
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTask> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn decode(raw: RawTask) -> Result<Task> {
    let (id, chatroom_id, origin, status, assigned_role, content, created_at, updated_at, revision) =
        raw;
    Ok(Task {
        id: id.parse()?,
        chatroom_id: ChatroomId::new(chatroom_id),
        origin: origin.parse::<TaskOrigin>()?,
        status: status.parse::<TaskStatus>()?,
        assigned_role: assigned_role.map(|r| r.parse::<Role>()).transpose()?,
        content,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        revision: u64::try_from(revision).unwrap_or_default(),
    })
}

fn select_one(conn: &Connection, id: TaskId) -> Result<Option<Task>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
    let raw = conn
        .query_row(&sql, params![id.to_string()], read_raw)
        .optional()?;
    raw.map(decode).transpose()
}

impl TaskStore for SqliteTaskStore {
    fn insert(&self, task: &Task) -> Result<Task> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            r#"
            INSERT INTO tasks (id, chatroom_id, origin, status, assigned_role, content,
                               created_at, updated_at, revision)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                    (SELECT COALESCE(MAX(revision), 0) + 1 FROM tasks))
            "#,
            params![
                task.id.to_string(),
                task.chatroom_id.as_str(),
                task.origin.as_str(),
                task.status.as_str(),
                task.assigned_role.map(|r| r.as_str()),
                task.content,
                timestamp(&task.created_at),
                timestamp(&task.updated_at),
            ],
        )
        .map_err(|e| Error::Storage(format!("Failed to insert task {}: {}", task.id, e)))?;

        let stored = select_one(&tx, task.id)?
            .ok_or_else(|| Error::Storage(format!("Task {} vanished after insert", task.id)))?;
        tx.commit()?;
        Ok(stored)
    }

    fn read_task(&self, id: TaskId) -> Result<Option<Task>> {
        let conn = self.lock()?;
        select_one(&conn, id)
    }

    fn compare_and_swap_status(
        &self,
        id: TaskId,
        expected: TaskStatus,
        new: TaskStatus,
        assigned_role: Option<Role>,
    ) -> Result<CasOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            r#"
            UPDATE tasks
               SET status = ?1,
                   assigned_role = COALESCE(?2, assigned_role),
                   updated_at = ?3,
                   revision = (SELECT COALESCE(MAX(revision), 0) + 1 FROM tasks)
             WHERE id = ?4 AND status = ?5
            "#,
            params![
                new.as_str(),
                assigned_role.map(|r| r.as_str()),
                timestamp(&Utc::now()),
                id.to_string(),
                expected.as_str(),
            ],
        )?;

        let current = select_one(&tx, id)?.ok_or(TaskError::TaskNotFound(id))?;
        tx.commit()?;

        if changed == 1 {
            Ok(CasOutcome::Swapped(current))
        } else {
            Ok(CasOutcome::Conflict {
                current: current.status,
            })
        }
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        let sql = format!(
            r#"
            SELECT {} FROM tasks
             WHERE (?1 IS NULL OR chatroom_id = ?1)
               AND (?2 IS NULL OR origin = ?2)
               AND (?3 IS NULL OR status = ?3)
             ORDER BY created_at ASC, revision ASC
            "#,
            TASK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                filter.chatroom_id.as_ref().map(|c| c.as_str()),
                filter.origin.map(|o| o.as_str()),
                filter.status.map(|s| s.as_str()),
            ],
            read_raw,
        )?;

        let mut tasks = Vec::new();
        for raw in rows {
            tasks.push(decode(raw?)?);
        }
        Ok(tasks)
    }

    fn changed_since(&self, revision: u64) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM tasks WHERE revision > ?1 ORDER BY revision ASC",
            TASK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let since = i64::try_from(revision).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![since], read_raw)?;

        let mut tasks = Vec::new();
        for raw in rows {
            tasks.push(decode(raw?)?);
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_task(room: &str) -> Task {
        Task::new(ChatroomId::new(room), TaskOrigin::Chat, "write tests")
    }

    #[test]
    fn test_insert_and_read_back() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let task = chat_task("room");
        let stored = store.insert(&task).unwrap();

        assert_eq!(stored.id, task.id);
        assert_eq!(stored.status, TaskStatus::Queued);
        assert_eq!(stored.revision, 1);
        assert_eq!(store.read_task(task.id).unwrap(), Some(stored));
    }

    #[test]
    fn test_cas_conflict_reports_current_status() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let task = store.insert(&chat_task("room")).unwrap();

        let outcome = store
            .compare_and_swap_status(
                task.id,
                TaskStatus::Queued,
                TaskStatus::Pending,
                Some(Role::Planner),
            )
            .unwrap();
        let CasOutcome::Swapped(updated) = outcome else {
            panic!("expected swap");
        };
        assert_eq!(updated.assigned_role, Some(Role::Planner));
        assert_eq!(updated.revision, 2);

        let outcome = store
            .compare_and_swap_status(task.id, TaskStatus::Queued, TaskStatus::Pending, None)
            .unwrap();
        assert_eq!(
            outcome,
            CasOutcome::Conflict {
                current: TaskStatus::Pending
            }
        );
    }

    #[test]
    fn test_cas_unknown_task() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let err = store
            .compare_and_swap_status(TaskId::new(), TaskStatus::Queued, TaskStatus::Pending, None)
            .unwrap_err();
        assert!(matches!(err, TaskError::TaskNotFound(_)));
    }

    #[test]
    fn test_list_filters_by_chatroom() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let a = store.insert(&chat_task("alpha")).unwrap();
        store.insert(&chat_task("beta")).unwrap();

        let listed = store
            .list(&TaskFilter::new().chatroom(ChatroomId::new("alpha")))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, a.id);
        assert_eq!(store.list(&TaskFilter::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_changed_since_and_file_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let task = chat_task("room");
        {
            let store = SqliteTaskStore::open(dir.path()).unwrap();
            store.insert(&task).unwrap();
            store
                .compare_and_swap_status(
                    task.id,
                    TaskStatus::Queued,
                    TaskStatus::Pending,
                    Some(Role::Builder),
                )
                .unwrap();
        }

        let reopened = SqliteTaskStore::open(dir.path()).unwrap();
        let changed = reopened.changed_since(1).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].status, TaskStatus::Pending);
        assert!(reopened.changed_since(2).unwrap().is_empty());
    }
}
