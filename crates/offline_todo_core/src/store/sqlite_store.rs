//! SQLite-backed task store.
//!
//! # Responsibility
//! - Persist tasks in the `tasks` table created by migration 1.
//! - Reject connections that were not opened through `db::open_db*`.
//!
//! # Invariants
//! - Writes validate the task before touching SQL.
//! - Reads reject invalid persisted rows instead of masking them.
//! - Each operation is a single statement, so it is either fully applied or
//!   not applied at all.

use crate::db::migrations::{current_user_version, latest_version};
use crate::model::task::{Task, TaskId};
use crate::store::{StoreError, StoreResult, TaskListQuery, TaskStore};
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

const TASK_SELECT_SQL: &str = "SELECT id, text, deleted FROM tasks";
const REQUIRED_COLUMNS: &[&str] = &["id", "text", "deleted", "updated_at"];

/// Task store over one migrated SQLite connection.
///
/// Statements run on tokio's blocking pool; the connection mutex is only
/// taken there, never on an async worker.
pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    /// Wraps a connection after checking that the schema is usable.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))?;
            op(&conn)
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("sqlite worker failed: {err}")))?
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn get_all(&self, query: TaskListQuery) -> StoreResult<Vec<Task>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{TASK_SELECT_SQL}
                 WHERE (?1 IS NULL OR deleted = ?1)
                 ORDER BY rowid ASC;"
            ))?;

            let mut rows = stmt.query(params![query.deleted.map(bool_to_int)])?;
            let mut tasks = Vec::new();
            while let Some(row) = rows.next()? {
                tasks.push(parse_task_row(row)?);
            }

            Ok(tasks)
        })
        .await
    }

    async fn get_by_id(&self, id: &TaskId) -> StoreResult<Option<Task>> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;

            let mut rows = stmt.query([id.as_str()])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(parse_task_row(row)?));
            }

            Ok(None)
        })
        .await
    }

    async fn put(&self, task: &Task) -> StoreResult<()> {
        task.validate()?;

        let task = task.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, text, deleted, updated_at)
                 VALUES (?1, ?2, ?3, (strftime('%s', 'now') * 1000))
                 ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    deleted = excluded.deleted,
                    updated_at = excluded.updated_at;",
                params![task.id.as_str(), task.text.as_str(), bool_to_int(task.deleted)],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        let id = id.clone();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM tasks WHERE id = ?1;", [id.as_str()])?;
            Ok(())
        })
        .await
    }
}

fn ensure_schema(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version < expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('tasks');")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Err(StoreError::MissingRequiredTable("tasks"));
    }

    for &column in REQUIRED_COLUMNS {
        if !columns.iter().any(|name| name == column) {
            return Err(StoreError::MissingRequiredColumn {
                table: "tasks",
                column,
            });
        }
    }

    Ok(())
}

fn parse_task_row(row: &Row<'_>) -> StoreResult<Task> {
    let id_text: String = row.get("id")?;
    let id = TaskId::new(id_text.as_str()).map_err(|_| {
        StoreError::InvalidData(format!("invalid id value `{id_text}` in tasks.id"))
    })?;

    let deleted = match row.get::<_, i64>("deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid deleted value `{other}` in tasks.deleted"
            )));
        }
    };

    Ok(Task {
        id,
        text: row.get("text")?,
        deleted,
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
