use offline_todo_core::db::migrations::latest_version;
use offline_todo_core::db::{open_db, open_db_in_memory};
use offline_todo_core::{SqliteTaskStore, StoreError, Task, TaskId, TaskListQuery, TaskStore};
use rusqlite::Connection;

fn store() -> SqliteTaskStore {
    SqliteTaskStore::try_new(open_db_in_memory().unwrap()).unwrap()
}

fn id(value: &str) -> TaskId {
    TaskId::parse(value).unwrap()
}

#[tokio::test]
async fn put_and_get_roundtrip() {
    let store = store();
    let task = Task::new("milk");

    store.put(&task).await.unwrap();

    let loaded = store.get_by_id(&task.id).await.unwrap().unwrap();
    assert_eq!(loaded, task);
    assert!(loaded.is_active());
}

#[tokio::test]
async fn get_by_id_returns_none_for_unknown_id() {
    let store = store();
    assert!(store.get_by_id(&id("missing")).await.unwrap().is_none());
}

#[tokio::test]
async fn put_upserts_existing_record() {
    let store = store();
    let mut task = Task::with_id(id("1"), "milk");
    store.put(&task).await.unwrap();

    task.soft_delete();
    store.put(&task).await.unwrap();

    let all = store.get_all(TaskListQuery::all()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].deleted);
}

#[tokio::test]
async fn get_all_filters_by_tombstone_flag() {
    let store = store();
    let live = Task::with_id(id("1"), "milk");
    let mut removed = Task::with_id(id("2"), "bread");
    removed.soft_delete();
    store.put(&live).await.unwrap();
    store.put(&removed).await.unwrap();

    assert_eq!(
        store.get_all(TaskListQuery::all()).await.unwrap(),
        vec![live.clone(), removed.clone()]
    );
    assert_eq!(
        store.get_all(TaskListQuery::active()).await.unwrap(),
        vec![live]
    );
    assert_eq!(
        store.get_all(TaskListQuery::tombstoned()).await.unwrap(),
        vec![removed]
    );
}

#[tokio::test]
async fn get_all_keeps_insertion_order_across_upserts() {
    let store = store();
    for value in ["c", "a", "b"] {
        store.put(&Task::with_id(id(value), value)).await.unwrap();
    }
    let mut first = Task::with_id(id("c"), "c");
    first.soft_delete();
    store.put(&first).await.unwrap();

    let ids: Vec<TaskId> = store
        .get_all(TaskListQuery::all())
        .await
        .unwrap()
        .into_iter()
        .map(|task| task.id)
        .collect();
    assert_eq!(ids, vec![id("c"), id("a"), id("b")]);
}

#[tokio::test]
async fn delete_is_physical_and_idempotent() {
    let store = store();
    let task = Task::with_id(id("1"), "milk");
    store.put(&task).await.unwrap();

    store.delete(&task.id).await.unwrap();
    store.delete(&task.id).await.unwrap();

    assert!(store.get_by_id(&task.id).await.unwrap().is_none());
    assert!(store.get_all(TaskListQuery::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offline_todo.sqlite3");
    let task = Task::with_id(id("1"), "milk");

    {
        let store = SqliteTaskStore::try_new(open_db(&path).unwrap()).unwrap();
        store.put(&task).await.unwrap();
    }

    let reopened = SqliteTaskStore::try_new(open_db(&path).unwrap()).unwrap();
    assert_eq!(reopened.get_by_id(&task.id).await.unwrap(), Some(task));
}

#[tokio::test]
async fn opaque_ids_read_back_unchanged() {
    let store = store();
    let task = Task::with_id(TaskId::new(" shopping list ").unwrap(), "eggs");

    store.put(&task).await.unwrap();

    assert_eq!(
        store.get_all(TaskListQuery::all()).await.unwrap(),
        vec![task.clone()]
    );
    assert_eq!(store.get_by_id(&task.id).await.unwrap(), Some(task));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_writes_from_worker_threads_all_land() {
    let store = std::sync::Arc::new(store());

    let mut handles = Vec::new();
    for n in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .put(&Task::with_id(id(&n.to_string()), "milk"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.get_all(TaskListQuery::all()).await.unwrap().len(), 16);
}

#[tokio::test]
async fn invalid_persisted_row_is_rejected_on_read() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO tasks (id, text, deleted) VALUES ('', 'x', 0);",
        [],
    )
    .unwrap();
    let store = SqliteTaskStore::try_new(conn).unwrap();

    let err = store.get_all(TaskListQuery::all()).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}

#[test]
fn store_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteTaskStore::try_new(conn) {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert!(expected_version > 0),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn store_rejects_connection_without_tasks_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteTaskStore::try_new(conn),
        Err(StoreError::MissingRequiredTable("tasks"))
    ));
}

#[test]
fn store_rejects_connection_missing_required_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE tasks (
            id TEXT PRIMARY KEY NOT NULL,
            text TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteTaskStore::try_new(conn),
        Err(StoreError::MissingRequiredColumn {
            table: "tasks",
            column: "deleted"
        })
    ));
}
