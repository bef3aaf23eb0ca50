use async_trait::async_trait;
use offline_todo_core::{
    IdLocks, MemoryRemoteService, MemoryTaskStore, RemoteCall, RemoteResult, RemoteService,
    SyncEngine, SyncError, Task, TaskId, TaskService, TaskStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn id(value: &str) -> TaskId {
    TaskId::parse(value).unwrap()
}

/// Remote whose listing takes a while and tracks overlapping passes.
struct SlowListRemote {
    inner: MemoryRemoteService,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    lists: AtomicUsize,
}

impl SlowListRemote {
    fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryRemoteService::new(),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteService for SlowListRemote {
    async fn list(&self) -> RemoteResult<Vec<Task>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.lists.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.list().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn create(&self, task: &Task) -> RemoteResult<()> {
        self.inner.create(task).await
    }

    async fn delete(&self, id: &TaskId) -> RemoteResult<()> {
        self.inner.delete(id).await
    }
}

/// Remote whose creates block until the test releases them.
struct GatedCreateRemote {
    inner: MemoryRemoteService,
    create_started: Notify,
    release_create: Notify,
}

impl GatedCreateRemote {
    fn new() -> Self {
        Self {
            inner: MemoryRemoteService::new(),
            create_started: Notify::new(),
            release_create: Notify::new(),
        }
    }
}

#[async_trait]
impl RemoteService for GatedCreateRemote {
    async fn list(&self) -> RemoteResult<Vec<Task>> {
        self.inner.list().await
    }

    async fn create(&self, task: &Task) -> RemoteResult<()> {
        self.create_started.notify_one();
        self.release_create.notified().await;
        self.inner.create(task).await
    }

    async fn delete(&self, id: &TaskId) -> RemoteResult<()> {
        self.inner.delete(id).await
    }
}

#[tokio::test]
async fn listing_failure_aborts_pass_without_mutations() {
    let mut tombstone = Task::with_id(id("2"), "bread");
    tombstone.soft_delete();
    let local = vec![Task::with_id(id("1"), "milk"), tombstone];
    let store = Arc::new(MemoryTaskStore::with_tasks(local.clone()));
    let remote = Arc::new(MemoryRemoteService::new());
    remote.set_unreachable(true);
    let engine = SyncEngine::new(store.clone(), remote.clone(), IdLocks::new());

    let err = engine.sync().await.unwrap_err();

    assert!(matches!(err, SyncError::RemoteUnavailable(_)));
    assert_eq!(remote.calls(), vec![RemoteCall::List]);
    assert_eq!(store.snapshot(), local);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn local_snapshot_failure_aborts_pass() {
    let store = Arc::new(MemoryTaskStore::with_tasks([Task::with_id(id("1"), "milk")]));
    store.set_fail_reads(true);
    let remote = Arc::new(MemoryRemoteService::with_tasks([Task::with_id(
        id("2"),
        "eggs",
    )]));
    let engine = SyncEngine::new(store.clone(), remote.clone(), IdLocks::new());

    let err = engine.sync().await.unwrap_err();

    assert!(matches!(err, SyncError::Store(_)));
    assert_eq!(remote.mutation_count(), 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn next_trigger_recovers_after_outage() {
    let store = Arc::new(MemoryTaskStore::with_tasks([Task::with_id(id("1"), "milk")]));
    let remote = Arc::new(MemoryRemoteService::new());
    let engine = SyncEngine::new(store.clone(), remote.clone(), IdLocks::new());

    remote.set_unreachable(true);
    assert!(engine.sync().await.is_err());

    remote.set_unreachable(false);
    let report = engine.sync().await.unwrap();
    assert_eq!(report.created, 1);
    assert!(remote.contains(&id("1")));
}

#[tokio::test]
async fn triggers_during_a_pass_queue_and_coalesce() {
    let store = Arc::new(MemoryTaskStore::new());
    let remote = Arc::new(SlowListRemote::new(Duration::from_millis(100)));
    let engine = Arc::new(SyncEngine::new(store, remote.clone(), IdLocks::new()));

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.sync().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let queued: Vec<_> = (0..5)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.sync().await })
        })
        .collect();

    assert!(first.await.unwrap().is_ok());
    for handle in queued {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(remote.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(remote.lists.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sequential_triggers_each_run_a_fresh_pass() {
    let store = Arc::new(MemoryTaskStore::new());
    let remote = Arc::new(MemoryRemoteService::new());
    let engine = SyncEngine::new(store, remote.clone(), IdLocks::new());

    engine.sync().await.unwrap();
    engine.sync().await.unwrap();

    assert_eq!(remote.calls(), vec![RemoteCall::List, RemoteCall::List]);
}

#[tokio::test]
async fn removal_waits_for_in_flight_push_of_same_id() {
    let store = Arc::new(MemoryTaskStore::with_tasks([Task::with_id(id("1"), "milk")]));
    let remote = Arc::new(GatedCreateRemote::new());
    let locks = IdLocks::new();
    let engine = Arc::new(SyncEngine::new(store.clone(), remote.clone(), locks.clone()));
    let service = Arc::new(TaskService::new(store.clone(), locks));

    let pass = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.sync().await })
    };
    remote.create_started.notified().await;

    let removal = {
        let service = service.clone();
        tokio::spawn(async move { service.remove_task(&id("1")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!removal.is_finished());
    assert!(store.get_by_id(&id("1")).await.unwrap().unwrap().is_active());

    remote.release_create.notify_one();
    let report = pass.await.unwrap().unwrap();
    assert_eq!(report.created, 1);
    removal.await.unwrap().unwrap();

    assert!(remote.inner.contains(&id("1")));
    assert!(store.get_by_id(&id("1")).await.unwrap().unwrap().deleted);

    let report = engine.sync().await.unwrap();
    assert_eq!(report.deleted, 1);
    assert!(!remote.inner.contains(&id("1")));
    assert!(store.get_by_id(&id("1")).await.unwrap().is_none());
}
