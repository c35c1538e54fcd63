use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use eventhook_core::cluster::ClusterStateListener;
use eventhook_core::hooks::HookSearch;
use eventhook_core::{
    ClusterChangedEvent, ClusterService, ClusterState, CompiledScript, DiscoveryNode,
    DispatchContext, DispatchCoordinator, DispatchOutcome, EventHookConfig, HookDocument,
    HookStore, LocalClusterService, RedbHookStore, ScriptEngine, ScriptKind, StoreError,
};
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};

const INDEX: &str = ".eventhook";

#[derive(Debug, Clone)]
struct Execution {
    script: String,
    event_type: String,
    is_master: bool,
    source: String,
}

/// Records compiles in submission order and reports executions on a channel.
///
/// Scripts starting with `fail-compile` fail to compile, `fail-exec` fail to
/// run, and `set:key=value` updates a transient cluster setting.
struct RecordingEngine {
    compiled: Mutex<Vec<String>>,
    tx: mpsc::UnboundedSender<Execution>,
}

#[async_trait]
impl ScriptEngine for RecordingEngine {
    async fn compile(&self, lang: &str, source: &str, kind: ScriptKind) -> Result<CompiledScript> {
        self.compiled.lock().push(source.to_string());
        if source.starts_with("fail-compile") {
            return Err(anyhow!("syntax error in {}", source));
        }
        Ok(CompiledScript {
            lang: lang.to_string(),
            kind,
            body: source.to_string(),
        })
    }

    async fn execute(&self, script: &CompiledScript, ctx: &DispatchContext) -> Result<()> {
        if script.body.starts_with("fail-exec") {
            return Err(anyhow!("runtime error"));
        }
        if let Some(setting) = script.body.strip_prefix("set:") {
            let (key, value) = setting.split_once('=').unwrap();
            ctx.cluster.set_transient_setting(key, value).await?;
        }
        let _ = self.tx.send(Execution {
            script: script.body.clone(),
            event_type: ctx.event_type.clone(),
            is_master: ctx.is_master,
            source: ctx.event.source().to_string(),
        });
        Ok(())
    }
}

/// Store double with programmable existence and failures
struct ScriptedStore {
    exists: Result<bool, fn() -> StoreError>,
    search_error: Option<fn() -> StoreError>,
    docs: Vec<HookDocument>,
    exists_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl ScriptedStore {
    fn new(docs: Vec<HookDocument>) -> Self {
        Self {
            exists: Ok(true),
            search_error: None,
            docs,
            exists_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HookStore for ScriptedStore {
    async fn index_exists(&self, _index: &str) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.exists.map_err(|make| make())
    }

    async fn search(&self, search: &HookSearch) -> Result<Vec<HookDocument>, StoreError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(make) = self.search_error {
            return Err(make());
        }
        Ok(search.select(self.docs.clone()))
    }
}

struct Harness {
    cluster: Arc<LocalClusterService>,
    coordinator: Arc<DispatchCoordinator>,
    engine: Arc<RecordingEngine>,
    executions: mpsc::UnboundedReceiver<Execution>,
}

impl Harness {
    fn new(store: Arc<dyn HookStore>, config: EventHookConfig) -> Self {
        let cluster = LocalClusterService::new(ClusterState::new(
            "test-cluster",
            DiscoveryNode::new("n1", "node-1"),
        ));
        cluster.start().unwrap();

        let (tx, executions) = mpsc::unbounded_channel();
        let engine = Arc::new(RecordingEngine {
            compiled: Mutex::new(Vec::new()),
            tx,
        });

        let coordinator = DispatchCoordinator::new(
            &config,
            cluster.clone(),
            cluster.clone(),
            store,
            engine.clone(),
        );
        coordinator.start().unwrap();

        Self {
            cluster,
            coordinator,
            engine,
            executions,
        }
    }

    async fn dispatch(&self, event_type: &str) -> DispatchOutcome {
        self.coordinator
            .dispatch(event_type, None)
            .expect("coordinator started")
            .await
            .unwrap()
    }

    async fn next_execution(&mut self) -> Execution {
        tokio::time::timeout(Duration::from_secs(5), self.executions.recv())
            .await
            .expect("hook did not run in time")
            .expect("engine dropped")
    }

    fn compiled(&self) -> Vec<String> {
        self.engine.compiled.lock().clone()
    }

    async fn elect(&self, master: Option<&str>) {
        let master = master.map(str::to_string);
        self.cluster
            .submit_state_update("elected-as-master ([1] nodes joined)", move |previous| {
                let mut state = previous.clone();
                state.version += 1;
                state.nodes.master_node_id = master;
                Ok(state)
            })
            .await
            .unwrap();
    }
}

fn redb_store(dir: &TempDir) -> RedbHookStore {
    RedbHookStore::open(dir.path().join("hooks.redb")).unwrap()
}

fn hook(priority: i64, script: &str) -> serde_json::Value {
    json!({"priority": priority, "lang": "test", "script": script, "script_type": "inline"})
}

fn doc(id: &str, category: &str, priority: i64) -> HookDocument {
    HookDocument {
        id: id.to_string(),
        category: category.to_string(),
        source: hook(priority, id),
    }
}

#[tokio::test]
async fn test_hooks_are_submitted_in_priority_order() {
    let dir = TempDir::new().unwrap();
    let store = redb_store(&dir);
    store.put_hook(INDEX, "on_master", "A", hook(2, "A")).unwrap();
    store.put_hook(INDEX, "on_master", "B", hook(1, "B")).unwrap();
    store.put_hook(INDEX, "on_master", "C", hook(2, "C")).unwrap();

    let harness = Harness::new(Arc::new(store), EventHookConfig::default());
    let outcome = harness.dispatch("on_master").await;
    assert_eq!(outcome.finished().await, 3);

    assert_eq!(harness.compiled(), vec!["B", "A", "C"]);
}

#[tokio::test]
async fn test_at_most_size_hooks_per_dispatch() {
    let dir = TempDir::new().unwrap();
    let store = redb_store(&dir);
    for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
        store.put_hook(INDEX, "foo", id, hook(i as i64, id)).unwrap();
    }

    let config = EventHookConfig {
        size: 2,
        ..EventHookConfig::default()
    };
    let harness = Harness::new(Arc::new(store), config);
    let outcome = harness.dispatch("foo").await;
    assert_eq!(outcome.finished().await, 2);

    assert_eq!(harness.compiled(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_dispatch_matches_exact_and_all_categories() {
    let dir = TempDir::new().unwrap();
    let store = redb_store(&dir);
    store.put_hook(INDEX, "foo", "exact", hook(2, "exact")).unwrap();
    store.put_hook(INDEX, "all", "wildcard", hook(1, "wildcard")).unwrap();
    store.put_hook(INDEX, "bar", "other", hook(0, "other")).unwrap();

    let harness = Harness::new(Arc::new(store), EventHookConfig::default());
    let outcome = harness.dispatch("foo").await;
    assert_eq!(outcome.finished().await, 2);

    assert_eq!(harness.compiled(), vec!["wildcard", "exact"]);
}

#[tokio::test]
async fn test_missing_store_runs_no_query_and_no_hooks() {
    let mut store = ScriptedStore::new(vec![doc("a", "all", 1)]);
    store.exists = Ok(false);
    let store = Arc::new(store);

    let harness = Harness::new(store.clone(), EventHookConfig::default());
    let outcome = harness.dispatch("foo").await;

    assert!(matches!(outcome, DispatchOutcome::StoreMissing));
    assert_eq!(store.exists_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.search_calls.load(Ordering::SeqCst), 0);
    assert!(harness.compiled().is_empty());
}

#[tokio::test]
async fn test_store_failures_are_classified() {
    let mut blocked = ScriptedStore::new(vec![]);
    blocked.exists = Err(|| StoreError::Unavailable("state not recovered".into()));
    let harness = Harness::new(Arc::new(blocked), EventHookConfig::default());
    assert!(matches!(
        harness.dispatch("foo").await,
        DispatchOutcome::Unavailable
    ));

    let mut not_ready = ScriptedStore::new(vec![]);
    not_ready.search_error = Some(|| StoreError::NotReady(INDEX.into()));
    let harness = Harness::new(Arc::new(not_ready), EventHookConfig::default());
    assert!(matches!(
        harness.dispatch("foo").await,
        DispatchOutcome::Unavailable
    ));

    let mut broken = ScriptedStore::new(vec![]);
    broken.search_error = Some(|| StoreError::QueryFailed(anyhow!("shard failure")));
    let harness = Harness::new(Arc::new(broken), EventHookConfig::default());
    assert!(matches!(harness.dispatch("foo").await, DispatchOutcome::Failed));
}

#[tokio::test]
async fn test_empty_result_is_not_an_error() {
    let store = Arc::new(ScriptedStore::new(vec![doc("a", "bar", 1)]));
    let harness = Harness::new(store, EventHookConfig::default());
    assert!(matches!(harness.dispatch("foo").await, DispatchOutcome::NoHooks));
}

#[tokio::test]
async fn test_failing_hook_does_not_block_siblings() {
    let store = Arc::new(ScriptedStore::new(vec![
        doc("fail-compile", "foo", 1),
        doc("fail-exec", "foo", 2),
        doc("second", "foo", 3),
    ]));

    let mut harness = Harness::new(store, EventHookConfig::default());
    let outcome = harness.dispatch("foo").await;
    assert_eq!(outcome.finished().await, 3);

    assert_eq!(
        harness.compiled(),
        vec!["fail-compile", "fail-exec", "second"]
    );
    let execution = harness.next_execution().await;
    assert_eq!(execution.script, "second");
    assert!(harness.executions.try_recv().is_err());
}

#[tokio::test]
async fn test_master_transitions_set_flag_before_dispatch() {
    let store = Arc::new(ScriptedStore::new(vec![
        doc("gained", "on_master", 1),
        doc("lost", "off_master", 1),
    ]));
    let mut harness = Harness::new(store, EventHookConfig::default());

    harness.elect(Some("n1")).await;
    let execution = harness.next_execution().await;
    assert_eq!(execution.script, "gained");
    assert_eq!(execution.event_type, "on_master");
    assert!(execution.is_master);
    assert_eq!(execution.source, "");
    assert!(harness.coordinator.state().is_master());

    harness.elect(None).await;
    let execution = harness.next_execution().await;
    assert_eq!(execution.script, "lost");
    assert_eq!(execution.event_type, "off_master");
    assert!(!execution.is_master);
    assert!(!harness.coordinator.state().is_master());
}

#[tokio::test]
async fn test_state_change_resolves_event_type_from_source() {
    let store = Arc::new(ScriptedStore::new(vec![doc(
        "allocation_enable",
        "zen_disco:_node_left",
        1,
    )]));
    let mut harness = Harness::new(store, EventHookConfig::default());

    harness
        .cluster
        .submit_state_update("zen-disco: node left [n2]", |previous| {
            let mut state = previous.clone();
            state.version += 1;
            Ok(state)
        })
        .await
        .unwrap();

    let execution = harness.next_execution().await;
    assert_eq!(execution.script, "allocation_enable");
    assert_eq!(execution.event_type, "zen_disco:_node_left");
    assert_eq!(execution.source, "zen-disco: node left [n2]");
}

/// Wait until the store has seen `expected` existence checks
async fn wait_for_checks(store: &ScriptedStore, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.exists_calls.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("store was not checked in time");
}

fn settings_event(harness: &Harness, enable: &str) -> ClusterChangedEvent {
    let mut state = (*harness.cluster.state()).clone();
    state
        .metadata
        .transient_settings
        .insert("cluster.eventhook.enable".into(), enable.into());
    let state = Arc::new(state);
    ClusterChangedEvent::new("update-settings", state.clone(), state)
}

// A pipeline spawned by cluster_changed is queued ahead of the direct
// dispatch, so it has run by the time the direct dispatch completes.
#[tokio::test]
async fn test_disabled_hooks_skip_store_checks() {
    let store = Arc::new(ScriptedStore::new(vec![doc("a", "all", 1)]));
    let harness = Harness::new(store.clone(), EventHookConfig::default());

    let state = harness.cluster.state();
    let event = ClusterChangedEvent::new("reroute", state.clone(), state);

    harness.coordinator.set_hooks_enabled(false);
    harness.coordinator.cluster_changed(&event);
    assert_eq!(harness.dispatch("reroute").await.finished().await, 1);
    assert_eq!(store.exists_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.compiled(), vec!["a"]);

    harness.coordinator.set_hooks_enabled(true);
    harness.coordinator.cluster_changed(&event);
    wait_for_checks(&store, 2).await;
}

#[tokio::test]
async fn test_cluster_setting_overrides_enable_flag() {
    let store = Arc::new(ScriptedStore::new(vec![doc("a", "all", 1)]));
    let harness = Harness::new(store.clone(), EventHookConfig::default());

    harness
        .coordinator
        .cluster_changed(&settings_event(&harness, "false"));
    assert_eq!(harness.dispatch("reroute").await.finished().await, 1);
    assert_eq!(store.exists_calls.load(Ordering::SeqCst), 1);

    harness.coordinator.set_hooks_enabled(false);
    harness
        .coordinator
        .cluster_changed(&settings_event(&harness, "true"));
    wait_for_checks(&store, 2).await;
}

#[tokio::test]
async fn test_enable_setting_accepts_common_bool_spellings() {
    let store = Arc::new(ScriptedStore::new(vec![doc("a", "all", 1)]));
    let harness = Harness::new(store.clone(), EventHookConfig::default());

    let mut checks = 0;
    for disabled in ["False", "FALSE", "off", "0", "no"] {
        harness
            .coordinator
            .cluster_changed(&settings_event(&harness, disabled));
        harness.dispatch("reroute").await.finished().await;
        checks += 1;
        assert_eq!(
            store.exists_calls.load(Ordering::SeqCst),
            checks,
            "{disabled:?} should disable hooks"
        );
    }

    harness.coordinator.set_hooks_enabled(false);
    for enabled in ["TRUE", "on"] {
        harness
            .coordinator
            .cluster_changed(&settings_event(&harness, enabled));
        checks += 1;
        wait_for_checks(&store, checks).await;
    }

    // Unrecognized values fall back to the local flag
    harness
        .coordinator
        .cluster_changed(&settings_event(&harness, "maybe"));
    harness.dispatch("reroute").await.finished().await;
    assert_eq!(store.exists_calls.load(Ordering::SeqCst), checks + 1);
}

/// Store whose search blocks until released
struct GatedStore {
    docs: Vec<HookDocument>,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl HookStore for GatedStore {
    async fn index_exists(&self, _index: &str) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn search(&self, search: &HookSearch) -> Result<Vec<HookDocument>, StoreError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(search.select(self.docs.clone()))
    }
}

#[tokio::test]
async fn test_stop_during_query_submits_nothing() {
    let store = Arc::new(GatedStore {
        docs: vec![doc("a", "foo", 1), doc("b", "all", 2)],
        entered: Notify::new(),
        release: Notify::new(),
    });
    let harness = Harness::new(store.clone(), EventHookConfig::default());

    let pending = harness.coordinator.dispatch("foo", None).unwrap();
    store.entered.notified().await;
    harness.coordinator.stop();
    store.release.notify_one();

    let outcome = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .expect("dispatch did not finish")
        .unwrap();
    assert!(matches!(outcome, DispatchOutcome::Stopped));
    assert!(harness.compiled().is_empty());
}

#[tokio::test]
async fn test_hook_can_update_transient_settings() {
    let dir = TempDir::new().unwrap();
    let store = redb_store(&dir);
    store
        .put_hook(
            INDEX,
            "routing_table_updater",
            "allocation_disable",
            hook(1, "set:cluster.routing.allocation.enable=none"),
        )
        .unwrap();
    let mut harness = Harness::new(Arc::new(store), EventHookConfig::default());

    harness
        .cluster
        .submit_state_update("routing-table-updater", |previous| {
            let mut state = previous.clone();
            state.version += 1;
            state.routing_table.version += 1;
            Ok(state)
        })
        .await
        .unwrap();

    let execution = harness.next_execution().await;
    assert_eq!(execution.event_type, "routing_table_updater");
    assert_eq!(
        harness
            .cluster
            .state()
            .metadata
            .setting("cluster.routing.allocation.enable"),
        Some("none")
    );
}

#[tokio::test]
async fn test_lifecycle() {
    let store = Arc::new(ScriptedStore::new(vec![doc("a", "all", 1)]));
    let cluster = LocalClusterService::new(ClusterState::default());
    let (tx, _rx) = mpsc::unbounded_channel();
    let engine = Arc::new(RecordingEngine {
        compiled: Mutex::new(Vec::new()),
        tx,
    });
    let coordinator = DispatchCoordinator::new(
        &EventHookConfig::default(),
        cluster.clone(),
        cluster.clone(),
        store.clone(),
        engine,
    );

    assert!(coordinator.dispatch("foo", None).is_none());

    coordinator.start().unwrap();
    assert!(coordinator.is_started());
    assert!(coordinator.start().is_err());

    coordinator.stop();
    assert!(!coordinator.is_started());
    assert!(coordinator.dispatch("foo", None).is_none());
    assert!(coordinator.start().is_err());
    assert_eq!(store.exists_calls.load(Ordering::SeqCst), 0);
}
