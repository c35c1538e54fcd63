use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::service::{
    ClusterClient, ClusterService, ClusterStateListener, ListenerId, LocalNodeMasterListener,
    NodeInfo, SettingsScope,
};
use super::state::{ClusterChangedEvent, ClusterState};

type StateUpdate = Box<dyn FnOnce(&ClusterState) -> Result<ClusterState> + Send>;

struct UpdateTask {
    source: String,
    update: StateUpdate,
    ack: oneshot::Sender<Result<Arc<ClusterState>>>,
}

/// The local node's view of the cluster.
///
/// Every state change, whether published by the external coordinator or
/// produced locally by a settings update, goes through one queue drained by a
/// single applier task, so listeners are never called concurrently.
pub struct LocalClusterService {
    state: RwLock<Arc<ClusterState>>,
    state_listeners: RwLock<Vec<(ListenerId, Arc<dyn ClusterStateListener>)>>,
    master_listeners: RwLock<Vec<(ListenerId, Arc<dyn LocalNodeMasterListener>)>>,
    next_listener_id: AtomicU64,
    update_tx: mpsc::UnboundedSender<UpdateTask>,
    update_rx: Mutex<Option<mpsc::UnboundedReceiver<UpdateTask>>>,
}

impl LocalClusterService {
    pub fn new(initial: ClusterState) -> Arc<Self> {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            state: RwLock::new(Arc::new(initial)),
            state_listeners: RwLock::new(Vec::new()),
            master_listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            update_tx,
            update_rx: Mutex::new(Some(update_rx)),
        })
    }

    /// Spawn the applier task. Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        let mut rx = self
            .update_rx
            .lock()
            .take()
            .context("Cluster service already started")?;
        let service: Weak<Self> = Arc::downgrade(self);

        info!(cluster = %self.state().cluster_name, "Starting cluster state applier");

        Ok(tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                let Some(service) = service.upgrade() else {
                    break;
                };
                service.apply(task);
            }
            debug!("Cluster state applier stopped");
        }))
    }

    /// Queue a state transformation and wait until it has been applied
    pub async fn submit_state_update<F>(
        &self,
        source: impl Into<String>,
        update: F,
    ) -> Result<Arc<ClusterState>>
    where
        F: FnOnce(&ClusterState) -> Result<ClusterState> + Send + 'static,
    {
        if self.update_rx.lock().is_some() {
            anyhow::bail!("Cluster service not started");
        }

        let (ack, applied) = oneshot::channel();
        self.update_tx
            .send(UpdateTask {
                source: source.into(),
                update: Box::new(update),
                ack,
            })
            .map_err(|_| anyhow!("Cluster state applier is not running"))?;

        applied.await.context("Cluster state update was dropped")?
    }

    /// Apply a state published by the cluster coordinator.
    ///
    /// The published state is re-anchored on the local node id, and the local
    /// node is kept in the member list if the publisher omitted it.
    pub async fn publish(
        &self,
        source: impl Into<String>,
        state: ClusterState,
    ) -> Result<Arc<ClusterState>> {
        self.submit_state_update(source, move |previous| {
            let mut state = state;
            let local_id = previous.nodes.local_node_id.clone();
            if !state.nodes.nodes.contains_key(&local_id) {
                if let Some(local) = previous.nodes.local_node() {
                    state.nodes.nodes.insert(local_id.clone(), local.clone());
                }
            }
            state.nodes.local_node_id = local_id;
            Ok(state)
        })
        .await
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed))
    }

    fn apply(&self, task: UpdateTask) {
        let previous = self.state();

        let new_state = match (task.update)(&previous) {
            Ok(state) => Arc::new(state),
            Err(e) => {
                warn!(source = %task.source, error = %e, "Cluster state update rejected");
                let _ = task.ack.send(Err(e));
                return;
            }
        };

        *self.state.write() = new_state.clone();

        debug!(
            source = %task.source,
            version = new_state.version,
            "Applied cluster state"
        );

        let event = ClusterChangedEvent::new(task.source, new_state.clone(), previous.clone());

        // Snapshot so listeners may detach themselves from inside a callback
        let state_listeners = self.state_listeners.read().clone();
        for (id, listener) in state_listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.cluster_changed(&event))).is_err() {
                error!(listener = id.0, "Cluster state listener panicked");
            }
        }

        let was_master = previous.nodes.local_node_master();
        let is_master = new_state.nodes.local_node_master();
        if was_master != is_master {
            info!(is_master, "Local node master status changed");
            let master_listeners = self.master_listeners.read().clone();
            for (id, listener) in master_listeners {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    if is_master {
                        listener.on_master()
                    } else {
                        listener.off_master()
                    }
                }));
                if result.is_err() {
                    error!(listener = id.0, "Master listener panicked");
                }
            }
        }

        let _ = task.ack.send(Ok(new_state));
    }
}

impl ClusterService for LocalClusterService {
    fn state(&self) -> Arc<ClusterState> {
        self.state.read().clone()
    }

    fn add_state_listener(&self, listener: Arc<dyn ClusterStateListener>) -> ListenerId {
        let id = self.next_id();
        self.state_listeners.write().push((id, listener));
        id
    }

    fn remove_state_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.state_listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn add_master_listener(&self, listener: Arc<dyn LocalNodeMasterListener>) -> ListenerId {
        let id = self.next_id();
        self.master_listeners.write().push((id, listener));
        id
    }

    fn remove_master_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.master_listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

#[async_trait]
impl ClusterClient for LocalClusterService {
    async fn nodes_info(&self, node_ids: &[String]) -> Result<Vec<NodeInfo>> {
        let state = self.state();
        let master_id = state.nodes.master_node_id.as_deref();

        Ok(state
            .nodes
            .nodes
            .values()
            .filter(|node| node_ids.is_empty() || node_ids.contains(&node.id))
            .map(|node| NodeInfo {
                node: node.clone(),
                cluster_name: state.cluster_name.clone(),
                master: master_id == Some(node.id.as_str()),
            })
            .collect())
    }

    async fn update_settings(&self, scope: SettingsScope, key: &str, value: &str) -> Result<bool> {
        let source = format!("cluster_update_settings ({})", key);
        let key = key.to_string();
        let value = value.to_string();

        self.submit_state_update(source, move |previous| {
            let mut state = previous.clone();
            let settings = match scope {
                SettingsScope::Persistent => &mut state.metadata.persistent_settings,
                SettingsScope::Transient => &mut state.metadata.transient_settings,
            };
            settings.insert(key, value);
            state.metadata.version += 1;
            state.version += 1;
            Ok(state)
        })
        .await
        .context("Failed to update cluster settings")?;

        Ok(true)
    }
}
