use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::state::{ClusterChangedEvent, ClusterState, DiscoveryNode};

/// Handle returned when a listener is attached, used to detach it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Receives every applied cluster state transition
pub trait ClusterStateListener: Send + Sync {
    fn cluster_changed(&self, event: &ClusterChangedEvent);
}

/// Receives master election changes for the local node
pub trait LocalNodeMasterListener: Send + Sync {
    fn on_master(&self);
    fn off_master(&self);
}

/// Notification source and local state accessor.
///
/// Implementations deliver callbacks one at a time, never concurrently.
pub trait ClusterService: Send + Sync {
    /// Current applied state
    fn state(&self) -> Arc<ClusterState>;

    fn add_state_listener(&self, listener: Arc<dyn ClusterStateListener>) -> ListenerId;

    fn remove_state_listener(&self, id: ListenerId) -> bool;

    fn add_master_listener(&self, listener: Arc<dyn LocalNodeMasterListener>) -> ListenerId;

    fn remove_master_listener(&self, id: ListenerId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsScope {
    Persistent,
    Transient,
}

/// Node information returned by a nodes-info request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node: DiscoveryNode,
    pub cluster_name: String,
    pub master: bool,
}

/// Remote admin operations available to hook scripts
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Info for the given node ids; an empty slice means all nodes
    async fn nodes_info(&self, node_ids: &[String]) -> Result<Vec<NodeInfo>>;

    /// Update one dynamic cluster setting, returns whether it was acknowledged
    async fn update_settings(&self, scope: SettingsScope, key: &str, value: &str) -> Result<bool>;
}
