use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cluster::{
    ClusterChangedEvent, ClusterClient, ClusterService, ClusterState, DiscoveryNode,
    IndexMetadata, NodeInfo, NodesDelta, SettingsScope,
};
use crate::coordinator::CoordinatorState;

/// Read-only view of the notification that triggered a dispatch.
///
/// Master transitions have no notification; their facts fall back to the
/// cluster state captured when the context was built, with every change flag
/// false.
#[derive(Debug, Clone)]
pub struct EventFacts {
    event: Option<Arc<ClusterChangedEvent>>,
    current: Arc<ClusterState>,
}

impl EventFacts {
    pub fn from_event(event: Arc<ClusterChangedEvent>) -> Self {
        let current = event.state().clone();
        Self {
            event: Some(event),
            current,
        }
    }

    pub fn synthesized(current: Arc<ClusterState>) -> Self {
        Self {
            event: None,
            current,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        self.event.is_none()
    }

    pub fn source(&self) -> &str {
        self.event.as_ref().map(|e| e.source()).unwrap_or("")
    }

    pub fn state(&self) -> &Arc<ClusterState> {
        match &self.event {
            Some(event) => event.state(),
            None => &self.current,
        }
    }

    pub fn previous_state(&self) -> &Arc<ClusterState> {
        match &self.event {
            Some(event) => event.previous_state(),
            None => &self.current,
        }
    }

    pub fn routing_table_changed(&self) -> bool {
        self.event
            .as_ref()
            .is_some_and(|e| e.routing_table_changed())
    }

    pub fn index_routing_table_changed(&self, index: &str) -> bool {
        self.event
            .as_ref()
            .is_some_and(|e| e.index_routing_table_changed(index))
    }

    pub fn indices_created(&self) -> Vec<String> {
        self.event
            .as_ref()
            .map(|e| e.indices_created())
            .unwrap_or_default()
    }

    pub fn indices_deleted(&self) -> Vec<String> {
        self.event
            .as_ref()
            .map(|e| e.indices_deleted())
            .unwrap_or_default()
    }

    pub fn metadata_changed(&self) -> bool {
        self.event.as_ref().is_some_and(|e| e.metadata_changed())
    }

    pub fn index_metadata_changed(&self, current: &IndexMetadata) -> bool {
        self.event
            .as_ref()
            .is_some_and(|e| e.index_metadata_changed(current))
    }

    pub fn blocks_changed(&self) -> bool {
        self.event.as_ref().is_some_and(|e| e.blocks_changed())
    }

    pub fn local_node_master(&self) -> bool {
        match &self.event {
            Some(event) => event.local_node_master(),
            None => self.current.nodes.local_node_master(),
        }
    }

    pub fn nodes_delta(&self) -> NodesDelta {
        match &self.event {
            Some(event) => event.nodes_delta().clone(),
            None => self.state().nodes.delta(&self.previous_state().nodes),
        }
    }

    pub fn nodes_removed(&self) -> bool {
        self.event.as_ref().is_some_and(|e| e.nodes_removed())
    }

    pub fn nodes_added(&self) -> bool {
        self.event.as_ref().is_some_and(|e| e.nodes_added())
    }

    pub fn nodes_changed(&self) -> bool {
        self.event.as_ref().is_some_and(|e| e.nodes_changed())
    }

    pub fn to_json(&self) -> Value {
        json!({
            "source": self.source(),
            "state_version": self.state().version,
            "previous_state_version": self.previous_state().version,
            "routing_table_changed": self.routing_table_changed(),
            "metadata_changed": self.metadata_changed(),
            "blocks_changed": self.blocks_changed(),
            "local_node_master": self.local_node_master(),
            "nodes_added": self.nodes_added(),
            "nodes_removed": self.nodes_removed(),
            "indices_created": self.indices_created(),
            "indices_deleted": self.indices_deleted(),
            "nodes_delta": self.nodes_delta(),
        })
    }
}

/// Node introspection for hook scripts
#[derive(Clone)]
pub struct NodesAccessor {
    client: Arc<dyn ClusterClient>,
}

impl NodesAccessor {
    /// Remote nodes-info lookup; an empty slice asks for every node
    pub async fn node_info(&self, node_ids: &[String]) -> Result<Vec<NodeInfo>> {
        self.client.nodes_info(node_ids).await
    }
}

/// Cluster settings access for hook scripts. Reads use the live local state.
#[derive(Clone)]
pub struct ClusterAccessor {
    cluster: Arc<dyn ClusterService>,
    client: Arc<dyn ClusterClient>,
}

impl ClusterAccessor {
    pub fn local_node(&self) -> Option<DiscoveryNode> {
        self.cluster.state().nodes.local_node().cloned()
    }

    pub fn persistent_setting(&self, key: &str) -> Option<String> {
        self.cluster
            .state()
            .metadata
            .persistent_settings
            .get(key)
            .cloned()
    }

    pub fn transient_setting(&self, key: &str) -> Option<String> {
        self.cluster
            .state()
            .metadata
            .transient_settings
            .get(key)
            .cloned()
    }

    pub async fn set_persistent_setting(&self, key: &str, value: &str) -> Result<bool> {
        self.client
            .update_settings(SettingsScope::Persistent, key, value)
            .await
    }

    pub async fn set_transient_setting(&self, key: &str, value: &str) -> Result<bool> {
        self.client
            .update_settings(SettingsScope::Transient, key, value)
            .await
    }
}

/// Everything a hook script can see during one dispatch
#[derive(Clone)]
pub struct DispatchContext {
    pub dispatch_id: Uuid,
    pub dispatched_at: DateTime<Utc>,
    pub event_type: String,
    /// Master flag captured when the dispatch started
    pub is_master: bool,
    pub event: EventFacts,
    pub nodes: NodesAccessor,
    pub cluster: ClusterAccessor,
}

impl DispatchContext {
    /// JSON snapshot of the context for engines that bind variables dynamically
    pub fn bindings(&self) -> Value {
        json!({
            "dispatch_id": self.dispatch_id.to_string(),
            "dispatched_at": self.dispatched_at.to_rfc3339(),
            "event_type": self.event_type,
            "is_master": self.is_master,
            "local_node": self.cluster.local_node(),
            "event": self.event.to_json(),
        })
    }
}

/// Assembles dispatch contexts. Performs no remote calls.
#[derive(Clone)]
pub struct EventContextBuilder {
    cluster: Arc<dyn ClusterService>,
    client: Arc<dyn ClusterClient>,
}

impl EventContextBuilder {
    pub fn new(cluster: Arc<dyn ClusterService>, client: Arc<dyn ClusterClient>) -> Self {
        Self { cluster, client }
    }

    pub fn build(
        &self,
        state: &CoordinatorState,
        event_type: impl Into<String>,
        event: Option<Arc<ClusterChangedEvent>>,
    ) -> DispatchContext {
        let facts = match event {
            Some(event) => EventFacts::from_event(event),
            None => EventFacts::synthesized(self.cluster.state()),
        };

        DispatchContext {
            dispatch_id: Uuid::new_v4(),
            dispatched_at: Utc::now(),
            event_type: event_type.into(),
            is_master: state.is_master(),
            event: facts,
            nodes: NodesAccessor {
                client: self.client.clone(),
            },
            cluster: ClusterAccessor {
                cluster: self.cluster.clone(),
                client: self.client.clone(),
            },
        }
    }
}
