use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A member of the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_master_eligible")]
    pub master_eligible: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn default_master_eligible() -> bool {
    true
}

impl DiscoveryNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: String::new(),
            master_eligible: default_master_eligible(),
            attributes: BTreeMap::new(),
        }
    }
}

/// Membership view: all known nodes plus which one is local and which is master
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNodes {
    #[serde(default)]
    pub local_node_id: String,
    #[serde(default)]
    pub master_node_id: Option<String>,
    #[serde(default)]
    pub nodes: BTreeMap<String, DiscoveryNode>,
}

impl DiscoveryNodes {
    pub fn local_node(&self) -> Option<&DiscoveryNode> {
        self.nodes.get(&self.local_node_id)
    }

    pub fn master_node(&self) -> Option<&DiscoveryNode> {
        self.master_node_id
            .as_ref()
            .and_then(|id| self.nodes.get(id))
    }

    pub fn local_node_master(&self) -> bool {
        !self.local_node_id.is_empty()
            && self.master_node_id.as_deref() == Some(self.local_node_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Difference between this view and an older one
    pub fn delta(&self, previous: &DiscoveryNodes) -> NodesDelta {
        let added = self
            .nodes
            .values()
            .filter(|n| !previous.nodes.contains_key(&n.id))
            .cloned()
            .collect();
        let removed = previous
            .nodes
            .values()
            .filter(|n| !self.nodes.contains_key(&n.id))
            .cloned()
            .collect();

        NodesDelta {
            local_node_id: self.local_node_id.clone(),
            previous_master_id: previous.master_node_id.clone(),
            new_master_id: self.master_node_id.clone(),
            added,
            removed,
        }
    }
}

/// Node membership changes between two cluster states
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesDelta {
    pub local_node_id: String,
    pub previous_master_id: Option<String>,
    pub new_master_id: Option<String>,
    pub added: Vec<DiscoveryNode>,
    pub removed: Vec<DiscoveryNode>,
}

impl NodesDelta {
    pub fn has_changes(&self) -> bool {
        self.master_node_changed() || !self.added.is_empty() || !self.removed.is_empty()
    }

    pub fn master_node_changed(&self) -> bool {
        self.previous_master_id != self.new_master_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: String,
    #[serde(default)]
    pub version: u64,
}

/// Cluster-wide metadata: index definitions and dynamic settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub indices: BTreeMap<String, IndexMetadata>,
    #[serde(default)]
    pub persistent_settings: BTreeMap<String, String>,
    #[serde(default)]
    pub transient_settings: BTreeMap<String, String>,
}

impl Metadata {
    pub fn has_index(&self, index: &str) -> bool {
        self.indices.contains_key(index)
    }

    /// Effective value of a dynamic setting; transient wins over persistent
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.transient_settings
            .get(key)
            .or_else(|| self.persistent_settings.get(key))
            .map(String::as_str)
    }
}

/// Per-index routing versions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub indices: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterBlocks {
    #[serde(default)]
    pub global: BTreeSet<String>,
}

/// Immutable snapshot of the cluster as seen by the local node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub nodes: DiscoveryNodes,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub routing_table: RoutingTable,
    #[serde(default)]
    pub blocks: ClusterBlocks,
}

impl ClusterState {
    /// Initial state of a node that has joined no cluster yet: only itself, no master
    pub fn new(cluster_name: impl Into<String>, local_node: DiscoveryNode) -> Self {
        let mut nodes = DiscoveryNodes {
            local_node_id: local_node.id.clone(),
            ..Default::default()
        };
        nodes.nodes.insert(local_node.id.clone(), local_node);

        Self {
            cluster_name: cluster_name.into(),
            nodes,
            ..Default::default()
        }
    }
}

/// A state transition delivered to cluster state listeners
#[derive(Debug, Clone)]
pub struct ClusterChangedEvent {
    source: String,
    state: Arc<ClusterState>,
    previous_state: Arc<ClusterState>,
    nodes_delta: NodesDelta,
}

impl ClusterChangedEvent {
    pub fn new(
        source: impl Into<String>,
        state: Arc<ClusterState>,
        previous_state: Arc<ClusterState>,
    ) -> Self {
        let nodes_delta = state.nodes.delta(&previous_state.nodes);
        Self {
            source: source.into(),
            state,
            previous_state,
            nodes_delta,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> &Arc<ClusterState> {
        &self.state
    }

    pub fn previous_state(&self) -> &Arc<ClusterState> {
        &self.previous_state
    }

    pub fn routing_table_changed(&self) -> bool {
        self.state.routing_table != self.previous_state.routing_table
    }

    pub fn index_routing_table_changed(&self, index: &str) -> bool {
        self.state.routing_table.indices.get(index)
            != self.previous_state.routing_table.indices.get(index)
    }

    pub fn indices_created(&self) -> Vec<String> {
        self.state
            .metadata
            .indices
            .keys()
            .filter(|name| !self.previous_state.metadata.has_index(name))
            .cloned()
            .collect()
    }

    pub fn indices_deleted(&self) -> Vec<String> {
        self.previous_state
            .metadata
            .indices
            .keys()
            .filter(|name| !self.state.metadata.has_index(name))
            .cloned()
            .collect()
    }

    pub fn metadata_changed(&self) -> bool {
        self.state.metadata != self.previous_state.metadata
    }

    /// Whether `current` differs from the same index in the previous state
    pub fn index_metadata_changed(&self, current: &IndexMetadata) -> bool {
        self.previous_state.metadata.indices.get(&current.name) != Some(current)
    }

    pub fn blocks_changed(&self) -> bool {
        self.state.blocks != self.previous_state.blocks
    }

    pub fn local_node_master(&self) -> bool {
        self.state.nodes.local_node_master()
    }

    pub fn nodes_delta(&self) -> &NodesDelta {
        &self.nodes_delta
    }

    pub fn nodes_removed(&self) -> bool {
        !self.nodes_delta.removed.is_empty()
    }

    pub fn nodes_added(&self) -> bool {
        !self.nodes_delta.added.is_empty()
    }

    pub fn nodes_changed(&self) -> bool {
        self.nodes_added() || self.nodes_removed()
    }
}
