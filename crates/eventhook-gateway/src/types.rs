use eventhook_core::{ClusterState, DiscoveryNode};
use serde::{Deserialize, Serialize};

/// A cluster state published by the cluster coordinator
#[derive(Debug, Deserialize)]
pub struct PublishStateRequest {
    /// Free-text description of the change, e.g. `zen-disco: node left [n2]`
    pub source: String,
    pub state: ClusterState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishStateResponse {
    pub version: u64,
    pub accepted_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HooksEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HooksEnabledResponse {
    pub enabled: bool,
}

/// Local node view of the cluster and dispatch state
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub cluster_name: String,
    pub state_version: u64,
    pub is_master: bool,
    pub hooks_enabled: bool,
    pub local_node: Option<DiscoveryNode>,
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
