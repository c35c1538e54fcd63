pub mod local;
pub mod service;
pub mod state;

pub use local::LocalClusterService;
pub use service::{
    ClusterClient, ClusterService, ClusterStateListener, ListenerId, LocalNodeMasterListener,
    NodeInfo, SettingsScope,
};
pub use state::{
    ClusterBlocks, ClusterChangedEvent, ClusterState, DiscoveryNode, DiscoveryNodes,
    IndexMetadata, Metadata, NodesDelta, RoutingTable,
};
