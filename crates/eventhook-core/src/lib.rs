pub mod cluster;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod event_type;
pub mod hooks;
pub mod storage;

pub use cluster::{
    ClusterChangedEvent, ClusterClient, ClusterService, ClusterState, ClusterStateListener,
    DiscoveryNode, LocalClusterService, LocalNodeMasterListener, NodeInfo, SettingsScope,
};
pub use config::EventHookConfig;
pub use context::{ClusterAccessor, DispatchContext, EventContextBuilder, EventFacts, NodesAccessor};
pub use coordinator::{CoordinatorState, DispatchCoordinator, DispatchOutcome};
pub use hooks::{
    CompiledScript, HookDefinition, HookDocument, HookInvoker, HookStore, HookStoreGateway,
    ScriptEngine, ScriptKind, StoreError, StoredScripts,
};
pub use storage::RedbHookStore;

/// Initialize structured JSON logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
