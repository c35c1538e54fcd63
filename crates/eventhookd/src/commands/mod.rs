pub mod emit;
pub mod hook;
pub mod init;
pub mod script;
pub mod serve;

use std::sync::Arc;

use anyhow::{Context, Result};
use eventhook_adapters::ShellScriptEngine;
use eventhook_core::{
    ClusterState, DiscoveryNode, DispatchCoordinator, LocalClusterService, RedbHookStore,
};

use crate::config::Config;

/// Open the hook store, creating its parent directory on first use
pub fn open_store(config: &Config) -> Result<RedbHookStore> {
    let path = config.store.resolved_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create store directory {:?}", parent))?;
    }
    RedbHookStore::open(&path)
}

/// A local node: cluster view plus a started dispatch coordinator
pub struct Node {
    pub cluster: Arc<LocalClusterService>,
    pub coordinator: Arc<DispatchCoordinator>,
}

impl Node {
    /// Build and start a node. Must be called inside a tokio runtime.
    pub fn start(config: &Config, elected_master: bool) -> Result<Self> {
        let store = open_store(config)?;

        let local = DiscoveryNode::new(&config.cluster.node_id, config.cluster.node_name());
        let mut initial = ClusterState::new(&config.cluster.name, local);
        if elected_master {
            initial.nodes.master_node_id = Some(config.cluster.node_id.clone());
        }
        let cluster = LocalClusterService::new(initial);
        cluster.start()?;

        let engine = ShellScriptEngine::new(config.scripts.resolved_dir(), config.scripts.dry_run)
            .with_blocklist(config.scripts.blocklist.clone())
            .with_stored_scripts(Arc::new(store.clone()));

        let coordinator = DispatchCoordinator::new(
            &config.eventhook,
            cluster.clone(),
            cluster.clone(),
            Arc::new(store),
            Arc::new(engine),
        );
        coordinator.start()?;
        // The initial state is not a transition, so no on_master fires for it
        coordinator.state().set_master(elected_master);

        Ok(Self {
            cluster,
            coordinator,
        })
    }

    pub fn stop(&self) {
        self.coordinator.stop();
    }
}
