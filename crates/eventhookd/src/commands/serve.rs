use std::sync::Arc;

use anyhow::Result;
use eventhook_gateway::{start_server, AppState, AuthConfig};
use tracing::info;

use super::Node;
use crate::config::Config;

pub async fn execute(host: Option<String>, port: Option<u16>, config: &Config) -> Result<()> {
    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);

    info!(
        cluster = %config.cluster.name,
        node_id = %config.cluster.node_id,
        dry_run = config.scripts.dry_run,
        "Starting eventhook node"
    );

    let node = Node::start(config, false)?;

    let state = AppState {
        cluster: node.cluster.clone(),
        coordinator: node.coordinator.clone(),
        auth_config: Arc::new(AuthConfig::new(config.gateway.api_token.clone())),
    };

    let result = start_server(state, &host, port).await;
    node.stop();
    result
}
