use std::sync::Arc;

use anyhow::{bail, Result};
use eventhook_core::{event_type, ClusterChangedEvent, ClusterService, DispatchOutcome};

use super::Node;
use crate::config::Config;

/// Dispatch one synthetic cluster notification and wait for its hooks
pub async fn execute(source: &str, master: bool, config: &Config) -> Result<()> {
    let node = Node::start(config, master)?;

    if !node.coordinator.hooks_enabled() {
        println!("Event hooks are disabled");
        node.stop();
        return Ok(());
    }

    let state = node.cluster.state();
    let event = Arc::new(ClusterChangedEvent::new(source, state.clone(), state));
    let event_type = event_type::resolve(Some(source));

    let Some(dispatch) = node.coordinator.dispatch(event_type.clone(), Some(event)) else {
        bail!("Dispatch coordinator is not running");
    };
    let outcome = dispatch.await?;

    let summary = match &outcome {
        DispatchOutcome::StoreMissing => format!("index {} does not exist", config.eventhook.index),
        DispatchOutcome::Unavailable => "hook store unavailable".to_string(),
        DispatchOutcome::Failed => "hook query failed".to_string(),
        DispatchOutcome::NoHooks => "no hooks".to_string(),
        DispatchOutcome::Stopped => "coordinator stopped".to_string(),
        DispatchOutcome::Submitted(handles) => format!("{} hook(s) submitted", handles.len()),
    };
    println!("{}: {}", event_type, summary);

    let finished = outcome.finished().await;
    if finished > 0 {
        println!("{} hook(s) finished", finished);
    }

    node.stop();
    Ok(())
}
