use serde::{Deserialize, Serialize};

pub const DEFAULT_EVENTHOOK_INDEX: &str = ".eventhook";

pub const DEFAULT_EVENTHOOK_SIZE: usize = 100;

/// Dynamic cluster setting that overrides `enable` when present in the cluster state
pub const SETTING_EVENTHOOK_ENABLE: &str = "cluster.eventhook.enable";

/// Dispatch settings, read once when the coordinator is built
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventHookConfig {
    /// Name of the index holding hook documents
    #[serde(default = "default_index")]
    pub index: String,

    /// Maximum number of hooks fetched per dispatch
    #[serde(default = "default_size")]
    pub size: usize,

    #[serde(default = "default_enable")]
    pub enable: bool,
}

fn default_index() -> String {
    DEFAULT_EVENTHOOK_INDEX.to_string()
}

fn default_size() -> usize {
    DEFAULT_EVENTHOOK_SIZE
}

fn default_enable() -> bool {
    true
}

impl Default for EventHookConfig {
    fn default() -> Self {
        Self {
            index: default_index(),
            size: default_size(),
            enable: default_enable(),
        }
    }
}
