use anyhow::{Context, Result};
use eventhook_core::EventHookConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "eventhook.toml";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub eventhook: EventHookConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub scripts: ScriptsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ClusterConfig {
    #[serde(default = "default_cluster_name")]
    pub name: String,

    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Defaults to `node_id`
    #[serde(default)]
    pub node_name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ScriptsConfig {
    /// Base directory for FILE scripts
    #[serde(default = "default_scripts_dir")]
    pub dir: String,

    #[serde(default = "default_dry_run")]
    pub dry_run: bool,

    #[serde(default)]
    pub blocklist: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_store_path() -> String {
    "~/.eventhook/hooks.redb".to_string()
}

fn default_cluster_name() -> String {
    "eventhook".to_string()
}

fn default_node_id() -> String {
    "node-1".to_string()
}

fn default_scripts_dir() -> String {
    "./hooks".to_string()
}

fn default_dry_run() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9400
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: default_cluster_name(),
            node_id: default_node_id(),
            node_name: None,
        }
    }
}

impl ClusterConfig {
    pub fn node_name(&self) -> &str {
        self.node_name.as_deref().unwrap_or(&self.node_id)
    }
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dir: default_scripts_dir(),
            dry_run: default_dry_run(),
            blocklist: Vec::new(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_token: None,
        }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

impl ScriptsConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.dir).to_string())
    }
}

/// Load config from an explicit file, else `eventhook.toml` if present, else defaults
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
        None => return Ok(Config::default()),
    };

    let content =
        fs::read_to_string(path).context(format!("Failed to read config file: {:?}", path))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("Failed to parse TOML config")
}
