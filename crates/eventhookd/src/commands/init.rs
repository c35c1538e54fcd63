use anyhow::Result;
use std::path::Path;

pub const DEFAULT_CONFIG: &str = r#"# eventhookd configuration

[eventhook]
index = ".eventhook"
size = 100
enable = true

[store]
path = "~/.eventhook/hooks.redb"

[cluster]
name = "eventhook"
node_id = "node-1"

[scripts]
dir = "./hooks"
dry_run = true
blocklist = []

[gateway]
host = "127.0.0.1"
port = 9400
# api_token = "change-me"
"#;

/// Initialize a new config file
pub fn run_init(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Config already exists at {:?}", path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)?;
    println!("Created config at {:?}", path);
    Ok(())
}
