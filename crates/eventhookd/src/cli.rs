use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "eventhookd")]
#[command(about = "Run stored hook scripts on cluster events", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (default: ./eventhook.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new config file
    Init {
        /// Path for new config file
        #[arg(default_value = "eventhook.toml")]
        path: PathBuf,
    },
    /// Start the node and its admin HTTP API
    Serve {
        /// Host to bind to (overrides [gateway] host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides [gateway] port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Dispatch one event locally and wait for its hooks to finish
    Emit {
        /// Event description, e.g. "zen-disco: node left [n2]"
        #[arg(long)]
        source: String,
        /// Run with the local node elected as master
        #[arg(long)]
        master: bool,
    },
    /// Manage hook documents
    Hook {
        #[command(subcommand)]
        action: HookCommands,
    },
    /// Manage stored scripts
    Script {
        #[command(subcommand)]
        action: ScriptCommands,
    },
}

#[derive(Subcommand)]
pub enum HookCommands {
    /// Add or replace a hook
    Put {
        /// Hook id
        id: String,
        /// Event type the hook runs on ("all" matches every event)
        #[arg(long)]
        category: String,
        /// Lower runs first
        #[arg(long, default_value = "0")]
        priority: i64,
        #[arg(long, default_value = "sh")]
        lang: String,
        /// Script body, file path or stored script id depending on --script-type
        #[arg(long)]
        script: String,
        /// inline, file or stored
        #[arg(long, default_value = "inline")]
        script_type: String,
    },
    /// List hooks in store order
    List {
        /// Only hooks of this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete a hook by id
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ScriptCommands {
    /// Store a script that hooks reference with script_type = "stored"
    Put {
        /// Script id
        id: String,
        #[arg(long, default_value = "sh")]
        lang: String,
        /// File holding the script source
        #[arg(long)]
        file: PathBuf,
    },
}
