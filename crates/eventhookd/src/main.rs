mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, HookCommands, ScriptCommands};

#[tokio::main]
async fn main() -> Result<()> {
    eventhook_core::init_logging();

    let cli = Cli::parse();

    // Init writes the config, so it runs before one is loaded
    if let Commands::Init { path } = &cli.command {
        return commands::init::run_init(path);
    }

    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Serve { host, port } => {
            commands::serve::execute(host, port, &config).await?;
        }
        Commands::Emit { source, master } => {
            commands::emit::execute(&source, master, &config).await?;
        }
        Commands::Hook { action } => {
            let hook_action = match action {
                HookCommands::Put {
                    id,
                    category,
                    priority,
                    lang,
                    script,
                    script_type,
                } => commands::hook::HookAction::Put {
                    id,
                    category,
                    priority,
                    lang,
                    script,
                    script_type,
                },
                HookCommands::List { category } => commands::hook::HookAction::List { category },
                HookCommands::Delete { id } => commands::hook::HookAction::Delete { id },
            };
            commands::hook::execute(hook_action, &config)?;
        }
        Commands::Script { action } => match action {
            ScriptCommands::Put { id, lang, file } => {
                commands::script::put(&id, &lang, &file, &config)?;
            }
        },
    }

    Ok(())
}
