use anyhow::{bail, Result};
use eventhook_core::{HookDefinition, ScriptKind};
use serde_json::json;

use super::open_store;
use crate::config::Config;

pub enum HookAction {
    Put {
        id: String,
        category: String,
        priority: i64,
        lang: String,
        script: String,
        script_type: String,
    },
    List {
        category: Option<String>,
    },
    Delete {
        id: String,
    },
}

pub fn execute(action: HookAction, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let index = &config.eventhook.index;

    match action {
        HookAction::Put {
            id,
            category,
            priority,
            lang,
            script,
            script_type,
        } => {
            let kind = ScriptKind::parse(Some(&json!(script_type)));
            let source = json!({
                "priority": priority,
                "lang": lang,
                "script": script,
                "script_type": kind.as_str(),
            });
            store.put_hook(index, &category, &id, source)?;
            println!("Stored hook '{}' for '{}' in {}", id, category, index);
        }
        HookAction::List { category } => {
            let docs = store.list_hooks(index, category.as_deref())?;
            if docs.is_empty() {
                println!("No hooks in {}", index);
            }
            for doc in &docs {
                match HookDefinition::from_document(doc) {
                    Some(hook) => println!(
                        "{}\t{}\t{}\t{}\t{}\t{}",
                        hook.id,
                        hook.event_type,
                        doc.priority(),
                        hook.lang,
                        hook.script_kind,
                        hook.script
                    ),
                    None => println!("{}\t{}\t(malformed)", doc.id, doc.category),
                }
            }
        }
        HookAction::Delete { id } => {
            if !store.delete_hook(index, &id)? {
                bail!("Hook '{}' not found in {}", id, index);
            }
            println!("Deleted hook '{}'", id);
        }
    }

    Ok(())
}
