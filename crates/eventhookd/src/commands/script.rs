use anyhow::{Context, Result};
use std::path::Path;

use super::open_store;
use crate::config::Config;

/// Store a script for hooks that reference it by id
pub fn put(id: &str, lang: &str, file: &Path, config: &Config) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read script file {:?}", file))?;

    let store = open_store(config)?;
    store.put_script(lang, id, &source)?;
    println!("Stored script '{}' ({})", id, lang);
    Ok(())
}
