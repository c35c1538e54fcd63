use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use serde_json::Value;
use tracing::debug;

use crate::hooks::{HookDocument, HookSearch, HookStore, StoreError, StoredScripts};

/// Index name -> next document sequence number
const INDICES_TABLE: TableDefinition<&str, u64> = TableDefinition::new("indices");
/// `index␟seq` -> JSON hook document
const HOOKS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("hooks");
/// `lang␟id` -> script source
const SCRIPTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("scripts");

const KEY_SEP: char = '\u{1f}';

/// Hook documents persisted in a redb database.
///
/// Documents keep the order they were first written in, which breaks
/// priority ties in searches.
#[derive(Clone)]
pub struct RedbHookStore {
    db: Arc<Database>,
}

impl RedbHookStore {
    /// Open or create the database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::create(path)
            .with_context(|| format!("Failed to open hook store at {:?}", path))?;

        // Create tables if not exists
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(INDICES_TABLE)?;
            let _ = write_txn.open_table(HOOKS_TABLE)?;
            let _ = write_txn.open_table(SCRIPTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Create an empty index, returns false if it already existed
    pub fn create_index(&self, index: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let created = {
            let mut indices = write_txn.open_table(INDICES_TABLE)?;
            let exists = indices.get(index)?.is_some();
            if !exists {
                indices.insert(index, 0u64)?;
            }
            !exists
        };
        write_txn.commit()?;
        Ok(created)
    }

    /// Drop an index and all of its documents
    pub fn delete_index(&self, index: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut indices = write_txn.open_table(INDICES_TABLE)?;
            let existed = indices.remove(index)?.is_some();

            let mut hooks = write_txn.open_table(HOOKS_TABLE)?;
            let keys: Vec<String> = scan_index(&hooks, index)?
                .into_iter()
                .map(|(key, _)| key)
                .collect();
            for key in keys {
                hooks.remove(key.as_str())?;
            }
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Insert or replace a hook document. The index is created on demand.
    pub fn put_hook(&self, index: &str, category: &str, id: &str, source: Value) -> Result<()> {
        let doc = HookDocument {
            id: id.to_string(),
            category: category.to_string(),
            source,
        };
        let doc_json = serde_json::to_string(&doc)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut indices = write_txn.open_table(INDICES_TABLE)?;
            let next_seq = indices.get(index)?.map(|seq| seq.value()).unwrap_or(0);

            let mut hooks = write_txn.open_table(HOOKS_TABLE)?;
            let existing = scan_index(&hooks, index)?
                .into_iter()
                .find(|(_, d)| d.id == id)
                .map(|(key, _)| key);

            match existing {
                Some(key) => {
                    hooks.insert(key.as_str(), doc_json.as_str())?;
                    indices.insert(index, next_seq)?;
                }
                None => {
                    let key = hook_key(index, next_seq);
                    hooks.insert(key.as_str(), doc_json.as_str())?;
                    indices.insert(index, next_seq + 1)?;
                }
            }
        }
        write_txn.commit()?;

        debug!(index, category, hook = id, "Stored hook document");
        Ok(())
    }

    pub fn delete_hook(&self, index: &str, id: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut hooks = write_txn.open_table(HOOKS_TABLE)?;
            let key = scan_index(&hooks, index)?
                .into_iter()
                .find(|(_, d)| d.id == id)
                .map(|(key, _)| key);
            match key {
                Some(key) => hooks.remove(key.as_str())?.is_some(),
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Documents of an index in store order, optionally of one category only
    pub fn list_hooks(&self, index: &str, category: Option<&str>) -> Result<Vec<HookDocument>> {
        let mut docs = list_documents(&self.db, index)?;
        if let Some(category) = category {
            docs.retain(|d| d.category == category);
        }
        Ok(docs)
    }

    pub fn put_script(&self, lang: &str, id: &str, source: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut scripts = write_txn.open_table(SCRIPTS_TABLE)?;
            scripts.insert(script_key(lang, id).as_str(), source)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_script(&self, lang: &str, id: &str) -> Result<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let scripts = read_txn.open_table(SCRIPTS_TABLE)?;
        let source = scripts
            .get(script_key(lang, id).as_str())?
            .map(|v| v.value().to_string());
        Ok(source)
    }

    pub fn index_exists(&self, index: &str) -> Result<bool> {
        index_exists(&self.db, index)
    }
}

fn hook_key(index: &str, seq: u64) -> String {
    format!("{}{}{:020}", index, KEY_SEP, seq)
}

fn script_key(lang: &str, id: &str) -> String {
    format!("{}{}{}", lang, KEY_SEP, id)
}

/// Documents of one index keyed by their storage key, in store order
fn scan_index(
    table: &impl ReadableTable<&'static str, &'static str>,
    index: &str,
) -> Result<Vec<(String, HookDocument)>> {
    let prefix = format!("{}{}", index, KEY_SEP);
    let mut docs = Vec::new();
    for entry in table.iter()? {
        let (key, value) = entry?;
        let key = key.value();
        if !key.starts_with(&prefix) {
            continue;
        }
        let doc: HookDocument = serde_json::from_str(value.value())
            .with_context(|| format!("Corrupt hook document at {:?}", key))?;
        docs.push((key.to_string(), doc));
    }
    Ok(docs)
}

fn index_exists(db: &Database, index: &str) -> Result<bool> {
    let read_txn = db.begin_read()?;
    let indices = read_txn.open_table(INDICES_TABLE)?;
    let exists = indices.get(index)?.is_some();
    Ok(exists)
}

fn list_documents(db: &Database, index: &str) -> Result<Vec<HookDocument>> {
    let read_txn = db.begin_read()?;
    let hooks = read_txn.open_table(HOOKS_TABLE)?;
    Ok(scan_index(&hooks, index)?
        .into_iter()
        .map(|(_, doc)| doc)
        .collect())
}

fn search_documents(db: &Database, search: &HookSearch) -> Result<Vec<HookDocument>, StoreError> {
    if !index_exists(db, &search.index)? {
        return Err(StoreError::IndexMissing(search.index.clone()));
    }
    Ok(search.select(list_documents(db, &search.index)?))
}

#[async_trait]
impl HookStore for RedbHookStore {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError> {
        let db = self.db.clone();
        let index = index.to_string();
        tokio::task::spawn_blocking(move || index_exists(&db, &index))
            .await
            .map_err(|e| StoreError::QueryFailed(e.into()))?
            .map_err(StoreError::from)
    }

    async fn search(&self, search: &HookSearch) -> Result<Vec<HookDocument>, StoreError> {
        let db = self.db.clone();
        let search = search.clone();
        tokio::task::spawn_blocking(move || search_documents(&db, &search))
            .await
            .map_err(|e| StoreError::QueryFailed(e.into()))?
    }
}

#[async_trait]
impl StoredScripts for RedbHookStore {
    async fn stored_script(&self, lang: &str, id: &str) -> Result<Option<String>> {
        let store = self.clone();
        let lang = lang.to_string();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || store.get_script(&lang, &id)).await?
    }
}
