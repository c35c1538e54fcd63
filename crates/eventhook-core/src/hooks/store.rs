use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;

use super::definition::{HookDefinition, HookDocument};
use crate::event_type::EVENT_TYPE_ALL;

/// Failures reported by a hook store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reads are blocked while the cluster is in transition
    #[error("hook store unavailable: {0}")]
    Unavailable(String),

    /// The store exists but cannot be searched yet
    #[error("hook store {0} is not ready yet")]
    NotReady(String),

    /// The store disappeared between the existence check and the query
    #[error("hook store {0} does not exist")]
    IndexMissing(String),

    #[error("hook query failed: {0}")]
    QueryFailed(#[source] anyhow::Error),
}

impl StoreError {
    /// Transient failures are expected during cluster transitions; the next
    /// notification retries naturally.
    pub fn is_transient(&self) -> bool {
        !matches!(self, StoreError::QueryFailed(_))
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::QueryFailed(e)
    }
}

/// A search for hook documents: any of `categories`, sorted by ascending
/// priority with store order breaking ties, at most `size` results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSearch {
    pub index: String,
    pub categories: Vec<String>,
    pub size: usize,
}

impl HookSearch {
    pub fn matches(&self, doc: &HookDocument) -> bool {
        self.categories.iter().any(|c| *c == doc.category)
    }

    /// Apply this search to documents given in store order
    pub fn select<I>(&self, docs: I) -> Vec<HookDocument>
    where
        I: IntoIterator<Item = HookDocument>,
    {
        let mut hits: Vec<HookDocument> = docs.into_iter().filter(|d| self.matches(d)).collect();
        // Stable: equal priorities keep store order
        hits.sort_by_key(HookDocument::priority);
        hits.truncate(self.size);
        hits
    }
}

/// Backend holding hook documents
#[async_trait]
pub trait HookStore: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError>;

    async fn search(&self, search: &HookSearch) -> Result<Vec<HookDocument>, StoreError>;
}

/// Access to the hook index used by the dispatch pipeline
#[derive(Clone)]
pub struct HookStoreGateway {
    store: Arc<dyn HookStore>,
    index: String,
    max_hooks: usize,
}

impl HookStoreGateway {
    pub fn new(store: Arc<dyn HookStore>, index: impl Into<String>, max_hooks: usize) -> Self {
        Self {
            store,
            index: index.into(),
            max_hooks,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn max_hooks(&self) -> usize {
        self.max_hooks
    }

    pub async fn exists(&self) -> Result<bool, StoreError> {
        self.store.index_exists(&self.index).await
    }

    /// Hooks declared for `event_type` or `all`, in submission order
    pub async fn query(&self, event_type: &str) -> Result<Vec<HookDefinition>, StoreError> {
        let mut categories = vec![event_type.to_string()];
        if event_type != EVENT_TYPE_ALL {
            categories.push(EVENT_TYPE_ALL.to_string());
        }

        let search = HookSearch {
            index: self.index.clone(),
            categories,
            size: self.max_hooks,
        };

        let docs = self.store.search(&search).await?;

        let mut seen = HashSet::new();
        let mut hooks: Vec<HookDefinition> = docs
            .iter()
            .filter(|doc| seen.insert(doc.id.as_str()))
            .filter_map(|doc| {
                let hook = HookDefinition::from_document(doc);
                if hook.is_none() {
                    trace!(index = %self.index, hook = %doc.id, "Skipping hook without lang or script");
                }
                hook
            })
            .collect();

        hooks.sort_by_key(|hook| hook.priority);
        hooks.truncate(self.max_hooks);
        Ok(hooks)
    }
}
