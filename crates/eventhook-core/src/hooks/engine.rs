use anyhow::Result;
use async_trait::async_trait;

use super::definition::ScriptKind;
use crate::context::DispatchContext;

/// Output of a successful compile, ready to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    pub lang: String,
    pub kind: ScriptKind,
    /// Resolved script text (file and stored references already loaded)
    pub body: String,
}

/// Script compiler and executor used to run hooks
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    async fn compile(&self, lang: &str, source: &str, kind: ScriptKind) -> Result<CompiledScript>;

    /// Run a compiled script; side effects go through the context accessors
    async fn execute(&self, script: &CompiledScript, ctx: &DispatchContext) -> Result<()>;
}

/// Lookup for scripts referenced by id (`ScriptKind::Stored`)
#[async_trait]
pub trait StoredScripts: Send + Sync {
    async fn stored_script(&self, lang: &str, id: &str) -> Result<Option<String>>;
}
