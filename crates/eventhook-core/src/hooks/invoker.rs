use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::definition::HookDefinition;
use super::engine::ScriptEngine;
use crate::context::DispatchContext;

/// Runs single hooks on background tasks, containing their failures
#[derive(Clone)]
pub struct HookInvoker {
    engine: Arc<dyn ScriptEngine>,
}

impl HookInvoker {
    pub fn new(engine: Arc<dyn ScriptEngine>) -> Self {
        Self { engine }
    }

    /// Submit a hook for execution and return immediately.
    ///
    /// Errors and engine panics are logged with the hook's language, script
    /// and kind; nothing propagates to the caller. Awaiting the handle is
    /// optional.
    pub fn invoke(
        &self,
        runtime: &Handle,
        hook: HookDefinition,
        ctx: Arc<DispatchContext>,
    ) -> JoinHandle<()> {
        let engine = self.engine.clone();

        runtime.spawn(async move {
            match run_contained(engine.as_ref(), &hook, &ctx).await {
                Ok(()) => {
                    debug!(
                        dispatch_id = %ctx.dispatch_id,
                        event_type = %ctx.event_type,
                        hook = %hook.id,
                        "Hook executed"
                    );
                }
                Err(e) => {
                    error!(
                        dispatch_id = %ctx.dispatch_id,
                        event_type = %ctx.event_type,
                        hook = %hook.id,
                        lang = %hook.lang,
                        script = %hook.script,
                        script_type = %hook.script_kind,
                        error = %format!("{:#}", e),
                        "Failed to execute a hook script"
                    );
                }
            }
        })
    }
}

/// Run a hook, turning an engine panic into an error
async fn run_contained(
    engine: &dyn ScriptEngine,
    hook: &HookDefinition,
    ctx: &DispatchContext,
) -> Result<()> {
    AssertUnwindSafe(run_hook(engine, hook, ctx))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(anyhow!("Script engine panicked: {}", panic_message(&*panic))))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

async fn run_hook(
    engine: &dyn ScriptEngine,
    hook: &HookDefinition,
    ctx: &DispatchContext,
) -> Result<()> {
    let compiled = engine
        .compile(&hook.lang, &hook.script, hook.script_kind)
        .await
        .context("Script compilation failed")?;

    engine
        .execute(&compiled, ctx)
        .await
        .context("Script execution failed")
}
