use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cluster::{
    ClusterChangedEvent, ClusterClient, ClusterService, ClusterState, ClusterStateListener,
    ListenerId, LocalNodeMasterListener,
};
use crate::config::{EventHookConfig, SETTING_EVENTHOOK_ENABLE};
use crate::context::{DispatchContext, EventContextBuilder};
use crate::event_type::{self, EVENT_TYPE_OFF_MASTER, EVENT_TYPE_ON_MASTER};
use crate::hooks::{HookInvoker, HookStore, HookStoreGateway, ScriptEngine, StoreError};

/// Process-wide dispatch state
#[derive(Debug)]
pub struct CoordinatorState {
    is_master: AtomicBool,
    hooks_enabled: AtomicBool,
    index: String,
    max_hooks: usize,
}

impl CoordinatorState {
    pub fn new(config: &EventHookConfig) -> Self {
        Self {
            is_master: AtomicBool::new(false),
            hooks_enabled: AtomicBool::new(config.enable),
            index: config.index.clone(),
            max_hooks: config.size,
        }
    }

    pub fn is_master(&self) -> bool {
        self.is_master.load(Ordering::SeqCst)
    }

    pub fn set_master(&self, is_master: bool) {
        self.is_master.store(is_master, Ordering::SeqCst);
    }

    pub fn hooks_enabled(&self) -> bool {
        self.hooks_enabled.load(Ordering::SeqCst)
    }

    pub fn set_hooks_enabled(&self, enabled: bool) {
        self.hooks_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn max_hooks(&self) -> usize {
        self.max_hooks
    }
}

/// How a single dispatch ended
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The hook index does not exist
    StoreMissing,
    /// The store was temporarily unreadable
    Unavailable,
    /// The store query failed unexpectedly
    Failed,
    NoHooks,
    /// The coordinator stopped before hooks were submitted
    Stopped,
    /// Hooks submitted in priority order
    Submitted(Vec<JoinHandle<()>>),
}

impl DispatchOutcome {
    pub fn submitted(&self) -> usize {
        match self {
            DispatchOutcome::Submitted(handles) => handles.len(),
            _ => 0,
        }
    }

    /// Wait for every submitted hook to finish, returns how many ran
    pub async fn finished(self) -> usize {
        match self {
            DispatchOutcome::Submitted(handles) => {
                let count = handles.len();
                futures::future::join_all(handles).await;
                count
            }
            _ => 0,
        }
    }
}

struct Registration {
    state_listener: ListenerId,
    master_listener: ListenerId,
    runtime: Handle,
}

enum Lifecycle {
    Initialized,
    Started(Registration),
    Stopped,
}

/// Runs stored hooks for cluster notifications and master transitions.
///
/// Entry points return immediately; the existence check, the query and every
/// hook run on the runtime captured by [`DispatchCoordinator::start`].
pub struct DispatchCoordinator {
    state: CoordinatorState,
    cluster: Arc<dyn ClusterService>,
    gateway: HookStoreGateway,
    invoker: HookInvoker,
    contexts: EventContextBuilder,
    lifecycle: Mutex<Lifecycle>,
    /// Open while started. Pipelines hold a read guard while submitting hooks.
    submission: Arc<RwLock<bool>>,
}

impl DispatchCoordinator {
    pub fn new(
        config: &EventHookConfig,
        cluster: Arc<dyn ClusterService>,
        client: Arc<dyn ClusterClient>,
        store: Arc<dyn HookStore>,
        engine: Arc<dyn ScriptEngine>,
    ) -> Arc<Self> {
        info!(index = %config.index, size = config.size, "Creating DispatchCoordinator");

        Arc::new(Self {
            state: CoordinatorState::new(config),
            gateway: HookStoreGateway::new(store, config.index.clone(), config.size),
            invoker: HookInvoker::new(engine),
            contexts: EventContextBuilder::new(cluster.clone(), client),
            cluster,
            lifecycle: Mutex::new(Lifecycle::Initialized),
            submission: Arc::new(RwLock::new(false)),
        })
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    pub fn set_hooks_enabled(&self, enabled: bool) {
        info!(enabled, "Event hooks toggled");
        self.state.set_hooks_enabled(enabled);
    }

    pub fn is_started(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Started(_))
    }

    /// Attach to the cluster service. Must be called inside a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Initialized => {}
            Lifecycle::Started(_) => anyhow::bail!("DispatchCoordinator already started"),
            Lifecycle::Stopped => anyhow::bail!("A stopped DispatchCoordinator cannot be restarted"),
        }

        let runtime = Handle::try_current()
            .context("DispatchCoordinator must be started inside a tokio runtime")?;

        info!(index = %self.state.index(), "Starting DispatchCoordinator");

        *self.submission.write() = true;
        let state_listener = self.cluster.add_state_listener(self.clone());
        let master_listener = self.cluster.add_master_listener(self.clone());

        *lifecycle = Lifecycle::Started(Registration {
            state_listener,
            master_listener,
            runtime,
        });
        Ok(())
    }

    /// Detach from the cluster service. Hooks already submitted keep running;
    /// once this returns no further hook is submitted.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if let Lifecycle::Started(registration) =
            std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        {
            info!("Stopping DispatchCoordinator");
            self.cluster
                .remove_master_listener(registration.master_listener);
            self.cluster
                .remove_state_listener(registration.state_listener);
            *self.submission.write() = false;
        }
    }

    fn runtime(&self) -> Option<Handle> {
        match &*self.lifecycle.lock() {
            Lifecycle::Started(registration) => Some(registration.runtime.clone()),
            _ => None,
        }
    }

    /// Effective hooks flag for the current cluster state
    pub fn hooks_enabled(&self) -> bool {
        self.hooks_enabled_for(&self.cluster.state())
    }

    /// The cluster setting wins over the local flag when it parses as a bool
    fn hooks_enabled_for(&self, state: &ClusterState) -> bool {
        state
            .metadata
            .setting(SETTING_EVENTHOOK_ENABLE)
            .and_then(parse_setting_bool)
            .unwrap_or_else(|| self.state.hooks_enabled())
    }

    /// Run the hook pipeline for one event type.
    ///
    /// Returns `None` when the coordinator is not started. The context is
    /// built before returning, so it sees the master flag as of this call.
    pub fn dispatch(
        &self,
        event_type: impl Into<String>,
        event: Option<Arc<ClusterChangedEvent>>,
    ) -> Option<JoinHandle<DispatchOutcome>> {
        let runtime = self.runtime()?;
        let ctx = Arc::new(self.contexts.build(&self.state, event_type, event));

        let pipeline = run_pipeline(
            self.gateway.clone(),
            self.invoker.clone(),
            runtime.clone(),
            self.submission.clone(),
            ctx,
        );
        Some(runtime.spawn(pipeline))
    }
}

async fn run_pipeline(
    gateway: HookStoreGateway,
    invoker: HookInvoker,
    runtime: Handle,
    submission: Arc<RwLock<bool>>,
    ctx: Arc<DispatchContext>,
) -> DispatchOutcome {
    match gateway.exists().await {
        Ok(true) => {}
        Ok(false) => {
            debug!(
                index = %gateway.index(),
                event_type = %ctx.event_type,
                "Hook index does not exist"
            );
            return DispatchOutcome::StoreMissing;
        }
        Err(e) => return store_failure(&gateway, &ctx, e),
    }

    let hooks = match gateway.query(&ctx.event_type).await {
        Ok(hooks) => hooks,
        Err(e) => return store_failure(&gateway, &ctx, e),
    };

    if hooks.is_empty() {
        debug!(event_type = %ctx.event_type, "No scripts for event");
        return DispatchOutcome::NoHooks;
    }

    // stop() waits for the write lock, so it cannot complete mid-submission
    let open = submission.read();
    if !*open {
        debug!(event_type = %ctx.event_type, "Coordinator stopped, dropping dispatch");
        return DispatchOutcome::Stopped;
    }

    debug!(
        dispatch_id = %ctx.dispatch_id,
        event_type = %ctx.event_type,
        count = hooks.len(),
        "Scripts will be executed"
    );

    let handles = hooks
        .into_iter()
        .map(|hook| invoker.invoke(&runtime, hook, ctx.clone()))
        .collect();
    drop(open);
    DispatchOutcome::Submitted(handles)
}

/// Lenient boolean for dynamic settings: `true|1|on|yes` and `false|0|off|no`,
/// case-insensitive. Anything else is treated as unset.
pub fn parse_setting_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if ["true", "1", "on", "yes"]
        .iter()
        .any(|v| value.eq_ignore_ascii_case(v))
    {
        Some(true)
    } else if ["false", "0", "off", "no"]
        .iter()
        .any(|v| value.eq_ignore_ascii_case(v))
    {
        Some(false)
    } else {
        None
    }
}

fn store_failure(gateway: &HookStoreGateway, ctx: &DispatchContext, e: StoreError) -> DispatchOutcome {
    if e.is_transient() {
        debug!(
            index = %gateway.index(),
            event_type = %ctx.event_type,
            source = %ctx.event.source(),
            error = %e,
            "Hook store is not available yet"
        );
        DispatchOutcome::Unavailable
    } else {
        error!(
            index = %gateway.index(),
            event_type = %ctx.event_type,
            error = %e,
            "Failed to find scripts for an event hook"
        );
        DispatchOutcome::Failed
    }
}

impl ClusterStateListener for DispatchCoordinator {
    fn cluster_changed(&self, event: &ClusterChangedEvent) {
        if !self.hooks_enabled_for(event.state()) {
            return;
        }

        let event_type = event_type::resolve(Some(event.source()));
        debug!(
            index = %self.state.index(),
            event_type = %event_type,
            source = %event.source(),
            "Cluster event"
        );
        let _ = self.dispatch(event_type, Some(Arc::new(event.clone())));
    }
}

impl LocalNodeMasterListener for DispatchCoordinator {
    fn on_master(&self) {
        self.state.set_master(true);
        let _ = self.dispatch(EVENT_TYPE_ON_MASTER, None);
    }

    fn off_master(&self) {
        self.state.set_master(false);
        let _ = self.dispatch(EVENT_TYPE_OFF_MASTER, None);
    }
}
