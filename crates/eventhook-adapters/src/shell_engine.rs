use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use eventhook_core::cluster::SettingsScope;
use eventhook_core::{CompiledScript, DispatchContext, ScriptEngine, ScriptKind, StoredScripts};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Languages this engine accepts
pub const SHELL_LANGS: &[&str] = &["sh", "shell"];

/// Default dangerous patterns blocked regardless of config
const BUILTIN_BLOCKLIST: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    ":(){ :|:& };:",
    "mkfs",
    "> /dev/sd",
    "> /dev/nvme",
    "dd if=",
    "chmod -R 777 /",
    "${ifs}",
];

const DIRECTIVE_SET_TRANSIENT: &str = "eventhook:set-transient ";
const DIRECTIVE_SET_PERSISTENT: &str = "eventhook:set-persistent ";

/// Runs hook scripts with `sh -c`.
///
/// The dispatch context reaches the script twice: a few `EVENTHOOK_*`
/// environment variables and the full JSON bindings on stdin. Scripts change
/// cluster settings by printing directive lines:
///
/// ```text
/// eventhook:set-transient cluster.routing.allocation.enable=none
/// eventhook:set-persistent cluster.routing.allocation.enable=all
/// ```
pub struct ShellScriptEngine {
    scripts_dir: PathBuf,
    dry_run: bool,
    blocklist: Vec<String>,
    stored: Option<Arc<dyn StoredScripts>>,
}

impl ShellScriptEngine {
    pub fn new(scripts_dir: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            dry_run,
            blocklist: Vec::new(),
            stored: None,
        }
    }

    /// Extra patterns rejected at compile time, matched case-insensitively
    pub fn with_blocklist(mut self, blocklist: Vec<String>) -> Self {
        self.blocklist = blocklist;
        self
    }

    pub fn with_stored_scripts(mut self, stored: Arc<dyn StoredScripts>) -> Self {
        self.stored = Some(stored);
        self
    }

    async fn load(&self, lang: &str, source: &str, kind: ScriptKind) -> Result<String> {
        match kind {
            ScriptKind::Inline => Ok(source.to_string()),
            ScriptKind::File => {
                let path = resolve_script_path(&self.scripts_dir, source)?;
                tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read script file {:?}", path))
            }
            ScriptKind::Stored => {
                let stored = self
                    .stored
                    .as_ref()
                    .context("No stored script source configured")?;
                stored
                    .stored_script(lang, source)
                    .await?
                    .with_context(|| format!("Stored script '{}' not found for lang '{}'", source, lang))
            }
        }
    }

    async fn apply_directive(&self, line: &str, ctx: &DispatchContext) -> Result<()> {
        let Some((scope, key, value)) = parse_directive(line)? else {
            info!(
                dispatch_id = %ctx.dispatch_id,
                event_type = %ctx.event_type,
                output = line,
                "Hook output"
            );
            return Ok(());
        };

        info!(
            dispatch_id = %ctx.dispatch_id,
            scope = ?scope,
            key,
            value,
            "Hook updating cluster setting"
        );
        match scope {
            SettingsScope::Transient => ctx.cluster.set_transient_setting(key, value).await?,
            SettingsScope::Persistent => ctx.cluster.set_persistent_setting(key, value).await?,
        };
        Ok(())
    }
}

#[async_trait]
impl ScriptEngine for ShellScriptEngine {
    async fn compile(&self, lang: &str, source: &str, kind: ScriptKind) -> Result<CompiledScript> {
        if !SHELL_LANGS.contains(&lang) {
            bail!("Unsupported script language '{}'", lang);
        }

        let body = self.load(lang, source, kind).await?;
        validate_script(&body, &self.blocklist)?;

        Ok(CompiledScript {
            lang: lang.to_string(),
            kind,
            body,
        })
    }

    async fn execute(&self, script: &CompiledScript, ctx: &DispatchContext) -> Result<()> {
        if self.dry_run {
            warn!(
                dispatch_id = %ctx.dispatch_id,
                event_type = %ctx.event_type,
                script = %script.body,
                "DRY RUN - hook script not executed"
            );
            return Ok(());
        }

        debug!(
            dispatch_id = %ctx.dispatch_id,
            event_type = %ctx.event_type,
            "Executing hook script"
        );

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&script.body)
            .env("EVENTHOOK_EVENT_TYPE", &ctx.event_type)
            .env("EVENTHOOK_IS_MASTER", ctx.is_master.to_string())
            .env("EVENTHOOK_SOURCE", ctx.event.source())
            .env("EVENTHOOK_DISPATCH_ID", ctx.dispatch_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to spawn sh")?;

        // Fed from its own task so a script that writes before reading cannot
        // block on a full stdout pipe
        let bindings = serde_json::to_vec(&ctx.bindings())?;
        let feeder = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                // Scripts that ignore stdin may exit before reading it
                if let Err(e) = stdin.write_all(&bindings).await {
                    debug!(error = %e, "Hook script did not read bindings");
                }
            })
        });

        let output = child
            .wait_with_output()
            .await
            .context("Hook script execution failed")?;
        if let Some(feeder) = feeder {
            let _ = feeder.await;
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            bail!(
                "Hook script exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }
        if !stderr.trim().is_empty() {
            warn!(dispatch_id = %ctx.dispatch_id, stderr = %stderr.trim(), "Hook script wrote to stderr");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            self.apply_directive(line, ctx).await?;
        }
        Ok(())
    }
}

/// Validate a script body against the built-in and configured blocklists
fn validate_script(body: &str, blocklist: &[String]) -> Result<()> {
    let body_lower = body.to_lowercase();

    for pattern in BUILTIN_BLOCKLIST {
        if body_lower.contains(pattern) {
            bail!("Script blocked (dangerous pattern '{}')", pattern);
        }
    }

    for pattern in blocklist {
        if body_lower.contains(&pattern.to_lowercase()) {
            bail!("Script blocked (config blocklist '{}')", pattern);
        }
    }

    Ok(())
}

/// Resolve a FILE script reference inside the scripts directory
fn resolve_script_path(scripts_dir: &Path, reference: &str) -> Result<PathBuf> {
    let relative = Path::new(reference);
    if reference.is_empty() || relative.is_absolute() {
        bail!("Script path must be relative to the scripts directory: {:?}", reference);
    }
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        bail!("Script path escapes the scripts directory: {:?}", reference);
    }
    Ok(scripts_dir.join(relative))
}

/// Split a settings directive into scope, key and value.
///
/// Lines that are not directives yield `None`.
fn parse_directive(line: &str) -> Result<Option<(SettingsScope, &str, &str)>> {
    let (scope, rest) = if let Some(rest) = line.strip_prefix(DIRECTIVE_SET_TRANSIENT) {
        (SettingsScope::Transient, rest)
    } else if let Some(rest) = line.strip_prefix(DIRECTIVE_SET_PERSISTENT) {
        (SettingsScope::Persistent, rest)
    } else {
        return Ok(None);
    };

    match rest.trim().split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok(Some((scope, key.trim(), value.trim())))
        }
        _ => bail!("Malformed settings directive: {:?}", line),
    }
}
