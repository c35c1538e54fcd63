use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a hook's `script` field is interpreted by the script engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    /// The script text itself
    Inline,
    /// Id of a script kept in the script store
    Stored,
    /// Name of a script file on the node
    File,
}

impl ScriptKind {
    /// Parse the `script_type` document field. Anything unrecognized is inline.
    pub fn parse(raw: Option<&Value>) -> Self {
        let text = match raw {
            Some(Value::String(s)) => s.as_str(),
            _ => return ScriptKind::Inline,
        };

        if text.eq_ignore_ascii_case("INDEXED") || text.eq_ignore_ascii_case("STORED") {
            ScriptKind::Stored
        } else if text.eq_ignore_ascii_case("FILE") {
            ScriptKind::File
        } else {
            ScriptKind::Inline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::Inline => "inline",
            ScriptKind::Stored => "stored",
            ScriptKind::File => "file",
        }
    }
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw document as returned by the hook store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookDocument {
    pub id: String,
    /// Event type this document is declared for, or `all`
    pub category: String,
    pub source: Value,
}

impl HookDocument {
    /// Sort key: `priority` ascending, documents without one last
    pub fn priority(&self) -> i64 {
        self.source
            .get("priority")
            .and_then(Value::as_i64)
            .unwrap_or(i64::MAX)
    }
}

/// A runnable hook read from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDefinition {
    pub id: String,
    pub event_type: String,
    pub priority: i64,
    pub lang: String,
    pub script: String,
    pub script_kind: ScriptKind,
}

impl HookDefinition {
    /// Build a definition from a stored document.
    ///
    /// Returns `None` when `lang` or `script` is missing or null.
    pub fn from_document(doc: &HookDocument) -> Option<Self> {
        let lang = field_text(doc.source.get("lang"))?;
        let script = field_text(doc.source.get("script"))?;

        Some(Self {
            id: doc.id.clone(),
            event_type: doc.category.clone(),
            priority: doc.priority(),
            lang,
            script,
            script_kind: ScriptKind::parse(doc.source.get("script_type")),
        })
    }
}

fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
