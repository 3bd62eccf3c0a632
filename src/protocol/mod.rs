//! # Script document format
//!
//! On-disk (`*.qwsscript`, UTF-8 JSON) representation of a script and the
//! report produced by a run.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "name": "login",
//!   "description": "Sign in and capture the dashboard",
//!   "metadata": { "created_at": "2024-05-01T10:00:00Z", "author": "qa", "tags": ["smoke"] },
//!   "commands": [
//!     { "command": "navigate", "url": "https://example.com", "wait_for_load": true },
//!     { "command": "screenshot", "filename": "home.png", "timestamp": "2024-05-01T10:00:03Z" }
//!   ]
//! }
//! ```
//!
//! Entries in `commands` stay raw JSON here; the registry turns them into
//! commands one by one so a bad entry never sinks the whole document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Format version written by this engine.
pub const SCRIPT_FORMAT_VERSION: &str = "1.0";

/// File extension of script documents.
pub const SCRIPT_EXTENSION: &str = "qwsscript";

/// Key carrying an entry's observation timestamp.
pub const TIMESTAMP_KEY: &str = "timestamp";

fn default_version() -> String {
    SCRIPT_FORMAT_VERSION.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ScriptMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Keys this engine does not interpret, kept for round-tripping.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Everything in a document except its commands.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScriptInfo {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ScriptMetadata>,
}

impl Default for ScriptInfo {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: String::new(),
            description: None,
            metadata: None,
        }
    }
}

impl ScriptInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScriptDocument {
    #[serde(flatten)]
    pub info: ScriptInfo,
    pub commands: Vec<Value>,
}

/// Reads an entry's RFC 3339 timestamp, if it has one.
pub fn entry_timestamp(entry: &Map<String, Value>) -> Option<DateTime<Utc>> {
    entry
        .get(TIMESTAMP_KEY)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// LEGACY FORMAT
// ============================================================================

/// Rewrites a document in the earlier format in place.
///
/// The earlier format stored steps under `actions`, named them with
/// `action_type`, kept `created_at` at the top level and stamped each step with
/// epoch seconds. Returns `true` when the document was rewritten.
pub fn upgrade_legacy_document(doc: &mut Value) -> bool {
    let Some(root) = doc.as_object_mut() else {
        return false;
    };
    if root.contains_key("commands") || !root.contains_key("actions") {
        return false;
    }

    let actions = root.remove("actions").unwrap_or(Value::Array(Vec::new()));
    let commands = match actions {
        Value::Array(items) => Value::Array(items.into_iter().map(upgrade_legacy_entry).collect()),
        other => other,
    };
    root.insert("commands".to_string(), commands);

    if let Some(created_at) = root.remove("created_at") {
        let metadata = root
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(meta) = metadata.as_object_mut() {
            meta.entry("created_at").or_insert(created_at);
        }
    }

    true
}

fn upgrade_legacy_entry(entry: Value) -> Value {
    let mut map = match entry {
        Value::Object(map) => map,
        other => return other,
    };

    if let Some(kind) = map.remove("action_type") {
        let kind = if kind.as_str() == Some("save_screenshot") {
            Value::String("screenshot".to_string())
        } else {
            kind
        };
        map.insert("command".to_string(), kind);
    }

    if let Some(epoch) = map.get(TIMESTAMP_KEY).and_then(Value::as_f64) {
        let secs = epoch.trunc() as i64;
        let nanos = (epoch.fract() * 1e9) as u32;
        match DateTime::<Utc>::from_timestamp(secs, nanos) {
            Some(dt) => {
                map.insert(TIMESTAMP_KEY.to_string(), Value::String(dt.to_rfc3339()));
            }
            None => {
                map.remove(TIMESTAMP_KEY);
            }
        }
    }

    Value::Object(map)
}

// ============================================================================
// EXECUTION REPORT
// ============================================================================

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Passed,
    Failed,
}

/// Result of one attempted command.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CommandOutcome {
    pub index: usize,
    pub command: String,
    pub description: String,
    pub status: CommandStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
    Stopped,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExecutionReport {
    pub run_id: String,
    pub script: String,
    pub status: RunStatus,
    pub start_time: String,
    pub end_time: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub commands: Vec<CommandOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_defaults() {
        let doc: ScriptDocument = serde_json::from_value(json!({ "commands": [] })).unwrap();
        assert_eq!(doc.info.version, "1.0");
        assert_eq!(doc.info.name, "");
        assert!(doc.info.metadata.is_none());
    }

    #[test]
    fn test_metadata_keeps_unknown_keys() {
        let raw = json!({
            "version": "1.0",
            "name": "s",
            "metadata": { "author": "qa", "tags": ["smoke"], "ticket": "QA-12" },
            "commands": []
        });
        let doc: ScriptDocument = serde_json::from_value(raw.clone()).unwrap();
        let meta = doc.info.metadata.as_ref().unwrap();
        assert_eq!(meta.author.as_deref(), Some("qa"));
        assert_eq!(meta.extra["ticket"], json!("QA-12"));
        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);
    }

    #[test]
    fn test_legacy_upgrade() {
        let mut doc = json!({
            "name": "old",
            "version": "1.0",
            "created_at": "2024-01-01T00:00:00",
            "actions": [
                { "action_type": "navigate", "url": "https://a.test", "timestamp": 1_700_000_000.5 },
                { "action_type": "save_screenshot", "filename": "x.png", "timestamp": 1_700_000_001.0 }
            ]
        });

        assert!(upgrade_legacy_document(&mut doc));

        assert!(doc.get("actions").is_none());
        assert_eq!(doc["metadata"]["created_at"], json!("2024-01-01T00:00:00"));
        assert_eq!(doc["commands"][0]["command"], json!("navigate"));
        assert_eq!(doc["commands"][1]["command"], json!("screenshot"));

        let first = doc["commands"][0].as_object().unwrap();
        let ts = entry_timestamp(first).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_current_format_is_left_alone() {
        let mut doc = json!({ "commands": [], "actions": [] });
        assert!(!upgrade_legacy_document(&mut doc));
        assert!(doc.get("actions").is_some());
    }
}
