//! # Document envelope validation
//!
//! Two checks run before any command is built:
//!
//! - **structure**: the document must be an object with a `commands` array.
//!   Failing this is the only way a document is rejected as a whole.
//! - **header**: the optional `version`, `name`, `description` and
//!   `metadata` fields must have the right types. A mistyped header field is
//!   reported and dropped; it never costs the document its commands.
//!
//! Individual command entries are not inspected here; the registry validates
//! those one at a time during loading.
//!
//! Both checks are JSON Schemas compiled once on first use.

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use jsonschema::JSONSchema;
use tracing::warn;

use crate::protocol::SCRIPT_FORMAT_VERSION;

static STRUCTURE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["commands"],
        "properties": {
            "commands": { "type": "array" }
        }
    })
});

static HEADER_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "properties": {
            "version": { "type": "string" },
            "name": { "type": "string" },
            "description": { "type": ["string", "null"] },
            "metadata": {
                "type": ["object", "null"],
                "properties": {
                    "created_at": { "type": "string" },
                    "author": { "type": "string" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                }
            }
        }
    })
});

fn compile(name: &str, schema: &'static Value) -> Option<JSONSchema> {
    match JSONSchema::compile(schema) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            warn!(schema = name, error = %e, "script schema failed to compile");
            None
        }
    }
}

static STRUCTURE: Lazy<Option<JSONSchema>> = Lazy::new(|| compile("structure", &STRUCTURE_SCHEMA));

static HEADER: Lazy<Option<JSONSchema>> = Lazy::new(|| compile("header", &HEADER_SCHEMA));

/// A mistyped header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProblem {
    /// JSON pointer to the offending value, e.g. `/metadata/tags`.
    pub pointer: String,
    pub message: String,
}

/// Checks that the document is an object with a `commands` array.
///
/// Returns every violation found, each rendered with its JSON pointer.
pub fn validate_envelope(doc: &Value) -> Result<(), Vec<String>> {
    if let Some(schema) = STRUCTURE.as_ref() {
        if let Err(errors) = schema.validate(doc) {
            let messages: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{path}: {e}")
                    }
                })
                .collect();
            return Err(messages);
        }
        return Ok(());
    }

    // Schema unavailable: check the same rule by hand.
    match doc.get("commands") {
        Some(Value::Array(_)) => Ok(()),
        _ => Err(vec!["document must contain a 'commands' array".to_string()]),
    }
}

/// Mistyped header fields of a structurally valid document.
pub fn header_problems(doc: &Value) -> Vec<HeaderProblem> {
    let Some(schema) = HEADER.as_ref() else {
        return Vec::new();
    };
    match schema.validate(doc) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| HeaderProblem {
                pointer: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect(),
    }
}

/// Removes the field `pointer` refers to. A pointer into an array removes
/// the whole array field. Returns `true` if something was removed.
pub fn strip_field(doc: &mut Value, pointer: &str) -> bool {
    let mut pointer = pointer;
    loop {
        let Some((parent, key)) = pointer.rsplit_once('/') else {
            return false;
        };
        match doc.pointer_mut(parent) {
            Some(Value::Object(map)) => return map.remove(key).is_some(),
            Some(Value::Array(_)) => pointer = parent,
            _ => return false,
        }
    }
}

/// `true` when `version` is one this engine writes.
pub fn is_supported_version(version: &str) -> bool {
    version == SCRIPT_FORMAT_VERSION
}
