// Module: Commands
// Built-in automation steps (navigation, capture, interaction, timing,
// scripting) and the contract every registered command implements.

pub mod capture;
pub mod fields;
pub mod interaction;
pub mod navigation;
pub mod scripting;
pub mod timing;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::errors::{ScriptResult, ValidationError};
use crate::protocol::TIMESTAMP_KEY;

pub use capture::{SaveHtml, Screenshot};
pub use interaction::{Click, Input, Resize};
pub use navigation::{Navigate, NavigateNewTab};
pub use scripting::{LogMessage, RunScript};
pub use timing::{Pause, Wait};

/// Key holding the discriminator in a serialized command.
pub const DISCRIMINATOR_KEY: &str = "command";

/// A single executable, serializable automation step.
///
/// Commands only touch the collaborators reachable through the context and
/// the context log. They never reach into the registry or the executor.
#[async_trait]
pub trait Command: fmt::Debug + Send + Sync {
    /// Discriminator this command serializes under.
    fn name(&self) -> &str;

    /// One-line summary used in progress callbacks and error lists.
    fn description(&self) -> String;

    /// Field mapping including the `command` discriminator. Pure.
    fn to_mapping(&self) -> Map<String, Value>;

    /// Performs the side effect. Failures are returned, never swallowed.
    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()>;
}

/// Commands constructible from a field mapping under a fixed discriminator.
pub trait CommandSpec: Command + Sized + 'static {
    const NAME: &'static str;

    /// Validates and builds the command. Fields of other commands and
    /// unknown keys are ignored.
    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError>;
}

/// Builds a command mapping from an object of fields.
pub(crate) fn mapping(name: &str, fields: Value) -> Map<String, Value> {
    let mut map = match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert(DISCRIMINATOR_KEY.to_string(), Value::String(name.to_string()));
    map
}

/// A command in a script, with the time it was observed if it was recorded.
#[derive(Debug)]
pub struct ScriptStep {
    pub command: Box<dyn Command>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl ScriptStep {
    pub fn new(command: Box<dyn Command>) -> Self {
        Self {
            command,
            recorded_at: None,
        }
    }

    pub fn recorded(command: Box<dyn Command>, at: DateTime<Utc>) -> Self {
        Self {
            command,
            recorded_at: Some(at),
        }
    }

    /// Document entry for this step: the command mapping plus `timestamp`.
    pub fn to_entry(&self) -> Value {
        let mut entry = self.command.to_mapping();
        if let Some(at) = self.recorded_at {
            entry.insert(TIMESTAMP_KEY.to_string(), Value::String(at.to_rfc3339()));
        }
        Value::Object(entry)
    }
}

/// Discriminators of every built-in command.
pub const BUILTIN_COMMANDS: &[&str] = &[
    Navigate::NAME,
    NavigateNewTab::NAME,
    SaveHtml::NAME,
    Screenshot::NAME,
    Pause::NAME,
    Wait::NAME,
    Click::NAME,
    Input::NAME,
    Resize::NAME,
    LogMessage::NAME,
    RunScript::NAME,
];
