// Script-level commands: `log_message` writes to the run log, `run_script`
// evaluates JavaScript in the current page.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::context::{ExecutionContext, LogLevel};
use crate::errors::{ScriptError, ScriptResult, ValidationError};

use super::fields::Fields;
use super::{mapping, Command, CommandSpec};

/// Longest script result echoed into the run log.
const MAX_LOGGED_RESULT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub message: String,
    pub level: LogLevel,
}

impl CommandSpec for LogMessage {
    const NAME: &'static str = "log_message";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        let fields = Fields::new(Self::NAME, data);
        let level = match fields.optional_str("level")? {
            None => LogLevel::Info,
            Some(raw) => raw
                .parse()
                .map_err(|reason: String| ValidationError::invalid(Self::NAME, "level", reason))?,
        };
        Ok(Self {
            message: fields.required_str("message")?,
            level,
        })
    }
}

#[async_trait]
impl Command for LogMessage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!("Log: {}", self.message)
    }

    fn to_mapping(&self) -> Map<String, Value> {
        mapping(
            Self::NAME,
            json!({ "message": self.message, "level": self.level }),
        )
    }

    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        context.log(self.message.clone(), self.level);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunScript {
    pub script: String,
}

impl CommandSpec for RunScript {
    const NAME: &'static str = "run_script";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        Ok(Self {
            script: Fields::new(Self::NAME, data).required_non_empty("script")?,
        })
    }
}

#[async_trait]
impl Command for RunScript {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        let first_line = self.script.lines().next().unwrap_or_default();
        format!("Run script: {first_line}")
    }

    fn to_mapping(&self) -> Map<String, Value> {
        mapping(Self::NAME, json!({ "script": self.script }))
    }

    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        let browser = context.browser()?;
        let result = browser
            .run_script(&self.script)
            .await
            .map_err(|e| ScriptError::execution(Self::NAME, format!("{e:#}")))?;

        let mut rendered = result.to_string();
        if rendered.len() > MAX_LOGGED_RESULT {
            let cut = (0..=MAX_LOGGED_RESULT)
                .rev()
                .find(|i| rendered.is_char_boundary(*i))
                .unwrap_or(0);
            rendered.truncate(cut);
            rendered.push_str("...");
        }
        context.info(format!("Script result: {rendered}"));
        Ok(())
    }
}
