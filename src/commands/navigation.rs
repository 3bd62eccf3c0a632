//! # Navigation commands
//!
//! - `navigate` loads a URL in the current tab.
//! - `navigate_new_tab` opens a tab and loads a URL in it.
//!
//! ## Load synchronization
//!
//! With `wait_for_load` set (the default), `navigate` awaits
//! [`Browser::wait_for_load`](crate::browser::Browser::wait_for_load) after
//! starting the navigation, so the next command sees a loaded page. How long
//! that may take is the browser's own timeout policy; no fixed settle delay is
//! inserted.
//!
//! ```json
//! { "command": "navigate", "url": "https://example.com", "wait_for_load": true }
//! ```

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::instrument;

use crate::context::ExecutionContext;
use crate::errors::{ScriptError, ScriptResult, ValidationError};

use super::fields::Fields;
use super::{mapping, Command, CommandSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigate {
    pub url: String,
    pub wait_for_load: bool,
}

impl Navigate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wait_for_load: true,
        }
    }
}

impl CommandSpec for Navigate {
    const NAME: &'static str = "navigate";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        let fields = Fields::new(Self::NAME, data);
        Ok(Self {
            url: fields.required_non_empty("url")?,
            wait_for_load: fields.bool_or("wait_for_load", true)?,
        })
    }
}

#[async_trait]
impl Command for Navigate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!("Navigate to {}", self.url)
    }

    fn to_mapping(&self) -> Map<String, Value> {
        mapping(
            Self::NAME,
            json!({ "url": self.url, "wait_for_load": self.wait_for_load }),
        )
    }

    #[instrument(name = "navigate", skip_all, fields(url = %self.url))]
    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        let browser = context.browser()?;

        context.info(format!("Navigating to {}", self.url));
        browser
            .navigate(&self.url)
            .await
            .map_err(|e| ScriptError::execution(Self::NAME, format!("{e:#}")))?;

        if self.wait_for_load {
            browser
                .wait_for_load()
                .await
                .map_err(|e| ScriptError::execution(Self::NAME, format!("page load: {e:#}")))?;
            context.info(format!("Page loaded: {}", self.url));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigateNewTab {
    pub url: String,
}

impl CommandSpec for NavigateNewTab {
    const NAME: &'static str = "navigate_new_tab";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        Ok(Self {
            url: Fields::new(Self::NAME, data).required_non_empty("url")?,
        })
    }
}

#[async_trait]
impl Command for NavigateNewTab {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!("Open {} in a new tab", self.url)
    }

    fn to_mapping(&self) -> Map<String, Value> {
        mapping(Self::NAME, json!({ "url": self.url }))
    }

    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        let browser = context.browser()?;
        context.info(format!("Opening new tab: {}", self.url));
        browser
            .open_tab(&self.url)
            .await
            .map_err(|e| ScriptError::execution(Self::NAME, format!("{e:#}")))
    }
}
