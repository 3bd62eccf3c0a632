//! # Interaction commands
//!
//! `click`, `input` and `resize` drive the page the way a user would.
//!
//! A `click` carries two addressing modes. `use_position` picks the one that
//! is consulted; the fields of the other mode may be present and are kept
//! for round-tripping, but they are ignored at run time.
//!
//! ```json
//! { "command": "click", "selector": "#submit", "use_position": false }
//! { "command": "click", "x": 120, "y": 48, "use_position": true }
//! ```

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::instrument;

use crate::context::ExecutionContext;
use crate::errors::{ScriptError, ScriptResult, ValidationError};

use super::fields::Fields;
use super::{mapping, Command, CommandSpec};

// ============================================================================
// CLICK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Click {
    pub selector: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub use_position: bool,
}

impl Click {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            x: None,
            y: None,
            use_position: false,
        }
    }

    pub fn at(x: i32, y: i32) -> Self {
        Self {
            selector: None,
            x: Some(x),
            y: Some(y),
            use_position: true,
        }
    }
}

impl CommandSpec for Click {
    const NAME: &'static str = "click";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        let fields = Fields::new(Self::NAME, data);
        let click = Self {
            selector: fields.optional_str("selector")?,
            x: fields.optional_i32("x")?,
            y: fields.optional_i32("y")?,
            use_position: fields.bool_or("use_position", false)?,
        };

        if click.use_position {
            if click.x.is_none() {
                return Err(ValidationError::missing(Self::NAME, "x"));
            }
            if click.y.is_none() {
                return Err(ValidationError::missing(Self::NAME, "y"));
            }
        } else {
            match &click.selector {
                None => return Err(ValidationError::missing(Self::NAME, "selector")),
                Some(s) if s.trim().is_empty() => {
                    return Err(ValidationError::invalid(Self::NAME, "selector", "must not be empty"))
                }
                Some(_) => {}
            }
        }

        Ok(click)
    }
}

#[async_trait]
impl Command for Click {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        match (self.use_position, self.x, self.y, &self.selector) {
            (true, Some(x), Some(y), _) => format!("Click at ({x}, {y})"),
            (_, _, _, Some(selector)) => format!("Click {selector}"),
            _ => "Click".to_string(),
        }
    }

    fn to_mapping(&self) -> Map<String, Value> {
        let mut map = mapping(Self::NAME, json!({ "use_position": self.use_position }));
        if let Some(selector) = &self.selector {
            map.insert("selector".to_string(), json!(selector));
        }
        if let Some(x) = self.x {
            map.insert("x".to_string(), json!(x));
        }
        if let Some(y) = self.y {
            map.insert("y".to_string(), json!(y));
        }
        map
    }

    #[instrument(name = "click", skip_all, fields(use_position = self.use_position))]
    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        let browser = context.browser()?;

        let result = if self.use_position {
            let (x, y) = self
                .x
                .zip(self.y)
                .ok_or_else(|| ScriptError::from(ValidationError::missing(Self::NAME, "x")))?;
            context.info(format!("Clicking at ({x}, {y})"));
            browser.click_at(x, y).await
        } else {
            let selector = self
                .selector
                .as_deref()
                .ok_or_else(|| ScriptError::from(ValidationError::missing(Self::NAME, "selector")))?;
            context.info(format!("Clicking {selector}"));
            browser.click_selector(selector).await
        };

        result.map_err(|e| ScriptError::execution(Self::NAME, format!("{e:#}")))
    }
}

// ============================================================================
// INPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub selector: String,
    pub text: String,
}

impl CommandSpec for Input {
    const NAME: &'static str = "input";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        let fields = Fields::new(Self::NAME, data);
        Ok(Self {
            selector: fields.required_non_empty("selector")?,
            // Empty text is a valid way to clear a field.
            text: fields.required_str("text")?,
        })
    }
}

#[async_trait]
impl Command for Input {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!("Type into {}", self.selector)
    }

    fn to_mapping(&self) -> Map<String, Value> {
        mapping(
            Self::NAME,
            json!({ "selector": self.selector, "text": self.text }),
        )
    }

    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        let browser = context.browser()?;
        context.info(format!("Setting input {} ({} chars)", self.selector, self.text.chars().count()));
        browser
            .set_input(&self.selector, &self.text)
            .await
            .map_err(|e| ScriptError::execution(Self::NAME, format!("{e:#}")))
    }
}

// ============================================================================
// RESIZE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

impl CommandSpec for Resize {
    const NAME: &'static str = "resize";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        let fields = Fields::new(Self::NAME, data);
        let width = fields.required_u32("width")?;
        let height = fields.required_u32("height")?;
        if width == 0 {
            return Err(ValidationError::invalid(Self::NAME, "width", "must be greater than 0"));
        }
        if height == 0 {
            return Err(ValidationError::invalid(Self::NAME, "height", "must be greater than 0"));
        }
        Ok(Self { width, height })
    }
}

#[async_trait]
impl Command for Resize {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!("Resize window to {}x{}", self.width, self.height)
    }

    fn to_mapping(&self) -> Map<String, Value> {
        mapping(
            Self::NAME,
            json!({ "width": self.width, "height": self.height }),
        )
    }

    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        let browser = context.browser()?;
        context.info(format!("Resizing window to {}x{}", self.width, self.height));
        browser
            .resize(self.width, self.height)
            .await
            .map_err(|e| ScriptError::execution(Self::NAME, format!("{e:#}")))
    }
}
