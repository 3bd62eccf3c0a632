//! # Capture commands
//!
//! `save_html` and `screenshot` write files under the context's output root
//! (settings key `output_dir`, or the working directory).
//!
//! File names must be plain names and directories must be relative paths
//! without `..`, so a script cannot write outside the output root. Both are
//! checked when the command is built, not when it runs.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::instrument;

use crate::context::ExecutionContext;
use crate::errors::{ScriptError, ScriptResult, ValidationError};

use super::fields::Fields;
use super::{mapping, Command, CommandSpec};

pub const DEFAULT_HTML_FILENAME: &str = "page.html";
pub const DEFAULT_SCREENSHOT_FILENAME: &str = "screenshot.png";

fn check_file_name(command: &str, field: &str, name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::invalid(command, field, "must not be empty"));
    }
    if trimmed.contains(|c: char| c == '/' || c == '\\') || trimmed == "." || trimmed == ".." {
        return Err(ValidationError::invalid(
            command,
            field,
            "must be a plain file name without directories",
        ));
    }
    Ok(())
}

fn check_relative_dir(command: &str, field: &str, dir: &str) -> Result<(), ValidationError> {
    let escapes = Path::new(dir).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(ValidationError::invalid(
            command,
            field,
            "must be a relative path that stays inside the output directory",
        ));
    }
    Ok(())
}

async fn prepare_target(command: &str, root: &Path, dir: &str, file: &str) -> ScriptResult<PathBuf> {
    let parent = root.join(dir);
    tokio::fs::create_dir_all(&parent)
        .await
        .map_err(|e| ScriptError::execution(command, format!("cannot create {parent:?}: {e}")))?;
    Ok(parent.join(file))
}

// ============================================================================
// SAVE HTML
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveHtml {
    pub filename: String,
    /// Directory relative to the output root.
    pub path: String,
}

impl Default for SaveHtml {
    fn default() -> Self {
        Self {
            filename: DEFAULT_HTML_FILENAME.to_string(),
            path: ".".to_string(),
        }
    }
}

impl CommandSpec for SaveHtml {
    const NAME: &'static str = "save_html";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        let fields = Fields::new(Self::NAME, data);
        let filename = fields.str_or("filename", DEFAULT_HTML_FILENAME)?;
        let path = fields.str_or("path", ".")?;

        check_file_name(Self::NAME, "filename", &filename)?;
        check_relative_dir(Self::NAME, "path", &path)?;

        Ok(Self { filename, path })
    }
}

#[async_trait]
impl Command for SaveHtml {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!("Save page HTML to {}", Path::new(&self.path).join(&self.filename).display())
    }

    fn to_mapping(&self) -> Map<String, Value> {
        mapping(
            Self::NAME,
            json!({ "filename": self.filename, "path": self.path }),
        )
    }

    #[instrument(name = "save_html", skip_all, fields(filename = %self.filename))]
    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        let browser = context.browser()?;
        let target = prepare_target(Self::NAME, &context.output_root(), &self.path, &self.filename).await?;

        browser
            .save_html(&target)
            .await
            .map_err(|e| ScriptError::execution(Self::NAME, format!("{e:#}")))?;

        context.info(format!("Saved HTML to {}", target.display()));
        Ok(())
    }
}

// ============================================================================
// SCREENSHOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub filename: String,
}

impl Default for Screenshot {
    fn default() -> Self {
        Self {
            filename: DEFAULT_SCREENSHOT_FILENAME.to_string(),
        }
    }
}

impl CommandSpec for Screenshot {
    const NAME: &'static str = "screenshot";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        let filename = Fields::new(Self::NAME, data).str_or("filename", DEFAULT_SCREENSHOT_FILENAME)?;
        check_file_name(Self::NAME, "filename", &filename)?;
        Ok(Self { filename })
    }
}

#[async_trait]
impl Command for Screenshot {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!("Capture screenshot to {}", self.filename)
    }

    fn to_mapping(&self) -> Map<String, Value> {
        mapping(Self::NAME, json!({ "filename": self.filename }))
    }

    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        let browser = context.browser()?;
        let target = prepare_target(Self::NAME, &context.output_root(), ".", &self.filename).await?;

        browser
            .capture_screenshot(&target)
            .await
            .map_err(|e| ScriptError::execution(Self::NAME, format!("{e:#}")))?;

        context.info(format!("Saved screenshot to {}", target.display()));
        Ok(())
    }
}
