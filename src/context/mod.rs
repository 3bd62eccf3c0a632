// Module: Context
// Collaborator handles, error policy and the run log handed to every command.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::browser::{self, Browser, Settings};
use crate::errors::{ScriptError, ScriptResult};

/// Severity of a context log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

/// Renders as `[HH:MM:SS] [LEVEL] message`.
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Everything a command may touch while it runs.
///
/// The browser and settings are shared handles: the context never owns or
/// tears them down. The log buffer is single-writer; callers that run several
/// executors against one context must synchronize access themselves.
pub struct ExecutionContext {
    browser: Option<Arc<dyn Browser>>,
    settings: Option<Arc<dyn Settings>>,
    logs: Vec<LogEntry>,
    /// Break the run at the first failing command.
    pub stop_on_error: bool,
    /// Raise the executor pause flag after a failing command.
    pub pause_on_error: bool,
    mirror_to_tracing: bool,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Context with no collaborators attached and both error policies off.
    pub fn new() -> Self {
        Self {
            browser: None,
            settings: None,
            logs: Vec::new(),
            stop_on_error: false,
            pause_on_error: false,
            mirror_to_tracing: true,
        }
    }

    pub fn with_browser(mut self, browser: Arc<dyn Browser>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn with_settings(mut self, settings: Arc<dyn Settings>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn with_pause_on_error(mut self, pause_on_error: bool) -> Self {
        self.pause_on_error = pause_on_error;
        self
    }

    /// Turns the `tracing` mirror of log entries on or off.
    pub fn with_tracing_mirror(mut self, enabled: bool) -> Self {
        self.mirror_to_tracing = enabled;
        self
    }

    /// The browser handle, or `CollaboratorUnavailable` when none is attached.
    pub fn browser(&self) -> ScriptResult<Arc<dyn Browser>> {
        self.browser
            .clone()
            .ok_or(ScriptError::CollaboratorUnavailable {
                collaborator: "browser",
            })
    }

    pub fn settings(&self) -> Option<&dyn Settings> {
        self.settings.as_deref()
    }

    /// Root directory for files written by commands.
    pub fn output_root(&self) -> PathBuf {
        browser::output_root(self.settings())
    }

    /// Appends a timestamped entry. Never fails.
    pub fn log(&mut self, message: impl Into<String>, level: LogLevel) {
        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            message: message.into(),
        };

        if self.mirror_to_tracing {
            match level {
                LogLevel::Debug => tracing::debug!(target: "qws_script", "{}", entry.message),
                LogLevel::Info => tracing::info!(target: "qws_script", "{}", entry.message),
                LogLevel::Warning => tracing::warn!(target: "qws_script", "{}", entry.message),
                LogLevel::Error => tracing::error!(target: "qws_script", "{}", entry.message),
            }
        }

        self.logs.push(entry);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(message, LogLevel::Info);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log(message, LogLevel::Warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(message, LogLevel::Error);
    }

    /// Snapshot of the log; later writes do not show up in it.
    pub fn get_logs(&self) -> Vec<LogEntry> {
        self.logs.clone()
    }

    /// The log rendered line by line.
    pub fn log_lines(&self) -> Vec<String> {
        self.logs.iter().map(ToString::to_string).collect()
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("browser", &self.browser.is_some())
            .field("settings", &self.settings.is_some())
            .field("logs", &self.logs.len())
            .field("stop_on_error", &self.stop_on_error)
            .field("pause_on_error", &self.pause_on_error)
            .finish()
    }
}
