//! # Recorder
//!
//! Turns the interaction stream of a live browser into script steps.
//!
//! The host UI forwards what the user does as [`BrowserEvent`]s. While
//! recording, each event becomes the matching command, stamped with the time
//! it was observed. The result is saved in the same document format the
//! executor loads, so a recording can be replayed as-is:
//!
//! ```ignore
//! let mut recorder = Recorder::new("checkout");
//! recorder.start();
//! recorder.observe(BrowserEvent::Navigated { url: "https://shop.test".into() });
//! recorder.observe(BrowserEvent::Clicked { selector: Some("#buy".into()), x: 0, y: 0 });
//! recorder.stop();
//! recorder.save("checkout.qwsscript")?;
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::commands::{
    Click, Command, CommandSpec, Input, LogMessage, Navigate, NavigateNewTab, Resize, SaveHtml,
    ScriptStep, Screenshot,
};
use crate::context::LogLevel;
use crate::errors::{ScriptResult, ValidationError};
use crate::loader;
use crate::protocol::{ScriptDocument, ScriptInfo, ScriptMetadata};

/// Something the user did in the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BrowserEvent {
    Navigated { url: String },
    NavigatedNewTab { url: String },
    Resized { width: u32, height: u32 },
    /// A click; `selector` is set when the host could resolve the element.
    Clicked { selector: Option<String>, x: i32, y: i32 },
    Input { selector: String, text: String },
    HtmlSaved { filename: String, path: String },
    ScreenshotSaved { filename: String },
    Note { message: String, level: LogLevel },
}

impl BrowserEvent {
    fn into_command(self) -> Result<Box<dyn Command>, ValidationError> {
        Ok(match self {
            Self::Navigated { url } => boxed(Navigate::new(url))?,
            Self::NavigatedNewTab { url } => boxed(NavigateNewTab { url })?,
            Self::Resized { width, height } => boxed(Resize { width, height })?,
            Self::Clicked {
                selector: Some(selector),
                ..
            } => boxed(Click::selector(selector))?,
            Self::Clicked { selector: None, x, y } => boxed(Click::at(x, y))?,
            Self::Input { selector, text } => boxed(Input { selector, text })?,
            Self::HtmlSaved { filename, path } => boxed(SaveHtml { filename, path })?,
            Self::ScreenshotSaved { filename } => boxed(Screenshot { filename })?,
            Self::Note { message, level } => boxed(LogMessage { message, level })?,
        })
    }
}

/// Passes `command` through its own loader so only steps that will load
/// again get recorded.
fn boxed<C: CommandSpec>(command: C) -> Result<Box<dyn Command>, ValidationError> {
    let checked = C::from_mapping(&command.to_mapping())?;
    Ok(Box::new(checked))
}

#[derive(Debug)]
pub struct Recorder {
    info: ScriptInfo,
    steps: Vec<ScriptStep>,
    recording: bool,
    started_at: Option<DateTime<Utc>>,
}

impl Recorder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: ScriptInfo::named(name),
            steps: Vec::new(),
            recording: false,
            started_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.info.description = Some(description.into());
        self
    }

    /// Starts a fresh recording, dropping any earlier steps.
    pub fn start(&mut self) {
        if self.recording {
            return;
        }
        self.steps.clear();
        self.started_at = Some(Utc::now());
        self.recording = true;
        info!(script = %self.info.name, "recording started");
    }

    pub fn stop(&mut self) {
        if !self.recording {
            return;
        }
        self.recording = false;
        info!(script = %self.info.name, steps = self.steps.len(), "recording stopped");
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Records `event` now. Returns `true` if a step was appended.
    pub fn observe(&mut self, event: BrowserEvent) -> bool {
        self.observe_at(event, Utc::now())
    }

    /// Records `event` as observed at `at`. Ignored while not recording.
    pub fn observe_at(&mut self, event: BrowserEvent, at: DateTime<Utc>) -> bool {
        if !self.recording {
            return false;
        }
        match event.into_command() {
            Ok(command) => {
                debug!(command = command.name(), "recorded step");
                self.steps.push(ScriptStep::recorded(command, at));
                true
            }
            Err(e) => {
                warn!(error = %e, "event not recordable");
                false
            }
        }
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn to_document(&self) -> ScriptDocument {
        let mut info = self.info.clone();
        if let Some(started) = self.started_at {
            let metadata = info.metadata.get_or_insert_with(ScriptMetadata::default);
            metadata.created_at.get_or_insert_with(|| started.to_rfc3339());
        }
        ScriptDocument {
            info,
            commands: self.steps.iter().map(ScriptStep::to_entry).collect(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ScriptResult<()> {
        loader::write_document(path, &self.to_document())?;
        Ok(())
    }
}
