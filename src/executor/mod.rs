//! # Script executor
//!
//! Loads a script document into commands and runs them one at a time against
//! an [`ExecutionContext`].
//!
//! ## States
//!
//! ```text
//! Idle ─load─> Loading ─> Ready ─execute─> Running ⇄ Paused
//!                 │                           │
//!                 └─> LoadFailed              ├─> Completed
//!                                             └─> Stopped
//! ```
//!
//! ## Failure policy
//!
//! - Loading is best-effort: each bad entry is skipped and kept as a
//!   [`LoadError`]; only a structurally broken document (or one over the
//!   command limit) ends in `LoadFailed`. A mistyped header field is
//!   dropped and reported as a document-level [`LoadError`].
//! - Running never returns an error. A failing command is recorded as an
//!   [`ExecutionError`] and the run either continues or breaks, per the
//!   context's `stop_on_error`.
//! - The outcome of a run is `true` exactly when no command failed.
//!
//! Pause and stop go through an [`ExecutionControl`] handle that can be
//! cloned out before the run starts and used from another task.

mod control;

pub use control::ExecutionControl;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::commands::{ScriptStep, DISCRIMINATOR_KEY};
use crate::config::{EngineConfig, DEFAULT_MAX_COMMANDS};
use crate::context::ExecutionContext;
use crate::errors::{ScriptError, ScriptFileError, ScriptResult, ValidationError};
use crate::loader;
use crate::protocol::{
    entry_timestamp, upgrade_legacy_document, CommandOutcome, CommandStatus, ExecutionReport,
    RunStatus, ScriptDocument, ScriptInfo,
};
use crate::registry::CommandRegistry;
use crate::validation::{header_problems, is_supported_version, strip_field, validate_envelope};

// ============================================================================
// STATE & RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    Idle,
    Loading,
    Ready,
    Running,
    Paused,
    Stopped,
    Completed,
    LoadFailed,
}

/// An entry that could not be turned into a command.
#[derive(Debug)]
pub struct LoadError {
    /// Position in `commands`; `None` for document-level failures.
    pub index: Option<usize>,
    pub discriminator: Option<String>,
    pub error: ScriptError,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.index, &self.discriminator) {
            (Some(i), Some(name)) => write!(f, "entry {i} ({name}): {}", self.error),
            (Some(i), None) => write!(f, "entry {i}: {}", self.error),
            (None, _) => write!(f, "document: {}", self.error),
        }
    }
}

/// A command that failed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionError {
    pub index: usize,
    pub command: String,
    pub message: String,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.index, self.command, self.message)
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

pub struct ScriptExecutor {
    registry: Arc<CommandRegistry>,
    control: ExecutionControl,
    max_commands: usize,
    phase: ExecutorState,
    info: ScriptInfo,
    steps: Vec<ScriptStep>,
    load_errors: Vec<LoadError>,
    errors: Vec<ExecutionError>,
    outcomes: Vec<CommandOutcome>,
    succeeded: usize,
    failed: usize,
    run_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ScriptExecutor {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            control: ExecutionControl::default(),
            max_commands: DEFAULT_MAX_COMMANDS,
            phase: ExecutorState::Idle,
            info: ScriptInfo::default(),
            steps: Vec::new(),
            load_errors: Vec::new(),
            errors: Vec::new(),
            outcomes: Vec::new(),
            succeeded: 0,
            failed: 0,
            run_id: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Applies the command limit and pause poll interval from `config`.
    /// Control handles already cloned out stay attached.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.max_commands = config.max_commands;
        self.control.set_poll_interval(config.pause_poll_interval);
        self
    }

    /// Uses an existing control handle, e.g. one a command was built with.
    pub fn with_control(mut self, control: ExecutionControl) -> Self {
        self.control = control;
        self
    }

    /// Handle for pausing, resuming or stopping runs of this executor.
    pub fn control(&self) -> ExecutionControl {
        self.control.clone()
    }

    pub fn state(&self) -> ExecutorState {
        if self.phase == ExecutorState::Running && self.control.is_paused() {
            ExecutorState::Paused
        } else {
            self.phase
        }
    }

    pub fn info(&self) -> &ScriptInfo {
        &self.info
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Replaces the loaded script with `document`.
    ///
    /// Returns the number of commands loaded. Per-entry problems are kept in
    /// [`load_errors`](Self::load_errors); nothing here fails outright.
    #[instrument(skip_all)]
    pub fn load_from_json(&mut self, document: &Value) -> usize {
        self.reset();
        self.phase = ExecutorState::Loading;

        let mut raw = document.clone();
        if upgrade_legacy_document(&mut raw) {
            info!("upgraded legacy script document");
        }

        if let Err(problems) = validate_envelope(&raw) {
            self.fail_load(ScriptFileError::Malformed(problems.join("; ")).into());
            return 0;
        }

        for problem in header_problems(&raw) {
            strip_field(&mut raw, &problem.pointer);
            self.skip_header_field(format!("{}: {}; field ignored", problem.pointer, problem.message));
        }

        let commands = match raw.get_mut("commands").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => {
                self.fail_load(ScriptFileError::Malformed("'commands' must be an array".to_string()).into());
                return 0;
            }
        };

        let info = match serde_json::from_value::<ScriptInfo>(raw) {
            Ok(info) => info,
            Err(e) => {
                self.skip_header_field(format!("header ignored: {e}"));
                ScriptInfo::default()
            }
        };

        if commands.len() > self.max_commands {
            self.fail_load(ScriptError::LimitExceeded {
                limit: self.max_commands,
                actual: commands.len(),
            });
            return 0;
        }

        if !is_supported_version(&info.version) {
            warn!(version = %info.version, "unsupported script version, loading anyway");
        }

        for (index, entry) in commands.iter().enumerate() {
            match self.build_step(entry) {
                Ok(step) => self.steps.push(step),
                Err((discriminator, error)) => {
                    warn!(index, error = %error, "skipping script entry");
                    self.load_errors.push(LoadError {
                        index: Some(index),
                        discriminator,
                        error,
                    });
                }
            }
        }

        self.info = info;
        self.control.set_total(self.steps.len());
        self.phase = ExecutorState::Ready;

        info!(
            script = %self.info.name,
            commands = self.steps.len(),
            load_errors = self.load_errors.len(),
            "script loaded"
        );
        self.steps.len()
    }

    fn build_step(&self, entry: &Value) -> Result<ScriptStep, (Option<String>, ScriptError)> {
        let Some(map) = entry.as_object() else {
            return Err((None, ValidationError::NotAnObject.into()));
        };

        let Some(name) = map.get(DISCRIMINATOR_KEY).and_then(Value::as_str) else {
            return Err((None, ValidationError::MissingDiscriminator.into()));
        };

        let command = self
            .registry
            .create(name, map)
            .map_err(|e| (Some(name.to_string()), e))?;

        Ok(ScriptStep {
            command,
            recorded_at: entry_timestamp(map),
        })
    }

    /// Records a header problem; the script still loads.
    fn skip_header_field(&mut self, message: String) {
        warn!(problem = %message, "ignoring script header field");
        self.load_errors.push(LoadError {
            index: None,
            discriminator: None,
            error: ScriptFileError::Malformed(message).into(),
        });
    }

    fn fail_load(&mut self, error: ScriptError) {
        warn!(error = %error, "script document rejected");
        self.load_errors.push(LoadError {
            index: None,
            discriminator: None,
            error,
        });
        self.phase = ExecutorState::LoadFailed;
    }

    /// Reads `path` and loads it. Only I/O and JSON syntax errors are
    /// returned; on those the executor is left as it was.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> ScriptResult<usize> {
        let document = loader::read_document(path)?;
        Ok(self.load_from_json(&document))
    }

    /// The loaded script as a document, step timestamps included.
    pub fn to_document(&self) -> ScriptDocument {
        ScriptDocument {
            info: self.info.clone(),
            commands: self.steps.iter().map(ScriptStep::to_entry).collect(),
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ScriptResult<()> {
        loader::write_document(path, &self.to_document())?;
        Ok(())
    }

    fn reset(&mut self) {
        self.info = ScriptInfo::default();
        self.steps.clear();
        self.load_errors.clear();
        self.clear_run();
        self.control.set_cursor(0);
        self.control.set_total(0);
        self.phase = ExecutorState::Idle;
    }

    fn clear_run(&mut self) {
        self.errors.clear();
        self.outcomes.clear();
        self.succeeded = 0;
        self.failed = 0;
        self.run_id = None;
        self.started_at = None;
        self.finished_at = None;
    }

    // ------------------------------------------------------------------------
    // Running
    // ------------------------------------------------------------------------

    /// Runs the loaded script. See [`execute_with_progress`](Self::execute_with_progress).
    pub async fn execute(&mut self, context: &mut ExecutionContext) -> bool {
        self.execute_with_progress(context, &mut |_, _, _| {}).await
    }

    /// Runs every loaded command in order and returns `true` when none failed.
    ///
    /// `on_progress(index, total, description)` is called right before each
    /// command starts. Only a script in `Ready`, `Completed` or `Stopped` can
    /// be run; anything else returns `false` without touching the state.
    #[instrument(skip_all, fields(script = %self.info.name, total = self.steps.len()))]
    pub async fn execute_with_progress(
        &mut self,
        context: &mut ExecutionContext,
        on_progress: &mut (dyn FnMut(usize, usize, &str) + Send),
    ) -> bool {
        if !matches!(
            self.phase,
            ExecutorState::Ready | ExecutorState::Completed | ExecutorState::Stopped
        ) {
            warn!(state = ?self.phase, "no runnable script loaded");
            return false;
        }

        self.clear_run();
        let run_id = Uuid::new_v4();
        self.run_id = Some(run_id);
        self.started_at = Some(Utc::now());

        let total = self.steps.len();
        self.phase = ExecutorState::Running;
        self.control.begin(total);
        info!(%run_id, "execution started");
        context.info(format!("Starting script '{}' ({} commands)", self.info.name, total));

        let mut stopped = false;
        for index in 0..total {
            if !self.control.checkpoint().await {
                stopped = true;
                break;
            }
            self.control.set_cursor(index);

            let command = &self.steps[index].command;
            let name = command.name().to_string();
            let description = command.description();
            on_progress(index, total, &description);

            debug!(index, command = %name, "running command");
            let started = Instant::now();
            let result = command.execute(context).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            self.control.set_cursor(index + 1);

            match result {
                Ok(()) => {
                    self.succeeded += 1;
                    context.info(format!("Command {}/{} completed: {}", index + 1, total, description));
                    self.outcomes.push(CommandOutcome {
                        index,
                        command: name,
                        description,
                        status: CommandStatus::Passed,
                        duration_ms,
                        error: None,
                    });
                }
                Err(e) => {
                    self.failed += 1;
                    let message = e.to_string();
                    context.error(format!("Command {}/{} failed: {} - {}", index + 1, total, description, message));
                    self.errors.push(ExecutionError {
                        index,
                        command: description.clone(),
                        message: message.clone(),
                    });
                    self.outcomes.push(CommandOutcome {
                        index,
                        command: name,
                        description,
                        status: CommandStatus::Failed,
                        duration_ms,
                        error: Some(message),
                    });

                    if context.stop_on_error {
                        context.warn("Stopping execution after error");
                        break;
                    }
                    if context.pause_on_error && self.control.pause() {
                        context.warn("Execution paused after error");
                    }
                }
            }
        }

        self.control.finish();
        self.finished_at = Some(Utc::now());
        self.phase = if stopped {
            context.warn("Execution stopped");
            ExecutorState::Stopped
        } else {
            ExecutorState::Completed
        };

        context.info(format!(
            "Script finished: {} succeeded, {} failed",
            self.succeeded, self.failed
        ));
        info!(
            %run_id,
            succeeded = self.succeeded,
            failed = self.failed,
            stopped,
            "execution finished"
        );

        self.failed == 0
    }

    pub fn pause(&self) -> bool {
        self.control.pause()
    }

    pub fn resume(&self) -> bool {
        self.control.resume()
    }

    pub fn stop(&self) -> bool {
        self.control.stop()
    }

    /// `(cursor, total, running)`; after a run the cursor is where it ended.
    pub fn get_progress(&self) -> (usize, usize, bool) {
        self.control.progress()
    }

    /// Failures of the last run, in execution order.
    pub fn get_errors(&self) -> &[ExecutionError] {
        &self.errors
    }

    /// Entries skipped by the last load.
    pub fn load_errors(&self) -> &[LoadError] {
        &self.load_errors
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Summary of the last run.
    pub fn report(&self) -> ExecutionReport {
        let status = if self.phase == ExecutorState::Stopped {
            RunStatus::Stopped
        } else if self.failed == 0 {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };

        ExecutionReport {
            run_id: self.run_id.map(|id| id.to_string()).unwrap_or_default(),
            script: self.info.name.clone(),
            status,
            start_time: self.started_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            end_time: self.finished_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            total: self.steps.len(),
            succeeded: self.succeeded,
            failed: self.failed,
            commands: self.outcomes.clone(),
        }
    }
}

impl fmt::Debug for ScriptExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptExecutor")
            .field("script", &self.info.name)
            .field("state", &self.state())
            .field("commands", &self.steps.len())
            .field("load_errors", &self.load_errors.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::registry::CommandConstructor;
    use crate::testing::{context_with, MockBrowser};
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::Mutex;
    use std::time::Duration;

    // ------------------------------------------------------------------------
    // Marker command: records that it ran, optionally fails or signals.
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Signal {
        None,
        Pause(ExecutionControl),
        Stop(ExecutionControl),
    }

    #[derive(Debug)]
    struct Marker {
        label: String,
        fail: bool,
        signal: Signal,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Command for Marker {
        fn name(&self) -> &str {
            "mark"
        }

        fn description(&self) -> String {
            format!("Mark {}", self.label)
        }

        fn to_mapping(&self) -> Map<String, Value> {
            json!({ "command": "mark", "label": self.label, "fail": self.fail })
                .as_object()
                .cloned()
                .unwrap()
        }

        async fn execute(&self, _context: &mut ExecutionContext) -> ScriptResult<()> {
            self.seen.lock().unwrap().push(self.label.clone());
            match &self.signal {
                Signal::Pause(control) => {
                    control.pause();
                }
                Signal::Stop(control) => {
                    control.stop();
                }
                Signal::None => {}
            }
            if self.fail {
                return Err(ScriptError::execution("mark", "marker failed"));
            }
            Ok(())
        }
    }

    /// Registry with builtins plus `mark`; entries with `"signal": true`
    /// fire `signal` when they run.
    fn marker_registry(seen: Arc<Mutex<Vec<String>>>, signal: Signal) -> Arc<CommandRegistry> {
        let mut registry = CommandRegistry::with_builtins();
        let ctor: CommandConstructor = Arc::new(move |data: &Map<String, Value>| {
            let label = data
                .get("label")
                .and_then(Value::as_str)
                .ok_or_else(|| ValidationError::missing("mark", "label"))?;
            let fires = data.get("signal").and_then(Value::as_bool).unwrap_or(false);
            Ok(Box::new(Marker {
                label: label.to_string(),
                fail: data.get("fail").and_then(Value::as_bool).unwrap_or(false),
                signal: if fires { signal.clone() } else { Signal::None },
                seen: seen.clone(),
            }) as Box<dyn Command>)
        });
        registry.register("mark", ctor).unwrap();
        Arc::new(registry)
    }

    fn markers(count: usize, failing: usize) -> Value {
        let commands: Vec<Value> = (0..count)
            .map(|i| json!({ "command": "mark", "label": i.to_string(), "fail": i == failing }))
            .collect();
        json!({ "name": "markers", "commands": commands })
    }

    fn quiet_context() -> ExecutionContext {
        ExecutionContext::new().with_tracing_mirror(false)
    }

    fn fast_control() -> ExecutionControl {
        ExecutionControl::new(Duration::from_millis(5))
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    #[test]
    fn test_partial_load() {
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        let loaded = executor.load_from_json(&json!({
            "commands": [
                { "command": "navigate", "url": "https://a.test" },
                { "command": "teleport", "to": "mars" },
                { "command": "pause", "seconds": 1 },
                { "command": "wait", "duration_ms": 10 }
            ]
        }));

        assert_eq!(loaded, 3);
        assert_eq!(executor.len(), 3);
        assert_eq!(executor.load_errors().len(), 1);
        let err = &executor.load_errors()[0];
        assert_eq!(err.index, Some(1));
        assert_eq!(err.discriminator.as_deref(), Some("teleport"));
        assert!(matches!(err.error, ScriptError::UnknownCommand { .. }));
        assert_eq!(executor.state(), ExecutorState::Ready);
    }

    #[test]
    fn test_entry_shape_errors() {
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        executor.load_from_json(&json!({
            "commands": [42, { "url": "https://a.test" }, { "command": "navigate" }]
        }));

        let errors: Vec<&ScriptError> = executor.load_errors().iter().map(|e| &e.error).collect();
        assert!(matches!(errors[0], ScriptError::Validation(ValidationError::NotAnObject)));
        assert!(matches!(errors[1], ScriptError::Validation(ValidationError::MissingDiscriminator)));
        assert!(matches!(errors[2], ScriptError::Validation(ValidationError::MissingField { .. })));
        assert!(executor.is_empty());
        assert_eq!(executor.state(), ExecutorState::Ready);
    }

    #[test]
    fn test_structurally_invalid_document() {
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        assert_eq!(executor.load_from_json(&json!({ "name": "nothing" })), 0);
        assert_eq!(executor.state(), ExecutorState::LoadFailed);
        assert_eq!(executor.load_errors().len(), 1);
        assert!(executor.load_errors()[0].index.is_none());
    }

    #[test]
    fn test_command_limit() {
        let config = EngineConfig {
            max_commands: 2,
            ..EngineConfig::for_testing()
        };
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins())).with_config(&config);
        executor.load_from_json(&json!({
            "commands": [
                { "command": "pause", "seconds": 0 },
                { "command": "pause", "seconds": 0 },
                { "command": "pause", "seconds": 0 }
            ]
        }));
        assert_eq!(executor.state(), ExecutorState::LoadFailed);
        assert!(matches!(
            executor.load_errors()[0].error,
            ScriptError::LimitExceeded { limit: 2, actual: 3 }
        ));
    }

    #[test]
    fn test_legacy_document_loads() {
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        let loaded = executor.load_from_json(&json!({
            "name": "old",
            "version": "1.0",
            "created_at": "2024-01-01T00:00:00",
            "actions": [
                { "action_type": "navigate", "url": "https://a.test", "timestamp": 1_700_000_000.0 },
                { "action_type": "save_screenshot", "filename": "a.png", "timestamp": 1_700_000_002.0 }
            ]
        }));
        assert_eq!(loaded, 2);
        assert_eq!(executor.steps()[1].command.name(), "screenshot");
        assert!(executor.steps()[0].recorded_at.is_some());
    }

    #[test]
    fn test_save_and_reload_keeps_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.qwsscript");

        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        executor.load_from_json(&json!({
            "name": "saved",
            "commands": [
                { "command": "navigate", "url": "https://a.test", "timestamp": "2024-05-01T10:00:00+00:00" },
                { "command": "click", "selector": "#go" }
            ]
        }));
        executor.save_to_file(&path).unwrap();

        let mut reloaded = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        assert_eq!(reloaded.load_from_file(&path).unwrap(), 2);
        assert_eq!(reloaded.info().name, "saved");
        assert_eq!(reloaded.to_document(), executor.to_document());
    }

    #[test]
    fn test_bundled_examples_load_cleanly() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join(crate::config::DEFAULT_EXAMPLES_DIR);
        let library = crate::library::ScriptLibrary::new(dir.join("none"), &dir);
        let entries = library.list().unwrap();
        assert!(!entries.is_empty());

        for entry in entries {
            let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
            let loaded = executor.load_from_file(&entry.path).unwrap();
            assert!(loaded > 0, "{} is empty", entry.name);
            assert!(executor.load_errors().is_empty(), "{}: {:?}", entry.name, executor.load_errors());
        }
    }

    #[test]
    fn test_loaded_steps_rebuild_from_their_own_mapping() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join(crate::config::DEFAULT_EXAMPLES_DIR);
        let library = crate::library::ScriptLibrary::new(dir.join("none"), &dir);
        let registry = Arc::new(CommandRegistry::with_builtins());
        let mut covered = std::collections::BTreeSet::new();

        for entry in library.list().unwrap() {
            let mut executor = ScriptExecutor::new(registry.clone());
            executor.load_from_file(&entry.path).unwrap();
            for step in executor.steps() {
                let mapping = step.command.to_mapping();
                let rebuilt = registry.create(step.command.name(), &mapping).unwrap();
                assert_eq!(rebuilt.to_mapping(), mapping, "{}", step.command.name());
                covered.insert(step.command.name().to_string());
            }
        }

        let builtins: std::collections::BTreeSet<String> =
            crate::commands::BUILTIN_COMMANDS.iter().map(|n| n.to_string()).collect();
        assert_eq!(covered, builtins);
    }

    #[test]
    fn test_mistyped_header_still_loads() {
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        let loaded = executor.load_from_json(&json!({
            "name": "s",
            "metadata": { "author": "qa", "tags": "smoke" },
            "commands": [
                { "command": "pause", "seconds": 0 },
                { "command": "wait", "duration_ms": 1 }
            ]
        }));

        assert_eq!(loaded, 2);
        assert_eq!(executor.state(), ExecutorState::Ready);
        assert_eq!(executor.load_errors().len(), 1);
        assert!(executor.load_errors()[0].index.is_none());
        assert!(executor.load_errors()[0].to_string().contains("/metadata/tags"));

        assert_eq!(executor.info().name, "s");
        let metadata = executor.info().metadata.as_ref().unwrap();
        assert_eq!(metadata.author.as_deref(), Some("qa"));
        assert!(metadata.tags.is_none());
    }

    #[test]
    fn test_non_string_name_is_dropped() {
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        let loaded = executor.load_from_json(&json!({
            "name": 3,
            "version": null,
            "commands": [{ "command": "pause", "seconds": 0 }]
        }));

        assert_eq!(loaded, 1);
        assert_eq!(executor.state(), ExecutorState::Ready);
        assert_eq!(executor.load_errors().len(), 2);
        assert_eq!(executor.info().name, "");
        assert_eq!(executor.info().version, crate::protocol::SCRIPT_FORMAT_VERSION);
    }

    #[tokio::test]
    async fn test_unrepresentable_pause_is_skipped() {
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        let loaded = executor.load_from_json(&json!({
            "commands": [
                { "command": "pause", "seconds": 1e20 },
                { "command": "pause", "seconds": 0 }
            ]
        }));

        assert_eq!(loaded, 1);
        assert_eq!(executor.load_errors()[0].index, Some(0));
        assert!(matches!(
            executor.load_errors()[0].error,
            ScriptError::Validation(ValidationError::InvalidField { .. })
        ));

        let mut ctx = quiet_context();
        assert!(executor.execute(&mut ctx).await);
    }

    #[test]
    fn test_with_config_keeps_cloned_control() {
        let executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        let early = executor.control();

        let config = EngineConfig {
            pause_poll_interval: Duration::from_millis(7),
            ..EngineConfig::for_testing()
        };
        let executor = executor.with_config(&config);

        assert_eq!(executor.control().poll_interval(), Duration::from_millis(7));
        assert_eq!(early.poll_interval(), Duration::from_millis(7));

        early.begin(1);
        assert!(executor.pause());
        assert!(early.is_paused());
        assert!(early.stop());
        assert!(!executor.control().is_running());
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        let err = executor.load_from_file(dir.path().join("missing.qwsscript")).unwrap_err();
        assert!(matches!(err, ScriptError::File(ScriptFileError::Read { .. })));
        assert_eq!(executor.state(), ExecutorState::Idle);
    }

    // ------------------------------------------------------------------------
    // Running
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_two_pauses_succeed() {
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        executor.load_from_json(&json!({
            "commands": [{ "command": "pause", "seconds": 0 }, { "command": "pause", "seconds": 0 }]
        }));

        let mut ctx = context_with(MockBrowser::new());
        assert!(executor.execute(&mut ctx).await);

        let completed = ctx.log_lines().iter().filter(|l| l.contains("completed:")).count();
        assert_eq!(completed, 2);
        assert!(executor.get_errors().is_empty());
        assert_eq!(executor.state(), ExecutorState::Completed);
        assert_eq!(executor.get_progress(), (2, 2, false));
    }

    #[tokio::test]
    async fn test_stop_on_error_breaks_loop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut executor = ScriptExecutor::new(marker_registry(seen.clone(), Signal::None));
        executor.load_from_json(&markers(5, 2));

        let mut ctx = quiet_context().with_stop_on_error(true);
        assert!(!executor.execute(&mut ctx).await);

        assert_eq!(*seen.lock().unwrap(), vec!["0", "1", "2"]);
        assert_eq!(executor.get_errors().len(), 1);
        assert_eq!(executor.get_errors()[0].index, 2);
        assert_eq!(executor.get_errors()[0].command, "Mark 2");
        assert_eq!(executor.state(), ExecutorState::Completed);
    }

    #[tokio::test]
    async fn test_continue_on_error_runs_everything() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut executor = ScriptExecutor::new(marker_registry(seen.clone(), Signal::None));
        executor.load_from_json(&markers(5, 2));

        let mut ctx = quiet_context();
        assert!(!executor.execute(&mut ctx).await);

        assert_eq!(seen.lock().unwrap().len(), 5);
        assert_eq!(executor.get_errors().len(), 1);
        assert_eq!((executor.succeeded(), executor.failed()), (4, 1));
    }

    #[tokio::test]
    async fn test_progress_callback_precedes_each_command() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut executor = ScriptExecutor::new(marker_registry(seen, Signal::None));
        executor.load_from_json(&markers(3, usize::MAX));

        let mut calls = Vec::new();
        let mut ctx = quiet_context();
        let ok = executor
            .execute_with_progress(&mut ctx, &mut |i, total, desc| calls.push(format!("{i}/{total} {desc}")))
            .await;

        assert!(ok);
        assert_eq!(calls, vec!["0/3 Mark 0", "1/3 Mark 1", "2/3 Mark 2"]);
    }

    #[tokio::test]
    async fn test_pause_blocks_until_resume() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let control = fast_control();
        let registry = marker_registry(seen.clone(), Signal::Pause(control.clone()));
        let mut executor = ScriptExecutor::new(registry).with_control(control.clone());
        executor.load_from_json(&json!({
            "commands": [
                { "command": "mark", "label": "gate", "signal": true },
                { "command": "mark", "label": "after" }
            ]
        }));

        let handle = tokio::spawn(async move {
            let mut ctx = quiet_context();
            let ok = executor.execute(&mut ctx).await;
            (ok, executor)
        });

        while !control.is_paused() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["gate"]);
        assert_eq!(control.progress(), (1, 2, true));

        assert!(control.resume());
        let (ok, executor) = handle.await.unwrap();

        assert!(ok);
        assert_eq!(*seen.lock().unwrap(), vec!["gate", "after"]);
        assert_eq!(executor.state(), ExecutorState::Completed);
    }

    #[tokio::test]
    async fn test_stop_prevents_further_commands() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let control = fast_control();
        let registry = marker_registry(seen.clone(), Signal::Stop(control.clone()));
        let mut executor = ScriptExecutor::new(registry).with_control(control);
        executor.load_from_json(&json!({
            "commands": [
                { "command": "mark", "label": "0" },
                { "command": "mark", "label": "1", "signal": true },
                { "command": "mark", "label": "2" }
            ]
        }));

        let mut ctx = quiet_context();
        assert!(executor.execute(&mut ctx).await);

        // The stopping command itself finishes.
        assert_eq!(*seen.lock().unwrap(), vec!["0", "1"]);
        assert_eq!(executor.state(), ExecutorState::Stopped);
        assert_eq!(executor.get_progress(), (2, 3, false));
        assert_eq!(executor.report().status, RunStatus::Stopped);
    }

    #[tokio::test]
    async fn test_pause_on_error_waits_for_resume() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let control = fast_control();
        let mut executor =
            ScriptExecutor::new(marker_registry(seen.clone(), Signal::None)).with_control(control.clone());
        executor.load_from_json(&markers(3, 0));

        let handle = tokio::spawn(async move {
            let mut ctx = quiet_context().with_pause_on_error(true);
            executor.execute(&mut ctx).await
        });

        while !control.is_paused() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(*seen.lock().unwrap(), vec!["0"]);

        control.resume();
        assert!(!handle.await.unwrap());
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_browser_is_recorded_not_raised() {
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        executor.load_from_json(&json!({
            "commands": [{ "command": "navigate", "url": "https://a.test" }]
        }));

        let mut ctx = quiet_context();
        assert!(!executor.execute(&mut ctx).await);
        assert!(executor.get_errors()[0].message.contains("browser"));
    }

    #[tokio::test]
    async fn test_execute_without_script() {
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        let mut ctx = quiet_context();
        assert!(!executor.execute(&mut ctx).await);
        assert_eq!(executor.state(), ExecutorState::Idle);
    }

    #[tokio::test]
    async fn test_report_after_run() {
        let browser = MockBrowser::new();
        browser.fail_on("click");
        let mut executor = ScriptExecutor::new(Arc::new(CommandRegistry::with_builtins()));
        executor.load_from_json(&json!({
            "name": "report",
            "commands": [
                { "command": "navigate", "url": "https://a.test", "wait_for_load": false },
                { "command": "click", "selector": "#missing" }
            ]
        }));

        let mut ctx = context_with(browser);
        executor.execute(&mut ctx).await;
        let report = executor.report();

        assert_eq!(report.script, "report");
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!((report.total, report.succeeded, report.failed), (2, 1, 1));
        assert_eq!(report.commands[1].status, CommandStatus::Failed);
        assert!(Uuid::parse_str(&report.run_id).is_ok());
    }
}
