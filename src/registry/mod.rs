//! # Command registry
//!
//! Maps a discriminator string to the constructor that builds the command from
//! its field mapping.
//!
//! A registry is an explicit value: the startup path builds one with
//! [`CommandRegistry::with_builtins`], plugins add their own commands on top,
//! and the result is shared (usually behind an `Arc`) with every executor.
//! Tests build a fresh one each time.
//!
//! ```ignore
//! let mut registry = CommandRegistry::with_builtins();
//! registry.register_command::<MyPluginCommand>()?;
//! let cmd = registry.create("navigate", &fields)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::commands::{
    Click, Command, CommandSpec, Input, LogMessage, Navigate, NavigateNewTab, Pause, Resize,
    RunScript, SaveHtml, Screenshot, Wait,
};
use crate::errors::{ScriptError, ScriptResult, ValidationError};

/// Builds a command from its field mapping.
pub type CommandConstructor =
    Arc<dyn Fn(&Map<String, Value>) -> Result<Box<dyn Command>, ValidationError> + Send + Sync>;

#[derive(Default)]
pub struct CommandRegistry {
    constructors: HashMap<String, CommandConstructor>,
}

impl CommandRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    fn register_builtins(&mut self) {
        // Fresh registry: none of these can collide.
        let _ = self.register_command::<Navigate>();
        let _ = self.register_command::<NavigateNewTab>();
        let _ = self.register_command::<SaveHtml>();
        let _ = self.register_command::<Screenshot>();
        let _ = self.register_command::<Pause>();
        let _ = self.register_command::<Wait>();
        let _ = self.register_command::<Click>();
        let _ = self.register_command::<Input>();
        let _ = self.register_command::<Resize>();
        let _ = self.register_command::<LogMessage>();
        let _ = self.register_command::<RunScript>();
    }

    /// Binds `name` to `constructor`. Rebinding an existing name is an error.
    pub fn register(&mut self, name: impl Into<String>, constructor: CommandConstructor) -> ScriptResult<()> {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            return Err(ScriptError::DuplicateCommand { name });
        }
        debug!(command = %name, "registered command");
        self.constructors.insert(name, constructor);
        Ok(())
    }

    /// Registers a [`CommandSpec`] type under its own discriminator.
    pub fn register_command<C: CommandSpec>(&mut self) -> ScriptResult<()> {
        self.register(
            C::NAME,
            Arc::new(|data: &Map<String, Value>| {
                C::from_mapping(data).map(|cmd| Box::new(cmd) as Box<dyn Command>)
            }),
        )
    }

    /// Removes `name`. Absent names are ignored.
    pub fn unregister(&mut self, name: &str) {
        if self.constructors.remove(name).is_some() {
            debug!(command = %name, "unregistered command");
        }
    }

    pub fn get(&self, name: &str) -> Option<CommandConstructor> {
        self.constructors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Looks `name` up and builds the command from `data`.
    pub fn create(&self, name: &str, data: &Map<String, Value>) -> ScriptResult<Box<dyn Command>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ScriptError::UnknownCommand {
                name: name.to_string(),
                available: self.list_names(),
            })?;
        Ok(constructor(data)?)
    }

    /// Registered discriminators in sorted order.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.list_names())
            .finish()
    }
}
