//! # qws-script-engine
//!
//! Record, store and replay browser automation scripts.
//!
//! A script is an ordered list of commands (navigate, click, input,
//! screenshot, ...) kept as a JSON document. The [`registry`] turns each
//! document entry into a [`commands::Command`], the [`executor`] runs them
//! one at a time against an [`context::ExecutionContext`] and the
//! [`recorder`] builds new scripts from observed browser events.
//!
//! The browser itself is a collaborator behind the [`browser::Browser`]
//! trait; this crate never drives a real browser engine.

pub mod browser;
pub mod commands;
pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod library;
pub mod loader;
pub mod protocol;
pub mod recorder;
pub mod registry;
pub mod telemetry;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::{Command, CommandSpec, ScriptStep};
pub use config::EngineConfig;
pub use context::{ExecutionContext, LogLevel};
pub use errors::{ScriptError, ScriptResult};
pub use executor::{ExecutionControl, ExecutorState, ScriptExecutor};
pub use recorder::{BrowserEvent, Recorder};
pub use registry::CommandRegistry;
