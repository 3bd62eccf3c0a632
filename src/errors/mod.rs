//! # Error taxonomy and structured error codes
//!
//! Every failure the engine can report is a [`ScriptError`]. Each variant maps
//! to a stable [`ErrorCode`] so hosts (UI, CI, log dashboards) can react to a
//! number instead of parsing messages.
//!
//! | Range | Category          | Raised by                                  |
//! |-------|-------------------|--------------------------------------------|
//! | E1xxx | Validation / load | `from_mapping`, document envelope checks   |
//! | E2xxx | Execution         | a command whose collaborator call failed   |
//! | E3xxx | Collaborator      | browser/settings handle missing            |
//! | E4xxx | File / config     | script file I/O, JSON parsing, limits      |
//! | E5xxx | Registry          | wiring bugs (duplicate registration)       |
//!
//! Load-time errors are collected per entry and never abort a load. Execution
//! errors are caught per command inside the executor loop. Only
//! [`ScriptError::DuplicateCommand`] is meant to abort the calling code path.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// ERROR CODE
// ============================================================================

/// Four digit error code; the first digit is the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(u16);

impl ErrorCode {
    // E1xxx: validation / load

    /// A required command field is absent.
    pub const MISSING_FIELD: Self = Self(1001);
    /// A command field is present but has the wrong type or value.
    pub const INVALID_FIELD: Self = Self(1002);
    /// A `commands` entry is not a JSON object.
    pub const ENTRY_NOT_OBJECT: Self = Self(1003);
    /// A `commands` entry has no `command` discriminator.
    pub const MISSING_DISCRIMINATOR: Self = Self(1004);
    /// The discriminator is not registered.
    pub const UNKNOWN_COMMAND: Self = Self(1005);

    // E2xxx: execution

    /// The collaborator call behind a command failed.
    pub const COMMAND_FAILED: Self = Self(2001);

    // E3xxx: collaborators

    /// Browser or settings handle is not attached to the context.
    pub const COLLABORATOR_UNAVAILABLE: Self = Self(3001);

    // E4xxx: files / config

    /// Script file could not be read.
    pub const FILE_READ: Self = Self(4001);
    /// Script file could not be written.
    pub const FILE_WRITE: Self = Self(4002);
    /// Script file is not valid JSON.
    pub const FILE_PARSE: Self = Self(4003);
    /// Script document is structurally invalid.
    pub const DOCUMENT_MALFORMED: Self = Self(4004);
    /// Script document could not be serialized.
    pub const SERIALIZATION: Self = Self(4005);
    /// A configured limit was exceeded.
    pub const LIMIT_EXCEEDED: Self = Self(4006);

    // E5xxx: registry

    /// A discriminator was registered twice.
    pub const DUPLICATE_COMMAND: Self = Self(5001);

    /// Numeric code, e.g. `1001`.
    pub fn code(&self) -> u16 {
        self.0
    }

    /// Code with the `E` prefix, e.g. `"E1001"`.
    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }

    /// Category derived from the first digit.
    pub fn category(&self) -> ErrorCategory {
        match self.0 / 1000 {
            1 => ErrorCategory::Validation,
            2 => ErrorCategory::Execution,
            3 => ErrorCategory::Collaborator,
            4 => ErrorCategory::File,
            5 => ErrorCategory::Registry,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Short human readable description of the code.
    pub fn description(&self) -> &'static str {
        match self.0 {
            1001 => "Required field missing",
            1002 => "Invalid field value",
            1003 => "Command entry is not an object",
            1004 => "Command discriminator missing",
            1005 => "Unknown command",
            2001 => "Command execution failed",
            3001 => "Collaborator unavailable",
            4001 => "Cannot read script file",
            4002 => "Cannot write script file",
            4003 => "Invalid script JSON",
            4004 => "Malformed script document",
            4005 => "Serialization error",
            4006 => "Limit exceeded",
            5001 => "Duplicate command registration",
            _ => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

/// Category of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Execution,
    Collaborator,
    File,
    Registry,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "Validation"),
            Self::Execution => write!(f, "Execution"),
            Self::Collaborator => write!(f, "Collaborator"),
            Self::File => write!(f, "File"),
            Self::Registry => write!(f, "Registry"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

// ============================================================================
// TAXONOMY
// ============================================================================

/// Malformed command fields, detected while building a command from its
/// mapping. Always names the command and, where there is one, the field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("command '{command}': required field '{field}' is missing")]
    MissingField { command: String, field: String },

    #[error("command '{command}': field '{field}' is invalid: {reason}")]
    InvalidField {
        command: String,
        field: String,
        reason: String,
    },

    #[error("command entry is not a JSON object")]
    NotAnObject,

    #[error("command entry has no 'command' discriminator")]
    MissingDiscriminator,
}

impl ValidationError {
    pub fn missing(command: &str, field: &str) -> Self {
        Self::MissingField {
            command: command.to_string(),
            field: field.to_string(),
        }
    }

    pub fn invalid(command: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            command: command.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field, if the error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field, .. } | Self::InvalidField { field, .. } => Some(field),
            Self::NotAnObject => None,
            Self::MissingDiscriminator => Some("command"),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingField { .. } => ErrorCode::MISSING_FIELD,
            Self::InvalidField { .. } => ErrorCode::INVALID_FIELD,
            Self::NotAnObject => ErrorCode::ENTRY_NOT_OBJECT,
            Self::MissingDiscriminator => ErrorCode::MISSING_DISCRIMINATOR,
        }
    }
}

/// I/O and parsing failures around script files.
#[derive(Debug, Error)]
pub enum ScriptFileError {
    #[error("failed to read script file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write script file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("script file {path:?} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize script: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("malformed script document: {0}")]
    Malformed(String),
}

impl ScriptFileError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::FILE_READ,
            Self::Write { .. } => ErrorCode::FILE_WRITE,
            Self::Parse { .. } => ErrorCode::FILE_PARSE,
            Self::Serialize(_) => ErrorCode::SERIALIZATION,
            Self::Malformed(_) => ErrorCode::DOCUMENT_MALFORMED,
        }
    }
}

/// Every error the engine reports.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unknown command '{name}' (available: {})", .available.join(", "))]
    UnknownCommand { name: String, available: Vec<String> },

    #[error("command '{name}' is already registered")]
    DuplicateCommand { name: String },

    #[error("{collaborator} is not available in the execution context")]
    CollaboratorUnavailable { collaborator: &'static str },

    #[error("{command} failed: {message}")]
    CommandExecution { command: String, message: String },

    #[error(transparent)]
    File(#[from] ScriptFileError),

    #[error("script has {actual} commands, limit is {limit}")]
    LimitExceeded { limit: usize, actual: usize },
}

impl ScriptError {
    /// Wraps a collaborator failure for the named command.
    pub fn execution(command: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::CommandExecution {
            command: command.into(),
            message: err.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(err) => err.code(),
            Self::UnknownCommand { .. } => ErrorCode::UNKNOWN_COMMAND,
            Self::DuplicateCommand { .. } => ErrorCode::DUPLICATE_COMMAND,
            Self::CollaboratorUnavailable { .. } => ErrorCode::COLLABORATOR_UNAVAILABLE,
            Self::CommandExecution { .. } => ErrorCode::COMMAND_FAILED,
            Self::File(err) => err.code(),
            Self::LimitExceeded { .. } => ErrorCode::LIMIT_EXCEEDED,
        }
    }

    /// Message prefixed with the error code, for UI and report output.
    pub fn user_message(&self) -> String {
        format!("[{}] {}", self.code(), self)
    }
}

pub type ScriptResult<T> = Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_formatting() {
        assert_eq!(ErrorCode::MISSING_FIELD.formatted(), "E1001");
        assert_eq!(ErrorCode::COMMAND_FAILED.formatted(), "E2001");
        assert_eq!(ErrorCode::DUPLICATE_COMMAND.to_string(), "E5001");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::UNKNOWN_COMMAND.category(), ErrorCategory::Validation);
        assert_eq!(ErrorCode::COMMAND_FAILED.category(), ErrorCategory::Execution);
        assert_eq!(
            ErrorCode::COLLABORATOR_UNAVAILABLE.category(),
            ErrorCategory::Collaborator
        );
        assert_eq!(ErrorCode::FILE_PARSE.category(), ErrorCategory::File);
        assert_eq!(ErrorCode::DUPLICATE_COMMAND.category(), ErrorCategory::Registry);
    }

    #[test]
    fn test_validation_error_names_field() {
        let err = ValidationError::missing("navigate", "url");
        assert_eq!(err.field(), Some("url"));
        assert!(err.to_string().contains("'url'"));
        assert!(err.to_string().contains("navigate"));
    }

    #[test]
    fn test_unknown_command_lists_available() {
        let err = ScriptError::UnknownCommand {
            name: "fly".to_string(),
            available: vec!["click".to_string(), "navigate".to_string()],
        };
        let msg = err.user_message();
        assert!(msg.starts_with("[E1005]"));
        assert!(msg.contains("click, navigate"));
    }

    #[test]
    fn test_file_error_code_passes_through() {
        let err: ScriptError = ScriptFileError::Malformed("no commands".to_string()).into();
        assert_eq!(err.code(), ErrorCode::DOCUMENT_MALFORMED);
    }
}
