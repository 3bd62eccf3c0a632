//! # Script file I/O
//!
//! Reads and writes script documents on disk. Everything here is plain
//! serialization: turning entries into commands is the executor's job, so a
//! document with bad entries still reads fine.
//!
//! Every failure is a [`ScriptFileError`] naming the path involved.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::errors::ScriptFileError;
use crate::protocol::ScriptDocument;

/// Reads a document as raw JSON.
pub fn read_document<P: AsRef<Path>>(path: P) -> Result<Value, ScriptFileError> {
    let path = path.as_ref();

    let content = fs::read_to_string(path).map_err(|source| ScriptFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let value = serde_json::from_str(&content).map_err(|source| ScriptFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), bytes = content.len(), "read script document");
    Ok(value)
}

/// Writes a document as pretty-printed JSON, creating parent directories.
pub fn write_document<P: AsRef<Path>>(path: P, document: &ScriptDocument) -> Result<(), ScriptFileError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(document).map_err(ScriptFileError::Serialize)?;

    let write_err = |source| ScriptFileError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, json).map_err(write_err)?;

    debug!(path = %path.display(), commands = document.commands.len(), "wrote script document");
    Ok(())
}
