//! # Script library
//!
//! Locates script files in two places:
//!
//! - the per-user scripts directory (`~/.qwsengine/scripts` unless
//!   configured otherwise), created the first time something is saved;
//! - the bundled examples directory, which is only ever read.
//!
//! Lookups by name try the user directory first, so a user script shadows an
//! example of the same name.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::errors::{ScriptFileError, ScriptResult};
use crate::loader;
use crate::protocol::{ScriptDocument, SCRIPT_EXTENSION};

/// Extension of files written by earlier versions.
const LEGACY_EXTENSION: &str = "json";

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_-]+").expect("valid slug regex"));

/// File-name-safe form of a script name: `"My Login Flow"` → `my_login_flow`.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let slug = UNSAFE_CHARS.replace_all(&lowered, "_");
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "script".to_string()
    } else {
        slug.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptSource {
    User,
    Example,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptEntry {
    pub name: String,
    pub path: PathBuf,
    pub source: ScriptSource,
}

#[derive(Debug, Clone)]
pub struct ScriptLibrary {
    user_dir: PathBuf,
    examples_dir: PathBuf,
}

impl ScriptLibrary {
    pub fn new(user_dir: impl Into<PathBuf>, examples_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
            examples_dir: examples_dir.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.scripts_dir, &config.examples_dir)
    }

    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    pub fn examples_dir(&self) -> &Path {
        &self.examples_dir
    }

    /// Every script in both directories, sorted by name (user scripts first
    /// on ties). Missing directories count as empty.
    pub fn list(&self) -> ScriptResult<Vec<ScriptEntry>> {
        let mut entries = scan(&self.user_dir, ScriptSource::User)?;
        entries.extend(scan(&self.examples_dir, ScriptSource::Example)?);
        entries.sort_by(|a, b| a.name.cmp(&b.name).then(a.source.cmp(&b.source)));
        Ok(entries)
    }

    /// Finds the file for `name`: a file name, a stem, or a script name.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let slug = slugify(name);
        let candidates = [
            name.to_string(),
            format!("{name}.{SCRIPT_EXTENSION}"),
            format!("{slug}.{SCRIPT_EXTENSION}"),
            format!("{slug}.{LEGACY_EXTENSION}"),
        ];

        [&self.user_dir, &self.examples_dir]
            .into_iter()
            .flat_map(|dir| candidates.iter().map(move |file| dir.join(file)))
            .find(|path| path.is_file())
    }

    /// Where a script named `name` is saved in the user directory.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.user_dir.join(format!("{}.{SCRIPT_EXTENSION}", slugify(name)))
    }

    pub fn ensure_user_dir(&self) -> ScriptResult<()> {
        fs::create_dir_all(&self.user_dir).map_err(|source| ScriptFileError::Write {
            path: self.user_dir.clone(),
            source,
        })?;
        Ok(())
    }

    /// Saves `document` under its name and returns the path written.
    pub fn save(&self, document: &ScriptDocument) -> ScriptResult<PathBuf> {
        self.ensure_user_dir()?;
        let path = self.path_for(&document.info.name);
        loader::write_document(&path, document)?;
        info!(path = %path.display(), "script saved");
        Ok(path)
    }
}

fn scan(dir: &Path, source: ScriptSource) -> ScriptResult<Vec<ScriptEntry>> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "script directory absent");
        return Ok(Vec::new());
    }

    let read_err = |source| ScriptFileError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = Vec::new();
    for item in fs::read_dir(dir).map_err(read_err)? {
        let path = item.map_err(read_err)?.path();
        let is_script = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == SCRIPT_EXTENSION || ext == LEGACY_EXTENSION);
        if !is_script || !path.is_file() {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        entries.push(ScriptEntry { name, path, source });
    }
    Ok(entries)
}
