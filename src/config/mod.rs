//! # Engine configuration
//!
//! Defaults that work without any setup, each overridable from the
//! environment. CLI flags override the environment for a single run.
//!
//! | Variable             | Default                  | Meaning                               |
//! |----------------------|--------------------------|---------------------------------------|
//! | `QWS_SCRIPTS_DIR`    | `~/.qwsengine/scripts`   | per-user scripts, created on demand   |
//! | `QWS_EXAMPLES_DIR`   | `./scripts/examples`     | bundled example scripts (read-only)   |
//! | `QWS_MAX_COMMANDS`   | 1000                     | largest script that will be loaded    |
//! | `QWS_PAUSE_POLL_MS`  | 50                       | pause-wait re-check interval          |
//! | `QWS_STOP_ON_ERROR`  | false                    | default `stop_on_error` of a context  |
//! | `QWS_PAUSE_ON_ERROR` | false                    | default `pause_on_error` of a context |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_COMMANDS: usize = 1000;

pub const DEFAULT_PAUSE_POLL_MS: u64 = 50;

/// Directory under the home directory holding per-user scripts.
pub const USER_SCRIPTS_SUBDIR: &str = ".qwsengine/scripts";

pub const DEFAULT_EXAMPLES_DIR: &str = "scripts/examples";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub scripts_dir: PathBuf,
    pub examples_dir: PathBuf,
    /// Documents with more entries than this fail to load as a whole.
    pub max_commands: usize,
    /// Upper bound on how long a paused run sleeps between flag checks.
    pub pause_poll_interval: Duration,
    pub stop_on_error: bool,
    pub pause_on_error: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scripts_dir: default_scripts_dir(),
            examples_dir: PathBuf::from(DEFAULT_EXAMPLES_DIR),
            max_commands: DEFAULT_MAX_COMMANDS,
            pause_poll_interval: Duration::from_millis(DEFAULT_PAUSE_POLL_MS),
            stop_on_error: false,
            pause_on_error: false,
        }
    }
}

fn default_scripts_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(USER_SCRIPTS_SUBDIR)
}

/// Parses the usual spellings of a boolean flag.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl EngineConfig {
    /// Defaults overridden by whichever `QWS_*` variables are set and valid.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("QWS_SCRIPTS_DIR") {
            config.scripts_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("QWS_EXAMPLES_DIR") {
            config.examples_dir = PathBuf::from(dir);
        }

        if let Some(n) = lookup("QWS_MAX_COMMANDS").and_then(|v| v.parse().ok()) {
            config.max_commands = n;
        }

        if let Some(ms) = lookup("QWS_PAUSE_POLL_MS").and_then(|v| v.parse::<u64>().ok()) {
            // A zero interval would spin.
            config.pause_poll_interval = Duration::from_millis(ms.max(1));
        }

        if let Some(flag) = lookup("QWS_STOP_ON_ERROR").and_then(|v| parse_bool(&v)) {
            config.stop_on_error = flag;
        }

        if let Some(flag) = lookup("QWS_PAUSE_ON_ERROR").and_then(|v| parse_bool(&v)) {
            config.pause_on_error = flag;
        }

        config
    }

    /// Small limits and a fast poll for tests.
    pub fn for_testing() -> Self {
        Self {
            max_commands: 50,
            pause_poll_interval: Duration::from_millis(5),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_commands, DEFAULT_MAX_COMMANDS);
        assert_eq!(config.pause_poll_interval, Duration::from_millis(50));
        assert!(config.scripts_dir.ends_with(USER_SCRIPTS_SUBDIR));
        assert!(!config.stop_on_error);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("QWS_SCRIPTS_DIR", "/srv/scripts"),
            ("QWS_MAX_COMMANDS", "10"),
            ("QWS_PAUSE_POLL_MS", "0"),
            ("QWS_STOP_ON_ERROR", "yes"),
            ("QWS_PAUSE_ON_ERROR", "off"),
        ]));
        assert_eq!(config.scripts_dir, PathBuf::from("/srv/scripts"));
        assert_eq!(config.max_commands, 10);
        assert_eq!(config.pause_poll_interval, Duration::from_millis(1));
        assert!(config.stop_on_error);
        assert!(!config.pause_on_error);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("QWS_MAX_COMMANDS", "lots"),
            ("QWS_STOP_ON_ERROR", "maybe"),
        ]));
        assert_eq!(config.max_commands, DEFAULT_MAX_COMMANDS);
        assert!(!config.stop_on_error);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool(""), None);
    }
}
