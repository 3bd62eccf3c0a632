// Module: Browser
// Collaborator contracts the engine drives. Rendering, tabs and DOM access
// live in the host application; the engine only sees these traits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

/// The browser as seen by commands.
///
/// Implementations own any timeout policy: `wait_for_load` must resolve (or
/// fail) on its own, the engine never cancels a collaborator call.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Starts loading `url` in the current tab.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Resolves once the current tab reports its load as finished.
    async fn wait_for_load(&self) -> Result<()>;

    /// Opens a new tab, makes it current and loads `url` in it.
    async fn open_tab(&self, url: &str) -> Result<()>;

    /// URL of the page in the current tab.
    async fn current_url(&self) -> Result<String>;

    async fn save_html(&self, path: &Path) -> Result<()>;

    async fn run_script(&self, script: &str) -> Result<Value>;

    async fn click_selector(&self, selector: &str) -> Result<()>;

    async fn click_at(&self, x: i32, y: i32) -> Result<()>;

    async fn set_input(&self, selector: &str, text: &str) -> Result<()>;

    async fn capture_screenshot(&self, path: &Path) -> Result<()>;

    async fn resize(&self, width: u32, height: u32) -> Result<()>;
}

/// Read access to application settings.
pub trait Settings: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }
}

/// Settings key naming the directory file-producing commands write under.
pub const OUTPUT_DIR_KEY: &str = "output_dir";

/// In-memory settings.
#[derive(Debug, Default, Clone)]
pub struct StaticSettings {
    values: HashMap<String, Value>,
}

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }
}

impl Settings for StaticSettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}

// ============================================================================
// DRY RUN
// ============================================================================

/// Browser that performs nothing and logs every call.
///
/// Lets a script be walked end to end without a rendering engine attached.
#[derive(Debug, Default)]
pub struct DryRunBrowser {
    current_url: Mutex<String>,
}

impl DryRunBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_url(&self, url: &str) {
        if let Ok(mut current) = self.current_url.lock() {
            *current = url.to_string();
        }
    }
}

#[async_trait]
impl Browser for DryRunBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        info!(%url, "dry-run: navigate");
        self.set_url(url);
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<()> {
        info!("dry-run: wait for load");
        Ok(())
    }

    async fn open_tab(&self, url: &str) -> Result<()> {
        info!(%url, "dry-run: open tab");
        self.set_url(url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .current_url
            .lock()
            .map(|url| url.clone())
            .unwrap_or_default())
    }

    async fn save_html(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "dry-run: save html");
        Ok(())
    }

    async fn run_script(&self, script: &str) -> Result<Value> {
        info!(chars = script.len(), "dry-run: run script");
        Ok(Value::Null)
    }

    async fn click_selector(&self, selector: &str) -> Result<()> {
        info!(%selector, "dry-run: click");
        Ok(())
    }

    async fn click_at(&self, x: i32, y: i32) -> Result<()> {
        info!(x, y, "dry-run: click at position");
        Ok(())
    }

    async fn set_input(&self, selector: &str, text: &str) -> Result<()> {
        info!(%selector, chars = text.len(), "dry-run: set input");
        Ok(())
    }

    async fn capture_screenshot(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "dry-run: screenshot");
        Ok(())
    }

    async fn resize(&self, width: u32, height: u32) -> Result<()> {
        info!(width, height, "dry-run: resize");
        Ok(())
    }
}

/// Directory that `save_html` and `screenshot` resolve their paths under.
pub fn output_root(settings: Option<&dyn Settings>) -> PathBuf {
    settings
        .and_then(|s| s.get_str(OUTPUT_DIR_KEY))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
