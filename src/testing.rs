// Test doubles shared by the module tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::browser::Browser;
use crate::context::ExecutionContext;

/// Browser that records every call and fails the ones it is told to.
#[derive(Debug, Default)]
pub struct MockBrowser {
    calls: Mutex<Vec<String>>,
    fail_on: Mutex<Vec<String>>,
    script_result: Mutex<Value>,
}

impl MockBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every call whose record starts with `prefix` fail.
    pub fn fail_on(&self, prefix: &str) {
        self.fail_on.lock().unwrap().push(prefix.to_string());
    }

    pub fn set_script_result(&self, value: Value) {
        *self.script_result.lock().unwrap() = value;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        let failing = self
            .fail_on
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| call.starts_with(prefix.as_str()));
        self.calls.lock().unwrap().push(call.clone());
        if failing {
            Err(anyhow!("mock failure: {call}"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(format!("navigate {url}"))
    }

    async fn wait_for_load(&self) -> Result<()> {
        self.record("wait_for_load".to_string())
    }

    async fn open_tab(&self, url: &str) -> Result<()> {
        self.record(format!("open_tab {url}"))
    }

    async fn current_url(&self) -> Result<String> {
        Ok("about:blank".to_string())
    }

    async fn save_html(&self, path: &Path) -> Result<()> {
        self.record(format!("save_html {}", path.display()))
    }

    async fn run_script(&self, script: &str) -> Result<Value> {
        self.record(format!("run_script {script}"))?;
        Ok(self.script_result.lock().unwrap().clone())
    }

    async fn click_selector(&self, selector: &str) -> Result<()> {
        self.record(format!("click {selector}"))
    }

    async fn click_at(&self, x: i32, y: i32) -> Result<()> {
        self.record(format!("click_at {x},{y}"))
    }

    async fn set_input(&self, selector: &str, text: &str) -> Result<()> {
        self.record(format!("set_input {selector}={text}"))
    }

    async fn capture_screenshot(&self, path: &Path) -> Result<()> {
        self.record(format!("screenshot {}", path.display()))
    }

    async fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.record(format!("resize {width}x{height}"))
    }
}

/// Context wired to `browser`, without the tracing mirror.
pub fn context_with(browser: Arc<MockBrowser>) -> ExecutionContext {
    ExecutionContext::new()
        .with_browser(browser)
        .with_tracing_mirror(false)
}
