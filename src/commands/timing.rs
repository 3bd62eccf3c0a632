//! # Timing commands - `pause` and `wait`
//!
//! Both suspend the script for a fixed time. `pause` takes seconds (fractions
//! allowed), `wait` takes milliseconds.
//!
//! These are script steps. They are unrelated to the executor's own pause
//! flag: a `pause` step ends on its own, an executor pause lasts until
//! `resume()` or `stop()`.
//!
//! ## Accepted input
//!
//! ```json
//! { "command": "pause", "seconds": 1.5 }
//! { "command": "wait", "duration_ms": 250 }
//! { "command": "wait", "ms": 250 }
//! ```
//!
//! `ms` is a short alias. When both are given, `duration_ms` wins. Output
//! always uses `duration_ms`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::time::sleep;
use tracing::{info, instrument};

use crate::context::ExecutionContext;
use crate::errors::{ScriptError, ScriptResult, ValidationError};

use super::fields::Fields;
use super::{mapping, Command, CommandSpec};

// ============================================================================
// PAUSE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Pause {
    pub seconds: f64,
}

impl CommandSpec for Pause {
    const NAME: &'static str = "pause";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        let seconds = Fields::new(Self::NAME, data).required_f64("seconds")?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ValidationError::invalid(
                Self::NAME,
                "seconds",
                "must be a finite number >= 0",
            ));
        }
        if Duration::try_from_secs_f64(seconds).is_err() {
            return Err(ValidationError::invalid(
                Self::NAME,
                "seconds",
                "is too large to represent as a duration",
            ));
        }
        Ok(Self { seconds })
    }
}

#[async_trait]
impl Command for Pause {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!("Pause for {}s", self.seconds)
    }

    fn to_mapping(&self) -> Map<String, Value> {
        mapping(Self::NAME, json!({ "seconds": self.seconds }))
    }

    #[instrument(name = "pause", skip_all, fields(seconds = self.seconds))]
    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        // Zero is a no-op that still leaves a trace in the log.
        context.info(format!("Pausing for {} seconds", self.seconds));
        let duration = Duration::try_from_secs_f64(self.seconds)
            .map_err(|e| ScriptError::execution(Self::NAME, format!("invalid duration {}: {e}", self.seconds)))?;
        if !duration.is_zero() {
            sleep(duration).await;
        }
        Ok(())
    }
}

// ============================================================================
// WAIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wait {
    pub duration_ms: u64,
}

impl CommandSpec for Wait {
    const NAME: &'static str = "wait";

    fn from_mapping(data: &Map<String, Value>) -> Result<Self, ValidationError> {
        let fields = Fields::new(Self::NAME, data);
        let duration_ms = match fields.optional_u64("duration_ms")? {
            Some(ms) => ms,
            None => fields
                .optional_u64("ms")?
                .ok_or_else(|| ValidationError::missing(Self::NAME, "duration_ms"))?,
        };
        Ok(Self { duration_ms })
    }
}

#[async_trait]
impl Command for Wait {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!("Wait {} ms", self.duration_ms)
    }

    fn to_mapping(&self) -> Map<String, Value> {
        mapping(Self::NAME, json!({ "duration_ms": self.duration_ms }))
    }

    #[instrument(name = "wait", skip_all, fields(duration_ms = self.duration_ms))]
    async fn execute(&self, context: &mut ExecutionContext) -> ScriptResult<()> {
        let start = Instant::now();
        context.info(format!("Waiting {} ms", self.duration_ms));

        sleep(Duration::from_millis(self.duration_ms)).await;

        info!(actual_ms = start.elapsed().as_millis() as u64, "wait finished");
        Ok(())
    }
}
