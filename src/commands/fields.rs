//! Typed field access over a command's JSON mapping.
//!
//! Absent keys and explicit `null` are both treated as "not provided".
//! Every failure is a [`ValidationError`] naming the command and the field.

use serde_json::{Map, Value};

use crate::errors::ValidationError;

pub struct Fields<'a> {
    command: &'a str,
    data: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub fn new(command: &'a str, data: &'a Map<String, Value>) -> Self {
        Self { command, data }
    }

    fn raw(&self, field: &str) -> Option<&'a Value> {
        self.data.get(field).filter(|v| !v.is_null())
    }

    fn invalid(&self, field: &str, reason: impl Into<String>) -> ValidationError {
        ValidationError::invalid(self.command, field, reason)
    }

    pub fn optional_str(&self, field: &str) -> Result<Option<String>, ValidationError> {
        match self.raw(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(field, "expected a string")),
        }
    }

    pub fn required_str(&self, field: &str) -> Result<String, ValidationError> {
        self.optional_str(field)?
            .ok_or_else(|| ValidationError::missing(self.command, field))
    }

    /// Required string that must contain something other than whitespace.
    pub fn required_non_empty(&self, field: &str) -> Result<String, ValidationError> {
        let value = self.required_str(field)?;
        if value.trim().is_empty() {
            return Err(self.invalid(field, "must not be empty"));
        }
        Ok(value)
    }

    pub fn str_or(&self, field: &str, default: &str) -> Result<String, ValidationError> {
        Ok(self
            .optional_str(field)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn bool_or(&self, field: &str, default: bool) -> Result<bool, ValidationError> {
        match self.raw(field) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.invalid(field, "expected a boolean")),
        }
    }

    pub fn optional_u64(&self, field: &str) -> Result<Option<u64>, ValidationError> {
        match self.raw(field) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(field, "expected a non-negative integer")),
        }
    }

    pub fn required_u32(&self, field: &str) -> Result<u32, ValidationError> {
        let value = self
            .optional_u64(field)?
            .ok_or_else(|| ValidationError::missing(self.command, field))?;
        u32::try_from(value).map_err(|_| self.invalid(field, "value is too large"))
    }

    pub fn optional_i32(&self, field: &str) -> Result<Option<i32>, ValidationError> {
        match self.raw(field) {
            None => Ok(None),
            Some(v) => {
                let n = v
                    .as_i64()
                    .ok_or_else(|| self.invalid(field, "expected an integer"))?;
                i32::try_from(n)
                    .map(Some)
                    .map_err(|_| self.invalid(field, "integer out of range"))
            }
        }
    }

    pub fn required_f64(&self, field: &str) -> Result<f64, ValidationError> {
        match self.raw(field) {
            None => Err(ValidationError::missing(self.command, field)),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| self.invalid(field, "expected a number")),
        }
    }
}
