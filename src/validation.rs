//! Field validation for records about to be persisted.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::util::parse_date;

/// One failed rule, reported against the field it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn re_email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").expect("email regex compiles")
    })
}

pub fn is_valid_email(value: &str) -> bool {
    re_email().is_match(value.trim())
}

/// Collects rule failures; a record is valid when none were recorded.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trimmed length (in characters) must lie in `min..=max`.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize, message: &str) -> &mut Self {
        let len = value.trim().chars().count();
        if len < min || len > max {
            self.fail(field, message);
        }
        self
    }

    pub fn max_length(&mut self, field: &str, value: &str, max: usize, message: &str) -> &mut Self {
        self.length(field, value, 0, max, message)
    }

    pub fn required(&mut self, field: &str, value: &str, message: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.fail(field, message);
        }
        self
    }

    /// Blank is accepted; anything else must look like an address.
    pub fn optional_email(&mut self, field: &str, value: &str, message: &str) -> &mut Self {
        if !value.trim().is_empty() && !is_valid_email(value) {
            self.fail(field, message);
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str, message: &str) -> &mut Self {
        if !is_valid_email(value) {
            self.fail(field, message);
        }
        self
    }

    /// `YYYY-MM-DD` (or RFC 3339) when present.
    pub fn date(&mut self, field: &str, value: Option<&str>, message: &str) -> &mut Self {
        if let Some(value) = value {
            if !value.trim().is_empty() && parse_date(value).is_none() {
                self.fail(field, message);
            }
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: f64, message: &str) -> &mut Self {
        if value < 0.0 {
            self.fail(field, message);
        }
        self
    }

    pub fn check(&mut self, field: &str, ok: bool, message: &str) -> &mut Self {
        if !ok {
            self.fail(field, message);
        }
        self
    }

    pub fn fail(&mut self, field: &str, message: &str) {
        // First failure per field wins
        if !self.errors.iter().any(|e| e.field == field) {
            self.errors.push(FieldError::new(field, message));
        }
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }
}
