//! Form validation.
//!
//! A [`Validator`] collects error messages while a handler runs its checks
//! against a form. The check functions themselves are plain predicates, so the
//! handler decides which field and message each one maps to.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref EMAIL_RX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex is valid");
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct Validator {
    /// Field name -> the first error message recorded for it.
    pub field_errors: HashMap<String, String>,
    /// Errors about the form as a whole.
    pub non_field_errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Validator {
        Validator::default()
    }

    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    /// Record an error for `key`, unless it already has one.
    pub fn add_field_error(&mut self, key: &str, message: &str) {
        self.field_errors
            .entry(key.to_owned())
            .or_insert_with(|| message.to_owned());
    }

    pub fn add_non_field_error(&mut self, message: &str) {
        self.non_field_errors.push(message.to_owned());
    }

    pub fn check_field(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_field_error(key, message);
        }
    }
}

pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Counts chars (code points), not bytes.
pub fn max_chars(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

pub fn min_chars(value: &str, n: usize) -> bool {
    value.chars().count() >= n
}

pub fn permitted_value<T: PartialEq>(value: T, permitted: &[T]) -> bool {
    permitted.contains(&value)
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}
