//! Validator-function backend.

use log::trace;

use super::driver::{Check, FunctionEngine, ValidatorFn};
use crate::field::Field;
use crate::value::Value;

/// Runs a field's validator functions in declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vjf;

impl Vjf {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl FunctionEngine for Vjf {
    fn validate(&self, field: &Field, value: &Value, validators: &[ValidatorFn]) -> Vec<Check> {
        let results: Vec<Check> = validators
            .iter()
            .map(|validator| validator.call(value, field))
            .collect();
        trace!("{} validator(s) ran for '{}'", results.len(), field.path());
        results
    }
}

/// Common validator functions.
pub mod checks {
    use super::*;

    /// Reject blank values.
    pub fn required(message: impl Into<String>) -> ValidatorFn {
        ValidatorFn::predicate(message, |value| !value.is_blank())
    }

    /// Require at least `min` characters of text.
    pub fn min_length(min: usize, message: impl Into<String>) -> ValidatorFn {
        ValidatorFn::predicate(message, move |value| {
            value.as_str().is_none_or(|s| s.chars().count() >= min)
        })
    }

    /// Require at most `max` characters of text.
    pub fn max_length(max: usize, message: impl Into<String>) -> ValidatorFn {
        ValidatorFn::predicate(message, move |value| {
            value.as_str().is_none_or(|s| s.chars().count() <= max)
        })
    }

    /// Require a valid email address. Empty text passes.
    pub fn email(message: impl Into<String>) -> ValidatorFn {
        ValidatorFn::predicate(message, |value| match value.as_str() {
            Some("") | None => true,
            Some(s) => email_address::EmailAddress::is_valid(s),
        })
    }

    /// Defer the outcome to an external asynchronous check.
    pub fn deferred() -> ValidatorFn {
        ValidatorFn::new(|_, _| Check::Deferred)
    }
}
