//! Error types

/// Fatal configuration errors.
///
/// These are returned at the point of misuse and are never recovered from
/// silently. Validation failures are not errors; they are reported through
/// the field's error state.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field declares `rules` but the form has no rule engine.
    #[error("field '{path}' declares rules but no rule engine is registered")]
    MissingRuleEngine {
        /// Path of the offending field.
        path: String,
    },

    /// A field declares `validators` but the form has no function engine.
    #[error("field '{path}' declares validators but no function engine is registered")]
    MissingFunctionEngine {
        /// Path of the offending field.
        path: String,
    },

    /// `update` was called with something other than an object.
    #[error("update requires an object, got {found}")]
    UpdateRequiresObject {
        /// Type name of the rejected input.
        found: &'static str,
    },

    /// No field exists at the given path.
    #[error("field not found: '{path}'")]
    FieldNotFound {
        /// The requested path.
        path: String,
    },

    /// A subscription or property key that does not name a field prop.
    #[error("unknown field prop: '{key}'")]
    UnknownProp {
        /// The rejected key.
        key: String,
    },

    /// A rule string that the rule engine cannot parse.
    #[error("invalid rule '{rule}': {reason}")]
    InvalidRule {
        /// The rule as written.
        rule: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A form schema that could not be deserialized.
    #[error("invalid form schema: {0}")]
    Schema(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a field-not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::FieldNotFound { path: path.into() }
    }

    /// Creates an invalid-rule error.
    pub fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
