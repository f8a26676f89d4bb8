//! Form and field options.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::value::Value;

/// Source of the value handed to validation backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidatedWith {
    /// The canonical value.
    #[default]
    Value,
    /// The checkbox state (`null` for non-checkbox fields).
    Checked,
    /// The initial snapshot.
    Initial,
    /// The default snapshot.
    Default,
}

/// Debounce strategy for re-validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebounceOptions {
    /// Run on the leading edge of a burst.
    pub leading: bool,
    /// Run on the trailing edge of a burst.
    pub trailing: bool,
    /// Upper bound (ms) a burst may postpone the call.
    pub max_wait: Option<u64>,
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            leading: false,
            trailing: true,
            max_wait: None,
        }
    }
}

/// Form-wide options.
///
/// Every option can be overridden per field with an [`OptionsPatch`].
///
/// # Example
///
/// ```
/// use formfield::Options;
///
/// let options = Options::default()
///     .validate_on_change(true)
///     .auto_parse_numbers(true)
///     .debounce_wait_ms(100);
/// assert!(options.validate_on_change);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Create fields for values that have no declared schema.
    pub fallback: bool,
    /// Empty value for fields whose type implies nothing better.
    pub fallback_value: Value,
    /// Deleting a nested field only flags it.
    pub soft_delete: bool,
    /// Trim text input before committing it.
    pub auto_trim_value: bool,
    /// Coerce numeric text to numbers when the initial value is numeric.
    pub auto_parse_numbers: bool,

    /// Validate the whole form once it is built.
    pub validate_on_init: bool,
    /// Validate when a field loses focus.
    pub validate_on_blur: bool,
    /// Validate on every committed change.
    pub validate_on_change: bool,
    /// Validate on change, but only once the field has been blurred.
    pub validate_on_change_after_initial_blur: bool,
    /// Validate on change, but only once the form has been submitted.
    pub validate_on_change_after_submit: bool,
    /// Validate after `clear`.
    pub validate_on_clear: bool,
    /// Validate after `reset`.
    pub validate_on_reset: bool,
    /// Validate on `submit`.
    pub validate_on_submit: bool,

    /// Validate disabled fields.
    pub validate_disabled_fields: bool,
    /// Validate soft-deleted fields.
    pub validate_deleted_fields: bool,
    /// Validate fields that still hold their initial value.
    pub validate_pristine_fields: bool,
    /// Trim text before handing it to backends.
    pub validate_trimmed_value: bool,
    /// Skip remaining backends once one reported an error.
    pub stop_validation_on_error: bool,
    /// Backend order by name (`"vjf"`, `"dvr"`).
    pub validation_plugins_order: Option<Vec<String>>,

    /// Show errors after the initial validation.
    pub show_errors_on_init: bool,
    /// Show errors after blur validation.
    pub show_errors_on_blur: bool,
    /// Show errors after change validation.
    pub show_errors_on_change: bool,
    /// Show errors after clear validation.
    pub show_errors_on_clear: bool,
    /// Show errors after reset validation.
    pub show_errors_on_reset: bool,
    /// Show errors after submit validation.
    pub show_errors_on_submit: bool,

    /// Debounce window (ms) for re-validation.
    pub validation_debounce_wait: u64,
    /// Debounce strategy.
    pub validation_debounce_options: DebounceOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fallback: true,
            fallback_value: Value::Text(String::new()),
            soft_delete: false,
            auto_trim_value: false,
            auto_parse_numbers: false,
            validate_on_init: true,
            validate_on_blur: true,
            validate_on_change: false,
            validate_on_change_after_initial_blur: false,
            validate_on_change_after_submit: false,
            validate_on_clear: false,
            validate_on_reset: false,
            validate_on_submit: true,
            validate_disabled_fields: false,
            validate_deleted_fields: false,
            validate_pristine_fields: true,
            validate_trimmed_value: false,
            stop_validation_on_error: false,
            validation_plugins_order: None,
            show_errors_on_init: false,
            show_errors_on_blur: true,
            show_errors_on_change: true,
            show_errors_on_clear: false,
            show_errors_on_reset: true,
            show_errors_on_submit: true,
            validation_debounce_wait: 250,
            validation_debounce_options: DebounceOptions::default(),
        }
    }
}

impl Options {
    /// Parse options from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Debounce window as a `Duration`.
    pub fn debounce_wait(&self) -> Duration {
        Duration::from_millis(self.validation_debounce_wait)
    }

    /// Set the debounce window in milliseconds.
    pub fn debounce_wait_ms(mut self, ms: u64) -> Self {
        self.validation_debounce_wait = ms;
        self
    }

    /// Set the debounce strategy.
    pub fn debounce(mut self, options: DebounceOptions) -> Self {
        self.validation_debounce_options = options;
        self
    }

    /// Enable or disable validation on change.
    pub fn validate_on_change(mut self, on: bool) -> Self {
        self.validate_on_change = on;
        self
    }

    /// Enable or disable validation on blur.
    pub fn validate_on_blur(mut self, on: bool) -> Self {
        self.validate_on_blur = on;
        self
    }

    /// Enable or disable validation at construction.
    pub fn validate_on_init(mut self, on: bool) -> Self {
        self.validate_on_init = on;
        self
    }

    /// Enable or disable numeric coercion.
    pub fn auto_parse_numbers(mut self, on: bool) -> Self {
        self.auto_parse_numbers = on;
        self
    }

    /// Enable or disable input trimming.
    pub fn auto_trim_value(mut self, on: bool) -> Self {
        self.auto_trim_value = on;
        self
    }

    /// Enable or disable soft delete.
    pub fn soft_delete(mut self, on: bool) -> Self {
        self.soft_delete = on;
        self
    }

    /// Enable or disable schema-less field creation.
    pub fn fallback(mut self, on: bool) -> Self {
        self.fallback = on;
        self
    }
}

/// Per-field option overrides. `None` keeps the form value.
///
/// Keys mirror [`Options`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsPatch {
    pub fallback: Option<bool>,
    pub fallback_value: Option<Value>,
    pub soft_delete: Option<bool>,
    pub auto_trim_value: Option<bool>,
    pub auto_parse_numbers: Option<bool>,
    pub validate_on_blur: Option<bool>,
    pub validate_on_change: Option<bool>,
    pub validate_on_change_after_initial_blur: Option<bool>,
    pub validate_on_change_after_submit: Option<bool>,
    pub validate_on_clear: Option<bool>,
    pub validate_on_reset: Option<bool>,
    pub validate_disabled_fields: Option<bool>,
    pub validate_deleted_fields: Option<bool>,
    pub validate_pristine_fields: Option<bool>,
    pub validate_trimmed_value: Option<bool>,
    pub stop_validation_on_error: Option<bool>,
    pub validation_plugins_order: Option<Vec<String>>,
    pub show_errors_on_blur: Option<bool>,
    pub show_errors_on_change: Option<bool>,
    pub show_errors_on_clear: Option<bool>,
    pub show_errors_on_reset: Option<bool>,
    pub validation_debounce_wait: Option<u64>,
    pub validation_debounce_options: Option<DebounceOptions>,
}

macro_rules! overlay {
    ($base:ident, $patch:ident, $($name:ident),* $(,)?) => {
        $(
            if let Some(v) = &$patch.$name {
                $base.$name = v.clone();
            }
        )*
    };
}

impl OptionsPatch {
    /// Apply this patch over `base`.
    pub fn apply(&self, base: &Options) -> Options {
        let mut merged = base.clone();
        overlay!(
            merged,
            self,
            fallback,
            fallback_value,
            soft_delete,
            auto_trim_value,
            auto_parse_numbers,
            validate_on_blur,
            validate_on_change,
            validate_on_change_after_initial_blur,
            validate_on_change_after_submit,
            validate_on_clear,
            validate_on_reset,
            validate_disabled_fields,
            validate_deleted_fields,
            validate_pristine_fields,
            validate_trimmed_value,
            stop_validation_on_error,
            show_errors_on_blur,
            show_errors_on_change,
            show_errors_on_clear,
            show_errors_on_reset,
            validation_debounce_wait,
            validation_debounce_options,
        );
        if let Some(order) = &self.validation_plugins_order {
            merged.validation_plugins_order = Some(order.clone());
        }
        merged
    }

    /// Whether the patch overrides nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_overrides_only_set_keys() {
        let base = Options::default();
        let patch = OptionsPatch {
            validate_on_change: Some(true),
            validation_debounce_wait: Some(10),
            ..Default::default()
        };
        let merged = patch.apply(&base);
        assert!(merged.validate_on_change);
        assert_eq!(merged.validation_debounce_wait, 10);
        assert_eq!(merged.validate_on_blur, base.validate_on_blur);
    }

    #[test]
    fn test_from_json_camel_case() {
        let options = Options::from_json(r#"{"autoParseNumbers": true, "validationDebounceWait": 0}"#).unwrap();
        assert!(options.auto_parse_numbers);
        assert_eq!(options.validation_debounce_wait, 0);
        assert!(options.fallback);
    }
}
