use log::trace;

use crate::options::ValidatedWith;
use crate::parser::{self, ParseInput};
use crate::value::Value;

use super::Field;

impl Field {
    /// Current value. For containers, the aggregate of the visible children.
    pub fn value(&self) -> Value {
        self.inner.derived.value.get()
    }

    /// Initial snapshot.
    pub fn initial(&self) -> Value {
        self.inner.derived.initial.get()
    }

    /// Default snapshot, the target of `reset` when it differs from initial.
    pub fn default(&self) -> Value {
        self.inner.derived.default.get()
    }

    /// Number of committed changes. For containers, the sum over the visible
    /// children.
    pub fn changed(&self) -> u64 {
        self.inner.derived.changed.get()
    }

    /// The value of a checkbox field, `None` for other types.
    pub fn checked(&self) -> Option<Value> {
        self.inner.derived.checked.get()
    }

    /// The value as seen from outside, after the output transform.
    pub fn output(&self) -> Value {
        if self.has_nested_fields() {
            self.aggregate_output()
        } else {
            (self.inner.output)(self.value())
        }
    }

    /// The value handed to validation backends.
    pub fn validated_value(&self) -> Value {
        let value = match self.inner.validated_with.get_untracked() {
            ValidatedWith::Value => self.value(),
            ValidatedWith::Checked => self.checked().unwrap_or(Value::Null),
            ValidatedWith::Initial => self.initial(),
            ValidatedWith::Default => self.default(),
        };
        match value {
            Value::Text(text) if self.options().validate_trimmed_value => {
                Value::Text(text.trim().to_string())
            }
            other => other,
        }
    }

    /// Commit a new value through the input pipeline.
    ///
    /// Text is trimmed when `auto_trim_value` is on, then passed through the
    /// input transform. Writing the current value is a no-op. With
    /// `auto_parse_numbers` and a numeric initial value, numeric text is
    /// stored as a number. Containers distribute a map or list to their
    /// existing children by key.
    pub fn set_value(&self, value: impl Into<Value>) {
        let value = value.into();
        self.state().scheduler.action(|| self.commit(value));
    }

    pub(crate) fn commit(&self, raw: Value) {
        if self.has_nested_fields() && matches!(raw, Value::Map(_) | Value::List(_)) {
            for child in self.inner.fields.get_untracked() {
                if let Some(value) = raw.child(child.key()) {
                    child.commit(value.clone());
                }
            }
            return;
        }

        let options = self.options();
        let raw = match raw {
            Value::Text(text) if options.auto_trim_value => Value::Text(text.trim().to_string()),
            other => other,
        };
        let next = (self.inner.input)(raw);
        let current = self.inner.value.get_untracked();
        if next == current {
            return;
        }

        // the field counter always moves; the tree counter skips bulk transitions
        let quiet = self.is_resetting() || self.is_clearing();
        if options.auto_parse_numbers && self.inner.initial.get_untracked().is_number() {
            if let Some(number) = parser::parse_number(&next) {
                let next = Value::Number(number);
                if next == current || !self.inner.value.set(next) {
                    return;
                }
                self.bump_changed(!quiet);
                return;
            }
        }

        if !self.inner.value.set(next) {
            return;
        }
        self.bump_changed(!self.action_running());
    }

    fn bump_changed(&self, form: bool) {
        self.inner.changed.update(|n| *n += 1);
        if form {
            self.state().bump_changed();
        }
        trace!("'{}' changed ({})", self.path(), self.inner.changed.get_untracked());
    }

    /// Replace the initial snapshot.
    pub fn set_initial(&self, value: impl Into<Value>) {
        let value = self.normalize(value.into());
        self.inner.initial.set(value);
    }

    /// Replace the default snapshot.
    pub fn set_default(&self, value: impl Into<Value>) {
        let value = self.normalize(value.into());
        self.inner.default.set(value);
    }

    fn normalize(&self, value: Value) -> Value {
        let kind = self.inner.kind.get_untracked();
        parser::parse_input(
            &self.inner.input,
            ParseInput {
                kind: &kind,
                separated: Some(value),
                fallback_value: self.options().fallback_value,
                ..Default::default()
            },
        )
    }
}
