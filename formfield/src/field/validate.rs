use log::debug;

use crate::options::Options;
use crate::validation::{AsyncData, Check, Driver, FieldError, ValidationResult, ValidationStatus};

use super::Field;

/// Error message passed to [`Field::invalidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorMessage {
    /// One message, pushed on top of the stack.
    One(String),
    /// A full stack, replacing the current one.
    Stack(Vec<String>),
}

impl From<&str> for ErrorMessage {
    fn from(message: &str) -> Self {
        ErrorMessage::One(message.to_string())
    }
}

impl From<String> for ErrorMessage {
    fn from(message: String) -> Self {
        ErrorMessage::One(message)
    }
}

impl From<Vec<String>> for ErrorMessage {
    fn from(stack: Vec<String>) -> Self {
        ErrorMessage::Stack(stack)
    }
}

/// Options for one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Make the resulting errors visible.
    pub show_errors: bool,
    /// Also validate the fields listed in `related`.
    pub related: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            show_errors: true,
            related: true,
        }
    }
}

impl ValidateOptions {
    pub fn show_errors(show_errors: bool) -> Self {
        Self {
            show_errors,
            ..Default::default()
        }
    }
}

impl Field {
    // =========================================================================
    // Validation state
    // =========================================================================

    pub fn validation_status(&self) -> ValidationStatus {
        self.inner.status.get()
    }

    /// Failure messages of the last pass, first failure at the head.
    pub fn validation_error_stack(&self) -> Vec<String> {
        self.inner.error_stack.get()
    }

    /// Results of the validator functions in the last pass.
    pub fn validation_functions_data(&self) -> Vec<Check> {
        self.inner.functions_data.get()
    }

    pub fn validation_async_data(&self) -> Option<AsyncData> {
        self.inner.async_data.get()
    }

    pub fn error_sync(&self) -> Option<String> {
        self.inner.error_sync.get()
    }

    pub fn error_async(&self) -> Option<String> {
        self.inner.error_async.get()
    }

    // =========================================================================
    // Running validation
    // =========================================================================

    /// Validate this field and its descendants, showing errors.
    pub fn validate(&self) -> ValidationResult {
        self.validate_with(ValidateOptions::default())
    }

    /// Validate this field and its descendants.
    ///
    /// Returns the errors of every field in the subtree.
    pub fn validate_with(&self, options: ValidateOptions) -> ValidationResult {
        self.state().scheduler.action(|| {
            self.run_validation(options);
            let mut errors = Vec::new();
            self.collect_errors(&mut errors);
            ValidationResult::from_errors(errors)
        })
    }

    fn run_validation(&self, options: ValidateOptions) {
        for child in self.inner.fields.get_untracked() {
            child.run_validation(options);
        }

        let opts = self.options();
        if self.skips_validation(&opts) {
            return;
        }

        self.reset_validation(false);
        self.inner.status.set(ValidationStatus::Pending);

        let value = self.validated_value();
        let mut messages: Vec<String> = Vec::new();
        let mut checks: Vec<Check> = Vec::new();
        let drivers = self
            .state()
            .plugins()
            .ordered(opts.validation_plugins_order.as_deref());
        for driver in drivers {
            if opts.stop_validation_on_error && !messages.is_empty() {
                break;
            }
            match driver {
                Driver::Functions(engine) => {
                    let validators = self.inner.validators.get_untracked();
                    if validators.is_empty() {
                        continue;
                    }
                    let results = engine.validate(self, &value, &validators);
                    messages.extend(results.iter().filter_map(|c| c.message().map(str::to_string)));
                    checks.extend(results);
                }
                Driver::Rules(engine) => {
                    if let Some(rules) = self.inner.rules.get_untracked() {
                        messages.extend(engine.validate(self, &value, &rules));
                    }
                }
            }
        }

        let deferred = checks.contains(&Check::Deferred);
        self.inner.functions_data.set(checks);
        let status = if !messages.is_empty() {
            ValidationStatus::Invalid
        } else if deferred {
            ValidationStatus::Pending
        } else {
            ValidationStatus::Valid
        };
        if !messages.is_empty() {
            debug!("'{}' failed validation: {}", self.path(), messages.join("; "));
        }
        self.inner.error_stack.set(messages);
        self.inner.status.set(status);
        self.show_errors(options.show_errors);

        if options.related {
            for path in self.inner.related.get_untracked() {
                if let Some(field) = self.lookup(&path) {
                    field.run_validation(ValidateOptions {
                        related: false,
                        ..options
                    });
                }
            }
        }
    }

    fn skips_validation(&self, options: &Options) -> bool {
        (!options.validate_disabled_fields && self.inner.disabled.get_untracked())
            || (!options.validate_deleted_fields && self.deleted())
            || (!options.validate_pristine_fields && self.is_pristine())
    }

    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        for child in self.inner.fields.get_untracked() {
            child.collect_errors(errors);
        }
        if let Some(message) = self.own_error_message() {
            errors.push(FieldError {
                path: self.path().to_string(),
                field_id: self.id().to_string(),
                message,
            });
        }
    }

    /// Debounced validation of this field, keyed by its id.
    pub(crate) fn schedule_validation(&self, show_errors: bool) {
        let options = self.options();
        let weak = self.downgrade();
        self.state().scheduler.debounce(
            self.id(),
            options.debounce_wait(),
            &options.validation_debounce_options,
            move || {
                if let Some(field) = Field::upgrade(&weak) {
                    field.validate_with(ValidateOptions::show_errors(show_errors));
                }
            },
        );
    }

    // =========================================================================
    // Error surfaces
    // =========================================================================

    /// Mark the field invalid.
    ///
    /// An async error sets the async message. A sync stack replaces the
    /// error stack; a single sync message is pushed on top of it. Sync errors
    /// are shown.
    pub fn invalidate(&self, message: impl Into<ErrorMessage>, is_async: bool) {
        let message = message.into();
        self.state().scheduler.action(|| {
            if is_async {
                let text = match message {
                    ErrorMessage::One(text) => text,
                    ErrorMessage::Stack(stack) => stack.into_iter().next().unwrap_or_default(),
                };
                self.inner.error_async.set(Some(text));
            } else {
                match message {
                    ErrorMessage::Stack(stack) => {
                        self.inner.error_stack.set(stack);
                    }
                    ErrorMessage::One(text) => {
                        self.inner.error_stack.update(|stack| stack.insert(0, text));
                    }
                }
                self.show_errors(true);
            }
            self.inner.status.set(ValidationStatus::Invalid);
        });
    }

    /// Store the outcome of an externally driven async check.
    pub fn set_validation_async_data(&self, valid: bool, message: impl Into<String>) {
        let message = message.into();
        self.state().scheduler.action(|| {
            self.inner
                .async_data
                .set(Some(AsyncData { valid, message }));
            let status = if valid && self.inner.error_stack.with(Vec::is_empty) {
                ValidationStatus::Valid
            } else {
                ValidationStatus::Invalid
            };
            self.inner.status.set(status);
        });
    }

    /// Promote a failing async result to the visible async error. A passing
    /// result clears it.
    pub fn show_async_errors(&self) {
        self.state().scheduler.action(|| match self.inner.async_data.get_untracked() {
            Some(data) if !data.valid => {
                self.inner.error_async.set(Some(data.message));
                self.inner.show_error.set(true);
            }
            _ => {
                self.inner.error_async.set(None);
            }
        });
    }

    /// Clear every validation surface. `deep` recurses into the children.
    pub fn reset_validation(&self, deep: bool) {
        self.state().scheduler.action(|| {
            let inner = &self.inner;
            inner.show_error.set(true);
            inner.error_sync.set(None);
            inner.error_async.set(None);
            inner.async_data.set(None);
            inner.functions_data.set(Vec::new());
            inner.error_stack.set(Vec::new());
            inner.status.set(ValidationStatus::Clean);
            self.defer_flag_reset();
            if deep {
                for child in inner.fields.get_untracked() {
                    child.reset_validation(true);
                }
            }
        });
    }

    /// Show or hide errors on this field and its descendants. The sync error
    /// is refreshed from the head of the stack.
    pub fn show_errors(&self, show: bool) {
        self.state().scheduler.action(|| {
            self.inner.show_error.set(show);
            let head = self.inner.error_stack.with(|stack| stack.first().cloned());
            self.inner.error_sync.set(head);
            for child in self.inner.fields.get_untracked() {
                child.show_errors(show);
            }
        });
    }

    // =========================================================================
    // Automatic validation
    // =========================================================================

    pub(super) fn observe_validation_on_change(&self, options: &Options) {
        if !(options.validate_on_change
            || options.validate_on_change_after_initial_blur
            || options.validate_on_change_after_submit)
        {
            return;
        }
        let weak = self.downgrade();
        let subscription = self.inner.value.observe(move |_| {
            let Some(field) = Field::upgrade(&weak) else {
                return;
            };
            if field.action_running() {
                return;
            }
            let options = field.options();
            let due = options.validate_on_change
                || (options.validate_on_change_after_initial_blur && field.blurred())
                || (options.validate_on_change_after_submit && field.state().submitted() > 0);
            if due {
                field.schedule_validation(options.show_errors_on_change);
            }
        });
        self.watch(subscription);
    }

    pub(super) fn observe_validation_on_blur(&self, options: &Options) {
        if !options.validate_on_blur {
            return;
        }
        let weak = self.downgrade();
        let subscription = self.inner.focused.observe(move |change| {
            if change.new {
                return;
            }
            let Some(field) = Field::upgrade(&weak) else {
                return;
            };
            let options = field.options();
            if options.validate_on_blur {
                field.schedule_validation(options.show_errors_on_blur);
            }
        });
        self.watch(subscription);
    }
}
