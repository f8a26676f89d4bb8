//! The field entity.
//!
//! A [`Field`] is a cheap handle (`Arc`) to one addressable unit of form
//! state, leaf or container. Every attribute lives in its own
//! [`Observable`] cell; derived status is a set of memoized [`Computed`]
//! cells (see `derived.rs`).
//!
//! The implementation is split by concern:
//! - `pipeline.rs`: value writes and read views
//! - `derived.rs`: status flags and aggregates
//! - `validate.rs`: validation engine and error surfaces
//! - `lifecycle.rs`: clear/reset/focus/blur, nested delegation, disposal
//! - `handlers.rs`: input handlers, hooks and bindings
//! - `props.rs`: type-erased prop access and subscriptions
//!
//! [`Computed`]: crate::reactive::Computed

mod derived;
mod handlers;
mod lifecycle;
mod pipeline;
mod props;
mod validate;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use log::{debug, warn};

use crate::definition::{FieldDef, pick};
use crate::error::ConfigError;
use crate::events::{FieldEvent, FileAttachment, Handler, Hook};
use crate::options::{Options, OptionsPatch, ValidatedWith};
use crate::parser::{self, ParseInput, Transform};
use crate::reactive::{Observable, Subscription};
use crate::state::FormState;
use crate::validation::{AsyncData, Check, ValidationStatus, ValidatorFn};
use crate::value::Value;

use derived::Derived;

pub use handlers::FocusTarget;
pub use validate::{ErrorMessage, ValidateOptions};

/// Handle to a field. Clones share the same field.
#[derive(Clone)]
pub struct Field {
    inner: Arc<FieldInner>,
}

pub(crate) struct FieldInner {
    id: String,
    key: String,
    path: String,
    name: String,
    state: Arc<FormState>,
    input: Transform,
    output: Transform,

    kind: Observable<String>,
    label: Observable<String>,
    placeholder: Observable<String>,
    value: Observable<Value>,
    initial: Observable<Value>,
    default: Observable<Value>,
    disabled: Observable<bool>,
    related: Observable<Vec<String>>,
    rules: Observable<Option<String>>,
    validators: Observable<Vec<ValidatorFn>>,
    validated_with: Observable<ValidatedWith>,
    bindings: Observable<String>,
    extra: Observable<Value>,
    options: Observable<OptionsPatch>,
    auto_focus: Observable<bool>,
    input_mode: Observable<Option<String>>,
    hooks: RwLock<BTreeMap<FieldEvent, Hook>>,
    handlers: RwLock<BTreeMap<FieldEvent, Handler>>,
    focus_target: RwLock<Option<Arc<dyn FocusTarget>>>,

    focused: Observable<bool>,
    blurred: Observable<bool>,
    touched: Observable<bool>,
    deleted: Observable<bool>,
    show_error: Observable<bool>,
    changed: Observable<u64>,
    files: Observable<Option<Vec<FileAttachment>>>,

    error_sync: Observable<Option<String>>,
    error_async: Observable<Option<String>>,
    error_stack: Observable<Vec<String>>,
    async_data: Observable<Option<AsyncData>>,
    functions_data: Observable<Vec<Check>>,
    status: Observable<ValidationStatus>,

    resetting: AtomicBool,
    clearing: AtomicBool,
    submitting: AtomicBool,
    incremental: AtomicBool,

    fields: Observable<Vec<Field>>,
    watchers: Mutex<Vec<Subscription>>,
    derived: Derived,
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("path", &self.inner.path)
            .field("id", &self.inner.id)
            .field("value", &self.inner.value.get_untracked())
            .field("fields", &self.inner.fields.get_untracked().len())
            .finish()
    }
}

fn check_plugins(
    state: &FormState,
    path: &str,
    rules: Option<&str>,
    has_validators: bool,
) -> crate::Result<()> {
    let qualified = match state.name() {
        Some(form) => format!("{form}/{path}"),
        None => path.to_string(),
    };
    if let Some(rules) = rules {
        match state.plugins().rules() {
            Some(engine) => engine.check(rules)?,
            None => {
                warn!("rules declared on '{qualified}' without a rule engine");
                return Err(ConfigError::MissingRuleEngine { path: qualified });
            }
        }
    }
    if has_validators && state.plugins().functions().is_none() {
        warn!("validators declared on '{qualified}' without a function engine");
        return Err(ConfigError::MissingFunctionEngine { path: qualified });
    }
    Ok(())
}

impl Field {
    /// Build a field from its unified definition (`data`) and separated
    /// props (`props`, which win), then its nested fields.
    pub(crate) fn build(
        state: &Arc<FormState>,
        key: &str,
        path: &str,
        data: &FieldDef,
        props: &FieldDef,
        update: bool,
    ) -> crate::Result<Field> {
        let overrides = pick(&props.options, &data.options).unwrap_or_default();
        let options = state.options_for(&overrides);
        let kind = pick(&props.kind, &data.kind).unwrap_or_else(|| "text".to_string());
        let input = pick(&props.input, &data.input).unwrap_or_else(parser::identity);
        let output = pick(&props.output, &data.output).unwrap_or_else(parser::identity);
        let is_empty_array = parser::is_array(state.structure(), path);
        let fallback_value = options.fallback_value.clone();

        let value = parser::parse_input(
            &input,
            ParseInput {
                kind: &kind,
                nullable: false,
                is_empty_array,
                separated: props.value.clone(),
                unified: data.value.clone(),
                fallback: props.initial.clone(),
                fallback_value: fallback_value.clone(),
            },
        );
        let initial = parser::parse_input(
            &input,
            ParseInput {
                kind: &kind,
                nullable: true,
                is_empty_array,
                separated: props.initial.clone(),
                unified: data.initial.clone(),
                fallback: Some(value.clone()),
                fallback_value: fallback_value.clone(),
            },
        );
        let unified_default = if update {
            Some(parser::default_value(&kind, &value, &fallback_value))
        } else {
            data.default.clone()
        };
        let default = parser::parse_input(
            &input,
            ParseInput {
                kind: &kind,
                nullable: true,
                is_empty_array,
                separated: props.default.clone(),
                unified: unified_default,
                fallback: Some(initial.clone()),
                fallback_value,
            },
        );

        let rules = pick(&props.rules, &data.rules);
        let validators = pick(&props.validators, &data.validators);
        check_plugins(state, path, rules.as_deref(), validators.is_some())?;

        let defs = data.fields.as_deref().unwrap_or_default();
        let seed = !update && data.fields.as_ref().is_some_and(Vec::is_empty);
        let children = state.build_children(path, defs, Some(&value), seed, update)?;
        let incremental = !children.is_empty() && children.iter().all(|c| parser::is_index(c.key()));
        let nested = children.len();

        let mut hooks = data.hooks.clone();
        hooks.extend(props.hooks.clone());
        let mut handlers = data.handlers.clone();
        handlers.extend(props.handlers.clone());

        let inner = Arc::new_cyclic(|weak| FieldInner {
            id: state.generate_id(path),
            key: key.to_string(),
            path: path.to_string(),
            name: data.name.clone().unwrap_or_else(|| key.to_string()),
            state: Arc::clone(state),
            input,
            output,
            kind: Observable::new(kind.clone()),
            label: Observable::new(pick(&props.label, &data.label).unwrap_or_default()),
            placeholder: Observable::new(pick(&props.placeholder, &data.placeholder).unwrap_or_default()),
            value: Observable::new(value),
            initial: Observable::new(initial),
            default: Observable::new(default),
            disabled: Observable::new(pick(&props.disabled, &data.disabled).unwrap_or(false)),
            related: Observable::new(pick(&props.related, &data.related).unwrap_or_default()),
            rules: Observable::new(rules),
            validators: Observable::new(validators.unwrap_or_default()),
            validated_with: Observable::new(
                pick(&props.validated_with, &data.validated_with).unwrap_or_default(),
            ),
            bindings: Observable::new(
                pick(&props.bindings, &data.bindings)
                    .unwrap_or_else(|| crate::bindings::DEFAULT_TEMPLATE.to_string()),
            ),
            extra: Observable::new(pick(&props.extra, &data.extra).unwrap_or_default()),
            options: Observable::new(overrides),
            auto_focus: Observable::new(pick(&props.auto_focus, &data.auto_focus).unwrap_or(false)),
            input_mode: Observable::new(pick(&props.input_mode, &data.input_mode)),
            hooks: RwLock::new(hooks),
            handlers: RwLock::new(handlers),
            focus_target: RwLock::new(pick(&props.focus_target, &data.focus_target)),
            focused: Observable::new(false),
            blurred: Observable::new(false),
            touched: Observable::new(false),
            deleted: Observable::new(pick(&props.deleted, &data.deleted).unwrap_or(false)),
            show_error: Observable::new(false),
            changed: Observable::new(0),
            files: Observable::new(None),
            error_sync: Observable::new(None),
            error_async: Observable::new(None),
            error_stack: Observable::new(Vec::new()),
            async_data: Observable::new(None),
            functions_data: Observable::new(Vec::new()),
            status: Observable::new(ValidationStatus::Clean),
            resetting: AtomicBool::new(false),
            clearing: AtomicBool::new(false),
            submitting: AtomicBool::new(false),
            incremental: AtomicBool::new(incremental),
            fields: Observable::new(children),
            watchers: Mutex::new(Vec::new()),
            derived: Derived::new(weak),
        });
        let field = Field { inner };

        field.observe_validation_on_blur(&options);
        field.observe_validation_on_change(&options);
        field.observe_change_hook();

        for observer in data.observers.iter().chain(props.observers.iter()) {
            field.observe(observer.clone())?;
        }
        for interceptor in data.interceptors.iter().chain(props.interceptors.iter()) {
            field.intercept(interceptor.clone())?;
        }

        field.exec_hook(FieldEvent::Init);
        debug!("field '{path}' created (type {kind}, {nested} nested)");
        Ok(field)
    }

    pub(crate) fn downgrade(&self) -> Weak<FieldInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<FieldInner>) -> Option<Field> {
        weak.upgrade().map(|inner| Field { inner })
    }

    pub(crate) fn watch(&self, subscription: Subscription) {
        if let Ok(mut watchers) = self.inner.watchers.lock() {
            watchers.push(subscription);
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Generated id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Local key within the parent.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Canonical dot path from the form root.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Display name (definition `name`, else the key).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The owning form state.
    pub fn state(&self) -> &Arc<FormState> {
        &self.inner.state
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Field type (`"text"`, `"checkbox"`, ...).
    pub fn kind(&self) -> String {
        self.inner.kind.get()
    }

    pub fn set_kind(&self, kind: impl Into<String>) {
        self.inner.kind.set(kind.into());
    }

    pub fn label(&self) -> String {
        self.inner.label.get()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        self.inner.label.set(label.into());
    }

    pub fn placeholder(&self) -> String {
        self.inner.placeholder.get()
    }

    pub fn set_placeholder(&self, placeholder: impl Into<String>) {
        self.inner.placeholder.set(placeholder.into());
    }

    pub fn disabled(&self) -> bool {
        self.inner.disabled.get()
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.inner.disabled.set(disabled);
    }

    /// Paths validated after this field.
    pub fn related(&self) -> Vec<String> {
        self.inner.related.get()
    }

    pub fn set_related(&self, related: Vec<String>) {
        self.inner.related.set(related);
    }

    /// Rule string, if any.
    pub fn rules(&self) -> Option<String> {
        self.inner.rules.get()
    }

    /// Replace the rule string. Fails if no rule engine is registered or the
    /// engine rejects the rules.
    pub fn set_rules(&self, rules: Option<String>) -> crate::Result<()> {
        check_plugins(self.state(), self.path(), rules.as_deref(), false)?;
        self.inner.rules.set(rules);
        Ok(())
    }

    /// Validator functions.
    pub fn validators(&self) -> Vec<ValidatorFn> {
        self.inner.validators.get()
    }

    /// Replace the validator functions. Any `Some`, even an empty list,
    /// requires a registered function engine; `None` drops them.
    pub fn set_validators(&self, validators: Option<Vec<ValidatorFn>>) -> crate::Result<()> {
        check_plugins(self.state(), self.path(), None, validators.is_some())?;
        self.inner.validators.set(validators.unwrap_or_default());
        Ok(())
    }

    pub fn validated_with(&self) -> ValidatedWith {
        self.inner.validated_with.get()
    }

    pub fn set_validated_with(&self, source: ValidatedWith) {
        self.inner.validated_with.set(source);
    }

    /// Bindings template name.
    pub fn bindings(&self) -> String {
        self.inner.bindings.get()
    }

    pub fn set_bindings(&self, template: impl Into<String>) {
        self.inner.bindings.set(template.into());
    }

    /// Free-form metadata.
    pub fn extra(&self) -> Value {
        self.inner.extra.get()
    }

    pub fn set_extra(&self, extra: impl Into<Value>) {
        self.inner.extra.set(extra.into());
    }

    /// The field's own option overrides.
    pub fn option_overrides(&self) -> OptionsPatch {
        self.inner.options.get()
    }

    pub fn set_option_overrides(&self, overrides: OptionsPatch) {
        self.inner.options.set(overrides);
    }

    /// Form options with this field's overrides applied.
    pub fn options(&self) -> Options {
        self.state().options_for(&self.inner.options.get())
    }

    pub fn auto_focus(&self) -> bool {
        self.inner.auto_focus.get()
    }

    pub fn set_auto_focus(&self, on: bool) {
        self.inner.auto_focus.set(on);
    }

    pub fn input_mode(&self) -> Option<String> {
        self.inner.input_mode.get()
    }

    pub fn set_input_mode(&self, mode: Option<String>) {
        self.inner.input_mode.set(mode);
    }

    /// Attachments captured by `on_drop`.
    pub fn files(&self) -> Option<Vec<FileAttachment>> {
        self.inner.files.get()
    }

    /// Whether the value shows errors.
    pub fn show_error(&self) -> bool {
        self.inner.show_error.get()
    }

    // =========================================================================
    // Transitional flags
    // =========================================================================

    pub fn is_resetting(&self) -> bool {
        self.inner.resetting.load(Ordering::SeqCst)
    }

    pub fn is_clearing(&self) -> bool {
        self.inner.clearing.load(Ordering::SeqCst)
    }

    /// Own submission flag, or the form's.
    pub fn is_submitting(&self) -> bool {
        self.inner.submitting.load(Ordering::SeqCst) || self.state().submitting()
    }

    /// Whether a bulk transition suppresses change counting and validation.
    pub fn action_running(&self) -> bool {
        self.is_submitting() || self.is_clearing() || self.is_resetting()
    }

    pub(crate) fn set_submitting(&self, on: bool) {
        self.inner.submitting.store(on, Ordering::SeqCst);
    }

    /// Clear `resetting`/`clearing` at the next microtask checkpoint.
    pub(crate) fn defer_flag_reset(&self) {
        let weak = self.downgrade();
        self.state().scheduler.defer(move || {
            if let Some(field) = Field::upgrade(&weak) {
                field.inner.resetting.store(false, Ordering::SeqCst);
                field.inner.clearing.store(false, Ordering::SeqCst);
            }
        });
    }
}
