//! The form container: builds the field tree and drives form-wide actions.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use tokio::time::Instant;

use crate::bindings::{Bindings, Rewriter};
use crate::definition::FieldDef;
use crate::error::ConfigError;
use crate::events::{InterceptorDef, ObserverDef};
use crate::field::{Field, ValidateOptions};
use crate::options::Options;
use crate::state::{FormSchema, FormState, IdFn};
use crate::validation::{FieldError, FunctionEngine, Plugins, RuleEngine, ValidationResult};
use crate::value::Value;

/// Builder for [`Form`].
///
/// # Example
///
/// ```
/// use formfield::{FieldDef, Form, Options};
/// use formfield::validation::Dvr;
///
/// let form = Form::builder()
///     .options(Options::default().validate_on_init(false))
///     .rules(Dvr::new())
///     .field(FieldDef::named("email").rules("required|email"))
///     .build()
///     .unwrap();
/// assert!(form.validate().is_invalid());
/// ```
#[derive(Default)]
pub struct FormBuilder {
    schema: FormSchema,
    options: Options,
    plugins: Plugins,
    templates: Vec<(String, Rewriter)>,
    unique_id: Option<IdFn>,
}

impl FormBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a schema. Fields added afterwards are appended.
    pub fn schema(mut self, schema: FormSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.schema.name = Some(name.into());
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Register the rule engine.
    pub fn rules(mut self, engine: impl RuleEngine + 'static) -> Self {
        self.plugins = self.plugins.with_rules(engine);
        self
    }

    /// Register the function engine.
    pub fn functions(mut self, engine: impl FunctionEngine + 'static) -> Self {
        self.plugins = self.plugins.with_functions(engine);
        self
    }

    /// Append a root field definition.
    pub fn field(mut self, def: FieldDef) -> Self {
        self.schema.fields.push(def);
        self
    }

    /// Add flattened schema paths (`members[].firstname`).
    pub fn structure<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.structure.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Separated values, keyed like the field tree.
    pub fn values(mut self, values: impl Into<Value>) -> Self {
        self.schema.values = Some(values.into());
        self
    }

    /// Register a bindings template.
    pub fn template(mut self, name: impl Into<String>, rewriter: Rewriter) -> Self {
        self.templates.push((name.into(), rewriter));
        self
    }

    /// Replace the field id generator.
    pub fn unique_id(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.unique_id = Some(Arc::new(f));
        self
    }

    /// Build the field tree. Runs the initial validation when
    /// `validate_on_init` is on.
    pub fn build(self) -> crate::Result<Form> {
        let options = self.options.clone();
        let bindings = Bindings::new();
        for (name, rewriter) in self.templates {
            bindings.register(name, rewriter);
        }
        let state = Arc::new(FormState::new(
            self.schema,
            self.options,
            self.plugins,
            bindings,
            self.unique_id,
        ));
        let form = Form { state };
        form.state.scheduler.action(|| form.state.init())?;

        if options.validate_on_init {
            form.validate_with(ValidateOptions::show_errors(options.show_errors_on_init));
        }
        info!(
            "form{} ready",
            form.state.name().map(|n| format!(" '{n}'")).unwrap_or_default()
        );
        Ok(form)
    }
}

/// A form: the root of a field tree.
///
/// Dropping the form tears the tree down.
pub struct Form {
    state: Arc<FormState>,
}

impl std::fmt::Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Form").field("state", &self.state).finish()
    }
}

impl Drop for Form {
    fn drop(&mut self) {
        self.state.teardown();
    }
}

impl Form {
    pub fn builder() -> FormBuilder {
        FormBuilder::new()
    }

    /// Build a form from a JSON schema and options, without validation
    /// backends.
    pub fn from_json(schema: &str, options: Options) -> crate::Result<Self> {
        Self::builder()
            .schema(FormSchema::from_json(schema)?)
            .options(options)
            .build()
    }

    pub fn state(&self) -> &Arc<FormState> {
        &self.state
    }

    pub fn name(&self) -> Option<&str> {
        self.state.name()
    }

    pub fn options(&self) -> Options {
        self.state.options()
    }

    pub fn set_options(&self, options: Options) {
        self.state.set_options(options);
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// Root fields in order.
    pub fn fields(&self) -> Vec<Field> {
        self.state.root_fields()
    }

    /// Field by dot or bracket path.
    pub fn select(&self, path: &str) -> crate::Result<Field> {
        self.state
            .select(path)
            .ok_or_else(|| ConfigError::not_found(path))
    }

    pub fn has(&self, path: &str) -> bool {
        self.state.select(path).is_some()
    }

    /// Visit every field, depth first.
    pub fn each(&self, f: &mut dyn FnMut(&Field)) {
        for field in self.fields() {
            f(&field);
            field.each(f);
        }
    }

    /// Add a root field, or a child below `path`. Without `key` the next
    /// numeric key is used.
    pub fn add(
        &self,
        path: Option<&str>,
        value: Option<Value>,
        key: Option<&str>,
    ) -> crate::Result<Field> {
        if let Some(path) = path {
            return self.select(path)?.add(value, key);
        }
        let key = key.map_or_else(
            || {
                self.fields()
                    .iter()
                    .filter_map(|f| f.key().parse::<usize>().ok())
                    .max()
                    .map_or(0, |n| n + 1)
                    .to_string()
            },
            str::to_string,
        );
        self.state.scheduler.action(|| {
            if let Some(existing) = self.state.select(&key) {
                existing.remove();
                self.state.fields.update(|fields| fields.retain(|f| *f != existing));
            }
            let field = self.state.build_child("", &key, None, value, true)?;
            self.state.fields.update(|fields| fields.push(field.clone()));
            debug!("added root field '{key}'");
            Ok(field)
        })
    }

    /// Delete a field by path. See [`Field::del`].
    pub fn del(&self, path: &str) -> crate::Result<()> {
        let normalized = crate::parser::parse_path(path);
        if let Some((parent, key)) = normalized.rsplit_once('.') {
            return self.select(parent)?.del(key);
        }
        let field = self.select(&normalized)?;
        self.state.scheduler.action(|| {
            if field.options().soft_delete {
                field.mark_deleted();
            } else {
                field.remove();
                self.state.fields.update(|fields| fields.retain(|f| *f != field));
            }
        });
        debug!("deleted root field '{normalized}'");
        Ok(())
    }

    /// Bulk update from a map keyed like the field tree.
    pub fn update(&self, values: impl Into<Value>) -> crate::Result<()> {
        let values = values.into();
        let Value::Map(map) = values else {
            return Err(ConfigError::UpdateRequiresObject {
                found: values.type_name(),
            });
        };
        self.state.scheduler.action(|| {
            for (key, value) in map {
                match self.state.select(&key) {
                    Some(field) if field.is_container() => field.update_children(&value)?,
                    Some(field) => field.set_value(value),
                    None if self.options().fallback => {
                        self.add(None, Some(value), Some(&key))?;
                    }
                    None => debug!("update skipped unknown root key '{key}'"),
                }
            }
            Ok(())
        })
    }

    // =========================================================================
    // Values and errors
    // =========================================================================

    /// Output values of the root fields, skipping soft-deleted ones.
    pub fn values(&self) -> Value {
        let soft = self.options().soft_delete;
        Value::Map(
            self.fields()
                .into_iter()
                .filter(|f| !(soft && f.deleted()))
                .map(|f| (f.key().to_string(), f.output()))
                .collect(),
        )
    }

    /// Visible error of every field, keyed by path.
    pub fn errors(&self) -> BTreeMap<String, Option<String>> {
        let mut errors = BTreeMap::new();
        self.each(&mut |f| {
            errors.insert(f.path().to_string(), f.error());
        });
        errors
    }

    pub fn has_error(&self) -> bool {
        self.fields().iter().any(Field::has_error)
    }

    pub fn is_valid(&self) -> bool {
        self.fields().iter().all(Field::is_valid)
    }

    pub fn is_dirty(&self) -> bool {
        self.fields().iter().any(Field::is_dirty)
    }

    pub fn is_pristine(&self) -> bool {
        self.fields().iter().all(Field::is_pristine)
    }

    /// Tree-wide change counter.
    pub fn changed(&self) -> u64 {
        self.state.changed()
    }

    pub fn submitted(&self) -> u64 {
        self.state.submitted()
    }

    pub fn submitting(&self) -> bool {
        self.state.submitting()
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Validate every field, showing errors.
    pub fn validate(&self) -> ValidationResult {
        self.validate_with(ValidateOptions::default())
    }

    pub fn validate_with(&self, options: ValidateOptions) -> ValidationResult {
        self.state.scheduler.action(|| {
            let errors: Vec<FieldError> = self
                .fields()
                .iter()
                .flat_map(|f| f.validate_with(options).errors().to_vec())
                .collect();
            ValidationResult::from_errors(errors)
        })
    }

    /// Submit: validate with `show_errors_on_submit` when `validate_on_submit`
    /// is on, then count the submission.
    pub fn submit(&self) -> ValidationResult {
        let options = self.options();
        self.state.set_submitting(true);
        let result = self.state.scheduler.action(|| {
            if options.validate_on_submit {
                self.validate_with(ValidateOptions::show_errors(options.show_errors_on_submit))
            } else {
                self.current_result()
            }
        });
        self.state.bump_submitted();
        self.state.set_submitting(false);
        info!("form submitted ({} error(s))", result.errors().len());
        result
    }

    fn current_result(&self) -> ValidationResult {
        let mut errors = Vec::new();
        self.each(&mut |f| {
            if let Some(message) = f.own_error_message() {
                errors.push(FieldError {
                    path: f.path().to_string(),
                    field_id: f.id().to_string(),
                    message,
                });
            }
        });
        ValidationResult::from_errors(errors)
    }

    pub fn clear(&self) {
        self.state.scheduler.action(|| {
            for field in self.fields() {
                field.clear(true, true);
            }
        });
    }

    pub fn reset(&self) {
        self.state.scheduler.action(|| {
            for field in self.fields() {
                field.reset(true, true);
            }
        });
    }

    pub fn show_errors(&self, show: bool) {
        self.state.scheduler.action(|| {
            for field in self.fields() {
                field.show_errors(show);
            }
        });
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register an observer on the field at `def.path` (absolute).
    pub fn observe(&self, mut def: ObserverDef) -> crate::Result<()> {
        let path = def.path.take().unwrap_or_default();
        self.select(&path)?.observe(def)
    }

    /// Register an interceptor on the field at `def.path` (absolute).
    pub fn intercept(&self, mut def: InterceptorDef) -> crate::Result<()> {
        let path = def.path.take().unwrap_or_default();
        self.select(&path)?.intercept(def)
    }

    /// Dispose every subscription in the form. Returns the count.
    pub fn dispose(&self) -> usize {
        self.state.disposers.clear()
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Run every pending microtask and debounced validation now.
    pub fn settle(&self) -> usize {
        self.state.scheduler.settle()
    }

    /// Run debounced validations due at `now`.
    pub fn run_due(&self, now: Instant) -> usize {
        self.state.scheduler.run_due(now)
    }

    /// Sleep through pending debounce windows, running each as it falls due.
    pub async fn drain(&self) -> usize {
        self.state.scheduler.drain().await
    }
}
