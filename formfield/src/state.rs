//! Shared form state: options, schema, root fields and tree-wide services.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use serde::Deserialize;
use uuid::Uuid;

use crate::bindings::Bindings;
use crate::definition::FieldDef;
use crate::events::Disposers;
use crate::field::Field;
use crate::options::{Options, OptionsPatch};
use crate::parser;
use crate::reactive::Observable;
use crate::schedule::Scheduler;
use crate::validation::Plugins;
use crate::value::Value;

/// Generates a field id from its path.
pub type IdFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A form definition, loadable from JSON.
///
/// Fields come from `fields` (nested definitions), `structure` (flattened
/// schema paths such as `members[].firstname`) and, with the `fallback`
/// option, from `values`. The per-path maps are separated props: they are
/// keyed by concrete (`members.0.firstname`) or structural
/// (`members[].firstname`) paths and win over the definitions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormSchema {
    pub name: Option<String>,
    pub fields: Vec<FieldDef>,
    #[serde(alias = "struct")]
    pub structure: Vec<String>,
    pub values: Option<Value>,
    pub labels: BTreeMap<String, String>,
    pub placeholders: BTreeMap<String, String>,
    pub rules: BTreeMap<String, String>,
    pub initials: BTreeMap<String, Value>,
    pub defaults: BTreeMap<String, Value>,
    pub types: BTreeMap<String, String>,
    pub disabled: BTreeMap<String, bool>,
    pub related: BTreeMap<String, Vec<String>>,
    pub bindings: BTreeMap<String, String>,
    pub extra: BTreeMap<String, Value>,
    pub options: BTreeMap<String, OptionsPatch>,
    pub input_modes: BTreeMap<String, String>,
    pub auto_focus: BTreeMap<String, bool>,
}

impl FormSchema {
    /// Parse a schema from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn lookup<'a, T>(map: &'a BTreeMap<String, T>, path: &str) -> Option<&'a T> {
        map.get(path)
            .or_else(|| map.get(&parser::path_to_struct(path)))
    }

    /// Separated props for `path`.
    pub(crate) fn props_for(&self, path: &str) -> FieldDef {
        FieldDef {
            value: self
                .values
                .as_ref()
                .and_then(|v| v.at_path(path))
                .cloned(),
            label: Self::lookup(&self.labels, path).cloned(),
            placeholder: Self::lookup(&self.placeholders, path).cloned(),
            rules: Self::lookup(&self.rules, path).cloned(),
            initial: Self::lookup(&self.initials, path).cloned(),
            default: Self::lookup(&self.defaults, path).cloned(),
            kind: Self::lookup(&self.types, path).cloned(),
            disabled: Self::lookup(&self.disabled, path).copied(),
            related: Self::lookup(&self.related, path).cloned(),
            bindings: Self::lookup(&self.bindings, path).cloned(),
            extra: Self::lookup(&self.extra, path).cloned(),
            options: Self::lookup(&self.options, path).cloned(),
            input_mode: Self::lookup(&self.input_modes, path).cloned(),
            auto_focus: Self::lookup(&self.auto_focus, path).copied(),
            ..Default::default()
        }
    }
}

/// State shared by every field of a form.
pub struct FormState {
    name: Option<String>,
    options: Observable<Options>,
    schema: FormSchema,
    pub(crate) fields: Observable<Vec<Field>>,
    changed: Observable<u64>,
    submitted: Observable<u64>,
    submitting: AtomicBool,
    plugins: Plugins,
    pub(crate) disposers: Disposers,
    pub(crate) scheduler: Scheduler,
    bindings: Bindings,
    unique_id: Option<IdFn>,
}

impl std::fmt::Debug for FormState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormState")
            .field("name", &self.name)
            .field("fields", &self.fields.get_untracked().len())
            .field("changed", &self.changed.get_untracked())
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl FormState {
    pub(crate) fn new(
        schema: FormSchema,
        options: Options,
        plugins: Plugins,
        bindings: Bindings,
        unique_id: Option<IdFn>,
    ) -> Self {
        Self {
            name: schema.name.clone(),
            options: Observable::new(options),
            schema,
            fields: Observable::new(Vec::new()),
            changed: Observable::new(0),
            submitted: Observable::new(0),
            submitting: AtomicBool::new(false),
            plugins,
            disposers: Disposers::default(),
            scheduler: Scheduler::new(),
            bindings,
            unique_id,
        }
    }

    /// Form name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Form options (tracked).
    pub fn options(&self) -> Options {
        self.options.get()
    }

    /// Form options with a field's overrides applied.
    pub fn options_for(&self, patch: &OptionsPatch) -> Options {
        self.options.with(|base| {
            if patch.is_empty() {
                base.clone()
            } else {
                patch.apply(base)
            }
        })
    }

    /// Replace form options. Already-wired observers keep their registration
    /// but read gates on every call.
    pub fn set_options(&self, options: Options) {
        self.options.set(options);
    }

    /// Flattened schema paths.
    pub fn structure(&self) -> &[String] {
        &self.schema.structure
    }

    /// Tree-wide change counter.
    pub fn changed(&self) -> u64 {
        self.changed.get()
    }

    pub(crate) fn bump_changed(&self) {
        self.changed.update(|n| *n += 1);
        trace!("form change counter at {}", self.changed.get_untracked());
    }

    /// Number of completed submissions.
    pub fn submitted(&self) -> u64 {
        self.submitted.get()
    }

    pub(crate) fn bump_submitted(&self) {
        self.submitted.update(|n| *n += 1);
    }

    /// Whether a submission is in progress.
    pub fn submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    pub(crate) fn set_submitting(&self, on: bool) {
        self.submitting.store(on, Ordering::SeqCst);
    }

    /// Registered validation backends.
    pub fn plugins(&self) -> &Plugins {
        &self.plugins
    }

    /// Binding templates.
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Subscription registry.
    pub fn disposers(&self) -> &Disposers {
        &self.disposers
    }

    /// Deferred work queue.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Root fields in declaration order.
    pub fn root_fields(&self) -> Vec<Field> {
        self.fields.get()
    }

    /// Find a field by dot or bracket path.
    pub fn select(&self, path: &str) -> Option<Field> {
        let path = parser::parse_path(path);
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self
            .fields
            .get_untracked()
            .into_iter()
            .find(|f| f.key() == first)?;
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }

    pub(crate) fn props_for(&self, path: &str) -> FieldDef {
        self.schema.props_for(path)
    }

    pub(crate) fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub(crate) fn generate_id(&self, path: &str) -> String {
        match &self.unique_id {
            Some(f) => f(path),
            None => format!("{}--{}", path.replace('.', "-"), Uuid::new_v4().simple()),
        }
    }

    /// Build the children of `parent_path`.
    ///
    /// Keys come from `defs` in order, then from the schema, then from
    /// `values` when the position is an array, when `fallback` is on, or when
    /// `seed` is set.
    pub(crate) fn build_children(
        self: &Arc<Self>,
        parent_path: &str,
        defs: &[FieldDef],
        values: Option<&Value>,
        seed: bool,
        update: bool,
    ) -> crate::Result<Vec<Field>> {
        let structure = self.structure();
        let is_array = !parent_path.is_empty() && parser::is_array(structure, parent_path);

        let mut keys: Vec<String> = defs.iter().filter_map(|d| d.name.clone()).collect();
        if !is_array {
            for key in parser::struct_children(structure, parent_path) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        if is_array || seed || self.options().fallback {
            for key in value_keys(values) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        keys.iter()
            .map(|key| {
                let def = defs.iter().find(|d| d.name.as_deref() == Some(key.as_str()));
                let raw = values.and_then(|v| v.child(key)).cloned();
                self.build_child(parent_path, key, def, raw, update)
            })
            .collect()
    }

    /// Build one field below `parent_path`.
    pub(crate) fn build_child(
        self: &Arc<Self>,
        parent_path: &str,
        key: &str,
        def: Option<&FieldDef>,
        raw: Option<Value>,
        update: bool,
    ) -> crate::Result<Field> {
        let path = parser::join(parent_path, key);
        let data = match def {
            Some(def) => {
                let mut data = def.clone();
                if data.value.is_none() {
                    data.value = raw;
                }
                data
            }
            None => FieldDef::from_value(raw),
        };
        let mut props = self.props_for(&path);
        if update {
            props.value = None;
        }
        Field::build(self, key, &path, &data, &props, update)
    }

    /// Build the root fields from the schema.
    pub(crate) fn init(self: &Arc<Self>) -> crate::Result<()> {
        let defs = self.schema.fields.clone();
        let values = self.schema.values.clone();
        let fields = self.build_children("", &defs, values.as_ref(), false, false)?;
        debug!(
            "form{} built with {} root field(s)",
            self.name.as_deref().map(|n| format!(" '{n}'")).unwrap_or_default(),
            fields.len()
        );
        self.fields.set(fields);
        Ok(())
    }

    /// Break the field/state reference cycles.
    pub(crate) fn teardown(&self) {
        self.scheduler.clear();
        self.disposers.clear();
        for field in self.fields.get_untracked() {
            field.teardown();
        }
        self.fields.set(Vec::new());
    }
}

/// Child keys carried by a value: list indices or map keys.
fn value_keys(values: Option<&Value>) -> Vec<String> {
    match values {
        Some(Value::List(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
        Some(Value::Map(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}
