//! Declarative field definitions.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::events::{FieldEvent, Handler, Hook, InputEvent, InterceptorDef, ObserverDef};
use crate::field::{Field, FocusTarget};
use crate::options::{OptionsPatch, ValidatedWith};
use crate::parser::Transform;
use crate::validation::ValidatorFn;
use crate::value::Value;

/// Definition of one field and, recursively, its nested fields.
///
/// Definitions are used both as the unified per-field object and as the
/// separated per-path props that override it. Every attribute is optional;
/// unset attributes fall back to the other source, then to built-in defaults.
///
/// Closures (validators, hooks, handlers, observers, interceptors, transforms)
/// cannot come from JSON and are attached with the builder methods.
///
/// # Example
///
/// ```
/// use formfield::FieldDef;
///
/// let def = FieldDef::named("email")
///     .label("Email")
///     .rules("required|email")
///     .value("");
/// assert_eq!(def.name.as_deref(), Some("email"));
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDef {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub value: Option<Value>,
    pub initial: Option<Value>,
    pub default: Option<Value>,
    pub disabled: Option<bool>,
    pub deleted: Option<bool>,
    pub related: Option<Vec<String>>,
    pub rules: Option<String>,
    pub validated_with: Option<ValidatedWith>,
    pub bindings: Option<String>,
    pub extra: Option<Value>,
    pub options: Option<OptionsPatch>,
    pub auto_focus: Option<bool>,
    pub input_mode: Option<String>,
    /// Nested definitions. `Some(vec![])` declares a container whose children
    /// come from its value.
    pub fields: Option<Vec<FieldDef>>,

    #[serde(skip)]
    pub validators: Option<Vec<ValidatorFn>>,
    #[serde(skip)]
    pub hooks: BTreeMap<FieldEvent, Hook>,
    #[serde(skip)]
    pub handlers: BTreeMap<FieldEvent, Handler>,
    #[serde(skip)]
    pub observers: Vec<ObserverDef>,
    #[serde(skip)]
    pub interceptors: Vec<InterceptorDef>,
    #[serde(skip)]
    pub input: Option<Transform>,
    #[serde(skip)]
    pub output: Option<Transform>,
    #[serde(skip)]
    pub focus_target: Option<Arc<dyn FocusTarget>>,
}

impl std::fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("type", &self.kind)
            .field("value", &self.value)
            .field("rules", &self.rules)
            .field("validators", &self.validators.as_ref().map(Vec::len))
            .field("fields", &self.fields.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl FieldDef {
    /// An empty definition with a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// A definition where the field is the value.
    pub(crate) fn from_value(value: Option<Value>) -> Self {
        Self {
            initial: value.clone(),
            value,
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    /// Paths validated after this field.
    pub fn related<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Rule string for the rule engine.
    pub fn rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = Some(rules.into());
        self
    }

    /// Append a validator function.
    pub fn validator(mut self, validator: ValidatorFn) -> Self {
        self.validators.get_or_insert_with(Vec::new).push(validator);
        self
    }

    pub fn validated_with(mut self, source: ValidatedWith) -> Self {
        self.validated_with = Some(source);
        self
    }

    /// Name of the bindings template used by `bind`.
    pub fn bindings(mut self, template: impl Into<String>) -> Self {
        self.bindings = Some(template.into());
        self
    }

    pub fn extra(mut self, extra: impl Into<Value>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    pub fn options(mut self, options: OptionsPatch) -> Self {
        self.options = Some(options);
        self
    }

    pub fn auto_focus(mut self, on: bool) -> Self {
        self.auto_focus = Some(on);
        self
    }

    pub fn input_mode(mut self, mode: impl Into<String>) -> Self {
        self.input_mode = Some(mode.into());
        self
    }

    /// Append a nested definition.
    pub fn field(mut self, child: FieldDef) -> Self {
        self.fields.get_or_insert_with(Vec::new).push(child);
        self
    }

    /// Declare a container whose children are seeded from its value.
    pub fn container(mut self) -> Self {
        self.fields.get_or_insert_with(Vec::new);
        self
    }

    pub fn hook(mut self, event: FieldEvent, f: impl Fn(&Field) + Send + Sync + 'static) -> Self {
        self.hooks.insert(event, Arc::new(f));
        self
    }

    pub fn handler(
        mut self,
        event: FieldEvent,
        f: impl Fn(&Field, &InputEvent) + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(event, Arc::new(f));
        self
    }

    pub fn observer(mut self, observer: ObserverDef) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn interceptor(mut self, interceptor: InterceptorDef) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Raw to canonical transform.
    pub fn input(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.input = Some(Arc::new(f));
        self
    }

    /// Canonical to external transform.
    pub fn output(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.output = Some(Arc::new(f));
        self
    }

    pub fn focus_target(mut self, target: Arc<dyn FocusTarget>) -> Self {
        self.focus_target = Some(target);
        self
    }

    /// Find a nested definition by name.
    pub fn child(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .as_deref()
            .and_then(|fields| fields.iter().find(|f| f.name.as_deref() == Some(name)))
    }
}

/// `props` wins over `data`.
pub(crate) fn pick<T: Clone>(props: &Option<T>, data: &Option<T>) -> Option<T> {
    props.clone().or_else(|| data.clone())
}
