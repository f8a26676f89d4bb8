//! Binding templates: map a field's props and handlers onto the property
//! names an input element expects.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, Weak};

use log::warn;

use crate::events::InputEvent;
use crate::field::{Field, FieldInner, FocusTarget};
use crate::value::Value;

/// Field prop or handler name to element property name.
pub type Rewriter = BTreeMap<String, String>;

/// A handler bound to a field.
pub type BoundHandler = Arc<dyn Fn(InputEvent) + Send + Sync>;

/// Name of the template every form starts with.
pub const DEFAULT_TEMPLATE: &str = "default";

const PROPS: [&str; 10] = [
    "id",
    "name",
    "type",
    "value",
    "checked",
    "label",
    "placeholder",
    "disabled",
    "autoFocus",
    "inputMode",
];

const HANDLERS: [&str; 7] = [
    "onChange",
    "onToggle",
    "onBlur",
    "onFocus",
    "onDrop",
    "onKeyDown",
    "onKeyUp",
];

fn default_rewriter() -> Rewriter {
    PROPS
        .iter()
        .chain(HANDLERS.iter())
        .map(|key| (key.to_string(), key.to_string()))
        .collect()
}

/// Registry of binding templates.
#[derive(Debug)]
pub struct Bindings {
    templates: RwLock<BTreeMap<String, Rewriter>>,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            templates: RwLock::new(BTreeMap::from([(
                DEFAULT_TEMPLATE.to_string(),
                default_rewriter(),
            )])),
        }
    }
}

impl Bindings {
    /// Registry holding only the default template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. Keys missing from `rewriter` keep their default
    /// names.
    pub fn register(&self, name: impl Into<String>, rewriter: Rewriter) {
        let mut full = default_rewriter();
        full.extend(rewriter);
        if let Ok(mut templates) = self.templates.write() {
            templates.insert(name.into(), full);
        }
    }

    /// Registered template names.
    pub fn names(&self) -> Vec<String> {
        self.templates
            .read()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn rewriter(&self, name: &str) -> Rewriter {
        let templates = self.templates.read().unwrap_or_else(|p| p.into_inner());
        match templates.get(name) {
            Some(rewriter) => rewriter.clone(),
            None => {
                warn!("unknown bindings template '{name}', using default");
                default_rewriter()
            }
        }
    }

    /// Build the property bag for `field` using `template`. `extra` entries
    /// override computed props.
    pub fn load(&self, field: &Field, template: &str, extra: BTreeMap<String, Value>) -> BindProps {
        let rewriter = self.rewriter(template);
        let rename = |key: &str| rewriter.get(key).cloned().unwrap_or_else(|| key.to_string());

        let mut props = BTreeMap::new();
        for key in PROPS {
            let value = match key {
                "id" => Value::from(field.id()),
                "name" => Value::from(field.name()),
                "type" => Value::from(field.kind()),
                "value" => field.output(),
                "checked" => field.checked().unwrap_or(Value::Null),
                "label" => Value::from(field.label()),
                "placeholder" => Value::from(field.placeholder()),
                "disabled" => Value::from(field.disabled()),
                "autoFocus" => Value::from(field.auto_focus()),
                "inputMode" => Value::from(field.input_mode()),
                _ => Value::Null,
            };
            props.insert(rename(key), value);
        }
        props.extend(extra);

        let mut handlers: BTreeMap<String, BoundHandler> = BTreeMap::new();
        for key in HANDLERS {
            let weak = field.downgrade();
            let dispatch: fn(&Field, InputEvent) = match key {
                "onChange" => |f, e| f.on_change(e),
                "onToggle" => |f, e| f.on_toggle(e),
                "onBlur" => |f, e| f.on_blur(e),
                "onFocus" => |f, e| f.on_focus(e),
                "onDrop" => |f, e| f.on_drop(e),
                "onKeyDown" => |f, e| f.on_key_down(e),
                _ => |f, e| f.on_key_up(e),
            };
            handlers.insert(
                rename(key),
                Arc::new(move |event| {
                    if let Some(field) = Field::upgrade(&weak) {
                        dispatch(&field, event);
                    }
                }),
            );
        }

        BindProps {
            props,
            handlers,
            field: field.downgrade(),
        }
    }
}

/// Property bag for one input element.
#[derive(Clone)]
pub struct BindProps {
    /// Rewritten props.
    pub props: BTreeMap<String, Value>,
    /// Rewritten handlers.
    pub handlers: BTreeMap<String, BoundHandler>,
    field: Weak<FieldInner>,
}

impl std::fmt::Debug for BindProps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindProps")
            .field("props", &self.props)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BindProps {
    /// A prop by its bound name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    /// Invoke a handler by its bound name. Returns `false` if there is none.
    pub fn call(&self, handler: &str, event: impl Into<InputEvent>) -> bool {
        match self.handlers.get(handler) {
            Some(f) => {
                f(event.into());
                true
            }
            None => false,
        }
    }

    /// Attach the element handle used by `focus`/`blur`.
    pub fn set_ref(&self, target: Arc<dyn FocusTarget>) {
        if let Some(field) = Field::upgrade(&self.field) {
            field.set_focus_target(Some(target));
        }
    }
}
