//! Field events, subscriptions and the disposer registry.
//!
//! This module provides:
//! - [`Prop`]: names of field properties, used for subscriptions and `get`/`set`
//! - [`FieldEvent`] / [`InputEvent`]: hook and handler dispatch
//! - [`Disposers`]: tree-scoped registry of observer/interceptor subscriptions

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use log::debug;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;
use crate::field::Field;
use crate::reactive::{Change, Subscription};
use crate::value::Value;

// =============================================================================
// Props
// =============================================================================

/// A field property addressable by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prop {
    Value,
    Initial,
    Default,
    Type,
    Label,
    Placeholder,
    Disabled,
    Related,
    Rules,
    Extra,
    Bindings,
    AutoFocus,
    InputMode,
    Focused,
    Blurred,
    Touched,
    Deleted,
    ShowError,
    Changed,
    ErrorSync,
    ErrorAsync,
    Fields,
    // derived, read-only
    Checked,
    Error,
    IsValid,
    HasError,
    IsDirty,
    IsPristine,
    IsDefault,
    IsEmpty,
}

/// How a container folds a boolean prop over its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// True if any child is true.
    Some,
    /// True if every child is true.
    Every,
}

impl Prop {
    const ALL: [Prop; 30] = [
        Prop::Value,
        Prop::Initial,
        Prop::Default,
        Prop::Type,
        Prop::Label,
        Prop::Placeholder,
        Prop::Disabled,
        Prop::Related,
        Prop::Rules,
        Prop::Extra,
        Prop::Bindings,
        Prop::AutoFocus,
        Prop::InputMode,
        Prop::Focused,
        Prop::Blurred,
        Prop::Touched,
        Prop::Deleted,
        Prop::ShowError,
        Prop::Changed,
        Prop::ErrorSync,
        Prop::ErrorAsync,
        Prop::Fields,
        Prop::Checked,
        Prop::Error,
        Prop::IsValid,
        Prop::HasError,
        Prop::IsDirty,
        Prop::IsPristine,
        Prop::IsDefault,
        Prop::IsEmpty,
    ];

    /// The key used in registry entries and bindings.
    pub fn key(self) -> &'static str {
        match self {
            Prop::Value => "value",
            Prop::Initial => "initial",
            Prop::Default => "default",
            Prop::Type => "type",
            Prop::Label => "label",
            Prop::Placeholder => "placeholder",
            Prop::Disabled => "disabled",
            Prop::Related => "related",
            Prop::Rules => "rules",
            Prop::Extra => "extra",
            Prop::Bindings => "bindings",
            Prop::AutoFocus => "autoFocus",
            Prop::InputMode => "inputMode",
            Prop::Focused => "focused",
            Prop::Blurred => "blurred",
            Prop::Touched => "touched",
            Prop::Deleted => "deleted",
            Prop::ShowError => "showError",
            Prop::Changed => "changed",
            Prop::ErrorSync => "errorSync",
            Prop::ErrorAsync => "errorAsync",
            Prop::Fields => "fields",
            Prop::Checked => "checked",
            Prop::Error => "error",
            Prop::IsValid => "isValid",
            Prop::HasError => "hasError",
            Prop::IsDirty => "isDirty",
            Prop::IsPristine => "isPristine",
            Prop::IsDefault => "isDefault",
            Prop::IsEmpty => "isEmpty",
        }
    }

    /// Parse a key. A leading `$` is accepted.
    pub fn parse(key: &str) -> crate::Result<Self> {
        let bare = key.strip_prefix('$').unwrap_or(key);
        Self::ALL
            .into_iter()
            .find(|prop| prop.key() == bare)
            .ok_or_else(|| ConfigError::UnknownProp {
                key: key.to_string(),
            })
    }

    /// Fold used when a container answers this prop from its children.
    pub fn occurrence(self) -> Occurrence {
        match self {
            Prop::IsValid | Prop::IsPristine | Prop::IsDefault | Prop::Disabled => {
                Occurrence::Every
            }
            _ => Occurrence::Some,
        }
    }
}

impl std::str::FromStr for Prop {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Prop::parse(s)
    }
}

impl std::fmt::Display for Prop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Conversion between a cell's native type and [`Value`].
pub(crate) trait PropValue: Clone + PartialEq + Send + Sync + 'static {
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Self;
}

impl PropValue for Value {
    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value) -> Self {
        value
    }
}

impl PropValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Self {
        value.as_bool().unwrap_or_else(|| value.is_truthy())
    }
}

impl PropValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: Value) -> Self {
        value.to_text()
    }
}

impl PropValue for u64 {
    fn into_value(self) -> Value {
        Value::Number(self as f64)
    }

    fn from_value(value: Value) -> Self {
        value.as_f64().map(|n| n.max(0.0) as u64).unwrap_or(0)
    }
}

impl PropValue for Option<String> {
    fn into_value(self) -> Value {
        self.map(Value::Text).unwrap_or(Value::Null)
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => None,
            other => Some(other.to_text()),
        }
    }
}

impl PropValue for Vec<String> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(Value::Text).collect())
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::List(items) => items.iter().map(Value::to_text).collect(),
            Value::Null => Vec::new(),
            other => vec![other.to_text()],
        }
    }
}

// =============================================================================
// Hooks and handlers
// =============================================================================

/// Events a field reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldEvent {
    Init,
    Change,
    Sync,
    Toggle,
    Focus,
    Blur,
    Drop,
    KeyDown,
    KeyUp,
    Clear,
    Reset,
}

/// A file captured by `on_drop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub name: String,
    pub size: u64,
    pub mime: Option<String>,
}

/// Payload delivered to handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InputEvent {
    /// No payload.
    #[default]
    Empty,
    /// A bare value.
    Value(Value),
    /// An element-style event; `checked` is read for boolean fields.
    Target {
        value: Value,
        checked: bool,
    },
    /// Files dropped or picked.
    Files(Vec<FileAttachment>),
    /// A key name.
    Key(String),
}

impl From<Value> for InputEvent {
    fn from(value: Value) -> Self {
        InputEvent::Value(value)
    }
}

impl From<&str> for InputEvent {
    fn from(value: &str) -> Self {
        InputEvent::Value(Value::from(value))
    }
}

/// Called after the built-in behavior of an event.
pub type Hook = Arc<dyn Fn(&Field) + Send + Sync>;

/// Replaces the built-in behavior of an event.
pub type Handler = Arc<dyn Fn(&Field, &InputEvent) + Send + Sync>;

/// Observer callback. Receives the field that owns the observed prop.
pub type ObserverFn = Arc<dyn Fn(&Field, &Change<Value>) + Send + Sync>;

/// Interceptor callback. Returns the change to apply, or `None` to veto.
pub type InterceptorFn = Arc<dyn Fn(&Field, Change<Value>) -> Option<Change<Value>> + Send + Sync>;

/// Declarative observer.
#[derive(Clone)]
pub struct ObserverDef {
    /// Observed prop.
    pub key: Prop,
    /// Path relative to the registering field. `None` observes the field itself.
    pub path: Option<String>,
    pub call: ObserverFn,
}

impl ObserverDef {
    /// Observe `key` on the registering field.
    pub fn new(key: Prop, call: impl Fn(&Field, &Change<Value>) + Send + Sync + 'static) -> Self {
        Self {
            key,
            path: None,
            call: Arc::new(call),
        }
    }

    /// Observe a descendant instead.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Declarative interceptor.
#[derive(Clone)]
pub struct InterceptorDef {
    /// Intercepted prop.
    pub key: Prop,
    /// Path relative to the registering field.
    pub path: Option<String>,
    pub call: InterceptorFn,
}

impl InterceptorDef {
    /// Intercept `key` on the registering field.
    pub fn new(
        key: Prop,
        call: impl Fn(&Field, Change<Value>) -> Option<Change<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            key,
            path: None,
            call: Arc::new(call),
        }
    }

    /// Intercept a descendant instead.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Debug for ObserverDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverDef")
            .field("key", &self.key)
            .field("path", &self.path)
            .finish()
    }
}

impl std::fmt::Debug for InterceptorDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorDef")
            .field("key", &self.key)
            .field("path", &self.path)
            .finish()
    }
}

// =============================================================================
// Disposers
// =============================================================================

/// Subscription kind, which decides the registry key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Observer,
    Interceptor,
}

/// Tree-scoped registry of live subscriptions.
///
/// Entries are keyed `"{prop}@{path}"` for observers and `"${prop}@{path}"`
/// for interceptors. Dropping an entry's subscriptions detaches them.
#[derive(Default)]
pub struct Disposers {
    entries: RwLock<BTreeMap<String, Vec<Subscription>>>,
}

impl std::fmt::Debug for Disposers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposers").field("keys", &self.keys()).finish()
    }
}

impl Disposers {
    /// Registry key for a subscription.
    pub fn key(kind: SubscriptionKind, prop: Prop, path: &str) -> String {
        match kind {
            SubscriptionKind::Observer => format!("{}@{}", prop.key(), path),
            SubscriptionKind::Interceptor => format!("${}@{}", prop.key(), path),
        }
    }

    /// Register a subscription.
    pub fn insert(&self, kind: SubscriptionKind, prop: Prop, path: &str, subscription: Subscription) {
        let key = Self::key(kind, prop, path);
        if let Ok(mut entries) = self.entries.write() {
            entries.entry(key).or_default().push(subscription);
        }
    }

    /// All registry keys.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of live subscriptions.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Whether no subscription is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove one key. Returns the number of subscriptions dropped.
    pub fn dispose_key(&self, key: &str) -> usize {
        self.entries
            .write()
            .ok()
            .and_then(|mut entries| entries.remove(key))
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Remove every entry whose path is `root` or lies below it. An empty root
    /// removes everything.
    ///
    /// Returns the number of subscriptions dropped.
    pub fn dispose_subtree(&self, root: &str) -> usize {
        let removed: Vec<Vec<Subscription>> = match self.entries.write() {
            Ok(mut entries) => {
                let keys: Vec<String> = entries
                    .keys()
                    .filter(|key| under(entry_path(key), root))
                    .cloned()
                    .collect();
                keys.iter().filter_map(|key| entries.remove(key)).collect()
            }
            Err(_) => return 0,
        };
        let count = removed.iter().map(Vec::len).sum();
        // detach outside the registry lock
        drop(removed);
        debug!("disposed {count} subscriptions under '{root}'");
        count
    }

    /// Number of subscriptions registered under `root`.
    pub fn count_subtree(&self, root: &str) -> usize {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(key, _)| under(entry_path(key), root))
                    .map(|(_, subs)| subs.len())
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Drop everything.
    pub fn clear(&self) -> usize {
        self.dispose_subtree("")
    }
}

fn entry_path(key: &str) -> &str {
    key.split_once('@').map(|(_, path)| path).unwrap_or_default()
}

fn under(path: &str, root: &str) -> bool {
    root.is_empty()
        || path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('.'))
}
