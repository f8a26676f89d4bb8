use std::sync::atomic::Ordering;

use log::{debug, warn};

use crate::error::ConfigError;
use crate::events::FieldEvent;
use crate::parser;
use crate::value::Value;

use super::{Field, ValidateOptions};

impl Field {
    // =========================================================================
    // Clear / reset
    // =========================================================================

    /// Set the value to its type-appropriate empty value and reset the
    /// interaction flags. `deep` clears the descendants too.
    pub fn clear(&self, deep: bool, exec_hook: bool) {
        self.state().scheduler.action(|| {
            if exec_hook {
                self.exec_hook(FieldEvent::Clear);
            }
            self.inner.clearing.store(true, Ordering::SeqCst);
            self.reset_flags();

            let options = self.options();
            let kind = self.inner.kind.get_untracked();
            let current = self.inner.value.get_untracked();
            self.inner
                .value
                .set(parser::default_value(&kind, &current, &options.fallback_value));

            if deep {
                for child in self.inner.fields.get_untracked() {
                    child.clear(deep, true);
                }
            }

            if options.validate_on_clear {
                self.validate_with(ValidateOptions::show_errors(options.show_errors_on_clear));
            } else {
                self.reset_validation(deep);
            }
            self.defer_flag_reset();
        });
    }

    /// Restore the default value when it differs from the initial one, else
    /// the initial value. `deep` resets the descendants too.
    pub fn reset(&self, deep: bool, exec_hook: bool) {
        self.state().scheduler.action(|| {
            if exec_hook {
                self.exec_hook(FieldEvent::Reset);
            }
            self.inner.resetting.store(true, Ordering::SeqCst);
            self.reset_flags();

            if !self.has_nested_fields() {
                let default = self.inner.default.get_untracked();
                let initial = self.inner.initial.get_untracked();
                self.commit(if default != initial { default } else { initial });
            }

            if deep {
                for child in self.inner.fields.get_untracked() {
                    child.reset(deep, true);
                }
            }

            let options = self.options();
            if options.validate_on_reset {
                self.validate_with(ValidateOptions::show_errors(options.show_errors_on_reset));
            } else {
                self.reset_validation(deep);
            }
            self.defer_flag_reset();
        });
    }

    fn reset_flags(&self) {
        let inner = &self.inner;
        inner.touched.set(false);
        inner.blurred.set(false);
        inner.changed.set(0);
        inner.files.set(None);
    }

    // =========================================================================
    // Focus
    // =========================================================================

    /// Focus the field. The attached element is focused only if the field
    /// was not focused already.
    pub fn focus(&self) {
        self.state().scheduler.action(|| {
            if let Some(target) = self.focus_target() {
                if !self.inner.focused.get_untracked() {
                    target.focus();
                }
            }
            self.inner.focused.set(true);
            self.inner.touched.set(true);
        });
    }

    /// Blur the field. The attached element is blurred only if the field was
    /// focused.
    pub fn blur(&self) {
        self.state().scheduler.action(|| {
            if let Some(target) = self.focus_target() {
                if self.inner.focused.get_untracked() {
                    target.blur();
                }
            }
            self.inner.focused.set(false);
            self.inner.blurred.set(true);
        });
    }

    /// Trim a text value in place. Counters are left alone.
    pub fn trim(&self) {
        if let Value::Text(text) = self.inner.value.get_untracked() {
            self.inner.value.set(Value::Text(text.trim().to_string()));
        }
    }

    // =========================================================================
    // Nested fields
    // =========================================================================

    /// Direct children in order.
    pub fn fields(&self) -> Vec<Field> {
        self.inner.fields.get()
    }

    /// Number of direct children.
    pub fn nested_len(&self) -> usize {
        self.inner.fields.with(Vec::len)
    }

    /// Direct child by key.
    pub fn child(&self, key: &str) -> Option<Field> {
        self.inner
            .fields
            .with(|fields| fields.iter().find(|f| f.key() == key).cloned())
    }

    /// Descendant by dot or bracket path, relative to this field.
    pub fn select(&self, path: &str) -> crate::Result<Field> {
        let normalized = parser::parse_path(path);
        let mut current = self.clone();
        for segment in normalized.split('.').filter(|s| !s.is_empty()) {
            current = current.child(segment).ok_or_else(|| {
                ConfigError::not_found(parser::join(self.path(), &normalized))
            })?;
        }
        Ok(current)
    }

    /// Field by absolute path from the form root.
    pub fn lookup(&self, path: &str) -> Option<Field> {
        self.state().select(path)
    }

    /// Visit every descendant, depth first, parents before children.
    pub fn each(&self, f: &mut dyn FnMut(&Field)) {
        for child in self.inner.fields.get_untracked() {
            f(&child);
            child.each(f);
        }
    }

    /// Bulk update.
    ///
    /// `values` must be a map. A plain field without `fallback` takes it as its
    /// value; otherwise entries are routed to the children by key, creating
    /// the missing ones when `fallback` is on or the field is an array.
    pub fn update(&self, values: impl Into<Value>) -> crate::Result<()> {
        let values = values.into();
        if !matches!(values, Value::Map(_)) {
            warn!("update of '{}' with a {} value", self.path(), values.type_name());
            return Err(ConfigError::UpdateRequiresObject {
                found: values.type_name(),
            });
        }
        self.state().scheduler.action(|| {
            let array = parser::is_array(self.state().structure(), self.path());
            if !self.options().fallback && !self.has_nested_fields() && !array {
                self.commit(values);
                return Ok(());
            }
            self.update_children(&values)
        })
    }

    /// Whether `update` routes values to children.
    pub(crate) fn is_container(&self) -> bool {
        self.has_nested_fields() || parser::is_array(self.state().structure(), self.path())
    }

    pub(crate) fn update_children(&self, values: &Value) -> crate::Result<()> {
        let array = parser::is_array(self.state().structure(), self.path());
        let entries: Vec<(String, Value)> = match values {
            Value::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            other => {
                self.commit(other.clone());
                return Ok(());
            }
        };

        if let (true, Value::List(items)) = (array, values) {
            let surplus: Vec<Field> = self
                .inner
                .fields
                .get_untracked()
                .into_iter()
                .filter(|f| f.key().parse::<usize>().is_ok_and(|i| i >= items.len()))
                .collect();
            for field in surplus {
                self.remove_child(&field);
            }
        }

        for (key, value) in entries {
            match self.child(&key) {
                Some(child) => {
                    let nested = child.has_nested_fields()
                        || (matches!(value, Value::Map(_) | Value::List(_))
                            && parser::is_array(self.state().structure(), child.path()));
                    if nested {
                        child.update_children(&value)?;
                    } else {
                        child.commit(value);
                    }
                }
                None if array || self.options().fallback => {
                    self.add(Some(value), Some(&key))?;
                }
                None => {
                    debug!("update of '{}' skipped unknown key '{key}'", self.path());
                }
            }
        }
        Ok(())
    }

    fn next_index(&self) -> String {
        self.inner
            .fields
            .with(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f.key().parse::<usize>().ok())
                    .max()
                    .map_or(0, |n| n + 1)
            })
            .to_string()
    }

    /// Add a child. Without `key` the next numeric index is used. The child's
    /// nested fields come from the schema and from `value`.
    pub fn add(&self, value: Option<Value>, key: Option<&str>) -> crate::Result<Field> {
        let key = key.map_or_else(|| self.next_index(), str::to_string);
        let state = self.state().clone();
        state.scheduler.action(|| {
            if let Some(existing) = self.child(&key) {
                self.remove_child(&existing);
            }
            let child = state.build_child(self.path(), &key, None, value, true)?;
            self.inner.fields.update(|fields| fields.push(child.clone()));
            let incremental = self.inner.fields.with(|f| f.iter().all(|c| parser::is_index(c.key())));
            self.inner.incremental.store(incremental, Ordering::SeqCst);
            debug!("added '{}'", child.path());
            Ok(child)
        })
    }

    /// Delete a descendant by relative path.
    ///
    /// With `soft_delete` the field and its descendants are only flagged;
    /// otherwise the field is disposed and removed.
    pub fn del(&self, path: &str) -> crate::Result<()> {
        let normalized = parser::parse_path(path);
        let (parent, key) = match normalized.rsplit_once('.') {
            Some((parent, key)) => (self.select(parent)?, key.to_string()),
            None => (self.clone(), normalized.clone()),
        };
        let target = parent
            .child(&key)
            .ok_or_else(|| ConfigError::not_found(parser::join(self.path(), &normalized)))?;

        self.state().scheduler.action(|| {
            if target.options().soft_delete {
                target.mark_deleted();
                debug!("soft-deleted '{}'", target.path());
            } else {
                parent.remove_child(&target);
                debug!("deleted '{}'", target.path());
            }
        });
        Ok(())
    }

    fn remove_child(&self, child: &Field) {
        child.remove();
        self.inner.fields.update(|fields| fields.retain(|f| f != child));
    }

    /// Flag this field and its descendants deleted.
    pub(crate) fn mark_deleted(&self) {
        self.inner.deleted.set(true);
        self.each(&mut |f| {
            f.inner.deleted.set(true);
        });
    }

    /// Dispose and tear down before removal from the parent.
    pub(crate) fn remove(&self) {
        self.dispose();
        self.teardown();
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Drop every registered observer and interceptor on this field and its
    /// descendants, and cancel their pending validations. Returns the number
    /// of subscriptions dropped.
    pub fn dispose(&self) -> usize {
        let scheduler = &self.state().scheduler;
        scheduler.cancel(self.id());
        self.each(&mut |f| {
            scheduler.cancel(f.id());
        });
        self.state().disposers.dispose_subtree(self.path())
    }

    /// Detach everything this field holds so it can be dropped.
    pub(crate) fn teardown(&self) {
        let inner = &self.inner;
        inner.state.scheduler.cancel(&inner.id);
        if let Ok(mut watchers) = inner.watchers.lock() {
            watchers.clear();
        }
        if let Ok(mut hooks) = inner.hooks.write() {
            hooks.clear();
        }
        if let Ok(mut handlers) = inner.handlers.write() {
            handlers.clear();
        }
        if let Ok(mut target) = inner.focus_target.write() {
            *target = None;
        }
        for child in inner.fields.get_untracked() {
            child.teardown();
        }
        inner.fields.set(Vec::new());
    }
}
