use std::sync::Weak;

use log::trace;

use crate::error::ConfigError;
use crate::events::{
    InterceptorDef, InterceptorFn, ObserverDef, ObserverFn, Occurrence, Prop, PropValue,
    SubscriptionKind,
};
use crate::reactive::{Change, Observable, Subscription};
use crate::value::Value;

use super::{Field, FieldInner};

/// Run `$body` with `$cell` bound to the writable cell behind `$prop`.
/// Derived and container-only props yield `UnknownProp`.
macro_rules! with_cell {
    ($inner:expr, $prop:expr, |$cell:ident| $body:expr) => {
        match $prop {
            Prop::Value => { let $cell = &$inner.value; Ok($body) }
            Prop::Initial => { let $cell = &$inner.initial; Ok($body) }
            Prop::Default => { let $cell = &$inner.default; Ok($body) }
            Prop::Type => { let $cell = &$inner.kind; Ok($body) }
            Prop::Label => { let $cell = &$inner.label; Ok($body) }
            Prop::Placeholder => { let $cell = &$inner.placeholder; Ok($body) }
            Prop::Disabled => { let $cell = &$inner.disabled; Ok($body) }
            Prop::Related => { let $cell = &$inner.related; Ok($body) }
            Prop::Rules => { let $cell = &$inner.rules; Ok($body) }
            Prop::Extra => { let $cell = &$inner.extra; Ok($body) }
            Prop::Bindings => { let $cell = &$inner.bindings; Ok($body) }
            Prop::AutoFocus => { let $cell = &$inner.auto_focus; Ok($body) }
            Prop::InputMode => { let $cell = &$inner.input_mode; Ok($body) }
            Prop::Focused => { let $cell = &$inner.focused; Ok($body) }
            Prop::Blurred => { let $cell = &$inner.blurred; Ok($body) }
            Prop::Touched => { let $cell = &$inner.touched; Ok($body) }
            Prop::Deleted => { let $cell = &$inner.deleted; Ok($body) }
            Prop::ShowError => { let $cell = &$inner.show_error; Ok($body) }
            Prop::Changed => { let $cell = &$inner.changed; Ok($body) }
            Prop::ErrorSync => { let $cell = &$inner.error_sync; Ok($body) }
            Prop::ErrorAsync => { let $cell = &$inner.error_async; Ok($body) }
            other => Err(ConfigError::UnknownProp {
                key: other.key().to_string(),
            }),
        }
    };
}

fn observe_cell<T: PropValue>(
    cell: &Observable<T>,
    weak: Weak<FieldInner>,
    call: ObserverFn,
) -> Subscription {
    cell.observe(move |change: &Change<T>| {
        if let Some(field) = Field::upgrade(&weak) {
            call(&field, &change.clone().map(T::into_value));
        }
    })
}

fn intercept_cell<T: PropValue>(
    cell: &Observable<T>,
    weak: Weak<FieldInner>,
    call: InterceptorFn,
) -> Subscription {
    cell.intercept(move |change: Change<T>| match Field::upgrade(&weak) {
        Some(field) => call(&field, change.map(T::into_value)).map(|c| c.map(T::from_value)),
        None => Some(change),
    })
}

fn keys(fields: &[Field]) -> Value {
    fields.iter().map(|f| Value::from(f.key())).collect()
}

impl Field {
    /// Read a prop by key.
    pub fn get(&self, prop: Prop) -> Value {
        match prop {
            Prop::Value => self.value(),
            Prop::Initial => self.initial(),
            Prop::Default => self.default(),
            Prop::Changed => Value::from(self.changed()),
            Prop::Focused => Value::from(self.focused()),
            Prop::Blurred => Value::from(self.blurred()),
            Prop::Touched => Value::from(self.touched()),
            Prop::Deleted => Value::from(self.deleted()),
            Prop::Fields => keys(&self.inner.fields.get()),
            Prop::Checked => self.checked().unwrap_or(Value::Null),
            Prop::Error => Value::from(self.error()),
            Prop::IsValid => Value::from(self.is_valid()),
            Prop::HasError => Value::from(self.has_error()),
            Prop::IsDirty => Value::from(self.is_dirty()),
            Prop::IsPristine => Value::from(self.is_pristine()),
            Prop::IsDefault => Value::from(self.is_default()),
            Prop::IsEmpty => Value::from(self.is_empty()),
            Prop::Disabled if self.has_nested_fields() => {
                Value::from(self.check(Prop::Disabled, Occurrence::Every))
            }
            other => with_cell!(self.inner, other, |cell| cell.get().into_value())
                .unwrap_or(Value::Null),
        }
    }

    /// Write a prop by key.
    ///
    /// `value` goes through the input pipeline, `initial`/`default` are
    /// normalized and `rules` are checked against the rule engine. Derived
    /// props cannot be written.
    pub fn set(&self, prop: Prop, value: impl Into<Value>) -> crate::Result<()> {
        let value = value.into();
        match prop {
            Prop::Value => self.set_value(value),
            Prop::Initial => self.set_initial(value),
            Prop::Default => self.set_default(value),
            Prop::Rules => self.set_rules(<Option<String>>::from_value(value))?,
            other => {
                self.state()
                    .scheduler
                    .action(|| with_cell!(self.inner, other, |cell| {
                        cell.set(PropValue::from_value(value));
                    }))?;
            }
        }
        Ok(())
    }

    /// Register an observer on this field or a descendant (`def.path`,
    /// relative). The subscription lives in the form's disposer registry.
    ///
    /// Observing `fields` reports the list of child keys.
    pub fn observe(&self, def: ObserverDef) -> crate::Result<()> {
        let target = match &def.path {
            Some(path) => self.select(path)?,
            None => self.clone(),
        };
        let weak = target.downgrade();
        let subscription = match def.key {
            Prop::Fields => {
                let call = def.call.clone();
                target.inner.fields.observe(move |change| {
                    if let Some(field) = Field::upgrade(&weak) {
                        call(&field, &Change {
                            old: keys(&change.old),
                            new: keys(&change.new),
                        });
                    }
                })
            }
            key => with_cell!(target.inner, key, |cell| observe_cell(cell, weak, def.call.clone()))?,
        };
        trace!("observer on {}@{}", def.key, target.path());
        self.state()
            .disposers
            .insert(SubscriptionKind::Observer, def.key, target.path(), subscription);
        Ok(())
    }

    /// Register an interceptor on this field or a descendant (`def.path`,
    /// relative). On `fields` an interceptor can only veto.
    pub fn intercept(&self, def: InterceptorDef) -> crate::Result<()> {
        let target = match &def.path {
            Some(path) => self.select(path)?,
            None => self.clone(),
        };
        let weak = target.downgrade();
        let subscription = match def.key {
            Prop::Fields => {
                let call = def.call.clone();
                target.inner.fields.intercept(move |change| {
                    let Some(field) = Field::upgrade(&weak) else {
                        return Some(change);
                    };
                    let proposed = Change {
                        old: keys(&change.old),
                        new: keys(&change.new),
                    };
                    call(&field, proposed).map(|_| change)
                })
            }
            key => with_cell!(target.inner, key, |cell| intercept_cell(cell, weak, def.call.clone()))?,
        };
        trace!("interceptor on ${}@{}", def.key, target.path());
        self.state()
            .disposers
            .insert(SubscriptionKind::Interceptor, def.key, target.path(), subscription);
        Ok(())
    }
}
