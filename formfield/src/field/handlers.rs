use std::collections::BTreeMap;
use std::sync::Arc;

use log::trace;

use crate::bindings::BindProps;
use crate::events::{FieldEvent, Handler, Hook, InputEvent};
use crate::value::Value;

use super::Field;

/// Element handle that can take or release input focus.
pub trait FocusTarget: Send + Sync {
    fn focus(&self);
    fn blur(&self);
}

impl Field {
    // =========================================================================
    // Input handlers
    // =========================================================================

    /// Commit the value carried by an input event.
    ///
    /// Boolean fields read `checked` from element-style events. File events
    /// are captured as attachments.
    pub fn sync(&self, event: impl Into<InputEvent>) {
        let next = match event.into() {
            InputEvent::Empty | InputEvent::Key(_) => return,
            InputEvent::Value(value) => value,
            InputEvent::Target { value, checked } => {
                if self.is_boolean() {
                    Value::Bool(checked)
                } else {
                    value
                }
            }
            InputEvent::Files(files) => {
                self.inner.files.set(Some(files));
                return;
            }
        };
        self.set_value(next);
    }

    fn is_boolean(&self) -> bool {
        self.inner.kind.get_untracked() == "checkbox"
            || matches!(self.inner.value.get_untracked(), Value::Bool(_))
    }

    /// Change handler. File fields route to [`Field::on_drop`].
    pub fn on_change(&self, event: impl Into<InputEvent>) {
        self.on_sync(event);
    }

    pub fn on_sync(&self, event: impl Into<InputEvent>) {
        let event = event.into();
        if self.inner.kind.get_untracked() == "file" {
            self.on_drop(event);
            return;
        }
        self.exec_handler(FieldEvent::Change, FieldEvent::Sync, &event, |field, event| {
            field.sync(event.clone())
        });
    }

    pub fn on_toggle(&self, event: impl Into<InputEvent>) {
        let event = event.into();
        self.exec_handler(FieldEvent::Toggle, FieldEvent::Toggle, &event, |field, event| {
            field.sync(event.clone())
        });
    }

    pub fn on_focus(&self, event: impl Into<InputEvent>) {
        let event = event.into();
        self.exec_handler(FieldEvent::Focus, FieldEvent::Focus, &event, |field, _| {
            field.inner.focused.set(true);
            field.inner.touched.set(true);
        });
    }

    pub fn on_blur(&self, event: impl Into<InputEvent>) {
        let event = event.into();
        self.exec_handler(FieldEvent::Blur, FieldEvent::Blur, &event, |field, _| {
            field.inner.focused.set(false);
            field.inner.blurred.set(true);
        });
    }

    /// Capture dropped files. A value-carrying event on a file field is
    /// committed as the value.
    pub fn on_drop(&self, event: impl Into<InputEvent>) {
        let event = event.into();
        self.exec_handler(FieldEvent::Drop, FieldEvent::Drop, &event, |field, event| {
            field.sync(event.clone())
        });
    }

    pub fn on_key_down(&self, event: impl Into<InputEvent>) {
        let event = event.into();
        self.exec_handler(FieldEvent::KeyDown, FieldEvent::KeyDown, &event, |_, _| {});
    }

    pub fn on_key_up(&self, event: impl Into<InputEvent>) {
        let event = event.into();
        self.exec_handler(FieldEvent::KeyUp, FieldEvent::KeyUp, &event, |_, _| {});
    }

    /// Run the user handler registered for `event`, or the built-in behavior,
    /// then the `hook`.
    fn exec_handler(
        &self,
        event: FieldEvent,
        hook: FieldEvent,
        input: &InputEvent,
        builtin: impl FnOnce(&Field, &InputEvent),
    ) {
        let handler = self
            .inner
            .handlers
            .read()
            .ok()
            .and_then(|handlers| handlers.get(&event).cloned());
        self.state().scheduler.action(|| {
            match handler {
                Some(handler) => handler(self, input),
                None => builtin(self, input),
            }
            self.exec_hook(hook);
        });
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    /// Run the hook registered for `event`, if any.
    pub fn exec_hook(&self, event: FieldEvent) {
        let hook = self
            .inner
            .hooks
            .read()
            .ok()
            .and_then(|hooks| hooks.get(&event).cloned());
        if let Some(hook) = hook {
            trace!("'{}' hook {event:?}", self.path());
            hook(self);
        }
    }

    pub fn set_hook(&self, event: FieldEvent, hook: impl Fn(&Field) + Send + Sync + 'static) {
        let hook: Hook = Arc::new(hook);
        if let Ok(mut hooks) = self.inner.hooks.write() {
            hooks.insert(event, hook);
        }
    }

    pub fn set_handler(
        &self,
        event: FieldEvent,
        handler: impl Fn(&Field, &InputEvent) + Send + Sync + 'static,
    ) {
        let handler: Handler = Arc::new(handler);
        if let Ok(mut handlers) = self.inner.handlers.write() {
            handlers.insert(event, handler);
        }
    }

    /// Fire the `Change` hook whenever the own change counter goes up.
    pub(super) fn observe_change_hook(&self) {
        let weak = self.downgrade();
        let subscription = self.inner.changed.observe(move |change| {
            if change.new > change.old && change.new > 0 {
                if let Some(field) = Field::upgrade(&weak) {
                    field.exec_hook(FieldEvent::Change);
                }
            }
        });
        self.watch(subscription);
    }

    // =========================================================================
    // Bindings and focus target
    // =========================================================================

    /// Property bag for an input element, using this field's template.
    pub fn bind(&self) -> BindProps {
        self.bind_with(BTreeMap::new())
    }

    /// Like [`Field::bind`], with extra props that override computed ones.
    pub fn bind_with(&self, extra: BTreeMap<String, Value>) -> BindProps {
        let template = self.inner.bindings.get_untracked();
        self.state().bindings().load(self, &template, extra)
    }

    pub fn focus_target(&self) -> Option<Arc<dyn FocusTarget>> {
        self.inner
            .focus_target
            .read()
            .ok()
            .and_then(|target| target.clone())
    }

    /// Attach or detach the element handle used by `focus`/`blur`.
    pub fn set_focus_target(&self, target: Option<Arc<dyn FocusTarget>>) {
        if let Ok(mut slot) = self.inner.focus_target.write() {
            *slot = target;
        }
    }
}
