use std::collections::BTreeMap;
use std::sync::Weak;
use std::sync::atomic::Ordering;

use crate::events::{Occurrence, Prop};
use crate::reactive::Computed;
use crate::value::Value;

use super::{Field, FieldInner};

/// Memoized derived state of one field.
pub(super) struct Derived {
    pub(super) value: Computed<Value>,
    pub(super) initial: Computed<Value>,
    pub(super) default: Computed<Value>,
    pub(super) changed: Computed<u64>,
    pub(super) checked: Computed<Option<Value>>,
    pub(super) error: Computed<Option<String>>,
    pub(super) is_empty: Computed<bool>,
    pub(super) is_dirty: Computed<bool>,
    pub(super) is_pristine: Computed<bool>,
    pub(super) is_default: Computed<bool>,
    pub(super) has_error: Computed<bool>,
    pub(super) is_valid: Computed<bool>,
    pub(super) focused: Computed<bool>,
    pub(super) blurred: Computed<bool>,
    pub(super) touched: Computed<bool>,
    pub(super) deleted: Computed<bool>,
}

fn derive<T>(weak: &Weak<FieldInner>, f: fn(&Field) -> T) -> Computed<T>
where
    T: Clone + PartialEq + Default + Send + Sync + 'static,
{
    let weak = weak.clone();
    Computed::new(move || match Field::upgrade(&weak) {
        Some(field) => f(&field),
        None => T::default(),
    })
}

impl Derived {
    pub(super) fn new(weak: &Weak<FieldInner>) -> Self {
        Self {
            value: derive(weak, Field::compute_value),
            initial: derive(weak, Field::compute_initial),
            default: derive(weak, Field::compute_default),
            changed: derive(weak, Field::compute_changed),
            checked: derive(weak, Field::compute_checked),
            error: derive(weak, Field::compute_error),
            is_empty: derive(weak, Field::compute_is_empty),
            is_dirty: derive(weak, Field::compute_is_dirty),
            is_pristine: derive(weak, Field::compute_is_pristine),
            is_default: derive(weak, Field::compute_is_default),
            has_error: derive(weak, Field::compute_has_error),
            is_valid: derive(weak, Field::compute_is_valid),
            focused: derive(weak, |f| f.flag(Prop::Focused)),
            blurred: derive(weak, |f| f.flag(Prop::Blurred)),
            touched: derive(weak, |f| f.flag(Prop::Touched)),
            deleted: derive(weak, |f| f.flag(Prop::Deleted)),
        }
    }
}

impl Field {
    // =========================================================================
    // Status
    // =========================================================================

    /// Whether the field is empty. A container is empty if any child is.
    pub fn is_empty(&self) -> bool {
        self.inner.derived.is_empty.get()
    }

    /// Whether the value moved away from the initial snapshot.
    pub fn is_dirty(&self) -> bool {
        self.inner.derived.is_dirty.get()
    }

    /// Whether the value still equals the initial snapshot.
    pub fn is_pristine(&self) -> bool {
        self.inner.derived.is_pristine.get()
    }

    /// Whether the value equals the default snapshot.
    pub fn is_default(&self) -> bool {
        self.inner.derived.is_default.get()
    }

    /// Whether this field or a descendant carries an error.
    pub fn has_error(&self) -> bool {
        self.inner.derived.has_error.get()
    }

    /// Whether this field and every descendant are free of errors.
    pub fn is_valid(&self) -> bool {
        self.inner.derived.is_valid.get()
    }

    /// The visible error: the async error if set, else the sync error.
    /// `None` while errors are hidden.
    pub fn error(&self) -> Option<String> {
        self.inner.derived.error.get()
    }

    pub fn focused(&self) -> bool {
        self.inner.derived.focused.get()
    }

    pub fn blurred(&self) -> bool {
        self.inner.derived.blurred.get()
    }

    pub fn touched(&self) -> bool {
        self.inner.derived.touched.get()
    }

    /// Whether the field is flagged deleted. A container is deleted if any
    /// child is.
    pub fn deleted(&self) -> bool {
        self.inner.derived.deleted.get()
    }

    /// Fold a boolean prop over the children.
    ///
    /// Soft-deleted children are skipped unless the prop is `deleted` itself.
    /// With no children, `Some` yields `false` and `Every` yields `true`.
    pub fn check(&self, prop: Prop, occurrence: Occurrence) -> bool {
        let children = if prop == Prop::Deleted {
            self.inner.fields.get()
        } else {
            self.visible_children()
        };
        let mut flags = children.iter().map(|child| child.get(prop).is_truthy());
        match occurrence {
            Occurrence::Some => flags.any(|f| f),
            Occurrence::Every => flags.all(|f| f),
        }
    }

    /// Whether this field has nested fields.
    pub fn has_nested_fields(&self) -> bool {
        !self.inner.fields.get().is_empty()
    }

    /// Whether the children are keyed `0..n`.
    pub fn is_incremental(&self) -> bool {
        self.inner.incremental.load(Ordering::SeqCst)
    }

    /// Children that count toward aggregates.
    pub(crate) fn visible_children(&self) -> Vec<Field> {
        let fields = self.inner.fields.get();
        if !self.options().soft_delete {
            return fields;
        }
        fields.into_iter().filter(|child| !child.deleted()).collect()
    }

    /// Own validation errors, ignoring whether they are shown.
    pub(crate) fn has_own_errors(&self) -> bool {
        let inner = &self.inner;
        inner
            .async_data
            .get()
            .is_some_and(|data| !data.valid)
            || !inner.error_stack.with(Vec::is_empty)
            || inner.error_async.get().is_some()
            || inner.error_sync.get().is_some()
    }

    /// The first own error message, shown or not.
    pub(crate) fn own_error_message(&self) -> Option<String> {
        let inner = &self.inner;
        inner
            .error_async
            .get_untracked()
            .or_else(|| inner.error_sync.get_untracked())
            .or_else(|| inner.error_stack.with(|stack| stack.first().cloned()))
            .or_else(|| {
                inner
                    .async_data
                    .get_untracked()
                    .filter(|data| !data.valid)
                    .map(|data| data.message)
            })
    }

    fn aggregate(&self, read: impl Fn(&Field) -> Value) -> Value {
        let children = self.visible_children();
        if self.is_incremental() || crate::parser::is_array(self.state().structure(), self.path()) {
            Value::List(children.iter().map(read).collect())
        } else {
            Value::Map(
                children
                    .iter()
                    .map(|child| (child.key().to_string(), read(child)))
                    .collect::<BTreeMap<_, _>>(),
            )
        }
    }

    pub(super) fn aggregate_output(&self) -> Value {
        self.aggregate(Field::output)
    }

    // =========================================================================
    // Compute functions
    // =========================================================================

    fn compute_value(&self) -> Value {
        if self.has_nested_fields() {
            self.aggregate(Field::value)
        } else {
            self.inner.value.get()
        }
    }

    fn compute_initial(&self) -> Value {
        if self.has_nested_fields() {
            self.aggregate(Field::initial)
        } else {
            self.inner.initial.get()
        }
    }

    fn compute_default(&self) -> Value {
        if self.has_nested_fields() {
            self.aggregate(Field::default)
        } else {
            self.inner.default.get()
        }
    }

    fn compute_changed(&self) -> u64 {
        if self.has_nested_fields() {
            self.visible_children().iter().map(Field::changed).sum()
        } else {
            self.inner.changed.get()
        }
    }

    fn compute_checked(&self) -> Option<Value> {
        (self.inner.kind.get() == "checkbox").then(|| self.value())
    }

    fn compute_error(&self) -> Option<String> {
        if !self.inner.show_error.get() {
            return None;
        }
        self.inner
            .error_async
            .get()
            .or_else(|| self.inner.error_sync.get())
    }

    fn compute_is_empty(&self) -> bool {
        if self.has_nested_fields() {
            return self.check(Prop::IsEmpty, Prop::IsEmpty.occurrence());
        }
        match &self.inner.value.get() {
            Value::Bool(on) => *on,
            Value::Number(_) | Value::Date(_) => false,
            other => other.is_blank(),
        }
    }

    /// The value the counters compare against `initial`: while nothing was
    /// committed the field counts as untouched.
    fn compared_value(&self, initial: &Value) -> Value {
        if self.changed() > 0 {
            self.value()
        } else {
            initial.clone()
        }
    }

    fn compute_is_dirty(&self) -> bool {
        let initial = self.initial();
        !initial.is_null() && self.compared_value(&initial) != initial
    }

    fn compute_is_pristine(&self) -> bool {
        let initial = self.initial();
        !initial.is_null() && self.compared_value(&initial) == initial
    }

    fn compute_is_default(&self) -> bool {
        let default = self.default();
        !default.is_null() && self.value() == default
    }

    fn compute_has_error(&self) -> bool {
        self.has_own_errors() || self.check(Prop::HasError, Prop::HasError.occurrence())
    }

    fn compute_is_valid(&self) -> bool {
        !self.has_own_errors() && self.check(Prop::IsValid, Prop::IsValid.occurrence())
    }

    fn flag(&self, prop: Prop) -> bool {
        if self.has_nested_fields() {
            return self.check(prop, prop.occurrence());
        }
        let cell = match prop {
            Prop::Focused => &self.inner.focused,
            Prop::Blurred => &self.inner.blurred,
            Prop::Touched => &self.inner.touched,
            _ => &self.inner.deleted,
        };
        cell.get()
    }
}
