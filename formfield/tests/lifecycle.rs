//! Tests for clear, reset, focus and blur.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use formfield::prelude::*;

#[derive(Default)]
struct Element {
    focused: AtomicUsize,
    blurred: AtomicUsize,
}

impl FocusTarget for Element {
    fn focus(&self) {
        self.focused.fetch_add(1, Ordering::SeqCst);
    }

    fn blur(&self) {
        self.blurred.fetch_add(1, Ordering::SeqCst);
    }
}

fn form(fields: Vec<FieldDef>) -> Form {
    fields
        .into_iter()
        .fold(
            Form::builder().options(Options::default().validate_on_init(false)),
            FormBuilder::field,
        )
        .build()
        .unwrap()
}

// =============================================================================
// Clear
// =============================================================================

#[test]
fn test_clear_postconditions() {
    let form = form(vec![FieldDef::named("name").value("hello")]);
    let name = form.select("name").unwrap();
    name.focus();
    name.blur();
    name.set_value("world");
    form.settle();

    name.clear(true, true);
    assert_eq!(name.value(), Value::from(""));
    assert!(!name.touched());
    assert!(!name.blurred());
    assert_eq!(name.changed(), 0);
    assert!(!name.is_clearing());
}

#[test]
fn test_clear_uses_type_defaults() {
    let form = form(vec![
        FieldDef::named("terms").kind("checkbox").value(true),
        FieldDef::named("count").kind("number").value(5),
        FieldDef::named("score").value(9),
    ]);

    form.clear();
    assert_eq!(form.select("terms").unwrap().value(), Value::Bool(false));
    assert_eq!(form.select("count").unwrap().value(), Value::Number(0.0));
    assert_eq!(form.select("score").unwrap().value(), Value::Number(0.0));
}

#[test]
fn test_clear_runs_hook() {
    let cleared = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cleared);
    let form = form(vec![FieldDef::named("name").hook(FieldEvent::Clear, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })]);
    let name = form.select("name").unwrap();

    name.clear(false, true);
    name.clear(false, false);
    assert_eq!(cleared.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Reset
// =============================================================================

#[test]
fn test_reset_prefers_distinct_default() {
    let form = form(vec![
        FieldDef::named("color").value("red").default_value("blue"),
        FieldDef::named("size").value("m"),
    ]);
    let color = form.select("color").unwrap();
    let size = form.select("size").unwrap();
    color.set_value("green");
    size.set_value("xl");

    form.reset();
    assert_eq!(color.value(), Value::from("blue"));
    assert_eq!(size.value(), Value::from("m"));
    assert_eq!(color.changed(), 1);
    assert_eq!(size.changed(), 1);
    assert!(size.is_pristine());
    assert!(!color.is_resetting());
}

#[test]
fn test_reset_to_distinct_default_is_dirty() {
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&changes);
    let form = form(vec![
        FieldDef::named("color")
            .value("red")
            .default_value("blue")
            .hook(FieldEvent::Change, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
    ]);
    let color = form.select("color").unwrap();

    color.reset(true, true);
    assert_eq!(color.value(), Value::from("blue"));
    assert_eq!(color.initial(), Value::from("red"));
    assert_eq!(color.changed(), 1);
    assert!(color.is_dirty());
    assert!(!color.is_pristine());
    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert_eq!(form.changed(), 0);
}

#[test]
fn test_reset_does_not_count_as_form_change() {
    let form = form(vec![FieldDef::named("name").value("ada")]);
    let name = form.select("name").unwrap();
    name.set_value("grace");
    assert_eq!(form.changed(), 1);

    name.reset(true, true);
    assert_eq!(name.value(), Value::from("ada"));
    assert_eq!(form.changed(), 1);
}

#[test]
fn test_reset_clears_validation_state() {
    let form = form(vec![FieldDef::named("name")]);
    let name = form.select("name").unwrap();
    name.invalidate("nope", false);
    assert_eq!(name.error().as_deref(), Some("nope"));

    name.reset(true, true);
    assert_eq!(name.error(), None);
    assert_eq!(name.validation_status(), ValidationStatus::Clean);
    assert!(name.is_valid());
}

// =============================================================================
// Focus and blur
// =============================================================================

#[test]
fn test_focus_and_blur_are_idempotent() {
    let form = form(vec![FieldDef::named("name")]);
    let name = form.select("name").unwrap();
    let element = Arc::new(Element::default());
    let target: Arc<dyn FocusTarget> = element.clone();
    name.set_focus_target(Some(target));

    name.focus();
    name.focus();
    assert_eq!(element.focused.load(Ordering::SeqCst), 1);
    assert!(name.focused());
    assert!(name.touched());

    name.blur();
    name.blur();
    assert_eq!(element.blurred.load(Ordering::SeqCst), 1);
    assert!(!name.focused());
    assert!(name.blurred());
}

#[test]
fn test_blur_without_focus_skips_element() {
    let form = form(vec![FieldDef::named("name")]);
    let name = form.select("name").unwrap();
    let element = Arc::new(Element::default());
    let target: Arc<dyn FocusTarget> = element.clone();
    name.set_focus_target(Some(target));

    name.blur();
    assert_eq!(element.blurred.load(Ordering::SeqCst), 0);
    assert!(name.blurred());
}

#[test]
fn test_blur_schedules_validation() {
    let form = Form::builder()
        .options(Options::default().validate_on_init(false))
        .rules(Dvr::new())
        .field(FieldDef::named("email").rules("required|email"))
        .build()
        .unwrap();
    let email = form.select("email").unwrap();

    email.focus();
    email.blur();
    assert_eq!(email.validation_status(), ValidationStatus::Clean);

    form.settle();
    assert_eq!(email.validation_status(), ValidationStatus::Invalid);
    assert_eq!(
        email.error().as_deref(),
        Some("The email field is required.")
    );
}

// =============================================================================
// Hooks
// =============================================================================

#[test]
fn test_init_and_change_hooks() {
    let inits = Arc::new(AtomicUsize::new(0));
    let changes = Arc::new(AtomicUsize::new(0));
    let (i, c) = (Arc::clone(&inits), Arc::clone(&changes));
    let form = form(vec![
        FieldDef::named("name")
            .hook(FieldEvent::Init, move |_| {
                i.fetch_add(1, Ordering::SeqCst);
            })
            .hook(FieldEvent::Change, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
    ]);
    let name = form.select("name").unwrap();
    assert_eq!(inits.load(Ordering::SeqCst), 1);

    name.set_value("a");
    name.set_value("b");
    name.reset(true, false);
    assert_eq!(changes.load(Ordering::SeqCst), 3);
}
