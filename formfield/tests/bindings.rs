//! Tests for binding templates and input handlers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use formfield::prelude::*;

fn material() -> Rewriter {
    BTreeMap::from([
        ("value".to_string(), "defaultValue".to_string()),
        ("label".to_string(), "floatingLabelText".to_string()),
        ("onChange".to_string(), "onInput".to_string()),
    ])
}

fn form(field: FieldDef) -> Form {
    Form::builder()
        .options(Options::default().validate_on_init(false))
        .template("MaterialTextField", material())
        .field(field)
        .build()
        .unwrap()
}

// =============================================================================
// Templates
// =============================================================================

#[test]
fn test_default_template() {
    let form = form(
        FieldDef::named("email")
            .label("Email")
            .placeholder("you@example.com")
            .value("ada@example.com"),
    );
    let email = form.select("email").unwrap();
    let props = email.bind();

    assert_eq!(props.get("id"), Some(&Value::from(email.id())));
    assert_eq!(props.get("name"), Some(&Value::from("email")));
    assert_eq!(props.get("type"), Some(&Value::from("text")));
    assert_eq!(props.get("value"), Some(&Value::from("ada@example.com")));
    assert_eq!(props.get("label"), Some(&Value::from("Email")));
    assert_eq!(props.get("placeholder"), Some(&Value::from("you@example.com")));
    assert_eq!(props.get("disabled"), Some(&Value::Bool(false)));
    assert!(props.handlers.contains_key("onChange"));
    assert!(props.handlers.contains_key("onBlur"));
}

#[test]
fn test_custom_template_rewrites_names() {
    let form = form(
        FieldDef::named("email")
            .label("Email")
            .value("ada@example.com")
            .bindings("MaterialTextField"),
    );
    let email = form.select("email").unwrap();
    let props = email.bind();

    assert_eq!(props.get("defaultValue"), Some(&Value::from("ada@example.com")));
    assert_eq!(props.get("floatingLabelText"), Some(&Value::from("Email")));
    assert_eq!(props.get("value"), None);
    assert_eq!(props.get("type"), Some(&Value::from("text")));

    assert!(props.call("onInput", "grace@example.com"));
    assert!(!props.call("onChange", "lost"));
    assert_eq!(email.value(), Value::from("grace@example.com"));
}

#[test]
fn test_extra_props_override() {
    let form = form(FieldDef::named("email").placeholder("you@example.com"));
    let email = form.select("email").unwrap();

    let props = email.bind_with(BTreeMap::from([
        ("placeholder".to_string(), Value::from("override")),
        ("data-test".to_string(), Value::from("email-input")),
    ]));
    assert_eq!(props.get("placeholder"), Some(&Value::from("override")));
    assert_eq!(props.get("data-test"), Some(&Value::from("email-input")));
}

#[test]
fn test_unknown_template_falls_back_to_default() {
    let form = form(FieldDef::named("email").bindings("Missing"));
    let props = form.select("email").unwrap().bind();

    assert!(props.get("value").is_some());
    assert_eq!(form.state().bindings().names(), vec!["MaterialTextField", "default"]);
}

#[test]
fn test_bound_handlers_drive_focus() {
    #[derive(Default)]
    struct Element(AtomicUsize);

    impl FocusTarget for Element {
        fn focus(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn blur(&self) {}
    }

    let form = form(FieldDef::named("email"));
    let email = form.select("email").unwrap();
    let props = email.bind();
    let element = Arc::new(Element::default());
    props.set_ref(element.clone());

    props.call("onFocus", InputEvent::Empty);
    assert!(email.focused());
    assert!(email.touched());

    props.call("onBlur", InputEvent::Empty);
    assert!(email.blurred());

    email.focus();
    assert_eq!(element.0.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Handlers
// =============================================================================

#[test]
fn test_on_change_with_element_event() {
    let form = form(FieldDef::named("terms").kind("checkbox"));
    let terms = form.select("terms").unwrap();

    terms.on_change(InputEvent::Target {
        value: Value::from("on"),
        checked: true,
    });
    assert_eq!(terms.value(), Value::Bool(true));
    assert_eq!(terms.checked(), Some(Value::Bool(true)));

    terms.on_toggle(InputEvent::Target {
        value: Value::from("on"),
        checked: false,
    });
    assert_eq!(terms.value(), Value::Bool(false));
}

#[test]
fn test_file_fields_capture_attachments() {
    let drops = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&drops);
    let form = form(
        FieldDef::named("avatar")
            .kind("file")
            .hook(FieldEvent::Drop, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
    );
    let avatar = form.select("avatar").unwrap();
    let files = vec![FileAttachment {
        name: "me.png".to_string(),
        size: 2048,
        mime: Some("image/png".to_string()),
    }];

    avatar.on_sync(InputEvent::Files(files.clone()));
    assert_eq!(avatar.files(), Some(files));
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    avatar.clear(true, true);
    assert_eq!(avatar.files(), None);
}

#[test]
fn test_user_handler_replaces_builtin() {
    let form = form(
        FieldDef::named("name").handler(FieldEvent::Change, |field, event| {
            if let InputEvent::Value(value) = event {
                field.set_value(value.to_text().to_uppercase());
            }
        }),
    );
    let name = form.select("name").unwrap();

    name.on_change("ada");
    assert_eq!(name.value(), Value::from("ADA"));
}

#[test]
fn test_key_handlers_run_hooks() {
    let keys = Arc::new(AtomicUsize::new(0));
    let (down, up) = (Arc::clone(&keys), Arc::clone(&keys));
    let form = form(
        FieldDef::named("search")
            .hook(FieldEvent::KeyDown, move |_| {
                down.fetch_add(1, Ordering::SeqCst);
            })
            .hook(FieldEvent::KeyUp, move |_| {
                up.fetch_add(1, Ordering::SeqCst);
            }),
    );
    let search = form.select("search").unwrap();

    search.on_key_down(InputEvent::Key("Enter".to_string()));
    search.on_key_up(InputEvent::Key("Enter".to_string()));
    assert_eq!(keys.load(Ordering::SeqCst), 2);
    assert_eq!(search.value(), Value::from(""));
}
