//! Tests for validation: backends, ordering, error surfaces and submission.

use formfield::prelude::*;

fn signup() -> Form {
    Form::builder()
        .options(Options::default().validate_on_init(false))
        .rules(Dvr::new())
        .field(FieldDef::named("email").rules("required|email"))
        .field(FieldDef::named("password").rules("required|min:8"))
        .build()
        .unwrap()
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_rules_without_engine_fail_at_build() {
    let err = Form::builder()
        .name("signup")
        .field(FieldDef::named("email").rules("required"))
        .build()
        .unwrap_err();
    match err {
        ConfigError::MissingRuleEngine { path } => assert_eq!(path, "signup/email"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_validators_without_engine_fail_at_build() {
    let err = Form::builder()
        .field(FieldDef::named("email").validator(checks::required("Required")))
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingFunctionEngine { .. }));
}

#[test]
fn test_unknown_rule_fails_at_build() {
    let err = Form::builder()
        .rules(Dvr::new())
        .field(FieldDef::named("email").rules("required|shiny"))
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRule { .. }));
}

#[test]
fn test_set_rules_checks_engine() {
    let form = Form::builder()
        .options(Options::default().validate_on_init(false))
        .field(FieldDef::named("email"))
        .build()
        .unwrap();
    let email = form.select("email").unwrap();

    let err = email.set_rules(Some("required".to_string())).unwrap_err();
    assert!(matches!(err, ConfigError::MissingRuleEngine { .. }));
    assert_eq!(email.rules(), None);
}

#[test]
fn test_empty_validator_list_needs_engine() {
    let err = Form::builder()
        .field(FieldDef {
            validators: Some(Vec::new()),
            ..FieldDef::named("email")
        })
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingFunctionEngine { .. }));

    let form = Form::builder()
        .options(Options::default().validate_on_init(false))
        .field(FieldDef::named("email"))
        .build()
        .unwrap();
    let email = form.select("email").unwrap();

    let err = email.set_validators(Some(Vec::new())).unwrap_err();
    assert!(matches!(err, ConfigError::MissingFunctionEngine { .. }));
    assert!(email.set_validators(None).is_ok());
    assert!(email.validators().is_empty());
}

// =============================================================================
// Rules
// =============================================================================

#[test]
fn test_required_email() {
    let form = signup();
    let email = form.select("email").unwrap();

    let result = email.validate();
    assert!(result.is_invalid());
    assert!(email.has_error());
    assert_eq!(
        email.error().as_deref(),
        Some("The email field is required.")
    );

    email.set_value("not-an-email");
    email.validate();
    assert_eq!(
        email.error().as_deref(),
        Some("The email format is invalid.")
    );

    email.set_value("ada@example.com");
    assert!(email.validate().is_valid());
    assert!(email.is_valid());
    assert_eq!(email.error(), None);
    assert_eq!(email.validation_status(), ValidationStatus::Valid);
}

#[test]
fn test_label_is_used_in_messages() {
    let form = Form::builder()
        .options(Options::default().validate_on_init(false))
        .rules(Dvr::new().message("min.string", ":attribute needs :min characters"))
        .field(
            FieldDef::named("password")
                .label("Password")
                .rules("min:8")
                .value("short"),
        )
        .build()
        .unwrap();
    let password = form.select("password").unwrap();

    password.validate();
    assert_eq!(
        password.error().as_deref(),
        Some("Password needs 8 characters")
    );
}

#[test]
fn test_related_fields_are_validated() {
    let form = Form::builder()
        .options(Options::default().validate_on_init(false))
        .rules(Dvr::new())
        .field(FieldDef::named("password").related(["password_confirm"]))
        .field(FieldDef::named("password_confirm").rules("same:password"))
        .build()
        .unwrap();
    let password = form.select("password").unwrap();
    let confirm = form.select("password_confirm").unwrap();
    password.set_value("secret");
    confirm.set_value("secrets");

    password.validate();
    assert_eq!(
        confirm.error().as_deref(),
        Some("The password confirm and password fields must match.")
    );
}

#[test]
fn test_validate_on_init_hides_errors() {
    let form = Form::builder()
        .rules(Dvr::new())
        .field(FieldDef::named("email").rules("required"))
        .build()
        .unwrap();
    let email = form.select("email").unwrap();

    assert!(email.has_error());
    assert!(!email.is_valid());
    assert_eq!(email.error(), None);

    form.show_errors(true);
    assert_eq!(
        email.error().as_deref(),
        Some("The email field is required.")
    );
}

#[test]
fn test_skips_disabled_fields() {
    let form = Form::builder()
        .options(Options::default().validate_on_init(false))
        .rules(Dvr::new())
        .field(FieldDef::named("email").rules("required").disabled(true))
        .build()
        .unwrap();

    assert!(form.validate().is_valid());
    assert_eq!(
        form.select("email").unwrap().validation_status(),
        ValidationStatus::Clean
    );
}

// =============================================================================
// Functions and ordering
// =============================================================================

fn both(options: OptionsPatch) -> Form {
    Form::builder()
        .options(Options::default().validate_on_init(false))
        .rules(Dvr::new())
        .functions(Vjf::new())
        .field(
            FieldDef::named("name")
                .rules("required")
                .validator(checks::required("Name is required"))
                .options(options),
        )
        .build()
        .unwrap()
}

#[test]
fn test_functions_run_before_rules() {
    let form = both(OptionsPatch::default());
    let name = form.select("name").unwrap();

    name.validate();
    assert_eq!(
        name.validation_error_stack(),
        vec![
            "Name is required".to_string(),
            "The name field is required.".to_string()
        ]
    );
    assert_eq!(name.error().as_deref(), Some("Name is required"));
}

#[test]
fn test_explicit_plugin_order() {
    let form = both(OptionsPatch {
        validation_plugins_order: Some(vec!["dvr".into(), "vjf".into()]),
        ..Default::default()
    });
    let name = form.select("name").unwrap();

    name.validate();
    assert_eq!(
        name.error().as_deref(),
        Some("The name field is required.")
    );
}

#[test]
fn test_stop_validation_on_error() {
    let form = both(OptionsPatch {
        stop_validation_on_error: Some(true),
        ..Default::default()
    });
    let name = form.select("name").unwrap();

    name.validate();
    assert_eq!(
        name.validation_error_stack(),
        vec!["Name is required".to_string()]
    );
}

#[test]
fn test_validator_sees_field() {
    let form = Form::builder()
        .options(Options::default().validate_on_init(false))
        .functions(Vjf::new())
        .field(FieldDef::named("nickname").validator(ValidatorFn::new(|value, field| {
            Check::from_bool(
                value.to_text() != field.name(),
                "Nickname must differ from the field name",
            )
        })))
        .build()
        .unwrap();
    let nickname = form.select("nickname").unwrap();

    nickname.set_value("nickname");
    assert!(nickname.validate().is_invalid());
    assert_eq!(nickname.validation_functions_data().len(), 1);
}

// =============================================================================
// Async results and manual errors
// =============================================================================

#[test]
fn test_deferred_check_stays_pending() {
    let form = Form::builder()
        .options(Options::default().validate_on_init(false))
        .functions(Vjf::new())
        .field(FieldDef::named("username").validator(checks::deferred()))
        .build()
        .unwrap();
    let username = form.select("username").unwrap();

    assert!(username.validate().is_valid());
    assert_eq!(username.validation_status(), ValidationStatus::Pending);

    username.set_validation_async_data(true, "");
    assert_eq!(username.validation_status(), ValidationStatus::Valid);
}

#[test]
fn test_async_data_promotion() {
    let form = signup();
    let email = form.select("email").unwrap();

    email.set_validation_async_data(false, "bad");
    assert!(email.has_error());
    assert_eq!(email.validation_status(), ValidationStatus::Invalid);

    email.show_async_errors();
    assert_eq!(email.error().as_deref(), Some("bad"));
    assert_eq!(email.error_async().as_deref(), Some("bad"));

    email.set_validation_async_data(true, "");
    email.show_async_errors();
    assert_eq!(email.error(), None);
}

#[test]
fn test_invalidate() {
    let form = signup();
    let email = form.select("email").unwrap();

    email.invalidate("taken", false);
    assert_eq!(email.error().as_deref(), Some("taken"));
    assert_eq!(email.validation_status(), ValidationStatus::Invalid);

    email.invalidate(vec!["first".to_string(), "second".to_string()], false);
    assert_eq!(email.error().as_deref(), Some("first"));

    email.invalidate("remote", true);
    assert_eq!(email.error().as_deref(), Some("remote"));
}

#[test]
fn test_reset_validation() {
    let form = signup();
    let email = form.select("email").unwrap();
    email.validate();
    assert!(email.has_error());

    email.reset_validation(false);
    assert!(!email.has_error());
    assert!(email.validation_error_stack().is_empty());
    assert_eq!(email.validation_status(), ValidationStatus::Clean);
}

// =============================================================================
// Form-wide
// =============================================================================

#[test]
fn test_form_validate_collects_errors() {
    let form = signup();

    let result = form.validate();
    let paths: Vec<&str> = result.errors().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["email", "password"]);
    assert_eq!(
        result.first_invalid_field(),
        Some(form.select("email").unwrap().id())
    );
    assert!(!form.is_valid());

    let errors = form.errors();
    assert_eq!(
        errors.get("email").cloned().flatten().as_deref(),
        Some("The email field is required.")
    );
}

#[test]
fn test_submit() {
    let form = signup();

    let result = form.submit();
    assert!(result.is_invalid());
    assert_eq!(form.submitted(), 1);
    assert!(!form.submitting());
    assert!(form.select("password").unwrap().error().is_some());

    form.select("email").unwrap().set_value("ada@example.com");
    form.select("password").unwrap().set_value("correct horse");
    assert!(form.submit().is_valid());
    assert_eq!(form.submitted(), 2);
    assert!(form.is_valid());
}

#[test]
fn test_submit_without_validation_reports_current_errors() {
    let mut options = Options::default().validate_on_init(false);
    options.validate_on_submit = false;
    let form = Form::builder()
        .options(options)
        .rules(Dvr::new())
        .field(FieldDef::named("email").rules("required"))
        .build()
        .unwrap();

    assert!(form.submit().is_valid());
    form.select("email").unwrap().invalidate("taken", false);
    assert_eq!(form.submit().errors().len(), 1);
}
