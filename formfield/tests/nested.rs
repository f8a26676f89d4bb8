//! Tests for nested fields: schema structure, aggregates, add/del/update and
//! soft delete.

use formfield::prelude::*;
use serde_json::json;

const STRUCTURE: [&str; 5] = [
    "club.name",
    "club.city",
    "members[]",
    "members[].firstname",
    "members[].lastname",
];

fn club(options: Options) -> Form {
    Form::builder()
        .options(options.validate_on_init(false))
        .structure(STRUCTURE)
        .values(json!({
            "club": { "name": "HELLO", "city": "NY" },
            "members": [
                { "firstname": "Clint", "lastname": "Eastwood" },
                { "firstname": "Charlie", "lastname": "Chaplin" }
            ]
        }))
        .build()
        .unwrap()
}

// =============================================================================
// Structure and aggregates
// =============================================================================

#[test]
fn test_tree_from_structure_and_values() {
    let form = club(Options::default());

    let keys: Vec<String> = form.fields().iter().map(|f| f.key().to_string()).collect();
    assert_eq!(keys, vec!["club", "members"]);

    let members = form.select("members").unwrap();
    assert!(members.is_incremental());
    assert_eq!(members.nested_len(), 2);
    assert_eq!(
        form.select("members[1].firstname").unwrap().value(),
        Value::from("Charlie")
    );
    assert_eq!(form.select("members.1.firstname").unwrap().path(), "members.1.firstname");
}

#[test]
fn test_values_aggregate() {
    let form = club(Options::default());

    assert_eq!(
        form.values(),
        Value::from(json!({
            "club": { "name": "HELLO", "city": "NY" },
            "members": [
                { "firstname": "Clint", "lastname": "Eastwood" },
                { "firstname": "Charlie", "lastname": "Chaplin" }
            ]
        }))
    );
    assert_eq!(
        form.select("club").unwrap().value(),
        Value::from(json!({ "name": "HELLO", "city": "NY" }))
    );
}

#[test]
fn test_container_status_folds_children() {
    let form = club(Options::default());
    let club = form.select("club").unwrap();
    assert!(club.is_pristine());
    assert!(!club.is_empty());

    form.select("club.name").unwrap().set_value("WORLD");
    assert!(club.is_dirty());
    assert!(!club.is_pristine());
    assert_eq!(club.changed(), 1);
    assert!(form.is_dirty());

    form.select("club.city").unwrap().set_value("");
    assert!(club.is_empty());

    form.select("club.city").unwrap().focus();
    assert!(club.focused());
    assert!(club.touched());
    assert!(club.check(Prop::Touched, Occurrence::Some));
    assert!(!club.check(Prop::Touched, Occurrence::Every));
}

#[test]
fn test_container_disabled_when_every_child_is() {
    let form = club(Options::default());
    let club = form.select("club").unwrap();

    form.select("club.name").unwrap().set_disabled(true);
    assert_eq!(club.get(Prop::Disabled), Value::Bool(false));

    form.select("club.city").unwrap().set_disabled(true);
    assert_eq!(club.get(Prop::Disabled), Value::Bool(true));
}

#[test]
fn test_container_set_value_distributes() {
    let form = club(Options::default());
    let club = form.select("club").unwrap();

    club.set_value(json!({ "name": "CHESS", "country": "US" }));
    assert_eq!(form.select("club.name").unwrap().value(), Value::from("CHESS"));
    assert_eq!(form.select("club.city").unwrap().value(), Value::from("NY"));
    assert!(!form.has("club.country"));
}

#[test]
fn test_container_errors_fold_children() {
    let form = club(Options::default());
    let club = form.select("club").unwrap();

    form.select("club.city").unwrap().invalidate("unknown city", false);
    assert!(club.has_error());
    assert!(!club.is_valid());
    assert!(!form.is_valid());
    assert_eq!(club.error(), None);

    assert_eq!(
        form.errors().get("club.city").cloned().flatten().as_deref(),
        Some("unknown city")
    );
}

// =============================================================================
// Select
// =============================================================================

#[test]
fn test_select_missing_path() {
    let form = club(Options::default());

    let err = form.select("members[5]").unwrap_err();
    assert!(matches!(err, ConfigError::FieldNotFound { ref path } if path == "members[5]"));

    let err = form.select("club").unwrap().select("country").unwrap_err();
    assert!(matches!(err, ConfigError::FieldNotFound { ref path } if path == "club.country"));
}

#[test]
fn test_each_visits_depth_first() {
    let form = club(Options::default());
    let mut paths = Vec::new();
    form.select("members").unwrap().each(&mut |f: &Field| paths.push(f.path().to_string()));

    assert_eq!(
        paths,
        vec![
            "members.0",
            "members.0.firstname",
            "members.0.lastname",
            "members.1",
            "members.1.firstname",
            "members.1.lastname",
        ]
    );
}

// =============================================================================
// Add and delete
// =============================================================================

#[test]
fn test_add_uses_next_index_and_schema() {
    let form = club(Options::default());

    let added = form
        .add(Some("members"), Some(Value::from(json!({ "firstname": "Buster" }))), None)
        .unwrap();
    assert_eq!(added.path(), "members.2");
    assert_eq!(
        form.select("members[2].firstname").unwrap().value(),
        Value::from("Buster")
    );
    assert_eq!(
        form.select("members[2].lastname").unwrap().value(),
        Value::from("")
    );
    assert_eq!(form.select("members").unwrap().nested_len(), 3);
}

#[test]
fn test_add_root_field() {
    let form = club(Options::default());

    let extra = form.add(None, Some(Value::from("note")), Some("comment")).unwrap();
    assert_eq!(extra.path(), "comment");
    assert_eq!(form.select("comment").unwrap().value(), Value::from("note"));
}

#[test]
fn test_add_replaces_existing_key() {
    let form = club(Options::default());
    let members = form.select("members").unwrap();

    members
        .add(Some(Value::from(json!({ "firstname": "Buster" }))), Some("0"))
        .unwrap();
    assert_eq!(members.nested_len(), 2);
    assert_eq!(
        form.select("members.0.firstname").unwrap().value(),
        Value::from("Buster")
    );
}

#[test]
fn test_hard_delete() {
    let form = club(Options::default());

    form.del("members[0]").unwrap();
    let members = form.select("members").unwrap();
    assert_eq!(members.nested_len(), 1);
    assert!(!form.has("members.0"));
    assert_eq!(
        members.value(),
        Value::from(json!([{ "firstname": "Charlie", "lastname": "Chaplin" }]))
    );

    let err = form.del("members.7").unwrap_err();
    assert!(matches!(err, ConfigError::FieldNotFound { .. }));
}

#[test]
fn test_soft_delete_hides_from_aggregates() {
    let form = club(Options::default().soft_delete(true));
    let members = form.select("members").unwrap();

    form.del("members.0").unwrap();
    assert_eq!(members.nested_len(), 2);
    assert!(form.select("members.0").unwrap().deleted());
    assert!(form.select("members.0.firstname").unwrap().deleted());
    assert!(members.deleted());
    assert_eq!(
        members.value(),
        Value::from(json!([{ "firstname": "Charlie", "lastname": "Chaplin" }]))
    );
}

#[test]
fn test_option_overrides_refresh_cached_aggregates() {
    let form = Form::builder()
        .options(Options::default().validate_on_init(false))
        .field(
            FieldDef::named("club")
                .field(FieldDef::named("name").value("Chess"))
                .field(FieldDef::named("city").value("Oslo")),
        )
        .build()
        .unwrap();
    let club = form.select("club").unwrap();
    let city = form.select("club.city").unwrap();
    assert_eq!(club.value(), Value::from(json!({ "name": "Chess", "city": "Oslo" })));

    let soft = OptionsPatch {
        soft_delete: Some(true),
        ..Default::default()
    };
    club.set_option_overrides(soft.clone());
    city.set_option_overrides(soft);
    club.del("city").unwrap();

    assert!(city.deleted());
    assert_eq!(club.value(), Value::from(json!({ "name": "Chess" })));
}

#[test]
fn test_form_options_refresh_cached_aggregates() {
    let form = club(Options::default());
    let members = form.select("members").unwrap();
    form.select("members.0").unwrap().set_option_overrides(OptionsPatch {
        soft_delete: Some(true),
        ..Default::default()
    });
    form.del("members.0").unwrap();
    assert!(form.select("members.0").unwrap().deleted());
    assert_eq!(members.value().as_list().map(<[Value]>::len), Some(2));

    form.set_options(form.options().validate_on_init(false).soft_delete(true));
    assert_eq!(
        members.value(),
        Value::from(json!([{ "firstname": "Charlie", "lastname": "Chaplin" }]))
    );
}

#[test]
fn test_soft_deleted_fields_skip_validation() {
    let form = Form::builder()
        .options(Options::default().validate_on_init(false).soft_delete(true))
        .rules(Dvr::new())
        .field(
            FieldDef::named("members")
                .field(FieldDef::named("0").rules("required"))
                .field(FieldDef::named("1").value("Grace").rules("required")),
        )
        .build()
        .unwrap();

    assert!(form.validate().is_invalid());
    form.del("members.0").unwrap();
    form.select("members.0").unwrap().reset_validation(false);
    assert!(form.validate().is_valid());
}

// =============================================================================
// Update
// =============================================================================

#[test]
fn test_update_requires_object() {
    let form = club(Options::default());

    let err = form.update(Value::from("nope")).unwrap_err();
    assert!(matches!(err, ConfigError::UpdateRequiresObject { found: "text" }));

    let err = form.select("club").unwrap().update(json!([1, 2])).unwrap_err();
    assert!(matches!(err, ConfigError::UpdateRequiresObject { found: "list" }));
}

#[test]
fn test_update_routes_by_key() {
    let form = club(Options::default());

    form.update(json!({ "club": { "name": "WORLD" } })).unwrap();
    assert_eq!(form.select("club.name").unwrap().value(), Value::from("WORLD"));
    assert_eq!(form.select("club.city").unwrap().value(), Value::from("NY"));
}

#[test]
fn test_update_array_drops_surplus_and_adds_missing() {
    let form = club(Options::default());
    let members = form.select("members").unwrap();

    form.update(json!({ "members": [{ "firstname": "Ada" }] })).unwrap();
    assert_eq!(members.nested_len(), 1);
    assert_eq!(form.select("members.0.firstname").unwrap().value(), Value::from("Ada"));
    assert_eq!(
        form.select("members.0.lastname").unwrap().value(),
        Value::from("Eastwood")
    );

    form.update(json!({ "members": [{}, { "firstname": "Grace" }, { "firstname": "Joan" }] }))
        .unwrap();
    assert_eq!(members.nested_len(), 3);
    assert_eq!(form.select("members.2.firstname").unwrap().value(), Value::from("Joan"));
}

#[test]
fn test_update_without_fallback_skips_unknown_keys() {
    let form = club(Options::default().fallback(false));

    form.update(json!({ "club": { "country": "US" }, "venue": "Hall" })).unwrap();
    assert!(!form.has("club.country"));
    assert!(!form.has("venue"));
}

#[test]
fn test_update_with_fallback_creates_fields() {
    let form = club(Options::default());

    form.update(json!({ "club": { "country": "US" }, "venue": "Hall" })).unwrap();
    assert_eq!(form.select("club.country").unwrap().value(), Value::from("US"));
    assert_eq!(form.select("venue").unwrap().value(), Value::from("Hall"));
}

// =============================================================================
// Schema
// =============================================================================

#[test]
fn test_schema_from_json() {
    let schema = FormSchema::from_json(
        r#"{
            "name": "club",
            "struct": ["members[]", "members[].firstname"],
            "labels": { "members[].firstname": "First Name" },
            "rules": { "members[].firstname": "required" },
            "values": { "members": [{ "firstname": "" }] }
        }"#,
    )
    .unwrap();
    let form = Form::builder()
        .schema(schema)
        .options(Options::default().validate_on_init(false))
        .rules(Dvr::new())
        .build()
        .unwrap();

    assert_eq!(form.name(), Some("club"));
    let first = form.select("members[0].firstname").unwrap();
    assert_eq!(first.label(), "First Name");
    first.validate();
    assert_eq!(
        first.error().as_deref(),
        Some("The First Name field is required.")
    );
}

#[test]
fn test_schema_rejects_invalid_json() {
    let err = FormSchema::from_json("{ nope").unwrap_err();
    assert!(matches!(err, ConfigError::Schema(_)));
}
