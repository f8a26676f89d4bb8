//! Signup Example
//!
//! Builds a small signup form and walks it through a typical session:
//! - rule and function validation side by side
//! - debounced validation on change, driven by the tokio clock
//! - an externally resolved username availability check
//! - a nested, array-backed list of invited members
//!
//! Logs go to `signup.log`.

use std::fs::File;

use formfield::prelude::*;
use log::LevelFilter;
use serde_json::json;
use simplelog::{Config, WriteLogger};

// ============================================================================
// Form
// ============================================================================

fn signup() -> formfield::Result<Form> {
    Form::builder()
        .name("signup")
        .options(
            Options::default()
                .validate_on_init(false)
                .validate_on_change(true)
                .auto_trim_value(true)
                .debounce_wait_ms(150),
        )
        .rules(Dvr::new())
        .functions(Vjf::new())
        .structure(["invites[]", "invites[].email"])
        .field(
            FieldDef::named("username")
                .label("Username")
                .rules("required|alpha_dash|min:3")
                .validator(checks::deferred()),
        )
        .field(FieldDef::named("email").label("Email").rules("required|email"))
        .field(
            FieldDef::named("password")
                .label("Password")
                .kind("password")
                .rules("required|min:8")
                .related(["password_confirm"]),
        )
        .field(
            FieldDef::named("password_confirm")
                .label("Confirmation")
                .kind("password")
                .rules("same:password"),
        )
        .field(FieldDef::named("terms").kind("checkbox").rules("accepted"))
        .build()
}

fn print_errors(form: &Form) {
    for (path, error) in form.errors() {
        if let Some(error) = error {
            println!("  {path}: {error}");
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    if let Ok(log_file) = File::create("signup.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, Config::default(), log_file);
    }

    let form = signup()?;

    println!("Submitting the empty form:");
    form.submit();
    print_errors(&form);

    let username = form.select("username")?;
    username.set_value("  ada_l  ");
    form.select("email")?.set_value("ada@example.com");
    form.select("password")?.set_value("difference engine");
    form.select("password_confirm")?.set_value("difference engine");
    form.select("terms")?.on_toggle(InputEvent::Target {
        value: Value::Null,
        checked: true,
    });
    form.drain().await;

    println!("Username is {:?} ({:?})", username.value(), username.validation_status());

    // the availability lookup answers later
    username.set_validation_async_data(true, "");

    form.update(json!({ "invites": [{ "email": "grace@example.com" }] }))?;
    form.add(Some("invites"), Some(Value::from(json!({ "email": "joan@example.com" }))), None)?;

    let result = form.submit();
    println!("Second submit valid: {}", result.is_valid());
    println!("Values: {}", form.values().to_json());
    Ok(())
}
