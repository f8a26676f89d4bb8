//! Tests for debounced re-validation, driven by tokio's paused clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use formfield::prelude::*;
use tokio::time::Instant;

fn counting_form(options: Options) -> (Form, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let form = Form::builder()
        .options(options.validate_on_init(false))
        .functions(Vjf::new())
        .field(FieldDef::named("username").validator(ValidatorFn::new(move |value, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Check::from_bool(value.to_text().len() >= 3, "Too short")
        })))
        .build()
        .unwrap();
    (form, runs)
}

#[tokio::test(start_paused = true)]
async fn test_burst_validates_once() {
    let (form, runs) = counting_form(Options::default().validate_on_change(true));
    let username = form.select("username").unwrap();

    username.set_value("a");
    username.set_value("ad");
    username.set_value("ada");
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    form.drain().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(username.is_valid());
    assert_eq!(form.state().scheduler().pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_calls_push_the_deadline_back() {
    let (form, runs) = counting_form(Options::default().validate_on_change(true));
    let username = form.select("username").unwrap();

    username.set_value("a");
    tokio::time::advance(Duration::from_millis(200)).await;
    username.set_value("ab");
    tokio::time::advance(Duration::from_millis(200)).await;
    assert_eq!(form.run_due(Instant::now()), 0);

    tokio::time::advance(Duration::from_millis(50)).await;
    assert_eq!(form.run_due(Instant::now()), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(
        username.error().as_deref(),
        Some("Too short")
    );
}

#[tokio::test(start_paused = true)]
async fn test_max_wait_caps_the_delay() {
    let options = Options::default()
        .validate_on_change(true)
        .debounce(DebounceOptions {
            max_wait: Some(300),
            ..Default::default()
        });
    let (form, runs) = counting_form(options);
    let username = form.select("username").unwrap();

    username.set_value("a");
    tokio::time::advance(Duration::from_millis(200)).await;
    username.set_value("ab");
    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(form.run_due(Instant::now()), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_change_validation_by_default() {
    let (form, runs) = counting_form(Options::default());
    let username = form.select("username").unwrap();

    username.set_value("ada");
    form.drain().await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_change_after_initial_blur() {
    let mut options = Options::default().validate_on_blur(false);
    options.validate_on_change_after_initial_blur = true;
    let (form, runs) = counting_form(options);
    let username = form.select("username").unwrap();

    username.set_value("a");
    form.drain().await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    username.focus();
    username.blur();
    username.set_value("ab");
    form.drain().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_does_not_trigger_change_validation() {
    let (form, runs) = counting_form(Options::default().validate_on_change(true));
    let username = form.select("username").unwrap();

    username.set_value("ada");
    form.drain().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    username.reset(true, true);
    assert_eq!(username.value(), Value::from(""));
    form.drain().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_cancels_pending_validation() {
    let (form, runs) = counting_form(Options::default().validate_on_change(true));
    let username = form.select("username").unwrap();

    username.set_value("ada");
    username.dispose();
    form.drain().await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}
