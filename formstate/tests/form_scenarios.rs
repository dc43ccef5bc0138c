//! End-to-end behaviour of a form driven through its public API.

use formstate::{
    Cleaning, FieldDef, FieldDefaults, FormConfig, FormError, FormManager, HostNotifier,
    RevisionState, RuleOutcome, RuleResponse, SetValueOptions, Transform, ValidateFilter,
    ValidationEvent,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn form(config: FormConfig) -> FormManager {
    FormManager::new(HostNotifier::detached(), config, None)
}

fn counting_form(config: FormConfig) -> (FormManager, Arc<Mutex<Vec<u64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let host = HostNotifier::callback(move |revision| sink.lock().unwrap().push(revision));
    (FormManager::new(host, config, None), seen)
}

#[tokio::test]
async fn integer_field_converts_and_fails_min_number() {
    let mut form = form(FormConfig::new().with_field(
        FieldDef::new("age")
            .data_type(Transform::named("integer"))
            .rule("minNumber", json!(18)),
    ));

    form.set_value("age", "17", SetValueOptions::default()).await.unwrap();
    assert_eq!(form.get_field_data("age"), Some(json!(17)));

    assert!(!form.validate("age", None, None).await.unwrap());
    let errors = form.get_field_errors("age").unwrap();
    assert!(errors.contains_key("minNumber"));
}

#[tokio::test]
async fn aliased_phone_is_reformatted_by_cleaning() {
    let mut form = form(FormConfig::new().with_field(
        FieldDef::new("profile.phone").alias("phone").cleaning(Cleaning {
            reformat: Some(Transform::named("phone")),
            ..Default::default()
        }),
    ));

    form.set_value("phone", "5551234567", SetValueOptions::default())
        .await
        .unwrap();
    assert_eq!(form.get_data(), json!({"profile": {"phone": "5551234567"}}));
    assert_eq!(form.get_clean_value("phone"), json!("555-123-4567"));
}

#[tokio::test]
async fn change_callback_can_clear_another_field() {
    let mut form = form(
        FormConfig::new()
            .with_field(FieldDef::new("category").on_change(|_, _, form| {
                form.write_value("subcategory", "");
            }))
            .with_field(FieldDef::new("subcategory"))
            .with_initial_data(json!({"category": "A", "subcategory": "A1"})),
    );

    form.set_value("category", "X", SetValueOptions::change()).await.unwrap();
    assert_eq!(form.get_value("subcategory"), json!(""));
}

#[tokio::test]
async fn validate_all_respects_only_filter() {
    let mut form = form(
        FormConfig::new()
            .with_field(FieldDef::new("username").rule("required", json!(true)))
            .with_field(FieldDef::new("email").rule("required", json!(true)))
            .with_initial_data(json!({"username": "bob"})),
    );

    assert!(form.validate_all(ValidateFilter::only(["username"])).await.unwrap());
    assert!(!form.field_has_errors("email"));

    assert!(!form.validate_all(ValidateFilter::default()).await.unwrap());
    assert_eq!(form.get_errors("email"), vec!["This field is required"]);
}

#[tokio::test]
async fn validate_all_skips_state_fields_and_ignored_names() {
    let mut form = form(
        FormConfig::new()
            .with_field(FieldDef::new("panel").state_only().rule("required", json!(true)))
            .with_field(FieldDef::new("user.name").alias("name").rule("required", json!(true)))
            .with_field(FieldDef::new("city").rule("minLength", json!(2))),
    );
    form.write_value("city", "NY");

    assert!(form.validate_all(ValidateFilter::ignore(["name"])).await.unwrap());
    assert!(!form.has_errors());
}

#[tokio::test]
async fn blur_without_policy_runs_no_rules() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut form = form(FormConfig::new().with_field(FieldDef::new("nick").rule_fn(
        "custom",
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(RuleOutcome::from(false))
        },
    )));

    for _ in 0..2 {
        let valid = form
            .validate("nick", Some(json!("ab")), Some(ValidationEvent::Blur))
            .await
            .unwrap();
        assert!(valid);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert!(!form.validate_field("nick").await.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn required_failure_replaces_other_errors() {
    let mut form = form(FormConfig::new().with_field(
        FieldDef::new("name")
            .display_name("Name")
            .rule("required", json!(true))
            .rule("minLength", json!(5)),
    ));
    form.write_value("name", "abc");
    assert!(!form.validate_field("name").await.unwrap());
    form.set_errors("name", "custom", "server rejected", true);
    assert_eq!(form.get_field_errors("name").unwrap().len(), 2);

    form.write_value("name", "");
    assert!(!form.validate_field("name").await.unwrap());
    let errors = form.get_field_errors("name").unwrap();
    assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["required"]);
    assert_eq!(form.get_errors("name"), vec!["Name is required"]);
}

#[tokio::test]
async fn dirty_tracking_and_changes() {
    let mut form = form(
        FormConfig::new()
            .with_field(FieldDef::new("user.name"))
            .with_field(FieldDef::new("user.age").data_type(Transform::named("integer")))
            .with_initial_data(json!({"user": {"name": "Ann", "age": 30}, "id": 1})),
    );
    assert!(form.is_clean());

    form.set_value("user.name", "Bob", SetValueOptions::default()).await.unwrap();
    form.set_value("user.age", "30", SetValueOptions::default()).await.unwrap();
    assert!(form.is_field_dirty("user.name"));
    assert!(form.is_field_clean("user.age"));
    assert_eq!(form.get_changes(), json!({"user": {"name": "Bob"}}));

    form.set_value("user.name", "Ann", SetValueOptions::default()).await.unwrap();
    assert!(form.is_clean());

    form.set_value("user.name", "Cy", SetValueOptions::default()).await.unwrap();
    form.reset();
    assert!(form.is_clean());
    assert_eq!(form.get_value("user.name"), json!("Ann"));
}

#[tokio::test]
async fn change_validation_runs_before_callbacks() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let field_log = Arc::clone(&order);
    let form_log = Arc::clone(&order);
    let mut form = form(
        FormConfig::new()
            .with_field_defaults(FieldDefaults {
                validate_on_change: Some(true),
                ..Default::default()
            })
            .with_field(
                FieldDef::new("age")
                    .rule("minNumber", json!(18))
                    .on_change(move |value: &Value, name: &str, form: &mut FormManager| {
                        field_log.lock().unwrap().push(format!(
                            "field {name}={value} errors={}",
                            form.field_has_errors(name)
                        ));
                    }),
            )
            .on_change(move |_, name, _| form_log.lock().unwrap().push(format!("form {name}"))),
    );

    form.on_field_change("age", 12).await.unwrap();
    assert_eq!(
        *order.lock().unwrap(),
        vec!["field age=12 errors=true".to_string(), "form age".to_string()]
    );

    form.on_field_change("age", 12).await.unwrap();
    assert_eq!(order.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn blur_cleans_then_validates() {
    let mut form = form(FormConfig::new().with_field(
        FieldDef::new("code")
            .validate_on_blur(true)
            .rule("exactLength", json!(3)),
    ));

    form.on_field_blur("code", "  abc  ").await.unwrap();
    assert_eq!(form.get_field_data("code"), Some(json!("abc")));
    assert!(!form.field_has_errors("code"));

    form.on_field_blur("code", "ab").await.unwrap();
    assert!(form.field_has_errors("code"));
}

#[test_log::test(tokio::test)]
async fn async_rules_settle_and_rejections_count_as_valid() {
    let mut form = form(
        FormConfig::new()
            .with_field(FieldDef::new("username").rule_fn("available", |input| {
                let taken = input.value == &json!("admin");
                Ok(RuleOutcome::pending(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(RuleResponse::from(!taken))
                }))
            }))
            .with_field(FieldDef::new("invite").rule_fn("lookup", |_| {
                Ok(RuleOutcome::pending(async {
                    Err(formstate::RuleError::new("service unavailable"))
                }))
            }))
            .with_initial_data(json!({"username": "admin", "invite": "xyz"})),
    );

    assert!(!form.validate_all(ValidateFilter::default()).await.unwrap());
    assert!(form.field_has_errors("username"));
    assert!(!form.field_has_errors("invite"));
}

#[test_log::test(tokio::test)]
async fn stalled_async_rule_times_out_as_valid() {
    let mut form = form(
        FormConfig::new()
            .with_validator_timeout(Duration::from_millis(20))
            .with_field(FieldDef::new("slow").rule_fn("remote", |_| {
                Ok(RuleOutcome::pending(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(RuleResponse::Fail)
                }))
            })),
    );
    assert!(form.validate("slow", Some(json!("x")), None).await.unwrap());
}

#[tokio::test]
async fn sync_rule_error_reaches_the_caller() {
    let mut form = form(FormConfig::new().with_field(
        FieldDef::new("code").rule_fn("custom", |_| Err(formstate::RuleError::new("boom"))),
    ));
    let err = form.validate("code", Some(json!("x")), None).await.unwrap_err();
    match err {
        FormError::Rule { field, rule, message } => {
            assert_eq!(field, "code");
            assert_eq!(rule, "custom");
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn validate_all_notifies_once() {
    let (mut form, seen) = counting_form(
        FormConfig::new()
            .with_field(FieldDef::new("a").rule("required", json!(true)))
            .with_field(FieldDef::new("b").rule("required", json!(true))),
    );
    form.validate_all(ValidateFilter::default()).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![1]);

    form.validate_field("a").await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn set_values_notifies_once() {
    let (mut form, seen) = counting_form(FormConfig::new());
    let values = json!({"a": 1, "b": 2});
    let Value::Object(values) = values else { unreachable!() };
    assert!(form.set_values(values, SetValueOptions::default()).await.unwrap());
    assert_eq!(*seen.lock().unwrap(), vec![1]);
}

#[test]
fn state_setter_host_receives_revisions() {
    let last = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&last);
    let mut form = FormManager::new(
        HostNotifier::state_setter(move |state: RevisionState| *sink.lock().unwrap() = Some(state)),
        FormConfig::new(),
        None,
    );
    form.set_state("step", json!(2));
    form.set_state("step", json!(3));
    assert_eq!(
        *last.lock().unwrap(),
        Some(RevisionState { form_revision: 2 })
    );
}

#[test]
fn custom_messages_and_display_names() {
    let config = FormConfig::from_yaml_str(
        r#"
errorMessages:
  minLength: "{name} needs at least {value} characters"
fields:
  - name: user.first
    aliasName: first
    displayName: First name
    validation:
      minLength: 3
  - name: pin
    validation:
      exactLength: 4
    errorMessages:
      exactLength: PIN must be {value} digits
"#,
    )
    .unwrap();
    let mut form = form(config);
    form.write_value("first", "Al");
    form.write_value("pin", "12");

    tokio_test::block_on(form.validate_all(ValidateFilter::default())).unwrap();
    assert_eq!(
        form.get_errors("first"),
        vec!["First name needs at least 3 characters"]
    );
    assert_eq!(form.get_errors("pin"), vec!["PIN must be 4 digits"]);

    let summary = form.get_form_errors();
    assert_eq!(summary[0].name, "user.first");
    assert_eq!(summary[0].alias_name.as_deref(), Some("first"));
}

fn counted_field(name: &str, calls: &Arc<AtomicUsize>) -> FieldDef {
    let calls = Arc::clone(calls);
    FieldDef::new(name).on_change(move |_, _, _| {
        calls.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn clean_field_resubmits_as_a_change() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut form = form(FormConfig::new().with_field(counted_field("code", &calls)));

    form.write_value("code", "  abc  ");
    assert!(form.clean_field("code").await.unwrap());
    assert_eq!(form.get_field_data("code"), Some(json!("abc")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(!form.clean_field("code").await.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn forced_change_fires_for_an_unchanged_value() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut form = form(FormConfig::new().with_field(counted_field("name", &calls)));

    form.set_value("name", "Ann", SetValueOptions::change()).await.unwrap();
    form.set_value("name", "Ann", SetValueOptions::change()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let forced = SetValueOptions {
        force: true,
        ..SetValueOptions::change()
    };
    assert!(!form.set_value("name", "Ann", forced).await.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn field_defaults_changed_at_runtime_enable_change_validation() {
    let mut form = form(FormConfig::new().with_field(FieldDef::new("age").rule("minNumber", json!(18))));

    form.on_field_change("age", 12).await.unwrap();
    assert!(!form.field_has_errors("age"));

    form.set_field_defaults(FieldDefaults {
        validate_on_change: Some(true),
        ..Default::default()
    });
    form.on_field_change("age", 11).await.unwrap();
    assert!(form.field_has_errors("age"));
}

#[tokio::test]
async fn custom_converter_replaces_builtin() {
    let mut form = form(
        FormConfig::new()
            .with_converter("string", |value: &Value, _: Option<&Value>| {
                json!(format!("id-{value}"))
            })
            .with_field(FieldDef::new("uid").value_type(Transform::named("string"))),
    );

    form.write_value("uid", 7);
    assert_eq!(form.get_value("uid"), json!("id-7"));
}

#[tokio::test]
async fn values_are_keyed_by_canonical_name() {
    let mut form = form(FormConfig::new().with_field(FieldDef::new("profile.email").alias("email")));

    form.write_value("email", "ann@example.com");
    let values = form.get_values();
    assert_eq!(values.get("profile.email"), Some(&json!("ann@example.com")));
    assert!(!values.contains_key("email"));
}

#[tokio::test]
async fn change_validation_checks_the_incoming_value() {
    let mut form = form(
        FormConfig::new().with_field(
            FieldDef::new("code")
                .validate_on_change(true)
                .value_format(Transform::func(|value, _| {
                    json!(format!("#{}", value.as_str().unwrap_or_default()))
                }))
                .rule("maxLength", json!(3)),
        ),
    );

    form.on_field_change("code", "abc").await.unwrap();
    assert_eq!(form.get_value("code"), json!("#abc"));
    assert!(!form.field_has_errors("code"));

    form.on_field_change("code", "abcd").await.unwrap();
    assert!(form.field_has_errors("code"));
}

#[tokio::test]
async fn replacing_a_parent_object_marks_nested_fields_dirty() {
    let mut form = form(
        FormConfig::new()
            .with_field(FieldDef::new("user.name"))
            .with_initial_data(json!({"user": {"name": "Ann"}})),
    );
    assert!(form.is_clean());

    form.write_value("user", json!({"name": "Bob"}));
    assert!(form.is_field_dirty("user.name"));
    assert_eq!(form.get_value("user.name"), json!("Bob"));

    form.write_value("user", json!({"name": "Ann"}));
    assert!(!form.is_field_dirty("user.name"));
}
