//! Property-based tests for name resolution, path access and dirty tracking.

use formstate::path::{self, SetOptions};
use formstate::{FieldDef, FieldRegistry, FieldsInput, FormConfig, FormManager, HostNotifier, SetValueOptions};
use proptest::prelude::*;
use serde_json::{json, Value};

fn registry() -> FieldRegistry {
    let mut registry = FieldRegistry::default();
    registry.register_fields(FieldsInput::List(vec![
        FieldDef::new("user.email").alias("email"),
        FieldDef::new("user.phone").alias("phone"),
        FieldDef::new("email.primary").alias("user.email"),
        FieldDef::new("notes"),
    ]));
    registry
}

fn segment() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

proptest! {
    /// Property: resolving a name twice gives the same result as resolving once.
    #[test]
    fn resolve_name_is_idempotent(
        name in prop_oneof![
            Just("email".to_string()),
            Just("phone".to_string()),
            Just("user.email".to_string()),
            Just("notes".to_string()),
            "[a-z.]{0,12}",
        ],
    ) {
        let registry = registry();
        let once = registry.resolve_name(&name).to_string();
        let twice = registry.resolve_name(&once).to_string();
        prop_assert_eq!(once, twice);
    }

    /// Property: a value set at a dotted path reads back unchanged.
    #[test]
    fn set_then_get_round_trips(
        segments in prop::collection::vec(segment(), 1..4),
        value in prop_oneof![
            any::<i64>().prop_map(Value::from),
            "[ -~]{0,20}".prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ],
    ) {
        let field_path = segments.join(".");
        let mut root = json!({"existing": 1});
        path::set(&mut root, &field_path, Some(value.clone()), SetOptions::default());
        prop_assert_eq!(path::get(&root, &field_path), Some(&value));
    }

    /// Property: writing the initial value back always leaves the field clean.
    #[test]
    fn restoring_initial_value_clears_dirty(initial in "[a-z]{1,8}", edit in "[a-z]{1,8}") {
        let clean = tokio_test::block_on(async {
            let mut form = FormManager::new(
                HostNotifier::detached(),
                FormConfig::new()
                    .with_field(FieldDef::new("title"))
                    .with_initial_data(json!({"title": initial.clone()})),
                None,
            );
            form.set_value("title", edit.clone(), SetValueOptions::default()).await.unwrap();
            let dirty_after_edit = form.is_field_dirty("title");
            form.set_value("title", initial.clone(), SetValueOptions::default()).await.unwrap();
            dirty_after_edit == (edit != initial) && form.is_clean()
        });
        prop_assert!(clean);
    }
}

#[test]
fn canonical_names_win_over_aliases() {
    let registry = registry();
    assert_eq!(registry.resolve_name("user.email"), "user.email");
    assert_eq!(registry.resolve_name("email"), "user.email");
    assert_eq!(registry.resolve_name("missing.field"), "missing.field");
}
