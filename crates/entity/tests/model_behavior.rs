use elif_entity::{PropertyFlag, ValidationErrors};
use elif_entity_testing::prelude::*;

const PRODUCT_YAML: &str = r#"
name: product
fields:
  - name: id
    type: integer
    flags: [primary]
  - name: title
    type: string
    flags: [required]
    max: 20
  - name: price
    type: money
    min: 0
  - name: state
    type: enum
    values: [draft, live]
  - name: released
    type: date
  - name: tags
    type: set
  - name: code
    type: string
    pattern: "[A-Z]{3}-[0-9]+"
"#;

fn product_context() -> EntityContext {
    init_test_tracing();
    let context = EntityContext::new();
    context
        .register_class(EntityConfig::from_yaml_str(PRODUCT_YAML).unwrap())
        .unwrap();
    context
}

#[test]
fn test_yaml_schema_compiles_with_implicit_defaults() {
    let context = product_context();
    let product = context.create_model("product").unwrap();

    assert_eq!(product.raw_value("state"), Some(&Value::from("draft")));
    assert_eq!(product.raw_value("released"), Some(&Value::Null));
    assert!(product.properties().get("id").unwrap().has_flag(PropertyFlag::NoUpdate));
    assert!(product.is_new());
    assert!(!product.has_edits());
}

#[test]
fn test_json_and_yaml_sources_agree() {
    let yaml = EntityConfig::from_yaml_str(PRODUCT_YAML).unwrap();
    let json = EntityConfig::from_json_str(&yaml.to_json_string().unwrap()).unwrap();
    assert_eq!(json.fields.len(), yaml.fields.len());
    assert_eq!(json.fields[1].flags, yaml.fields[1].flags);
    assert_eq!(json.fields[3].values, vec!["draft", "live"]);
}

#[test]
fn test_defaults_are_always_valid() {
    let context = product_context();
    let mut product = context.create_model("product").unwrap();
    for property in product.properties_mut().iter_mut() {
        property.reset().unwrap();
        let value = property.raw_value().clone();
        assert!(property.validate(&value).is_ok(), "default of {} is invalid", property.name());
    }
}

#[test]
fn test_primary_key_is_write_once() {
    let context = product_context();
    let mut product = context.create_model("product").unwrap();

    product.set_value("id", 10).unwrap();
    let err = product.set_value("id", 11).unwrap_err();
    EntityAssertions::assert_validation_error(&err, "id", "write_once").unwrap();
    assert_eq!(product.raw_value("id"), Some(&Value::Int(10)));

    let mut loaded = context.create_model("product").unwrap();
    loaded.hydrate(fields(json!({"id": 10}))).unwrap();
    loaded.hydrate(fields(json!({"id": 11}))).unwrap();
    assert_eq!(loaded.id(), Value::Int(11));
    assert!(!loaded.has_edits());
}

#[test]
fn test_coercion_and_constraints() {
    let context = product_context();
    let mut product = context.create_model("product").unwrap();

    product.set_value("price", "12.50").unwrap();
    assert_eq!(product.raw_value("price"), Some(&Value::Float(12.5)));
    product.set_value("released", "2024-03-01 10:00:00").unwrap();
    assert!(product.raw_value("released").and_then(Value::as_date).is_some());
    product
        .set_value("tags", Value::Array(vec![Value::from("a"), Value::from("b")]))
        .unwrap();
    assert!(matches!(product.raw_value("tags"), Some(Value::Set(_))));

    let err = product.set_value("price", -1).unwrap_err();
    EntityAssertions::assert_validation_error(&err, "price", "min").unwrap();
    let err = product.set_value("state", "gone").unwrap_err();
    EntityAssertions::assert_validation_error(&err, "state", "not_in_list").unwrap();
    assert!(product.set_value("code", "AB-1").is_err());
    assert!(product.set_value("code", "ABCD-12").is_err());
    product.set_value("code", "ABC-12").unwrap();
}

#[test]
fn test_clear_edit_flags_leaves_no_edits() {
    let context = product_context();
    let mut product = context.create_model("product").unwrap();
    product.set_value("title", "Lamp").unwrap();
    product.set_value("price", 30).unwrap();
    assert_eq!(product.edited_values().len(), 2);

    product.clear_edit_flags();
    assert!(!product.has_edits());
    assert!(product.edited_values().is_empty());
}

#[test]
fn test_copy_strips_primary_keys() {
    let context = product_context();
    let mut product = context.create_model("product").unwrap();
    product.hydrate(fields(json!({"id": 4, "title": "Lamp"}))).unwrap();

    let copy = product.create_copy(false, true).unwrap();
    assert!(copy.id().is_empty());
    assert_eq!(copy.raw_value("title"), Some(&Value::from("Lamp")));
    for key in copy.properties().primary_keys() {
        let property = copy.properties().get(key).unwrap();
        assert!(!property.has_flag(PropertyFlag::Primary));
        assert!(!property.has_flag(PropertyFlag::Required));
    }

    let kept = product.create_copy(false, false).unwrap();
    assert_eq!(kept.id(), Value::Int(4));

    let diffs = product.diff(&copy);
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].field, "id");
}

#[test]
fn test_prefixed_fields_route_to_the_embedded_model() {
    let shop = Shop::new().unwrap();
    let mut customer = shop.customers.create(&FieldMap::new()).unwrap();

    assert!(customer.properties().is_member("billing_city"));
    assert!(!customer.properties().is_member("billing_country"));

    customer.set_value("billing_city", "Oslo").unwrap();
    assert_eq!(customer.get("billing_city").unwrap(), Value::from("Oslo"));
    assert!(customer.overflow().is_empty());

    customer.set_value("billing_country", "NO").unwrap();
    assert!(customer.overflow().is_empty());
    assert_eq!(customer.get("billing_country").unwrap(), Value::from("NO"));

    customer.set_value("nickname", "ada").unwrap();
    assert_eq!(customer.overflow().get("nickname"), Some(&Value::from("ada")));

    let snapshot = customer.snapshot();
    assert_eq!(snapshot.get("billing_city"), Some(&Value::from("Oslo")));
    assert!(snapshot.get("billing").is_none());
}

#[test]
fn test_serialized_output_is_normalized() {
    let shop = Shop::new().unwrap();
    let mut customer = shop
        .customers
        .create(&fields(json!({"name": "Ada", "password": "hunter2", "billing_city": "Oslo"})))
        .unwrap();
    customer.set_value("nickname", "ada").unwrap();

    let json = customer.to_json(&ToArrayOptions::new()).unwrap();
    let expected = json!({"name": "Ada", "active": 1, "billing_city": "Oslo"});
    EntityAssertions::assert_json_contains(&json, &expected).unwrap();
    assert!(json.get("password").is_none());
    assert!(json.get("nickname").is_none());
    assert!(json.get("orders").is_none());

    let json = customer
        .to_json(&ToArrayOptions::new().include_extra(true).fields(["name", "billing_city"]))
        .unwrap();
    assert_eq!(json, json!({"name": "Ada", "billing_city": "Oslo", "nickname": "ada"}));

    let shallow = customer.to_json(&ToArrayOptions::new().depth(1)).unwrap();
    assert!(shallow.get("billing_city").is_none());
}

#[test]
fn test_validation_reports_nested_fields() {
    let shop = Shop::new().unwrap();
    let mut customer = shop.customers.create(&fields(json!({"name": "Ada"}))).unwrap();
    customer.set_value("billing_zip", "12").unwrap_err();
    customer.set_value("billing_zip", "12345").unwrap();

    let err = customer.validate().unwrap_err();
    EntityAssertions::assert_validation_error(&err, "billing.city", "required").unwrap();

    customer.set_value("billing_city", "Oslo").unwrap();
    customer.validate().unwrap();
}

#[test]
fn test_validate_all_collects_children() {
    let shop = Shop::new().unwrap();
    let mut order = shop.orders.create(&FieldMap::new()).unwrap();
    order
        .set_value("lines", Value::Array(vec![Value::Map(fields(json!({"quantity": 2})))]))
        .unwrap();

    let errors: ValidationErrors = order.validate_all();
    assert!(errors.has_field_errors("number"));
    assert!(errors.has_field_errors("lines.0.sku"));
    assert_eq!(errors.len(), 2);
}

#[test]
fn test_unknown_class_and_bad_sources_fail_fast() {
    let context = EntityContext::new();
    assert!(matches!(context.create_model("ghost"), Err(ModelError::Configuration(_))));

    let bad = EntityConfig::new("bad").field(FieldConfig::new("bad name", PropertyType::String));
    assert!(matches!(context.register_class(bad), Err(ModelError::Configuration(_))));
    assert!(!context.has_class("bad"));

    assert!(matches!(
        EntityConfig::from_yaml_str("name: [unclosed"),
        Err(ModelError::Serialization(_))
    ));
}
