//! Conversion between JSON values and DynamoDB attribute values.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

/// Converts a JSON value into the attribute value that stores it.
///
/// Objects become maps, arrays become lists and numbers are kept in their
/// decimal string form.
pub fn json_to_attribute(value: &Value) -> AttributeValue {
  match value {
    Value::Null => AttributeValue::Null(true),
    Value::Bool(b) => AttributeValue::Bool(*b),
    Value::Number(n) => AttributeValue::N(n.to_string()),
    Value::String(s) => AttributeValue::S(s.clone()),
    Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attribute).collect()),
    Value::Object(fields) => AttributeValue::M(
      fields
        .iter()
        .map(|(k, v)| (k.clone(), json_to_attribute(v)))
        .collect::<HashMap<_, _>>(),
    ),
  }
}

/// Converts an attribute value back into JSON.
///
/// Binary and set attributes are never written by the registry; string
/// sets come back as arrays and anything else unreadable as null.
pub fn attribute_to_json(value: &AttributeValue) -> Value {
  match value {
    AttributeValue::S(s) => Value::String(s.clone()),
    AttributeValue::N(n) => number(n),
    AttributeValue::Bool(b) => Value::Bool(*b),
    AttributeValue::L(items) => Value::Array(items.iter().map(attribute_to_json).collect()),
    AttributeValue::M(fields) => Value::Object(
      fields
        .iter()
        .map(|(k, v)| (k.clone(), attribute_to_json(v)))
        .collect::<Map<_, _>>(),
    ),
    AttributeValue::Ss(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
    AttributeValue::Ns(items) => Value::Array(items.iter().map(String::as_str).map(number).collect()),
    _ => Value::Null,
  }
}

fn number(raw: &str) -> Value {
  if let Ok(int) = raw.parse::<i64>() {
    return Value::Number(int.into());
  }
  raw
    .parse::<f64>()
    .ok()
    .and_then(Number::from_f64)
    .map(Value::Number)
    .unwrap_or_else(|| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_binding_survives_conversion() {
    let binding = json!({
      "kind": "datastore",
      "state": "active",
      "createdIds": [
        {"kind": "eventSourceMapping", "id": "uuid-1"},
        {"kind": "changeStream", "id": "orders"}
      ],
      "lastError": null,
      "spec": {"batchSize": 100, "ratio": 0.5, "enabled": true}
    });

    assert_eq!(attribute_to_json(&json_to_attribute(&binding)), binding);
  }

  #[test]
  fn test_numbers_keep_their_decimal_form() {
    assert_eq!(json_to_attribute(&json!(42)), AttributeValue::N("42".to_string()));
    assert_eq!(attribute_to_json(&AttributeValue::N("1.25".to_string())), json!(1.25));
    assert_eq!(attribute_to_json(&AttributeValue::N("1e400".to_string())), json!("1e400"));
  }

  #[test]
  fn test_string_sets_become_arrays() {
    let set = AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]);
    assert_eq!(attribute_to_json(&set), json!(["a", "b"]));
  }
}
