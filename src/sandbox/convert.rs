//! Conversion utilities between script values and JSON.

use rhai::Dynamic;
use serde_json::{Map, Number, Value};

/// Convert a script value to JSON for harvesting.
///
/// Custom types without a JSON shape fall back to their textual
/// representation.
pub fn dynamic_to_json(value: &Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return Value::Number(i.into());
    }
    if let Ok(f) = value.as_float() {
        return Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Ok(s) = value.clone().into_string() {
        return Value::String(s);
    }
    if let Some(array) = value.clone().try_cast::<rhai::Array>() {
        return Value::Array(array.iter().map(dynamic_to_json).collect());
    }
    if let Some(map) = value.clone().try_cast::<rhai::Map>() {
        let object: Map<String, Value> = map
            .iter()
            .map(|(key, value)| (key.to_string(), dynamic_to_json(value)))
            .collect();
        return Value::Object(object);
    }
    Value::String(value.to_string())
}

/// Convert a JSON value into a script value.
pub fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => (*b).into(),
        Value::Number(number) => {
            if let Some(i) = number.as_i64() {
                i.into()
            } else if let Some(f) = number.as_f64() {
                f.into()
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(text) => text.clone().into(),
        Value::Array(items) => {
            let array: rhai::Array = items.iter().map(json_to_dynamic).collect();
            array.into()
        }
        Value::Object(map) => {
            let mut object = rhai::Map::new();
            for (key, value) in map {
                object.insert(key.as_str().into(), json_to_dynamic(value));
            }
            object.into()
        }
    }
}
