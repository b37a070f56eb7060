//! The one-way JSON output codec (C2, JSON leg). JSON is an egress-only
//! representation — there is no `from_json`, since the text and binary
//! codecs are the only ingress paths (§4.2).

use base64::Engine;
use serde_json::{Map as JsonMap, Number, Value as Json};

use nimo_value::Value;

fn base64_engine() -> base64::engine::general_purpose::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// Renders `value` as a [`serde_json::Value`], the intermediate AST every
/// caller serializes from (`to_string` / `to_string_pretty` / a `Write`).
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Logical(b) => Json::Bool(*b),
        Value::Integer(i) => Json::Number(Number::from(*i)),
        Value::Double(d) => Number::from_f64(*d).map(Json::Number).unwrap_or(Json::Null),
        Value::String(s) => Json::String(s.clone()),
        Value::Blob(b) => Json::String(base64_engine().encode(b)),
        Value::Date(d) => Json::String(d.to_string()),
        Value::Time(t) => Json::String(t.to_string()),
        Value::Address(a) => Json::String(a.to_string()),
        Value::Array(a) => Json::Array(a.iter().map(|v| to_json(v)).collect()),
        Value::Set(s) => Json::Array(s.iter().map(|v| to_json(v)).collect()),
        Value::Map(m) => {
            let mut obj = JsonMap::new();
            for (k, v) in m.iter() {
                obj.insert(key_to_json_string(k), to_json(v));
            }
            Json::Object(obj)
        }
    }
}

/// Keys are always rendered as JSON object keys, i.e. strings; non-string
/// keys are quoted via their ordinary text form (`as_key=true` in the
/// wire-format notes).
fn key_to_json_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => crate::text::print_to_string(other, true),
    }
}

pub fn to_string(value: &Value, pretty: bool) -> String {
    let json = to_json(value);
    if pretty {
        serde_json::to_string_pretty(&json).expect("Value -> Json never fails to serialize")
    } else {
        serde_json::to_string(&json).expect("Value -> Json never fails to serialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimo_value::Array;
    use std::sync::Arc;

    #[test]
    fn logical_and_integer() {
        assert_eq!(to_json(&Value::Logical(true)), Json::Bool(true));
        assert_eq!(to_string(&Value::Integer(42), false), "42");
    }

    #[test]
    fn blob_is_base64() {
        let v = Value::Blob(vec![0, 1, 2]);
        assert_eq!(to_json(&v), Json::String("AAEC".to_string()));
    }

    #[test]
    fn address_is_quoted_dotted_quad() {
        let v = Value::Address(nimo_value::NimoAddress::from_ipv4(
            "10.0.0.1".parse().unwrap(),
        ));
        assert_eq!(to_string(&v, false), "\"10.0.0.1\"");
    }

    #[test]
    fn array_and_set_become_json_arrays() {
        let arr = Value::Array(Array::from_vec(vec![
            Arc::new(Value::Integer(1)),
            Arc::new(Value::Integer(2)),
        ]));
        assert_eq!(to_string(&arr, false), "[1,2]");
    }

    #[test]
    fn map_keys_become_object_keys() {
        let mut m = nimo_value::Map::new();
        m.insert(Arc::new(Value::Integer(1)), Arc::new(Value::String("x".to_string())))
            .unwrap();
        let v = Value::Map(m);
        assert_eq!(to_string(&v, false), "{\"1\":\"x\"}");
    }
}
