/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * This file is part of the Ark Sovereign Compiler.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * 1. OPEN SOURCE: You may use this file under the terms of the GNU Affero
 * General Public License v3.0. If you link to this code, your ENTIRE
 * application must be open-sourced under AGPLv3.
 *
 * 2. COMMERCIAL: For proprietary use, you must obtain a Commercial License
 * from Sovereign Systems.
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

//! The `JSON` global, backed by `serde_json`.

use crate::dispatch::Throw;
use crate::value::{HostValue, Properties};
use serde_json::{Map, Number, Value};

/// Converts a host value to JSON. `Ok(None)` means the value has no JSON form
/// (undefined or a function) and is skipped by the enclosing container.
pub fn to_json(value: &HostValue) -> Result<Option<Value>, Throw> {
    let mut stack = Vec::new();
    to_json_inner(value, &mut stack)
}

fn to_json_inner(value: &HostValue, stack: &mut Vec<usize>) -> Result<Option<Value>, Throw> {
    if let Some(id) = value.identity() {
        if stack.contains(&id) {
            return Err(Throw::type_error("Converting circular structure to JSON"));
        }
    }
    let json = match value {
        HostValue::Undefined | HostValue::Function(_) => return Ok(None),
        HostValue::Null => Value::Null,
        HostValue::Bool(b) => Value::Bool(*b),
        HostValue::Int32(v) => Value::from(*v),
        HostValue::Uint32(v) => Value::from(*v),
        HostValue::Double(v) => Number::from_f64(*v)
            .map(|n| {
                if v.trunc() == *v && v.abs() < 9_007_199_254_740_992.0 {
                    Value::from(*v as i64)
                } else {
                    Value::Number(n)
                }
            })
            .unwrap_or(Value::Null),
        HostValue::Int64(_) | HostValue::Uint64(_) => {
            return Err(Throw::type_error("Do not know how to serialize a BigInt"))
        }
        HostValue::String(s) => Value::String(s.to_string()),
        HostValue::Array(elements) => {
            stack.extend(value.identity());
            let mut items = Vec::new();
            for element in elements.borrow().iter() {
                items.push(to_json_inner(element, stack)?.unwrap_or(Value::Null));
            }
            stack.pop();
            Value::Array(items)
        }
        HostValue::Object(object) => {
            stack.extend(value.identity());
            let map = properties_to_json(&object.borrow().properties, stack)?;
            stack.pop();
            Value::Object(map)
        }
        HostValue::Error(error) => {
            stack.extend(value.identity());
            let map = properties_to_json(&error.borrow().properties, stack)?;
            stack.pop();
            Value::Object(map)
        }
    };
    Ok(Some(json))
}

fn properties_to_json(
    properties: &Properties,
    stack: &mut Vec<usize>,
) -> Result<Map<String, Value>, Throw> {
    let mut map = Map::new();
    for (key, value) in properties {
        if let Some(json) = to_json_inner(value, stack)? {
            map.insert(key.clone(), json);
        }
    }
    Ok(map)
}

/// Integers that fit in 32 bits become `Int32`, every other number a `Double`.
pub fn from_json(value: &Value) -> HostValue {
    match value {
        Value::Null => HostValue::Null,
        Value::Bool(b) => HostValue::Bool(*b),
        Value::Number(n) => match n.as_i64().and_then(|v| i32::try_from(v).ok()) {
            Some(v) => HostValue::Int32(v),
            None => HostValue::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => HostValue::string(s),
        Value::Array(items) => HostValue::array(items.iter().map(from_json).collect()),
        Value::Object(map) => HostValue::object_from(
            map.iter()
                .map(|(key, value)| (key.clone(), from_json(value)))
                .collect(),
        ),
    }
}

pub fn stringify(value: &HostValue, pretty: bool) -> Result<HostValue, Throw> {
    let Some(json) = to_json(value)? else {
        return Ok(HostValue::Undefined);
    };
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    text.map(HostValue::string)
        .map_err(|err| Throw::type_error(err.to_string()))
}

pub fn parse(text: &str) -> Result<HostValue, Throw> {
    serde_json::from_str::<Value>(text)
        .map(|json| from_json(&json))
        .map_err(|err| Throw::error("SyntaxError", err.to_string()))
}

/// The `JSON` object installed on the global root.
pub fn json_object() -> HostValue {
    let mut methods = Properties::new();
    methods.insert(
        "parse".to_string(),
        HostValue::native_function("parse", |_env, _this, args| {
            let text = args
                .first()
                .map(HostValue::to_display_string)
                .unwrap_or_else(|| "undefined".to_string());
            parse(&text)
        }),
    );
    methods.insert(
        "stringify".to_string(),
        HostValue::native_function("stringify", |_env, _this, args| {
            let value = args.first().cloned().unwrap_or(HostValue::Undefined);
            let pretty = args.get(2).map(HostValue::is_truthy).unwrap_or(false);
            stringify(&value, pretty)
        }),
    );
    HostValue::object_from(methods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{self, PropertyKey};
    use num_bigint::BigInt;

    #[test]
    fn test_stringify_nested() {
        let inner = HostValue::array(vec![
            HostValue::Int32(1),
            HostValue::Undefined,
            HostValue::Double(2.5),
        ]);
        let obj = HostValue::object();
        dispatch::set_property(&obj, &PropertyKey::from_name("a"), inner).unwrap();
        dispatch::set_property(&obj, &PropertyKey::from_name("skip"), HostValue::Undefined).unwrap();
        dispatch::set_property(&obj, &PropertyKey::from_name("s"), HostValue::string("hi")).unwrap();
        let text = stringify(&obj, false).unwrap();
        assert_eq!(text.as_str(), Some(r#"{"a":[1,null,2.5],"s":"hi"}"#));
    }

    #[test]
    fn test_stringify_rejects_cycles_and_bigints() {
        let obj = HostValue::object();
        dispatch::set_property(&obj, &PropertyKey::from_name("self"), obj.clone()).unwrap();
        let err = stringify(&obj, false).unwrap_err();
        assert_eq!(
            err.value().to_display_string(),
            "TypeError: Converting circular structure to JSON"
        );
        assert!(stringify(&HostValue::Int64(BigInt::from(1)), false).is_err());
    }

    #[test]
    fn test_stringify_shared_reference_is_not_a_cycle() {
        let shared = HostValue::array(vec![]);
        let outer = HostValue::array(vec![shared.clone(), shared]);
        assert_eq!(stringify(&outer, false).unwrap().as_str(), Some("[[],[]]"));
    }

    #[test]
    fn test_parse_numbers() {
        let value = parse("[1, 4294967296, 0.5]").unwrap();
        let HostValue::Array(items) = value else {
            panic!("expected array");
        };
        let items = items.borrow();
        assert!(matches!(items[0], HostValue::Int32(1)));
        assert!(matches!(items[1], HostValue::Double(v) if v == 4_294_967_296.0));
        assert!(matches!(items[2], HostValue::Double(v) if v == 0.5));
    }

    #[test]
    fn test_parse_error_is_syntax_error() {
        let err = parse("{").unwrap_err();
        let HostValue::Error(error) = err.value() else {
            panic!("expected error value");
        };
        assert_eq!(error.borrow().name, "SyntaxError");
    }
}
