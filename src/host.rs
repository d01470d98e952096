// ABOUTME: Host bridge converting between interpreter values and host values

use crate::error::Context;
use crate::interp::Interp;
use crate::lexer::Span;
use crate::value::{format_number, HostFunc, Value};
use indexmap::IndexMap;
use std::rc::Rc;

/// A host callable: takes host values, returns a host value or a plain
/// error message that the bridge converts into a runtime diagnostic.
pub type HostFn = Rc<dyn Fn(&[HostValue]) -> Result<HostValue, String>>;

/// The host side of the bridge. Everything a native module exports, and
/// everything passed into one, is expressed in these terms.
#[derive(Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<HostValue>),
    Map(Vec<(String, HostValue)>),
    Fn(String, HostFn),
}

/// Host → language. Total: every host value has a language rendering.
pub fn to_value(hv: &HostValue) -> Value {
    match hv {
        HostValue::Null => Value::null(),
        HostValue::Bool(b) => Value::bool(*b),
        HostValue::Int(i) => Value::Number(*i as f64),
        HostValue::Float(f) => Value::Number(*f),
        HostValue::Str(s) => Value::Str(s.clone()),
        HostValue::Seq(items) => Value::list(items.iter().map(to_value).collect()),
        HostValue::Map(entries) => {
            let mut map = IndexMap::new();
            for (k, v) in entries {
                map.insert(k.clone(), to_value(v));
            }
            Value::dict(map)
        }
        HostValue::Fn(name, func) => Value::Host(Rc::new(HostFunc {
            name: name.clone(),
            func: func.clone(),
        })),
    }
}

/// Language → host. Total: callables become host callables that re-enter
/// the interpreter, and anything without a natural host shape becomes its
/// stringification.
pub fn from_value(value: &Value, interp: &Rc<Interp>) -> HostValue {
    match value {
        Value::Number(n) => {
            if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                HostValue::Int(*n as i64)
            } else {
                HostValue::Float(*n)
            }
        }
        Value::Str(s) => HostValue::Str(s.clone()),
        Value::List(items) => HostValue::Seq(
            items
                .borrow()
                .iter()
                .map(|v| from_value(v, interp))
                .collect(),
        ),
        Value::Dict(map) => HostValue::Map(
            map.borrow()
                .iter()
                .map(|(k, v)| (k.clone(), from_value(v, interp)))
                .collect(),
        ),
        Value::Module(module) => HostValue::Map(
            module
                .scope
                .local_names()
                .into_iter()
                .filter_map(|name| {
                    module
                        .scope
                        .get_local(&name)
                        .map(|v| (name, from_value(&v, interp)))
                })
                .collect(),
        ),
        callable if callable.is_callable() => {
            let name = callable_name(callable);
            let interp = interp.clone();
            let callee = callable.clone();
            HostValue::Fn(
                name,
                Rc::new(move |host_args: &[HostValue]| {
                    let args: Vec<Value> = host_args.iter().map(to_value).collect();
                    let span = Span::synthetic("<host call>");
                    let context = Context::root("<host call>");
                    let result = interp
                        .call_value(&callee, args, &span, &context)
                        .map_err(|e| e.render())?;
                    Ok(from_value(&result, &interp))
                }),
            )
        }
        other => HostValue::Str(other.to_string()),
    }
}

fn callable_name(value: &Value) -> String {
    match value {
        Value::Function(data) => data.display_name().to_string(),
        Value::Builtin(def) => def.name.to_string(),
        Value::Host(host) => host.name.clone(),
        other => other.type_name().to_string(),
    }
}

/// JSON text → host value, for the `json` native module.
pub fn from_json(json: &serde_json::Value) -> HostValue {
    match json {
        serde_json::Value::Null => HostValue::Null,
        serde_json::Value::Bool(b) => HostValue::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => HostValue::Int(i),
            None => HostValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => HostValue::Str(s.clone()),
        serde_json::Value::Array(items) => HostValue::Seq(items.iter().map(from_json).collect()),
        serde_json::Value::Object(obj) => {
            HostValue::Map(obj.iter().map(|(k, v)| (k.clone(), from_json(v))).collect())
        }
    }
}

/// Host value → JSON. Callables have no JSON shape and are reported back
/// to the script as an error.
pub fn to_json(hv: &HostValue) -> Result<serde_json::Value, String> {
    Ok(match hv {
        HostValue::Null => serde_json::Value::Null,
        HostValue::Bool(b) => serde_json::Value::Bool(*b),
        HostValue::Int(i) => serde_json::Value::Number((*i).into()),
        HostValue::Float(f) => match serde_json::Number::from_f64(*f) {
            Some(n) => serde_json::Value::Number(n),
            None => return Err(format!("cannot represent {} as JSON", format_number(*f))),
        },
        HostValue::Str(s) => serde_json::Value::String(s.clone()),
        HostValue::Seq(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        HostValue::Map(entries) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in entries {
                obj.insert(k.clone(), to_json(v)?);
            }
            serde_json::Value::Object(obj)
        }
        HostValue::Fn(name, _) => return Err(format!("cannot represent function '{name}' as JSON")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_to_value_table() {
        assert!(matches!(to_value(&HostValue::Null), Value::Number(n) if n == 0.0));
        assert!(matches!(to_value(&HostValue::Bool(true)), Value::Number(n) if n == 1.0));
        assert!(matches!(to_value(&HostValue::Int(7)), Value::Number(n) if n == 7.0));
        assert!(matches!(to_value(&HostValue::Str("x".into())), Value::Str(s) if s == "x"));

        let seq = to_value(&HostValue::Seq(vec![HostValue::Int(1), HostValue::Int(2)]));
        assert_eq!(seq.repr(), "[1, 2]");

        let map = to_value(&HostValue::Map(vec![("k".into(), HostValue::Int(1))]));
        assert_eq!(map.repr(), "{\"k\": 1}");
    }

    #[test]
    fn test_json_round_trip() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": [1, 2.5, "x", true, null]}"#).unwrap();
        let hv = from_json(&json);
        let back = to_json(&hv).unwrap();
        assert_eq!(json, back);
    }

    #[test]
    fn test_function_not_json_representable() {
        let hv = HostValue::Fn("f".into(), Rc::new(|_| Ok(HostValue::Null)));
        assert!(to_json(&hv).is_err());
    }
}
