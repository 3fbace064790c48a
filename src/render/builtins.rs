//! The fixed global environment seeded into every render scope.
//!
//! These mirror the identifiers the original host language made available
//! inside expressions: the URI-encoding family plus `Math`, `JSON`,
//! `Object`, and `Date` namespace objects. User data merges over them, so
//! a data key named `Math` simply shadows the namespace for that render.

use std::collections::{BTreeMap, HashMap};

use crate::ast::value::{Builtin, BuiltinFn, Value};

use super::runtime::{percent_decode, percent_encode};

// Unreserved sets from the host-language encodeURI / encodeURIComponent.
const URI_KEEP: &str = "-_.!~*'();,/?:@&=+$#";
const URI_COMPONENT_KEEP: &str = "-_.!~*'()";

pub(super) fn globals() -> HashMap<String, Value> {
    let mut g = HashMap::new();
    g.insert("encodeURI".to_string(), builtin("encodeURI", encode_uri));
    g.insert(
        "encodeURIComponent".to_string(),
        builtin("encodeURIComponent", encode_uri_component),
    );
    g.insert("decodeURI".to_string(), builtin("decodeURI", decode_uri));
    g.insert(
        "decodeURIComponent".to_string(),
        builtin("decodeURIComponent", decode_uri),
    );
    g.insert("Math".to_string(), math());
    g.insert("JSON".to_string(), json());
    g.insert("Object".to_string(), object());
    g.insert("Date".to_string(), date());
    g
}

fn builtin(name: &'static str, call: BuiltinFn) -> Value {
    Value::Builtin(Builtin { name, call })
}

fn namespace(entries: Vec<(&str, Value)>) -> Value {
    Value::Object(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn math() -> Value {
    namespace(vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        ("floor", builtin("Math.floor", |args| {
            Ok(Value::Number(first_number(args)?.floor()))
        })),
        ("ceil", builtin("Math.ceil", |args| {
            Ok(Value::Number(first_number(args)?.ceil()))
        })),
        ("round", builtin("Math.round", |args| {
            // Half-up, toward positive infinity.
            Ok(Value::Number((first_number(args)? + 0.5).floor()))
        })),
        ("abs", builtin("Math.abs", |args| {
            Ok(Value::Number(first_number(args)?.abs()))
        })),
        ("sqrt", builtin("Math.sqrt", |args| {
            Ok(Value::Number(first_number(args)?.sqrt()))
        })),
        ("pow", builtin("Math.pow", |args| {
            let base = number_at(args, 0)?;
            let exp = number_at(args, 1)?;
            Ok(Value::Number(base.powf(exp)))
        })),
        ("min", builtin("Math.min", |args| {
            fold_numbers(args, f64::INFINITY, f64::min)
        })),
        ("max", builtin("Math.max", |args| {
            fold_numbers(args, f64::NEG_INFINITY, f64::max)
        })),
    ])
}

fn json() -> Value {
    namespace(vec![
        ("stringify", builtin("JSON.stringify", |args| {
            let value = args.first().unwrap_or(&Value::Null);
            serde_json::to_string(&value.to_json())
                .map(Value::String)
                .map_err(|e| e.to_string())
        })),
        ("parse", builtin("JSON.parse", |args| {
            let text = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| "JSON.parse requires a string".to_string())?;
            serde_json::from_str::<serde_json::Value>(text)
                .map(Value::from)
                .map_err(|e| e.to_string())
        })),
    ])
}

fn object() -> Value {
    namespace(vec![
        ("keys", builtin("Object.keys", |args| {
            with_object(args, |map| {
                Value::Array(map.keys().map(|k| Value::String(k.clone())).collect())
            })
        })),
        ("values", builtin("Object.values", |args| {
            with_object(args, |map| Value::Array(map.values().cloned().collect()))
        })),
    ])
}

fn date() -> Value {
    namespace(vec![("now", builtin("Date.now", |_args| {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| e.to_string())?
            .as_millis();
        Ok(Value::Number(millis as f64))
    }))])
}

fn encode_uri(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(percent_encode(&first_string(args), URI_KEEP)))
}

fn encode_uri_component(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(percent_encode(
        &first_string(args),
        URI_COMPONENT_KEEP,
    )))
}

fn decode_uri(args: &[Value]) -> Result<Value, String> {
    percent_decode(&first_string(args)).map(Value::String)
}

fn first_string(args: &[Value]) -> String {
    args.first().map(Value::to_output_string).unwrap_or_default()
}

fn first_number(args: &[Value]) -> Result<f64, String> {
    number_at(args, 0)
}

fn number_at(args: &[Value], index: usize) -> Result<f64, String> {
    args.get(index)
        .and_then(Value::as_number)
        .ok_or_else(|| format!("argument {} must be a number", index + 1))
}

fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> Result<Value, String> {
    let mut acc = init;
    for (i, arg) in args.iter().enumerate() {
        acc = f(acc, number_at(args, i).map_err(|_| {
            format!("argument {} must be a number, got {}", i + 1, arg.type_name())
        })?);
    }
    Ok(Value::Number(acc))
}

fn with_object(args: &[Value], f: impl Fn(&BTreeMap<String, Value>) -> Value) -> Result<Value, String> {
    match args.first() {
        Some(Value::Object(map)) => Ok(f(map)),
        other => Err(format!(
            "expected an object, got {}",
            other.map(|v| v.type_name()).unwrap_or("nothing")
        )),
    }
}
