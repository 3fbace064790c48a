use std::collections::BTreeMap;
use std::fmt;

/// The set of runtime value types seen by templates.
///
/// Expressions produce `Value`s during rendering. When a `Value` appears in
/// interpolation position it is converted to a string via
/// [`to_output_string`](Value::to_output_string). Internally, types are
/// preserved so that conditions, iteration, and arithmetic operate
/// correctly.
///
/// Conversion from common Rust types is provided via `From` impls, and the
/// whole [`serde_json::Value`] tree maps over losslessly, which makes
/// `serde_json::json!` the most convenient way to build render data:
///
/// ```rust
/// use zenmill::Value;
///
/// let data = Value::from(serde_json::json!({
///     "title": "hello",
///     "tags": ["a", "b"],
/// }));
/// assert!(data.is_truthy());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absence of a value. Falsy, renders as an empty string.
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// Keyed mapping. Iteration order is key order (code-point ascending).
    Object(BTreeMap<String, Value>),
    /// A callable provided by the render environment (`encodeURI`,
    /// `Math.floor`, ...). Never produced from user data.
    Builtin(Builtin),
}

/// Signature of a builtin function value.
///
/// The error string is wrapped into a
/// [`RenderError::Expression`](crate::RenderError) by the evaluator, which
/// supplies the expression text and source location.
pub type BuiltinFn = fn(&[Value]) -> Result<Value, String>;

/// A named native function exposed to expressions.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub call: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && std::ptr::fn_addr_eq(self.call, other.call)
    }
}

impl Value {
    /// Convert this value to its string representation for template output.
    ///
    /// - `Null` — empty string
    /// - `Bool` — `"true"` or `"false"`
    /// - `Number` — formatted without a trailing `.0` for whole numbers
    /// - `String` — returned as-is
    /// - `Array` — elements joined with `","`
    /// - `Object` — compact JSON text
    pub fn to_output_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| v.to_output_string())
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => serde_json::to_string(&self.to_json()).unwrap_or_default(),
            Value::Builtin(b) => format!("[builtin {}]", b.name),
        }
    }

    /// Type name for diagnostic messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Builtin(_) => "function",
        }
    }

    /// Truthiness check, used by `<if>`/`<when>` and `&&`/`||`.
    ///
    /// Falsy values: `Null`, `false`, `0`, `NaN`, empty string, empty
    /// array, empty object. Everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Builtin(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a [`serde_json::Value`]. Builtin functions are not
    /// representable and map to `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Builtin(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_output_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(m: BTreeMap<String, T>) -> Self {
        Value::Object(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}
