//! Runtime values of the template script.
//!
//! Values follow JavaScript semantics where templates can observe them
//! (truthiness, `ToString`, equality, `+`) but are plain owned data: arrays
//! and objects are copied on assignment, not shared.

use std::fmt;

use indexmap::IndexMap;

use crate::builtins::Builtin;
use crate::ScriptError;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    /// Keys keep insertion order.
    Object(IndexMap<String, Value>),
    /// A native function or namespace (`Math`, `__e`, ...).
    Builtin(Builtin),
}

impl Value {
    /// Build an object from key/value pairs.
    pub fn object<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// An `Error`-like object: `{name, message}`.
    pub fn error(name: &str, message: impl Into<String>) -> Value {
        Value::object([
            ("name", Value::String(name.to_string())),
            ("message", Value::String(message.into())),
        ])
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Builtin(_) => true,
        }
    }

    /// Result of `typeof`.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Builtin(b) if b.is_namespace() => "object",
            Value::Builtin(_) => "function",
        }
    }

    /// Look up an object field (no prototype, no array indexing).
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// JavaScript `ToNumber`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => single.to_number(),
                _ => f64::NAN,
            },
            Value::Object(_) | Value::Builtin(_) => f64::NAN,
        }
    }

    /// JavaScript `ToString`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".into(),
            Value::Builtin(b) => format!("function {}() {{ [native code] }}", b.name()),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        // Arrays and objects have no identity, so structural equality stands in
        self == other
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Array(_) | Value::Object(_), Value::String(s))
            | (Value::String(s), Value::Array(_) | Value::Object(_)) => {
                let composite = if matches!(self, Value::String(_)) { other } else { self };
                composite.to_display_string() == *s
            }
            _ => self.strict_equals(other),
        }
    }

    /// Borrow `self[key]` when it is stored data (object field, array element).
    pub fn property_ref(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(&key.to_display_string()),
            Value::Array(items) => array_index(key).and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// `self[key]`, including computed properties like `length`.
    pub fn property(&self, key: &Value) -> Result<Value, ScriptError> {
        if self.is_nullish() {
            return Err(ScriptError::Type(format!(
                "Cannot read properties of {} (reading '{}')",
                self.to_display_string(),
                key.to_display_string()
            )));
        }
        if let Some(value) = self.property_ref(key) {
            return Ok(value.clone());
        }

        let name = key.to_display_string();
        Ok(match self {
            Value::String(s) if name == "length" => Value::Number(s.chars().count() as f64),
            Value::String(s) => match array_index(key).and_then(|i| s.chars().nth(i)) {
                Some(c) => Value::String(c.to_string()),
                None => Value::Undefined,
            },
            Value::Array(items) if name == "length" => Value::Number(items.len() as f64),
            Value::Builtin(builtin) => builtin.member(&name).unwrap_or_default(),
            _ => Value::Undefined,
        })
    }

    /// Mutable access to an existing object field or array element.
    pub fn property_mut(&mut self, key: &Value) -> Option<&mut Value> {
        match self {
            Value::Object(map) => map.get_mut(&key.to_display_string()),
            Value::Array(items) => array_index(key).and_then(|i| items.get_mut(i)),
            _ => None,
        }
    }

    /// `self[key] = value`
    pub fn set_property(&mut self, key: &Value, value: Value) -> Result<(), ScriptError> {
        match self {
            Value::Object(map) => {
                map.insert(key.to_display_string(), value);
                Ok(())
            }
            Value::Array(items) => match array_index(key) {
                Some(i) if i < items.len() => {
                    items[i] = value;
                    Ok(())
                }
                Some(i) if i == items.len() => {
                    items.push(value);
                    Ok(())
                }
                _ if key.to_display_string() == "length" => {
                    let len = value.to_number();
                    if len.fract() != 0.0 || len < 0.0 || len > items.len() as f64 {
                        return Err(ScriptError::Type("Invalid array length".into()));
                    }
                    items.truncate(len as usize);
                    Ok(())
                }
                _ => Err(ScriptError::Type(format!(
                    "Cannot set array element '{}'",
                    key.to_display_string()
                ))),
            },
            other => Err(ScriptError::Type(format!(
                "Cannot set properties of {} (setting '{}')",
                if other.is_nullish() {
                    other.to_display_string()
                } else {
                    other.type_of().to_string()
                },
                key.to_display_string()
            ))),
        }
    }

    /// Convert to JSON; `None` for values JSON cannot represent
    /// (`undefined`, functions).
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Value::Undefined | Value::Builtin(_) => return None,
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                serde_json::Value::Number((*n as i64).into())
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json().unwrap_or(serde_json::Value::Null))
                    .collect(),
            ),
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .filter_map(|(k, v)| v.to_json().map(|json| (k.clone(), json)))
                    .collect(),
            ),
        })
    }
}

/// A canonical array index: `2` or `"2"`, never `"02"` or `1.5`.
fn array_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < u32::MAX as f64 => {
            Some(*n as usize)
        }
        Value::String(s) => s
            .parse::<usize>()
            .ok()
            .filter(|i| i.to_string() == *s),
        _ => None,
    }
}

/// Format a number the way JavaScript's `Number.prototype.toString` does:
/// shortest round-trip digits, positional between `1e-7` and `1e21`,
/// exponent notation (`1.5e+300`, `1e-7`) outside that range.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n == 0.0 {
        // Also -0
        return "0".into();
    }

    let scientific = format!("{:e}", n.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let count = digits.len() as i32;
    // Position of the decimal point relative to the first digit
    let point = exponent.parse::<i32>().unwrap_or(0) + 1;

    let body = if count <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - count) as usize))
    } else if 0 < point && point <= 21 {
        let (integer, fraction) = digits.split_at(point as usize);
        format!("{integer}.{fraction}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat(-point as usize))
    } else {
        let (first, rest) = digits.split_at(1);
        let dot = if rest.is_empty() { "" } else { "." };
        let exponent = point - 1;
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{first}{dot}{rest}e{sign}{}", exponent.abs())
    };

    if n < 0.0 {
        format!("-{body}")
    } else {
        body
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
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

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(-1234.5), "-1234.5");
    }

    #[test]
    fn test_number_exponent_thresholds() {
        assert_eq!(format_number(1.5e300), "1.5e+300");
        assert_eq!(format_number(-2e25), "-2e+25");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(123456789012345680000.0), "123456789012345680000");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(1.25e-9), "1.25e-9");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(0.0000015), "0.0000015");
        assert_eq!(Value::Number(5e-324).to_display_string(), "5e-324");
    }

    #[test]
    fn test_to_string() {
        let array = Value::Array(vec![1.0.into(), Value::Null, "a".into()]);
        assert_eq!(array.to_display_string(), "1,,a");
        assert_eq!(Value::object([("a", Value::Null)]).to_string(), "[object Object]");
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::from(" 12 ").to_number(), 12.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("x").to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert!(Value::from("1").loose_equals(&Value::Number(1.0)));
        assert!(Value::Bool(true).loose_equals(&Value::Number(1.0)));
        assert!(Value::Array(vec![1.0.into(), 2.0.into()]).loose_equals(&Value::from("1,2")));
        assert!(!Value::from("1").strict_equals(&Value::Number(1.0)));
    }

    #[test]
    fn test_json_conversion() {
        let value = Value::from(json!({"name": {"first": "Gui"}, "n": [1, null]}));
        assert_eq!(
            value.get("name").and_then(|n| n.get("first")),
            Some(&Value::from("Gui"))
        );
        assert_eq!(value.to_json(), Some(json!({"name": {"first": "Gui"}, "n": [1, null]})));
    }

    #[test]
    fn test_property_read() {
        let value = Value::from(json!({"items": ["a", "b"], "name": "héllo"}));
        let items = value.property(&"items".into()).unwrap();
        assert_eq!(items.property(&Value::Number(1.0)).unwrap(), Value::from("b"));
        assert_eq!(items.property(&"length".into()).unwrap(), Value::Number(2.0));
        assert_eq!(items.property(&"01".into()).unwrap(), Value::Undefined);

        let name = value.property(&"name".into()).unwrap();
        assert_eq!(name.property(&"length".into()).unwrap(), Value::Number(5.0));
        assert_eq!(name.property(&Value::Number(1.0)).unwrap(), Value::from("é"));
    }

    #[test]
    fn test_property_of_nullish() {
        let err = Value::Undefined.property(&"x".into()).unwrap_err();
        assert_eq!(
            err,
            ScriptError::Type("Cannot read properties of undefined (reading 'x')".into())
        );
    }

    #[test]
    fn test_set_property() {
        let mut value = Value::Array(vec![]);
        value.set_property(&Value::Number(0.0), "a".into()).unwrap();
        value.set_property(&Value::Number(0.0), "b".into()).unwrap();
        assert_eq!(value, Value::Array(vec!["b".into()]));
        assert!(value.set_property(&Value::Number(5.0), "c".into()).is_err());

        let mut object = Value::Object(IndexMap::new());
        object.set_property(&"k".into(), Value::Null).unwrap();
        assert_eq!(object.get("k"), Some(&Value::Null));

        assert!(Value::from("s").set_property(&"k".into(), Value::Null).is_err());
    }

    #[test]
    fn test_undefined_fields_dropped_from_json() {
        let value = Value::object([("a", Value::Undefined), ("b", Value::Bool(true))]);
        assert_eq!(value.to_json(), Some(json!({"b": true})));
    }
}
