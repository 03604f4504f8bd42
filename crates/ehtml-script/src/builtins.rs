//! Native functions, namespaces and methods.
//!
//! Functions that need interpreter state (`__line`, `__context`,
//! `renderCustom`) are dispatched by the interpreter; everything here is a
//! pure function of its arguments.

use crate::value::Value;
use crate::ScriptError;

/// A native function or namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    // Render support
    Escape,
    Line,
    Blank,
    Context,
    RenderCustom,

    // Conversions and constructors
    String,
    Number,
    Boolean,
    Error,

    // Namespaces
    Math,
    Json,
    Array,
    Object,

    // Namespace members
    MathFloor,
    MathCeil,
    MathRound,
    MathAbs,
    MathMin,
    MathMax,
    JsonStringify,
    ArrayIsArray,
    ObjectKeys,
}

impl Builtin {
    /// Global binding for `name`, if any.
    pub fn global(name: &str) -> Option<Builtin> {
        Some(match name {
            "__e" => Builtin::Escape,
            "__line" => Builtin::Line,
            "__blank" => Builtin::Blank,
            "__context" => Builtin::Context,
            "renderCustom" => Builtin::RenderCustom,
            "String" => Builtin::String,
            "Number" => Builtin::Number,
            "Boolean" => Builtin::Boolean,
            "Error" => Builtin::Error,
            "Math" => Builtin::Math,
            "JSON" => Builtin::Json,
            "Array" => Builtin::Array,
            "Object" => Builtin::Object,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Escape => "__e",
            Builtin::Line => "__line",
            Builtin::Blank => "__blank",
            Builtin::Context => "__context",
            Builtin::RenderCustom => "renderCustom",
            Builtin::String => "String",
            Builtin::Number => "Number",
            Builtin::Boolean => "Boolean",
            Builtin::Error => "Error",
            Builtin::Math => "Math",
            Builtin::Json => "JSON",
            Builtin::Array => "Array",
            Builtin::Object => "Object",
            Builtin::MathFloor => "floor",
            Builtin::MathCeil => "ceil",
            Builtin::MathRound => "round",
            Builtin::MathAbs => "abs",
            Builtin::MathMin => "min",
            Builtin::MathMax => "max",
            Builtin::JsonStringify => "stringify",
            Builtin::ArrayIsArray => "isArray",
            Builtin::ObjectKeys => "keys",
        }
    }

    pub fn is_namespace(self) -> bool {
        matches!(self, Builtin::Math | Builtin::Json)
    }

    /// `Namespace.key`
    pub fn member(self, key: &str) -> Option<Value> {
        let member = match (self, key) {
            (Builtin::Math, "floor") => Builtin::MathFloor,
            (Builtin::Math, "ceil") => Builtin::MathCeil,
            (Builtin::Math, "round") => Builtin::MathRound,
            (Builtin::Math, "abs") => Builtin::MathAbs,
            (Builtin::Math, "min") => Builtin::MathMin,
            (Builtin::Math, "max") => Builtin::MathMax,
            (Builtin::Math, "PI") => return Some(Value::Number(std::f64::consts::PI)),
            (Builtin::Json, "stringify") => Builtin::JsonStringify,
            (Builtin::Array, "isArray") => Builtin::ArrayIsArray,
            (Builtin::Object, "keys") => Builtin::ObjectKeys,
            _ => return None,
        };
        Some(Value::Builtin(member))
    }
}

/// HTML-escape text: `& < > " '`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Call a pure builtin.
pub fn call(builtin: Builtin, args: &[Value]) -> Result<Value, ScriptError> {
    let first = args.first().unwrap_or(&Value::Undefined);

    Ok(match builtin {
        Builtin::Escape => {
            if first.is_nullish() {
                Value::String(String::new())
            } else {
                Value::String(escape_html(&first.to_display_string()))
            }
        }
        Builtin::Blank => Value::Bool(first.is_nullish() || first.to_display_string().trim().is_empty()),
        Builtin::String => match args.first() {
            Some(value) => Value::String(value.to_display_string()),
            None => Value::String(String::new()),
        },
        Builtin::Number => match args.first() {
            Some(value) => Value::Number(value.to_number()),
            None => Value::Number(0.0),
        },
        Builtin::Boolean => Value::Bool(first.is_truthy()),
        Builtin::Error => {
            let message = if first.is_nullish() {
                String::new()
            } else {
                first.to_display_string()
            };
            Value::error("Error", message)
        }
        Builtin::MathFloor => Value::Number(first.to_number().floor()),
        Builtin::MathCeil => Value::Number(first.to_number().ceil()),
        Builtin::MathRound => Value::Number((first.to_number() + 0.5).floor()),
        Builtin::MathAbs => Value::Number(first.to_number().abs()),
        Builtin::MathMin => Value::Number(fold_numbers(args, f64::INFINITY, f64::min)),
        Builtin::MathMax => Value::Number(fold_numbers(args, f64::NEG_INFINITY, f64::max)),
        Builtin::JsonStringify => match first.to_json() {
            Some(json) => Value::String(
                serde_json::to_string(&json).map_err(|e| ScriptError::Type(e.to_string()))?,
            ),
            None => Value::Undefined,
        },
        Builtin::ArrayIsArray => Value::Bool(matches!(first, Value::Array(_))),
        Builtin::ObjectKeys => {
            if first.is_nullish() {
                return Err(ScriptError::Type(
                    "Cannot convert undefined or null to object".into(),
                ));
            }
            Value::Array(keys(first).into_iter().map(Value::String).collect())
        }
        Builtin::Line
        | Builtin::Context
        | Builtin::RenderCustom
        | Builtin::Math
        | Builtin::Json
        | Builtin::Array
        | Builtin::Object => {
            return Err(ScriptError::Type(format!("{} is not a function", builtin.name())));
        }
    })
}

/// Own enumerable keys: object keys, or indices of arrays and strings.
pub fn keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// NaN anywhere wins, like `Math.min`/`Math.max`.
fn fold_numbers(args: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    args.iter().map(Value::to_number).fold(init, |acc, n| {
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            pick(acc, n)
        }
    })
}

// =========================================================================
// Methods
// =========================================================================

/// Call `receiver.name(args)`; `None` when there is no such method.
pub fn call_method(
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, ScriptError>> {
    let arg = |i: usize| args.get(i).unwrap_or(&Value::Undefined);

    if name == "toString" {
        return Some(Ok(Value::String(receiver.to_display_string())));
    }

    Some(Ok(match (receiver, name) {
        (Value::String(s), "toUpperCase") => Value::String(s.to_uppercase()),
        (Value::String(s), "toLowerCase") => Value::String(s.to_lowercase()),
        (Value::String(s), "trim") => Value::String(s.trim().to_string()),
        (Value::String(s), "includes") => Value::Bool(s.contains(&arg(0).to_display_string())),
        (Value::String(s), "startsWith") => {
            Value::Bool(s.starts_with(&arg(0).to_display_string()))
        }
        (Value::String(s), "endsWith") => Value::Bool(s.ends_with(&arg(0).to_display_string())),
        (Value::String(s), "indexOf") => {
            let needle = arg(0).to_display_string();
            Value::Number(match s.find(&needle) {
                Some(byte) => s[..byte].chars().count() as f64,
                None => -1.0,
            })
        }
        (Value::String(s), "slice") => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(chars.len(), arg(0), arg(1));
            Value::String(chars[start..end].iter().collect())
        }
        (Value::String(s), "split") => {
            let parts: Vec<Value> = match arg(0) {
                Value::Undefined => vec![Value::String(s.clone())],
                sep => {
                    let sep = sep.to_display_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::from).collect()
                    }
                }
            };
            Value::Array(parts)
        }
        (Value::String(s), "replace") => Value::String(s.replacen(
            &arg(0).to_display_string(),
            &arg(1).to_display_string(),
            1,
        )),
        (Value::String(s), "repeat") => {
            let count = arg(0).to_number();
            if !(0.0..=1e6).contains(&count) {
                return Some(Err(ScriptError::Type(format!(
                    "Invalid count value: {}",
                    arg(0).to_display_string()
                ))));
            }
            Value::String(s.repeat(count as usize))
        }

        (Value::Array(items), "join") => {
            let sep = match arg(0) {
                Value::Undefined => ",".to_string(),
                sep => sep.to_display_string(),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display_string()
                    }
                })
                .collect();
            Value::String(parts.join(&sep))
        }
        (Value::Array(items), "includes") => {
            let needle = arg(0);
            Value::Bool(items.iter().any(|item| same_value_zero(item, needle)))
        }
        (Value::Array(items), "indexOf") => {
            let needle = arg(0);
            Value::Number(
                items
                    .iter()
                    .position(|item| item.strict_equals(needle))
                    .map_or(-1.0, |i| i as f64),
            )
        }
        (Value::Array(items), "slice") => {
            let (start, end) = slice_bounds(items.len(), arg(0), arg(1));
            Value::Array(items[start..end].to_vec())
        }
        (Value::Array(items), "concat") => {
            let mut joined = items.clone();
            for extra in args {
                match extra {
                    Value::Array(more) => joined.extend(more.iter().cloned()),
                    other => joined.push(other.clone()),
                }
            }
            Value::Array(joined)
        }
        (Value::Array(items), "push") => {
            // Pushing onto a temporary: only the new length is observable
            Value::Number((items.len() + args.len()) as f64)
        }

        (Value::Number(n), "toFixed") => {
            let digits = arg(0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Value::String(format!("{n:.digits$}"))
        }

        _ => return None,
    }))
}

/// Resolve `slice(start, end)` arguments against a length.
fn slice_bounds(len: usize, start: &Value, end: &Value) -> (usize, usize) {
    let resolve = |value: &Value, default: usize| -> usize {
        if matches!(value, Value::Undefined) {
            return default;
        }
        let n = value.to_number();
        if n.is_nan() {
            0
        } else if n < 0.0 {
            len.saturating_sub((-n) as usize)
        } else {
            (n as usize).min(len)
        }
    };
    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn method(receiver: Value, name: &str, args: &[Value]) -> Value {
        call_method(&receiver, name, args).unwrap().unwrap()
    }

    // =========================================================================
    // Globals
    // =========================================================================

    #[test]
    fn test_escape() {
        assert_eq!(
            call(Builtin::Escape, &["<a href=\"x\">'&'</a>".into()]).unwrap(),
            Value::from("&lt;a href=&#34;x&#34;&gt;&#39;&amp;&#39;&lt;/a&gt;")
        );
        assert_eq!(call(Builtin::Escape, &[Value::Null]).unwrap(), Value::from(""));
        assert_eq!(call(Builtin::Escape, &[Value::Number(2.0)]).unwrap(), Value::from("2"));
    }

    #[test]
    fn test_blank() {
        assert_eq!(call(Builtin::Blank, &[]).unwrap(), Value::Bool(true));
        assert_eq!(call(Builtin::Blank, &[" \n".into()]).unwrap(), Value::Bool(true));
        assert_eq!(call(Builtin::Blank, &[" x ".into()]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call(Builtin::String, &[Value::Number(1.5)]).unwrap(), Value::from("1.5"));
        assert_eq!(call(Builtin::String, &[]).unwrap(), Value::from(""));
        assert_eq!(call(Builtin::Number, &["7".into()]).unwrap(), Value::Number(7.0));
        assert_eq!(call(Builtin::Boolean, &["".into()]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_error_object() {
        let err = call(Builtin::Error, &["hi".into()]).unwrap();
        assert_eq!(err.get("message"), Some(&Value::from("hi")));
        assert_eq!(err.get("name"), Some(&Value::from("Error")));
    }

    #[test]
    fn test_math() {
        assert_eq!(call(Builtin::MathRound, &[Value::Number(2.5)]).unwrap(), Value::Number(3.0));
        assert_eq!(call(Builtin::MathRound, &[Value::Number(-2.5)]).unwrap(), Value::Number(-2.0));
        assert_eq!(
            call(Builtin::MathMax, &[Value::Number(1.0), Value::Number(3.0)]).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(call(Builtin::MathMin, &[]).unwrap(), Value::Number(f64::INFINITY));
    }

    #[test]
    fn test_json_stringify() {
        let value = Value::object([("a", Value::Array(vec![1.0.into(), "x".into()]))]);
        assert_eq!(
            call(Builtin::JsonStringify, &[value]).unwrap(),
            Value::from(r#"{"a":[1,"x"]}"#)
        );
        assert_eq!(call(Builtin::JsonStringify, &[]).unwrap(), Value::Undefined);

        let value = Value::object([("zeta", Value::Number(1.0)), ("alpha", Value::Number(2.0))]);
        assert_eq!(
            call(Builtin::JsonStringify, &[value]).unwrap(),
            Value::from(r#"{"zeta":1,"alpha":2}"#)
        );
    }

    #[test]
    fn test_object_keys() {
        let value = Value::object([("b", Value::Null), ("a", Value::Null)]);
        assert_eq!(
            call(Builtin::ObjectKeys, &[value]).unwrap(),
            Value::Array(vec!["b".into(), "a".into()])
        );
        assert!(call(Builtin::ObjectKeys, &[Value::Null]).is_err());
    }

    #[test]
    fn test_namespace_members() {
        assert_eq!(Builtin::Math.member("floor"), Some(Value::Builtin(Builtin::MathFloor)));
        assert_eq!(Builtin::Math.member("nope"), None);
        assert!(call(Builtin::Math, &[]).is_err());
    }

    // =========================================================================
    // Methods
    // =========================================================================

    #[test]
    fn test_string_methods() {
        let s = || Value::from("Hello World");
        assert_eq!(method(s(), "toUpperCase", &[]), Value::from("HELLO WORLD"));
        assert_eq!(method(s(), "indexOf", &["World".into()]), Value::Number(6.0));
        assert_eq!(method(s(), "slice", &[Value::Number(-5.0)]), Value::from("World"));
        assert_eq!(
            method(s(), "split", &[" ".into()]),
            Value::Array(vec!["Hello".into(), "World".into()])
        );
        assert_eq!(method(s(), "replace", &["o".into(), "0".into()]), Value::from("Hell0 World"));
        assert_eq!(method("ab".into(), "repeat", &[Value::Number(2.0)]), Value::from("abab"));
    }

    #[test]
    fn test_multibyte_string_indexes() {
        assert_eq!(method("héllo".into(), "indexOf", &["l".into()]), Value::Number(2.0));
        assert_eq!(
            method("héllo".into(), "slice", &[Value::Number(1.0), Value::Number(3.0)]),
            Value::from("él")
        );
    }

    #[test]
    fn test_array_methods() {
        let items = || Value::Array(vec![1.0.into(), Value::Null, "x".into()]);
        assert_eq!(method(items(), "join", &[]), Value::from("1,,x"));
        assert_eq!(method(items(), "join", &[" - ".into()]), Value::from("1 -  - x"));
        assert_eq!(method(items(), "includes", &["x".into()]), Value::Bool(true));
        assert_eq!(method(items(), "indexOf", &[Value::Null]), Value::Number(1.0));
        assert_eq!(
            method(items(), "slice", &[Value::Number(1.0)]),
            Value::Array(vec![Value::Null, "x".into()])
        );
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(method(Value::Number(1.005), "toFixed", &[Value::Number(1.0)]), Value::from("1.0"));
        assert_eq!(method(Value::Number(2.0), "toFixed", &[Value::Number(2.0)]), Value::from("2.00"));
    }

    #[test]
    fn test_unknown_method() {
        assert!(call_method(&Value::Null, "trim", &[]).is_none());
        assert!(call_method(&Value::from("x"), "nope", &[]).is_none());
    }
}
