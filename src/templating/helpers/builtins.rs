//! Built-in helpers registered on every [`HelperRegistry::new`].
//!
//! Helpers are grouped the way template authors look for them: comparison,
//! math, string, array, date/time, type checks and utility. Every helper is a
//! pure function over its arguments; missing arguments behave like
//! `undefined`.

use anyhow::Result;
use chrono::{Local, SecondsFormat, Utc};
use serde_json::Value;

use super::{HelperArgs, HelperRegistry};
use crate::templating::utils::{display_value, is_truthy, number_value, strict_eq, to_number};

pub(super) fn register_builtins(registry: &mut HelperRegistry) {
    register_comparison(registry);
    register_math(registry);
    register_string(registry);
    register_array(registry);
    register_date(registry);
    register_type_checks(registry);
    register_utility(registry);
}

fn register_comparison(registry: &mut HelperRegistry) {
    registry.register("eq", |args| Ok(Value::Bool(strict_eq(args.get(0), args.get(1)))));
    registry.register("neq", |args| Ok(Value::Bool(!strict_eq(args.get(0), args.get(1)))));
    registry.register("lt", |args| Ok(Value::Bool(args.number(0) < args.number(1))));
    registry.register("lte", |args| Ok(Value::Bool(args.number(0) <= args.number(1))));
    registry.register("gt", |args| Ok(Value::Bool(args.number(0) > args.number(1))));
    registry.register("gte", |args| Ok(Value::Bool(args.number(0) >= args.number(1))));
    registry.register("and", |args| Ok(Value::Bool(args.iter().all(is_truthy))));
    registry.register("or", |args| Ok(Value::Bool(args.iter().any(is_truthy))));
    registry.register("not", |args| Ok(Value::Bool(!is_truthy(args.get(0)))));
}

fn register_math(registry: &mut HelperRegistry) {
    registry.register("add", |args| Ok(number_value(args.number(0) + args.number(1))));
    registry.register("subtract", |args| Ok(number_value(args.number(0) - args.number(1))));
    registry.register("multiply", |args| Ok(number_value(args.number(0) * args.number(1))));
    registry.register("divide", |args| {
        let divisor = args.number(1);
        if divisor == 0.0 {
            return Ok(Value::from(0));
        }
        Ok(number_value(args.number(0) / divisor))
    });
    registry.register("mod", |args| {
        let divisor = args.number(1);
        if divisor == 0.0 {
            return Ok(Value::from(0));
        }
        Ok(number_value(args.number(0) % divisor))
    });
    // Half-way values round towards positive infinity.
    registry.register("round", |args| Ok(number_value((args.number(0) + 0.5).floor())));
    registry.register("floor", |args| Ok(number_value(args.number(0).floor())));
    registry.register("ceil", |args| Ok(number_value(args.number(0).ceil())));
    registry.register("abs", |args| Ok(number_value(args.number(0).abs())));
    registry.register("min", |args| Ok(fold_numbers(args, f64::INFINITY, f64::min)));
    registry.register("max", |args| Ok(fold_numbers(args, f64::NEG_INFINITY, f64::max)));
}

/// Fold every argument as a number; any `NaN` argument makes the result `null`.
fn fold_numbers(args: &HelperArgs, init: f64, op: fn(f64, f64) -> f64) -> Value {
    let mut acc = init;
    for value in args.iter() {
        let n = to_number(value);
        if n.is_nan() {
            return Value::Null;
        }
        acc = op(acc, n);
    }
    number_value(acc)
}

fn register_string(registry: &mut HelperRegistry) {
    registry.register("uppercase", |args| Ok(Value::String(args.string(0).to_uppercase())));
    registry.register("lowercase", |args| Ok(Value::String(args.string(0).to_lowercase())));
    registry.register("capitalize", |args| Ok(Value::String(capitalize(&args.string(0)))));
    registry.register("titlecase", |args| Ok(Value::String(titlecase(&args.string(0)))));
    registry.register("concat", |args| {
        Ok(Value::String(args.iter().map(|v| v.map(display_value).unwrap_or_default()).collect()))
    });
    registry.register("trim", |args| Ok(Value::String(args.string(0).trim().to_string())));
    registry.register("replace", |args| {
        let text = args.string(0);
        Ok(Value::String(text.replacen(&args.string(1), &args.string(2), 1)))
    });
    registry.register("substring", |args| {
        let text = args.string(0);
        let end = (!args.is_undefined(2)).then(|| args.number(2));
        Ok(Value::String(substring(&text, args.number(1), end)))
    });
    registry.register("length", |args| Ok(Value::from(length_of(args.get(0)))));
    registry.register("contains", |args| {
        let found = match args.get(0) {
            Some(Value::Array(items)) => items.iter().any(|item| strict_eq(Some(item), args.get(1))),
            Some(value) => display_value(value).contains(&args.string(1)),
            None => false,
        };
        Ok(Value::Bool(found))
    });
    registry.register("startsWith", |args| Ok(Value::Bool(args.string(0).starts_with(&args.string(1)))));
    registry.register("endsWith", |args| Ok(Value::Bool(args.string(0).ends_with(&args.string(1)))));
    registry.register("split", |args| {
        let text = args.string(0);
        let parts: Vec<Value> = if args.is_undefined(1) {
            vec![Value::String(text)]
        } else {
            let separator = args.string(1);
            if separator.is_empty() {
                text.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                text.split(separator.as_str()).map(|s| Value::String(s.to_string())).collect()
            }
        };
        Ok(Value::Array(parts))
    });
    registry.register("join", |args| {
        let separator = if args.is_undefined(1) {
            ",".to_string()
        } else {
            args.string(1)
        };
        Ok(join_value(args.value(0), &separator))
    });
}

fn register_array(registry: &mut HelperRegistry) {
    registry.register("first", |args| Ok(first_value(args.value(0))));
    registry.register("last", |args| Ok(last_value(args.value(0))));
    registry.register("reverse", |args| Ok(reverse_value(args.value(0))));
    registry.register("sort", |args| {
        let Some(Value::Array(items)) = args.get(0) else {
            return Ok(args.value(0).clone());
        };
        let mut sorted = items.clone();
        sorted.sort_by_key(display_value);
        Ok(Value::Array(sorted))
    });
    registry.register("unique", |args| {
        let Some(Value::Array(items)) = args.get(0) else {
            return Ok(args.value(0).clone());
        };
        let mut seen: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !seen.iter().any(|existing| strict_eq(Some(existing), Some(item))) {
                seen.push(item.clone());
            }
        }
        Ok(Value::Array(seen))
    });
}

fn register_date(registry: &mut HelperRegistry) {
    registry.register("now", |_| Ok(Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))));
    registry.register("date", |args| {
        let formatted = match args.get(0).and_then(Value::as_str) {
            Some("iso") => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            Some("date") => Local::now().format("%Y-%m-%d").to_string(),
            Some("time") => Local::now().format("%H:%M:%S").to_string(),
            _ => Local::now().format("%-m/%-d/%Y, %-I:%M:%S %p").to_string(),
        };
        Ok(Value::String(formatted))
    });
}

fn register_type_checks(registry: &mut HelperRegistry) {
    registry.register("isArray", |args| Ok(Value::Bool(matches!(args.get(0), Some(Value::Array(_))))));
    registry.register("isObject", |args| Ok(Value::Bool(matches!(args.get(0), Some(Value::Object(_))))));
    registry.register("isString", |args| Ok(Value::Bool(matches!(args.get(0), Some(Value::String(_))))));
    registry.register("isNumber", |args| Ok(Value::Bool(matches!(args.get(0), Some(Value::Number(_))))));
    registry.register("isBoolean", |args| Ok(Value::Bool(matches!(args.get(0), Some(Value::Bool(_))))));
    registry.register("isDefined", |args| Ok(Value::Bool(!args.is_undefined(0))));
    registry.register("isUndefined", |args| Ok(Value::Bool(args.is_undefined(0))));
    registry.register("isNull", |args| Ok(Value::Bool(matches!(args.get(0), Some(Value::Null)))));
    registry.register("isEmpty", |args| {
        let empty = match args.get(0) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(Value::Bool(_) | Value::Number(_)) => false,
        };
        Ok(Value::Bool(empty))
    });
}

fn register_utility(registry: &mut HelperRegistry) {
    registry.register("default", |args| match args.get(0) {
        None | Some(Value::Null) => Ok(args.value(1).clone()),
        Some(value) => Ok(value.clone()),
    });
    registry.register("json", |args| -> Result<Value> {
        match args.get(0) {
            Some(value) => Ok(Value::String(serde_json::to_string_pretty(value)?)),
            None => Ok(Value::Null),
        }
    });
    registry.register("parseJson", |args| Ok(serde_json::from_str(&args.string(0)).unwrap_or(Value::Null)));
}

/// Upper-case the first character and lower-case the rest.
pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

/// Capitalize every space-separated word.
pub(crate) fn titlecase(text: &str) -> String {
    text.split(' ').map(capitalize).collect::<Vec<_>>().join(" ")
}

/// Character-based substring with clamped, order-insensitive bounds.
fn substring(text: &str, start: f64, end: Option<f64>) -> String {
    let len = text.chars().count();
    let clamp = |n: f64| if n.is_nan() { 0 } else { n.clamp(0.0, len as f64) as usize };
    let start = clamp(start);
    let end = end.map_or(len, clamp);
    let (from, to) = if start <= end { (start, end) } else { (end, start) };
    text.chars().skip(from).take(to - from).collect()
}

/// Array length, string length in characters, object key count, or 0.
pub(crate) fn length_of(value: Option<&Value>) -> usize {
    match value {
        Some(Value::Array(items)) => items.len(),
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Object(map)) => map.len(),
        _ => 0,
    }
}

pub(crate) fn first_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

pub(crate) fn last_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => items.last().cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Reverse an array, or the characters of a string.
pub(crate) fn reverse_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().rev().cloned().collect()),
        Value::String(s) => Value::String(s.chars().rev().collect()),
        other => other.clone(),
    }
}

/// Join an array's elements with `separator`; other values are stringified.
pub(crate) fn join_value(value: &Value, separator: &str) -> Value {
    match value {
        Value::Array(items) => {
            Value::String(items.iter().map(display_value).collect::<Vec<_>>().join(separator))
        }
        Value::Null => Value::Null,
        other => Value::String(display_value(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Vec<Option<Value>>) -> Value {
        HelperRegistry::new().execute(name, &HelperArgs::new(args)).unwrap()
    }

    fn some(values: &[Value]) -> Vec<Option<Value>> {
        values.iter().cloned().map(Some).collect()
    }

    #[test]
    fn test_comparison_helpers() {
        assert_eq!(call("eq", some(&[json!(1), json!(1.0)])), json!(true));
        assert_eq!(call("eq", some(&[json!(1), json!("1")])), json!(false));
        assert_eq!(call("neq", some(&[json!("a"), json!("b")])), json!(true));
        assert_eq!(call("lt", some(&[json!("2"), json!(10)])), json!(true));
        assert_eq!(call("gte", some(&[json!(3), json!(3)])), json!(true));
        assert_eq!(call("and", some(&[json!(1), json!("x"), json!([0])])), json!(true));
        assert_eq!(call("and", some(&[json!(1), json!(0)])), json!(false));
        assert_eq!(call("or", vec![None, Some(json!(""))]), json!(false));
        assert_eq!(call("not", vec![None]), json!(true));
    }

    #[test]
    fn test_math_helpers() {
        assert_eq!(call("add", some(&[json!(2), json!(3)])), json!(5));
        assert_eq!(call("divide", some(&[json!(10), json!(0)])), json!(0));
        assert_eq!(call("divide", some(&[json!(7), json!(2)])), json!(3.5));
        assert_eq!(call("mod", some(&[json!(7), json!(0)])), json!(0));
        assert_eq!(call("mod", some(&[json!(7), json!(3)])), json!(1));
        assert_eq!(call("round", some(&[json!(2.5)])), json!(3));
        assert_eq!(call("round", some(&[json!(-2.5)])), json!(-2));
        assert_eq!(call("min", some(&[json!(4), json!(-1), json!(2)])), json!(-1));
        assert_eq!(call("max", some(&[json!(4), json!(9), json!(2)])), json!(9));
        assert_eq!(call("add", some(&[json!("x"), json!(1)])), Value::Null);
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(call("capitalize", some(&[json!("hELLO")])), json!("Hello"));
        assert_eq!(call("titlecase", some(&[json!("the quick fox")])), json!("The Quick Fox"));
        assert_eq!(call("concat", vec![Some(json!("a")), None, Some(json!(1))]), json!("a1"));
        assert_eq!(call("replace", some(&[json!("a-b-c"), json!("-"), json!("+")])), json!("a+b-c"));
        assert_eq!(call("substring", some(&[json!("template"), json!(1), json!(4)])), json!("emp"));
        assert_eq!(call("substring", some(&[json!("template"), json!(4)])), json!("late"));
        assert_eq!(call("split", some(&[json!("a,b"), json!(",")])), json!(["a", "b"]));
        assert_eq!(call("join", some(&[json!(["a", "b"])])), json!("a,b"));
        assert_eq!(call("contains", some(&[json!([1, 2]), json!(2)])), json!(true));
        assert_eq!(call("startsWith", some(&[json!("quill"), json!("qu")])), json!(true));
    }

    #[test]
    fn test_length_counts_by_type() {
        assert_eq!(call("length", some(&[json!([1, 2, 3])])), json!(3));
        assert_eq!(call("length", some(&[json!("héllo")])), json!(5));
        assert_eq!(call("length", some(&[json!({"a": 1, "b": 2})])), json!(2));
        assert_eq!(call("length", some(&[json!(42)])), json!(0));
    }

    #[test]
    fn test_array_helpers() {
        assert_eq!(call("first", some(&[json!([1, 2])])), json!(1));
        assert_eq!(call("last", some(&[json!([1, 2])])), json!(2));
        assert_eq!(call("reverse", some(&[json!([1, 2])])), json!([2, 1]));
        assert_eq!(call("sort", some(&[json!([10, 9, 1])])), json!([1, 10, 9]));
        assert_eq!(call("unique", some(&[json!([2, 1, 2, 3, 1])])), json!([2, 1, 3]));
    }

    #[test]
    fn test_type_checks() {
        assert_eq!(call("isObject", some(&[json!([])])), json!(false));
        assert_eq!(call("isObject", some(&[json!(null)])), json!(false));
        assert_eq!(call("isNull", some(&[json!(null)])), json!(true));
        assert_eq!(call("isNull", vec![None]), json!(false));
        assert_eq!(call("isDefined", some(&[json!(null)])), json!(true));
        assert_eq!(call("isUndefined", vec![None]), json!(true));
        assert_eq!(call("isEmpty", some(&[json!(0)])), json!(false));
        assert_eq!(call("isEmpty", some(&[json!(false)])), json!(false));
        assert_eq!(call("isEmpty", some(&[json!({})])), json!(true));
        assert_eq!(call("isEmpty", vec![None]), json!(true));
    }

    #[test]
    fn test_utility_helpers() {
        assert_eq!(call("default", vec![None, Some(json!("fb"))]), json!("fb"));
        assert_eq!(call("default", some(&[json!(0), json!("fb")])), json!(0));
        assert_eq!(call("json", some(&[json!({"a": 1})])), json!("{\n  \"a\": 1\n}"));
        assert_eq!(call("parseJson", some(&[json!("{\"a\":1}")])), json!({"a": 1}));
        assert_eq!(call("parseJson", some(&[json!("{nope")])), Value::Null);
    }

    #[test]
    fn test_date_helpers() {
        let now = call("now", vec![]);
        let now = now.as_str().unwrap();
        assert!(now.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(now).is_ok());

        let date = call("date", some(&[json!("date")]));
        assert_eq!(date.as_str().unwrap().len(), 10);
    }
}
