//! Value semantics and directive scanning shared by every stage.
//!
//! Template values are [`serde_json::Value`]s, but truthiness, equality and
//! stringification follow the loose rules template authors expect from
//! JavaScript-flavoured engines: `0`, `""`, `[]` and `{}` are falsy, `1 == 1.0`,
//! and integral floats print without a fractional part.

use serde_json::{Number, Value};
use std::convert::Infallible;

/// Numbers with a magnitude below this print as integers when they have no fraction.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Evaluate template truthiness.
///
/// `None` (undefined), `null`, `false`, `0`, `NaN`, `""`, `[]` and `{}` are falsy.
/// Everything else is truthy, including objects whose fields are all falsy.
#[must_use]
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Render a value the way it appears in template output.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => display_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(","),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn display_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Build a JSON number, collapsing integral values to integers.
///
/// Non-finite results become `null`.
#[must_use]
pub fn number_value(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Null;
    }
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        return Value::from(f as i64);
    }
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

/// Coerce a value to a number (`NaN` when there is no sensible conversion).
#[must_use]
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(Some(single)),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

/// Strict equality: same type and same value, with numbers compared numerically.
#[must_use]
pub fn strict_eq(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Find the byte offset of the `}}` closing a directive that opens at `open`.
///
/// Quoted strings inside the directive are skipped so `{{concat "}}" x}}` closes
/// at the final pair of braces.
#[must_use]
pub fn find_directive_end(template: &str, open: usize) -> Option<usize> {
    let bytes = template.as_bytes();
    let mut i = open + 2;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if b == b'}' && bytes.get(i + 1) == Some(&b'}') {
                    return Some(i);
                } else if b == b'{' && bytes.get(i + 1) == Some(&b'{') {
                    // A new directive opened before this one closed.
                    return None;
                }
            }
        }
        i += 1;
    }
    None
}

/// Rewrite every `{{ ... }}` directive in `template` through `replace`.
///
/// `replace` receives the trimmed directive body and returns `Some(text)` to
/// substitute the whole directive, or `None` to keep it verbatim.
pub fn replace_directives<F>(template: &str, mut replace: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    match try_replace_directives::<_, Infallible>(template, |inner| Ok(replace(inner))) {
        Ok(output) => output,
        Err(never) => match never {},
    }
}

/// Fallible variant of [`replace_directives`]; the first error aborts the scan.
pub fn try_replace_directives<F, E>(template: &str, mut replace: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<Option<String>, E>,
{
    let mut output = String::with_capacity(template.len());
    let mut cursor = 0;

    while let Some(rel) = template[cursor..].find("{{") {
        let open = cursor + rel;
        let Some(close) = find_directive_end(template, open) else {
            // Not a directive; emit the braces and keep scanning after them.
            output.push_str(&template[cursor..open + 2]);
            cursor = open + 2;
            continue;
        };

        output.push_str(&template[cursor..open]);
        let inner = template[open + 2..close].trim();
        match replace(inner)? {
            Some(replacement) => output.push_str(&replacement),
            None => output.push_str(&template[open..close + 2]),
        }
        cursor = close + 2;
    }

    output.push_str(&template[cursor..]);
    Ok(output)
}

/// Whether a directive body is a structural tag that no value stage should touch.
#[must_use]
pub fn is_structural(inner: &str) -> bool {
    inner.starts_with('#')
        || inner.starts_with('/')
        || inner.starts_with('>')
        || inner.starts_with('!')
        || inner == "else"
}

/// Split `source` at every top-level occurrence of `separator`.
///
/// Separators inside quotes or parentheses do not split.
#[must_use]
pub fn split_top_level(source: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (idx, c) in source.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(&source[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}
