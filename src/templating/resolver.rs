//! Variable path resolution and the plain-variable stage.
//!
//! Paths are dotted (`user.profile.name`), may index arrays with brackets
//! (`items[0].name`) or numeric segments (`items.0`), and may name a loop-scoped
//! special variable (`@index`, `@first`, `@last`, `@key`, `@odd`, `@even`,
//! `@total`). A trailing `.length` on an array or string yields its length.
//!
//! Resolution never fails: a missing key, an out-of-bounds index or a `null`
//! intermediate all resolve to `None` (undefined), and the plain-variable stage
//! leaves such directives in the output untouched.

use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::blocks::{BlockKind, find_blocks};
use super::context::{Context, INDEX_KEY, KEY_KEY, TOTAL_KEY};
use super::helpers::expression::{parse_literal, split_call, split_commas, split_words};
use super::utils::{display_value, is_structural, replace_directives, split_top_level};

/// Shape of a directive body that the plain-variable stage interpolates.
static VARIABLE_PATH: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^@?[A-Za-z_$][\w$-]*(\[\d+\])*(\.[A-Za-z0-9_$@-]+(\[\d+\])*)*$").ok()
});

/// Resolve `path` against `context`.
///
/// Returns `None` when any segment is missing.
#[must_use]
pub fn resolve(path: &str, context: &Context) -> Option<Value> {
    let path = path.trim();
    if let Some(special) = path.strip_prefix('@') {
        return resolve_special(special, context);
    }

    let mut segments = path.split('.').peekable();
    let first = segments.next()?;
    let mut current = resolve_segment(first, |key| context.get(key))?;

    while let Some(segment) = segments.next() {
        if segment == "length" && segments.peek().is_none() {
            if let Some(len) = sequence_length(current) {
                return Some(Value::from(len));
            }
        }
        current = resolve_segment(segment, |key| lookup(current, key))?;
    }

    Some(current.clone())
}

/// Whether `path` resolves to a defined value.
#[must_use]
pub fn is_defined(path: &str, context: &Context) -> bool {
    resolve(path, context).is_some()
}

/// Whether a directive body looks like a plain variable reference.
#[must_use]
pub fn is_variable_path(candidate: &str) -> bool {
    VARIABLE_PATH.as_ref().is_some_and(|re| re.is_match(candidate))
}

/// Replace every resolvable `{{path}}` directive with its value.
///
/// Unresolvable paths are left as literal text.
#[must_use]
pub fn substitute_variables(template: &str, context: &Context) -> String {
    replace_directives(template, |inner| {
        if is_structural(inner) || !is_variable_path(inner) {
            return None;
        }
        match resolve(inner, context) {
            Some(value) => Some(display_value(&value)),
            None => {
                tracing::trace!("Leaving unresolved variable '{}' in place", inner);
                None
            }
        }
    })
}

/// Collect the context paths `template` reads, sorted and de-duplicated.
///
/// Paths inside `{{#each}}` bodies are item-scoped and skipped, as are
/// `@`-variables and `this`. Block conditions, loop collections, helper
/// arguments and pipe bases are included. A bare name is always a path, even
/// when a helper shares it.
#[must_use]
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut found = BTreeSet::new();
    collect_variables(template, &mut found);
    found.into_iter().collect()
}

fn collect_variables(template: &str, found: &mut BTreeSet<String>) {
    let mut cursor = 0;
    for block in find_blocks(template) {
        collect_directive_paths(&template[cursor..block.start], found);
        collect_expression_paths(block.argument, found);
        if block.kind != BlockKind::Each {
            collect_variables(block.body, found);
        }
        if let Some(else_body) = block.else_body {
            collect_variables(else_body, found);
        }
        cursor = block.end;
    }
    collect_directive_paths(&template[cursor..], found);
}

fn collect_directive_paths(text: &str, found: &mut BTreeSet<String>) {
    replace_directives(text, |inner| {
        if let Some(reference) = inner.strip_prefix('>') {
            // Only the context expression of a partial reference is a path.
            if let Some(expr) = reference.split_whitespace().nth(1) {
                collect_expression_paths(expr, found);
            }
        } else if !is_structural(inner) {
            let segments = split_top_level(inner, '|');
            if segments.len() > 1 {
                collect_expression_paths(segments[0], found);
            } else {
                collect_expression_paths(inner, found);
            }
        }
        None
    });
}

/// Record the variable paths an expression reads (helper names excluded).
fn collect_expression_paths(expression: &str, found: &mut BTreeSet<String>) {
    let expression = expression.trim();
    if expression.is_empty() || parse_literal(expression).is_some() {
        return;
    }

    if let Some((_, args)) = split_call(expression) {
        for arg in split_commas(args) {
            collect_expression_paths(arg, found);
        }
        return;
    }

    let inner = expression.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')).unwrap_or(expression);
    let words = split_words(inner);
    if words.len() > 1 {
        for arg in &words[1..] {
            collect_expression_paths(arg, found);
        }
        return;
    }

    let loop_scoped = expression.starts_with('@') || expression == "this" || expression.starts_with("this.");
    if is_variable_path(expression) && !loop_scoped {
        found.insert(expression.to_string());
    }
}

/// Resolve one dotted segment, which may carry one or more `[N]` suffixes.
fn resolve_segment<'a, F>(segment: &str, lookup_key: F) -> Option<&'a Value>
where
    F: FnOnce(&str) -> Option<&'a Value>,
{
    let (name, indexes) = match segment.find('[') {
        Some(pos) => (&segment[..pos], &segment[pos..]),
        None => (segment, ""),
    };

    let mut current = lookup_key(name)?;
    if current.is_null() && !indexes.is_empty() {
        return None;
    }

    let mut rest = indexes;
    while let Some(stripped) = rest.strip_prefix('[') {
        let close = stripped.find(']')?;
        let index: usize = stripped[..close].trim().parse().ok()?;
        current = current.as_array()?.get(index)?;
        rest = &stripped[close + 1..];
    }

    if !rest.is_empty() {
        return None;
    }
    Some(current)
}

fn lookup<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}

/// Element count of an array or character count of a string, for a trailing `.length`.
fn sequence_length(value: &Value) -> Option<usize> {
    match value {
        Value::Array(items) => Some(items.len()),
        Value::String(s) => Some(s.chars().count()),
        _ => None,
    }
}

fn resolve_special(name: &str, context: &Context) -> Option<Value> {
    let index = || context.get(INDEX_KEY).and_then(Value::as_u64);
    let total = || context.get(TOTAL_KEY).and_then(Value::as_u64);

    match name {
        "index" => index().map(Value::from),
        "key" => context.get(KEY_KEY).cloned(),
        "total" => total().map(Value::from),
        "first" => index().map(|i| Value::Bool(i == 0)),
        "last" => match (index(), total()) {
            (Some(i), Some(t)) => Some(Value::Bool(i + 1 == t)),
            _ => None,
        },
        "odd" => index().map(|i| Value::Bool(i % 2 == 1)),
        "even" => index().map(|i| Value::Bool(i % 2 == 0)),
        _ => None,
    }
}
