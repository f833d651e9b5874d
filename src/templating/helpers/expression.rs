//! Helper argument parsing and evaluation.
//!
//! An argument token is one of:
//!
//! - a quoted string (`"text"` or `'text'`, backslash escapes allowed)
//! - a number (`10`, `-2.5`)
//! - `true`, `false`, `null` or `undefined`
//! - a traditional nested call `(helper arg1 arg2)`
//! - a call-syntax nested call `helper(arg1, arg2)`
//! - anything else is a variable path resolved against the context
//!
//! Nesting is bounded by a depth counter threaded through the recursion.

use serde_json::Value;

use super::{HelperArgs, HelperRegistry};
use crate::templating::context::Context;
use crate::templating::error::{TemplateError, TemplateResult};
use crate::templating::resolver::resolve;
use crate::templating::utils::{number_value, split_top_level};

/// Evaluates argument tokens and helper calls against one context.
pub struct Evaluator<'a> {
    helpers: Option<&'a HelperRegistry>,
    context: &'a Context,
    max_depth: usize,
}

impl<'a> Evaluator<'a> {
    /// Evaluator that can call helpers from `helpers`.
    #[must_use]
    pub const fn new(helpers: &'a HelperRegistry, context: &'a Context, max_depth: usize) -> Self {
        Self {
            helpers: Some(helpers),
            context,
            max_depth,
        }
    }

    /// Evaluator restricted to literals and variable paths.
    #[must_use]
    pub const fn literals_only(context: &'a Context) -> Self {
        Self {
            helpers: None,
            context,
            max_depth: 0,
        }
    }

    /// Evaluate a single argument token. `Ok(None)` means undefined.
    pub fn evaluate(&self, token: &str) -> TemplateResult<Option<Value>> {
        self.evaluate_at(token, 0)
    }

    /// Invoke `name` with unevaluated argument tokens.
    pub fn call(&self, name: &str, arg_tokens: &[&str], depth: usize) -> TemplateResult<Value> {
        let Some(helpers) = self.helpers else {
            return Err(TemplateError::HelperNotFound {
                name: name.to_string(),
            });
        };
        if depth > self.max_depth {
            return Err(TemplateError::HelperNestingTooDeep {
                limit: self.max_depth,
            });
        }

        let values = arg_tokens
            .iter()
            .map(|token| self.evaluate_at(token, depth))
            .collect::<TemplateResult<Vec<_>>>()?;
        helpers.execute(name, &HelperArgs::new(values))
    }

    fn evaluate_at(&self, token: &str, depth: usize) -> TemplateResult<Option<Value>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        if let Some(literal) = parse_literal(token) {
            return Ok(literal);
        }

        if self.helpers.is_some() {
            if let Some(inner) = strip_outer_parens(token) {
                let words = split_words(inner);
                return match words.as_slice() {
                    [] => Ok(None),
                    [single] if split_call(single).is_some() => self.evaluate_at(single, depth),
                    [name, args @ ..] => self.call(name, args, depth + 1).map(Some),
                };
            }
            if let Some((name, args)) = split_call(token) {
                return self.call(name, &split_commas(args), depth + 1).map(Some);
            }
        }

        Ok(resolve(token, self.context))
    }
}

/// Parse a literal token. Returns `Some(None)` for `undefined`, `None` when not a literal.
#[must_use]
pub fn parse_literal(token: &str) -> Option<Option<Value>> {
    match token {
        "true" => return Some(Some(Value::Bool(true))),
        "false" => return Some(Some(Value::Bool(false))),
        "null" => return Some(Some(Value::Null)),
        "undefined" => return Some(None),
        _ => {}
    }

    if let Some(text) = parse_quoted(token) {
        return Some(Some(Value::String(text)));
    }

    let numeric_start = token
        .trim_start_matches(['-', '+'])
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.');
    if numeric_start {
        if let Ok(int) = token.parse::<i64>() {
            return Some(Some(Value::from(int)));
        }
        if let Ok(float) = token.parse::<f64>() {
            return Some(Some(number_value(float)));
        }
    }
    None
}

/// Unquote a `"..."` or `'...'` token, processing backslash escapes.
fn parse_quoted(token: &str) -> Option<String> {
    let mut chars = token.chars();
    let quote = chars.next().filter(|c| *c == '"' || *c == '\'')?;

    let mut out = String::with_capacity(token.len());
    let mut escaped = false;
    let mut closed = false;
    for c in chars {
        if closed {
            // Text after the closing quote: not a single literal.
            return None;
        }
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            closed = true;
        } else {
            out.push(c);
        }
    }
    closed.then_some(out)
}

/// Whether `name` is a valid helper identifier.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split `name(args)` into `("name", "args")` when the parentheses wrap the rest of the token.
#[must_use]
pub fn split_call(token: &str) -> Option<(&str, &str)> {
    let open = token.find('(')?;
    let name = &token[..open];
    if !is_identifier(name) {
        return None;
    }
    let inner = strip_outer_parens(&token[open..])?;
    Some((name, inner))
}

/// Strip a pair of parentheses wrapping the whole token.
fn strip_outer_parens(token: &str) -> Option<&str> {
    if !token.starts_with('(') || !token.ends_with(')') {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, c) in token.char_indices() {
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
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    // The first paren must close at the very end of the token.
                    return (idx == token.len() - 1).then(|| &token[1..idx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split space-separated arguments, keeping quoted strings and parenthesised calls whole.
#[must_use]
pub fn split_words(source: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start: Option<usize> = None;

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
        if c.is_whitespace() && depth == 0 {
            if let Some(s) = start.take() {
                words.push(&source[s..idx]);
            }
            continue;
        }
        if start.is_none() {
            start = Some(idx);
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push(&source[s..]);
    }
    words
}

/// Split comma-separated call arguments.
#[must_use]
pub fn split_commas(source: &str) -> Vec<&str> {
    if source.trim().is_empty() {
        return Vec::new();
    }
    split_top_level(source, ',').into_iter().map(str::trim).collect()
}
