//! Pipe transforms: `{{ path | transform | transform(arg) }}`.
//!
//! The base of a pipe is resolved as a variable path (or a literal) and the
//! value is threaded through each transform from left to right. Unknown
//! transforms are skipped and the value passes through unchanged. Transforms
//! live in their own namespace, separate from helpers.

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::context::Context;
use super::helpers::expression::{split_call, split_commas};
use super::helpers::{
    Evaluator, HelperArgs, capitalize, first_value, join_value, last_value, length_of, reverse_value, titlecase,
};
use super::utils::{display_value, is_structural, replace_directives, split_top_level};

/// Signature of a transform: the piped value plus any call arguments.
pub type TransformFn = Arc<dyn Fn(&Value, &HelperArgs) -> Result<Value> + Send + Sync>;

/// Named value transforms available to pipes.
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, TransformFn>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry").field("transforms", &self.names()).finish()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformRegistry {
    /// Registry populated with the built-in transforms.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Register `transform` under `name`, replacing any existing transform of that name.
    pub fn register<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(&Value, &HelperArgs) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.transforms.insert(name.clone(), Arc::new(transform)).is_some() {
            tracing::debug!("Replaced transform '{}'", name);
        }
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Apply the transform `name` to `value`.
    ///
    /// An unknown name returns `value` unchanged.
    pub fn apply(&self, name: &str, value: &Value, args: &HelperArgs) -> Result<Value> {
        match self.transforms.get(name) {
            Some(transform) => transform(value, args),
            None => {
                tracing::debug!("Unknown transform '{}' skipped", name);
                Ok(value.clone())
            }
        }
    }

    /// Registered transform names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.transforms.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.transforms.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.transforms.clear();
    }

    /// Drop user transforms and restore the built-ins.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Expand every pipe directive in `template`.
    ///
    /// When the chain ends in `null` (an unresolved base that nothing
    /// defaulted) the directive is left in place.
    #[must_use]
    pub fn process(&self, template: &str, context: &Context) -> String {
        let evaluator = Evaluator::literals_only(context);

        replace_directives(template, |inner| {
            if is_structural(inner) {
                return None;
            }
            let segments = split_top_level(inner, '|');
            let (base, chain) = segments.split_first()?;
            if chain.is_empty() {
                return None;
            }

            let mut value = evaluator.evaluate(base).ok().flatten().unwrap_or(Value::Null);
            for segment in chain {
                let segment = segment.trim();
                let (name, arg_tokens) = match split_call(segment) {
                    Some((name, args)) => (name, split_commas(args)),
                    None => (segment, Vec::new()),
                };
                let args = HelperArgs::new(
                    arg_tokens.iter().map(|token| evaluator.evaluate(token).ok().flatten()).collect(),
                );

                match self.apply(name, &value, &args) {
                    Ok(next) => value = next,
                    Err(e) => tracing::warn!("Transform '{}' failed in '{}': {:#}", name, inner, e),
                }
            }

            (!value.is_null()).then(|| display_value(&value))
        })
    }

    fn register_builtins(&mut self) {
        self.register("uppercase", |v, _| Ok(map_text(v, |s| s.to_uppercase())));
        self.register("lowercase", |v, _| Ok(map_text(v, |s| s.to_lowercase())));
        self.register("capitalize", |v, _| Ok(map_text(v, capitalize)));
        self.register("titlecase", |v, _| Ok(map_text(v, titlecase)));
        self.register("trim", |v, _| Ok(map_text(v, |s| s.trim().to_string())));
        self.register("length", |v, _| Ok(Value::from(length_of(Some(v)))));
        self.register("json", |v, _| Ok(Value::String(serde_json::to_string(v)?)));
        self.register("reverse", |v, _| Ok(reverse_value(v)));
        self.register("first", |v, _| Ok(first_value(v)));
        self.register("last", |v, _| Ok(last_value(v)));
        self.register("default", |v, args| {
            if v.is_null() {
                Ok(args.value(0).clone())
            } else {
                Ok(v.clone())
            }
        });
        self.register("truncate", |v, args| {
            if v.is_null() {
                return Ok(Value::Null);
            }
            let text = display_value(v);
            let limit = args.number(0);
            if limit.is_nan() || limit < 0.0 || text.chars().count() <= limit as usize {
                return Ok(Value::String(text));
            }
            let suffix = if args.is_undefined(1) {
                "...".to_string()
            } else {
                args.string(1)
            };
            let mut truncated: String = text.chars().take(limit as usize).collect();
            truncated.push_str(&suffix);
            Ok(Value::String(truncated))
        });
        self.register("join", |v, args| {
            let separator = if args.is_undefined(0) {
                ",".to_string()
            } else {
                args.string(0)
            };
            Ok(join_value(v, &separator))
        });
        // Unlike the `replace` helper, the transform replaces every occurrence.
        self.register("replace", |v, args| Ok(map_text(v, |s| s.replace(&args.string(0), &args.string(1)))));
    }
}

/// Apply a string operation to the stringified value; `null` stays `null`.
fn map_text(value: &Value, op: impl Fn(&str) -> String) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    Value::String(op(&display_value(value)))
}
