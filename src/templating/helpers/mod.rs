//! Helper registry and the helper stage of the pipeline.
//!
//! Helpers are named pure functions over a list of arguments. They are called
//! from directives in two syntaxes:
//!
//! ```text
//! {{uppercase name}}                 space syntax
//! {{uppercase(concat("a", "b"))}}    call syntax
//! {{add 1 (multiply 2 3)}}           traditional nested call
//! ```
//!
//! A failing or unknown helper never aborts a render: the failure is logged and
//! the directive text is left in the output.

mod builtins;
pub mod expression;

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use expression::Evaluator;

use super::context::Context;
use super::error::{TemplateError, TemplateResult};
use super::utils::{display_value, is_structural, replace_directives, split_top_level, to_number};
use expression::{is_identifier, split_call, split_commas, split_words};

pub(crate) use builtins::{capitalize, first_value, join_value, last_value, length_of, reverse_value, titlecase};

/// Signature of a helper function.
pub type HelperFn = Arc<dyn Fn(&HelperArgs) -> Result<Value> + Send + Sync>;

static NULL: Value = Value::Null;

/// Evaluated helper arguments. `None` entries are `undefined`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelperArgs {
    values: Vec<Option<Value>>,
}

impl HelperArgs {
    #[must_use]
    pub const fn new(values: Vec<Option<Value>>) -> Self {
        Self {
            values,
        }
    }

    /// Build arguments from defined values.
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(values.into_iter().map(Some).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Argument at `index`; `None` when missing or undefined.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Argument at `index`, with `null` standing in for undefined.
    #[must_use]
    pub fn value(&self, index: usize) -> &Value {
        self.get(index).unwrap_or(&NULL)
    }

    #[must_use]
    pub fn is_undefined(&self, index: usize) -> bool {
        self.get(index).is_none()
    }

    /// Argument stringified for output; undefined becomes `""`.
    #[must_use]
    pub fn string(&self, index: usize) -> String {
        self.get(index).map(display_value).unwrap_or_default()
    }

    /// Argument coerced to a number (`NaN` when not numeric).
    #[must_use]
    pub fn number(&self, index: usize) -> f64 {
        to_number(self.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Value>> {
        self.values.iter().map(Option::as_ref)
    }
}

/// Named helper functions available to templates.
#[derive(Clone)]
pub struct HelperRegistry {
    helpers: HashMap<String, HelperFn>,
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperRegistry").field("helpers", &self.names()).finish()
    }
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HelperRegistry {
    /// Registry populated with every built-in helper.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        builtins::register_builtins(&mut registry);
        registry
    }

    /// Alias for [`HelperRegistry::new`].
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::new()
    }

    /// Registry with no helpers at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            helpers: HashMap::new(),
        }
    }

    /// Register `helper` under `name`, replacing any existing helper of that name.
    pub fn register<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&HelperArgs) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.helpers.insert(name.clone(), Arc::new(helper)).is_some() {
            tracing::debug!("Replaced helper '{}'", name);
        }
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Call the helper `name`.
    ///
    /// # Errors
    ///
    /// [`TemplateError::HelperNotFound`] when `name` is not registered and
    /// [`TemplateError::HelperFailed`] when the helper itself returns an error.
    pub fn execute(&self, name: &str, args: &HelperArgs) -> TemplateResult<Value> {
        let helper = self.helpers.get(name).ok_or_else(|| TemplateError::HelperNotFound {
            name: name.to_string(),
        })?;
        helper(args).map_err(|e| TemplateError::HelperFailed {
            name: name.to_string(),
            message: format!("{e:#}"),
        })
    }

    /// Registered helper names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.helpers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a helper, returning whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.helpers.remove(name).is_some()
    }

    /// Remove every helper, built-ins included.
    pub fn clear(&mut self) {
        self.helpers.clear();
    }

    /// Drop user helpers and restore the built-ins.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    /// Expand every helper-call directive in `template`.
    ///
    /// A directive is a helper call when it uses call syntax or space syntax
    /// with at least one argument. A bare name is always a variable, so
    /// `{{now}}` is left for the variable stage and `{{now()}}` calls the
    /// helper. Pipes and structural tags are left for later stages.
    #[must_use]
    pub fn process(&self, template: &str, context: &Context, max_depth: usize) -> String {
        let evaluator = Evaluator::new(self, context, max_depth);

        replace_directives(template, |inner| {
            if is_structural(inner) || split_top_level(inner, '|').len() > 1 {
                return None;
            }

            let outcome = if let Some((name, args)) = split_call(inner) {
                evaluator.call(name, &split_commas(args), 1)
            } else {
                match split_words(inner).as_slice() {
                    [name, args @ ..] if !args.is_empty() && is_identifier(name) => {
                        evaluator.call(name, args, 1)
                    }
                    _ => return None,
                }
            };

            match outcome {
                Ok(value) => Some(display_value(&value)),
                Err(e) => {
                    tracing::warn!("{}; leaving '{{{{{}}}}}' in place", e, inner);
                    None
                }
            }
        })
    }
}
