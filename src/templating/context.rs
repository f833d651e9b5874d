//! Render contexts and per-render recursion stacks.
//!
//! A [`Context`] is the key/value data a template is rendered against. Loop
//! iterations and partials never mutate the context they were handed; they
//! build a derived copy with [`Context::scoped`], so sibling scopes cannot see
//! each other's bindings.
//!
//! A [`RenderStack`] tracks what is currently being expanded (include files,
//! partial names) during one top-level render. Entries are pushed through
//! [`StackGuard`]s that pop on drop, so an error unwinding through the
//! recursion leaves the stack consistent.

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt::Debug;

/// Reserved key carrying the current loop index.
pub const INDEX_KEY: &str = "_index";
/// Reserved key carrying the current object key when iterating an object.
pub const KEY_KEY: &str = "_key";
/// Reserved key carrying the number of items in the current loop.
pub const TOTAL_KEY: &str = "_total";

/// Key/value data a template is rendered against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON value.
    ///
    /// Only objects carry keys; any other value yields an empty context.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self {
                values,
            },
            Value::Null => Self::new(),
            other => {
                tracing::debug!("Ignoring non-object render context of type {}", type_name(&other));
                Self::new()
            }
        }
    }

    /// Insert or replace a binding.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove a binding, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    /// Look up a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether a top-level key is bound.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Derive a child scope: a shallow copy of this context overlaid with `bindings`.
    #[must_use]
    pub fn scoped<I, K>(&self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut child = self.clone();
        for (key, value) in bindings {
            child.values.insert(key.into(), value);
        }
        child
    }

    /// Top-level keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Borrow the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Every addressable dotted path in this context (objects are walked, arrays are not).
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        fn walk(prefix: &str, value: &Value, out: &mut Vec<String>) {
            out.push(prefix.to_string());
            if let Value::Object(map) = value {
                for (key, child) in map {
                    walk(&format!("{prefix}.{key}"), child, out);
                }
            }
        }

        let mut out = Vec::new();
        for (key, value) in &self.values {
            walk(key, value, &mut out);
        }
        out
    }

    /// Convert back into a JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

impl From<Value> for Context {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Nesting counters threaded through one render's recursion.
///
/// Each recursive construct has its own counter so a deep loop nest does not
/// eat into the include budget and vice versa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Depth {
    pub include: usize,
    pub partial: usize,
    pub conditional: usize,
    pub looping: usize,
}

impl Depth {
    #[must_use]
    pub const fn deeper_include(self) -> Self {
        Self {
            include: self.include + 1,
            ..self
        }
    }

    #[must_use]
    pub const fn deeper_partial(self) -> Self {
        Self {
            partial: self.partial + 1,
            ..self
        }
    }

    #[must_use]
    pub const fn deeper_conditional(self) -> Self {
        Self {
            conditional: self.conditional + 1,
            ..self
        }
    }

    #[must_use]
    pub const fn deeper_loop(self) -> Self {
        Self {
            looping: self.looping + 1,
            ..self
        }
    }
}

/// The set of items currently being expanded during one render.
#[derive(Debug)]
pub struct RenderStack<T> {
    entries: RefCell<Vec<T>>,
}

impl<T> Default for RenderStack<T> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<T: PartialEq + Clone + Debug> RenderStack<T> {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `item` unless it is already on the stack.
    ///
    /// Returns `None` when `item` is already being expanded (a cycle).
    #[must_use = "the entry is popped as soon as the guard is dropped"]
    pub fn enter(&self, item: T) -> Option<StackGuard<'_, T>> {
        let mut entries = self.entries.borrow_mut();
        if entries.contains(&item) {
            return None;
        }
        entries.push(item);
        Some(StackGuard {
            stack: self,
        })
    }

    /// Whether `item` is currently being expanded.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.entries.borrow().contains(item)
    }

    /// Number of nested expansions in progress.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Copy of the current chain, outermost first.
    #[must_use]
    pub fn chain(&self) -> Vec<T> {
        self.entries.borrow().clone()
    }
}

/// Pops its [`RenderStack`] entry when dropped.
#[derive(Debug)]
pub struct StackGuard<'a, T> {
    stack: &'a RenderStack<T>,
}

impl<T> Drop for StackGuard<'_, T> {
    fn drop(&mut self) {
        self.stack.entries.borrow_mut().pop();
    }
}
