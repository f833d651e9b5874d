//! Quill - Handlebars-style template rendering
//!
//! Quill renders plain-text templates against JSON-like data. Templates use
//! `{{ ... }}` directives for variables, conditionals, loops, partials, file
//! includes, helper calls and pipe transforms; anything Quill cannot resolve
//! is left in the output verbatim.
//!
//! # Core Modules
//!
//! - [`templating`] - The template engine: context, resolver, registries and the render pipeline
//! - [`config`] - Engine configuration (`quill.toml`)
//! - [`core`] - Application error types and user-facing error formatting
//! - [`cli`] - Command-line interface
//!
//! # Template Syntax
//!
//! ```text
//! {{user.name}}                       variable, dotted path
//! {{items[0].title}}                  array index
//! {{#if cond}}...{{else}}...{{/if}}   conditional ({{#unless}} inverts)
//! {{#each items}}{{@index}}{{/each}}  loop over arrays and objects
//! {{> card user}}                     partial with a context expression
//! {{#include "parts/header.md"}}      file include, relative to the base directory
//! {{uppercase name}}                  helper, space syntax
//! {{add(1, multiply(2, 3))}}          helper, call syntax
//! {{ title | trim | truncate(20) }}   pipe transforms
//! ```
//!
//! # Example
//!
//! ```
//! use quill::templating::{Context, TemplateEngine};
//! use serde_json::json;
//!
//! let mut engine = TemplateEngine::new();
//! engine.register_partial("item", "<li>{{this}}</li>");
//!
//! let context = Context::from_value(json!({"title": "Todo", "items": ["a", "b"]}));
//! let html = engine.render_sync("<h1>{{title}}</h1>{{#each items}}{{> item}}{{/each}}", &context)?;
//! assert_eq!(html, "<h1>Todo</h1><li>a</li><li>b</li>");
//! # Ok::<(), quill::templating::TemplateError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod templating;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
