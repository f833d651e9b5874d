//! Handlebars-style template rendering.
//!
//! A template is plain text with `{{ ... }}` directives. Rendering runs the
//! text through a fixed sequence of stages, each of which rewrites the
//! directives it owns and leaves everything else for later stages:
//!
//! 1. **Includes**: `{{#include "path"}}` splices in a file from the base directory
//! 2. **Conditionals**: `{{#if}}` / `{{#unless}}` with optional `{{else}}`
//! 3. **Loops**: `{{#each}}` over arrays and objects
//! 4. **Partials**: `{{> name}}` and `{{> name contextExpr}}`
//! 5. **Helpers**: `{{helper arg1 arg2}}` and `{{helper(arg1, arg2)}}`
//! 6. **Transforms**: `{{ value | transform | transform(arg) }}`
//! 7. **Variables**: `{{user.name}}`, `{{items[0]}}`, `{{@index}}`
//!
//! Anything that cannot be resolved is left in the output verbatim, so
//! rendering a template with no directives is the identity.
//!
//! # Errors
//!
//! Recoverable problems (an unknown partial, a failing helper, a deep
//! conditional nest) are logged through `tracing` and leave text in place.
//! Structural problems abort the render with a [`TemplateError`]: include
//! and partial cycles, include and partial depth limits, and include path
//! validation failures.
//!
//! # Examples
//!
//! ```
//! use quill::templating::{Context, TemplateEngine};
//! use serde_json::json;
//!
//! let engine = TemplateEngine::new();
//! let context = Context::from_value(json!({
//!     "user": {"name": "ada", "admin": true},
//!     "tags": ["rust", "templates"]
//! }));
//!
//! let template = "{{#if user.admin}}Admin {{/if}}{{ user.name | capitalize }}: {{join tags \", \"}}";
//! assert_eq!(engine.render_sync(template, &context)?, "Admin Ada: rust, templates");
//! # Ok::<(), quill::templating::TemplateError>(())
//! ```

mod blocks;
mod conditionals;
pub mod context;
pub mod error;
pub mod helpers;
pub mod includes;
mod loops;
pub mod partials;
pub mod renderer;
pub mod resolver;
pub mod transforms;
mod utils;

pub use context::{Context, Depth};
pub use error::{TemplateError, TemplateResult};
pub use helpers::{HelperArgs, HelperFn, HelperRegistry};
pub use includes::IncludeResolver;
pub use partials::{PartialRegistry, PartialValidation};
pub use renderer::{ContextValidation, TemplateEngine};
pub use resolver::{extract_variables, is_defined, resolve};
pub use transforms::{TransformFn, TransformRegistry};
