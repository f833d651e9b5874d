//! The template engine and its per-render pipeline.
//!
//! [`TemplateEngine`] owns the helper, transform and partial registries and the
//! engine configuration. Every render builds a fresh [`Pipeline`] that borrows
//! those registries and carries the per-render state (include stack, partial
//! stack, depth-limit flags), so nothing leaks from one render into the next.
//!
//! # Stage order
//!
//! ```text
//! includes -> conditionals -> loops -> partials -> helpers -> transforms -> variables
//! ```
//!
//! Variables come last because every earlier stage can produce text containing
//! new `{{variable}}` references. Everything after `includes` is the *body
//! pipeline*, which also renders each loop iteration, each partial body and
//! each loop `{{else}}` branch in their own scopes.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use strsim::levenshtein;

use super::blocks::map_outside_blocks;
use super::context::{Context, Depth, RenderStack};
use super::error::{TemplateError, TemplateResult};
use super::helpers::{HelperArgs, HelperRegistry};
use super::includes::IncludeResolver;
use super::partials::{PartialRegistry, PartialScope};
use super::resolver::{extract_variables, is_defined, substitute_variables};
use super::transforms::TransformRegistry;
use crate::config::EngineConfig;

/// Maximum allowed Levenshtein distance as a percentage of target length for suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Result of [`TemplateEngine::validate_context`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextValidation {
    /// Whether every variable the template reads is defined
    pub valid: bool,
    /// Variable paths that do not resolve
    pub missing: Vec<String>,
    /// Close matches among the context's paths, per missing path
    pub suggestions: BTreeMap<String, Vec<String>>,
}

/// Handlebars-style template engine.
///
/// Registries are shared between clones; registering through a clone that
/// shares them copies them first, so existing clones are never affected.
///
/// # Examples
///
/// ```
/// use quill::templating::{Context, TemplateEngine};
/// use serde_json::json;
///
/// let engine = TemplateEngine::new();
/// let context = Context::from_value(json!({"items": ["a", "b", "c"]}));
/// let output = engine.render_sync("{{#each items}}{{@index}}:{{this}}{{/each}}", &context)?;
/// assert_eq!(output, "0:a1:b2:c");
/// # Ok::<(), quill::templating::TemplateError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    helpers: Arc<HelperRegistry>,
    transforms: Arc<TransformRegistry>,
    partials: Arc<PartialRegistry>,
    config: Arc<EngineConfig>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Engine with built-in helpers and transforms and the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_registries(config, HelperRegistry::new(), TransformRegistry::new(), PartialRegistry::new())
    }

    /// Engine built from explicitly constructed registries.
    #[must_use]
    pub fn with_registries(
        config: EngineConfig,
        helpers: HelperRegistry,
        transforms: TransformRegistry,
        partials: PartialRegistry,
    ) -> Self {
        Self {
            helpers: Arc::new(helpers),
            transforms: Arc::new(transforms),
            partials: Arc::new(partials),
            config: Arc::new(config),
        }
    }

    /// Engine for `config`, with partials loaded from `partials_dir` when set.
    pub async fn from_config(config: EngineConfig) -> Self {
        let mut partials = PartialRegistry::new();
        if let Some(dir) = &config.partials_dir {
            partials.load_from_directory(dir).await;
        }
        Self::with_registries(config, HelperRegistry::new(), TransformRegistry::new(), partials)
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    pub fn helpers_mut(&mut self) -> &mut HelperRegistry {
        Arc::make_mut(&mut self.helpers)
    }

    #[must_use]
    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut TransformRegistry {
        Arc::make_mut(&mut self.transforms)
    }

    #[must_use]
    pub fn partials(&self) -> &PartialRegistry {
        &self.partials
    }

    pub fn partials_mut(&mut self) -> &mut PartialRegistry {
        Arc::make_mut(&mut self.partials)
    }

    /// Register a helper. Replaces any helper with the same name.
    pub fn register_helper<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&HelperArgs) -> Result<Value> + Send + Sync + 'static,
    {
        self.helpers_mut().register(name, helper);
    }

    /// Register a pipe transform. Replaces any transform with the same name.
    pub fn register_transform<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(&Value, &HelperArgs) -> Result<Value> + Send + Sync + 'static,
    {
        self.transforms_mut().register(name, transform);
    }

    /// Register a partial. Replaces any partial with the same name.
    pub fn register_partial(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.partials_mut().register(name, template);
    }

    /// Render `template` with the full pipeline, includes enabled.
    ///
    /// The render runs on a blocking thread so include I/O never stalls the
    /// async runtime; independent renders may run concurrently.
    ///
    /// # Errors
    ///
    /// Abort-class [`TemplateError`]s: include and partial cycles, depth
    /// limits on includes and partials, and include path or file problems.
    pub async fn render(&self, template: &str, context: &Context) -> TemplateResult<String> {
        let engine = self.clone();
        let template = template.to_string();
        let context = context.clone();

        tokio::task::spawn_blocking(move || engine.pipeline(true).render(&template, &context))
            .await
            .map_err(|e| TemplateError::RenderTask {
                message: e.to_string(),
            })?
    }

    /// Render `template` without include expansion; `{{#include}}` directives stay verbatim.
    pub fn render_sync(&self, template: &str, context: &Context) -> TemplateResult<String> {
        self.pipeline(false).render(template, context)
    }

    /// Context paths `template` reads, sorted. Helper names in call position are excluded.
    #[must_use]
    pub fn extract_variables(&self, template: &str) -> Vec<String> {
        extract_variables(template)
    }

    /// Check which variables `template` reads are missing from `context`.
    #[must_use]
    pub fn validate_context(&self, template: &str, context: &Context) -> ContextValidation {
        let missing: Vec<String> =
            self.extract_variables(template).into_iter().filter(|path| !is_defined(path, context)).collect();

        let available = context.paths();
        let suggestions = missing
            .iter()
            .filter_map(|path| {
                let similar = find_similar_paths(path, &available);
                (!similar.is_empty()).then(|| (path.clone(), similar))
            })
            .collect();

        ContextValidation {
            valid: missing.is_empty(),
            missing,
            suggestions,
        }
    }

    fn pipeline(&self, includes: bool) -> Pipeline<'_> {
        Pipeline {
            helpers: &self.helpers,
            transforms: &self.transforms,
            partials: &self.partials,
            config: &self.config,
            includes: includes.then(|| IncludeResolver::from_config(&self.config)),
            include_stack: RenderStack::new(),
            partial_stack: RenderStack::new(),
            limits_hit: LimitFlags::default(),
        }
    }
}

/// Up to three paths from `available` close to `target`, closest first.
fn find_similar_paths(target: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<_> = available.iter().map(|path| (path.clone(), levenshtein(target, path))).collect();
    scored.sort_by_key(|(_, dist)| *dist);

    scored
        .into_iter()
        .filter(|(_, dist)| *dist <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(path, _)| path)
        .collect()
}

/// Graceful depth limits already reported during this render.
#[derive(Debug, Default)]
pub(crate) struct LimitFlags {
    pub(crate) conditional: Cell<bool>,
    pub(crate) looping: Cell<bool>,
}

/// State for one top-level render.
///
/// Stage implementations live next to their registries (`conditionals.rs`,
/// `loops.rs`, `includes.rs`); this type wires them together.
pub(crate) struct Pipeline<'a> {
    pub(crate) helpers: &'a HelperRegistry,
    pub(crate) transforms: &'a TransformRegistry,
    pub(crate) partials: &'a PartialRegistry,
    pub(crate) config: &'a EngineConfig,
    /// `None` disables include expansion
    pub(crate) includes: Option<IncludeResolver>,
    pub(crate) include_stack: RenderStack<PathBuf>,
    pub(crate) partial_stack: RenderStack<String>,
    pub(crate) limits_hit: LimitFlags,
}

impl Pipeline<'_> {
    fn render(&self, template: &str, context: &Context) -> TemplateResult<String> {
        tracing::debug!(
            "Rendering template ({} bytes, includes {})",
            template.len(),
            if self.includes.is_some() { "enabled" } else { "disabled" }
        );
        let root = Depth::default();
        let expanded = self.expand_includes(template, context, root, false)?;
        self.render_body(&expanded, context, root)
    }

    /// Conditionals, loops, partials, helpers, transforms, then variables.
    pub(crate) fn render_body(&self, template: &str, context: &Context, depth: Depth) -> TemplateResult<String> {
        let text = self.process_conditionals(template, context, depth)?;
        let text = self.process_loops(&text, context, depth)?;
        let text = self.process_partials(&text, context, depth)?;

        // Blocks still present here were cut off by a depth limit; their scope was never built.
        map_outside_blocks(
            &text,
            |segment| {
                let segment = self.helpers.process(segment, context, self.config.max_helper_depth);
                let segment = self.transforms.process(&segment, context);
                Ok(substitute_variables(&segment, context))
            },
            |block| Ok(text[block.start..block.end].to_string()),
        )
    }

    fn process_partials(&self, template: &str, context: &Context, depth: Depth) -> TemplateResult<String> {
        let render = |body: &str, scope: &Context, partial_depth: usize| {
            let depth = Depth {
                partial: partial_depth,
                ..depth
            };
            let expanded = self.expand_includes(body, scope, depth, false)?;
            self.render_body(&expanded, scope, depth)
        };
        let scope = PartialScope {
            stack: &self.partial_stack,
            max_depth: self.config.max_partial_depth,
            render: &render,
        };
        self.partials.process(template, context, &scope, depth.partial)
    }
}
