//! Named partial templates: `{{> name}}` and `{{> name contextExpr}}`.
//!
//! A partial body is first expanded for its own nested partial references and
//! then handed to a caller-supplied render callback, which runs the rest of the
//! pipeline against the partial's context. The registry itself knows nothing
//! about conditionals, loops or helpers.
//!
//! While a partial renders, its name sits on the per-render partial stack;
//! entering a name that is already there is a
//! [`TemplateError::CircularPartialDependency`]. Nesting deeper than the
//! configured limit is a [`TemplateError::MaxPartialDepthExceeded`], checked
//! independently of the cycle set.

use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::blocks::map_outside_blocks;
use super::context::{Context, RenderStack};
use super::error::{TemplateError, TemplateResult};
use super::resolver::resolve;
use super::utils::{replace_directives, try_replace_directives};

/// File extensions picked up by [`PartialRegistry::load_from_directory`].
pub const PARTIAL_EXTENSIONS: &[&str] = &["hbs", "handlebars", "mustache", "html", "md", "txt"];

/// Render callback: `(body, context, depth) -> output`.
pub type RenderCallback<'a> = dyn Fn(&str, &Context, usize) -> TemplateResult<String> + 'a;

/// Per-render state shared by nested partial expansions.
pub struct PartialScope<'a> {
    /// Partials currently being rendered
    pub stack: &'a RenderStack<String>,
    /// Maximum nesting depth
    pub max_depth: usize,
    /// Renders a partial body once its nested references are expanded
    pub render: &'a RenderCallback<'a>,
}

/// Result of [`PartialRegistry::validate_references`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PartialValidation {
    pub valid: bool,
    pub missing: Vec<String>,
}

/// Named partial templates.
#[derive(Debug, Clone, Default)]
pub struct PartialRegistry {
    partials: HashMap<String, String>,
}

impl PartialRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `template` under `name`, replacing any existing partial of that name.
    pub fn register(&mut self, name: impl Into<String>, template: impl Into<String>) {
        let name = name.into();
        if self.partials.insert(name.clone(), template.into()).is_some() {
            tracing::debug!("Replaced partial '{}'", name);
        }
    }

    /// Register the contents of `path` under `name`.
    ///
    /// # Errors
    ///
    /// [`TemplateError::PartialFileNotFound`] when `path` does not exist, or
    /// [`TemplateError::Io`] when it cannot be read.
    pub async fn register_from_file(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> TemplateResult<()> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(TemplateError::PartialFileNotFound {
                path: path.to_path_buf(),
            });
        }

        let template = tokio::fs::read_to_string(path).await.map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.register(name, template);
        Ok(())
    }

    /// Register every partial file found under `dir`, recursively.
    ///
    /// Names are the path relative to `dir` without its extension, using `/`
    /// separators (`layouts/header.hbs` becomes `layouts/header`). Unreadable
    /// files are logged and skipped. Returns the number of partials loaded.
    pub async fn load_from_directory(&mut self, dir: impl AsRef<Path>) -> usize {
        let dir = dir.as_ref().to_path_buf();
        let scan_dir = dir.clone();
        let found = match tokio::task::spawn_blocking(move || scan_partials(&scan_dir)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Failed to scan partials directory {}: {}", dir.display(), e);
                return 0;
            }
        };

        let count = found.len();
        for (name, template) in found {
            self.register(name, template);
        }
        tracing::debug!("Loaded {} partial(s) from {}", count, dir.display());
        count
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.partials.get(name).map(String::as_str)
    }

    /// Registered partial names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.partials.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.partials.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.partials.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.partials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Expand partial references lexically outside block bodies.
    ///
    /// References inside `{{#if}}`/`{{#each}}` bodies are expanded later, in
    /// the scope those blocks establish.
    pub fn process(&self, template: &str, context: &Context, scope: &PartialScope<'_>, depth: usize) -> TemplateResult<String> {
        map_outside_blocks(
            template,
            |text| {
                try_replace_directives(text, |inner| {
                    let Some((name, context_expr)) = parse_reference(inner) else {
                        return Ok(None);
                    };
                    self.render_partial(name, context_expr, context, scope, depth)
                })
            },
            |block| Ok(template[block.start..block.end].to_string()),
        )
    }

    fn render_partial(
        &self,
        name: &str,
        context_expr: Option<&str>,
        context: &Context,
        scope: &PartialScope<'_>,
        depth: usize,
    ) -> TemplateResult<Option<String>> {
        let Some(body) = self.get(name) else {
            tracing::warn!("Partial '{}' is not registered; leaving reference in place", name);
            return Ok(None);
        };

        let Some(_guard) = scope.stack.enter(name.to_string()) else {
            return Err(TemplateError::CircularPartialDependency {
                name: name.to_string(),
                chain: scope.stack.chain(),
            });
        };
        if depth >= scope.max_depth {
            return Err(TemplateError::MaxPartialDepthExceeded {
                limit: scope.max_depth,
                name: name.to_string(),
            });
        }

        let partial_context = match context_expr.and_then(|expr| resolve(expr, context)) {
            Some(Value::Object(map)) => Context::from(map),
            _ => context.clone(),
        };

        tracing::debug!("Rendering partial '{}' (depth {})", name, depth + 1);
        let nested = self.process(body, &partial_context, scope, depth + 1)?;
        (scope.render)(&nested, &partial_context, depth + 1).map(Some)
    }

    /// Every partial name `template` references, directly or through other partials.
    ///
    /// The result is sorted and includes unregistered names.
    #[must_use]
    pub fn extract_references(&self, template: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.collect_references(template, &mut seen);
        seen.into_iter().collect()
    }

    fn collect_references(&self, template: &str, seen: &mut BTreeSet<String>) {
        let mut direct = Vec::new();
        replace_directives(template, |inner| {
            if let Some((name, _)) = parse_reference(inner) {
                direct.push(name.to_string());
            }
            None
        });

        for name in direct {
            if seen.insert(name.clone()) {
                if let Some(body) = self.get(&name) {
                    self.collect_references(body, seen);
                }
            }
        }
    }

    /// Check that every partial `template` references is registered.
    #[must_use]
    pub fn validate_references(&self, template: &str) -> PartialValidation {
        let missing: Vec<String> =
            self.extract_references(template).into_iter().filter(|name| !self.has(name)).collect();
        PartialValidation {
            valid: missing.is_empty(),
            missing,
        }
    }
}

/// Parse `> name [contextExpr]` into its parts.
fn parse_reference(inner: &str) -> Option<(&str, Option<&str>)> {
    let rest = inner.strip_prefix('>')?.trim();
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().filter(|name| !name.is_empty())?;
    let context_expr = parts.next().map(str::trim).filter(|expr| !expr.is_empty());
    Some((name, context_expr))
}

/// Walk `dir` and read every partial file. Runs on a blocking thread.
fn scan_partials(dir: &Path) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(name) = partial_name(dir, path) else {
            continue;
        };
        match std::fs::read_to_string(path) {
            Ok(template) => found.push((name, template)),
            Err(e) => tracing::warn!("Failed to read partial {}: {}", path.display(), e),
        }
    }
    found
}

/// Registry name for a partial file, or `None` when the extension is not a partial extension.
fn partial_name(dir: &Path, path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    if !PARTIAL_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }
    let relative: PathBuf = path.strip_prefix(dir).ok()?.with_extension("");
    let segments: Vec<String> =
        relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn echo_render(body: &str, context: &Context, _depth: usize) -> TemplateResult<String> {
        Ok(crate::templating::resolver::substitute_variables(body, context))
    }

    fn process(registry: &PartialRegistry, template: &str, context: Value) -> TemplateResult<String> {
        let stack = RenderStack::new();
        let scope = PartialScope {
            stack: &stack,
            max_depth: 10,
            render: &echo_render,
        };
        registry.process(template, &Context::from_value(context), &scope, 0)
    }

    #[test]
    fn test_renders_nested_partials() {
        let mut registry = PartialRegistry::new();
        registry.register("outer", "[{{> inner}}]");
        registry.register("inner", "{{name}}");

        assert_eq!(process(&registry, "{{> outer}}", json!({"name": "x"})).unwrap(), "[x]");
    }

    #[test]
    fn test_context_expression_switches_scope() {
        let mut registry = PartialRegistry::new();
        registry.register("card", "{{name}}");
        let context = json!({"name": "outer", "user": {"name": "inner"}, "label": "text"});

        assert_eq!(process(&registry, "{{> card user}}", context.clone()).unwrap(), "inner");
        // Non-object values fall back to the ambient context.
        assert_eq!(process(&registry, "{{> card label}}", context).unwrap(), "outer");
    }

    #[test]
    fn test_cycle_is_detected_on_second_visit() {
        let mut registry = PartialRegistry::new();
        registry.register("a", "{{> b}}");
        registry.register("b", "{{> a}}");

        let err = process(&registry, "{{> a}}", json!({})).unwrap_err();
        match err {
            TemplateError::CircularPartialDependency {
                name,
                chain,
            } => {
                assert_eq!(name, "a");
                assert_eq!(chain, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_depth_limit() {
        let mut registry = PartialRegistry::new();
        for i in 0..12 {
            registry.register(format!("p{i}"), format!("{{{{> p{}}}}}", i + 1));
        }
        registry.register("p12", "end");

        let err = process(&registry, "{{> p0}}", json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::MaxPartialDepthExceeded { limit: 10, .. }));
    }

    #[test]
    fn test_sibling_reuse_is_not_a_cycle() {
        let mut registry = PartialRegistry::new();
        registry.register("dot", ".");
        assert_eq!(process(&registry, "{{> dot}}{{> dot}}", json!({})).unwrap(), "..");
    }

    #[test]
    fn test_unknown_partial_left_in_place() {
        let registry = PartialRegistry::new();
        assert_eq!(process(&registry, "a{{> nope}}b", json!({})).unwrap(), "a{{> nope}}b");
    }

    #[test]
    fn test_references_inside_blocks_are_deferred() {
        let mut registry = PartialRegistry::new();
        registry.register("p", "P");
        let template = "{{> p}}{{#if x}}{{> p}}{{/if}}";
        assert_eq!(process(&registry, template, json!({})).unwrap(), "P{{#if x}}{{> p}}{{/if}}");
    }

    #[test]
    fn test_extract_and_validate_references() {
        let mut registry = PartialRegistry::new();
        registry.register("layout", "{{> header}}{{> footer}}");
        registry.register("header", "{{> layout}}");

        let refs = registry.extract_references("{{> layout}} {{#if a}}{{> sidebar}}{{/if}}");
        assert_eq!(refs, vec!["footer", "header", "layout", "sidebar"]);

        let validation = registry.validate_references("{{> layout}}");
        assert!(!validation.valid);
        assert_eq!(validation.missing, vec!["footer"]);
    }

    #[tokio::test]
    async fn test_register_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("card.hbs");
        std::fs::write(&path, "<div>{{title}}</div>").unwrap();

        let mut registry = PartialRegistry::new();
        registry.register_from_file("card", &path).await.unwrap();
        assert_eq!(registry.get("card"), Some("<div>{{title}}</div>"));

        let err = registry.register_from_file("gone", temp.path().join("gone.hbs")).await.unwrap_err();
        assert!(matches!(err, TemplateError::PartialFileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_from_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("layouts")).unwrap();
        std::fs::write(temp.path().join("header.hbs"), "H").unwrap();
        std::fs::write(temp.path().join("layouts/main.html"), "M").unwrap();
        std::fs::write(temp.path().join("notes.rs"), "ignored").unwrap();

        let mut registry = PartialRegistry::new();
        let count = registry.load_from_directory(temp.path()).await;

        assert_eq!(count, 2);
        assert_eq!(registry.names(), vec!["header", "layouts/main"]);
    }

    #[tokio::test]
    async fn test_load_from_missing_directory_is_best_effort() {
        let temp = TempDir::new().unwrap();
        let mut registry = PartialRegistry::new();
        assert_eq!(registry.load_from_directory(temp.path().join("absent")).await, 0);
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(parse_reference("> card"), Some(("card", None)));
        assert_eq!(parse_reference(">card  user.profile "), Some(("card", Some("user.profile"))));
        assert_eq!(parse_reference(">"), None);
        assert_eq!(parse_reference("#if a"), None);
    }
}
