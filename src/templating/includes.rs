//! File includes: `{{#include "path"}}`.
//!
//! Include paths are resolved against a base directory and must stay inside
//! it. The target is checked before it is read: it must be a regular file no
//! larger than the configured ceiling.
//!
//! Expansion is depth-first. While a file's content is being expanded its
//! canonical path sits on the per-render include stack, so meeting the same
//! path again is reported as [`TemplateError::CircularInclude`]. The same file
//! may still be included any number of times in sibling positions.
//!
//! Includes inside `{{#if}}`/`{{#unless}}` bodies are not touched here; the
//! conditional stage expands them once a branch has been selected.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::blocks::{BlockKind, map_outside_blocks};
use super::context::{Context, Depth};
use super::error::{TemplateError, TemplateResult};
use super::helpers::expression::parse_literal;
use super::renderer::Pipeline;
use super::utils::try_replace_directives;
use crate::config::EngineConfig;

/// Validates include paths and reads include files.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    base_dir: PathBuf,
    max_size: u64,
    max_depth: usize,
}

impl IncludeResolver {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, max_size: u64, max_depth: usize) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_size,
            max_depth,
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.base_dir, config.max_include_size, config.max_include_depth)
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve and validate an include path, returning the canonical file path.
    ///
    /// # Errors
    ///
    /// - [`TemplateError::InvalidIncludePath`] for paths containing `..` or outside the base directory
    /// - [`TemplateError::IncludeFileNotFound`] when nothing exists at the path
    /// - [`TemplateError::IncludeNotAFile`] for directories and special files
    /// - [`TemplateError::IncludeTooLarge`] when the file exceeds the size ceiling
    pub fn resolve(&self, literal: &str) -> TemplateResult<PathBuf> {
        let invalid = |reason: &str| TemplateError::InvalidIncludePath {
            path: literal.to_string(),
            reason: reason.to_string(),
        };

        if literal.trim().is_empty() {
            return Err(invalid("include path is empty"));
        }
        if literal.contains("..") {
            return Err(invalid("'..' is not allowed in include paths"));
        }
        let path = Path::new(literal);

        let full_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };

        let metadata = match fs::metadata(&full_path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TemplateError::IncludeFileNotFound {
                    path: literal.to_string(),
                    resolved: full_path,
                });
            }
            Err(source) => {
                return Err(TemplateError::Io {
                    path: full_path,
                    source,
                });
            }
        };

        if !metadata.is_file() {
            return Err(TemplateError::IncludeNotAFile {
                path: literal.to_string(),
            });
        }

        let canonical_path = canonicalize(&full_path)?;
        let canonical_base = canonicalize(&self.base_dir)?;
        if !canonical_path.starts_with(&canonical_base) {
            return Err(invalid(&format!(
                "resolves to '{}' which is outside the base directory '{}'",
                canonical_path.display(),
                canonical_base.display()
            )));
        }

        if metadata.len() > self.max_size {
            return Err(TemplateError::IncludeTooLarge {
                path: literal.to_string(),
                size: metadata.len(),
                limit: self.max_size,
            });
        }

        Ok(canonical_path)
    }

    /// Read a resolved include file as UTF-8 text.
    pub fn read(&self, path: &Path) -> TemplateResult<String> {
        fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn canonicalize(path: &Path) -> TemplateResult<PathBuf> {
    path.canonicalize().map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Path argument of an include directive body, if `inner` is one.
fn include_argument(inner: &str) -> Option<&str> {
    let rest = inner.strip_prefix("#include")?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

impl Pipeline<'_> {
    /// Expand include directives lexically outside conditional blocks.
    ///
    /// `in_each` marks text that belongs to a loop body. Conditionals in files
    /// included there are left for the loop's per-iteration scope.
    pub(crate) fn expand_includes(
        &self,
        template: &str,
        context: &Context,
        depth: Depth,
        in_each: bool,
    ) -> TemplateResult<String> {
        if self.includes.is_none() {
            return Ok(template.to_string());
        }

        map_outside_blocks(
            template,
            |text| self.replace_includes(text, context, depth, in_each),
            |block| match block.kind {
                BlockKind::Each => {
                    let body = self.expand_includes(block.body, context, depth, true)?;
                    let else_body = block
                        .else_body
                        .map(|text| self.expand_includes(text, context, depth, in_each))
                        .transpose()?;
                    Ok(block.rebuild(&body, else_body.as_deref()))
                }
                BlockKind::If | BlockKind::Unless => Ok(template[block.start..block.end].to_string()),
            },
        )
    }

    fn replace_includes(
        &self,
        text: &str,
        context: &Context,
        depth: Depth,
        in_each: bool,
    ) -> TemplateResult<String> {
        try_replace_directives(text, |inner| {
            let Some(argument) = include_argument(inner) else {
                return Ok(None);
            };
            let Some(Some(Value::String(literal))) = parse_literal(argument) else {
                tracing::warn!("Include path must be a quoted string: '{{{{{}}}}}'", inner);
                return Ok(None);
            };
            self.include_file(&literal, context, depth, in_each).map(Some)
        })
    }

    fn include_file(
        &self,
        literal: &str,
        context: &Context,
        depth: Depth,
        in_each: bool,
    ) -> TemplateResult<String> {
        let Some(resolver) = self.includes.as_ref() else {
            return Ok(String::new());
        };

        let path = resolver.resolve(literal)?;
        let Some(_guard) = self.include_stack.enter(path.clone()) else {
            return Err(TemplateError::CircularInclude {
                path,
                chain: self.include_stack.chain(),
            });
        };
        if depth.include >= resolver.max_depth() {
            return Err(TemplateError::MaxIncludeDepthExceeded {
                limit: resolver.max_depth(),
                path: literal.to_string(),
            });
        }

        tracing::debug!("Including {} (depth {})", path.display(), depth.include + 1);
        let content = resolver.read(&path)?;
        let nested = depth.deeper_include();
        let expanded = self.expand_includes(&content, context, nested, in_each)?;

        // Evaluate the file's conditionals while it is still on the stack so
        // that cycles routed through a branch are caught here.
        if in_each {
            Ok(expanded)
        } else {
            self.process_conditionals(&expanded, context, nested)
        }
    }
}
