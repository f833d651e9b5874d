//! Engine configuration (`quill.toml`).
//!
//! Every field is optional in the file; missing fields fall back to the
//! defaults below, and fields equal to their default are not written back.
//!
//! ```toml
//! base_dir = "~/templates"
//! partials_dir = "~/templates/partials"
//! max_include_size = 1048576
//! max_include_depth = 10
//! ```
//!
//! `base_dir` and `partials_dir` accept `~` and `$VAR` references. The
//! `QUILL_BASE_DIR` environment variable overrides `base_dir` when
//! [`EngineConfig::apply_env_overrides`] is called.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "quill.toml";

/// Environment variable overriding [`EngineConfig::base_dir`].
pub const BASE_DIR_ENV: &str = "QUILL_BASE_DIR";

const fn default_max_include_size() -> u64 {
    1024 * 1024 // 1 MB
}

const fn default_depth_limit() -> usize {
    10
}

fn default_base_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn is_default_max_include_size(size: &u64) -> bool {
    *size == default_max_include_size()
}

fn is_default_depth_limit(limit: &usize) -> bool {
    *limit == default_depth_limit()
}

/// Limits and locations used by a [`crate::templating::TemplateEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory include paths are resolved against and confined to.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Largest include file accepted, in bytes.
    ///
    /// Default: 1 MB (1,048,576 bytes)
    #[serde(default = "default_max_include_size", skip_serializing_if = "is_default_max_include_size")]
    pub max_include_size: u64,

    /// Maximum include nesting.
    #[serde(default = "default_depth_limit", skip_serializing_if = "is_default_depth_limit")]
    pub max_include_depth: usize,

    /// Maximum partial nesting.
    #[serde(default = "default_depth_limit", skip_serializing_if = "is_default_depth_limit")]
    pub max_partial_depth: usize,

    /// Maximum conditional nesting before expansion stops.
    #[serde(default = "default_depth_limit", skip_serializing_if = "is_default_depth_limit")]
    pub max_conditional_depth: usize,

    /// Maximum loop nesting before expansion stops.
    #[serde(default = "default_depth_limit", skip_serializing_if = "is_default_depth_limit")]
    pub max_loop_depth: usize,

    /// Maximum nesting of helper calls inside helper arguments.
    #[serde(default = "default_depth_limit", skip_serializing_if = "is_default_depth_limit")]
    pub max_helper_depth: usize,

    /// Directory of partial templates loaded by `TemplateEngine::from_config`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partials_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            max_include_size: default_max_include_size(),
            max_include_depth: default_depth_limit(),
            max_partial_depth: default_depth_limit(),
            max_conditional_depth: default_depth_limit(),
            max_loop_depth: default_depth_limit(),
            max_helper_depth: default_depth_limit(),
            partials_dir: None,
        }
    }
}

impl EngineConfig {
    /// Defaults with an explicit base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `path`, or defaults when `path` (or `quill.toml`) does not exist.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.expand_paths();
        Ok(config)
    }

    /// Write configuration to `path`, creating parent directories as needed.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Apply `QUILL_BASE_DIR` if it is set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(BASE_DIR_ENV) {
            tracing::debug!("Using base directory from {}: {}", BASE_DIR_ENV, dir);
            self.base_dir = expand_path(Path::new(&dir));
        }
    }

    fn expand_paths(&mut self) {
        self.base_dir = expand_path(&self.base_dir);
        if let Some(dir) = &self.partials_dir {
            self.partials_dir = Some(expand_path(dir));
        }
    }
}

/// Expand `~` and environment variables in `path`; unexpandable paths are kept as-is.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            tracing::warn!("Could not expand path '{}': {}", raw, e);
            path.to_path_buf()
        }
    }
}
