//! Test utilities for Quill
//!
//! Helpers shared by unit and integration tests: once-guarded logging setup
//! and [`TestProject`], a temporary base directory with methods for writing
//! templates, include files and partials.
//!
//! # Example
//!
//! ```rust,no_run
//! use quill::test_utils::TestProject;
//!
//! let project = TestProject::new().unwrap();
//! project.write("header.md", "# {{title}}").unwrap();
//! let engine = project.engine();
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::templating::TemplateEngine;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// A temporary template directory, removed on drop.
pub struct TestProject {
    pub temp_dir: TempDir,
    pub base_dir: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let base_dir = temp_dir.path().join("templates");
        fs::create_dir_all(&base_dir)?;

        Ok(Self {
            temp_dir,
            base_dir,
        })
    }

    /// Path of `relative` inside the base directory.
    #[must_use]
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.base_dir.join(relative)
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write test file: {}", path.display()))?;
        Ok(path)
    }

    /// Write a partial under `partials/`.
    pub fn write_partial(&self, name: &str, content: &str) -> Result<PathBuf> {
        self.write(format!("partials/{name}.hbs"), content)
    }

    /// Config rooted at the base directory, with `partials/` as the partials directory.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            partials_dir: Some(self.path("partials")),
            ..EngineConfig::with_base_dir(&self.base_dir)
        }
    }

    /// Engine rooted at the base directory, without partials loaded.
    #[must_use]
    pub fn engine(&self) -> TemplateEngine {
        TemplateEngine::with_config(EngineConfig::with_base_dir(&self.base_dir))
    }

    /// Engine built from [`TestProject::config`], loading any partials written so far.
    pub async fn engine_with_partials(&self) -> TemplateEngine {
        TemplateEngine::from_config(self.config()).await
    }
}
