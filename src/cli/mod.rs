//! Command-line interface for Quill.
//!
//! The CLI is a thin host over [`TemplateEngine`](crate::templating::TemplateEngine):
//! it loads the engine configuration, builds a context from data files and
//! `--set` overrides, and hands the template to the engine.
//!
//! # Available Commands
//!
//! - `render` - Render a template to stdout or a file
//! - `validate` - Check a template's variables and partial references against a context
//! - `variables` - List the context paths a template reads
//!
//! # Global Options
//!
//! - `--verbose` - Enable debug output
//! - `--quiet` - Suppress all output except errors
//! - `--config` - Path to a config file (defaults to `quill.toml` when present)
//!
//! # Example
//!
//! ```bash
//! # Render with a YAML context, writing the result to a file
//! quill render page.hbs --context data.yaml --output page.html
//!
//! # Override a single value
//! quill render greeting.hbs --set user.name=Ada
//!
//! # See what a template expects
//! quill variables page.hbs --format json
//! ```

pub mod common;
mod render;
mod validate;
mod variables;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use common::OutputFormat;

/// Main CLI structure for Quill.
#[derive(Parser)]
#[command(
    name = "quill",
    about = "Quill - Render Handlebars-style templates",
    version,
    author,
    long_about = "Quill renders text templates with variables, conditionals, loops, partials, file includes, helpers and pipe transforms."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the engine config file
    #[arg(short, long, global = true, env = "QUILL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template
    Render(render::RenderCommand),

    /// Validate a template against a context
    Validate(validate::ValidateCommand),

    /// List the variables a template reads
    Variables(variables::VariablesCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_level());

        match self.command {
            Commands::Render(cmd) => cmd.execute(self.config).await,
            Commands::Validate(cmd) => cmd.execute(self.config, self.quiet).await,
            Commands::Variables(cmd) => cmd.execute().await,
        }
    }

    /// Log level selected by the global flags; `None` defers to `RUST_LOG`.
    #[must_use]
    pub fn log_level(&self) -> Option<&'static str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("error")
        } else {
            None
        }
    }
}

/// Install the global tracing subscriber, writing to stderr.
///
/// With no explicit level, `RUST_LOG` is honoured and the default is `warn`.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
