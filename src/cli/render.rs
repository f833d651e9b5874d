//! Render a template.

use anyhow::{Context as _, Result};
use clap::Args;
use std::path::PathBuf;

use super::common::{ContextArgs, EngineArgs, read_template};

/// Render a template with a context and print or save the result.
#[derive(Args, Debug)]
pub struct RenderCommand {
    /// Template file, or `-` to read from stdin
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    #[command(flatten)]
    pub data: ContextArgs,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Write the output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Leave `{{#include}}` directives unexpanded
    #[arg(long)]
    pub no_includes: bool,
}

impl RenderCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let engine = self.engine.build(config_path).await?;
        let template = read_template(&self.template).await?;
        let context = self.data.load().await?;

        let output = if self.no_includes {
            engine.render_sync(&template, &context)
        } else {
            engine.render(&template, &context).await
        }
        .with_context(|| format!("Failed to render {}", self.template))?;

        match &self.output {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("Failed to create directory {}", parent.display()))?;
                }
                tokio::fs::write(path, &output)
                    .await
                    .with_context(|| format!("Failed to write output to {}", path.display()))?;
                tracing::info!("Wrote {} bytes to {}", output.len(), path.display());
            }
            None => print!("{output}"),
        }
        Ok(())
    }
}
