//! List the context paths a template reads.

use anyhow::Result;
use clap::Args;

use super::common::{OutputFormat, read_template};
use crate::templating::TemplateEngine;

/// Print every variable path the template reads, one per line.
///
/// Paths scoped to `{{#each}}` bodies and names of built-in helpers are not
/// listed.
#[derive(Args, Debug)]
pub struct VariablesCommand {
    /// Template file, or `-` to read from stdin
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl VariablesCommand {
    pub async fn execute(self) -> Result<()> {
        let template = read_template(&self.template).await?;
        let variables = TemplateEngine::new().extract_variables(&template);

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&variables)?),
            OutputFormat::Text => {
                for variable in &variables {
                    println!("{variable}");
                }
            }
        }
        Ok(())
    }
}
