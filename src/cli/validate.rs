//! Validate a template against a context.
//!
//! Reports every variable path the template reads that the context does not
//! define (with close matches as suggestions) and every partial the template
//! references, directly or through other partials, that is not registered.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::common::{ContextArgs, EngineArgs, OutputFormat, read_template};
use crate::core::QuillError;

/// Check a template's variables and partial references.
#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Template file, or `-` to read from stdin
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    #[command(flatten)]
    pub data: ContextArgs,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Validation results, as printed with `--format json`.
#[derive(Debug, Default, Serialize)]
struct ValidationReport {
    valid: bool,
    missing_variables: Vec<String>,
    suggestions: BTreeMap<String, Vec<String>>,
    missing_partials: Vec<String>,
}

impl ValidateCommand {
    pub async fn execute(self, config_path: Option<PathBuf>, quiet: bool) -> Result<()> {
        let engine = self.engine.build(config_path).await?;
        let template = read_template(&self.template).await?;
        let context = self.data.load().await?;

        let variables = engine.validate_context(&template, &context);
        let partials = engine.partials().validate_references(&template);

        let report = ValidationReport {
            valid: variables.valid && partials.valid,
            missing_variables: variables.missing,
            suggestions: variables.suggestions,
            missing_partials: partials.missing,
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text if !quiet => print_report(&self.template, &report),
            OutputFormat::Text => {}
        }

        if !report.missing_variables.is_empty() {
            return Err(QuillError::UndefinedVariables {
                count: report.missing_variables.len(),
            }
            .into());
        }
        if !report.missing_partials.is_empty() {
            return Err(QuillError::UnknownPartials {
                names: report.missing_partials,
            }
            .into());
        }
        Ok(())
    }
}

fn print_report(template: &str, report: &ValidationReport) {
    if report.valid {
        println!("{} {} is valid", "✓".green(), template);
        return;
    }

    for path in &report.missing_variables {
        match report.suggestions.get(path) {
            Some(similar) => println!(
                "{} Undefined variable '{}' (did you mean: {}?)",
                "✗".red(),
                path,
                similar.join(", ")
            ),
            None => println!("{} Undefined variable '{}'", "✗".red(), path),
        }
    }
    for name in &report.missing_partials {
        println!("{} Unregistered partial '{}'", "✗".red(), name);
    }
}
