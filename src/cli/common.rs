//! Argument groups and helpers shared by the CLI commands.

use anyhow::{Context as _, Result};
use clap::Args;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use crate::config::{EngineConfig, expand_path};
use crate::core::QuillError;
use crate::templating::{Context, TemplateEngine};

/// Output format for commands that report results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Structured JSON for automation
    Json,
}

/// Where context data comes from.
#[derive(Args, Debug, Default)]
pub struct ContextArgs {
    /// Context data file (`.json`, `.yaml`/`.yml` or `.toml`)
    #[arg(long, value_name = "FILE")]
    pub context: Option<PathBuf>,

    /// Set a context value, e.g. `--set user.name=Ada` (repeatable)
    ///
    /// Values that parse as JSON (`42`, `true`, `[1,2]`) keep their type;
    /// anything else is a string.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

impl ContextArgs {
    /// Load the context file, if any, then apply `--set` overrides in order.
    pub async fn load(&self) -> Result<Context> {
        let mut root = match &self.context {
            Some(path) => load_context_file(path).await?,
            None => Value::Object(Map::new()),
        };

        for assignment in &self.set {
            apply_override(&mut root, assignment)?;
        }
        Ok(Context::from_value(root))
    }
}

/// Engine construction options.
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// Directory of partial templates (overrides `partials_dir` in the config)
    #[arg(long, value_name = "DIR")]
    pub partials: Option<PathBuf>,

    /// Base directory for includes (overrides `base_dir` in the config)
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,
}

impl EngineArgs {
    /// Load the config file, apply environment and command-line overrides, and build the engine.
    pub async fn build(&self, config_path: Option<PathBuf>) -> Result<TemplateEngine> {
        let mut config = EngineConfig::load_with_optional(config_path).await?;
        config.apply_env_overrides();

        if let Some(dir) = &self.base_dir {
            config.base_dir = expand_path(dir);
        }
        if let Some(dir) = &self.partials {
            config.partials_dir = Some(expand_path(dir));
        }

        tracing::debug!("Engine base directory: {}", config.base_dir.display());
        Ok(TemplateEngine::from_config(config).await)
    }
}

/// Read a template from `path`, or from stdin when `path` is `-`.
pub async fn read_template(path: &str) -> Result<String> {
    if path == "-" {
        let mut template = String::new();
        tokio::io::stdin().read_to_string(&mut template).await.context("Failed to read template from stdin")?;
        return Ok(template);
    }

    let path = Path::new(path);
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(QuillError::TemplateNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    tokio::fs::read_to_string(path).await.with_context(|| format!("Failed to read template {}", path.display()))
}

/// Parse a context file, choosing the format by extension (JSON by default).
pub async fn load_context_file(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read context file {}", path.display()))?;
    parse_context(&content, path)
}

/// Parse context `content`; the top level must be a map.
pub fn parse_context(content: &str, path: &Path) -> Result<Value> {
    let parse_error = |reason: String| QuillError::ContextParseError {
        file: path.display().to_string(),
        reason,
    };

    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    let value: Value = match extension.as_deref() {
        Some("yaml" | "yml") => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?,
        Some("toml") => toml::from_str(content).map_err(|e| parse_error(e.message().to_string()))?,
        _ => serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?,
    };

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(parse_error("top level is not a map".to_string()).into()),
    }
}

/// Apply one `key=value` override, creating intermediate objects for dotted keys.
pub fn apply_override(root: &mut Value, assignment: &str) -> Result<()> {
    let invalid = || QuillError::InvalidOverride {
        value: assignment.to_string(),
    };

    let (key, raw) = assignment.split_once('=').ok_or_else(invalid)?;
    let key = key.trim();
    if key.is_empty() || key.split('.').any(str::is_empty) {
        return Err(invalid().into());
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    let mut segments: Vec<&str> = key.split('.').collect();
    let Some(last) = segments.pop() else {
        return Err(invalid().into());
    };

    let mut current = root;
    for segment in segments {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return Err(invalid().into());
        };
        current = map.entry(segment).or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_context_by_extension() {
        let json_value = parse_context(r#"{"a": 1}"#, Path::new("data.json")).unwrap();
        assert_eq!(json_value, json!({"a": 1}));

        let yaml_value = parse_context("a: 1\nb:\n  - x\n", Path::new("data.yaml")).unwrap();
        assert_eq!(yaml_value, json!({"a": 1, "b": ["x"]}));

        let toml_value = parse_context("a = 1\n[b]\nc = \"x\"\n", Path::new("data.toml")).unwrap();
        assert_eq!(toml_value, json!({"a": 1, "b": {"c": "x"}}));
    }

    #[test]
    fn test_parse_context_rejects_non_map() {
        let err = parse_context("[1, 2]", Path::new("data.json")).unwrap_err();
        assert!(matches!(err.downcast_ref::<QuillError>(), Some(QuillError::ContextParseError { .. })));

        let err = parse_context("{not json", Path::new("data.json")).unwrap_err();
        assert!(err.to_string().contains("data.json"));
    }

    #[test]
    fn test_apply_override() {
        let mut root = json!({"user": {"name": "x"}, "flat": 1});
        apply_override(&mut root, "user.name=Ada").unwrap();
        apply_override(&mut root, "user.age=36").unwrap();
        apply_override(&mut root, "flat.inner=true").unwrap();
        apply_override(&mut root, "tags=[\"a\",\"b\"]").unwrap();
        apply_override(&mut root, "eq=a=b").unwrap();

        assert_eq!(
            root,
            json!({
                "user": {"name": "Ada", "age": 36},
                "flat": {"inner": true},
                "tags": ["a", "b"],
                "eq": "a=b"
            })
        );
    }

    #[test]
    fn test_apply_override_rejects_malformed() {
        let mut root = json!({});
        assert!(apply_override(&mut root, "novalue").is_err());
        assert!(apply_override(&mut root, "=1").is_err());
        assert!(apply_override(&mut root, "a..b=1").is_err());
    }

    #[tokio::test]
    async fn test_context_args_load() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("data.json");
        tokio::fs::write(&path, r#"{"name": "file", "keep": true}"#).await?;

        let args = ContextArgs {
            context: Some(path),
            set: vec!["name=cli".to_string()],
        };
        let context = args.load().await?;
        assert_eq!(context.get("name"), Some(&json!("cli")));
        assert_eq!(context.get("keep"), Some(&json!(true)));
        Ok(())
    }

    #[tokio::test]
    async fn test_read_missing_template() {
        let err = read_template("/no/such/template.hbs").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<QuillError>(), Some(QuillError::TemplateNotFound { .. })));
    }
}
