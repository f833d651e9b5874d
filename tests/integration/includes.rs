//! File includes through the async render path.

use anyhow::Result;
use quill::config::EngineConfig;
use quill::templating::{Context, TemplateEngine, TemplateError};
use quill::test_utils::TestProject;
use serde_json::json;

#[tokio::test]
async fn test_nested_includes_share_context() -> Result<()> {
    let project = TestProject::new()?;
    project.write("layout/header.md", "# {{title}}\n{{#include \"layout/nav.md\"}}")?;
    project.write("layout/nav.md", "{{#each links}}[{{this}}]{{/each}}")?;

    let context = Context::from_value(json!({"title": "Home", "links": ["a", "b"]}));
    let output = project.engine().render("{{#include \"layout/header.md\"}}\nbody", &context).await?;
    assert_eq!(output, "# Home\n[a][b]\nbody");
    Ok(())
}

#[tokio::test]
async fn test_include_in_selected_branch_only() -> Result<()> {
    let project = TestProject::new()?;
    project.write("admin.md", "admin tools")?;
    project.write("guest.md", "welcome")?;

    let template = r#"{{#if admin}}{{#include "admin.md"}}{{else}}{{#include "guest.md"}}{{/if}}"#;
    let engine = project.engine();

    let admin = engine.render(template, &Context::from_value(json!({"admin": true}))).await?;
    let guest = engine.render(template, &Context::from_value(json!({"admin": false}))).await?;
    assert_eq!(admin, "admin tools");
    assert_eq!(guest, "welcome");
    Ok(())
}

#[tokio::test]
async fn test_three_file_cycle_reports_chain() -> Result<()> {
    let project = TestProject::new()?;
    project.write("a.md", r#"{{#include "b.md"}}"#)?;
    project.write("b.md", r#"{{#include "c.md"}}"#)?;
    project.write("c.md", r#"{{#include "a.md"}}"#)?;

    let err = project.engine().render(r#"{{#include "a.md"}}"#, &Context::new()).await.unwrap_err();
    let TemplateError::CircularInclude {
        path,
        chain,
    } = &err
    else {
        panic!("expected circular include, got {err}");
    };
    assert!(path.ends_with("a.md"));
    assert_eq!(chain.len(), 3);
    assert!(err.format_with_context().contains("circular reference"));
    Ok(())
}

#[tokio::test]
async fn test_path_traversal_is_rejected() -> Result<()> {
    let project = TestProject::new()?;
    std::fs::write(project.temp_dir.path().join("secret.txt"), "secret")?;

    let engine = project.engine();
    let err = engine.render(r#"{{#include "../secret.txt"}}"#, &Context::new()).await.unwrap_err();
    assert!(matches!(err, TemplateError::InvalidIncludePath { .. }));

    let absolute = project.temp_dir.path().join("secret.txt");
    let template = format!("{{{{#include \"{}\"}}}}", absolute.display());
    let err = engine.render(&template, &Context::new()).await.unwrap_err();
    assert!(matches!(err, TemplateError::InvalidIncludePath { .. }));
    Ok(())
}

#[tokio::test]
async fn test_size_limit_from_config() -> Result<()> {
    let project = TestProject::new()?;
    project.write("big.md", &"x".repeat(64))?;

    let config = EngineConfig {
        max_include_size: 32,
        ..EngineConfig::with_base_dir(&project.base_dir)
    };
    let err = TemplateEngine::with_config(config).render(r#"{{#include "big.md"}}"#, &Context::new()).await;
    assert!(matches!(
        err.unwrap_err(),
        TemplateError::IncludeTooLarge {
            size: 64,
            limit: 32,
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_non_literal_include_is_left_alone() -> Result<()> {
    let project = TestProject::new()?;
    let output = project.engine().render("{{#include path}}", &Context::from_value(json!({"path": "x"}))).await?;
    assert_eq!(output, "{{#include path}}");
    Ok(())
}
