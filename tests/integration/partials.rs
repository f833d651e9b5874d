//! Partials loaded from disk.

use anyhow::Result;
use quill::templating::{Context, PartialRegistry, TemplateError};
use quill::test_utils::TestProject;
use serde_json::json;

#[tokio::test]
async fn test_directory_partials_render_nested() -> Result<()> {
    let project = TestProject::new()?;
    project.write_partial("layout/card", "<div>{{> layout/title}}{{body}}</div>")?;
    project.write_partial("layout/title", "<h2>{{title | uppercase}}</h2>")?;
    project.write("partials/notes.txt", "ignored {{x}}")?;
    project.write("partials/skip.bin", "not a partial")?;

    let engine = project.engine_with_partials().await;
    assert_eq!(engine.partials().names(), vec!["layout/card", "layout/title", "notes"]);

    let context = Context::from_value(json!({"post": {"title": "hi", "body": "text"}}));
    let output = engine.render("{{> layout/card post}}", &context).await?;
    assert_eq!(output, "<div><h2>HI</h2>text</div>");
    Ok(())
}

#[tokio::test]
async fn test_partials_per_loop_item() -> Result<()> {
    let project = TestProject::new()?;
    project.write_partial("row", "{{#if done}}[x]{{else}}[ ]{{/if}} {{name}}\n")?;

    let engine = project.engine_with_partials().await;
    let context = Context::from_value(json!({
        "tasks": [{"name": "write", "done": true}, {"name": "test", "done": false}]
    }));
    let output = engine.render("{{#each tasks}}{{> row}}{{/each}}", &context).await?;
    assert_eq!(output, "[x] write\n[ ] test\n");
    Ok(())
}

#[tokio::test]
async fn test_register_from_missing_file() {
    let project = TestProject::new().unwrap();
    let mut registry = PartialRegistry::new();
    let err = registry.register_from_file("ghost", project.path("ghost.hbs")).await.unwrap_err();
    assert!(matches!(err, TemplateError::PartialFileNotFound { .. }));
}

#[tokio::test]
async fn test_reference_validation() -> Result<()> {
    let project = TestProject::new()?;
    project.write_partial("page", "{{> header}}{{#if x}}{{> footer}}{{/if}}")?;
    project.write_partial("header", "H")?;

    let engine = project.engine_with_partials().await;
    let validation = engine.partials().validate_references("{{> page}}");
    assert!(!validation.valid);
    assert_eq!(validation.missing, vec!["footer"]);
    assert_eq!(engine.partials().extract_references("{{> page}}"), vec!["footer", "header", "page"]);
    Ok(())
}

#[tokio::test]
async fn test_missing_partial_is_left_in_place() -> Result<()> {
    let project = TestProject::new()?;
    let engine = project.engine_with_partials().await;
    assert_eq!(engine.render("a {{> nope}} b", &Context::new()).await?, "a {{> nope}} b");
    Ok(())
}
