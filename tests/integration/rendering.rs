//! Full-pipeline rendering through the public API.

use anyhow::Result;
use quill::templating::{Context, TemplateEngine, TemplateError};
use serde_json::{Value, json};

fn render(template: &str, context: Value) -> Result<String> {
    quill::test_utils::init_test_logging(None);
    Ok(TemplateEngine::new().render_sync(template, &Context::from_value(context))?)
}

#[test]
fn test_report_template() -> Result<()> {
    let template = "\
# {{ title | titlecase }}
{{#each sections}}
## {{@index}}. {{name}}{{#if draft}} (draft){{/if}}
{{#each items}}- {{this}}{{#unless @last}},{{/unless}}{{/each}}
{{/each}}
Total: {{length sections}} sections, generated by {{default author \"anonymous\"}}";

    let context = json!({
        "title": "quarterly report",
        "sections": [
            {"name": "Intro", "draft": false, "items": ["a", "b"]},
            {"name": "Numbers", "draft": true, "items": ["c"]}
        ]
    });

    let expected = "\
# Quarterly Report

## 0. Intro
- a,- b

## 1. Numbers (draft)
- c

Total: 2 sections, generated by anonymous";
    assert_eq!(render(template, context)?, expected);
    Ok(())
}

#[test]
fn test_else_chains_nest() -> Result<()> {
    let template = "{{#if a}}A{{else}}{{#if b}}B{{else}}C{{/if}}{{/if}}";
    assert_eq!(render(template, json!({"a": false, "b": true}))?, "B");
    assert_eq!(render(template, json!({"a": 0, "b": ""}))?, "C");
    assert_eq!(render(template, json!({"a": [0]}))?, "A");
    Ok(())
}

#[test]
fn test_helper_conditions() -> Result<()> {
    let template = r#"{{#if (eq role "admin")}}admin{{else}}{{#if gt(age, 17)}}adult{{else}}minor{{/if}}{{/if}}"#;
    assert_eq!(render(template, json!({"role": "admin", "age": 3}))?, "admin");
    assert_eq!(render(template, json!({"role": "user", "age": 30}))?, "adult");
    assert_eq!(render(template, json!({"role": "user", "age": 12}))?, "minor");
    Ok(())
}

#[test]
fn test_object_iteration_in_document_order() -> Result<()> {
    let context = json!({"env": {"ZED": 1, "ALPHA": 2, "MID": 3}});
    assert_eq!(render("{{#each env}}{{@key}}{{/each}}", context)?, "ZEDALPHAMID");
    Ok(())
}

#[test]
fn test_unresolved_directives_survive() -> Result<()> {
    let template = "{{missing}} {{user.name}} {{nosuch 1 2}} {{ missing | uppercase }}";
    assert_eq!(render(template, json!({"user": {}}))?, template);
    Ok(())
}

#[test]
fn test_math_and_strings() -> Result<()> {
    let context = json!({"price": 19.5, "qty": 3, "name": "  quill  "});
    assert_eq!(render("{{multiply price qty}}", context.clone())?, "58.5");
    assert_eq!(render("{{round(divide(10, 4))}}", context.clone())?, "3");
    assert_eq!(render("{{ name | trim | uppercase }}", context.clone())?, "QUILL");
    assert_eq!(render("{{ name | trim | truncate(2) }}", context)?, "qu...");
    Ok(())
}

#[test]
fn test_partial_cycle_is_an_error() {
    let mut engine = TemplateEngine::new();
    engine.register_partial("self", "again {{> self}}");

    let err = engine.render_sync("{{> self}}", &Context::new()).unwrap_err();
    assert!(matches!(err, TemplateError::CircularPartialDependency { .. }));
    assert!(err.format_with_context().contains("Partial chain"));
}

#[test]
fn test_validation_flow() {
    let engine = TemplateEngine::new();
    let template = "{{now()}} {{#if user.active}}{{user.email}}{{/if}} {{#each orders}}{{total}}{{/each}}";
    let context = Context::from_value(json!({"user": {"active": true, "mail": "x"}, "orders": []}));

    assert_eq!(engine.extract_variables(template), vec!["orders", "user.active", "user.email"]);

    let result = engine.validate_context(template, &context);
    assert!(!result.valid);
    assert_eq!(result.missing, vec!["user.email"]);
    assert_eq!(result.suggestions["user.email"], vec!["user.mail", "user.active"]);
}
