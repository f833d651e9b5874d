//! The `quill` binary.

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use quill::test_utils::TestProject;

/// `quill` running inside the project's base directory with a clean environment.
fn quill(project: &TestProject) -> Result<Command> {
    let mut cmd = Command::cargo_bin("quill")?;
    cmd.current_dir(&project.base_dir).env_remove("QUILL_BASE_DIR").env_remove("QUILL_CONFIG").env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn test_render_with_json_context() -> Result<()> {
    let project = TestProject::new()?;
    project.write("hello.hbs", "Hello {{name}}!")?;
    project.write("data.json", r#"{"name": "Ada"}"#)?;

    quill(&project)?
        .args(["render", "hello.hbs", "--context", "data.json"])
        .assert()
        .success()
        .stdout("Hello Ada!");
    Ok(())
}

#[test]
fn test_render_with_yaml_and_overrides() -> Result<()> {
    let project = TestProject::new()?;
    project.write("list.hbs", "{{title}}:{{#each items}} {{this}}{{/each}}")?;
    project.write("data.yaml", "title: Fruits\nitems:\n  - apple\n  - pear\n")?;

    quill(&project)?
        .args(["render", "list.hbs", "--context", "data.yaml", "--set", "title=Produce"])
        .assert()
        .success()
        .stdout("Produce: apple pear");
    Ok(())
}

#[test]
fn test_render_from_stdin_with_include() -> Result<()> {
    let project = TestProject::new()?;
    project.write("parts/sig.txt", "-- {{author}}")?;

    quill(&project)?
        .args(["render", "-", "--set", "author=Quill"])
        .write_stdin("Thanks\n{{#include \"parts/sig.txt\"}}")
        .assert()
        .success()
        .stdout("Thanks\n-- Quill");
    Ok(())
}

#[test]
fn test_render_no_includes_keeps_directive() -> Result<()> {
    let project = TestProject::new()?;
    project.write("page.hbs", "{{#include \"missing.txt\"}}")?;

    quill(&project)?
        .args(["render", "page.hbs", "--no-includes"])
        .assert()
        .success()
        .stdout("{{#include \"missing.txt\"}}");
    Ok(())
}

#[test]
fn test_render_to_output_file() -> Result<()> {
    let project = TestProject::new()?;
    project.write("page.hbs", "{{uppercase word}}")?;

    quill(&project)?.args(["render", "page.hbs", "--set", "word=out", "--output", "build/page.txt"]).assert().success();

    assert_eq!(std::fs::read_to_string(project.path("build/page.txt"))?, "OUT");
    Ok(())
}

#[test]
fn test_render_with_partials_dir() -> Result<()> {
    let project = TestProject::new()?;
    project.write_partial("badge", "[{{label}}]")?;
    project.write("page.hbs", "{{> badge}}")?;

    quill(&project)?
        .args(["render", "page.hbs", "--partials", "partials", "--set", "label=new"])
        .assert()
        .success()
        .stdout("[new]");
    Ok(())
}

#[test]
fn test_render_uses_config_file() -> Result<()> {
    let project = TestProject::new()?;
    project.write("shared/footer.txt", "footer")?;
    project.write("page.hbs", "{{#include \"footer.txt\"}}")?;
    project.write("quill.toml", "base_dir = \"shared\"\n")?;

    quill(&project)?.args(["render", "page.hbs"]).assert().success().stdout("footer");
    Ok(())
}

#[test]
fn test_render_missing_template_fails() -> Result<()> {
    let project = TestProject::new()?;

    quill(&project)?
        .args(["render", "nope.hbs"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Template file not found"));
    Ok(())
}

#[test]
fn test_render_circular_include_fails() -> Result<()> {
    let project = TestProject::new()?;
    project.write("a.txt", "{{#include \"b.txt\"}}")?;
    project.write("b.txt", "{{#include \"a.txt\"}}")?;
    project.write("page.hbs", "{{#include \"a.txt\"}}")?;

    quill(&project)?
        .args(["render", "page.hbs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Circular include detected"));
    Ok(())
}

#[test]
fn test_render_invalid_override_fails() -> Result<()> {
    let project = TestProject::new()?;
    project.write("page.hbs", "x")?;

    quill(&project)?
        .args(["render", "page.hbs", "--set", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid variable override"));
    Ok(())
}

#[test]
fn test_validate_reports_missing_variables() -> Result<()> {
    let project = TestProject::new()?;
    project.write("page.hbs", "{{user.nmae}} {{> footer}}")?;
    project.write("data.json", r#"{"user": {"name": "Ada"}}"#)?;

    quill(&project)?
        .args(["validate", "page.hbs", "--context", "data.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Undefined variable 'user.nmae'"))
        .stdout(predicate::str::contains("user.name"))
        .stdout(predicate::str::contains("Unregistered partial 'footer'"));
    Ok(())
}

#[test]
fn test_validate_json_output() -> Result<()> {
    let project = TestProject::new()?;
    project.write("page.hbs", "{{title}}")?;

    let output = quill(&project)?
        .args(["validate", "page.hbs", "--set", "title=x", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(report["valid"], true);
    assert_eq!(report["missing_variables"], serde_json::json!([]));
    Ok(())
}

#[test]
fn test_variables_command() -> Result<()> {
    let project = TestProject::new()?;
    project.write("page.hbs", "{{title}} {{#each items}}{{name}}{{/each}} {{now()}} {{ author | default(\"x\") }}")?;

    quill(&project)?.args(["variables", "page.hbs"]).assert().success().stdout("author\nitems\ntitle\n");

    quill(&project)?
        .args(["variables", "page.hbs", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"author\""));
    Ok(())
}
