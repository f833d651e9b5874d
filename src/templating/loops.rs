//! `{{#each}}` blocks.
//!
//! Each iteration renders the block body through the full body pipeline in
//! its own scope, derived from the enclosing context:
//!
//! | Binding            | Value                                   |
//! |--------------------|-----------------------------------------|
//! | `this`, `item`     | the current element                     |
//! | `@index`           | position, starting at 0                 |
//! | `@key`             | entry key (objects only)                |
//! | `@first`, `@last`  | position checks                         |
//! | `@odd`, `@even`    | parity of `@index`                      |
//! | `@total`           | number of elements                      |
//! | element fields     | flattened in when the element is an object |
//!
//! Iteration outputs are concatenated without a separator. An empty or
//! missing collection renders the `{{else}}` branch against the enclosing
//! context, or nothing.

use serde_json::Value;

use super::blocks::{Block, BlockKind, rewrite_blocks};
use super::context::{Context, Depth, INDEX_KEY, KEY_KEY, TOTAL_KEY};
use super::error::{TemplateError, TemplateResult};
use super::helpers::Evaluator;
use super::renderer::Pipeline;

impl Pipeline<'_> {
    /// Render every outermost `{{#each}}` block. Conditional blocks are left in place.
    pub(crate) fn process_loops(&self, template: &str, context: &Context, depth: Depth) -> TemplateResult<String> {
        let (output, _) = rewrite_blocks(template, |block| {
            if block.kind != BlockKind::Each {
                return Ok(None);
            }

            let limit = self.config.max_loop_depth;
            if depth.looping >= limit {
                if !self.limits_hit.looping.replace(true) {
                    tracing::warn!(
                        "{}",
                        TemplateError::MaxLoopDepthExceeded {
                            limit
                        }
                    );
                }
                return Ok(None);
            }

            self.render_each(block, context, depth.deeper_loop()).map(Some)
        })?;
        Ok(output)
    }

    fn render_each(&self, block: &Block<'_>, context: &Context, depth: Depth) -> TemplateResult<String> {
        let evaluator = Evaluator::new(self.helpers, context, self.config.max_helper_depth);
        let collection = match evaluator.evaluate(block.argument) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Could not evaluate loop collection '{}': {}", block.argument, e);
                None
            }
        };

        let mut output = String::new();
        match collection {
            Some(Value::Array(items)) if !items.is_empty() => {
                let total = items.len();
                for (index, item) in items.iter().enumerate() {
                    let scope = iteration_scope(context, item, index, total, None);
                    output.push_str(&self.render_body(block.body, &scope, depth)?);
                }
            }
            Some(Value::Object(entries)) if !entries.is_empty() => {
                let total = entries.len();
                for (index, (key, item)) in entries.iter().enumerate() {
                    let scope = iteration_scope(context, item, index, total, Some(key));
                    output.push_str(&self.render_body(block.body, &scope, depth)?);
                }
            }
            other => {
                if !matches!(other, Some(Value::Array(_) | Value::Object(_))) {
                    tracing::debug!("'{}' is not iterable; rendering else branch", block.argument);
                }
                if let Some(else_body) = block.else_body {
                    output.push_str(&self.render_body(else_body, context, depth)?);
                }
            }
        }
        Ok(output)
    }
}

/// Derive the scope for one iteration.
fn iteration_scope(context: &Context, item: &Value, index: usize, total: usize, key: Option<&String>) -> Context {
    let fields: Vec<(String, Value)> = match item {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => Vec::new(),
    };

    let mut scope = context.scoped(fields.into_iter().chain([
        ("this".to_string(), item.clone()),
        ("item".to_string(), item.clone()),
        (INDEX_KEY.to_string(), Value::from(index)),
        (TOTAL_KEY.to_string(), Value::from(total)),
    ]));

    match key {
        Some(key) => scope.insert(KEY_KEY, key.clone()),
        None => {
            scope.remove(KEY_KEY);
        }
    }
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templating::renderer::TemplateEngine;
    use serde_json::json;

    fn render(template: &str, context: Value) -> String {
        TemplateEngine::new().render_sync(template, &Context::from_value(context)).unwrap()
    }

    #[test]
    fn test_iterations_do_not_leak() {
        let output = render("{{#each items}}{{@index}}:{{this}}{{/each}}", json!({"items": ["a", "b", "c"]}));
        assert_eq!(output, "0:a1:b2:c");
    }

    #[test]
    fn test_object_fields_are_flattened() {
        let context = json!({"users": [{"name": "Ada"}, {"name": "Linus"}]});
        assert_eq!(render("{{#each users}}{{name}}/{{this.name}};{{/each}}", context), "Ada/Ada;Linus/Linus;");
    }

    #[test]
    fn test_position_flags() {
        let template = "{{#each xs}}{{#if @first}}<{{/if}}{{this}}{{#if @last}}>{{else}},{{/if}}{{/each}}";
        assert_eq!(render(template, json!({"xs": [1, 2, 3]})), "<1,2,3>");

        let parity = "{{#each xs}}{{#if @even}}e{{else}}o{{/if}}{{/each}}";
        assert_eq!(render(parity, json!({"xs": [1, 2, 3]})), "eoe");
    }

    #[test]
    fn test_object_iteration_exposes_key() {
        let context = json!({"env": {"HOST": "localhost", "PORT": 8080}});
        assert_eq!(render("{{#each env}}{{@key}}={{this}} {{/each}}", context), "HOST=localhost PORT=8080 ");
    }

    #[test]
    fn test_else_branch_for_empty_and_missing() {
        let template = "{{#each items}}{{this}}{{else}}none for {{owner}}{{/each}}";
        assert_eq!(render(template, json!({"items": [], "owner": "me"})), "none for me");
        assert_eq!(render(template, json!({"owner": "me"})), "none for me");
        assert_eq!(render("{{#each items}}x{{/each}}", json!({"items": []})), "");
    }

    #[test]
    fn test_nested_loops_see_outer_scope() {
        let context = json!({
            "prefix": "#",
            "groups": [{"name": "a", "items": [1, 2]}, {"name": "b", "items": [3]}]
        });
        let template = "{{#each groups}}{{name}}:{{#each items}}{{prefix}}{{this}}{{/each}};{{/each}}";
        assert_eq!(render(template, context), "a:#1#2;b:#3;");
    }

    #[test]
    fn test_helper_in_collection_and_body() {
        let context = json!({"xs": ["b", "a"]});
        assert_eq!(render("{{#each (sort xs)}}{{uppercase this}}{{/each}}", context), "AB");
    }

    #[test]
    fn test_depth_limit_leaves_inner_loops_untouched() {
        let mut template = String::from("{{this}}{{uppercase word}}");
        for _ in 0..12 {
            template = format!("{{{{#each xs}}}}{template}{{{{/each}}}}");
        }
        let output = render(&template, json!({"xs": [1], "word": "w"}));
        assert_eq!(output, "{{#each xs}}{{#each xs}}{{this}}{{uppercase word}}{{/each}}{{/each}}");
    }

    #[test]
    fn test_loop_depth_limit_from_config() {
        let config = crate::config::EngineConfig {
            max_loop_depth: 1,
            ..Default::default()
        };
        let engine = TemplateEngine::with_config(config);
        let template = "{{#each xs}}{{this}}:{{#each xs}}{{@index}}{{/each}};{{/each}}";
        let output = engine.render_sync(template, &Context::from_value(json!({"xs": ["a", "b"]}))).unwrap();
        assert_eq!(output, "a:{{#each xs}}{{@index}}{{/each}};b:{{#each xs}}{{@index}}{{/each}};");
    }

    #[test]
    fn test_iteration_scope_bindings() {
        let parent = Context::from_value(json!({"outer": 1}));
        let scope = iteration_scope(&parent, &json!({"name": "x"}), 1, 3, None);
        assert_eq!(scope.get("name"), Some(&json!("x")));
        assert_eq!(scope.get(INDEX_KEY), Some(&json!(1)));
        assert_eq!(scope.get(TOTAL_KEY), Some(&json!(3)));
        assert_eq!(scope.get("outer"), Some(&json!(1)));
        assert!(parent.get("name").is_none());
    }
}
