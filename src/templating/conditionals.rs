//! `{{#if}}` and `{{#unless}}` blocks.
//!
//! Only outermost blocks are evaluated on each pass. The selected branch is
//! then processed on its own (includes, loops, then nested conditionals), so a
//! discarded branch never has any of its directives evaluated. Conditionals
//! inside an unprocessed `{{#each}}` body are skipped: they belong to the loop's
//! per-iteration scope.
//!
//! Exceeding the nesting limit is not an error. Expansion stops, a warning is
//! logged and the partially expanded text is returned.

use super::blocks::{Block, BlockKind, rewrite_blocks};
use super::context::{Context, Depth};
use super::error::{TemplateError, TemplateResult};
use super::helpers::Evaluator;
use super::helpers::expression::{is_identifier, split_words};
use super::renderer::Pipeline;
use super::utils::is_truthy;

impl Pipeline<'_> {
    /// Evaluate every outermost conditional block until the text stops changing.
    pub(crate) fn process_conditionals(
        &self,
        template: &str,
        context: &Context,
        depth: Depth,
    ) -> TemplateResult<String> {
        let limit = self.config.max_conditional_depth;
        let mut current = template.to_string();
        for _ in 0..limit.max(1) {
            let (next, changed) =
                rewrite_blocks(&current, |block| self.evaluate_block(block, context, depth))?;
            current = next;
            // Once any block was left unexpanded, further passes would only
            // re-expand it with a fresh budget.
            if !changed || self.limits_hit.conditional.get() {
                return Ok(current);
            }
        }

        tracing::warn!("Conditional expansion did not settle after {} passes", limit);
        Ok(current)
    }

    fn evaluate_block(
        &self,
        block: &Block<'_>,
        context: &Context,
        depth: Depth,
    ) -> TemplateResult<Option<String>> {
        if !block.kind.is_conditional() {
            return Ok(None);
        }

        let limit = self.config.max_conditional_depth;
        if depth.conditional >= limit {
            if !self.limits_hit.conditional.replace(true) {
                tracing::warn!(
                    "{}",
                    TemplateError::MaxConditionalDepthExceeded {
                        limit
                    }
                );
            }
            return Ok(None);
        }

        let holds = self.evaluate_condition(block.argument, context);
        let take_body = match block.kind {
            BlockKind::Unless => !holds,
            _ => holds,
        };
        let branch = if take_body {
            Some(block.body)
        } else {
            block.else_body
        };

        match branch {
            Some(branch) => self.render_branch(branch, context, depth.deeper_conditional()).map(Some),
            None => Ok(Some(String::new())),
        }
    }

    /// Process a selected branch: includes, then loops, then nested conditionals.
    fn render_branch(&self, branch: &str, context: &Context, depth: Depth) -> TemplateResult<String> {
        let expanded = self.expand_includes(branch, context, depth, false)?;
        let looped = self.process_loops(&expanded, context, depth)?;
        self.process_conditionals(&looped, context, depth)
    }

    /// Evaluate a block condition for truthiness.
    ///
    /// Helper failures make the condition false.
    pub(crate) fn evaluate_condition(&self, condition: &str, context: &Context) -> bool {
        let evaluator = Evaluator::new(self.helpers, context, self.config.max_helper_depth);

        // `{{#if eq a b}}` is accepted as shorthand for `{{#if (eq a b)}}`.
        let outcome = match split_words(condition).as_slice() {
            [name, args @ ..] if !args.is_empty() && is_identifier(name) => {
                evaluator.call(name, args, 1).map(Some)
            }
            _ => evaluator.evaluate(condition),
        };

        match outcome {
            Ok(value) => is_truthy(value.as_ref()),
            Err(e) => {
                tracing::warn!("Condition '{}' treated as false: {}", condition, e);
                false
            }
        }
    }
}
