//! Balanced block scanning for `{{#if}}`, `{{#unless}}` and `{{#each}}`.
//!
//! One scanner serves all three block kinds. Tags are read left to right and
//! pushed on a stack: an `{{else}}` binds to the innermost open block, a close
//! tag must match the innermost open block's kind, and a block is reported only
//! when the stack empties again. The result is the list of *outermost* blocks;
//! inner blocks are found by scanning the selected body again once the outer
//! block has been evaluated.

use std::fmt;

use super::utils::find_directive_end;

/// The three block-level directive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// `{{#if cond}}...{{/if}}`
    If,
    /// `{{#unless cond}}...{{/unless}}`
    Unless,
    /// `{{#each path}}...{{/each}}`
    Each,
}

impl BlockKind {
    /// Keyword used in the open and close tags.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Unless => "unless",
            Self::Each => "each",
        }
    }

    /// Whether this is one of the conditional kinds.
    #[must_use]
    pub const fn is_conditional(self) -> bool {
        matches!(self, Self::If | Self::Unless)
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "if" => Some(Self::If),
            "unless" => Some(Self::Unless),
            "each" => Some(Self::Each),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// An outermost block located in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'t> {
    /// Block kind
    pub kind: BlockKind,
    /// Text after the keyword in the open tag (condition or collection path)
    pub argument: &'t str,
    /// Byte offset of the opening `{{`
    pub start: usize,
    /// Byte offset just past the closing tag's `}}`
    pub end: usize,
    /// Body rendered when the condition holds or for each item
    pub body: &'t str,
    /// Body after a block-level `{{else}}`, if present
    pub else_body: Option<&'t str>,
}

impl Block<'_> {
    /// Reassemble the block's source text from its parts.
    #[must_use]
    pub fn rebuild(&self, body: &str, else_body: Option<&str>) -> String {
        let keyword = self.kind.keyword();
        match else_body {
            Some(else_body) => {
                format!("{{{{#{keyword} {}}}}}{body}{{{{else}}}}{else_body}{{{{/{keyword}}}}}", self.argument)
            }
            None => format!("{{{{#{keyword} {}}}}}{body}{{{{/{keyword}}}}}", self.argument),
        }
    }
}

#[derive(Debug)]
enum Tag<'t> {
    Open(BlockKind, &'t str),
    Close(BlockKind),
    Else,
}

#[derive(Debug)]
struct OpenBlock<'t> {
    kind: BlockKind,
    argument: &'t str,
    start: usize,
    body_start: usize,
    else_span: Option<(usize, usize)>,
}

/// Classify a trimmed directive body as a structural tag.
fn classify(inner: &str) -> Option<Tag<'_>> {
    if inner == "else" {
        return Some(Tag::Else);
    }
    if let Some(rest) = inner.strip_prefix('#') {
        let (keyword, argument) = rest.split_once(char::is_whitespace)?;
        let kind = BlockKind::from_keyword(keyword)?;
        let argument = argument.trim();
        if argument.is_empty() {
            return None;
        }
        return Some(Tag::Open(kind, argument));
    }
    if let Some(rest) = inner.strip_prefix('/') {
        return BlockKind::from_keyword(rest.trim()).map(Tag::Close);
    }
    None
}

/// Locate every outermost block in `template`, left to right.
#[must_use]
pub fn find_blocks(template: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut stack: Vec<OpenBlock<'_>> = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = template[cursor..].find("{{") {
        let open = cursor + rel;
        let Some(close) = find_directive_end(template, open) else {
            cursor = open + 2;
            continue;
        };
        let tag_end = close + 2;
        cursor = tag_end;

        let Some(tag) = classify(template[open + 2..close].trim()) else {
            continue;
        };

        match tag {
            Tag::Open(kind, argument) => stack.push(OpenBlock {
                kind,
                argument,
                start: open,
                body_start: tag_end,
                else_span: None,
            }),
            Tag::Else => match stack.last_mut() {
                Some(top) if top.else_span.is_none() => top.else_span = Some((open, tag_end)),
                Some(top) => {
                    tracing::debug!("Ignoring extra {{{{else}}}} in {{{{#{}}}}} block", top.kind);
                }
                None => tracing::debug!("Ignoring {{{{else}}}} outside of any block"),
            },
            Tag::Close(kind) => {
                if stack.last().is_none_or(|top| top.kind != kind) {
                    tracing::debug!("Ignoring unmatched {{{{/{}}}}} at offset {}", kind, open);
                    continue;
                }
                let Some(finished) = stack.pop() else {
                    continue;
                };
                if !stack.is_empty() {
                    continue;
                }

                let (body, else_body) = match finished.else_span {
                    Some((else_start, else_end)) => (
                        &template[finished.body_start..else_start],
                        Some(&template[else_end..open]),
                    ),
                    None => (&template[finished.body_start..open], None),
                };
                blocks.push(Block {
                    kind: finished.kind,
                    argument: finished.argument,
                    start: finished.start,
                    end: tag_end,
                    body,
                    else_body,
                });
            }
        }
    }

    if let Some(unclosed) = stack.first() {
        tracing::warn!(
            "Unclosed {{{{#{} {}}}}} block at offset {}; leaving it as literal text",
            unclosed.kind,
            unclosed.argument,
            unclosed.start
        );
    }

    blocks
}

/// Rewrite every outermost block through `rewrite`, keeping the text between blocks.
///
/// `rewrite` returns `Some(text)` to replace the block or `None` to keep it verbatim.
pub fn rewrite_blocks<F, E>(template: &str, mut rewrite: F) -> Result<(String, bool), E>
where
    F: FnMut(&Block<'_>) -> Result<Option<String>, E>,
{
    let blocks = find_blocks(template);
    if blocks.is_empty() {
        return Ok((template.to_string(), false));
    }

    let mut output = String::with_capacity(template.len());
    let mut cursor = 0;
    let mut changed = false;

    for block in &blocks {
        output.push_str(&template[cursor..block.start]);
        match rewrite(block)? {
            Some(replacement) => {
                output.push_str(&replacement);
                changed = true;
            }
            None => output.push_str(&template[block.start..block.end]),
        }
        cursor = block.end;
    }
    output.push_str(&template[cursor..]);

    Ok((output, changed))
}

/// Apply `transform` to the text that lies outside every outermost block.
///
/// Block text is passed to `inside`, which may recurse into it or keep it verbatim.
pub fn map_outside_blocks<F, G, E>(template: &str, mut transform: F, mut inside: G) -> Result<String, E>
where
    F: FnMut(&str) -> Result<String, E>,
    G: FnMut(&Block<'_>) -> Result<String, E>,
{
    let blocks = find_blocks(template);
    let mut output = String::with_capacity(template.len());
    let mut cursor = 0;

    for block in &blocks {
        output.push_str(&transform(&template[cursor..block.start])?);
        output.push_str(&inside(block)?);
        cursor = block.end;
    }
    output.push_str(&transform(&template[cursor..])?);

    Ok(output)
}
