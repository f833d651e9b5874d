//! Structured error types for template rendering.
//!
//! Errors fall into two classes:
//!
//! - **Abort-class** errors ([`TemplateError::CircularInclude`],
//!   [`TemplateError::IncludeTooLarge`], [`TemplateError::MaxPartialDepthExceeded`], ...)
//!   propagate out of the render call. A template with a genuine cycle or a bad
//!   include path cannot be rendered at all.
//! - **Graceful-class** errors ([`TemplateError::HelperNotFound`],
//!   [`TemplateError::MaxConditionalDepthExceeded`], ...) are caught at the smallest
//!   possible scope, logged through `tracing`, and the offending directive is left
//!   in place or treated as false.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the templating module.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors produced while rendering a template.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// A helper was invoked that is not registered.
    #[error("Helper '{name}' is not registered")]
    HelperNotFound {
        /// Name used at the call site
        name: String,
    },

    /// A registered helper returned an error.
    #[error("Helper '{name}' failed: {message}")]
    HelperFailed {
        /// Helper name
        name: String,
        /// Error reported by the helper
        message: String,
    },

    /// Nested helper calls in an argument list exceeded the configured limit.
    #[error("Helper arguments nested deeper than {limit} levels")]
    HelperNestingTooDeep {
        /// Configured nesting limit
        limit: usize,
    },

    /// An include file is already being expanded further up the include chain.
    #[error("Circular include detected: {}", path.display())]
    CircularInclude {
        /// The file that was encountered a second time
        path: PathBuf,
        /// Files being expanded when the cycle was found, outermost first
        chain: Vec<PathBuf>,
    },

    /// A partial is already being rendered further up the partial chain.
    #[error("Circular partial dependency detected: {name}")]
    CircularPartialDependency {
        /// The partial that was entered a second time
        name: String,
        /// Partials being rendered when the cycle was found, outermost first
        chain: Vec<String>,
    },

    /// Includes nested deeper than the configured limit.
    #[error("Maximum include depth of {limit} exceeded while including '{path}'")]
    MaxIncludeDepthExceeded {
        /// Configured depth limit
        limit: usize,
        /// Literal path of the include that crossed the limit
        path: String,
    },

    /// Partials nested deeper than the configured limit.
    #[error("Maximum partial depth of {limit} exceeded while rendering partial '{name}'")]
    MaxPartialDepthExceeded {
        /// Configured depth limit
        limit: usize,
        /// Partial that crossed the limit
        name: String,
    },

    /// Conditional blocks nested deeper than the configured limit.
    ///
    /// Only ever logged: the renderer returns the partially expanded text.
    #[error("Maximum conditional depth of {limit} exceeded; remaining blocks left unexpanded")]
    MaxConditionalDepthExceeded {
        /// Configured depth limit
        limit: usize,
    },

    /// Loop blocks nested deeper than the configured limit.
    ///
    /// Only ever logged: the renderer returns the partially expanded text.
    #[error("Maximum loop depth of {limit} exceeded; remaining blocks left unexpanded")]
    MaxLoopDepthExceeded {
        /// Configured depth limit
        limit: usize,
    },

    /// Include target does not exist.
    #[error("Include file not found: '{path}'")]
    IncludeFileNotFound {
        /// Literal path from the directive
        path: String,
        /// Path that was looked up on disk
        resolved: PathBuf,
    },

    /// Include target exists but is a directory or special file.
    #[error("Include path '{path}' is not a regular file")]
    IncludeNotAFile {
        /// Literal path from the directive
        path: String,
    },

    /// Include target is bigger than the configured ceiling.
    #[error("Include file '{path}' is too large ({size} bytes, limit {limit} bytes)")]
    IncludeTooLarge {
        /// Literal path from the directive
        path: String,
        /// Actual file size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// Include path escapes the base directory or contains `..`.
    #[error("Invalid include path '{path}': {reason}")]
    InvalidIncludePath {
        /// Literal path from the directive
        path: String,
        /// Why the path was rejected
        reason: String,
    },

    /// `register_from_file` was pointed at a missing file.
    #[error("Partial file not found: {}", path.display())]
    PartialFileNotFound {
        /// Path that was requested
        path: PathBuf,
    },

    /// Filesystem error while reading a template file.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The blocking render task panicked or was cancelled.
    #[error("Render task failed: {message}")]
    RenderTask {
        /// Join error description
        message: String,
    },
}

impl TemplateError {
    /// Whether this error aborts a render (as opposed to being logged and skipped).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::HelperNotFound { .. }
                | Self::HelperFailed { .. }
                | Self::HelperNestingTooDeep { .. }
                | Self::MaxConditionalDepthExceeded { .. }
                | Self::MaxLoopDepthExceeded { .. }
        )
    }

    /// Generate a user-friendly, multi-line error message with a suggestion.
    pub fn format_with_context(&self) -> String {
        match self {
            Self::CircularInclude {
                path,
                chain,
            } => {
                let mut msg = String::from("ERROR: Circular Include Detected\n\n");
                msg.push_str("Include chain:\n");
                for entry in chain {
                    msg.push_str(&format!("  {}\n  ↓\n", entry.display()));
                }
                msg.push_str(&format!("  {} (circular reference)\n\n", path.display()));
                msg.push_str("SUGGESTION: Remove the include that closes the cycle, or move the\n");
                msg.push_str("shared content into a separate file included by both.\n");
                msg
            }
            Self::CircularPartialDependency {
                name,
                chain,
            } => {
                let mut msg = String::from("ERROR: Circular Partial Dependency\n\n");
                msg.push_str("Partial chain:\n");
                for entry in chain {
                    msg.push_str(&format!("  {entry}\n  ↓\n"));
                }
                msg.push_str(&format!("  {name} (circular reference)\n\n"));
                msg.push_str("SUGGESTION: A partial cannot reference itself, directly or through\n");
                msg.push_str("other partials.\n");
                msg
            }
            Self::MaxIncludeDepthExceeded {
                limit,
                path,
            } => format!(
                "ERROR: Include Depth Exceeded\n\nInclude: {path}\nLimit: {limit}\n\n\
                 SUGGESTION: Flatten the include hierarchy or raise max_include_depth.\n"
            ),
            Self::MaxPartialDepthExceeded {
                limit,
                name,
            } => format!(
                "ERROR: Partial Depth Exceeded\n\nPartial: {name}\nLimit: {limit}\n\n\
                 SUGGESTION: Flatten the partial hierarchy or raise max_partial_depth.\n"
            ),
            Self::IncludeFileNotFound {
                path,
                resolved,
            } => format!(
                "ERROR: Include File Not Found\n\nInclude: {path}\nLooked for: {}\n\n\
                 SUGGESTION: Include paths are resolved against the base directory.\n",
                resolved.display()
            ),
            Self::IncludeTooLarge {
                path,
                size,
                limit,
            } => format!(
                "ERROR: Include File Too Large\n\nInclude: {path}\nSize: {size} bytes ({:.2} MB)\n\
                 Limit: {limit} bytes ({:.2} MB)\n\n\
                 SUGGESTION: Split the file or raise max_include_size.\n",
                *size as f64 / (1024.0 * 1024.0),
                *limit as f64 / (1024.0 * 1024.0)
            ),
            Self::InvalidIncludePath {
                path,
                reason,
            } => format!(
                "ERROR: Invalid Include Path\n\nInclude: {path}\nReason: {reason}\n\n\
                 SUGGESTION: Use a path inside the base directory without '..' components.\n"
            ),
            other => format!("ERROR: {other}\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(
            TemplateError::CircularPartialDependency {
                name: "a".into(),
                chain: vec!["a".into()],
            }
            .is_fatal()
        );
        assert!(
            !TemplateError::HelperNotFound {
                name: "nope".into()
            }
            .is_fatal()
        );
        assert!(
            !TemplateError::MaxLoopDepthExceeded {
                limit: 10
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_circular_include_formatting_lists_chain() {
        let err = TemplateError::CircularInclude {
            path: PathBuf::from("/base/a.txt"),
            chain: vec![PathBuf::from("/base/a.txt"), PathBuf::from("/base/b.txt")],
        };
        let msg = err.format_with_context();
        assert!(msg.contains("Circular Include"));
        assert!(msg.contains("/base/b.txt"));
        assert!(msg.contains("(circular reference)"));
    }

    #[test]
    fn test_too_large_message_mentions_sizes() {
        let err = TemplateError::IncludeTooLarge {
            path: "big.txt".into(),
            size: 2000,
            limit: 1000,
        };
        assert!(err.to_string().contains("2000 bytes"));
        assert!(err.to_string().contains("limit 1000"));
    }
}
