//! Application-level errors and their user-facing presentation.
//!
//! Library code returns [`TemplateError`] for rendering problems. The CLI
//! works in `anyhow::Result` and, when a command fails, turns whatever error
//! bubbled up into an [`ErrorContext`] via [`user_friendly_error`]: the error
//! itself, optional details, and an actionable suggestion, printed with
//! terminal colors.

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::templating::TemplateError;

/// Errors raised outside the rendering pipeline.
#[derive(Error, Debug)]
pub enum QuillError {
    /// The template file given on the command line does not exist.
    #[error("Template file not found: {}", path.display())]
    TemplateNotFound {
        /// Path as given
        path: PathBuf,
    },

    /// A context data file could not be parsed.
    #[error("Failed to parse context file {file}: {reason}")]
    ContextParseError {
        /// Context file path
        file: String,
        /// Parser message
        reason: String,
    },

    /// The engine configuration file is malformed.
    #[error("Failed to parse config file {file}: {reason}")]
    ConfigParseError {
        /// Config file path
        file: String,
        /// Parser message
        reason: String,
    },

    /// A `--set` override was not of the form `key=value`.
    #[error("Invalid variable override '{value}': expected key=value")]
    InvalidOverride {
        /// The offending argument
        value: String,
    },

    /// The template reads variables the context does not define.
    #[error("Template references {count} undefined variable(s)")]
    UndefinedVariables {
        /// Number of missing variables
        count: usize,
    },

    /// The template references partials that are not registered.
    #[error("Template references unregistered partial(s): {}", names.join(", "))]
    UnknownPartials {
        /// Missing partial names, sorted
        names: Vec<String>,
    },

    /// A rendering error.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

/// An error paired with user-facing details and a suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: QuillError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: QuillError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error. Displayed in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error. Displayed in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details and suggestion to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// The error chain is walked so that errors wrapped with `anyhow` context are
/// still recognised.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let mut current: &dyn std::error::Error = error.as_ref();
    loop {
        if let Some(quill_error) = current.downcast_ref::<QuillError>() {
            return quill_error_context(quill_error, &error);
        }
        if let Some(template_error) = current.downcast_ref::<TemplateError>() {
            return template_error_context(template_error);
        }
        if let Some(toml_error) = current.downcast_ref::<toml::de::Error>() {
            return ErrorContext::new(QuillError::ConfigParseError {
                file: crate::config::DEFAULT_CONFIG_FILE.to_string(),
                reason: toml_error.message().to_string(),
            })
            .with_suggestion("Check the TOML syntax of the config file. Verify quotes, brackets, and key names");
        }
        if let Some(io_error) = current.downcast_ref::<std::io::Error>() {
            let context = ErrorContext::new(QuillError::Other {
                message: format!("{error:#}"),
            });
            return match io_error.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    context.with_suggestion("Check file permissions and try running with appropriate privileges")
                }
                std::io::ErrorKind::NotFound => {
                    context.with_suggestion("Check that the file or directory exists and the path is correct")
                }
                _ => context,
            };
        }

        match current.source() {
            Some(source) => current = source,
            None => break,
        }
    }

    ErrorContext::new(QuillError::Other {
        message: format!("{error:#}"),
    })
}

fn quill_error_context(quill_error: &QuillError, original: &anyhow::Error) -> ErrorContext {
    match quill_error {
        QuillError::TemplateNotFound {
            path,
        } => ErrorContext::new(QuillError::TemplateNotFound {
            path: path.clone(),
        })
        .with_suggestion("Check the template path, or pass '-' to read the template from stdin"),
        QuillError::ContextParseError {
            file,
            reason,
        } => ErrorContext::new(QuillError::ContextParseError {
            file: file.clone(),
            reason: reason.clone(),
        })
        .with_suggestion("Context files must be JSON, YAML (.yaml/.yml) or TOML (.toml) documents")
        .with_details("The top level of a context file must be a map of variable names to values"),
        QuillError::ConfigParseError {
            file,
            reason,
        } => ErrorContext::new(QuillError::ConfigParseError {
            file: file.clone(),
            reason: reason.clone(),
        })
        .with_suggestion("Check the TOML syntax of the config file. Verify quotes, brackets, and key names"),
        QuillError::InvalidOverride {
            value,
        } => ErrorContext::new(QuillError::InvalidOverride {
            value: value.clone(),
        })
        .with_suggestion("Pass overrides as --set name=value; dotted names like user.name are allowed"),
        QuillError::UndefinedVariables {
            count,
        } => ErrorContext::new(QuillError::UndefinedVariables {
            count: *count,
        })
        .with_suggestion("Define the missing variables in the context file or with --set"),
        QuillError::UnknownPartials {
            names,
        } => ErrorContext::new(QuillError::UnknownPartials {
            names: names.clone(),
        })
        .with_suggestion("Register the partials or point --partials at the directory that holds them"),
        QuillError::Template(template_error) => template_error_context(template_error),
        QuillError::Other {
            ..
        } => ErrorContext::new(QuillError::Other {
            message: format!("{original:#}"),
        }),
    }
}

fn template_error_context(template_error: &TemplateError) -> ErrorContext {
    let formatted = template_error.format_with_context();
    ErrorContext::new(QuillError::Other {
        message: template_error.to_string(),
    })
    .with_details(formatted.trim_end().to_string())
    .with_suggestion("Check the template's include paths and partial references")
}
