//! Core error types shared by the library and the CLI.
//!
//! - [`QuillError`] covers failures outside the rendering pipeline (bad
//!   context files, bad overrides, missing templates) and wraps
//!   [`TemplateError`](crate::templating::TemplateError) for rendering failures.
//! - [`ErrorContext`] pairs an error with details and a suggestion for display.
//! - [`user_friendly_error`] converts any `anyhow::Error` into an [`ErrorContext`].

pub mod error;

pub use error::{ErrorContext, QuillError, user_friendly_error};
