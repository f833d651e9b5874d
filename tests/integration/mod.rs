//! Integration test suite for Quill
//!
//! End-to-end tests of the public engine API and of the `quill` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **rendering**: Full pipeline behaviour through `TemplateEngine`
//! - **includes**: File includes, path confinement and cycle detection
//! - **partials**: Partial registries loaded from disk and nested partials
//! - **cli**: The `quill` binary's commands, output and exit codes

mod cli;
mod includes;
mod partials;
mod rendering;
