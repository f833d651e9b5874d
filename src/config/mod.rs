//! Configuration management for Quill.
//!
//! Quill reads a single optional TOML file (`quill.toml` in the working
//! directory, or the file passed with `--config`) describing where include
//! files and partials live and how deep each recursive construct may nest.
//!
//! # Configuration File
//!
//! ```toml
//! # Includes are resolved against, and confined to, this directory
//! base_dir = "./templates"
//!
//! # Loaded into the partial registry at startup
//! partials_dir = "./templates/partials"
//!
//! # Resource limits
//! max_include_size = 1048576
//! max_include_depth = 10
//! max_partial_depth = 10
//! max_conditional_depth = 10
//! max_loop_depth = 10
//! max_helper_depth = 10
//! ```
//!
//! # Environment Overrides
//!
//! - `QUILL_BASE_DIR` replaces `base_dir`

mod engine;

pub use engine::{BASE_DIR_ENV, DEFAULT_CONFIG_FILE, EngineConfig, expand_path};
