//! Shared types, error model, and configuration for quizbank.
//!
//! This crate is the foundation depended on by all other quizbank crates.
//! It provides:
//! - [`QuizbankError`]: the unified error type
//! - Domain types ([`ExtractedQuestion`], [`NewQuestion`], [`QuestionRecord`], [`User`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AuthConfig, DatabaseConfig, ExtractorConfig, ImageBackendKind, ImagesConfig,
    ParagraphMatch, ServerConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_images, validate_secret,
};
pub use error::{ErrorKind, QuizbankError, Result};
pub use types::{AccessToken, ExtractedQuestion, NewQuestion, QuestionRecord, QuestionView, User};
