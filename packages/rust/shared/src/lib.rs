//! Shared types, error model, and configuration for redraft.
//!
//! This crate is the foundation depended on by all other redraft crates.
//! It provides:
//! - [`RedraftError`], the unified error type
//! - Domain types ([`OriginalArticle`], [`SourceDocument`], [`Reference`], ...)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LlmConfig, RenderConfig, SearchConfig, StoreConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_api_key, validate_llm_key,
};
pub use error::{MIN_CONTENT_LENGTH, RedraftError, Result};
pub use types::{
    ArticleSummary, EnhancedArticle, EnhancementResult, FetchMode, OriginalArticle, Reference,
    ReferenceCandidate, RunId, ScrapedArticle, SourceDocument,
};
