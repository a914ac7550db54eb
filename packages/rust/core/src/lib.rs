//! Enhancement workflow orchestration for redraft.
//!
//! This crate ties discovery, extraction, synthesis, and formatting into the
//! end-to-end enhancement workflow, and owns the HTTP client for the external
//! article store.

pub mod store;
pub mod workflow;

pub use store::ArticleStore;
pub use workflow::{EnhanceInput, EnhancementWorkflow, SilentProgress, WorkflowProgress};
