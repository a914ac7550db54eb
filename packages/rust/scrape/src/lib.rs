//! Page scraping and content extraction.
//!
//! This crate provides:
//! - [`engine`] — Render-sidecar client, static fetcher, and fetch modes
//! - [`extract`] — Single-page extraction via an ordered strategy cascade
//! - [`listing`] — Bulk extraction of articles from a blog index page

pub mod engine;
pub mod extract;
pub mod listing;

pub use engine::{RenderEngine, RenderOptions, RenderSession, StaticFetcher, parse_fetch_mode};
pub use extract::{ContentExtractor, ContentSource, extract_from_html};
pub use listing::{ListingExtractor, ListingProgress, SilentListingProgress};
