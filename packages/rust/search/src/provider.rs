//! Search provider abstraction.

use async_trait::async_trait;

use redraft_shared::{ReferenceCandidate, Result};

/// A web-search backend that can surface candidate reference URLs.
///
/// Implementations return raw, unfiltered results; the
/// [`ReferenceFinder`](crate::ReferenceFinder) applies the article-likeness
/// filter and the degradation policy.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a search and return up to `num` raw candidates.
    async fn search(&self, query: &str, num: usize) -> Result<Vec<ReferenceCandidate>>;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Whether the provider can currently serve requests (credential present
    /// and not a placeholder).
    fn is_available(&self) -> bool;
}
