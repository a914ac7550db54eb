//! Reference discovery for the enhancement pipeline.
//!
//! A [`ReferenceFinder`] wraps one [`SearchProvider`] and applies the
//! article-likeness filter plus the degradation policy: an unavailable
//! provider, a failed search, or zero usable results all fall back to
//! deterministic synthetic candidates so the pipeline stays runnable
//! without credentials.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, instrument, warn};

use redraft_shared::{RedraftError, ReferenceCandidate, Result, SearchConfig};

pub mod provider;
pub mod serpapi;
pub mod synthetic;

pub use provider::SearchProvider;
pub use serpapi::SerpApiProvider;
pub use synthetic::synthetic_candidates;

/// Links that look like editorial/blog content.
static LINK_PATTERN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)blog|article|posts|stories|guide|tutorial").expect("valid regex"));

/// Titles that look like editorial/blog content.
static TITLE_PATTERN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)blog|guide|how to|tips|case study|analysis").expect("valid regex"));

/// Discovers candidate reference URLs for a topic.
pub struct ReferenceFinder {
    provider: Box<dyn SearchProvider>,
    /// When true (the default), provider failures degrade to synthetic
    /// candidates instead of erroring.
    synthetic_fallback: bool,
}

impl ReferenceFinder {
    /// Create a finder with the default degradation policy.
    pub fn new(provider: Box<dyn SearchProvider>) -> Self {
        Self {
            provider,
            synthetic_fallback: true,
        }
    }

    /// Create a finder that propagates provider failures instead of
    /// generating synthetic candidates.
    pub fn strict(provider: Box<dyn SearchProvider>) -> Self {
        Self {
            provider,
            synthetic_fallback: false,
        }
    }

    /// Create a SerpAPI-backed finder from config.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Ok(Self::new(Box::new(SerpApiProvider::from_config(config)?)))
    }

    /// Find up to `limit` article-like reference candidates for `query`.
    #[instrument(skip_all, fields(query = %query, limit))]
    pub async fn find(&self, query: &str, limit: usize) -> Result<Vec<ReferenceCandidate>> {
        if !self.provider.is_available() {
            info!(
                provider = self.provider.name(),
                "search provider unavailable, generating synthetic candidates"
            );
            return Ok(synthetic_candidates(query, limit));
        }

        let raw = match self.provider.search(query, limit.max(2)).await {
            Ok(raw) => raw,
            Err(error) if self.synthetic_fallback => {
                warn!(%error, provider = self.provider.name(), "search failed, generating synthetic candidates");
                return Ok(synthetic_candidates(query, limit));
            }
            Err(error) => return Err(error),
        };

        let matches: Vec<ReferenceCandidate> = raw
            .into_iter()
            .filter(is_article_like)
            .take(limit)
            .collect();

        if matches.is_empty() {
            if self.synthetic_fallback {
                info!("no article-like search results, generating synthetic candidates");
                return Ok(synthetic_candidates(query, limit));
            }
            return Err(RedraftError::Search(format!(
                "no article-like results for query: {query}"
            )));
        }

        info!(count = matches.len(), "found reference candidates");
        Ok(matches)
    }
}

/// Keep results whose link or title suggests long-form editorial content.
fn is_article_like(candidate: &ReferenceCandidate) -> bool {
    LINK_PATTERN_RE.is_match(&candidate.url) || TITLE_PATTERN_RE.is_match(&candidate.title)
}
