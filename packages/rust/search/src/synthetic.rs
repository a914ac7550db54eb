//! Deterministic synthetic candidates for credential-less operation.
//!
//! When no search provider is usable, the pipeline still needs reference
//! URLs to stay runnable end to end. Candidates are generated from a fixed
//! editorial domain list, with the domain picked by hashing the query and
//! index, so repeated runs produce identical output.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use redraft_shared::ReferenceCandidate;

/// Editorial domains used for synthetic reference URLs.
const EDITORIAL_DOMAINS: &[&str] = &[
    "medium.com",
    "dev.to",
    "hashnode.com",
    "linkedin.com/pulse",
    "reddit.com/r",
    "stackoverflow.com",
    "quora.com",
    "forbes.com",
    "techcrunch.com",
    "wired.com",
    "theverge.com",
    "arstechnica.com",
];

/// Maximum slug length for generated URLs.
const MAX_SLUG_LEN: usize = 50;

/// Generate `limit` deterministic candidates for `query`.
pub fn synthetic_candidates(query: &str, limit: usize) -> Vec<ReferenceCandidate> {
    let slug = slugify(query);

    (0..limit)
        .map(|i| ReferenceCandidate {
            url: format!("https://{}/{slug}-{}", pick_domain(query, i), i + 1),
            title: format!("{query} - Part {} - Guide & Best Practices", i + 1),
        })
        .collect()
}

/// Hash (query, index) into a stable domain choice.
fn pick_domain(query: &str, index: usize) -> &'static str {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update(index.to_le_bytes());
    let digest = hasher.finalize();

    let n = u64::from_le_bytes(digest[..8].try_into().expect("digest has 8 bytes"));
    EDITORIAL_DOMAINS[(n % EDITORIAL_DOMAINS.len() as u64) as usize]
}

/// Lowercase, collapse non-alphanumeric runs to `-`, cap the length.
/// Leading/trailing dashes are kept; the URLs are synthetic anyway.
fn slugify(query: &str) -> String {
    static NON_ALNUM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

    let mut slug = NON_ALNUM_RE
        .replace_all(&query.to_lowercase(), "-")
        .to_string();
    slug.truncate(MAX_SLUG_LEN);
    slug
}
