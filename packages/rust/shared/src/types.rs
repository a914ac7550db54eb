//! Core domain types for the redraft enhancement pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline invocation (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// How a page's HTML was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Headless-browser render sidecar.
    Render,
    /// Plain HTTP GET with a desktop User-Agent.
    Static,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render => write!(f, "render"),
            Self::Static => write!(f, "static"),
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction results
// ---------------------------------------------------------------------------

/// A single page extracted into normalized title + body text.
///
/// `strategy` names the body-extraction strategy that won (selector name,
/// `paragraphs`, or `body`) and `mode` records how the HTML was fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// The URL the document was extracted from.
    pub url: String,
    /// Page title (first `h1`, falling back to the `title` element).
    pub title: String,
    /// Normalized body text, at least 100 characters.
    pub text: String,
    /// Raw HTML of the page, when retained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_html: Option<String>,
    /// Name of the winning body-extraction strategy.
    pub strategy: String,
    /// Fetch mode that produced the HTML.
    pub mode: FetchMode,
}

/// One article harvested from a listing page (bulk scrape path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedArticle {
    /// Article title, `"Untitled"` when nothing usable was found.
    pub title: String,
    /// Normalized body text.
    pub content: String,
    /// Inner HTML of the matched content container, post-exclusion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_html: Option<String>,
    /// Absolute URL the article was scraped from.
    pub source_url: String,
    /// Author byline, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Published date as found on the page. Blog date formats vary too much
    /// to parse, so the raw attribute/text is carried through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// A discovered external URL that may contain related material. Not yet
/// fetched; purely a pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCandidate {
    pub url: String,
    pub title: String,
}

/// A candidate plus its gathered content (scraped, or substituted from the
/// original article when scraping failed).
#[derive(Debug, Clone)]
pub struct Reference {
    pub url: String,
    pub title: String,
    pub content: String,
}

impl Reference {
    pub fn from_candidate(candidate: ReferenceCandidate, content: String) -> Self {
        Self {
            url: candidate.url,
            title: candidate.title,
            content,
        }
    }
}

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

/// The article being enhanced, supplied inline or resolved from the store.
/// Immutable input to the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalArticle {
    /// Store-assigned identifier.
    pub id: i64,
    /// Title; may be empty for drafts.
    #[serde(default)]
    pub title: String,
    /// Body text.
    #[serde(default)]
    pub content: String,
    /// Where the article was originally scraped from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Author byline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// The enhanced rewrite produced by a workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct EnhancedArticle {
    /// Echoes the original article's id (the store links via `parent_id`).
    pub id: i64,
    /// Original title with an ` (Enhanced)` suffix.
    pub title: String,
    /// Final styled markup.
    pub content: String,
    /// Original source URL with a `#enhanced` fragment, keeping the store's
    /// source-URL uniqueness constraint satisfied.
    pub source_url: String,
    /// Author carried over from the original.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Slim (id, title) view of an article used in result reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
}

// ---------------------------------------------------------------------------
// Workflow result
// ---------------------------------------------------------------------------

/// Everything a completed enhancement run hands back to the caller.
#[derive(Debug, Clone)]
pub struct EnhancementResult {
    /// Always true for a returned result; failures surface as errors.
    pub success: bool,
    /// Identifier for this invocation, also present in the logs.
    pub run_id: RunId,
    /// The article that was enhanced.
    pub original: ArticleSummary,
    /// References that grounded the rewrite (url + title only).
    pub references: Vec<ReferenceCandidate>,
    /// The enhanced article, ready for persistence.
    pub enhanced: EnhancedArticle,
    /// Wall-clock time for the whole run.
    pub duration: Duration,
}
