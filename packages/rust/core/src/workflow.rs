//! End-to-end enhancement workflow:
//! resolve → discover → gather → synthesize → format → assemble.
//!
//! Each stage carries its own recovery policy. Discovery failures fall back
//! to the original's source URL when one exists; individual reference scrapes
//! fall back to the original's inline content or are dropped; an empty
//! reference list is topped up with the original article itself so synthesis
//! always receives at least one reference. Synthesis failures are fatal.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use url::Url;

use redraft_format::format_content;
use redraft_scrape::ContentSource;
use redraft_search::ReferenceFinder;
use redraft_shared::{
    ArticleSummary, EnhancedArticle, EnhancementResult, OriginalArticle, RedraftError, Reference,
    ReferenceCandidate, Result, RunId,
};
use redraft_synthesis::Synthesizer;

use crate::store::ArticleStore;

/// References requested from the finder per run.
const REFERENCE_LIMIT: usize = 2;

/// Search query used when the original article has no title.
const DEFAULT_QUERY: &str = "technology trends";

// ---------------------------------------------------------------------------
// Input & progress
// ---------------------------------------------------------------------------

/// What to enhance: an inline article, or an identifier to resolve via the
/// store. With neither, the latest stored article is used.
#[derive(Debug, Clone, Default)]
pub struct EnhanceInput {
    /// Full article data supplied by the caller.
    pub article: Option<OriginalArticle>,
    /// Requested article id. Accepted for compatibility; resolution always
    /// returns the latest stored record regardless (see [`EnhancementWorkflow::run`]).
    pub article_id: Option<i64>,
}

impl EnhanceInput {
    /// Enhance the given article directly, skipping store resolution.
    pub fn inline(article: OriginalArticle) -> Self {
        Self {
            article: Some(article),
            article_id: None,
        }
    }

    /// Resolve the article through the store.
    pub fn by_id(article_id: i64) -> Self {
        Self {
            article: None,
            article_id: Some(article_id),
        }
    }
}

/// Progress callbacks for reporting workflow status.
pub trait WorkflowProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a reference scrape is starting.
    fn reference(&self, current: usize, total: usize, url: &str);
    /// Called when the workflow completes.
    fn done(&self, result: &EnhancementResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl WorkflowProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn reference(&self, _current: usize, _total: usize, _url: &str) {}
    fn done(&self, _result: &EnhancementResult) {}
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Sequences the enhancement stages over the injected collaborators.
pub struct EnhancementWorkflow {
    store: Arc<ArticleStore>,
    finder: ReferenceFinder,
    content: Arc<dyn ContentSource>,
    synthesizer: Synthesizer,
}

impl EnhancementWorkflow {
    pub fn new(
        store: Arc<ArticleStore>,
        finder: ReferenceFinder,
        content: Arc<dyn ContentSource>,
        synthesizer: Synthesizer,
    ) -> Self {
        Self {
            store,
            finder,
            content,
            synthesizer,
        }
    }

    /// Run the full enhancement workflow.
    ///
    /// 1. Resolve the original article
    /// 2. Discover reference candidates
    /// 3. Gather reference content
    /// 4. Synthesize the enhanced text
    /// 5. Format as styled markup
    /// 6. Assemble the result
    #[instrument(skip_all, fields(article_id = input.article_id, inline = input.article.is_some()))]
    pub async fn run(
        &self,
        input: EnhanceInput,
        progress: &dyn WorkflowProgress,
    ) -> Result<EnhancementResult> {
        let start = Instant::now();
        let run_id = RunId::new();

        info!(%run_id, "starting enhancement workflow");

        // --- Phase 1: Resolve ---
        progress.phase("Resolving article");
        let original = self.resolve(input).await?;
        info!(id = original.id, title = %original.title, "article ready");

        let query = if original.title.is_empty() {
            DEFAULT_QUERY.to_string()
        } else {
            original.title.clone()
        };

        // --- Phase 2: Discover ---
        progress.phase("Discovering references");
        let candidates = match self.finder.find(&query, REFERENCE_LIMIT).await {
            Ok(candidates) => candidates,
            // Nothing to search with: the original's own source page is the
            // only remaining lead. Without one, the failure is fatal.
            Err(error) => match original.source_url.clone() {
                Some(url) => {
                    warn!(%error, "reference discovery failed, falling back to the original source URL");
                    vec![ReferenceCandidate {
                        url,
                        title: non_empty_or(&original.title, "Source"),
                    }]
                }
                None => return Err(error),
            },
        };
        info!(count = candidates.len(), "reference candidates ready");

        // --- Phase 3: Gather ---
        progress.phase("Gathering reference content");
        let mut references: Vec<Reference> = Vec::new();
        let total = candidates.len();

        for (index, candidate) in candidates.into_iter().enumerate() {
            progress.reference(index + 1, total, &candidate.url);

            match self.gather(&candidate).await {
                Ok(content) => {
                    debug!(url = %candidate.url, chars = content.len(), "reference gathered");
                    references.push(Reference::from_candidate(candidate, content));
                }
                Err(error) => {
                    // A failed scrape of the original's own page can reuse the
                    // inline content; anything else is dropped.
                    if original.source_url.as_deref() == Some(candidate.url.as_str())
                        && !original.content.is_empty()
                    {
                        info!(url = %candidate.url, "substituting original content for failed reference");
                        references
                            .push(Reference::from_candidate(candidate, original.content.clone()));
                    } else {
                        warn!(url = %candidate.url, %error, "reference scrape failed, dropping candidate");
                    }
                }
            }
        }

        // Synthesis always receives at least one reference; the original
        // article stands in for itself when every candidate failed.
        if references.is_empty() {
            warn!("no references gathered, using the original article as its own reference");
            references.push(Reference {
                url: original
                    .source_url
                    .clone()
                    .unwrap_or_else(|| "original".to_string()),
                title: non_empty_or(&original.title, "Original Article"),
                content: original.content.clone(),
            });
        }
        info!(count = references.len(), "references prepared");

        // --- Phase 4: Synthesize ---
        progress.phase("Synthesizing enhanced content");
        let enhanced_text = self
            .synthesizer
            .synthesize(&original.content, &references)
            .await?;

        // --- Phase 5: Format ---
        progress.phase("Formatting content");
        let reference_summaries: Vec<ReferenceCandidate> = references
            .iter()
            .map(|r| ReferenceCandidate {
                url: r.url.clone(),
                title: r.title.clone(),
            })
            .collect();
        let content = format_content(&enhanced_text, &reference_summaries);

        // --- Phase 6: Assemble ---
        // The `#enhanced` fragment keeps the store's source-URL uniqueness
        // constraint satisfied without inventing a new resource.
        let enhanced = EnhancedArticle {
            id: original.id,
            title: format!("{} (Enhanced)", original.title),
            content,
            source_url: format!(
                "{}#enhanced",
                original.source_url.clone().unwrap_or_default()
            ),
            author: original.author.clone(),
        };

        let result = EnhancementResult {
            success: true,
            run_id,
            original: ArticleSummary {
                id: original.id,
                title: original.title,
            },
            references: reference_summaries,
            enhanced,
            duration: start.elapsed(),
        };

        progress.done(&result);

        info!(
            run_id = %result.run_id,
            references = result.references.len(),
            elapsed_ms = result.duration.as_millis(),
            "enhancement workflow complete"
        );

        Ok(result)
    }

    /// Inline article, or the latest stored record. A requested id is logged
    /// but not honored — resolution always returns the latest article.
    async fn resolve(&self, input: EnhanceInput) -> Result<OriginalArticle> {
        if let Some(article) = input.article {
            return Ok(article);
        }
        if let Some(requested) = input.article_id {
            debug!(requested, "id-based resolution returns the latest article");
        }
        self.store.latest().await
    }

    async fn gather(&self, candidate: &ReferenceCandidate) -> Result<String> {
        let url = Url::parse(&candidate.url).map_err(|e| {
            RedraftError::extraction(format!("invalid reference URL {}: {e}", candidate.url))
        })?;
        let doc = self.content.extract(&url).await?;
        Ok(doc.text)
    }
}

/// `value`, unless empty, in which case `fallback`.
fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use async_trait::async_trait;

    use redraft_search::{SearchProvider, synthetic_candidates};
    use redraft_shared::{FetchMode, LlmConfig, SourceDocument, StoreConfig};

    // -- test doubles -------------------------------------------------------

    /// Search provider scripted per test.
    struct ScriptedProvider {
        available: bool,
        outcome: std::result::Result<Vec<ReferenceCandidate>, String>,
    }

    impl ScriptedProvider {
        fn unavailable() -> Self {
            Self {
                available: false,
                outcome: Ok(vec![]),
            }
        }

        fn returning(results: Vec<ReferenceCandidate>) -> Self {
            Self {
                available: true,
                outcome: Ok(results),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                available: true,
                outcome: Err(message.into()),
            }
        }
    }

    #[async_trait]
    impl SearchProvider for ScriptedProvider {
        async fn search(&self, _query: &str, _num: usize) -> Result<Vec<ReferenceCandidate>> {
            match &self.outcome {
                Ok(results) => Ok(results.clone()),
                Err(message) => Err(RedraftError::Search(message.clone())),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            self.available
        }
    }

    /// Content source serving canned text per URL; unknown URLs fail.
    struct ScriptedContent {
        pages: HashMap<String, String>,
    }

    impl ScriptedContent {
        fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, text)| (url.to_string(), text.to_string()))
                    .collect(),
            })
        }

        fn empty() -> Arc<Self> {
            Self::new(&[])
        }
    }

    #[async_trait]
    impl ContentSource for ScriptedContent {
        async fn extract(&self, url: &Url) -> Result<SourceDocument> {
            match self.pages.get(url.as_str()) {
                Some(text) => Ok(SourceDocument {
                    url: url.to_string(),
                    title: "Scripted Page".into(),
                    text: text.clone(),
                    raw_html: None,
                    strategy: "selector article".into(),
                    mode: FetchMode::Static,
                }),
                None => Err(RedraftError::InsufficientContent {
                    url: url.to_string(),
                    length: 0,
                }),
            }
        }
    }

    // -- fixtures -----------------------------------------------------------

    fn original_article() -> OriginalArticle {
        OriginalArticle {
            id: 7,
            title: "Edge AI".into(),
            content: "Edge AI moves model inference onto the devices that generate the data, \
                      trading raw capacity for latency, privacy, and resilience when the uplink drops."
                .into(),
            source_url: Some("https://ex.com/a".into()),
            author: Some("Dana Okafor".into()),
        }
    }

    async fn mock_llm(server: &wiremock::MockServer, response_text: &str) {
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [
                        {"message": {"role": "assistant", "content": response_text}}
                    ]
                })),
            )
            .mount(server)
            .await;
    }

    fn synthesizer(server: &wiremock::MockServer) -> Synthesizer {
        let config = LlmConfig {
            base_url: server.uri(),
            ..LlmConfig::default()
        };
        Synthesizer::new("test-key".into(), &config).unwrap()
    }

    fn unused_store() -> Arc<ArticleStore> {
        Arc::new(
            ArticleStore::new(&StoreConfig {
                base_url: "http://store.invalid".into(),
            })
            .unwrap(),
        )
    }

    fn workflow(
        provider: ScriptedProvider,
        strict: bool,
        content: Arc<dyn ContentSource>,
        synthesizer: Synthesizer,
        store: Arc<ArticleStore>,
    ) -> EnhancementWorkflow {
        let finder = if strict {
            ReferenceFinder::strict(Box::new(provider))
        } else {
            ReferenceFinder::new(Box::new(provider))
        };
        EnhancementWorkflow::new(store, finder, content, synthesizer)
    }

    fn long_text(seed: &str) -> String {
        format!("{seed} ").repeat(40)
    }

    // -- scenarios ----------------------------------------------------------

    #[tokio::test]
    async fn enhances_with_synthetic_references_when_provider_unavailable() {
        let server = wiremock::MockServer::start().await;
        mock_llm(
            &server,
            "## Key Advances\n\nEdge inference now runs on commodity hardware.\n\n* Lower latency\n* Better privacy\n\nClosing remarks.",
        )
        .await;

        // No credential: the finder produces two deterministic candidates,
        // and the scripted source serves both.
        let candidates = synthetic_candidates("Edge AI", 2);
        let ref_one = long_text("Reference one covers quantization tradeoffs.");
        let ref_two = long_text("Reference two covers fleet rollout policy.");
        let content = ScriptedContent::new(&[
            (candidates[0].url.as_str(), ref_one.as_str()),
            (candidates[1].url.as_str(), ref_two.as_str()),
        ]);

        let flow = workflow(
            ScriptedProvider::unavailable(),
            false,
            content,
            synthesizer(&server),
            unused_store(),
        );
        let result = flow
            .run(EnhanceInput::inline(original_article()), &SilentProgress)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.original.id, 7);
        assert_eq!(result.enhanced.title, "Edge AI (Enhanced)");
        assert_eq!(result.enhanced.source_url, "https://ex.com/a#enhanced");
        assert_eq!(result.enhanced.author.as_deref(), Some("Dana Okafor"));

        // Both synthetic candidates survived into the result.
        assert_eq!(result.references.len(), 2);
        assert_eq!(result.references[0].url, candidates[0].url);
        assert_eq!(result.references[1].url, candidates[1].url);

        // One body h2 plus the References h2; the content list plus the
        // references list.
        let html = &result.enhanced.content;
        assert_eq!(html.matches("<h2").count(), 2);
        assert_eq!(html.matches("<ul").count(), 2);
        assert!(html.contains(">Key Advances</h2>"));
        assert!(html.contains(">Lower latency</li>"));
        assert!(html.contains(&candidates[0].url));
        assert!(html.contains(&candidates[1].url));
    }

    #[tokio::test]
    async fn discovery_failure_falls_back_to_source_url() {
        let server = wiremock::MockServer::start().await;
        mock_llm(&server, "Enhanced body.").await;

        // Strict finder so the provider failure reaches the workflow; the
        // original's own page scrapes fine.
        let source_text = long_text("The original page text, refetched.");
        let content = ScriptedContent::new(&[("https://ex.com/a", source_text.as_str())]);

        let flow = workflow(
            ScriptedProvider::failing("search quota exceeded"),
            true,
            content,
            synthesizer(&server),
            unused_store(),
        );
        let result = flow
            .run(EnhanceInput::inline(original_article()), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].url, "https://ex.com/a");
        assert_eq!(result.references[0].title, "Edge AI");
    }

    #[tokio::test]
    async fn discovery_failure_without_source_url_is_fatal() {
        let server = wiremock::MockServer::start().await;
        mock_llm(&server, "never reached").await;

        let mut article = original_article();
        article.source_url = None;

        let flow = workflow(
            ScriptedProvider::failing("search quota exceeded"),
            true,
            ScriptedContent::empty(),
            synthesizer(&server),
            unused_store(),
        );
        let result = flow.run(EnhanceInput::inline(article), &SilentProgress).await;

        assert!(matches!(result, Err(RedraftError::Search(_))));
    }

    #[tokio::test]
    async fn failed_reference_equal_to_source_substitutes_inline_content() {
        let server = wiremock::MockServer::start().await;
        mock_llm(&server, "Enhanced body.").await;

        // Discovery collapses to the original's URL and its scrape fails too:
        // the inline content stands in, so synthesis still sees one reference.
        let flow = workflow(
            ScriptedProvider::failing("search quota exceeded"),
            true,
            ScriptedContent::empty(),
            synthesizer(&server),
            unused_store(),
        );
        let result = flow
            .run(EnhanceInput::inline(original_article()), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].url, "https://ex.com/a");

        // The substituted content reached the prompt verbatim.
        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let prompt = body["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.contains("Reference 1: Edge AI"));
        assert!(prompt.contains("moves model inference onto the devices"));
    }

    #[tokio::test]
    async fn empty_gather_falls_back_to_original_as_sole_reference() {
        let server = wiremock::MockServer::start().await;
        mock_llm(&server, "Enhanced body.").await;

        // Provider finds two article-like candidates, neither of which is the
        // original's URL, and both scrapes fail.
        let provider = ScriptedProvider::returning(vec![
            ReferenceCandidate {
                url: "https://a.example/blog/one".into(),
                title: "One".into(),
            },
            ReferenceCandidate {
                url: "https://b.example/blog/two".into(),
                title: "Two".into(),
            },
        ]);

        let flow = workflow(
            provider,
            false,
            ScriptedContent::empty(),
            synthesizer(&server),
            unused_store(),
        );
        let result = flow
            .run(EnhanceInput::inline(original_article()), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].url, "https://ex.com/a");
        assert_eq!(result.references[0].title, "Edge AI");
    }

    #[tokio::test]
    async fn failed_candidates_are_dropped_silently() {
        let server = wiremock::MockServer::start().await;
        mock_llm(&server, "Enhanced body.").await;

        let surviving = long_text("Only this reference scrapes successfully.");
        let provider = ScriptedProvider::returning(vec![
            ReferenceCandidate {
                url: "https://a.example/blog/dead".into(),
                title: "Dead".into(),
            },
            ReferenceCandidate {
                url: "https://b.example/blog/alive".into(),
                title: "Alive".into(),
            },
        ]);
        let content = ScriptedContent::new(&[("https://b.example/blog/alive", surviving.as_str())]);

        let flow = workflow(provider, false, content, synthesizer(&server), unused_store());
        let result = flow
            .run(EnhanceInput::inline(original_article()), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].title, "Alive");
    }

    #[tokio::test]
    async fn resolution_by_id_still_fetches_the_latest_article() {
        let store_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/articles"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "success": true,
                    "data": [
                        {"id": 9, "title": "Newest", "content": "Newest body text.",
                         "source_url": "https://ex.com/newest"},
                        {"id": 7, "title": "Older", "content": "Older body text.",
                         "source_url": "https://ex.com/older"}
                    ],
                    "count": 2
                }),
            ))
            .mount(&store_server)
            .await;

        let llm_server = wiremock::MockServer::start().await;
        mock_llm(&llm_server, "Enhanced body.").await;

        let store = Arc::new(
            ArticleStore::new(&StoreConfig {
                base_url: store_server.uri(),
            })
            .unwrap(),
        );
        let flow = workflow(
            ScriptedProvider::unavailable(),
            false,
            ScriptedContent::empty(),
            synthesizer(&llm_server),
            store,
        );

        // Requesting id 7 still resolves to the latest record (id 9).
        let result = flow
            .run(EnhanceInput::by_id(7), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.original.id, 9);
        assert_eq!(result.enhanced.title, "Newest (Enhanced)");
    }

    #[tokio::test]
    async fn synthesis_failure_is_fatal() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .respond_with(wiremock::ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let flow = workflow(
            ScriptedProvider::unavailable(),
            false,
            ScriptedContent::empty(),
            synthesizer(&server),
            unused_store(),
        );
        let result = flow
            .run(EnhanceInput::inline(original_article()), &SilentProgress)
            .await;

        assert!(matches!(result, Err(RedraftError::LlmRequest(_))));
    }

    #[tokio::test]
    async fn empty_title_uses_default_query_and_fallback_titles() {
        let server = wiremock::MockServer::start().await;
        mock_llm(&server, "Enhanced body.").await;

        let mut article = original_article();
        article.title = String::new();

        let flow = workflow(
            ScriptedProvider::failing("search quota exceeded"),
            true,
            ScriptedContent::empty(),
            synthesizer(&server),
            unused_store(),
        );
        let result = flow.run(EnhanceInput::inline(article), &SilentProgress).await.unwrap();

        // Discovery fell back to the source URL with the placeholder title.
        assert_eq!(result.references[0].title, "Source");
        assert_eq!(result.enhanced.title, " (Enhanced)");
    }
}
