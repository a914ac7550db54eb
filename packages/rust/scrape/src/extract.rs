//! Single-page content extraction.
//!
//! Turns a URL into a [`SourceDocument`] by rendering (or statically
//! fetching) the page and running an ordered list of body-text strategies:
//! a selector cascade, a paragraph-concatenation fallback, and finally the
//! whole body text. The strategy that produced the text is recorded on the
//! document for observability.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use ego_tree::{NodeId, NodeRef};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use redraft_shared::{
    FetchMode, MIN_CONTENT_LENGTH, RedraftError, RenderConfig, Result, SourceDocument,
};

use crate::engine::{
    RenderEngine, RenderOptions, StaticFetcher, is_ssrf_target, parse_fetch_mode,
};

/// Ordered body-content selectors, most specific platforms first. The first
/// selector whose text clears [`SELECTOR_MIN_CHARS`] wins.
const BODY_SELECTORS: &[&str] = &[
    "article",
    "main",
    ".entry-content",
    ".post-content",
    "#content",
    "[role=\"main\"]",
    ".wp-content",
    ".content",
    ".article-body",
    "div[class*=\"content\"]",
];

/// A cascade selector must yield more than this much text to be accepted.
const SELECTOR_MIN_CHARS: usize = 200;

/// Subtrees dropped before measuring listing-article text.
pub(crate) const NON_CONTENT_SELECTORS: &str =
    "script, style, nav, header, footer, .comments, .sidebar, .related, .share";

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapse all whitespace runs to single spaces and trim.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

// ---------------------------------------------------------------------------
// Extraction seam
// ---------------------------------------------------------------------------

/// Anything that can turn a URL into an extracted document.
///
/// The enhancement workflow depends on this seam rather than on the concrete
/// extractor so reference gathering can be scripted in tests.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn extract(&self, url: &Url) -> Result<SourceDocument>;
}

// ---------------------------------------------------------------------------
// Body strategies
// ---------------------------------------------------------------------------

/// Which extraction strategy produced the body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyStrategy {
    Selector(&'static str),
    Paragraphs,
    BodyText,
}

impl BodyStrategy {
    pub(crate) fn label(&self) -> String {
        match self {
            BodyStrategy::Selector(selector) => format!("selector {selector}"),
            BodyStrategy::Paragraphs => "paragraphs".to_string(),
            BodyStrategy::BodyText => "body".to_string(),
        }
    }
}

/// Raw (pre-normalization) body text plus the strategy that found it.
pub(crate) struct BodyExtraction {
    pub strategy: BodyStrategy,
    pub text: String,
    /// Inner HTML of the accepted container; only cascade strategies keep it.
    pub html: Option<String>,
}

/// Node IDs of excluded subtrees within a document.
pub(crate) fn excluded_node_ids(doc: &Html) -> HashSet<NodeId> {
    let selector = Selector::parse(NON_CONTENT_SELECTORS).unwrap();
    doc.select(&selector).map(|el| el.id()).collect()
}

/// Text of an element, pruning excluded subtrees during descent.
pub(crate) fn element_text(element: ElementRef, excluded: Option<&HashSet<NodeId>>) -> String {
    let Some(excluded) = excluded else {
        return element.text().collect();
    };

    let mut out = String::new();
    collect_text(&element, excluded, &mut out);
    out
}

fn collect_text(node: &NodeRef<'_, Node>, excluded: &HashSet<NodeId>, out: &mut String) {
    if excluded.contains(&node.id()) {
        return;
    }
    if let Node::Text(text) = node.value() {
        out.push_str(text);
        return;
    }
    for child in node.children() {
        collect_text(&child, excluded, out);
    }
}

/// Remove excluded subtrees from a container's HTML.
fn strip_non_content_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let selector = Selector::parse(NON_CONTENT_SELECTORS).unwrap();

    let mut result = html.to_string();
    for element in fragment.select(&selector) {
        result = result.replace(&element.html(), "");
    }
    result
}

/// Run the body strategies in order and return the first success. The body
/// text strategy always succeeds (possibly with an empty string); length
/// validation is the caller's job.
pub(crate) fn extract_body(
    doc: &Html,
    excluded: Option<&HashSet<NodeId>>,
    paragraph_min_chars: usize,
) -> BodyExtraction {
    if let Some(found) = selector_strategy(doc, excluded) {
        return found;
    }
    if let Some(found) = paragraph_strategy(doc, excluded, paragraph_min_chars) {
        return found;
    }
    body_text_strategy(doc, excluded)
}

fn selector_strategy(
    doc: &Html,
    excluded: Option<&HashSet<NodeId>>,
) -> Option<BodyExtraction> {
    for selector_str in BODY_SELECTORS {
        let selector = Selector::parse(selector_str).unwrap();
        let Some(element) = doc.select(&selector).next() else {
            continue;
        };

        let text = element_text(element, excluded);
        if text.len() <= SELECTOR_MIN_CHARS {
            continue;
        }

        let html = if excluded.is_some() {
            strip_non_content_html(&element.inner_html())
        } else {
            element.inner_html()
        };
        return Some(BodyExtraction {
            strategy: BodyStrategy::Selector(selector_str),
            text,
            html: Some(html),
        });
    }
    None
}

fn paragraph_strategy(
    doc: &Html,
    excluded: Option<&HashSet<NodeId>>,
    min_chars: usize,
) -> Option<BodyExtraction> {
    let selector = Selector::parse("p").unwrap();
    let paragraphs: Vec<String> = doc
        .select(&selector)
        .map(|el| element_text(el, excluded).trim().to_string())
        .filter(|text| text.len() > min_chars)
        .collect();

    let text = paragraphs.join("\n\n");
    if text.len() < MIN_CONTENT_LENGTH {
        return None;
    }
    Some(BodyExtraction {
        strategy: BodyStrategy::Paragraphs,
        text,
        html: None,
    })
}

fn body_text_strategy(doc: &Html, excluded: Option<&HashSet<NodeId>>) -> BodyExtraction {
    let selector = Selector::parse("body").unwrap();
    let text = doc
        .select(&selector)
        .next()
        .map(|el| element_text(el, excluded))
        .unwrap_or_default();

    BodyExtraction {
        strategy: BodyStrategy::BodyText,
        text,
        html: None,
    }
}

/// First non-empty of page `h1`, then document `title`.
pub(crate) fn extract_title(doc: &Html) -> String {
    for selector_str in ["h1", "title"] {
        let selector = Selector::parse(selector_str).unwrap();
        if let Some(element) = doc.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Extract a document from already-acquired HTML.
///
/// Parsing is synchronous on purpose: the parsed tree is not `Send` and must
/// never be held across an await point.
pub fn extract_from_html(html: &str, url: &Url, mode: FetchMode) -> Result<SourceDocument> {
    let doc = Html::parse_document(html);

    let title = extract_title(&doc);
    let body = extract_body(&doc, None, 0);
    let text = normalize_whitespace(&body.text);

    if text.len() < MIN_CONTENT_LENGTH {
        return Err(RedraftError::InsufficientContent {
            url: url.to_string(),
            length: text.len(),
        });
    }

    let strategy = body.strategy.label();
    debug!(%url, %strategy, chars = text.len(), "content extracted");

    Ok(SourceDocument {
        url: url.to_string(),
        title,
        text,
        raw_html: body.html,
        strategy,
        mode,
    })
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Extracts title and body text from a single page.
pub struct ContentExtractor {
    engine: Arc<RenderEngine>,
    statics: StaticFetcher,
    mode: FetchMode,
    allow_localhost: bool,
}

impl ContentExtractor {
    pub fn new(engine: Arc<RenderEngine>, config: &RenderConfig) -> Result<Self> {
        Ok(Self {
            engine,
            statics: StaticFetcher::new()?,
            mode: parse_fetch_mode(&config.mode)?,
            allow_localhost: false,
        })
    }

    /// Allow localhost targets for tests running against local mock servers.
    #[cfg(test)]
    pub(crate) fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Extract a document from `url`.
    ///
    /// In render mode any failure — a sidecar error or rendered HTML that
    /// parses to insufficient content — retries the whole extraction once in
    /// static mode. Static mode makes a single attempt.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn extract(&self, url: &Url) -> Result<SourceDocument> {
        if is_ssrf_target(url) && !self.allow_localhost {
            return Err(RedraftError::validation(format!(
                "refusing to fetch local or private target: {url}"
            )));
        }

        match self.mode {
            FetchMode::Render => match self.extract_rendered(url).await {
                Ok(doc) => Ok(doc),
                Err(error) => {
                    warn!(%url, %error, "render-mode extraction failed, retrying statically");
                    self.extract_static(url).await
                }
            },
            FetchMode::Static => self.extract_static(url).await,
        }
    }

    async fn extract_rendered(&self, url: &Url) -> Result<SourceDocument> {
        let session = self.engine.session().await?;
        let html = session.render(url, &RenderOptions::default()).await?;
        extract_from_html(&html, url, FetchMode::Render)
    }

    async fn extract_static(&self, url: &Url) -> Result<SourceDocument> {
        let html = self.statics.fetch(url).await?;
        extract_from_html(&html, url, FetchMode::Static)
    }
}

#[async_trait]
impl ContentSource for ContentExtractor {
    async fn extract(&self, url: &Url) -> Result<SourceDocument> {
        ContentExtractor::extract(self, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://blog.example.com/post").unwrap()
    }

    fn filler(chars: usize) -> String {
        "Edge inference workloads keep model weights close to the sensor. "
            .chars()
            .cycle()
            .take(chars)
            .collect()
    }

    #[test]
    fn cascade_accepts_article_container() {
        let html = format!(
            "<html><head><title>Site | Post</title></head><body>\
             <h1>Edge AI in Production</h1>\
             <article>{}</article>\
             </body></html>",
            filler(300)
        );

        let doc = extract_from_html(&html, &page_url(), FetchMode::Render).unwrap();

        assert_eq!(doc.title, "Edge AI in Production");
        assert_eq!(doc.strategy, "selector article");
        assert!(doc.text.len() >= MIN_CONTENT_LENGTH);
        assert!(doc.raw_html.is_some());
    }

    #[test]
    fn paragraphs_win_over_body_text() {
        // No cascade selector present; five paragraphs clear the minimum.
        let paragraphs: String = (0..5)
            .map(|i| format!("<p>Paragraph number {i}: {}</p>", filler(50)))
            .collect();
        let html = format!("<html><body><div>{paragraphs}</div></body></html>");

        let doc = extract_from_html(&html, &page_url(), FetchMode::Static).unwrap();

        assert_eq!(doc.strategy, "paragraphs");
        assert!(doc.text.contains("Paragraph number 4"));
        assert!(doc.raw_html.is_none());
    }

    #[test]
    fn body_text_is_the_last_resort() {
        let html = format!("<html><body>{}</body></html>", filler(150));

        let doc = extract_from_html(&html, &page_url(), FetchMode::Static).unwrap();

        assert_eq!(doc.strategy, "body");
    }

    #[test]
    fn thin_pages_fail_with_length() {
        let html = "<html><body><p>Too short.</p></body></html>";

        let result = extract_from_html(html, &page_url(), FetchMode::Render);

        match result {
            Err(RedraftError::InsufficientContent { length, .. }) => assert!(length < 100),
            other => panic!("expected InsufficientContent, got {other:?}"),
        }
    }

    #[test]
    fn title_falls_back_to_title_element() {
        let html = format!(
            "<html><head><title>Fallback Title</title></head><body><article>{}</article></body></html>",
            filler(250)
        );

        let doc = extract_from_html(&html, &page_url(), FetchMode::Render).unwrap();

        assert_eq!(doc.title, "Fallback Title");
    }

    #[test]
    fn whitespace_is_normalized() {
        let html = format!(
            "<html><body><article>  spaced\n\n\tout   {}</article></body></html>",
            filler(250)
        );

        let doc = extract_from_html(&html, &page_url(), FetchMode::Render).unwrap();

        assert!(doc.text.starts_with("spaced out"));
        assert!(!doc.text.contains('\n'));
    }

    #[tokio::test]
    async fn private_targets_are_refused() {
        let config = render_config("http://sidecar.invalid");
        let engine = Arc::new(RenderEngine::new(&config));
        let extractor = ContentExtractor::new(engine, &config).unwrap();

        let url = Url::parse("http://127.0.0.1:9/admin").unwrap();
        let result = extractor.extract(&url).await;

        assert!(matches!(result, Err(RedraftError::Validation { .. })));
    }

    fn render_config(service_url: &str) -> RenderConfig {
        RenderConfig {
            service_url: service_url.into(),
            mode: "render".into(),
            timeout_secs: 10,
        }
    }

    #[tokio::test]
    async fn render_mode_extracts_through_sidecar() {
        let server = wiremock::MockServer::start().await;
        let body = format!("<html><body><h1>Rendered</h1><article>{}</article></body></html>", filler(300));

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/pressure"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/content"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let config = render_config(&server.uri());
        let engine = Arc::new(RenderEngine::new(&config));
        let extractor = ContentExtractor::new(engine, &config).unwrap();

        // Target is a public URL; only the sidecar lives on localhost.
        let doc = extractor.extract(&page_url()).await.unwrap();

        assert_eq!(doc.mode, FetchMode::Render);
        assert_eq!(doc.title, "Rendered");
    }

    #[tokio::test]
    async fn render_failure_falls_back_to_static_fetch() {
        let server = wiremock::MockServer::start().await;
        let body = format!("<html><body><h1>Static</h1><article>{}</article></body></html>", filler(300));

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/pressure"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/content"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/post"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let config = render_config(&server.uri());
        let engine = Arc::new(RenderEngine::new(&config));
        let extractor = ContentExtractor::new(engine, &config).unwrap().allow_localhost();

        let url = Url::parse(&format!("{}/post", server.uri())).unwrap();
        let doc = extractor.extract(&url).await.unwrap();

        assert_eq!(doc.mode, FetchMode::Static);
        assert_eq!(doc.title, "Static");
    }

    #[tokio::test]
    async fn thin_rendered_content_retries_statically() {
        let server = wiremock::MockServer::start().await;
        let body = format!("<html><body><h1>Static</h1><article>{}</article></body></html>", filler(300));

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/pressure"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;
        // Sidecar responds, but the rendered page is a shell with no content.
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/content"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><body><div id=\"app\"></div></body></html>"),
            )
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/post"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let config = render_config(&server.uri());
        let engine = Arc::new(RenderEngine::new(&config));
        let extractor = ContentExtractor::new(engine, &config).unwrap().allow_localhost();

        let url = Url::parse(&format!("{}/post", server.uri())).unwrap();
        let doc = extractor.extract(&url).await.unwrap();

        assert_eq!(doc.mode, FetchMode::Static);
        assert_eq!(doc.title, "Static");
    }

    #[tokio::test]
    async fn static_mode_skips_the_sidecar() {
        let server = wiremock::MockServer::start().await;
        let body = format!("<html><body><article>{}</article></body></html>", filler(300));

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/post"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/content"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = render_config(&server.uri());
        config.mode = "static".into();
        let engine = Arc::new(RenderEngine::new(&config));
        let extractor = ContentExtractor::new(engine, &config).unwrap().allow_localhost();

        let url = Url::parse(&format!("{}/post", server.uri())).unwrap();
        let doc = extractor.extract(&url).await.unwrap();

        assert_eq!(doc.mode, FetchMode::Static);
    }
}
