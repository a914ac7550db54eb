//! Bulk extraction from a blog listing page.
//!
//! Fetches a listing (optionally jumping to the last pagination page for the
//! oldest posts), collects up to `count` article links, and extracts each
//! linked article with the shared body-strategy cascade plus non-content
//! subtree stripping. Individual article failures are logged and skipped;
//! only listing-level failures abort the call.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use redraft_shared::{
    FetchMode, MIN_CONTENT_LENGTH, RedraftError, RenderConfig, Result, ScrapedArticle,
};

use crate::engine::{
    RenderEngine, RenderOptions, StaticFetcher, is_ssrf_target, parse_fetch_mode,
};
use crate::extract::{BodyStrategy, excluded_node_ids, extract_body, normalize_whitespace};

/// Bound on waiting for article containers on a listing page.
const LISTING_WAIT: Duration = Duration::from_secs(10);

/// Bound on waiting for the headline on an article page.
const ARTICLE_WAIT: Duration = Duration::from_secs(5);

/// Paragraph-fallback texts shorter than this are boilerplate, not prose.
const LISTING_PARAGRAPH_MIN_CHARS: usize = 20;

/// Strips a `| Site Name` style tail from a document title.
static TITLE_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[|–-].*$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callbacks for bulk listing extraction.
pub trait ListingProgress: Send + Sync {
    /// A named stage has started.
    fn phase(&self, name: &str);

    /// One article fetch is starting.
    fn article(&self, current: usize, total: usize, url: &str);
}

/// No-op progress reporter.
pub struct SilentListingProgress;

impl ListingProgress for SilentListingProgress {
    fn phase(&self, _name: &str) {}
    fn article(&self, _current: usize, _total: usize, _url: &str) {}
}

// ---------------------------------------------------------------------------
// Listing extractor
// ---------------------------------------------------------------------------

/// Extracts many articles from a blog index page.
pub struct ListingExtractor {
    engine: Arc<RenderEngine>,
    statics: StaticFetcher,
    mode: FetchMode,
    allow_localhost: bool,
}

impl ListingExtractor {
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

    /// Scrape up to `count` articles from `listing_url`.
    ///
    /// With `oldest`, numeric pagination links are parsed and extraction jumps
    /// to the last page; pagination failures are swallowed and extraction
    /// proceeds on the current page.
    #[instrument(skip_all, fields(url = %listing_url, count))]
    pub async fn scrape_listing(
        &self,
        listing_url: &Url,
        count: usize,
        oldest: bool,
        progress: &dyn ListingProgress,
    ) -> Result<Vec<ScrapedArticle>> {
        if is_ssrf_target(listing_url) && !self.allow_localhost {
            return Err(RedraftError::validation(format!(
                "refusing to fetch local or private target: {listing_url}"
            )));
        }

        progress.phase("Fetching listing page");
        let listing_options = RenderOptions::wait_for("article", LISTING_WAIT);
        let mut html = self.fetch_page(listing_url, &listing_options).await?;
        let mut page_url = listing_url.clone();

        if oldest {
            if let Some(last) = last_page_number(&html).filter(|n| *n > 1) {
                match oldest_page_url(listing_url, last) {
                    Ok(paged) => match self.fetch_page(&paged, &listing_options).await {
                        Ok(paged_html) => {
                            debug!(page = last, "jumped to last pagination page");
                            html = paged_html;
                            page_url = paged;
                        }
                        Err(error) => {
                            debug!(page = last, %error, "pagination jump failed, staying on first page");
                        }
                    },
                    Err(error) => debug!(%error, "could not build pagination URL"),
                }
            }
        }

        let candidates = article_links(&html, &page_url, count);
        if candidates.is_empty() {
            info!(url = %page_url, "no article containers found");
            return Ok(Vec::new());
        }

        progress.phase("Scraping articles");
        let total = candidates.len();
        let mut articles = Vec::new();
        for (index, link) in candidates.iter().enumerate() {
            progress.article(index + 1, total, link.as_str());
            match self.scrape_article(link).await {
                Ok(article) => {
                    info!(url = %link, title = %article.title, "article scraped");
                    articles.push(article);
                }
                Err(error) => warn!(url = %link, %error, "article scrape failed, skipping"),
            }
        }

        Ok(articles)
    }

    async fn scrape_article(&self, url: &Url) -> Result<ScrapedArticle> {
        if is_ssrf_target(url) && !self.allow_localhost {
            return Err(RedraftError::validation(format!(
                "refusing to fetch local or private target: {url}"
            )));
        }

        let options = RenderOptions::wait_for("h1, .entry-title", ARTICLE_WAIT);
        let html = self.fetch_page(url, &options).await?;
        parse_listing_article(&html, url)
    }

    async fn fetch_page(&self, url: &Url, options: &RenderOptions) -> Result<String> {
        match self.mode {
            FetchMode::Render => match self.render_page(url, options).await {
                Ok(html) => Ok(html),
                Err(error) => {
                    warn!(%url, %error, "render failed, retrying with static fetch");
                    self.statics.fetch(url).await
                }
            },
            FetchMode::Static => self.statics.fetch(url).await,
        }
    }

    async fn render_page(&self, url: &Url, options: &RenderOptions) -> Result<String> {
        let session = self.engine.session().await?;
        session.render(url, options).await
    }
}

// ---------------------------------------------------------------------------
// Listing parsing
// ---------------------------------------------------------------------------

/// Largest numeric pagination link, if any.
pub(crate) fn last_page_number(html: &str) -> Option<u32> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("a.page-numbers").unwrap();

    doc.select(&selector)
        .filter_map(|el| {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
                text.parse::<u32>().ok()
            } else {
                None
            }
        })
        .max()
}

fn oldest_page_url(listing_url: &Url, page: u32) -> Result<Url> {
    let base = listing_url.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}/page/{page}/"))
        .map_err(|e| RedraftError::validation(format!("invalid pagination URL: {e}")))
}

/// Primary link of each of the first `count` article containers, resolved
/// against the listing URL. Containers without a resolvable link are skipped.
pub(crate) fn article_links(html: &str, base: &Url, count: usize) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let container_selector = Selector::parse("article").unwrap();
    let link_selector = Selector::parse("a[href]").unwrap();

    let mut links = Vec::new();
    for container in doc.select(&container_selector).take(count) {
        let href = container
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .or_else(|| container.value().attr("href"));

        let Some(href) = href else {
            debug!("article container without a link, skipping");
            continue;
        };

        match base.join(href) {
            Ok(resolved) => links.push(resolved),
            Err(error) => debug!(href, %error, "unresolvable article link, skipping"),
        }
    }
    links
}

pub(crate) fn parse_listing_article(html: &str, url: &Url) -> Result<ScrapedArticle> {
    let doc = Html::parse_document(html);
    let excluded = excluded_node_ids(&doc);

    let body = extract_body(&doc, Some(&excluded), LISTING_PARAGRAPH_MIN_CHARS);
    // The paragraph strategy already joins trimmed paragraphs with blank
    // lines; container and body text get fully collapsed.
    let content = match body.strategy {
        BodyStrategy::Paragraphs => body.text,
        _ => normalize_whitespace(&body.text),
    };

    if content.len() < MIN_CONTENT_LENGTH {
        return Err(RedraftError::InsufficientContent {
            url: url.to_string(),
            length: content.len(),
        });
    }

    let strategy = body.strategy.label();
    debug!(%url, %strategy, chars = content.len(), "listing article extracted");

    Ok(ScrapedArticle {
        title: listing_title(&doc),
        content,
        raw_html: body.html,
        source_url: url.to_string(),
        author: first_selector_text(&doc, &[".author", "[rel=\"author\"]", ".entry-author"]),
        published_at: published_date(&doc),
    })
}

fn listing_title(doc: &Html) -> String {
    if let Some(title) = first_selector_text(doc, &["h1", ".entry-title"]) {
        return title;
    }

    let selector = Selector::parse("title").unwrap();
    if let Some(element) = doc.select(&selector).next() {
        let text = element.text().collect::<String>();
        let stripped = TITLE_TAIL_RE.replace(text.trim(), "").trim().to_string();
        if !stripped.is_empty() {
            return stripped;
        }
    }

    "Untitled".to_string()
}

fn first_selector_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    for selector_str in selectors {
        let selector = Selector::parse(selector_str).unwrap();
        if let Some(element) = doc.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// `time`/`.published` datetime attribute, falling back to `.entry-date` text.
fn published_date(doc: &Html) -> Option<String> {
    for selector_str in ["time[datetime]", ".published[datetime]"] {
        let selector = Selector::parse(selector_str).unwrap();
        if let Some(element) = doc.select(&selector).next() {
            if let Some(datetime) = element.value().attr("datetime") {
                let datetime = datetime.trim();
                if !datetime.is_empty() {
                    return Some(datetime.to_string());
                }
            }
        }
    }

    let selector = Selector::parse(".entry-date").unwrap();
    doc.select(&selector).next().and_then(|element| {
        let text = element.text().collect::<String>().trim().to_string();
        (!text.is_empty()).then_some(text)
    })
}
