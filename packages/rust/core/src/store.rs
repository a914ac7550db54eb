//! HTTP client for the external article store.
//!
//! The store owns persistence and the `source_url` uniqueness constraint;
//! this client only reads the latest-first article list and creates new
//! records. List responses arrive as a `{data: [...]}` envelope; create
//! responses arrive either enveloped or as the bare record, depending on
//! the store version.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use redraft_shared::{
    EnhancedArticle, OriginalArticle, RedraftError, Result, ScrapedArticle, StoreConfig,
};

/// Timeout for article reads.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for article writes.
const CREATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the article store's `/articles` endpoints.
pub struct ArticleStore {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ArticlesEnvelope {
    #[serde(default)]
    data: Vec<OriginalArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreateResponse {
    Enveloped { data: OriginalArticle },
    Bare(OriginalArticle),
}

impl CreateResponse {
    fn into_article(self) -> OriginalArticle {
        match self {
            CreateResponse::Enveloped { data } => data,
            CreateResponse::Bare(article) => article,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateArticleRequest<'a> {
    title: &'a str,
    content: &'a str,
    raw_html: Option<&'a str>,
    source_url: &'a str,
    author: Option<&'a str>,
    tags: &'a [String],
    published_at: Option<String>,
    version: &'a str,
    status: &'a str,
    parent_id: Option<i64>,
}

impl ArticleStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| RedraftError::Store(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Most recent article. The store lists articles latest-first, so element
    /// zero is the latest.
    #[instrument(skip_all)]
    pub async fn latest(&self) -> Result<OriginalArticle> {
        let articles = self.list().await?;
        articles
            .into_iter()
            .next()
            .ok_or_else(|| RedraftError::Store("no articles found in backend".to_string()))
    }

    /// All stored articles, latest first.
    pub async fn list(&self) -> Result<Vec<OriginalArticle>> {
        let url = format!("{}/articles", self.base_url);
        debug!(%url, "fetching articles");

        let response = self
            .client
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| RedraftError::Store(format!("article fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".into());
            return Err(RedraftError::Store(format!("HTTP {status}: {body}")));
        }

        let envelope: ArticlesEnvelope = response
            .json()
            .await
            .map_err(|e| RedraftError::Store(format!("invalid article list payload: {e}")))?;
        Ok(envelope.data)
    }

    /// Persist the enhanced rendition as a new record linked to its parent.
    #[instrument(skip(self, article))]
    pub async fn create_enhanced(
        &self,
        article: &EnhancedArticle,
        parent_id: i64,
    ) -> Result<OriginalArticle> {
        let request = CreateArticleRequest {
            title: &article.title,
            content: &article.content,
            raw_html: None,
            source_url: &article.source_url,
            author: article.author.as_deref(),
            tags: &[],
            published_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            version: "enhanced",
            status: "published",
            parent_id: Some(parent_id),
        };
        self.create(&request).await
    }

    /// Persist one scraped article as an original record.
    #[instrument(skip_all, fields(source_url = %article.source_url))]
    pub async fn create_scraped(&self, article: &ScrapedArticle) -> Result<OriginalArticle> {
        let request = CreateArticleRequest {
            title: &article.title,
            content: &article.content,
            raw_html: article.raw_html.as_deref(),
            source_url: &article.source_url,
            author: article.author.as_deref(),
            tags: &[],
            published_at: article.published_at.clone(),
            version: "original",
            status: "published",
            parent_id: None,
        };
        self.create(&request).await
    }

    async fn create(&self, request: &CreateArticleRequest<'_>) -> Result<OriginalArticle> {
        let url = format!("{}/articles", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(CREATE_TIMEOUT)
            .json(request)
            .send()
            .await
            .map_err(|e| RedraftError::Store(format!("article create failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".into());
            return Err(RedraftError::Store(format!("HTTP {status}: {body}")));
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| RedraftError::Store(format!("invalid create payload: {e}")))?;
        Ok(created.into_article())
    }
}
