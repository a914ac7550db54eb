//! Page acquisition: render sidecar client and static fetcher.
//!
//! The render sidecar is a headless-browser HTTP service (`POST /content`
//! renders a URL, `GET /pressure` reports health). One lazily-created client
//! is shared per process, health-checked on each acquisition and recreated
//! when the sidecar has restarted. Extraction code acquires a scoped
//! [`RenderSession`] per page; the sidecar isolates page state per request.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use redraft_shared::{FetchMode, RedraftError, RenderConfig, Result};

/// Desktop browser User-Agent for static fetches; many blogs serve reduced
/// markup to unknown agents.
pub(crate) const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Resource types the sidecar is told not to load.
const BLOCKED_RESOURCE_TYPES: &[&str] = &["image", "stylesheet", "font", "media"];

/// Timeout for plain HTTP fetches.
const STATIC_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the sidecar health probe.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Parse the configured fetch mode string.
pub fn parse_fetch_mode(mode: &str) -> Result<FetchMode> {
    match mode {
        "render" => Ok(FetchMode::Render),
        "static" => Ok(FetchMode::Static),
        other => Err(RedraftError::config(format!(
            "unknown fetch mode: {other} (expected \"render\" or \"static\")"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Render payload
// ---------------------------------------------------------------------------

/// Body of `POST /content`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest<'a> {
    url: &'a str,
    reject_resource_types: &'a [&'a str],
    goto_options: GotoOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_selector: Option<WaitForSelector<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: &'static str,
    timeout: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WaitForSelector<'a> {
    selector: &'a str,
    timeout: u64,
}

/// Options for a single render call.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// CSS selector the sidecar should wait for before returning HTML.
    pub wait_for_selector: Option<String>,
    /// Bound on the selector wait.
    pub wait_timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            wait_for_selector: None,
            wait_timeout: Duration::from_secs(10),
        }
    }
}

impl RenderOptions {
    /// Wait for `selector` before snapshotting the page.
    pub fn wait_for(selector: impl Into<String>, timeout: Duration) -> Self {
        Self {
            wait_for_selector: Some(selector.into()),
            wait_timeout: timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// Render client
// ---------------------------------------------------------------------------

/// One connection to the render sidecar.
struct RenderClient {
    http: Client,
    service_url: String,
    navigation_timeout: Duration,
}

impl RenderClient {
    fn new(service_url: &str, navigation_timeout: Duration) -> Result<Self> {
        // Request deadline: navigation timeout plus margin, so sidecar-side
        // timeouts arrive as error responses instead of client aborts.
        let http = Client::builder()
            .timeout(navigation_timeout + Duration::from_secs(10))
            .build()
            .map_err(|e| RedraftError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            service_url: service_url.trim_end_matches('/').to_string(),
            navigation_timeout,
        })
    }

    async fn healthy(&self) -> bool {
        let probe = self
            .http
            .get(format!("{}/pressure", self.service_url))
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await;

        match probe {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn render(&self, url: &Url, options: &RenderOptions) -> Result<String> {
        let request = RenderRequest {
            url: url.as_str(),
            reject_resource_types: BLOCKED_RESOURCE_TYPES,
            goto_options: GotoOptions {
                wait_until: "domcontentloaded",
                timeout: self.navigation_timeout.as_millis() as u64,
            },
            wait_for_selector: options.wait_for_selector.as_deref().map(|selector| {
                WaitForSelector {
                    selector,
                    timeout: options.wait_timeout.as_millis() as u64,
                }
            }),
        };

        let response = self
            .http
            .post(format!("{}/content", self.service_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RedraftError::Network(format!("render request failed for {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RedraftError::Network(format!(
                "render service returned HTTP {status} for {url}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| RedraftError::Network(format!("render body read failed for {url}: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Render engine
// ---------------------------------------------------------------------------

/// Shared, lazily-initialized handle to the render sidecar.
pub struct RenderEngine {
    service_url: String,
    navigation_timeout: Duration,
    client: Mutex<Option<Arc<RenderClient>>>,
}

impl RenderEngine {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            service_url: config.service_url.clone(),
            navigation_timeout: Duration::from_secs(config.timeout_secs),
            client: Mutex::new(None),
        }
    }

    /// Acquire a scoped render session.
    ///
    /// Creates the client on first use; on reuse, probes the sidecar and
    /// recreates the client once if the probe fails.
    pub async fn session(&self) -> Result<RenderSession> {
        let mut guard = self.client.lock().await;

        if let Some(client) = guard.as_ref() {
            if client.healthy().await {
                return Ok(RenderSession::new(client.clone()));
            }
            warn!(service_url = %self.service_url, "render sidecar unhealthy, recreating client");
            *guard = None;
        }

        let client = Arc::new(RenderClient::new(
            &self.service_url,
            self.navigation_timeout,
        )?);
        if !client.healthy().await {
            return Err(RedraftError::Network(format!(
                "render service unavailable at {}",
                self.service_url
            )));
        }

        *guard = Some(client.clone());
        Ok(RenderSession::new(client))
    }

    /// Drop the shared client. Later sessions recreate it from scratch.
    pub async fn shutdown(&self) {
        let mut guard = self.client.lock().await;
        if guard.take().is_some() {
            debug!(service_url = %self.service_url, "render engine shut down");
        }
    }
}

/// A scoped handle for rendering pages within one extraction.
pub struct RenderSession {
    client: Arc<RenderClient>,
    id: Uuid,
}

impl RenderSession {
    fn new(client: Arc<RenderClient>) -> Self {
        Self {
            client,
            id: Uuid::now_v7(),
        }
    }

    /// Render a page to HTML via the sidecar.
    pub async fn render(&self, url: &Url, options: &RenderOptions) -> Result<String> {
        debug!(session = %self.id, %url, "rendering page");
        self.client.render(url, options).await
    }
}

// ---------------------------------------------------------------------------
// Static fetcher
// ---------------------------------------------------------------------------

/// Plain HTTP GET fallback; parses whatever HTML the server returns.
pub struct StaticFetcher {
    client: Client,
}

impl StaticFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(STATIC_FETCH_TIMEOUT)
            .build()
            .map_err(|e| RedraftError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &Url) -> Result<String> {
        debug!(%url, "fetching page statically");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| RedraftError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RedraftError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| RedraftError::Network(format!("{url}: body read failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub(crate) fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    // Block private/loopback IPs
    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        // Block known local hostnames
        if host == "localhost"
            || host == "127.0.0.1"
            || host == "[::1]"
            || host.ends_with(".local")
            || host.ends_with(".internal")
        {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
