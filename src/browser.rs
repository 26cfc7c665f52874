//! Page access for the research and screenshot phases.
//!
//! `Browser` is the seam; `HttpBrowser` implements it with plain HTTP
//! fetches and regex extraction. It cannot rasterize pages, so screenshot
//! requests fail and the visual phases degrade as they would for any other
//! capture failure.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use futures::future::BoxFuture;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::schemas::pipeline::ScreenshotEntry;
use crate::util::{cached_regex, truncate_str};

pub const PAGE_TIMEOUT_SECS: u64 = 30;
pub const REACHABILITY_TIMEOUT_SECS: u64 = 15;

const MAX_LINKS: usize = 30;
const MAX_LINK_TEXT: usize = 80;
const MAX_HEADING_TEXT: usize = 120;
const MAX_BODY_TEXT: usize = 3000;
const MAX_CUSTOM_PROPERTIES: usize = 50;
const MAX_STYLESHEETS: usize = 5;
const USER_AGENT: &str = concat!("sea-agents/", env!("CARGO_PKG_VERSION"));

/// A link found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub url: String,
    pub text: String,
}

/// One open browsing session.
pub trait Browser: Send + Sync {
    /// Structured text: title, description, navigation, headings, body text.
    fn page_text<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<String>>;

    /// Same-origin links with non-empty text.
    fn discover_links<'a>(&'a self, url: &'a str)
        -> BoxFuture<'a, anyhow::Result<Vec<PageLink>>>;

    /// Custom properties, fonts and colors as pretty JSON.
    fn extract_css<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<String>>;

    /// Capture viewport tiles. Successful captures are also recorded on
    /// the session.
    fn screenshot<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<ScreenshotEntry>>;

    /// Captures recorded by `screenshot` during this session.
    fn captured_screenshots(&self) -> Vec<ScreenshotEntry>;

    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Opens browsing sessions.
pub trait BrowserFactory: Send + Sync {
    fn open(&self) -> BoxFuture<'_, anyhow::Result<Arc<dyn Browser>>>;
}

/// Run `body` with a fresh session, closing it afterwards whatever the outcome.
pub async fn with_browser<T, F, Fut>(factory: &dyn BrowserFactory, body: F) -> anyhow::Result<T>
where
    F: FnOnce(Arc<dyn Browser>) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let browser = factory.open().await?;
    debug!("Browser session opened");
    let result = body(browser.clone()).await;
    browser.close().await;
    debug!("Browser session closed");
    result
}

/// HEAD the URL; any response below 400 counts as reachable.
pub async fn check_url_reachable(url: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(REACHABILITY_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")?;
    let response = client
        .head(url)
        .send()
        .await
        .with_context(|| format!("{} is unreachable", url))?;
    let status = response.status();
    if status.as_u16() >= 400 {
        bail!("{} returned HTTP {}", url, status);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
//  HTML EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════

static TITLE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static META_DESC_RE: OnceLock<Option<Regex>> = OnceLock::new();
static NAV_RE: OnceLock<Option<Regex>> = OnceLock::new();
static ANCHOR_RE: OnceLock<Option<Regex>> = OnceLock::new();
static HEADING_RE: OnceLock<Option<Regex>> = OnceLock::new();
static NOISE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static TAG_RE: OnceLock<Option<Regex>> = OnceLock::new();
static SPACE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static STYLE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static LINK_TAG_RE: OnceLock<Option<Regex>> = OnceLock::new();
static HREF_RE: OnceLock<Option<Regex>> = OnceLock::new();
static CUSTOM_PROP_RE: OnceLock<Option<Regex>> = OnceLock::new();
static FONT_RE: OnceLock<Option<Regex>> = OnceLock::new();
static COLOR_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn re(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> anyhow::Result<&'static Regex> {
    cached_regex(cell, pattern).ok_or_else(|| anyhow!("invalid extraction pattern: {}", pattern))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Strip tags and collapse whitespace.
fn inner_text(html: &str) -> anyhow::Result<String> {
    let no_tags = re(&TAG_RE, r"(?s)<[^>]*>")?.replace_all(html, " ");
    let decoded = decode_entities(&no_tags);
    Ok(re(&SPACE_RE, r"\s+")?
        .replace_all(&decoded, " ")
        .trim()
        .to_string())
}

fn strip_noise(html: &str) -> anyhow::Result<String> {
    Ok(re(
        &NOISE_RE,
        r"(?is)<(?:script|style|noscript|svg)\b[^>]*>.*?</(?:script|style|noscript|svg)>",
    )?
    .replace_all(html, " ")
    .into_owned())
}

fn anchors(html: &str) -> anyhow::Result<Vec<(String, String)>> {
    let anchor = re(
        &ANCHOR_RE,
        r#"(?is)<a\b[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#,
    )?;
    anchor
        .captures_iter(html)
        .map(|caps| {
            let href = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let text = inner_text(caps.get(2).map(|m| m.as_str()).unwrap_or_default())?;
            Ok((decode_entities(href), text))
        })
        .collect()
}

/// Render fetched HTML as the structured text the research agent reads.
pub fn structured_text(html: &str, base: &Url) -> anyhow::Result<String> {
    let html = strip_noise(html)?;
    let mut sections = Vec::new();

    let title = re(&TITLE_RE, r"(?is)<title[^>]*>(.*?)</title>")?
        .captures(&html)
        .and_then(|c| c.get(1))
        .map(|m| inner_text(m.as_str()))
        .transpose()?
        .unwrap_or_default();
    sections.push(format!("# {}", title));

    let meta = re(
        &META_DESC_RE,
        r#"(?is)<meta\b[^>]*name\s*=\s*["']description["'][^>]*content\s*=\s*["']([^"']*)["']"#,
    )?;
    if let Some(desc) = meta.captures(&html).and_then(|c| c.get(1)) {
        sections.push(format!("Description: {}", decode_entities(desc.as_str())));
    }

    let navs: Vec<_> = re(&NAV_RE, r"(?is)<nav\b[^>]*>(.*?)</nav>")?
        .captures_iter(&html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();
    if !navs.is_empty() {
        sections.push("\n## Navigation".to_string());
        for nav in navs {
            let links: Vec<String> = anchors(&nav)?
                .into_iter()
                .filter(|(_, text)| !text.is_empty())
                .map(|(href, text)| {
                    let resolved = base
                        .join(&href)
                        .map(|u| u.to_string())
                        .unwrap_or(href);
                    format!("  - [{}]({})", text, resolved)
                })
                .collect();
            if !links.is_empty() {
                sections.push(links.join("\n"));
            }
        }
    }

    let headings: Vec<String> = re(&HEADING_RE, r"(?is)<h([1-4])\b[^>]*>(.*?)</h[1-4]>")?
        .captures_iter(&html)
        .filter_map(|c| {
            let level: usize = c.get(1)?.as_str().parse().ok()?;
            let text = inner_text(c.get(2)?.as_str()).ok()?;
            Some(format!(
                "{}H{}: {}",
                "  ".repeat(level - 1),
                level,
                truncate_str(&text, MAX_HEADING_TEXT)
            ))
        })
        .collect();
    if !headings.is_empty() {
        sections.push("\n## Content Structure".to_string());
        sections.extend(headings);
    }

    let body = inner_text(&html)?;
    sections.push("\n## Main Content (truncated)".to_string());
    sections.push(truncate_str(&body, MAX_BODY_TEXT).to_string());

    let landmarks: Vec<&str> = ["header", "main", "footer", "aside", "section", "article"]
        .into_iter()
        .filter(|tag| html.to_ascii_lowercase().contains(&format!("<{}", tag)))
        .collect();
    if !landmarks.is_empty() {
        sections.push(format!("\n## Semantic Landmarks: {}", landmarks.join(", ")));
    }

    Ok(sections.join("\n"))
}

/// Same-origin links with text, resolved against `base`, first 30.
pub fn same_origin_links(html: &str, base: &Url) -> anyhow::Result<Vec<PageLink>> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for (href, text) in anchors(&strip_noise(html)?)? {
        if href.starts_with("javascript:") || href.starts_with('#') || href.starts_with("mailto:") {
            continue;
        }
        let Ok(resolved) = base.join(&href) else {
            continue;
        };
        if resolved.origin() != base.origin() || text.is_empty() {
            continue;
        }
        let url = resolved.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }
        links.push(PageLink {
            url,
            text: truncate_str(&text, MAX_LINK_TEXT).to_string(),
        });
        if links.len() >= MAX_LINKS {
            break;
        }
    }
    Ok(links)
}

/// Inline `<style>` blocks and linked stylesheet URLs.
fn style_sources(html: &str, base: &Url) -> anyhow::Result<(Vec<String>, Vec<Url>)> {
    let inline = re(&STYLE_RE, r"(?is)<style\b[^>]*>(.*?)</style>")?
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();
    let href = re(&HREF_RE, r#"(?i)href\s*=\s*["']([^"']+)["']"#)?;
    let linked = re(&LINK_TAG_RE, r#"(?is)<link\b[^>]*rel\s*=\s*["']?stylesheet["']?[^>]*>"#)?
        .find_iter(html)
        .filter_map(|m| href.captures(m.as_str())?.get(1).map(|h| h.as_str().to_string()))
        .filter_map(|h| base.join(&h).ok())
        .take(MAX_STYLESHEETS)
        .collect();
    Ok((inline, linked))
}

/// Summarize design tokens found in CSS text.
pub fn summarize_css(css: &[String]) -> anyhow::Result<serde_json::Value> {
    let prop_re = re(&CUSTOM_PROP_RE, r"(--[A-Za-z0-9_-]+)\s*:\s*([^;}]+)")?;
    let font_re = re(&FONT_RE, r"(?i)font-family\s*:\s*([^;}]+)")?;
    let color_re = re(
        &COLOR_RE,
        r"(#[0-9a-fA-F]{3,8}\b|rgba?\([^)]*\)|hsla?\([^)]*\))",
    )?;

    let mut props = serde_json::Map::new();
    let mut total = 0usize;
    let mut fonts: Vec<String> = Vec::new();
    let mut colors: Vec<String> = Vec::new();

    for sheet in css {
        for caps in prop_re.captures_iter(sheet) {
            let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if !props.contains_key(name.as_str()) {
                total += 1;
                if props.len() < MAX_CUSTOM_PROPERTIES {
                    props.insert(
                        name.as_str().to_string(),
                        serde_json::Value::String(value.as_str().trim().to_string()),
                    );
                }
            }
        }
        for caps in font_re.captures_iter(sheet) {
            if let Some(font) = caps.get(1).map(|m| m.as_str().trim().to_string()) {
                if !fonts.contains(&font) && fonts.len() < 10 {
                    fonts.push(font);
                }
            }
        }
        for m in color_re.find_iter(sheet) {
            let color = m.as_str().to_string();
            if !colors.contains(&color) && colors.len() < 20 {
                colors.push(color);
            }
        }
    }

    Ok(serde_json::json!({
        "custom_properties": props,
        "custom_properties_total": total,
        "fonts": fonts,
        "colors": colors,
    }))
}

// ═══════════════════════════════════════════════════════════════════════════
//  HTTP SESSION
// ═══════════════════════════════════════════════════════════════════════════

/// Fetch-only browser session.
pub struct HttpBrowser {
    http: reqwest::Client,
}

impl HttpBrowser {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PAGE_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { http })
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<(Url, String)> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
        let response = self
            .http
            .get(parsed.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .with_context(|| format!("Failed to fetch {}", url))?;
        // Redirects change the base for relative links
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok((final_url, body))
    }
}

impl Browser for HttpBrowser {
    fn page_text<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move {
            let (base, html) = self.fetch(url).await?;
            structured_text(&html, &base)
        })
    }

    fn discover_links<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Vec<PageLink>>> {
        Box::pin(async move {
            let (base, html) = self.fetch(url).await?;
            same_origin_links(&html, &base)
        })
    }

    fn extract_css<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move {
            let (base, html) = self.fetch(url).await?;
            let (mut sheets, linked) = style_sources(&html, &base)?;
            for sheet_url in linked {
                match self.fetch(sheet_url.as_str()).await {
                    Ok((_, css)) => sheets.push(css),
                    Err(e) => warn!(url = %sheet_url, "Skipping stylesheet: {:#}", e),
                }
            }
            let summary = summarize_css(&sheets)?;
            Ok(serde_json::to_string_pretty(&summary)?)
        })
    }

    fn screenshot<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<ScreenshotEntry>> {
        Box::pin(async move {
            Err(anyhow!(
                "cannot capture {}: HTTP sessions fetch markup only and have no renderer",
                url
            ))
        })
    }

    /// Never captures anything; see `screenshot`.
    fn captured_screenshots(&self) -> Vec<ScreenshotEntry> {
        Vec::new()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            debug!("HTTP browser session closed");
        })
    }
}

pub struct HttpBrowserFactory;

impl BrowserFactory for HttpBrowserFactory {
    fn open(&self) -> BoxFuture<'_, anyhow::Result<Arc<dyn Browser>>> {
        Box::pin(async move {
            info!("Opening HTTP browser session");
            let browser: Arc<dyn Browser> = Arc::new(HttpBrowser::new()?);
            Ok(browser)
        })
    }
}

/// Canned pages for tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeBrowser {
        pub pages: HashMap<String, String>,
        /// URLs that yield screenshot tiles; everything else fails
        pub shots: HashMap<String, Vec<String>>,
        pub captured: Mutex<Vec<ScreenshotEntry>>,
        pub closed: AtomicUsize,
        pub fetches: AtomicUsize,
        /// Every URL fetched, in call order
        pub visited: Mutex<Vec<String>>,
    }
    impl FakeBrowser {
        fn page(&self, url: &str) -> anyhow::Result<(Url, String)> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.visited.lock().unwrap().push(url.to_string());
            let html = self
                .pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("404 for {}", url))?;
            Ok((Url::parse(url)?, html))
        }
    }

    impl Browser for FakeBrowser {
        fn page_text<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<String>> {
            Box::pin(async move {
                let (base, html) = self.page(url)?;
                structured_text(&html, &base)
            })
        }

        fn discover_links<'a>(
            &'a self,
            url: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<Vec<PageLink>>> {
            Box::pin(async move {
                let (base, html) = self.page(url)?;
                same_origin_links(&html, &base)
            })
        }

        fn extract_css<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<String>> {
            Box::pin(async move {
                let (base, html) = self.page(url)?;
                let (sheets, _) = style_sources(&html, &base)?;
                Ok(summarize_css(&sheets)?.to_string())
            })
        }

        fn screenshot<'a>(
            &'a self,
            url: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<ScreenshotEntry>> {
            Box::pin(async move {
                let tiles = self
                    .shots
                    .get(url)
                    .cloned()
                    .ok_or_else(|| anyhow!("capture failed for {}", url))?;
                let entry = ScreenshotEntry {
                    url: url.to_string(),
                    tiles,
                    full_page: String::new(),
                };
                self.captured.lock().unwrap().push(entry.clone());
                Ok(entry)
            })
        }

        fn captured_screenshots(&self) -> Vec<ScreenshotEntry> {
            self.captured.lock().unwrap().clone()
        }

        fn close(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                self.closed.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    /// Hands out the same shared session every time.
    pub struct FakeFactory(pub Arc<FakeBrowser>);

    impl BrowserFactory for FakeFactory {
        fn open(&self) -> BoxFuture<'_, anyhow::Result<Arc<dyn Browser>>> {
            Box::pin(async move {
                let browser: Arc<dyn Browser> = self.0.clone();
                Ok(browser)
            })
        }
    }
}
