//! Content fetcher: HTTP retrieval and HTML extraction for source articles.
//!
//! Fetching is best-effort against uncontrolled third-party sites. A single
//! URL's failure (network error, timeout, non-2xx) is logged and reported as
//! "no document" — it never aborts a batch or the overall crawl.
//!
//! Extraction follows a first-match-wins cascade: an ordered list of
//! content-container selectors is tried in sequence, falling back to the
//! full body text. Non-content elements (scripts, navigation, ads, comment
//! and share widgets) are skipped during text collection.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};

use crate::config::FetcherConfig;
use crate::error::KbError;
use crate::models::{DocMetadata, RawDocument};

/// Ordered content-container candidates; the first match wins.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".workout-content",
    ".exercise-content",
    "#content",
    ".main-content",
];

/// Elements whose text never belongs to article content.
const SKIP_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "aside"];

/// Class markers for ads, share widgets, and comment sections.
const SKIP_CLASSES: &[&str] = &["advertisement", "ads", "social-share", "comments"];

/// Retrieves and cleans raw content from source URLs.
pub struct ContentFetcher {
    client: reqwest::Client,
    batch_size: usize,
    batch_delay: Duration,
}

impl ContentFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, KbError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            batch_size: config.batch_size,
            batch_delay: Duration::from_millis(config.batch_delay_ms),
        })
    }

    /// Fetch a single URL. Any network error, timeout, or non-2xx status is
    /// logged and collapses to `None`; no error propagates past this call.
    pub async fn fetch_one(&self, url: &str) -> Option<RawDocument> {
        debug!(%url, "fetching");

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, error = %e, "fetch failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "fetch returned non-success status");
            return None;
        }

        let html = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                warn!(%url, error = %e, "failed to read response body");
                return None;
            }
        };

        Some(extract_document(url, &html))
    }

    /// Fetch many URLs in fixed-size concurrent batches with a fixed delay
    /// between batches, to avoid hammering third-party hosts.
    ///
    /// Each batch is fully resolved before the next starts. Failed URLs are
    /// dropped (logged inside [`fetch_one`](Self::fetch_one)); the result is
    /// simply shorter than the input. Order is arrival order within each
    /// batch.
    pub async fn fetch_many(&self, urls: &[String]) -> Vec<RawDocument> {
        let mut results = Vec::new();

        for (i, batch) in urls.chunks(self.batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }

            let fetched =
                futures::future::join_all(batch.iter().map(|url| self.fetch_one(url))).await;
            results.extend(fetched.into_iter().flatten());
        }

        debug!(
            fetched = results.len(),
            requested = urls.len(),
            "crawl finished"
        );
        results
    }
}

/// Parse fetched HTML into a [`RawDocument`]. Pure and synchronous, so the
/// extraction cascade is testable without a network.
pub fn extract_document(url: &str, html: &str) -> RawDocument {
    let doc = Html::parse_document(html);

    let title = first_text(&doc, "title")
        .or_else(|| first_text(&doc, "h1"))
        .or_else(|| meta_content(&doc, "meta[property=\"og:title\"]"))
        .unwrap_or_else(|| "Untitled".to_string());

    let mut raw = String::new();
    let container = CONTENT_SELECTORS
        .iter()
        .find_map(|s| doc.select(&sel(s)).next());
    match container {
        Some(el) => collect_text(el, &mut raw),
        None => {
            if let Some(body) = doc.select(&sel("body")).next() {
                collect_text(body, &mut raw);
            }
        }
    }
    let content = normalize_whitespace(&raw);

    let description = meta_content(&doc, "meta[name=\"description\"]")
        .or_else(|| meta_content(&doc, "meta[property=\"og:description\"]"))
        .or_else(|| first_text(&doc, "p").map(|p| truncate_chars(&p, 200)));

    let author = meta_content(&doc, "meta[name=\"author\"]")
        .or_else(|| first_text(&doc, ".author"))
        .or_else(|| first_text(&doc, "[rel=\"author\"]"));

    let publish_date = meta_content(&doc, "meta[property=\"article:published_time\"]")
        .or_else(|| first_text(&doc, ".publish-date"))
        .or_else(|| first_text(&doc, ".date"));

    let tags = meta_content(&doc, "meta[name=\"keywords\"]")
        .map(|keywords| {
            keywords
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    RawDocument {
        url: url.to_string(),
        title,
        content,
        metadata: DocMetadata {
            description,
            author,
            publish_date,
            tags,
        },
    }
}

/// Parse a selector literal. Call sites only pass valid literals, so the
/// parse cannot fail.
fn sel(selector: &str) -> Selector {
    Selector::parse(selector).unwrap()
}

/// Recursively collect text under an element, skipping non-content subtrees.
fn collect_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if !should_skip(&child_el) {
                        collect_text(child_el, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn should_skip(el: &ElementRef) -> bool {
    let element = el.value();
    if SKIP_TAGS.contains(&element.name()) {
        return true;
    }
    element.classes().any(|c| SKIP_CLASSES.contains(&c))
}

/// Whitespace-normalized text of the first element matching `selector`,
/// or `None` when absent or empty.
fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let el = doc.select(&sel(selector)).next()?;
    let mut raw = String::new();
    collect_text(el, &mut raw);
    let text = normalize_whitespace(&raw);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Non-empty `content` attribute of the first element matching `selector`.
fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    doc.select(&sel(selector))
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
}

/// Collapse whitespace runs to single spaces and drop empty lines.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
