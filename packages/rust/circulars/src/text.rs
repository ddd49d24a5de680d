//! Circular body text retrieval with `.gcn3` fallback.

use std::sync::LazyLock;
use std::time::Duration;

use gcnwatch_shared::{GcnWatchError, Result, SourceConfig};
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};
use url::Url;

use crate::client::HttpFetcher;

/// Page text shorter than this (in characters) triggers the raw-file fallback.
pub const MIN_TEXT_LEN: usize = 50;

/// Boilerplate the site serves in place of a circular body during outages.
const PLACEHOLDER_PREFIXES: [&str; 2] = [
    "The GCN Circular system is evolving.",
    "This GCN Circular is currently unavailable.",
];

/// Extract circular text from a page: the first `<pre>` block if there is
/// one, otherwise every visible text node in `<body>`, one per line.
pub fn page_text(html: &str) -> Option<String> {
    static PRE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("pre").expect("valid selector"));
    static BODY: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("body").expect("valid selector"));

    let doc = Html::parse_document(html);

    if let Some(pre) = doc.select(&PRE).next() {
        let text = pre.text().collect::<String>().trim().to_string();
        return (!text.is_empty()).then_some(text);
    }

    let body = doc.select(&BODY).next()?;
    let lines: Vec<&str> = body
        .descendants()
        .filter(|node| {
            !node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|el| matches!(el.name(), "script" | "style"))
            })
        })
        .filter_map(|node| node.value().as_text().map(|t| t.trim()))
        .filter(|t| !t.is_empty())
        .collect();

    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn is_placeholder(text: &str) -> bool {
    let text = text.trim_start();
    PLACEHOLDER_PREFIXES.iter().any(|p| text.starts_with(p))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

// ---------------------------------------------------------------------------
// TextRetriever
// ---------------------------------------------------------------------------

/// Fetches a circular's text from its HTML page, falling back to the raw
/// `<base>/gcn3/<id>.gcn3` file when the page is missing, short, or a
/// maintenance placeholder.
#[derive(Debug, Clone)]
pub struct TextRetriever {
    fetcher: HttpFetcher,
    base_url: Url,
}

impl TextRetriever {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GcnWatchError::config(format!("invalid source.base_url '{}': {e}", config.base_url))
        })?;
        Ok(Self {
            fetcher: HttpFetcher::new(Duration::from_secs(config.request_timeout_secs))?,
            base_url,
        })
    }

    pub fn raw_file_url(&self, id: &str) -> Result<Url> {
        self.base_url
            .join(&format!("/gcn3/{id}.gcn3"))
            .map_err(|e| GcnWatchError::validation(format!("bad raw file URL for {id}: {e}")))
    }

    /// Best-effort text for circular `id`. `None` only when both sources
    /// failed to produce anything.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn fetch(&self, id: &str, page_url: &str) -> Option<String> {
        info!(page_url, "fetching circular page");

        let mut page = match self.fetcher.fetch(page_url).await {
            Ok(html) => page_text(&html),
            Err(e) => {
                warn!(error = %e, "circular page fetch failed");
                None
            }
        };

        if let Some(text) = &page {
            if char_len(text) >= MIN_TEXT_LEN && is_placeholder(text) {
                warn!("circular page is a placeholder, discarding it");
                page = None;
            }
        }

        if page.as_deref().is_some_and(|t| char_len(t) >= MIN_TEXT_LEN) {
            return page;
        }

        let raw = match self.raw_file_url(id) {
            Ok(url) => {
                info!(%url, "page text insufficient, trying raw file");
                match self.fetcher.fetch(url.as_str()).await {
                    Ok(body) => Some(body.trim().to_string()).filter(|t| !t.is_empty()),
                    Err(e) => {
                        warn!(error = %e, "raw file fetch failed");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "could not build raw file URL");
                None
            }
        };

        match (page, raw) {
            (page, Some(raw)) if char_len(&raw) > page.as_deref().map_or(0, char_len) => {
                info!("using raw file text");
                Some(raw)
            }
            (Some(page), _) => {
                info!("raw file was not better, keeping page text");
                Some(page)
            }
            (None, _) => {
                warn!("no usable text from page or raw file");
                None
            }
        }
    }
}
