//! HTTP access to the GCN site.

use std::time::Duration;

use gcnwatch_shared::{GcnWatchError, Result, SourceConfig};
use reqwest::Client;
use tracing::{debug, instrument};

/// User-Agent string for GCN requests.
const USER_AGENT: &str = concat!("GcnWatch/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Thin GET-as-text wrapper around a configured `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| GcnWatchError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET `url` and return the body. Non-2xx statuses are errors.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GcnWatchError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| request_error(url, e))?;

        debug!(url, bytes = body.len(), "fetched");
        Ok(body)
    }
}

fn request_error(url: &str, e: reqwest::Error) -> GcnWatchError {
    if e.is_timeout() {
        GcnWatchError::Timeout(url.to_string())
    } else {
        GcnWatchError::Network(format!("{url}: {e}"))
    }
}

// ---------------------------------------------------------------------------
// IndexClient
// ---------------------------------------------------------------------------

/// Fetches the circular index page.
#[derive(Debug, Clone)]
pub struct IndexClient {
    fetcher: HttpFetcher,
    index_url: String,
}

impl IndexClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            fetcher: HttpFetcher::new(Duration::from_secs(config.request_timeout_secs))?,
            index_url: config.index_url.clone(),
        })
    }

    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    #[instrument(skip_all, fields(url = %self.index_url))]
    pub async fn fetch_list_page(&self) -> Result<String> {
        self.fetcher.fetch(&self.index_url).await
    }
}
