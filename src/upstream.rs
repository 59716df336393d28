//! Client for the upstream paginated auction feed.
//!
//! One GET per page with a fixed retry budget and incremental backoff. A page
//! that still fails after the budget aborts the whole cycle — a partial
//! snapshot must never feed the unseen-mark step.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::{Config, FETCH_RETRIES, HTTP_TIMEOUT_SECS, RETRY_BASE_MS, RETRY_STEP_MS};
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
pub struct AuctionsPage {
    pub success: bool,
    #[serde(rename = "totalPages", default)]
    pub total_pages: i64,
    #[serde(default)]
    pub auctions: Vec<UpstreamAuction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamAuction {
    pub uuid: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub bin: bool,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub starting_bid: i64,
    #[serde(default)]
    pub highest_bid: i64,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub item_lore: Option<String>,
    #[serde(default)]
    pub item_bytes: Option<String>,
}

pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl UpstreamClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.upstream_url.trim_end_matches('/').to_string(),
            api_key: cfg.upstream_api_key.clone(),
        })
    }

    /// Fetch one page, retrying transient failures with incremental backoff.
    pub async fn fetch_page(&self, page: i64) -> Result<AuctionsPage> {
        let url = format!(
            "{}/auctions?page={}&key={}",
            self.base_url, page, self.api_key
        );

        let mut attempt = 0u32;
        loop {
            match self.fetch_once(&url).await {
                Ok(body) => {
                    if !body.success {
                        return Err(AppError::Upstream(format!(
                            "feed reported success=false for page {page}"
                        )));
                    }
                    return Ok(body);
                }
                Err(e) if attempt < FETCH_RETRIES => {
                    let delay = RETRY_BASE_MS + RETRY_STEP_MS * u64::from(attempt);
                    warn!(page, attempt, "page fetch failed, retrying in {delay}ms: {e}");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<AuctionsPage> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!("feed returned HTTP {status}")));
        }
        Ok(resp.json::<AuctionsPage>().await?)
    }
}
