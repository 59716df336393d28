use crate::error::{AppError, Result};

pub const UPSTREAM_API_URL: &str = "https://api.hypixel.net/skyblock";

/// Default ingest cadence — one full-snapshot cycle every 120 s (INGEST_INTERVAL_MS).
pub const INGEST_INTERVAL_MS: u64 = 120_000;

/// Hard cap on pages fetched per cycle regardless of what page 0 reports (MAX_PAGES).
pub const MAX_PAGES: i64 = 200;

/// Politeness delay between consecutive page fetches.
pub const PAGE_FETCH_DELAY_MS: u64 = 90;

/// Per-request retry budget for the upstream feed.
pub const FETCH_RETRIES: u32 = 4;

/// Incremental backoff before retry i: RETRY_BASE_MS + RETRY_STEP_MS * i.
pub const RETRY_BASE_MS: u64 = 250;
pub const RETRY_STEP_MS: u64 = 350;

/// Upstream HTTP request timeout.
pub const HTTP_TIMEOUT_SECS: u64 = 20;

/// An auction absent from a complete snapshot for this long is marked ended.
/// Unseen == ended is the live-vs-dead truth for the lowest-bin scan.
pub const UNSEEN_GRACE_MS: i64 = 60_000;

/// Query-side window: live BIN rows seen within this window count as alive (ALIVE_WINDOW_MS).
pub const ALIVE_WINDOW_MS: i64 = 480_000;

/// Finalize-ended batch size and round cap per cycle.
pub const FINALIZE_BATCH: i64 = 5_000;
pub const FINALIZE_MAX_ROUNDS: u32 = 60;

/// Maintenance backfill cap for sales rows missing an item_key.
pub const ITEM_KEY_BACKFILL_LIMIT: i64 = 20_000;

/// Maintenance cap for re-deriving signatures on old sales rows.
pub const SIGNATURE_BACKFILL_LIMIT: i64 = 5_000;

/// Recommender bounds: sales pool size and lookback window.
pub const SALES_QUERY_LIMIT: i64 = 50_000;
pub const SALES_WINDOW_MS: i64 = 120 * 24 * 3_600 * 1_000;

/// Live lowest-bin scan row cap.
pub const LIVE_SCAN_LIMIT: i64 = 6_000;

/// On SIGTERM/SIGINT the in-flight ingest cycle gets this long to finish.
pub const SHUTDOWN_GRACE_SECS: u64 = 20;

/// Connection pool cap — the pool is the only shared resource.
pub const POOL_MAX_CONNECTIONS: u32 = 8;

#[derive(Debug, Clone)]
pub struct Config {
    /// sqlx connection string (DATABASE_URL), e.g. "sqlite:scanner.db?mode=rwc".
    pub database_url: String,
    /// Upstream feed base URL (UPSTREAM_API_URL).
    pub upstream_url: String,
    /// API key appended to every feed request (UPSTREAM_API_KEY).
    pub upstream_api_key: String,
    pub log_level: String,
    pub api_port: u16,
    pub ingest_interval_ms: u64,
    pub max_pages: i64,
    pub alive_window_ms: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:scanner.db?mode=rwc".to_string()),
            upstream_url: std::env::var("UPSTREAM_API_URL")
                .unwrap_or_else(|_| UPSTREAM_API_URL.to_string()),
            upstream_api_key: std::env::var("UPSTREAM_API_KEY").unwrap_or_default(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            ingest_interval_ms: std::env::var("INGEST_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(INGEST_INTERVAL_MS),
            max_pages: std::env::var("MAX_PAGES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_PAGES),
            alive_window_ms: std::env::var("ALIVE_WINDOW_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(ALIVE_WINDOW_MS),
        })
    }
}
