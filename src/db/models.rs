//! Row types for the `auctions` and `sales` tables. Column names are stable
//! and part of the interface for operational tools.

/// One live (or tombstoned) auction, keyed by the upstream's 32-character uuid.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuctionRow {
    pub uuid: String,
    pub item_name: String,
    pub item_key: String,
    pub bin: bool,
    pub start_ts: i64,
    pub end_ts: i64,
    pub starting_bid: i64,
    pub highest_bid: i64,
    pub tier: Option<String>,
    pub item_lore: Option<String>,
    pub item_bytes: Option<String>,
    pub last_seen_ts: i64,
    pub signature: Option<String>,
    pub is_ended: bool,
}

/// One historical sale promoted from an expired auction. Lore and the binary
/// payload are retained so the signature can be re-derived during maintenance.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleRow {
    pub uuid: String,
    pub item_name: String,
    pub item_key: Option<String>,
    pub bin: bool,
    pub price: i64,
    pub ended_ts: i64,
    pub tier: Option<String>,
    pub signature: Option<String>,
    pub item_lore: Option<String>,
    pub item_bytes: Option<String>,
}
