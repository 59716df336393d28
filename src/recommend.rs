//! Price recommendation over the historical sales pool plus a live
//! lowest-bin scan.
//!
//! Matched sales split into perfect and partial price pools; the returned
//! range is a 15th–85th percentile band over the chosen pool rather than raw
//! min/max, which is far more stable against outlier flips.

use serde::Serialize;

use crate::config::{LIVE_SCAN_LIMIT, SALES_QUERY_LIMIT, SALES_WINDOW_MS};
use crate::db::models::{AuctionRow, SaleRow};
use crate::db::Store;
use crate::enchants::{enchant_weight, tier_bucket};
use crate::error::Result;
use crate::matcher::{match_signature, MatchOutcome, MatchQuality, MatchRequest};
use crate::signature::{build_signature, Signature};

#[derive(Debug, Clone)]
pub struct RecommendRequest {
    pub item_key: String,
    pub match_req: MatchRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnchantEntry {
    pub name: String,
    pub level: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopSale {
    pub uuid: String,
    pub price: i64,
    pub ended_ts: i64,
    pub bin: bool,
    pub tier: Option<String>,
    pub stars10: i64,
    pub quality: String,
    pub score: i64,
    /// Requested enchantments present on this sale, strongest first.
    pub matched: Vec<EnchantEntry>,
    /// Everything on the sale, best bucket first then name.
    pub all_enchants: Vec<EnchantEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveListing {
    pub uuid: String,
    pub price: i64,
    pub item_name: String,
    pub tier: Option<String>,
    pub stars10: i64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Recommendation {
    pub recommended: Option<i64>,
    pub range_low: Option<i64>,
    pub range_high: Option<i64>,
    pub range_count: i64,
    pub top3: Vec<TopSale>,
    pub live: Option<LiveListing>,
    pub note: Option<String>,
}

/// Nearest-rank percentile over a sorted slice; `p` in [0,1].
fn percentile(sorted: &[i64], p: f64) -> Option<i64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    Some(sorted[idx])
}

/// Ranking score in [0,10]: 10 minus 2 per star of distance and 1 per
/// enchantment unit of distance.
fn score(outcome: &MatchOutcome) -> i64 {
    (10 - 2 * outcome.stars_diff - outcome.enchant_diff_total).max(0)
}

fn sale_signature(sale: &SaleRow) -> Signature {
    match sale.signature.as_deref() {
        Some(sig) if !sig.is_empty() => Signature::parse(sig),
        // Re-derive from the retained inputs when the stored column is empty.
        _ => Signature::parse(&build_signature(
            &sale.item_name,
            sale.item_lore.as_deref().unwrap_or(""),
            sale.tier.as_deref(),
            sale.item_bytes.as_deref(),
        )),
    }
}

fn auction_signature(row: &AuctionRow) -> Signature {
    match row.signature.as_deref() {
        Some(sig) if !sig.is_empty() => Signature::parse(sig),
        _ => Signature::parse(&build_signature(
            &row.item_name,
            row.item_lore.as_deref().unwrap_or(""),
            row.tier.as_deref(),
            row.item_bytes.as_deref(),
        )),
    }
}

fn top_sale(sale: &SaleRow, sig: &Signature, outcome: &MatchOutcome, req: &MatchRequest) -> TopSale {
    let mut matched: Vec<EnchantEntry> = req
        .enchants
        .iter()
        .filter_map(|(name, _)| {
            sig.enchants.get(name).map(|level| EnchantEntry {
                name: name.clone(),
                level: *level,
            })
        })
        .collect();
    matched.sort_by_key(|e| std::cmp::Reverse(enchant_weight(&e.name, e.level)));

    let mut all_enchants: Vec<EnchantEntry> = sig
        .enchants
        .iter()
        .map(|(name, level)| EnchantEntry {
            name: name.clone(),
            level: *level,
        })
        .collect();
    all_enchants.sort_by(|a, b| {
        tier_bucket(&b.name, b.level)
            .rank()
            .cmp(&tier_bucket(&a.name, a.level).rank())
            .then_with(|| a.name.cmp(&b.name))
    });

    TopSale {
        uuid: sale.uuid.clone(),
        price: sale.price,
        ended_ts: sale.ended_ts,
        bin: sale.bin,
        tier: sale.tier.clone(),
        stars10: sig.stars10,
        quality: outcome.quality.to_string(),
        score: score(outcome),
        matched,
        all_enchants,
    }
}

pub async fn recommend(
    store: &Store,
    req: &RecommendRequest,
    now_ms: i64,
    alive_window_ms: i64,
) -> Result<Recommendation> {
    let item_key = req.item_key.trim();
    if item_key.is_empty() {
        return Ok(Recommendation {
            note: Some("pick an item from the suggestions".to_string()),
            ..Default::default()
        });
    }

    let since = now_ms - SALES_WINDOW_MS;
    let sales = store
        .query_recent_sales_by_item(item_key, since, SALES_QUERY_LIMIT)
        .await?;

    let mut perfect_prices: Vec<i64> = Vec::new();
    let mut partial_prices: Vec<i64> = Vec::new();
    let mut candidates: Vec<TopSale> = Vec::new();

    for sale in &sales {
        if sale.price <= 0 {
            continue;
        }
        let sig = sale_signature(sale);
        let outcome = match_signature(&req.match_req, &sig);
        match outcome.quality {
            MatchQuality::Perfect => perfect_prices.push(sale.price),
            MatchQuality::Partial => partial_prices.push(sale.price),
            MatchQuality::None => continue,
        }
        candidates.push(top_sale(sale, &sig, &outcome, &req.match_req));
    }

    let pool = if perfect_prices.is_empty() {
        &mut partial_prices
    } else {
        &mut perfect_prices
    };
    pool.sort_unstable();
    let recommended = percentile(pool, 0.5);
    let range_low = percentile(pool, 0.15);
    let range_high = percentile(pool, 0.85);
    let range_count = pool.len() as i64;

    candidates.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.ended_ts.cmp(&a.ended_ts))
            .then_with(|| a.price.cmp(&b.price))
    });
    candidates.truncate(3);

    let live = live_best(store, req, now_ms - alive_window_ms).await?;

    let note = if range_count == 0 && live.is_none() {
        Some("no matching sales recorded yet; pick an item from the suggestions".to_string())
    } else {
        None
    };

    Ok(Recommendation {
        recommended,
        range_low,
        range_high,
        range_count,
        top3: candidates,
        live,
        note,
    })
}

/// Cheapest live BIN listing that passes the same match, if any.
async fn live_best(
    store: &Store,
    req: &RecommendRequest,
    since_ts: i64,
) -> Result<Option<LiveListing>> {
    let rows = store
        .query_live_bin_by_item(&req.item_key, since_ts, LIVE_SCAN_LIMIT)
        .await?;
    for row in &rows {
        let sig = auction_signature(row);
        let outcome = match_signature(&req.match_req, &sig);
        if outcome.quality != MatchQuality::None {
            return Ok(Some(LiveListing {
                uuid: row.uuid.clone(),
                price: row.starting_bid,
                item_name: row.item_name.clone(),
                tier: row.tier.clone(),
                stars10: sig.stars10,
            }));
        }
    }
    Ok(None)
}
