//! The full-snapshot ingest loop.
//!
//! Every cycle mirrors the complete upstream feed: fetch every page, bulk
//! upsert, mark everything unseen as ended, promote expired auctions into
//! sales, then run key backfill maintenance. Unseen == ended is the
//! correctness mechanism for the live lowest-bin scan — without it, sold
//! items linger as "live" forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{
    Config, FINALIZE_BATCH, FINALIZE_MAX_ROUNDS, ITEM_KEY_BACKFILL_LIMIT, PAGE_FETCH_DELAY_MS,
    POOL_MAX_CONNECTIONS, SIGNATURE_BACKFILL_LIMIT, UNSEEN_GRACE_MS,
};
use crate::db::models::{AuctionRow, SaleRow};
use crate::db::Store;
use crate::error::Result;
use crate::signature::build_signature;
use crate::text::{canonical_item_key, has_star_or_weird_digit};
use crate::upstream::{UpstreamAuction, UpstreamClient};

#[derive(Debug, Default)]
pub struct CycleSummary {
    pub pages: i64,
    pub rows_upserted: u64,
    pub marked_ended: u64,
    pub finalized: u64,
    pub keys_backfilled: u64,
    pub signatures_backfilled: u64,
}

pub struct IngestLoop {
    cfg: Config,
    store: Store,
    upstream: UpstreamClient,
    /// Guards against the loop overlapping itself.
    running: AtomicBool,
    shutdown: watch::Receiver<bool>,
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A signature is worth building for BIN listings, anything carrying display
/// text or a payload, and names that encode stars directly.
fn wants_signature(a: &UpstreamAuction) -> bool {
    a.bin
        || a.item_lore.as_deref().is_some_and(|l| !l.is_empty())
        || a.item_bytes.as_deref().is_some_and(|b| !b.is_empty())
        || has_star_or_weird_digit(&a.item_name)
}

fn transform(a: UpstreamAuction, seen_ts: i64) -> AuctionRow {
    let signature = if wants_signature(&a) {
        let sig = build_signature(
            &a.item_name,
            a.item_lore.as_deref().unwrap_or(""),
            a.tier.as_deref(),
            a.item_bytes.as_deref(),
        );
        if sig.is_empty() {
            None
        } else {
            Some(sig)
        }
    } else {
        None
    };

    AuctionRow {
        item_key: canonical_item_key(&a.item_name),
        uuid: a.uuid,
        item_name: a.item_name,
        bin: a.bin,
        start_ts: a.start,
        end_ts: a.end,
        starting_bid: a.starting_bid.max(0),
        highest_bid: a.highest_bid.max(0),
        tier: a.tier,
        item_lore: a.item_lore,
        item_bytes: a.item_bytes,
        last_seen_ts: seen_ts,
        signature,
        is_ended: false,
    }
}

/// Transform one page of upstream auctions, fanning the CPU-bound signature
/// builds out across blocking threads. Bounded below the pool size so row
/// processing can never starve the connections; the whole page completes
/// before it is written.
async fn transform_page(page: Vec<UpstreamAuction>, seen_ts: i64) -> Vec<AuctionRow> {
    const FAN_OUT: usize = (POOL_MAX_CONNECTIONS - 1) as usize;
    if page.len() < FAN_OUT * 8 {
        return page.into_iter().map(|a| transform(a, seen_ts)).collect();
    }

    let chunk_size = page.len().div_ceil(FAN_OUT);
    let mut chunks: Vec<Vec<UpstreamAuction>> = Vec::with_capacity(FAN_OUT);
    let mut iter = page.into_iter();
    loop {
        let chunk: Vec<UpstreamAuction> = iter.by_ref().take(chunk_size).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }

    let mut tasks = tokio::task::JoinSet::new();
    for (idx, chunk) in chunks.into_iter().enumerate() {
        tasks.spawn_blocking(move || {
            let rows: Vec<AuctionRow> = chunk.into_iter().map(|a| transform(a, seen_ts)).collect();
            (idx, rows)
        });
    }

    let mut parts: Vec<(usize, Vec<AuctionRow>)> = Vec::with_capacity(FAN_OUT);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(part) => parts.push(part),
            Err(e) => error!("page transform task failed: {e}"),
        }
    }
    parts.sort_by_key(|(idx, _)| *idx);
    parts.into_iter().flat_map(|(_, rows)| rows).collect()
}

/// Sale promoted from an expired auction. BIN listings sell at the asking
/// price; bid auctions at the highest bid. The signature is re-derived from
/// the retained inputs when the auction never got one.
fn sale_from_auction(row: &AuctionRow) -> SaleRow {
    let signature = match row.signature.as_deref() {
        Some(sig) if !sig.is_empty() => Some(sig.to_string()),
        _ => {
            let sig = build_signature(
                &row.item_name,
                row.item_lore.as_deref().unwrap_or(""),
                row.tier.as_deref(),
                row.item_bytes.as_deref(),
            );
            if sig.is_empty() {
                None
            } else {
                Some(sig)
            }
        }
    };

    SaleRow {
        uuid: row.uuid.clone(),
        item_name: row.item_name.clone(),
        item_key: Some(row.item_key.clone()),
        bin: row.bin,
        price: if row.bin { row.starting_bid } else { row.highest_bid }.max(0),
        ended_ts: row.end_ts,
        tier: row.tier.clone(),
        signature,
        item_lore: row.item_lore.clone(),
        item_bytes: row.item_bytes.clone(),
    }
}

impl IngestLoop {
    pub fn new(cfg: Config, store: Store, upstream: UpstreamClient, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            cfg,
            store,
            upstream,
            running: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Run cycles forever, one every ingest interval, until shutdown.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.cfg.ingest_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.changed() => {
                    info!("ingest loop shutting down");
                    return;
                }
            }

            if self.running.swap(true, Ordering::SeqCst) {
                warn!("previous ingest cycle still running, skipping tick");
                continue;
            }
            match self.run_cycle().await {
                Ok(summary) => info!(
                    pages = summary.pages,
                    rows = summary.rows_upserted,
                    marked_ended = summary.marked_ended,
                    finalized = summary.finalized,
                    keys_backfilled = summary.keys_backfilled,
                    signatures_backfilled = summary.signatures_backfilled,
                    "ingest cycle complete"
                ),
                Err(e) => error!("ingest cycle failed: {e}"),
            }
            self.running.store(false, Ordering::SeqCst);

            if *self.shutdown.borrow() {
                info!("ingest loop shutting down");
                return;
            }
        }
    }

    /// One complete cycle. Any upstream failure aborts before anything is
    /// written; the next cycle retries from scratch.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let started = Instant::now();
        let mut summary = CycleSummary::default();

        // Phase 1: complete paged fetch. totalPages from page 0 is
        // authoritative for this cycle even if the feed changes mid-flight.
        let first = self.upstream.fetch_page(0).await?;
        let total_pages = first.total_pages.clamp(1, self.cfg.max_pages);
        let mut pages: Vec<Vec<UpstreamAuction>> = Vec::with_capacity(total_pages as usize);
        pages.push(first.auctions);

        for page in 1..total_pages {
            tokio::time::sleep(Duration::from_millis(PAGE_FETCH_DELAY_MS)).await;
            let body = self.upstream.fetch_page(page).await?;
            pages.push(body.auctions);
        }
        summary.pages = total_pages;

        // Phase 2: per-page bulk upserts. Later pages overwrite earlier ones
        // for the same uuid.
        let seen_ts = now_ms();
        for page in pages {
            let rows = transform_page(page, seen_ts).await;
            summary.rows_upserted += self.store.bulk_upsert_auctions(&rows).await?;
        }

        // Phase 3: strictly after all upserts — everything unseen is dead.
        summary.marked_ended = self.store.mark_unseen_ended(now_ms() - UNSEEN_GRACE_MS).await?;

        // Phase 4: promote expired auctions into sales.
        summary.finalized = self.finalize_ended().await?;

        // Phase 5: maintenance backfills over the sales history.
        summary.keys_backfilled = self.backfill_item_keys().await?;
        summary.signatures_backfilled = self.backfill_signatures().await?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot mirrored"
        );
        Ok(summary)
    }

    async fn finalize_ended(&self) -> Result<u64> {
        let mut total = 0u64;
        for _ in 0..FINALIZE_MAX_ROUNDS {
            let pending = self
                .store
                .select_ended_to_finalize(now_ms(), FINALIZE_BATCH)
                .await?;
            if pending.is_empty() {
                break;
            }
            let sales: Vec<SaleRow> = pending.iter().map(sale_from_auction).collect();
            total += self.store.finalize_sales(&sales).await?;
        }
        Ok(total)
    }

    async fn backfill_item_keys(&self) -> Result<u64> {
        let missing = self
            .store
            .select_sales_missing_item_key(ITEM_KEY_BACKFILL_LIMIT)
            .await?;
        let mut fixed = 0u64;
        for (uuid, item_name) in missing {
            let key = canonical_item_key(&item_name);
            if key.is_empty() {
                continue;
            }
            self.store.update_sale_item_key(&uuid, &key).await?;
            fixed += 1;
        }
        Ok(fixed)
    }

    /// Re-derive signatures for old sales rows that were written without one
    /// but still carry the inputs. Identity never changes, only the stored
    /// fingerprint.
    async fn backfill_signatures(&self) -> Result<u64> {
        let missing = self
            .store
            .select_sales_missing_signature(SIGNATURE_BACKFILL_LIMIT)
            .await?;
        let mut fixed = 0u64;
        for sale in missing {
            let sig = build_signature(
                &sale.item_name,
                sale.item_lore.as_deref().unwrap_or(""),
                sale.tier.as_deref(),
                sale.item_bytes.as_deref(),
            );
            if sig.is_empty() {
                continue;
            }
            self.store.update_sale_signature(&sale.uuid, &sig).await?;
            fixed += 1;
        }
        Ok(fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(uuid: &str) -> UpstreamAuction {
        UpstreamAuction {
            uuid: uuid.to_string(),
            item_name: "✪✪✪✪✪ Necron's Blade".to_string(),
            bin: true,
            start: 1_000,
            end: 2_000,
            starting_bid: 1_000_000,
            highest_bid: 0,
            tier: Some("LEGENDARY".to_string()),
            item_lore: None,
            item_bytes: None,
        }
    }

    #[test]
    fn transform_builds_signature_for_bin() {
        let row = transform(upstream("a1"), 42);
        assert_eq!(row.item_key, "necrons blade");
        assert_eq!(row.last_seen_ts, 42);
        assert_eq!(
            row.signature.as_deref(),
            Some("tier:legendary|dstars:5|stars10:5")
        );
        assert!(!row.is_ended);
    }

    #[test]
    fn transform_skips_signature_for_plain_bid_auction() {
        let mut a = upstream("a1");
        a.bin = false;
        a.item_name = "Plain Stick".to_string();
        a.tier = None;
        let row = transform(a, 42);
        assert!(row.signature.is_none());
    }

    #[test]
    fn transform_builds_signature_for_starred_bid_auction() {
        let mut a = upstream("a1");
        a.bin = false;
        let row = transform(a, 42);
        assert!(row.signature.is_some());
    }

    #[test]
    fn transform_clamps_negative_bids() {
        let mut a = upstream("a1");
        a.starting_bid = -5;
        a.highest_bid = -7;
        let row = transform(a, 42);
        assert_eq!(row.starting_bid, 0);
        assert_eq!(row.highest_bid, 0);
    }

    #[test]
    fn sale_price_follows_listing_kind() {
        let mut row = transform(upstream("a1"), 42);
        row.highest_bid = 750_000;
        let sale = sale_from_auction(&row);
        assert_eq!(sale.price, 1_000_000);

        row.bin = false;
        let sale = sale_from_auction(&row);
        assert_eq!(sale.price, 750_000);
        assert_eq!(sale.ended_ts, 2_000);
    }

    #[test]
    fn sale_rederives_missing_signature() {
        let mut row = transform(upstream("a1"), 42);
        row.signature = None;
        let sale = sale_from_auction(&row);
        assert_eq!(
            sale.signature.as_deref(),
            Some("tier:legendary|dstars:5|stars10:5")
        );
    }

    #[tokio::test]
    async fn transform_page_keeps_every_row_in_order() {
        let page: Vec<UpstreamAuction> = (0..200i64)
            .map(|i| {
                let mut a = upstream(&format!("u{i:03}"));
                a.starting_bid = i;
                a
            })
            .collect();
        let rows = transform_page(page, 42).await;
        assert_eq!(rows.len(), 200);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.uuid, format!("u{i:03}"));
            assert_eq!(row.starting_bid, i as i64);
            assert_eq!(row.last_seen_ts, 42);
        }
    }

    #[tokio::test]
    async fn expired_sale_feeds_the_recommender() {
        // Snapshot → expiry → finalize → the sale shows up in a price query.
        use crate::matcher::{MatchRequest, QueryFilters};
        use crate::recommend::{recommend, RecommendRequest};

        let store = Store::connect_in_memory().await.unwrap();
        let now = now_ms();

        let mut a = upstream("sold");
        a.end = now - 10_000;
        store
            .bulk_upsert_auctions(&[transform(a, now)])
            .await
            .unwrap();

        let pending = store.select_ended_to_finalize(now, FINALIZE_BATCH).await.unwrap();
        let sales: Vec<SaleRow> = pending.iter().map(sale_from_auction).collect();
        store.finalize_sales(&sales).await.unwrap();

        let req = RecommendRequest {
            item_key: "necrons blade".to_string(),
            match_req: MatchRequest {
                stars10: 5,
                enchants: vec![],
                filters: QueryFilters::default(),
            },
        };
        let rec = recommend(&store, &req, now, 480_000).await.unwrap();
        assert_eq!(rec.recommended, Some(1_000_000));
        assert_eq!(rec.range_count, 1);
        assert_eq!(rec.top3[0].uuid, "sold");
        // The tombstoned auction must not surface as a live listing.
        assert!(rec.live.is_none());
    }

    #[tokio::test]
    async fn vanished_auction_is_marked_ended_and_dropped_from_live() {
        let store = Store::connect_in_memory().await.unwrap();
        let now = now_ms();

        let mut gone = transform(upstream("gone"), now - UNSEEN_GRACE_MS - 5_000);
        gone.end_ts = now + 3_600_000;
        let mut here = transform(upstream("here"), now);
        here.end_ts = now + 3_600_000;
        store.bulk_upsert_auctions(&[gone, here]).await.unwrap();

        let marked = store.mark_unseen_ended(now - UNSEEN_GRACE_MS).await.unwrap();
        assert_eq!(marked, 1);

        let live = store
            .query_live_bin_by_item("necrons blade", 0, 100)
            .await
            .unwrap();
        let uuids: Vec<&str> = live.iter().map(|r| r.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["here"]);
    }

    #[tokio::test]
    async fn full_cycle_against_store() {
        // Exercise the store-facing phases without the upstream: upsert,
        // unseen-mark, finalize, backfill.
        let store = Store::connect_in_memory().await.unwrap();
        let now = now_ms();

        let mut expired = transform(upstream("expired"), now);
        expired.end_ts = now - 1;
        let mut live_row = transform(upstream("live"), now);
        live_row.end_ts = now + 3_600_000;
        store
            .bulk_upsert_auctions(&[expired.clone(), live_row])
            .await
            .unwrap();

        // Grace not elapsed: nothing unseen.
        assert_eq!(store.mark_unseen_ended(now - UNSEEN_GRACE_MS).await.unwrap(), 0);

        let pending = store.select_ended_to_finalize(now, FINALIZE_BATCH).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].uuid, "expired");
        let sales: Vec<SaleRow> = pending.iter().map(sale_from_auction).collect();
        store.finalize_sales(&sales).await.unwrap();

        // Exactly-once: nothing pending on the next round.
        assert!(store
            .select_ended_to_finalize(now, FINALIZE_BATCH)
            .await
            .unwrap()
            .is_empty());
    }
}
