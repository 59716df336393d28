//! Typed access to the `auctions` and `sales` tables.
//!
//! The pool is the only shared resource in the process. The two multi-row
//! operations — the bulk auction upsert and each finalize round — run inside
//! a single transaction so a failed cycle rolls back cleanly and the next one
//! retries the same rows (upserts are idempotent).

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

use crate::config::POOL_MAX_CONNECTIONS;
use crate::db::models::{AuctionRow, SaleRow};
use crate::error::Result;
use crate::signature::merge_signature;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

const UPSERT_AUCTION: &str = r#"
INSERT INTO auctions (
    uuid, item_name, item_key, bin, start_ts, end_ts,
    starting_bid, highest_bid, tier, item_lore, item_bytes,
    last_seen_ts, signature, is_ended
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
ON CONFLICT(uuid) DO UPDATE SET
    item_name    = excluded.item_name,
    item_key     = excluded.item_key,
    bin          = excluded.bin,
    start_ts     = excluded.start_ts,
    end_ts       = excluded.end_ts,
    starting_bid = excluded.starting_bid,
    highest_bid  = excluded.highest_bid,
    tier         = excluded.tier,
    item_lore    = CASE WHEN excluded.item_lore IS NULL OR excluded.item_lore = ''
                        THEN auctions.item_lore ELSE excluded.item_lore END,
    item_bytes   = CASE WHEN excluded.item_bytes IS NULL OR excluded.item_bytes = ''
                        THEN auctions.item_bytes ELSE excluded.item_bytes END,
    last_seen_ts = excluded.last_seen_ts,
    signature    = excluded.signature,
    is_ended     = 0
"#;

const UPSERT_SALE: &str = r#"
INSERT INTO sales (
    uuid, item_name, item_key, bin, price, ended_ts,
    tier, signature, item_lore, item_bytes
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(uuid) DO UPDATE SET
    signature = excluded.signature,
    item_key  = CASE WHEN sales.item_key IS NULL OR sales.item_key = ''
                     THEN excluded.item_key ELSE sales.item_key END
"#;

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn existing_signature(
        tx: &mut Transaction<'_, Sqlite>,
        table: &str,
        uuid: &str,
    ) -> Result<Option<String>> {
        let sql = format!("SELECT signature FROM {table} WHERE uuid = ?");
        let existing: Option<Option<String>> = sqlx::query_scalar(&sql)
            .bind(uuid)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(existing.flatten())
    }

    /// Upsert a full page of auction rows in one transaction. The incoming
    /// signature is merged against the stored one before writing; a refreshed
    /// sighting always resurrects the row (is_ended = 0).
    pub async fn bulk_upsert_auctions(&self, rows: &[AuctionRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;
        for row in rows {
            let existing = Self::existing_signature(&mut tx, "auctions", &row.uuid).await?;
            let signature = merge_signature(existing.as_deref(), row.signature.as_deref());
            sqlx::query(UPSERT_AUCTION)
                .bind(&row.uuid)
                .bind(&row.item_name)
                .bind(&row.item_key)
                .bind(row.bin)
                .bind(row.start_ts)
                .bind(row.end_ts)
                .bind(row.starting_bid)
                .bind(row.highest_bid)
                .bind(&row.tier)
                .bind(&row.item_lore)
                .bind(&row.item_bytes)
                .bind(row.last_seen_ts)
                .bind(signature)
                .execute(&mut *tx)
                .await?;
            written += 1;
        }
        tx.commit().await?;
        Ok(written)
    }

    /// Dead-by-absence: everything not sighted since `before_ts` is ended.
    /// Must only run after a complete successful paged fetch.
    pub async fn mark_unseen_ended(&self, before_ts: i64) -> Result<u64> {
        let result = sqlx::query("UPDATE auctions SET is_ended = 1 WHERE is_ended = 0 AND last_seen_ts < ?")
            .bind(before_ts)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Expired auctions still owing work: not yet ended, or ended but never
    /// promoted into a sale.
    pub async fn select_ended_to_finalize(&self, before_ts: i64, limit: i64) -> Result<Vec<AuctionRow>> {
        let rows = sqlx::query_as::<_, AuctionRow>(
            r#"
            SELECT a.* FROM auctions a
            LEFT JOIN sales s ON s.uuid = a.uuid
            WHERE a.end_ts <= ? AND (a.is_ended = 0 OR s.uuid IS NULL)
            LIMIT ?
            "#,
        )
        .bind(before_ts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_sale_in(tx: &mut Transaction<'_, Sqlite>, sale: &SaleRow) -> Result<()> {
        let existing = Self::existing_signature(tx, "sales", &sale.uuid).await?;
        let signature = merge_signature(existing.as_deref(), sale.signature.as_deref());
        sqlx::query(UPSERT_SALE)
            .bind(&sale.uuid)
            .bind(&sale.item_name)
            .bind(&sale.item_key)
            .bind(sale.bin)
            .bind(sale.price)
            .bind(sale.ended_ts)
            .bind(&sale.tier)
            .bind(signature)
            .bind(&sale.item_lore)
            .bind(&sale.item_bytes)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Promote one batch of expired auctions into sales and tombstone the
    /// auction rows, atomically.
    pub async fn finalize_sales(&self, sales: &[SaleRow]) -> Result<u64> {
        if sales.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for sale in sales {
            Self::upsert_sale_in(&mut tx, sale).await?;
            sqlx::query("UPDATE auctions SET is_ended = 1 WHERE uuid = ?")
                .bind(&sale.uuid)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(sales.len() as u64)
    }

    /// Single-row sale upsert, outside any batch.
    pub async fn upsert_sale(&self, sale: &SaleRow) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_sale_in(&mut tx, sale).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn mark_auction_ended(&self, uuid: &str) -> Result<()> {
        sqlx::query("UPDATE auctions SET is_ended = 1 WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Sales whose item_key was never derived (rows written before the key
    /// existed, or by older versions). Returns (uuid, item_name).
    pub async fn select_sales_missing_item_key(&self, limit: i64) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT uuid, item_name FROM sales WHERE item_key IS NULL OR item_key = '' LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_sale_item_key(&self, uuid: &str, key: &str) -> Result<()> {
        sqlx::query("UPDATE sales SET item_key = ? WHERE uuid = ?")
            .bind(key)
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Sales with no stored signature but enough retained input to derive one.
    pub async fn select_sales_missing_signature(&self, limit: i64) -> Result<Vec<SaleRow>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT * FROM sales
            WHERE (signature IS NULL OR signature = '')
              AND ((item_lore IS NOT NULL AND item_lore != '')
                OR (item_bytes IS NOT NULL AND item_bytes != ''))
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_sale_signature(&self, uuid: &str, signature: &str) -> Result<()> {
        sqlx::query("UPDATE sales SET signature = ? WHERE uuid = ?")
            .bind(signature)
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Recent sales for one item, newest first.
    pub async fn query_recent_sales_by_item(
        &self,
        item_key: &str,
        since_ts: i64,
        limit: i64,
    ) -> Result<Vec<SaleRow>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT * FROM sales
            WHERE item_key = ? AND ended_ts >= ?
            ORDER BY ended_ts DESC
            LIMIT ?
            "#,
        )
        .bind(item_key)
        .bind(since_ts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Live BIN listings for one item sighted within the alive window,
    /// cheapest first.
    pub async fn query_live_bin_by_item(
        &self,
        item_key: &str,
        since_ts: i64,
        limit: i64,
    ) -> Result<Vec<AuctionRow>> {
        let rows = sqlx::query_as::<_, AuctionRow>(
            r#"
            SELECT * FROM auctions
            WHERE item_key = ? AND is_ended = 0 AND bin = 1 AND last_seen_ts >= ?
            ORDER BY starting_bid ASC
            LIMIT ?
            "#,
        )
        .bind(item_key)
        .bind(since_ts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Prefix search over known item keys; label is a representative name.
    /// Falls back to the sales history for items with no live listings.
    pub async fn search_item_keys(&self, prefix: &str, limit: i64) -> Result<Vec<(String, String)>> {
        let pattern = format!("{prefix}%");
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT item_key, MIN(item_name) FROM auctions
            WHERE item_key LIKE ? AND item_key != ''
            GROUP BY item_key
            ORDER BY item_key
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        if !rows.is_empty() {
            return Ok(rows);
        }

        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT item_key, MIN(item_name) FROM sales
            WHERE item_key LIKE ? AND item_key IS NOT NULL AND item_key != ''
            GROUP BY item_key
            ORDER BY item_key
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
