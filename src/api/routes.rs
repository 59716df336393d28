//! The outgoing HTTP surface — a thin dispatcher over the engine.
//!
//! Query parameters are clamped to legal ranges silently; unknown filter
//! values are treated as "none". Handlers never crash the process: engine
//! errors surface as a 500 through the crate error type.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::catalogs::{self, CatalogEntry};
use crate::db::Store;
use crate::enchants::{known_enchants, normalize_enchant_key, parse_level};
use crate::error::AppError;
use crate::ingest::now_ms;
use crate::matcher::{MatchRequest, QueryFilters};
use crate::recommend::{recommend, RecommendRequest, Recommendation};
use crate::text::norm_key;

#[derive(Clone)]
pub struct ApiState {
    pub store: Store,
    pub alive_window_ms: i64,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/items", get(get_items))
        .route("/api/enchants", get(get_enchants))
        .route("/api/dyes", get(get_dyes))
        .route("/api/skins", get(get_skins))
        .route("/api/petskins", get(get_petskins))
        .route("/api/petitems", get(get_petitems))
        .route("/api/recommend", get(get_recommend))
        .route("/api/health", get(get_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct RecommendQuery {
    pub item_key: Option<String>,
    pub stars10: Option<i64>,
    /// Comma-separated "Name Level" entries; level decimal or Roman I-XX.
    pub enchants: Option<String>,
    pub wi: Option<String>,
    pub rarity: Option<String>,
    pub dye: Option<String>,
    pub skin: Option<String>,
    pub petskin: Option<String>,
    pub petlvl: Option<i64>,
    pub petitem: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ItemEntry {
    pub key: String,
    pub label: String,
}

#[derive(Serialize)]
pub struct ItemsResponse {
    pub items: Vec<ItemEntry>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_items(
    State(state): State<ApiState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<ItemsResponse>, AppError> {
    let prefix = norm_key(params.q.as_deref().unwrap_or(""));
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let hits = state.store.search_item_keys(&prefix, limit).await?;
    let items = hits
        .into_iter()
        .map(|(key, label)| ItemEntry { key, label })
        .collect();
    Ok(Json(ItemsResponse { items }))
}

fn enchant_label(name: &str, level: i64) -> String {
    let pretty: Vec<String> = name
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    format!("{} {level}", pretty.join(" "))
}

async fn get_enchants(Query(params): Query<SearchQuery>) -> Json<serde_json::Value> {
    let needle = params.q.as_deref().unwrap_or("").trim().to_lowercase();
    let limit = params.limit.unwrap_or(20).clamp(1, 200) as usize;

    let mut items: Vec<String> = Vec::new();
    'outer: for (name, max_level) in known_enchants() {
        for level in 1..=max_level {
            let label = enchant_label(name, level);
            if needle.is_empty() || label.to_lowercase().contains(&needle) {
                items.push(label);
                if items.len() >= limit {
                    break 'outer;
                }
            }
        }
    }
    Json(json!({ "items": items }))
}

fn catalog_response(catalog: &[CatalogEntry], params: &SearchQuery) -> Json<serde_json::Value> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200) as usize;
    let hits = catalogs::filter(catalog, params.q.as_deref().unwrap_or(""), limit);
    let items: Vec<_> = hits
        .iter()
        .map(|e| json!({ "label": e.label, "key": e.key }))
        .collect();
    Json(json!({ "items": items }))
}

async fn get_dyes(Query(params): Query<SearchQuery>) -> Json<serde_json::Value> {
    catalog_response(catalogs::DYES, &params)
}

async fn get_skins(Query(params): Query<SearchQuery>) -> Json<serde_json::Value> {
    catalog_response(catalogs::SKINS, &params)
}

async fn get_petskins(Query(params): Query<SearchQuery>) -> Json<serde_json::Value> {
    catalog_response(catalogs::PET_SKINS, &params)
}

async fn get_petitems(Query(params): Query<SearchQuery>) -> Json<serde_json::Value> {
    catalog_response(catalogs::PET_ITEMS, &params)
}

/// Parse the comma-separated "Name Level" enchant list. Entries that don't
/// parse are dropped silently.
fn parse_enchant_list(raw: &str) -> Vec<(String, i64)> {
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            let (name, level) = entry.rsplit_once(char::is_whitespace)?;
            let level = parse_level(level)?;
            let name = normalize_enchant_key(name);
            if name.is_empty() || level <= 0 {
                None
            } else {
                Some((name, level))
            }
        })
        .collect()
}

/// "none" / "any" / empty → unspecified.
fn opt_filter(raw: Option<&str>) -> Option<String> {
    let normalized = norm_key(raw?);
    if normalized.is_empty() || normalized == "none" || normalized == "any" {
        None
    } else {
        Some(normalized)
    }
}

fn flag(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("1") | Some("true") | Some("yes"))
}

async fn get_recommend(
    State(state): State<ApiState>,
    Query(params): Query<RecommendQuery>,
) -> Result<Json<Recommendation>, AppError> {
    let filters = QueryFilters {
        tier: opt_filter(params.rarity.as_deref()),
        wither_impact: flag(params.wi.as_deref()),
        dye: opt_filter(params.dye.as_deref()),
        skin: opt_filter(params.skin.as_deref()),
        petskin: opt_filter(params.petskin.as_deref()),
        min_pet_level: params.petlvl.unwrap_or(0).clamp(0, 200),
        pet_item: params
            .petitem
            .as_deref()
            .and_then(|p| opt_filter(Some(p)))
            .map(|p| p.replace(' ', "_")),
    };

    let req = RecommendRequest {
        item_key: norm_key(params.item_key.as_deref().unwrap_or("")),
        match_req: MatchRequest {
            stars10: params.stars10.unwrap_or(0).clamp(0, 10),
            enchants: parse_enchant_list(params.enchants.as_deref().unwrap_or("")),
            filters,
        },
    };

    let result = recommend(&state.store, &req, now_ms(), state.alive_window_ms).await?;
    Ok(Json(result))
}

async fn get_health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enchant_list_parses_decimal_and_roman() {
        let parsed = parse_enchant_list("Sharpness 7, Ultimate Wise V, growth VI");
        assert_eq!(
            parsed,
            vec![
                ("sharpness".to_string(), 7),
                ("wise".to_string(), 5),
                ("growth".to_string(), 6),
            ]
        );
    }

    #[test]
    fn enchant_list_drops_garbage_entries() {
        let parsed = parse_enchant_list("Sharpness seven, , 7, Growth 6");
        assert_eq!(parsed, vec![("growth".to_string(), 6)]);
    }

    #[test]
    fn filters_normalize_unknown_to_none() {
        assert_eq!(opt_filter(Some("none")), None);
        assert_eq!(opt_filter(Some("ANY")), None);
        assert_eq!(opt_filter(Some("")), None);
        assert_eq!(opt_filter(Some("Necron Dye")), Some("necron dye".to_string()));
        assert_eq!(opt_filter(None), None);
    }

    #[test]
    fn wi_flag_forms() {
        assert!(flag(Some("1")));
        assert!(flag(Some("true")));
        assert!(!flag(Some("0")));
        assert!(!flag(None));
    }

    #[test]
    fn enchant_labels_are_title_cased() {
        assert_eq!(enchant_label("bane_of_arthropods", 6), "Bane Of Arthropods 6");
        assert_eq!(enchant_label("sharpness", 7), "Sharpness 7");
    }

    async fn test_state() -> ApiState {
        ApiState {
            store: Store::connect_in_memory().await.unwrap(),
            alive_window_ms: 480_000,
        }
    }

    fn blank_recommend_query() -> RecommendQuery {
        RecommendQuery {
            item_key: None,
            stars10: None,
            enchants: None,
            wi: None,
            rarity: None,
            dye: None,
            skin: None,
            petskin: None,
            petlvl: None,
            petitem: None,
        }
    }

    #[tokio::test]
    async fn recommend_handler_guides_on_missing_item() {
        let state = test_state().await;
        let Json(rec) = get_recommend(State(state), Query(blank_recommend_query()))
            .await
            .unwrap();
        assert!(rec.note.unwrap().contains("pick an item"));
        assert_eq!(rec.range_count, 0);
    }

    #[tokio::test]
    async fn recommend_handler_clamps_out_of_range_params() {
        let state = test_state().await;
        let mut params = blank_recommend_query();
        params.item_key = Some("Necron's Blade".to_string());
        params.stars10 = Some(99);
        params.petlvl = Some(-3);
        // Clamped silently: no error, just an empty result for an unknown item.
        let Json(rec) = get_recommend(State(state), Query(params)).await.unwrap();
        assert_eq!(rec.range_count, 0);
        assert!(rec.top3.is_empty());
    }

    #[tokio::test]
    async fn recommend_handler_end_to_end_over_stored_sales() {
        use crate::db::models::SaleRow;

        let state = test_state().await;
        state
            .store
            .upsert_sale(&SaleRow {
                uuid: "s1".to_string(),
                item_name: "Necron's Blade".to_string(),
                item_key: Some("necrons blade".to_string()),
                bin: true,
                price: 1_000_000,
                ended_ts: now_ms(),
                tier: Some("legendary".to_string()),
                signature: Some(
                    "tier:legendary|dstars:5|mstars:5|stars10:10|sharpness:7".to_string(),
                ),
                item_lore: None,
                item_bytes: None,
            })
            .await
            .unwrap();

        let mut params = blank_recommend_query();
        params.item_key = Some("Necron's Blade".to_string());
        params.stars10 = Some(10);
        params.enchants = Some("Sharpness VII".to_string());
        params.rarity = Some("LEGENDARY".to_string());

        let Json(rec) = get_recommend(State(state), Query(params)).await.unwrap();
        assert_eq!(rec.recommended, Some(1_000_000));
        assert_eq!(rec.range_count, 1);
        assert_eq!(rec.top3.len(), 1);
        assert_eq!(rec.top3[0].quality, "perfect");
        assert_eq!(rec.top3[0].matched[0].name, "sharpness");
    }

    #[tokio::test]
    async fn items_handler_prefix_searches_the_store() {
        use crate::db::models::AuctionRow;

        let state = test_state().await;
        let row = AuctionRow {
            uuid: "a1".to_string(),
            item_name: "Hyperion".to_string(),
            item_key: "hyperion".to_string(),
            bin: true,
            start_ts: 0,
            end_ts: 10,
            starting_bid: 1,
            highest_bid: 0,
            tier: None,
            item_lore: None,
            item_bytes: None,
            last_seen_ts: 5,
            signature: None,
            is_ended: false,
        };
        state.store.bulk_upsert_auctions(&[row]).await.unwrap();

        let Json(resp) = get_items(
            State(state),
            Query(SearchQuery {
                q: Some("Hyp".to_string()),
                limit: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.items.len(), 1);
        assert_eq!(resp.items[0].key, "hyperion");
        assert_eq!(resp.items[0].label, "Hyperion");
    }

    #[tokio::test]
    async fn enchants_handler_filters_and_limits() {
        let Json(body) = get_enchants(Query(SearchQuery {
            q: Some("sharp".to_string()),
            limit: Some(3),
        }))
        .await;
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], "Sharpness 1");
    }

    #[tokio::test]
    async fn health_handler() {
        let Json(body) = get_health().await;
        assert_eq!(body["ok"], true);
    }
}
