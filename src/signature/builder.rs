//! Signature construction — the deterministic content fingerprint.
//!
//! Combines the attribute tree decoded from the binary payload, the item
//! name, and the display text into the canonical token string. Same inputs
//! produce a byte-identical signature; that property is what makes the stored
//! signature column comparable across snapshots.

use serde_json::Value;
use tracing::warn;

use crate::enchants::normalize_enchant_key;
use crate::nbt;
use crate::signature::stars::resolve_stars;
use crate::signature::tokens::{is_reserved_key, Signature};
use crate::text::{canonical_item_key, clean_text, norm_key};

/// Weapons that can carry the Wither Impact ability.
const WITHER_BLADES: &[&str] = &["hyperion", "astraea", "scylla", "valkyrie"];

const WITHER_SCROLLS: &[&str] = &["implosion_scroll", "shadow_warp_scroll", "wither_shield_scroll"];

/// Build the canonical signature for one listing. Empty inputs yield "".
pub fn build_signature(
    item_name: &str,
    lore: &str,
    tier: Option<&str>,
    item_bytes: Option<&str>,
) -> String {
    let extra = match item_bytes {
        Some(b64) if !b64.trim().is_empty() => {
            let extra = nbt::decode_extra_attributes(b64);
            if extra.is_null() {
                warn!(item_name, "attribute payload present but undecodable");
            }
            extra
        }
        _ => Value::Null,
    };

    let mut sig = Signature {
        tier: tier
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase),
        ..Default::default()
    };

    collect_enchantments(&extra, &mut sig);

    let (dstars, mstars) = resolve_stars(&extra, item_name, lore);
    sig.dstars = dstars;
    sig.mstars = mstars;
    if dstars > 0 || mstars > 0 {
        sig.stars10 = dstars + mstars;
    }

    sig.wither_impact = wither_impact(item_name, lore, &extra);
    sig.pet_level = pet_level(&extra, item_name);

    sig.dye = cosmetic(&extra, &["dye_item"]);
    sig.skin = cosmetic(&extra, &["skin"]);
    sig.petskin = cosmetic(&extra, &["petSkin", "pet_skin"]);
    sig.pet_item = pet_item(&extra, lore);

    sig.emit()
}

fn enchant_level(v: &Value) -> i64 {
    match nbt::unwrap(v) {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn insert_enchant(sig: &mut Signature, name: &str, level: i64) {
    let key = normalize_enchant_key(name);
    if key.is_empty() || level <= 0 || is_reserved_key(&key) {
        return;
    }
    let entry = sig.enchants.entry(key).or_insert(0);
    if level > *entry {
        *entry = level;
    }
}

fn collect_enchantments(extra: &Value, sig: &mut Signature) {
    if let Some(Value::Object(map)) = nbt::get(extra, "enchantments").map(nbt::unwrap) {
        for (name, level) in map {
            insert_enchant(sig, name, enchant_level(level));
        }
    }

    // ultimate_enchant arrives either as "NAME_LEVEL" or as an object.
    match nbt::get(extra, "ultimate_enchant") {
        Some(Value::String(s)) => {
            if let Some((name, level)) = s.rsplit_once('_') {
                if let Ok(level) = level.trim().parse::<i64>() {
                    insert_enchant(sig, name, level);
                }
            }
        }
        Some(obj @ Value::Object(_)) => {
            let name = nbt::get_str(obj, "enchant")
                .or_else(|| nbt::get_str(obj, "enchantment"))
                .or_else(|| nbt::get_str(obj, "id"));
            let level = nbt::get_i64(obj, "level")
                .or_else(|| nbt::get_i64(obj, "lvl"))
                .or_else(|| nbt::get_i64(obj, "tier"));
            if let (Some(name), Some(level)) = (name, level) {
                insert_enchant(sig, name, level);
            }
        }
        _ => {}
    }
}

/// True iff a wither blade provably carries the Wither Impact ability: the
/// lore says so, or all three ability scrolls are present in the payload.
fn wither_impact(item_name: &str, lore: &str, extra: &Value) -> bool {
    if !WITHER_BLADES.contains(&canonical_item_key(item_name).as_str()) {
        return false;
    }
    if lore.to_lowercase().contains("wither impact") {
        return true;
    }

    let mut scrolls: Vec<String> = Vec::new();
    if let Value::Object(map) = nbt::unwrap(extra) {
        for (key, value) in map {
            if key.to_lowercase().contains("scroll") {
                nbt::collect_strings(value, &mut scrolls);
            }
        }
    }
    let scrolls: Vec<String> = scrolls.iter().map(|s| s.to_lowercase()).collect();
    WITHER_SCROLLS.iter().all(|s| scrolls.iter().any(|have| have == s))
}

/// Pet level [1,200] from petInfo (a JSON-encoded string) or the name prefix.
fn pet_level(extra: &Value, item_name: &str) -> i64 {
    if let Some(raw) = nbt::get_str(extra, "petInfo") {
        if let Ok(info) = serde_json::from_str::<Value>(raw) {
            if let Some(level) = nbt::get_i64(&info, "level") {
                if (1..=200).contains(&level) {
                    return level;
                }
            }
        }
    }

    let cleaned = clean_text(item_name).to_lowercase();
    let mut tokens = cleaned.split_whitespace();
    if let (Some(prefix), Some(digits)) = (tokens.next(), tokens.next()) {
        if matches!(prefix, "lvl" | "lv" | "level") {
            if let Ok(level) = digits.parse::<i64>() {
                if (1..=200).contains(&level) {
                    return level;
                }
            }
        }
    }
    0
}

fn cosmetic(extra: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(raw) = nbt::get_str(extra, key) {
            let normalized = norm_key(raw);
            if !normalized.is_empty() && normalized != "none" {
                return Some(normalized);
            }
        }
    }
    None
}

/// Pet held item: payload keys first, then a "Held Item:" / "Pet Item:" lore
/// line. Canonical form is underscore-joined.
fn pet_item(extra: &Value, lore: &str) -> Option<String> {
    const KEYS: &[&str] = &[
        "petItem", "pet_item", "heldItem", "held_item", "petHeldItem", "pet_held_item",
    ];
    for key in KEYS {
        if let Some(raw) = nbt::get_str(extra, key) {
            let normalized = norm_key(raw);
            if !normalized.is_empty() && normalized != "none" {
                return Some(normalized.replace(' ', "_"));
            }
        }
    }

    for line in lore.lines() {
        let cleaned = clean_text(line).to_lowercase();
        let Some(rest) = cleaned
            .strip_prefix("held item")
            .or_else(|| cleaned.strip_prefix("pet item"))
        else {
            continue;
        };
        let normalized = norm_key(rest.trim_start_matches([':', ' ']));
        if !normalized.is_empty() && normalized != "none" {
            return Some(normalized.replace(' ', "_"));
        }
    }
    None
}
