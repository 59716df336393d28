//! The canonical signature token string.
//!
//! A signature is an ordered, `|`-delimited sequence of `key:value` tokens:
//! reserved feature tokens first in a fixed order, then enchantment tokens
//! sorted lexicographically by name. It is a content fingerprint — price
//! statistics and filter comparisons run as string-token operations over an
//! indexed text column without re-parsing binary payloads.

use std::collections::BTreeMap;

/// Keys that can never be enchantment names. If the upstream ever ships an
/// enchantment colliding with one of these, it must be renamed on ingest.
pub const RESERVED_KEYS: &[&str] = &[
    "tier", "dstars", "mstars", "stars10", "wither_impact", "pet_level", "pet_item",
    "dye", "skin", "petskin",
];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Parsed form of a signature string. `BTreeMap` keeps enchantment emission
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub tier: Option<String>,
    pub dstars: i64,
    pub mstars: i64,
    pub stars10: i64,
    pub wither_impact: bool,
    pub pet_level: i64,
    pub dye: Option<String>,
    pub skin: Option<String>,
    pub petskin: Option<String>,
    pub pet_item: Option<String>,
    pub enchants: BTreeMap<String, i64>,
}

fn non_none(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v == "none" {
        None
    } else {
        Some(v.to_string())
    }
}

impl Signature {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Tolerant parse: unknown shapes are skipped, duplicate enchantment
    /// names keep the highest level.
    pub fn parse(raw: &str) -> Self {
        let mut sig = Self::default();
        for token in raw.split('|') {
            let Some((key, value)) = token.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "tier" => sig.tier = non_none(value),
                "dstars" => sig.dstars = value.parse().unwrap_or(0),
                "mstars" => sig.mstars = value.parse().unwrap_or(0),
                "stars10" => sig.stars10 = value.parse().unwrap_or(0),
                "wither_impact" => sig.wither_impact = value == "1" || value == "true",
                "pet_level" => sig.pet_level = value.parse().unwrap_or(0),
                "dye" => sig.dye = non_none(value),
                "skin" => sig.skin = non_none(value),
                "petskin" => sig.petskin = non_none(value),
                "pet_item" => sig.pet_item = non_none(value),
                name if !name.is_empty() => {
                    let level: i64 = value.parse().unwrap_or(0);
                    let entry = sig.enchants.entry(name.to_string()).or_insert(0);
                    if level > *entry {
                        *entry = level;
                    }
                }
                _ => {}
            }
        }
        sig
    }

    /// Emit the canonical token string. Absent / zero / "none" values are
    /// omitted entirely; an all-empty signature emits "".
    pub fn emit(&self) -> String {
        let mut tokens: Vec<String> = Vec::new();
        if let Some(tier) = &self.tier {
            tokens.push(format!("tier:{}", tier.to_lowercase()));
        }
        if self.dstars > 0 {
            tokens.push(format!("dstars:{}", self.dstars));
        }
        if self.mstars > 0 {
            tokens.push(format!("mstars:{}", self.mstars));
        }
        if self.stars10 > 0 {
            tokens.push(format!("stars10:{}", self.stars10));
        }
        if self.wither_impact {
            tokens.push("wither_impact:1".to_string());
        }
        if self.pet_level > 0 {
            tokens.push(format!("pet_level:{}", self.pet_level));
        }
        for (key, value) in [
            ("dye", &self.dye),
            ("skin", &self.skin),
            ("petskin", &self.petskin),
            ("pet_item", &self.pet_item),
        ] {
            if let Some(v) = value.as_deref().and_then(|v| non_none(v)) {
                tokens.push(format!("{key}:{v}"));
            }
        }
        for (name, level) in &self.enchants {
            if *level > 0 && !is_reserved_key(name) {
                tokens.push(format!("{name}:{level}"));
            }
        }
        tokens.join("|")
    }
}

/// Merge rule applied on every upsert of `auctions` and `sales`: keep the
/// stored signature unless it is empty, the incoming one introduces a
/// `pet_item:` token the stored one lacks, or the two disagree on `stars10:`.
pub fn merge_signature(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    let existing = existing.map(str::trim).filter(|s| !s.is_empty());
    let incoming = incoming.map(str::trim).filter(|s| !s.is_empty());
    match (existing, incoming) {
        (None, inc) => inc.map(str::to_string),
        (Some(exist), None) => Some(exist.to_string()),
        (Some(exist), Some(inc)) => {
            let old = Signature::parse(exist);
            let new = Signature::parse(inc);
            let gains_pet_item = new.pet_item.is_some() && old.pet_item.is_none();
            let stars_disagree = old.stars10 != new.stars10;
            if gains_pet_item || stars_disagree {
                Some(inc.to_string())
            } else {
                Some(exist.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_orders_tokens_and_omits_empties() {
        let mut sig = Signature {
            tier: Some("LEGENDARY".to_string()),
            dstars: 5,
            mstars: 3,
            stars10: 8,
            wither_impact: true,
            ..Default::default()
        };
        sig.enchants.insert("sharpness".to_string(), 7);
        sig.enchants.insert("giant_killer".to_string(), 6);
        assert_eq!(
            sig.emit(),
            "tier:legendary|dstars:5|mstars:3|stars10:8|wither_impact:1|giant_killer:6|sharpness:7"
        );
    }

    #[test]
    fn empty_signature_emits_empty_string() {
        assert_eq!(Signature::default().emit(), "");
    }

    #[test]
    fn parse_then_emit_is_stable() {
        let raw = "tier:legendary|dstars:5|stars10:5|pet_item:tier_boost|growth:6|sharpness:7";
        let sig = Signature::parse(raw);
        assert_eq!(sig.emit(), raw);
        assert_eq!(Signature::parse(&sig.emit()), sig);
    }

    #[test]
    fn parse_keeps_max_level_on_duplicate_enchants() {
        let sig = Signature::parse("sharpness:5|sharpness:7|sharpness:6");
        assert_eq!(sig.enchants.get("sharpness"), Some(&7));
    }

    #[test]
    fn parse_skips_malformed_tokens() {
        let sig = Signature::parse("garbage|dstars:5||:3|stars10:notanum");
        assert_eq!(sig.dstars, 5);
        assert_eq!(sig.stars10, 0);
        assert!(sig.enchants.is_empty());
    }

    #[test]
    fn merge_prefers_existing_by_default() {
        let merged = merge_signature(Some("tier:rare|stars10:5|dstars:5"), Some("tier:epic|stars10:5|dstars:5"));
        assert_eq!(merged.as_deref(), Some("tier:rare|stars10:5|dstars:5"));
    }

    #[test]
    fn merge_takes_incoming_when_existing_empty() {
        assert_eq!(merge_signature(None, Some("tier:rare")).as_deref(), Some("tier:rare"));
        assert_eq!(merge_signature(Some(""), Some("tier:rare")).as_deref(), Some("tier:rare"));
        assert_eq!(merge_signature(Some("tier:rare"), None).as_deref(), Some("tier:rare"));
    }

    #[test]
    fn merge_takes_incoming_on_new_pet_item() {
        let merged = merge_signature(Some("pet_level:100"), Some("pet_level:100|pet_item:tier_boost"));
        assert_eq!(merged.as_deref(), Some("pet_level:100|pet_item:tier_boost"));
    }

    #[test]
    fn merge_takes_incoming_on_stars_disagreement() {
        let merged = merge_signature(Some("dstars:5|stars10:5"), Some("dstars:5|mstars:2|stars10:7"));
        assert_eq!(merged.as_deref(), Some("dstars:5|mstars:2|stars10:7"));
    }
}
