//! Enchantment name normalization and the static tier-bucket table.
//!
//! Buckets rank how desirable a (name, level) pair is: BB < B < A < AA < AAA,
//! with MISC for pairs the table does not know. The matcher compares bucket
//! ranks alongside raw levels so a one-level gap that crosses a rarity cliff
//! still counts as a real difference.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierBucket {
    Misc,
    BB,
    B,
    A,
    AA,
    AAA,
}

impl TierBucket {
    /// Comparable rank; MISC sits below the ladder at -1.
    pub fn rank(self) -> i64 {
        match self {
            TierBucket::Misc => -1,
            TierBucket::BB => 0,
            TierBucket::B => 1,
            TierBucket::A => 2,
            TierBucket::AA => 3,
            TierBucket::AAA => 4,
        }
    }
}

impl std::fmt::Display for TierBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TierBucket::Misc => "MISC",
            TierBucket::BB => "BB",
            TierBucket::B => "B",
            TierBucket::A => "A",
            TierBucket::AA => "AA",
            TierBucket::AAA => "AAA",
        };
        write!(f, "{s}")
    }
}

use TierBucket::{A, AA, AAA, B, BB};

/// Bucket per level, indexed by level-1; levels past the end reuse the last
/// entry. Names are in normalized form (ultimates without their prefix).
const TIER_TABLE: &[(&str, &[TierBucket])] = &[
    ("sharpness", &[BB, BB, BB, BB, B, AA, AAA]),
    ("growth", &[BB, BB, BB, BB, B, AA, AAA]),
    ("protection", &[BB, BB, BB, BB, B, AA, AAA]),
    ("critical", &[BB, BB, BB, BB, B, AA, AAA]),
    ("power", &[BB, BB, BB, BB, B, AA, AAA]),
    ("smite", &[BB, BB, BB, BB, B, A, AA]),
    ("bane_of_arthropods", &[BB, BB, BB, BB, B, A, AA]),
    ("giant_killer", &[BB, BB, BB, BB, B, AA, AAA]),
    ("ender_slayer", &[BB, BB, BB, BB, B, AA, AAA]),
    ("dragon_hunter", &[B, B, A, AA, AAA]),
    ("first_strike", &[BB, BB, BB, B, AA]),
    ("triple_strike", &[BB, BB, BB, B, AA]),
    ("life_steal", &[BB, BB, B, A, AA]),
    ("syphon", &[BB, BB, B, A, AA]),
    ("vampirism", &[BB, BB, BB, B, A, AA]),
    ("execute", &[BB, BB, BB, B, A, AA]),
    ("cubism", &[BB, BB, BB, B, A, AA]),
    ("impaling", &[B, A, AA]),
    ("lethality", &[BB, BB, BB, B, A, AA]),
    ("luck", &[BB, BB, BB, BB, B, A, AA]),
    ("looting", &[BB, BB, B, A, AA]),
    ("scavenger", &[BB, BB, B, A, AA]),
    ("experience", &[BB, BB, B, AA]),
    ("vicious", &[A, A, AA, AA, AAA]),
    ("thunderlord", &[BB, BB, BB, BB, B, AA, AAA]),
    ("thunderbolt", &[BB, BB, BB, BB, B, AA, AAA]),
    ("aiming", &[BB, BB, B, A, AA]),
    ("infinite_quiver", &[BB, BB, BB, BB, BB, B, B, A, AA, AAA]),
    ("overload", &[A, AA, AA, AAA, AAA]),
    ("snipe", &[BB, B, A, AA]),
    ("piercing", &[B]),
    ("rejuvenate", &[BB, BB, B, A, AA]),
    ("respite", &[BB, BB, B, A, AA]),
    ("aqua_affinity", &[B]),
    ("respiration", &[BB, B, A]),
    ("depth_strider", &[BB, B, A]),
    ("sugar_rush", &[BB, B, A]),
    ("true_protection", &[AAA]),
    ("fire_protection", &[BB, BB, BB, BB, B, A, AA]),
    ("projectile_protection", &[BB, BB, BB, BB, B, A, AA]),
    ("blast_protection", &[BB, BB, BB, BB, B, A, AA]),
    ("smarty_pants", &[A, AA, AA, AAA, AAA]),
    ("big_brain", &[A, AA, AA, AAA, AAA]),
    ("ferocious_mana", &[B, B, A, A, AA, AA, AA, AAA, AAA, AAA]),
    ("mana_vampire", &[B, B, A, A, AA, AA, AA, AAA, AAA, AAA]),
    ("strong_mana", &[B, B, A, A, AA, AA, AA, AAA, AAA, AAA]),
    ("hardened_mana", &[B, B, A, A, AA, AA, AA, AAA, AAA, AAA]),
    ("efficiency", &[BB, BB, BB, BB, B]),
    ("silk_touch", &[B]),
    ("fortune", &[BB, BB, B, AA]),
    ("pristine", &[A, AA, AA, AAA, AAA]),
    ("compact", &[B, B, B, A, A, A, AA, AA, AAA, AAA]),
    ("cultivating", &[B, B, B, A, A, A, AA, AA, AAA, AAA]),
    ("expertise", &[B, B, B, A, A, A, AA, AA, AAA, AAA]),
    ("harvesting", &[BB, BB, BB, BB, B, A]),
    ("replenish", &[AA]),
    ("telekinesis", &[BB]),
    ("turbo_wheat", &[B, B, A, A, AA]),
    ("turbo_carrot", &[B, B, A, A, AA]),
    ("turbo_potato", &[B, B, A, A, AA]),
    ("turbo_cane", &[B, B, A, A, AA]),
    ("turbo_melon", &[B, B, A, A, AA]),
    ("turbo_pumpkin", &[B, B, A, A, AA]),
    ("turbo_cactus", &[B, B, A, A, AA]),
    ("turbo_warts", &[B, B, A, A, AA]),
    ("turbo_mushrooms", &[B, B, A, A, AA]),
    ("turbo_coco", &[B, B, A, A, AA]),
    ("green_thumb", &[B, B, A, AA, AAA]),
    ("sunder", &[BB, BB, BB, B, A, AA]),
    ("dedication", &[A, AA, AA, AAA]),
    ("champion", &[B, B, B, A, A, A, AA, AA, AAA, AAA]),
    ("hecatomb", &[B, B, B, A, A, A, AA, AA, AAA, AAA]),
    ("divine_gift", &[AA, AAA, AAA]),
    ("prosecute", &[BB, BB, B, A, AA, AA]),
    ("mana_steal", &[B, A, AA]),
    ("ender", &[BB, BB, B, A, AA]),
    ("tabasco", &[A, AA, AAA]),
    ("charm", &[B, B, A, A, AA]),
    ("corruption", &[B, B, A, A, AA]),
    ("frail", &[BB, BB, BB, B, A, AA]),
    ("spiked_hook", &[BB, BB, BB, B, A, AA]),
    ("blessing", &[B, B, A, A, AA, AAA]),
    ("angler", &[BB, BB, BB, BB, B, A]),
    ("caster", &[BB, BB, BB, BB, B, A]),
    ("magnet", &[BB, BB, BB, BB, B, A]),
    ("lure", &[BB, BB, BB, BB, B, A]),
    ("feather_falling", &[BB, BB, BB, BB, B, A, A, A, A, AA]),
    ("counter_strike", &[BB, BB, B, A, AA]),
    ("thorns", &[BB, BB, B]),
    // Ultimates (normalized without the "ultimate " prefix).
    ("one_for_all", &[AAA]),
    ("chimera", &[AA, AA, AAA, AAA, AAA]),
    ("legion", &[AA, AA, AAA, AAA, AAA]),
    ("fatal_tempo", &[AA, AA, AAA, AAA, AAA]),
    ("soul_eater", &[A, AA, AA, AAA, AAA]),
    ("wise", &[B, B, A, AA, AA]),
    ("wisdom", &[B, B, A, AA, AA]),
    ("bank", &[B, A, AA, AA, AAA]),
    ("combo", &[A, A, AA, AA, AAA]),
    ("swarm", &[A, A, AA, AA, AAA]),
    ("last_stand", &[A, A, AA, AA, AAA]),
    ("rend", &[A, A, AA, AA, AAA]),
    ("no_pain_no_gain", &[A, A, AA, AA, AAA]),
    ("duplex", &[AA, AA, AAA, AAA, AAA]),
    ("flash", &[A, A, AA, AA, AAA]),
    ("inferno", &[AA, AA, AAA, AAA, AAA]),
    ("refrigerate", &[A, A, AA, AA, AAA]),
    ("the_one", &[AA, AA, AAA, AAA, AAA]),
    ("jerry", &[BB, BB, BB, BB, BB]),
];

/// Canonical enchantment key: lowercase, underscore-joined, without the
/// "ultimate " prefix. Accepts either underscore or space separated input.
pub fn normalize_enchant_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace('_', " ");
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = collapsed.strip_prefix("ultimate ").unwrap_or(&collapsed);
    stripped.replace(' ', "_")
}

/// Bucket for a (name, level) pair; unknown names or non-positive levels are MISC.
pub fn tier_bucket(name: &str, level: i64) -> TierBucket {
    if level <= 0 {
        return TierBucket::Misc;
    }
    let Some((_, levels)) = TIER_TABLE.iter().find(|(n, _)| *n == name) else {
        return TierBucket::Misc;
    };
    let idx = ((level - 1) as usize).min(levels.len() - 1);
    levels[idx]
}

/// Ranking weight used to order matched enchantments in query results.
pub fn enchant_weight(name: &str, level: i64) -> i64 {
    tier_bucket(name, level).rank() * 1000 + level
}

/// Known (name, max_level) pairs, for autocompletion.
pub fn known_enchants() -> impl Iterator<Item = (&'static str, i64)> {
    TIER_TABLE.iter().map(|(name, levels)| (*name, levels.len() as i64))
}

/// Parse a Roman numeral I..XX. Uppercase or lowercase.
pub fn roman_to_int(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    let mut total = 0i64;
    let mut prev = 0i64;
    for c in s.chars().rev() {
        let v = match c.to_ascii_uppercase() {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            _ => return None,
        };
        if v < prev {
            total -= v;
        } else {
            total += v;
            prev = v;
        }
    }
    (1..=20).contains(&total).then_some(total)
}

/// Enchantment level from either a decimal integer or a Roman numeral.
pub fn parse_level(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| roman_to_int(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_ultimate_prefix() {
        assert_eq!(normalize_enchant_key("ULTIMATE_WISE"), "wise");
        assert_eq!(normalize_enchant_key("Ultimate Fatal Tempo"), "fatal_tempo");
        assert_eq!(normalize_enchant_key("Sharpness"), "sharpness");
        assert_eq!(normalize_enchant_key("bane of arthropods"), "bane_of_arthropods");
    }

    #[test]
    fn bucket_lookup_follows_the_table() {
        assert_eq!(tier_bucket("sharpness", 5), TierBucket::B);
        assert_eq!(tier_bucket("sharpness", 6), TierBucket::AA);
        assert_eq!(tier_bucket("sharpness", 7), TierBucket::AAA);
        // Levels past the table reuse the last entry.
        assert_eq!(tier_bucket("sharpness", 9), TierBucket::AAA);
        assert_eq!(tier_bucket("made_up_enchant", 3), TierBucket::Misc);
        assert_eq!(tier_bucket("sharpness", 0), TierBucket::Misc);
    }

    #[test]
    fn bucket_ranks_are_ordered() {
        assert!(TierBucket::BB.rank() < TierBucket::B.rank());
        assert!(TierBucket::B.rank() < TierBucket::A.rank());
        assert!(TierBucket::A.rank() < TierBucket::AA.rank());
        assert!(TierBucket::AA.rank() < TierBucket::AAA.rank());
        assert_eq!(TierBucket::Misc.rank(), -1);
    }

    #[test]
    fn roman_numerals_parse() {
        assert_eq!(roman_to_int("I"), Some(1));
        assert_eq!(roman_to_int("IV"), Some(4));
        assert_eq!(roman_to_int("v"), Some(5));
        assert_eq!(roman_to_int("IX"), Some(9));
        assert_eq!(roman_to_int("XIV"), Some(14));
        assert_eq!(roman_to_int("XX"), Some(20));
        assert_eq!(roman_to_int("XXI"), None);
        assert_eq!(roman_to_int("ABC"), None);
    }

    #[test]
    fn parse_level_accepts_both_forms() {
        assert_eq!(parse_level("7"), Some(7));
        assert_eq!(parse_level("VII"), Some(7));
        assert_eq!(parse_level(" x "), Some(10));
        assert_eq!(parse_level("seven"), None);
    }
}
