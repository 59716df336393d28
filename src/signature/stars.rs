//! Star-level resolution.
//!
//! The upstream exposes star data three ways that frequently disagree: a
//! `dungeon_item_level` field, an `upgrade_level` field, and star glyphs
//! rendered into the item name / display text. The priority rules here are
//! accumulated reverse-engineering of provider behavior — preserve them
//! exactly.

use serde_json::Value;
use tracing::debug;

use crate::nbt;
use crate::text::{is_star_char, normalize_weird_digits};

/// Characters allowed between glyphs of one star cluster.
fn is_cluster_separator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            ',' | '.' | ';' | ':' | '-' | '_' | '+' | '|' | '/' | '\\' | '\'' | '"' | '`'
                | '~' | '!' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>'
        )
}

fn roman_one_to_five(token: &str) -> Option<i64> {
    match token.to_ascii_uppercase().as_str() {
        "I" => Some(1),
        "II" => Some(2),
        "III" => Some(3),
        "IV" => Some(4),
        "V" => Some(5),
        _ => None,
    }
}

/// Total stars [0,10] read from display text.
///
/// Scans the last 80 characters for a star cluster: walk backwards from the
/// last star-like glyph counting up to 5 contiguous stars, spending at most a
/// 12-character budget on separators between them. A full cluster of 5 may be
/// followed by a master-star count — a single digit 1-5 or a Roman numeral
/// I-V — in the token right after the cluster.
pub fn stars10_from_text(input: &str) -> i64 {
    let normalized = normalize_weird_digits(input);
    let chars: Vec<char> = normalized.chars().collect();
    let window_start = chars.len().saturating_sub(80);
    let window = &chars[window_start..];

    let Some(last_star) = window.iter().rposition(|c| is_star_char(*c)) else {
        return 0;
    };

    let mut count = 1i64;
    let mut budget = 12u32;
    let mut i = last_star;
    while i > 0 && count < 5 {
        i -= 1;
        let c = window[i];
        if is_star_char(c) {
            count += 1;
        } else if is_cluster_separator(c) && budget > 0 {
            budget -= 1;
        } else {
            break;
        }
    }

    if count < 5 {
        return count;
    }

    // Five stars; look for a master-star count right after the cluster.
    let tail: String = window[last_star + 1..]
        .iter()
        .skip_while(|c| is_cluster_separator(**c))
        .take_while(|c| !is_cluster_separator(**c))
        .collect();

    if tail.len() == 1 {
        if let Some(d) = tail.chars().next().and_then(|c| c.to_digit(10)) {
            if (1..=5).contains(&d) {
                return 5 + d as i64;
            }
        }
    }
    if let Some(v) = roman_one_to_five(&tail) {
        return 5 + v;
    }
    5
}

fn clamp10(v: i64) -> i64 {
    v.clamp(0, 10)
}

/// Resolve `(dstars, mstars)` from the attribute tree with text fallback.
///
/// Priority: a total folded into `dungeon_item_level`, then into
/// `upgrade_level`, then both fields as separate counts, then each alone
/// (with text disambiguation for a bare `upgrade_level`), then text only.
pub fn resolve_stars(extra: &Value, item_name: &str, lore: &str) -> (i64, i64) {
    let d = clamp10(nbt::get_i64(extra, "dungeon_item_level").unwrap_or(0));
    let u = clamp10(nbt::get_i64(extra, "upgrade_level").unwrap_or(0));

    let (dstars, mstars) = if d > 5 {
        (5, d - 5)
    } else if u > 5 {
        (5, u - 5)
    } else if d > 0 && u > 0 {
        (d.clamp(0, 5), u.clamp(0, 5))
    } else if d > 0 {
        (d, 0)
    } else if u > 0 {
        // A bare upgrade_level in [1,5] is ambiguous: dungeon stars on most
        // items, master stars on items whose text already shows a full base.
        let text_total = stars10_from_text(item_name).max(stars10_from_text(lore));
        if text_total >= 6 {
            debug!(
                upgrade_level = u,
                text_total, "star fallback: treating upgrade_level as master stars"
            );
            (5, u)
        } else {
            (u, 0)
        }
    } else {
        let total = stars10_from_text(item_name).max(stars10_from_text(lore));
        (total.min(5), (total - 5).max(0))
    };

    // A master star can only sit on a fully-starred base.
    if mstars > 0 && dstars != 5 {
        (5, mstars)
    } else {
        (dstars, mstars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_counts_partial_clusters() {
        assert_eq!(stars10_from_text("Necron's Blade ✪✪✪"), 3);
        assert_eq!(stars10_from_text("Necron's Blade"), 0);
        assert_eq!(stars10_from_text("✪"), 1);
    }

    #[test]
    fn text_full_cluster_is_five() {
        assert_eq!(stars10_from_text("✪✪✪✪✪ Necron's Blade"), 5);
        assert_eq!(stars10_from_text("Hyperion ✪✪✪✪✪"), 5);
    }

    #[test]
    fn text_reads_master_star_digit_after_cluster() {
        assert_eq!(stars10_from_text("Hyperion ✪✪✪✪✪ 3"), 8);
        assert_eq!(stars10_from_text("Hyperion ✪✪✪✪✪➍"), 9);
        assert_eq!(stars10_from_text("Hyperion ✪✪✪✪✪ V"), 10);
        // A trailing word is not a master-star count.
        assert_eq!(stars10_from_text("✪✪✪✪✪ Blade"), 5);
        // Digits out of range don't extend the cluster.
        assert_eq!(stars10_from_text("Hyperion ✪✪✪✪✪ 7"), 5);
    }

    #[test]
    fn text_allows_separators_inside_cluster() {
        assert_eq!(stars10_from_text("✪ ✪ ✪ ✪ ✪"), 5);
        assert_eq!(stars10_from_text("✪-✪-✪"), 3);
    }

    #[test]
    fn text_only_scans_the_tail_window() {
        let mut s = "✪".to_string();
        s.push_str(&"x".repeat(100));
        assert_eq!(stars10_from_text(&s), 0);
    }

    #[test]
    fn dungeon_field_total_splits() {
        let extra = json!({ "dungeon_item_level": 8_i64, "upgrade_level": 0_i64 });
        assert_eq!(resolve_stars(&extra, "", ""), (5, 3));
    }

    #[test]
    fn upgrade_field_total_splits() {
        let extra = json!({ "upgrade_level": 7_i64 });
        assert_eq!(resolve_stars(&extra, "", ""), (5, 2));
    }

    #[test]
    fn both_fields_combine() {
        let extra = json!({ "dungeon_item_level": 5_i64, "upgrade_level": 3_i64 });
        assert_eq!(resolve_stars(&extra, "", ""), (5, 3));
        // Master stars imply a fully-starred base even if the feed disagrees.
        let extra = json!({ "dungeon_item_level": 4_i64, "upgrade_level": 2_i64 });
        assert_eq!(resolve_stars(&extra, "", ""), (5, 2));
    }

    #[test]
    fn dungeon_field_alone() {
        let extra = json!({ "dungeon_item_level": 4_i64 });
        assert_eq!(resolve_stars(&extra, "", ""), (4, 0));
    }

    #[test]
    fn bare_upgrade_level_uses_text_to_disambiguate() {
        let extra = json!({ "upgrade_level": 3_i64 });
        // Text shows 8 total: the field is master stars.
        assert_eq!(resolve_stars(&extra, "Hyperion ✪✪✪✪✪ 3", ""), (5, 3));
        // No text signal: the field is dungeon stars.
        assert_eq!(resolve_stars(&extra, "Hyperion", ""), (3, 0));
    }

    #[test]
    fn text_fallback_when_fields_absent() {
        let extra = json!({});
        assert_eq!(resolve_stars(&extra, "✪✪✪✪✪ Necron's Blade", ""), (5, 0));
        assert_eq!(resolve_stars(&extra, "Blade ✪✪✪", ""), (3, 0));
        assert_eq!(resolve_stars(&extra, "", "Some lore ✪✪✪✪✪ 2"), (5, 2));
    }

    #[test]
    fn clamping_bounds_fields() {
        let extra = json!({ "dungeon_item_level": 99_i64 });
        assert_eq!(resolve_stars(&extra, "", ""), (5, 5));
    }
}
