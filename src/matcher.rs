//! Strict three-state matching of a user query against a stored signature.
//!
//! Hard filters reject outright; star and enchantment comparisons tolerate a
//! single unit of distance (recorded as a partial match) and reject past it.

use crate::enchants::tier_bucket;
use crate::signature::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchQuality {
    Perfect,
    Partial,
    None,
}

impl std::fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchQuality::Perfect => "perfect",
            MatchQuality::Partial => "partial",
            MatchQuality::None => "none",
        };
        write!(f, "{s}")
    }
}

/// Hard attribute filters. `None` / level 0 means "not specified".
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub tier: Option<String>,
    pub wither_impact: bool,
    pub dye: Option<String>,
    pub skin: Option<String>,
    pub petskin: Option<String>,
    pub min_pet_level: i64,
    pub pet_item: Option<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.tier.is_none()
            && !self.wither_impact
            && self.dye.is_none()
            && self.skin.is_none()
            && self.petskin.is_none()
            && self.min_pet_level == 0
            && self.pet_item.is_none()
    }
}

/// The full match request: stars, enchantments, filters.
#[derive(Debug, Clone, Default)]
pub struct MatchRequest {
    pub stars10: i64,
    /// Normalized (name, level) pairs.
    pub enchants: Vec<(String, i64)>,
    pub filters: QueryFilters,
}

impl MatchRequest {
    fn asks_nothing(&self) -> bool {
        self.stars10 == 0 && self.enchants.is_empty() && self.filters.is_empty()
    }
}

/// Outcome plus the unit distances the recommender turns into a score.
#[derive(Debug, Clone, Copy)]
pub struct MatchOutcome {
    pub quality: MatchQuality,
    pub stars_diff: i64,
    pub enchant_diff_total: i64,
}

impl MatchOutcome {
    fn none() -> Self {
        Self {
            quality: MatchQuality::None,
            stars_diff: 0,
            enchant_diff_total: 0,
        }
    }
}

fn filter_mismatch(requested: Option<&str>, candidate: Option<&str>) -> bool {
    match requested {
        None => false,
        Some("none") => false,
        Some(want) => candidate != Some(want),
    }
}

/// Compare a request against a parsed candidate signature.
pub fn match_signature(req: &MatchRequest, candidate: &Signature) -> MatchOutcome {
    // An unfingerprinted candidate satisfies only an unconstrained query.
    if candidate.is_empty() {
        return if req.asks_nothing() {
            MatchOutcome {
                quality: MatchQuality::Perfect,
                stars_diff: 0,
                enchant_diff_total: 0,
            }
        } else {
            MatchOutcome::none()
        };
    }

    let f = &req.filters;
    if filter_mismatch(f.tier.as_deref(), candidate.tier.as_deref())
        || filter_mismatch(f.dye.as_deref(), candidate.dye.as_deref())
        || filter_mismatch(f.skin.as_deref(), candidate.skin.as_deref())
        || filter_mismatch(f.petskin.as_deref(), candidate.petskin.as_deref())
        || filter_mismatch(f.pet_item.as_deref(), candidate.pet_item.as_deref())
    {
        return MatchOutcome::none();
    }
    if f.wither_impact && !candidate.wither_impact {
        return MatchOutcome::none();
    }
    if f.min_pet_level > 0 && candidate.pet_level < f.min_pet_level {
        return MatchOutcome::none();
    }

    let mut partial = false;
    let mut stars_diff = 0;
    if req.stars10 > 0 {
        stars_diff = (candidate.stars10 - req.stars10).abs();
        match stars_diff {
            0 => {}
            1 => partial = true,
            _ => return MatchOutcome::none(),
        }
    }

    let mut enchant_diff_total = 0;
    for (name, level) in &req.enchants {
        let candidate_level = candidate.enchants.get(name).copied().unwrap_or(0);
        if candidate_level == 0 {
            return MatchOutcome::none();
        }
        let level_diff = (candidate_level - level).abs();
        let bucket_diff = (tier_bucket(name, candidate_level).rank()
            - tier_bucket(name, *level).rank())
        .abs();
        let diff = level_diff.max(bucket_diff);
        match diff {
            0 => {}
            1 => {
                partial = true;
                enchant_diff_total += 1;
            }
            _ => return MatchOutcome::none(),
        }
    }

    MatchOutcome {
        quality: if partial {
            MatchQuality::Partial
        } else {
            MatchQuality::Perfect
        },
        stars_diff,
        enchant_diff_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(stars10: i64, enchants: &[(&str, i64)]) -> MatchRequest {
        MatchRequest {
            stars10,
            enchants: enchants.iter().map(|(n, l)| (n.to_string(), *l)).collect(),
            filters: QueryFilters::default(),
        }
    }

    fn sig(raw: &str) -> Signature {
        Signature::parse(raw)
    }

    #[test]
    fn empty_candidate_vs_empty_request_is_perfect() {
        let outcome = match_signature(&MatchRequest::default(), &sig(""));
        assert_eq!(outcome.quality, MatchQuality::Perfect);
    }

    #[test]
    fn empty_candidate_vs_any_requirement_is_none() {
        let outcome = match_signature(&req(5, &[]), &sig(""));
        assert_eq!(outcome.quality, MatchQuality::None);
        let outcome = match_signature(&req(0, &[("sharpness", 7)]), &sig(""));
        assert_eq!(outcome.quality, MatchQuality::None);
        let mut r = MatchRequest::default();
        r.filters.tier = Some("legendary".to_string());
        assert_eq!(match_signature(&r, &sig("")).quality, MatchQuality::None);
    }

    #[test]
    fn exact_stars_and_enchant_is_perfect() {
        let outcome = match_signature(
            &req(10, &[("sharpness", 7)]),
            &sig("dstars:5|mstars:5|stars10:10|sharpness:7"),
        );
        assert_eq!(outcome.quality, MatchQuality::Perfect);
        assert_eq!(outcome.stars_diff, 0);
        assert_eq!(outcome.enchant_diff_total, 0);
    }

    #[test]
    fn one_star_off_is_partial_two_is_none() {
        let outcome = match_signature(&req(10, &[]), &sig("dstars:5|mstars:4|stars10:9"));
        assert_eq!(outcome.quality, MatchQuality::Partial);
        assert_eq!(outcome.stars_diff, 1);

        let outcome = match_signature(&req(10, &[]), &sig("dstars:5|mstars:3|stars10:8"));
        assert_eq!(outcome.quality, MatchQuality::None);
    }

    #[test]
    fn missing_enchant_is_none() {
        let outcome = match_signature(&req(0, &[("sharpness", 7)]), &sig("growth:6"));
        assert_eq!(outcome.quality, MatchQuality::None);
    }

    #[test]
    fn one_level_off_same_bucket_is_partial() {
        // growth 4 vs 5: level diff 1, bucket BB vs B diff 1.
        let outcome = match_signature(&req(0, &[("growth", 5)]), &sig("growth:4"));
        assert_eq!(outcome.quality, MatchQuality::Partial);
    }

    #[test]
    fn bucket_cliff_dominates_level_diff() {
        // sharpness 5 (B) vs 7 (AAA): level diff 2 rejects regardless.
        let outcome = match_signature(&req(0, &[("sharpness", 7)]), &sig("sharpness:5"));
        assert_eq!(outcome.quality, MatchQuality::None);
        // sharpness 6 (AA) vs 7 (AAA): both diffs are 1 — partial.
        let outcome = match_signature(&req(0, &[("sharpness", 7)]), &sig("sharpness:6"));
        assert_eq!(outcome.quality, MatchQuality::Partial);
    }

    #[test]
    fn hard_filters_reject() {
        let candidate = sig("tier:epic|stars10:5|dstars:5|pet_level:80|pet_item:tier_boost");
        let mut r = req(0, &[]);
        r.filters.tier = Some("legendary".to_string());
        assert_eq!(match_signature(&r, &candidate).quality, MatchQuality::None);

        let mut r = req(0, &[]);
        r.filters.tier = Some("epic".to_string());
        assert_eq!(match_signature(&r, &candidate).quality, MatchQuality::Perfect);

        let mut r = req(0, &[]);
        r.filters.min_pet_level = 100;
        assert_eq!(match_signature(&r, &candidate).quality, MatchQuality::None);

        let mut r = req(0, &[]);
        r.filters.min_pet_level = 50;
        assert_eq!(match_signature(&r, &candidate).quality, MatchQuality::Perfect);
    }

    #[test]
    fn none_valued_filter_is_ignored() {
        let mut r = req(0, &[]);
        r.filters.dye = Some("none".to_string());
        assert_eq!(match_signature(&r, &sig("tier:rare")).quality, MatchQuality::Perfect);
    }

    #[test]
    fn wither_impact_filter() {
        let mut r = req(0, &[]);
        r.filters.wither_impact = true;
        assert_eq!(
            match_signature(&r, &sig("tier:legendary|wither_impact:1")).quality,
            MatchQuality::Perfect
        );
        assert_eq!(
            match_signature(&r, &sig("tier:legendary")).quality,
            MatchQuality::None
        );
    }

    #[test]
    fn adding_filters_never_promotes() {
        // Monotonicity: each added constraint can only hold or demote quality.
        let candidate = sig("tier:legendary|dstars:5|mstars:4|stars10:9|sharpness:7|growth:6");
        let rank = |q: MatchQuality| match q {
            MatchQuality::Perfect => 2,
            MatchQuality::Partial => 1,
            MatchQuality::None => 0,
        };

        let mut r = MatchRequest::default();
        let mut last = rank(match_signature(&r, &candidate).quality);

        r.stars10 = 10; // diff 1
        let q = rank(match_signature(&r, &candidate).quality);
        assert!(q <= last);
        last = q;

        r.enchants.push(("sharpness".to_string(), 7));
        let q = rank(match_signature(&r, &candidate).quality);
        assert!(q <= last);
        last = q;

        r.filters.tier = Some("epic".to_string()); // mismatch
        let q = rank(match_signature(&r, &candidate).quality);
        assert!(q <= last);
        assert_eq!(q, 0);
    }
}
