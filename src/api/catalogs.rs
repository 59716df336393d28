//! Embedded cosmetic catalogs served by the autocomplete endpoints.
//!
//! Keys are in the same normalized form the signature tokens use, so a
//! catalog pick can be compared against stored signatures directly.

pub struct CatalogEntry {
    pub label: &'static str,
    pub key: &'static str,
}

macro_rules! catalog {
    ($( $label:literal => $key:literal ),* $(,)?) => {
        &[ $( CatalogEntry { label: $label, key: $key } ),* ]
    };
}

pub const DYES: &[CatalogEntry] = catalog![
    "Necron Dye" => "dye necron",
    "Midnight Dye" => "dye midnight",
    "Aquamarine Dye" => "dye aquamarine",
    "Bone Dye" => "dye bone",
    "Brick Red Dye" => "dye brick red",
    "Byzantium Dye" => "dye byzantium",
    "Carmine Dye" => "dye carmine",
    "Celadon Dye" => "dye celadon",
    "Celeste Dye" => "dye celeste",
    "Dark Purple Dye" => "dye dark purple",
    "Emerald Dye" => "dye emerald",
    "Flame Dye" => "dye flame",
    "Holly Dye" => "dye holly",
    "Iceberg Dye" => "dye iceberg",
    "Jade Dye" => "dye jade",
    "Livid Dye" => "dye livid",
    "Mango Dye" => "dye mango",
    "Matcha Dye" => "dye matcha",
    "Nadeshiko Dye" => "dye nadeshiko",
    "Pelt Dye" => "dye pelt",
    "Pure Black Dye" => "dye pure black",
    "Pure White Dye" => "dye pure white",
    "Sangria Dye" => "dye sangria",
    "Wild Strawberry Dye" => "dye wild strawberry",
];

pub const SKINS: &[CatalogEntry] = catalog![
    "Diamond Necron Head" => "diamond necron head",
    "Golden Necron Head" => "golden necron head",
    "Shimmer Skin" => "shimmer",
    "Frozen Blaze Skin" => "frozen blaze",
    "Reaper Spirit Skin" => "reaper spirit",
    "Crystal Shard Skin" => "crystal shard",
    "Aurora Skin" => "aurora",
    "Inferno Demonlord Skin" => "inferno demonlord",
    "Stormy Skin" => "stormy",
    "Snowglobe Skin" => "snowglobe",
    "Baby Blue Whale Skin" => "baby blue whale",
    "Sea Emperor Skin" => "sea emperor",
];

pub const PET_SKINS: &[CatalogEntry] = catalog![
    "Black Cat Onyx" => "black cat onyx",
    "Black Cat Ivory" => "black cat ivory",
    "Ender Dragon Baby" => "ender dragon baby",
    "Ender Dragon Neon" => "ender dragon neon",
    "Rabbit Aquamarine" => "rabbit aquamarine",
    "Rabbit Rose" => "rabbit rose",
    "Wolf Dark Wolf" => "wolf dark wolf",
    "Tiger Twilight" => "tiger twilight",
    "Elephant Pink" => "elephant pink",
    "Elephant Orange" => "elephant orange",
    "Whale Orca" => "whale orca",
    "Parrot Gold Macaw" => "parrot gold macaw",
    "Sheep Neon Red" => "sheep neon red",
    "Sheep Neon Blue" => "sheep neon blue",
    "Monkey Gorilla" => "monkey gorilla",
    "Dolphin Snubfin" => "dolphin snubfin",
];

pub const PET_ITEMS: &[CatalogEntry] = catalog![
    "Tier Boost" => "tier_boost",
    "Exp Share" => "exp_share",
    "Lucky Clover" => "lucky_clover",
    "Textbook" => "textbook",
    "Dwarf Turtle Shelmet" => "dwarf_turtle_shelmet",
    "Minos Relic" => "minos_relic",
    "Quick Claw" => "quick_claw",
    "Reinforced Scales" => "reinforced_scales",
    "Hardened Scales" => "hardened_scales",
    "Bubblegum" => "bubblegum",
    "Crochet Tiger Plushie" => "crochet_tiger_plushie",
    "Antique Remedies" => "antique_remedies",
    "Sharpened Claws" => "sharpened_claws",
    "Iron Claws" => "iron_claws",
    "Big Teeth" => "big_teeth",
    "Serrated Claws" => "serrated_claws",
    "Washed Up Souvenir" => "washed_up_souvenir",
    "Flying Pig" => "flying_pig",
    "Yellow Bandana" => "yellow_bandana",
    "All Skills Exp Boost" => "all_skills_exp_boost",
];

/// Case-insensitive substring filter over a catalog.
pub fn filter<'a>(
    catalog: &'a [CatalogEntry],
    query: &str,
    limit: usize,
) -> Vec<&'a CatalogEntry> {
    let needle = query.trim().to_lowercase();
    catalog
        .iter()
        .filter(|e| needle.is_empty() || e.label.to_lowercase().contains(&needle) || e.key.contains(&needle))
        .take(limit)
        .collect()
}
