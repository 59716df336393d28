//! Text normalization for item names and display text.
//!
//! Upstream names arrive decorated: legacy color escapes, star glyphs,
//! circled/fullwidth digits, reforge prefixes, pet-level brackets. Everything
//! price-relevant keys off the canonical forms produced here.

use unicode_normalization::UnicodeNormalization;

/// Star-like glyphs used for dungeon/master star display and pet decorations.
pub const STAR_CHARS: &[char] = &[
    '✪', '★', '☆', '✯', '✰', '●', '⬤', '○', '◉', '◎', '◍',
];

pub fn is_star_char(c: char) -> bool {
    STAR_CHARS.contains(&c)
}

/// Leading words that modify stats but not item identity. Up to two are
/// stripped from the front of a name during canonicalization.
pub const REFORGE_PREFIXES: &[&str] = &[
    "ancient", "auspicious", "awkward", "bizarre", "blazing", "blessed", "blood",
    "bloody", "blooming", "bountiful", "bulky", "bustling", "candied", "clean",
    "coldfused", "cubic", "deadly", "demonic", "dimensional", "dirty", "double",
    "bit", "epic", "excellent", "fabled", "fair", "fanged", "fast", "festive",
    "fierce", "fine", "fleet", "forceful", "fortified", "fruitful", "fuming",
    "gentle", "giant", "gilded", "glistening", "godly", "grand", "hasty",
    "headstrong", "heavy", "heroic", "hurtful", "hyper", "itchy", "jaded",
    "keen", "legendary", "light", "loving", "lucky", "lush", "magnetic",
    "mithraic", "moil", "mossy", "mythic", "neat", "necrotic", "odd", "ominous",
    "perfect", "pleasant", "precise", "pretty", "pure", "rapid", "refined",
    "renowned", "rich", "ridiculous", "rooted", "royal", "salty", "shaded",
    "sharp", "shiny", "silky", "simple", "smart", "snowy", "soaked", "spicy",
    "spiked", "spiritual", "stellar", "stiff", "strange", "strengthened",
    "strong", "sturdy", "submerged", "superior", "suspicious", "sweet",
    "titanic", "toil", "treacherous", "undead", "unpleasant", "unreal", "vivid",
    "warped", "waxed", "wise", "withered", "zealous",
];

/// Strip legacy color escapes: a paragraph sign followed by one code character.
pub fn strip_color_codes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\u{00A7}' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Display-text cleanup: color escapes out, compatibility folding, curly
/// apostrophes straightened, everything but letters/digits/whitespace/apostrophe
/// dropped, whitespace collapsed.
pub fn clean_text(input: &str) -> String {
    let stripped = strip_color_codes(input);
    let mut out = String::with_capacity(stripped.len());
    for c in stripped.nfkc() {
        let c = match c {
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        };
        if c.is_alphanumeric() || c.is_whitespace() || c == '\'' {
            out.push(c);
        }
    }
    collapse_whitespace(&out)
}

/// Lookup-key form: lowercased, apostrophes removed, hyphens and underscores
/// become spaces, remaining punctuation dropped, whitespace collapsed.
pub fn norm_key(input: &str) -> String {
    let stripped = strip_color_codes(input);
    let mut out = String::with_capacity(stripped.len());
    for c in stripped.nfkc().flat_map(char::to_lowercase) {
        match c {
            '\u{2018}' | '\u{2019}' | '\'' => {}
            '-' | '_' => out.push(' '),
            c if c.is_alphanumeric() || c.is_whitespace() => out.push(c),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

const ASCII_DIGITS: [&str; 11] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10"];

/// ASCII equivalent for circled, fullwidth, dingbat-circled, negative-circled,
/// superscript, and subscript digits. The three circled 1–10 families map ➓-style
/// glyphs to the two-character "10".
fn weird_digit(c: char) -> Option<&'static str> {
    let idx = match c {
        '⓪' => 0,
        '①'..='⑨' => (c as u32 - '①' as u32 + 1) as usize,
        '０'..='９' => (c as u32 - '０' as u32) as usize,
        '➊'..='➓' => (c as u32 - '➊' as u32 + 1) as usize,
        '❶'..='❿' => (c as u32 - '❶' as u32 + 1) as usize,
        '⓵'..='⓾' => (c as u32 - '⓵' as u32 + 1) as usize,
        '⁰' => 0,
        '¹' => 1,
        '²' => 2,
        '³' => 3,
        '⁴'..='⁹' => (c as u32 - '⁴' as u32 + 4) as usize,
        '₀'..='₉' => (c as u32 - '₀' as u32) as usize,
        _ => return None,
    };
    Some(ASCII_DIGITS[idx])
}

/// Replace every enumerated digit code-point with its ASCII form.
pub fn normalize_weird_digits(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match weird_digit(c) {
            Some(d) => out.push_str(d),
            None => out.push(c),
        }
    }
    out
}

/// True when a name carries star glyphs or non-ASCII digit glyphs — such
/// names encode star levels worth fingerprinting even without a payload.
pub fn has_star_or_weird_digit(input: &str) -> bool {
    input.chars().any(|c| is_star_char(c) || weird_digit(c).is_some())
}

fn drop_enclosed_runs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut paren_depth = 0u32;
    let mut bracket_depth = 0u32;
    for c in input.chars() {
        match c {
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.saturating_sub(1),
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            _ if paren_depth == 0 && bracket_depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn split_letter_digit_boundaries(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut prev: Option<char> = None;
    for c in input.chars() {
        if let Some(p) = prev {
            let boundary = (p.is_alphabetic() && c.is_ascii_digit())
                || (p.is_ascii_digit() && c.is_alphabetic());
            if boundary {
                out.push(' ');
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Stable identity for grouping listings of the same base item: survives
/// reforge prefixes, star glyphs, pet-level prefixes, and variant digits
/// glued onto words. Idempotent.
pub fn canonical_item_key(input: &str) -> String {
    let s = normalize_weird_digits(input);
    let s = strip_color_codes(&s);
    let s: String = s.chars().filter(|c| !is_star_char(*c)).collect();
    let s = drop_enclosed_runs(&s);
    let s = split_letter_digit_boundaries(&s);
    let normalized = norm_key(&s);

    let mut tokens: Vec<&str> = normalized.split_whitespace().collect();

    // Leading "lvl 100" / "lv 7" / "level 42" pair is a pet-level prefix.
    if tokens.len() >= 2
        && matches!(tokens[0], "lvl" | "lv" | "level")
        && tokens[1].chars().all(|c| c.is_ascii_digit())
    {
        tokens.drain(0..2);
    }

    for _ in 0..2 {
        if tokens.len() >= 2 && REFORGE_PREFIXES.contains(&tokens[0]) {
            tokens.remove(0);
        } else {
            break;
        }
    }

    // Trailing variant digits ("Shortbow3", "Shortbow 3") don't change identity.
    while tokens.len() >= 2
        && tokens
            .last()
            .is_some_and(|t| t.chars().all(|c| c.is_ascii_digit()))
    {
        tokens.pop();
    }

    tokens.join(" ")
}
