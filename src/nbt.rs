//! Decoder for the upstream binary attribute payload.
//!
//! The feed ships item attributes as base64 over (usually) gzip over an NBT
//! compound. The tree is decoded into a loose `serde_json::Value` so downstream
//! readers can probe it the same way the upstream JSON is probed. Every reader
//! here tolerates missing keys, unexpected types, and `{type, value}`-wrapped
//! nodes left over from other encoders of the same format.

use std::io::Read;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::GzDecoder;
use serde_json::{Map, Value};

/// NBT trees are finite by construction; the cap guards against a hostile
/// payload nesting deep enough to blow the stack, standing in for a visited set.
const MAX_DEPTH: u32 = 64;

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_SHORT: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_LONG: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_BYTE_ARRAY: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;
const TAG_INT_ARRAY: u8 = 11;
const TAG_LONG_ARRAY: u8 = 12;

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        if end > self.bytes.len() {
            return None;
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn i16(&mut self) -> Option<i16> {
        self.take(2).map(|b| i16::from_be_bytes([b[0], b[1]]))
    }

    fn i32(&mut self) -> Option<i32> {
        self.take(4).map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Option<i64> {
        self.take(8)
            .map(|b| i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    fn f32(&mut self) -> Option<f32> {
        self.i32().map(|v| f32::from_bits(v as u32))
    }

    fn f64(&mut self) -> Option<f64> {
        self.i64().map(|v| f64::from_bits(v as u64))
    }

    fn string(&mut self) -> Option<String> {
        let len = self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))? as usize;
        let raw = self.take(len)?;
        Some(String::from_utf8_lossy(raw).into_owned())
    }
}

fn number_f64(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

fn read_payload(r: &mut Reader<'_>, tag: u8, depth: u32) -> Option<Value> {
    if depth > MAX_DEPTH {
        return None;
    }
    match tag {
        TAG_BYTE => Some(Value::from(r.u8()? as i8 as i64)),
        TAG_SHORT => Some(Value::from(r.i16()? as i64)),
        TAG_INT => Some(Value::from(r.i32()? as i64)),
        TAG_LONG => Some(Value::from(r.i64()?)),
        TAG_FLOAT => Some(number_f64(r.f32()? as f64)),
        TAG_DOUBLE => Some(number_f64(r.f64()?)),
        TAG_BYTE_ARRAY => {
            let len = r.i32()?.max(0) as usize;
            let raw = r.take(len)?;
            Some(Value::Array(raw.iter().map(|b| Value::from(*b as i8 as i64)).collect()))
        }
        TAG_STRING => Some(Value::String(r.string()?)),
        TAG_LIST => {
            let elem_tag = r.u8()?;
            let len = r.i32()?.max(0) as usize;
            let mut items = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                if elem_tag == TAG_END {
                    items.push(Value::Null);
                } else {
                    items.push(read_payload(r, elem_tag, depth + 1)?);
                }
            }
            Some(Value::Array(items))
        }
        TAG_COMPOUND => {
            let mut map = Map::new();
            loop {
                let child_tag = r.u8()?;
                if child_tag == TAG_END {
                    break;
                }
                let name = r.string()?;
                let value = read_payload(r, child_tag, depth + 1)?;
                map.insert(name, value);
            }
            Some(Value::Object(map))
        }
        TAG_INT_ARRAY => {
            let len = r.i32()?.max(0) as usize;
            let mut items = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                items.push(Value::from(r.i32()? as i64));
            }
            Some(Value::Array(items))
        }
        TAG_LONG_ARRAY => {
            let len = r.i32()?.max(0) as usize;
            let mut items = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                items.push(Value::from(r.i64()?));
            }
            Some(Value::Array(items))
        }
        _ => None,
    }
}

/// Parse a raw NBT byte stream. The stream opens with a (usually unnamed)
/// compound tag; its payload becomes the root object.
fn parse_nbt(bytes: &[u8]) -> Option<Value> {
    let mut r = Reader::new(bytes);
    let tag = r.u8()?;
    if tag == TAG_END {
        return Some(Value::Object(Map::new()));
    }
    let _root_name = r.string()?;
    read_payload(&mut r, tag, 0)
}

/// Depth-first search for the first node carrying an `ExtraAttributes` child,
/// either directly or under a `tag` wrapper.
fn find_extra_attributes(root: &Value, depth: u32) -> Option<&Value> {
    if depth > MAX_DEPTH {
        return None;
    }
    match root {
        Value::Object(map) => {
            if let Some(extra) = map.get("ExtraAttributes") {
                return Some(extra);
            }
            if let Some(Value::Object(tag)) = map.get("tag") {
                if let Some(extra) = tag.get("ExtraAttributes") {
                    return Some(extra);
                }
            }
            map.values().find_map(|v| find_extra_attributes(v, depth + 1))
        }
        Value::Array(items) => items.iter().find_map(|v| find_extra_attributes(v, depth + 1)),
        _ => None,
    }
}

/// Full pipeline for the payload column: base64 decode, optional gzip, NBT
/// parse, ExtraAttributes lookup. Any failure yields `Value::Null`.
pub fn decode_extra_attributes(item_bytes: &str) -> Value {
    let trimmed = item_bytes.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    let raw = match BASE64.decode(trimmed) {
        Ok(b) => b,
        Err(_) => return Value::Null,
    };

    let mut inflated = Vec::new();
    let payload: &[u8] = match GzDecoder::new(raw.as_slice()).read_to_end(&mut inflated) {
        Ok(_) => &inflated,
        Err(_) => &raw,
    };

    let Some(root) = parse_nbt(payload) else {
        return Value::Null;
    };
    find_extra_attributes(&root, 0).cloned().unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Loose readers — shared by every consumer of the attribute tree
// ---------------------------------------------------------------------------

/// Strip a `{type, value}` wrapper if present. Other encoders of this format
/// wrap every interior node this way; readers must accept both shapes.
pub fn unwrap(v: &Value) -> &Value {
    if let Value::Object(map) = v {
        if map.contains_key("type") && map.contains_key("value") {
            return unwrap(&map["value"]);
        }
    }
    v
}

pub fn get<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    match unwrap(v) {
        Value::Object(map) => map.get(key).map(unwrap),
        _ => None,
    }
}

pub fn get_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    get(v, key).and_then(Value::as_str)
}

/// Integer read tolerant of floats and numeric strings.
pub fn get_i64(v: &Value, key: &str) -> Option<i64> {
    let found = get(v, key)?;
    match found {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// All string values reachable under `v` (strings, arrays of strings, nested
/// objects), used for scroll-set gathering.
pub fn collect_strings(v: &Value, out: &mut Vec<String>) {
    match unwrap(v) {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                collect_strings(child, out);
            }
        }
        _ => {}
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bad_base64_is_null() {
        assert_eq!(decode_extra_attributes("%%% not base64 %%%"), Value::Null);
        assert_eq!(decode_extra_attributes(""), Value::Null);
    }

    #[test]
    fn truncated_payload_is_null() {
        // Valid base64, but garbage as both gzip and NBT.
        assert_eq!(decode_extra_attributes("AAECAwQ="), Value::Null);
    }

    #[test]
    fn round_trips_extra_attributes() {
        let encoded = test_support::encode_item_bytes(json!({
            "enchantments": { "sharpness": 7_i64, "growth": 6_i64 },
            "dungeon_item_level": 5_i64,
        }));
        let extra = decode_extra_attributes(&encoded);
        assert_eq!(get_i64(&extra, "dungeon_item_level"), Some(5));
        let ench = get(&extra, "enchantments").unwrap();
        assert_eq!(get_i64(ench, "sharpness"), Some(7));
    }

    #[test]
    fn unwrap_tolerates_type_value_wrapping() {
        let wrapped = json!({ "type": "compound", "value": { "upgrade_level": 3_i64 } });
        assert_eq!(get_i64(&wrapped, "upgrade_level"), Some(3));
    }

    #[test]
    fn get_i64_tolerates_strings_and_floats() {
        let v = json!({ "a": "42", "b": 6.9_f64 });
        assert_eq!(get_i64(&v, "a"), Some(42));
        assert_eq!(get_i64(&v, "b"), Some(6));
        assert_eq!(get_i64(&v, "missing"), None);
    }

    #[test]
    fn collect_strings_walks_arrays_and_objects() {
        let v = json!({
            "ability_scroll": ["IMPLOSION_SCROLL", "WITHER_SHIELD_SCROLL"],
            "nested": { "scroll": "SHADOW_WARP_SCROLL" },
        });
        let mut out = Vec::new();
        collect_strings(&v, &mut out);
        out.sort();
        assert_eq!(
            out,
            vec!["IMPLOSION_SCROLL", "SHADOW_WARP_SCROLL", "WITHER_SHIELD_SCROLL"]
        );
    }
}
