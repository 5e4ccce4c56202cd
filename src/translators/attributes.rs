//! Leaf translators: one XML attribute value <-> one model value.
//!
//! Every function here is total over its input; values that do not parse yield `None`
//! and the owning translator decides whether to keep the raw value, drop it or default it.

use serde_json::{Map, Number, Value};

use crate::docx::xml::XmlNode;
use crate::units::{
    emu_to_pixels, format_number, half_points_to_points, pixels_to_emu, pixels_to_twips,
    points_to_half_points, twips_to_pixels,
};

#[derive(Clone, Copy, Debug)]
pub struct AttrTranslator {
    pub xml_name: &'static str,
    pub sd_name: &'static str,
    pub encode: fn(&str) -> Option<Value>,
    pub decode: fn(&Value) -> Option<String>,
}

impl AttrTranslator {
    pub const fn new(
        xml_name: &'static str,
        sd_name: &'static str,
        encode: fn(&str) -> Option<Value>,
        decode: fn(&Value) -> Option<String>,
    ) -> Self {
        Self {
            xml_name,
            sd_name,
            encode,
            decode,
        }
    }
}

/// OOXML boolean vocabulary. Anything outside it is `None`; callers treat the presence of
/// the owning element as `true`.
pub fn encode_bool(value: &str) -> Option<Value> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Some(Value::Bool(true)),
        "false" | "0" | "off" => Some(Value::Bool(false)),
        _ => None,
    }
}

/// `"0"` for an explicit false; no attribute otherwise.
pub fn decode_bool(value: &Value) -> Option<String> {
    match value {
        Value::Bool(false) => Some("0".to_string()),
        _ => None,
    }
}

pub fn encode_string(value: &str) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

pub fn decode_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn encode_integer(value: &str) -> Option<Value> {
    value.trim().parse::<i64>().ok().map(|n| Value::Number(n.into()))
}

pub fn decode_integer(value: &Value) -> Option<String> {
    value_to_f64(value).map(|n| format!("{}", n.round() as i64))
}

pub fn encode_twips_to_px(value: &str) -> Option<Value> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|t| number(twips_to_pixels(t)))
}

pub fn decode_px_to_twips(value: &Value) -> Option<String> {
    value_to_f64(value).map(|px| pixels_to_twips(px).to_string())
}

pub fn encode_emu_to_px(value: &str) -> Option<Value> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|e| number(emu_to_pixels(e)))
}

pub fn decode_px_to_emu(value: &Value) -> Option<String> {
    value_to_f64(value).map(|px| pixels_to_emu(px).to_string())
}

/// `w:sz` half-points <-> `"11pt"`.
pub fn encode_half_points(value: &str) -> Option<Value> {
    let hp = value.trim().parse::<f64>().ok()?;
    Some(Value::String(format!(
        "{}pt",
        format_number(half_points_to_points(hp))
    )))
}

pub fn decode_half_points(value: &Value) -> Option<String> {
    let pt = match value {
        Value::String(s) => crate::units::parse_points(s)?,
        other => value_to_f64(other)?,
    };
    Some(points_to_half_points(pt).to_string())
}

/// `"FF0000"` <-> `"#FF0000"`; `auto` is kept as is.
pub fn encode_hex_color(value: &str) -> Option<Value> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("auto") {
        return Some(Value::String("auto".to_string()));
    }
    if v.len() == 6 && v.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(Value::String(format!("#{}", v.to_ascii_uppercase())));
    }
    None
}

pub fn decode_hex_color(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    if s.eq_ignore_ascii_case("auto") {
        return Some("auto".to_string());
    }
    let hex = s.strip_prefix('#').unwrap_or(s);
    (hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())).then(|| hex.to_ascii_uppercase())
}

fn number(n: f64) -> Option<Value> {
    Number::from_f64(n).map(|num| {
        if n.fract() == 0.0 && n.abs() < 1e15 {
            Value::Number((n as i64).into())
        } else {
            Value::Number(num)
        }
    })
}

/// Whole numbers become JSON integers so they compare equal to integer literals.
pub fn number_value(n: f64) -> Value {
    number(n).unwrap_or(Value::Null)
}

pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

pub const VAL_BOOL: AttrTranslator = AttrTranslator::new("w:val", "value", encode_bool, decode_bool);
pub const VAL_STRING: AttrTranslator =
    AttrTranslator::new("w:val", "value", encode_string, decode_string);
pub const VAL_INTEGER: AttrTranslator =
    AttrTranslator::new("w:val", "value", encode_integer, decode_integer);
pub const VAL_HALF_POINTS: AttrTranslator =
    AttrTranslator::new("w:val", "value", encode_half_points, decode_half_points);
pub const VAL_COLOR: AttrTranslator =
    AttrTranslator::new("w:val", "value", encode_hex_color, decode_hex_color);

/// Encodes every attribute of `node` that `table` knows into a map keyed by `sd_name`.
pub fn encode_attributes(node: &XmlNode, table: &[AttrTranslator]) -> Map<String, Value> {
    let mut out = Map::new();
    for t in table {
        if let Some(raw) = node.attr(t.xml_name) {
            if let Some(v) = (t.encode)(raw) {
                out.insert(t.sd_name.to_string(), v);
            }
        }
    }
    out
}

/// Inverse of [`encode_attributes`], in table order.
pub fn decode_attributes(attrs: &Map<String, Value>, table: &[AttrTranslator]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for t in table {
        if let Some(v) = attrs.get(t.sd_name).filter(|v| !v.is_null()) {
            if let Some(s) = (t.decode)(v) {
                out.push((t.xml_name.to_string(), s));
            }
        }
    }
    out
}

/// Attributes of `node` not owned by `table` and not in the no-op allowlist.
pub fn unowned_attributes(node: &XmlNode, table: &[AttrTranslator]) -> Vec<(String, String)> {
    node.attributes
        .iter()
        .filter(|(k, _)| !table.iter().any(|t| t.xml_name == k) && !is_noop_attribute(k))
        .cloned()
        .collect()
}

/// Revision-save ids carry no content and are regenerated by word processors.
pub fn is_noop_attribute(name: &str) -> bool {
    name.starts_with("w:rsid")
}

pub fn attributes_to_value(attrs: &[(String, String)]) -> Value {
    Value::Object(
        attrs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

pub fn value_to_attributes(value: Option<&Value>) -> Vec<(String, String)> {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}
