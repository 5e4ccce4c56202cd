//! Property elements (`w:b`, `w:sz`, `w:spacing`, ...) inside `w:rPr`/`w:pPr`.
//!
//! Each [`PropertyTranslator`] maps one element to one model key. Decoding a property
//! container starts from the imported container so unmodeled children survive, replaces
//! the modeled ones, and re-sorts everything into schema order.

use serde_json::{Map, Value};

use crate::docx::xml::XmlNode;
use crate::translators::attributes::{decode_attributes, encode_attributes, encode_bool, AttrTranslator};
use crate::translators::TranslatorKind;

pub struct PropertyTranslator {
    pub xml_name: &'static str,
    pub sd_name: &'static str,
    pub attributes: &'static [AttrTranslator],
    pub encode: fn(&PropertyTranslator, &XmlNode) -> Option<Value>,
    pub decode: fn(&PropertyTranslator, &Value, Option<&XmlNode>) -> Option<XmlNode>,
}

impl PropertyTranslator {
    pub const fn kind(&self) -> TranslatorKind {
        TranslatorKind::Attribute
    }
}

/// On-by-presence toggle; `w:val` only ever turns it off.
pub fn encode_toggle(_t: &PropertyTranslator, node: &XmlNode) -> Option<Value> {
    match node.val() {
        None => Some(Value::Bool(true)),
        Some(v) => Some(encode_bool(v).unwrap_or(Value::Bool(true))),
    }
}

pub fn decode_toggle(t: &PropertyTranslator, value: &Value, _original: Option<&XmlNode>) -> Option<XmlNode> {
    match value {
        Value::Bool(true) => Some(XmlNode::element(t.xml_name)),
        Value::Bool(false) => Some(XmlNode::element(t.xml_name).with_attr("w:val", "0")),
        _ => None,
    }
}

/// Single `w:val` carried through the first attribute translator.
pub fn encode_val(t: &PropertyTranslator, node: &XmlNode) -> Option<Value> {
    let at = t.attributes.first()?;
    node.attr(at.xml_name).and_then(at.encode)
}

pub fn decode_val(t: &PropertyTranslator, value: &Value, original: Option<&XmlNode>) -> Option<XmlNode> {
    let at = t.attributes.first()?;
    let raw = (at.decode)(value)?;
    let mut node = original
        .cloned()
        .unwrap_or_else(|| XmlNode::element(t.xml_name));
    node.set_attr(at.xml_name, raw);
    Some(node)
}

/// Several attributes folded into one object, e.g. `w:spacing` -> `{before, after}`.
pub fn encode_object(t: &PropertyTranslator, node: &XmlNode) -> Option<Value> {
    let map = encode_attributes(node, t.attributes);
    (!map.is_empty()).then_some(Value::Object(map))
}

pub fn decode_object(t: &PropertyTranslator, value: &Value, original: Option<&XmlNode>) -> Option<XmlNode> {
    let map = value.as_object()?;
    let mut node = original
        .cloned()
        .unwrap_or_else(|| XmlNode::element(t.xml_name));
    for at in t.attributes {
        node.remove_attr(at.xml_name);
    }
    let owned = decode_attributes(map, t.attributes);
    if owned.is_empty() && original.is_none() {
        return None;
    }
    node.attributes.extend(owned);
    Some(node)
}

/// Encodes every modeled child of `container` into a map keyed by model name.
pub fn encode_properties(container: &XmlNode, table: &[PropertyTranslator]) -> Map<String, Value> {
    let mut out = Map::new();
    for t in table {
        if let Some(child) = container.child(t.xml_name) {
            if let Some(v) = (t.encode)(t, child) {
                out.insert(t.sd_name.to_string(), v);
            }
        }
    }
    out
}

/// Rebuilds a property container.
///
/// A modeled child whose value did not change is kept byte-for-byte; a changed one is
/// rebuilt on top of the original element; a removed one is dropped. Returns `None` when
/// the container ends up empty.
pub fn decode_properties(
    container_name: &str,
    original: Option<&XmlNode>,
    values: &Map<String, Value>,
    table: &[PropertyTranslator],
    order: &[&str],
) -> Option<XmlNode> {
    let mut node = original
        .cloned()
        .unwrap_or_else(|| XmlNode::element(container_name));
    node.elements.retain(|c| {
        c.is_element() && !table.iter().any(|t| t.xml_name == c.name)
    });

    for t in table {
        let Some(value) = values.get(t.sd_name).filter(|v| !v.is_null()) else {
            continue;
        };
        let orig_child = original.and_then(|o| o.child(t.xml_name));
        let unchanged = orig_child.and_then(|c| (t.encode)(t, c)).as_ref() == Some(value);
        let child = match orig_child {
            Some(c) if unchanged => Some(c.clone()),
            _ => (t.decode)(t, value, orig_child),
        };
        if let Some(child) = child {
            node.elements.push(child);
        }
    }

    sort_in_schema_order(&mut node.elements, order);
    (!node.elements.is_empty() || !node.attributes.is_empty()).then_some(node)
}

/// Stable sort by position in `order`; unknown names go last, in their original order.
pub fn sort_in_schema_order(children: &mut [XmlNode], order: &[&str]) {
    children.sort_by_key(|c| order.iter().position(|o| *o == c.name).unwrap_or(order.len()));
}

pub fn xml_to_value(node: &XmlNode) -> Value {
    serde_json::to_value(node).unwrap_or(Value::Null)
}

pub fn value_to_xml(value: Option<&Value>) -> Option<XmlNode> {
    value
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value::<XmlNode>(v.clone()).ok())
}
