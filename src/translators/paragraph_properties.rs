use serde_json::{Map, Value};

use crate::docx::xml::XmlNode;
use crate::model::Attrs;
use crate::translators::attributes::{
    decode_bool, decode_integer, decode_px_to_twips, decode_string, encode_bool, encode_integer,
    encode_string, encode_twips_to_px, value_to_f64, AttrTranslator, VAL_BOOL, VAL_STRING,
};
use crate::translators::passthrough::{consumed_by_parent, not_decodable};
use crate::translators::properties::{
    decode_object, decode_properties, decode_toggle, decode_val, encode_object, encode_properties,
    encode_toggle, encode_val, PropertyTranslator,
};
use crate::translators::{NodeTranslator, TranslatorKind};

pub static PARAGRAPH_PROPERTIES: NodeTranslator = NodeTranslator {
    xml_name: Some("w:pPr"),
    sd_names: &[],
    kind: TranslatorKind::Attribute,
    attributes: &[],
    encode: consumed_by_parent,
    decode: not_decodable,
};

/// Child order of `CT_PPr`.
pub const PPR_ORDER: &[&str] = &[
    "w:pStyle", "w:keepNext", "w:keepLines", "w:pageBreakBefore", "w:framePr",
    "w:widowControl", "w:numPr", "w:suppressLineNumbers", "w:pBdr", "w:shd", "w:tabs",
    "w:suppressAutoHyphens", "w:kinsoku", "w:wordWrap", "w:overflowPunct", "w:topLinePunct",
    "w:autoSpaceDE", "w:autoSpaceDN", "w:bidi", "w:adjustRightInd", "w:snapToGrid",
    "w:spacing", "w:ind", "w:contextualSpacing", "w:mirrorIndents", "w:suppressOverlap",
    "w:jc", "w:textDirection", "w:textAlignment", "w:textboxTightWrap", "w:outlineLvl",
    "w:divId", "w:cnfStyle", "w:rPr", "w:sectPr", "w:pPrChange",
];

const SPACING_ATTRS: &[AttrTranslator] = &[
    AttrTranslator::new("w:before", "before", encode_twips_to_px, decode_px_to_twips),
    AttrTranslator::new("w:after", "after", encode_twips_to_px, decode_px_to_twips),
    AttrTranslator::new("w:line", "line", encode_integer, decode_integer),
    AttrTranslator::new("w:lineRule", "lineRule", encode_string, decode_string),
    AttrTranslator::new("w:beforeAutospacing", "beforeAutospacing", encode_bool, decode_autospacing),
    AttrTranslator::new("w:afterAutospacing", "afterAutospacing", encode_bool, decode_autospacing),
];

const INDENT_ATTRS: &[AttrTranslator] = &[
    AttrTranslator::new("w:left", "left", encode_twips_to_px, decode_px_to_twips),
    AttrTranslator::new("w:right", "right", encode_twips_to_px, decode_px_to_twips),
    AttrTranslator::new("w:firstLine", "firstLine", encode_twips_to_px, decode_px_to_twips),
    AttrTranslator::new("w:hanging", "hanging", encode_twips_to_px, decode_px_to_twips),
];

// Autospacing flags are plain on/off attributes, not on-by-presence elements.
fn decode_autospacing(value: &Value) -> Option<String> {
    match value {
        Value::Bool(true) => Some("1".to_string()),
        other => decode_bool(other),
    }
}

fn encode_numbering(_t: &PropertyTranslator, node: &XmlNode) -> Option<Value> {
    let mut map = Map::new();
    if let Some(id) = node.child_val("w:numId").and_then(|v| v.trim().parse::<i64>().ok()) {
        map.insert("numId".into(), id.into());
    }
    if let Some(lvl) = node.child_val("w:ilvl").and_then(|v| v.trim().parse::<i64>().ok()) {
        map.insert("ilvl".into(), lvl.into());
    }
    (!map.is_empty()).then_some(Value::Object(map))
}

fn decode_numbering(_t: &PropertyTranslator, value: &Value, _original: Option<&XmlNode>) -> Option<XmlNode> {
    let map = value.as_object()?;
    let num_id = map.get("numId").and_then(value_to_f64)? as i64;
    let ilvl = map.get("ilvl").and_then(value_to_f64).unwrap_or(0.0) as i64;
    Some(
        XmlNode::element("w:numPr")
            .with_child(XmlNode::element("w:ilvl").with_attr("w:val", ilvl.to_string()))
            .with_child(XmlNode::element("w:numId").with_attr("w:val", num_id.to_string())),
    )
}

fn encode_alignment(_t: &PropertyTranslator, node: &XmlNode) -> Option<Value> {
    let align = match node.val()? {
        "both" | "distribute" => "justify",
        "start" | "left" => "left",
        "end" | "right" => "right",
        "center" => "center",
        _ => return None,
    };
    Some(Value::String(align.to_string()))
}

fn decode_alignment(_t: &PropertyTranslator, value: &Value, _original: Option<&XmlNode>) -> Option<XmlNode> {
    let jc = match value.as_str()? {
        "justify" => "both",
        "left" => "left",
        "right" => "right",
        "center" => "center",
        _ => return None,
    };
    Some(XmlNode::element("w:jc").with_attr("w:val", jc))
}

pub static PARAGRAPH_PROPERTY_TABLE: &[PropertyTranslator] = &[
    PropertyTranslator {
        xml_name: "w:pStyle",
        sd_name: "styleId",
        attributes: &[VAL_STRING],
        encode: encode_val,
        decode: decode_val,
    },
    PropertyTranslator {
        xml_name: "w:keepNext",
        sd_name: "keepNext",
        attributes: &[VAL_BOOL],
        encode: encode_toggle,
        decode: decode_toggle,
    },
    PropertyTranslator {
        xml_name: "w:keepLines",
        sd_name: "keepLines",
        attributes: &[VAL_BOOL],
        encode: encode_toggle,
        decode: decode_toggle,
    },
    PropertyTranslator {
        xml_name: "w:pageBreakBefore",
        sd_name: "pageBreakBefore",
        attributes: &[VAL_BOOL],
        encode: encode_toggle,
        decode: decode_toggle,
    },
    PropertyTranslator {
        xml_name: "w:numPr",
        sd_name: "numberingProperties",
        attributes: &[],
        encode: encode_numbering,
        decode: decode_numbering,
    },
    PropertyTranslator {
        xml_name: "w:spacing",
        sd_name: "spacing",
        attributes: SPACING_ATTRS,
        encode: encode_object,
        decode: decode_object,
    },
    PropertyTranslator {
        xml_name: "w:ind",
        sd_name: "indent",
        attributes: INDENT_ATTRS,
        encode: encode_object,
        decode: decode_object,
    },
    PropertyTranslator {
        xml_name: "w:jc",
        sd_name: "textAlign",
        attributes: &[],
        encode: encode_alignment,
        decode: decode_alignment,
    },
];

pub fn encode_paragraph_properties(ppr: &XmlNode) -> Map<String, Value> {
    encode_properties(ppr, PARAGRAPH_PROPERTY_TABLE)
}

/// Rebuilds `w:pPr` from the modeled keys of `attrs` on top of `original`.
pub fn decode_paragraph_properties(attrs: &Attrs, original: Option<&XmlNode>) -> Option<XmlNode> {
    decode_properties("w:pPr", original, attrs, PARAGRAPH_PROPERTY_TABLE, PPR_ORDER)
}

pub fn modeled_keys() -> impl Iterator<Item = &'static str> {
    PARAGRAPH_PROPERTY_TABLE.iter().map(|t| t.sd_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::parse_xml_str;
    use serde_json::json;

    fn ppr(xml: &str) -> XmlNode {
        parse_xml_str("t", xml).expect("parse").root
    }

    #[test]
    fn modeled_properties() {
        let node = ppr(
            r#"<w:pPr><w:pStyle w:val="ListParagraph"/><w:keepNext/><w:numPr><w:ilvl w:val="1"/><w:numId w:val="7"/></w:numPr><w:spacing w:before="240" w:after="120" w:line="276" w:lineRule="auto"/><w:ind w:left="720" w:hanging="360"/><w:jc w:val="both"/></w:pPr>"#,
        );
        let attrs = encode_paragraph_properties(&node);
        assert_eq!(attrs.get("styleId"), Some(&json!("ListParagraph")));
        assert_eq!(attrs.get("keepNext"), Some(&json!(true)));
        assert_eq!(attrs.get("numberingProperties"), Some(&json!({"numId": 7, "ilvl": 1})));
        assert_eq!(
            attrs.get("spacing"),
            Some(&json!({"before": 16, "after": 8, "line": 276, "lineRule": "auto"}))
        );
        assert_eq!(attrs.get("indent"), Some(&json!({"left": 48, "hanging": 24})));
        assert_eq!(attrs.get("textAlign"), Some(&json!("justify")));
        assert_eq!(decode_paragraph_properties(&attrs, Some(&node)), Some(node));
    }

    #[test]
    fn changed_spacing_keeps_unmodeled_attributes() {
        let node = ppr(r#"<w:pPr><w:spacing w:before="240" w:beforeLines="100"/></w:pPr>"#);
        let mut attrs = encode_paragraph_properties(&node);
        attrs.insert("spacing".into(), json!({"before": 32}));
        let out = decode_paragraph_properties(&attrs, Some(&node)).expect("pPr");
        let spacing = out.child("w:spacing").expect("spacing");
        assert_eq!(spacing.attr("w:before"), Some("480"));
        assert_eq!(spacing.attr("w:beforeLines"), Some("100"));
    }

    #[test]
    fn numbering_is_written_in_schema_order() {
        let mut attrs = Attrs::new();
        attrs.insert("numberingProperties".into(), json!({"numId": 3, "ilvl": 0}));
        attrs.insert("styleId".into(), json!("ListBullet"));
        let out = decode_paragraph_properties(&attrs, None).expect("pPr");
        let names: Vec<&str> = out.elements.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["w:pStyle", "w:numPr"]);
        let num = out.child("w:numPr").expect("numPr");
        assert_eq!(num.child_val("w:numId"), Some("3"));
        assert_eq!(num.child_val("w:ilvl"), Some("0"));
    }
}
