//! `w:rPr` <-> formatting marks.

use serde_json::{Map, Value};

use crate::docx::xml::XmlNode;
use crate::model::{mark_types, Mark};
use crate::translators::attributes::{VAL_BOOL, VAL_COLOR, VAL_HALF_POINTS, VAL_STRING};
use crate::translators::passthrough::{consumed_by_parent, not_decodable};
use crate::translators::properties::{
    decode_properties, decode_toggle, decode_val, encode_properties, encode_toggle, encode_val,
    PropertyTranslator,
};
use crate::translators::{NodeTranslator, TranslatorKind};

pub static RUN_PROPERTIES: NodeTranslator = NodeTranslator {
    xml_name: Some("w:rPr"),
    sd_names: &[],
    kind: TranslatorKind::Attribute,
    attributes: &[],
    encode: consumed_by_parent,
    decode: not_decodable,
};

/// Child order of `CT_RPr`.
pub const RPR_ORDER: &[&str] = &[
    "w:rStyle", "w:rFonts", "w:b", "w:bCs", "w:i", "w:iCs", "w:caps", "w:smallCaps",
    "w:strike", "w:dstrike", "w:outline", "w:shadow", "w:emboss", "w:imprint", "w:noProof",
    "w:snapToGrid", "w:vanish", "w:webHidden", "w:color", "w:spacing", "w:w", "w:kern",
    "w:position", "w:sz", "w:szCs", "w:highlight", "w:u", "w:effect", "w:bdr", "w:shd",
    "w:fitText", "w:vertAlign", "w:rtl", "w:cs", "w:em", "w:lang", "w:eastAsianLayout",
    "w:specVanish", "w:oMath", "w:rPrChange",
];

fn encode_fonts(_t: &PropertyTranslator, node: &XmlNode) -> Option<Value> {
    ["w:ascii", "w:hAnsi", "w:cs", "w:eastAsia"]
        .iter()
        .find_map(|a| node.attr(a))
        .map(|f| Value::String(f.to_string()))
}

fn decode_fonts(_t: &PropertyTranslator, value: &Value, original: Option<&XmlNode>) -> Option<XmlNode> {
    let font = value.as_str()?;
    let mut node = original
        .cloned()
        .unwrap_or_else(|| XmlNode::element("w:rFonts"));
    // Theme fonts win over explicit names, so they go when the name is set.
    for theme in ["w:asciiTheme", "w:hAnsiTheme", "w:cstheme", "w:eastAsiaTheme"] {
        node.remove_attr(theme);
    }
    node.set_attr("w:ascii", font);
    node.set_attr("w:hAnsi", font);
    if original.is_none() {
        node.set_attr("w:cs", font);
    }
    Some(node)
}

pub static RUN_PROPERTY_TABLE: &[PropertyTranslator] = &[
    PropertyTranslator {
        xml_name: "w:rStyle",
        sd_name: "styleId",
        attributes: &[VAL_STRING],
        encode: encode_val,
        decode: decode_val,
    },
    PropertyTranslator {
        xml_name: "w:rFonts",
        sd_name: "fontFamily",
        attributes: &[],
        encode: encode_fonts,
        decode: decode_fonts,
    },
    PropertyTranslator {
        xml_name: "w:b",
        sd_name: "bold",
        attributes: &[VAL_BOOL],
        encode: encode_toggle,
        decode: decode_toggle,
    },
    PropertyTranslator {
        xml_name: "w:i",
        sd_name: "italic",
        attributes: &[VAL_BOOL],
        encode: encode_toggle,
        decode: decode_toggle,
    },
    PropertyTranslator {
        xml_name: "w:strike",
        sd_name: "strike",
        attributes: &[VAL_BOOL],
        encode: encode_toggle,
        decode: decode_toggle,
    },
    PropertyTranslator {
        xml_name: "w:color",
        sd_name: "color",
        attributes: &[VAL_COLOR],
        encode: encode_val,
        decode: decode_val,
    },
    PropertyTranslator {
        xml_name: "w:sz",
        sd_name: "fontSize",
        attributes: &[VAL_HALF_POINTS],
        encode: encode_val,
        decode: decode_val,
    },
    PropertyTranslator {
        xml_name: "w:highlight",
        sd_name: "highlight",
        attributes: &[VAL_STRING],
        encode: encode_val,
        decode: decode_val,
    },
    PropertyTranslator {
        xml_name: "w:u",
        sd_name: "underline",
        attributes: &[VAL_STRING],
        encode: encode_val,
        decode: decode_val,
    },
    PropertyTranslator {
        xml_name: "w:vertAlign",
        sd_name: "vertAlign",
        attributes: &[VAL_STRING],
        encode: encode_val,
        decode: decode_val,
    },
];

const TEXT_STYLE_KEYS: &[&str] = &["styleId", "fontFamily", "fontSize", "color", "vertAlign"];
const TOGGLE_MARKS: &[(&str, &str)] = &[
    ("bold", mark_types::BOLD),
    ("italic", mark_types::ITALIC),
    ("strike", mark_types::STRIKE),
];

pub fn encode_run_properties(rpr: Option<&XmlNode>) -> Vec<Mark> {
    rpr.map(|r| marks_from_properties(&encode_properties(r, RUN_PROPERTY_TABLE)))
        .unwrap_or_default()
}

pub fn decode_run_properties(marks: &[Mark], original: Option<&XmlNode>) -> Option<XmlNode> {
    let values = properties_from_marks(marks);
    decode_properties("w:rPr", original, &values, RUN_PROPERTY_TABLE, RPR_ORDER)
}

pub fn marks_from_properties(values: &Map<String, Value>) -> Vec<Mark> {
    let mut marks = Vec::new();
    for (key, mark_type) in TOGGLE_MARKS {
        match values.get(*key) {
            Some(Value::Bool(true)) => marks.push(Mark::new(*mark_type)),
            Some(Value::Bool(false)) => marks.push(Mark::new(*mark_type).with_attr("value", false)),
            _ => {}
        }
    }
    if let Some(u) = values.get("underline").and_then(Value::as_str) {
        marks.push(Mark::new(mark_types::UNDERLINE).with_attr("underlineType", u));
    }
    if let Some(h) = values.get("highlight").and_then(Value::as_str) {
        marks.push(Mark::new(mark_types::HIGHLIGHT).with_attr("color", h));
    }
    let mut text_style = Mark::new(mark_types::TEXT_STYLE);
    for key in TEXT_STYLE_KEYS {
        if let Some(v) = values.get(*key) {
            text_style.attrs.insert((*key).to_string(), v.clone());
        }
    }
    if !text_style.attrs.is_empty() {
        marks.push(text_style);
    }
    marks
}

pub fn properties_from_marks(marks: &[Mark]) -> Map<String, Value> {
    let mut values = Map::new();
    for mark in marks {
        match mark.mark_type.as_str() {
            mark_types::BOLD | mark_types::ITALIC | mark_types::STRIKE => {
                let on = mark.attrs.get("value").and_then(Value::as_bool).unwrap_or(true);
                values.insert(mark.mark_type.clone(), Value::Bool(on));
            }
            mark_types::UNDERLINE => {
                let u = mark.attr_str("underlineType").unwrap_or("single");
                values.insert("underline".into(), Value::String(u.to_string()));
            }
            mark_types::HIGHLIGHT => {
                if let Some(c) = mark.attr_str("color") {
                    values.insert("highlight".into(), Value::String(c.to_string()));
                }
            }
            mark_types::TEXT_STYLE => {
                for key in TEXT_STYLE_KEYS {
                    if let Some(v) = mark.attrs.get(*key).filter(|v| !v.is_null()) {
                        values.insert((*key).to_string(), v.clone());
                    }
                }
            }
            _ => {}
        }
    }
    values
}

/// True for marks that come from `w:rPr` (as opposed to wrappers such as links).
pub fn is_formatting_mark(mark: &Mark) -> bool {
    matches!(
        mark.mark_type.as_str(),
        mark_types::BOLD
            | mark_types::ITALIC
            | mark_types::STRIKE
            | mark_types::UNDERLINE
            | mark_types::HIGHLIGHT
            | mark_types::TEXT_STYLE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::parse_xml_str;

    fn rpr(xml: &str) -> XmlNode {
        parse_xml_str("t", xml).expect("parse").root
    }

    #[test]
    fn modeled_properties_become_marks() {
        let node = rpr(
            r#"<w:rPr><w:rStyle w:val="Hyperlink"/><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri"/><w:b/><w:i w:val="0"/><w:color w:val="0066cc"/><w:sz w:val="24"/><w:u w:val="single"/><w:highlight w:val="yellow"/></w:rPr>"#,
        );
        let marks = encode_run_properties(Some(&node));
        let types: Vec<&str> = marks.iter().map(|m| m.mark_type.as_str()).collect();
        assert_eq!(types, vec!["bold", "italic", "underline", "highlight", "textStyle"]);
        let ts = &marks[4];
        assert_eq!(ts.attr_str("fontFamily"), Some("Calibri"));
        assert_eq!(ts.attr_str("fontSize"), Some("12pt"));
        assert_eq!(ts.attr_str("color"), Some("#0066CC"));
        assert_eq!(ts.attr_str("styleId"), Some("Hyperlink"));
        assert_eq!(marks[1].attrs.get("value"), Some(&Value::Bool(false)));
    }

    #[test]
    fn unchanged_rpr_roundtrips_exactly() {
        let node = rpr(
            r#"<w:rPr><w:rFonts w:ascii="Arial" w:eastAsia="SimSun"/><w:b/><w:noProof/><w:sz w:val="22"/><w:lang w:val="en-GB"/></w:rPr>"#,
        );
        let marks = encode_run_properties(Some(&node));
        assert_eq!(decode_run_properties(&marks, Some(&node)), Some(node));
    }

    #[test]
    fn edited_marks_rebuild_in_schema_order() {
        let node = rpr(r#"<w:rPr><w:lang w:val="en-US"/></w:rPr>"#);
        let marks = vec![
            Mark::new(mark_types::UNDERLINE).with_attr("underlineType", "double"),
            Mark::new(mark_types::BOLD),
        ];
        let out = decode_run_properties(&marks, Some(&node)).expect("rPr");
        let names: Vec<&str> = out.elements.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["w:b", "w:u", "w:lang"]);
        assert_eq!(out.child_val("w:u"), Some("double"));
    }

    #[test]
    fn no_marks_and_no_original_means_no_rpr() {
        assert_eq!(decode_run_properties(&[], None), None);
        let link_only = [Mark::new(mark_types::LINK).with_attr("href", "https://x.y")];
        assert_eq!(decode_run_properties(&link_only, None), None);
    }
}
