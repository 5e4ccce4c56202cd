//! Named, optionally locked document sections.
//!
//! The JSON tag carries `{"type":"documentSection","id":..,"title":..,"description":..}`.
//! `w:id` and `w:alias` override the id and title from the tag; the description only
//! lives in the tag.

use serde_json::{Map, Value};

use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::node_list::{decode_nodes, encode_nodes};
use crate::translators::properties::xml_to_value;
use crate::translators::sdt::{original_sdt_pr, set_child_val, tag_json, value_text, wrap_sdt, SDT_PR};
use crate::translators::{DecodeContext, EncodeContext};

pub const SECTION_TAG_TYPE: &str = "documentSection";

const LOCKED_VALUES: &[&str] = &["sdtContentLocked", "contentLocked"];

pub fn matches(sdt_pr: &XmlNode) -> bool {
    match tag_json(sdt_pr) {
        Some(json) => json.get("type").and_then(Value::as_str) == Some(SECTION_TAG_TYPE),
        None => sdt_pr.child_val("w:tag") == Some(SECTION_TAG_TYPE),
    }
}

pub fn encode(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<ModelNode> {
    let sdt_pr = node.child("w:sdtPr")?;
    let content = node.child("w:sdtContent")?;
    let json = tag_json(sdt_pr).unwrap_or_default();
    let from_json = |key: &str| json.get(key).and_then(value_text);

    let mut out = ModelNode::new(node_types::DOCUMENT_SECTION);
    if let Some(id) = sdt_pr.child_val("w:id").map(str::to_string).or_else(|| from_json("id")) {
        out.set_attr("id", id);
    }
    if let Some(title) = sdt_pr.child_val("w:alias").map(str::to_string).or_else(|| from_json("title")) {
        out.set_attr("title", title);
    }
    if let Some(description) = from_json("description") {
        out.set_attr("description", description);
    }
    let locked = sdt_pr
        .child_val("w:lock")
        .is_some_and(|v| LOCKED_VALUES.contains(&v));
    out.set_attr("isLocked", locked);
    out.set_attr(SDT_PR, xml_to_value(sdt_pr));
    out.content = ctx.block_scope(|ctx| encode_nodes(&content.elements, ctx));
    Some(out)
}

fn section_json(node: &ModelNode, base: Map<String, Value>) -> Map<String, Value> {
    let mut json = base;
    json.insert("type".into(), Value::from(SECTION_TAG_TYPE));
    for key in ["id", "title", "description"] {
        match node.attr(key) {
            Some(v) => {
                json.insert(key.into(), v.clone());
            }
            None => {
                json.remove(key);
            }
        }
    }
    json
}

pub fn decode(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let sdt_pr = match original_sdt_pr(node) {
        Some(mut pr) => {
            update_sdt_pr(&mut pr, node);
            pr
        }
        None => {
            let mut pr = XmlNode::element("w:sdtPr");
            if let Some(id) = node.attr("id").and_then(value_text) {
                pr.elements.push(XmlNode::element("w:id").with_attr("w:val", id));
            }
            if let Some(title) = node.attr_str("title") {
                pr.elements.push(XmlNode::element("w:alias").with_attr("w:val", title));
            }
            let tag = Value::Object(section_json(node, Map::new())).to_string();
            pr.elements.push(XmlNode::element("w:tag").with_attr("w:val", tag));
            if node.attr_bool("isLocked") == Some(true) {
                pr.elements.push(XmlNode::element("w:lock").with_attr("w:val", LOCKED_VALUES[0]));
            }
            pr
        }
    };
    let content = decode_nodes(&node.content, ctx);
    Some(vec![wrap_sdt(node, sdt_pr, content)])
}

/// Each value goes back where it was read from: `w:id`/`w:alias` when present, the tag
/// otherwise.
fn update_sdt_pr(pr: &mut XmlNode, node: &ModelNode) {
    let mut tag_keys = vec!["description"];
    for (key, element) in [("id", "w:id"), ("title", "w:alias")] {
        if !pr.has_child(element) {
            tag_keys.push(key);
            continue;
        }
        if let Some(value) = node.attr(key).and_then(value_text) {
            if pr.child_val(element) != Some(value.as_str()) {
                set_child_val(pr, element, &value);
            }
        }
    }
    if let Some(original) = tag_json(pr) {
        let mut updated = original.clone();
        for key in tag_keys {
            match node.attr(key) {
                Some(v) => {
                    updated.insert(key.into(), v.clone());
                }
                None => {
                    updated.remove(key);
                }
            }
        }
        if updated != original {
            set_child_val(pr, "w:tag", &Value::Object(updated).to_string());
        }
    }
    let locked = node.attr_bool("isLocked").unwrap_or(false);
    let was_locked = pr.child_val("w:lock").is_some_and(|v| LOCKED_VALUES.contains(&v));
    if locked != was_locked {
        if locked {
            set_child_val(pr, "w:lock", LOCKED_VALUES[0]);
        } else {
            pr.remove_child("w:lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListMode;
    use crate::docx::relationships::Relationships;
    use crate::docx::xml::{parse_xml_str, write_node_string};
    use crate::numbering::Numbering;
    use crate::translators::HandlerTable;

    const SECTION: &str = r#"<w:sdt><w:sdtPr><w:id w:val="12"/><w:alias w:val="Terms"/><w:tag w:val="{&quot;type&quot;:&quot;documentSection&quot;,&quot;id&quot;:&quot;3&quot;,&quot;title&quot;:&quot;Old&quot;,&quot;description&quot;:&quot;Signed terms&quot;}"/><w:lock w:val="sdtContentLocked"/></w:sdtPr><w:sdtContent><w:p><w:r><w:t>Body</w:t></w:r></w:p></w:sdtContent></w:sdt>"#;

    fn encode_one(xml: &str) -> ModelNode {
        let handlers = HandlerTable::new().expect("table");
        let numbering = Numbering::default();
        let rels = Relationships::default();
        let node = parse_xml_str("t", xml).expect("parse").root;
        let mut ctx = EncodeContext::new(&handlers, &numbering, &rels, ListMode::Normalized);
        encode_nodes(std::slice::from_ref(&node), &mut ctx).remove(0)
    }

    fn decode_one(node: ModelNode) -> String {
        let handlers = HandlerTable::new().expect("table");
        let mut numbering = Numbering::default();
        let mut rels = Relationships::default();
        let mut ctx = DecodeContext::new(&handlers, &mut numbering, &mut rels, false);
        decode_nodes(&[node], &mut ctx).iter().map(write_node_string).collect()
    }

    #[test]
    fn child_elements_override_the_tag() {
        let section = encode_one(SECTION);
        assert!(section.is(node_types::DOCUMENT_SECTION));
        assert_eq!(section.attr_str("id"), Some("12"));
        assert_eq!(section.attr_str("title"), Some("Terms"));
        assert_eq!(section.attr_str("description"), Some("Signed terms"));
        assert_eq!(section.attr_bool("isLocked"), Some(true));
        assert_eq!(section.content[0].text_content(), "Body");
    }

    #[test]
    fn tag_only_section_reads_from_json() {
        let section = encode_one(
            r#"<w:sdt><w:sdtPr><w:tag w:val="{&quot;type&quot;:&quot;documentSection&quot;,&quot;id&quot;:&quot;5&quot;,&quot;title&quot;:&quot;Intro&quot;}"/></w:sdtPr><w:sdtContent><w:p/></w:sdtContent></w:sdt>"#,
        );
        assert_eq!(section.attr_str("id"), Some("5"));
        assert_eq!(section.attr_str("title"), Some("Intro"));
        assert!(section.attr("description").is_none());
        assert_eq!(section.attr_bool("isLocked"), Some(false));
    }

    #[test]
    fn unchanged_section_roundtrips() {
        assert_eq!(decode_one(encode_one(SECTION)), SECTION);
    }

    #[test]
    fn tag_only_section_updates_the_tag() {
        let mut section = encode_one(
            r#"<w:sdt><w:sdtPr><w:tag w:val="{&quot;type&quot;:&quot;documentSection&quot;,&quot;title&quot;:&quot;Intro&quot;}"/></w:sdtPr><w:sdtContent><w:p/></w:sdtContent></w:sdt>"#,
        );
        section.set_attr("description", "Opening remarks");
        let xml = decode_one(section);
        assert!(!xml.contains("w:alias"), "{xml}");
        assert!(xml.contains("&quot;description&quot;:&quot;Opening remarks&quot;"), "{xml}");
        assert!(xml.contains("&quot;title&quot;:&quot;Intro&quot;"), "{xml}");
    }

    #[test]
    fn unlocking_and_retitling() {
        let mut section = encode_one(SECTION);
        section.set_attr("isLocked", false);
        section.set_attr("title", "Conditions");
        let xml = decode_one(section);
        assert!(xml.contains(r#"<w:alias w:val="Conditions"/>"#), "{xml}");
        assert!(!xml.contains("w:lock"), "{xml}");
        assert!(xml.contains("&quot;title&quot;:&quot;Old&quot;"), "{xml}");
    }
}
