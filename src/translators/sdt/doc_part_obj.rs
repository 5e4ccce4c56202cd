//! Building-block galleries. Only the table of contents is modeled.

use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::node_list::{decode_nodes, encode_nodes};
use crate::translators::properties::xml_to_value;
use crate::translators::sdt::{original_sdt_pr, set_child_val, wrap_sdt, SDT_PR};
use crate::translators::{DecodeContext, EncodeContext};

pub const KNOWN_GALLERIES: &[&str] = &["Table of Contents"];

pub fn is_known_gallery(doc_part_obj: &XmlNode) -> bool {
    doc_part_obj
        .child_val("w:docPartGallery")
        .is_some_and(|g| KNOWN_GALLERIES.contains(&g))
}

pub fn encode(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<ModelNode> {
    if ctx.is_inline() {
        return None;
    }
    let sdt_pr = node.child("w:sdtPr")?;
    let part = sdt_pr.child("w:docPartObj")?;
    let gallery = part.child_val("w:docPartGallery")?;
    let content = node.child("w:sdtContent")?;

    let mut out = ModelNode::new(node_types::DOC_PART_OBJECT)
        .with_attr("docPartGallery", gallery)
        .with_attr("docPartUnique", part.has_child("w:docPartUnique"));
    if let Some(id) = sdt_pr.child_val("w:id") {
        out.set_attr("id", id);
    }
    out.set_attr(SDT_PR, xml_to_value(sdt_pr));
    out.content = encode_nodes(&content.elements, ctx);
    Some(out)
}

pub fn decode(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let gallery = node.attr_str("docPartGallery").unwrap_or(KNOWN_GALLERIES[0]);
    let unique = node.attr_bool("docPartUnique").unwrap_or(false);
    let sdt_pr = match original_sdt_pr(node) {
        Some(mut pr) => {
            if let Some(part) = pr.child_mut("w:docPartObj") {
                if part.child_val("w:docPartGallery") != Some(gallery) {
                    set_child_val(part, "w:docPartGallery", gallery);
                }
                match (part.has_child("w:docPartUnique"), unique) {
                    (false, true) => part.elements.push(XmlNode::element("w:docPartUnique")),
                    (true, false) => {
                        part.remove_child("w:docPartUnique");
                    }
                    _ => {}
                }
            }
            pr
        }
        None => {
            let mut part = XmlNode::element("w:docPartObj")
                .with_child(XmlNode::element("w:docPartGallery").with_attr("w:val", gallery));
            if unique {
                part.elements.push(XmlNode::element("w:docPartUnique"));
            }
            let mut pr = XmlNode::element("w:sdtPr");
            if let Some(id) = node.attr_str("id") {
                pr.elements.push(XmlNode::element("w:id").with_attr("w:val", id));
            }
            pr.with_child(part)
        }
    };
    let content = decode_nodes(&node.content, ctx);
    Some(vec![wrap_sdt(node, sdt_pr, content)])
}
