//! Verbatim preservation for elements no translator models.

use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::translators::properties::{value_to_xml, xml_to_value};
use crate::translators::{DecodeContext, EncodeContext, NodeTranslator, TranslatorKind};

pub static PASSTHROUGH: NodeTranslator = NodeTranslator {
    xml_name: None,
    sd_names: &[node_types::PASSTHROUGH_BLOCK, node_types::PASSTHROUGH_INLINE],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode,
    decode: decode,
};

/// Body-level `w:sectPr` is captured by the converter; paragraph-level by `w:pPr`.
pub static SECTION_PROPERTIES: NodeTranslator = NodeTranslator {
    xml_name: Some("w:sectPr"),
    sd_names: &[],
    kind: TranslatorKind::Attribute,
    attributes: &[],
    encode: consumed_by_parent,
    decode: not_decodable,
};

pub const ORIGINAL_XML: &str = "originalXml";

pub fn consumed_by_parent(_node: &XmlNode, _ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    Some(Vec::new())
}

pub fn not_decodable(_node: &ModelNode, _ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    None
}

fn encode(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    Some(vec![encode_passthrough(node, ctx)])
}

/// Wraps `node` in an opaque model node that decodes back to the same XML.
pub fn encode_passthrough(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> ModelNode {
    log::debug!("preserving unmodeled element {}", node.name);
    let node_type = if ctx.is_inline() {
        node_types::PASSTHROUGH_INLINE
    } else {
        node_types::PASSTHROUGH_BLOCK
    };
    ModelNode::new(node_type).with_attr(ORIGINAL_XML, xml_to_value(node))
}

pub fn original_xml(node: &ModelNode) -> Option<XmlNode> {
    value_to_xml(node.attr(ORIGINAL_XML))
}

fn decode(node: &ModelNode, _ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    original_xml(node).map(|x| vec![x])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListMode;
    use crate::docx::relationships::Relationships;
    use crate::docx::xml::parse_xml_str;
    use crate::numbering::Numbering;
    use crate::translators::HandlerTable;

    #[test]
    fn unknown_element_survives_verbatim() {
        let xml = parse_xml_str(
            "t",
            r#"<w:customXml w:element="invoice"><w:p><w:r><w:t xml:space="preserve"> 42 </w:t></w:r></w:p></w:customXml>"#,
        )
        .expect("parse")
        .root;
        let handlers = HandlerTable::new().expect("table");
        let numbering = Numbering::default();
        let rels = Relationships::default();
        let mut ctx = EncodeContext::new(&handlers, &numbering, &rels, ListMode::Normalized);
        let model = encode_passthrough(&xml, &mut ctx);
        assert!(model.is(node_types::PASSTHROUGH_BLOCK));

        let json = serde_json::to_string(&model).expect("json");
        let back: ModelNode = serde_json::from_str(&json).expect("model");
        assert_eq!(original_xml(&back), Some(xml));
    }
}
