use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::node_list::encode_nodes;
use crate::translators::attributes::{attributes_to_value, unowned_attributes, value_to_attributes};
use crate::translators::paragraph_properties::{decode_paragraph_properties, encode_paragraph_properties};
use crate::translators::properties::{value_to_xml, xml_to_value};
use crate::translators::run::decode_inline_content;
use crate::translators::{DecodeContext, EncodeContext, NodeTranslator, TranslatorKind};

pub static PARAGRAPH: NodeTranslator = NodeTranslator {
    xml_name: Some("w:p"),
    sd_names: &[node_types::PARAGRAPH],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_paragraph,
    decode: decode_paragraph,
};

fn encode_paragraph(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    if ctx.is_inline() {
        return None;
    }
    let mut p = ModelNode::new(node_types::PARAGRAPH);
    p.set_attr("sdBlockId", ctx.next_block_id());
    if let Some(ppr) = node.child("w:pPr") {
        p.attrs.extend(encode_paragraph_properties(ppr));
        p.set_attr("paragraphProperties", xml_to_value(ppr));
    }
    let extra = unowned_attributes(node, &[]);
    if !extra.is_empty() {
        p.set_attr("attributes", attributes_to_value(&extra));
    }
    p.content = ctx.inline_scope(|ctx| encode_nodes(&node.elements, ctx));
    Some(vec![p])
}

fn decode_paragraph(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let mut p = XmlNode::element("w:p");
    p.attributes = value_to_attributes(node.attr("attributes"));
    let original = value_to_xml(node.attr("paragraphProperties"));
    if let Some(ppr) = decode_paragraph_properties(&node.attrs, original.as_ref()) {
        p.elements.push(ppr);
    }
    p.elements.extend(decode_inline_content(&node.content, ctx));
    Some(vec![p])
}
