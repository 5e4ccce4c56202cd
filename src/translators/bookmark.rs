use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::translators::attributes::{
    attributes_to_value, decode_attributes, decode_string, encode_attributes, encode_string,
    unowned_attributes, value_to_attributes, AttrTranslator,
};
use crate::translators::{DecodeContext, EncodeContext, NodeTranslator, TranslatorKind};

const START_ATTRS: &[AttrTranslator] = &[
    AttrTranslator::new("w:id", "id", encode_string, decode_string),
    AttrTranslator::new("w:name", "name", encode_string, decode_string),
    AttrTranslator::new("w:colFirst", "colFirst", encode_string, decode_string),
    AttrTranslator::new("w:colLast", "colLast", encode_string, decode_string),
];

const END_ATTRS: &[AttrTranslator] = &[AttrTranslator::new("w:id", "id", encode_string, decode_string)];

pub static BOOKMARK_START: NodeTranslator = NodeTranslator {
    xml_name: Some("w:bookmarkStart"),
    sd_names: &[node_types::BOOKMARK_START],
    kind: TranslatorKind::Node,
    attributes: START_ATTRS,
    encode: encode_start,
    decode: decode_start,
};

pub static BOOKMARK_END: NodeTranslator = NodeTranslator {
    xml_name: Some("w:bookmarkEnd"),
    sd_names: &[node_types::BOOKMARK_END],
    kind: TranslatorKind::Node,
    attributes: END_ATTRS,
    encode: encode_end,
    decode: decode_end,
};

fn encode_with(node: &XmlNode, node_type: &str, table: &[AttrTranslator]) -> ModelNode {
    let mut out = ModelNode::new(node_type);
    out.attrs = encode_attributes(node, table);
    let extra = unowned_attributes(node, table);
    if !extra.is_empty() {
        out.set_attr("attributes", attributes_to_value(&extra));
    }
    out
}

fn decode_with(node: &ModelNode, name: &str, table: &[AttrTranslator]) -> XmlNode {
    let mut out = XmlNode::element(name);
    out.attributes = decode_attributes(&node.attrs, table);
    out.attributes.extend(value_to_attributes(node.attr("attributes")));
    out
}

fn encode_start(node: &XmlNode, _ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    node.attr("w:id")?;
    Some(vec![encode_with(node, node_types::BOOKMARK_START, START_ATTRS)])
}

fn encode_end(node: &XmlNode, _ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    node.attr("w:id")?;
    Some(vec![encode_with(node, node_types::BOOKMARK_END, END_ATTRS)])
}

fn decode_start(node: &ModelNode, _ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    node.attr("id")?;
    Some(vec![decode_with(node, "w:bookmarkStart", START_ATTRS)])
}

fn decode_end(node: &ModelNode, _ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    node.attr("id")?;
    Some(vec![decode_with(node, "w:bookmarkEnd", END_ATTRS)])
}
