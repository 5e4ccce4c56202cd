//! List nodes exist only in the model; export flattens them back to numbered paragraphs.

use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::node_list::decode_nodes;
use crate::numbering::lists::flatten_list;
use crate::translators::passthrough::consumed_by_parent;
use crate::translators::{DecodeContext, NodeTranslator, TranslatorKind};

pub static LIST: NodeTranslator = NodeTranslator {
    xml_name: None,
    sd_names: &[node_types::ORDERED_LIST, node_types::BULLET_LIST, node_types::LIST_ITEM],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: consumed_by_parent,
    decode: decode_list,
};

fn decode_list(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let paragraphs = flatten_list(node, ctx.numbering, &mut ctx.diagnostics);
    Some(decode_nodes(&paragraphs, ctx))
}
