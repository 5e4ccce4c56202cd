use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::node_list::{decode_nodes, encode_nodes};
use crate::translators::properties::xml_to_value;
use crate::translators::run::decode_inline_content;
use crate::translators::sdt::{original_sdt_pr, wrap_sdt, SdtKind, SDT_PR};
use crate::translators::{DecodeContext, EncodeContext};

/// Generic content controls. Inline ones wrap runs, block ones wrap paragraphs and tables.
/// An inline control met outside a paragraph becomes a block so its content stays valid.
pub fn encode(node: &XmlNode, kind: SdtKind, ctx: &mut EncodeContext<'_>) -> Option<ModelNode> {
    let content = node.child("w:sdtContent")?;
    let block = kind == SdtKind::StructuredContentBlock || !ctx.is_inline();
    let mut out = if block {
        let mut out = ModelNode::new(node_types::STRUCTURED_CONTENT_BLOCK);
        out.content = ctx.block_scope(|ctx| encode_nodes(&content.elements, ctx));
        out
    } else {
        let mut out = ModelNode::new(node_types::STRUCTURED_CONTENT);
        out.content = encode_nodes(&content.elements, ctx);
        out
    };
    if let Some(sdt_pr) = node.child("w:sdtPr") {
        if let Some(id) = sdt_pr.child_val("w:id") {
            out.set_attr("id", id);
        }
        if let Some(tag) = sdt_pr.child_val("w:tag") {
            out.set_attr("tag", tag);
        }
        if let Some(alias) = sdt_pr.child_val("w:alias") {
            out.set_attr("alias", alias);
        }
        out.set_attr(SDT_PR, xml_to_value(sdt_pr));
    }
    Some(out)
}

pub fn decode(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let inline = node.is(node_types::STRUCTURED_CONTENT);
    let content = if inline {
        decode_inline_content(&node.content, ctx)
    } else {
        decode_nodes(&node.content, ctx)
    };
    if inline && ctx.final_doc {
        return Some(content);
    }
    let sdt_pr = original_sdt_pr(node).unwrap_or_else(|| new_sdt_pr(node));
    Some(vec![wrap_sdt(node, sdt_pr, content)])
}

fn new_sdt_pr(node: &ModelNode) -> XmlNode {
    let mut pr = XmlNode::element("w:sdtPr");
    for (attr, element) in [("alias", "w:alias"), ("tag", "w:tag"), ("id", "w:id")] {
        if let Some(v) = node.attr_str(attr) {
            pr.elements.push(XmlNode::element(element).with_attr("w:val", v));
        }
    }
    pr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListMode;
    use crate::docx::relationships::Relationships;
    use crate::docx::xml::{parse_xml_str, write_node_string};
    use crate::numbering::Numbering;
    use crate::translators::HandlerTable;

    const INLINE: &str = r#"<w:p><w:r><w:t xml:space="preserve">Dear </w:t></w:r><w:sdt><w:sdtPr><w:alias w:val="Recipient"/><w:tag w:val="recipient"/></w:sdtPr><w:sdtContent><w:r><w:rPr><w:i/></w:rPr><w:t>Jane</w:t></w:r></w:sdtContent></w:sdt></w:p>"#;

    fn encode_one(xml: &str) -> ModelNode {
        let handlers = HandlerTable::new().expect("table");
        let numbering = Numbering::default();
        let rels = Relationships::default();
        let node = parse_xml_str("t", xml).expect("parse").root;
        let mut ctx = EncodeContext::new(&handlers, &numbering, &rels, ListMode::Normalized);
        encode_nodes(std::slice::from_ref(&node), &mut ctx).remove(0)
    }

    fn decode_one(node: ModelNode, final_doc: bool) -> String {
        let handlers = HandlerTable::new().expect("table");
        let mut numbering = Numbering::default();
        let mut rels = Relationships::default();
        let mut ctx = DecodeContext::new(&handlers, &mut numbering, &mut rels, final_doc);
        decode_nodes(&[node], &mut ctx).iter().map(write_node_string).collect()
    }

    #[test]
    fn inline_control_wraps_runs() {
        let p = encode_one(INLINE);
        let control = &p.content[1];
        assert!(control.is(node_types::STRUCTURED_CONTENT));
        assert_eq!(control.attr_str("alias"), Some("Recipient"));
        assert_eq!(control.attr_str("tag"), Some("recipient"));
        assert_eq!(control.text_content(), "Jane");
        assert_eq!(decode_one(p, false), INLINE);
    }

    #[test]
    fn final_document_drops_the_wrapper() {
        let p = encode_one(INLINE);
        assert_eq!(
            decode_one(p, true),
            r#"<w:p><w:r><w:t xml:space="preserve">Dear </w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>Jane</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn block_control_keeps_its_wrapper_in_final_documents() {
        let xml = r#"<w:sdt><w:sdtPr><w:id w:val="4"/></w:sdtPr><w:sdtEndPr><w:rPr><w:b/></w:rPr></w:sdtEndPr><w:sdtContent><w:p><w:r><w:t>Clause</w:t></w:r></w:p></w:sdtContent></w:sdt>"#;
        let block = encode_one(xml);
        assert!(block.is(node_types::STRUCTURED_CONTENT_BLOCK));
        assert_eq!(block.attr_str("id"), Some("4"));
        assert_eq!(decode_one(block, true), xml);
    }
}
