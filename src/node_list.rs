//! The recursive walk shared by every translator.
//!
//! Translators call back into [`encode_nodes`]/[`decode_nodes`] for their children; the
//! handler table travels in the context, so there is no global registry.

use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::numbering::lists::wrap_list_paragraphs;
use crate::translators::passthrough::{encode_passthrough, original_xml};
use crate::translators::{is_noop_element, DecodeContext, EncodeContext, TranslatorKind};

pub fn encode_nodes(nodes: &[XmlNode], ctx: &mut EncodeContext<'_>) -> Vec<ModelNode> {
    let mut out = Vec::new();
    for node in nodes {
        if !node.is_element() || is_noop_element(&node.name) {
            continue;
        }
        let translated = match ctx.handlers.for_xml(&node.name) {
            Some(t) if t.kind == TranslatorKind::Attribute => continue,
            Some(t) => (t.encode)(node, ctx),
            None => None,
        };
        let produced = translated.unwrap_or_else(|| vec![encode_passthrough(node, ctx)]);
        if ctx.is_inline() && !ctx.inherited_marks().is_empty() {
            let marks = ctx.inherited_marks().to_vec();
            for mut n in produced {
                if !n.is(node_types::RUN) {
                    for m in &marks {
                        n.add_mark(m.clone());
                    }
                }
                out.push(n);
            }
        } else {
            out.extend(produced);
        }
    }
    if ctx.is_inline() {
        out
    } else {
        wrap_list_paragraphs(out, ctx.numbering, ctx.list_mode)
    }
}

pub fn decode_nodes(nodes: &[ModelNode], ctx: &mut DecodeContext<'_>) -> Vec<XmlNode> {
    let mut out = Vec::new();
    for node in nodes {
        let decoded = ctx
            .handlers
            .for_type(&node.node_type)
            .and_then(|t| (t.decode)(node, ctx));
        match decoded {
            Some(xml) => out.extend(xml),
            None => out.extend(decode_fallback(node, ctx)),
        }
    }
    out
}

// Unknown model types keep their children; only the wrapper is lost.
fn decode_fallback(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Vec<XmlNode> {
    if let Some(xml) = original_xml(node) {
        return vec![xml];
    }
    ctx.diagnostic(format!(
        "no translator for model node {}; exporting its content only",
        node.node_type
    ));
    decode_nodes(&node.content, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListMode;
    use crate::docx::relationships::Relationships;
    use crate::docx::xml::{parse_xml_str, write_node_string};
    use crate::numbering::Numbering;
    use crate::translators::HandlerTable;

    #[test]
    fn unknown_elements_fall_back_to_passthrough() {
        let body = parse_xml_str(
            "t",
            r#"<w:body><w:p><w:r><w:t>a</w:t></w:r></w:p><w:altChunk r:id="rId9"/><!-- note --><w:sectPr><w:pgSz w:w="12240"/></w:sectPr></w:body>"#,
        )
        .expect("parse")
        .root;
        let handlers = HandlerTable::new().expect("table");
        let numbering = Numbering::default();
        let rels = Relationships::default();
        let mut ctx = EncodeContext::new(&handlers, &numbering, &rels, ListMode::Normalized);
        let nodes = encode_nodes(&body.elements, &mut ctx);
        let types: Vec<&str> = nodes.iter().map(|n| n.node_type.as_str()).collect();
        assert_eq!(types, vec!["paragraph", "passthroughBlock"]);

        let mut numbering = Numbering::default();
        let mut rels = Relationships::default();
        let mut dctx = DecodeContext::new(&handlers, &mut numbering, &mut rels, false);
        let xml: String = decode_nodes(&nodes, &mut dctx).iter().map(write_node_string).collect();
        assert_eq!(xml, r#"<w:p><w:r><w:t>a</w:t></w:r></w:p><w:altChunk r:id="rId9"/>"#);
    }

    #[test]
    fn unknown_model_type_keeps_content() {
        let handlers = HandlerTable::new().expect("table");
        let mut numbering = Numbering::default();
        let mut rels = Relationships::default();
        let mut dctx = DecodeContext::new(&handlers, &mut numbering, &mut rels, false);
        let node = ModelNode::new("blockquote").with_content(vec![
            ModelNode::new(node_types::PARAGRAPH).with_content(vec![ModelNode::text("x")]),
        ]);
        let xml: String = decode_nodes(&[node], &mut dctx).iter().map(write_node_string).collect();
        assert_eq!(xml, "<w:p><w:r><w:t>x</w:t></w:r></w:p>");
        assert_eq!(dctx.diagnostics.len(), 1);
    }
}
