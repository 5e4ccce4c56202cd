//! `w:r` and the leaf elements that live inside it.
//!
//! On import the formatting of a run is pushed down as marks onto each of its children.
//! On export children are regrouped by mark set, so a run the editor partly reformatted
//! comes back as several `w:r` elements, each with its own `w:rPr`.

use crate::docx::xml::XmlNode;
use crate::model::{mark_types, node_types, Mark, ModelNode};
use crate::node_list::{decode_nodes, encode_nodes};
use crate::translators::attributes::{
    attributes_to_value, decode_attributes, encode_attributes, encode_string, decode_string,
    unowned_attributes, value_to_attributes, AttrTranslator,
};
use crate::translators::passthrough::not_decodable;
use crate::translators::properties::{value_to_xml, xml_to_value};
use crate::translators::run_properties::{decode_run_properties, encode_run_properties, is_formatting_mark};
use crate::translators::wrappers::{group_consecutive, wrap_segments, Segment};
use crate::translators::{DecodeContext, EncodeContext, NodeTranslator, TranslatorKind};

pub static RUN: NodeTranslator = NodeTranslator {
    xml_name: Some("w:r"),
    sd_names: &[node_types::RUN],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_run,
    decode: decode_run,
};

pub static TEXT: NodeTranslator = NodeTranslator {
    xml_name: Some("w:t"),
    sd_names: &[node_types::TEXT],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_text,
    decode: decode_text,
};

/// `w:delText` imports like `w:t`; export picks the tag from the enclosing deletion.
pub static DELETED_TEXT: NodeTranslator = NodeTranslator {
    xml_name: Some("w:delText"),
    sd_names: &[],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_text,
    decode: not_decodable,
};

pub static TAB: NodeTranslator = NodeTranslator {
    xml_name: Some("w:tab"),
    sd_names: &[node_types::TAB],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_tab,
    decode: decode_tab,
};

const BREAK_ATTRS: &[AttrTranslator] = &[
    AttrTranslator::new("w:type", "lineBreakType", encode_string, decode_string),
    AttrTranslator::new("w:clear", "clear", encode_string, decode_string),
];

pub static BREAK: NodeTranslator = NodeTranslator {
    xml_name: Some("w:br"),
    sd_names: &[node_types::LINE_BREAK],
    kind: TranslatorKind::Node,
    attributes: BREAK_ATTRS,
    encode: encode_break,
    decode: decode_break,
};

pub static CARRIAGE_RETURN: NodeTranslator = NodeTranslator {
    xml_name: Some("w:cr"),
    sd_names: &[],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_carriage_return,
    decode: not_decodable,
};

fn encode_run(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    let rpr = node.child("w:rPr");
    let mut marks = encode_run_properties(rpr);
    marks.extend(ctx.inherited_marks().iter().cloned());

    let mut content = ctx.inline_scope(|ctx| encode_nodes(&node.elements, ctx));
    for child in &mut content {
        for mark in &marks {
            child.add_mark(mark.clone());
        }
    }

    let mut run = ModelNode::new(node_types::RUN).with_content(content);
    if let Some(rpr) = rpr {
        run.set_attr("runProperties", xml_to_value(rpr));
    }
    let extra = unowned_attributes(node, &[]);
    if !extra.is_empty() {
        run.set_attr("attributes", attributes_to_value(&extra));
    }
    if run.content.is_empty() {
        run.marks = marks;
    }
    Some(vec![run])
}

fn decode_run(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    Some(decode_inline_content(std::slice::from_ref(node), ctx))
}

/// Decodes paragraph-level inline content: runs, bare leaves and inline objects,
/// regrouped under `w:hyperlink`/`w:ins`/`w:del` by their wrapper marks.
pub fn decode_inline_content(nodes: &[ModelNode], ctx: &mut DecodeContext<'_>) -> Vec<XmlNode> {
    let mut segments = Vec::new();
    for node in nodes {
        match node.node_type.as_str() {
            node_types::RUN => segments.extend(run_segments(node, ctx)),
            node_types::TEXT | node_types::TAB | node_types::LINE_BREAK | node_types::IMAGE => {
                segments.extend(leaf_segments(std::slice::from_ref(node), None, &[], ctx))
            }
            _ => {
                let xml = decode_nodes(std::slice::from_ref(node), ctx);
                segments.push(Segment::new(&node.marks, xml));
            }
        }
    }
    wrap_segments(segments, ctx)
}

fn run_segments(run: &ModelNode, ctx: &mut DecodeContext<'_>) -> Vec<Segment> {
    let original_rpr = value_to_xml(run.attr("runProperties"));
    let attributes = value_to_attributes(run.attr("attributes"));
    if run.content.is_empty() {
        let mut r = XmlNode::element("w:r");
        r.attributes = attributes;
        let formatting: Vec<Mark> = run.marks.iter().filter(|m| is_formatting_mark(m)).cloned().collect();
        if let Some(rpr) = decode_run_properties(&formatting, original_rpr.as_ref()) {
            r.elements.push(rpr);
        }
        return vec![Segment::new(&run.marks, vec![r])];
    }
    leaf_segments(&run.content, original_rpr.as_ref(), &attributes, ctx)
}

fn leaf_segments(
    leaves: &[ModelNode],
    original_rpr: Option<&XmlNode>,
    attributes: &[(String, String)],
    ctx: &mut DecodeContext<'_>,
) -> Vec<Segment> {
    let mut out = Vec::new();
    for (_, group) in group_consecutive(leaves.iter().collect(), |n: &&ModelNode| marks_key(&n.marks)) {
        let marks = &group[0].marks;
        let deleted = marks.iter().any(|m| m.mark_type == mark_types::TRACK_DELETE);
        let children: Vec<ModelNode> = group.iter().map(|n| (*n).clone()).collect();
        let xml_children = ctx.deletion_scope(deleted, |ctx| decode_nodes(&children, ctx));

        let formatting: Vec<Mark> = marks.iter().filter(|m| is_formatting_mark(m)).cloned().collect();
        let mut r = XmlNode::element("w:r");
        r.attributes = attributes.to_vec();
        if let Some(rpr) = decode_run_properties(&formatting, original_rpr) {
            r.elements.push(rpr);
        }
        r.elements.extend(xml_children);
        out.push(Segment::new(marks, vec![r]));
    }
    out
}

/// Order-insensitive identity of a mark set.
fn marks_key(marks: &[Mark]) -> Vec<Mark> {
    let mut key = marks.to_vec();
    key.sort_by(|a, b| a.mark_type.cmp(&b.mark_type));
    key
}

fn encode_text(node: &XmlNode, _ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    let text = node.text_content();
    if text.is_empty() {
        return Some(Vec::new());
    }
    Some(vec![ModelNode::text(text)])
}

fn decode_text(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let text = node.text.as_deref()?;
    let name = if ctx.in_deletion() { "w:delText" } else { "w:t" };
    let mut t = XmlNode::element(name);
    if needs_space_preserve(text) {
        t.set_attr("xml:space", "preserve");
    }
    t.elements.push(XmlNode::text_node(text));
    Some(vec![t])
}

fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
        || text.contains("  ")
        || text.contains(['\t', '\n'])
}

fn encode_tab(_node: &XmlNode, _ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    Some(vec![ModelNode::new(node_types::TAB)])
}

fn decode_tab(_node: &ModelNode, _ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    Some(vec![XmlNode::element("w:tab")])
}

fn encode_break(node: &XmlNode, _ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    let mut out = ModelNode::new(node_types::LINE_BREAK);
    out.attrs = encode_attributes(node, BREAK_ATTRS);
    Some(vec![out])
}

fn encode_carriage_return(_node: &XmlNode, _ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    Some(vec![ModelNode::new(node_types::LINE_BREAK).with_attr("carriageReturn", true)])
}

fn decode_break(node: &ModelNode, _ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    if node.attr_bool("carriageReturn") == Some(true) {
        return Some(vec![XmlNode::element("w:cr")]);
    }
    let mut br = XmlNode::element("w:br");
    br.attributes = decode_attributes(&node.attrs, BREAK_ATTRS);
    Some(vec![br])
}
