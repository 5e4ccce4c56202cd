//! Run wrappers: `w:hyperlink`, `w:ins` and `w:del`.
//!
//! They import as marks on the wrapped runs. Export rebuilds them by grouping adjacent
//! runs that carry the same wrapper mark, hyperlink outermost.

use crate::docx::relationships::REL_TYPE_HYPERLINK;
use crate::docx::xml::XmlNode;
use crate::model::{mark_types, Mark, ModelNode};
use crate::node_list::encode_nodes;
use crate::translators::attributes::{decode_attributes, decode_string, encode_attributes, encode_string, AttrTranslator};
use crate::translators::passthrough::not_decodable;
use crate::translators::{DecodeContext, EncodeContext, NodeTranslator, TranslatorKind};

const HYPERLINK_ATTRS: &[AttrTranslator] = &[
    AttrTranslator::new("r:id", "rId", encode_string, decode_string),
    AttrTranslator::new("w:anchor", "anchor", encode_string, decode_string),
    AttrTranslator::new("w:tooltip", "tooltip", encode_string, decode_string),
    AttrTranslator::new("w:history", "history", encode_string, decode_string),
    AttrTranslator::new("w:docLocation", "docLocation", encode_string, decode_string),
    AttrTranslator::new("w:tgtFrame", "tgtFrame", encode_string, decode_string),
];

const TRACK_ATTRS: &[AttrTranslator] = &[
    AttrTranslator::new("w:id", "id", encode_string, decode_string),
    AttrTranslator::new("w:author", "author", encode_string, decode_string),
    AttrTranslator::new("w:date", "date", encode_string, decode_string),
];

pub static HYPERLINK: NodeTranslator = NodeTranslator {
    xml_name: Some("w:hyperlink"),
    sd_names: &[],
    kind: TranslatorKind::Node,
    attributes: HYPERLINK_ATTRS,
    encode: encode_hyperlink,
    decode: not_decodable,
};

pub static INSERTION: NodeTranslator = NodeTranslator {
    xml_name: Some("w:ins"),
    sd_names: &[],
    kind: TranslatorKind::Node,
    attributes: TRACK_ATTRS,
    encode: encode_insertion,
    decode: not_decodable,
};

pub static DELETION: NodeTranslator = NodeTranslator {
    xml_name: Some("w:del"),
    sd_names: &[],
    kind: TranslatorKind::Node,
    attributes: TRACK_ATTRS,
    encode: encode_deletion,
    decode: not_decodable,
};

fn encode_hyperlink(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    if !ctx.is_inline() {
        return None;
    }
    let mut mark = Mark::new(mark_types::LINK);
    mark.attrs = encode_attributes(node, HYPERLINK_ATTRS);
    if let Some(target) = mark.attr_str("rId").and_then(|rid| ctx.relationships.target_of(rid)) {
        let href = target.to_string();
        mark.attrs.insert("href".into(), href.into());
    } else if let Some(anchor) = mark.attr_str("anchor") {
        let href = format!("#{anchor}");
        mark.attrs.insert("href".into(), href.into());
    }
    Some(ctx.with_mark(mark, |ctx| encode_nodes(&node.elements, ctx)))
}

fn encode_track(node: &XmlNode, ctx: &mut EncodeContext<'_>, mark_type: &str) -> Option<Vec<ModelNode>> {
    if !ctx.is_inline() {
        return None;
    }
    let mut mark = Mark::new(mark_type);
    mark.attrs = encode_attributes(node, TRACK_ATTRS);
    Some(ctx.with_mark(mark, |ctx| encode_nodes(&node.elements, ctx)))
}

fn encode_insertion(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    encode_track(node, ctx, mark_types::TRACK_INSERT)
}

fn encode_deletion(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    encode_track(node, ctx, mark_types::TRACK_DELETE)
}

/// Decoded inline XML plus the wrapper marks it sat under.
pub struct Segment {
    pub link: Option<Mark>,
    pub track: Option<Mark>,
    pub xml: Vec<XmlNode>,
}

impl Segment {
    pub fn new(marks: &[Mark], xml: Vec<XmlNode>) -> Self {
        let find = |ty: &str| marks.iter().find(|m| m.mark_type == ty).cloned();
        Self {
            link: find(mark_types::LINK),
            track: find(mark_types::TRACK_INSERT).or_else(|| find(mark_types::TRACK_DELETE)),
            xml,
        }
    }
}

/// Splits `items` into runs of equal keys, keeping order.
pub fn group_consecutive<T, K: PartialEq>(items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<(K, Vec<T>)> {
    let mut out: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match out.last_mut() {
            Some((last, group)) if *last == k => group.push(item),
            _ => out.push((k, vec![item])),
        }
    }
    out
}

pub fn wrap_segments(segments: Vec<Segment>, ctx: &mut DecodeContext<'_>) -> Vec<XmlNode> {
    let mut out = Vec::new();
    for (link, group) in group_consecutive(segments, |s| s.link.clone()) {
        let mut inner = Vec::new();
        for (track, tracked) in group_consecutive(group, |s| s.track.clone()) {
            let xml = tracked.into_iter().flat_map(|s| s.xml);
            match track {
                Some(mark) => inner.push(track_change_xml(&mark).with_children(xml)),
                None => inner.extend(xml),
            }
        }
        match link {
            Some(mark) => out.push(hyperlink_xml(&mark, ctx).with_children(inner)),
            None => out.extend(inner),
        }
    }
    out
}

fn track_change_xml(mark: &Mark) -> XmlNode {
    let name = if mark.mark_type == mark_types::TRACK_DELETE {
        "w:del"
    } else {
        "w:ins"
    };
    let mut attrs = mark.attrs.clone();
    attrs.entry("id").or_insert_with(|| "0".into());
    let mut node = XmlNode::element(name);
    node.attributes = decode_attributes(&attrs, TRACK_ATTRS);
    node
}

fn hyperlink_xml(mark: &Mark, ctx: &mut DecodeContext<'_>) -> XmlNode {
    let mut attrs = mark.attrs.clone();
    let href = mark.attr_str("href").map(str::trim).filter(|h| !h.is_empty());
    match href {
        Some(h) if h.starts_with('#') => {
            attrs.remove("rId");
            attrs.insert("anchor".into(), h.trim_start_matches('#').into());
        }
        Some(h) => {
            // Reuses the link's own id while it still points at the same target.
            let current = mark
                .attr_str("rId")
                .filter(|rid| ctx.relationships.target_of(rid) == Some(h));
            let rid = match current {
                Some(rid) => rid.to_string(),
                None => ctx.relationships.insert_new_relationship(h, REL_TYPE_HYPERLINK),
            };
            attrs.insert("rId".into(), rid.into());
        }
        None => {
            if mark.attr_str("rId").is_some_and(|rid| ctx.relationships.get(rid).is_none()) {
                attrs.remove("rId");
            }
        }
    }
    let mut node = XmlNode::element("w:hyperlink");
    node.attributes = decode_attributes(&attrs, HYPERLINK_ATTRS);
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListMode;
    use crate::docx::relationships::Relationships;
    use crate::docx::xml::{parse_xml_str, write_node_string};
    use crate::numbering::Numbering;
    use crate::translators::run::decode_inline_content;
    use crate::translators::HandlerTable;

    const RELS: &str = r#"<Relationships><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/></Relationships>"#;

    fn roundtrip(xml: &str, edit: impl FnOnce(&mut Vec<ModelNode>)) -> (String, Relationships) {
        let handlers = HandlerTable::new().expect("table");
        let numbering = Numbering::default();
        let rels = Relationships::from_xml(&parse_xml_str("r", RELS).expect("rels"));
        let p = parse_xml_str("t", xml).expect("parse").root;
        let mut ctx = EncodeContext::new(&handlers, &numbering, &rels, ListMode::Normalized);
        let mut nodes = ctx.inline_scope(|ctx| encode_nodes(&p.elements, ctx));
        edit(&mut nodes);

        let mut numbering = Numbering::default();
        let mut rels = rels.clone();
        let mut dctx = DecodeContext::new(&handlers, &mut numbering, &mut rels, false);
        let out: String = decode_inline_content(&nodes, &mut dctx)
            .iter()
            .map(write_node_string)
            .collect();
        (out, rels)
    }

    #[test]
    fn hyperlink_becomes_link_mark_and_back() {
        let xml = r#"<w:p><w:hyperlink r:id="rId4" w:history="1"><w:r><w:t>one</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>two</w:t></w:r></w:hyperlink></w:p>"#;
        let (out, _) = roundtrip(xml, |nodes| {
            let text = &nodes[0].content[0];
            let link = text.mark("link").expect("link mark");
            assert_eq!(link.attr_str("href"), Some("https://example.com/"));
        });
        assert_eq!(
            out,
            r#"<w:hyperlink r:id="rId4" w:history="1"><w:r><w:t>one</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>two</w:t></w:r></w:hyperlink>"#
        );
    }

    #[test]
    fn new_href_allocates_relationship() {
        let xml = r#"<w:p><w:hyperlink r:id="rId4"><w:r><w:t>x</w:t></w:r></w:hyperlink></w:p>"#;
        let (out, rels) = roundtrip(xml, |nodes| {
            let text = &mut nodes[0].content[0];
            let mut link = text.mark("link").expect("link").clone();
            link.attrs.insert("href".into(), "https://other.org".into());
            text.add_mark(link);
        });
        assert_eq!(out, r#"<w:hyperlink r:id="rId5"><w:r><w:t>x</w:t></w:r></w:hyperlink>"#);
        let entry = rels.get("rId5").expect("new rel");
        assert!(entry.is_external());
    }

    #[test]
    fn deletions_regroup_and_use_del_text() {
        let xml = r#"<w:p><w:del w:id="3" w:author="Ann" w:date="2024-01-01T00:00:00Z"><w:r><w:delText>gone</w:delText></w:r><w:r><w:rPr><w:i/></w:rPr><w:delText> too</w:delText></w:r></w:del><w:ins w:id="4" w:author="Ann"><w:r><w:t>new</w:t></w:r></w:ins></w:p>"#;
        let (out, _) = roundtrip(xml, |_| {});
        assert_eq!(
            out,
            r#"<w:del w:id="3" w:author="Ann" w:date="2024-01-01T00:00:00Z"><w:r><w:delText>gone</w:delText></w:r><w:r><w:rPr><w:i/></w:rPr><w:delText xml:space="preserve"> too</w:delText></w:r></w:del><w:ins w:id="4" w:author="Ann"><w:r><w:t>new</w:t></w:r></w:ins>"#
        );
    }

    #[test]
    fn grouping_keeps_order() {
        let groups = group_consecutive(vec![1, 1, 2, 1], |n| *n);
        let keys: Vec<i32> = groups.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 2, 1]);
    }
}
