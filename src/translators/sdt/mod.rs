//! `w:sdt`: one tag, four model concepts.
//!
//! [`classify_sdt`] decides the concept once per element and the matching submodule
//! encodes it. Export dispatches on the model type, so decode needs no classification.
//! Every concept keeps the original `w:sdtPr` (and `w:sdtEndPr`) so the wrapper comes
//! back with the properties the editor does not model.

use serde_json::{Map, Value};

use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::translators::passthrough::{consumed_by_parent, not_decodable};
use crate::translators::properties::{value_to_xml, xml_to_value};
use crate::translators::{DecodeContext, EncodeContext, NodeTranslator, TranslatorKind};

pub mod doc_part_obj;
pub mod document_section;
pub mod field_annotation;
pub mod structured_content;

pub use field_annotation::ChildEditorFactory;

pub static SDT: NodeTranslator = NodeTranslator {
    xml_name: Some("w:sdt"),
    sd_names: &[
        node_types::FIELD_ANNOTATION,
        node_types::STRUCTURED_CONTENT,
        node_types::STRUCTURED_CONTENT_BLOCK,
        node_types::DOCUMENT_SECTION,
        node_types::DOC_PART_OBJECT,
    ],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_sdt,
    decode: decode_sdt,
};

pub static SDT_PROPERTIES: NodeTranslator = NodeTranslator {
    xml_name: Some("w:sdtPr"),
    sd_names: &[],
    kind: TranslatorKind::Attribute,
    attributes: &[],
    encode: consumed_by_parent,
    decode: not_decodable,
};

pub static SDT_END_PROPERTIES: NodeTranslator = NodeTranslator {
    xml_name: Some("w:sdtEndPr"),
    sd_names: &[],
    kind: TranslatorKind::Attribute,
    attributes: &[],
    encode: consumed_by_parent,
    decode: not_decodable,
};

pub const SDT_PR: &str = "sdtPr";
pub const SDT_END_PR: &str = "sdtEndPr";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdtKind {
    FieldAnnotation,
    DocPartObject,
    DocumentSection,
    StructuredContent,
    StructuredContentBlock,
}

impl SdtKind {
    pub fn node_type(self) -> &'static str {
        match self {
            SdtKind::FieldAnnotation => node_types::FIELD_ANNOTATION,
            SdtKind::DocPartObject => node_types::DOC_PART_OBJECT,
            SdtKind::DocumentSection => node_types::DOCUMENT_SECTION,
            SdtKind::StructuredContent => node_types::STRUCTURED_CONTENT,
            SdtKind::StructuredContentBlock => node_types::STRUCTURED_CONTENT_BLOCK,
        }
    }
}

/// Picks the single concept a `w:sdt` stands for.
///
/// Checked in order: field annotation, doc-part object, document section, generic
/// structured content. A doc-part gallery other than a table of contents matches
/// nothing, and the element is then preserved verbatim.
pub fn classify_sdt(node: &XmlNode) -> Option<SdtKind> {
    if !node.is_named("w:sdt") {
        return None;
    }
    let sdt_pr = node.child("w:sdtPr");
    if let Some(pr) = sdt_pr {
        if field_annotation::matches(pr) {
            return Some(SdtKind::FieldAnnotation);
        }
        if let Some(part) = pr.child("w:docPartObj") {
            return doc_part_obj::is_known_gallery(part).then_some(SdtKind::DocPartObject);
        }
    }
    let content = node.child("w:sdtContent")?;
    if sdt_pr.is_some_and(document_section::matches) {
        return Some(SdtKind::DocumentSection);
    }
    if content
        .child_elements()
        .any(|c| c.is_named("w:p") || c.is_named("w:tbl"))
    {
        Some(SdtKind::StructuredContentBlock)
    } else {
        Some(SdtKind::StructuredContent)
    }
}

fn encode_sdt(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    let kind = classify_sdt(node)?;
    log::trace!("w:sdt classified as {kind:?}");
    let mut out = match kind {
        SdtKind::FieldAnnotation => field_annotation::encode(node, ctx)?,
        SdtKind::DocPartObject => doc_part_obj::encode(node, ctx)?,
        SdtKind::DocumentSection => document_section::encode(node, ctx)?,
        SdtKind::StructuredContent | SdtKind::StructuredContentBlock => {
            structured_content::encode(node, kind, ctx)?
        }
    };
    if let Some(end_pr) = node.child("w:sdtEndPr") {
        out.set_attr(SDT_END_PR, xml_to_value(end_pr));
    }
    Some(vec![out])
}

fn decode_sdt(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    match node.node_type.as_str() {
        node_types::FIELD_ANNOTATION => field_annotation::decode(node, ctx),
        node_types::DOC_PART_OBJECT => doc_part_obj::decode(node, ctx),
        node_types::DOCUMENT_SECTION => document_section::decode(node, ctx),
        node_types::STRUCTURED_CONTENT | node_types::STRUCTURED_CONTENT_BLOCK => {
            structured_content::decode(node, ctx)
        }
        _ => None,
    }
}

/// The JSON object stored in `w:tag/@w:val`, if the value is one.
pub fn tag_json(sdt_pr: &XmlNode) -> Option<Map<String, Value>> {
    let raw = sdt_pr.child_val("w:tag")?;
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Original `w:sdtPr` kept on the model node.
pub fn original_sdt_pr(node: &ModelNode) -> Option<XmlNode> {
    value_to_xml(node.attr(SDT_PR))
}

/// Sets `<{name} w:val="..."/>` inside `sdt_pr`, replacing an existing child in place.
pub fn set_child_val(sdt_pr: &mut XmlNode, name: &str, value: &str) {
    match sdt_pr.child_mut(name) {
        Some(child) => child.set_attr("w:val", value),
        None => sdt_pr
            .elements
            .push(XmlNode::element(name).with_attr("w:val", value)),
    }
}

/// `<w:sdt>` with properties, optional end properties and content.
pub fn wrap_sdt(node: &ModelNode, sdt_pr: XmlNode, content: Vec<XmlNode>) -> XmlNode {
    let mut sdt = XmlNode::element("w:sdt").with_child(sdt_pr);
    if let Some(end_pr) = value_to_xml(node.attr(SDT_END_PR)) {
        sdt.elements.push(end_pr);
    }
    sdt.with_child(XmlNode::element("w:sdtContent").with_children(content))
}

/// JSON value to the plain string written into a `w:val`.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::parse_xml_str;

    fn sdt(xml: &str) -> XmlNode {
        parse_xml_str("sdt", xml).expect("parse").root
    }

    #[test]
    fn each_fixture_has_exactly_one_kind() {
        let fixtures = [
            (
                r#"<w:sdt><w:sdtPr><w:tag w:val='{"fieldId":"f1","fieldTypeShort":"text"}'/></w:sdtPr><w:sdtContent><w:r><w:t>Name</w:t></w:r></w:sdtContent></w:sdt>"#,
                Some(SdtKind::FieldAnnotation),
            ),
            (
                r#"<w:sdt><w:sdtPr><w:fieldId w:val="f2"/><w:fieldTypeShort w:val="text"/></w:sdtPr><w:sdtContent/></w:sdt>"#,
                Some(SdtKind::FieldAnnotation),
            ),
            (
                r#"<w:sdt><w:sdtPr><w:docPartObj><w:docPartGallery w:val="Table of Contents"/><w:docPartUnique/></w:docPartObj></w:sdtPr><w:sdtContent><w:p/></w:sdtContent></w:sdt>"#,
                Some(SdtKind::DocPartObject),
            ),
            (
                r#"<w:sdt><w:sdtPr><w:id w:val="7"/><w:tag w:val='{"type":"documentSection","description":"d"}'/></w:sdtPr><w:sdtContent><w:p/></w:sdtContent></w:sdt>"#,
                Some(SdtKind::DocumentSection),
            ),
            (
                r#"<w:sdt><w:sdtPr><w:alias w:val="Box"/></w:sdtPr><w:sdtContent><w:tbl/></w:sdtContent></w:sdt>"#,
                Some(SdtKind::StructuredContentBlock),
            ),
            (
                r#"<w:sdt><w:sdtPr/><w:sdtContent><w:r><w:t>x</w:t></w:r></w:sdtContent></w:sdt>"#,
                Some(SdtKind::StructuredContent),
            ),
        ];
        for (xml, expected) in fixtures {
            assert_eq!(classify_sdt(&sdt(xml)), expected, "{xml}");
        }
    }

    #[test]
    fn unknown_gallery_matches_nothing() {
        let node = sdt(
            r#"<w:sdt><w:sdtPr><w:docPartObj><w:docPartGallery w:val="Cover Pages"/></w:docPartObj></w:sdtPr><w:sdtContent><w:p/></w:sdtContent></w:sdt>"#,
        );
        assert_eq!(classify_sdt(&node), None);
    }

    #[test]
    fn broken_json_tag_falls_back_to_legacy_scan() {
        let node = sdt(
            r#"<w:sdt><w:sdtPr><w:tag w:val="{not json"/><w:fieldId w:val="f3"/></w:sdtPr><w:sdtContent/></w:sdt>"#,
        );
        assert_eq!(classify_sdt(&node), Some(SdtKind::FieldAnnotation));
        let plain = sdt(r#"<w:sdt><w:sdtPr><w:tag w:val="{not json"/></w:sdtPr><w:sdtContent/></w:sdt>"#);
        assert_eq!(classify_sdt(&plain), Some(SdtKind::StructuredContent));
    }

    #[test]
    fn missing_content_is_not_structured_content() {
        assert_eq!(classify_sdt(&sdt("<w:sdt><w:sdtPr/></w:sdt>")), None);
    }
}
