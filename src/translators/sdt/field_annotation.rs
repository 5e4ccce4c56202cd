//! Fillable form-field tokens.
//!
//! Current documents describe the field as a JSON object in `w:tag`; older ones use one
//! `w:sdtPr` child per property (`w:fieldId`, `w:fieldTypeShort`, ...). The JSON form wins
//! whenever it names the field; the element scan is the fallback.

use anyhow::Context;
use serde_json::{Map, Value};

use crate::docx::xml::XmlNode;
use crate::model::{node_types, Mark, ModelDocument, ModelNode};
use crate::node_list::decode_nodes;
use crate::translators::properties::{value_to_xml, xml_to_value};
use crate::translators::run::decode_inline_content;
use crate::translators::run_properties::{decode_run_properties, encode_run_properties, is_formatting_mark};
use crate::translators::sdt::{original_sdt_pr, set_child_val, tag_json, value_text, wrap_sdt, SDT_PR};
use crate::translators::{DecodeContext, EncodeContext};

/// Model attribute, JSON key and legacy `w:sdtPr` child for each field property.
const FIELD_KEYS: &[(&str, &str, &str)] = &[
    ("fieldId", "fieldId", "w:fieldId"),
    ("type", "fieldTypeShort", "w:fieldTypeShort"),
    ("fieldType", "fieldType", "w:fieldType"),
    ("displayLabel", "displayLabel", "w:displayLabel"),
    ("fieldColor", "fieldColor", "w:fieldColor"),
    ("hidden", "hidden", "w:hidden"),
    ("rawHtml", "rawHtml", "w:rawHtml"),
];

const DESCRIPTOR_KEYS: &[&str] = &["fieldId", "fieldTypeShort"];

fn json_descriptor(sdt_pr: &XmlNode) -> Option<Map<String, Value>> {
    tag_json(sdt_pr).filter(|map| DESCRIPTOR_KEYS.iter().any(|k| map.contains_key(*k)))
}

fn has_legacy_descriptor(sdt_pr: &XmlNode) -> bool {
    sdt_pr.has_child("w:fieldId") || sdt_pr.has_child("w:fieldTypeShort")
}

pub fn matches(sdt_pr: &XmlNode) -> bool {
    json_descriptor(sdt_pr).is_some() || has_legacy_descriptor(sdt_pr)
}

pub fn encode(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<ModelNode> {
    // Annotations are inline atoms; a block-level one is kept verbatim.
    if !ctx.is_inline() {
        return None;
    }
    let sdt_pr = node.child("w:sdtPr")?;
    let mut out = ModelNode::new(node_types::FIELD_ANNOTATION);
    match json_descriptor(sdt_pr) {
        Some(json) => {
            for (attr, key, _) in FIELD_KEYS {
                if let Some(v) = json.get(*key).filter(|v| !v.is_null()) {
                    out.set_attr(attr, v.clone());
                }
            }
        }
        None => {
            for (attr, _, element) in FIELD_KEYS {
                if let Some(v) = sdt_pr.child_val(element) {
                    out.set_attr(attr, v);
                }
            }
        }
    }

    let content = node.child("w:sdtContent");
    if out.attr("displayLabel").is_none() {
        let label = sdt_pr
            .child_val("w:alias")
            .map(str::to_string)
            .or_else(|| content.map(XmlNode::text_content))
            .unwrap_or_default();
        out.set_attr("displayLabel", label);
    }
    if let Some(rpr) = content.and_then(|c| c.find_descendant("w:rPr")) {
        out.marks = encode_run_properties(Some(rpr));
        out.set_attr("runProperties", xml_to_value(rpr));
    }
    out.set_attr(SDT_PR, xml_to_value(sdt_pr));
    Some(out)
}

pub fn decode(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let sdt_pr = match original_sdt_pr(node) {
        Some(mut pr) => {
            update_descriptor(&mut pr, node);
            pr
        }
        None => new_sdt_pr(node),
    };
    let content = if node.content.is_empty() {
        vec![label_run(node, ctx)]
    } else {
        decode_inline_content(&node.content, ctx)
    };
    Some(vec![wrap_sdt(node, sdt_pr, content)])
}

fn descriptor_json(node: &ModelNode) -> Map<String, Value> {
    let mut map = Map::new();
    for (attr, key, _) in FIELD_KEYS {
        if let Some(v) = node.attr(attr) {
            map.insert((*key).to_string(), v.clone());
        }
    }
    map
}

/// Writes the model values back in whichever form the document used.
fn update_descriptor(sdt_pr: &mut XmlNode, node: &ModelNode) {
    if let Some(original) = json_descriptor(sdt_pr) {
        let mut merged = original.clone();
        merged.extend(descriptor_json(node));
        if merged != original {
            set_child_val(sdt_pr, "w:tag", &Value::Object(merged).to_string());
        }
        return;
    }
    for (attr, _, element) in FIELD_KEYS {
        let Some(text) = node.attr(attr).and_then(value_text) else {
            continue;
        };
        if sdt_pr.child_val(element).is_some_and(|v| v != text) {
            set_child_val(sdt_pr, element, &text);
        }
    }
}

fn new_sdt_pr(node: &ModelNode) -> XmlNode {
    let mut pr = XmlNode::element("w:sdtPr");
    if let Some(label) = node.attr_str("displayLabel") {
        pr.elements.push(XmlNode::element("w:alias").with_attr("w:val", label));
    }
    pr.elements.push(
        XmlNode::element("w:tag").with_attr("w:val", Value::Object(descriptor_json(node)).to_string()),
    );
    pr
}

fn label_run(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> XmlNode {
    let original_rpr = value_to_xml(node.attr("runProperties"));
    let formatting: Vec<Mark> = node.marks.iter().filter(|m| is_formatting_mark(m)).cloned().collect();
    let mut r = XmlNode::element("w:r");
    if let Some(rpr) = decode_run_properties(&formatting, original_rpr.as_ref()) {
        r.elements.push(rpr);
    }
    let label = node.attr_str("displayLabel").unwrap_or_default();
    if !label.is_empty() {
        r.elements.extend(decode_nodes(&[ModelNode::text(label)], ctx));
    }
    r
}

/// Builds the content of HTML field annotations, the way an editor mounts a child editor
/// for each one.
pub trait ChildEditorFactory {
    /// Returns the inline content rendered from `html` for `annotation`.
    fn create_child_editor(&mut self, annotation: &ModelNode, html: &str) -> anyhow::Result<Vec<ModelNode>>;
}

pub fn is_html_annotation(node: &ModelNode) -> bool {
    node.is(node_types::FIELD_ANNOTATION)
        && node.attr_str("type") == Some("html")
        && node.attr_str("rawHtml").is_some_and(|h| !h.is_empty())
}

/// Fills every HTML annotation from `factory`, one at a time in document order.
/// Stops at the first failure; annotations already filled keep their content.
pub fn process_html_annotations(
    doc: &mut ModelDocument,
    factory: &mut dyn ChildEditorFactory,
) -> anyhow::Result<usize> {
    let mut processed = 0;
    fill_annotations(&mut doc.root, factory, &mut processed)?;
    if processed > 0 {
        log::info!("rendered {processed} html annotation(s)");
    }
    Ok(processed)
}

fn fill_annotations(
    node: &mut ModelNode,
    factory: &mut dyn ChildEditorFactory,
    processed: &mut usize,
) -> anyhow::Result<()> {
    if is_html_annotation(node) {
        let html = node.attr_str("rawHtml").unwrap_or_default().to_string();
        let content = factory
            .create_child_editor(node, &html)
            .with_context(|| format!("child editor for field {}", node.attr_str("fieldId").unwrap_or("?")))?;
        node.content = content;
        *processed += 1;
        return Ok(());
    }
    for child in &mut node.content {
        fill_annotations(child, factory, processed)?;
    }
    Ok(())
}
