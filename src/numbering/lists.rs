//! Numbered paragraphs <-> list nodes.

use serde_json::json;

use crate::config::ListMode;
use crate::model::{node_types, ModelNode};
use crate::numbering::Numbering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListType {
    Ordered,
    Bullet,
}

impl ListType {
    pub fn from_num_fmt(fmt: &str) -> Self {
        if fmt == "bullet" {
            ListType::Bullet
        } else {
            ListType::Ordered
        }
    }

    pub fn from_node_type(node_type: &str) -> Option<Self> {
        match node_type {
            node_types::ORDERED_LIST => Some(ListType::Ordered),
            node_types::BULLET_LIST => Some(ListType::Bullet),
            _ => None,
        }
    }

    pub fn node_type(self) -> &'static str {
        match self {
            ListType::Ordered => node_types::ORDERED_LIST,
            ListType::Bullet => node_types::BULLET_LIST,
        }
    }

    pub fn default_num_fmt(self) -> &'static str {
        match self {
            ListType::Ordered => "decimal",
            ListType::Bullet => "bullet",
        }
    }
}

/// `(numId, ilvl)` of a numbered paragraph; `numId` 0 means "numbering removed".
pub fn paragraph_numbering(node: &ModelNode) -> Option<(i64, i64)> {
    if !node.is(node_types::PARAGRAPH) {
        return None;
    }
    let props = node.attr("numberingProperties")?.as_object()?;
    let num_id = props.get("numId").and_then(crate::model::value_as_i64)?;
    let ilvl = props.get("ilvl").and_then(crate::model::value_as_i64).unwrap_or(0);
    (num_id != 0).then_some((num_id, ilvl))
}

fn clamp_level(ilvl: i64) -> u8 {
    ilvl.clamp(0, 8) as u8
}

fn bare_paragraph(node: &ModelNode) -> ModelNode {
    let mut p = node.clone();
    p.attrs.remove("numberingProperties");
    p
}

/// Single-item list in the current model shape.
pub fn single_item_list(
    list_type: ListType,
    num_id: i64,
    level: i64,
    num_fmt: &str,
    lvl_text: Option<&str>,
    content: Vec<ModelNode>,
) -> ModelNode {
    let mut item = ModelNode::new(node_types::LIST_ITEM)
        .with_attr("level", level)
        .with_attr("numId", num_id)
        .with_attr("listNumberingType", num_fmt)
        .with_content(content);
    if let Some(t) = lvl_text {
        item.set_attr("lvlText", t);
    }
    ModelNode::new(list_type.node_type())
        .with_attr("numId", num_id)
        .with_content(vec![item])
}

/// Wraps numbered paragraphs of a block sequence into list nodes.
///
/// Paragraphs whose `numId` does not resolve stay plain paragraphs; their `w:numPr` is kept
/// as is and left to the numbering validator.
pub fn wrap_list_paragraphs(nodes: Vec<ModelNode>, numbering: &Numbering, mode: ListMode) -> Vec<ModelNode> {
    match mode {
        ListMode::Normalized => nodes
            .into_iter()
            .map(|node| {
                let Some((num_id, ilvl)) = paragraph_numbering(&node) else {
                    return node;
                };
                let Some(d) = numbering.get_list_definition_details(num_id, clamp_level(ilvl)) else {
                    return node;
                };
                single_item_list(
                    d.list_type,
                    num_id,
                    ilvl,
                    &d.num_fmt,
                    d.lvl_text.as_deref(),
                    vec![bare_paragraph(&node)],
                )
            })
            .collect(),
        ListMode::Legacy => group_legacy(nodes, numbering),
    }
}

struct OpenList {
    ilvl: i64,
    list: ModelNode,
}

/// Older editor shape: consecutive paragraphs of one `numId` become one list whose deeper
/// levels nest inside the preceding item.
fn group_legacy(nodes: Vec<ModelNode>, numbering: &Numbering) -> Vec<ModelNode> {
    let mut out = Vec::new();
    let mut stack: Vec<OpenList> = Vec::new();
    let mut active_num_id: Option<i64> = None;

    for node in nodes {
        let resolved = paragraph_numbering(&node).and_then(|(num_id, ilvl)| {
            numbering
                .get_list_definition_details(num_id, clamp_level(ilvl))
                .map(|d| (num_id, ilvl, d.list_type))
        });
        let Some((num_id, ilvl, list_type)) = resolved else {
            close_all(&mut stack, &mut out);
            active_num_id = None;
            out.push(node);
            continue;
        };
        if active_num_id != Some(num_id) {
            close_all(&mut stack, &mut out);
            active_num_id = Some(num_id);
        }
        while stack.last().is_some_and(|top| top.ilvl > ilvl) {
            close_top(&mut stack, &mut out);
        }
        let item = ModelNode::new(node_types::LIST_ITEM)
            .with_attr("numId", num_id)
            .with_content(vec![bare_paragraph(&node)]);
        match stack.last_mut() {
            Some(top) if top.ilvl == ilvl => top.list.content.push(item),
            _ => stack.push(OpenList {
                ilvl,
                list: ModelNode::new(list_type.node_type())
                    .with_attr("numId", num_id)
                    .with_content(vec![item]),
            }),
        }
    }
    close_all(&mut stack, &mut out);
    out
}

fn close_top(stack: &mut Vec<OpenList>, out: &mut Vec<ModelNode>) {
    let Some(done) = stack.pop() else {
        return;
    };
    match stack.last_mut().and_then(|parent| parent.list.content.last_mut()) {
        Some(parent_item) => parent_item.content.push(done.list),
        None => out.push(done.list),
    }
}

fn close_all(stack: &mut Vec<OpenList>, out: &mut Vec<ModelNode>) {
    while !stack.is_empty() {
        close_top(stack, out);
    }
}

/// Flattens a list node back into numbered paragraphs for export, generating numbering
/// definitions for ids that no longer resolve.
pub fn flatten_list(list: &ModelNode, numbering: &mut Numbering, diagnostics: &mut Vec<String>) -> Vec<ModelNode> {
    let mut out = Vec::new();
    if list.is(node_types::LIST_ITEM) {
        let fmt = list.attr_str("listNumberingType").unwrap_or("bullet");
        let wrapper = ModelNode::new(ListType::from_num_fmt(fmt).node_type()).with_content(vec![list.clone()]);
        flatten_into(&wrapper, 0, None, numbering, diagnostics, &mut out);
    } else {
        flatten_into(list, 0, None, numbering, diagnostics, &mut out);
    }
    out
}

fn flatten_into(
    list: &ModelNode,
    depth: i64,
    inherited_num_id: Option<i64>,
    numbering: &mut Numbering,
    diagnostics: &mut Vec<String>,
    out: &mut Vec<ModelNode>,
) {
    let list_type = ListType::from_node_type(&list.node_type).unwrap_or(ListType::Ordered);
    let mut list_num_id = list.attr_i64("numId").or(inherited_num_id);

    for item in &list.content {
        if item.is_list() {
            flatten_into(item, depth + 1, list_num_id, numbering, diagnostics, out);
            continue;
        }
        if !item.is(node_types::LIST_ITEM) {
            out.push(item.clone());
            continue;
        }
        let num_id = match item.attr_i64("numId").or(list_num_id) {
            Some(id) => id,
            None => {
                let id = numbering.get_new_list_id();
                list_num_id = Some(id);
                id
            }
        };
        let item_type = item
            .attr_str("listNumberingType")
            .map(ListType::from_num_fmt)
            .unwrap_or(list_type);
        if numbering.ensure_definition(num_id, item_type) {
            diagnostics.push(format!("generated numbering definition for numId {num_id}"));
        }
        let level = item.attr_i64("level").unwrap_or(depth);
        let numbering_props = json!({ "numId": num_id, "ilvl": level });

        let mut numbered = false;
        for child in &item.content {
            if child.is_list() {
                flatten_into(child, level + 1, Some(num_id), numbering, diagnostics, out);
            } else if child.is(node_types::PARAGRAPH) && !numbered {
                let mut p = child.clone();
                p.set_attr("numberingProperties", numbering_props.clone());
                out.push(p);
                numbered = true;
            } else {
                out.push(child.clone());
            }
        }
        if !numbered && !item.content.iter().any(ModelNode::is_list) {
            out.push(ModelNode::new(node_types::PARAGRAPH).with_attr("numberingProperties", numbering_props));
        }
    }
}
