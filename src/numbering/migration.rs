//! One-time upgrade of multi-item lists to single-item lists.
//!
//! Every list whose items need splitting is replaced, in one transaction, by a run of
//! single-item lists that share one `numId`, so numbering continues across them. Nested
//! lists become items one level deeper. The transaction is applied to a copy and swapped
//! in only if every step applies.

use anyhow::{anyhow, Context};

use crate::model::{node_types, ModelDocument, ModelNode};
use crate::numbering::lists::{single_item_list, ListType};
use crate::numbering::Numbering;

/// Replaces the node at `path` (child indices from the root) with `replacement`.
#[derive(Clone, Debug)]
pub struct ReplaceStep {
    pub path: Vec<usize>,
    pub replacement: Vec<ModelNode>,
}

#[derive(Clone, Debug, Default)]
pub struct Transaction {
    steps: Vec<ReplaceStep>,
}

impl Transaction {
    pub fn push(&mut self, step: ReplaceStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ReplaceStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Applies all steps to a copy of `root`, last position first so earlier paths stay
    /// valid. Nothing is changed when a step fails.
    pub fn apply(&self, root: &mut ModelNode) -> anyhow::Result<()> {
        let mut ordered: Vec<&ReplaceStep> = self.steps.iter().collect();
        ordered.sort_by(|a, b| b.path.cmp(&a.path));

        let mut draft = root.clone();
        for step in ordered {
            let (last, parent_path) = step
                .path
                .split_last()
                .ok_or_else(|| anyhow!("replace step with an empty path"))?;
            let parent = node_at_mut(&mut draft, parent_path)
                .with_context(|| format!("replace step at {:?}", step.path))?;
            if *last >= parent.content.len() {
                return Err(anyhow!("replace step at {:?} is out of range", step.path));
            }
            parent
                .content
                .splice(*last..=*last, step.replacement.iter().cloned());
        }
        *root = draft;
        Ok(())
    }
}

fn node_at_mut<'a>(root: &'a mut ModelNode, path: &[usize]) -> anyhow::Result<&'a mut ModelNode> {
    let mut node = root;
    for &i in path {
        let len = node.content.len();
        node = node
            .content
            .get_mut(i)
            .ok_or_else(|| anyhow!("index {i} out of range ({len} children)"))?;
    }
    Ok(node)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MigrationReport {
    pub migrated_lists: usize,
    pub created_lists: usize,
    pub generated_definitions: Vec<i64>,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        self.migrated_lists > 0
    }
}

pub fn should_migrate_list(list: &ModelNode) -> bool {
    if !list.is_list() {
        return false;
    }
    match list.content.as_slice() {
        [item] => {
            item.attr("level").is_none()
                || item.attr("listNumberingType").is_none()
                || item.content.iter().any(ModelNode::is_list)
        }
        items => items.len() > 1,
    }
}

pub fn migrate_lists_to_v2(doc: &mut ModelDocument, numbering: &mut Numbering) -> anyhow::Result<MigrationReport> {
    let mut report = MigrationReport::default();
    let mut tx = Transaction::default();
    let mut path = Vec::new();
    collect_steps(&doc.root, &mut path, numbering, &mut tx, &mut report);
    if tx.is_empty() {
        return Ok(report);
    }
    tx.apply(&mut doc.root).context("apply list migration")?;
    log::info!(
        "migrated {} list(s) into {} single-item list(s)",
        report.migrated_lists,
        report.created_lists
    );
    Ok(report)
}

fn collect_steps(
    node: &ModelNode,
    path: &mut Vec<usize>,
    numbering: &mut Numbering,
    tx: &mut Transaction,
    report: &mut MigrationReport,
) {
    for (i, child) in node.content.iter().enumerate() {
        path.push(i);
        if child.is_list() {
            // A list is migrated as a whole; nested lists are handled by the flatten.
            if should_migrate_list(child) {
                let replacement = flatten_to_single_items(child, None, 0, numbering, report);
                report.migrated_lists += 1;
                report.created_lists += replacement.iter().filter(|n| n.is_list()).count();
                tx.push(ReplaceStep {
                    path: path.clone(),
                    replacement,
                });
            }
        } else {
            collect_steps(child, path, numbering, tx, report);
        }
        path.pop();
    }
}

fn first_item_num_id(list: &ModelNode) -> Option<i64> {
    list.content
        .iter()
        .find(|i| i.is(node_types::LIST_ITEM))
        .and_then(|i| i.attr_i64("numId"))
}

fn flatten_to_single_items(
    list: &ModelNode,
    shared_num_id: Option<i64>,
    base_level: i64,
    numbering: &mut Numbering,
    report: &mut MigrationReport,
) -> Vec<ModelNode> {
    let list_type = ListType::from_node_type(&list.node_type).unwrap_or(ListType::Ordered);
    let shared = shared_num_id
        .or_else(|| list.attr_i64("numId"))
        .or_else(|| first_item_num_id(list))
        .unwrap_or_else(|| numbering.get_new_list_id());
    if numbering.ensure_definition(shared, list_type) {
        report.generated_definitions.push(shared);
    }

    let mut out = Vec::new();
    for item in &list.content {
        if item.is_list() {
            out.extend(flatten_to_single_items(item, Some(shared), base_level + 1, numbering, report));
            continue;
        }
        if !item.is(node_types::LIST_ITEM) {
            out.push(item.clone());
            continue;
        }
        let level = item.attr_i64("level").unwrap_or(base_level);
        let details = numbering.get_list_definition_details(shared, level.clamp(0, 8) as u8);
        let num_fmt = item
            .attr_str("listNumberingType")
            .map(str::to_string)
            .or_else(|| details.as_ref().map(|d| d.num_fmt.clone()))
            .unwrap_or_else(|| list_type.default_num_fmt().to_string());
        let lvl_text = item
            .attr_str("lvlText")
            .map(str::to_string)
            .or_else(|| details.and_then(|d| d.lvl_text));

        let mut children = item.content.iter();
        match children.next() {
            Some(first) if first.is_list() => {
                out.extend(flatten_to_single_items(first, Some(shared), level + 1, numbering, report));
            }
            first => {
                let content = first
                    .cloned()
                    .unwrap_or_else(|| ModelNode::new(node_types::PARAGRAPH));
                let mut single = single_item_list(list_type, shared, level, &num_fmt, lvl_text.as_deref(), vec![content]);
                // Keep item-level attrs the editor added (e.g. styling) on the new item.
                if let Some(new_item) = single.content.first_mut() {
                    for (k, v) in &item.attrs {
                        new_item.attrs.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                }
                out.push(single);
            }
        }
        for rest in children {
            if rest.is_list() {
                out.extend(flatten_to_single_items(rest, Some(shared), level + 1, numbering, report));
            } else {
                out.push(rest.clone());
            }
        }
    }
    out
}
