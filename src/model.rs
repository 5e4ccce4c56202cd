//! Document-model tree produced by import and consumed by export.
//!
//! The JSON shape (`type`, `attrs`, `content`, `marks`, `text`) matches what the editing
//! layer stores, so a `ModelDocument` can be handed over as plain JSON.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Attrs = Map<String, Value>;

pub mod node_types {
    pub const DOC: &str = "doc";
    pub const PARAGRAPH: &str = "paragraph";
    pub const RUN: &str = "run";
    pub const TEXT: &str = "text";
    pub const TAB: &str = "tab";
    pub const LINE_BREAK: &str = "lineBreak";
    pub const IMAGE: &str = "image";
    pub const TABLE: &str = "table";
    pub const TABLE_ROW: &str = "tableRow";
    pub const TABLE_CELL: &str = "tableCell";
    pub const ORDERED_LIST: &str = "orderedList";
    pub const BULLET_LIST: &str = "bulletList";
    pub const LIST_ITEM: &str = "listItem";
    pub const FIELD_ANNOTATION: &str = "fieldAnnotation";
    pub const STRUCTURED_CONTENT: &str = "structuredContent";
    pub const STRUCTURED_CONTENT_BLOCK: &str = "structuredContentBlock";
    pub const DOCUMENT_SECTION: &str = "documentSection";
    pub const DOC_PART_OBJECT: &str = "docPartObject";
    pub const BOOKMARK_START: &str = "bookmarkStart";
    pub const BOOKMARK_END: &str = "bookmarkEnd";
    pub const PASSTHROUGH_BLOCK: &str = "passthroughBlock";
    pub const PASSTHROUGH_INLINE: &str = "passthroughInline";
}

pub mod mark_types {
    pub const BOLD: &str = "bold";
    pub const ITALIC: &str = "italic";
    pub const UNDERLINE: &str = "underline";
    pub const STRIKE: &str = "strike";
    pub const HIGHLIGHT: &str = "highlight";
    pub const TEXT_STYLE: &str = "textStyle";
    pub const LINK: &str = "link";
    pub const TRACK_INSERT: &str = "trackInsert";
    pub const TRACK_DELETE: &str = "trackDelete";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub mark_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(mark_type: impl Into<String>) -> Self {
        Self {
            mark_type: mark_type.into(),
            attrs: Attrs::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Attrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ModelNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ModelNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            attrs: Attrs::new(),
            content: Vec::new(),
            marks: Vec::new(),
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(node_types::TEXT)
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn with_content(mut self, content: Vec<ModelNode>) -> Self {
        self.content = content;
        self
    }

    pub fn with_marks(mut self, marks: Vec<Mark>) -> Self {
        self.marks = marks;
        self
    }

    pub fn is(&self, node_type: &str) -> bool {
        self.node_type == node_type
    }

    pub fn is_list(&self) -> bool {
        self.node_type == node_types::ORDERED_LIST || self.node_type == node_types::BULLET_LIST
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key).filter(|v| !v.is_null())
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(Value::as_str)
    }

    pub fn attr_i64(&self, key: &str) -> Option<i64> {
        self.attr(key).and_then(value_as_i64)
    }

    pub fn attr_f64(&self, key: &str) -> Option<f64> {
        self.attr(key).and_then(Value::as_f64)
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attr(key).and_then(Value::as_bool)
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<Value>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    pub fn mark(&self, mark_type: &str) -> Option<&Mark> {
        self.marks.iter().find(|m| m.mark_type == mark_type)
    }

    pub fn has_mark(&self, mark_type: &str) -> bool {
        self.mark(mark_type).is_some()
    }

    /// Adds or replaces the mark of the same type.
    pub fn add_mark(&mut self, mark: Mark) {
        self.marks.retain(|m| m.mark_type != mark.mark_type);
        self.marks.push(mark);
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Calls `f` on every node below (and including) this one, depth-first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a ModelNode)) {
        f(self);
        for child in &self.content {
            child.walk(f);
        }
    }

    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut ModelNode)) {
        f(self);
        for child in &mut self.content {
            child.walk_mut(f);
        }
    }

    pub fn count(&self, node_type: &str) -> usize {
        let mut n = 0;
        self.walk(&mut |node| {
            if node.node_type == node_type {
                n += 1;
            }
        });
        n
    }
}

fn collect_text(node: &ModelNode, out: &mut String) {
    if let Some(t) = node.text.as_deref() {
        out.push_str(t);
    }
    for child in &node.content {
        collect_text(child, out);
    }
}

/// Numbers are sometimes stored as strings by older producers; accept both.
pub fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Node types that live inside a paragraph rather than at block level.
const INLINE_TYPES: &[&str] = &[
    node_types::RUN,
    node_types::TEXT,
    node_types::TAB,
    node_types::LINE_BREAK,
    node_types::IMAGE,
    node_types::FIELD_ANNOTATION,
    node_types::STRUCTURED_CONTENT,
    node_types::PASSTHROUGH_INLINE,
    node_types::BOOKMARK_START,
    node_types::BOOKMARK_END,
];

pub fn is_inline_type(node_type: &str) -> bool {
    INLINE_TYPES.contains(&node_type)
}

/// Parses content to insert: a `doc` node (its children are taken), a single node, or
/// an array of nodes.
pub fn parse_fragment(json: &str) -> anyhow::Result<Vec<ModelNode>> {
    let value: Value = serde_json::from_str(json).context("parse fragment json")?;
    let nodes: Vec<ModelNode> = match value {
        Value::Array(_) => serde_json::from_value(value).context("fragment nodes")?,
        _ => vec![serde_json::from_value(value).context("fragment node")?],
    };
    Ok(nodes
        .into_iter()
        .flat_map(|n| if n.is(node_types::DOC) { n.content } else { vec![n] })
        .collect())
}

/// One paragraph per line of `text`; blank lines give empty paragraphs.
pub fn text_fragment(text: &str) -> Vec<ModelNode> {
    text.lines()
        .map(|line| {
            let p = ModelNode::new(node_types::PARAGRAPH);
            if line.is_empty() {
                p
            } else {
                p.with_content(vec![ModelNode::new(node_types::RUN).with_content(vec![ModelNode::text(line)])])
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    pub root: ModelNode,
}

impl ModelDocument {
    pub fn new(content: Vec<ModelNode>) -> Self {
        Self {
            root: ModelNode::new(node_types::DOC).with_content(content),
        }
    }

    pub fn content(&self) -> &[ModelNode] {
        &self.root.content
    }

    /// Inserts `nodes` as top-level blocks before `index`, or at the end. Consecutive
    /// inline nodes are gathered into one paragraph. Returns the number of blocks added.
    pub fn insert_content(&mut self, nodes: Vec<ModelNode>, index: Option<usize>) -> anyhow::Result<usize> {
        let len = self.root.content.len();
        let at = index.unwrap_or(len);
        if at > len {
            return Err(anyhow!("insert position {at} is past the end of the document ({len} blocks)"));
        }
        let mut blocks = Vec::new();
        let mut inline = Vec::new();
        for node in nodes {
            if node.is(node_types::DOC) {
                return Err(anyhow!("a doc node can only appear at the top of a fragment"));
            }
            if is_inline_type(&node.node_type) {
                inline.push(node);
                continue;
            }
            if !inline.is_empty() {
                blocks.push(ModelNode::new(node_types::PARAGRAPH).with_content(std::mem::take(&mut inline)));
            }
            blocks.push(node);
        }
        if !inline.is_empty() {
            blocks.push(ModelNode::new(node_types::PARAGRAPH).with_content(inline));
        }
        let added = blocks.len();
        self.root.content.splice(at..at, blocks);
        Ok(added)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let root: ModelNode = serde_json::from_str(json)?;
        Ok(Self { root })
    }
}
