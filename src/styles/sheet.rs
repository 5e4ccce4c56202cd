//! `word/styles.xml` as a table of linked styles.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::docx::xml::{XmlDocument, XmlNode};
use crate::translators::properties::encode_properties;
use crate::translators::run_properties::RUN_PROPERTY_TABLE;

pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 20;

/// Style properties as CSS-like `name -> value` pairs (`font-size` -> `"11pt"`).
pub type StyleProperties = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleAttrs {
    pub based_on: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleDefinition {
    pub attrs: StyleAttrs,
    pub styles: StyleProperties,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkedStyle {
    pub id: String,
    /// `paragraph`, `character`, `table` or `numbering`.
    pub style_type: String,
    pub definition: StyleDefinition,
}

impl LinkedStyle {
    pub fn new(id: impl Into<String>, style_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            style_type: style_type.into(),
            definition: StyleDefinition::default(),
        }
    }

    pub fn based_on(mut self, parent: impl Into<String>) -> Self {
        self.definition.attrs.based_on = Some(parent.into());
        self
    }

    pub fn with_style(mut self, key: &str, value: impl Into<String>) -> Self {
        self.definition.styles.insert(key.to_string(), value.into());
        self
    }
}

/// Result of walking one `basedOn` chain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleMap {
    pub styles: StyleProperties,
    /// Style ids visited, most specific first.
    pub chain: Vec<String>,
    pub diagnostics: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct StyleSheet {
    pub defaults: StyleProperties,
    styles: BTreeMap<String, LinkedStyle>,
    max_chain_depth: usize,
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self {
            defaults: StyleProperties::new(),
            styles: BTreeMap::new(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

/// Model property keys that have a CSS-like name in the style sheet.
const CSS_KEYS: &[(&str, &str)] = &[
    ("fontFamily", "font-family"),
    ("fontSize", "font-size"),
    ("bold", "bold"),
    ("italic", "italic"),
    ("strike", "strike"),
    ("color", "color"),
    ("underline", "underline"),
    ("highlight", "highlight"),
];

/// Run properties (as produced by the `w:rPr` translators) to style-sheet form.
pub fn properties_to_css(values: &Map<String, Value>) -> StyleProperties {
    let mut out = StyleProperties::new();
    for (model_key, css_key) in CSS_KEYS {
        let text = match values.get(*model_key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        out.insert((*css_key).to_string(), text);
    }
    out
}

fn rpr_to_css(rpr: &XmlNode) -> StyleProperties {
    properties_to_css(&encode_properties(rpr, RUN_PROPERTY_TABLE))
}

fn parse_style(node: &XmlNode) -> Option<LinkedStyle> {
    let id = node.attr("w:styleId")?;
    let style_type = node.attr("w:type").unwrap_or("paragraph");
    let mut style = LinkedStyle::new(id, style_type);
    style.definition.attrs.based_on = node.child_val("w:basedOn").map(str::to_string);
    style.definition.attrs.name = node.child_val("w:name").map(str::to_string);
    if let Some(rpr) = node.child("w:rPr") {
        style.definition.styles = rpr_to_css(rpr);
    }
    if let Some(jc) = node.child("w:pPr").and_then(|p| p.child_val("w:jc")) {
        style.definition.styles.insert("text-align".into(), jc.to_string());
    }
    Some(style)
}

impl StyleSheet {
    pub fn parse(doc: &XmlDocument) -> Self {
        let root = &doc.root;
        let defaults = root
            .child("w:docDefaults")
            .and_then(|d| d.child("w:rPrDefault"))
            .and_then(|d| d.child("w:rPr"))
            .map(rpr_to_css)
            .unwrap_or_default();
        let mut sheet = Self {
            defaults,
            ..Self::default()
        };
        for node in root.children_named("w:style") {
            if let Some(style) = parse_style(node) {
                sheet.styles.insert(style.id.clone(), style);
            }
        }
        log::debug!("style sheet: {} style(s)", sheet.styles.len());
        sheet
    }

    pub fn from_styles(defaults: StyleProperties, styles: impl IntoIterator<Item = LinkedStyle>) -> Self {
        Self {
            defaults,
            styles: styles.into_iter().map(|s| (s.id.clone(), s)).collect(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth.max(1);
        self
    }

    pub fn get(&self, id: &str) -> Option<&LinkedStyle> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Merged properties of `id` and its `basedOn` ancestors, ancestors first so the
    /// most specific style wins.
    ///
    /// A cycle or a chain longer than the depth ceiling stops the walk: what was
    /// collected so far is merged and one diagnostic is recorded.
    pub fn get_style_map(&self, id: &str) -> StyleMap {
        let mut out = StyleMap::default();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut chain: Vec<&LinkedStyle> = Vec::new();
        let mut next = Some(id);

        while let Some(current) = next {
            if !visited.insert(current) {
                out.diagnostics.push(format!("style {id}: basedOn cycle at {current}"));
                break;
            }
            if chain.len() >= self.max_chain_depth {
                out.diagnostics.push(format!(
                    "style {id}: basedOn chain deeper than {}",
                    self.max_chain_depth
                ));
                break;
            }
            let Some(style) = self.styles.get(current) else {
                if current != id {
                    log::debug!("style {id}: basedOn target {current} is missing");
                }
                break;
            };
            chain.push(style);
            next = style.definition.attrs.based_on.as_deref();
        }

        for style in chain.iter().rev() {
            out.styles.extend(
                style
                    .definition
                    .styles
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        out.chain = chain.iter().map(|s| s.id.clone()).collect();
        if let Some(first) = out.diagnostics.first() {
            log::warn!("{first}; using the partial merge");
        }
        out
    }
}
