//! Effective run styling from the paragraph style, the character style and the run's own
//! formatting.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use crate::model::{mark_types, node_types, Mark, ModelDocument, ModelNode};
use crate::styles::cache::ParagraphContextCache;
use crate::styles::sheet::{properties_to_css, StyleMap, StyleProperties, StyleSheet};
use crate::translators::attributes::number_value;
use crate::translators::run_properties::properties_from_marks;
use crate::units::{parse_points, points_to_pixels};

const BLOCK_ID: &str = "sdBlockId";
pub const DISPLAY_STYLE: &str = "displayStyle";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedRunStyle {
    /// Display attributes: `fontFamily`, `fontSize` (px), `bold`, `italic`, `strike`,
    /// `color`, `underline {style}`, `highlight`, `textAlign`.
    pub style: Map<String, Value>,
    pub diagnostics: Vec<String>,
}

/// Table-of-contents paragraph styles ignore character styles.
pub fn is_toc_style(style_id: &str) -> bool {
    style_id
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("toc"))
}

fn css_to_display(css: &StyleProperties) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in css {
        match key.as_str() {
            "font-family" => {
                out.insert("fontFamily".into(), json!(value));
            }
            "font-size" => {
                if let Some(pt) = parse_points(value) {
                    out.insert("fontSize".into(), number_value(points_to_pixels(pt)));
                }
            }
            "bold" | "italic" | "strike" => {
                out.insert(key.clone(), json!(value == "true"));
            }
            "color" | "highlight" => {
                out.insert(key.clone(), json!(value));
            }
            "underline" => {
                out.insert("underline".into(), json!({ "style": value }));
            }
            "text-align" => {
                out.insert("textAlign".into(), json!(value));
            }
            _ => {}
        }
    }
    out
}

fn same_points(a: &str, b: &str) -> bool {
    match (parse_points(a), parse_points(b)) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => false,
    }
}

/// The run's own formatting. A font or size equal to the document defaults is what
/// every run gets implicitly, so it does not count as explicit.
fn explicit_properties(sheet: &StyleSheet, run_marks: &[Mark]) -> StyleProperties {
    let mut css = properties_to_css(&properties_from_marks(run_marks));
    if css.get("font-family").is_some_and(|f| sheet.defaults.get("font-family") == Some(f)) {
        css.remove("font-family");
    }
    if let (Some(size), Some(default)) = (css.get("font-size"), sheet.defaults.get("font-size")) {
        if same_points(size, default) {
            css.remove("font-size");
        }
    }
    css
}

fn style_map(sheet: &StyleSheet, id: Option<&str>) -> Option<StyleMap> {
    id.filter(|s| !s.is_empty()).map(|s| sheet.get_style_map(s))
}

pub fn resolve_run_style(
    sheet: &StyleSheet,
    paragraph_style: Option<&str>,
    inline_style: Option<&str>,
    run_marks: &[Mark],
) -> ResolvedRunStyle {
    let paragraph = style_map(sheet, paragraph_style);
    resolve_with_paragraph(sheet, paragraph_style, paragraph.as_ref(), inline_style, run_marks)
}

fn resolve_with_paragraph(
    sheet: &StyleSheet,
    paragraph_style: Option<&str>,
    paragraph: Option<&StyleMap>,
    inline_style: Option<&str>,
    run_marks: &[Mark],
) -> ResolvedRunStyle {
    let mut merged = sheet.defaults.clone();
    let mut diagnostics = Vec::new();
    if let Some(map) = paragraph {
        merged.extend(map.styles.clone());
        diagnostics.extend(map.diagnostics.iter().cloned());
    }
    if !paragraph_style.is_some_and(is_toc_style) {
        if let Some(map) = style_map(sheet, inline_style) {
            merged.extend(map.styles);
            diagnostics.extend(map.diagnostics);
        }
    }
    merged.extend(explicit_properties(sheet, run_marks));
    ResolvedRunStyle {
        style: css_to_display(&merged),
        diagnostics,
    }
}

fn run_marks(run: &ModelNode) -> &[Mark] {
    run.content
        .first()
        .map(|leaf| leaf.marks.as_slice())
        .unwrap_or(run.marks.as_slice())
}

fn character_style(marks: &[Mark]) -> Option<&str> {
    marks
        .iter()
        .find(|m| m.mark_type == mark_types::TEXT_STYLE)
        .and_then(|m| m.attr_str("styleId"))
}

/// Writes a resolved `displayStyle` onto every run. Export ignores the attribute.
///
/// Paragraph style maps are cached under the paragraph's `sdBlockId` for `revision`.
/// A paragraph without one, or whose id was already taken earlier in the walk, gets
/// the next free id first.
pub fn decorate_document(
    doc: &mut ModelDocument,
    sheet: &StyleSheet,
    cache: &mut ParagraphContextCache<StyleMap>,
    revision: u64,
) -> usize {
    let mut max_id: u64 = 0;
    doc.root.walk(&mut |n| {
        if n.is(node_types::PARAGRAPH) {
            max_id = max_id.max(block_id(n).unwrap_or(0));
        }
    });
    let mut walk = DecorateWalk {
        sheet,
        cache: &mut *cache,
        revision,
        seen: HashSet::new(),
        next_id: max_id,
        decorated: 0,
    };
    walk.node(&mut doc.root, None);
    let decorated = walk.decorated;
    cache.prune(revision);
    decorated
}

fn block_id(p: &ModelNode) -> Option<u64> {
    p.attr_i64(BLOCK_ID).and_then(|id| u64::try_from(id).ok())
}

struct DecorateWalk<'a> {
    sheet: &'a StyleSheet,
    cache: &'a mut ParagraphContextCache<StyleMap>,
    revision: u64,
    seen: HashSet<u64>,
    next_id: u64,
    decorated: usize,
}

impl DecorateWalk<'_> {
    fn paragraph_id(&mut self, p: &mut ModelNode) -> u64 {
        match block_id(p) {
            Some(id) if self.seen.insert(id) => id,
            _ => {
                self.next_id += 1;
                let id = self.next_id;
                self.seen.insert(id);
                p.set_attr(BLOCK_ID, id);
                id
            }
        }
    }

    fn node(&mut self, node: &mut ModelNode, paragraph: Option<(u64, &str)>) {
        if node.is(node_types::PARAGRAPH) {
            let id = self.paragraph_id(node);
            let style_id = node.attr_str("styleId").unwrap_or_default().to_string();
            for child in &mut node.content {
                self.node(child, Some((id, &style_id)));
            }
            return;
        }
        if node.is(node_types::RUN) {
            let (id, style_id) = paragraph.unwrap_or((0, ""));
            let style_id = (!style_id.is_empty()).then_some(style_id);
            let sheet = self.sheet;
            let paragraph_map = style_id.map(|style| {
                self.cache
                    .get_or_insert_with(id, self.revision, || sheet.get_style_map(style))
                    .clone()
            });
            let marks = run_marks(node).to_vec();
            let resolved = resolve_with_paragraph(sheet, style_id, paragraph_map.as_ref(), character_style(&marks), &marks);
            node.set_attr(DISPLAY_STYLE, Value::Object(resolved.style));
            self.decorated += 1;
            return;
        }
        for child in &mut node.content {
            self.node(child, paragraph);
        }
    }
}
