//! `w:tbl`, `w:tr`, `w:tc` and their property containers.
//!
//! The model has no continuation cells: a vertically merged cell carries `rowspan` and the
//! cells below it that Word writes as `<w:vMerge/>` are removed on import. Export puts
//! them back, one per covered row, so the grid stays rectangular.

use serde_json::{Map, Value};

use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::node_list::{decode_nodes, encode_nodes};
use crate::translators::attributes::{
    attributes_to_value, decode_px_to_twips, decode_string, encode_string, encode_twips_to_px,
    number_value, unowned_attributes, value_to_attributes, value_to_f64, AttrTranslator, VAL_BOOL,
    VAL_COLOR, VAL_INTEGER, VAL_STRING,
};
use crate::translators::passthrough::{consumed_by_parent, not_decodable};
use crate::translators::properties::{
    decode_object, decode_properties, decode_toggle, decode_val, encode_object, encode_properties,
    encode_toggle, encode_val, value_to_xml, xml_to_value, PropertyTranslator,
};
use crate::translators::{DecodeContext, EncodeContext, NodeTranslator, TranslatorKind};
use crate::units::pixels_to_twips;

pub static TABLE: NodeTranslator = NodeTranslator {
    xml_name: Some("w:tbl"),
    sd_names: &[node_types::TABLE],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_table,
    decode: decode_table,
};

pub static TABLE_PROPERTIES: NodeTranslator = NodeTranslator {
    xml_name: Some("w:tblPr"),
    sd_names: &[],
    kind: TranslatorKind::Attribute,
    attributes: &[],
    encode: consumed_by_parent,
    decode: not_decodable,
};

pub static TABLE_GRID: NodeTranslator = NodeTranslator {
    xml_name: Some("w:tblGrid"),
    sd_names: &[],
    kind: TranslatorKind::Attribute,
    attributes: &[],
    encode: consumed_by_parent,
    decode: not_decodable,
};

pub static TABLE_ROW: NodeTranslator = NodeTranslator {
    xml_name: Some("w:tr"),
    sd_names: &[node_types::TABLE_ROW],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_row,
    decode: decode_row,
};

pub static TABLE_ROW_PROPERTIES: NodeTranslator = NodeTranslator {
    xml_name: Some("w:trPr"),
    sd_names: &[],
    kind: TranslatorKind::Attribute,
    attributes: &[],
    encode: consumed_by_parent,
    decode: not_decodable,
};

pub static TABLE_CELL: NodeTranslator = NodeTranslator {
    xml_name: Some("w:tc"),
    sd_names: &[node_types::TABLE_CELL],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_cell,
    decode: decode_cell,
};

pub static TABLE_CELL_PROPERTIES: NodeTranslator = NodeTranslator {
    xml_name: Some("w:tcPr"),
    sd_names: &[],
    kind: TranslatorKind::Attribute,
    attributes: &[],
    encode: consumed_by_parent,
    decode: not_decodable,
};

pub const TBLPR_ORDER: &[&str] = &[
    "w:tblStyle", "w:tblpPr", "w:tblOverlap", "w:bidiVisual", "w:tblStyleRowBandSize",
    "w:tblStyleColBandSize", "w:tblW", "w:jc", "w:tblCellSpacing", "w:tblInd", "w:tblBorders",
    "w:shd", "w:tblLayout", "w:tblCellMar", "w:tblLook", "w:tblCaption", "w:tblDescription",
    "w:tblPrChange",
];

pub const TRPR_ORDER: &[&str] = &[
    "w:cnfStyle", "w:divId", "w:gridBefore", "w:gridAfter", "w:wBefore", "w:wAfter",
    "w:cantSplit", "w:trHeight", "w:tblHeader", "w:tblCellSpacing", "w:jc", "w:hidden",
    "w:ins", "w:del", "w:trPrChange",
];

pub const TCPR_ORDER: &[&str] = &[
    "w:cnfStyle", "w:tcW", "w:gridSpan", "w:hMerge", "w:vMerge", "w:tcBorders", "w:shd",
    "w:noWrap", "w:tcMar", "w:textDirection", "w:tcFitText", "w:vAlign", "w:hideMark",
    "w:headers", "w:cellIns", "w:cellDel", "w:cellMerge", "w:tcPrChange",
];

const WIDTH_ATTRS: &[AttrTranslator] = &[
    AttrTranslator::new("w:w", "width", encode_twips_to_px, decode_px_to_twips),
    AttrTranslator::new("w:type", "type", encode_string, decode_string),
];

const ROW_HEIGHT_ATTRS: &[AttrTranslator] = &[
    AttrTranslator::new("w:val", "height", encode_twips_to_px, decode_px_to_twips),
    AttrTranslator::new("w:hRule", "rule", encode_string, decode_string),
];

const SHADING_ATTRS: &[AttrTranslator] = &[AttrTranslator::new("w:fill", "color", encode_fill, decode_fill)];

fn encode_fill(value: &str) -> Option<Value> {
    (VAL_COLOR.encode)(value)
}

fn decode_fill(value: &Value) -> Option<String> {
    (VAL_COLOR.decode)(value)
}

pub static TABLE_PROPERTY_TABLE: &[PropertyTranslator] = &[
    PropertyTranslator {
        xml_name: "w:tblStyle",
        sd_name: "tableStyleId",
        attributes: &[VAL_STRING],
        encode: encode_val,
        decode: decode_val,
    },
    PropertyTranslator {
        xml_name: "w:tblW",
        sd_name: "tableWidth",
        attributes: WIDTH_ATTRS,
        encode: encode_object,
        decode: decode_object,
    },
    PropertyTranslator {
        xml_name: "w:jc",
        sd_name: "justification",
        attributes: &[VAL_STRING],
        encode: encode_val,
        decode: decode_val,
    },
    PropertyTranslator {
        xml_name: "w:tblInd",
        sd_name: "tableIndent",
        attributes: WIDTH_ATTRS,
        encode: encode_object,
        decode: decode_object,
    },
];

pub static ROW_PROPERTY_TABLE: &[PropertyTranslator] = &[
    PropertyTranslator {
        xml_name: "w:trHeight",
        sd_name: "rowHeight",
        attributes: ROW_HEIGHT_ATTRS,
        encode: encode_object,
        decode: decode_object,
    },
    PropertyTranslator {
        xml_name: "w:tblHeader",
        sd_name: "repeatHeader",
        attributes: &[VAL_BOOL],
        encode: encode_toggle,
        decode: decode_toggle,
    },
    PropertyTranslator {
        xml_name: "w:cantSplit",
        sd_name: "cantSplit",
        attributes: &[VAL_BOOL],
        encode: encode_toggle,
        decode: decode_toggle,
    },
];

pub static CELL_PROPERTY_TABLE: &[PropertyTranslator] = &[
    PropertyTranslator {
        xml_name: "w:tcW",
        sd_name: "cellWidth",
        attributes: WIDTH_ATTRS,
        encode: encode_object,
        decode: decode_object,
    },
    PropertyTranslator {
        xml_name: "w:gridSpan",
        sd_name: "colspan",
        attributes: &[VAL_INTEGER],
        encode: encode_val,
        decode: decode_val,
    },
    PropertyTranslator {
        xml_name: "w:vMerge",
        sd_name: VERTICAL_MERGE,
        attributes: &[],
        encode: encode_vertical_merge,
        decode: decode_vertical_merge,
    },
    PropertyTranslator {
        xml_name: "w:shd",
        sd_name: "background",
        attributes: SHADING_ATTRS,
        encode: encode_object,
        decode: decode_object,
    },
    PropertyTranslator {
        xml_name: "w:vAlign",
        sd_name: "verticalAlign",
        attributes: &[VAL_STRING],
        encode: encode_val,
        decode: decode_val,
    },
];

// Only present on cells in flight between the model and XML; the model itself uses rowspan.
const VERTICAL_MERGE: &str = "verticalMerge";
const RESTART: &str = "restart";
const CONTINUE: &str = "continue";
const CONTINUATION_PROPERTIES: &str = "continuationCellProperties";

fn encode_vertical_merge(_t: &PropertyTranslator, node: &XmlNode) -> Option<Value> {
    let v = match node.val() {
        Some(RESTART) => RESTART,
        _ => CONTINUE,
    };
    Some(Value::String(v.to_string()))
}

fn decode_vertical_merge(_t: &PropertyTranslator, value: &Value, _original: Option<&XmlNode>) -> Option<XmlNode> {
    match value.as_str()? {
        RESTART => Some(XmlNode::element("w:vMerge").with_attr("w:val", RESTART)),
        CONTINUE => Some(XmlNode::element("w:vMerge")),
        _ => None,
    }
}

fn modeled_values(attrs: &Map<String, Value>, table: &[PropertyTranslator]) -> Map<String, Value> {
    table
        .iter()
        .filter_map(|t| attrs.get(t.sd_name).map(|v| (t.sd_name.to_string(), v.clone())))
        .collect()
}

fn encode_table(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    let mut table = ModelNode::new(node_types::TABLE);
    if let Some(tblpr) = node.child("w:tblPr") {
        table.attrs.extend(encode_properties(tblpr, TABLE_PROPERTY_TABLE));
        table.set_attr("tableProperties", xml_to_value(tblpr));
    }
    let mut grid = Vec::new();
    if let Some(raw) = node.child("w:tblGrid") {
        grid = encode_grid(raw);
        table.set_attr("grid", Value::Array(grid.iter().map(|w| number_value(*w)).collect()));
        table.set_attr("tableGrid", xml_to_value(raw));
    }
    let extra = unowned_attributes(node, &[]);
    if !extra.is_empty() {
        table.set_attr("attributes", attributes_to_value(&extra));
    }
    table.content = ctx.block_scope(|ctx| encode_nodes(&node.elements, ctx));
    merge_vertical_cells(&mut table.content, &grid);
    Some(vec![table])
}

fn encode_grid(grid: &XmlNode) -> Vec<f64> {
    grid.children_named("w:gridCol")
        .map(|c| {
            c.attr("w:w")
                .and_then(encode_twips_to_px)
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0)
        })
        .collect()
}

fn grid_before(row: &ModelNode) -> usize {
    row.attr_i64("gridBefore").unwrap_or(0).max(0) as usize
}

fn colspan(cell: &ModelNode) -> usize {
    cell.attr_i64("colspan").unwrap_or(1).max(1) as usize
}

/// Folds `<w:vMerge/>` continuation cells into the `rowspan` of the cell that starts the
/// merge, and fills in `colwidth` from the grid.
fn merge_vertical_cells(rows: &mut Vec<ModelNode>, grid: &[f64]) {
    // (row, cell) of the restart cell currently open in each grid column.
    let mut open: Vec<Option<(usize, usize)>> = Vec::new();
    let mut merges: Vec<((usize, usize), (usize, usize))> = Vec::new();

    for (r, row) in rows.iter().enumerate() {
        if !row.is(node_types::TABLE_ROW) {
            continue;
        }
        let mut col = grid_before(row);
        for (c, cell) in row.content.iter().enumerate() {
            if !cell.is(node_types::TABLE_CELL) {
                continue;
            }
            let span = colspan(cell);
            if open.len() < col + 1 {
                open.resize(col + 1, None);
            }
            match cell.attr_str(VERTICAL_MERGE) {
                Some(CONTINUE) => {
                    if let Some(origin) = open[col] {
                        merges.push((origin, (r, c)));
                    }
                }
                Some(RESTART) => open[col] = Some((r, c)),
                _ => open[col] = None,
            }
            col += span;
        }
    }

    for &((or, oc), (cr, cc)) in &merges {
        let props = rows[cr].content[cc].attr("cellProperties").cloned();
        let origin = &mut rows[or].content[oc];
        let span = origin.attr_i64("rowspan").unwrap_or(1);
        origin.set_attr("rowspan", span + 1);
        let mut continuations = origin
            .attr(CONTINUATION_PROPERTIES)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        continuations.push(props.unwrap_or(Value::Null));
        origin.set_attr(CONTINUATION_PROPERTIES, Value::Array(continuations));
    }
    for &(_, (cr, cc)) in merges.iter().rev() {
        rows[cr].content.remove(cc);
    }

    for row in rows.iter_mut().filter(|r| r.is(node_types::TABLE_ROW)) {
        let mut col = grid_before(row);
        for cell in row.content.iter_mut().filter(|c| c.is(node_types::TABLE_CELL)) {
            cell.attrs.remove(VERTICAL_MERGE);
            let span = colspan(cell);
            if col + span <= grid.len() {
                let widths: Vec<Value> = grid[col..col + span].iter().map(|w| number_value(*w)).collect();
                cell.set_attr("colwidth", Value::Array(widths));
            }
            col += span;
        }
    }
}

fn encode_row(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    let mut row = ModelNode::new(node_types::TABLE_ROW);
    if let Some(trpr) = node.child("w:trPr") {
        row.attrs.extend(encode_properties(trpr, ROW_PROPERTY_TABLE));
        if let Some(n) = trpr.child_val("w:gridBefore").and_then(|v| v.trim().parse::<i64>().ok()) {
            row.set_attr("gridBefore", n);
        }
        row.set_attr("rowProperties", xml_to_value(trpr));
    }
    if let Some(ex) = node.child("w:tblPrEx") {
        row.set_attr("tablePropertyExceptions", xml_to_value(ex));
    }
    let extra = unowned_attributes(node, &[]);
    if !extra.is_empty() {
        row.set_attr("attributes", attributes_to_value(&extra));
    }
    let children: Vec<XmlNode> = node
        .elements
        .iter()
        .filter(|c| !c.is_named("w:tblPrEx"))
        .cloned()
        .collect();
    row.content = ctx.block_scope(|ctx| encode_nodes(&children, ctx));
    Some(vec![row])
}

fn encode_cell(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    let mut cell = ModelNode::new(node_types::TABLE_CELL)
        .with_attr("colspan", 1)
        .with_attr("rowspan", 1);
    if let Some(tcpr) = node.child("w:tcPr") {
        cell.attrs.extend(encode_properties(tcpr, CELL_PROPERTY_TABLE));
        cell.set_attr("cellProperties", xml_to_value(tcpr));
    }
    let extra = unowned_attributes(node, &[]);
    if !extra.is_empty() {
        cell.set_attr("attributes", attributes_to_value(&extra));
    }
    cell.content = ctx.block_scope(|ctx| encode_nodes(&node.elements, ctx));
    Some(vec![cell])
}

fn decode_table(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let mut tbl = XmlNode::element("w:tbl");
    tbl.attributes = value_to_attributes(node.attr("attributes"));

    let original = value_to_xml(node.attr("tableProperties"));
    let values = modeled_values(&node.attrs, TABLE_PROPERTY_TABLE);
    let tblpr = decode_properties("w:tblPr", original.as_ref(), &values, TABLE_PROPERTY_TABLE, TBLPR_ORDER)
        .unwrap_or_else(|| XmlNode::element("w:tblPr"));
    tbl.elements.push(tblpr);
    tbl.elements.push(decode_grid(node));

    let rows = split_vertical_merges(&node.content);
    tbl.elements.extend(decode_nodes(&rows, ctx));
    Some(vec![tbl])
}

fn column_widths(table: &ModelNode) -> Vec<f64> {
    table
        .attr("grid")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(value_to_f64).collect())
        .unwrap_or_default()
}

fn decode_grid(table: &ModelNode) -> XmlNode {
    let widths = column_widths(table);
    if let Some(orig) = value_to_xml(table.attr("tableGrid")) {
        if encode_grid(&orig) == widths {
            return orig;
        }
    }
    XmlNode::element("w:tblGrid").with_children(
        widths
            .iter()
            .map(|w| XmlNode::element("w:gridCol").with_attr("w:w", pixels_to_twips(*w).to_string())),
    )
}

struct PendingMerge {
    col: usize,
    remaining: i64,
    origin: ModelNode,
    next: usize,
    last_row: Option<usize>,
}

impl PendingMerge {
    fn due(&self, row: usize) -> bool {
        self.remaining > 0 && self.last_row != Some(row)
    }

    fn continuation_cell(&mut self, row: usize) -> ModelNode {
        let stored = self
            .origin
            .attr(CONTINUATION_PROPERTIES)
            .and_then(Value::as_array)
            .and_then(|a| a.get(self.next))
            .filter(|v| !v.is_null())
            .cloned();
        self.next += 1;
        self.remaining -= 1;
        self.last_row = Some(row);

        let mut cell = ModelNode::new(node_types::TABLE_CELL)
            .with_attr("colspan", colspan(&self.origin) as i64)
            .with_content(vec![ModelNode::new(node_types::PARAGRAPH)]);
        match stored.as_ref().and_then(|v| value_to_xml(Some(v))) {
            Some(tcpr) => {
                cell.attrs.extend(encode_properties(&tcpr, CELL_PROPERTY_TABLE));
                cell.set_attr("cellProperties", xml_to_value(&tcpr));
            }
            None => {
                cell.attrs.extend(modeled_values(&self.origin.attrs, CELL_PROPERTY_TABLE));
                if let Some(p) = self.origin.attr("cellProperties") {
                    cell.set_attr("cellProperties", p.clone());
                }
            }
        }
        cell.set_attr(VERTICAL_MERGE, CONTINUE);
        cell
    }
}

/// Re-inserts the continuation cells covered by each `rowspan`.
fn split_vertical_merges(rows: &[ModelNode]) -> Vec<ModelNode> {
    let mut pending: Vec<PendingMerge> = Vec::new();
    let mut out = Vec::with_capacity(rows.len());

    for (r, row) in rows.iter().enumerate() {
        if !row.is(node_types::TABLE_ROW) {
            out.push(row.clone());
            continue;
        }
        pending.sort_by_key(|p| p.col);
        let mut new_row = row.clone();
        new_row.content.clear();
        let mut col = grid_before(row);
        let mut started = Vec::new();

        for item in &row.content {
            if !item.is(node_types::TABLE_CELL) {
                new_row.content.push(item.clone());
                continue;
            }
            // Continuations that sit left of (or at) this cell's column come first.
            while let Some(idx) = pending.iter().position(|p| p.col <= col && p.due(r)) {
                let p = &mut pending[idx];
                col = col.max(p.col) + colspan(&p.origin);
                new_row.content.push(p.continuation_cell(r));
            }
            let mut cell = item.clone();
            let rowspan = cell.attr_i64("rowspan").unwrap_or(1);
            if rowspan > 1 {
                cell.set_attr(VERTICAL_MERGE, RESTART);
                started.push(PendingMerge {
                    col,
                    remaining: rowspan - 1,
                    origin: item.clone(),
                    next: 0,
                    last_row: None,
                });
            }
            col += colspan(&cell);
            new_row.content.push(cell);
        }
        for p in pending.iter_mut().filter(|p| p.due(r)) {
            new_row.content.push(p.continuation_cell(r));
        }
        pending.retain(|p| p.remaining > 0);
        pending.extend(started);
        out.push(new_row);
    }
    out
}

fn decode_row(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let mut tr = XmlNode::element("w:tr");
    tr.attributes = value_to_attributes(node.attr("attributes"));
    if let Some(ex) = value_to_xml(node.attr("tablePropertyExceptions")) {
        tr.elements.push(ex);
    }
    let original = value_to_xml(node.attr("rowProperties"));
    let values = modeled_values(&node.attrs, ROW_PROPERTY_TABLE);
    if let Some(trpr) = decode_properties("w:trPr", original.as_ref(), &values, ROW_PROPERTY_TABLE, TRPR_ORDER) {
        tr.elements.push(trpr);
    }
    tr.elements.extend(decode_nodes(&node.content, ctx));
    Some(vec![tr])
}

fn decode_cell(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let mut tc = XmlNode::element("w:tc");
    tc.attributes = value_to_attributes(node.attr("attributes"));

    let original = value_to_xml(node.attr("cellProperties"));
    let mut values = modeled_values(&node.attrs, CELL_PROPERTY_TABLE);
    let span = colspan(node);
    let had_grid_span = original.as_ref().is_some_and(|o| o.has_child("w:gridSpan"));
    if span > 1 || had_grid_span {
        values.insert("colspan".into(), Value::from(span as i64));
    } else {
        values.remove("colspan");
    }
    if node.attr_i64("rowspan").unwrap_or(1) > 1 && !values.contains_key(VERTICAL_MERGE) {
        values.insert(VERTICAL_MERGE.into(), Value::from(RESTART));
    }
    if let Some(tcpr) = decode_properties("w:tcPr", original.as_ref(), &values, CELL_PROPERTY_TABLE, TCPR_ORDER) {
        tc.elements.push(tcpr);
    }

    tc.elements.extend(decode_nodes(&node.content, ctx));
    // A cell must end with a paragraph.
    if !tc.elements.last().is_some_and(|last| last.is_named("w:p")) {
        tc.elements.push(XmlNode::element("w:p"));
    }
    Some(vec![tc])
}
