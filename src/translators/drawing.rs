//! `w:drawing` pictures <-> `image` nodes.
//!
//! Only pictures (`a:blip`) are modeled; charts, shapes and SmartArt fall through to the
//! passthrough translator. The imported drawing is kept whole in `originalDrawing` and
//! export patches it, so unmodeled positioning survives an edit of size or source.

use serde_json::{json, Value};

use crate::docx::relationships::REL_TYPE_IMAGE;
use crate::docx::xml::XmlNode;
use crate::model::{node_types, ModelNode};
use crate::translators::attributes::{number_value, value_to_f64};
use crate::translators::properties::{value_to_xml, xml_to_value};
use crate::translators::{DecodeContext, EncodeContext, NodeTranslator, TranslatorKind};
use crate::units::{close_polygon, emu_to_pixels, open_polygon, pixels_to_emu};

pub static DRAWING: NodeTranslator = NodeTranslator {
    xml_name: Some("w:drawing"),
    sd_names: &[node_types::IMAGE],
    kind: TranslatorKind::Node,
    attributes: &[],
    encode: encode_drawing,
    decode: decode_drawing,
};

const ORIGINAL_DRAWING: &str = "originalDrawing";

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

const WRAP_TYPES: &[(&str, &str)] = &[
    ("wp:wrapNone", "None"),
    ("wp:wrapSquare", "Square"),
    ("wp:wrapTight", "Tight"),
    ("wp:wrapThrough", "Through"),
    ("wp:wrapTopAndBottom", "TopAndBottom"),
];

fn emu_attr(node: &XmlNode, name: &str) -> Option<f64> {
    node.attr(name)?.trim().parse::<f64>().ok().map(emu_to_pixels)
}

fn descendant_mut<'a>(node: &'a mut XmlNode, name: &str) -> Option<&'a mut XmlNode> {
    for child in node.elements.iter_mut() {
        if child.is_named(name) {
            return Some(child);
        }
        if let Some(found) = descendant_mut(child, name) {
            return Some(found);
        }
    }
    None
}

fn polygon_points(polygon: &XmlNode) -> Vec<[f64; 2]> {
    polygon
        .child_elements()
        .filter(|c| c.is_named("wp:start") || c.is_named("wp:lineTo"))
        .filter_map(|c| Some([emu_attr(c, "x")?, emu_attr(c, "y")?]))
        .collect()
}

fn encode_drawing(node: &XmlNode, ctx: &mut EncodeContext<'_>) -> Option<Vec<ModelNode>> {
    let frame = node.child("wp:inline").or_else(|| node.child("wp:anchor"))?;
    let blip = frame.find_descendant("a:blip")?;

    let mut image = ModelNode::new(node_types::IMAGE);
    if let Some(rid) = blip.attr("r:embed") {
        image.set_attr("rId", rid);
        match ctx.relationships.target_of(rid) {
            Some(target) => image.set_attr("src", format!("word/{}", target.trim_start_matches('/'))),
            None => ctx.diagnostic(format!("image relationship {rid} not found")),
        }
    }
    if let Some(extent) = frame.child("wp:extent") {
        if let (Some(w), Some(h)) = (emu_attr(extent, "cx"), emu_attr(extent, "cy")) {
            image.set_attr("size", json!({ "width": number_value(w), "height": number_value(h) }));
        }
    }
    if let Some(doc_pr) = frame.child("wp:docPr") {
        if let Some(id) = doc_pr.attr("id") {
            image.set_attr("id", id);
        }
        if let Some(alt) = doc_pr.attr("descr") {
            image.set_attr("alt", alt);
        }
        if let Some(title) = doc_pr.attr("title") {
            image.set_attr("title", title);
        }
    }
    let anchored = frame.is_named("wp:anchor");
    image.set_attr("isAnchor", anchored);
    if anchored {
        if let Some((el, wrap_type)) = WRAP_TYPES
            .iter()
            .find_map(|(name, ty)| frame.child(name).map(|el| (el, *ty)))
        {
            let mut wrap = json!({ "type": wrap_type });
            if let Some(polygon) = el.child("wp:wrapPolygon") {
                let points: Vec<Value> = open_polygon(&polygon_points(polygon))
                    .into_iter()
                    .map(|[x, y]| json!([number_value(x), number_value(y)]))
                    .collect();
                wrap["polygon"] = Value::Array(points);
            }
            image.set_attr("wrap", wrap);
        }
    }
    image.set_attr(ORIGINAL_DRAWING, xml_to_value(node));
    Some(vec![image])
}

fn image_relationship(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<String> {
    let rid = node.attr_str("rId");
    let Some(src) = node.attr_str("src") else {
        return rid.map(str::to_string);
    };
    let target = src.trim_start_matches('/');
    let target = target.strip_prefix("word/").unwrap_or(target);
    if let Some(rid) = rid {
        if ctx.relationships.target_of(rid).is_some_and(|t| t.trim_start_matches('/') == target) {
            return Some(rid.to_string());
        }
    }
    Some(ctx.relationships.insert_new_relationship(target, REL_TYPE_IMAGE))
}

fn size_emu(node: &ModelNode) -> Option<(i64, i64)> {
    let size = node.attr("size")?;
    let w = size.get("width").and_then(value_to_f64)?;
    let h = size.get("height").and_then(value_to_f64)?;
    Some((pixels_to_emu(w), pixels_to_emu(h)))
}

fn wrap_polygon(points: &[[f64; 2]], template: Option<&XmlNode>) -> XmlNode {
    let mut polygon = template
        .cloned()
        .unwrap_or_else(|| XmlNode::element("wp:wrapPolygon").with_attr("edited", "0"));
    polygon.elements.clear();
    for (i, [x, y]) in close_polygon(points).into_iter().enumerate() {
        let name = if i == 0 { "wp:start" } else { "wp:lineTo" };
        polygon.elements.push(
            XmlNode::element(name)
                .with_attr("x", pixels_to_emu(x).to_string())
                .with_attr("y", pixels_to_emu(y).to_string()),
        );
    }
    polygon
}

fn model_polygon(wrap: &Value) -> Option<Vec<[f64; 2]>> {
    let points = wrap.get("polygon")?.as_array()?;
    points
        .iter()
        .map(|p| {
            let pair = p.as_array()?;
            Some([value_to_f64(pair.first()?)?, value_to_f64(pair.get(1)?)?])
        })
        .collect()
}

fn apply_wrap(frame: &mut XmlNode, wrap: &Value) {
    let Some(wrap_type) = wrap.get("type").and_then(Value::as_str) else {
        return;
    };
    let Some((name, _)) = WRAP_TYPES.iter().find(|(_, ty)| *ty == wrap_type) else {
        return;
    };
    let pos = frame
        .elements
        .iter()
        .position(|c| WRAP_TYPES.iter().any(|(n, _)| c.is_named(n)));
    let existing = pos.map(|i| frame.elements[i].clone());
    let mut el = match existing {
        Some(e) if e.is_named(name) => e,
        _ => {
            let mut e = XmlNode::element(*name);
            if matches!(wrap_type, "Square" | "Tight" | "Through") {
                e.set_attr("wrapText", "bothSides");
            }
            e
        }
    };
    if let Some(points) = model_polygon(wrap).filter(|p| !p.is_empty()) {
        let template = el.remove_child("wp:wrapPolygon");
        el.elements.push(wrap_polygon(&points, template.as_ref()));
    }
    match pos {
        Some(i) => frame.elements[i] = el,
        None => {
            let at = frame
                .elements
                .iter()
                .position(|c| c.is_named("wp:docPr"))
                .unwrap_or(frame.elements.len());
            frame.elements.insert(at, el);
        }
    }
}

fn decode_drawing(node: &ModelNode, ctx: &mut DecodeContext<'_>) -> Option<Vec<XmlNode>> {
    let rid = image_relationship(node, ctx);
    let Some(rid) = rid else {
        ctx.diagnostic("image without src or rId dropped");
        return Some(Vec::new());
    };
    let drawing = match value_to_xml(node.attr(ORIGINAL_DRAWING)) {
        Some(mut original) => {
            patch_drawing(&mut original, node, &rid);
            original
        }
        None => new_inline_drawing(node, &rid),
    };
    Some(vec![drawing])
}

fn patch_drawing(drawing: &mut XmlNode, node: &ModelNode, rid: &str) {
    if let Some(blip) = descendant_mut(drawing, "a:blip") {
        blip.set_attr("r:embed", rid);
    }
    if let Some((cx, cy)) = size_emu(node) {
        for name in ["wp:extent", "a:ext"] {
            if let Some(ext) = descendant_mut(drawing, name) {
                ext.set_attr("cx", cx.to_string());
                ext.set_attr("cy", cy.to_string());
            }
        }
    }
    if let Some(doc_pr) = descendant_mut(drawing, "wp:docPr") {
        set_or_remove(doc_pr, "descr", node.attr_str("alt"));
        set_or_remove(doc_pr, "title", node.attr_str("title"));
    }
    if let (Some(wrap), Some(frame)) = (node.attr("wrap"), descendant_mut(drawing, "wp:anchor")) {
        apply_wrap(frame, wrap);
    }
}

fn set_or_remove(node: &mut XmlNode, key: &str, value: Option<&str>) {
    match value {
        Some(v) => node.set_attr(key, v),
        None => {
            node.remove_attr(key);
        }
    }
}

fn new_inline_drawing(node: &ModelNode, rid: &str) -> XmlNode {
    let (cx, cy) = size_emu(node).unwrap_or((0, 0));
    let id = node.attr_str("id").unwrap_or("1").to_string();
    let mut doc_pr = XmlNode::element("wp:docPr")
        .with_attr("id", id.as_str())
        .with_attr("name", format!("Picture {id}"));
    set_or_remove(&mut doc_pr, "descr", node.attr_str("alt"));
    set_or_remove(&mut doc_pr, "title", node.attr_str("title"));

    let pic = XmlNode::element("pic:pic")
        .with_attr("xmlns:pic", NS_PIC)
        .with_child(
            XmlNode::element("pic:nvPicPr")
                .with_child(
                    XmlNode::element("pic:cNvPr")
                        .with_attr("id", "0")
                        .with_attr("name", format!("Picture {id}")),
                )
                .with_child(XmlNode::element("pic:cNvPicPr")),
        )
        .with_child(
            XmlNode::element("pic:blipFill")
                .with_child(XmlNode::element("a:blip").with_attr("r:embed", rid))
                .with_child(XmlNode::element("a:stretch").with_child(XmlNode::element("a:fillRect"))),
        )
        .with_child(
            XmlNode::element("pic:spPr")
                .with_child(
                    XmlNode::element("a:xfrm")
                        .with_child(XmlNode::element("a:off").with_attr("x", "0").with_attr("y", "0"))
                        .with_child(
                            XmlNode::element("a:ext")
                                .with_attr("cx", cx.to_string())
                                .with_attr("cy", cy.to_string()),
                        ),
                )
                .with_child(
                    XmlNode::element("a:prstGeom")
                        .with_attr("prst", "rect")
                        .with_child(XmlNode::element("a:avLst")),
                ),
        );

    let inline = XmlNode::element("wp:inline")
        .with_attr("distT", "0")
        .with_attr("distB", "0")
        .with_attr("distL", "0")
        .with_attr("distR", "0")
        .with_child(
            XmlNode::element("wp:extent")
                .with_attr("cx", cx.to_string())
                .with_attr("cy", cy.to_string()),
        )
        .with_child(doc_pr)
        .with_child(
            XmlNode::element("wp:cNvGraphicFramePr").with_child(
                XmlNode::element("a:graphicFrameLocks")
                    .with_attr("xmlns:a", NS_A)
                    .with_attr("noChangeAspect", "1"),
            ),
        )
        .with_child(
            XmlNode::element("a:graphic").with_attr("xmlns:a", NS_A).with_child(
                XmlNode::element("a:graphicData")
                    .with_attr("uri", NS_PIC)
                    .with_child(pic),
            ),
        );
    XmlNode::element("w:drawing").with_child(inline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListMode;
    use crate::docx::relationships::Relationships;
    use crate::docx::xml::parse_xml_str;
    use crate::numbering::Numbering;
    use crate::translators::HandlerTable;

    const RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/></Relationships>"#;

    const ANCHORED: &str = concat!(
        r#"<w:drawing><wp:anchor behindDoc="0" distT="0" distB="0" distL="114300" distR="114300">"#,
        r#"<wp:simplePos x="0" y="0"/><wp:extent cx="952500" cy="476250"/>"#,
        r#"<wp:wrapTight wrapText="bothSides"><wp:wrapPolygon edited="0"><wp:start x="0" y="0"/><wp:lineTo x="9525" y="0"/><wp:lineTo x="9525" y="9525"/><wp:lineTo x="0" y="0"/></wp:wrapPolygon></wp:wrapTight>"#,
        r#"<wp:docPr id="3" name="Picture 3" descr="Logo"/>"#,
        r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic><pic:blipFill><a:blip r:embed="rId4"/></pic:blipFill>"#,
        r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="952500" cy="476250"/></a:xfrm></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:anchor></w:drawing>"#
    );

    fn rels() -> Relationships {
        Relationships::from_xml(&parse_xml_str("r", RELS).expect("parse"))
    }

    fn encode(xml: &str, rels: &Relationships) -> Option<ModelNode> {
        let node = parse_xml_str("t", xml).expect("parse").root;
        let handlers = HandlerTable::new().expect("table");
        let numbering = Numbering::default();
        let mut ctx = EncodeContext::new(&handlers, &numbering, rels, ListMode::Normalized);
        encode_drawing(&node, &mut ctx).map(|mut v| v.remove(0))
    }

    fn decode(node: &ModelNode, rels: &mut Relationships) -> XmlNode {
        let handlers = HandlerTable::new().expect("table");
        let mut numbering = Numbering::default();
        let mut ctx = DecodeContext::new(&handlers, &mut numbering, rels, false);
        decode_drawing(node, &mut ctx).expect("xml").remove(0)
    }

    #[test]
    fn anchored_picture_is_modeled() {
        let image = encode(ANCHORED, &rels()).expect("image");
        assert_eq!(image.attr_str("src"), Some("word/media/image1.png"));
        assert_eq!(image.attr_str("rId"), Some("rId4"));
        assert_eq!(image.attr("size"), Some(&json!({"width": 100, "height": 50})));
        assert_eq!(image.attr_str("alt"), Some("Logo"));
        assert_eq!(image.attr_bool("isAnchor"), Some(true));
        let wrap = image.attr("wrap").expect("wrap");
        assert_eq!(wrap["type"], json!("Tight"));
        assert_eq!(wrap["polygon"], json!([[0, 0], [1, 0], [1, 1]]));
    }

    #[test]
    fn unchanged_picture_roundtrips() {
        let original = parse_xml_str("t", ANCHORED).expect("parse").root;
        let mut rels = rels();
        let image = encode(ANCHORED, &rels).expect("image");
        assert_eq!(decode(&image, &mut rels), original);
        assert_eq!(rels.entries().len(), 1);
    }

    #[test]
    fn resize_and_new_source_patch_the_original() {
        let mut rels = rels();
        let mut image = encode(ANCHORED, &rels).expect("image");
        image.set_attr("size", json!({"width": 200, "height": 100}));
        image.set_attr("src", "word/media/image2.png");
        let out = decode(&image, &mut rels);
        assert_eq!(out.find_descendant("wp:extent").and_then(|e| e.attr("cx")), Some("1905000"));
        assert_eq!(out.find_descendant("a:ext").and_then(|e| e.attr("cy")), Some("952500"));
        assert_eq!(out.find_descendant("a:blip").and_then(|b| b.attr("r:embed")), Some("rId5"));
        assert_eq!(rels.target_of("rId5"), Some("media/image2.png"));
        let polygon = out.find_descendant("wp:wrapPolygon").expect("polygon");
        assert_eq!(polygon.elements.len(), 4, "closing point restored");
    }

    #[test]
    fn charts_are_not_pictures() {
        let chart = r#"<w:drawing><wp:inline><wp:extent cx="1" cy="1"/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/chart"><c:chart r:id="rId9"/></a:graphicData></a:graphic></wp:inline></w:drawing>"#;
        assert!(encode(chart, &rels()).is_none());
    }

    #[test]
    fn editor_inserted_image_builds_inline_drawing() {
        let image = ModelNode::new(node_types::IMAGE)
            .with_attr("src", "word/media/pasted.png")
            .with_attr("size", json!({"width": 96, "height": 48}))
            .with_attr("alt", "chart");
        let mut rels = rels();
        let out = decode(&image, &mut rels);
        let inline = out.child("wp:inline").expect("inline");
        assert_eq!(inline.child("wp:extent").and_then(|e| e.attr("cx")), Some("914400"));
        assert_eq!(inline.child("wp:docPr").and_then(|d| d.attr("descr")), Some("chart"));
        assert_eq!(out.find_descendant("a:blip").and_then(|b| b.attr("r:embed")), Some("rId5"));
    }
}
