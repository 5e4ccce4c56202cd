mod common;

use common::{converter, docx, part_xml};
use docx_converter::docx::parts::{DOCUMENT_PART, DOCUMENT_RELS_PART};
use docx_converter::docx::relationships::REL_TYPE_HYPERLINK;
use docx_converter::model::{mark_types, node_types, parse_fragment, Mark, ModelDocument, ModelNode};
use docx_converter::ExportOptions;

const BODY: &str = r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/><w:sz w:val="28"/></w:rPr><w:t>Title</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">Plain </w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>italic</w:t></w:r><w:r><w:tab/><w:t>tabbed</w:t></w:r></w:p><w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/><w:tblLook w:val="04A0"/></w:tblPr><w:tblGrid><w:gridCol w:w="1500"/><w:gridCol w:w="3000"/></w:tblGrid><w:tr><w:tc><w:tcPr><w:tcW w:w="1500" w:type="dxa"/></w:tcPr><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:tcPr><w:tcW w:w="3000" w:type="dxa"/></w:tcPr><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:altChunk r:id="rId9"/>"#;

#[test]
fn untouched_document_exports_unchanged() {
    let mut conv = converter(&docx(BODY, &[]));
    let before = part_xml(&conv, DOCUMENT_PART);
    let doc = conv.import().expect("import");
    let report = conv.export(&doc, ExportOptions::default()).expect("export");
    assert!(report.changed_parts.is_empty(), "{:?}", report.changed_parts);
    assert_eq!(part_xml(&conv, DOCUMENT_PART), before);
}

#[test]
fn package_bytes_reimport_to_the_same_model() {
    let mut conv = converter(&docx(BODY, &[]));
    let doc = conv.import().expect("import");
    conv.export(&doc, ExportOptions::default()).expect("export");
    let bytes = conv.to_docx_bytes().expect("bytes");

    let mut again = converter(&bytes);
    assert_eq!(again.import().expect("reimport"), doc);
}

#[test]
fn model_json_round_trips() {
    let mut conv = converter(&docx(BODY, &[]));
    let doc = conv.import().expect("import");
    let json = doc.to_json().expect("json");
    let parsed = ModelDocument::from_json(&json).expect("parse");
    assert_eq!(parsed, doc);
    assert!(json.contains(r#""type": "table""#));
    assert!(json.contains(r#""type": "passthroughBlock""#));
}

#[test]
fn edited_text_is_written_back() {
    let mut conv = converter(&docx(BODY, &[]));
    let mut doc = conv.import().expect("import");
    doc.root.content[0].walk_mut(&mut |n| {
        if n.text.as_deref() == Some("Title") {
            n.text = Some("Heading".to_string());
        }
    });
    let report = conv.export(&doc, ExportOptions::default()).expect("export");
    assert_eq!(report.changed_parts, vec![DOCUMENT_PART.to_string()]);
    let xml = part_xml(&conv, DOCUMENT_PART);
    assert!(xml.contains(r#"<w:r><w:rPr><w:b/><w:sz w:val="28"/></w:rPr><w:t>Heading</w:t></w:r>"#), "{xml}");
}

#[test]
fn new_link_creates_relationship_part() {
    let mut conv = converter(&docx("<w:p/>", &[]));
    let mut doc = conv.import().expect("import");
    let link = Mark::new(mark_types::LINK).with_attr("href", "https://example.org");
    let run = ModelNode::new(node_types::RUN).with_content(vec![ModelNode::text("site").with_marks(vec![link])]);
    doc.root.content[0].content.push(run);

    let report = conv.export(&doc, ExportOptions::default()).expect("export");
    assert!(report.changed_parts.contains(&DOCUMENT_RELS_PART.to_string()));
    let entry = &conv.relationships().entries()[0];
    assert_eq!(entry.rel_type, REL_TYPE_HYPERLINK);
    assert!(entry.is_external());
    let xml = part_xml(&conv, DOCUMENT_PART);
    assert!(xml.contains(r#"<w:hyperlink r:id="rId1"><w:r><w:t>site</w:t></w:r></w:hyperlink>"#), "{xml}");

    let id = conv.docx_helpers().find_relationship_id_from_target("https://example.org");
    assert_eq!(id.as_deref(), Some("rId1"));
}

const CORE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/"><dc:title>Lease</dc:title><dc:creator>Legal</dc:creator><dcterms:modified>2024-05-06T07:08:09Z</dcterms:modified></cp:coreProperties>"#;

#[test]
fn metadata_comes_from_core_properties() {
    let conv = converter(&docx(BODY, &[("docProps/core.xml", CORE)]));
    let meta = conv.metadata();
    assert_eq!(meta.title.as_deref(), Some("Lease"));
    assert_eq!(meta.creator.as_deref(), Some("Legal"));
    assert_eq!(meta.modified.as_deref(), Some("2024-05-06T07:08:09Z"));
    let json = serde_json::to_value(&meta).expect("json");
    assert_eq!(json["title"], "Lease");
    assert!(json.get("pages").is_none());
}

#[test]
fn inserted_fragment_is_exported_before_the_section_properties() {
    let mut conv = converter(&docx(BODY, &[]));
    let mut doc = conv.import().expect("import");
    let blocks = doc.content().len();
    let fragment = parse_fragment(
        r#"{"type":"doc","content":[{"type":"paragraph","content":[{"type":"run","content":[{"type":"text","text":"Appendix"}]}]}]}"#,
    )
    .expect("fragment");
    assert_eq!(conv.insert_content(&mut doc, fragment, None).expect("insert"), 1);
    assert_eq!(doc.content().len(), blocks + 1);

    let report = conv.export(&doc, ExportOptions::default()).expect("export");
    assert_eq!(report.changed_parts, vec![DOCUMENT_PART.to_string()]);
    let xml = part_xml(&conv, DOCUMENT_PART);
    let appendix = xml.find("<w:t>Appendix</w:t>").expect("inserted text");
    let sect = xml.find("<w:sectPr").expect("sectPr");
    assert!(appendix < sect, "{xml}");

    let mut again = converter(&conv.to_docx_bytes().expect("bytes"));
    assert_eq!(again.import().expect("reimport").content().len(), blocks + 1);
}

#[test]
fn insert_at_the_start_keeps_the_rest_in_order() {
    let mut conv = converter(&docx(BODY, &[]));
    let nodes = vec![ModelNode::text("Preface")];
    let mut doc = conv.import().expect("import");
    conv.insert_content(&mut doc, nodes, Some(0)).expect("insert");
    assert_eq!(doc.content()[0].text_content(), "Preface");
    assert_eq!(doc.content()[1].text_content(), "Title");

    let mut fresh = converter(&docx(BODY, &[]));
    let report = fresh
        .insert(vec![ModelNode::text("Closing")], ExportOptions::default())
        .expect("insert and export");
    assert!(report.changed_parts.contains(&DOCUMENT_PART.to_string()));
    assert!(part_xml(&fresh, DOCUMENT_PART).contains("<w:t>Closing</w:t>"));
}
