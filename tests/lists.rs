mod common;

use common::{converter, converter_with, docx, part_xml, W_NS};
use docx_converter::config::{ConverterConfig, ListMode};
use docx_converter::docx::parts::{DOCUMENT_PART, NUMBERING_PART};
use docx_converter::model::node_types;
use docx_converter::ExportOptions;

fn numbering() -> String {
    format!(
        r#"<w:numbering {W_NS}><w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/></w:lvl><w:lvl w:ilvl="1"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="o"/></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#
    )
}

fn item(text: &str, ilvl: u8) -> String {
    format!(
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="{ilvl}"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
    )
}

fn nested_list_docx() -> Vec<u8> {
    let body = format!(
        "<w:p><w:r><w:t>intro</w:t></w:r></w:p>{}{}{}{}",
        item("a", 0),
        item("a.1", 1),
        item("a.2", 1),
        item("b", 0)
    );
    docx(&body, &[("word/numbering.xml", &numbering())])
}

/// `w:ilvl` values of the exported body, in document order.
fn exported_levels(xml: &str) -> Vec<String> {
    xml.split(r#"<w:ilvl w:val=""#)
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .map(str::to_string)
        .collect()
}

#[test]
fn normalized_import_gives_one_list_per_paragraph() {
    let mut conv = converter(&nested_list_docx());
    let doc = conv.import().expect("import");
    let lists: Vec<_> = doc.content().iter().filter(|n| n.is_list()).collect();
    assert_eq!(lists.len(), 4);
    assert!(lists.iter().all(|l| l.is(node_types::BULLET_LIST) && l.content.len() == 1));
    let levels: Vec<i64> = lists
        .iter()
        .map(|l| l.content[0].attr_i64("level").expect("level"))
        .collect();
    assert_eq!(levels, vec![0, 1, 1, 0]);
}

#[test]
fn legacy_lists_migrate_and_export_with_shared_num_id() {
    let mut config = ConverterConfig::default();
    config.import.list_mode = ListMode::Legacy;
    let mut conv = converter_with(&nested_list_docx(), config);
    let mut doc = conv.import().expect("import");
    assert_eq!(doc.content().iter().filter(|n| n.is_list()).count(), 1);

    let report = conv.migrate_lists(&mut doc).expect("migrate");
    assert_eq!(report.migrated_lists, 1);
    assert_eq!(report.created_lists, 4);
    assert!(report.generated_definitions.is_empty());

    let texts: Vec<String> = doc
        .content()
        .iter()
        .filter(|n| n.is_list())
        .map(|l| l.text_content())
        .collect();
    assert_eq!(texts, vec!["a", "a.1", "a.2", "b"]);

    let export = conv.export(&doc, ExportOptions::default()).expect("export");
    assert!(!export.changed_parts.contains(&NUMBERING_PART.to_string()));
    let body = part_xml(&conv, DOCUMENT_PART);
    assert_eq!(exported_levels(&body), vec!["0", "1", "1", "0"]);
    assert_eq!(body.matches(r#"<w:numId w:val="1"/>"#).count(), 4, "{body}");
}

#[test]
fn migration_twice_changes_nothing() {
    let mut config = ConverterConfig::default();
    config.import.list_mode = ListMode::Legacy;
    let mut conv = converter_with(&nested_list_docx(), config);
    let mut doc = conv.import().expect("import");
    conv.migrate_lists(&mut doc).expect("first");
    let snapshot = doc.clone();
    let second = conv.migrate_lists(&mut doc).expect("second");
    assert!(!second.changed());
    assert_eq!(doc, snapshot);
}

#[test]
fn unresolved_num_id_stays_a_paragraph_and_is_repaired_on_export() {
    let body = r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="42"/></w:numPr></w:pPr><w:r><w:t>orphan</w:t></w:r></w:p>"#;
    let mut conv = converter(&docx(body, &[("word/numbering.xml", &numbering())]));
    let doc = conv.import().expect("import");
    assert!(doc.content()[0].is(node_types::PARAGRAPH));

    let report = conv.export(&doc, ExportOptions::default()).expect("export");
    assert!(report.validation.modified);
    let xml = part_xml(&conv, DOCUMENT_PART);
    assert!(!xml.contains("w:numPr"), "{xml}");
    assert!(xml.contains("orphan"));
}

#[test]
fn num_with_missing_abstract_definition_is_not_exported() {
    let numbering = format!(
        r#"<w:numbering {W_NS}><w:num w:numId="5"><w:abstractNumId w:val="99"/></w:num></w:numbering>"#
    );
    let body = r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="5"/></w:numPr></w:pPr><w:r><w:t>stray</w:t></w:r></w:p>"#;
    let mut conv = converter(&docx(body, &[("word/numbering.xml", &numbering)]));
    let doc = conv.import().expect("import");
    assert!(doc.content()[0].is(node_types::PARAGRAPH));

    let report = conv.export(&doc, ExportOptions::default()).expect("export");
    assert!(report.validation.modified);
    assert!(report.changed_parts.contains(&NUMBERING_PART.to_string()), "{:?}", report.changed_parts);
    let xml = part_xml(&conv, DOCUMENT_PART);
    assert!(!xml.contains(r#"<w:numId w:val="5"/>"#), "{xml}");
    assert!(xml.contains("stray"));
    assert!(!part_xml(&conv, NUMBERING_PART).contains(r#"w:numId="5""#));

    let again = conv.export(&doc, ExportOptions::default()).expect("second export");
    assert!(again.changed_parts.is_empty(), "{:?}", again.changed_parts);
}
