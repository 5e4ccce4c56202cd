mod common;

use common::{converter, docx, part_xml};
use docx_converter::docx::parts::DOCUMENT_PART;
use docx_converter::model::{node_types, ModelNode};
use docx_converter::translators::sdt::ChildEditorFactory;
use docx_converter::ExportOptions;
use serde_json::json;

const FIELD: &str = r#"<w:p><w:sdt><w:sdtPr><w:alias w:val="Client"/><w:tag w:val="{&quot;fieldId&quot;:&quot;f1&quot;,&quot;fieldTypeShort&quot;:&quot;text&quot;,&quot;displayLabel&quot;:&quot;Client name&quot;}"/></w:sdtPr><w:sdtContent><w:r><w:rPr><w:b/></w:rPr><w:t>Client name</w:t></w:r></w:sdtContent></w:sdt></w:p>"#;
const TOC: &str = r#"<w:sdt><w:sdtPr><w:id w:val="-1"/><w:docPartObj><w:docPartGallery w:val="Table of Contents"/><w:docPartUnique/></w:docPartObj></w:sdtPr><w:sdtContent><w:p><w:r><w:t>Contents</w:t></w:r></w:p></w:sdtContent></w:sdt>"#;
const SECTION: &str = r#"<w:sdt><w:sdtPr><w:id w:val="12"/><w:alias w:val="Terms"/><w:tag w:val="{&quot;type&quot;:&quot;documentSection&quot;,&quot;id&quot;:&quot;3&quot;,&quot;title&quot;:&quot;Old&quot;,&quot;description&quot;:&quot;Signed terms&quot;}"/><w:lock w:val="sdtContentLocked"/></w:sdtPr><w:sdtContent><w:p><w:r><w:t>Body</w:t></w:r></w:p></w:sdtContent></w:sdt>"#;
const BLOCK: &str = r#"<w:sdt><w:sdtPr><w:id w:val="4"/></w:sdtPr><w:sdtEndPr><w:rPr><w:b/></w:rPr></w:sdtEndPr><w:sdtContent><w:p><w:r><w:t>Clause</w:t></w:r></w:p></w:sdtContent></w:sdt>"#;
const INLINE: &str = r#"<w:p><w:r><w:t xml:space="preserve">Dear </w:t></w:r><w:sdt><w:sdtPr><w:alias w:val="Recipient"/><w:tag w:val="recipient"/></w:sdtPr><w:sdtContent><w:r><w:rPr><w:i/></w:rPr><w:t>Jane</w:t></w:r></w:sdtContent></w:sdt></w:p>"#;
const COVER: &str = r#"<w:sdt><w:sdtPr><w:docPartObj><w:docPartGallery w:val="Cover Pages"/></w:docPartObj></w:sdtPr><w:sdtContent><w:p><w:r><w:t>Cover</w:t></w:r></w:p></w:sdtContent></w:sdt>"#;

fn body() -> String {
    [FIELD, TOC, SECTION, BLOCK, INLINE, COVER].concat()
}

#[test]
fn each_control_imports_as_exactly_one_node_type() {
    let mut conv = converter(&docx(&body(), &[]));
    let doc = conv.import().expect("import");
    for ty in [
        node_types::FIELD_ANNOTATION,
        node_types::DOC_PART_OBJECT,
        node_types::DOCUMENT_SECTION,
        node_types::STRUCTURED_CONTENT_BLOCK,
        node_types::STRUCTURED_CONTENT,
        node_types::PASSTHROUGH_BLOCK,
    ] {
        assert_eq!(doc.root.count(ty), 1, "{ty}");
    }
}

#[test]
fn unchanged_controls_export_byte_for_byte() {
    let mut conv = converter(&docx(&body(), &[]));
    let before = part_xml(&conv, DOCUMENT_PART);
    let doc = conv.import().expect("import");
    let report = conv.export(&doc, ExportOptions::default()).expect("export");
    assert_eq!(part_xml(&conv, DOCUMENT_PART), before);
    assert!(report.changed_parts.is_empty(), "{:?}", report.changed_parts);
}

#[test]
fn final_doc_unwraps_only_inline_controls() {
    let mut conv = converter(&docx(&body(), &[]));
    let doc = conv.import().expect("import");
    let options = ExportOptions {
        final_doc: true,
        ..ExportOptions::default()
    };
    conv.export(&doc, options).expect("export");
    let xml = part_xml(&conv, DOCUMENT_PART);
    assert!(!xml.contains("Recipient"), "{xml}");
    assert!(xml.contains(r#"<w:r><w:rPr><w:i/></w:rPr><w:t>Jane</w:t></w:r>"#));
    assert!(xml.contains(r#"<w:id w:val="4"/>"#));
    assert!(xml.contains("Table of Contents"));
}

struct Fragments {
    seen: Vec<String>,
}

impl ChildEditorFactory for Fragments {
    fn create_child_editor(&mut self, annotation: &ModelNode, html: &str) -> anyhow::Result<Vec<ModelNode>> {
        self.seen.push(annotation.attr_str("fieldId").unwrap_or_default().to_string());
        Ok(vec![ModelNode::text(html.replace("<b>", "").replace("</b>", ""))])
    }
}

#[test]
fn html_annotations_are_filled_in_document_order() {
    let field = |id: &str, html: &str| {
        format!(
            r#"<w:p><w:sdt><w:sdtPr><w:tag w:val='{{"fieldId":"{id}","fieldTypeShort":"html","rawHtml":"{html}"}}'/></w:sdtPr><w:sdtContent><w:r><w:t>{id}</w:t></w:r></w:sdtContent></w:sdt></w:p>"#
        )
    };
    let body = [field("h1", "&lt;b&gt;one&lt;/b&gt;"), FIELD.to_string(), field("h2", "two")].concat();
    let mut conv = converter(&docx(&body, &[]));
    let mut doc = conv.import().expect("import");
    let mut factory = Fragments { seen: Vec::new() };
    let filled = conv.process_html_annotations(&mut doc, &mut factory).expect("process");
    assert_eq!(filled, 2);
    assert_eq!(factory.seen, vec!["h1", "h2"]);

    let mut texts = Vec::new();
    doc.root.walk(&mut |n| {
        if n.is(node_types::FIELD_ANNOTATION) && n.attr("rawHtml").is_some() {
            texts.push(n.text_content());
        }
    });
    assert_eq!(texts, vec!["one", "two"]);
    let first = doc.content()[0].content[0].clone();
    assert_eq!(first.attr("type"), Some(&json!("html")));
}
