#![allow(dead_code)]

use docx_converter::config::ConverterConfig;
use docx_converter::docx::package::build_package;
use docx_converter::docx::parts::xml_part;
use docx_converter::docx::xml::write_node_string;
use docx_converter::Converter;

pub const W_NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

pub const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

pub const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Wraps body children in a `w:document`.
pub fn document(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document {W_NS}><w:body>{body}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#
    )
}

/// A minimal package: content types, package rels, `document.xml` and any extra parts.
pub fn docx(body: &str, extra: &[(&str, &str)]) -> Vec<u8> {
    let doc = document(body);
    let mut entries: Vec<(&str, &[u8])> = vec![
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/document.xml", doc.as_bytes()),
    ];
    for (name, xml) in extra {
        entries.push((name, xml.as_bytes()));
    }
    build_package(&entries).expect("build package")
}

pub fn converter(bytes: &[u8]) -> Converter {
    Converter::from_docx_bytes(bytes, ConverterConfig::default()).expect("load package")
}

pub fn converter_with(bytes: &[u8], config: ConverterConfig) -> Converter {
    Converter::from_docx_bytes(bytes, config).expect("load package")
}

/// Serialized root element of a part, without the declaration.
pub fn part_xml(converter: &Converter, name: &str) -> String {
    let doc = xml_part(converter.parts(), name)
        .expect("parse part")
        .unwrap_or_else(|| panic!("missing part {name}"));
    write_node_string(&doc.root)
}

pub fn styles(body: &str) -> String {
    format!(
        r#"<w:styles {W_NS}><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri"/><w:sz w:val="22"/></w:rPr></w:rPrDefault></w:docDefaults><w:style w:type="paragraph" w:styleId="Normal"><w:name w:val="Normal"/></w:style>{body}</w:styles>"#
    )
}
