//! The orchestrator: owns the parsed package parts and runs import and export.

use std::path::Path;

use anyhow::{anyhow, Context};

use crate::config::{ConverterConfig, ExportSection};
use crate::docx::content_types::{empty_content_types, ContentTypes, NUMBERING_CONTENT_TYPE};
use crate::docx::metadata::{read_metadata, DocumentMetadata};
use crate::docx::package::{build_package, DocxPackage};
use crate::docx::parts::{
    find_part_name, fingerprints, part_bytes, xml_part, xml_part_mut, Part, PartMap, CONTENT_TYPES_PART,
    DOCUMENT_PART, DOCUMENT_RELS_PART, NUMBERING_PART, STYLES_PART,
};
use crate::docx::relationships::{RelationshipEntry, Relationships, REL_TYPE_NUMBERING};
use crate::docx::xml::{XmlDocument, XmlNode};
use crate::model::{node_types, Mark, ModelDocument, ModelNode};
use crate::node_list::{decode_nodes, encode_nodes};
use crate::numbering::migration::{migrate_lists_to_v2, MigrationReport};
use crate::numbering::Numbering;
use crate::styles::{decorate_document, resolve_run_style, ParagraphContextCache, ResolvedRunStyle, StyleMap, StyleSheet};
use crate::translators::attributes::{attributes_to_value, value_to_attributes};
use crate::translators::properties::{value_to_xml, xml_to_value};
use crate::translators::sdt::field_annotation::process_html_annotations;
use crate::translators::sdt::ChildEditorFactory;
use crate::translators::{DecodeContext, EncodeContext, HandlerTable};
use crate::validators::{validate_document, ValidationReport};

pub const BODY_SECT_PR: &str = "bodySectPr";
pub const DOCUMENT_ATTRIBUTES: &str = "documentAttributes";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    /// Inline structured content is written as plain runs, without its `w:sdt`.
    pub final_doc: bool,
    pub run_validators: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            final_doc: false,
            run_validators: true,
        }
    }
}

impl From<&ExportSection> for ExportOptions {
    fn from(section: &ExportSection) -> Self {
        Self {
            final_doc: section.final_doc,
            run_validators: section.run_validators,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExportReport {
    /// Parts whose bytes differ from before the export, including new parts.
    pub changed_parts: Vec<String>,
    pub diagnostics: Vec<String>,
    pub validation: ValidationReport,
}

/// Relationship lookups for code that edits the document between import and export.
pub struct DocxHelpers<'a> {
    relationships: &'a mut Relationships,
}

impl DocxHelpers<'_> {
    pub fn find_relationship_id_from_target(&self, target: &str) -> Option<String> {
        self.relationships
            .find_relationship_id_from_target(target)
            .map(str::to_string)
    }

    pub fn insert_new_relationship(&mut self, target: &str, rel_type: &str) -> String {
        self.relationships.insert_new_relationship(target, rel_type)
    }
}

pub struct Converter {
    handlers: HandlerTable,
    parts: PartMap,
    document_part: String,
    numbering: Numbering,
    relationships: Relationships,
    saved_relationships: Vec<RelationshipEntry>,
    styles: StyleSheet,
    config: ConverterConfig,
    package: Option<DocxPackage>,
    paragraph_cache: ParagraphContextCache<StyleMap>,
    revision: u64,
}

fn parse_optional(parts: &mut PartMap, canonical: &str) -> anyhow::Result<Option<XmlDocument>> {
    let Some(name) = find_part_name(parts, canonical) else {
        return Ok(None);
    };
    let doc = xml_part_mut(parts, &name)?.cloned();
    Ok(doc)
}

impl Converter {
    /// Parses the parts the converter reads. A missing or unparsable `document.xml`, or an
    /// unparsable styles, numbering or relationships part, is fatal.
    pub fn from_parts(mut parts: PartMap, config: ConverterConfig) -> anyhow::Result<Self> {
        let document_part = find_part_name(&parts, DOCUMENT_PART)
            .ok_or_else(|| anyhow!("package has no {DOCUMENT_PART}"))?;
        xml_part_mut(&mut parts, &document_part)?;

        let styles = parse_optional(&mut parts, STYLES_PART)?
            .map(|doc| StyleSheet::parse(&doc))
            .unwrap_or_default()
            .with_max_chain_depth(config.styles.max_chain_depth);
        let numbering = parse_optional(&mut parts, NUMBERING_PART)?
            .map(|doc| Numbering::parse(&doc))
            .unwrap_or_default();
        let relationships = parse_optional(&mut parts, DOCUMENT_RELS_PART)?
            .map(|doc| Relationships::from_xml(&doc))
            .unwrap_or_default();
        log::debug!(
            "loaded {} part(s): {} style(s), {} relationship(s)",
            parts.len(),
            styles.len(),
            relationships.entries().len()
        );

        Ok(Self {
            handlers: HandlerTable::new()?,
            saved_relationships: relationships.entries().to_vec(),
            paragraph_cache: ParagraphContextCache::new(config.cache.retention),
            parts,
            document_part,
            numbering,
            relationships,
            styles,
            config,
            package: None,
            revision: 0,
        })
    }

    pub fn from_docx_bytes(bytes: &[u8], config: ConverterConfig) -> anyhow::Result<Self> {
        let package = DocxPackage::from_bytes(bytes)?;
        let mut converter = Self::from_parts(package.to_parts(), config)?;
        converter.package = Some(package);
        Ok(converter)
    }

    pub fn from_docx_path(path: &Path, config: ConverterConfig) -> anyhow::Result<Self> {
        let package = DocxPackage::read(path)?;
        let mut converter = Self::from_parts(package.to_parts(), config)
            .with_context(|| format!("load {}", path.display()))?;
        converter.package = Some(package);
        Ok(converter)
    }

    pub fn parts(&self) -> &PartMap {
        &self.parts
    }

    pub fn into_parts(self) -> PartMap {
        self.parts
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    pub fn numbering(&self) -> &Numbering {
        &self.numbering
    }

    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    pub fn docx_helpers(&mut self) -> DocxHelpers<'_> {
        DocxHelpers {
            relationships: &mut self.relationships,
        }
    }

    fn document(&self) -> anyhow::Result<XmlDocument> {
        xml_part(&self.parts, &self.document_part)?
            .ok_or_else(|| anyhow!("package has no {DOCUMENT_PART}"))
    }

    pub fn import(&mut self) -> anyhow::Result<ModelDocument> {
        let document = self.document()?;
        let body = document
            .root
            .child("w:body")
            .ok_or_else(|| anyhow!("{} has no w:body", self.document_part))?;

        let mut ctx = EncodeContext::new(
            &self.handlers,
            &self.numbering,
            &self.relationships,
            self.config.import.list_mode,
        );
        let mut content = encode_nodes(&body.elements, &mut ctx);
        let diagnostics = ctx.diagnostics;
        if content.is_empty() {
            content.push(ModelNode::new(node_types::PARAGRAPH));
        }

        let mut doc = ModelDocument::new(content);
        if let Some(sect_pr) = body.child("w:sectPr") {
            doc.root.set_attr(BODY_SECT_PR, xml_to_value(sect_pr));
        }
        if !document.root.attributes.is_empty() {
            doc.root
                .set_attr(DOCUMENT_ATTRIBUTES, attributes_to_value(&document.root.attributes));
        }
        for d in &diagnostics {
            log::debug!("import: {d}");
        }
        log::info!(
            "imported {} block(s) with {} diagnostic(s)",
            doc.content().len(),
            diagnostics.len()
        );

        if self.config.import.decorate_runs {
            self.decorate(&mut doc);
        }
        Ok(doc)
    }

    /// Writes a resolved `displayStyle` onto every run of `doc`.
    pub fn decorate(&mut self, doc: &mut ModelDocument) -> usize {
        self.revision += 1;
        decorate_document(doc, &self.styles, &mut self.paragraph_cache, self.revision)
    }

    pub fn resolve_run_style(
        &self,
        paragraph_style: Option<&str>,
        inline_style: Option<&str>,
        run_marks: &[Mark],
    ) -> ResolvedRunStyle {
        resolve_run_style(&self.styles, paragraph_style, inline_style, run_marks)
    }

    /// Rewrites multi-item lists in `doc` as single-item lists, adding numbering
    /// definitions where needed.
    pub fn migrate_lists(&mut self, doc: &mut ModelDocument) -> anyhow::Result<MigrationReport> {
        migrate_lists_to_v2(doc, &mut self.numbering)
    }

    /// Title, author, dates and counts recorded in the package's property parts.
    pub fn metadata(&self) -> DocumentMetadata {
        read_metadata(&self.parts)
    }

    /// Inserts `nodes` into `doc` before block `index`, or at the end. The edit counts as
    /// a new revision; runs are re-decorated when import decorates them.
    pub fn insert_content(
        &mut self,
        doc: &mut ModelDocument,
        nodes: Vec<ModelNode>,
        index: Option<usize>,
    ) -> anyhow::Result<usize> {
        let added = doc.insert_content(nodes, index)?;
        if self.config.import.decorate_runs {
            self.decorate(doc);
        } else {
            self.revision += 1;
        }
        log::info!("inserted {added} block(s)");
        Ok(added)
    }

    /// Imports the package, appends `nodes` and exports the result.
    pub fn insert(&mut self, nodes: Vec<ModelNode>, options: ExportOptions) -> anyhow::Result<ExportReport> {
        let mut doc = self.import()?;
        self.insert_content(&mut doc, nodes, None)?;
        self.export(&doc, options)
    }

    pub fn process_html_annotations(
        &self,
        doc: &mut ModelDocument,
        factory: &mut dyn ChildEditorFactory,
    ) -> anyhow::Result<usize> {
        process_html_annotations(doc, factory)
    }

    pub fn export(&mut self, doc: &ModelDocument, options: ExportOptions) -> anyhow::Result<ExportReport> {
        let before = fingerprints(&self.parts);
        let mut report = ExportReport::default();

        let mut document = self.document()?;
        let mut ctx = DecodeContext::new(
            &self.handlers,
            &mut self.numbering,
            &mut self.relationships,
            options.final_doc,
        );
        let mut body_children = decode_nodes(doc.content(), &mut ctx);
        report.diagnostics = ctx.diagnostics;
        if let Some(sect_pr) = value_to_xml(doc.root.attr(BODY_SECT_PR)) {
            body_children.push(sect_pr);
        }
        let attributes = value_to_attributes(doc.root.attr(DOCUMENT_ATTRIBUTES));
        if !attributes.is_empty() {
            document.root.attributes = attributes;
        }
        match document.root.child_mut("w:body") {
            Some(body) => body.elements = body_children,
            None => document
                .root
                .elements
                .push(XmlNode::element("w:body").with_children(body_children)),
        }
        self.parts
            .insert(self.document_part.clone(), Part::Xml(document));

        self.write_numbering()?;
        self.write_relationships();

        if options.run_validators {
            report.validation = validate_document(&mut self.parts)?;
            if report.validation.modified {
                self.reload_tables()?;
            }
        }

        let after = fingerprints(&self.parts);
        report.changed_parts = after
            .iter()
            .filter(|(name, hash)| before.get(*name) != Some(*hash))
            .map(|(name, _)| name.clone())
            .collect();
        log::info!(
            "exported: {} changed part(s), {} diagnostic(s), {} repair(s)",
            report.changed_parts.len(),
            report.diagnostics.len(),
            report.validation.results.len()
        );
        Ok(report)
    }

    /// Writes `numbering.xml` when definitions were added. A new part also gets its
    /// relationship and content-type override.
    fn write_numbering(&mut self) -> anyhow::Result<()> {
        if !self.numbering.is_modified() {
            return Ok(());
        }
        let name = find_part_name(&self.parts, NUMBERING_PART);
        let is_new = name.is_none();
        let name = name.unwrap_or_else(|| NUMBERING_PART.to_string());
        self.parts.insert(name, Part::Xml(self.numbering.to_xml()));
        if !is_new {
            return Ok(());
        }
        self.relationships.ensure_type(REL_TYPE_NUMBERING, "numbering.xml");
        let ct_name = find_part_name(&self.parts, CONTENT_TYPES_PART)
            .unwrap_or_else(|| CONTENT_TYPES_PART.to_string());
        if !self.parts.contains_key(&ct_name) {
            self.parts
                .insert(ct_name.clone(), Part::Xml(empty_content_types()));
        }
        if let Some(types) = xml_part_mut(&mut self.parts, &ct_name)? {
            ContentTypes::new(types).ensure_override(NUMBERING_PART, NUMBERING_CONTENT_TYPE);
        }
        log::info!("created {NUMBERING_PART}");
        Ok(())
    }

    fn write_relationships(&mut self) {
        if self.relationships.entries() == self.saved_relationships.as_slice() {
            return;
        }
        let name = find_part_name(&self.parts, DOCUMENT_RELS_PART)
            .unwrap_or_else(|| DOCUMENT_RELS_PART.to_string());
        self.parts
            .insert(name, Part::Xml(self.relationships.to_xml()));
        self.saved_relationships = self.relationships.entries().to_vec();
    }

    /// Re-reads the tables the validators may have repaired.
    fn reload_tables(&mut self) -> anyhow::Result<()> {
        if let Some(doc) = xml_part(&self.parts, DOCUMENT_RELS_PART)? {
            self.relationships = Relationships::from_xml(&doc);
            self.saved_relationships = self.relationships.entries().to_vec();
        }
        if let Some(name) = find_part_name(&self.parts, NUMBERING_PART) {
            if let Some(doc) = xml_part(&self.parts, &name)? {
                self.numbering = Numbering::parse(&doc);
            }
        }
        Ok(())
    }

    /// Runs the validators on the parts as they are, without exporting.
    pub fn validate(&mut self) -> anyhow::Result<ValidationReport> {
        let report = validate_document(&mut self.parts)?;
        if report.modified {
            self.reload_tables()?;
        }
        Ok(report)
    }

    pub fn to_docx_bytes(&self) -> anyhow::Result<Vec<u8>> {
        match &self.package {
            Some(package) => package.write_parts_to_vec(&self.parts),
            None => {
                let bytes: Vec<(String, Vec<u8>)> = self
                    .parts
                    .iter()
                    .map(|(name, part)| (name.clone(), part_bytes(part)))
                    .collect();
                let entries: Vec<(&str, &[u8])> = bytes
                    .iter()
                    .map(|(name, data)| (name.as_str(), data.as_slice()))
                    .collect();
                build_package(&entries)
            }
        }
    }

    pub fn write_docx(&self, path: &Path) -> anyhow::Result<()> {
        match &self.package {
            Some(package) => package.write_parts_to_path(path, &self.parts),
            None => std::fs::write(path, self.to_docx_bytes()?)
                .with_context(|| format!("write docx: {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::write_node_string;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#;

    fn parts() -> PartMap {
        let mut parts = PartMap::new();
        parts.insert(DOCUMENT_PART.to_string(), Part::Text(DOCUMENT.to_string()));
        parts
    }

    #[test]
    fn missing_document_is_fatal() {
        let err = Converter::from_parts(PartMap::new(), ConverterConfig::default())
            .err()
            .expect("no document");
        assert!(err.to_string().contains(DOCUMENT_PART));
    }

    #[test]
    fn unparsable_styles_are_fatal() {
        let mut parts = parts();
        parts.insert(STYLES_PART.to_string(), Part::Text("<w:styles><w:style>".to_string()));
        assert!(Converter::from_parts(parts, ConverterConfig::default()).is_err());
    }

    #[test]
    fn import_keeps_section_and_root_attributes() {
        let mut converter = Converter::from_parts(parts(), ConverterConfig::default()).expect("load");
        let doc = converter.import().expect("import");
        assert_eq!(doc.content().len(), 1);
        assert!(doc.root.attr(BODY_SECT_PR).is_some());
        assert!(doc.root.attr(DOCUMENT_ATTRIBUTES).is_some());
    }

    #[test]
    fn empty_body_imports_one_paragraph() {
        let mut parts = PartMap::new();
        parts.insert(DOCUMENT_PART.to_string(), Part::Text("<w:document><w:body/></w:document>".into()));
        let mut converter = Converter::from_parts(parts, ConverterConfig::default()).expect("load");
        let doc = converter.import().expect("import");
        assert_eq!(doc.content().len(), 1);
        assert!(doc.content()[0].is(node_types::PARAGRAPH));
    }

    #[test]
    fn unchanged_export_changes_no_bytes() {
        let mut converter = Converter::from_parts(parts(), ConverterConfig::default()).expect("load");
        let doc = converter.import().expect("import");
        let report = converter.export(&doc, ExportOptions::default()).expect("export");
        assert!(report.changed_parts.is_empty(), "{:?}", report.changed_parts);
        assert!(!report.validation.modified);
    }

    #[test]
    fn new_list_creates_numbering_part() {
        let mut converter = Converter::from_parts(parts(), ConverterConfig::default()).expect("load");
        let mut doc = converter.import().expect("import");
        let item = ModelNode::new(node_types::LIST_ITEM)
            .with_content(vec![ModelNode::new(node_types::PARAGRAPH).with_content(vec![ModelNode::text("one")])]);
        let mut content = doc.root.content.clone();
        content.push(ModelNode::new(node_types::BULLET_LIST).with_content(vec![item]));
        doc.root.content = content;

        let report = converter.export(&doc, ExportOptions::default()).expect("export");
        assert!(report.changed_parts.contains(&NUMBERING_PART.to_string()));
        assert!(report.changed_parts.contains(&DOCUMENT_RELS_PART.to_string()));
        assert!(report.changed_parts.contains(&CONTENT_TYPES_PART.to_string()));
        assert!(converter.relationships().entries().iter().any(|e| e.rel_type == REL_TYPE_NUMBERING));

        let body = xml_part(converter.parts(), DOCUMENT_PART).expect("parse").expect("document");
        let xml = write_node_string(&body.root);
        assert!(xml.contains(r#"<w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr>"#), "{xml}");
    }

    #[test]
    fn docx_helpers_allocate_ids() {
        let mut converter = Converter::from_parts(parts(), ConverterConfig::default()).expect("load");
        let mut helpers = converter.docx_helpers();
        let id = helpers.insert_new_relationship("media/image1.png", crate::docx::relationships::REL_TYPE_IMAGE);
        assert_eq!(id, "rId1");
        assert_eq!(helpers.find_relationship_id_from_target("word/media/image1.png").as_deref(), Some("rId1"));
    }
}
