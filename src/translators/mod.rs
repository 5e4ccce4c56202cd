//! Element translators and the table that dispatches to them.
//!
//! Every OOXML tag the converter understands is owned by exactly one [`NodeTranslator`],
//! looked up by tag name on import and by model node type on export. The set of
//! translators is closed: [`TranslatorId`] enumerates it and [`TranslatorId::config`] is an
//! exhaustive match, so adding a translator without registering it does not compile.

use std::collections::HashMap;

use anyhow::bail;

use crate::config::ListMode;
use crate::docx::relationships::Relationships;
use crate::docx::xml::XmlNode;
use crate::model::{Mark, ModelNode};
use crate::numbering::Numbering;

pub mod attributes;
pub mod bookmark;
pub mod drawing;
pub mod list;
pub mod paragraph;
pub mod paragraph_properties;
pub mod passthrough;
pub mod properties;
pub mod run;
pub mod run_properties;
pub mod sdt;
pub mod table;
pub mod wrappers;

use attributes::AttrTranslator;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranslatorKind {
    /// Produces model nodes.
    Node,
    /// A property container (`w:rPr`, `w:pPr`, ...) read by the translator of its parent.
    Attribute,
}

pub type EncodeFn = fn(&XmlNode, &mut EncodeContext<'_>) -> Option<Vec<ModelNode>>;
pub type DecodeFn = fn(&ModelNode, &mut DecodeContext<'_>) -> Option<Vec<XmlNode>>;

pub struct NodeTranslator {
    /// Tag owned on import; `None` for model-only types such as lists.
    pub xml_name: Option<&'static str>,
    /// Model types owned on export.
    pub sd_names: &'static [&'static str],
    pub kind: TranslatorKind,
    pub attributes: &'static [AttrTranslator],
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranslatorId {
    Paragraph,
    ParagraphProperties,
    Run,
    RunProperties,
    Text,
    DeletedText,
    Tab,
    Break,
    CarriageReturn,
    Hyperlink,
    Insertion,
    Deletion,
    BookmarkStart,
    BookmarkEnd,
    Table,
    TableProperties,
    TableGrid,
    TableRow,
    TableRowProperties,
    TableCell,
    TableCellProperties,
    Drawing,
    Sdt,
    SdtProperties,
    SdtEndProperties,
    SectionProperties,
    List,
    Passthrough,
}

impl TranslatorId {
    pub const ALL: &'static [TranslatorId] = &[
        TranslatorId::Paragraph,
        TranslatorId::ParagraphProperties,
        TranslatorId::Run,
        TranslatorId::RunProperties,
        TranslatorId::Text,
        TranslatorId::DeletedText,
        TranslatorId::Tab,
        TranslatorId::Break,
        TranslatorId::CarriageReturn,
        TranslatorId::Hyperlink,
        TranslatorId::Insertion,
        TranslatorId::Deletion,
        TranslatorId::BookmarkStart,
        TranslatorId::BookmarkEnd,
        TranslatorId::Table,
        TranslatorId::TableProperties,
        TranslatorId::TableGrid,
        TranslatorId::TableRow,
        TranslatorId::TableRowProperties,
        TranslatorId::TableCell,
        TranslatorId::TableCellProperties,
        TranslatorId::Drawing,
        TranslatorId::Sdt,
        TranslatorId::SdtProperties,
        TranslatorId::SdtEndProperties,
        TranslatorId::SectionProperties,
        TranslatorId::List,
        TranslatorId::Passthrough,
    ];

    pub fn config(self) -> &'static NodeTranslator {
        match self {
            TranslatorId::Paragraph => &paragraph::PARAGRAPH,
            TranslatorId::ParagraphProperties => &paragraph_properties::PARAGRAPH_PROPERTIES,
            TranslatorId::Run => &run::RUN,
            TranslatorId::RunProperties => &run_properties::RUN_PROPERTIES,
            TranslatorId::Text => &run::TEXT,
            TranslatorId::DeletedText => &run::DELETED_TEXT,
            TranslatorId::Tab => &run::TAB,
            TranslatorId::Break => &run::BREAK,
            TranslatorId::CarriageReturn => &run::CARRIAGE_RETURN,
            TranslatorId::Hyperlink => &wrappers::HYPERLINK,
            TranslatorId::Insertion => &wrappers::INSERTION,
            TranslatorId::Deletion => &wrappers::DELETION,
            TranslatorId::BookmarkStart => &bookmark::BOOKMARK_START,
            TranslatorId::BookmarkEnd => &bookmark::BOOKMARK_END,
            TranslatorId::Table => &table::TABLE,
            TranslatorId::TableProperties => &table::TABLE_PROPERTIES,
            TranslatorId::TableGrid => &table::TABLE_GRID,
            TranslatorId::TableRow => &table::TABLE_ROW,
            TranslatorId::TableRowProperties => &table::TABLE_ROW_PROPERTIES,
            TranslatorId::TableCell => &table::TABLE_CELL,
            TranslatorId::TableCellProperties => &table::TABLE_CELL_PROPERTIES,
            TranslatorId::Drawing => &drawing::DRAWING,
            TranslatorId::Sdt => &sdt::SDT,
            TranslatorId::SdtProperties => &sdt::SDT_PROPERTIES,
            TranslatorId::SdtEndProperties => &sdt::SDT_END_PROPERTIES,
            TranslatorId::SectionProperties => &passthrough::SECTION_PROPERTIES,
            TranslatorId::List => &list::LIST,
            TranslatorId::Passthrough => &passthrough::PASSTHROUGH,
        }
    }
}

/// Tags dropped on import. Everything else is either translated or preserved verbatim.
pub const NOOP_ELEMENTS: &[&str] = &["w:proofErr", "w:lastRenderedPageBreak"];

pub fn is_noop_element(name: &str) -> bool {
    NOOP_ELEMENTS.contains(&name)
}

/// Tag and type lookup over [`TranslatorId::ALL`].
#[derive(Debug)]
pub struct HandlerTable {
    by_xml: HashMap<&'static str, TranslatorId>,
    by_type: HashMap<&'static str, TranslatorId>,
}

impl HandlerTable {
    pub fn new() -> anyhow::Result<Self> {
        Self::from_ids(TranslatorId::ALL)
    }

    /// Fails when two translators claim the same tag or the same model type.
    pub fn from_ids(ids: &[TranslatorId]) -> anyhow::Result<Self> {
        let mut by_xml = HashMap::new();
        let mut by_type = HashMap::new();
        for &id in ids {
            let cfg = id.config();
            if let Some(xml) = cfg.xml_name {
                if let Some(prev) = by_xml.insert(xml, id) {
                    bail!("tag {xml} is claimed by both {prev:?} and {id:?}");
                }
            }
            for &ty in cfg.sd_names {
                if let Some(prev) = by_type.insert(ty, id) {
                    bail!("model type {ty} is claimed by both {prev:?} and {id:?}");
                }
            }
        }
        Ok(Self { by_xml, by_type })
    }

    pub fn id_for_xml(&self, name: &str) -> Option<TranslatorId> {
        self.by_xml.get(name).copied()
    }

    pub fn for_xml(&self, name: &str) -> Option<&'static NodeTranslator> {
        self.id_for_xml(name).map(TranslatorId::config)
    }

    pub fn for_type(&self, node_type: &str) -> Option<&'static NodeTranslator> {
        self.by_type.get(node_type).copied().map(TranslatorId::config)
    }
}

/// State threaded through one import.
pub struct EncodeContext<'a> {
    pub handlers: &'a HandlerTable,
    pub numbering: &'a Numbering,
    pub relationships: &'a Relationships,
    pub list_mode: ListMode,
    pub diagnostics: Vec<String>,
    inherited_marks: Vec<Mark>,
    inline: bool,
    next_block_id: u64,
}

impl<'a> EncodeContext<'a> {
    pub fn new(
        handlers: &'a HandlerTable,
        numbering: &'a Numbering,
        relationships: &'a Relationships,
        list_mode: ListMode,
    ) -> Self {
        Self {
            handlers,
            numbering,
            relationships,
            list_mode,
            diagnostics: Vec::new(),
            inherited_marks: Vec::new(),
            inline: false,
            next_block_id: 0,
        }
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    /// Runs `f` with the walk marked as inline (inside a paragraph).
    pub fn inline_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = std::mem::replace(&mut self.inline, true);
        let out = f(self);
        self.inline = prev;
        out
    }

    /// Runs `f` at block level, e.g. for the content of a table cell met inside a run.
    pub fn block_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = std::mem::replace(&mut self.inline, false);
        let marks = std::mem::take(&mut self.inherited_marks);
        let out = f(self);
        self.inline = prev;
        self.inherited_marks = marks;
        out
    }

    /// Runs `f` with `mark` applied to every run below.
    pub fn with_mark<R>(&mut self, mark: Mark, f: impl FnOnce(&mut Self) -> R) -> R {
        self.inherited_marks.push(mark);
        let out = f(self);
        self.inherited_marks.pop();
        out
    }

    pub fn inherited_marks(&self) -> &[Mark] {
        &self.inherited_marks
    }

    /// Stable per-import paragraph id.
    pub fn next_block_id(&mut self) -> u64 {
        self.next_block_id += 1;
        self.next_block_id
    }

    pub fn diagnostic(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("{message}");
        self.diagnostics.push(message);
    }
}

/// State threaded through one export. Relationship and numbering tables are mutable
/// because links, images and lists may need new entries.
pub struct DecodeContext<'a> {
    pub handlers: &'a HandlerTable,
    pub numbering: &'a mut Numbering,
    pub relationships: &'a mut Relationships,
    pub final_doc: bool,
    pub diagnostics: Vec<String>,
    in_deletion: bool,
}

impl<'a> DecodeContext<'a> {
    pub fn new(
        handlers: &'a HandlerTable,
        numbering: &'a mut Numbering,
        relationships: &'a mut Relationships,
        final_doc: bool,
    ) -> Self {
        Self {
            handlers,
            numbering,
            relationships,
            final_doc,
            diagnostics: Vec::new(),
            in_deletion: false,
        }
    }

    pub fn in_deletion(&self) -> bool {
        self.in_deletion
    }

    pub fn deletion_scope<R>(&mut self, deleted: bool, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = std::mem::replace(&mut self.in_deletion, deleted);
        let out = f(self);
        self.in_deletion = prev;
        out
    }

    pub fn diagnostic(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("{message}");
        self.diagnostics.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_translator_has_a_unique_owner() {
        let table = HandlerTable::new().expect("no duplicate owners");
        assert_eq!(table.id_for_xml("w:p"), Some(TranslatorId::Paragraph));
        assert_eq!(table.id_for_xml("w:delText"), Some(TranslatorId::DeletedText));
        assert!(table.for_type("orderedList").is_some());
        assert!(table.for_type("bulletList").is_some());
        assert!(table.for_xml("w:unknownThing").is_none());
    }

    #[test]
    fn duplicate_ownership_is_rejected() {
        let err = HandlerTable::from_ids(&[TranslatorId::Paragraph, TranslatorId::Paragraph])
            .expect_err("duplicate");
        assert!(err.to_string().contains("w:p"));
    }

    #[test]
    fn property_containers_are_attribute_kind() {
        for id in [
            TranslatorId::RunProperties,
            TranslatorId::ParagraphProperties,
            TranslatorId::TableProperties,
            TranslatorId::SdtProperties,
        ] {
            assert_eq!(id.config().kind, TranslatorKind::Attribute, "{id:?}");
        }
        assert_eq!(TranslatorId::Run.config().kind, TranslatorKind::Node);
    }
}
