use once_cell::sync::Lazy;
use regex::Regex;

use crate::docx::xml::{XmlDocument, XmlNode};

pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

pub const REL_TYPE_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const REL_TYPE_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const REL_TYPE_NUMBERING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
pub const REL_TYPE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

static RID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^rId(\d+)$").expect("rid"));
static EXTERNAL_TARGET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[a-z][a-z0-9+.\-]*://|mailto:|tel:|www\.)").expect("external target")
});

pub fn rid_number(id: &str) -> Option<u64> {
    RID_RE
        .captures(id)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

pub fn looks_external(target: &str) -> bool {
    EXTERNAL_TARGET_RE.is_match(target.trim())
}

pub fn is_image_type(rel_type: &str) -> bool {
    rel_type.ends_with("/image")
}

pub fn is_hyperlink_type(rel_type: &str) -> bool {
    rel_type.ends_with("/hyperlink")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationshipEntry {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl RelationshipEntry {
    pub fn is_external(&self) -> bool {
        self.target_mode.as_deref() == Some("External")
    }

    fn to_xml(&self) -> XmlNode {
        let mut node = XmlNode::element("Relationship")
            .with_attr("Id", self.id.as_str())
            .with_attr("Type", self.rel_type.as_str())
            .with_attr("Target", self.target.as_str());
        if let Some(mode) = self.target_mode.as_deref() {
            node.set_attr("TargetMode", mode);
        }
        node
    }
}

/// The relationship table of `word/document.xml`.
///
/// New ids are allocated above every id ever seen by this table, so an id freed by a
/// removal is not handed out again within the same session.
#[derive(Clone, Debug, Default)]
pub struct Relationships {
    entries: Vec<RelationshipEntry>,
    next_id: u64,
}

impl Relationships {
    pub fn from_xml(doc: &XmlDocument) -> Self {
        let mut rels = Self::default();
        for node in doc.root.children_named("Relationship") {
            let (Some(id), Some(rel_type), Some(target)) =
                (node.attr("Id"), node.attr("Type"), node.attr("Target"))
            else {
                continue;
            };
            rels.push(RelationshipEntry {
                id: id.to_string(),
                rel_type: rel_type.to_string(),
                target: target.to_string(),
                target_mode: node.attr("TargetMode").map(str::to_string),
            });
        }
        rels
    }

    pub fn to_xml(&self) -> XmlDocument {
        let root = XmlNode::element("Relationships")
            .with_attr("xmlns", RELATIONSHIPS_NS)
            .with_children(self.entries.iter().map(RelationshipEntry::to_xml));
        XmlDocument::new(root)
    }

    fn push(&mut self, entry: RelationshipEntry) {
        if let Some(n) = rid_number(&entry.id) {
            self.next_id = self.next_id.max(n + 1);
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[RelationshipEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&RelationshipEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn target_of(&self, id: &str) -> Option<&str> {
        self.get(id).map(|e| e.target.as_str())
    }

    pub fn find_relationship_id_from_target(&self, target: &str) -> Option<&str> {
        let want = strip_word_prefix(target);
        self.entries
            .iter()
            .find(|e| strip_word_prefix(&e.target) == want)
            .map(|e| e.id.as_str())
    }

    pub fn next_relationship_id(&self) -> String {
        format!("rId{}", self.next_id.max(1))
    }

    /// Allocates `rId<N>` for `target`, or returns the existing id for the same target/type.
    pub fn insert_new_relationship(&mut self, target: &str, rel_type: &str) -> String {
        let want = strip_word_prefix(target);
        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.rel_type == rel_type && strip_word_prefix(&e.target) == want)
        {
            return existing.id.clone();
        }
        let id = self.next_relationship_id();
        let target_mode = (is_hyperlink_type(rel_type) && looks_external(target))
            .then(|| "External".to_string());
        log::debug!("allocated relationship {id} -> {target}");
        self.push(RelationshipEntry {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: want.to_string(),
            target_mode,
        });
        id
    }

    pub fn ensure_type(&mut self, rel_type: &str, target: &str) -> String {
        if let Some(existing) = self.entries.iter().find(|e| e.rel_type == rel_type) {
            return existing.id.clone();
        }
        self.insert_new_relationship(target, rel_type)
    }

    pub fn remove(&mut self, id: &str) -> Option<RelationshipEntry> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx))
    }
}

// Targets in document.xml.rels are relative to `word/`; editor-side paths often carry it.
fn strip_word_prefix(target: &str) -> &str {
    let t = target.trim_start_matches('/');
    t.strip_prefix("word/").unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::parse_xml_str;

    const RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
</Relationships>"#;

    #[test]
    fn finds_ids_by_target_with_or_without_word_prefix() {
        let rels = Relationships::from_xml(&parse_xml_str("r", RELS).expect("parse"));
        assert_eq!(rels.find_relationship_id_from_target("media/image1.png"), Some("rId7"));
        assert_eq!(rels.find_relationship_id_from_target("word/media/image1.png"), Some("rId7"));
        assert_eq!(rels.find_relationship_id_from_target("media/missing.png"), None);
    }

    #[test]
    fn new_ids_are_monotonic() {
        let mut rels = Relationships::from_xml(&parse_xml_str("r", RELS).expect("parse"));
        let a = rels.insert_new_relationship("https://example.com", REL_TYPE_HYPERLINK);
        assert_eq!(a, "rId8");
        assert!(rels.get("rId8").expect("entry").is_external());
        rels.remove("rId8");
        let b = rels.insert_new_relationship("media/image2.png", REL_TYPE_IMAGE);
        assert_eq!(b, "rId9");
        assert_eq!(
            rels.insert_new_relationship("word/media/image2.png", REL_TYPE_IMAGE),
            "rId9"
        );
    }

    #[test]
    fn external_detection() {
        assert!(looks_external("https://a.b/c"));
        assert!(looks_external("mailto:x@y.z"));
        assert!(!looks_external("media/image1.png"));
        assert!(!looks_external("../customXml/item1.xml"));
    }
}
