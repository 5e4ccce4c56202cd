//! Repair passes over the raw package parts, run before export.
//!
//! Each validator takes the part map exclusively for the whole pass, reports every
//! repair as a line of text and is idempotent: a second run reports `modified == false`.

use crate::docx::parts::PartMap;
use crate::docx::xml::XmlNode;

pub mod numbering;
pub mod relationships;

pub use numbering::validate_numbering;
pub use relationships::validate_relationships;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    pub results: Vec<String>,
    pub modified: bool,
}

impl ValidationReport {
    /// Records a repair.
    pub fn repaired(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{message}");
        self.results.push(message);
        self.modified = true;
    }

    /// Records a problem that was left in place.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.results.push(message);
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.results.extend(other.results);
        self.modified |= other.modified;
    }
}

/// Relationships first: removing a relationship can strip references from the body
/// that the numbering pass then sees.
pub fn validate_document(parts: &mut PartMap) -> anyhow::Result<ValidationReport> {
    let mut report = validate_relationships(parts)?;
    report.merge(validate_numbering(parts)?);
    Ok(report)
}

/// Calls `f` on every element below `node`, parents before children.
pub(crate) fn for_each_element_mut(node: &mut XmlNode, f: &mut impl FnMut(&mut XmlNode)) {
    for child in &mut node.elements {
        if child.is_element() {
            f(child);
            for_each_element_mut(child, f);
        }
    }
}
