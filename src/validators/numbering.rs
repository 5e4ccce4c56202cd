//! `word/numbering.xml` repair.

use std::collections::BTreeSet;

use crate::docx::parts::{find_part_name, xml_part, xml_part_mut, Part, PartMap, DOCUMENT_PART, NUMBERING_PART};
use crate::docx::xml::XmlNode;
use crate::validators::{for_each_element_mut, ValidationReport};

/// A `w:numId` that can be referenced: present, not `"null"`, numeric.
fn usable_num_id(raw: Option<&str>) -> Option<i64> {
    let v = raw?.trim();
    if v.is_empty() || v == "null" {
        return None;
    }
    v.parse::<i64>().ok()
}

fn collect_abstract_ids(node: &XmlNode, out: &mut BTreeSet<String>) {
    for child in &node.elements {
        if child.is_named("w:abstractNum") {
            if let Some(id) = child.attr("w:abstractNumId") {
                out.insert(id.trim().to_string());
            }
        }
        collect_abstract_ids(child, out);
    }
}

/// Why a `w:num` cannot stay in the numbering part.
enum Pruned {
    UnusableId(String),
    MissingAbstract { num_id: String, abstract_id: String },
}

/// Removes `w:num` elements at any depth whose id is unusable or whose
/// `w:abstractNumId` names no `w:abstractNum`.
fn prune_nums(node: &mut XmlNode, abstracts: &BTreeSet<String>, removed: &mut Vec<Pruned>) {
    node.elements.retain(|c| {
        if !c.is_named("w:num") {
            return true;
        }
        let raw = c.attr("w:numId");
        if usable_num_id(raw).is_none() {
            removed.push(Pruned::UnusableId(raw.unwrap_or("(missing)").to_string()));
            return false;
        }
        let abstract_id = c.child_val("w:abstractNumId").unwrap_or_default().trim();
        if abstracts.contains(abstract_id) {
            return true;
        }
        removed.push(Pruned::MissingAbstract {
            num_id: raw.unwrap_or_default().to_string(),
            abstract_id: abstract_id.to_string(),
        });
        false
    });
    for child in &mut node.elements {
        prune_nums(child, abstracts, removed);
    }
}

fn collect_num_ids(node: &XmlNode, out: &mut BTreeSet<i64>) {
    for child in &node.elements {
        if child.is_named("w:num") {
            if let Some(id) = usable_num_id(child.attr("w:numId")) {
                out.insert(id);
            }
        }
        collect_num_ids(child, out);
    }
}

pub fn validate_numbering(parts: &mut PartMap) -> anyhow::Result<ValidationReport> {
    let mut report = ValidationReport::default();
    let mut known = BTreeSet::new();

    if let Some(name) = find_part_name(parts, NUMBERING_PART) {
        if let Some(mut doc) = xml_part(parts, &name)? {
            let mut abstracts = BTreeSet::new();
            collect_abstract_ids(&doc.root, &mut abstracts);
            let mut removed = Vec::new();
            prune_nums(&mut doc.root, &abstracts, &mut removed);
            collect_num_ids(&doc.root, &mut known);
            if !removed.is_empty() {
                for pruned in &removed {
                    match pruned {
                        Pruned::UnusableId(id) => report.repaired(format!("removed w:num with unusable numId {id:?}")),
                        Pruned::MissingAbstract { num_id, abstract_id } => report.repaired(format!(
                            "removed numId {num_id}: abstractNumId {abstract_id:?} has no w:abstractNum"
                        )),
                    }
                }
                parts.insert(name, Part::Xml(doc));
            }
        }
    }

    strip_dangling_references(parts, &known, &mut report)?;
    Ok(report)
}

/// Paragraph numbering that points at a `w:num` that no longer exists is removed.
/// `numId` 0 means "numbering turned off" and stays.
fn strip_dangling_references(
    parts: &mut PartMap,
    known: &BTreeSet<i64>,
    report: &mut ValidationReport,
) -> anyhow::Result<()> {
    let Some(name) = find_part_name(parts, DOCUMENT_PART) else {
        return Ok(());
    };
    let dangling = |num_pr: &XmlNode| {
        let raw = num_pr.child_val("w:numId");
        match usable_num_id(raw) {
            Some(0) => false,
            Some(id) => !known.contains(&id),
            None => raw.is_some(),
        }
    };
    let needs_repair = xml_part(parts, &name)?
        .is_some_and(|doc| doc.root.find_descendant("w:numPr").is_some() && has_dangling(&doc.root, &dangling));
    if !needs_repair {
        return Ok(());
    }
    let Some(doc) = xml_part_mut(parts, &name)? else {
        return Ok(());
    };
    let mut stripped = BTreeSet::new();
    for_each_element_mut(&mut doc.root, &mut |el| {
        if !el.is_named("w:pPr") {
            return;
        }
        if let Some(num_pr) = el.child("w:numPr").filter(|n| dangling(n)) {
            stripped.insert(num_pr.child_val("w:numId").unwrap_or_default().to_string());
            el.remove_child("w:numPr");
        }
    });
    for id in stripped {
        report.repaired(format!("removed paragraph numbering that references missing numId {id}"));
    }
    Ok(())
}

fn has_dangling(node: &XmlNode, dangling: &impl Fn(&XmlNode) -> bool) -> bool {
    node.elements.iter().any(|c| {
        (c.is_named("w:pPr") && c.child("w:numPr").is_some_and(dangling)) || has_dangling(c, dangling)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::write_node_string;

    const NUMBERING: &str = r#"<w:numbering><w:abstractNum w:abstractNumId="0"/><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num><w:num w:numId="null"><w:abstractNumId w:val="0"/></w:num><w:num><w:abstractNumId w:val="0"/></w:num><w:num w:numId=""/><w:num w:numId="x2"/><mc:AlternateContent><mc:Choice><w:num w:numId="abc"/></mc:Choice></mc:AlternateContent></w:numbering>"#;

    const DOCUMENT: &str = r#"<w:document><w:body><w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr></w:p><w:p><w:pPr><w:numPr><w:numId w:val="0"/></w:numPr></w:pPr></w:p><w:p><w:pPr><w:jc w:val="left"/><w:numPr><w:ilvl w:val="0"/><w:numId w:val="9"/></w:numPr></w:pPr></w:p></w:body></w:document>"#;

    fn parts() -> PartMap {
        let mut parts = PartMap::new();
        parts.insert(NUMBERING_PART.to_string(), Part::Text(NUMBERING.to_string()));
        parts.insert(DOCUMENT_PART.to_string(), Part::Text(DOCUMENT.to_string()));
        parts
    }

    fn xml(parts: &PartMap, name: &str) -> String {
        write_node_string(&xml_part(parts, name).expect("parse").expect("part").root)
    }

    #[test]
    fn prunes_unusable_nums_at_any_depth() {
        let mut parts = parts();
        let report = validate_numbering(&mut parts).expect("validate");
        assert!(report.modified);
        let numbering = xml(&parts, NUMBERING_PART);
        assert_eq!(numbering.matches("<w:num ").count(), 1, "{numbering}");
        assert!(numbering.contains(r#"<w:num w:numId="1">"#));
        assert!(!numbering.contains("abc"));
        assert_eq!(report.results.iter().filter(|r| r.starts_with("removed w:num")).count(), 5);
    }

    #[test]
    fn dangling_paragraph_numbering_is_stripped() {
        let mut parts = parts();
        validate_numbering(&mut parts).expect("validate");
        let document = xml(&parts, DOCUMENT_PART);
        assert!(document.contains(r#"<w:numId w:val="1"/>"#));
        assert!(document.contains(r#"<w:numId w:val="0"/>"#));
        assert!(!document.contains(r#"w:val="9""#));
        assert!(document.contains(r#"<w:pPr><w:jc w:val="left"/></w:pPr>"#), "{document}");
    }

    #[test]
    fn num_without_abstract_definition_is_removed_with_its_references() {
        let mut parts = PartMap::new();
        parts.insert(
            NUMBERING_PART.to_string(),
            Part::Text(r#"<w:numbering><w:abstractNum w:abstractNumId="0"/><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num><w:num w:numId="5"><w:abstractNumId w:val="99"/></w:num></w:numbering>"#.to_string()),
        );
        parts.insert(
            DOCUMENT_PART.to_string(),
            Part::Text(r#"<w:document><w:body><w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="5"/></w:numPr></w:pPr></w:p><w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr></w:p></w:body></w:document>"#.to_string()),
        );
        let report = validate_numbering(&mut parts).expect("validate");
        assert!(report.modified);
        assert!(report.results.iter().any(|r| r.contains("numId 5") && r.contains("99")), "{:?}", report.results);

        let numbering = xml(&parts, NUMBERING_PART);
        assert!(!numbering.contains(r#"w:numId="5""#), "{numbering}");
        assert!(numbering.contains(r#"<w:num w:numId="1">"#));
        let document = xml(&parts, DOCUMENT_PART);
        assert!(!document.contains(r#"<w:numId w:val="5"/>"#), "{document}");
        assert!(document.contains(r#"<w:numId w:val="1"/>"#));

        let second = validate_numbering(&mut parts).expect("second");
        assert!(!second.modified, "{:?}", second.results);
    }

    #[test]
    fn second_pass_reports_nothing() {
        let mut parts = parts();
        validate_numbering(&mut parts).expect("first");
        let snapshot = parts.clone();
        let second = validate_numbering(&mut parts).expect("second");
        assert!(!second.modified);
        assert!(second.results.is_empty());
        assert_eq!(parts, snapshot);
    }
}
