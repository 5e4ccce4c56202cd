//! `word/_rels/document.xml.rels` repair.

use std::collections::{BTreeSet, HashMap};

use crate::docx::content_types::{empty_content_types, image_content_type, sniff_image_content_type, ContentTypes};
use crate::docx::parts::{
    find_part_name, part_exists, resolve_target, xml_part, xml_part_mut, Part, PartMap, CONTENT_TYPES_PART,
    DOCUMENT_PART, DOCUMENT_RELS_PART,
};
use crate::docx::relationships::{is_hyperlink_type, is_image_type, looks_external, rid_number, RELATIONSHIPS_NS};
use crate::docx::xml::XmlNode;
use crate::validators::{for_each_element_mut, ValidationReport};

pub fn validate_relationships(parts: &mut PartMap) -> anyhow::Result<ValidationReport> {
    let mut report = ValidationReport::default();
    let Some(name) = find_part_name(parts, DOCUMENT_RELS_PART) else {
        return Ok(report);
    };
    if name != DOCUMENT_RELS_PART {
        if let Some(part) = parts.remove(&name) {
            parts.insert(DOCUMENT_RELS_PART.to_string(), part);
        }
        report.repaired(format!("moved {name} to {DOCUMENT_RELS_PART}"));
    }
    let Some(mut doc) = xml_part(parts, DOCUMENT_RELS_PART)? else {
        return Ok(report);
    };
    let before = report.modified;
    report.modified = false;

    repair_root(&mut doc.root, &mut report);
    repair_ids(&mut doc.root, &mut report);
    set_external_modes(&mut doc.root, &mut report);
    let removed = remove_missing_targets(&mut doc.root, parts, &mut report);

    if report.modified {
        parts.insert(DOCUMENT_RELS_PART.to_string(), Part::Xml(doc));
    }
    if !removed.is_empty() {
        strip_references(parts, &removed, &mut report)?;
    }
    ensure_media_content_types(parts, &mut report)?;
    report.modified |= before;
    Ok(report)
}

fn repair_root(root: &mut XmlNode, report: &mut ValidationReport) {
    if root.name != "Relationships" {
        report.repaired(format!("renamed root <{}> to <Relationships>", root.name));
        root.name = "Relationships".to_string();
    }
    if root.attr("xmlns") != Some(RELATIONSHIPS_NS) {
        root.set_attr("xmlns", RELATIONSHIPS_NS);
        report.repaired("set the relationships namespace");
    }
    let mut dropped = Vec::new();
    root.elements.retain(|c| {
        let keep = c.is_named("Relationship")
            || c.text.as_deref().is_some_and(|t| t.trim().is_empty()) && !c.is_element();
        if !keep {
            dropped.push(if c.is_element() { c.name.clone() } else { "text".to_string() });
        }
        keep
    });
    for name in dropped {
        report.repaired(format!("dropped non-relationship child <{name}>"));
    }
    root.elements.retain(|c| {
        if !c.is_element() {
            return true;
        }
        let complete = c.attr("Type").is_some_and(|t| !t.is_empty()) && c.attr("Target").is_some();
        if !complete {
            report.repaired(format!(
                "dropped relationship {} without Type or Target",
                c.attr("Id").unwrap_or("(no id)")
            ));
        }
        complete
    });
}

fn same_relationship(a: &XmlNode, b: &XmlNode) -> bool {
    a.attr("Type") == b.attr("Type")
        && a.attr("Target") == b.attr("Target")
        && a.attr("TargetMode") == b.attr("TargetMode")
}

/// Missing ids and conflicting duplicates get fresh `rId<N>` above the current maximum;
/// exact duplicates are dropped.
fn repair_ids(root: &mut XmlNode, report: &mut ValidationReport) {
    let mut max = root
        .children_named("Relationship")
        .filter_map(|r| r.attr("Id").and_then(rid_number))
        .max()
        .unwrap_or(0);
    let mut seen: HashMap<String, XmlNode> = HashMap::new();
    let mut kept = Vec::with_capacity(root.elements.len());

    for mut rel in std::mem::take(&mut root.elements) {
        if !rel.is_element() {
            kept.push(rel);
            continue;
        }
        let id = rel.attr("Id").unwrap_or_default().trim().to_string();
        if id.is_empty() {
            max += 1;
            let new_id = format!("rId{max}");
            report.repaired(format!("assigned {new_id} to a relationship without an id"));
            rel.set_attr("Id", new_id.as_str());
            seen.insert(new_id, rel.clone());
            kept.push(rel);
            continue;
        }
        match seen.get(&id) {
            Some(first) if same_relationship(first, &rel) => {
                report.repaired(format!("removed duplicate relationship {id}"));
            }
            Some(_) => {
                max += 1;
                let new_id = format!("rId{max}");
                report.repaired(format!("renumbered conflicting duplicate {id} to {new_id}"));
                rel.set_attr("Id", new_id.as_str());
                seen.insert(new_id, rel.clone());
                kept.push(rel);
            }
            None => {
                seen.insert(id, rel.clone());
                kept.push(rel);
            }
        }
    }
    root.elements = kept;
}

fn set_external_modes(root: &mut XmlNode, report: &mut ValidationReport) {
    for rel in root.elements.iter_mut().filter(|c| c.is_named("Relationship")) {
        let hyperlink = rel.attr("Type").is_some_and(is_hyperlink_type);
        let external = rel.attr("Target").is_some_and(looks_external);
        if hyperlink && external && rel.attr("TargetMode") != Some("External") {
            rel.set_attr("TargetMode", "External");
            report.repaired(format!(
                "marked hyperlink {} as external",
                rel.attr("Id").unwrap_or_default()
            ));
        }
    }
}

/// Drops internal relationships whose target part is absent. Images only warn: the
/// media may be supplied outside this part map.
fn remove_missing_targets(root: &mut XmlNode, parts: &PartMap, report: &mut ValidationReport) -> BTreeSet<String> {
    let mut removed = BTreeSet::new();
    root.elements.retain(|rel| {
        if !rel.is_named("Relationship") || rel.attr("TargetMode") == Some("External") {
            return true;
        }
        let target = rel.attr("Target").unwrap_or_default();
        if target.is_empty() || target.starts_with('#') || looks_external(target) {
            return true;
        }
        let resolved = resolve_target(DOCUMENT_PART, target);
        if part_exists(parts, &resolved) {
            return true;
        }
        let id = rel.attr("Id").unwrap_or_default();
        if rel.attr("Type").is_some_and(is_image_type) {
            report.warn(format!("image relationship {id} points at missing {resolved}"));
            return true;
        }
        report.repaired(format!("removed relationship {id}: target {resolved} is missing"));
        removed.insert(id.to_string());
        false
    });
    removed
}

fn strip_references(parts: &mut PartMap, removed: &BTreeSet<String>, report: &mut ValidationReport) -> anyhow::Result<()> {
    let Some(name) = find_part_name(parts, DOCUMENT_PART) else {
        return Ok(());
    };
    let Some(doc) = xml_part_mut(parts, &name)? else {
        return Ok(());
    };
    let mut stripped = 0;
    for_each_element_mut(&mut doc.root, &mut |el| {
        let before = el.attributes.len();
        el.attributes
            .retain(|(k, v)| !(k.starts_with("r:") && removed.contains(v)));
        stripped += before - el.attributes.len();
    });
    if stripped > 0 {
        report.repaired(format!("stripped {stripped} reference(s) to removed relationships from {name}"));
    }
    Ok(())
}

fn extension(name: &str) -> Option<&str> {
    let file = name.rsplit('/').next()?;
    file.rsplit_once('.').map(|(_, ext)| ext)
}

/// Media parts need a content type: a `Default` per image extension, and an `Override`
/// for `.bin` media that sniffs as an image.
fn ensure_media_content_types(parts: &mut PartMap, report: &mut ValidationReport) -> anyhow::Result<()> {
    let mut defaults = Vec::new();
    let mut overrides = Vec::new();
    for (name, part) in parts.iter() {
        if !name.to_ascii_lowercase().contains("media/") {
            continue;
        }
        let Some(ext) = extension(name) else {
            continue;
        };
        if ext.eq_ignore_ascii_case("bin") {
            if let Part::Binary(bytes) = part {
                if let Some(ct) = sniff_image_content_type(bytes) {
                    overrides.push((name.clone(), ct));
                }
            }
        } else if let Some(ct) = image_content_type(ext) {
            defaults.push((ext.to_ascii_lowercase(), ct));
        }
    }
    if defaults.is_empty() && overrides.is_empty() {
        return Ok(());
    }
    let ct_name = find_part_name(parts, CONTENT_TYPES_PART).unwrap_or_else(|| CONTENT_TYPES_PART.to_string());
    if !parts.contains_key(&ct_name) {
        parts.insert(ct_name.clone(), Part::Xml(empty_content_types()));
        report.repaired(format!("created {ct_name}"));
    }
    let Some(doc) = xml_part_mut(parts, &ct_name)? else {
        return Ok(());
    };
    let mut types = ContentTypes::new(doc);
    for (ext, ct) in defaults {
        if types.ensure_default(&ext, ct) {
            report.repaired(format!("declared content type {ct} for .{ext}"));
        }
    }
    for (name, ct) in overrides {
        if types.ensure_override(&name, ct) {
            report.repaired(format!("declared {name} as {ct}"));
        }
    }
    Ok(())
}
