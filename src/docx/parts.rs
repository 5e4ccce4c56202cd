use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use sha2::{Digest, Sha256};

use crate::docx::xml::{parse_xml, parse_xml_str, write_xml, XmlDocument};

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const STYLES_PART: &str = "word/styles.xml";
pub const NUMBERING_PART: &str = "word/numbering.xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// A package part as handed to (or produced by) the converter.
#[derive(Clone, Debug, PartialEq)]
pub enum Part {
    Xml(XmlDocument),
    /// XML that has not been parsed yet.
    Text(String),
    Binary(Vec<u8>),
}

pub type PartMap = BTreeMap<String, Part>;

pub fn is_xml_part_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".xml") || lower.ends_with(".rels")
}

/// Normalizes a package path: forward slashes, no leading slash, `.`/`..` segments resolved.
pub fn normalize_part_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for seg in replaced.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Resolves a relationship target relative to the directory of `source_part`.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    if let Some(abs) = target.strip_prefix('/') {
        return normalize_part_path(abs);
    }
    let base = match source_part.rfind('/') {
        Some(idx) => &source_part[..idx],
        None => "",
    };
    if base.is_empty() {
        normalize_part_path(target)
    } else {
        normalize_part_path(&format!("{base}/{target}"))
    }
}

/// Finds the stored name of a part, tolerating case, backslash and leading-slash variants.
pub fn find_part_name(parts: &PartMap, canonical: &str) -> Option<String> {
    if parts.contains_key(canonical) {
        return Some(canonical.to_string());
    }
    let want = canonical.to_ascii_lowercase();
    parts
        .keys()
        .find(|k| normalize_part_path(k).to_ascii_lowercase() == want)
        .cloned()
}

pub fn part_exists(parts: &PartMap, path: &str) -> bool {
    find_part_name(parts, &normalize_part_path(path)).is_some()
}

/// Parses a `Text`/`Binary` XML part in place and returns it.
pub fn xml_part_mut<'a>(parts: &'a mut PartMap, name: &str) -> anyhow::Result<Option<&'a mut XmlDocument>> {
    let Some(part) = parts.get_mut(name) else {
        return Ok(None);
    };
    let parsed = match &*part {
        Part::Xml(_) => None,
        Part::Text(text) => Some(parse_xml_str(name, text).with_context(|| format!("parse xml: {name}"))?),
        Part::Binary(bytes) => Some(parse_xml(name, bytes).with_context(|| format!("parse xml: {name}"))?),
    };
    if let Some(doc) = parsed {
        *part = Part::Xml(doc);
    }
    match part {
        Part::Xml(doc) => Ok(Some(doc)),
        _ => Err(anyhow!("part {name} is not xml")),
    }
}

pub fn xml_part(parts: &PartMap, name: &str) -> anyhow::Result<Option<XmlDocument>> {
    match parts.get(name) {
        None => Ok(None),
        Some(Part::Xml(doc)) => Ok(Some(doc.clone())),
        Some(Part::Text(text)) => parse_xml_str(name, text)
            .with_context(|| format!("parse xml: {name}"))
            .map(Some),
        Some(Part::Binary(bytes)) => parse_xml(name, bytes)
            .with_context(|| format!("parse xml: {name}"))
            .map(Some),
    }
}

pub fn part_bytes(part: &Part) -> Vec<u8> {
    match part {
        Part::Xml(doc) => write_xml(doc),
        Part::Text(text) => text.as_bytes().to_vec(),
        Part::Binary(bytes) => bytes.clone(),
    }
}

pub fn fingerprint(part: &Part) -> String {
    let mut hasher = Sha256::new();
    hasher.update(part_bytes(part));
    hex::encode(hasher.finalize())
}

pub fn fingerprints(parts: &PartMap) -> BTreeMap<String, String> {
    parts
        .iter()
        .map(|(k, v)| (k.clone(), fingerprint(v)))
        .collect()
}
