//! Package properties from `docProps/core.xml` and `docProps/app.xml`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::docx::parts::{find_part_name, xml_part, PartMap};
use crate::docx::xml::XmlNode;

pub const CORE_PROPS_PART: &str = "docProps/core.xml";
pub const APP_PROPS_PART: &str = "docProps/app.xml";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characters: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraphs: Option<u32>,
    /// Other simple-valued properties, keyed by local element name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, String>,
}

/// Element names are matched without their prefix; producers disagree on `cp:`/`dc:`.
fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// `(local name, trimmed text)` for each leaf child of the root.
fn leaf_values(root: &XmlNode) -> Vec<(String, String)> {
    root.child_elements()
        .filter(|c| c.child_elements().next().is_none())
        .filter_map(|c| {
            let text = c.text_content();
            let text = text.trim();
            (!text.is_empty()).then(|| (local_name(&c.name).to_string(), text.to_string()))
        })
        .collect()
}

fn read_part(parts: &PartMap, canonical: &str) -> Option<XmlNode> {
    let name = find_part_name(parts, canonical)?;
    match xml_part(parts, &name) {
        Ok(doc) => doc.map(|d| d.root),
        Err(err) => {
            log::warn!("skipping unreadable {name}: {err:#}");
            None
        }
    }
}

/// Reads what the package says about itself. Missing or unreadable property parts
/// leave their fields empty.
pub fn read_metadata(parts: &PartMap) -> DocumentMetadata {
    let mut meta = DocumentMetadata::default();
    if let Some(core) = read_part(parts, CORE_PROPS_PART) {
        for (key, value) in leaf_values(&core) {
            match key.as_str() {
                "title" => meta.title = Some(value),
                "subject" => meta.subject = Some(value),
                "creator" => meta.creator = Some(value),
                "keywords" => meta.keywords = Some(value),
                "description" => meta.description = Some(value),
                "lastModifiedBy" => meta.last_modified_by = Some(value),
                "revision" => meta.revision = value.parse().ok(),
                "created" => meta.created = Some(value),
                "modified" => meta.modified = Some(value),
                "category" => meta.category = Some(value),
                _ => {
                    meta.other.insert(key, value);
                }
            }
        }
    }
    if let Some(app) = read_part(parts, APP_PROPS_PART) {
        for (key, value) in leaf_values(&app) {
            match key.as_str() {
                "Application" => meta.application = Some(value),
                "Company" => meta.company = Some(value),
                "Pages" => meta.pages = value.parse().ok(),
                "Words" => meta.words = value.parse().ok(),
                "Characters" => meta.characters = value.parse().ok(),
                "Paragraphs" => meta.paragraphs = value.parse().ok(),
                _ => {
                    meta.other.insert(key, value);
                }
            }
        }
    }
    meta
}
