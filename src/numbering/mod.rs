//! `word/numbering.xml`: abstract definitions, concrete `w:num` instances and the helpers
//! lists need to resolve or create them.

use crate::docx::xml::{XmlDocument, XmlNode};

pub mod lists;
pub mod migration;

pub use lists::ListType;

pub const WORDPROCESSINGML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const MAX_LEVELS: u8 = 9;
const BULLET_CHARS: [&str; 3] = ["\u{2022}", "\u{25E6}", "\u{25AA}"];
const ORDERED_FORMATS: [&str; 3] = ["decimal", "lowerLetter", "lowerRoman"];

#[derive(Clone, Debug, PartialEq)]
pub struct LevelDef {
    pub ilvl: u8,
    pub num_fmt: String,
    pub lvl_text: Option<String>,
    pub start: i64,
}

impl LevelDef {
    fn parse(lvl: &XmlNode) -> Option<Self> {
        let ilvl = lvl.attr("w:ilvl")?.trim().parse::<u8>().ok()?;
        Some(Self {
            ilvl,
            num_fmt: lvl.child_val("w:numFmt").unwrap_or("decimal").to_string(),
            lvl_text: lvl.child_val("w:lvlText").map(str::to_string),
            start: lvl
                .child_val("w:start")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(1),
        })
    }
}

#[derive(Clone, Debug)]
pub struct AbstractNumDefinition {
    pub abstract_num_id: i64,
    pub levels: Vec<LevelDef>,
    pub raw: XmlNode,
}

#[derive(Clone, Debug)]
pub struct NumDefinition {
    pub num_id: i64,
    pub abstract_num_id: i64,
    pub raw: XmlNode,
}

impl NumDefinition {
    /// A `w:lvlOverride` carrying its own `w:lvl` replaces the abstract level.
    fn level_override(&self, level: u8) -> Option<LevelDef> {
        self.raw
            .children_named("w:lvlOverride")
            .filter(|o| o.attr("w:ilvl").and_then(|v| v.trim().parse::<u8>().ok()) == Some(level))
            .find_map(|o| o.child("w:lvl").and_then(LevelDef::parse))
    }

    fn start_override(&self, level: u8) -> Option<i64> {
        self.raw
            .children_named("w:lvlOverride")
            .filter(|o| o.attr("w:ilvl").and_then(|v| v.trim().parse::<u8>().ok()) == Some(level))
            .find_map(|o| o.child_val("w:startOverride"))
            .and_then(|v| v.trim().parse::<i64>().ok())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListDefinitionDetails {
    pub num_id: i64,
    pub abstract_num_id: i64,
    pub level: u8,
    pub num_fmt: String,
    pub lvl_text: Option<String>,
    pub start: i64,
    pub list_type: ListType,
}

#[derive(Clone, Debug, Default)]
pub struct Numbering {
    root_attributes: Vec<(String, String)>,
    leading: Vec<XmlNode>,
    abstracts: Vec<AbstractNumDefinition>,
    nums: Vec<NumDefinition>,
    trailing: Vec<XmlNode>,
    modified: bool,
}

fn int_attr(node: &XmlNode, name: &str) -> Option<i64> {
    node.attr(name).and_then(|v| v.trim().parse::<i64>().ok())
}

impl Numbering {
    pub fn parse(doc: &XmlDocument) -> Self {
        let mut out = Self {
            root_attributes: doc.root.attributes.clone(),
            ..Self::default()
        };
        for child in doc.root.child_elements() {
            match child.name.as_str() {
                "w:abstractNum" => match int_attr(child, "w:abstractNumId") {
                    Some(id) => out.abstracts.push(AbstractNumDefinition {
                        abstract_num_id: id,
                        levels: child.children_named("w:lvl").filter_map(LevelDef::parse).collect(),
                        raw: child.clone(),
                    }),
                    None => out.leading.push(child.clone()),
                },
                "w:num" => {
                    let num_id = int_attr(child, "w:numId");
                    let abstract_id = child
                        .child_val("w:abstractNumId")
                        .and_then(|v| v.trim().parse::<i64>().ok());
                    match (num_id, abstract_id) {
                        (Some(num_id), Some(abstract_num_id)) => out.nums.push(NumDefinition {
                            num_id,
                            abstract_num_id,
                            raw: child.clone(),
                        }),
                        _ => {
                            log::debug!("unresolvable w:num kept verbatim");
                            out.trailing.push(child.clone());
                        }
                    }
                }
                _ if out.abstracts.is_empty() && out.nums.is_empty() => out.leading.push(child.clone()),
                _ => out.trailing.push(child.clone()),
            }
        }
        out
    }

    pub fn to_xml(&self) -> XmlDocument {
        let mut root = XmlNode::element("w:numbering");
        root.attributes = if self.root_attributes.is_empty() {
            vec![("xmlns:w".to_string(), WORDPROCESSINGML_NS.to_string())]
        } else {
            self.root_attributes.clone()
        };
        root.elements.extend(self.leading.iter().cloned());
        root.elements.extend(self.abstracts.iter().map(|a| a.raw.clone()));
        root.elements.extend(self.nums.iter().map(|n| n.raw.clone()));
        root.elements.extend(self.trailing.iter().cloned());
        XmlDocument::new(root)
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_empty(&self) -> bool {
        self.abstracts.is_empty() && self.nums.is_empty()
    }

    pub fn num(&self, num_id: i64) -> Option<&NumDefinition> {
        self.nums.iter().find(|n| n.num_id == num_id)
    }

    pub fn abstract_num(&self, abstract_num_id: i64) -> Option<&AbstractNumDefinition> {
        self.abstracts.iter().find(|a| a.abstract_num_id == abstract_num_id)
    }

    pub fn num_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.nums.iter().map(|n| n.num_id)
    }

    /// Resolves `num_id` at `level` to its format, honoring level overrides.
    pub fn get_list_definition_details(&self, num_id: i64, level: u8) -> Option<ListDefinitionDetails> {
        let num = self.num(num_id)?;
        let abs = self.abstract_num(num.abstract_num_id)?;
        let lvl = num
            .level_override(level)
            .or_else(|| abs.levels.iter().find(|l| l.ilvl == level).cloned())
            .or_else(|| abs.levels.first().cloned())?;
        Some(ListDefinitionDetails {
            num_id,
            abstract_num_id: abs.abstract_num_id,
            level,
            list_type: ListType::from_num_fmt(&lvl.num_fmt),
            start: num.start_override(level).unwrap_or(lvl.start),
            num_fmt: lvl.num_fmt,
            lvl_text: lvl.lvl_text,
        })
    }

    pub fn get_new_list_id(&self) -> i64 {
        self.nums.iter().map(|n| n.num_id).max().unwrap_or(0) + 1
    }

    fn new_abstract_id(&self) -> i64 {
        self.abstracts
            .iter()
            .map(|a| a.abstract_num_id)
            .max()
            .map_or(0, |m| m + 1)
    }

    /// Creates a nine-level abstract definition of `list_type` and points `num_id` at it,
    /// replacing any existing `w:num` with that id. Returns the new abstract id.
    pub fn generate_new_list_definition(&mut self, num_id: i64, list_type: ListType) -> i64 {
        let abstract_num_id = self.new_abstract_id();
        let mut raw = XmlNode::element("w:abstractNum")
            .with_attr("w:abstractNumId", abstract_num_id.to_string())
            .with_child(XmlNode::element("w:multiLevelType").with_attr("w:val", "hybridMultilevel"));
        let mut levels = Vec::new();
        for ilvl in 0..MAX_LEVELS {
            let (fmt, text) = match list_type {
                ListType::Bullet => ("bullet", BULLET_CHARS[ilvl as usize % BULLET_CHARS.len()].to_string()),
                ListType::Ordered => (
                    ORDERED_FORMATS[ilvl as usize % ORDERED_FORMATS.len()],
                    format!("%{}.", ilvl + 1),
                ),
            };
            let left = 720 * (i64::from(ilvl) + 1);
            raw.elements.push(
                XmlNode::element("w:lvl")
                    .with_attr("w:ilvl", ilvl.to_string())
                    .with_child(XmlNode::element("w:start").with_attr("w:val", "1"))
                    .with_child(XmlNode::element("w:numFmt").with_attr("w:val", fmt))
                    .with_child(XmlNode::element("w:lvlText").with_attr("w:val", text.as_str()))
                    .with_child(XmlNode::element("w:lvlJc").with_attr("w:val", "left"))
                    .with_child(
                        XmlNode::element("w:pPr").with_child(
                            XmlNode::element("w:ind")
                                .with_attr("w:left", left.to_string())
                                .with_attr("w:hanging", "360"),
                        ),
                    ),
            );
            levels.push(LevelDef {
                ilvl,
                num_fmt: fmt.to_string(),
                lvl_text: Some(text),
                start: 1,
            });
        }
        self.abstracts.push(AbstractNumDefinition {
            abstract_num_id,
            levels,
            raw,
        });

        self.nums.retain(|n| n.num_id != num_id);
        self.nums.push(NumDefinition {
            num_id,
            abstract_num_id,
            raw: XmlNode::element("w:num")
                .with_attr("w:numId", num_id.to_string())
                .with_child(
                    XmlNode::element("w:abstractNumId").with_attr("w:val", abstract_num_id.to_string()),
                ),
        });
        self.modified = true;
        log::info!("generated {list_type:?} numbering definition for numId {num_id}");
        abstract_num_id
    }

    /// Generates a definition when `num_id` does not resolve. Returns true when one was made.
    pub fn ensure_definition(&mut self, num_id: i64, list_type: ListType) -> bool {
        if self.get_list_definition_details(num_id, 0).is_some() {
            return false;
        }
        self.generate_new_list_definition(num_id, list_type);
        true
    }
}
