use std::borrow::Cow;

use anyhow::{anyhow, Context};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XmlNodeKind {
    Element,
    Text,
    CData,
    Comment,
}

/// One node of a parsed OOXML part.
///
/// Attribute values are stored unescaped; the writer re-escapes them. Attribute and child
/// order is kept as read so a decoded element has the same shape as the imported one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XmlNode {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: XmlNodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<XmlNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for XmlDeclaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: Some("yes".to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct XmlDocument {
    pub declaration: Option<XmlDeclaration>,
    pub root: XmlNode,
}

impl XmlDocument {
    pub fn new(root: XmlNode) -> Self {
        Self {
            declaration: Some(XmlDeclaration::default()),
            root,
        }
    }
}

impl XmlNode {
    pub fn element(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: XmlNodeKind::Element,
            attributes: Vec::new(),
            elements: Vec::new(),
            text: None,
        }
    }

    pub fn text_node(text: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            kind: XmlNodeKind::Text,
            attributes: Vec::new(),
            elements: Vec::new(),
            text: Some(text.into()),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.elements.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = XmlNode>) -> Self {
        self.elements.extend(children);
        self
    }

    pub fn is_element(&self) -> bool {
        self.kind == XmlNodeKind::Element
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.kind == XmlNodeKind::Element && self.name == name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some((_, v)) = self.attributes.iter_mut().find(|(k, _)| *k == key) {
            *v = value;
            return;
        }
        self.attributes.push((key, value));
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(idx).1)
    }

    /// `w:val` of this element.
    pub fn val(&self) -> Option<&str> {
        self.attr("w:val")
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.elements.iter().find(|n| n.is_named(name))
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlNode> {
        self.elements.iter_mut().find(|n| n.is_named(name))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.elements.iter().filter(move |n| n.is_named(name))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.elements.iter().filter(|n| n.is_element())
    }

    /// `w:val` of the first child named `name`.
    pub fn child_val(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.val())
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    /// Depth-first search below this node (self excluded).
    pub fn find_descendant(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.elements {
            if child.is_named(name) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }

    pub fn contains_descendant(&self, names: &[&str]) -> bool {
        self.elements.iter().any(|c| {
            (c.is_element() && names.contains(&c.name.as_str())) || c.contains_descendant(names)
        })
    }

    /// Concatenated text of every text node below this one.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    pub fn retain_children(&mut self, f: impl FnMut(&XmlNode) -> bool) {
        self.elements.retain(f);
    }

    pub fn remove_child(&mut self, name: &str) -> Option<XmlNode> {
        let idx = self.elements.iter().position(|n| n.is_named(name))?;
        Some(self.elements.remove(idx))
    }
}

fn collect_text(node: &XmlNode, out: &mut String) {
    match node.kind {
        XmlNodeKind::Text | XmlNodeKind::CData => {
            if let Some(t) = node.text.as_deref() {
                out.push_str(t);
            }
        }
        XmlNodeKind::Element => {
            for c in &node.elements {
                collect_text(c, out);
            }
        }
        XmlNodeKind::Comment => {}
    }
}

/// Elements whose whitespace-only text is content rather than indentation.
fn keeps_whitespace(parent: &str) -> bool {
    matches!(
        parent,
        "w:t" | "w:delText" | "w:instrText" | "w:delInstrText" | "a:t" | "m:t" | "wp:posOffset"
    ) || parent.ends_with(":t")
}

fn decode_part_bytes(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    match encoding_rs::Encoding::for_bom(bytes) {
        Some((enc, bom_len)) => {
            let (text, _) = enc.decode_without_bom_handling(&bytes[bom_len..]);
            (text, enc != encoding_rs::UTF_8)
        }
        None => {
            let (text, _) = encoding_rs::UTF_8.decode_without_bom_handling(bytes);
            (text, false)
        }
    }
}

pub fn parse_xml(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlDocument> {
    let (text, transcoded) = decode_part_bytes(xml_bytes);
    parse_xml_str(name, &text).map(|mut doc| {
        if transcoded {
            if let Some(decl) = doc.declaration.as_mut() {
                decl.encoding = Some("UTF-8".to_string());
            }
        }
        doc
    })
}

pub fn parse_xml_str(name: &str, xml: &str) -> anyhow::Result<XmlDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut declaration: Option<XmlDeclaration> = None;
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let ev = reader
            .read_event()
            .with_context(|| format!("read xml event in {name}"))?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().context("decl version")?);
                let encoding = d
                    .encoding()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                let standalone = d
                    .standalone()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                declaration = Some(XmlDeclaration {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => {
                stack.push(start_node(&s)?);
            }
            Event::Empty(s) => {
                let node = start_node(&s)?;
                attach(&mut stack, &mut root, node, name)?;
            }
            Event::End(e) => {
                let end_name = bytes_to_string(e.name().as_ref());
                let node = stack
                    .pop()
                    .ok_or_else(|| anyhow!("unexpected </{end_name}> in {name}"))?;
                if node.name != end_name {
                    return Err(anyhow!(
                        "mismatched end tag in {name}: expected </{}>, found </{end_name}>",
                        node.name
                    ));
                }
                attach(&mut stack, &mut root, node, name)?;
            }
            Event::Text(t) => {
                let Some(parent) = stack.last_mut() else {
                    continue;
                };
                let txt = t.unescape().context("unescape text")?.into_owned();
                if txt.chars().all(char::is_whitespace) && !keeps_whitespace(&parent.name) {
                    continue;
                }
                parent.elements.push(XmlNode::text_node(txt));
            }
            Event::CData(t) => {
                if let Some(parent) = stack.last_mut() {
                    parent.elements.push(XmlNode {
                        kind: XmlNodeKind::CData,
                        ..XmlNode::text_node(bytes_to_string(t.into_inner()))
                    });
                }
            }
            Event::Comment(t) => {
                if let Some(parent) = stack.last_mut() {
                    parent.elements.push(XmlNode {
                        kind: XmlNodeKind::Comment,
                        ..XmlNode::text_node(bytes_to_string(t.into_inner()))
                    });
                }
            }
            Event::PI(_) | Event::DocType(_) => {
                log::debug!("dropping processing instruction/doctype in {name}");
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(anyhow!("unclosed element <{}> in {name}", open.name));
    }
    let root = root.ok_or_else(|| anyhow!("no root element in {name}"))?;
    Ok(XmlDocument { declaration, root })
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
    part_name: &str,
) -> anyhow::Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.elements.push(node),
        None => {
            if root.is_some() {
                return Err(anyhow!("multiple root elements in {part_name}"));
            }
            *root = Some(node);
        }
    }
    Ok(())
}

fn start_node(s: &BytesStart<'_>) -> anyhow::Result<XmlNode> {
    let mut node = XmlNode::element(bytes_to_string(s.name().as_ref()));
    for a in s.attributes().with_checks(false) {
        let a = a.context("attr")?;
        let key = bytes_to_string(a.key.as_ref());
        let val = a.unescape_value().context("unescape attr")?.into_owned();
        node.attributes.push((key, val));
    }
    Ok(node)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn write_xml(doc: &XmlDocument) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    if let Some(d) = doc.declaration.as_ref() {
        out.extend_from_slice(b"<?xml version=\"");
        out.extend_from_slice(d.version.as_bytes());
        out.extend_from_slice(b"\"");
        if let Some(enc) = d.encoding.as_deref() {
            out.extend_from_slice(b" encoding=\"");
            out.extend_from_slice(enc.as_bytes());
            out.extend_from_slice(b"\"");
        }
        if let Some(sa) = d.standalone.as_deref() {
            out.extend_from_slice(b" standalone=\"");
            out.extend_from_slice(sa.as_bytes());
            out.extend_from_slice(b"\"");
        }
        out.extend_from_slice(b"?>\r\n");
    }
    write_node(&mut out, &doc.root);
    out
}

pub fn write_node_string(node: &XmlNode) -> String {
    let mut out = Vec::new();
    write_node(&mut out, node);
    String::from_utf8_lossy(&out).into_owned()
}

fn write_node(out: &mut Vec<u8>, node: &XmlNode) {
    match node.kind {
        XmlNodeKind::Text => {
            escape_text_into(out, node.text.as_deref().unwrap_or(""));
        }
        XmlNodeKind::CData => {
            out.extend_from_slice(b"<![CDATA[");
            out.extend_from_slice(node.text.as_deref().unwrap_or("").as_bytes());
            out.extend_from_slice(b"]]>");
        }
        XmlNodeKind::Comment => {
            out.extend_from_slice(b"<!--");
            out.extend_from_slice(node.text.as_deref().unwrap_or("").as_bytes());
            out.extend_from_slice(b"-->");
        }
        XmlNodeKind::Element => {
            out.extend_from_slice(b"<");
            out.extend_from_slice(node.name.as_bytes());
            for (k, v) in &node.attributes {
                out.extend_from_slice(b" ");
                out.extend_from_slice(k.as_bytes());
                out.extend_from_slice(b"=\"");
                escape_attr_into(out, v);
                out.extend_from_slice(b"\"");
            }
            if node.elements.is_empty() {
                out.extend_from_slice(b"/>");
                return;
            }
            out.extend_from_slice(b">");
            for child in &node.elements {
                write_node(out, child);
            }
            out.extend_from_slice(b"</");
            out.extend_from_slice(node.name.as_bytes());
            out.extend_from_slice(b">");
        }
    }
}

fn push_char(out: &mut Vec<u8>, ch: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
}

fn escape_text_into(out: &mut Vec<u8>, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            _ => push_char(out, ch),
        }
    }
}

// CR/LF/TAB are written as character references: a literal newline inside an attribute
// value is normalized to a space by the next parser (VML `o:gfxdata` depends on this).
fn escape_attr_into(out: &mut Vec<u8>, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            '"' => out.extend_from_slice(b"&quot;"),
            '\r' => out.extend_from_slice(b"&#xD;"),
            '\n' => out.extend_from_slice(b"&#xA;"),
            '\t' => out.extend_from_slice(b"&#x9;"),
            _ => push_char(out, ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_xml, parse_xml_str, write_xml, XmlNode, XmlNodeKind};

    #[test]
    fn write_preserves_attr_line_breaks() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?><root xmlns:o="urn:test" o:gfxdata="A&#xD;&#xA;B"/>"#;
        let doc = parse_xml("test.xml", xml).expect("parse xml");
        assert_eq!(doc.root.attr("o:gfxdata"), Some("A\r\nB"));
        let s = String::from_utf8(write_xml(&doc)).expect("utf8");
        assert!(s.contains(r#"o:gfxdata="A&#xD;&#xA;B""#));
        assert!(!s.contains("&amp;#xD;"));
    }

    #[test]
    fn whitespace_only_text_is_kept_inside_w_t() {
        let xml = r#"<w:p>
            <w:r><w:t xml:space="preserve"> </w:t></w:r>
        </w:p>"#;
        let doc = parse_xml_str("doc.xml", xml).expect("parse");
        let r = doc.root.child("w:r").expect("run");
        assert_eq!(doc.root.elements.len(), 1);
        assert_eq!(r.child("w:t").expect("t").text_content(), " ");
    }

    #[test]
    fn json_in_attribute_survives_roundtrip() {
        let mut node = XmlNode::element("w:tag");
        node.set_attr("w:val", r#"{"fieldId":"a&b","x":"<1>"}"#);
        let doc = super::XmlDocument::new(node);
        let bytes = write_xml(&doc);
        let back = parse_xml("t.xml", &bytes).expect("reparse");
        assert_eq!(back.root.val(), Some(r#"{"fieldId":"a&b","x":"<1>"}"#));
    }

    #[test]
    fn mismatched_end_tag_is_an_error() {
        assert!(parse_xml_str("bad.xml", "<a><b></a>").is_err());
        assert!(parse_xml_str("bad.xml", "").is_err());
    }

    #[test]
    fn utf16_part_is_transcoded() {
        let text = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><a x=\"\u{e9}\"/>";
        let mut bytes = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let doc = parse_xml("u16.xml", &bytes).expect("parse utf16");
        assert_eq!(doc.root.attr("x"), Some("\u{e9}"));
        assert_eq!(
            doc.declaration.and_then(|d| d.encoding).as_deref(),
            Some("UTF-8")
        );
    }

    #[test]
    fn comments_and_text_kinds() {
        let doc = parse_xml_str("c.xml", "<a><!--note-->x</a>").expect("parse");
        assert_eq!(doc.root.elements[0].kind, XmlNodeKind::Comment);
        assert_eq!(doc.root.text_content(), "x");
    }
}
