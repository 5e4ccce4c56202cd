use crate::docx::xml::{XmlDocument, XmlNode};

pub const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
pub const NUMBERING_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml";

pub fn image_content_type(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "emf" => Some("image/x-emf"),
        "wmf" => Some("image/x-wmf"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Sniffs an image format from magic bytes, for media stored under a `.bin` name.
pub fn sniff_image_content_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else if bytes.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || bytes.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        Some("image/tiff")
    } else if bytes.len() > 44 && bytes[0..4] == [0x01, 0x00, 0x00, 0x00] && &bytes[40..44] == b" EMF" {
        Some("image/x-emf")
    } else if bytes.starts_with(&[0xD7, 0xCD, 0xC6, 0x9A]) {
        Some("image/x-wmf")
    } else {
        None
    }
}

/// View over `[Content_Types].xml`.
pub struct ContentTypes<'a> {
    doc: &'a mut XmlDocument,
}

impl<'a> ContentTypes<'a> {
    pub fn new(doc: &'a mut XmlDocument) -> Self {
        Self { doc }
    }

    pub fn has_default(&self, extension: &str) -> bool {
        self.doc.root.children_named("Default").any(|n| {
            n.attr("Extension")
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
    }

    pub fn has_override(&self, part_name: &str) -> bool {
        let want = format!("/{}", part_name.trim_start_matches('/'));
        self.doc
            .root
            .children_named("Override")
            .any(|n| n.attr("PartName").is_some_and(|p| p.eq_ignore_ascii_case(&want)))
    }

    /// Returns true when a `Default` was added.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) -> bool {
        if self.has_default(extension) {
            return false;
        }
        let node = XmlNode::element("Default")
            .with_attr("Extension", extension.to_ascii_lowercase())
            .with_attr("ContentType", content_type);
        // Defaults precede overrides.
        let pos = self
            .doc
            .root
            .elements
            .iter()
            .position(|n| n.is_named("Override"))
            .unwrap_or(self.doc.root.elements.len());
        self.doc.root.elements.insert(pos, node);
        true
    }

    /// Returns true when an `Override` was added.
    pub fn ensure_override(&mut self, part_name: &str, content_type: &str) -> bool {
        if self.has_override(part_name) {
            return false;
        }
        let node = XmlNode::element("Override")
            .with_attr("PartName", format!("/{}", part_name.trim_start_matches('/')))
            .with_attr("ContentType", content_type);
        self.doc.root.elements.push(node);
        true
    }
}

pub fn empty_content_types() -> XmlDocument {
    XmlDocument::new(
        XmlNode::element("Types")
            .with_attr("xmlns", CONTENT_TYPES_NS)
            .with_child(
                XmlNode::element("Default")
                    .with_attr("Extension", "rels")
                    .with_attr("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
            )
            .with_child(
                XmlNode::element("Default")
                    .with_attr("Extension", "xml")
                    .with_attr("ContentType", "application/xml"),
            ),
    )
}
