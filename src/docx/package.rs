use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::docx::parts::{is_xml_part_name, part_bytes, Part, PartMap};

/// The zip container of a `.docx`: entry metadata is kept so untouched entries are written
/// back with their original compression and timestamps.
pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path).with_context(|| format!("open docx: {}", path.display()))?;
        Self::from_reader(f)
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    fn from_reader<R: Read + Seek>(reader: R) -> anyhow::Result<Self> {
        let mut zip = ZipArchive::new(reader).context("read zip")?;
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).context("zip entry")?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).context("read zip entry")?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    /// XML parts are handed over unparsed; the converter parses what it needs.
    pub fn to_parts(&self) -> PartMap {
        let mut parts = PartMap::new();
        for ent in &self.entries {
            if ent.is_dir || ent.name.ends_with('/') {
                continue;
            }
            let part = if is_xml_part_name(&ent.name) {
                match String::from_utf8(ent.data.clone()) {
                    Ok(text) if !text.starts_with('\u{feff}') => Part::Text(text),
                    _ => Part::Binary(ent.data.clone()),
                }
            } else {
                Part::Binary(ent.data.clone())
            };
            parts.insert(ent.name.clone(), part);
        }
        parts
    }

    /// Writes `parts` as a zip. Entries known to this package keep their position and
    /// metadata; new parts are appended; parts missing from `parts` are dropped.
    pub fn write_parts<W: Write + Seek>(&self, writer: W, parts: &PartMap) -> anyhow::Result<W> {
        let mut zout = ZipWriter::new(writer);
        let mut written: HashSet<&str> = HashSet::new();

        for ent in &self.entries {
            if ent.is_dir || ent.name.ends_with('/') {
                continue;
            }
            let Some(part) = parts.get(&ent.name) else {
                log::debug!("dropping package entry {}", ent.name);
                continue;
            };
            let opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            zout.start_file(ent.name.as_str(), opts)
                .with_context(|| format!("start zip file: {}", ent.name))?;
            zout.write_all(&part_bytes(part))
                .with_context(|| format!("write zip file: {}", ent.name))?;
            written.insert(ent.name.as_str());
        }

        // [Content_Types].xml conventionally leads the archive.
        let mut new_names: Vec<&String> = parts
            .keys()
            .filter(|k| !written.contains(k.as_str()))
            .collect();
        new_names.sort_by(|a, b| {
            let a_key = (a.as_str() != "[Content_Types].xml", a.as_str());
            let b_key = (b.as_str() != "[Content_Types].xml", b.as_str());
            a_key.cmp(&b_key)
        });
        for name in new_names {
            let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            zout.start_file(name.as_str(), opts)
                .with_context(|| format!("start zip file: {name}"))?;
            zout.write_all(&part_bytes(&parts[name]))
                .with_context(|| format!("write zip file: {name}"))?;
        }
        zout.finish().context("finish zip")
    }

    pub fn write_parts_to_vec(&self, parts: &PartMap) -> anyhow::Result<Vec<u8>> {
        let cursor = self.write_parts(Cursor::new(Vec::new()), parts)?;
        Ok(cursor.into_inner())
    }

    pub fn write_parts_to_path(&self, output_path: &Path, parts: &PartMap) -> anyhow::Result<()> {
        let f = File::create(output_path)
            .with_context(|| format!("create output docx: {}", output_path.display()))?;
        self.write_parts(f, parts)?;
        Ok(())
    }
}

/// Builds an in-memory package from `(name, bytes)` pairs, all deflated.
pub fn build_package(entries: &[(&str, &[u8])]) -> anyhow::Result<Vec<u8>> {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zout.start_file(*name, opts)
            .with_context(|| format!("start zip file: {name}"))?;
        zout.write_all(data)
            .with_context(|| format!("write zip file: {name}"))?;
    }
    Ok(zout.finish().context("finish zip")?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_roundtrips_through_part_map() {
        let bytes = build_package(&[
            ("[Content_Types].xml", b"<Types/>".as_slice()),
            ("word/document.xml", b"<w:document/>".as_slice()),
            ("word/media/image1.png", [0x89u8, b'P', b'N', b'G'].as_slice()),
        ])
        .expect("build");
        let pkg = DocxPackage::from_bytes(&bytes).expect("read");
        let mut parts = pkg.to_parts();
        assert!(matches!(parts.get("word/document.xml"), Some(Part::Text(_))));
        assert!(matches!(parts.get("word/media/image1.png"), Some(Part::Binary(_))));

        parts.insert("word/numbering.xml".into(), Part::Text("<w:numbering/>".into()));
        parts.remove("word/media/image1.png");
        let out = pkg.write_parts_to_vec(&parts).expect("write");
        let reread = DocxPackage::from_bytes(&out).expect("reread");
        let names: Vec<&str> = reread.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["[Content_Types].xml", "word/document.xml", "word/numbering.xml"]
        );
    }
}
