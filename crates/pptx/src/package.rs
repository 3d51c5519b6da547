//! OPC package access: parts inside the ZIP container and their relationships.

use crate::xml::{attr, tag, Node, XmlCursor};
use deckscan_core::{Error, Result};
use std::io::{Read, Seek};
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) const REL_OFFICE_DOCUMENT: &str = "/officeDocument";
pub(crate) const REL_SLIDE: &str = "/slide";
pub(crate) const REL_SLIDE_LAYOUT: &str = "/slideLayout";
pub(crate) const REL_SLIDE_MASTER: &str = "/slideMaster";

/// One entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Absolute part name (no leading slash) for internal targets, the raw
    /// target for external ones.
    pub target: String,
    pub external: bool,
}

/// Relationships of one source part, in document order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Relationships {
    entries: Vec<Relationship>,
}

impl Relationships {
    pub(crate) fn parse(xml: &str, rels_part: &str, source_part: &str) -> Result<Self> {
        let mut cursor = XmlCursor::new(xml, rels_part);
        let mut entries = Vec::new();

        loop {
            match cursor.step()? {
                Node::Open(e) | Node::Leaf(e) if tag(&e) == b"Relationship" => {
                    let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) else {
                        log::warn!("{}: relationship without Id or Target", rels_part);
                        continue;
                    };
                    let external = attr(&e, b"TargetMode").as_deref() == Some("External");
                    let target = if external {
                        target
                    } else {
                        resolve_target(source_part, &target)
                    };
                    entries.push(Relationship {
                        id,
                        rel_type: attr(&e, b"Type").unwrap_or_default(),
                        target,
                        external,
                    });
                }
                Node::Eof => break,
                _ => {}
            }
        }

        Ok(Self { entries })
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    /// Internal relationships whose type URI ends with `suffix`.
    pub(crate) fn of_type<'s>(&'s self, suffix: &'s str) -> impl Iterator<Item = &'s Relationship> {
        self.entries
            .iter()
            .filter(move |r| !r.external && r.rel_type.ends_with(suffix))
    }

    pub(crate) fn first_of_type<'s>(&'s self, suffix: &'s str) -> Option<&'s Relationship> {
        self.of_type(suffix).next()
    }
}

/// A `.pptx` ZIP container.
pub(crate) struct Package<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> Package<R> {
    pub(crate) fn open(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;
        Ok(Self { archive })
    }

    /// Read a part as UTF-8 text.
    pub(crate) fn read_string(&mut self, path: &str) -> Result<String> {
        let mut file = self.archive.by_name(path).map_err(|e| part_error(path, e))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }

    /// Read a binary part such as an image.
    pub(crate) fn read_bytes(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(path).map_err(|e| part_error(path, e))?;

        let mut content = Vec::with_capacity(capacity_hint(file.size()));
        file.read_to_end(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }

    pub(crate) fn contains(&self, path: &str) -> bool {
        self.archive.file_names().any(|name| name == path)
    }

    /// Relationships of `part`. A part without a `.rels` file has none.
    pub(crate) fn relationships(&mut self, part: &str) -> Result<Relationships> {
        let rels_part = rels_path_for(part);
        if !self.contains(&rels_part) {
            return Ok(Relationships::default());
        }
        let xml = self.read_string(&rels_part)?;
        Relationships::parse(&xml, &rels_part, part)
    }
}

fn part_error(path: &str, e: ZipError) -> Error {
    match e {
        ZipError::FileNotFound => Error::PptxParseError(format!("Missing part '{}'", path)),
        e => Error::ZipError(format!("File not found in archive '{}': {}", path, e)),
    }
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`.
pub(crate) fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, name)) => format!("{}/_rels/{}.rels", dir, name),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the directory of its source part.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Largest buffer reserved up front from a declared entry size.
const MAX_PREALLOC: usize = 64 << 20;

/// Initial buffer size for an entry whose header claims `declared` bytes. The
/// header is untrusted, so the buffer grows past the cap only as data arrives.
fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOC, |size| size.min(MAX_PREALLOC))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_hint_is_capped() {
        assert_eq!(capacity_hint(1024), 1024);
        assert_eq!(capacity_hint(u64::MAX), MAX_PREALLOC);
        assert_eq!(capacity_hint(u32::MAX as u64), MAX_PREALLOC);
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(
            rels_path_for("ppt/slides/slide1.xml"),
            "ppt/slides/_rels/slide1.xml.rels"
        );
        assert_eq!(
            rels_path_for("ppt/presentation.xml"),
            "ppt/_rels/presentation.xml.rels"
        );
        assert_eq!(rels_path_for(""), "_rels/.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../charts/chart1.xml"),
            "ppt/charts/chart1.xml"
        );
        assert_eq!(
            resolve_target("ppt/presentation.xml", "slides/slide2.xml"),
            "ppt/slides/slide2.xml"
        );
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "/ppt/media/image1.png"),
            "ppt/media/image1.png"
        );
        assert_eq!(resolve_target("", "ppt/presentation.xml"), "ppt/presentation.xml");
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "./../media/./image2.jpeg"),
            "ppt/media/image2.jpeg"
        );
    }

    #[test]
    fn test_parse_relationships() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout2.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/chart" Target="../charts/chart3.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/>
</Relationships>"#;
        let rels = Relationships::parse(
            xml,
            "ppt/slides/_rels/slide1.xml.rels",
            "ppt/slides/slide1.xml",
        )
        .unwrap();

        assert_eq!(rels.get("rId2").unwrap().target, "ppt/charts/chart3.xml");
        assert_eq!(
            rels.first_of_type(REL_SLIDE_LAYOUT).unwrap().target,
            "ppt/slideLayouts/slideLayout2.xml"
        );
        let link = rels.get("rId3").unwrap();
        assert!(link.external);
        assert_eq!(link.target, "https://example.com/");
        assert!(rels.get("rId9").is_none());
    }

    #[test]
    fn test_slide_type_suffix_excludes_layouts() {
        let xml = r#"<Relationships>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
</Relationships>"#;
        let rels = Relationships::parse(xml, "ppt/_rels/presentation.xml.rels", "ppt/presentation.xml")
            .unwrap();
        let slides: Vec<_> = rels.of_type(REL_SLIDE).map(|r| r.id.as_str()).collect();
        assert_eq!(slides, vec!["rId2"]);
    }
}
