//! PPTX file parser implementation.

use crate::chart::parse_chart;
use crate::package::{
    Package, Relationships, REL_OFFICE_DOCUMENT, REL_SLIDE, REL_SLIDE_LAYOUT, REL_SLIDE_MASTER,
};
use crate::slide::{parse_shape_tree, GeometryOnly, PartResolver};
use crate::xml::{ns_attr, tag, Node, XmlCursor};
use deckscan_core::{
    Chart, Error, ExtractionIssue, Feature, IssueFeature, PlaceholderRef, Presentation,
    PresentationFormat, PresentationLoader, Result, Shape, Slide,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_MAIN_PART: &str = "ppt/presentation.xml";

/// Parser for PPTX (Office Open XML) files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a PPTX package from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R, filename: &str) -> Result<Presentation> {
        let mut package = Package::open(reader)?;
        let mut presentation = Presentation::new(filename, PresentationFormat::Pptx);

        let slide_order = self.get_slide_order(&mut package)?;
        log::debug!("{}: {} slides", filename, slide_order.len());

        let mut session = Session::default();
        for (idx, slide_path) in slide_order.iter().enumerate() {
            let slide = session.parse_slide(&mut package, slide_path, idx + 1)?;
            presentation.add_slide(slide);
        }

        Ok(presentation)
    }

    /// Parse a PPTX package held in memory.
    pub fn parse_bytes(&self, bytes: &[u8], filename: &str) -> Result<Presentation> {
        self.parse(Cursor::new(bytes), filename)
    }

    /// Ordered slide part names.
    ///
    /// Follows `p:sldIdLst` in the main presentation part. Packages without
    /// one fall back to the slide relationships ordered by the number in
    /// their id or target.
    fn get_slide_order<R: Read + Seek>(&self, package: &mut Package<R>) -> Result<Vec<String>> {
        let root = package.relationships("")?;
        let main_part = root
            .first_of_type(REL_OFFICE_DOCUMENT)
            .map(|r| r.target.clone())
            .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());

        let main_xml = package.read_string(&main_part)?;
        let rels = package.relationships(&main_part)?;

        let listed = slide_id_list(&main_xml, &main_part)?;
        if !listed.is_empty() {
            let mut slides = Vec::with_capacity(listed.len());
            for rel_id in listed {
                match rels.get(&rel_id) {
                    Some(rel) if !rel.external => slides.push(rel.target.clone()),
                    _ => log::warn!("{}: slide {} has no relationship", main_part, rel_id),
                }
            }
            return Ok(slides);
        }

        let mut slides: Vec<(String, Option<usize>)> = rels
            .of_type(REL_SLIDE)
            .map(|rel| {
                let order_num = extract_slide_number(&rel.id).or_else(|| extract_slide_number(&rel.target));
                (rel.target.clone(), order_num)
            })
            .collect();

        // Sort slides by their number
        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }
}

impl PresentationLoader for PptxParser {
    fn load(&self, path: &Path) -> Result<Presentation> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        // Read magic bytes to detect format
        let mut magic = [0u8; 8];
        let read = reader.read(&mut magic)?;
        reader.rewind()?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let format = PresentationFormat::from_magic(&magic[..read]).or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(PresentationFormat::from_extension)
        });

        match format {
            Some(PresentationFormat::Pptx) => {
                log::debug!("Parsing {} as PPTX", filename);
                self.parse(reader, &filename)
            }
            Some(PresentationFormat::Ppt) => Err(Error::UnsupportedFormat(format!(
                "{} is a legacy binary .ppt file; save it as .pptx to search it",
                filename
            ))),
            None => Err(Error::UnsupportedFormat(format!(
                "{} is not a PowerPoint file",
                filename
            ))),
        }
    }
}

/// `r:id` of every `p:sldId`, in presentation order.
fn slide_id_list(xml: &str, part: &str) -> Result<Vec<String>> {
    let mut cursor = XmlCursor::new(xml, part);
    let mut ids = Vec::new();
    loop {
        match cursor.step()? {
            Node::Open(e) | Node::Leaf(e) if tag(&e) == b"sldId" => {
                if let Some(id) = ns_attr(&e, b"id") {
                    ids.push(id);
                }
            }
            Node::Open(e) if tag(&e) == b"extLst" => cursor.skip(&e)?,
            Node::Eof => return Ok(ids),
            _ => {}
        }
    }
}

/// Caches shared by the slides of one package.
#[derive(Default)]
struct Session {
    layouts: HashMap<String, Arc<LayoutInfo>>,
    masters: HashMap<String, Arc<Placeholders>>,
    media: HashMap<String, Arc<[u8]>>,
}

struct LayoutInfo {
    placeholders: Placeholders,
    master: Option<String>,
}

impl Session {
    fn parse_slide<R: Read + Seek>(
        &mut self,
        package: &mut Package<R>,
        slide_path: &str,
        slide_number: usize,
    ) -> Result<Slide> {
        let content = package.read_string(slide_path)?;
        let rels = package.relationships(slide_path)?;

        let shapes = {
            let mut parts = SlideParts {
                package: &mut *package,
                rels: &rels,
                media: &mut self.media,
            };
            parse_shape_tree(&content, slide_path, &mut parts)?
        };

        let mut slide = Slide::new(slide_number);
        let needs_inheritance = shapes
            .iter()
            .any(|s| s.placeholder.is_some() && s.top.is_none());
        let layout = match rels.first_of_type(REL_SLIDE_LAYOUT) {
            Some(rel) if needs_inheritance => Some(self.layout(package, &rel.target)),
            _ => None,
        };

        for mut shape in shapes {
            if let (Some(layout), None) = (&layout, shape.top) {
                shape.top = self.inherited_top(package, layout, &shape);
            }
            slide.add_shape(shape);
        }

        Ok(slide)
    }

    /// Position of the layout (then master) placeholder `shape` fills.
    fn inherited_top<R: Read + Seek>(
        &mut self,
        package: &mut Package<R>,
        layout: &LayoutInfo,
        shape: &Shape,
    ) -> Option<i64> {
        let ph = shape.placeholder.as_ref()?;
        if let Some(top) = layout.placeholders.by_idx(ph).or_else(|| layout.placeholders.by_type(ph)) {
            return Some(top);
        }
        let master = self.master(package, layout.master.as_deref()?);
        master.by_master_type(ph)
    }

    fn layout<R: Read + Seek>(&mut self, package: &mut Package<R>, path: &str) -> Arc<LayoutInfo> {
        if let Some(layout) = self.layouts.get(path) {
            return Arc::clone(layout);
        }
        let master = package
            .relationships(path)
            .ok()
            .and_then(|rels| rels.first_of_type(REL_SLIDE_MASTER).map(|r| r.target.clone()));
        let layout = Arc::new(LayoutInfo {
            placeholders: load_placeholders(package, path),
            master,
        });
        self.layouts.insert(path.to_string(), Arc::clone(&layout));
        layout
    }

    fn master<R: Read + Seek>(&mut self, package: &mut Package<R>, path: &str) -> Arc<Placeholders> {
        if let Some(master) = self.masters.get(path) {
            return Arc::clone(master);
        }
        let master = Arc::new(load_placeholders(package, path));
        self.masters.insert(path.to_string(), Arc::clone(&master));
        master
    }
}

/// Placeholder geometry of a layout or master. Unreadable parts have none.
fn load_placeholders<R: Read + Seek>(package: &mut Package<R>, path: &str) -> Placeholders {
    let shapes = package
        .read_string(path)
        .and_then(|xml| parse_shape_tree(&xml, path, &mut GeometryOnly));
    match shapes {
        Ok(shapes) => Placeholders::from_shapes(&shapes),
        Err(e) => {
            log::debug!("No placeholder geometry from {}: {}", path, e);
            Placeholders::default()
        }
    }
}

/// Positioned placeholders of a layout or master.
#[derive(Debug, Default)]
struct Placeholders {
    entries: Vec<(PlaceholderRef, i64)>,
}

impl Placeholders {
    fn from_shapes(shapes: &[Shape]) -> Self {
        let entries = shapes
            .iter()
            .filter_map(|s| Some((s.placeholder.clone()?, s.top?)))
            .collect();
        Self { entries }
    }

    fn by_idx(&self, ph: &PlaceholderRef) -> Option<i64> {
        let idx = ph.idx?;
        self.entries
            .iter()
            .find(|(p, _)| p.idx == Some(idx))
            .map(|(_, top)| *top)
    }

    fn by_type(&self, ph: &PlaceholderRef) -> Option<i64> {
        self.entries
            .iter()
            .find(|(p, _)| placeholder_type(p) == placeholder_type(ph))
            .map(|(_, top)| *top)
    }

    fn by_master_type(&self, ph: &PlaceholderRef) -> Option<i64> {
        let wanted = master_type(placeholder_type(ph));
        self.entries
            .iter()
            .find(|(p, _)| master_type(placeholder_type(p)) == wanted)
            .map(|(_, top)| *top)
    }
}

fn placeholder_type(ph: &PlaceholderRef) -> &str {
    ph.kind.as_deref().unwrap_or("obj")
}

/// Masters only carry title, body and footer-area placeholders.
fn master_type(kind: &str) -> &str {
    match kind {
        "ctrTitle" | "title" => "title",
        "subTitle" | "obj" | "body" | "chart" | "tbl" | "clipArt" | "dgm" | "media" | "pic" => "body",
        other => other,
    }
}

/// Resolves a slide's chart and image relationships against the package.
struct SlideParts<'p, R: Read + Seek> {
    package: &'p mut Package<R>,
    rels: &'p Relationships,
    media: &'p mut HashMap<String, Arc<[u8]>>,
}

impl<'p, R: Read + Seek> SlideParts<'p, R> {
    fn target(&self, rel_id: &str, feature: IssueFeature) -> Feature<String> {
        match self.rels.get(rel_id) {
            Some(rel) if rel.external => Err(ExtractionIssue::new(
                feature,
                format!("{} points outside the package ({})", rel_id, rel.target),
            )),
            Some(rel) => Ok(rel.target.clone()),
            None => Err(ExtractionIssue::new(
                feature,
                format!("relationship {} not found", rel_id),
            )),
        }
    }
}

impl<'p, R: Read + Seek> PartResolver for SlideParts<'p, R> {
    fn chart(&mut self, rel_id: &str) -> Feature<Chart> {
        let target = self.target(rel_id, IssueFeature::ChartPart)?;
        let xml = self
            .package
            .read_string(&target)
            .map_err(|e| ExtractionIssue::new(IssueFeature::ChartPart, e.to_string()))?;
        parse_chart(&xml, &target)
    }

    fn image(&mut self, rel_id: &str) -> Feature<Arc<[u8]>> {
        let target = self.target(rel_id, IssueFeature::PicturePayload)?;
        if let Some(bytes) = self.media.get(&target) {
            return Ok(Arc::clone(bytes));
        }
        let bytes: Arc<[u8]> = self
            .package
            .read_bytes(&target)
            .map_err(|e| ExtractionIssue::new(IssueFeature::PicturePayload, e.to_string()))?
            .into();
        self.media.insert(target, Arc::clone(&bytes));
        Ok(bytes)
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
