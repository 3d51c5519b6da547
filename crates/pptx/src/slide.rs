//! Slide shape trees (`p:cSld/p:spTree`).
//!
//! Each shape element is parsed by one generic routine that collects the
//! non-visual properties, the offset and whatever content the element kind
//! carries. Chart and image parts are fetched through a [`PartResolver`] so
//! the tree parser never touches the package directly.

use crate::text::parse_text_body;
use crate::xml::{attr, attr_parse, ns_attr, tag, Node, XmlCursor};
use deckscan_core::{
    Chart, ExtractionIssue, Feature, IssueFeature, Picture, PlaceholderRef, Result, Shape,
    ShapeKind, Table, TableRow, TextBody,
};
use quick_xml::events::BytesStart;
use std::sync::Arc;

/// Loads the parts a slide's shapes point at.
pub(crate) trait PartResolver {
    fn chart(&mut self, rel_id: &str) -> Feature<Chart>;
    fn image(&mut self, rel_id: &str) -> Feature<Arc<[u8]>>;
}

/// Resolver for layouts and masters, where only placeholder geometry matters.
pub(crate) struct GeometryOnly;

impl PartResolver for GeometryOnly {
    fn chart(&mut self, rel_id: &str) -> Feature<Chart> {
        Err(ExtractionIssue::new(
            IssueFeature::ChartPart,
            format!("{} not loaded for layout geometry", rel_id),
        ))
    }

    fn image(&mut self, rel_id: &str) -> Feature<Arc<[u8]>> {
        Err(ExtractionIssue::new(
            IssueFeature::PicturePayload,
            format!("{} not loaded for layout geometry", rel_id),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Shape,
    Picture,
    GraphicFrame,
    Group,
    Connector,
}

impl Element {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"sp" => Some(Element::Shape),
            b"pic" => Some(Element::Picture),
            b"graphicFrame" => Some(Element::GraphicFrame),
            b"grpSp" => Some(Element::Group),
            b"cxnSp" => Some(Element::Connector),
            _ => None,
        }
    }
}

/// Top-level shapes of a slide, layout or master part, in z-order.
pub(crate) fn parse_shape_tree(
    xml: &str,
    part: &str,
    parts: &mut dyn PartResolver,
) -> Result<Vec<Shape>> {
    let mut cursor = XmlCursor::new(xml, part);
    loop {
        match cursor.step()? {
            Node::Open(e) if tag(&e) == b"spTree" => {
                let tree = parse_shape(&mut cursor, Element::Group, parts)?;
                return Ok(match tree.kind {
                    ShapeKind::Group(children) => children,
                    _ => Vec::new(),
                });
            }
            Node::Open(e) if tag(&e) == b"extLst" => cursor.skip(&e)?,
            Node::Eof => return Ok(Vec::new()),
            _ => {}
        }
    }
}

#[derive(Default)]
struct ShapeState {
    id: Option<u32>,
    name: String,
    top: Option<i64>,
    placeholder: Option<PlaceholderRef>,
    body: Option<TextBody>,
    table: Option<Table>,
    chart: Option<Feature<Chart>>,
    payload: Option<Feature<Arc<[u8]>>>,
    children: Vec<Shape>,
}

impl ShapeState {
    /// Attributes of a non-content element inside the shape.
    fn read(&mut self, element: Element, e: &BytesStart<'_>, parts: &mut dyn PartResolver) {
        match tag(e) {
            b"cNvPr" if self.id.is_none() => {
                self.id = attr_parse(e, b"id");
                self.name = attr(e, b"name").unwrap_or_default();
            }
            b"ph" => {
                self.placeholder = Some(PlaceholderRef {
                    kind: attr(e, b"type"),
                    idx: attr_parse(e, b"idx"),
                });
            }
            b"off" if self.top.is_none() => self.top = attr_parse(e, b"y"),
            b"chart" if element == Element::GraphicFrame => {
                self.chart = Some(match ns_attr(e, b"id") {
                    Some(rel_id) => parts.chart(&rel_id),
                    None => Err(ExtractionIssue::new(
                        IssueFeature::ChartPart,
                        "chart frame without relationship id",
                    )),
                });
            }
            b"blip" if element == Element::Picture && self.payload.is_none() => {
                self.payload = Some(match ns_attr(e, b"embed") {
                    Some(rel_id) => parts.image(&rel_id),
                    None => Err(ExtractionIssue::new(
                        IssueFeature::PicturePayload,
                        "image is linked, not embedded",
                    )),
                });
            }
            _ => {}
        }
    }

    fn finish(self, element: Element) -> Shape {
        let kind = match element {
            Element::Group => ShapeKind::Group(self.children),
            Element::Shape => ShapeKind::Text(self.body.unwrap_or_default()),
            Element::Picture => ShapeKind::Picture(Picture {
                payload: self.payload.unwrap_or_else(|| {
                    Err(ExtractionIssue::new(
                        IssueFeature::PicturePayload,
                        "picture has no image reference",
                    ))
                }),
            }),
            Element::GraphicFrame => match (self.table, self.chart) {
                (Some(table), _) => ShapeKind::Table(table),
                (None, Some(chart)) => ShapeKind::Chart(chart),
                (None, None) => ShapeKind::Unknown,
            },
            Element::Connector => ShapeKind::Unknown,
        };

        Shape {
            id: self.id,
            name: self.name,
            top: self.top,
            placeholder: self.placeholder,
            kind,
        }
    }
}

/// Parse the shape element whose start tag was just read.
fn parse_shape(
    cursor: &mut XmlCursor<'_>,
    element: Element,
    parts: &mut dyn PartResolver,
) -> Result<Shape> {
    let mut state = ShapeState::default();
    let mut depth = 0usize;

    loop {
        match cursor.step()? {
            Node::Open(e) => {
                let name = tag(&e);
                if element == Element::Group {
                    if let Some(child) = Element::from_tag(name) {
                        state.children.push(parse_shape(cursor, child, parts)?);
                        continue;
                    }
                    if name == b"AlternateContent" {
                        state.children.extend(parse_alternate(cursor, parts)?);
                        continue;
                    }
                }
                match name {
                    b"txBody" => state.body = Some(parse_text_body(cursor)?),
                    b"tbl" => state.table = Some(parse_table(cursor)?),
                    b"extLst" => cursor.skip(&e)?,
                    b"chart" | b"blip" => {
                        state.read(element, &e, parts);
                        cursor.skip(&e)?;
                    }
                    _ => {
                        state.read(element, &e, parts);
                        depth += 1;
                    }
                }
            }
            Node::Leaf(e) => state.read(element, &e, parts),
            Node::Text(_) => {}
            Node::Close if depth == 0 => return Ok(state.finish(element)),
            Node::Close => depth -= 1,
            Node::Eof => {
                return Err(deckscan_core::Error::XmlError(format!(
                    "{}: unexpected end of document inside a shape",
                    cursor.part()
                )))
            }
        }
    }
}

/// `mc:AlternateContent`: shapes of the first `mc:Choice`, or of
/// `mc:Fallback` when there is no choice.
fn parse_alternate(cursor: &mut XmlCursor<'_>, parts: &mut dyn PartResolver) -> Result<Vec<Shape>> {
    let mut shapes: Option<Vec<Shape>> = None;
    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"Choice" | b"Fallback" if shapes.is_none() => {
                    let branch = parse_shape(cursor, Element::Group, parts)?;
                    if let ShapeKind::Group(children) = branch.kind {
                        shapes = Some(children);
                    }
                }
                _ => cursor.skip(&e)?,
            },
            Node::Close => return Ok(shapes.unwrap_or_default()),
            Node::Eof => {
                return Err(deckscan_core::Error::XmlError(format!(
                    "{}: unexpected end of document inside AlternateContent",
                    cursor.part()
                )))
            }
            _ => {}
        }
    }
}

enum Frame {
    Row,
    Cell,
    Other,
}

/// `a:tbl`: cell text bodies in row-major order.
fn parse_table(cursor: &mut XmlCursor<'_>) -> Result<Table> {
    let mut table = Table::default();
    let mut cell: Option<TextBody> = None;
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"tr" => {
                    table.rows.push(TableRow::default());
                    stack.push(Frame::Row);
                }
                b"tc" => {
                    cell = Some(TextBody::default());
                    stack.push(Frame::Cell);
                }
                b"txBody" => cell = Some(parse_text_body(cursor)?),
                b"tblPr" | b"tblGrid" | b"tcPr" | b"extLst" => cursor.skip(&e)?,
                _ => stack.push(Frame::Other),
            },
            Node::Leaf(e) if tag(&e) == b"tc" => push_cell(&mut table, TextBody::default()),
            Node::Close => match stack.pop() {
                None => return Ok(table),
                Some(Frame::Cell) => push_cell(&mut table, cell.take().unwrap_or_default()),
                Some(Frame::Row) | Some(Frame::Other) => {}
            },
            Node::Eof => {
                return Err(deckscan_core::Error::XmlError(format!(
                    "{}: unexpected end of document inside a table",
                    cursor.part()
                )))
            }
            _ => {}
        }
    }
}

fn push_cell(table: &mut Table, body: TextBody) {
    if table.rows.is_empty() {
        table.rows.push(TableRow::default());
    }
    if let Some(row) = table.rows.last_mut() {
        row.cells.push(body);
    }
}
