//! Chart parts (`ppt/charts/chartN.xml`).
//!
//! Only text-bearing pieces are read: the chart title, axis titles, legend
//! deletions, series names and categories, and custom data-label text.
//! Malformed XML fails the whole chart; a piece that is present but unusable
//! (a title with no cached text, a legend entry without an index) fails just
//! that piece.

use crate::text::parse_text_body;
use crate::xml::{attr_parse, tag, val, val_bool, Node, XmlCursor};
use deckscan_core::{
    Chart, ChartSeries, DataLabel, ExtractionIssue, Feature, IssueFeature, Legend, Result,
};
use std::collections::BTreeMap;

/// Point indices at or above this are ignored.
const MAX_POINTS: u32 = 1 << 16;

/// Plot types whose legend lists categories rather than series.
const CATEGORY_LEGEND_PLOTS: [&[u8]; 4] = [b"pieChart", b"pie3DChart", b"doughnutChart", b"ofPieChart"];

/// Parse a chart part. XML errors become a [`IssueFeature::ChartPart`] issue.
pub(crate) fn parse_chart(xml: &str, part: &str) -> Feature<Chart> {
    parse_chart_space(xml, part)
        .map_err(|e| ExtractionIssue::new(IssueFeature::ChartPart, e.to_string()))
}

fn parse_chart_space(xml: &str, part: &str) -> Result<Chart> {
    let mut cursor = XmlCursor::new(xml, part);
    let mut chart = Chart::default();
    let mut has_category_axis = false;
    let mut value_axes: Vec<Option<Feature<String>>> = Vec::new();

    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"chartSpace" | b"chart" | b"plotArea" => {}
                b"title" => {
                    chart.title = Some(parse_title(&mut cursor, IssueFeature::ChartTitle)?)
                }
                b"legend" => chart.legend = Some(parse_legend(&mut cursor)?),
                b"catAx" | b"dateAx" => {
                    has_category_axis = true;
                    chart.category_axis_title =
                        parse_axis(&mut cursor, IssueFeature::CategoryAxisTitle)?;
                }
                b"valAx" => value_axes.push(parse_axis(&mut cursor, IssueFeature::ValueAxisTitle)?),
                b"ser" => chart.series.push(parse_series(&mut cursor)?),
                name if name.ends_with(b"Chart") => {
                    if CATEGORY_LEGEND_PLOTS.contains(&name) {
                        chart.varies_by_category = true;
                    }
                }
                _ => cursor.skip(&e)?,
            },
            Node::Eof => break,
            _ => {}
        }
    }

    // Without catAx/dateAx the first valAx is the X axis; with two valAx the
    // value axis is the second one.
    let mut value_axes = value_axes.into_iter();
    let first = value_axes.next().flatten();
    let second = value_axes.next();
    if !has_category_axis {
        chart.category_axis_title = first.clone().map(|title| {
            title.map_err(|issue| ExtractionIssue::new(IssueFeature::CategoryAxisTitle, issue.message))
        });
    }
    chart.value_axis_title = match second {
        Some(title) => title,
        None => first,
    };

    chart.series.sort_by_key(|s| s.order);
    Ok(chart)
}

/// `c:title`. A title without `c:tx` is an automatic title with no text of
/// its own.
fn parse_title(cursor: &mut XmlCursor<'_>, feature: IssueFeature) -> Result<Feature<String>> {
    let mut title = Ok(String::new());
    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"tx" => title = parse_tx(cursor, feature)?,
                _ => cursor.skip(&e)?,
            },
            Node::Close => return Ok(title),
            Node::Eof => return Err(eof(cursor, "title")),
            _ => {}
        }
    }
}

/// `c:tx`: rich text, a cell reference with cached text, or a literal.
fn parse_tx(cursor: &mut XmlCursor<'_>, feature: IssueFeature) -> Result<Feature<String>> {
    let mut text = Err(ExtractionIssue::new(feature, "text element is empty"));
    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"rich" => text = Ok(parse_text_body(cursor)?.text()),
                b"strRef" => {
                    let (formula, points) = parse_reference(cursor)?;
                    text = if points.is_empty() {
                        Err(ExtractionIssue::new(
                            feature,
                            format!(
                                "reference {} has no cached text",
                                formula.as_deref().unwrap_or("(unnamed)")
                            ),
                        ))
                    } else {
                        Ok(points.join(" "))
                    };
                }
                b"v" => text = Ok(cursor.text_of(&e)?),
                _ => cursor.skip(&e)?,
            },
            Node::Close => return Ok(text),
            Node::Eof => return Err(eof(cursor, "tx")),
            _ => {}
        }
    }
}

/// A `c:strRef`/`c:numRef`: its formula and the cached point values.
fn parse_reference(cursor: &mut XmlCursor<'_>) -> Result<(Option<String>, Vec<String>)> {
    let mut formula = None;
    let mut points = Vec::new();
    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"f" => formula = Some(cursor.text_of(&e)?),
                b"strCache" | b"numCache" => points = parse_points(cursor)?,
                _ => cursor.skip(&e)?,
            },
            Node::Close => return Ok((formula, points)),
            Node::Eof => return Err(eof(cursor, "strRef")),
            _ => {}
        }
    }
}

/// Point values (`c:pt idx` / `c:v`) anywhere below the current element,
/// ordered by index with gaps left empty. Trailing points without a value
/// are not represented. When several levels repeat an
/// index (multi-level categories) the first level wins.
fn parse_points(cursor: &mut XmlCursor<'_>) -> Result<Vec<String>> {
    let mut points: BTreeMap<u32, String> = BTreeMap::new();
    let mut depth = 0usize;
    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"pt" => {
                    let idx: Option<u32> = attr_parse(&e, b"idx");
                    let value = parse_point_value(cursor)?;
                    if let Some(idx) = idx.filter(|&i| i < MAX_POINTS) {
                        points.entry(idx).or_insert(value);
                    }
                }
                b"formatCode" | b"extLst" => cursor.skip(&e)?,
                _ => depth += 1,
            },
            Node::Close if depth == 0 => break,
            Node::Close => depth -= 1,
            Node::Eof => return Err(eof(cursor, "point cache")),
            _ => {}
        }
    }

    let len = points.keys().next_back().map_or(0, |&i| i as usize + 1);
    let mut values = vec![String::new(); len];
    for (idx, value) in points {
        values[idx as usize] = value;
    }
    Ok(values)
}

fn parse_point_value(cursor: &mut XmlCursor<'_>) -> Result<String> {
    let mut value = String::new();
    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"v" => value = cursor.text_of(&e)?,
                _ => cursor.skip(&e)?,
            },
            Node::Close => return Ok(value),
            Node::Eof => return Err(eof(cursor, "pt")),
            _ => {}
        }
    }
}

/// `c:legend`: which entries the author deleted.
fn parse_legend(cursor: &mut XmlCursor<'_>) -> Result<Feature<Legend>> {
    let mut legend = Legend::default();
    let mut issue = None;
    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"legendEntry" => {
                    let (idx, deleted) = parse_legend_entry(cursor)?;
                    match idx {
                        Some(idx) if deleted => legend.deleted_entries.push(idx),
                        Some(_) => {}
                        None => {
                            issue.get_or_insert_with(|| {
                                ExtractionIssue::new(IssueFeature::Legend, "legend entry without index")
                            });
                        }
                    }
                }
                _ => cursor.skip(&e)?,
            },
            Node::Close => return Ok(issue.map_or(Ok(legend), Err)),
            Node::Eof => return Err(eof(cursor, "legend")),
            _ => {}
        }
    }
}

fn parse_legend_entry(cursor: &mut XmlCursor<'_>) -> Result<(Option<u32>, bool)> {
    let mut idx = None;
    let mut deleted = false;
    loop {
        match cursor.step()? {
            Node::Leaf(e) => match tag(&e) {
                b"idx" => idx = val(&e),
                b"delete" => deleted = val_bool(&e),
                _ => {}
            },
            Node::Open(e) => cursor.skip(&e)?,
            Node::Close => return Ok((idx, deleted)),
            Node::Eof => return Err(eof(cursor, "legendEntry")),
            Node::Text(_) => {}
        }
    }
}

/// An axis element; returns its title if it has one.
fn parse_axis(cursor: &mut XmlCursor<'_>, feature: IssueFeature) -> Result<Option<Feature<String>>> {
    let mut title = None;
    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"title" => title = Some(parse_title(cursor, feature)?),
                _ => cursor.skip(&e)?,
            },
            Node::Close => return Ok(title),
            Node::Eof => return Err(eof(cursor, "axis")),
            _ => {}
        }
    }
}

fn parse_series(cursor: &mut XmlCursor<'_>) -> Result<ChartSeries> {
    let mut series = ChartSeries::default();
    let mut order = None;
    loop {
        match cursor.step()? {
            Node::Leaf(e) => match tag(&e) {
                b"idx" => series.index = val(&e).unwrap_or(series.index),
                b"order" => order = val(&e),
                _ => {}
            },
            Node::Open(e) => match tag(&e) {
                b"tx" => match parse_tx(cursor, IssueFeature::Legend)? {
                    Ok(name) => series.name = Some(name),
                    Err(issue) => log::debug!("Series {} has no name: {}", series.index, issue),
                },
                b"cat" | b"xVal" => series.categories = parse_points(cursor)?,
                b"dLbls" => series.data_labels = Some(parse_data_labels(cursor)?),
                _ => cursor.skip(&e)?,
            },
            Node::Close => {
                series.order = order.unwrap_or(series.index);
                return Ok(series);
            }
            Node::Eof => return Err(eof(cursor, "ser")),
            Node::Text(_) => {}
        }
    }
}

/// `c:dLbls`: custom label text per point, in point order. Deleted labels and
/// labels showing only computed values are left out.
fn parse_data_labels(cursor: &mut XmlCursor<'_>) -> Result<Feature<Vec<DataLabel>>> {
    let mut labels = Vec::new();
    let mut issue = None;
    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"dLbl" => match parse_data_label(cursor)? {
                    (Some(index), Some(Ok(text)), false) => labels.push(DataLabel { index, text }),
                    (_, Some(Err(err)), false) => {
                        issue.get_or_insert(err);
                    }
                    (None, Some(Ok(_)), false) => {
                        issue.get_or_insert_with(|| {
                            ExtractionIssue::new(IssueFeature::DataLabels, "data label without index")
                        });
                    }
                    _ => {}
                },
                _ => cursor.skip(&e)?,
            },
            Node::Close => {
                labels.sort_by_key(|l| l.index);
                return Ok(issue.map_or(Ok(labels), Err));
            }
            Node::Eof => return Err(eof(cursor, "dLbls")),
            _ => {}
        }
    }
}

type LabelParts = (Option<u32>, Option<Feature<String>>, bool);

fn parse_data_label(cursor: &mut XmlCursor<'_>) -> Result<LabelParts> {
    let mut idx = None;
    let mut text = None;
    let mut deleted = false;
    loop {
        match cursor.step()? {
            Node::Leaf(e) => match tag(&e) {
                b"idx" => idx = val(&e),
                b"delete" => deleted = val_bool(&e),
                _ => {}
            },
            Node::Open(e) => match tag(&e) {
                b"tx" => text = Some(parse_tx(cursor, IssueFeature::DataLabels)?),
                _ => cursor.skip(&e)?,
            },
            Node::Close => return Ok((idx, text, deleted)),
            Node::Eof => return Err(eof(cursor, "dLbl")),
            Node::Text(_) => {}
        }
    }
}

fn eof(cursor: &XmlCursor<'_>, element: &str) -> deckscan_core::Error {
    deckscan_core::Error::XmlError(format!(
        "{}: unexpected end of document inside <{}>",
        cursor.part(),
        element
    ))
}
