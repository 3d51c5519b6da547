//! DrawingML text bodies (`p:txBody`, `a:txBody`, `c:rich`).

use crate::xml::{attr_parse, tag, Node, XmlCursor};
use deckscan_core::{Paragraph, Result, TextBody, TextRun};
use quick_xml::events::BytesStart;

enum Frame {
    Paragraph,
    Run,
    Other,
}

/// Parse the text body whose start tag was just read.
///
/// Runs (`a:r`) and fields (`a:fld`) keep their `a:rPr sz` as points; line
/// breaks (`a:br`) become `\n` runs.
pub(crate) fn parse_text_body(cursor: &mut XmlCursor<'_>) -> Result<TextBody> {
    let mut body = TextBody::default();
    let mut run: Option<TextRun> = None;
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        match cursor.step()? {
            Node::Open(e) => match tag(&e) {
                b"p" => {
                    body.paragraphs.push(Paragraph::default());
                    stack.push(Frame::Paragraph);
                }
                b"r" | b"fld" => {
                    run = Some(TextRun::new(""));
                    stack.push(Frame::Run);
                }
                b"rPr" => {
                    set_font_size(run.as_mut(), &e);
                    cursor.skip(&e)?;
                }
                b"t" => {
                    let text = cursor.text_of(&e)?;
                    match run.as_mut() {
                        Some(run) => run.text.push_str(&text),
                        None => push_run(&mut body, TextRun::new(text)),
                    }
                }
                b"br" => {
                    push_run(&mut body, TextRun::new("\n"));
                    cursor.skip(&e)?;
                }
                b"bodyPr" | b"lstStyle" | b"pPr" | b"endParaRPr" | b"extLst" => cursor.skip(&e)?,
                _ => stack.push(Frame::Other),
            },
            Node::Leaf(e) => match tag(&e) {
                b"p" => body.paragraphs.push(Paragraph::default()),
                b"rPr" => set_font_size(run.as_mut(), &e),
                b"br" => push_run(&mut body, TextRun::new("\n")),
                _ => {}
            },
            Node::Text(_) => {}
            Node::Close => match stack.pop() {
                None => return Ok(body),
                Some(Frame::Run) => {
                    if let Some(run) = run.take() {
                        push_run(&mut body, run);
                    }
                }
                Some(Frame::Paragraph) | Some(Frame::Other) => {}
            },
            Node::Eof => {
                return Err(deckscan_core::Error::XmlError(format!(
                    "{}: unexpected end of document inside text body",
                    cursor.part()
                )))
            }
        }
    }
}

fn set_font_size(run: Option<&mut TextRun>, rpr: &BytesStart<'_>) {
    if let (Some(run), Some(sz)) = (run, attr_parse::<f64>(rpr, b"sz")) {
        run.font_size_pt = Some(sz / 100.0);
    }
}

fn push_run(body: &mut TextBody, run: TextRun) {
    if body.paragraphs.is_empty() {
        body.paragraphs.push(Paragraph::default());
    }
    if let Some(paragraph) = body.paragraphs.last_mut() {
        paragraph.runs.push(run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> TextBody {
        let mut cursor = XmlCursor::new(xml, "slide.xml");
        loop {
            if let Node::Open(_) = cursor.step().unwrap() {
                return parse_text_body(&mut cursor).unwrap();
            }
        }
    }

    #[test]
    fn test_paragraphs_and_runs() {
        let body = parse(
            r#"<p:txBody><a:bodyPr/><a:lstStyle/>
                <a:p><a:r><a:rPr lang="en-US" sz="4400" b="1"/><a:t>Q3 </a:t></a:r><a:r><a:t>Results</a:t></a:r></a:p>
                <a:p><a:pPr lvl="1"/><a:r><a:rPr sz="1800"><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill></a:rPr><a:t>by region</a:t></a:r><a:endParaRPr sz="9000"/></a:p>
            </p:txBody>"#,
        );

        assert_eq!(body.text(), "Q3 Results\nby region");
        let sizes: Vec<_> = body.runs().map(|r| r.font_size_pt).collect();
        assert_eq!(sizes, vec![Some(44.0), None, Some(18.0)]);
    }

    #[test]
    fn test_line_break_and_field() {
        let body = parse(
            r#"<a:txBody><a:p><a:r><a:t>Line one</a:t></a:r><a:br><a:rPr sz="1200"/></a:br><a:r><a:t>Line two</a:t></a:r><a:fld id="{1}" type="slidenum"><a:t>7</a:t></a:fld></a:p></a:txBody>"#,
        );
        assert_eq!(body.text(), "Line one\nLine two7");
    }

    #[test]
    fn test_empty_paragraphs() {
        let body = parse(r#"<p:txBody><a:bodyPr/><a:p/><a:p><a:endParaRPr/></a:p></p:txBody>"#);
        assert_eq!(body.paragraphs.len(), 2);
        assert_eq!(body.text(), "\n");
    }

    #[test]
    fn test_escaped_text() {
        let body = parse(r#"<c:rich><a:p><a:r><a:t>R&amp;D &lt;EU&gt;</a:t></a:r></a:p></c:rich>"#);
        assert_eq!(body.text(), "R&D <EU>");
    }
}
