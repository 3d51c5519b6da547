//! Small pull-parser layer over quick-xml shared by the part parsers.
//!
//! Every parse function is entered just after an element's start tag and
//! consumes events up to and including its end tag, so parsers nest the same
//! way the XML does.

use deckscan_core::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// What the cursor found next.
pub(crate) enum Node<'a> {
    /// Start tag of an element with content.
    Open(BytesStart<'a>),
    /// Self-closing element.
    Leaf(BytesStart<'a>),
    Text(String),
    /// End tag of the element currently being parsed.
    Close,
    Eof,
}

/// Event reader over one package part.
pub(crate) struct XmlCursor<'a> {
    reader: Reader<&'a [u8]>,
    part: &'a str,
}

impl<'a> XmlCursor<'a> {
    pub(crate) fn new(xml: &'a str, part: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        // Whitespace inside a:t is significant.
        reader.trim_text(false);
        Self { reader, part }
    }

    pub(crate) fn part(&self) -> &str {
        self.part
    }

    /// Next structural node. Comments, declarations and processing
    /// instructions are skipped.
    pub(crate) fn step(&mut self) -> Result<Node<'a>> {
        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| self.error(format_args!("{}", e)))?;
            return Ok(match event {
                Event::Start(e) => Node::Open(e),
                Event::Empty(e) => Node::Leaf(e),
                Event::End(_) => Node::Close,
                Event::Text(t) => Node::Text(
                    t.unescape()
                        .map_err(|e| self.error(format_args!("{}", e)))?
                        .into_owned(),
                ),
                Event::CData(t) => Node::Text(String::from_utf8_lossy(&t.into_inner()).into_owned()),
                Event::Eof => Node::Eof,
                _ => continue,
            });
        }
    }

    /// Consume the rest of an element opened by `start`.
    pub(crate) fn skip(&mut self, start: &BytesStart<'_>) -> Result<()> {
        self.reader
            .read_to_end(start.name())
            .map(|_| ())
            .map_err(|e| self.error(format_args!("{}", e)))
    }

    /// Concatenated text content of the element opened by `start`.
    pub(crate) fn text_of(&mut self, start: &BytesStart<'_>) -> Result<String> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            match self.step()? {
                Node::Open(_) => depth += 1,
                Node::Text(t) => text.push_str(&t),
                Node::Close if depth == 0 => return Ok(text),
                Node::Close => depth -= 1,
                Node::Leaf(_) => {}
                Node::Eof => return Err(self.unexpected_eof(start)),
            }
        }
    }

    /// Error for a part that ends inside `start`.
    pub(crate) fn unexpected_eof(&self, start: &BytesStart<'_>) -> Error {
        self.error(format_args!(
            "unexpected end of document inside <{}>",
            String::from_utf8_lossy(start.name().as_ref())
        ))
    }

    fn error(&self, detail: std::fmt::Arguments<'_>) -> Error {
        Error::XmlError(format!(
            "{} at byte {}: {}",
            self.part,
            self.reader.buffer_position(),
            detail
        ))
    }
}

/// Extract the local name from a potentially namespaced XML element name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Local name of an element.
pub(crate) fn tag<'e>(e: &'e BytesStart<'_>) -> &'e [u8] {
    local_name(e.name().into_inner())
}

/// Value of the unprefixed attribute `key`.
pub(crate) fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Value of a namespaced attribute such as `r:id` or `r:embed`, whatever
/// prefix the document binds.
pub(crate) fn ns_attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

pub(crate) fn attr_parse<T: std::str::FromStr>(e: &BytesStart<'_>, key: &[u8]) -> Option<T> {
    attr(e, key).and_then(|v| v.trim().parse().ok())
}

/// `val` attribute of a `<c:idx val="..."/>` style element.
pub(crate) fn val<T: std::str::FromStr>(e: &BytesStart<'_>) -> Option<T> {
    attr_parse(e, b"val")
}

/// OOXML booleans: absent `val` means true.
pub(crate) fn val_bool(e: &BytesStart<'_>) -> bool {
    !matches!(attr(e, b"val").as_deref(), Some("0") | Some("false"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_start(xml: &str) -> (XmlCursor<'_>, BytesStart<'_>) {
        let mut cursor = XmlCursor::new(xml, "test.xml");
        loop {
            match cursor.step().unwrap() {
                Node::Open(e) | Node::Leaf(e) => return (cursor, e),
                Node::Eof => panic!("no element"),
                _ => {}
            }
        }
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }

    #[test]
    fn test_attributes() {
        let (_, e) = first_start(
            r#"<p:sldId id="256" r:id="rId2" name="A &amp; B" flag="0"/>"#,
        );
        assert_eq!(tag(&e), b"sldId");
        assert_eq!(attr(&e, b"id").as_deref(), Some("256"));
        assert_eq!(ns_attr(&e, b"id").as_deref(), Some("rId2"));
        assert_eq!(attr(&e, b"name").as_deref(), Some("A & B"));
        assert_eq!(attr_parse::<u32>(&e, b"id"), Some(256));
        assert_eq!(attr(&e, b"missing"), None);
    }

    #[test]
    fn test_val_bool() {
        let (_, on) = first_start(r#"<c:delete/>"#);
        let (_, off) = first_start(r#"<c:delete val="0"/>"#);
        let (_, yes) = first_start(r#"<c:delete val="1"/>"#);
        assert!(val_bool(&on));
        assert!(!val_bool(&off));
        assert!(val_bool(&yes));
    }

    #[test]
    fn test_text_of_keeps_whitespace_and_entities() {
        let (mut cursor, e) = first_start(r#"<a:t> Q3 &amp; <b>Q4</b> </a:t><next/>"#);
        assert_eq!(cursor.text_of(&e).unwrap(), " Q3 & Q4 ");
        assert!(matches!(cursor.step().unwrap(), Node::Leaf(_)));
    }

    #[test]
    fn test_skip_consumes_element() {
        let (mut cursor, e) = first_start(r#"<a><b><c/></b></a><d/>"#);
        cursor.skip(&e).unwrap();
        match cursor.step().unwrap() {
            Node::Leaf(d) => assert_eq!(tag(&d), b"d"),
            _ => panic!("expected <d/>"),
        }
    }

    #[test]
    fn test_truncated_document_is_error() {
        let (mut cursor, e) = first_start(r#"<a:t>unterminated"#);
        assert!(cursor.text_of(&e).is_err());
    }
}
