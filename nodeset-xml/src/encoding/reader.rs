use std::{
    io::{BufReader, Read},
    num::ParseIntError,
    str::FromStr,
};

use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

#[derive(Debug, Error)]
/// Error produced when reading XML.
pub enum XmlReadError {
    #[error("{0}")]
    /// Failed to parse XML.
    Xml(#[from] quick_xml::Error),
    #[error("Unexpected EOF")]
    /// Unexpected EOF.
    UnexpectedEof,
    #[error("Failed to parse integer: {0}")]
    /// Failed to parse value as integer.
    ParseInt(#[from] ParseIntError),
    #[error("Failed to parse value: {0}")]
    /// Some other parse error.
    Parse(String),
}

impl From<quick_xml::events::attributes::AttrError> for XmlReadError {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(value.into())
    }
}

/// A start tag with its local name and decoded attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementStart {
    /// Element name with any namespace prefix removed.
    pub name: String,
    /// Attributes in document order, keyed by local name.
    pub attributes: Vec<(String, String)>,
}

impl ElementStart {
    fn decode(start: &BytesStart<'_>) -> Result<Self, XmlReadError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self { name, attributes })
    }

    /// Get the value of the attribute with the given local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Structural event, with text, comments and processing instructions filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementEvent {
    /// Opening tag. The element must be consumed up to its matching end.
    Start(ElementStart),
    /// Self-closing tag.
    Empty(ElementStart),
    /// Closing tag of the current element.
    End,
    /// End of input.
    Eof,
}

/// XML stream reader specialized for working with NodeSet XML.
pub struct XmlStreamReader<T> {
    reader: quick_xml::Reader<BufReader<T>>,
    buffer: Vec<u8>,
}

impl<T: Read> XmlStreamReader<T> {
    /// Create a new stream reader with an internal buffer.
    pub fn new(reader: T) -> Self {
        Self {
            reader: quick_xml::Reader::from_reader(BufReader::new(reader)),
            buffer: Vec::new(),
        }
    }

    /// Get the next event from the stream.
    pub fn next_event(&mut self) -> Result<quick_xml::events::Event, XmlReadError> {
        self.buffer.clear();
        Ok(self.reader.read_event_into(&mut self.buffer)?)
    }

    /// Get the next structural event, decoding the tag if it is an element.
    pub fn next_element(&mut self) -> Result<ElementEvent, XmlReadError> {
        loop {
            match self.next_event()? {
                Event::Start(s) => return Ok(ElementEvent::Start(ElementStart::decode(&s)?)),
                Event::Empty(s) => return Ok(ElementEvent::Empty(ElementStart::decode(&s)?)),
                Event::End(_) => return Ok(ElementEvent::End),
                Event::Eof => return Ok(ElementEvent::Eof),
                _ => continue,
            }
        }
    }

    /// Current byte offset in the input.
    pub fn position(&self) -> u64 {
        self.reader.buffer_position()
    }

    /// Skip the current value. This should be called after encountering a
    /// `Start` event, and will skip until the corresponding `End` event is consumed.
    ///
    /// Note that this does not check that the document is coherent, just that
    /// an equal number of start and end events are consumed.
    pub fn skip_value(&mut self) -> Result<(), XmlReadError> {
        let mut depth = 1u32;
        loop {
            match self.next_event()? {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Event::Eof => return Err(XmlReadError::UnexpectedEof),
                _ => {}
            }
        }
    }

    /// Consume the current element, skipping any child elements and returning the combined text
    /// content with leading and trailing whitespace removed.
    pub fn consume_as_text(&mut self) -> Result<String, XmlReadError> {
        let mut text: Option<String> = None;
        let mut depth = 1u32;
        loop {
            match self.next_event()? {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        let Some(mut text) = text else {
                            return Ok(String::new());
                        };
                        let trimmed = text.trim_end().len();
                        text.truncate(trimmed);
                        return Ok(text);
                    }
                }
                Event::Text(mut e) => {
                    if depth != 1 {
                        continue;
                    }
                    if let Some(text) = text.as_mut() {
                        text.push_str(&e.unescape()?);
                    } else if e.inplace_trim_start() {
                        continue;
                    } else {
                        text = Some(e.unescape()?.into_owned());
                    }
                }
                Event::CData(e) => {
                    if depth == 1 {
                        let data = String::from_utf8_lossy(&e).into_owned();
                        text.get_or_insert_with(String::new).push_str(&data);
                    }
                }
                Event::Eof => return Err(XmlReadError::UnexpectedEof),
                _ => continue,
            }
        }
    }

    /// Consume the current element as a text value and parse it as the given type.
    pub fn consume_content<R: FromStr>(&mut self) -> Result<R, XmlReadError>
    where
        XmlReadError: From<<R as FromStr>::Err>,
    {
        let text = self.consume_as_text()?;
        Ok(text.parse()?)
    }
}
