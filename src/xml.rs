//! Owned element tree built from a document with `quick-xml`
//!
//! The parsers walk documents by recursive descent, so the event stream is
//! folded into a small tree first. Names are stored without their namespace
//! prefix; attribute keys keep theirs (`xsi:type` stays `xsi:type`).

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

/// Errors raised while reading a document
#[derive(Error, Debug)]
pub enum XmlError {
    /// The document is not well formed
    #[error("XML parsing error at position {position}: {message}")]
    Malformed { position: u64, message: String },

    /// The document has no root element
    #[error("XML document has no root element")]
    Empty,

    /// An element was opened but never closed
    #[error("XML element '{0}' is not closed")]
    Unclosed(String),
}

/// One element of a parsed document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Local name (prefix stripped)
    pub name: String,
    /// Attributes in document order, values unescaped
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    /// Concatenated text content
    pub text: String,
}

impl XmlElement {
    /// Attribute value by key, `None` when absent
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Owned attribute value, the shape every record field uses
    pub fn attr_owned(&self, key: &str) -> Option<String> {
        self.attr(key).map(str::to_string)
    }

    /// Direct children with the given local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First direct child with the given local name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Parse document text into its root element
pub fn parse_document(content: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| XmlError::Malformed {
            position: reader.error_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(ref e) => {
                let element = open_element(e, reader.buffer_position() as u64)?;
                stack.push(element);
            }
            Event::Empty(ref e) => {
                let element = open_element(e, reader.buffer_position() as u64)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                // quick-xml checks that end names match their start tags
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(ref t) => {
                if let Some(current) = stack.last_mut() {
                    let text = t.unescape().map_err(|e| XmlError::Malformed {
                        position: reader.buffer_position() as u64,
                        message: e.to_string(),
                    })?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(ref c) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }

    root.ok_or(XmlError::Empty)
}

fn open_element(start: &BytesStart<'_>, position: u64) -> Result<XmlElement, XmlError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Malformed {
            position,
            message: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Malformed {
                position,
                message: e.to_string(),
            })?
            .to_string();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            // Only the first top-level element counts as the root
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}
