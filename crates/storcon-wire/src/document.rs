//! Generic structured-document tree.
//!
//! Everything the agent protocol moves — variables, property sets, request
//! envelopes, the handshake hello — is an XML element tree: a tag name, an
//! ordered list of string attributes, and an ordered list of element or text
//! children. This module owns that tree and its conversion to and from raw
//! bytes via `quick-xml`.
//!
//! Parsing is strict about completeness: a buffer whose root element has not
//! been closed yet fails with [`WireError::Truncated`]. The transport's
//! receive loop feeds growing buffers through [`Element::parse`] until it
//! stops failing, so "incomplete" must be an error, never a silent success.
//! Parsing stops consuming input at the close of the root element; bytes
//! after that point are ignored.

use std::fmt::Write as _;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{Result, WireError};

/// A child of an [`Element`]: either a nested element or a run of text.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    /// The nested element, if this node is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }
}

/// One element of a structured document: tag name, ordered attributes,
/// ordered children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any existing value under the same name.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
        self
    }

    /// Builder-style [`set_attr`](Self::set_attr).
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Attributes in document order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn append(&mut self, child: Element) -> &mut Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder-style [`append`](Self::append).
    pub fn with_child(mut self, child: Element) -> Self {
        self.append(child);
        self
    }

    pub fn append_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Element children in document order, skipping text nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// The first element child, if any.
    pub fn first_element(&self) -> Option<&Element> {
        self.child_elements().next()
    }

    /// The first element child with the given tag name, if any.
    pub fn find_child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.name == name)
    }

    /// Parse one complete document from `bytes` and return its root element.
    ///
    /// Fails with [`WireError::Truncated`] if the buffer ends before the root
    /// element is closed (including an empty buffer, or one holding only an
    /// XML declaration). Bytes after the root element's close are not
    /// consumed and not inspected.
    pub fn parse(bytes: &[u8]) -> Result<Element> {
        let mut reader = Reader::from_reader(bytes);
        let mut stack: Vec<Element> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    stack.push(element_from_tag(&start)?);
                }
                Event::Empty(start) => {
                    let elem = element_from_tag(&start)?;
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.append(elem);
                        }
                        None => return Ok(elem),
                    }
                }
                Event::End(_) => {
                    // quick-xml has already verified the end tag matches
                    let elem = match stack.pop() {
                        Some(e) => e,
                        None => return Err(WireError::ContentOutsideRoot),
                    };
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.append(elem);
                        }
                        None => return Ok(elem),
                    }
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.append_text(text.into_owned());
                        }
                        None if text.trim().is_empty() => {}
                        None => return Err(WireError::ContentOutsideRoot),
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.append_text(text);
                        }
                        None => return Err(WireError::ContentOutsideRoot),
                    }
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => return Err(WireError::Truncated),
            }
        }
    }

    /// Serialize this element (and its subtree) as an XML fragment.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    /// Serialize as a standalone document, with the XML declaration the
    /// remote side's parser expects to see at the head of a message.
    pub fn to_document_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\"?>");
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", k, escape(v));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_into(out),
                Node::Text(t) => out.push_str(&escape(t)),
            }
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

fn element_from_tag(start: &quick_xml::events::BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut elem = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        elem.set_attr(key, value);
    }
    Ok(elem)
}
