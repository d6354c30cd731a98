//! Markup parsing and serialization with quick-xml.
//!
//! Declarations, comments, processing instructions and doctypes are dropped;
//! everything else (elements, attributes, text, CDATA) round-trips.

use std::borrow::Cow;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::node::Element;
use crate::error::{EtiquetteError, Result};

fn parse_error(reader: &Reader<&[u8]>, e: impl std::fmt::Display) -> EtiquetteError {
    EtiquetteError::Template(format!(
        "malformed markup at byte {}: {}",
        reader.buffer_position(),
        e
    ))
}

fn element_from_start(reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(|err| parse_error(reader, err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| parse_error(reader, err))?
            .into_owned();
        element.set_attr(&key, value);
    }
    Ok(element)
}

/// Append character data to whichever slot it belongs to: the open element's
/// own text if it has no children yet, otherwise the last child's tail.
fn push_text(stack: &mut [Element], text: Cow<'_, str>) {
    let Some(current) = stack.last_mut() else {
        // Whitespace outside the root element
        return;
    };
    let slot = match current.children.last_mut() {
        Some(last) => &mut last.tail,
        None => &mut current.text,
    };
    match slot {
        Some(existing) => existing.push_str(&text),
        None => *slot = Some(text.into_owned()),
    }
}

/// Attach a finished element to its parent, or return it when it is the root.
fn close(stack: &mut Vec<Element>, element: Element) -> Option<Element> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            None
        }
        None => Some(element),
    }
}

/// Parse markup into its root element.
pub fn parse(markup: &str) -> Result<Element> {
    let mut reader = Reader::from_str(markup);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| parse_error(&reader, e))?;
        match event {
            Event::Start(e) => {
                if root.is_some() {
                    return Err(parse_error(&reader, "content after the root element"));
                }
                let element = element_from_start(&reader, &e)?;
                stack.push(element);
            }
            Event::Empty(e) => {
                if root.is_some() {
                    return Err(parse_error(&reader, "content after the root element"));
                }
                let element = element_from_start(&reader, &e)?;
                root = close(&mut stack, element).or(root);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| parse_error(&reader, "unexpected end tag"))?;
                root = close(&mut stack, element).or(root);
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|err| parse_error(&reader, err))?;
                push_text(&mut stack, text);
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                push_text(&mut stack, String::from_utf8_lossy(&raw));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(EtiquetteError::Template(format!(
            "unclosed element <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| EtiquetteError::Template("markup has no root element".to_string()))
}

fn write_err(e: impl std::fmt::Display) -> EtiquetteError {
    EtiquetteError::Template(format!("failed to serialize markup: {}", e))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    if let Some(id) = &element.id {
        start.push_attribute(("id", id.as_str()));
    }
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.text.is_none() && element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(write_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(write_err)?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_err)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
        if let Some(tail) = &child.tail {
            writer
                .write_event(Event::Text(BytesText::new(tail)))
                .map_err(write_err)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_err)?;
    Ok(())
}

/// Serialize an element tree back to markup text.
pub fn serialize(root: &Element) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, root)?;
    String::from_utf8(writer.into_inner()).map_err(write_err)
}
