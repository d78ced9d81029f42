//! Small owned element tree built from `quick-xml` events.
//!
//! Issuer feeds are small enough to hold in memory, and every parser needs
//! random access (lookup tables first, targets second), so the document is
//! materialized once and queried with ElementTree-style paths:
//! `a/b/c` walks child elements in document order, and a segment written as
//! `{uri}name` must also match the element's resolved namespace.

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::error::{EtlError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    namespace: Option<String>,
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

/// Parses a whole document and returns its root element.
pub fn parse_document(bytes: &[u8]) -> Result<Element> {
    let mut reader = NsReader::from_reader(bytes);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let (ns, event) = reader.read_resolved_event_into(&mut buf)?;
        let namespace = resolved_namespace(ns);
        // Follows the encoding named in the XML declaration, UTF-8 otherwise.
        let decoder = reader.decoder();
        match event {
            Event::Start(start) => {
                stack.push(Element::from_start(namespace, &start, decoder)?);
            }
            Event::Empty(start) => {
                let element = Element::from_start(namespace, &start, decoder)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    EtlError::MalformedDocument("closing tag without a matching open tag".to_string())
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(open) = leading_text_target(&mut stack) {
                    open.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(open) = leading_text_target(&mut stack) {
                    open.text.push_str(&decoder.decode(&data)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(EtlError::MalformedDocument(format!(
            "unexpected end of document inside <{}>",
            open.name
        )));
    }
    root.ok_or_else(|| EtlError::MalformedDocument("document has no root element".to_string()))
}

fn resolved_namespace(ns: ResolveResult<'_>) -> Option<String> {
    match ns {
        ResolveResult::Bound(uri) => Some(String::from_utf8_lossy(uri.0).into_owned()),
        _ => None,
    }
}

// Text after the first child element (mixed-content tails) is dropped.
fn leading_text_target(stack: &mut [Element]) -> Option<&mut Element> {
    stack.last_mut().filter(|open| open.children.is_empty())
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(EtlError::MalformedDocument(format!(
                "second root element <{}>",
                element.name
            )))
        }
    }
    Ok(())
}

struct Segment<'a> {
    namespace: Option<&'a str>,
    local: &'a str,
}

impl<'a> Segment<'a> {
    fn parse(raw: &'a str) -> Self {
        if let Some(rest) = raw.strip_prefix('{') {
            if let Some((uri, local)) = rest.split_once('}') {
                return Segment {
                    namespace: Some(uri),
                    local,
                };
            }
        }
        Segment {
            namespace: None,
            local: raw,
        }
    }

    fn matches(&self, element: &Element) -> bool {
        if element.name != self.local {
            return false;
        }
        match self.namespace {
            Some(uri) => element.namespace.as_deref() == Some(uri),
            None => true,
        }
    }
}

// Splits on '/' outside of `{...}` so namespace URIs survive.
fn split_path(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in path.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                parts.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&path[start..]);
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

impl Element {
    fn from_start(namespace: Option<String>, start: &BytesStart<'_>, decoder: Decoder) -> Result<Self> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = decoder.decode(attr.key.local_name().as_ref())?.into_owned();
            let value = attr.decode_and_unescape_value(decoder)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            namespace,
            name: decoder.decode(start.local_name().as_ref())?.into_owned(),
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Text before the first child element, trimmed; `None` when blank.
    pub fn text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn children_named<'a>(&'a self, segment: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        let segment = Segment::parse(segment);
        self.children.iter().filter(move |c| segment.matches(c))
    }

    pub fn child(&self, segment: &str) -> Option<&Element> {
        let segment = Segment::parse(segment);
        self.children.iter().find(|c| segment.matches(c))
    }

    /// Every element reached by `path`, in document order.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut current: Vec<&Element> = vec![self];
        for raw in split_path(path) {
            let segment = Segment::parse(raw);
            current = current
                .into_iter()
                .flat_map(|e| e.children.iter())
                .filter(|c| segment.matches(c))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    /// Trimmed text of the first element at `path`.
    pub fn find_text(&self, path: &str) -> Option<&str> {
        self.find(path).and_then(Element::text)
    }

    /// All descendants (not including `self`) matching `segment`, pre-order.
    pub fn descendants(&self, segment: &str) -> Vec<&Element> {
        let segment = Segment::parse(segment);
        let mut out = Vec::new();
        let mut pending: Vec<&Element> = self.children.iter().rev().collect();
        while let Some(element) = pending.pop() {
            if segment.matches(element) {
                out.push(element);
            }
            pending.extend(element.children.iter().rev());
        }
        out
    }
}
