//! Streaming access to the record entries of an HMDB XML export.
//!
//! Both HMDB exports are a single root element holding a long flat list of
//! records (`<metabolite>` or `<protein>`) in the `http://www.hmdb.ca`
//! namespace. [`RecordReader`] walks that list with `quick-xml` and
//! materializes one record subtree at a time as an [`Element`], so a full
//! export never has to be held in memory.

use std::io::BufRead;

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};

use crate::error::HmdbError;

pub const HMDB_NAMESPACE: &str = "http://www.hmdb.ca";

/// A parsed element: local name, direct text content and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct text content; `None` when the element has no non-blank text.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|value| !value.is_empty())
    }

    pub fn elements(&self) -> &[Element] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Element::text)
    }

    /// Text of an optional descriptive child, `""` when absent or empty.
    pub fn child_text_or_empty(&self, name: &str) -> &str {
        self.child_text(name).unwrap_or_default()
    }

    pub fn require_child(&self, record: &str, name: &'static str) -> Result<&Element, HmdbError> {
        self.child(name).ok_or_else(|| HmdbError::MissingElement {
            record: record.to_string(),
            element: name,
        })
    }

    pub fn require_text(&self, record: &str, name: &'static str) -> Result<&str, HmdbError> {
        self.require_child(record, name)?
            .text()
            .ok_or_else(|| HmdbError::EmptyElement {
                record: record.to_string(),
                element: name,
            })
    }

    fn push_text(&mut self, value: &str) {
        match self.text.as_mut() {
            Some(text) => text.push_str(value),
            None => self.text = Some(value.to_string()),
        }
    }
}

/// Yields every `<{record}>` element that is a direct child of the document
/// root and lives in the HMDB namespace. Other top-level elements are skipped.
pub struct RecordReader<R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    record: &'static str,
    depth: usize,
    seen_root: bool,
    finished: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(source: R, record: &'static str) -> Self {
        let mut reader = NsReader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            record,
            depth: 0,
            seen_root: false,
            finished: false,
        }
    }

    pub fn record_name(&self) -> &'static str {
        self.record
    }

    fn next_record(&mut self) -> Result<Option<Element>, HmdbError> {
        loop {
            self.buf.clear();
            let (resolved, event) = self
                .reader
                .read_resolved_event_into(&mut self.buf)
                .map_err(xml_error)?;
            let found = match event {
                Event::Start(start) => {
                    self.depth += 1;
                    self.seen_root = true;
                    (self.depth == 2 && is_record(&resolved, &start, self.record))
                        .then(|| (local_name(&start), false))
                }
                Event::Empty(start) => {
                    self.seen_root = true;
                    (self.depth == 1 && is_record(&resolved, &start, self.record))
                        .then(|| (local_name(&start), true))
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    None
                }
                Event::Eof => {
                    if !self.seen_root {
                        return Err(HmdbError::Xml("document has no root element".to_string()));
                    }
                    if self.depth > 0 {
                        return Err(HmdbError::Xml(
                            "unexpected end of document".to_string(),
                        ));
                    }
                    return Ok(None);
                }
                _ => None,
            };

            match found {
                Some((name, true)) => return Ok(Some(Element::new(name))),
                Some((name, false)) => {
                    let element = self.read_subtree(name)?;
                    self.depth -= 1;
                    return Ok(Some(element));
                }
                None => {}
            }
        }
    }

    fn read_subtree(&mut self, name: String) -> Result<Element, HmdbError> {
        let mut stack = vec![Element::new(name)];
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf).map_err(xml_error)? {
                Event::Start(start) => stack.push(Element::new(local_name(&start))),
                Event::Empty(start) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Element::new(local_name(&start)));
                    }
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(xml_error)?;
                    if let Some(current) = stack.last_mut() {
                        current.push_text(&value);
                    }
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data);
                    if let Some(current) = stack.last_mut() {
                        current.push_text(&value);
                    }
                }
                Event::End(_) => {
                    let Some(finished) = stack.pop() else {
                        return Err(HmdbError::Xml("unbalanced end tag".to_string()));
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(finished),
                        None => return Ok(finished),
                    }
                }
                Event::Eof => {
                    let open = stack.first().map(|el| el.name.clone()).unwrap_or_default();
                    return Err(HmdbError::Xml(format!(
                        "unexpected end of document inside <{open}>"
                    )));
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Element, HmdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_record() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

fn is_record(resolved: &ResolveResult<'_>, start: &BytesStart<'_>, record: &str) -> bool {
    let in_namespace = matches!(
        resolved,
        ResolveResult::Bound(Namespace(ns)) if *ns == HMDB_NAMESPACE.as_bytes()
    );
    in_namespace && start.local_name().as_ref() == record.as_bytes()
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn xml_error(err: impl std::fmt::Display) -> HmdbError {
    HmdbError::Xml(err.to_string())
}
