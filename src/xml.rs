//! XML Tree Module
//!
//! Builds a minimal owned element tree from a report document and resolves
//! slash-separated relative paths within it (`"row/policy_evaluated/disposition"`).
//! Absence of a path is a normal, common case given divergent provider schemas
//! and is never an error.
//!
//! The builder enforces a nesting depth limit and rejects DOCTYPE blocks that
//! declare two or more entity definitions, to protect against attacks such as
//! the Billion Laughs attack. Custom entities are never expanded.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Maximum element nesting accepted before a document is rejected.
const MAX_DEPTH: usize = 20;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error("element nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("doctype declares multiple entity definitions")]
    ForbiddenEntities,

    #[error("unexpected end of document")]
    Truncated,

    #[error("document has no root element")]
    NoRoot,
}

/// One element of a parsed document: its name, accumulated text content, and
/// child elements in document order. Attributes are not retained; DMARC
/// aggregate reports carry all data as element text.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// An element with no text and no children. Lookups inside it always
    /// yield absence, which is how missing subtrees degrade gracefully.
    pub const EMPTY: &'static Element = &Element {
        name: String::new(),
        text: String::new(),
        children: Vec::new(),
    };

    fn new(name: String) -> Self {
        Element {
            name,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a slash-separated relative path to the first matching
    /// descendant, or `None` if any segment is missing.
    pub fn find(&self, path: &str) -> Option<&Element> {
        let mut current = self;
        for segment in path.split('/') {
            current = current.children.iter().find(|c| c.name == segment)?;
        }
        Some(current)
    }

    /// Trimmed text content of the element at `path`. Returns `None` when
    /// the path is missing or its text is empty after trimming.
    pub fn find_text(&self, path: &str) -> Option<&str> {
        let text = self.find(path)?.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Direct children named `name`, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Parses a whole document into its root element.
pub fn parse(input: &[u8]) -> Result<Element, XmlError> {
    let input = strip_bom(input);
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::TooDeep);
                }
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(Element::new(name));
            }
            Event::Empty(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                let element = Element::new(name);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    // A self-closing root is a complete (if useless) document.
                    None => return Ok(element),
                }
            }
            Event::Text(text) => {
                let unescaped = text.unescape().map_err(quick_xml::Error::from)?;
                if let Some(element) = stack.last_mut() {
                    element.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(element) = stack.last_mut() {
                    element
                        .text
                        .push_str(&String::from_utf8_lossy(data.into_inner().as_ref()));
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or(XmlError::Truncated)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::DocType(doctype) => {
                if count_entity_declarations(doctype.as_ref()) >= 2 {
                    return Err(XmlError::ForbiddenEntities);
                }
            }
            Event::Eof => {
                return Err(if stack.is_empty() {
                    XmlError::NoRoot
                } else {
                    XmlError::Truncated
                });
            }
            // Declarations, comments, processing instructions and entity
            // references carry nothing a DMARC report stores data in.
            _ => {}
        }
    }
}

fn strip_bom(input: &[u8]) -> &[u8] {
    input.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(input)
}

fn count_entity_declarations(doctype: &[u8]) -> usize {
    const NEEDLE: &[u8] = b"<!ENTITY";
    if doctype.len() < NEEDLE.len() {
        return 0;
    }
    doctype.windows(NEEDLE.len()).filter(|w| *w == NEEDLE).count()
}
