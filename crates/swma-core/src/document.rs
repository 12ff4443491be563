//! Span-indexed XML tree for game data files
//!
//! The parser records byte offsets of every element instead of building an
//! owned DOM. Edits splice replacement text into the original source and the
//! tree is rebuilt, so comments, whitespace, attribute quoting and element
//! order outside the edited range stay byte-for-byte identical.

use crate::error::{Error, Result};
use std::ops::Range;

/// An element and the byte spans it occupies in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name as written
    pub name: String,
    /// Attributes in source order
    pub attributes: Vec<(String, String)>,
    /// Offset of the opening `<`
    pub start: usize,
    /// Offset just past the opening tag's `>`
    pub content_start: usize,
    /// Offset of the closing tag's `<` (equal to `end` when self-closing)
    pub content_end: usize,
    /// Offset just past the element
    pub end: usize,
    /// Child elements in source order
    pub children: Vec<Element>,
}

impl Element {
    /// Look up an attribute value by exact name
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The entity name carried in the `Name` attribute
    pub fn entity_name(&self) -> Option<&str> {
        self.attribute("Name")
    }

    /// First direct child whose tag matches `tag` ignoring ASCII case
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(tag))
    }

    pub fn is_self_closing(&self) -> bool {
        self.content_end == self.end
    }

    /// Raw text between the opening and closing tag, trimmed
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source[self.content_start..self.content_end].trim()
    }

    /// Depth-first iterator over this element's descendants
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        while let Some(el) = stack.pop() {
            out.push(el);
            stack.extend(el.children.iter().rev());
        }
        out
    }
}

/// A parsed game XML file
#[derive(Debug, Clone)]
pub struct Document {
    file_id: String,
    source: String,
    root: Element,
}

impl Document {
    /// Parse XML source text
    pub fn parse(file_id: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let file_id = file_id.into();
        let source = source.into();
        let root = Parser::new(&file_id, &source).parse_document()?;
        Ok(Self {
            file_id,
            source,
            root,
        })
    }

    /// Parse raw file bytes (must be UTF-8)
    pub fn from_bytes(file_id: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let file_id = file_id.into();
        let source = std::str::from_utf8(bytes).map_err(|e| Error::Xml {
            file_id: file_id.clone(),
            line: 1,
            message: format!("content is not valid UTF-8: {e}"),
        })?;
        Self::parse(file_id, source)
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_source(self) -> String {
        self.source
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Find the first element below the root whose `Name` attribute equals `name`
    pub fn find_entity(&self, name: &str) -> Option<&Element> {
        self.root
            .descendants()
            .into_iter()
            .find(|el| el.entity_name() == Some(name))
    }

    /// Trimmed text of an element
    pub fn text_of(&self, element: &Element) -> &str {
        element.text(&self.source)
    }

    /// Replace the text of `entity`'s `tag` child, returning the previous text
    pub fn set_child_text(&mut self, entity: &str, tag: &str, value: &str) -> Result<String> {
        let el = self.require_entity(entity)?;
        let child = el.child(tag).ok_or_else(|| Error::AttributeNotFound {
            file_id: self.file_id.clone(),
            entity: entity.to_string(),
            attribute: tag.to_string(),
        })?;
        let old = child.text(&self.source).to_string();
        let escaped = escape_text(value);

        let (range, replacement) = if child.is_self_closing() {
            (
                child.start..child.end,
                format!("<{0}>{1}</{0}>", child.name, escaped),
            )
        } else {
            let content = &self.source[child.content_start..child.content_end];
            let trimmed_start = content.len() - content.trim_start().len();
            let trimmed_len = content.trim().len();
            if trimmed_len == 0 {
                (child.content_start..child.content_end, escaped)
            } else {
                let from = child.content_start + trimmed_start;
                (from..from + trimmed_len, escaped)
            }
        };

        self.splice(vec![(range, replacement)])?;
        Ok(old)
    }

    /// Append a `<tag>value</tag>` child after the last child of `entity`
    pub fn insert_child(&mut self, entity: &str, tag: &str, value: &str) -> Result<()> {
        let el = self.require_entity(entity)?;
        let element = format!("<{0}>{1}</{0}>", tag, escape_text(value));

        let edit = if let Some(last) = el.children.last() {
            let indent = line_indent(&self.source, last.start);
            (last.end..last.end, format!("\n{indent}{element}"))
        } else {
            let outer = line_indent(&self.source, el.start);
            let inner = format!("{outer}\t");
            if el.is_self_closing() {
                let open = self.source[el.start..el.end].trim_end_matches('>');
                let open = open.trim_end_matches('/').trim_end();
                (
                    el.start..el.end,
                    format!("{open}>\n{inner}{element}\n{outer}</{}>", el.name),
                )
            } else {
                let content = &self.source[el.content_start..el.content_end];
                if !content.trim().is_empty() {
                    return Err(Error::Xml {
                        file_id: self.file_id.clone(),
                        line: line_of(&self.source, el.start),
                        message: format!("'{entity}' holds text and cannot take child elements"),
                    });
                }
                (
                    el.content_start..el.content_end,
                    format!("\n{inner}{element}\n{outer}"),
                )
            }
        };

        self.splice(vec![edit])
    }

    /// Remove every direct child of `entity` whose tag satisfies `predicate`
    ///
    /// Returns the removed `(tag, text)` pairs in source order. Removing from a
    /// missing entity is an error; use [`Document::find_entity`] first when
    /// absence is acceptable.
    pub fn remove_children<F>(&mut self, entity: &str, predicate: F) -> Result<Vec<(String, String)>>
    where
        F: Fn(&str) -> bool,
    {
        let el = self.require_entity(entity)?;
        let mut removed = Vec::new();
        let mut edits = Vec::new();
        for child in el.children.iter().filter(|c| predicate(&c.name)) {
            removed.push((child.name.clone(), child.text(&self.source).to_string()));
            let from = leading_whitespace_start(&self.source, el.content_start, child.start);
            edits.push((from..child.end, String::new()));
        }
        if !edits.is_empty() {
            self.splice(edits)?;
        }
        Ok(removed)
    }

    fn require_entity(&self, entity: &str) -> Result<&Element> {
        self.find_entity(entity).ok_or_else(|| Error::UnitNotFound {
            unit: entity.to_string(),
            file_id: self.file_id.clone(),
        })
    }

    /// Apply non-overlapping edits and rebuild the tree
    fn splice(&mut self, mut edits: Vec<(Range<usize>, String)>) -> Result<()> {
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        let mut source = self.source.clone();
        for (range, replacement) in edits {
            source.replace_range(range, &replacement);
        }
        self.root = Parser::new(&self.file_id, &source).parse_document()?;
        self.source = source;
        Ok(())
    }
}

/// Escape text content for XML
pub fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Whitespace between the start of the line and `pos`, if only whitespace precedes it
fn line_indent(source: &str, pos: usize) -> String {
    let line_start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..pos];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix.to_string()
    } else {
        String::new()
    }
}

/// Walk back from `pos` over whitespace, stopping at `floor`
fn leading_whitespace_start(source: &str, floor: usize, pos: usize) -> usize {
    let bytes = source.as_bytes();
    let mut i = pos;
    while i > floor && bytes[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    i
}

fn line_of(source: &str, pos: usize) -> usize {
    source[..pos.min(source.len())].matches('\n').count() + 1
}

struct Parser<'a> {
    file_id: &'a str,
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(file_id: &'a str, src: &'a str) -> Self {
        Self {
            file_id,
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Xml {
            file_id: self.file_id.to_string(),
            line: line_of(self.src, self.pos),
            message: message.into(),
        }
    }

    fn parse_document(mut self) -> Result<Element> {
        if self.src.starts_with('\u{feff}') {
            self.pos = '\u{feff}'.len_utf8();
        }
        self.skip_misc()?;
        if self.pos >= self.bytes.len() {
            return Err(self.error("document has no root element"));
        }
        let root = self.parse_element()?;
        self.skip_misc()?;
        if self.pos < self.bytes.len() {
            return Err(self.error("unexpected content after root element"));
        }
        Ok(root)
    }

    /// Skip whitespace, comments, processing instructions and doctype
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace();
            let rest = &self.src[self.pos..];
            if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<!") {
                self.skip_past(">")?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn skip_past(&mut self, terminator: &str) -> Result<()> {
        match self.src[self.pos..].find(terminator) {
            Some(i) => {
                self.pos += i + terminator.len();
                Ok(())
            }
            None => Err(self.error(format!("unterminated construct, expected '{terminator}'"))),
        }
    }

    fn read_name(&mut self) -> Result<String> {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b.is_ascii_whitespace() || b == b'/' || b == b'>' || b == b'=' {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a name"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.bytes.get(self.pos) == Some(&byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn parse_element(&mut self) -> Result<Element> {
        let start = self.pos;
        self.expect(b'<')?;
        let name = self.read_name()?;

        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.bytes.get(self.pos) {
                Some(b'/') => {
                    self.pos += 1;
                    self.expect(b'>')?;
                    return Ok(Element {
                        name,
                        attributes,
                        start,
                        content_start: self.pos,
                        content_end: self.pos,
                        end: self.pos,
                        children: Vec::new(),
                    });
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let key = self.read_name()?;
                    self.skip_whitespace();
                    self.expect(b'=')?;
                    self.skip_whitespace();
                    let quote = match self.bytes.get(self.pos) {
                        Some(&q @ (b'"' | b'\'')) => q,
                        _ => return Err(self.error("expected quoted attribute value")),
                    };
                    self.pos += 1;
                    let value_start = self.pos;
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != quote {
                        self.pos += 1;
                    }
                    if self.pos >= self.bytes.len() {
                        return Err(self.error("unterminated attribute value"));
                    }
                    let value = self.src[value_start..self.pos].to_string();
                    self.pos += 1;
                    attributes.push((key, value));
                }
                None => return Err(self.error(format!("unterminated tag <{name}>"))),
            }
        }

        let content_start = self.pos;
        let mut children = Vec::new();
        loop {
            let Some(offset) = self.src[self.pos..].find('<') else {
                return Err(self.error(format!("missing closing tag for <{name}>")));
            };
            self.pos += offset;
            let rest = &self.src[self.pos..];
            if rest.starts_with("</") {
                let content_end = self.pos;
                self.pos += 2;
                let closing = self.read_name()?;
                if closing != name {
                    return Err(self.error(format!(
                        "mismatched closing tag </{closing}>, expected </{name}>"
                    )));
                }
                self.skip_whitespace();
                self.expect(b'>')?;
                return Ok(Element {
                    name,
                    attributes,
                    start,
                    content_start,
                    content_end,
                    end: self.pos,
                    children,
                });
            } else if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<![CDATA[") {
                self.skip_past("]]>")?;
            } else if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else {
                children.push(self.parse_element()?);
            }
        }
    }
}
