//! A small, strict reader for the markup fragments models reply with.
//!
//! Replies are fragments rather than documents: any mix of free text and
//! elements at the top level. The reader accepts well-formed XML content
//! (elements, attributes, the five predefined entities, character
//! references, comments, CDATA sections and processing instructions) nested
//! at most [`MAX_DEPTH`] elements deep, and rejects everything else with a
//! [`MarkupError`]. Tolerance lives in the callers: [`crate::parser`] turns
//! a rejected reply into a single text segment.

use std::fmt::Write as _;

use thiserror::Error;

/// Deepest element nesting the reader accepts
pub const MAX_DEPTH: usize = 128;

/// A node in a parsed fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A markup element with its attributes and child nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    pub fn has_element_children(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Concatenation of the element's direct text children
    pub fn direct_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Trimmed text of a leaf element.
    ///
    /// An element that contains other elements has no scalar value and
    /// yields an empty string; its structure is not flattened.
    pub fn leaf_text(&self) -> String {
        if self.has_element_children() {
            String::new()
        } else {
            self.direct_text().trim().to_string()
        }
    }

    /// Serialize the element (without anything that follows it) back to markup
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", key, escape(value, true));
        }
        if self.children.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(&escape(t, false)),
                Node::Element(el) => el.write_markup(out),
            }
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

/// Why a fragment was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("unexpected end of input inside <{0}>")]
    UnclosedElement(String),

    #[error("mismatched closing tag at byte {at}: expected </{expected}>, found </{found}>")]
    MismatchedClose {
        expected: String,
        found: String,
        at: usize,
    },

    #[error("closing tag </{name}> at byte {at} has no matching opening tag")]
    UnexpectedClose { name: String, at: usize },

    #[error("unknown entity &{name}; at byte {at}")]
    UnknownEntity { name: String, at: usize },

    #[error("duplicate attribute '{name}' at byte {at}")]
    DuplicateAttribute { name: String, at: usize },

    #[error("elements nested deeper than {MAX_DEPTH} levels at byte {at}")]
    TooDeep { at: usize },

    #[error("{message} at byte {at}")]
    Syntax { message: &'static str, at: usize },
}

/// Parse a fragment into its top-level nodes.
///
/// Adjacent text (for example text on both sides of a comment) is merged
/// into a single [`Node::Text`].
pub fn parse_fragment(input: &str) -> Result<Vec<Node>, MarkupError> {
    let mut reader = Reader {
        input,
        pos: 0,
        depth: 0,
    };
    reader.content(None)
}

struct Reader<'a> {
    input: &'a str,
    pos: usize,
    /// Elements currently open
    depth: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn syntax(&self, message: &'static str) -> MarkupError {
        MarkupError::Syntax {
            message,
            at: self.pos,
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.pos > start
    }

    fn expect(&mut self, token: &str, message: &'static str) -> Result<(), MarkupError> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(self.syntax(message))
        }
    }

    /// Skip past the next `terminator`, returning what came before it
    fn take_until(&mut self, terminator: &str, message: &'static str) -> Result<&'a str, MarkupError> {
        match self.rest().find(terminator) {
            Some(idx) => {
                let taken = &self.rest()[..idx];
                self.pos += idx + terminator.len();
                Ok(taken)
            }
            None => Err(self.syntax(message)),
        }
    }

    /// Read nodes until the closing tag of `parent` (or end of input at top level)
    fn content(&mut self, parent: Option<&str>) -> Result<Vec<Node>, MarkupError> {
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return match parent {
                    Some(name) => Err(MarkupError::UnclosedElement(name.to_string())),
                    None => Ok(nodes),
                };
            }

            if rest.starts_with("</") {
                let at = self.pos;
                self.pos += 2;
                let name = self.name()?;
                self.skip_whitespace();
                self.expect(">", "expected '>' to end closing tag")?;
                return match parent {
                    Some(expected) if expected == name => Ok(nodes),
                    Some(expected) => Err(MarkupError::MismatchedClose {
                        expected: expected.to_string(),
                        found: name,
                        at,
                    }),
                    None => Err(MarkupError::UnexpectedClose { name, at }),
                };
            } else if rest.starts_with("<!--") {
                self.pos += 4;
                self.take_until("-->", "unterminated comment")?;
            } else if rest.starts_with("<![CDATA[") {
                self.pos += 9;
                let data = self.take_until("]]>", "unterminated CDATA section")?;
                push_text(&mut nodes, data.to_string());
            } else if rest.starts_with("<?") {
                self.pos += 2;
                self.take_until("?>", "unterminated processing instruction")?;
            } else if rest.starts_with("<!") {
                return Err(self.syntax("declarations are not allowed in a fragment"));
            } else if rest.starts_with('<') {
                let element = self.element()?;
                nodes.push(Node::Element(element));
            } else {
                let start = self.pos;
                let len = rest.find('<').unwrap_or(rest.len());
                self.pos += len;
                let text = decode_entities(&self.input[start..self.pos], start)?;
                push_text(&mut nodes, text);
            }
        }
    }

    fn element(&mut self) -> Result<Element, MarkupError> {
        if self.depth >= MAX_DEPTH {
            return Err(MarkupError::TooDeep { at: self.pos });
        }
        self.expect("<", "expected '<'")?;
        let mut element = Element::new(self.name()?);

        loop {
            let had_space = self.skip_whitespace();
            let rest = self.rest();

            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(element);
            }
            if rest.starts_with('>') {
                self.pos += 1;
                self.depth += 1;
                element.children = self.content(Some(&element.name))?;
                self.depth -= 1;
                return Ok(element);
            }
            if rest.is_empty() {
                return Err(MarkupError::UnclosedElement(element.name));
            }
            if !had_space {
                return Err(self.syntax("expected whitespace before attribute"));
            }

            let at = self.pos;
            let key = self.name()?;
            self.skip_whitespace();
            self.expect("=", "expected '=' after attribute name")?;
            self.skip_whitespace();
            let quote = match self.peek() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(self.syntax("attribute value must be quoted")),
            };
            self.pos += 1;
            let value_start = self.pos;
            let raw = match self.rest().find(quote) {
                Some(idx) => &self.rest()[..idx],
                None => return Err(self.syntax("unterminated attribute value")),
            };
            if raw.contains('<') {
                return Err(self.syntax("'<' is not allowed in attribute values"));
            }
            self.pos += raw.len() + 1;
            let value = decode_entities(raw, value_start)?;

            if element.attributes.iter().any(|(k, _)| *k == key) {
                return Err(MarkupError::DuplicateAttribute { name: key, at });
            }
            element.attributes.push((key, value));
        }
    }

    fn name(&mut self) -> Result<String, MarkupError> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if is_name_start(c) => {}
            _ => return Err(self.syntax("expected a tag or attribute name")),
        }
        let end = chars
            .find(|&(_, c)| !is_name_char(c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += end;
        Ok(rest[..end].to_string())
    }
}

fn is_name_start(c: char) -> bool {
    c == '_' || c == ':' || c.is_alphabetic()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c == '-' || c == '.' || c.is_alphanumeric()
}

fn push_text(nodes: &mut Vec<Node>, text: String) {
    if text.is_empty() {
        return;
    }
    match nodes.last_mut() {
        Some(Node::Text(prev)) => prev.push_str(&text),
        _ => nodes.push(Node::Text(text)),
    }
}

/// Decode entity and character references in `raw`, which starts at byte
/// `offset` of the input.
fn decode_entities(raw: &str, offset: usize) -> Result<String, MarkupError> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let at = offset + (raw.len() - rest.len()) + amp;
        let after = &rest[amp + 1..];
        let semi = after.find(';').ok_or(MarkupError::Syntax {
            message: "unterminated entity reference",
            at,
        })?;
        let name = &after[..semi];
        out.push(resolve_entity(name).ok_or_else(|| MarkupError::UnknownEntity {
            name: name.to_string(),
            at,
        })?);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
