//! Turns a raw assistant reply into ordered text and tool-call segments.
//!
//! Two invocation styles are understood:
//!
//! ```text
//! <read_file><path>src/main.rs</path></read_file>
//!
//! <tool_use>
//!   <tool_name>read_file</tool_name>
//!   <params><path>src/main.rs</path></params>
//! </tool_use>
//! ```
//!
//! Parsing never fails. A reply that is not well-formed markup becomes one
//! text segment, and a `<tool_use>` block without a tool name becomes a
//! text segment starting with [`MALFORMED_TOOL_USE_PREFIX`].

use crate::markup::{self, Element, Node};
use crate::registry::ToolName;
use crate::tool::{ToolCall, ToolParams};

/// Marks text produced from a `<tool_use>` block that could not be used
pub const MALFORMED_TOOL_USE_PREFIX: &str = "Error: Malformed tool use - ";

const TOOL_USE_TAG: &str = "tool_use";
const TOOL_NAME_TAG: &str = "tool_name";
const PARAMS_TAG: &str = "params";
const TEXT_TAG: &str = "text_content";

/// One parsed unit of an assistant reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Tool(ToolCall),
}

impl Segment {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(t) => Some(t),
            Segment::Tool(_) => None,
        }
    }

    pub fn as_tool(&self) -> Option<&ToolCall> {
        match self {
            Segment::Tool(call) => Some(call),
            Segment::Text(_) => None,
        }
    }

    pub fn is_malformed_tool_use(&self) -> bool {
        self.as_text()
            .is_some_and(|t| t.starts_with(MALFORMED_TOOL_USE_PREFIX))
    }
}

/// Parse a reply into segments, in the order they appear
pub fn parse(reply: &str) -> Vec<Segment> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let nodes = match markup::parse_fragment(reply) {
        Ok(nodes) => nodes,
        Err(e) => {
            tracing::debug!("Reply is not well-formed markup ({}), treating as text", e);
            return vec![Segment::Text(trimmed.to_string())];
        }
    };

    let mut segments = Vec::new();
    for node in &nodes {
        match node {
            Node::Text(text) => push_text(&mut segments, text),
            Node::Element(el) => {
                if let Some(segment) = interpret(el) {
                    segments.push(segment);
                }
            }
        }
    }
    segments
}

fn interpret(el: &Element) -> Option<Segment> {
    if el.name == TOOL_USE_TAG {
        return Some(interpret_wrapper(el));
    }
    if ToolName::from_wire(&el.name).is_some() {
        return Some(Segment::Tool(ToolCall::new(el.name.clone(), params_of(el))));
    }
    if el.name == TEXT_TAG {
        let text = el.direct_text();
        let text = text.trim();
        return (!text.is_empty()).then(|| Segment::Text(text.to_string()));
    }
    Some(Segment::Text(el.to_markup()))
}

fn interpret_wrapper(el: &Element) -> Segment {
    let name = el
        .child(TOOL_NAME_TAG)
        .map(Element::leaf_text)
        .filter(|name| !name.is_empty());

    match name {
        Some(name) => {
            let params = el.child(PARAMS_TAG).map(params_of).unwrap_or_default();
            Segment::Tool(ToolCall::new(name, params))
        }
        None => Segment::Text(format!(
            "{}Missing <{}> in <{}> block: {}",
            MALFORMED_TOOL_USE_PREFIX,
            TOOL_NAME_TAG,
            TOOL_USE_TAG,
            el.to_markup()
        )),
    }
}

/// Each child element becomes one parameter; attributes are ignored
fn params_of(el: &Element) -> ToolParams {
    el.elements()
        .map(|child| (child.name.clone(), child.leaf_text()))
        .collect()
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
}
