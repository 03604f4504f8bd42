//! Token tree for EHTML templates.
//!
//! The tree is what an optional transformer hook sees between parsing and
//! reduction, so every type here is plain data with public fields.

pub use ehtml_lexer::token::{
    Attribute, DirectiveKind, DynamicAttribute, Quote, SimpleAttribute, ValuePart,
};
pub use ehtml_lexer::{SourcePoint, Span};

/// A complete template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
}

/// A node with its source span.
///
/// Directive spans cover the directive content only. Element spans start
/// right after `<` and end after the closing `>` of the close tag (or of the
/// open tag for void elements).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Text(String),
    /// `<% stmt %>`
    Eval(String),
    /// `<%= expr %>`
    Escaped(String),
    /// `<%- expr %>`
    Raw(String),
    Comment(String),
    Doctype(String),
    Element(Element),
}

/// An HTML element (or custom element) with its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub is_void: bool,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Build a directive node of the given flavour.
    pub fn directive(kind: DirectiveKind, content: impl Into<String>, span: Span) -> Self {
        let content = content.into();
        let kind = match kind {
            DirectiveKind::Eval => NodeKind::Eval(content),
            DirectiveKind::Escaped => NodeKind::Escaped(content),
            DirectiveKind::Raw => NodeKind::Raw(content),
        };
        Self::new(kind, span)
    }

    pub fn as_element(&self) -> Option<&Element> {
        match &self.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match &mut self.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }
}

impl Element {
    /// Custom elements have a `-` in their name.
    pub fn is_custom(&self) -> bool {
        self.name.contains('-')
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }
}

impl Document {
    /// Visit every node depth-first, parents before children.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Node)) {
        fn walk(nodes: &mut [Node], visit: &mut impl FnMut(&mut Node)) {
            for node in nodes {
                visit(node);
                if let NodeKind::Element(element) = &mut node.kind {
                    walk(&mut element.children, visit);
                }
            }
        }
        walk(&mut self.nodes, visit);
    }
}
