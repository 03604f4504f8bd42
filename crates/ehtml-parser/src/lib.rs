//! EHTML Parser
//!
//! Builds the element tree for a template from the lexer's flat token
//! stream. Directive bodies stay opaque strings here; they are parsed later,
//! as part of the generated template script.

pub mod ast;
pub mod parser;

pub use ast::{Document, Element, Node, NodeKind};
pub use ehtml_lexer::SyntaxError;
pub use parser::{Parser, MAX_NESTING_DEPTH};

use tracing::debug;

/// Parse template source into a document tree.
pub fn parse(source: &str) -> Result<Document, SyntaxError> {
    let document = Parser::parse(source)?;
    debug!(
        source_len = source.len(),
        nodes = document.nodes.len(),
        "parsed template"
    );
    Ok(document)
}
