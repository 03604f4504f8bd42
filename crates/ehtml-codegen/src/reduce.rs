//! Reducer: element tree to a flat instruction stream.
//!
//! Markup is serialized back to text and merged into `Static` runs, comments
//! are dropped, whitespace is collapsed outside `pre`-like elements, and
//! custom elements are expanded into pre-generated code.

use ehtml_lexer::token::is_whitespace_preserving;
use ehtml_lexer::{SourcePoint, Span};
use ehtml_parser::ast::{Attribute, DynamicAttribute, Quote, SimpleAttribute, ValuePart};
use ehtml_parser::{Element, Node, NodeKind, MAX_NESTING_DEPTH};
use tracing::debug;

use crate::builder::CodeBuilder;
use crate::custom;
use crate::Options;

/// One step of the render procedure.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Final output text.
    Static(String),
    /// `<% stmt %>`
    Eval { content: String, span: Span },
    /// `<%= expr %>`
    Escaped { content: String, span: Span },
    /// `<%- expr %>`
    Raw { content: String, span: Span },
    /// Expression generated ahead of time for a custom element or
    /// placeholder, covering the element's span.
    Nested { code: CodeBuilder, span: Span },
}

/// Custom-element constraint violations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReduceError {
    #[error("Unexpected eh-content tag (line {line})", line = .point.line)]
    UnexpectedContent { point: SourcePoint },

    #[error("name attribute for {element} tag must be a literal value (line {line})", line = .point.line)]
    DynamicSlotName { element: String, point: SourcePoint },

    /// Only reachable through a transformer; parsed trees are already bounded.
    #[error("Elements nested deeper than {max} levels (line {line})", max = MAX_NESTING_DEPTH, line = .point.line)]
    TooDeep { point: SourcePoint },
}

/// Reduce a node list.
pub fn reduce(nodes: &[Node], options: &Options) -> Result<Vec<Instruction>, ReduceError> {
    let instructions = reduce_all(nodes, options, 0)?;
    debug!(
        nodes = nodes.len(),
        instructions = instructions.len(),
        "reduced template"
    );
    Ok(instructions)
}

/// Reduce nodes found `depth` elements down.
pub(crate) fn reduce_all<'n>(
    nodes: impl IntoIterator<Item = &'n Node>,
    options: &Options,
    depth: usize,
) -> Result<Vec<Instruction>, ReduceError> {
    let mut reducer = Reducer::new(options, depth);
    reducer.append_nodes(nodes, false)?;
    Ok(reducer.instructions)
}

struct Reducer<'o> {
    options: &'o Options,
    instructions: Vec<Instruction>,
    /// The last static text came from a text node (not markup).
    last_text_was_plain: bool,
    /// ...and it ended in whitespace.
    last_plain_text_was_spaced: bool,
    depth: usize,
}

impl<'o> Reducer<'o> {
    fn new(options: &'o Options, depth: usize) -> Self {
        Self {
            options,
            instructions: Vec::new(),
            last_text_was_plain: false,
            last_plain_text_was_spaced: false,
            depth,
        }
    }

    fn append_nodes<'n>(
        &mut self,
        nodes: impl IntoIterator<Item = &'n Node>,
        keep_whitespace: bool,
    ) -> Result<(), ReduceError> {
        for node in nodes {
            match &node.kind {
                NodeKind::Text(text) => self.append_text(text, !keep_whitespace),
                NodeKind::Eval(content) => self.instructions.push(Instruction::Eval {
                    content: content.clone(),
                    span: node.span,
                }),
                NodeKind::Escaped(content) => {
                    self.push_output(Instruction::Escaped {
                        content: content.clone(),
                        span: node.span,
                    });
                }
                NodeKind::Raw(content) => {
                    self.push_output(Instruction::Raw {
                        content: content.clone(),
                        span: node.span,
                    });
                }
                NodeKind::Comment(_) => {}
                NodeKind::Doctype(content) => {
                    self.append_text(&format!("<!DOCTYPE {content}>"), false);
                }
                NodeKind::Element(element) => {
                    self.append_element(element, node.span, keep_whitespace)?;
                }
            }
        }
        Ok(())
    }

    fn append_element(
        &mut self,
        element: &Element,
        span: Span,
        keep_whitespace: bool,
    ) -> Result<(), ReduceError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ReduceError::TooDeep { point: span.start });
        }

        match element.name.as_str() {
            "eh-content" => {
                return Err(ReduceError::UnexpectedContent { point: span.start });
            }
            "eh-placeholder" => {
                let placeholder = custom::expand_placeholder(element, span, self.options, self.depth + 1)?;
                self.push_output(placeholder);
                return Ok(());
            }
            _ if element.is_custom() => {
                let expanded = custom::expand_element(element, span, self.options, self.depth + 1)?;
                self.push_output(expanded);
                return Ok(());
            }
            _ => {}
        }

        self.append_text(&format!("<{}", element.name), false);
        for attribute in &element.attributes {
            match attribute {
                Attribute::Simple(attr) => self.append_simple_attribute(attr),
                Attribute::Dynamic(attr) => self.append_dynamic_attribute(attr),
            }
        }
        self.append_text(">", false);

        if !element.is_void {
            let keep_children = keep_whitespace || is_whitespace_preserving(&element.name);
            self.depth += 1;
            self.append_nodes(&element.children, keep_children)?;
            self.depth -= 1;
            self.append_text(&format!("</{}>", element.name), false);
        }
        Ok(())
    }

    fn append_simple_attribute(&mut self, attr: &SimpleAttribute) {
        let value = if attr.name == "class" {
            collapse_all_whitespace(attr.value.trim())
        } else if attr.is_boolean {
            // Presence is the value
            String::new()
        } else {
            attr.value.clone()
        };

        let text = if value.is_empty() {
            format!(" {}", attr.name)
        } else if is_valid_unquoted(&value) {
            format!(" {}={value}", attr.name)
        } else {
            let quote = attr.quote.as_str();
            format!(" {}={quote}{value}{quote}", attr.name)
        };
        self.append_text(&text, false);
    }

    fn append_dynamic_attribute(&mut self, attr: &DynamicAttribute) {
        if let (true, [ValuePart::Escaped { content, span }]) = (attr.is_boolean, attr.parts.as_slice())
        {
            // <input checked="<%= on %>"> renders the bare name only when `on` holds
            self.instructions.push(Instruction::Eval {
                content: format!("if ({}) {{", content.trim()),
                span: *span,
            });
            self.append_text(&format!(" {}", attr.name), false);
            self.instructions.push(Instruction::Eval {
                content: "}".into(),
                span: *span,
            });
            return;
        }

        let quote = match attr.quote {
            Quote::None => Quote::Double,
            quote => quote,
        };
        self.append_text(&format!(" {}={}", attr.name, quote.as_str()), false);
        for part in &attr.parts {
            match part {
                ValuePart::Text(text) if attr.name == "class" => {
                    self.append_text(&collapse_all_whitespace(text), false);
                }
                ValuePart::Text(text) => self.append_text(text, false),
                ValuePart::Escaped { content, span } => self.instructions.push(Instruction::Escaped {
                    content: content.clone(),
                    span: *span,
                }),
            }
        }
        self.append_text(quote.as_str(), false);
    }

    /// Push an output instruction that ends the current text run.
    fn push_output(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
        self.last_text_was_plain = false;
    }

    /// Append to the trailing static run, collapsing whitespace for text nodes.
    fn append_text(&mut self, text: &str, plain: bool) {
        let mut text = text;
        let collapsed;
        if plain {
            if self.last_text_was_plain && self.last_plain_text_was_spaced {
                text = text.trim_start();
            }
            collapsed = collapse_whitespace(text);
            text = &collapsed;
            self.last_plain_text_was_spaced = text.ends_with(char::is_whitespace);
        }
        self.last_text_was_plain = plain;

        if text.is_empty() {
            return;
        }
        match self.instructions.last_mut() {
            Some(Instruction::Static(last)) => last.push_str(text),
            _ => self.instructions.push(Instruction::Static(text.to_string())),
        }
    }
}

/// Collapse each whitespace run to its first character.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push(ch);
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

/// Replace each whitespace run with a single space.
fn collapse_all_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

/// Attribute values that need no quotes.
fn is_valid_unquoted(value: &str) -> bool {
    !value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '>' | '"' | '\'' | '<' | '=' | '`'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reduce_source(source: &str) -> Vec<Instruction> {
        let doc = ehtml_parser::parse(source).unwrap();
        reduce(&doc.nodes, &Options::default()).unwrap()
    }

    fn statics(source: &str) -> String {
        match reduce_source(source).as_slice() {
            [] => String::new(),
            [Instruction::Static(text)] => text.clone(),
            other => panic!("expected a single static, got {other:?}"),
        }
    }

    fn shape(instructions: &[Instruction]) -> Vec<String> {
        instructions
            .iter()
            .map(|i| match i {
                Instruction::Static(text) => format!("static {text}"),
                Instruction::Eval { content, .. } => format!("eval {content}"),
                Instruction::Escaped { content, .. } => format!("escaped {content}"),
                Instruction::Raw { content, .. } => format!("raw {content}"),
                Instruction::Nested { code, .. } => format!("nested {}", code.code()),
            })
            .collect()
    }

    // =========================================================================
    // Text and whitespace
    // =========================================================================

    #[test]
    fn test_empty() {
        assert_eq!(reduce_source(""), vec![]);
    }

    #[test]
    fn test_whitespace_collapses_to_first_char() {
        assert_eq!(statics("a  \n b\n\n\tc"), "a b\nc");
    }

    #[test]
    fn test_leading_space_trimmed_after_spaced_text() {
        assert_eq!(statics("a <!-- x --> b"), "a b");
    }

    #[test]
    fn test_markup_resets_spacing() {
        assert_eq!(statics("<p> a </p> <p> b </p>"), "<p> a </p> <p> b </p>");
    }

    #[test]
    fn test_pre_keeps_whitespace() {
        assert_eq!(statics("<pre>  a\n\n b</pre>  c"), "<pre>  a\n\n b</pre> c");
        assert_eq!(statics("<pre><b>  x  </b></pre>"), "<pre><b>  x  </b></pre>");
    }

    #[test]
    fn test_script_content_kept() {
        assert_eq!(
            statics("<script>if (a  <  b) {}</script>"),
            "<script>if (a  <  b) {}</script>"
        );
    }

    #[test]
    fn test_eval_keeps_spacing_state() {
        let instructions = reduce_source("a <% x %> b");
        assert_eq!(shape(&instructions), vec!["static a ", "eval  x ", "static b"]);
    }

    #[test]
    fn test_escaped_breaks_spacing_state() {
        let instructions = reduce_source("a <%= x %> b");
        assert_eq!(shape(&instructions), vec!["static a ", "escaped  x ", "static  b"]);
    }

    #[test]
    fn test_comment_and_doctype() {
        assert_eq!(statics("<!doctype html><!-- gone -->x"), "<!DOCTYPE html>x");
    }

    #[test]
    fn test_void_elements() {
        assert_eq!(statics("<br/><img src=\"a.png\">"), "<br><img src=a.png>");
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    #[test]
    fn test_attribute_quoting() {
        assert_eq!(
            statics(r#"<a href="x" title="a b" data-x='q"z' id=""></a>"#),
            r#"<a href=x title="a b" data-x='q"z' id></a>"#
        );
    }

    #[test]
    fn test_class_collapsed() {
        assert_eq!(statics("<p class=\"  a \n  b \"></p>"), "<p class=\"a b\"></p>");
        assert_eq!(statics("<p class=\" single \"></p>"), "<p class=single></p>");
    }

    #[test]
    fn test_boolean_static_value_dropped() {
        assert_eq!(statics("<input checked=\"checked\" value=\"\">"), "<input checked value>");
    }

    #[test]
    fn test_dynamic_attribute() {
        let instructions = reduce_source("<a href=\"/u/<%= id %>\">x</a>");
        assert_eq!(
            shape(&instructions),
            vec!["static <a href=\"/u/", "escaped  id ", "static \">x</a>"]
        );
    }

    #[test]
    fn test_dynamic_class_text_collapsed() {
        let instructions = reduce_source("<p class=\"a   <%= b %>  c\"></p>");
        assert_eq!(
            shape(&instructions),
            vec!["static <p class=\"a ", "escaped  b ", "static  c\"></p>"]
        );
    }

    #[test]
    fn test_boolean_attribute_collapse() {
        let instructions = reduce_source("<input checked=\"<%= on %>\">");
        assert_eq!(
            shape(&instructions),
            vec!["static <input", "eval if (on) {", "static  checked", "eval }", "static >"]
        );
        let Instruction::Eval { span, .. } = &instructions[1] else {
            panic!("expected eval");
        };
        assert_eq!(span.start.column, 20);
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    #[test]
    fn test_no_adjacent_statics() {
        let instructions = reduce_source("<div a=\"<%= x %>\"><% if (y) { %><b>1</b><% } %></div>");
        for pair in instructions.windows(2) {
            assert!(!matches!(pair, [Instruction::Static(_), Instruction::Static(_)]));
        }
        assert!(!instructions
            .iter()
            .any(|i| matches!(i, Instruction::Static(text) if text.is_empty())));
    }

    #[test]
    fn test_reducing_reduced_output_is_a_no_op() {
        let once = statics("<ul>\n  <li class=\" a  b \">One</li>\n\n  <li>Two  </li>\n</ul>");
        assert_eq!(statics(&once), once);
    }

    #[test]
    fn test_unexpected_eh_content() {
        let doc = ehtml_parser::parse("<eh-content name=\"a\"></eh-content>").unwrap();
        let err = reduce(&doc.nodes, &Options::default()).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected eh-content tag (line 1)");
    }

    #[test]
    fn test_built_tree_nesting_limit() {
        let wrap = |name: &str, levels: usize| {
            let mut nodes = ehtml_parser::parse("x").unwrap().nodes;
            for _ in 0..levels {
                let element = Element {
                    name: name.into(),
                    is_void: false,
                    attributes: Vec::new(),
                    children: nodes,
                };
                nodes = vec![Node::new(NodeKind::Element(element), Span::default())];
            }
            nodes
        };

        let ok = reduce(&wrap("b", MAX_NESTING_DEPTH), &Options::default()).unwrap();
        assert_eq!(ok.len(), 1);

        for name in ["b", "my-tag"] {
            let err = reduce(&wrap(name, MAX_NESTING_DEPTH + 1), &Options::default()).unwrap_err();
            assert!(matches!(err, ReduceError::TooDeep { .. }));
        }
    }
}
