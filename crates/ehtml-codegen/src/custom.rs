//! Custom element expansion.
//!
//! `<my-card title="x"><eh-content name="footer">..</eh-content>..</my-card>`
//! becomes a `renderCustom("my-card", locals)` call whose locals hold the
//! attributes (camel-cased) and the generated code of every content slot
//! under `__contents`. `<eh-placeholder name="footer">` is where a custom
//! element's own template puts that slot back.

use ehtml_lexer::Span;
use ehtml_parser::ast::{Attribute, Quote, ValuePart};
use ehtml_parser::{Element, Node, NodeKind};

use crate::builder::CodeBuilder;
use crate::escape::script_string;
use crate::generate::{add_directive, debug_marker, generate};
use crate::reduce::{reduce_all, Instruction, ReduceError};
use crate::Options;

/// Expand a custom element into a `renderCustom(...)` call. Its content
/// is reduced `depth` elements down.
pub(crate) fn expand_element(
    element: &Element,
    span: Span,
    options: &Options,
    depth: usize,
) -> Result<Instruction, ReduceError> {
    let mut code = CodeBuilder::new(options);
    code.add(&format!("renderCustom(\"{}\",{{", script_string(&element.name)));

    for attribute in &element.attributes {
        code.add(&format!(
            "\"{}\":",
            script_string(&camel_case(attribute.name()))
        ));
        match attribute {
            Attribute::Simple(attr) if attr.quote == Quote::None && attr.value.is_empty() => {
                code.add("true");
            }
            Attribute::Simple(attr) => code.add(&format!("\"{}\"", script_string(&attr.value))),
            Attribute::Dynamic(attr) => match attr.parts.as_slice() {
                // A lone directive passes its value through uncast
                [ValuePart::Escaped { content, span }] => add_value(&mut code, content, *span, options),
                parts => {
                    for (i, part) in parts.iter().enumerate() {
                        if i > 0 {
                            code.add("+");
                        }
                        match part {
                            ValuePart::Text(text) => code.add(&format!("\"{}\"", script_string(text))),
                            ValuePart::Escaped { content, span } => {
                                code.add("String(");
                                add_value(&mut code, content, *span, options);
                                code.add(")");
                            }
                        }
                    }
                }
            },
        }
        code.add(",");
    }

    code.add("\"__contents\":{");
    for (i, (name, nodes)) in content_slots(element)?.into_iter().enumerate() {
        if i > 0 {
            code.add(",");
        }
        code.add(&format!("\"{}\":", script_string(&name)));
        let instructions = reduce_all(nodes, options, depth)?;
        code.add_builder(generate(&instructions, options, true));
    }
    code.add("}}");

    // Evaluated after the attributes, so a failing callback reports the element
    if options.compile_debug {
        code.add(",");
        code.add(&debug_marker(span));
    }
    code.add(")");

    Ok(Instruction::Nested { code, span })
}

/// Expand `<eh-placeholder>` into "slot content unless blank, else fallback".
pub(crate) fn expand_placeholder(
    element: &Element,
    span: Span,
    options: &Options,
    depth: usize,
) -> Result<Instruction, ReduceError> {
    let name = script_string(&slot_name(element, span)?);
    let fallback = generate(&reduce_all(&element.children, options, depth)?, options, true);

    let mut code = CodeBuilder::new(options);
    code.add(&format!("(__blank(__c[\"{name}\"])?"));
    code.add_builder(fallback);
    code.add(&format!(":__c[\"{name}\"])"));

    Ok(Instruction::Nested { code, span })
}

fn add_value(code: &mut CodeBuilder, content: &str, span: Span, options: &Options) {
    code.add("(");
    if options.compile_debug {
        code.add(&debug_marker(span));
        code.add(",");
    }
    add_directive(code, content, span.start);
    code.add(")");
}

/// Split children into named slots, in first-seen order. Children of
/// `<eh-content name="x">` go to slot `x`, everything else to `""`.
fn content_slots(element: &Element) -> Result<Vec<(String, Vec<&Node>)>, ReduceError> {
    let mut slots: Vec<(String, Vec<&Node>)> = Vec::new();

    for child in &element.children {
        let (name, nodes): (String, Vec<&Node>) = match &child.kind {
            NodeKind::Element(content) if content.name == "eh-content" => {
                (slot_name(content, child.span)?, content.children.iter().collect())
            }
            _ => (String::new(), vec![child]),
        };
        match slots.iter_mut().find(|(slot, _)| *slot == name) {
            Some((_, existing)) => existing.extend(nodes),
            None => slots.push((name, nodes)),
        }
    }

    Ok(slots)
}

/// The literal `name` attribute of a slot element, `""` when absent.
fn slot_name(element: &Element, span: Span) -> Result<String, ReduceError> {
    match element.attribute("name") {
        Some(Attribute::Simple(attr)) => Ok(attr.value.clone()),
        Some(Attribute::Dynamic(_)) => Err(ReduceError::DynamicSlotName {
            element: element.name.clone(),
            point: span.start,
        }),
        None => Ok(String::new()),
    }
}

/// `data-user-id` to `dataUserId`.
fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(next) if c == '-' && next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}
