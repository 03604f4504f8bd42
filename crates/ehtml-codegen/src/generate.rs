//! Code generator: instruction stream to template script.
//!
//! Without statements the whole template is one expression:
//!
//! ```text
//! return"<p>"+__e(name)+"</p>";
//! ```
//!
//! Once an eval directive shows up, output goes through an accumulator:
//!
//! ```text
//! let __o="<ul>";for (let i of items) {
//! __o+="<li>"+__e(i)+"</li>";}
//! __o+="</ul>";return __o;
//! ```

use ehtml_lexer::{SourcePoint, Span};
use tracing::trace;

use crate::builder::CodeBuilder;
use crate::escape::script_string;
use crate::reduce::Instruction;
use crate::Options;

/// Where the next output fragment lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Right after `let __o=` or `return`.
    VeryFirst,
    /// After a statement: a new `__o+=` is needed.
    First,
    /// Inside an expression: continue with `+`.
    Rest,
}

/// Generate the procedure body (or, when `nested`, an expression) for a
/// reduced instruction stream.
pub fn generate(instructions: &[Instruction], options: &Options, nested: bool) -> CodeBuilder {
    let mut generator = Generator {
        code: CodeBuilder::new(options),
        options,
        state: State::VeryFirst,
    };
    generator.run(instructions, nested);

    trace!(nested, code = generator.code.code(), "generated template script");
    generator.code
}

/// `__line(s)` or `__line(s,e)` for the lines `span` covers.
pub(crate) fn debug_marker(span: Span) -> String {
    let (start, end) = span.lines();
    if start == end {
        format!("__line({start})")
    } else {
        format!("__line({start},{end})")
    }
}

/// Append directive content without its surrounding whitespace, mapped to
/// where the remaining text starts.
pub(crate) fn add_directive(code: &mut CodeBuilder, content: &str, start: SourcePoint) {
    let trimmed = content.trim_start();
    let mut point = start;
    for ch in content[..content.len() - trimmed.len()].chars() {
        point.offset += ch.len_utf8();
        if ch == '\n' {
            point.line += 1;
            point.column = 1;
        } else {
            point.column += 1;
        }
    }
    code.add_mapped(trimmed.trim_end(), point);
}

struct Generator<'o> {
    code: CodeBuilder,
    options: &'o Options,
    state: State,
}

impl Generator<'_> {
    fn run(&mut self, instructions: &[Instruction], nested: bool) {
        let literal = match instructions {
            [] => Some(""),
            [Instruction::Static(text)] => Some(text.as_str()),
            _ => None,
        };
        if let Some(text) = literal {
            if !nested {
                self.code.add("return");
            }
            self.code.add(&format!("\"{}\"", script_string(text)));
            return;
        }

        let has_statements = instructions
            .iter()
            .any(|i| matches!(i, Instruction::Eval { .. }));

        if !nested {
            self.add_header();
        }
        if has_statements {
            if nested {
                self.code.add("do{");
            }
            self.code.add("let __o=");
        } else if !nested {
            self.code.add("return ");
        }

        for instruction in instructions {
            match instruction {
                Instruction::Static(text) => {
                    self.begin_expression(true);
                    self.code.add(&format!("\"{}\"", script_string(text)));
                }
                Instruction::Eval { content, span } => self.add_statement(content, *span),
                Instruction::Escaped { content, span } => {
                    self.add_expression(true, *span, |code| {
                        code.add("__e(");
                        add_directive(code, content, span.start);
                        code.add(")");
                    });
                }
                Instruction::Raw { content, span } => {
                    self.add_expression(false, *span, |code| {
                        code.add("(");
                        add_directive(code, content, span.start);
                        code.add(")");
                    });
                }
                Instruction::Nested { code: nested_code, span } => {
                    self.add_expression(false, *span, |code| {
                        code.add("(");
                        code.add_builder(nested_code.clone());
                        code.add(")");
                    });
                }
            }
        }

        if self.state == State::Rest && (!nested || has_statements) {
            self.code.add(";");
        }
        if has_statements {
            self.code.add("return __o;");
            if nested {
                self.code.add("}");
            }
        }
    }

    fn add_header(&mut self) {
        if self.options.strict_mode {
            self.code.add("\"use strict\";");
        }
        self.code
            .add("locals=locals||{};let __c=locals.__contents||{};");
        if !self.options.vars.is_empty() {
            let bindings: Vec<String> = self
                .options
                .vars
                .iter()
                .map(|var| format!("{var}=locals.{var}"))
                .collect();
            self.code.add(&format!("let {};", bindings.join(",")));
        }
    }

    /// Emit the glue before an output fragment.
    fn begin_expression(&mut self, is_string: bool) {
        match self.state {
            State::VeryFirst if !is_string => self.code.add("\"\"+"),
            State::VeryFirst => {}
            State::First => self.code.add("__o+="),
            State::Rest => self.code.add("+"),
        }
        self.state = State::Rest;
    }

    /// Emit a directive output fragment, tagged with its lines in debug mode.
    fn add_expression(&mut self, is_string: bool, span: Span, write: impl FnOnce(&mut CodeBuilder)) {
        self.begin_expression(is_string);
        if self.options.compile_debug {
            self.code.add(&format!("({},", debug_marker(span)));
            write(&mut self.code);
            self.code.add(")");
        } else {
            write(&mut self.code);
        }
    }

    fn add_statement(&mut self, content: &str, span: Span) {
        match self.state {
            State::VeryFirst => self.code.add("\"\";"),
            State::First => {}
            State::Rest => self.code.add(";"),
        }
        if self.options.compile_debug {
            self.code.add(&format!("{};", debug_marker(span)));
        }
        add_directive(&mut self.code, content, span.start);
        self.code.add("\n");
        self.state = State::First;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Built;
    use pretty_assertions::assert_eq;

    fn span(start_line: usize, end_line: usize) -> Span {
        Span::new(
            SourcePoint::new(0, start_line, 1),
            SourcePoint::new(0, end_line, 1),
        )
    }

    fn static_text(text: &str) -> Instruction {
        Instruction::Static(text.into())
    }

    fn eval(content: &str) -> Instruction {
        Instruction::Eval {
            content: content.into(),
            span: span(1, 1),
        }
    }

    fn escaped(content: &str) -> Instruction {
        Instruction::Escaped {
            content: content.into(),
            span: span(1, 1),
        }
    }

    fn raw(content: &str) -> Instruction {
        Instruction::Raw {
            content: content.into(),
            span: span(1, 1),
        }
    }

    fn release() -> Options {
        Options::new().compile_debug(false)
    }

    fn body(instructions: &[Instruction], options: &Options) -> String {
        generate(instructions, options, false).code().to_string()
    }

    const HEADER: &str = "\"use strict\";locals=locals||{};let __c=locals.__contents||{};";

    // =========================================================================
    // Static output
    // =========================================================================

    #[test]
    fn test_empty_and_static() {
        assert_eq!(body(&[], &release()), "return\"\"");
        assert_eq!(body(&[static_text("<p>\"hi\"</p>\n")], &release()), "return\"<p>\\\"hi\\\"</p>\\n\"");
        assert_eq!(generate(&[static_text("x")], &release(), true).code(), "\"x\"");
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    #[test]
    fn test_single_expression() {
        assert_eq!(
            body(&[static_text("a"), escaped(" b "), raw("c")], &release()),
            format!("{HEADER}return \"a\"+__e(b)+(c);")
        );
    }

    #[test]
    fn test_raw_first_is_cast() {
        assert_eq!(
            body(&[raw("n"), static_text("!")], &release()),
            format!("{HEADER}return \"\"+(n)+\"!\";")
        );
    }

    #[test]
    fn test_non_strict_and_vars() {
        let options = release().strict_mode(false).vars(["a", "b"]);
        assert_eq!(
            body(&[escaped("a")], &options),
            "locals=locals||{};let __c=locals.__contents||{};let a=locals.a,b=locals.b;return __e(a);"
        );
    }

    // =========================================================================
    // Statements
    // =========================================================================

    #[test]
    fn test_statements_use_accumulator() {
        assert_eq!(
            body(
                &[
                    static_text("<ul>"),
                    eval(" for (let i of items) { "),
                    static_text("<li>"),
                    escaped("i"),
                    eval(" } "),
                    static_text("</ul>"),
                ],
                &release()
            ),
            format!(
                "{HEADER}let __o=\"<ul>\";for (let i of items) {{\n\
                 __o+=\"<li>\"+__e(i);}}\n\
                 __o+=\"</ul>\";return __o;"
            )
        );
    }

    #[test]
    fn test_statement_first() {
        assert_eq!(
            body(&[eval("let x = 1"), escaped("x")], &release()),
            format!("{HEADER}let __o=\"\";let x = 1\n__o+=__e(x);return __o;")
        );
    }

    #[test]
    fn test_nested_with_statements() {
        assert_eq!(
            generate(&[eval("if (a) {"), static_text("y"), eval("}")], &release(), true).code(),
            "do{let __o=\"\";if (a) {\n__o+=\"y\";}\nreturn __o;}"
        );
    }

    #[test]
    fn test_nested_expression_has_no_terminator() {
        assert_eq!(
            generate(&[static_text("a"), escaped("b")], &release(), true).code(),
            "\"a\"+__e(b)"
        );
    }

    // =========================================================================
    // Debug markers
    // =========================================================================

    #[test]
    fn test_debug_marker() {
        assert_eq!(debug_marker(span(3, 3)), "__line(3)");
        assert_eq!(debug_marker(span(2, 4)), "__line(2,4)");
    }

    #[test]
    fn test_debug_output() {
        let instructions = [
            eval("let a = 1"),
            Instruction::Escaped {
                content: "a".into(),
                span: span(2, 3),
            },
        ];
        assert_eq!(
            body(&instructions, &Options::default()),
            format!("{HEADER}let __o=\"\";__line(1);let a = 1\n__o+=(__line(2,3),__e(a));return __o;")
        );
    }

    // =========================================================================
    // Position mapping
    // =========================================================================

    #[test]
    fn test_directive_mapped_after_trimmed_whitespace() {
        let options = release().source_map(true).filename("t");
        let mut code = CodeBuilder::new(&options);
        add_directive(&mut code, " \n  name ", SourcePoint::new(3, 1, 4));
        let Built { code, map, .. } = code.build("<%= \n  name %>");
        assert_eq!(code, "name");
        // line 1 (0-based), column 2
        assert!(map.unwrap().contains(r#""mappings":"AACE""#));
    }
}
