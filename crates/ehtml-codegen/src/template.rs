//! Compiling templates and rendering them.

use ehtml_lexer::snippet::range_snippet;
use ehtml_lexer::SyntaxError;
use ehtml_script::{LineCursor, Program, ScriptError, Value};
use tracing::debug;

use crate::builder::{Built, CodeBuilder};
use crate::escape::script_string;
use crate::generate::generate;
use crate::reduce::{reduce, ReduceError};
use crate::Options;

/// Errors turning template source into a runnable program.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Reduce(#[from] ReduceError),

    /// The generated script does not parse, usually because of a broken
    /// directive body. `line` is the template line of the nearest directive
    /// at or before the failure.
    #[error("{}{source} (in {filename}, while compiling ejs)", location(.filename, .line, .snippet))]
    Script {
        filename: String,
        line: Option<usize>,
        snippet: String,
        source: ScriptError,
    },
}

fn location(filename: &str, line: &Option<usize>, snippet: &str) -> String {
    match line {
        Some(line) => format!("{filename}:{line}\n{snippet}\n\n"),
        None => String::new(),
    }
}

/// Errors raised while rendering.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// A failure located in the template (debug builds).
    #[error("{filename}:{line}\n{snippet}\n\n{source}", line = .lines.0)]
    Context {
        filename: String,
        lines: (usize, usize),
        snippet: String,
        source: ScriptError,
    },

    #[error(transparent)]
    Script(ScriptError),

    /// From [`render`], which compiles first.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl From<RenderError> for ScriptError {
    /// Lets a custom element renderer propagate a nested template failure.
    fn from(err: RenderError) -> Self {
        ScriptError::Custom(err.to_string())
    }
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    program: Program,
    source: String,
    filename: String,
    debug: bool,
    code: String,
}

impl Template {
    /// The generated template script.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Render without a custom element renderer; any custom element fails.
    pub fn render(&self, locals: &Value) -> Result<String, RenderError> {
        self.render_with(locals, |name, _| {
            Err(ScriptError::Custom(format!(
                "No renderer for custom element <{name}>"
            )))
        })
    }

    /// Render, calling `render_custom(tag, locals)` for every custom element.
    pub fn render_with<F>(&self, locals: &Value, mut render_custom: F) -> Result<String, RenderError>
    where
        F: FnMut(&str, Value) -> Result<String, ScriptError>,
    {
        let mut cursor = LineCursor::default();
        match self
            .program
            .render(locals.clone(), &mut cursor, &mut render_custom)
        {
            Ok(html) => Ok(html),
            Err(source) if self.debug => {
                let LineCursor { start, end } = cursor;
                debug!(filename = %self.filename, start, end, "render failed");
                Err(RenderError::Context {
                    filename: self.filename.clone(),
                    lines: (start, end),
                    snippet: range_snippet(&self.source, start, end),
                    source,
                })
            }
            Err(source) => Err(RenderError::Script(source)),
        }
    }
}

/// Compile a template.
///
/// ```
/// use ehtml_codegen::{compile, Options, Value};
///
/// let template = compile("<p><%= locals.who %></p>", &Options::default()).unwrap();
/// let html = template.render(&Value::object([("who", Value::from("you"))])).unwrap();
/// assert_eq!(html, "<p>you</p>");
/// ```
pub fn compile(source: &str, options: &Options) -> Result<Template, CompileError> {
    let code = prepare(source, options)?.build(source).code;
    let program = parse_program(&code, source, options)?;
    debug!(
        filename = %options.filename,
        source_len = source.len(),
        code_len = code.len(),
        "compiled template"
    );

    Ok(Template {
        program,
        source: source.to_string(),
        filename: options.filename.clone(),
        debug: options.compile_debug,
        code,
    })
}

/// Compile and render in one go, without a custom element renderer.
pub fn render(source: &str, locals: &Value, options: &Options) -> Result<String, RenderError> {
    compile(source, options)?.render(locals)
}

/// Self-contained template script, for storing or shipping elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Standalone {
    pub code: String,
    pub map: Option<String>,
    pub map_with_source: Option<String>,
}

impl Standalone {
    /// Turn standalone code back into a runnable program.
    pub fn load(code: &str) -> Result<Program, ScriptError> {
        Program::parse(code)
    }
}

/// Like [`compile`], but returns the script itself. In debug builds the body
/// carries the template source and rethrows failures with the same message
/// [`Template::render`] produces.
pub fn compile_standalone(source: &str, options: &Options) -> Result<Standalone, CompileError> {
    let body = prepare(source, options)?;
    // Parsed alone first, so failures map straight back to the template
    parse_program(body.code(), source, options)?;

    let code = if options.compile_debug {
        let mut wrapper = CodeBuilder::new(options);
        // The prologue only counts as the first statement
        if options.strict_mode {
            wrapper.add("\"use strict\";");
        }
        wrapper.add(&format!("let __s=\"{}\";try{{\n", script_string(source)));
        wrapper.add_builder(body);
        wrapper.add(&format!(
            "\n}}catch(__x){{throw __context(__x,\"{}\",__s);}}",
            script_string(&options.filename)
        ));
        wrapper
    } else {
        body
    };

    let Built {
        code,
        map,
        map_with_source,
    } = code.build(source);
    Program::parse(&code).map_err(|error| CompileError::Script {
        filename: options.filename.clone(),
        line: None,
        snippet: String::new(),
        source: error,
    })?;
    debug!(
        filename = %options.filename,
        code_len = code.len(),
        mapped = map.is_some(),
        "compiled standalone template"
    );

    Ok(Standalone {
        code,
        map,
        map_with_source,
    })
}

/// Parse, transform, reduce and generate.
fn prepare(source: &str, options: &Options) -> Result<CodeBuilder, CompileError> {
    let mut document = ehtml_parser::parse(source)?;
    if let Some(transformer) = &options.transformer {
        transformer(&mut document);
    }
    let instructions = reduce(&document.nodes, options)?;
    Ok(generate(&instructions, options, false))
}

/// Parse generated code; syntax errors point back at the template.
fn parse_program(code: &str, source: &str, options: &Options) -> Result<Program, CompileError> {
    Program::parse(code).map_err(|error| {
        let line = locate_script_error(&error, source, options);
        debug!(filename = %options.filename, ?line, "generated script does not parse");
        CompileError::Script {
            filename: options.filename.clone(),
            line,
            snippet: line.map_or_else(String::new, |line| range_snippet(source, line, line)),
            source: error,
        }
    })
}

/// Template line for a syntax error in the generated code: regenerate with
/// positions tracked and take the last mapped directive text before the
/// failing position.
fn locate_script_error(error: &ScriptError, source: &str, options: &Options) -> Option<usize> {
    let ScriptError::Syntax { line, column, .. } = error else {
        return None;
    };
    let mut tracked = options.clone();
    tracked.source_map = true;
    let CodeBuilder::Mapped(builder) = prepare(source, &tracked).ok()? else {
        return None;
    };

    let at = (line.saturating_sub(1), column.saturating_sub(1));
    builder
        .mappings()
        .iter()
        .take_while(|m| (m.generated_line, m.generated_column) <= at)
        .filter_map(|m| m.original)
        .last()
        .map(|original| original.line + 1)
}
