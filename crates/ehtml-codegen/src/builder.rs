//! Incremental code output, with or without position tracking.

use ehtml_lexer::SourcePoint;

use crate::source_map::{self, Mapping, OriginalPosition};
use crate::Options;

/// Final output of a builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Built {
    pub code: String,
    /// Source map JSON, when positions were tracked.
    pub map: Option<String>,
    /// Same map with the template embedded as `sourcesContent`.
    pub map_with_source: Option<String>,
}

/// Append-only code buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeBuilder {
    Plain(String),
    Mapped(MappedBuilder),
}

impl CodeBuilder {
    /// A builder of the kind `options.source_map` asks for.
    pub fn new(options: &Options) -> Self {
        if options.source_map {
            CodeBuilder::Mapped(MappedBuilder::new(&options.filename))
        } else {
            CodeBuilder::Plain(String::new())
        }
    }

    /// Append generated text.
    pub fn add(&mut self, text: &str) {
        match self {
            CodeBuilder::Plain(code) => code.push_str(text),
            CodeBuilder::Mapped(builder) => builder.add(text),
        }
    }

    /// Append template text that starts at `start` in the source.
    pub fn add_mapped(&mut self, text: &str, start: SourcePoint) {
        match self {
            CodeBuilder::Plain(code) => code.push_str(text),
            CodeBuilder::Mapped(builder) => builder.add_mapped(text, start),
        }
    }

    /// Append the output of a child builder.
    pub fn add_builder(&mut self, child: CodeBuilder) {
        match (self, child) {
            (CodeBuilder::Mapped(builder), CodeBuilder::Mapped(child)) => builder.add_builder(child),
            (this, child) => this.add(child.code()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            CodeBuilder::Plain(code) => code,
            CodeBuilder::Mapped(builder) => &builder.code,
        }
    }

    /// Finish, rendering source maps against `source` when tracked.
    pub fn build(self, source: &str) -> Built {
        match self {
            CodeBuilder::Plain(code) => Built {
                code,
                map: None,
                map_with_source: None,
            },
            CodeBuilder::Mapped(builder) => Built {
                map: Some(source_map::render(&builder.filename, &builder.mappings, None)),
                map_with_source: Some(source_map::render(
                    &builder.filename,
                    &builder.mappings,
                    Some(source),
                )),
                code: builder.code,
            },
        }
    }
}

/// Builder recording a mapping for every line of template text appended.
///
/// Generated columns count UTF-16 units, as source map consumers expect.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedBuilder {
    filename: String,
    code: String,
    line: usize,
    column: usize,
    mappings: Vec<Mapping>,
    /// The last segment maps template text that ends at the current position.
    open: bool,
}

impl MappedBuilder {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            code: String::new(),
            line: 0,
            column: 0,
            mappings: Vec::new(),
            open: false,
        }
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    fn add(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.close_segment();
        self.advance(text);
    }

    fn add_mapped(&mut self, text: &str, start: SourcePoint) {
        let mut ends_mapped = false;
        for (i, piece) in text.split('\n').enumerate() {
            if i > 0 {
                self.code.push('\n');
                self.line += 1;
                self.column = 0;
            }
            ends_mapped = !piece.is_empty();
            if ends_mapped {
                self.mappings.push(Mapping {
                    generated_line: self.line,
                    generated_column: self.column,
                    original: Some(OriginalPosition {
                        line: start.line.saturating_sub(1) + i,
                        column: if i == 0 {
                            start.column.saturating_sub(1)
                        } else {
                            0
                        },
                    }),
                });
                self.code.push_str(piece);
                self.column += utf16_len(piece);
            }
        }
        self.open = ends_mapped;
    }

    fn add_builder(&mut self, child: MappedBuilder) {
        if child.code.is_empty() {
            return;
        }
        let starts_mapped = matches!(
            child.mappings.first(),
            Some(Mapping {
                generated_line: 0,
                generated_column: 0,
                ..
            })
        );
        if !starts_mapped {
            self.close_segment();
        }

        let (line, column) = (self.line, self.column);
        self.mappings.extend(child.mappings.into_iter().map(|m| Mapping {
            generated_line: line + m.generated_line,
            generated_column: if m.generated_line == 0 {
                column + m.generated_column
            } else {
                m.generated_column
            },
            original: m.original,
        }));
        self.advance(&child.code);
        self.open = child.open;
    }

    /// End the open segment so following generated text maps to nothing.
    fn close_segment(&mut self) {
        if self.open {
            self.mappings.push(Mapping {
                generated_line: self.line,
                generated_column: self.column,
                original: None,
            });
            self.open = false;
        }
    }

    fn advance(&mut self, text: &str) {
        self.code.push_str(text);
        match text.rfind('\n') {
            Some(last) => {
                self.line += text.matches('\n').count();
                self.column = utf16_len(&text[last + 1..]);
            }
            None => self.column += utf16_len(text),
        }
    }
}

fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}
