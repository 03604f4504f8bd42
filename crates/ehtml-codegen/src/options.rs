//! Compile options.

use std::fmt;
use std::sync::Arc;

use ehtml_parser::Document;
use serde::Deserialize;

/// Tree rewrite hook run between parsing and reduction.
pub type Transformer = Arc<dyn Fn(&mut Document) + Send + Sync>;

/// Options for a single compile.
///
/// All fields have defaults, so a partial JSON object deserializes:
///
/// ```
/// let options: ehtml_codegen::Options =
///     serde_json::from_str(r#"{"filename": "page.ehtml", "vars": ["user"]}"#).unwrap();
/// assert!(options.compile_debug);
/// assert_eq!(options.vars, ["user"]);
/// ```
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Emit line markers and report render errors with a source excerpt.
    pub compile_debug: bool,
    /// Used in diagnostics and source maps.
    pub filename: String,
    #[serde(skip)]
    pub transformer: Option<Transformer>,
    /// Emit the `"use strict"` prologue.
    pub strict_mode: bool,
    /// Context fields bound as plain variables.
    pub vars: Vec<String>,
    /// Track positions for a source map.
    pub source_map: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            compile_debug: true,
            filename: "ejs".into(),
            transformer: None,
            strict_mode: true,
            vars: Vec::new(),
            source_map: false,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("compile_debug", &self.compile_debug)
            .field("filename", &self.filename)
            .field("transformer", &self.transformer.as_ref().map(|_| "Fn"))
            .field("strict_mode", &self.strict_mode)
            .field("vars", &self.vars)
            .field("source_map", &self.source_map)
            .finish()
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_debug(mut self, compile_debug: bool) -> Self {
        self.compile_debug = compile_debug;
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn transformer(mut self, transformer: impl Fn(&mut Document) + Send + Sync + 'static) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }

    pub fn strict_mode(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    pub fn vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vars = vars.into_iter().map(Into::into).collect();
        self
    }

    pub fn source_map(mut self, source_map: bool) -> Self {
        self.source_map = source_map;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(options.compile_debug);
        assert!(options.strict_mode);
        assert!(!options.source_map);
        assert_eq!(options.filename, "ejs");
        assert!(options.vars.is_empty());
        assert!(options.transformer.is_none());
    }

    #[test]
    fn test_builder() {
        let options = Options::new()
            .filename("page.ehtml")
            .vars(["a", "b"])
            .compile_debug(false)
            .source_map(true)
            .transformer(|doc| doc.nodes.clear());
        assert_eq!(options.filename, "page.ehtml");
        assert_eq!(options.vars, vec!["a".to_string(), "b".to_string()]);
        assert!(!options.compile_debug);
        assert!(options.source_map);
        assert!(options.transformer.is_some());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let options: Options =
            serde_json::from_str(r#"{"compileDebug": false, "strictMode": false, "sourceMap": true}"#)
                .unwrap();
        assert!(!options.compile_debug);
        assert!(!options.strict_mode);
        assert!(options.source_map);
        assert_eq!(options.filename, "ejs");
    }

    #[test]
    fn test_debug_hides_transformer() {
        let options = Options::new().transformer(|_| {});
        assert!(format!("{options:?}").contains("transformer: Some(\"Fn\")"));
    }
}
