//! EHTML Code Generator
//!
//! Turns a parsed template into template script and runs it. Markup is
//! normalized and merged into static strings, directives become script,
//! custom elements become `renderCustom` calls.
//!
//! ```text
//! source → parse() → Document → transformer → reduce() → [Instruction]
//!        → generate() → template script → Program → render()
//! ```
//!
//! ```
//! use ehtml_codegen::{compile, Options, Value};
//!
//! let options = Options::new().vars(["user"]);
//! let template = compile("<p>Hi <%= user %></p>", &options).unwrap();
//! let html = template
//!     .render(&Value::object([("user", Value::from("<Ann>"))]))
//!     .unwrap();
//! assert_eq!(html, "<p>Hi &lt;Ann&gt;</p>");
//! ```

pub mod builder;
mod custom;
pub mod escape;
pub mod generate;
pub mod options;
pub mod reduce;
pub mod source_map;
pub mod template;

pub use builder::{Built, CodeBuilder};
pub use ehtml_parser::{parse, Document, SyntaxError};
pub use ehtml_script::{LineCursor, Program, ScriptError, Value};
pub use generate::generate;
pub use options::{Options, Transformer};
pub use reduce::{reduce, Instruction, ReduceError};
pub use template::{
    compile, compile_standalone, render, CompileError, RenderError, Standalone, Template,
};
