//! Error types.
//!
//! Template errors surface when a template is parsed or compiled; render
//! errors surface from the render pass that hit the violation. Neither is
//! recovered from internally.

use thiserror::Error;

use crate::types::Key;

/// Template syntax error with the position of the failure.
///
/// `segment` is the index of the literal segment (the text between two
/// expressions) and `offset` the byte offset inside it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (segment {segment}, offset {offset})")]
pub struct ParseError {
    pub message: String,
    pub segment: usize,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, segment: usize, offset: usize) -> Self {
        Self {
            message: message.into(),
            segment,
            offset,
        }
    }

    /// Render the template source with a caret under the failing column.
    ///
    /// Expressions are printed as `${0}`, `${1}`, ...
    ///
    /// ```text
    /// <div><img>x</img></div>
    ///            ^
    /// Error: Void element 'img' cannot have children.
    /// ```
    pub fn diagnostic(&self, statics: &[&str]) -> String {
        let mut text = String::new();
        let mut column = self.offset;
        for (i, segment) in statics.iter().enumerate() {
            if i > 0 {
                let marker = format!("${{{}}}", i - 1);
                if i <= self.segment {
                    column += marker.len();
                }
                text.push_str(&marker);
            }
            if i < self.segment {
                column += segment.len();
            }
            text.push_str(segment);
        }

        let mut out = String::from("\n");
        let mut remaining = column as isize;
        let mut placed = false;
        for line in text.split('\n') {
            out.push_str(line);
            out.push('\n');
            if !placed && remaining >= 0 && (remaining as usize) <= line.len() {
                out.push_str(&" ".repeat(remaining as usize));
                out.push_str("^\nError: ");
                out.push_str(&self.message);
                out.push('\n');
                placed = true;
            }
            remaining -= line.len() as isize + 1;
        }
        if !placed {
            out.push_str("^\nError: ");
            out.push_str(&self.message);
            out.push('\n');
        }
        out
    }
}

/// Structural errors found while compiling template IR.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("void element <{tag}> cannot have children")]
    VoidElementChildren { tag: String },

    #[error("template block exceeds the limit of {limit} {what}")]
    LimitExceeded { what: &'static str, limit: usize },

    #[error("conflicting bindings for `{name}` on <{tag}>")]
    ConflictingBinding { tag: String, name: String },
}

/// Anything that can go wrong turning template source into a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("invalid template: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid template: {0}")]
    Compile(#[from] CompileError),
}

/// Invariant violations detected while reconciling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("duplicate key {key} among siblings")]
    DuplicateKey { key: Key },

    #[error("keyed list entry {index} has no key")]
    NotKeyed { index: usize },

    #[error("keyed op with key {key} used outside a keyed list")]
    KeyOutsideList { key: Key },

    #[error("{wrapper} requires a single DOM node, found {found}")]
    MultiRoot { wrapper: &'static str, found: usize },

    #[error("void element <{tag}> cannot have children")]
    VoidChildren { tag: String },

    #[error("template expects {expected} values, got {found}")]
    ValueCount { expected: usize, found: usize },

    #[error("unknown root {0}")]
    UnknownRoot(usize),
}
