//! Error types.
//!
//! Everything that can go wrong while evaluating or emitting a stylesheet is
//! a [`LessError`].  The error carries a coarse [`ErrorKind`] plus the offset
//! and file the offending node came from; the public facade fills in line and
//! column from the source text it owns.

use std::fmt;
use std::rc::Rc;

use crate::node::FileInfo;

/// Classification of a [`LessError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised by the external parser, passed through unchanged.
    Parse,

    /// Undefined variable or property.
    Name,

    /// Invalid operand types, NaN, or a unit mismatch under strict units.
    Operation,

    /// Structural violation discovered during evaluation, e.g. `default()`
    /// outside a mixin guard.
    Syntax,

    /// Import resolution failure or a circular import.
    Import,

    /// Function-call failure, host error, or guard evaluation failure.
    Runtime,

    /// Mixin or function arity / binding mismatch.
    Argument,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ErrorKind::Parse => write!(f, "ParseError"),
            ErrorKind::Name => write!(f, "NameError"),
            ErrorKind::Operation => write!(f, "OperationError"),
            ErrorKind::Syntax => write!(f, "SyntaxError"),
            ErrorKind::Import => write!(f, "ImportError"),
            ErrorKind::Runtime => write!(f, "RuntimeError"),
            ErrorKind::Argument => write!(f, "ArgumentError"),
        }
    }
}

/// An error produced while compiling a stylesheet.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", format_error(.kind, .message, .filename, .line, .column))]
pub struct LessError {
    pub kind: ErrorKind,
    pub message: String,

    /// Byte offset of the originating node in its source file.
    pub index: Option<usize>,

    pub filename: Option<String>,

    /// 1-based; filled in at the facade, which owns the source text.
    pub line: Option<usize>,

    /// 0-based column within `line`.
    pub column: Option<usize>,
}

fn format_error(
    kind: &ErrorKind,
    message: &str,
    filename: &Option<String>,
    line: &Option<usize>,
    column: &Option<usize>,
) -> String {
    let mut out = format!("{kind}: {message}");

    if let Some(filename) = filename {
        out.push_str(&format!(" in {filename}"));
    }

    match (line, column) {
        (Some(line), Some(column)) => out.push_str(&format!(" on line {line}, column {column}")),
        (Some(line), None) => out.push_str(&format!(" on line {line}")),
        _ => {}
    }
    out
}

impl LessError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> LessError {
        LessError {
            kind,
            message: message.into(),
            index: None,
            filename: None,
            line: None,
            column: None,
        }
    }

    /// Attaches the location of the node the error originated from.
    ///
    /// An error that already carries a location keeps it; wrappers higher up
    /// the evaluation stack must not clobber the innermost diagnostic.
    pub fn at(mut self, index: usize, file_info: &Rc<FileInfo>) -> LessError {
        if self.index.is_none() {
            self.index = Some(index);
        }
        if self.filename.is_none() && !file_info.filename.is_empty() {
            self.filename = Some(file_info.filename.clone());
        }
        self
    }

    /// Prepends call-site context to the message, keeping kind and location.
    pub fn with_prefix(mut self, prefix: &str) -> LessError {
        self.message = format!("{prefix}{}", self.message);
        self
    }

    pub fn name(message: impl Into<String>) -> LessError {
        LessError::new(ErrorKind::Name, message)
    }

    pub fn operation(message: impl Into<String>) -> LessError {
        LessError::new(ErrorKind::Operation, message)
    }

    pub fn syntax(message: impl Into<String>) -> LessError {
        LessError::new(ErrorKind::Syntax, message)
    }

    pub fn import(message: impl Into<String>) -> LessError {
        LessError::new(ErrorKind::Import, message)
    }

    pub fn runtime(message: impl Into<String>) -> LessError {
        LessError::new(ErrorKind::Runtime, message)
    }

    pub fn argument(message: impl Into<String>) -> LessError {
        LessError::new(ErrorKind::Argument, message)
    }
}

pub type Result<T> = std::result::Result<T, LessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_location() {
        let mut err = LessError::name("variable @a is undefined");
        err.filename = Some("main.less".to_string());
        err.line = Some(3);
        err.column = Some(7);

        assert_eq!(
            err.to_string(),
            "NameError: variable @a is undefined in main.less on line 3, column 7"
        );
    }

    #[test]
    fn at_does_not_clobber_inner_location() {
        let fi = Rc::new(FileInfo::named("outer.less"));
        let mut err = LessError::runtime("boom");
        err.index = Some(10);
        err.filename = Some("inner.less".to_string());

        let err = err.at(99, &fi);
        assert_eq!(err.index, Some(10));
        assert_eq!(err.filename.as_deref(), Some("inner.less"));
    }
}
