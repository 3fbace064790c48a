//! Error types for compilation and rendering.
//!
//! [`SyntaxError`] is produced by the parser and carries line/column plus
//! the set of productions expected at the failure position.
//! [`CompileError`] covers everything that can go wrong while building a
//! renderer (parsing, loading, path resolution); [`RenderError`] covers
//! failures while executing one. [`Error`] combines both for the
//! one-shot convenience API.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Failure type loaders may return. Propagated verbatim with the
/// attempted path attached (see [`CompileError::Load`]).
pub type LoadFailure = Box<dyn std::error::Error + Send + Sync>;

// ── Parse errors ────────────────────────────────────────────────────────

/// A syntax diagnostic with the farthest-reached failure position and the
/// productions that were expected there.
#[derive(Debug, Clone, Error)]
#[error("{message} at line {line}, column {column} (found {found})")]
pub struct SyntaxError {
    /// 1-based line of the failure. Line breaks: LF, CR, CRLF, U+2028,
    /// U+2029.
    pub line: u32,
    /// 1-based column (characters) of the failure.
    pub column: u32,
    /// Names of the productions that could have matched here.
    pub expected: Vec<String>,
    /// Snippet of the input at the failure position, or `"end of input"`.
    pub found: String,
    pub message: String,
}

// ── Compile errors ──────────────────────────────────────────────────────

/// An error produced while compiling a template into a renderer.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The template source failed to parse.
    #[error("in {path}: {source}")]
    Syntax {
        path: String,
        #[source]
        source: SyntaxError,
    },

    /// The loader failed for a path. The underlying error is preserved
    /// unchanged as the source of this one.
    #[error("failed to load {path}")]
    Load {
        path: String,
        #[source]
        source: LoadFailure,
    },

    /// Path normalization produced a path above the logical root.
    #[error("path escapes the template root: {path}")]
    OutOfScope { path: String },
}

// ── Render errors ───────────────────────────────────────────────────────

/// Source position carried into the lowered program so render-time
/// diagnostics can point back at the template.
#[derive(Debug, Clone)]
pub struct SourceLoc {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// An error produced while rendering a compiled template.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// `<each:>` was given a value that is neither an array, an object,
    /// nor null.
    #[error("cannot iterate over {type_name} at {loc}")]
    NonIterable {
        type_name: &'static str,
        loc: SourceLoc,
    },

    /// An expression failed to evaluate.
    #[error("expression `{expr}` failed at {loc}: {message}")]
    Expression {
        expr: String,
        message: String,
        loc: SourceLoc,
    },

    /// The render data environment was not an object (or null).
    #[error("render data must be an object, got {type_name}")]
    Data { type_name: &'static str },
}

// ── Combined ────────────────────────────────────────────────────────────

/// Combined error type returned by [`Compiler::render`](crate::Compiler::render).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
