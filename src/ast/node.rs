use super::expr::Expr;
use super::span::{Span, Spanned};

pub type Node = Spanned<NodeKind>;

/// One element of a parsed template.
///
/// A template is a flat sequence of nodes whose composed outputs are
/// concatenated to produce the final document. Composition-time constructs
/// (`Include`, `Inline`, `Def`, `Block`) are resolved while compiling;
/// the rest survive into the lowered program and execute per render.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Raw text between recognized constructs, emitted verbatim.
    Plain(String),

    /// `<!-- ... -->`. Emitted as-is unless comment stripping is enabled.
    Comment(String),

    /// Interpolation: `#{expr}` (HTML-escaped) or `!{expr}` (raw).
    Expr { expr: Expr, escape: bool },

    /// `<var:name>expr</var:name>` — binds `name` in the current scope.
    Var { name: String, expr: Expr },

    /// `<include file='...'>` — static composition site. Children are
    /// `Def` nodes, possibly mixed with `Var` nodes.
    Include { file: String, children: Vec<Node> },

    /// `<inline file='...'/>` — verbatim file insertion, HTML-escaped
    /// unless the attribute value began with `!`.
    Inline { file: String, escape: bool },

    /// `<def:name>`, `<append:name>`, `<prepend:name>` — a block
    /// override carried by an include site.
    Def {
        name: String,
        mode: DefMode,
        nodes: Vec<Node>,
    },

    /// `<block:name>` — a named placeholder with a default body.
    Block { name: String, nodes: Vec<Node> },

    /// `<if>` — one or more `<when>` arms plus an optional
    /// `<otherwise>`. The standalone `<if expr='...'>` form parses as a
    /// single arm with no otherwise.
    If {
        whens: Vec<When>,
        otherwise: Option<Vec<Node>>,
    },

    /// `<each:name in='expr'>` — iteration over an array or object.
    Each {
        name: String,
        expr: Expr,
        nodes: Vec<Node>,
    },
}

/// How a definition combines with an existing one (or with the block's
/// default body).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefMode {
    Replace,
    Append,
    Prepend,
}

/// One arm of an `<if>` compound.
#[derive(Debug, Clone)]
pub struct When {
    pub expr: Expr,
    pub nodes: Vec<Node>,
    pub span: Span,
}
