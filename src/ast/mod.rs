//! Typed AST for parsed templates.
//!
//! [`node`] holds the template-level tree produced by the parser,
//! [`expr`] the expression sub-language embedded in interpolations and
//! attributes, [`value`] the runtime data model, and [`span`] the source
//! locations carried by every node.

pub mod expr;
pub mod node;
pub mod span;
pub mod value;

pub use expr::{BinOp, Expr, ExprKind, UnaryOp};
pub use node::{DefMode, Node, NodeKind, When};
pub use span::{Span, Spanned};
pub use value::{Builtin, BuiltinFn, Value};
