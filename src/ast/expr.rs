use std::fmt;

use super::span::Spanned;
use super::value::Value;

pub type Expr = Spanned<ExprKind>;

/// The expression sub-language evaluated inside `#{...}`, `!{...}`,
/// `<var:>` bodies, and the `expr`/`in` attributes of `<if>`, `<when>`,
/// and `<each:>`.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Literal value: "hello", 42, true, null
    Literal(Value),

    /// Bare identifier, resolved against the scope chain: `user`
    Ident(String),

    /// Property access: `user.name`
    Member {
        object: Box<Expr>,
        property: String,
    },

    /// Computed access: `users[0]`, `row[key]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },

    /// Function call: `encodeURIComponent(q)`, `Math.floor(n)`
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },

    /// Unary operation: `!done`, `-n`
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation: `a == b`, `a + b`
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Comparison
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // Logical
    And,
    Or,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

// Source-shaped reconstruction, used by diagnostics so that a render-time
// failure can quote the expression it came from.

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Literal(Value::String(s)) => write!(f, "\"{s}\""),
            ExprKind::Literal(Value::Null) => write!(f, "null"),
            ExprKind::Literal(v) => write!(f, "{}", v.to_output_string()),
            ExprKind::Ident(name) => write!(f, "{name}"),
            ExprKind::Member { object, property } => write!(f, "{object}.{property}"),
            ExprKind::Index { object, index } => write!(f, "{object}[{index}]"),
            ExprKind::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            ExprKind::Unary { op, operand } => {
                let sym = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                };
                write!(f, "{sym}{operand}")
            }
            ExprKind::Binary { left, op, right } => {
                write!(f, "{left} {} {right}", op.symbol())
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}
