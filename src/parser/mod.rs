//! Template parser, built on [pest](https://pest.rs/).
//!
//! The grammar is defined in `zenmill.pest`. This module converts pest's
//! parse tree into the typed AST defined in [`crate::ast`]. Embedded
//! expressions (interpolations, `<var:>` bodies, `expr`/`in` attributes)
//! are parsed here as well, so a compiled template never re-parses
//! anything at render time.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::ast::expr::{BinOp, Expr, ExprKind, UnaryOp};
use crate::ast::node::{DefMode, Node, NodeKind, When};
use crate::ast::span::{Span, Spanned};
use crate::ast::value::Value;
use crate::error::SyntaxError;

#[derive(Parser)]
#[grammar = "parser/zenmill.pest"]
struct ZenParser;

/// Parse template source into a node sequence.
///
/// Returns a [`SyntaxError`] carrying the farthest-reached failure
/// position and the set of productions expected there.
pub fn parse(source: &str) -> Result<Vec<Node>, SyntaxError> {
    let lm = LineMap::new(source);
    let mut pairs = ZenParser::parse(Rule::template, source)
        .map_err(|e| syntax_error(&e, source, 0, source, &lm))?;

    let template = pairs.next().unwrap();
    let mut nodes = Vec::new();
    for pair in template.into_inner() {
        if pair.as_rule() == Rule::EOI {
            break;
        }
        nodes.push(build_node(pair, source, &lm)?);
    }
    Ok(nodes)
}

/// Parse a standalone expression string.
///
/// This is the entry point the template parser uses for every embedded
/// expression; exposed for tooling and tests.
pub fn parse_expr(source: &str) -> Result<Expr, SyntaxError> {
    let lm = LineMap::new(source);
    build_expression(source, 0, source, &lm)
}

// ── Line/column tracking ────────────────────────────────────────────────

/// Byte offsets of line starts. Line breaks: LF, CR, CRLF, U+2028, U+2029.
struct LineMap {
    starts: Vec<usize>,
}

impl LineMap {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        let mut chars = source.char_indices().peekable();
        while let Some((i, ch)) = chars.next() {
            match ch {
                '\r' => {
                    if let Some((j, '\n')) = chars.peek().copied() {
                        chars.next();
                        starts.push(j + 1);
                    } else {
                        starts.push(i + 1);
                    }
                }
                '\n' | '\u{2028}' | '\u{2029}' => starts.push(i + ch.len_utf8()),
                _ => {}
            }
        }
        Self { starts }
    }

    /// 1-based (line, column) of a byte offset. Column counts characters.
    fn line_col(&self, source: &str, offset: usize) -> (u32, u32) {
        let line_idx = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.starts[line_idx];
        let column = source[line_start..offset.min(source.len())].chars().count() + 1;
        ((line_idx + 1) as u32, column as u32)
    }
}

// ── Template building ───────────────────────────────────────────────────

fn make_span(pair: &Pair<Rule>, base: usize, coord_src: &str, lm: &LineMap) -> Span {
    let s = pair.as_span();
    let start = base + s.start();
    let (line, column) = lm.line_col(coord_src, start);
    Span::new(start, base + s.end(), line, column)
}

fn build_node(pair: Pair<Rule>, source: &str, lm: &LineMap) -> Result<Node, SyntaxError> {
    let span = make_span(&pair, 0, source, lm);

    let kind = match pair.as_rule() {
        Rule::plain => NodeKind::Plain(pair.as_str().to_string()),

        Rule::comment => {
            let body = pair.into_inner().next().unwrap();
            NodeKind::Comment(body.as_str().to_string())
        }

        Rule::esc_interp | Rule::dollar_interp => {
            let expr = embedded_expr(&pair.into_inner().next().unwrap(), source, lm)?;
            NodeKind::Expr { expr, escape: true }
        }
        Rule::raw_interp => {
            let expr = embedded_expr(&pair.into_inner().next().unwrap(), source, lm)?;
            NodeKind::Expr {
                expr,
                escape: false,
            }
        }

        Rule::include => {
            let mut inner = pair.into_inner();
            let (file, _) = attr_value(inner.next().unwrap());
            let mut children = Vec::new();
            for child in inner {
                children.push(build_node(child, source, lm)?);
            }
            NodeKind::Include { file, children }
        }

        Rule::inline => {
            let (file, _) = attr_value(pair.into_inner().next().unwrap());
            match file.strip_prefix('!') {
                Some(raw) => NodeKind::Inline {
                    file: raw.to_string(),
                    escape: false,
                },
                None => NodeKind::Inline { file, escape: true },
            }
        }

        Rule::block_self => {
            let name = pair.into_inner().next().unwrap().as_str().to_string();
            NodeKind::Block {
                name,
                nodes: Vec::new(),
            }
        }
        Rule::block_named => {
            let mut inner = pair.into_inner();
            let name = inner.next().unwrap().as_str().to_string();
            let nodes = build_nodes(inner, source, lm)?;
            NodeKind::Block { name, nodes }
        }

        Rule::def_block | Rule::append_block | Rule::prepend_block => {
            let mode = match pair.as_rule() {
                Rule::def_block => DefMode::Replace,
                Rule::append_block => DefMode::Append,
                _ => DefMode::Prepend,
            };
            let mut inner = pair.into_inner();
            let name = inner.next().unwrap().as_str().to_string();
            let nodes = build_nodes(inner, source, lm)?;
            NodeKind::Def { name, mode, nodes }
        }

        Rule::var_node => {
            let mut inner = pair.into_inner();
            let name = inner.next().unwrap().as_str().to_string();
            let expr = embedded_expr(&inner.next().unwrap(), source, lm)?;
            NodeKind::Var { name, expr }
        }

        Rule::if_simple => {
            let mut inner = pair.into_inner();
            let expr = attr_expr(inner.next().unwrap(), source, lm)?;
            let nodes = build_nodes(inner, source, lm)?;
            NodeKind::If {
                whens: vec![When { expr, nodes, span }],
                otherwise: None,
            }
        }

        Rule::if_compound => {
            let mut whens = Vec::new();
            let mut otherwise = None;
            for child in pair.into_inner() {
                match child.as_rule() {
                    Rule::when_node => {
                        let when_span = make_span(&child, 0, source, lm);
                        let mut inner = child.into_inner();
                        let expr = attr_expr(inner.next().unwrap(), source, lm)?;
                        let nodes = build_nodes(inner, source, lm)?;
                        whens.push(When {
                            expr,
                            nodes,
                            span: when_span,
                        });
                    }
                    Rule::otherwise_node => {
                        otherwise = Some(build_nodes(child.into_inner(), source, lm)?);
                    }
                    other => unreachable!("unexpected rule in <if>: {other:?}"),
                }
            }
            NodeKind::If { whens, otherwise }
        }

        Rule::each_block => {
            let mut inner = pair.into_inner();
            let name = inner.next().unwrap().as_str().to_string();
            let expr = attr_expr(inner.next().unwrap(), source, lm)?;
            let nodes = build_nodes(inner, source, lm)?;
            NodeKind::Each { name, expr, nodes }
        }

        other => unreachable!("unexpected rule in node position: {other:?}"),
    };

    Ok(Spanned::new(kind, span))
}

fn build_nodes<'a>(
    pairs: impl Iterator<Item = Pair<'a, Rule>>,
    source: &str,
    lm: &LineMap,
) -> Result<Vec<Node>, SyntaxError> {
    let mut nodes = Vec::new();
    for pair in pairs {
        nodes.push(build_node(pair, source, lm)?);
    }
    Ok(nodes)
}

/// Extract the raw content of an `attr_val` pair and its byte offset in
/// the template source.
fn attr_value(pair: Pair<Rule>) -> (String, usize) {
    let inner = pair.into_inner().next().unwrap();
    (inner.as_str().to_string(), inner.as_span().start())
}

/// Parse the content of an `expr="..."` / `in="..."` attribute as an
/// expression, keeping template coordinates.
fn attr_expr(pair: Pair<Rule>, source: &str, lm: &LineMap) -> Result<Expr, SyntaxError> {
    let inner = pair.into_inner().next().unwrap();
    let base = inner.as_span().start();
    build_expression(inner.as_str(), base, source, lm)
}

/// Parse an `expr_text` pair as an expression, keeping template
/// coordinates.
fn embedded_expr(pair: &Pair<Rule>, source: &str, lm: &LineMap) -> Result<Expr, SyntaxError> {
    build_expression(pair.as_str(), pair.as_span().start(), source, lm)
}

// ── Expression building ─────────────────────────────────────────────────

fn build_expression(
    expr_src: &str,
    base: usize,
    coord_src: &str,
    lm: &LineMap,
) -> Result<Expr, SyntaxError> {
    let mut pairs = ZenParser::parse(Rule::expression, expr_src)
        .map_err(|e| syntax_error(&e, expr_src, base, coord_src, lm))?;
    let expression = pairs.next().unwrap();
    let root = expression.into_inner().next().unwrap();
    build_expr_pair(root, base, coord_src, lm)
}

fn build_expr_pair(
    pair: Pair<Rule>,
    base: usize,
    coord_src: &str,
    lm: &LineMap,
) -> Result<Expr, SyntaxError> {
    let span = make_span(&pair, base, coord_src, lm);

    match pair.as_rule() {
        Rule::or_expr | Rule::and_expr | Rule::cmp_expr | Rule::add_expr | Rule::mul_expr => {
            let mut inner = pair.into_inner();
            let mut left = build_expr_pair(inner.next().unwrap(), base, coord_src, lm)?;
            while let Some(op_pair) = inner.next() {
                let op = bin_op(op_pair.as_str());
                let right = build_expr_pair(inner.next().unwrap(), base, coord_src, lm)?;
                let merged = left.span.merge(right.span);
                left = Spanned::new(
                    ExprKind::Binary {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    },
                    merged,
                );
            }
            Ok(left)
        }

        Rule::unary_expr => {
            let mut ops = Vec::new();
            let mut operand = None;
            for child in pair.into_inner() {
                match child.as_rule() {
                    Rule::unary_op => ops.push(match child.as_str() {
                        "!" => UnaryOp::Not,
                        _ => UnaryOp::Neg,
                    }),
                    _ => operand = Some(build_expr_pair(child, base, coord_src, lm)?),
                }
            }
            let mut expr = operand.unwrap();
            for op in ops.into_iter().rev() {
                expr = Spanned::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(expr),
                    },
                    span,
                );
            }
            Ok(expr)
        }

        Rule::postfix_expr => {
            let mut inner = pair.into_inner();
            let mut expr = build_expr_pair(inner.next().unwrap(), base, coord_src, lm)?;
            for post in inner {
                let post_span = expr.span.merge(make_span(&post, base, coord_src, lm));
                let kind = match post.as_rule() {
                    Rule::member => {
                        let property = post.into_inner().next().unwrap().as_str().to_string();
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                        }
                    }
                    Rule::index => {
                        let idx = build_expr_pair(post.into_inner().next().unwrap(), base, coord_src, lm)?;
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(idx),
                        }
                    }
                    Rule::call_args => {
                        let mut args = Vec::new();
                        for arg in post.into_inner() {
                            args.push(build_expr_pair(arg, base, coord_src, lm)?);
                        }
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        }
                    }
                    other => unreachable!("unexpected postfix rule: {other:?}"),
                };
                expr = Spanned::new(kind, post_span);
            }
            Ok(expr)
        }

        Rule::paren => build_expr_pair(pair.into_inner().next().unwrap(), base, coord_src, lm),

        Rule::number => {
            let n: f64 = pair.as_str().parse().map_err(|_| SyntaxError {
                line: span.line,
                column: span.column,
                expected: vec!["number".into()],
                found: format!("`{}`", pair.as_str()),
                message: format!("invalid number: {}", pair.as_str()),
            })?;
            Ok(Spanned::new(ExprKind::Literal(Value::Number(n)), span))
        }

        Rule::string_lit => {
            let content = pair.into_inner().next().unwrap().as_str().to_string();
            Ok(Spanned::new(
                ExprKind::Literal(Value::String(content)),
                span,
            ))
        }

        Rule::bool_lit => Ok(Spanned::new(
            ExprKind::Literal(Value::Bool(pair.as_str() == "true")),
            span,
        )),

        Rule::null_lit => Ok(Spanned::new(ExprKind::Literal(Value::Null), span)),

        Rule::ident => Ok(Spanned::new(
            ExprKind::Ident(pair.as_str().to_string()),
            span,
        )),

        other => unreachable!("unexpected rule in expression position: {other:?}"),
    }
}

fn bin_op(symbol: &str) -> BinOp {
    match symbol {
        "==" => BinOp::Eq,
        "!=" => BinOp::NotEq,
        "<" => BinOp::Lt,
        ">" => BinOp::Gt,
        "<=" => BinOp::LtEq,
        ">=" => BinOp::GtEq,
        "&&" => BinOp::And,
        "||" => BinOp::Or,
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "%" => BinOp::Rem,
        other => unreachable!("unknown operator: {other}"),
    }
}

// ── Error mapping ───────────────────────────────────────────────────────

fn syntax_error(
    e: &pest::error::Error<Rule>,
    parsed_src: &str,
    base: usize,
    coord_src: &str,
    lm: &LineMap,
) -> SyntaxError {
    let rel = match e.location {
        pest::error::InputLocation::Pos(p) => p,
        pest::error::InputLocation::Span((s, _)) => s,
    };
    let (line, column) = lm.line_col(coord_src, base + rel);
    let expected = match &e.variant {
        pest::error::ErrorVariant::ParsingError { positives, .. } => {
            positives.iter().map(|r| rule_label(*r)).collect()
        }
        pest::error::ErrorVariant::CustomError { message } => vec![message.clone()],
    };
    let found = if rel >= parsed_src.len() {
        "end of input".to_string()
    } else {
        let snippet: String = parsed_src[rel..].chars().take(24).collect();
        format!("`{snippet}`")
    };
    let message = if expected.is_empty() {
        "unexpected input".to_string()
    } else {
        format!("expected {}", expected.join(", "))
    };
    SyntaxError {
        line,
        column,
        expected,
        found,
        message,
    }
}


fn rule_label(rule: Rule) -> String {
    match rule {
        Rule::EOI => "end of input".into(),
        Rule::plain => "text".into(),
        Rule::name => "name".into(),
        Rule::attr_val => "quoted attribute value".into(),
        Rule::comment => "<!-- comment -->".into(),
        Rule::include => "<include>".into(),
        Rule::inline => "<inline>".into(),
        Rule::block_self | Rule::block_named => "<block:name>".into(),
        Rule::def_block => "<def:name>".into(),
        Rule::append_block => "<append:name>".into(),
        Rule::prepend_block => "<prepend:name>".into(),
        Rule::var_node => "<var:name>".into(),
        Rule::if_simple | Rule::if_compound => "<if>".into(),
        Rule::when_node => "<when>".into(),
        Rule::otherwise_node => "<otherwise>".into(),
        Rule::each_block => "<each:name>".into(),
        Rule::esc_interp => "#{expression}".into(),
        Rule::raw_interp => "!{expression}".into(),
        Rule::dollar_interp => "${expression}".into(),
        Rule::expr_text => "expression".into(),
        Rule::or_expr | Rule::and_expr | Rule::cmp_expr | Rule::add_expr | Rule::mul_expr
        | Rule::unary_expr | Rule::postfix_expr => "expression".into(),
        Rule::number => "number".into(),
        Rule::string_lit => "string".into(),
        Rule::ident => "identifier".into(),
        Rule::WS => "whitespace".into(),
        other => format!("{other:?}"),
    }
}
