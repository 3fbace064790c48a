//! The lowered program and its executor.
//!
//! Composition (see [`crate::compile`]) reduces a template tree to a flat
//! sequence of [`Step`]s: all includes, inlines, blocks, and definitions
//! are already resolved, so executing a program is pure — no I/O, no
//! parsing, just scope management, expression evaluation, and string
//! appends. The same [`Renderer`] can be invoked any number of times and
//! from multiple threads.

mod builtins;
mod eval;
pub(crate) mod runtime;

use std::collections::HashMap;

use crate::ast::expr::Expr;
use crate::ast::value::Value;
use crate::error::{RenderError, SourceLoc};
use runtime::escape_html;

// ── Lowered form ────────────────────────────────────────────────────────

/// One output statement of a compiled template.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Append a literal string (plain text, comments, inlined files, and
    /// statically resolved block content, merged into maximal runs).
    Text(String),
    /// Evaluate and append, HTML-escaped or raw.
    Expr {
        expr: Expr,
        escape: bool,
        loc: SourceLoc,
    },
    /// Evaluate and bind into the current scope.
    Bind {
        name: String,
        expr: Expr,
        loc: SourceLoc,
    },
    /// First truthy arm wins; otherwise the fallback. The whole
    /// construct and each chosen body run in fresh scopes.
    If {
        arms: Vec<Arm>,
        otherwise: Option<Vec<Step>>,
    },
    /// Iterate an array or object, one fresh scope per element.
    Each {
        name: String,
        expr: Expr,
        body: Vec<Step>,
        loc: SourceLoc,
    },
    /// Run the body in a fresh lexical scope (include boundaries).
    Scope(Vec<Step>),
}

/// One `<when>` arm of a lowered conditional.
#[derive(Debug, Clone)]
pub(crate) struct Arm {
    pub expr: Expr,
    pub body: Vec<Step>,
    pub loc: SourceLoc,
}

// ── Scopes ──────────────────────────────────────────────────────────────

/// A lexical scope frame. Lookups walk the frame stack innermost-first;
/// writes always land in the innermost frame, so inner bindings shadow
/// without leaking.
pub(crate) struct ScopeFrame {
    bindings: HashMap<String, Value>,
}

impl ScopeFrame {
    fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    fn set(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }
}

// ── Renderer ────────────────────────────────────────────────────────────

/// The executable produced by [`Compiler::compile`](crate::Compiler::compile).
///
/// Rendering is synchronous and deterministic: identical data produces
/// byte-identical output.
#[derive(Debug)]
pub struct Renderer {
    program: Vec<Step>,
}

impl Renderer {
    pub(crate) fn new(program: Vec<Step>) -> Self {
        Self { program }
    }

    /// Expand the template against a data environment.
    ///
    /// `data` must be [`Value::Object`] (or [`Value::Null`] for none).
    /// Its keys merge over the built-in globals (`encodeURI`, `Math`,
    /// `JSON`, ...); user keys win.
    pub fn render(&self, data: &Value) -> Result<String, RenderError> {
        let mut root = ScopeFrame {
            bindings: builtins::globals(),
        };
        match data {
            Value::Object(map) => {
                for (k, v) in map {
                    root.set(k.clone(), v.clone());
                }
            }
            Value::Null => {}
            other => {
                return Err(RenderError::Data {
                    type_name: other.type_name(),
                });
            }
        }

        let mut pass = RenderPass { scopes: vec![root] };
        let mut out = String::new();
        pass.run(&self.program, &mut out)?;
        Ok(out)
    }
}

// ── Execution ───────────────────────────────────────────────────────────

struct RenderPass {
    scopes: Vec<ScopeFrame>,
}

impl RenderPass {
    fn push_scope(&mut self) {
        self.scopes.push(ScopeFrame::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.scopes.last_mut() {
            frame.set(name.to_string(), value);
        }
    }

    fn eval(&self, expr: &Expr, loc: &SourceLoc) -> Result<Value, RenderError> {
        eval::evaluate(expr, &self.scopes).map_err(|message| RenderError::Expression {
            expr: expr.to_string(),
            message,
            loc: loc.clone(),
        })
    }

    fn run(&mut self, steps: &[Step], out: &mut String) -> Result<(), RenderError> {
        for step in steps {
            match step {
                Step::Text(text) => out.push_str(text),

                Step::Expr { expr, escape, loc } => {
                    let value = self.eval(expr, loc)?;
                    let text = value.to_output_string();
                    if *escape {
                        out.push_str(&escape_html(&text));
                    } else {
                        out.push_str(&text);
                    }
                }

                Step::Bind { name, expr, loc } => {
                    let value = self.eval(expr, loc)?;
                    self.bind(name, value);
                }

                Step::If { arms, otherwise } => {
                    self.push_scope();
                    let result = self.run_if(arms, otherwise.as_deref(), out);
                    self.pop_scope();
                    result?;
                }

                Step::Each {
                    name,
                    expr,
                    body,
                    loc,
                } => {
                    let value = self.eval(expr, loc)?;
                    self.each(value, name, body, loc, out)?;
                }

                Step::Scope(body) => {
                    self.push_scope();
                    let result = self.run(body, out);
                    self.pop_scope();
                    result?;
                }
            }
        }
        Ok(())
    }

    fn run_if(
        &mut self,
        arms: &[Arm],
        otherwise: Option<&[Step]>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        for arm in arms {
            if self.eval(&arm.expr, &arm.loc)?.is_truthy() {
                self.push_scope();
                let result = self.run(&arm.body, out);
                self.pop_scope();
                return result;
            }
        }
        if let Some(body) = otherwise {
            self.push_scope();
            let result = self.run(body, out);
            self.pop_scope();
            result?;
        }
        Ok(())
    }

    /// The iteration primitive behind `<each:name in='...'>`.
    ///
    /// Null iterates zero times. Arrays iterate in natural order, objects
    /// in code-point ascending key order. Each element runs in a fresh
    /// scope with `name`, `name_index`, `name_key`, `name_last`, and
    /// `name_has_next` bound.
    fn each(
        &mut self,
        value: Value,
        name: &str,
        body: &[Step],
        loc: &SourceLoc,
        out: &mut String,
    ) -> Result<(), RenderError> {
        match value {
            Value::Null => Ok(()),

            Value::Array(items) => {
                let len = items.len();
                for (i, item) in items.into_iter().enumerate() {
                    let key = Value::from(i);
                    self.iteration(name, item, key.clone(), key, i + 1 == len, body, out)?;
                }
                Ok(())
            }

            Value::Object(map) => {
                let len = map.len();
                for (i, (key, item)) in map.into_iter().enumerate() {
                    let key = Value::String(key);
                    self.iteration(name, item, key.clone(), key, i + 1 == len, body, out)?;
                }
                Ok(())
            }

            other => Err(RenderError::NonIterable {
                type_name: other.type_name(),
                loc: loc.clone(),
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn iteration(
        &mut self,
        name: &str,
        item: Value,
        index: Value,
        key: Value,
        last: bool,
        body: &[Step],
        out: &mut String,
    ) -> Result<(), RenderError> {
        self.push_scope();
        self.bind(name, item);
        self.bind(&format!("{name}_index"), index);
        self.bind(&format!("{name}_key"), key);
        self.bind(&format!("{name}_last"), Value::Bool(last));
        self.bind(&format!("{name}_has_next"), Value::Bool(!last));
        let result = self.run(body, out);
        self.pop_scope();
        result
    }
}
