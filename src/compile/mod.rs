//! Compilation: loading, caching, and static composition.
//!
//! A [`Job`] is one compilation. It owns the per-job caches (source text
//! and parsed ASTs, keyed by normalized logical path) and walks the root
//! template's tree, resolving `<include>`, `<inline>`, `<block:>`, and
//! definitions into the flat [`Step`] program executed at render time.
//!
//! The walk is a recursive async routine, but the only awaits in it are
//! loader awaits: everything between loads runs synchronously. A loader
//! failure aborts the job; no further loads are issued.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, trace};

use crate::Options;
use crate::ast::node::{DefMode, Node, NodeKind};
use crate::ast::span::Span;
use crate::error::{CompileError, SourceLoc};
use crate::loader::Loader;
use crate::parser;
use crate::path;
use crate::render::runtime::escape_html;
use crate::render::{Arm, Renderer, Step};

/// One compilation invocation. Single-shot by construction: created,
/// run, and dropped inside [`Compiler::compile`](crate::Compiler::compile),
/// so its caches can never leak across compilations.
pub(crate) struct Job<'a> {
    loader: &'a dyn Loader,
    options: Options,
    sources: HashMap<String, Arc<str>>,
    asts: HashMap<String, Arc<Vec<Node>>>,
}

/// A composition context frame, pushed at every include boundary.
///
/// Definition lookup walks the `parent` chain innermost-first, which is
/// what lets a def supplied by an outer page satisfy a block declared by
/// an inner layout.
struct Frame<'p> {
    /// The file currently being processed; relative references resolve
    /// against its directory.
    file: Arc<str>,
    defs: HashMap<String, DefEntry>,
    parent: Option<&'p Frame<'p>>,
}

#[derive(Clone)]
struct DefEntry {
    mode: DefMode,
    body: Vec<Step>,
}

impl Frame<'_> {
    fn lookup(&self, name: &str) -> Option<&DefEntry> {
        let mut current = Some(self);
        while let Some(frame) = current {
            if let Some(entry) = frame.defs.get(name) {
                return Some(entry);
            }
            current = frame.parent;
        }
        None
    }
}

impl<'a> Job<'a> {
    pub(crate) fn new(loader: &'a dyn Loader, options: Options) -> Self {
        Self {
            loader,
            options,
            sources: HashMap::new(),
            asts: HashMap::new(),
        }
    }

    pub(crate) async fn run(mut self, root: &str) -> Result<Renderer, CompileError> {
        let root_path = path::local_path("", root)?;
        debug!(root = %root_path, "compiling template");
        let ast = self.template(&root_path).await?;
        let mut frame = Frame {
            file: Arc::from(root_path.as_str()),
            defs: HashMap::new(),
            parent: None,
        };
        let program = self.lower(ast.as_slice(), &mut frame).await?;
        Ok(Renderer::new(program))
    }

    /// Load raw content, once per normalized path per job.
    async fn source(&mut self, file: &str) -> Result<Arc<str>, CompileError> {
        if let Some(cached) = self.sources.get(file) {
            trace!(path = %file, "source cache hit");
            return Ok(cached.clone());
        }
        debug!(path = %file, "loading");
        let text = self
            .loader
            .load(file)
            .await
            .map_err(|source| CompileError::Load {
                path: file.to_string(),
                source,
            })?;
        let content: Arc<str> = Arc::from(text);
        self.sources.insert(file.to_string(), content.clone());
        Ok(content)
    }

    /// Load and parse a template, once per normalized path per job.
    async fn template(&mut self, file: &str) -> Result<Arc<Vec<Node>>, CompileError> {
        if let Some(cached) = self.asts.get(file) {
            trace!(path = %file, "ast cache hit");
            return Ok(cached.clone());
        }
        let content = self.source(file).await?;
        let nodes = parser::parse(&content).map_err(|source| CompileError::Syntax {
            path: file.to_string(),
            source,
        })?;
        let ast = Arc::new(nodes);
        self.asts.insert(file.to_string(), ast.clone());
        Ok(ast)
    }

    /// Lower a node sequence under a context frame.
    fn lower<'s, 'f>(
        &'s mut self,
        nodes: &'s [Node],
        frame: &'s mut Frame<'f>,
    ) -> BoxFuture<'s, Result<Vec<Step>, CompileError>>
    where
        'f: 's,
    {
        Box::pin(async move {
            let mut steps = Vec::new();

            for node in nodes {
                match &node.node {
                    NodeKind::Plain(text) => push_text(&mut steps, text),

                    NodeKind::Comment(text) => {
                        if !self.options.strip_comments {
                            push_text(&mut steps, &format!("<!--{text}-->"));
                        }
                    }

                    NodeKind::Expr { expr, escape } => steps.push(Step::Expr {
                        expr: expr.clone(),
                        escape: *escape,
                        loc: loc_of(frame, node.span),
                    }),

                    NodeKind::Var { name, expr } => steps.push(Step::Bind {
                        name: name.clone(),
                        expr: expr.clone(),
                        loc: loc_of(frame, node.span),
                    }),

                    NodeKind::Inline { file, escape } => {
                        let inline_path = path::local_path(&frame.file, file)?;
                        let content = self.source(&inline_path).await?;
                        if *escape {
                            push_text(&mut steps, &escape_html(&content));
                        } else {
                            push_text(&mut steps, &content);
                        }
                    }

                    NodeKind::Def { name, mode, nodes } => {
                        let body = self.lower(nodes, frame).await?;
                        merge_def(&mut frame.defs, name, *mode, body);
                    }

                    NodeKind::Block { name, nodes } => {
                        let stored = frame.lookup(name).map(|d| (d.mode, d.body.clone()));
                        match stored {
                            None => steps.extend(self.lower(nodes, frame).await?),
                            Some((DefMode::Replace, body)) => steps.extend(body),
                            Some((DefMode::Append, body)) => {
                                steps.extend(self.lower(nodes, frame).await?);
                                steps.extend(body);
                            }
                            Some((DefMode::Prepend, body)) => {
                                steps.extend(body);
                                steps.extend(self.lower(nodes, frame).await?);
                            }
                        }
                    }

                    NodeKind::If { whens, otherwise } => {
                        let mut arms = Vec::with_capacity(whens.len());
                        for when in whens {
                            arms.push(Arm {
                                expr: when.expr.clone(),
                                body: self.lower(&when.nodes, frame).await?,
                                loc: loc_of(frame, when.span),
                            });
                        }
                        let otherwise = match otherwise {
                            Some(nodes) => Some(self.lower(nodes, frame).await?),
                            None => None,
                        };
                        steps.push(Step::If { arms, otherwise });
                    }

                    NodeKind::Each { name, expr, nodes } => {
                        let body = self.lower(nodes, frame).await?;
                        steps.push(Step::Each {
                            name: name.clone(),
                            expr: expr.clone(),
                            body,
                            loc: loc_of(frame, node.span),
                        });
                    }

                    NodeKind::Include { file, children } => {
                        let mut child = Frame {
                            file: frame.file.clone(),
                            defs: HashMap::new(),
                            parent: Some(&*frame),
                        };

                        // Definitions populate the new context before the
                        // included file is processed; vars become bindings
                        // at the head of the include's scope.
                        let mut binds = Vec::new();
                        for c in children {
                            match &c.node {
                                NodeKind::Def { name, mode, nodes } => {
                                    let body = self.lower(nodes, &mut child).await?;
                                    merge_def(&mut child.defs, name, *mode, body);
                                }
                                NodeKind::Var { name, expr } => binds.push(Step::Bind {
                                    name: name.clone(),
                                    expr: expr.clone(),
                                    loc: loc_of(&child, c.span),
                                }),
                                // The grammar admits only defs and vars here.
                                _ => {}
                            }
                        }

                        let include_path = path::local_path(&child.file, file)?;
                        let ast = self.template(&include_path).await?;
                        child.file = Arc::from(include_path.as_str());

                        let mut body = binds;
                        body.extend(self.lower(ast.as_slice(), &mut child).await?);
                        steps.push(Step::Scope(body));
                    }
                }
            }

            Ok(steps)
        })
    }
}

/// Append literal text, merging with a preceding text step.
fn push_text(steps: &mut Vec<Step>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Step::Text(last)) = steps.last_mut() {
        last.push_str(text);
    } else {
        steps.push(Step::Text(text.to_string()));
    }
}

/// Store a definition, merging with an existing entry by the new
/// definition's mode: replace swaps the entry, append yields `old; new`,
/// prepend yields `new; old`.
fn merge_def(defs: &mut HashMap<String, DefEntry>, name: &str, mode: DefMode, body: Vec<Step>) {
    match defs.get_mut(name) {
        None => {
            defs.insert(name.to_string(), DefEntry { mode, body });
        }
        Some(existing) => match mode {
            DefMode::Replace => *existing = DefEntry { mode, body },
            DefMode::Append => existing.body.extend(body),
            DefMode::Prepend => {
                let old = std::mem::take(&mut existing.body);
                existing.body = body;
                existing.body.extend(old);
            }
        },
    }
}

fn loc_of(frame: &Frame<'_>, span: Span) -> SourceLoc {
    SourceLoc {
        file: frame.file.clone(),
        line: span.line,
        column: span.column,
    }
}
