//! # zenmill
//!
//! A template engine for composing XML-ish documents (HTML, SVG).
//! Templates are plain text interleaved with composition tags
//! (`<include>`, `<block:name>`, `<def:name>`, `<inline>`), control flow
//! (`<if>`/`<when>`/`<otherwise>`, `<each:name>`), bindings
//! (`<var:name>`), and interpolations (`#{expr}` escaped, `!{expr}` raw).
//!
//! The crate is split into two layers:
//!
//! - **Compilation** resolves every composition construct across files:
//!   the parser turns each source into a node tree, and the composition
//!   walk folds includes, blocks, and definitions into a flat program.
//!   Template content comes exclusively through a caller-supplied
//!   [`Loader`]; within one compilation every distinct path is loaded and
//!   parsed at most once.
//! - **Rendering** executes that program against a data environment,
//!   synchronously and with no I/O. A [`Renderer`] is pure: identical
//!   data yields byte-identical output.
//!
//! ## Quick start
//!
//! ```rust
//! use zenmill::{Compiler, MemoryLoader, Options, Value};
//!
//! let mut loader = MemoryLoader::new();
//! loader.insert("layout.html", "<html><body><block:content/></body></html>");
//! loader.insert(
//!     "page.html",
//!     "<include file='layout.html'><def:content><h1>#{title}</h1></def:content></include>",
//! );
//!
//! let compiler = Compiler::new(loader, Options::default());
//! let renderer = futures::executor::block_on(compiler.compile("page.html")).unwrap();
//!
//! let data = Value::from(serde_json::json!({"title": "Hi"}));
//! assert_eq!(
//!     renderer.render(&data).unwrap(),
//!     "<html><body><h1>Hi</h1></body></html>",
//! );
//! ```
//!
//! ## Scoping
//!
//! Every include boundary, `<if>`, and `<each:>` iteration opens a fresh
//! lexical scope: outer bindings stay visible, inner `<var:>` bindings do
//! not leak out. The root scope is seeded with a small set of globals
//! (`encodeURI`/`encodeURIComponent`/`decodeURI`/`decodeURIComponent`,
//! `Math`, `JSON`, `Object`, `Date`); user data merges over them.

pub mod ast;
mod compile;
pub mod error;
mod loader;
mod parser;
pub mod path;
mod render;

pub use ast::value::Value;
pub use error::{CompileError, Error, LoadFailure, RenderError, SyntaxError};
pub use loader::{Loader, MemoryLoader};
pub use parser::{parse, parse_expr};
pub use render::Renderer;

use compile::Job;

/// Compilation options.
///
/// ```rust
/// use zenmill::Options;
///
/// let options = Options::new().strip_comments(true);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Drop `<!-- ... -->` comments from the output. Defaults to `false`.
    pub strip_comments: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strip_comments(mut self, strip: bool) -> Self {
        self.strip_comments = strip;
        self
    }
}

/// The compiler: a loader plus options.
///
/// `Compiler` itself is reusable and stateless; every [`compile`](Self::compile)
/// call runs a fresh single-shot job with its own caches, so nothing is
/// shared between compilations.
pub struct Compiler<L> {
    loader: L,
    options: Options,
}

impl<L: Loader> Compiler<L> {
    pub fn new(loader: L, options: Options) -> Self {
        Self { loader, options }
    }

    /// Compile the template at `path` (and everything it references) into
    /// a reusable [`Renderer`].
    ///
    /// The only suspension points are loader calls. If any load fails,
    /// compilation fails with that error and no further loads are issued.
    pub async fn compile(&self, path: &str) -> Result<Renderer, CompileError> {
        Job::new(&self.loader, self.options).run(path).await
    }

    /// Compile and render in one step.
    pub async fn render(&self, path: &str, data: &Value) -> Result<String, Error> {
        let renderer = self.compile(path).await?;
        Ok(renderer.render(data)?)
    }
}
