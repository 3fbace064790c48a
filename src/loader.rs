//! The loader boundary.
//!
//! The engine never touches a filesystem, network, or DOM: everything it
//! knows about template content comes through [`Loader::load`]. Paths
//! handed to a loader are already-normalized logical paths without a
//! leading `/` (see [`crate::path`]).

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::LoadFailure;

/// Maps a logical path to template source text.
///
/// Implementations may fail with any error; failures propagate out of
/// [`Compiler::compile`](crate::Compiler::compile) unchanged, wrapped with
/// the attempted path. Within one compilation every distinct normalized
/// path is loaded at most once; results are cached per job.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, path: &str) -> Result<String, LoadFailure>;
}

/// An in-memory [`Loader`] backed by a map, for tests and embedded
/// template sets.
///
/// ```rust
/// use zenmill::MemoryLoader;
///
/// let mut loader = MemoryLoader::new();
/// loader.insert("index.html", "<h1>#{title}</h1>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(path.into(), source.into());
    }
}

#[async_trait]
impl Loader for MemoryLoader {
    async fn load(&self, path: &str) -> Result<String, LoadFailure> {
        self.templates
            .get(path)
            .cloned()
            .ok_or_else(|| format!("template not found: {path}").into())
    }
}
