//! Per-invocation memo of computed diffs.
//!
//! Diffing two revisions with maximal context is the most expensive
//! operation in a fetch; every anchored thread in a container tends to
//! reuse the same base/head pair. The cache is an explicit object injected
//! into the extractor and translator so that its lifetime is visibly bound
//! to one invocation and the caller controls invalidation.

use crate::git::{GitError, GitRunner};
use crate::model::FileDiff;
use crate::unified::{parse_unified_diff, DiffError};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Diff(#[from] DiffError),
}

/// Memoized full-context diffs keyed by `(base, head)`.
#[derive(Debug, Default)]
pub struct DiffCache {
    diffs: HashMap<(String, String), Rc<Vec<FileDiff>>>,
}

impl DiffCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parsed diff between `base` and `head`, computing it on first use.
    pub fn full_diff(
        &mut self,
        git: &GitRunner,
        base: &str,
        head: &str,
    ) -> Result<Rc<Vec<FileDiff>>, CacheError> {
        let key = (base.to_string(), head.to_string());
        if let Some(files) = self.diffs.get(&key) {
            return Ok(Rc::clone(files));
        }
        let text = git.diff(base, head)?;
        let files = Rc::new(parse_unified_diff(&text)?);
        self.diffs.insert(key, Rc::clone(&files));
        Ok(files)
    }

    /// The diff of one file, located by its post-rename name.
    pub fn file_diff(
        &mut self,
        git: &GitRunner,
        base: &str,
        head: &str,
        path: &str,
    ) -> Result<Option<FileDiff>, CacheError> {
        let files = self.full_diff(git, base, head)?;
        Ok(files.iter().find(|f| f.matches(path)).cloned())
    }

    /// Drop all memoized diffs.
    pub fn clear(&mut self) {
        self.diffs.clear();
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}
