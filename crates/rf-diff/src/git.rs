//! Blocking git subprocess runner.
//!
//! All history access goes through the `git` binary so the tool works
//! against whatever repository layout the user already has, including
//! worktrees and partial clones. Output is decoded strictly; review
//! context extraction treats undecodable diff bytes as a recoverable
//! condition, so decoding failures get their own error variant.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Context size passed to `git diff -U`. Large enough that every file's
/// diff collapses into a single hunk covering the whole file.
const MAX_CONTEXT: &str = "-U123123123";

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
    #[error("git {command} produced undecodable output")]
    Undecodable { command: String },
    #[error("not inside a git repository")]
    NoRepository,
}

/// Runs git commands against one repository.
#[derive(Debug, Clone)]
pub struct GitRunner {
    work_tree: PathBuf,
    remote: String,
}

impl GitRunner {
    pub fn new(work_tree: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            work_tree: work_tree.into(),
            remote: remote.into(),
        }
    }

    /// Locate the enclosing repository from `start`.
    pub fn discover(start: &Path, remote: impl Into<String>) -> Result<Self, GitError> {
        let output = Command::new("git")
            .current_dir(start)
            .args(["rev-parse", "--show-toplevel"])
            .output()?;
        if !output.status.success() {
            return Err(GitError::NoRepository);
        }
        let top = String::from_utf8(output.stdout)
            .map_err(|_| GitError::NoRepository)?
            .trim()
            .to_string();
        Ok(Self::new(top, remote))
    }

    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>, GitError> {
        let output = Command::new("git")
            .current_dir(&self.work_tree)
            .args(args)
            .output()?;
        if !output.status.success() {
            return Err(GitError::Failed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn run_utf8(&self, args: &[&str]) -> Result<String, GitError> {
        let stdout = self.run(args)?;
        String::from_utf8(stdout).map_err(|_| GitError::Undecodable {
            command: args.join(" "),
        })
    }

    /// Full diff between two revisions with maximal context.
    pub fn diff(&self, base: &str, head: &str) -> Result<String, GitError> {
        self.run_utf8(&["diff", MAX_CONTEXT, base, head])
    }

    /// Resolve a revision to a full SHA.
    pub fn rev_parse(&self, rev: &str) -> Result<String, GitError> {
        Ok(self.run_utf8(&["rev-parse", "--verify", rev])?.trim().to_string())
    }

    /// Whether the revision exists in the local object store.
    pub fn has_commit(&self, rev: &str) -> bool {
        self.run(&["cat-file", "-e", &format!("{rev}^{{commit}}")]).is_ok()
    }

    /// Make sure a revision is locally resolvable, fetching it from the
    /// configured remote when missing.
    pub fn ensure_commit(&self, rev: &str) -> Result<(), GitError> {
        if self.has_commit(rev) {
            return Ok(());
        }
        log::debug!("fetching missing commit {rev} from {}", self.remote);
        self.run(&["fetch", &self.remote, rev]).map(|_| ())
    }

    /// One-line `<short-sha> <subject>` summary of a commit.
    pub fn commit_summary(&self, rev: &str) -> Result<String, GitError> {
        Ok(self
            .run_utf8(&["log", "--format=%h %s", "-1", rev])?
            .trim_end()
            .to_string())
    }

    /// Commit subjects of a range, newest first, one per line.
    pub fn log_subjects(&self, range: &str) -> Result<String, GitError> {
        self.run_utf8(&["log", "--format=%s", range])
    }
}
