//! Translate a local diff position into a backend wire anchor.
//!
//! Draft review comments are written against a single commit, with line
//! numbers local to that commit's immediate parent. Backends address
//! positions differently: the structured scheme wants the SHA triple plus
//! old/new paths and lines, the counted scheme wants a single integer
//! offset into the full review diff. Unlike context extraction, failures
//! here are hard errors: a comment silently attached to the wrong line is
//! worse than no comment.

use crate::cache::{CacheError, DiffCache};
use crate::git::{GitError, GitRunner};
use crate::model::{FileDiff, LineKind};
use rf_model::Anchor;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PositionError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error("cannot diff {base}..{head}: {source}")]
    Diff {
        base: String,
        head: String,
        source: CacheError,
    },
    #[error("no file '{path}' in {base}..{head}")]
    FileNotFound {
        path: String,
        base: String,
        head: String,
    },
    #[error("line {line} of '{path}' not found in diff")]
    LineNotFound { path: String, line: u32 },
}

/// A review comment position local to one commit.
///
/// `old_line`/`new_line` are numbered against `commit~` and `commit`
/// respectively; `kind` is the diff line type the comment sits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPosition {
    pub commit: String,
    pub old_path: String,
    pub new_path: String,
    pub kind: LineKind,
    pub old_line: u32,
    pub new_line: u32,
}

/// Structured SHA-based wire anchor for `pos`.
///
/// Base and start are the commit's immediate parent. The old line is
/// omitted for pure additions and the new line for pure deletions.
pub fn structured_anchor(git: &GitRunner, pos: &LocalPosition) -> Result<Anchor, PositionError> {
    let base = git.rev_parse(&format!("{}~", pos.commit))?;
    let head = git.rev_parse(&pos.commit)?;
    Ok(anchor_from_revs(base, head, pos))
}

fn anchor_from_revs(base: String, head: String, pos: &LocalPosition) -> Anchor {
    Anchor {
        start: base.clone(),
        base,
        head,
        old_path: pos.old_path.clone(),
        new_path: pos.new_path.clone(),
        old_line: match pos.kind {
            LineKind::Addition => None,
            _ => Some(pos.old_line),
        },
        new_line: match pos.kind {
            LineKind::Deletion => None,
            _ => Some(pos.new_line),
        },
    }
}

/// Idempotent content-hash key for a position, for backends that need a
/// stable anchor identifier: SHA-256 over the old path, tagged with both
/// line numbers.
pub fn anchor_key(pos: &LocalPosition) -> String {
    let digest = Sha256::digest(pos.old_path.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{hex}_{}_{}", pos.old_line, pos.new_line)
}

/// Counted-offset position of `pos` within the full review diff.
///
/// The backend counts every line of the file's diff between the review
/// range's base and head. The first pass walks that diff accumulating a
/// raw count until the target line is reached. The reviewed commit may be
/// older than the review head, so a second pass walks the diff
/// `commit..head` and shifts the raw count by the net added/removed lines
/// sitting before the target line number.
pub fn counted_offset(
    cache: &mut DiffCache,
    git: &GitRunner,
    review_base: &str,
    review_head: &str,
    pos: &LocalPosition,
) -> Result<u32, PositionError> {
    let review_file = lookup_file(cache, git, review_base, review_head, &pos.new_path)?;
    let raw = raw_count(&review_file, pos)?;
    let delta = match lookup_file(cache, git, &pos.commit, review_head, &pos.new_path) {
        Ok(file) => drift(&file, pos),
        // File untouched after the reviewed commit: no drift.
        Err(PositionError::FileNotFound { .. }) => 0,
        Err(e) => return Err(e),
    };
    let final_pos = i64::from(raw) + delta;
    if final_pos <= 0 {
        return Err(PositionError::LineNotFound {
            path: pos.new_path.clone(),
            line: pos.new_line,
        });
    }
    Ok(final_pos as u32)
}

/// Position of the target line within the file's review diff, counting
/// every context, added and removed line in order.
fn raw_count(file: &FileDiff, pos: &LocalPosition) -> Result<u32, PositionError> {
    let mut count = 0u32;
    for line in file.lines() {
        count += 1;
        let reached = match pos.kind {
            LineKind::Deletion => matches!(line.old_line, Some(n) if n >= pos.old_line),
            _ => matches!(line.new_line, Some(n) if n >= pos.new_line),
        };
        if reached {
            return Ok(count);
        }
    }
    Err(PositionError::LineNotFound {
        path: pos.new_path.clone(),
        line: pos.new_line,
    })
}

/// Net line drift of the target between the reviewed commit and the review
/// head: +1 per added, -1 per removed line before the target line number.
/// The reviewed commit is the old side of this diff.
fn drift(file: &FileDiff, pos: &LocalPosition) -> i64 {
    let mut delta = 0i64;
    for line in file.lines() {
        if matches!(line.old_line, Some(n) if n >= pos.new_line) {
            break;
        }
        match line.kind {
            LineKind::Addition => delta += 1,
            LineKind::Deletion => delta -= 1,
            LineKind::Context => {}
        }
    }
    delta
}

fn lookup_file(
    cache: &mut DiffCache,
    git: &GitRunner,
    base: &str,
    head: &str,
    path: &str,
) -> Result<FileDiff, PositionError> {
    match cache.file_diff(git, base, head, path) {
        Ok(Some(file)) => Ok(file),
        Ok(None) => Err(PositionError::FileNotFound {
            path: path.to_string(),
            base: base.to_string(),
            head: head.to_string(),
        }),
        Err(CacheError::Git(GitError::Failed { command, stderr })) => {
            Err(PositionError::Git(GitError::Failed { command, stderr }))
        }
        Err(source) => Err(PositionError::Diff {
            base: base.to_string(),
            head: head.to_string(),
            source,
        }),
    }
}
