//! Bounded diff-context windows for anchored threads.
//!
//! A window is the tail of the file's diff ending exactly at the line a
//! thread is anchored to, counted on the side the anchor names. Extraction
//! never fails: every unrecoverable condition collapses into a visibly
//! marked placeholder line, so rendering a container always succeeds.

use crate::cache::{CacheError, DiffCache};
use crate::git::{GitError, GitRunner};
use crate::model::{DiffLine, FileDiff, LineKind};
use crate::position::LocalPosition;
use rf_model::Anchor;

/// Default maximum number of context lines in a window.
pub const DIFF_CONTEXT_LINES: usize = 5;

/// Which side of the diff the anchor line is counted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Old,
    New,
}

/// Context window for an anchored thread.
///
/// Resolves both revisions (fetching missing ones), locates the file by
/// its post-rename name and returns up to `context_lines` rendered diff
/// lines ending at the anchor line. Always newline-terminated.
pub fn thread_context(
    cache: &mut DiffCache,
    git: &GitRunner,
    anchor: &Anchor,
    context_lines: usize,
) -> String {
    let base = &anchor.base;
    let head = &anchor.head;
    if git.ensure_commit(base).is_err() || git.ensure_commit(head).is_err() {
        return format!(" ? missing commits {base} or {head}\n");
    }
    let path = anchor.display_path();
    let file = match cache.file_diff(git, base, head, path) {
        Ok(Some(file)) => file,
        Ok(None) => return format!(" ? no file '{path}' in {base}..{head}\n"),
        Err(CacheError::Git(GitError::Undecodable { .. })) => {
            return format!(" ? undecodable diff {base}..{head}\n")
        }
        Err(CacheError::Diff(_)) => return format!(" ? undecodable diff {base}..{head}\n"),
        Err(CacheError::Git(_)) => return format!(" ? missing commits {base} or {head}\n"),
    };
    let (side, line) = match (anchor.new_line, anchor.old_line) {
        (Some(line), _) => (Side::New, line),
        (None, Some(line)) => (Side::Old, line),
        (None, None) => return format!(" ? no line for '{path}' in {base}..{head}\n"),
    };
    window(&file, side, line, context_lines)
}

/// Context window for a draft review comment on a single commit,
/// spanning `commit~..commit`. Deletions are counted on the old side.
pub fn commit_context(
    cache: &mut DiffCache,
    git: &GitRunner,
    pos: &LocalPosition,
    context_lines: usize,
) -> String {
    let commit = &pos.commit;
    let path = &pos.new_path;
    let parent = format!("{commit}~");
    if git.ensure_commit(commit).is_err() {
        return format!(" ? missing commit {commit}\n");
    }
    let file = match cache.file_diff(git, &parent, commit, path) {
        Ok(Some(file)) => file,
        Ok(None) => return format!(" ? no file '{path}' in {commit}\n"),
        Err(_) => return format!(" ? undecodable diff {commit}\n"),
    };
    let (side, line) = match pos.kind {
        LineKind::Deletion => (Side::Old, pos.old_line),
        _ => (Side::New, pos.new_line),
    };
    window(&file, side, line, context_lines)
}

/// Up to `limit` rendered lines counted on `side`, ending at `line`.
fn window(file: &FileDiff, side: Side, line: u32, limit: usize) -> String {
    let select = |l: &&DiffLine| match side {
        Side::New => matches!(l.new_line, Some(n) if n <= line),
        Side::Old => matches!(l.old_line, Some(n) if n <= line),
    };
    let rows: Vec<String> = file
        .lines()
        .filter(select)
        .map(|l| l.rendered())
        .collect();
    let tail = rows.len().saturating_sub(limit);
    let mut out = rows[tail..].join("\n");
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
