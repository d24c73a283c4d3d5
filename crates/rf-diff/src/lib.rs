//! # rf-diff
//!
//! The diff layer of review-fs: a structured model of unified diffs, a
//! blocking git subprocess runner, a per-invocation diff cache, the
//! bounded context-window extractor that anchors discussion threads to
//! source lines, and the position translator that turns a local diff
//! position into a backend wire anchor.
//!
//! Context extraction is best-effort by design: any failure surfaces as an
//! inline placeholder string rather than an error, so rendering never
//! aborts. Position translation is the opposite: misplacing a review
//! comment is a correctness bug, so every lookup failure is a hard error.

pub mod cache;
pub mod context;
pub mod git;
pub mod model;
pub mod position;
pub mod unified;

pub use cache::{CacheError, DiffCache};
pub use context::{commit_context, thread_context, DIFF_CONTEXT_LINES};
pub use git::{GitError, GitRunner};
pub use model::{DiffLine, FileDiff, FileStatus, Hunk, LineKind};
pub use position::{anchor_key, counted_offset, structured_anchor, LocalPosition, PositionError};
pub use unified::{parse_unified_diff, DiffError};
