//! # rf-codec
//!
//! The bidirectional codec between structured discussion data and the
//! user-editable text form. Rendering is deterministic: the same threads
//! and metadata always produce byte-identical text, which is what makes
//! the pristine copy usable as a merge ancestor. Parsing is an explicit
//! finite-state machine that re-derives edit instructions by structural
//! diff against the last-known remote snapshot.
//!
//! The working file grammar, per thread:
//!
//! ```text
//! <path>:<line>: <40-hex-thread-id>
//!  <commit-short-sha> <commit-subject>
//! <context lines, each prefixed ' '|'+'|'-'>
//! \t[<note-id>] <first line of body>
//! \t\t<continuation line>
//!
//! 𑁍
//! <new thread body>
//! ```

pub mod draft;
pub mod normalize;
pub mod parse;
pub mod render;

use thiserror::Error;

/// Fixed sentinel delimiting thread boundaries and metadata fields.
pub const MARKER: char = '𑁍';

/// Structural codec failures.
///
/// Any of these during parse makes the whole submit invocation abort: a
/// malformed instruction set risks silent data loss on the remote side.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("line {line}: unknown thread {id}")]
    UnknownThread { line: usize, id: String },
    #[error("unknown note {note} in thread {thread}")]
    UnknownNote { thread: String, note: u64 },
    #[error("line {line}: '{token}' outside of a thread")]
    CommandOutsideThread { line: usize, token: String },
    #[error("line {line}: '{token}' without an active note")]
    CommandWithoutNote { line: usize, token: String },
    #[error("line {line}: text outside of any thread")]
    TextOutsideThread { line: usize },
    #[error("line {line}: malformed metadata header: {reason}")]
    MalformedHeader { line: usize, reason: String },
    #[error("line {line}: malformed review draft header")]
    MalformedDraft { line: usize },
}

pub use draft::{parse_review_drafts, render_draft_header, DraftKind, ReviewDraft};
pub use normalize::{normalize_body, note_tag};
pub use parse::{parse_metadata_header, parse_working_text, ParseOptions};
pub use render::{render_metadata, render_threads, terminator, ContextSource, NoContext};
