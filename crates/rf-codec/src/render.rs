//! Render discussion data into the editable text form.
//!
//! Output is deterministic so that an unedited render parses back to zero
//! instructions and the pristine copy works as a three-way merge ancestor.

use crate::normalize::note_tag;
use crate::MARKER;
use rf_model::{Anchor, ItemKind, MetadataSnapshot, Thread};

/// Supplies diff context windows and commit summaries during rendering.
///
/// Backed by the diff layer in production; tests substitute fixed strings.
/// Both methods are infallible by contract: failures surface as inline
/// placeholder text, never as errors.
pub trait ContextSource {
    /// Newline-terminated context window for an anchored thread.
    fn thread_context(&mut self, anchor: &Anchor) -> String;

    /// One-line `<short-sha> <subject>` summary, if the commit is known.
    fn commit_summary(&mut self, commit: &str) -> Option<String>;
}

/// A context source that renders nothing; for containers without any
/// anchored threads.
pub struct NoContext;

impl ContextSource for NoContext {
    fn thread_context(&mut self, _anchor: &Anchor) -> String {
        String::new()
    }

    fn commit_summary(&mut self, _commit: &str) -> Option<String> {
        None
    }
}

/// Render the metadata header: title line, blank line, description, then
/// one marker field line per populated field in fixed order.
pub fn render_metadata(snapshot: &MetadataSnapshot, kind: ItemKind) -> String {
    let mut out = String::new();
    out.push_str(&snapshot.title);
    out.push_str("\n\n");
    out.push_str(snapshot.description.trim_end());
    out.push('\n');
    if kind == ItemKind::MergeProposal {
        if let Some(branch) = &snapshot.source_branch {
            out.push_str(&format!("{MARKER} source_branch: {branch}\n"));
        }
        if let Some(branch) = &snapshot.target_branch {
            out.push_str(&format!("{MARKER} target_branch: {branch}\n"));
        }
        out.push_str(&format!(
            "{MARKER} reviewers: {}\n",
            snapshot.reviewers.join(",")
        ));
        if let Some(remove) = snapshot.remove_source_branch {
            out.push_str(&format!("{MARKER} remove_source_branch: {remove}\n"));
        }
    }
    out.push_str(&format!(
        "{MARKER} assignees: {}\n",
        snapshot.assignees.join(",")
    ));
    out.push_str(&format!(
        "{MARKER} milestone: {}\n",
        snapshot.milestone.as_deref().unwrap_or("")
    ));
    out.push_str(&format!(
        "{MARKER}    labels: {}\n",
        snapshot.labels.join(",")
    ));
    out.push('\n');
    out
}

/// Render threads in order, each followed by a blank separator line.
///
/// The caller appends the lone `𑁍` terminator that opens the new-thread
/// composition area.
pub fn render_threads(
    threads: &[Thread],
    self_user: &str,
    ctx: &mut dyn ContextSource,
) -> String {
    let mut out = String::new();
    for thread in threads {
        render_thread(&mut out, thread, self_user, ctx);
    }
    out
}

fn render_thread(out: &mut String, thread: &Thread, self_user: &str, ctx: &mut dyn ContextSource) {
    if let Some(anchor) = &thread.anchor {
        if let Some(line) = anchor.display_line() {
            out.push_str(&format!("{}:{}: ", anchor.display_path(), line));
        }
    }
    out.push_str(thread.id.as_str());
    out.push('\n');
    if let Some(commit) = thread.first_note().and_then(|n| n.commit.as_deref()) {
        if let Some(summary) = ctx.commit_summary(commit) {
            // The leading space keeps the summary inside the context-line
            // class, so the parser skips it like any diff line.
            out.push(' ');
            out.push_str(&summary);
            out.push('\n');
        }
    }
    if let Some(anchor) = &thread.anchor {
        out.push_str(&ctx.thread_context(anchor));
    }
    for note in &thread.notes {
        let tag = note_tag(note, self_user);
        let text = format!("[{tag}] {}", note.body);
        let mut lines = text.lines();
        if let Some(first) = lines.next() {
            out.push('\t');
            out.push_str(first);
        }
        for line in lines {
            out.push_str("\n\t\t");
            out.push_str(line);
        }
        out.push('\n');
    }
    out.push('\n');
}

/// The terminator line that closes the thread list and opens the
/// new-thread composition area.
pub fn terminator() -> String {
    format!("{MARKER}\n")
}
