//! Parse edited working text back into edit instructions.
//!
//! A single left-to-right scan driven by an explicit state machine. The
//! metadata header is consumed first; the remaining rows move between
//! `Context`, `Comments`, `NewComment` and `NewDiscussion` as thread
//! anchors, note tags and the sentinel are encountered. Instructions are
//! derived purely by structural diff against the last-known snapshot, so
//! an unedited render always parses to nothing.

use crate::normalize::normalize_body;
use crate::{CodecError, MARKER};
use regex::Regex;
use rf_model::{
    EditInstruction, MetadataPatch, MetadataSnapshot, NoteId, StateChangeKind, Thread,
};
use std::collections::{HashMap, HashSet};

/// What the container being parsed is allowed to do.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Accept `r` / `u` resolution toggles (merge proposals on a dialect
    /// that supports resolution).
    pub allow_resolution: bool,
    /// Accept the `!!!merge` request (merge proposals only).
    pub allow_merge: bool,
    /// Whether the text opens with a metadata header. Companion files
    /// (resolved and meta threads) are headerless.
    pub has_header: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_resolution: false,
            allow_merge: false,
            has_header: true,
        }
    }
}

/// Parser state after the metadata header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between a thread anchor and its first note block.
    Context,
    /// Inside a thread's note blocks.
    Comments,
    /// Accumulating a dedented reply to the active thread.
    NewComment,
    /// After the sentinel, accumulating new thread bodies.
    NewDiscussion,
}

/// What one row means, in priority order.
#[derive(Debug)]
enum LineClass<'a> {
    /// Lone sentinel character.
    Sentinel,
    /// Any other row starting with the sentinel.
    MarkerPrefixed,
    /// 40-hex thread key, optionally preceded by `path:line: `.
    ThreadAnchor(&'a str),
    /// `\t[<numeric-id>] <rest>`, a self-authored note header.
    NoteTag { id: u64, rest: &'a str },
    /// `\t[<author>]`, another author's note header.
    ForeignTag,
    /// Reserved command token.
    Command(Command),
    /// Anything else; interpreted by the current state.
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Resolve,
    Unresolve,
    Merge,
    Close,
    Delete,
}

impl Command {
    fn token(&self) -> &'static str {
        match self {
            Command::Resolve => "r",
            Command::Unresolve => "u",
            Command::Merge => "!!!merge",
            Command::Close => "!!!close",
            Command::Delete => "!!!delete",
        }
    }
}

struct Classifier {
    anchor: Regex,
    note_tag: Regex,
    foreign_tag: Regex,
}

impl Classifier {
    fn new() -> Self {
        Self {
            anchor: Regex::new(r"^(?:[^:]+:\d+: )?([0-9a-f]{40})$").unwrap(),
            note_tag: Regex::new(r"^\t\[(\d+)\] (.*)$").unwrap(),
            // Usernames may carry '-', '.' and the like; anything short
            // of a closing bracket is part of the author name.
            foreign_tag: Regex::new(r"^\t\[[^\]\t]+\]").unwrap(),
        }
    }

    fn classify<'a>(&self, row: &'a str, opts: &ParseOptions) -> LineClass<'a> {
        if row.chars().next() == Some(MARKER) {
            if row.chars().count() == 1 {
                return LineClass::Sentinel;
            }
            return LineClass::MarkerPrefixed;
        }
        if let Some(caps) = self.anchor.captures(row) {
            return LineClass::ThreadAnchor(caps.get(1).unwrap().as_str());
        }
        match row {
            "r" if opts.allow_resolution => return LineClass::Command(Command::Resolve),
            "u" if opts.allow_resolution => return LineClass::Command(Command::Unresolve),
            "!!!merge" if opts.allow_merge => return LineClass::Command(Command::Merge),
            "!!!close" => return LineClass::Command(Command::Close),
            "!!!delete" => return LineClass::Command(Command::Delete),
            _ => {}
        }
        if let Some(caps) = self.note_tag.captures(row) {
            let id = caps.get(1).unwrap().as_str().parse().unwrap_or(u64::MAX);
            return LineClass::NoteTag {
                id,
                rest: caps.get(2).unwrap().as_str(),
            };
        }
        if self.foreign_tag.is_match(row) {
            return LineClass::ForeignTag;
        }
        LineClass::Plain
    }
}

/// Parse the full working text of a container against its snapshot.
///
/// `threads` and `snapshot` come from the raw discussions snapshot taken
/// at the last fetch; the diff is always computed against that, never
/// against the merged text, so values the user left alone are never
/// resubmitted.
pub fn parse_working_text(
    text: &str,
    threads: &[Thread],
    snapshot: Option<&MetadataSnapshot>,
    opts: &ParseOptions,
) -> Result<Vec<EditInstruction>, CodecError> {
    let rows: Vec<&str> = text.lines().collect();
    let (consumed, patch) = if opts.has_header {
        parse_metadata_header(&rows, snapshot)?
    } else {
        (0, MetadataPatch::default())
    };

    let classifier = Classifier::new();
    let mut state = State::Context;
    let mut active_thread: Option<usize> = None;
    let mut active_note: Option<NoteId> = None;
    let mut unkeyed_seen = 0usize;

    // Accumulators, keyed by thread index into `threads`.
    let mut note_lines: HashMap<(usize, NoteId), Vec<String>> = HashMap::new();
    let mut replies: HashMap<usize, String> = HashMap::new();
    let mut new_threads: Vec<Vec<String>> = Vec::new();
    let mut resolves: Vec<(usize, bool)> = Vec::new();
    let mut deletes: Vec<(usize, NoteId)> = Vec::new();
    let mut state_changes: Vec<StateChangeKind> = Vec::new();

    for (i, row) in rows[consumed..].iter().enumerate() {
        let line = consumed + i + 1;
        let class = classifier.classify(row, opts);

        if state == State::NewDiscussion {
            match class {
                LineClass::Sentinel => new_threads.push(Vec::new()),
                _ => {
                    if new_threads.is_empty() {
                        new_threads.push(Vec::new());
                    }
                    new_threads.last_mut().unwrap().push(row.to_string());
                }
            }
            continue;
        }

        match class {
            LineClass::Sentinel | LineClass::MarkerPrefixed => {
                state = State::NewDiscussion;
                continue;
            }
            LineClass::ThreadAnchor(id) => {
                active_note = None;
                active_thread = Some(resolve_thread(threads, id, &mut unkeyed_seen, line)?);
                state = State::Context;
                continue;
            }
            LineClass::Command(cmd) => {
                let thread = active_thread.ok_or_else(|| CodecError::CommandOutsideThread {
                    line,
                    token: cmd.token().to_string(),
                })?;
                match cmd {
                    Command::Resolve => resolves.push((thread, true)),
                    Command::Unresolve => resolves.push((thread, false)),
                    Command::Merge => state_changes.push(StateChangeKind::Merge),
                    Command::Close => state_changes.push(StateChangeKind::Close),
                    Command::Delete => {
                        let note = active_note.ok_or_else(|| CodecError::CommandWithoutNote {
                            line,
                            token: cmd.token().to_string(),
                        })?;
                        deletes.push((thread, note));
                    }
                }
                continue;
            }
            _ => {}
        }

        if state == State::Context {
            if row.starts_with('\t') {
                state = State::Comments;
            } else if row.is_empty() || matches!(row.chars().next(), Some(' ' | '+' | '-')) {
                // Diff context, the commit summary line, or separation.
                continue;
            } else {
                // Dedented text right after the anchor: a reply without
                // any note block above it.
                state = State::Comments;
            }
        }

        if state == State::Comments {
            match class {
                LineClass::NoteTag { id, rest } => {
                    let thread = active_thread.ok_or(CodecError::TextOutsideThread { line })?;
                    active_note = Some(NoteId(id));
                    note_lines
                        .entry((thread, NoteId(id)))
                        .or_default()
                        .push(rest.to_string());
                    continue;
                }
                LineClass::ForeignTag => {
                    active_note = None;
                    continue;
                }
                _ => {}
            }
            // A blank row is an explicit blank continuation line.
            let row = if row.is_empty() { "\t" } else { *row };
            if let Some(stripped) = row.strip_prefix('\t') {
                let content = stripped.strip_prefix('\t').unwrap_or(stripped);
                if let (Some(thread), Some(note)) = (active_thread, active_note) {
                    note_lines
                        .entry((thread, note))
                        .or_default()
                        .push(content.to_string());
                }
                continue;
            }
            let thread = active_thread.ok_or(CodecError::TextOutsideThread { line })?;
            state = State::NewComment;
            replies.insert(thread, row.to_string());
            continue;
        }

        if state == State::NewComment {
            match class {
                LineClass::NoteTag { id, rest } => {
                    let thread = active_thread.ok_or(CodecError::TextOutsideThread { line })?;
                    active_note = Some(NoteId(id));
                    note_lines
                        .entry((thread, NoteId(id)))
                        .or_default()
                        .push(rest.to_string());
                    state = State::Comments;
                    continue;
                }
                LineClass::ForeignTag => {
                    active_note = None;
                    state = State::Comments;
                    continue;
                }
                _ => {}
            }
            let thread = active_thread.ok_or(CodecError::TextOutsideThread { line })?;
            let body = replies.entry(thread).or_default();
            body.push('\n');
            body.push_str(row);
        }
    }

    assemble(
        threads,
        patch,
        note_lines,
        replies,
        new_threads,
        resolves,
        deletes,
        state_changes,
    )
}

/// Turn the accumulated scan results into ordered instructions.
#[allow(clippy::too_many_arguments)]
fn assemble(
    threads: &[Thread],
    patch: MetadataPatch,
    note_lines: HashMap<(usize, NoteId), Vec<String>>,
    replies: HashMap<usize, String>,
    new_threads: Vec<Vec<String>>,
    resolves: Vec<(usize, bool)>,
    deletes: Vec<(usize, NoteId)>,
    state_changes: Vec<StateChangeKind>,
) -> Result<Vec<EditInstruction>, CodecError> {
    let mut out = Vec::new();
    if !patch.is_empty() {
        out.push(EditInstruction::MetadataUpdate { fields: patch });
    }
    for (thread, resolved) in resolves {
        out.push(EditInstruction::SetResolved {
            thread: threads[thread].id.clone(),
            resolved,
        });
    }
    let mut deleted: HashSet<(usize, NoteId)> = HashSet::new();
    for (thread, note) in deletes {
        require_note(threads, thread, note)?;
        deleted.insert((thread, note));
        out.push(EditInstruction::DeleteNote {
            thread: threads[thread].id.clone(),
            note,
        });
    }
    // Edits, in snapshot order for determinism.
    for (ti, thread) in threads.iter().enumerate() {
        for note in &thread.notes {
            let Some(lines) = note_lines.get(&(ti, note.id)) else {
                continue;
            };
            if deleted.contains(&(ti, note.id)) {
                continue;
            }
            let body = normalize_body(&lines.join("\n"));
            if body != normalize_body(&note.body) {
                out.push(EditInstruction::EditNote {
                    thread: thread.id.clone(),
                    note: note.id,
                    body,
                });
            }
        }
    }
    // Unknown note IDs are a structural error, not a silent skip.
    for (ti, note) in note_lines.keys() {
        require_note(threads, *ti, *note)?;
    }
    for (ti, thread) in threads.iter().enumerate() {
        if let Some(body) = replies.get(&ti) {
            let body = normalize_body(body);
            if !body.is_empty() {
                out.push(EditInstruction::NewNote {
                    thread: thread.id.clone(),
                    reply_to: thread.first_note().map(|n| n.id),
                    body,
                });
            }
        }
    }
    for kind in state_changes {
        out.push(EditInstruction::StateChange { kind });
    }
    for body_lines in new_threads {
        let body = normalize_body(&body_lines.join("\n"));
        if !body.is_empty() {
            out.push(EditInstruction::NewThread { body });
        }
    }
    log::debug!("derived {} edit instructions", out.len());
    Ok(out)
}

fn require_note(threads: &[Thread], thread: usize, note: NoteId) -> Result<(), CodecError> {
    if threads[thread].note(note).is_none() {
        return Err(CodecError::UnknownNote {
            thread: threads[thread].id.to_string(),
            note: note.0,
        });
    }
    Ok(())
}

/// Resolve an anchor key to a thread index.
///
/// Unkeyed anchors (the all-zero sentinel) are matched positionally: the
/// n-th unkeyed anchor line joins the n-th unkeyed thread, which is what
/// lets a file without stable IDs still round-trip losslessly.
fn resolve_thread(
    threads: &[Thread],
    id: &str,
    unkeyed_seen: &mut usize,
    line: usize,
) -> Result<usize, CodecError> {
    let unkeyed = id.chars().all(|c| c == '0');
    if unkeyed {
        let found = threads
            .iter()
            .enumerate()
            .filter(|(_, t)| t.id.is_unkeyed())
            .nth(*unkeyed_seen)
            .map(|(i, _)| i);
        *unkeyed_seen += 1;
        return found.ok_or_else(|| CodecError::UnknownThread {
            line,
            id: id.to_string(),
        });
    }
    threads
        .iter()
        .position(|t| t.id.as_str() == id)
        .ok_or_else(|| CodecError::UnknownThread {
            line,
            id: id.to_string(),
        })
}

/// Parse the metadata header at the top of `rows`.
///
/// Returns the number of consumed rows and the patch of fields differing
/// from `snapshot`. With no snapshot (creating a new container) every
/// populated field lands in the patch.
pub fn parse_metadata_header(
    rows: &[&str],
    snapshot: Option<&MetadataSnapshot>,
) -> Result<(usize, MetadataPatch), CodecError> {
    let mut patch = MetadataPatch::default();
    if rows.is_empty() {
        return Ok((0, patch));
    }

    let title = rows[0];
    if snapshot.map_or(true, |s| s.title != title) {
        patch.title = Some(title.to_string());
    }
    if rows.len() < 2 {
        if snapshot.is_none() {
            patch.description = Some(String::new());
        }
        return Ok((rows.len(), patch));
    }
    if !rows[1].is_empty() {
        return Err(CodecError::MalformedHeader {
            line: 2,
            reason: "expected blank line after title".to_string(),
        });
    }

    let mut description: Vec<&str> = Vec::new();
    let mut j = 2;
    // Description runs until the first marker row.
    while j < rows.len() && rows[j].chars().next() != Some(MARKER) {
        description.push(rows[j]);
        j += 1;
    }
    // Marker field rows, in any order, until a non-field row.
    while j < rows.len() {
        let row = rows[j];
        if row.chars().next() != Some(MARKER) {
            break;
        }
        let Some((field, value)) = split_field(row) else {
            break; // lone sentinel or an unknown marker row
        };
        apply_field(&mut patch, snapshot, field, value, j + 1)?;
        j += 1;
    }

    let description = description.join("\n");
    let known = snapshot.map(|s| s.description.trim_end().to_string());
    if known.as_deref() != Some(description.trim_end()) {
        patch.description = Some(description.trim_end().to_string());
    }
    Ok((j, patch))
}

/// Known metadata fields, by their header prefix.
const FIELDS: &[&str] = &[
    "source_branch",
    "target_branch",
    "reviewers",
    "remove_source_branch",
    "assignees",
    "milestone",
    "labels",
    "state_event",
];

fn split_field(row: &str) -> Option<(&str, &str)> {
    let rest = row.strip_prefix(MARKER)?;
    let rest = rest.trim_start();
    for field in FIELDS {
        if let Some(value) = rest.strip_prefix(&format!("{field}:")) {
            return Some((field, value.trim()));
        }
    }
    None
}

fn apply_field(
    patch: &mut MetadataPatch,
    snapshot: Option<&MetadataSnapshot>,
    field: &str,
    value: &str,
    line: usize,
) -> Result<(), CodecError> {
    let list = |v: &str| -> Vec<String> {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    };
    match field {
        "source_branch" => {
            // Fixed once the container exists.
            if snapshot.is_none() {
                patch.source_branch = Some(value.to_string());
            }
        }
        "target_branch" => {
            if snapshot.map_or(true, |s| s.target_branch.as_deref() != Some(value)) {
                patch.target_branch = Some(value.to_string());
            }
        }
        "reviewers" => {
            if snapshot.map_or(true, |s| s.reviewers.join(",") != value) {
                patch.reviewers = Some(list(value));
            }
        }
        "assignees" => {
            if snapshot.map_or(true, |s| s.assignees.join(",") != value) {
                patch.assignees = Some(list(value));
            }
        }
        "milestone" => {
            if snapshot.map_or(true, |s| s.milestone.as_deref().unwrap_or("") != value) {
                patch.milestone = Some(value.to_string());
            }
        }
        "labels" => {
            if snapshot.map_or(true, |s| s.labels.join(",") != value) {
                patch.labels = Some(list(value));
            }
        }
        "remove_source_branch" => {
            let parsed = match value {
                "true" => true,
                "false" => false,
                other => {
                    return Err(CodecError::MalformedHeader {
                        line,
                        reason: format!("remove_source_branch must be true or false, got '{other}'"),
                    })
                }
            };
            if snapshot.map_or(true, |s| s.remove_source_branch != Some(parsed)) {
                patch.remove_source_branch = Some(parsed);
            }
        }
        "state_event" => {
            // Always a command, never compared to a snapshot.
            patch.state_event = Some(value.to_string());
        }
        _ => unreachable!("unknown field '{field}'"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{render_metadata, render_threads, terminator, ContextSource, NoContext};
    use pretty_assertions::assert_eq;
    use rf_model::{Anchor, ItemKind, Note, Resolution, ThreadId};

    fn note(id: u64, author: &str, body: &str) -> Note {
        Note {
            id: NoteId(id),
            author: author.to_string(),
            body: body.to_string(),
            commit: None,
            created_at: None,
        }
    }

    fn thread(id: &ThreadId, notes: Vec<Note>) -> Thread {
        Thread {
            id: id.clone(),
            notes,
            anchor: None,
            resolved: Resolution::Unresolved,
        }
    }

    fn snapshot() -> MetadataSnapshot {
        MetadataSnapshot {
            title: "Add widget".into(),
            description: "The widget.".into(),
            source_branch: Some("widget".into()),
            target_branch: Some("master".into()),
            assignees: vec!["alice".into()],
            reviewers: vec!["bob".into()],
            milestone: None,
            labels: vec![],
            remove_source_branch: Some(true),
        }
    }

    fn render_full(threads: &[Thread], snap: &MetadataSnapshot) -> String {
        let mut text = render_metadata(snap, ItemKind::MergeProposal);
        text.push_str(&render_threads(threads, "me", &mut NoContext));
        text.push_str(&terminator());
        text
    }

    const MR_OPTS: ParseOptions = ParseOptions {
        allow_resolution: true,
        allow_merge: true,
        has_header: true,
    };

    #[test]
    fn unedited_render_parses_to_nothing() {
        let tid = ThreadId::from("a".repeat(40).as_str());
        let threads = vec![thread(
            &tid,
            vec![
                note(1, "reviewer", "Question?"),
                note(2, "me", "Answer.\nWith detail."),
            ],
        )];
        let snap = snapshot();
        let text = render_full(&threads, &snap);
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        assert_eq!(instructions, vec![]);
    }

    #[test]
    fn edited_note_body_yields_edit_instruction() {
        let tid = ThreadId::from("a".repeat(40).as_str());
        let threads = vec![thread(&tid, vec![note(5, "me", "Old body")])];
        let snap = snapshot();
        let text = render_full(&threads, &snap).replace("Old body", "New body");
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        assert_eq!(
            instructions,
            vec![EditInstruction::EditNote {
                thread: tid,
                note: NoteId(5),
                body: "New body".into(),
            }]
        );
    }

    #[test]
    fn dedented_line_becomes_reply() {
        let tid = ThreadId::from("c".repeat(40).as_str());
        let threads = vec![thread(&tid, vec![note(5, "reviewer", "Question?")])];
        let snap = snapshot();
        let mut text = render_metadata(&snap, ItemKind::MergeProposal);
        text.push_str(&format!(
            "{}\n\t[reviewer] Question?\nGood point, fixing.\nSecond line.\n\n",
            tid
        ));
        text.push_str(&terminator());
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        assert_eq!(
            instructions,
            vec![EditInstruction::NewNote {
                thread: tid,
                reply_to: Some(NoteId(5)),
                body: "Good point, fixing.\nSecond line.".into(),
            }]
        );
    }

    #[test]
    fn foreign_tags_with_punctuated_authors_round_trip() {
        let tid = ThreadId::from("a".repeat(40).as_str());
        let threads = vec![thread(
            &tid,
            vec![
                note(5, "me", "Mine"),
                note(6, "user-name", "Their comment"),
                note(7, "first.last", "Another"),
            ],
        )];
        let snap = snapshot();
        let text = render_full(&threads, &snap);
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        // The hyphenated and dotted tags must read as note headers, not as
        // body text absorbed into the self-authored note above them.
        assert_eq!(instructions, vec![]);
    }

    #[test]
    fn text_after_sentinel_becomes_new_threads() {
        let snap = snapshot();
        let threads = vec![];
        let mut text = render_full(&threads, &snap);
        text.push_str("First new discussion.\n");
        text.push_str(&terminator());
        text.push_str("Second one.\nWith two lines.\n");
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        assert_eq!(
            instructions,
            vec![
                EditInstruction::NewThread {
                    body: "First new discussion.".into()
                },
                EditInstruction::NewThread {
                    body: "Second one.\nWith two lines.".into()
                },
            ]
        );
    }

    #[test]
    fn resolve_and_merge_tokens() {
        let tid = ThreadId::from("d".repeat(40).as_str());
        let threads = vec![thread(&tid, vec![note(5, "reviewer", "Fix this")])];
        let snap = snapshot();
        let mut text = render_metadata(&snap, ItemKind::MergeProposal);
        text.push_str(&format!("{}\nr\n!!!merge\n\t[reviewer] Fix this\n\n", tid));
        text.push_str(&terminator());
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        assert_eq!(
            instructions,
            vec![
                EditInstruction::SetResolved {
                    thread: tid,
                    resolved: true
                },
                EditInstruction::StateChange {
                    kind: StateChangeKind::Merge
                },
            ]
        );
    }

    #[test]
    fn resolution_tokens_are_text_when_unsupported() {
        let tid = ThreadId::from("d".repeat(40).as_str());
        let threads = vec![thread(&tid, vec![note(5, "reviewer", "Fix this")])];
        let snap = snapshot();
        let mut text = render_metadata(&snap, ItemKind::Issue);
        text.push_str(&format!("{}\n\t[reviewer] Fix this\nr\n\n", tid));
        text.push_str(&terminator());
        let opts = ParseOptions::default();
        let instructions = parse_working_text(&text, &threads, Some(&snap), &opts).unwrap();
        // Without resolution support, a bare "r" is just a one-letter reply.
        assert_eq!(
            instructions,
            vec![EditInstruction::NewNote {
                thread: tid,
                reply_to: Some(NoteId(5)),
                body: "r".into()
            }]
        );
    }

    #[test]
    fn delete_requires_active_note() {
        let tid = ThreadId::from("e".repeat(40).as_str());
        let threads = vec![thread(&tid, vec![note(5, "me", "Mine")])];
        let snap = snapshot();

        let mut text = render_metadata(&snap, ItemKind::MergeProposal);
        text.push_str(&format!("{}\n!!!delete\n\n", tid));
        text.push_str(&terminator());
        let err = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap_err();
        assert!(matches!(err, CodecError::CommandWithoutNote { .. }));

        let mut text = render_metadata(&snap, ItemKind::MergeProposal);
        text.push_str(&format!("{}\n\t[5] Mine\n!!!delete\n\n", tid));
        text.push_str(&terminator());
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        assert_eq!(
            instructions,
            vec![EditInstruction::DeleteNote {
                thread: tid,
                note: NoteId(5)
            }]
        );
    }

    #[test]
    fn unknown_thread_anchor_is_fatal() {
        let snap = snapshot();
        let mut text = render_metadata(&snap, ItemKind::MergeProposal);
        text.push_str(&format!("{}\n", "f".repeat(40)));
        text.push_str(&terminator());
        let err = parse_working_text(&text, &[], Some(&snap), &MR_OPTS).unwrap_err();
        assert!(matches!(err, CodecError::UnknownThread { .. }));
    }

    #[test]
    fn unknown_note_id_is_fatal() {
        let tid = ThreadId::from("a".repeat(40).as_str());
        let threads = vec![thread(&tid, vec![note(5, "me", "Mine")])];
        let snap = snapshot();
        let mut text = render_metadata(&snap, ItemKind::MergeProposal);
        text.push_str(&format!("{}\n\t[99] Nonexistent\n\n", tid));
        text.push_str(&terminator());
        let err = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap_err();
        assert!(matches!(err, CodecError::UnknownNote { note: 99, .. }));
    }

    #[test]
    fn unkeyed_anchors_match_positionally() {
        let unkeyed = ThreadId::unkeyed();
        let threads = vec![
            thread(&unkeyed, vec![note(1, "reviewer", "First thread")]),
            thread(&unkeyed, vec![note(2, "reviewer", "Second thread")]),
        ];
        let snap = snapshot();
        let mut text = render_metadata(&snap, ItemKind::MergeProposal);
        text.push_str(&format!(
            "{id}\n\t[reviewer] First thread\nreply one\n\n{id}\n\t[reviewer] Second thread\nreply two\n\n",
            id = unkeyed
        ));
        text.push_str(&terminator());
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        // The placeholder thread IDs are identical; the first-note IDs are
        // what keep the two replies routable.
        assert_eq!(
            instructions,
            vec![
                EditInstruction::NewNote {
                    thread: unkeyed.clone(),
                    reply_to: Some(NoteId(1)),
                    body: "reply one".into()
                },
                EditInstruction::NewNote {
                    thread: unkeyed,
                    reply_to: Some(NoteId(2)),
                    body: "reply two".into()
                },
            ]
        );
    }

    #[test]
    fn metadata_diff_against_snapshot_only() {
        let snap = snapshot();
        let threads = vec![];
        let text = render_full(&threads, &snap).replace("Add widget", "Add better widget");
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        assert_eq!(
            instructions,
            vec![EditInstruction::MetadataUpdate {
                fields: MetadataPatch {
                    title: Some("Add better widget".into()),
                    ..Default::default()
                }
            }]
        );
    }

    #[test]
    fn metadata_header_for_create_collects_everything() {
        let text = format!(
            "New proposal\n\nDoes things.\n\
             {MARKER} source_branch: feature\n\
             {MARKER} target_branch: master\n\
             {MARKER} reviewers: bob\n\
             {MARKER} assignees: alice\n\
             {MARKER} milestone: \n\
             {MARKER}    labels: x,y\n"
        );
        let rows: Vec<&str> = text.lines().collect();
        let (consumed, patch) = parse_metadata_header(&rows, None).unwrap();
        assert_eq!(consumed, rows.len());
        assert_eq!(patch.title, Some("New proposal".into()));
        assert_eq!(patch.description, Some("Does things.".into()));
        assert_eq!(patch.source_branch, Some("feature".into()));
        assert_eq!(patch.target_branch, Some("master".into()));
        assert_eq!(patch.labels, Some(vec!["x".into(), "y".into()]));
        assert_eq!(patch.milestone, Some("".into()));
    }

    #[test]
    fn headerless_text_parses_threads_only() {
        let tid = ThreadId::from("a".repeat(40).as_str());
        let threads = vec![thread(&tid, vec![note(5, "reviewer", "Old remark")])];
        let opts = ParseOptions {
            has_header: false,
            ..MR_OPTS
        };
        let text = format!("{}\n\t[reviewer] Old remark\nstill relevant?\n\n", tid);
        let instructions = parse_working_text(&text, &threads, None, &opts).unwrap();
        assert_eq!(
            instructions,
            vec![EditInstruction::NewNote {
                thread: tid,
                reply_to: Some(NoteId(5)),
                body: "still relevant?".into()
            }]
        );
    }

    #[test]
    fn lone_tab_is_an_explicit_blank_line() {
        let tid = ThreadId::from("a".repeat(40).as_str());
        let threads = vec![thread(&tid, vec![note(5, "me", "para one\n\npara two")])];
        let snap = snapshot();
        let mut text = render_metadata(&snap, ItemKind::MergeProposal);
        text.push_str(&format!("{}\n\t[5] para one\n\t\n\t\tpara two\n\n", tid));
        text.push_str(&terminator());
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        // Body matches the snapshot once normalized, so no edit.
        assert_eq!(instructions, vec![]);
    }

    #[test]
    fn context_lines_are_ignored() {
        let tid = ThreadId::from("b".repeat(40).as_str());
        let mut t = thread(&tid, vec![note(5, "reviewer", "Hm")]);
        t.anchor = Some(Anchor {
            base: "x".into(),
            start: "x".into(),
            head: "y".into(),
            old_path: "a.txt".into(),
            new_path: "a.txt".into(),
            old_line: None,
            new_line: Some(3),
        });
        let threads = vec![t];
        let snap = snapshot();
        let mut text = render_metadata(&snap, ItemKind::MergeProposal);
        text.push_str(&format!(
            "a.txt:3: {}\n deadbee Add things\n one\n+two\n-three\n\t[reviewer] Hm\n\n",
            tid
        ));
        text.push_str(&terminator());
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        assert_eq!(instructions, vec![]);
    }

    struct PlaceholderContext;

    impl ContextSource for PlaceholderContext {
        fn thread_context(&mut self, _anchor: &Anchor) -> String {
            " ? missing commits aaa or bbb\n".to_string()
        }

        fn commit_summary(&mut self, _commit: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn placeholder_context_still_round_trips() {
        let tid = ThreadId::from("b".repeat(40).as_str());
        let mut t = thread(&tid, vec![note(5, "reviewer", "Hm")]);
        t.anchor = Some(Anchor {
            base: "aaa".into(),
            start: "aaa".into(),
            head: "bbb".into(),
            old_path: "a.txt".into(),
            new_path: "a.txt".into(),
            old_line: None,
            new_line: Some(3),
        });
        let threads = vec![t];
        let snap = snapshot();
        let mut text = render_metadata(&snap, ItemKind::MergeProposal);
        text.push_str(&render_threads(&threads, "me", &mut PlaceholderContext));
        text.push_str(&terminator());
        let instructions = parse_working_text(&text, &threads, Some(&snap), &MR_OPTS).unwrap();
        assert_eq!(instructions, vec![]);
    }
}
