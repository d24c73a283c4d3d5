//! Edit instructions derived from user-edited text.
//!
//! Instructions are produced purely by structural diff between the parsed
//! working text and the last-known remote snapshot; they carry everything
//! the compiler needs to emit exactly one remote mutation each.

use crate::types::{NoteId, ThreadId};
use serde::{Deserialize, Serialize};

/// A single reconciled difference between the working text and the
/// last-known remote state.
#[derive(Debug, Clone, PartialEq)]
pub enum EditInstruction {
    /// Open a new discussion with the given body.
    NewThread { body: String },
    /// Reply to an existing thread.
    ///
    /// `reply_to` is the thread's first note. Backends without stable
    /// thread IDs address replies by note, and the all-zero placeholder
    /// in `thread` cannot tell two such threads apart.
    NewNote {
        thread: ThreadId,
        reply_to: Option<NoteId>,
        body: String,
    },
    /// Replace the body of an existing note.
    EditNote {
        thread: ThreadId,
        note: NoteId,
        body: String,
    },
    /// Delete an existing note.
    DeleteNote { thread: ThreadId, note: NoteId },
    /// Resolve or unresolve a thread.
    SetResolved { thread: ThreadId, resolved: bool },
    /// Merge, close or reopen the container itself.
    StateChange { kind: StateChangeKind },
    /// Update container metadata; only changed fields are present.
    MetadataUpdate { fields: MetadataPatch },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateChangeKind {
    Merge,
    Close,
    Reopen,
}

/// Changed metadata fields, each `Some` only when the edited value differs
/// from the last-known remote snapshot.
///
/// An empty assignee/reviewer/label list is a meaningful "clear" request,
/// so collection fields use `Option<Vec<_>>` rather than emptiness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Only meaningful when creating a merge proposal; existing containers
    /// never change their source branch.
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub assignees: Option<Vec<String>>,
    pub reviewers: Option<Vec<String>>,
    pub milestone: Option<String>,
    pub labels: Option<Vec<String>>,
    pub remove_source_branch: Option<bool>,
    /// Raw state event ("close" / "reopen") from the metadata header.
    pub state_event: Option<String>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        *self == MetadataPatch::default()
    }

    /// Fields subject to the optimistic-concurrency check before submit.
    ///
    /// ID-mapped fields (assignees, reviewers, milestone) and state events
    /// are excluded; their remote representation is not comparable to the
    /// local text form.
    pub fn guarded_fields(&self) -> Vec<GuardedField> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push(GuardedField::Title);
        }
        if self.description.is_some() {
            fields.push(GuardedField::Description);
        }
        if self.target_branch.is_some() {
            fields.push(GuardedField::TargetBranch);
        }
        if self.labels.is_some() {
            fields.push(GuardedField::Labels);
        }
        fields
    }

    /// Drop one guarded field from the patch after a concurrency mismatch.
    pub fn clear(&mut self, field: GuardedField) {
        match field {
            GuardedField::Title => self.title = None,
            GuardedField::Description => self.description = None,
            GuardedField::TargetBranch => self.target_branch = None,
            GuardedField::Labels => self.labels = None,
        }
    }
}

/// Metadata fields whose previously-known value is asserted against the
/// live remote value before an update is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedField {
    Title,
    Description,
    TargetBranch,
    Labels,
}

impl GuardedField {
    pub fn name(&self) -> &'static str {
        match self {
            GuardedField::Title => "title",
            GuardedField::Description => "description",
            GuardedField::TargetBranch => "target_branch",
            GuardedField::Labels => "labels",
        }
    }
}
