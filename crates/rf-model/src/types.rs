//! Discussion data transfer objects.
//!
//! These types mirror what the remote review service returns. They are
//! persisted verbatim as the per-container snapshot (`discussions.json`)
//! and serve as the reference point when user edits are diffed back into
//! instructions, so every field that influences rendering or comparison
//! round-trips through serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a discussion thread.
///
/// Backends with stable discussion IDs use a 40-hex-char token; backends
/// without stable IDs get the fixed unkeyed sentinel so that rendered
/// threads still carry an immutable join key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    /// The sentinel key used when the backend has no stable thread IDs.
    pub fn unkeyed() -> Self {
        ThreadId("0".repeat(40))
    }

    pub fn is_unkeyed(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        ThreadId(s.to_string())
    }
}

/// Identifier of a single note within a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub u64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Resolution state of a thread.
///
/// `NotApplicable` covers threads from a dialect that does not support
/// resolution at all; it is an explicit capability gap, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Resolved,
    Unresolved,
    NotApplicable,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved)
    }
}

/// Where a thread attaches in a diff, in the structured (SHA-based) form.
///
/// `old_line` is absent for pure additions, `new_line` for pure deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub base: String,
    pub start: String,
    pub head: String,
    pub old_path: String,
    pub new_path: String,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
}

impl Anchor {
    /// Path shown to the user: the post-rename name when present.
    pub fn display_path(&self) -> &str {
        if self.new_path.is_empty() {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    /// Line shown to the user: the new-side line when present.
    pub fn display_line(&self) -> Option<u32> {
        self.new_line.or(self.old_line)
    }
}

/// One message within a thread, ordered by arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub author: String,
    pub body: String,
    /// Commit the note was made against, if any.
    pub commit: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A top-level discussion, optionally anchored to a file and line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub notes: Vec<Note>,
    pub anchor: Option<Anchor>,
    pub resolved: Resolution,
}

impl Thread {
    /// The first note carries position and resolution on the wire.
    pub fn first_note(&self) -> Option<&Note> {
        self.notes.first()
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }
}

/// Last-known remote metadata of an issue or merge proposal.
///
/// Branch and review fields are only populated for merge proposals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub title: String,
    pub description: String,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub reviewers: Vec<String>,
    pub milestone: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub remove_source_branch: Option<bool>,
}

/// Container kind: plain issue or merge proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Issue,
    MergeProposal,
}

/// An open issue or merge proposal as listed by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub kind: ItemKind,
    pub number: u64,
    pub metadata: MetadataSnapshot,
    pub web_url: Option<String>,
}

impl Item {
    /// The local container key for this item.
    pub fn container(&self) -> ContainerRef {
        match (self.kind, &self.metadata.source_branch) {
            (ItemKind::MergeProposal, Some(branch)) => ContainerRef::Branch(branch.clone()),
            _ => ContainerRef::Issue(self.number),
        }
    }
}

/// How a container is addressed locally: merge proposals by source branch,
/// issues by number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerRef {
    Branch(String),
    Issue(u64),
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRef::Branch(b) => f.write_str(b),
            ContainerRef::Issue(n) => write!(f, "i/{n}"),
        }
    }
}

/// A CI pipeline attached to a merge proposal, for the retry loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    pub sha: String,
    pub status: PipelineStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Success,
    Failed,
    Canceled,
    Running,
    Pending,
    /// Never ran and never will (e.g. rules excluded every job); retrying
    /// is pointless.
    Skipped,
}

impl PipelineStatus {
    /// Whether the retry loop may re-run this pipeline.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineStatus::Failed | PipelineStatus::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unkeyed_thread_id_is_forty_zeroes() {
        let id = ThreadId::unkeyed();
        assert_eq!(id.as_str().len(), 40);
        assert!(id.is_unkeyed());
        assert!(!ThreadId::from("ab".repeat(20).as_str()).is_unkeyed());
    }

    #[test]
    fn anchor_display_prefers_new_side() {
        let anchor = Anchor {
            base: "b".into(),
            start: "b".into(),
            head: "h".into(),
            old_path: "old.rs".into(),
            new_path: "new.rs".into(),
            old_line: Some(3),
            new_line: Some(7),
        };
        assert_eq!(anchor.display_path(), "new.rs");
        assert_eq!(anchor.display_line(), Some(7));
    }

    #[test]
    fn container_ref_for_merge_proposal_uses_branch() {
        let item = Item {
            kind: ItemKind::MergeProposal,
            number: 4,
            metadata: MetadataSnapshot {
                source_branch: Some("feature/x".into()),
                ..Default::default()
            },
            web_url: None,
        };
        assert_eq!(item.container(), ContainerRef::Branch("feature/x".into()));

        let issue = Item {
            kind: ItemKind::Issue,
            number: 9,
            metadata: MetadataSnapshot::default(),
            web_url: None,
        };
        assert_eq!(issue.container(), ContainerRef::Issue(9));
        assert_eq!(issue.container().to_string(), "i/9");
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let snapshot = MetadataSnapshot {
            title: "Add widget".into(),
            description: "Long text".into(),
            source_branch: Some("widget".into()),
            target_branch: Some("master".into()),
            assignees: vec!["alice".into()],
            reviewers: vec!["bob".into()],
            milestone: Some("1.0".into()),
            labels: vec!["feature".into()],
            remove_source_branch: Some(true),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: MetadataSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
