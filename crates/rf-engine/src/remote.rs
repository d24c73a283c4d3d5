//! Remote backend trait
//!
//! This module defines the blocking `Remote` trait the engine drives.
//! Implementations are transport adapters (HTTP client, recorded fixtures,
//! in-memory fakes for tests); pagination and auth live entirely on their
//! side of the boundary, the engine only ever sees complete collections.

use anyhow::Result;
use rf_model::{Anchor, Item, ItemKind, NoteId, Pipeline, StateChangeKind, Thread, ThreadId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A backend user, for mapping usernames to wire IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: u64,
    pub username: String,
}

/// A backend milestone, for mapping titles to wire IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: u64,
    pub title: String,
}

/// Wire position attached to a new anchored discussion, in whichever
/// scheme the active dialect uses.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionPayload {
    /// SHA triple plus paths and lines, with the idempotent content-hash
    /// key some backends require alongside the anchor.
    Structured { anchor: Anchor, key: String },
    /// Single offset counted over the review diff of one file.
    Counted {
        commit: String,
        path: String,
        offset: u32,
    },
}

/// Blocking remote backend interface.
///
/// Every method returns `anyhow::Result`; transport failures abort the
/// current engine command without retry. Methods take `&mut self` so that
/// adapters may keep connection or pagination state without interior
/// mutability.
pub trait Remote {
    /// All open merge proposals, newest first.
    fn list_merge_proposals(&mut self) -> Result<Vec<Item>>;

    /// All open issues, newest first.
    fn list_issues(&mut self) -> Result<Vec<Item>>;

    /// Fresh metadata snapshot of one item.
    fn fetch_item(&mut self, kind: ItemKind, number: u64) -> Result<Item>;

    /// All discussion threads of one item, oldest first.
    fn fetch_discussions(&mut self, item: &Item) -> Result<Vec<Thread>>;

    /// Open a new discussion, optionally anchored to a diff position.
    fn create_discussion(
        &mut self,
        item: &Item,
        body: &str,
        position: Option<&PositionPayload>,
    ) -> Result<()>;

    /// Append a note to an existing thread.
    ///
    /// `reply_to` is the thread's first note; adapters for backends that
    /// address replies by note rather than thread use it instead of the
    /// thread ID.
    fn create_note(
        &mut self,
        item: &Item,
        thread: &ThreadId,
        reply_to: Option<NoteId>,
        body: &str,
    ) -> Result<()>;

    /// Replace the body of an existing note.
    fn update_note(&mut self, item: &Item, thread: &ThreadId, note: NoteId, body: &str)
        -> Result<()>;

    fn delete_note(&mut self, item: &Item, thread: &ThreadId, note: NoteId) -> Result<()>;

    fn set_resolved(&mut self, item: &Item, thread: &ThreadId, resolved: bool) -> Result<()>;

    /// Apply a dialect-encoded metadata payload; returns the updated item.
    fn update_metadata(&mut self, item: &Item, payload: &Value) -> Result<Item>;

    /// Create a new item from a dialect-encoded payload.
    fn create_item(&mut self, kind: ItemKind, payload: &Value) -> Result<Item>;

    /// Merge a merge proposal.
    fn merge_item(&mut self, item: &Item) -> Result<Item>;

    /// Close or reopen an item.
    fn set_state(&mut self, item: &Item, kind: StateChangeKind) -> Result<Item>;

    fn list_users(&mut self) -> Result<Vec<RemoteUser>>;

    fn list_milestones(&mut self) -> Result<Vec<Milestone>>;

    fn list_labels(&mut self) -> Result<Vec<String>>;

    /// Latest pipeline of a merge proposal's current head, if any.
    fn latest_pipeline(&mut self, item: &Item) -> Result<Option<Pipeline>>;

    /// Re-run a failed or canceled pipeline.
    fn retry_pipeline(&mut self, item: &Item, pipeline: &Pipeline) -> Result<Pipeline>;
}
