//! # rf-model
//!
//! Data model shared across the review-fs workspace: discussion threads and
//! notes as fetched from a remote review service, the edit instructions
//! derived from user-edited text, and the backend dialect capability
//! interface that abstracts over the two supported remote protocols.
//!
//! This crate is intentionally free of I/O. Transport, git access and file
//! persistence live in the crates that consume these types.

pub mod dialect;
pub mod edit;
pub mod types;

pub use dialect::{
    CountedDialect, Dialect, PositionScheme, ResolutionSupport, StructuredDialect, UserResolver,
};
pub use edit::{EditInstruction, GuardedField, MetadataPatch, StateChangeKind};
pub use types::{
    Anchor, ContainerRef, Item, ItemKind, MetadataSnapshot, Note, NoteId, Pipeline,
    PipelineStatus, Resolution, Thread, ThreadId,
};
