//! # rf-engine
//!
//! Orchestration between the remote backend and the local mirror
//! directory. The engine fetches open items and their discussions, renders
//! them through the codec into per-container files, reconciles concurrent
//! edits with a three-way merge, and compiles edited text back into the
//! minimal set of remote mutations.
//!
//! Transport is not this crate's concern: callers hand in an
//! implementation of the [`Remote`] trait and the engine stays free of
//! HTTP, auth and pagination details.

pub mod compile;
pub mod engine;
pub mod poll;
pub mod reconcile;
pub mod remote;
pub mod store;

pub use compile::{compile, CompileOutcome};
pub use engine::Engine;
pub use poll::{poll_pipeline, PollOutcome};
pub use reconcile::{reconcile, MergeOutcome};
pub use remote::{Milestone, PositionPayload, Remote, RemoteUser};
pub use store::{Store, StoreResolver};
