//! Compile edit instructions into remote mutations.
//!
//! One instruction becomes at most one remote call. Structural failures
//! (unknown thread or note) abort the whole batch before any mutation is
//! sent; per-field concurrency mismatches only drop the stale field.

use crate::remote::Remote;
use anyhow::{bail, Result};
use rf_codec::normalize_body;
use rf_model::{
    Dialect, EditInstruction, GuardedField, Item, MetadataPatch, MetadataSnapshot,
    ResolutionSupport, StateChangeKind, Thread, UserResolver,
};

/// What a compiled batch touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOutcome {
    /// Any remote mutation was sent; discussions should be refetched.
    pub changed: bool,
    /// Item metadata or state changed; the open-item list is stale.
    pub metadata_changed: bool,
}

/// Apply `instructions` against the remote, diffing note bodies and
/// resolution flags against `threads` so that no-op mutations are skipped.
pub fn compile(
    remote: &mut dyn Remote,
    dialect: &dyn Dialect,
    resolver: &dyn UserResolver,
    item: &Item,
    threads: &[Thread],
    instructions: Vec<EditInstruction>,
) -> Result<CompileOutcome> {
    let mut outcome = CompileOutcome::default();

    for instruction in instructions {
        match instruction {
            EditInstruction::NewThread { body } => {
                remote.create_discussion(item, &body, None)?;
                outcome.changed = true;
            }
            EditInstruction::NewNote {
                thread,
                reply_to,
                body,
            } => {
                remote.create_note(item, &thread, reply_to, &body)?;
                outcome.changed = true;
            }
            EditInstruction::EditNote { thread, note, body } => {
                let current = threads
                    .iter()
                    .find(|t| t.id == thread)
                    .and_then(|t| t.note(note));
                let Some(current) = current else {
                    bail!("note {} in thread {} no longer exists", note, thread);
                };
                if normalize_body(&current.body) != body {
                    remote.update_note(item, &thread, note, &body)?;
                    outcome.changed = true;
                }
            }
            EditInstruction::DeleteNote { thread, note } => {
                remote.delete_note(item, &thread, note)?;
                outcome.changed = true;
            }
            EditInstruction::SetResolved { thread, resolved } => {
                if dialect.resolution_support() == ResolutionSupport::Unsupported {
                    bail!("backend '{}' cannot resolve threads", dialect.name());
                }
                let current = threads.iter().find(|t| t.id == thread);
                let Some(current) = current else {
                    bail!("thread {} no longer exists", thread);
                };
                if current.resolved.is_resolved() != resolved {
                    remote.set_resolved(item, &thread, resolved)?;
                    outcome.changed = true;
                }
            }
            EditInstruction::StateChange { kind } => {
                match kind {
                    StateChangeKind::Merge => {
                        let updated = remote.merge_item(item)?;
                        log::info!("merged {}", updated.container());
                    }
                    StateChangeKind::Close | StateChangeKind::Reopen => {
                        remote.set_state(item, kind)?;
                    }
                }
                outcome.changed = true;
                outcome.metadata_changed = true;
            }
            EditInstruction::MetadataUpdate { mut fields } => {
                guard_metadata(remote, item, &mut fields)?;
                if fields.is_empty() {
                    continue;
                }
                let payload = dialect.metadata_payload(&fields, resolver);
                remote.update_metadata(item, &payload)?;
                outcome.changed = true;
                outcome.metadata_changed = true;
            }
        }
    }
    Ok(outcome)
}

/// Drop patch fields whose remote value moved since the last fetch.
///
/// The patch was computed against the snapshot taken at fetch time. If the
/// live value of a field no longer matches that snapshot, someone else
/// changed it in between and our edit would overwrite theirs unseen; that
/// field is dropped and the rest of the patch proceeds.
fn guard_metadata(remote: &mut dyn Remote, item: &Item, patch: &mut MetadataPatch) -> Result<()> {
    let guarded = patch.guarded_fields();
    if guarded.is_empty() {
        return Ok(());
    }
    let fresh = remote.fetch_item(item.kind, item.number)?;
    for field in guarded {
        let known = field_value(&item.metadata, field);
        let live = field_value(&fresh.metadata, field);
        if known != live {
            log::warn!(
                "{}: '{}' changed remotely, keeping theirs",
                item.container(),
                field.name()
            );
            patch.clear(field);
        }
    }
    Ok(())
}

fn field_value(snapshot: &MetadataSnapshot, field: GuardedField) -> String {
    match field {
        GuardedField::Title => snapshot.title.clone(),
        GuardedField::Description => snapshot.description.trim_end().to_string(),
        GuardedField::TargetBranch => snapshot.target_branch.clone().unwrap_or_default(),
        GuardedField::Labels => snapshot.labels.join(","),
    }
}
