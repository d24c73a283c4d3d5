//! Three-way reconciliation of the working file with fresh remote text.
//!
//! The pristine copy is the common ancestor: it holds exactly what the
//! last fetch rendered. Local edits live in the working file, remote
//! changes arrive as newly rendered text, and a classic three-way merge
//! combines them. Conflicts are never auto-resolved; the standard conflict
//! markers land in the working file for the user to settle.

use crate::store::Store;
use anyhow::Result;
use rf_model::ContainerRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local file existed; working and pristine seeded from the render.
    Seeded,
    /// Merge applied without conflicts.
    Clean,
    /// Conflict markers written into the working file.
    Conflicted,
}

/// Merge freshly rendered remote text into a container's working file and
/// advance the pristine copy.
pub fn reconcile(store: &Store, container: &ContainerRef, rendered: &str) -> Result<MergeOutcome> {
    let working_path = store.layout().working_file(container);
    let pristine_path = store.layout().pristine_file(container);

    let working = store.read_text(&working_path)?;
    let pristine = store.read_text(&pristine_path)?;

    let outcome = match (working, pristine) {
        (Some(working), Some(pristine)) => {
            let (merged, outcome) = match diffy::merge(&pristine, &working, rendered) {
                Ok(merged) => (merged, MergeOutcome::Clean),
                Err(conflicted) => (conflicted, MergeOutcome::Conflicted),
            };
            store.write_text(&working_path, &merged)?;
            outcome
        }
        _ => {
            // First fetch of this container.
            store.write_text(&working_path, rendered)?;
            MergeOutcome::Seeded
        }
    };
    if outcome == MergeOutcome::Conflicted {
        log::warn!("merge conflict in {}", working_path.display());
    }
    store.write_text(&pristine_path, rendered)?;
    Ok(outcome)
}
