//! On-disk layout of the mirror directory.
//!
//! Every open container owns one directory under the mirror root: merge
//! proposals live at `<root>/<source-branch>/`, issues at `<root>/i/<n>/`.
//! File names inside a container directory are fixed so that every tool
//! pass (fetch, submit, merge) addresses the same artifacts.

use rf_model::ContainerRef;
use std::path::{Path, PathBuf};

/// Path helpers rooted at the mirror directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one container's mirror files.
    pub fn container_dir(&self, container: &ContainerRef) -> PathBuf {
        match container {
            ContainerRef::Branch(branch) => self.root.join(branch),
            ContainerRef::Issue(n) => self.root.join("i").join(n.to_string()),
        }
    }

    /// The editable working copy of the unresolved discussion.
    pub fn working_file(&self, container: &ContainerRef) -> PathBuf {
        self.container_dir(container).join("comments.rf")
    }

    /// Last rendered remote state; the merge ancestor. Hidden so that a
    /// directory listing shows only files meant for editing.
    pub fn pristine_file(&self, container: &ContainerRef) -> PathBuf {
        self.container_dir(container).join(".pristine")
    }

    /// Threads the backend cannot resolve and other read-only residue.
    pub fn meta_file(&self, container: &ContainerRef) -> PathBuf {
        self.container_dir(container).join("meta.rf")
    }

    /// Resolved threads, kept out of the working file but still editable.
    pub fn resolved_file(&self, container: &ContainerRef) -> PathBuf {
        self.container_dir(container).join("resolved.rf")
    }

    /// Pending review comment drafts.
    pub fn review_file(&self, container: &ContainerRef) -> PathBuf {
        self.container_dir(container).join("review.rf")
    }

    /// Raw remote discussions snapshot backing the structural diff.
    pub fn snapshot_file(&self, container: &ContainerRef) -> PathBuf {
        self.container_dir(container).join(".discussions.json")
    }

    /// Per-container item record (kind, number, metadata, URL).
    pub fn item_file(&self, container: &ContainerRef) -> PathBuf {
        self.container_dir(container).join(".item.json")
    }

    pub fn users_file(&self) -> PathBuf {
        self.root.join(".users.json")
    }

    pub fn milestones_file(&self) -> PathBuf {
        self.root.join(".milestones.json")
    }

    pub fn labels_file(&self) -> PathBuf {
        self.root.join(".labels.json")
    }

    /// Snapshot of all open items, taken at the last full fetch.
    pub fn items_file(&self) -> PathBuf {
        self.root.join(".items.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn branch_and_issue_directories() {
        let layout = Layout::new("/repo/rf");
        let mr = ContainerRef::Branch("widget".into());
        let issue = ContainerRef::Issue(12);
        assert_eq!(layout.container_dir(&mr), PathBuf::from("/repo/rf/widget"));
        assert_eq!(layout.container_dir(&issue), PathBuf::from("/repo/rf/i/12"));
        assert_eq!(
            layout.working_file(&mr),
            PathBuf::from("/repo/rf/widget/comments.rf")
        );
        assert_eq!(
            layout.pristine_file(&issue),
            PathBuf::from("/repo/rf/i/12/.pristine")
        );
    }

    #[test]
    fn global_files_live_at_the_root() {
        let layout = Layout::new("rf");
        assert_eq!(layout.items_file(), PathBuf::from("rf/.items.json"));
        assert_eq!(layout.users_file(), PathBuf::from("rf/.users.json"));
    }
}
