//! Persistence of mirror files and backend caches.
//!
//! Everything the engine keeps between invocations goes through here: the
//! per-container text files and discussion snapshots, the global open-item
//! list, and the user/milestone/label caches. All writes are wholesale
//! overwrites; there is no partial update of any artifact.

use crate::remote::{Milestone, Remote, RemoteUser};
use anyhow::{Context, Result};
use rf_config::Layout;
use rf_model::{ContainerRef, Item, Thread, UserResolver};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

pub struct Store {
    layout: Layout,
}

impl Store {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Read a text artifact, `None` if it does not exist yet.
    pub fn read_text(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Write a text artifact, creating parent directories as needed.
    pub fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }

    /// Delete an artifact if present.
    pub fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let Some(text) = self.read_text(path)? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value)?;
        self.write_text(path, &text)
    }

    pub fn load_snapshot(&self, container: &ContainerRef) -> Result<Option<Vec<Thread>>> {
        self.read_json(&self.layout.snapshot_file(container))
    }

    pub fn save_snapshot(&self, container: &ContainerRef, threads: &[Thread]) -> Result<()> {
        self.write_json(&self.layout.snapshot_file(container), &threads)
    }

    pub fn load_item(&self, container: &ContainerRef) -> Result<Option<Item>> {
        self.read_json(&self.layout.item_file(container))
    }

    pub fn save_item(&self, item: &Item) -> Result<()> {
        self.write_json(&self.layout.item_file(&item.container()), item)
    }

    pub fn load_items(&self) -> Result<Option<Vec<Item>>> {
        self.read_json(&self.layout.items_file())
    }

    pub fn save_items(&self, items: &[Item]) -> Result<()> {
        self.write_json(&self.layout.items_file(), &items)
    }

    /// Replace one entry of the open-item list in place after a mutation.
    pub fn update_item_list(&self, item: &Item) -> Result<()> {
        let mut items = self.load_items()?.unwrap_or_default();
        match items
            .iter_mut()
            .find(|i| i.kind == item.kind && i.number == item.number)
        {
            Some(entry) => *entry = item.clone(),
            None => items.push(item.clone()),
        }
        self.save_items(&items)
    }

    /// Look up a username, refetching the user cache once on a miss.
    pub fn lookup_user(&self, remote: &mut dyn Remote, username: &str) -> Result<Option<u64>> {
        let cached: Option<Vec<RemoteUser>> = self.read_json(&self.layout.users_file())?;
        if let Some(users) = &cached {
            if let Some(user) = users.iter().find(|u| u.username == username) {
                return Ok(Some(user.id));
            }
        }
        let users = remote.list_users()?;
        self.write_json(&self.layout.users_file(), &users)?;
        let found = users.iter().find(|u| u.username == username).map(|u| u.id);
        if found.is_none() {
            log::warn!("unknown user '{}'", username);
        }
        Ok(found)
    }

    /// Look up a milestone title, refetching the cache once on a miss.
    pub fn milestone_id(&self, remote: &mut dyn Remote, title: &str) -> Result<Option<u64>> {
        let cached: Option<Vec<Milestone>> = self.read_json(&self.layout.milestones_file())?;
        if let Some(milestones) = &cached {
            if let Some(m) = milestones.iter().find(|m| m.title == title) {
                return Ok(Some(m.id));
            }
        }
        let milestones = remote.list_milestones()?;
        self.write_json(&self.layout.milestones_file(), &milestones)?;
        let found = milestones.iter().find(|m| m.title == title).map(|m| m.id);
        if found.is_none() {
            log::warn!("unknown milestone '{}'", title);
        }
        Ok(found)
    }

    pub fn save_labels(&self, labels: &[String]) -> Result<()> {
        self.write_json(&self.layout.labels_file(), &labels)
    }

    /// Snapshot the current caches into an infallible resolver for payload
    /// encoding. Callers warm the caches through [`Store::lookup_user`] and
    /// [`Store::milestone_id`] first.
    pub fn resolver(&self) -> Result<StoreResolver> {
        let users: Vec<RemoteUser> = self
            .read_json(&self.layout.users_file())?
            .unwrap_or_default();
        let milestones: Vec<Milestone> = self
            .read_json(&self.layout.milestones_file())?
            .unwrap_or_default();
        Ok(StoreResolver {
            users: users.into_iter().map(|u| (u.username, u.id)).collect(),
            milestones: milestones.into_iter().map(|m| (m.title, m.id)).collect(),
        })
    }

    /// Delete container directories whose item is no longer open.
    ///
    /// Returns the removed containers. Unknown files at the mirror root are
    /// left alone; only directories the layout itself would have created
    /// are candidates.
    pub fn delete_retired(&self, open: &[Item]) -> Result<Vec<ContainerRef>> {
        let keep: HashSet<ContainerRef> = open.iter().map(|i| i.container()).collect();
        let mut removed = Vec::new();

        let root = self.layout.root();
        for entry in read_dir_if_exists(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "i" || name.starts_with('.') {
                continue;
            }
            let container = ContainerRef::Branch(name);
            if !keep.contains(&container) {
                fs::remove_dir_all(entry.path())
                    .with_context(|| format!("removing {}", entry.path().display()))?;
                removed.push(container);
            }
        }

        for entry in read_dir_if_exists(&root.join("i"))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Ok(number) = entry.file_name().to_string_lossy().parse::<u64>() else {
                continue;
            };
            let container = ContainerRef::Issue(number);
            if !keep.contains(&container) {
                fs::remove_dir_all(entry.path())
                    .with_context(|| format!("removing {}", entry.path().display()))?;
                removed.push(container);
            }
        }

        for container in &removed {
            log::info!("retired {}", container);
        }
        Ok(removed)
    }
}

fn read_dir_if_exists(path: &Path) -> Result<Box<dyn Iterator<Item = std::io::Result<fs::DirEntry>>>> {
    match fs::read_dir(path) {
        Ok(iter) => Ok(Box::new(iter)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Box::new(std::iter::empty())),
        Err(e) => Err(e).with_context(|| format!("listing {}", path.display())),
    }
}

/// Infallible username/milestone resolver over the cached backend lists.
pub struct StoreResolver {
    users: HashMap<String, u64>,
    milestones: HashMap<String, u64>,
}

impl UserResolver for StoreResolver {
    fn user_id(&self, username: &str) -> Option<u64> {
        self.users.get(username).copied()
    }

    fn milestone_id(&self, title: &str) -> Option<u64> {
        self.milestones.get(title).copied()
    }
}
