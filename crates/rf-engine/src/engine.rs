//! Fetch/submit orchestration.
//!
//! `Engine` ties the layers together: remote backend, git repository,
//! codec and store. Every public method is one user-facing command over
//! one or more containers.

use crate::compile::compile;
use crate::reconcile::reconcile;
use crate::remote::{PositionPayload, Remote};
use crate::store::Store;
use anyhow::{Context, Result};
use rf_codec::{
    parse_metadata_header, parse_review_drafts, parse_working_text, render_draft_header,
    render_metadata, render_threads, terminator, ContextSource, DraftKind, ParseOptions,
    ReviewDraft,
};
use rf_config::ReviewConfig;
use rf_diff::{
    anchor_key, commit_context, counted_offset, structured_anchor, thread_context, DiffCache,
    GitRunner, LineKind, LocalPosition,
};
use rf_model::{
    Anchor, ContainerRef, Dialect, EditInstruction, Item, ItemKind, MetadataSnapshot,
    PositionScheme, Resolution, ResolutionSupport, Thread,
};

/// Renders context windows through the diff layer.
struct DiffContext<'a> {
    cache: &'a mut DiffCache,
    git: &'a GitRunner,
    context_lines: usize,
}

impl ContextSource for DiffContext<'_> {
    fn thread_context(&mut self, anchor: &Anchor) -> String {
        thread_context(self.cache, self.git, anchor, self.context_lines)
    }

    fn commit_summary(&mut self, commit: &str) -> Option<String> {
        self.git.commit_summary(commit).ok()
    }
}

/// Which companion file a thread renders into.
enum Partition {
    Working,
    Resolved,
    Meta,
}

pub struct Engine<'a> {
    remote: &'a mut dyn Remote,
    dialect: &'a dyn Dialect,
    config: &'a ReviewConfig,
    store: Store,
    git: GitRunner,
    diffs: DiffCache,
}

impl<'a> Engine<'a> {
    pub fn new(
        remote: &'a mut dyn Remote,
        dialect: &'a dyn Dialect,
        config: &'a ReviewConfig,
        store: Store,
        git: GitRunner,
    ) -> Self {
        Self {
            remote,
            dialect,
            config,
            store,
            git,
            diffs: DiffCache::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Mirror open items into the local directory tree.
    ///
    /// With an empty `containers` list (or no prior item snapshot) the full
    /// open-item lists are fetched, retired containers are deleted and
    /// every open container is refreshed. Otherwise only the named
    /// containers are refreshed against the existing lists.
    pub fn fetch(&mut self, containers: &[ContainerRef]) -> Result<()> {
        let known = self.store.load_items()?;
        if containers.is_empty() || known.is_none() {
            let items = self.list_open_items()?;
            self.store.save_items(&items)?;
            self.store.delete_retired(&items)?;
            let targets: Vec<Item> = if containers.is_empty() {
                items
            } else {
                items
                    .into_iter()
                    .filter(|i| containers.contains(&i.container()))
                    .collect()
            };
            for item in targets {
                self.fetch_container(&item)?;
            }
            return Ok(());
        }

        let known = known.unwrap_or_default();
        for container in containers {
            let Some(item) = known.iter().find(|i| &i.container() == container) else {
                log::warn!("{}: not in the open-item list, skipping", container);
                continue;
            };
            let fresh = self.remote.fetch_item(item.kind, item.number)?;
            self.store.update_item_list(&fresh)?;
            self.fetch_container(&fresh)?;
        }
        Ok(())
    }

    /// Refresh one container: snapshot discussions, render, reconcile.
    fn fetch_container(&mut self, item: &Item) -> Result<()> {
        let container = item.container();
        let threads = self.remote.fetch_discussions(item)?;
        self.store.save_snapshot(&container, &threads)?;
        self.store.save_item(item)?;

        let mut working = Vec::new();
        let mut resolved = Vec::new();
        let mut meta = Vec::new();
        for thread in &threads {
            match self.partition(thread) {
                Partition::Working => working.push(thread.clone()),
                Partition::Resolved => resolved.push(thread.clone()),
                Partition::Meta => meta.push(thread.clone()),
            }
        }

        let mut rendered = render_metadata(&item.metadata, item.kind);
        rendered.push_str(&self.render(&working));
        rendered.push_str(&terminator());
        reconcile(&self.store, &container, &rendered)?;

        let resolved_path = self.store.layout().resolved_file(&container);
        let meta_path = self.store.layout().meta_file(&container);
        self.write_companion(&resolved_path, &resolved)?;
        self.write_companion(&meta_path, &meta)?;
        log::debug!("fetched {}", container);
        Ok(())
    }

    /// Threads the backend can still resolve stay in the working file;
    /// resolved ones move aside, and threads outside the resolution
    /// model altogether (system residue on a resolving backend) land in
    /// the meta file.
    fn partition(&self, thread: &Thread) -> Partition {
        match thread.resolved {
            Resolution::Resolved => Partition::Resolved,
            Resolution::Unresolved => Partition::Working,
            Resolution::NotApplicable => {
                match self.dialect.resolution_support() {
                    ResolutionSupport::Supported => Partition::Meta,
                    // Nothing is resolvable here, so nothing is residue.
                    ResolutionSupport::Unsupported => Partition::Working,
                }
            }
        }
    }

    fn render(&mut self, threads: &[Thread]) -> String {
        let mut ctx = DiffContext {
            cache: &mut self.diffs,
            git: &self.git,
            context_lines: self.config.context_lines,
        };
        render_threads(threads, &self.config.username, &mut ctx)
    }

    fn write_companion(&mut self, path: &std::path::Path, threads: &[Thread]) -> Result<()> {
        if threads.is_empty() {
            self.store.remove(path)
        } else {
            let text = self.render(threads);
            self.store.write_text(path, &text)
        }
    }

    /// Push local edits back to the remote.
    ///
    /// With an empty `containers` list every known container is submitted.
    pub fn submit(&mut self, containers: &[ContainerRef]) -> Result<()> {
        let targets: Vec<ContainerRef> = if containers.is_empty() {
            self.store
                .load_items()?
                .unwrap_or_default()
                .iter()
                .map(|i| i.container())
                .collect()
        } else {
            containers.to_vec()
        };

        let mut any_metadata = false;
        for container in &targets {
            any_metadata |= self.submit_container(container)?;
        }
        if any_metadata {
            let items = self.list_open_items()?;
            self.store.save_items(&items)?;
            self.store.delete_retired(&items)?;
        }
        Ok(())
    }

    /// Returns whether item metadata changed.
    fn submit_container(&mut self, container: &ContainerRef) -> Result<bool> {
        let Some(item) = self.store.load_item(container)? else {
            log::warn!("{}: never fetched, skipping", container);
            return Ok(false);
        };
        let threads = self.store.load_snapshot(container)?.unwrap_or_default();

        let is_mr = item.kind == ItemKind::MergeProposal;
        let opts = ParseOptions {
            allow_resolution: is_mr
                && self.dialect.resolution_support() == ResolutionSupport::Supported,
            allow_merge: is_mr,
            has_header: true,
        };

        let mut instructions = Vec::new();
        let working_path = self.store.layout().working_file(container);
        if let Some(text) = self.store.read_text(&working_path)? {
            instructions.extend(
                parse_working_text(&text, &threads, Some(&item.metadata), &opts)
                    .with_context(|| format!("parsing {}", working_path.display()))?,
            );
        }
        let headerless = ParseOptions {
            has_header: false,
            ..opts
        };
        for path in [
            self.store.layout().resolved_file(container),
            self.store.layout().meta_file(container),
        ] {
            if let Some(text) = self.store.read_text(&path)? {
                instructions.extend(
                    parse_working_text(&text, &threads, None, &headerless)
                        .with_context(|| format!("parsing {}", path.display()))?,
                );
            }
        }
        if instructions.is_empty() {
            return Ok(false);
        }

        self.warm_resolver(&instructions)?;
        let resolver = self.store.resolver()?;
        let outcome = compile(
            self.remote,
            self.dialect,
            &resolver,
            &item,
            &threads,
            instructions,
        )?;

        if outcome.changed {
            // Local edits are on the remote now; drop them before merging
            // the refreshed render back in.
            if let Some(pristine) = self
                .store
                .read_text(&self.store.layout().pristine_file(container))?
            {
                self.store.write_text(&working_path, &pristine)?;
            }
            let fresh = self.remote.fetch_item(item.kind, item.number)?;
            self.store.update_item_list(&fresh)?;
            self.fetch_container(&fresh)?;
        }
        Ok(outcome.metadata_changed)
    }

    /// Create a new issue or merge proposal from header text.
    pub fn create(&mut self, kind: ItemKind, text: &str) -> Result<Item> {
        let rows: Vec<&str> = text.lines().collect();
        let (_, patch) = parse_metadata_header(&rows, None)?;
        let instructions = vec![EditInstruction::MetadataUpdate {
            fields: patch.clone(),
        }];
        self.warm_resolver(&instructions)?;
        let resolver = self.store.resolver()?;
        let payload = self.dialect.metadata_payload(&patch, &resolver);
        let item = self.remote.create_item(kind, &payload)?;
        log::info!("created {}", item.container());
        self.store.update_item_list(&item)?;
        self.fetch_container(&item)?;
        Ok(item)
    }

    /// A fill-in metadata header for a new merge proposal from `branch`,
    /// with the description prefilled from the branch's commit subjects.
    pub fn template(&mut self, branch: &str) -> Result<String> {
        let range = format!(
            "{}/{}..{}",
            self.config.remote, self.config.target_branch, branch
        );
        let subjects = self.git.log_subjects(&range).unwrap_or_default();
        let mut lines = subjects.lines();
        let title = lines.next().unwrap_or(branch).to_string();
        let description: String = lines.collect::<Vec<_>>().join("\n");

        let snapshot = MetadataSnapshot {
            title,
            description,
            source_branch: Some(branch.to_string()),
            target_branch: Some(self.config.target_branch.clone()),
            remove_source_branch: Some(true),
            ..Default::default()
        };
        Ok(render_metadata(&snapshot, ItemKind::MergeProposal))
    }

    /// Queue a draft review comment for one diff position.
    ///
    /// Appends the marker header plus the commit's quoted context window
    /// to the container's draft file; the user writes the comment body
    /// under it and later submits the whole file.
    pub fn draft(&mut self, container: &ContainerRef, pos: &LocalPosition) -> Result<()> {
        let kind = match pos.kind {
            LineKind::Context => DraftKind::Context,
            LineKind::Addition => DraftKind::Addition,
            LineKind::Deletion => DraftKind::Deletion,
        };
        let mut entry =
            render_draft_header(&pos.commit, &pos.new_path, pos.new_line, kind, pos.old_line);
        entry.push_str(&commit_context(
            &mut self.diffs,
            &self.git,
            pos,
            self.config.context_lines,
        ));
        entry.push('\n');

        let path = self.store.layout().review_file(container);
        let mut text = self.store.read_text(&path)?.unwrap_or_default();
        text.push_str(&entry);
        self.store.write_text(&path, &text)?;
        log::debug!(
            "{}: queued review draft at {}:{}",
            container,
            pos.new_path,
            pos.new_line
        );
        Ok(())
    }

    /// Submit pending review drafts of one container as anchored
    /// discussions, then delete the draft file.
    pub fn submit_review_drafts(&mut self, container: &ContainerRef) -> Result<usize> {
        let Some(item) = self.store.load_item(container)? else {
            log::warn!("{}: never fetched, skipping", container);
            return Ok(0);
        };
        let path = self.store.layout().review_file(container);
        let Some(text) = self.store.read_text(&path)? else {
            return Ok(0);
        };
        let drafts = parse_review_drafts(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        if drafts.is_empty() {
            return Ok(0);
        }

        let count = drafts.len();
        for draft in drafts {
            let payload = self.draft_position(&item, &draft)?;
            self.remote
                .create_discussion(&item, &draft.body, Some(&payload))?;
        }
        self.store.remove(&path)?;
        log::info!("{}: submitted {} review comments", container, count);
        self.fetch_container(&item)?;
        Ok(count)
    }

    fn draft_position(&mut self, item: &Item, draft: &ReviewDraft) -> Result<PositionPayload> {
        let pos = LocalPosition {
            commit: draft.commit.clone(),
            old_path: draft.path.clone(),
            new_path: draft.path.clone(),
            kind: match draft.kind {
                DraftKind::Context => LineKind::Context,
                DraftKind::Addition => LineKind::Addition,
                DraftKind::Deletion => LineKind::Deletion,
            },
            old_line: draft.old_line,
            new_line: draft.new_line,
        };
        match self.dialect.position_scheme() {
            PositionScheme::Structured => {
                let anchor = structured_anchor(&self.git, &pos)?;
                let key = anchor_key(&pos);
                Ok(PositionPayload::Structured { anchor, key })
            }
            PositionScheme::CountedOffset => {
                let source = item
                    .metadata
                    .source_branch
                    .as_deref()
                    .context("item has no source branch")?;
                let target = item
                    .metadata
                    .target_branch
                    .as_deref()
                    .unwrap_or(&self.config.target_branch);
                let head = self
                    .git
                    .rev_parse(&format!("{}/{}", self.config.remote, source))?;
                let base = self
                    .git
                    .rev_parse(&format!("{}/{}", self.config.remote, target))?;
                let offset = counted_offset(&mut self.diffs, &self.git, &base, &head, &pos)?;
                Ok(PositionPayload::Counted {
                    commit: head,
                    path: draft.path.clone(),
                    offset,
                })
            }
        }
    }

    fn list_open_items(&mut self) -> Result<Vec<Item>> {
        let mut items = self.remote.list_merge_proposals()?;
        items.extend(self.remote.list_issues()?);
        let labels = self.remote.list_labels()?;
        self.store.save_labels(&labels)?;
        Ok(items)
    }

    /// Make sure every username and milestone named by a metadata patch is
    /// in the caches before payload encoding, fetching on miss.
    fn warm_resolver(&mut self, instructions: &[EditInstruction]) -> Result<()> {
        for instruction in instructions {
            let EditInstruction::MetadataUpdate { fields } = instruction else {
                continue;
            };
            for list in [&fields.assignees, &fields.reviewers] {
                for name in list.iter().flatten() {
                    self.store.lookup_user(self.remote, name)?;
                }
            }
            if let Some(milestone) = &fields.milestone {
                if !milestone.is_empty() {
                    self.store.milestone_id(self.remote, milestone)?;
                }
            }
        }
        Ok(())
    }
}
