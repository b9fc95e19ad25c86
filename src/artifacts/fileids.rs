//! Stable per-path file identities, replayed along a branch's mainline.
//!
//! Every node in a branch gets a file id when it is created and keeps it
//! across copies inside the same branch. Copies from anywhere else, and
//! plain adds, mint fresh ids. The map is built by replaying the branch's
//! mainline oldest to newest, one change set at a time, so an existing map
//! can be advanced incrementally with [`FileIdMapBuilder::apply`].

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::Result;

use crate::areas::log::ChangedPathLog;
use crate::artifacts::changes::{NodeKind, PathAction, join_paths, path_is_child, rebase_path};
use crate::artifacts::errors::HistoryError;
use crate::artifacts::layout::PathLayout;
use crate::artifacts::mapping::{
    FileId, MappingVersion, RevisionId, file_id_overrides, generate_file_id,
};
use crate::artifacts::revmeta::cursor::AncestryEnd;
use crate::artifacts::revmeta::descriptor::RevisionDescriptor;
use crate::artifacts::revmeta::provider::RevisionDescriptorProvider;

/// The identity of one node: its stable file id and the revision that
/// last changed its text or properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub file_id: FileId,
    pub text_revision: RevisionId,
}

/// Branch-relative path to [`FileEntry`], for one branch at one revision.
/// The branch root is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIdentityMap {
    entries: BTreeMap<String, FileEntry>,
}

impl FileIdentityMap {
    pub fn lookup(&self, path: &str) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    pub fn file_id(&self, path: &str) -> Option<&FileId> {
        self.lookup(path).map(|e| &e.file_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileEntry)> {
        self.entries.iter().map(|(p, e)| (p.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn subtree(&self, path: &str) -> Vec<(String, FileEntry)> {
        self.entries
            .range(path.to_string()..)
            .take_while(|(p, _)| path_is_child(path, p))
            .map(|(p, e)| (p.clone(), e.clone()))
            .collect()
    }

    fn remove_subtree(&mut self, path: &str) {
        for (p, _) in self.subtree(path) {
            self.entries.remove(&p);
        }
    }
}

/// Replays change sets into [`FileIdentityMap`]s.
#[derive(derive_new::new)]
pub struct FileIdMapBuilder {
    log: Rc<dyn ChangedPathLog>,
    layout: Rc<dyn PathLayout>,
    version: MappingVersion,
}

impl FileIdMapBuilder {
    /// The file-identity map of `branch_path` as of `revnum`, built from
    /// the branch's full mainline.
    pub fn build(
        &self,
        provider: &RevisionDescriptorProvider,
        branch_path: &str,
        revnum: u64,
    ) -> Result<FileIdentityMap> {
        self.build_bounded(provider, branch_path, revnum, None)
    }

    /// Like [`FileIdMapBuilder::build`], but gives up with
    /// [`HistoryError::HistoryIncomplete`] once `limit` revisions have been
    /// walked without reaching the branch's creation.
    pub fn build_bounded(
        &self,
        provider: &RevisionDescriptorProvider,
        branch_path: &str,
        revnum: u64,
        limit: Option<usize>,
    ) -> Result<FileIdentityMap> {
        let mut cursor = provider.iter_branch_ancestry(
            branch_path,
            revnum,
            Rc::clone(&self.layout),
            0,
            limit,
        )?;
        let mut lineage = Vec::new();
        while let Some(descriptor) = cursor.next_older()? {
            lineage.push(descriptor);
        }
        let end = cursor.end().cloned().unwrap_or(AncestryEnd::Root);
        if end == AncestryEnd::Truncated {
            return Err(HistoryError::HistoryIncomplete {
                path: branch_path.to_string(),
                revnum,
            }
            .into());
        }
        let mut map = FileIdentityMap::default();
        for descriptor in lineage.iter().rev() {
            self.apply(&mut map, descriptor)?;
        }
        // The branch root always carries an identity, even when its
        // creation change set was empty (the repository root at r0).
        if map.lookup("").is_none()
            && let Some(oldest) = lineage.last()
        {
            map.entries.insert(
                String::new(),
                FileEntry {
                    file_id: generate_file_id(&oldest.foreign_id(), ""),
                    text_revision: oldest.revision_id(self.version)?,
                },
            );
        }
        Ok(map)
    }

    /// Advance `map` across one revision of its branch. `map` must be the
    /// state just before `descriptor`'s revision.
    pub fn apply(&self, map: &mut FileIdentityMap, descriptor: &RevisionDescriptor) -> Result<()> {
        let branch = descriptor.branch_path.as_str();
        let foreign = descriptor.foreign_id();
        let revision_id = descriptor.revision_id(self.version)?;
        // Copy sources resolve against the state before this revision.
        let before = map.clone();

        for (path, change) in descriptor.paths()? {
            if !path_is_child(branch, &path) {
                continue;
            }
            let inner = rebase_path(&path, branch, "");
            if inner.is_empty() && change.copy_from.is_some() {
                if before.is_empty() {
                    // The copy source lies outside the namespace, so the
                    // mainline never crossed it and the map starts here.
                    // The copy degrades to plain adds of everything below.
                    self.fresh_subtree(map, descriptor, "", &path, change.node_kind, &revision_id)?;
                } else {
                    // The mainline walk already crossed into the copy
                    // source, so the map holds the source's identities;
                    // only the root's text moves.
                    if let Some(entry) = map.entries.get_mut("") {
                        entry.text_revision = revision_id.clone();
                    }
                }
                continue;
            }
            if matches!(change.action, PathAction::Delete | PathAction::Replace) {
                map.remove_subtree(&inner);
            }
            match change.action {
                PathAction::Delete => {}
                PathAction::Modify => {
                    match map.entries.get_mut(&inner) {
                        Some(entry) => entry.text_revision = revision_id.clone(),
                        None => {
                            // Tolerated: a modify of a node this map never
                            // saw created acts like an add.
                            map.entries.insert(
                                inner.clone(),
                                FileEntry {
                                    file_id: generate_file_id(&foreign, &inner),
                                    text_revision: revision_id.clone(),
                                },
                            );
                        }
                    }
                }
                PathAction::Add | PathAction::Replace => match &change.copy_from {
                    Some((source, _)) if path_is_child(branch, source) => {
                        let source_inner = rebase_path(source, branch, "");
                        let copied = before.subtree(&source_inner);
                        if copied.is_empty() {
                            self.fresh_subtree(map, descriptor, &inner, &path, change.node_kind, &revision_id)?;
                        } else {
                            // Same-branch copy: identities travel with the
                            // content.
                            for (p, entry) in copied {
                                map.entries.insert(
                                    rebase_path(&p, &source_inner, &inner),
                                    FileEntry {
                                        file_id: entry.file_id,
                                        text_revision: revision_id.clone(),
                                    },
                                );
                            }
                        }
                    }
                    Some(_) => {
                        self.fresh_subtree(map, descriptor, &inner, &path, change.node_kind, &revision_id)?;
                    }
                    None => {
                        map.entries.insert(
                            inner.clone(),
                            FileEntry {
                                file_id: generate_file_id(&foreign, &inner),
                                text_revision: revision_id.clone(),
                            },
                        );
                    }
                },
            }
        }

        for (inner, file_id) in file_id_overrides(&descriptor.changed_fileprops()?) {
            tracing::debug!(path = %inner, %file_id, "applying recorded file-id override");
            match map.entries.get_mut(&inner) {
                Some(entry) => entry.file_id = file_id,
                None => {
                    map.entries.insert(
                        inner,
                        FileEntry { file_id, text_revision: revision_id.clone() },
                    );
                }
            }
        }
        Ok(())
    }

    /// Mint fresh identities for a node copied in from outside the
    /// branch, and for everything below it.
    fn fresh_subtree(
        &self,
        map: &mut FileIdentityMap,
        descriptor: &RevisionDescriptor,
        inner: &str,
        path: &str,
        kind: NodeKind,
        revision_id: &RevisionId,
    ) -> Result<()> {
        let foreign = descriptor.foreign_id();
        map.entries.insert(
            inner.to_string(),
            FileEntry {
                file_id: generate_file_id(&foreign, inner),
                text_revision: revision_id.clone(),
            },
        );
        if kind == NodeKind::Directory {
            for (rel, _) in self.log.tree_listing(path, descriptor.revnum)? {
                let child = join_paths(inner, &rel);
                map.entries.insert(
                    child.clone(),
                    FileEntry {
                        file_id: generate_file_id(&foreign, &child),
                        text_revision: revision_id.clone(),
                    },
                );
            }
        }
        Ok(())
    }
}
