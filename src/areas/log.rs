//! The read-only changed-path log and an in-memory recorded implementation.
//!
//! [`ChangedPathLog`] is the single external collaborator of the
//! reconstruction core: it reports, for a revision number, the set of
//! changed paths with action/copy-source, plus revision properties, and it
//! answers directory listings and node-property queries at a revision.
//! Revisions `0..=latest_revnum()` form a fixed, total order with no gaps.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::artifacts::changes::{
    ChangeSet, NodeKind, PathAction, PathChange, Revnum, join_paths, path_is_child,
};
use crate::artifacts::errors::HistoryError;

/// Revision properties: the well-known author/date/message triple plus
/// arbitrary custom keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionProperties {
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

/// Per-key property change: `(old value, new value)`; `None` means absent.
pub type PropertyDiff = BTreeMap<String, (Option<String>, Option<String>)>;

/// Diff two property maps, keeping only keys whose value changed.
pub fn diff_properties(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> PropertyDiff {
    let mut diff = PropertyDiff::new();
    for key in old.keys().chain(new.keys()) {
        let before = old.get(key).cloned();
        let after = new.get(key).cloned();
        if before != after {
            diff.insert(key.clone(), (before, after));
        }
    }
    diff
}

pub trait ChangedPathLog {
    /// The newest revision number in the log.
    fn latest_revnum(&self) -> Revnum;

    /// Changed paths and revision properties for one revision. Revision 0
    /// reports an empty change set. A revision number outside the log is
    /// an [`HistoryError::InconsistentLog`] condition, never skipped.
    fn changes_for(&self, revnum: Revnum) -> Result<(ChangeSet, RevisionProperties)>;

    /// Entries of the directory at `path` in `revnum`. Fails with
    /// [`HistoryError::NotFound`] or [`HistoryError::NotADirectory`].
    fn directory_listing(&self, path: &str, revnum: Revnum) -> Result<Vec<DirEntry>>;

    /// Custom properties set on the node at `path` in `revnum`.
    fn node_properties(&self, path: &str, revnum: Revnum) -> Result<BTreeMap<String, String>>;

    /// Property changes on `path` between two revisions.
    fn property_diff(&self, path: &str, rev_a: Revnum, rev_b: Revnum) -> Result<PropertyDiff> {
        let old = self.node_properties(path, rev_a)?;
        let new = self.node_properties(path, rev_b)?;
        Ok(diff_properties(&old, &new))
    }

    /// Every path below `path` in `revnum`, relative to `path`, sorted.
    fn tree_listing(&self, path: &str, revnum: Revnum) -> Result<Vec<(String, NodeKind)>> {
        let mut out = Vec::new();
        let mut queue = vec![String::new()];
        while let Some(rel) = queue.pop() {
            let abs = join_paths(path, &rel);
            for entry in self.directory_listing(&abs, revnum)? {
                let child = join_paths(&rel, &entry.name);
                if entry.kind == NodeKind::Directory {
                    queue.push(child.clone());
                }
                out.push((child, entry.kind));
            }
        }
        out.sort();
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    kind: NodeKind,
    props: BTreeMap<String, String>,
}

/// Tree state after one revision: every live path (the root `""` included)
/// mapped to its node.
type Tree = BTreeMap<String, Node>;

fn empty_tree() -> Tree {
    let mut tree = Tree::new();
    tree.insert(
        String::new(),
        Node { kind: NodeKind::Directory, props: BTreeMap::new() },
    );
    tree
}

#[derive(Debug)]
struct RecordedRevision {
    changes: ChangeSet,
    props: RevisionProperties,
    /// Tree state after this revision was applied.
    tree: Tree,
}

/// In-memory [`ChangedPathLog`]: revisions are appended through
/// [`RecordedLogBuilder`], which replays each change set onto a tree
/// snapshot so listings and node properties can be answered per revision.
#[derive(Debug, Default)]
pub struct RecordedLog {
    revisions: Vec<RecordedRevision>,
}

impl RecordedLog {
    pub fn builder() -> RecordedLogBuilder {
        RecordedLogBuilder { log: RecordedLog::default() }
    }

    fn tree_at(&self, revnum: Revnum) -> Result<&Tree> {
        if revnum == 0 {
            // Revision 0 has no recorded snapshot; callers handle it
            // before indexing into `revisions`.
            return Err(HistoryError::InconsistentLog {
                revnum: 0,
                details: "internal: revision 0 tree requested by index".into(),
            }
            .into());
        }
        self.revisions
            .get(revnum as usize - 1)
            .map(|r| &r.tree)
            .ok_or_else(|| {
                HistoryError::InconsistentLog {
                    revnum,
                    details: format!(
                        "revision does not exist (log ends at r{})",
                        self.latest_revnum()
                    ),
                }
                .into()
            })
    }

    fn node(&self, path: &str, revnum: Revnum) -> Result<Node> {
        if revnum == 0 {
            return if path.is_empty() {
                Ok(Node { kind: NodeKind::Directory, props: BTreeMap::new() })
            } else {
                Err(HistoryError::NotFound { path: path.to_string(), revnum }.into())
            };
        }
        self.tree_at(revnum)?
            .get(path)
            .cloned()
            .ok_or_else(|| HistoryError::NotFound { path: path.to_string(), revnum }.into())
    }
}

impl ChangedPathLog for RecordedLog {
    fn latest_revnum(&self) -> Revnum {
        self.revisions.len() as Revnum
    }

    fn changes_for(&self, revnum: Revnum) -> Result<(ChangeSet, RevisionProperties)> {
        if revnum == 0 {
            return Ok((ChangeSet::new(), RevisionProperties::default()));
        }
        let recorded = self.revisions.get(revnum as usize - 1).ok_or_else(|| {
            anyhow::Error::from(HistoryError::InconsistentLog {
                revnum,
                details: format!("revision does not exist (log ends at r{})", self.latest_revnum()),
            })
        })?;
        tracing::trace!(revnum, paths = recorded.changes.len(), "changes_for");
        Ok((recorded.changes.clone(), recorded.props.clone()))
    }

    fn directory_listing(&self, path: &str, revnum: Revnum) -> Result<Vec<DirEntry>> {
        let node = self.node(path, revnum)?;
        if node.kind != NodeKind::Directory {
            return Err(
                HistoryError::NotADirectory { path: path.to_string(), revnum }.into()
            );
        }
        if revnum == 0 {
            return Ok(Vec::new());
        }
        let tree = self.tree_at(revnum)?;
        let mut entries = Vec::new();
        for (p, n) in tree.range(path.to_string()..) {
            if !path_is_child(path, p) {
                break;
            }
            if p == path {
                continue;
            }
            let rest = if path.is_empty() { p.as_str() } else { &p[path.len() + 1..] };
            if !rest.contains('/') {
                entries.push(DirEntry { name: rest.to_string(), kind: n.kind });
            }
        }
        Ok(entries)
    }

    fn node_properties(&self, path: &str, revnum: Revnum) -> Result<BTreeMap<String, String>> {
        Ok(self.node(path, revnum)?.props)
    }
}

/// One revision being recorded; obtained from
/// [`RecordedLogBuilder::revision`].
#[derive(Default)]
pub struct RevisionDraft {
    props: RevisionProperties,
    changes: ChangeSet,
    prop_sets: Vec<(String, String, Option<String>)>,
}

impl RevisionDraft {
    pub fn author(&mut self, author: &str) -> &mut Self {
        self.props.author = Some(author.to_string());
        self
    }

    pub fn date(&mut self, date: DateTime<Utc>) -> &mut Self {
        self.props.date = Some(date);
        self
    }

    pub fn message(&mut self, message: &str) -> &mut Self {
        self.props.message = Some(message.to_string());
        self
    }

    pub fn revision_property(&mut self, key: &str, value: &str) -> &mut Self {
        self.props.extra.insert(key.to_string(), value.to_string());
        self
    }

    pub fn change(&mut self, path: &str, change: PathChange) -> &mut Self {
        self.changes.insert(path.to_string(), change);
        self
    }

    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        self.change(path, PathChange::add())
    }

    pub fn add_file(&mut self, path: &str) -> &mut Self {
        self.change(path, PathChange::add().file())
    }

    pub fn modify_file(&mut self, path: &str) -> &mut Self {
        self.change(path, PathChange::modify().file())
    }

    pub fn delete(&mut self, path: &str) -> &mut Self {
        self.change(path, PathChange::delete())
    }

    pub fn copy_dir(&mut self, path: &str, source: &str, revnum: Revnum) -> &mut Self {
        self.change(path, PathChange::add_from(source, revnum))
    }

    pub fn replace_dir(&mut self, path: &str) -> &mut Self {
        self.change(path, PathChange::replace())
    }

    pub fn replace_dir_from(&mut self, path: &str, source: &str, revnum: Revnum) -> &mut Self {
        self.change(path, PathChange::replace_from(source, revnum))
    }

    /// Set (or with `None`, clear) a custom property on a node that exists
    /// after this revision.
    pub fn set_node_property(&mut self, path: &str, key: &str, value: &str) -> &mut Self {
        self.prop_sets
            .push((path.to_string(), key.to_string(), Some(value.to_string())));
        self
    }

    pub fn clear_node_property(&mut self, path: &str, key: &str) -> &mut Self {
        self.prop_sets.push((path.to_string(), key.to_string(), None));
        self
    }
}

pub struct RecordedLogBuilder {
    log: RecordedLog,
}

impl RecordedLogBuilder {
    /// Record the next revision. The draft's changes are validated and
    /// replayed onto the previous tree snapshot; a copy source that does
    /// not exist is rejected.
    pub fn revision(mut self, build: impl FnOnce(&mut RevisionDraft)) -> Result<Self> {
        let mut draft = RevisionDraft::default();
        build(&mut draft);
        let revnum = self.log.latest_revnum() + 1;

        let mut tree = match self.log.revisions.last() {
            Some(prev) => prev.tree.clone(),
            None => empty_tree(),
        };
        for (path, change) in &draft.changes {
            apply_change(&self.log, &mut tree, revnum, path, change)?;
        }
        for (path, key, value) in &draft.prop_sets {
            let node = tree.get_mut(path).ok_or_else(|| {
                anyhow::anyhow!("r{revnum}: property set on missing path {path:?}")
            })?;
            let kind = node.kind;
            match value {
                Some(v) => {
                    node.props.insert(key.clone(), v.clone());
                }
                None => {
                    node.props.remove(key);
                }
            }
            // Property edits count as a change to the node.
            draft.changes.entry(path.clone()).or_insert_with(|| match kind {
                NodeKind::Directory => PathChange::modify(),
                NodeKind::File => PathChange::modify().file(),
            });
        }

        self.log.revisions.push(RecordedRevision {
            changes: draft.changes,
            props: draft.props,
            tree,
        });
        Ok(self)
    }

    pub fn build(self) -> RecordedLog {
        self.log
    }
}

fn apply_change(
    log: &RecordedLog,
    tree: &mut Tree,
    revnum: Revnum,
    path: &str,
    change: &PathChange,
) -> Result<()> {
    match change.action {
        PathAction::Delete | PathAction::Replace => {
            remove_subtree(tree, path);
        }
        _ => {}
    }
    match change.action {
        PathAction::Delete => Ok(()),
        PathAction::Modify => {
            if !tree.contains_key(path) {
                anyhow::bail!("r{revnum}: modify of missing path {path:?}");
            }
            Ok(())
        }
        PathAction::Add | PathAction::Replace => {
            match &change.copy_from {
                Some((source, source_revnum)) => {
                    let source_tree: Vec<(String, Node)> = if *source_revnum == 0 {
                        anyhow::bail!("r{revnum}: copy of {source:?} from empty revision 0");
                    } else {
                        let snapshot = log.tree_at(*source_revnum)?;
                        if !snapshot.contains_key(source) {
                            anyhow::bail!(
                                "r{revnum}: copy source {source:?}@{source_revnum} does not exist"
                            );
                        }
                        snapshot
                            .range(source.clone()..)
                            .take_while(|(p, _)| path_is_child(source, p))
                            .map(|(p, n)| {
                                (crate::artifacts::changes::rebase_path(p, source, path), n.clone())
                            })
                            .collect()
                    };
                    for (p, n) in source_tree {
                        tree.insert(p, n);
                    }
                }
                None => {
                    tree.insert(
                        path.to_string(),
                        Node { kind: change.node_kind, props: BTreeMap::new() },
                    );
                }
            }
            Ok(())
        }
    }
}

fn remove_subtree(tree: &mut Tree, path: &str) {
    let doomed: Vec<String> = tree
        .range(path.to_string()..)
        .take_while(|(p, _)| path_is_child(path, p))
        .map(|(p, _)| p.clone())
        .collect();
    for p in doomed {
        tree.remove(&p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_log() -> RecordedLog {
        RecordedLog::builder()
            .revision(|r| {
                r.author("alice").message("create trunk");
                r.add_dir("trunk").add_file("trunk/README");
            })
            .unwrap()
            .revision(|r| {
                r.author("bob").message("branch off");
                r.copy_dir("branches", "trunk", 1);
            })
            .unwrap()
            .build()
    }

    #[test]
    fn listings_follow_tree_state() {
        let log = sample_log();
        let names: Vec<String> = log
            .directory_listing("", 2)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["branches", "trunk"]);

        let entries = log.directory_listing("branches", 2).unwrap();
        assert_eq!(entries, vec![DirEntry { name: "README".into(), kind: NodeKind::File }]);
    }

    #[test]
    fn copies_carry_node_properties() {
        let log = RecordedLog::builder()
            .revision(|r| {
                r.add_dir("trunk");
                r.set_node_property("trunk", "color", "teal");
            })
            .unwrap()
            .revision(|r| {
                r.copy_dir("branches/x", "trunk", 1);
            })
            .unwrap()
            .build();
        let props = log.node_properties("branches/x", 2).unwrap();
        assert_eq!(props.get("color").map(String::as_str), Some("teal"));
    }

    #[test]
    fn missing_revision_is_an_inconsistency() {
        let log = sample_log();
        let err = log.changes_for(9).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HistoryError>(),
            Some(HistoryError::InconsistentLog { revnum: 9, .. })
        ));
    }

    #[test]
    fn listing_a_file_is_not_a_directory() {
        let log = sample_log();
        let err = log.directory_listing("trunk/README", 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HistoryError>(),
            Some(HistoryError::NotADirectory { .. })
        ));
    }

    #[test]
    fn tree_listing_is_recursive_and_relative() {
        let log = RecordedLog::builder()
            .revision(|r| {
                r.add_dir("trunk").add_dir("trunk/src").add_file("trunk/src/lib.rs");
            })
            .unwrap()
            .build();
        let listing = log.tree_listing("trunk", 1).unwrap();
        assert_eq!(
            listing,
            vec![
                ("src".to_string(), NodeKind::Directory),
                ("src/lib.rs".to_string(), NodeKind::File),
            ]
        );
    }

    #[test]
    fn property_diff_reports_old_and_new() {
        let log = RecordedLog::builder()
            .revision(|r| {
                r.add_dir("trunk");
                r.set_node_property("trunk", "a", "1");
            })
            .unwrap()
            .revision(|r| {
                r.set_node_property("trunk", "a", "2");
                r.set_node_property("trunk", "b", "3");
            })
            .unwrap()
            .build();
        let diff = log.property_diff("trunk", 1, 2).unwrap();
        assert_eq!(diff.get("a").unwrap(), &(Some("1".to_string()), Some("2".to_string())));
        assert_eq!(diff.get("b").unwrap(), &(None, Some("3".to_string())));
    }
}
