//! Changed-path sets and the previous-location rules that drive ancestry.
//!
//! A revision's change set is an ordered map from repository path to
//! [`PathChange`]; keys are unique and normalized (slash-separated, no
//! leading or trailing slash).

use std::collections::BTreeMap;

use crate::artifacts::errors::HistoryError;

/// Revision numbers are non-negative and gapless; revision 0 is the
/// universal root.
pub type Revnum = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAction {
    Add,
    Modify,
    Delete,
    /// Delete-then-add at the same path within one revision.
    Replace,
}

impl PathAction {
    pub fn as_char(self) -> char {
        match self {
            PathAction::Add => 'A',
            PathAction::Modify => 'M',
            PathAction::Delete => 'D',
            PathAction::Replace => 'R',
        }
    }

    /// Actions that (re)create the node at the path.
    pub fn creates_node(self) -> bool {
        matches!(self, PathAction::Add | PathAction::Replace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum NodeKind {
    File,
    #[default]
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChange {
    pub action: PathAction,
    /// `(source path, source revision)` when the node was copied into place.
    pub copy_from: Option<(String, Revnum)>,
    pub node_kind: NodeKind,
}

impl PathChange {
    pub fn add() -> Self {
        Self {
            action: PathAction::Add,
            copy_from: None,
            node_kind: NodeKind::Directory,
        }
    }

    pub fn add_from(source: impl Into<String>, revnum: Revnum) -> Self {
        Self {
            action: PathAction::Add,
            copy_from: Some((source.into(), revnum)),
            node_kind: NodeKind::Directory,
        }
    }

    pub fn modify() -> Self {
        Self {
            action: PathAction::Modify,
            copy_from: None,
            node_kind: NodeKind::Directory,
        }
    }

    pub fn delete() -> Self {
        Self {
            action: PathAction::Delete,
            copy_from: None,
            node_kind: NodeKind::Directory,
        }
    }

    pub fn replace() -> Self {
        Self {
            action: PathAction::Replace,
            copy_from: None,
            node_kind: NodeKind::Directory,
        }
    }

    pub fn replace_from(source: impl Into<String>, revnum: Revnum) -> Self {
        Self {
            action: PathAction::Replace,
            copy_from: Some((source.into(), revnum)),
            node_kind: NodeKind::Directory,
        }
    }

    pub fn file(mut self) -> Self {
        self.node_kind = NodeKind::File;
        self
    }
}

/// A revision's change set, keyed by normalized path.
pub type ChangeSet = BTreeMap<String, PathChange>;

/// Whether `path` lies inside the subtree rooted at `parent` (inclusive).
/// The empty path is the repository root and contains everything.
pub fn path_is_child(parent: &str, path: &str) -> bool {
    parent.is_empty() || path == parent || path.starts_with(&format!("{parent}/"))
}

/// Join two normalized path fragments; either side may be empty.
pub fn join_paths(a: &str, b: &str) -> String {
    let a = a.trim_matches('/');
    let b = b.trim_matches('/');
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a}/{b}"),
    }
}

/// Move `path` from under `old_parent` to under `new_parent`.
pub fn rebase_path(path: &str, old_parent: &str, new_parent: &str) -> String {
    let rest = if old_parent.is_empty() {
        path
    } else if path == old_parent {
        ""
    } else {
        path.strip_prefix(&format!("{old_parent}/")).unwrap_or(path)
    };
    join_paths(new_parent, rest)
}

/// Whether the change set touches `path` or anything below it; with
/// `parents` set, a change to an ancestor directory also counts (the
/// subtree was carried along by a parent copy or delete).
pub fn changes_path(changes: &ChangeSet, path: &str, parents: bool) -> bool {
    changes.keys().any(|p| {
        path_is_child(path, p) || (parents && path.starts_with(&format!("{p}/")))
    })
}

/// Where was `branch_path` immediately before `revnum`, given the changes
/// made in `revnum`?
///
/// - `Ok(None)` — the path was created (or cleared) here: no older location.
/// - `Ok(Some((path, revnum)))` — the older location, following an explicit
///   copy, a replace's copy source (the preceding delete is ignored for
///   ancestry purposes), or a parent-directory copy that carried the path
///   along; otherwise simply `(branch_path, revnum - 1)`.
pub fn find_prev_location(
    changes: &ChangeSet,
    branch_path: &str,
    revnum: Revnum,
) -> Result<Option<(String, Revnum)>, HistoryError> {
    if revnum == 0 {
        return Ok(None);
    }
    if branch_path.is_empty() {
        // The repository root always exists and is never copied.
        return Ok(Some((String::new(), revnum - 1)));
    }

    if let Some(change) = changes.get(branch_path) {
        match change.action {
            PathAction::Add | PathAction::Replace => return Ok(change.copy_from.clone()),
            PathAction::Delete => return Ok(None),
            PathAction::Modify => {}
        }
    }

    // A parent directory may have been copied into place, carrying this
    // path with it. Longest matching prefix wins, hence the reverse scan.
    for (p, change) in changes.iter().rev() {
        if !change.action.creates_node() {
            continue;
        }
        if branch_path.starts_with(&format!("{p}/")) {
            let (source, source_revnum) =
                change.copy_from.clone().ok_or_else(|| HistoryError::InconsistentLog {
                    revnum,
                    details: format!(
                        "parent {p:?} of {branch_path:?} was added without a copy source \
                         while the child persisted"
                    ),
                })?;
            return Ok(Some((rebase_path(branch_path, p, &source), source_revnum)));
        }
    }

    Ok(Some((branch_path.to_string(), revnum - 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn changeset(entries: Vec<(&str, PathChange)>) -> ChangeSet {
        entries
            .into_iter()
            .map(|(p, c)| (p.to_string(), c))
            .collect()
    }

    #[test]
    fn child_relation_respects_segment_boundaries() {
        assert!(path_is_child("a", "a"));
        assert!(path_is_child("a", "a/b"));
        assert!(!path_is_child("a", "ab"));
        assert!(path_is_child("", "anything"));
    }

    #[test]
    fn rebase_moves_subtree_paths() {
        assert_eq!(rebase_path("trunk/dir/file", "trunk", "branches/x"), "branches/x/dir/file");
        assert_eq!(rebase_path("trunk", "trunk", "branches/x"), "branches/x");
        assert_eq!(rebase_path("file", "", "branches/x"), "branches/x/file");
    }

    #[test]
    fn prev_location_of_plain_history_is_previous_revision() {
        let changes = changeset(vec![("trunk/file", PathChange::modify().file())]);
        assert_eq!(
            find_prev_location(&changes, "trunk", 7).unwrap(),
            Some(("trunk".to_string(), 6))
        );
    }

    #[test]
    fn prev_location_follows_copy_source() {
        let changes = changeset(vec![("branches/x", PathChange::add_from("trunk", 3))]);
        assert_eq!(
            find_prev_location(&changes, "branches/x", 5).unwrap(),
            Some(("trunk".to_string(), 3))
        );
    }

    #[test]
    fn prev_location_of_fresh_add_is_none() {
        let changes = changeset(vec![("trunk", PathChange::add())]);
        assert_eq!(find_prev_location(&changes, "trunk", 4).unwrap(), None);
    }

    #[test]
    fn prev_location_of_delete_is_none() {
        let changes = changeset(vec![("trunk", PathChange::delete())]);
        assert_eq!(find_prev_location(&changes, "trunk", 4).unwrap(), None);
    }

    #[test]
    fn replace_uses_the_add_side_copy_source() {
        // Delete-then-add in one revision: ancestry ignores the delete.
        let changes = changeset(vec![("trunk", PathChange::replace_from("old-trunk", 2))]);
        assert_eq!(
            find_prev_location(&changes, "trunk", 6).unwrap(),
            Some(("old-trunk".to_string(), 2))
        );
    }

    #[test]
    fn replace_without_copy_source_ends_the_lineage() {
        let changes = changeset(vec![("trunk", PathChange::replace())]);
        assert_eq!(find_prev_location(&changes, "trunk", 6).unwrap(), None);
    }

    #[test]
    fn parent_copy_carries_children_along() {
        let changes = changeset(vec![("project", PathChange::add_from("attic/project", 9))]);
        assert_eq!(
            find_prev_location(&changes, "project/trunk", 12).unwrap(),
            Some(("attic/project/trunk".to_string(), 9))
        );
    }

    #[test]
    fn parent_added_without_copy_is_inconsistent() {
        let changes = changeset(vec![("project", PathChange::add())]);
        let err = find_prev_location(&changes, "project/trunk", 12).unwrap_err();
        assert!(matches!(err, HistoryError::InconsistentLog { revnum: 12, .. }));
    }

    #[test]
    fn longest_parent_prefix_wins() {
        let changes = changeset(vec![
            ("a", PathChange::add_from("x", 1)),
            ("a/b", PathChange::add_from("y", 2)),
        ]);
        assert_eq!(
            find_prev_location(&changes, "a/b/c", 3).unwrap(),
            Some(("y/c".to_string(), 2))
        );
    }

    #[test]
    fn root_path_never_ends() {
        let changes = ChangeSet::new();
        assert_eq!(
            find_prev_location(&changes, "", 3).unwrap(),
            Some((String::new(), 2))
        );
        assert_eq!(find_prev_location(&changes, "", 0).unwrap(), None);
    }

    #[test]
    fn changes_path_distinguishes_parent_only_changes() {
        let changes = changeset(vec![("project", PathChange::add_from("attic", 1))]);
        assert!(!changes_path(&changes, "project/trunk", false));
        assert!(changes_path(&changes, "project/trunk", true));
        assert!(changes_path(&changes, "project", false));
    }
}
