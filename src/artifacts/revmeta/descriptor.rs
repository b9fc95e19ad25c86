//! One revision of one branch, with lazily fetched log data.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use anyhow::Result;

use crate::areas::log::{ChangedPathLog, PropertyDiff, RevisionProperties, diff_properties};
use crate::artifacts::changes::{ChangeSet, Revnum, find_prev_location};
use crate::artifacts::mapping::{
    ExplicitId, ForeignRevId, MappingVersion, RevisionId, resolve_explicit_id,
};

/// A lazily fetched attribute. `Local` values were supplied up front by
/// whoever already held them (a log walk, a test); `Remote` values were
/// fetched from the log on demand. Both count as known.
enum Lazy<T> {
    Unfetched,
    Local(T),
    Remote(T),
}

impl<T> Lazy<T> {
    fn get(&self) -> Option<&T> {
        match self {
            Lazy::Unfetched => None,
            Lazy::Local(v) | Lazy::Remote(v) => Some(v),
        }
    }

    fn is_known(&self) -> bool {
        !matches!(self, Lazy::Unfetched)
    }
}

/// Describes `(branch_path, revnum)` in one source repository: which paths
/// the revision changed, its revision properties, and the branch root's
/// node properties. Everything beyond the coordinates is fetched from the
/// log at most once and cached.
///
/// Descriptors are interned by
/// [`RevisionDescriptorProvider`](super::provider::RevisionDescriptorProvider);
/// equality and hashing use the coordinates only.
pub struct RevisionDescriptor {
    pub uuid: String,
    pub branch_path: String,
    pub revnum: Revnum,
    log: Rc<dyn ChangedPathLog>,
    paths: RefCell<Lazy<ChangeSet>>,
    revprops: RefCell<Lazy<RevisionProperties>>,
    fileprops: RefCell<Lazy<BTreeMap<String, String>>>,
    changed_fileprops: RefCell<Lazy<PropertyDiff>>,
}

impl RevisionDescriptor {
    pub(super) fn new(
        uuid: impl Into<String>,
        log: Rc<dyn ChangedPathLog>,
        branch_path: impl Into<String>,
        revnum: Revnum,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            branch_path: branch_path.into(),
            revnum,
            log,
            paths: RefCell::new(Lazy::Unfetched),
            revprops: RefCell::new(Lazy::Unfetched),
            fileprops: RefCell::new(Lazy::Unfetched),
            changed_fileprops: RefCell::new(Lazy::Unfetched),
        }
    }

    pub fn foreign_id(&self) -> ForeignRevId {
        ForeignRevId::new(self.uuid.clone(), self.branch_path.clone(), self.revnum)
    }

    /// Seed the change set without a log round trip. Ignored when the
    /// attribute is already known.
    pub(super) fn supply_paths(&self, paths: ChangeSet) {
        let mut cell = self.paths.borrow_mut();
        if !cell.is_known() {
            *cell = Lazy::Local(paths);
        }
    }

    pub(super) fn supply_revprops(&self, revprops: RevisionProperties) {
        let mut cell = self.revprops.borrow_mut();
        if !cell.is_known() {
            *cell = Lazy::Local(revprops);
        }
    }

    pub fn knows_paths(&self) -> bool {
        self.paths.borrow().is_known()
    }

    pub fn knows_revprops(&self) -> bool {
        self.revprops.borrow().is_known()
    }

    fn fetch_log(&self) -> Result<()> {
        tracing::debug!(revnum = self.revnum, branch = %self.branch_path, "fetching log entry");
        let (paths, revprops) = self.log.changes_for(self.revnum)?;
        let mut paths_cell = self.paths.borrow_mut();
        if !paths_cell.is_known() {
            *paths_cell = Lazy::Remote(paths);
        }
        let mut revprops_cell = self.revprops.borrow_mut();
        if !revprops_cell.is_known() {
            *revprops_cell = Lazy::Remote(revprops);
        }
        Ok(())
    }

    /// The change set of this revision (the whole revision, not filtered
    /// to the branch).
    pub fn paths(&self) -> Result<ChangeSet> {
        if !self.paths.borrow().is_known() {
            self.fetch_log()?;
        }
        Ok(self.paths.borrow().get().cloned().unwrap_or_default())
    }

    pub fn revprops(&self) -> Result<RevisionProperties> {
        if !self.revprops.borrow().is_known() {
            self.fetch_log()?;
        }
        Ok(self.revprops.borrow().get().cloned().unwrap_or_default())
    }

    /// Node properties of the branch root as of this revision.
    pub fn fileprops(&self) -> Result<BTreeMap<String, String>> {
        if !self.fileprops.borrow().is_known() {
            let props = self.log.node_properties(&self.branch_path, self.revnum)?;
            *self.fileprops.borrow_mut() = Lazy::Remote(props);
        }
        Ok(self.fileprops.borrow().get().cloned().unwrap_or_default())
    }

    /// Whether this revision touched the branch root node itself.
    pub fn changes_branch_root(&self) -> Result<bool> {
        Ok(self.paths()?.contains_key(&self.branch_path))
    }

    /// Where this branch lived before this revision, following the
    /// change set backward through copies and renames. `None` once
    /// history ends here.
    pub fn prev_location(&self) -> Result<Option<(String, Revnum)>> {
        let paths = self.paths()?;
        Ok(find_prev_location(&paths, &self.branch_path, self.revnum)?)
    }

    /// Branch-root property changes introduced by this revision. Empty
    /// unless the revision touched the branch root, so a pure content
    /// change never pays for two property fetches.
    pub fn changed_fileprops(&self) -> Result<PropertyDiff> {
        if !self.changed_fileprops.borrow().is_known() {
            let diff = if self.changes_branch_root()? {
                let old = match self.prev_location()? {
                    Some((prev_path, prev_revnum)) => {
                        self.log.node_properties(&prev_path, prev_revnum)?
                    }
                    None => BTreeMap::new(),
                };
                diff_properties(&old, &self.fileprops()?)
            } else {
                PropertyDiff::new()
            };
            *self.changed_fileprops.borrow_mut() = Lazy::Remote(diff);
        }
        Ok(self.changed_fileprops.borrow().get().cloned().unwrap_or_default())
    }

    /// An explicitly assigned identity from embedded round-trip metadata,
    /// if any.
    pub fn explicit_id(&self) -> Result<Option<ExplicitId>> {
        let revprops = self.revprops()?;
        let changed = self.changed_fileprops()?;
        Ok(resolve_explicit_id(&revprops, &changed))
    }

    /// The stable identifier of this revision: an explicitly assigned id
    /// when round-trip metadata carries one, a derived id otherwise.
    pub fn revision_id(&self, version: MappingVersion) -> Result<RevisionId> {
        if let Some(explicit) = self.explicit_id()? {
            return Ok(explicit.revision_id);
        }
        Ok(version.derive(&self.foreign_id()))
    }
}

impl fmt::Debug for RevisionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevisionDescriptor")
            .field("uuid", &self.uuid)
            .field("branch_path", &self.branch_path)
            .field("revnum", &self.revnum)
            .finish_non_exhaustive()
    }
}

impl PartialEq for RevisionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
            && self.branch_path == other.branch_path
            && self.revnum == other.revnum
    }
}

impl Eq for RevisionDescriptor {}

impl Hash for RevisionDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
        self.branch_path.hash(state);
        self.revnum.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::log::RecordedLog;
    use crate::artifacts::mapping::REVPROP_REVISION_ID;
    use pretty_assertions::assert_eq;

    const UUID: &str = "0f0f0f0f-aaaa-bbbb-cccc-000000000001";

    fn descriptor(log: Rc<dyn ChangedPathLog>, path: &str, revnum: Revnum) -> RevisionDescriptor {
        RevisionDescriptor::new(UUID, log, path, revnum)
    }

    #[test]
    fn paths_and_revprops_fetch_together() {
        let log: Rc<dyn ChangedPathLog> = Rc::new(
            RecordedLog::builder()
                .revision(|r| {
                    r.author("alice").message("start");
                    r.add_dir("trunk");
                })
                .unwrap()
                .build(),
        );
        let d = descriptor(log, "trunk", 1);
        assert!(!d.knows_paths());
        assert!(d.paths().unwrap().contains_key("trunk"));
        // Revision properties arrived in the same fetch.
        assert!(d.knows_revprops());
        assert_eq!(d.revprops().unwrap().author.as_deref(), Some("alice"));
    }

    #[test]
    fn supplied_attributes_skip_the_fetch() {
        let log: Rc<dyn ChangedPathLog> = Rc::new(RecordedLog::default());
        // Revision 3 does not exist in this log; a fetch would fail.
        let d = descriptor(log, "trunk", 3);
        d.supply_paths(ChangeSet::new());
        d.supply_revprops(RevisionProperties {
            author: Some("carol".into()),
            ..Default::default()
        });
        assert_eq!(d.paths().unwrap(), ChangeSet::new());
        assert_eq!(d.revprops().unwrap().author.as_deref(), Some("carol"));
    }

    #[test]
    fn explicit_revision_id_wins_over_derivation() {
        let log: Rc<dyn ChangedPathLog> = Rc::new(
            RecordedLog::builder()
                .revision(|r| {
                    r.revision_property(REVPROP_REVISION_ID, "pinned-id");
                    r.add_dir("trunk");
                })
                .unwrap()
                .build(),
        );
        let d = descriptor(log, "trunk", 1);
        assert_eq!(
            d.revision_id(MappingVersion::CURRENT).unwrap(),
            RevisionId::from("pinned-id")
        );
    }

    #[test]
    fn changed_fileprops_are_empty_without_a_root_change() {
        let log: Rc<dyn ChangedPathLog> = Rc::new(
            RecordedLog::builder()
                .revision(|r| {
                    r.add_dir("trunk");
                })
                .unwrap()
                .revision(|r| {
                    r.add_file("trunk/file");
                })
                .unwrap()
                .build(),
        );
        let d = descriptor(log, "trunk", 2);
        assert_eq!(d.changed_fileprops().unwrap(), PropertyDiff::new());
    }

    #[test]
    fn changed_fileprops_diff_against_the_previous_location() {
        let log: Rc<dyn ChangedPathLog> = Rc::new(
            RecordedLog::builder()
                .revision(|r| {
                    r.add_dir("trunk");
                    r.set_node_property("trunk", "k", "1");
                })
                .unwrap()
                .revision(|r| {
                    r.copy_dir("branches/x", "trunk", 1);
                    r.set_node_property("branches/x", "k", "2");
                })
                .unwrap()
                .build(),
        );
        let d = descriptor(log, "branches/x", 2);
        let diff = d.changed_fileprops().unwrap();
        assert_eq!(diff.get("k").unwrap(), &(Some("1".to_string()), Some("2".to_string())));
    }
}
