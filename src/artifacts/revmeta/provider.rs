//! Interning provider for revision descriptors.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Result;

use crate::areas::log::{ChangedPathLog, RevisionProperties};
use crate::artifacts::changes::{ChangeSet, Revnum};
use crate::artifacts::errors::HistoryError;
use crate::artifacts::layout::PathLayout;
use crate::artifacts::revmeta::cursor::{AncestryEnd, BranchHistoryCursor, ChangesWalk};
use crate::artifacts::revmeta::descriptor::RevisionDescriptor;

/// Hands out [`RevisionDescriptor`]s and guarantees at most one live
/// object per `(branch path, revnum)` pair, so lazily fetched log data is
/// shared by everyone looking at the same revision.
pub struct RevisionDescriptorProvider {
    uuid: String,
    log: Rc<dyn ChangedPathLog>,
    cache: RefCell<HashMap<(String, Revnum), Rc<RevisionDescriptor>>>,
}

impl RevisionDescriptorProvider {
    pub fn new(uuid: impl Into<String>, log: Rc<dyn ChangedPathLog>) -> Self {
        Self { uuid: uuid.into(), log, cache: RefCell::new(HashMap::new()) }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn log(&self) -> &Rc<dyn ChangedPathLog> {
        &self.log
    }

    /// The descriptor for `(branch_path, revnum)`, interned.
    pub fn get(&self, branch_path: &str, revnum: Revnum) -> Rc<RevisionDescriptor> {
        let key = (branch_path.to_string(), revnum);
        Rc::clone(self.cache.borrow_mut().entry(key).or_insert_with(|| {
            Rc::new(RevisionDescriptor::new(
                self.uuid.clone(),
                Rc::clone(&self.log),
                branch_path,
                revnum,
            ))
        }))
    }

    /// Interned descriptor, pre-seeded with log data the caller already
    /// holds. Seeding never overwrites attributes that are already known.
    pub(super) fn get_seeded(
        &self,
        branch_path: &str,
        revnum: Revnum,
        changes: ChangeSet,
        props: RevisionProperties,
    ) -> Rc<RevisionDescriptor> {
        let descriptor = self.get(branch_path, revnum);
        descriptor.supply_paths(changes);
        descriptor.supply_revprops(props);
        descriptor
    }

    /// Walk the left-hand ancestry of `branch_path` backward, starting at
    /// (and including) `revnum`. `floor` stops the walk before older
    /// revisions; `limit` caps the number of descriptors. The starting
    /// path must be a branch or tag under `layout`.
    pub fn iter_branch_ancestry<'p>(
        &'p self,
        branch_path: &str,
        revnum: Revnum,
        layout: Rc<dyn PathLayout>,
        floor: Revnum,
        limit: Option<usize>,
    ) -> Result<BranchHistoryCursor<'p>> {
        if !layout.is_branch_or_tag(branch_path) {
            return Err(HistoryError::NotABranchPath {
                path: branch_path.to_string(),
                layout: layout.name().to_string(),
            }
            .into());
        }
        let walk = ChangesWalk::new(Rc::clone(&self.log), layout, branch_path, revnum, floor);
        Ok(BranchHistoryCursor::new(self, walk, limit))
    }

    /// The whole mainline of a branch, newest first, together with how it
    /// ended.
    pub fn mainline(
        &self,
        branch_path: &str,
        revnum: Revnum,
        layout: Rc<dyn PathLayout>,
    ) -> Result<(Vec<Rc<RevisionDescriptor>>, AncestryEnd)> {
        let mut cursor = self.iter_branch_ancestry(branch_path, revnum, layout, 0, None)?;
        let mut lineage = Vec::new();
        while let Some(descriptor) = cursor.next_older()? {
            lineage.push(descriptor);
        }
        let end = cursor.end().cloned().unwrap_or(AncestryEnd::Root);
        Ok((lineage, end))
    }

    /// The left-hand parent of a descriptor, or `None` when its history
    /// starts there.
    pub fn lhs_parent(
        &self,
        descriptor: &RevisionDescriptor,
        layout: Rc<dyn PathLayout>,
    ) -> Result<Option<Rc<RevisionDescriptor>>> {
        let mut cursor = self.iter_branch_ancestry(
            &descriptor.branch_path,
            descriptor.revnum,
            layout,
            0,
            Some(2),
        )?;
        let Some(first) = cursor.next_older()? else {
            return Ok(None);
        };
        if first.branch_path == descriptor.branch_path && first.revnum == descriptor.revnum {
            return cursor.next_older();
        }
        // The descriptor's own revision did not change the branch; the
        // newest change at or before it is the parent.
        Ok(Some(first))
    }
}
