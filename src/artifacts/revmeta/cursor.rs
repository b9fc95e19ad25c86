//! Backward walk over one branch's left-hand ancestry.

use std::fmt;
use std::rc::Rc;

use anyhow::Result;

use crate::areas::log::{ChangedPathLog, RevisionProperties};
use crate::artifacts::changes::{
    ChangeSet, NodeKind, PathChange, Revnum, changes_path, find_prev_location, join_paths,
};
use crate::artifacts::errors::{HistoryError, skippable_listing_failure};
use crate::artifacts::layout::PathLayout;
use crate::artifacts::revmeta::descriptor::RevisionDescriptor;
use crate::artifacts::revmeta::provider::RevisionDescriptorProvider;

/// How a finished ancestry walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AncestryEnd {
    /// The walk reached the branch's creation (or revision 0).
    Root,
    /// The branch was copied from a path outside the branch namespace;
    /// older history exists at `path@revnum` but is not branch history.
    Boundary { path: String, revnum: Revnum },
    /// The walk was stopped early by a floor revision or an element limit.
    Truncated,
}

/// One revision that changed the branch, as seen while walking backward.
pub(super) struct WalkStep {
    pub path: String,
    pub revnum: Revnum,
    pub changes: ChangeSet,
    pub props: RevisionProperties,
}

/// The raw log walk: follows a branch path backward revision by revision,
/// skips revisions that did not touch it, and traces it through renames
/// and parent-directory copies. Yields only revisions that changed the
/// branch itself.
pub(super) struct ChangesWalk {
    log: Rc<dyn ChangedPathLog>,
    layout: Rc<dyn PathLayout>,
    path: String,
    revnum: Revnum,
    floor: Revnum,
    done: Option<AncestryEnd>,
}

impl ChangesWalk {
    pub(super) fn new(
        log: Rc<dyn ChangedPathLog>,
        layout: Rc<dyn PathLayout>,
        path: impl Into<String>,
        revnum: Revnum,
        floor: Revnum,
    ) -> Self {
        Self { log, layout, path: path.into(), revnum, floor, done: None }
    }

    pub(super) fn end(&self) -> Option<&AncestryEnd> {
        self.done.as_ref()
    }

    /// The change set a boundary creation presents: the whole copied tree
    /// as plain adds, so consumers never follow the copy out of the
    /// branch namespace.
    fn synthesize_creation(&self, path: &str, revnum: Revnum) -> Result<ChangeSet> {
        let mut changes = ChangeSet::new();
        changes.insert(path.to_string(), PathChange::add());
        for (rel, kind) in self.log.tree_listing(path, revnum)? {
            let change = match kind {
                NodeKind::Directory => PathChange::add(),
                NodeKind::File => PathChange::add().file(),
            };
            changes.insert(join_paths(path, &rel), change);
        }
        Ok(changes)
    }

    pub(super) fn advance(&mut self) -> Result<Option<WalkStep>> {
        if self.done.is_some() {
            return Ok(None);
        }
        loop {
            if self.revnum < self.floor {
                self.done = Some(AncestryEnd::Truncated);
                return Ok(None);
            }
            if self.revnum == 0 {
                self.done = Some(AncestryEnd::Root);
                // Only the repository root itself exists in revision 0.
                if self.path.is_empty() && self.layout.is_branch_or_tag("") {
                    return Ok(Some(WalkStep {
                        path: String::new(),
                        revnum: 0,
                        changes: ChangeSet::new(),
                        props: RevisionProperties::default(),
                    }));
                }
                return Ok(None);
            }

            let revnum = self.revnum;
            let (changes, props) = self.log.changes_for(revnum)?;
            if !changes_path(&changes, &self.path, true) {
                self.revnum -= 1;
                continue;
            }

            let step_path = self.path.clone();
            let next = find_prev_location(&changes, &step_path, revnum)?;
            let touched_directly = changes_path(&changes, &step_path, false);
            tracing::trace!(
                revnum,
                path = %step_path,
                ?next,
                touched_directly,
                "ancestry walk step"
            );
            match next {
                None => {
                    // Created here from nothing; the adds are the history's
                    // first change set.
                    self.done = Some(AncestryEnd::Root);
                    return Ok(Some(WalkStep { path: step_path, revnum, changes, props }));
                }
                Some((next_path, next_revnum)) if !self.layout.is_branch_or_tag(&next_path) => {
                    let changes = self.synthesize_creation(&step_path, revnum)?;
                    self.done = Some(AncestryEnd::Boundary { path: next_path, revnum: next_revnum });
                    return Ok(Some(WalkStep { path: step_path, revnum, changes, props }));
                }
                Some((next_path, next_revnum)) => {
                    if next_path != self.path {
                        // The branch changed name here. The recorded copy
                        // source must actually exist.
                        if let Err(err) = self.log.directory_listing(&next_path, next_revnum) {
                            if skippable_listing_failure(&err) {
                                return Err(HistoryError::InconsistentLog {
                                    revnum,
                                    details: format!(
                                        "copy source {next_path:?}@{next_revnum} does not exist"
                                    ),
                                }
                                .into());
                            }
                            return Err(err);
                        }
                    }
                    self.path = next_path;
                    self.revnum = next_revnum;
                    if touched_directly {
                        return Ok(Some(WalkStep { path: step_path, revnum, changes, props }));
                    }
                    // Only an enclosing directory moved; the branch content
                    // is unchanged, keep walking at the new location.
                }
            }
        }
    }
}

/// Pull-based iteration over a branch's mainline, oldest last. Each pull
/// fetches at most one log entry beyond what is cached; descriptors come
/// from the provider so they stay interned and pre-seeded with the walk's
/// change sets.
pub struct BranchHistoryCursor<'p> {
    provider: &'p RevisionDescriptorProvider,
    walk: ChangesWalk,
    last_revnum: Option<Revnum>,
    yielded: usize,
    limit: Option<usize>,
    end: Option<AncestryEnd>,
}

impl fmt::Debug for BranchHistoryCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchHistoryCursor")
            .field("last_revnum", &self.last_revnum)
            .field("yielded", &self.yielded)
            .field("limit", &self.limit)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

impl<'p> BranchHistoryCursor<'p> {
    pub(super) fn new(
        provider: &'p RevisionDescriptorProvider,
        walk: ChangesWalk,
        limit: Option<usize>,
    ) -> Self {
        Self { provider, walk, last_revnum: None, yielded: 0, limit, end: None }
    }

    /// Why iteration stopped; `None` while descriptors may still come.
    pub fn end(&self) -> Option<&AncestryEnd> {
        self.end.as_ref()
    }

    /// The next descriptor going backward in history, or `None` once the
    /// walk has ended (see [`BranchHistoryCursor::end`]).
    pub fn next_older(&mut self) -> Result<Option<Rc<RevisionDescriptor>>> {
        if self.end.is_some() {
            return Ok(None);
        }
        if self.limit.is_some_and(|limit| self.yielded >= limit) {
            self.end = Some(AncestryEnd::Truncated);
            return Ok(None);
        }
        let Some(step) = self.walk.advance()? else {
            self.end = self.walk.end().cloned();
            return Ok(None);
        };
        if self.last_revnum.is_some_and(|last| step.revnum >= last) {
            return Err(HistoryError::InconsistentLog {
                revnum: step.revnum,
                details: format!(
                    "ancestry of {:?} does not decrease (r{} after r{})",
                    step.path,
                    step.revnum,
                    self.last_revnum.unwrap_or_default()
                ),
            }
            .into());
        }
        self.last_revnum = Some(step.revnum);
        self.yielded += 1;
        if let Some(end) = self.walk.end() {
            // The walk bottomed out on this very step; record it now so a
            // limit equal to the lineage length does not read as truncation.
            self.end = Some(end.clone());
        }
        let descriptor =
            self.provider
                .get_seeded(&step.path, step.revnum, step.changes, step.props);
        Ok(Some(descriptor))
    }
}
