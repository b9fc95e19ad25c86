//! Right-hand (merge) parents from embedded metadata.
//!
//! Two channels record merges in the source log. Round-trip metadata
//! written by a prior export names merged revision ids outright and is
//! authoritative. Failing that, the `svk:merge` branch-root property is
//! consulted: each line is a merged-feature marker, and markers that
//! appear in this revision name foreign revisions merged here.

use std::rc::Rc;

use anyhow::Result;

use crate::artifacts::changes::Revnum;
use crate::artifacts::layout::PathLayout;
use crate::artifacts::mapping::{
    ForeignRevId, MappingVersion, RevisionId, roundtrip_rhs_parents,
};
use crate::artifacts::revmeta::descriptor::RevisionDescriptor;

/// Branch-root property with one `uuid:/path:revnum` marker per line.
pub const SVK_MERGE_PROPERTY: &str = "svk:merge";

/// One `svk:merge` marker: a merged head in some repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeFeature {
    pub uuid: String,
    pub branch_path: String,
    pub revnum: Revnum,
}

impl MergeFeature {
    /// Parse a `uuid:/path:revnum` line. Lines that do not follow the
    /// grammar yield `None` and are skipped by callers.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (head, revnum) = line.rsplit_once(':')?;
        let revnum: Revnum = revnum.parse().ok()?;
        let (uuid, path) = head.split_once(":/")?;
        if uuid.is_empty() {
            return None;
        }
        Some(MergeFeature {
            uuid: uuid.to_string(),
            branch_path: path.trim_matches('/').to_string(),
            revnum,
        })
    }

    pub fn foreign_id(&self) -> ForeignRevId {
        ForeignRevId::new(self.uuid.clone(), self.branch_path.clone(), self.revnum)
    }
}

/// Markers present in `new` but not in `old`, in `new`'s line order.
fn features_merged_since(new: &str, old: &str) -> Vec<MergeFeature> {
    let previous: Vec<MergeFeature> = old.lines().filter_map(MergeFeature::parse).collect();
    new.lines()
        .filter_map(MergeFeature::parse)
        .filter(|f| !previous.contains(f))
        .collect()
}

/// Resolves the extra (non-left-hand) parents of a revision.
#[derive(derive_new::new)]
pub struct MergeResolver {
    layout: Rc<dyn PathLayout>,
    version: MappingVersion,
}

impl MergeResolver {
    /// The right-hand parent ids of `descriptor`, in recorded order with
    /// duplicates removed. Empty when the revision merges nothing.
    pub fn rhs_parents(&self, descriptor: &RevisionDescriptor) -> Result<Vec<RevisionId>> {
        let revprops = descriptor.revprops()?;
        let changed_fileprops = descriptor.changed_fileprops()?;
        if let Some(recorded) = roundtrip_rhs_parents(&revprops, &changed_fileprops) {
            return Ok(dedup_in_order(recorded));
        }
        if !descriptor.changes_branch_root()? {
            // Merge markers live on the branch root; an untouched root
            // cannot have gained any.
            return Ok(Vec::new());
        }
        let Some((old, new)) = changed_fileprops
            .get(SVK_MERGE_PROPERTY)
            .map(|(old, new)| (old.as_deref().unwrap_or(""), new.as_deref().unwrap_or("")))
        else {
            return Ok(Vec::new());
        };
        let parents = features_merged_since(new, old)
            .into_iter()
            .filter(|feature| {
                // A marker can point anywhere; only branch or tag heads of
                // the marker's repository become parents.
                let merged_branch = self.layout.is_branch_or_tag(&feature.branch_path);
                if !merged_branch {
                    tracing::debug!(
                        marker = %feature.foreign_id(),
                        "skipping merge marker outside the branch namespace"
                    );
                }
                merged_branch
            })
            .map(|feature| self.version.derive(&feature.foreign_id()))
            .collect();
        Ok(dedup_in_order(parents))
    }
}

fn dedup_in_order(ids: Vec<RevisionId>) -> Vec<RevisionId> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}
