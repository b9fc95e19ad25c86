//! A reconstruction session over one source repository.

use std::rc::Rc;

use anyhow::Result;

use crate::areas::log::ChangedPathLog;
use crate::artifacts::changes::Revnum;
use crate::artifacts::errors::HistoryError;
use crate::artifacts::fileids::{FileIdMapBuilder, FileIdentityMap};
use crate::artifacts::layout::{BranchRoot, Classification, PathLayout};
use crate::artifacts::mapping::{
    ForeignRevId, MappingVersion, RevisionId, recover_foreign_id,
};
use crate::artifacts::merges::MergeResolver;
use crate::artifacts::revmeta::cursor::{AncestryEnd, BranchHistoryCursor};
use crate::artifacts::revmeta::descriptor::RevisionDescriptor;
use crate::artifacts::revmeta::provider::RevisionDescriptorProvider;

/// Ties a changed-path log, a path layout and a mapping version together
/// into one queryable unit. Holds the session-wide descriptor provider so
/// everything sees the same cached revisions.
pub struct SourceRepository {
    layout: Rc<dyn PathLayout>,
    version: MappingVersion,
    provider: RevisionDescriptorProvider,
    resolver: MergeResolver,
}

impl SourceRepository {
    pub fn open(
        uuid: impl Into<String>,
        log: Rc<dyn ChangedPathLog>,
        layout: Rc<dyn PathLayout>,
        version: MappingVersion,
    ) -> Result<Self> {
        let uuid = uuid.into();
        // The uuid is embedded into identifiers whose grammar reserves the
        // colon.
        anyhow::ensure!(
            !uuid.is_empty() && !uuid.contains(':'),
            "invalid repository uuid {uuid:?}"
        );
        tracing::info!(%uuid, layout = %layout.name(), version = %version, "opening repository");
        Ok(Self {
            provider: RevisionDescriptorProvider::new(uuid, log),
            resolver: MergeResolver::new(Rc::clone(&layout), version),
            layout,
            version,
        })
    }

    pub fn uuid(&self) -> &str {
        self.provider.uuid()
    }

    pub fn layout(&self) -> &Rc<dyn PathLayout> {
        &self.layout
    }

    pub fn version(&self) -> MappingVersion {
        self.version
    }

    pub fn provider(&self) -> &RevisionDescriptorProvider {
        &self.provider
    }

    pub fn latest_revnum(&self) -> Revnum {
        self.provider.log().latest_revnum()
    }

    pub fn classify(&self, path: &str) -> Result<Classification, HistoryError> {
        self.layout.classify(path.trim_matches('/'))
    }

    /// The stable identifier of `(branch_path, revnum)` under this
    /// session's mapping version.
    pub fn revision_id(&self, branch_path: &str, revnum: Revnum) -> Result<RevisionId> {
        self.provider.get(branch_path, revnum).revision_id(self.version)
    }

    /// Resolve an identifier back to a location in this repository.
    /// Identifiers of other repositories are unrecognized here.
    pub fn lookup_revision_id(
        &self,
        identifier: &str,
    ) -> Result<(ForeignRevId, MappingVersion), HistoryError> {
        let (foreign, version) = recover_foreign_id(identifier)?;
        if foreign.uuid != self.uuid() {
            return Err(HistoryError::UnrecognizedIdentifier(identifier.to_string()));
        }
        Ok((foreign, version))
    }

    pub fn mainline(
        &self,
        branch_path: &str,
        revnum: Revnum,
    ) -> Result<(Vec<Rc<RevisionDescriptor>>, AncestryEnd)> {
        self.provider.mainline(branch_path, revnum, Rc::clone(&self.layout))
    }

    pub fn iter_ancestry(
        &self,
        branch_path: &str,
        revnum: Revnum,
        floor: Revnum,
        limit: Option<usize>,
    ) -> Result<BranchHistoryCursor<'_>> {
        self.provider
            .iter_branch_ancestry(branch_path, revnum, Rc::clone(&self.layout), floor, limit)
    }

    /// All parent ids of a revision: the left-hand parent first, then the
    /// recorded merges.
    pub fn parent_ids(&self, descriptor: &RevisionDescriptor) -> Result<Vec<RevisionId>> {
        let lhs = self
            .provider
            .lhs_parent(descriptor, Rc::clone(&self.layout))?
            .map(|parent| parent.revision_id(self.version))
            .transpose()?;
        let mut parents = Vec::new();
        if let Some(lhs) = lhs {
            parents.push(lhs);
        }
        for rhs in self.resolver.rhs_parents(descriptor)? {
            if !parents.contains(&rhs) {
                parents.push(rhs);
            }
        }
        Ok(parents)
    }

    pub fn file_id_map(&self, branch_path: &str, revnum: Revnum) -> Result<FileIdentityMap> {
        let builder = FileIdMapBuilder::new(
            Rc::clone(self.provider.log()),
            Rc::clone(&self.layout),
            self.version,
        );
        builder.build(&self.provider, branch_path, revnum)
    }

    pub fn branches(&self, revnum: Revnum, project: Option<&str>) -> Result<Vec<BranchRoot>> {
        self.layout
            .enumerate_branches(self.provider.log().as_ref(), revnum, project)
            .collect()
    }

    pub fn tags(&self, revnum: Revnum, project: Option<&str>) -> Result<Vec<BranchRoot>> {
        self.layout
            .enumerate_tags(self.provider.log().as_ref(), revnum, project)
            .collect()
    }
}
