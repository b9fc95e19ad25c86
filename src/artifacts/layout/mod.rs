//! Branch/tag path-layout policies.
//!
//! A layout decides which repository paths represent branches or tags and
//! decomposes any path into project, branch-root and inner-path
//! components. Classification is pure; enumeration lists candidate roots
//! against directory listings at a revision, skipping candidates that do
//! not exist there.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::areas::log::ChangedPathLog;
use crate::artifacts::changes::{NodeKind, Revnum, join_paths};
use crate::artifacts::errors::{HistoryError, skippable_listing_failure};

pub mod standard;

pub use standard::{CustomLayout, InverseTrunkLayout, RootLayout, TrunkLayout, WildcardLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Branch,
    Tag,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKind::Branch => write!(f, "branch"),
            PathKind::Tag => write!(f, "tag"),
        }
    }
}

/// Decomposition of a repository path.
///
/// `branch_root` is always a prefix of the classified path and
/// `inner_path` the remainder, with no leading slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: PathKind,
    pub project: String,
    pub branch_root: String,
    pub inner_path: String,
}

/// One enumerated branch or tag root at a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRoot {
    pub project: String,
    pub path: String,
    /// Display name: the last path segment (the layout's
    /// `branch_name`/`tag_name` give the logical name instead).
    pub name: String,
    /// Whether the root carries local properties, when cheaply known.
    pub has_props: Option<bool>,
    pub revnum: Revnum,
}

pub type RootIter<'a> = Box<dyn Iterator<Item = anyhow::Result<BranchRoot>> + 'a>;

pub trait PathLayout: fmt::Debug {
    /// Short configuration name ("trunk0", "root", "wildcard", ...).
    fn name(&self) -> String;

    /// Decompose `path`; fails with [`HistoryError::NotABranchPath`] when
    /// no recognized branch/tag pattern matches. Deterministic, no side
    /// effects.
    fn classify(&self, path: &str) -> Result<Classification, HistoryError>;

    /// Path at which the branch named `name` for `project` lives, or
    /// `None` when this layout cannot place named branches.
    fn branch_path(&self, name: &str, project: &str) -> Option<String>;

    /// Path at which the tag named `name` for `project` lives.
    fn tag_path(&self, name: &str, project: &str) -> Option<String>;

    /// Logical branch name of a branch-root path ("" for a trunk-like
    /// main branch).
    fn branch_name(&self, path: &str) -> Option<String>;

    fn tag_name(&self, path: &str) -> Option<String>;

    fn supports_tags(&self) -> bool {
        true
    }

    fn enumerate_branches<'a>(
        &'a self,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        project: Option<&str>,
    ) -> RootIter<'a>;

    fn enumerate_tags<'a>(
        &'a self,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        project: Option<&str>,
    ) -> RootIter<'a>;

    fn is_branch(&self, path: &str) -> bool {
        matches!(
            self.classify(path),
            Ok(c) if c.kind == PathKind::Branch && c.inner_path.is_empty()
        )
    }

    fn is_tag(&self, path: &str) -> bool {
        matches!(
            self.classify(path),
            Ok(c) if c.kind == PathKind::Tag && c.inner_path.is_empty()
        )
    }

    fn is_branch_or_tag(&self, path: &str) -> bool {
        self.is_branch(path) || self.is_tag(path)
    }
}

/// Segment-wise wildcard match: a `*` pattern segment matches exactly one
/// non-empty path segment; anything else matches literally.
pub fn wildcard_matches(path: &str, pattern: &str) -> bool {
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    path_segments.len() == pattern_segments.len()
        && path_segments
            .iter()
            .zip(&pattern_segments)
            .all(|(p, w)| *w == "*" || p == w)
}

/// Expand one root pattern against directory listings at `revnum`. A `*`
/// segment expands to the directory entries of each candidate so far;
/// not-found and not-a-directory conditions are swallowed, other errors
/// propagate.
fn expand_pattern(
    log: &dyn ChangedPathLog,
    revnum: Revnum,
    pattern: &str,
) -> anyhow::Result<Vec<String>> {
    let mut bases = vec![String::new()];
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        let mut next = Vec::new();
        if segment == "*" {
            for base in &bases {
                match log.directory_listing(base, revnum) {
                    Ok(entries) => next.extend(
                        entries
                            .into_iter()
                            .filter(|e| e.kind == NodeKind::Directory)
                            .map(|e| join_paths(base, &e.name)),
                    ),
                    Err(e) if skippable_listing_failure(&e) => {}
                    Err(e) => return Err(e),
                }
            }
        } else {
            for base in &bases {
                next.push(join_paths(base, segment));
            }
        }
        bases = next;
    }
    Ok(bases)
}

/// Lazy enumeration over candidate roots: patterns are expanded one at a
/// time, candidates verified to exist as directories, and only paths the
/// layout actually recognizes as the requested kind are produced.
pub(crate) struct PatternRoots<'a> {
    layout: &'a dyn PathLayout,
    log: &'a dyn ChangedPathLog,
    revnum: Revnum,
    kind: PathKind,
    project: String,
    patterns: std::vec::IntoIter<String>,
    pending: VecDeque<String>,
    failed: bool,
}

impl<'a> PatternRoots<'a> {
    pub(crate) fn boxed(
        layout: &'a dyn PathLayout,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        kind: PathKind,
        project: Option<&str>,
        patterns: Vec<String>,
    ) -> RootIter<'a> {
        Box::new(PatternRoots {
            layout,
            log,
            revnum,
            kind,
            project: project.unwrap_or_default().to_string(),
            patterns: patterns.into_iter(),
            pending: VecDeque::new(),
            failed: false,
        })
    }

    fn exists_as_directory(&self, path: &str) -> anyhow::Result<bool> {
        match self.log.directory_listing(path, self.revnum) {
            Ok(_) => Ok(true),
            Err(e) if skippable_listing_failure(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Iterator for PatternRoots<'_> {
    type Item = anyhow::Result<BranchRoot>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(path) = self.pending.pop_front() {
                let recognized = match self.kind {
                    PathKind::Branch => self.layout.is_branch(&path),
                    PathKind::Tag => self.layout.is_tag(&path),
                };
                if !recognized {
                    continue;
                }
                match self.exists_as_directory(&path) {
                    Ok(false) => continue,
                    Ok(true) => {
                        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
                        return Some(Ok(BranchRoot {
                            project: self.project.clone(),
                            path,
                            name,
                            has_props: None,
                            revnum: self.revnum,
                        }));
                    }
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
            }
            let pattern = self.patterns.next()?;
            match expand_pattern(self.log, self.revnum, &pattern) {
                Ok(candidates) => self.pending.extend(candidates),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// String form of the built-in layouts, for configuration and the CLI:
/// `trunk` (variable nesting), `trunkN`, `root`, `itrunkN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutSpec {
    Trunk(Option<usize>),
    Root,
    InverseTrunk(usize),
}

impl LayoutSpec {
    pub fn into_layout(self) -> Rc<dyn PathLayout> {
        match self {
            LayoutSpec::Trunk(level) => Rc::new(TrunkLayout::new(level)),
            LayoutSpec::Root => Rc::new(RootLayout),
            LayoutSpec::InverseTrunk(level) => Rc::new(InverseTrunkLayout::new(level)),
        }
    }
}

impl FromStr for LayoutSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "root" {
            return Ok(LayoutSpec::Root);
        }
        if s == "trunk" || s == "trunk-variable" {
            return Ok(LayoutSpec::Trunk(None));
        }
        if let Some(level) = s.strip_prefix("itrunk") {
            let level: usize = level.parse()?;
            anyhow::ensure!(level > 0, "itrunk nesting level must be at least 1");
            return Ok(LayoutSpec::InverseTrunk(level));
        }
        if let Some(level) = s.strip_prefix("trunk") {
            return Ok(LayoutSpec::Trunk(Some(level.parse()?)));
        }
        anyhow::bail!("unknown layout {s:?} (expected trunk, trunkN, itrunkN or root)")
    }
}

impl fmt::Display for LayoutSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutSpec::Trunk(None) => write!(f, "trunk"),
            LayoutSpec::Trunk(Some(level)) => write!(f, "trunk{level}"),
            LayoutSpec::Root => write!(f, "root"),
            LayoutSpec::InverseTrunk(level) => write!(f, "itrunk{level}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("branches/foo", "branches/*", true)]
    #[case("branches/foo/bar", "branches/*", false)]
    #[case("branches", "branches/*", false)]
    #[case("tags/1.0", "tags/1.0", true)]
    #[case("a/branches/x", "*/branches/*", true)]
    fn wildcard_matching(#[case] path: &str, #[case] pattern: &str, #[case] expected: bool) {
        assert_eq!(wildcard_matches(path, pattern), expected);
    }

    #[rstest]
    #[case("trunk", LayoutSpec::Trunk(None))]
    #[case("trunk0", LayoutSpec::Trunk(Some(0)))]
    #[case("trunk2", LayoutSpec::Trunk(Some(2)))]
    #[case("root", LayoutSpec::Root)]
    #[case("itrunk1", LayoutSpec::InverseTrunk(1))]
    fn layout_spec_round_trips(#[case] text: &str, #[case] spec: LayoutSpec) {
        assert_eq!(text.parse::<LayoutSpec>().unwrap(), spec);
        assert_eq!(spec.to_string(), text);
    }

    #[test]
    fn bad_layout_specs_are_rejected() {
        assert!("itrunk0".parse::<LayoutSpec>().is_err());
        assert!("shrubbery".parse::<LayoutSpec>().is_err());
    }
}
