//! The built-in layout variants.

use crate::areas::log::ChangedPathLog;
use crate::artifacts::changes::{Revnum, join_paths};
use crate::artifacts::errors::HistoryError;
use crate::artifacts::layout::{
    BranchRoot, Classification, PathKind, PathLayout, PatternRoots, RootIter, wildcard_matches,
};

fn not_a_branch_path(layout: &dyn PathLayout, path: &str) -> HistoryError {
    HistoryError::NotABranchPath { path: path.to_string(), layout: layout.name() }
}

fn last_segment(path: &str) -> String {
    path.trim_matches('/').rsplit('/').next().unwrap_or_default().to_string()
}

/// The trunk/branches/tags convention, with the project living at a fixed
/// (`level = Some(n)`) or variable (`None`) nesting depth above the
/// convention directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrunkLayout {
    level: Option<usize>,
}

impl TrunkLayout {
    pub fn new(level: Option<usize>) -> Self {
        Self { level }
    }

    fn nesting_patterns(&self, project: Option<&str>, tails: &[&str]) -> Vec<String> {
        let prefix = match project {
            Some(p) => p.trim_matches('/').to_string(),
            None => match self.level {
                Some(level) => vec!["*"; level].join("/"),
                None => String::new(),
            },
        };
        tails.iter().map(|t| join_paths(&prefix, t)).collect()
    }
}

impl PathLayout for TrunkLayout {
    fn name(&self) -> String {
        match self.level {
            None => "trunk".to_string(),
            Some(level) => format!("trunk{level}"),
        }
    }

    fn classify(&self, path: &str) -> Result<Classification, HistoryError> {
        let path = path.trim_matches('/');
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for (i, part) in parts.iter().enumerate() {
            let above = i.checked_sub(1).map(|j| parts[j]);
            let (kind, project_len) = if above == Some("tags") {
                (PathKind::Tag, i - 1)
            } else if above == Some("branches") {
                (PathKind::Branch, i - 1)
            } else if *part == "trunk" {
                (PathKind::Branch, i)
            } else {
                continue;
            };
            if self.level.is_none_or(|level| level == project_len) {
                return Ok(Classification {
                    kind,
                    project: parts[..project_len].join("/"),
                    branch_root: parts[..=i].join("/"),
                    inner_path: parts[i + 1..].join("/"),
                });
            }
        }
        Err(not_a_branch_path(self, path))
    }

    fn branch_path(&self, name: &str, project: &str) -> Option<String> {
        if name.is_empty() {
            Some(join_paths(project, "trunk"))
        } else {
            Some(join_paths(&join_paths(project, "branches"), name))
        }
    }

    fn tag_path(&self, name: &str, project: &str) -> Option<String> {
        Some(join_paths(&join_paths(project, "tags"), name.trim_matches('/')))
    }

    fn branch_name(&self, path: &str) -> Option<String> {
        let name = last_segment(path);
        if name == "trunk" { Some(String::new()) } else { Some(name) }
    }

    fn tag_name(&self, path: &str) -> Option<String> {
        Some(last_segment(path))
    }

    fn enumerate_branches<'a>(
        &'a self,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        project: Option<&str>,
    ) -> RootIter<'a> {
        let patterns = self.nesting_patterns(project, &["branches/*", "trunk"]);
        PatternRoots::boxed(self, log, revnum, PathKind::Branch, project, patterns)
    }

    fn enumerate_tags<'a>(
        &'a self,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        project: Option<&str>,
    ) -> RootIter<'a> {
        let patterns = self.nesting_patterns(project, &["tags/*"]);
        PatternRoots::boxed(self, log, revnum, PathKind::Tag, project, patterns)
    }
}

/// The repository root is the only branch; tags are unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootLayout;

impl PathLayout for RootLayout {
    fn name(&self) -> String {
        "root".to_string()
    }

    fn classify(&self, path: &str) -> Result<Classification, HistoryError> {
        Ok(Classification {
            kind: PathKind::Branch,
            project: String::new(),
            branch_root: String::new(),
            inner_path: path.trim_matches('/').to_string(),
        })
    }

    fn branch_path(&self, name: &str, project: &str) -> Option<String> {
        (name.is_empty() && project.is_empty()).then(String::new)
    }

    fn tag_path(&self, _name: &str, _project: &str) -> Option<String> {
        None
    }

    fn branch_name(&self, path: &str) -> Option<String> {
        path.is_empty().then(String::new)
    }

    fn tag_name(&self, _path: &str) -> Option<String> {
        None
    }

    fn supports_tags(&self) -> bool {
        false
    }

    fn enumerate_branches<'a>(
        &'a self,
        _log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        _project: Option<&str>,
    ) -> RootIter<'a> {
        Box::new(std::iter::once(Ok(BranchRoot {
            project: String::new(),
            path: String::new(),
            name: "trunk".to_string(),
            has_props: None,
            revnum,
        })))
    }

    fn enumerate_tags<'a>(
        &'a self,
        _log: &'a dyn ChangedPathLog,
        _revnum: Revnum,
        _project: Option<&str>,
    ) -> RootIter<'a> {
        Box::new(std::iter::empty())
    }
}

/// Explicit branch and tag path lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomLayout {
    branches: Vec<String>,
    tags: Vec<String>,
}

impl CustomLayout {
    pub fn new(branches: Vec<String>, tags: Vec<String>) -> Self {
        let normalize = |v: Vec<String>| -> Vec<String> {
            let mut v: Vec<String> =
                v.into_iter().map(|p| p.trim_matches('/').to_string()).collect();
            v.sort();
            v
        };
        Self { branches: normalize(branches), tags: normalize(tags) }
    }

    fn lookup(&self, path: &str) -> Option<(PathKind, &str)> {
        let candidates = self
            .branches
            .iter()
            .map(|b| (PathKind::Branch, b))
            .chain(self.tags.iter().map(|t| (PathKind::Tag, t)));
        for (kind, root) in candidates {
            if path == root || path.starts_with(&format!("{root}/")) {
                return Some((kind, root));
            }
        }
        None
    }
}

impl PathLayout for CustomLayout {
    fn name(&self) -> String {
        "custom".to_string()
    }

    fn classify(&self, path: &str) -> Result<Classification, HistoryError> {
        let path = path.trim_matches('/');
        let (kind, root) = self.lookup(path).ok_or_else(|| not_a_branch_path(self, path))?;
        Ok(Classification {
            kind,
            project: root.to_string(),
            branch_root: root.to_string(),
            inner_path: path[root.len()..].trim_matches('/').to_string(),
        })
    }

    fn branch_path(&self, name: &str, project: &str) -> Option<String> {
        // The classification's project is the root itself; only the
        // anonymous name round-trips.
        (name.is_empty() && self.branches.iter().any(|b| b == project))
            .then(|| project.to_string())
    }

    fn tag_path(&self, name: &str, project: &str) -> Option<String> {
        (name.is_empty() && self.tags.iter().any(|t| t == project)).then(|| project.to_string())
    }

    fn branch_name(&self, _path: &str) -> Option<String> {
        Some(String::new())
    }

    fn tag_name(&self, _path: &str) -> Option<String> {
        Some(String::new())
    }

    fn supports_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    fn enumerate_branches<'a>(
        &'a self,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        project: Option<&str>,
    ) -> RootIter<'a> {
        PatternRoots::boxed(self, log, revnum, PathKind::Branch, project, self.branches.clone())
    }

    fn enumerate_tags<'a>(
        &'a self,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        project: Option<&str>,
    ) -> RootIter<'a> {
        PatternRoots::boxed(self, log, revnum, PathKind::Tag, project, self.tags.clone())
    }
}

/// Branch and tag patterns where a single `*` segment denotes the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardLayout {
    branches: Vec<String>,
    tags: Vec<String>,
}

impl WildcardLayout {
    pub fn new(branches: Vec<String>, tags: Vec<String>) -> Self {
        let normalize = |v: Vec<String>| -> Vec<String> {
            v.into_iter().map(|p| p.trim_matches('/').to_string()).collect()
        };
        Self { branches: normalize(branches), tags: normalize(tags) }
    }

    fn matches_any(patterns: &[String], path: &str) -> bool {
        patterns.iter().any(|p| wildcard_matches(path, p))
    }

    fn item_name(patterns: &[String], path: &str) -> Option<String> {
        for pattern in patterns {
            if wildcard_matches(path, pattern) {
                for (segment, wildcard) in path.split('/').zip(pattern.split('/')) {
                    if wildcard == "*" {
                        return Some(segment.to_string());
                    }
                }
                return Some(last_segment(path));
            }
        }
        None
    }

    fn item_path(patterns: &[String], name: &str) -> Option<String> {
        for pattern in patterns {
            match pattern.matches('*').count() {
                1 => return Some(pattern.replacen('*', name, 1)),
                0 if last_segment(pattern) == name => return Some(pattern.clone()),
                _ => {}
            }
        }
        None
    }
}

impl PathLayout for WildcardLayout {
    fn name(&self) -> String {
        "wildcard".to_string()
    }

    fn classify(&self, path: &str) -> Result<Classification, HistoryError> {
        let path = path.trim_matches('/');
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for i in 0..=parts.len() {
            let root = parts[..i].join("/");
            let kind = if Self::matches_any(&self.branches, &root) {
                PathKind::Branch
            } else if Self::matches_any(&self.tags, &root) {
                PathKind::Tag
            } else {
                continue;
            };
            return Ok(Classification {
                kind,
                project: root.clone(),
                branch_root: root,
                inner_path: parts[i..].join("/"),
            });
        }
        Err(not_a_branch_path(self, path))
    }

    fn branch_path(&self, name: &str, _project: &str) -> Option<String> {
        Self::item_path(&self.branches, name)
    }

    fn tag_path(&self, name: &str, _project: &str) -> Option<String> {
        Self::item_path(&self.tags, name)
    }

    fn branch_name(&self, path: &str) -> Option<String> {
        Self::item_name(&self.branches, path)
    }

    fn tag_name(&self, path: &str) -> Option<String> {
        Self::item_name(&self.tags, path)
    }

    fn supports_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    fn enumerate_branches<'a>(
        &'a self,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        project: Option<&str>,
    ) -> RootIter<'a> {
        PatternRoots::boxed(self, log, revnum, PathKind::Branch, project, self.branches.clone())
    }

    fn enumerate_tags<'a>(
        &'a self,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        project: Option<&str>,
    ) -> RootIter<'a> {
        PatternRoots::boxed(self, log, revnum, PathKind::Tag, project, self.tags.clone())
    }
}

/// trunk/branches/tags come first and the project segments follow:
/// `trunk/<project>`, `branches/<project>/<name>`, `tags/<project>/<name>`
/// with `level` project segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InverseTrunkLayout {
    level: usize,
}

impl InverseTrunkLayout {
    /// `level` must be at least 1.
    pub fn new(level: usize) -> Self {
        Self { level: level.max(1) }
    }

    fn project_glob(&self, project: Option<&str>) -> String {
        match project {
            Some(p) => p.trim_matches('/').to_string(),
            None => vec!["*"; self.level].join("/"),
        }
    }
}

impl PathLayout for InverseTrunkLayout {
    fn name(&self) -> String {
        format!("itrunk{}", self.level)
    }

    fn classify(&self, path: &str) -> Result<Classification, HistoryError> {
        let path = path.trim_matches('/');
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match parts.first() {
            Some(&"trunk") => {
                if parts.len() < self.level + 1 {
                    return Err(not_a_branch_path(self, path));
                }
                Ok(Classification {
                    kind: PathKind::Branch,
                    project: parts[1..=self.level].join("/"),
                    branch_root: parts[..=self.level].join("/"),
                    inner_path: parts[self.level + 1..].join("/"),
                })
            }
            Some(first @ (&"branches" | &"tags")) => {
                if parts.len() < self.level + 2 {
                    return Err(not_a_branch_path(self, path));
                }
                Ok(Classification {
                    kind: if *first == "branches" { PathKind::Branch } else { PathKind::Tag },
                    project: parts[1..=self.level].join("/"),
                    branch_root: parts[..=self.level + 1].join("/"),
                    inner_path: parts[self.level + 2..].join("/"),
                })
            }
            _ => Err(not_a_branch_path(self, path)),
        }
    }

    fn branch_path(&self, name: &str, project: &str) -> Option<String> {
        if name.is_empty() {
            Some(join_paths("trunk", project))
        } else {
            Some(join_paths(&join_paths("branches", project), name))
        }
    }

    fn tag_path(&self, name: &str, project: &str) -> Option<String> {
        Some(join_paths(&join_paths("tags", project), name))
    }

    fn branch_name(&self, path: &str) -> Option<String> {
        let path = path.trim_matches('/');
        if path == "trunk" || path.starts_with("trunk/") {
            Some(String::new())
        } else {
            Some(last_segment(path))
        }
    }

    fn tag_name(&self, path: &str) -> Option<String> {
        Some(last_segment(path))
    }

    fn enumerate_branches<'a>(
        &'a self,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        project: Option<&str>,
    ) -> RootIter<'a> {
        let glob = self.project_glob(project);
        let patterns = vec![
            join_paths("trunk", &glob),
            join_paths(&join_paths("branches", &glob), "*"),
        ];
        PatternRoots::boxed(self, log, revnum, PathKind::Branch, project, patterns)
    }

    fn enumerate_tags<'a>(
        &'a self,
        log: &'a dyn ChangedPathLog,
        revnum: Revnum,
        project: Option<&str>,
    ) -> RootIter<'a> {
        let glob = self.project_glob(project);
        let patterns = vec![join_paths(&join_paths("tags", &glob), "*")];
        PatternRoots::boxed(self, log, revnum, PathKind::Tag, project, patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn classification(
        kind: PathKind,
        project: &str,
        branch_root: &str,
        inner_path: &str,
    ) -> Classification {
        Classification {
            kind,
            project: project.to_string(),
            branch_root: branch_root.to_string(),
            inner_path: inner_path.to_string(),
        }
    }

    #[rstest]
    #[case("trunk", PathKind::Branch, "", "trunk", "")]
    #[case("trunk/src/lib.rs", PathKind::Branch, "", "trunk", "src/lib.rs")]
    #[case("branches/x", PathKind::Branch, "", "branches/x", "")]
    #[case("branches/x/file", PathKind::Branch, "", "branches/x", "file")]
    #[case("tags/1.0", PathKind::Tag, "", "tags/1.0", "")]
    #[case("proj/trunk", PathKind::Branch, "proj", "proj/trunk", "")]
    #[case("a/b/branches/x/d", PathKind::Branch, "a/b", "a/b/branches/x", "d")]
    fn trunk_variable_classifies(
        #[case] path: &str,
        #[case] kind: PathKind,
        #[case] project: &str,
        #[case] root: &str,
        #[case] inner: &str,
    ) {
        let layout = TrunkLayout::new(None);
        assert_eq!(
            layout.classify(path).unwrap(),
            classification(kind, project, root, inner)
        );
    }

    #[test]
    fn trunk_level_pins_project_depth() {
        let layout = TrunkLayout::new(Some(1));
        assert_eq!(
            layout.classify("proj/trunk/file").unwrap(),
            classification(PathKind::Branch, "proj", "proj/trunk", "file")
        );
        assert!(matches!(
            layout.classify("trunk"),
            Err(HistoryError::NotABranchPath { .. })
        ));
        assert!(matches!(
            layout.classify("a/b/trunk"),
            Err(HistoryError::NotABranchPath { .. })
        ));
    }

    #[test]
    fn trunk_round_trip_law() {
        let layout = TrunkLayout::new(None);
        for path in ["trunk", "branches/x", "proj/trunk", "a/b/branches/y", "tags/1.0"] {
            let c = layout.classify(path).unwrap();
            let reconstructed = match c.kind {
                PathKind::Branch => layout
                    .branch_path(&layout.branch_name(&c.branch_root).unwrap(), &c.project),
                PathKind::Tag => {
                    layout.tag_path(&layout.tag_name(&c.branch_root).unwrap(), &c.project)
                }
            };
            assert_eq!(reconstructed.as_deref(), Some(c.branch_root.as_str()));
        }
    }

    #[test]
    fn root_layout_classifies_everything_into_the_root_branch() {
        let layout = RootLayout;
        assert_eq!(
            layout.classify("any/path").unwrap(),
            classification(PathKind::Branch, "", "", "any/path")
        );
        assert!(layout.is_branch(""));
        assert!(!layout.is_branch("any"));
        assert!(!layout.supports_tags());
        assert_eq!(layout.branch_path("", ""), Some(String::new()));
        assert_eq!(layout.branch_path("x", ""), None);
    }

    #[test]
    fn custom_layout_prefix_matches_whole_segments() {
        let layout =
            CustomLayout::new(vec!["stable".into(), "dev".into()], vec!["releases/1.0".into()]);
        assert_eq!(
            layout.classify("stable/src").unwrap(),
            classification(PathKind::Branch, "stable", "stable", "src")
        );
        assert_eq!(
            layout.classify("releases/1.0").unwrap(),
            classification(PathKind::Tag, "releases/1.0", "releases/1.0", "")
        );
        assert!(matches!(
            layout.classify("stables"),
            Err(HistoryError::NotABranchPath { .. })
        ));
        // Round trip through the anonymous name.
        assert_eq!(layout.branch_path("", "stable"), Some("stable".to_string()));
    }

    #[test]
    fn wildcard_layout_takes_the_name_from_the_star_segment() {
        let layout =
            WildcardLayout::new(vec!["proj/branches/*".into()], vec!["proj/tags/*".into()]);
        assert_eq!(
            layout.classify("proj/branches/feature/src").unwrap(),
            classification(
                PathKind::Branch,
                "proj/branches/feature",
                "proj/branches/feature",
                "src"
            )
        );
        assert_eq!(layout.branch_name("proj/branches/feature").unwrap(), "feature");
        assert_eq!(
            layout.branch_path("feature", ""),
            Some("proj/branches/feature".to_string())
        );
        assert_eq!(layout.tag_name("proj/tags/1.0").unwrap(), "1.0");
        assert!(matches!(
            layout.classify("other/branches/x"),
            Err(HistoryError::NotABranchPath { .. })
        ));
    }

    #[rstest]
    #[case("trunk/proj", PathKind::Branch, "proj", "trunk/proj", "")]
    #[case("trunk/proj/src", PathKind::Branch, "proj", "trunk/proj", "src")]
    #[case("branches/proj/x", PathKind::Branch, "proj", "branches/proj/x", "")]
    #[case("branches/proj/x/f", PathKind::Branch, "proj", "branches/proj/x", "f")]
    #[case("tags/proj/1.0", PathKind::Tag, "proj", "tags/proj/1.0", "")]
    fn inverse_trunk_classifies(
        #[case] path: &str,
        #[case] kind: PathKind,
        #[case] project: &str,
        #[case] root: &str,
        #[case] inner: &str,
    ) {
        let layout = InverseTrunkLayout::new(1);
        assert_eq!(
            layout.classify(path).unwrap(),
            classification(kind, project, root, inner)
        );
    }

    #[test]
    fn inverse_trunk_round_trip_law() {
        let layout = InverseTrunkLayout::new(1);
        for path in ["trunk/proj", "branches/proj/x", "tags/proj/1.0"] {
            let c = layout.classify(path).unwrap();
            let reconstructed = match c.kind {
                PathKind::Branch => layout
                    .branch_path(&layout.branch_name(&c.branch_root).unwrap(), &c.project),
                PathKind::Tag => {
                    layout.tag_path(&layout.tag_name(&c.branch_root).unwrap(), &c.project)
                }
            };
            assert_eq!(reconstructed.as_deref(), Some(c.branch_root.as_str()));
        }
    }

    #[test]
    fn inverse_trunk_rejects_shallow_paths() {
        let layout = InverseTrunkLayout::new(1);
        assert!(layout.classify("trunk").is_err());
        assert!(layout.classify("branches/proj").is_err());
        assert!(layout.classify("elsewhere").is_err());
    }
}
