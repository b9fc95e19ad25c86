//! Versioned revision-identity generation and embedded round-trip
//! metadata.
//!
//! A mapping version is a policy for deriving stable revision identifiers
//! from `(repository uuid, branch path, revision number)` triples and for
//! interpreting metadata embedded in the log by prior exports. Old
//! encodings stay readable forever; new identifiers are derived with
//! [`MappingVersion::CURRENT`]. The property keys defined here are a
//! persisted format and must remain byte-stable.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use sha1::{Digest, Sha1};

use crate::areas::log::{PropertyDiff, RevisionProperties};
use crate::artifacts::changes::Revnum;
use crate::artifacts::errors::HistoryError;

/// Identity of one immutable snapshot of one path-tree at one point in
/// the source log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForeignRevId {
    pub uuid: String,
    pub branch_path: String,
    pub revnum: Revnum,
}

impl ForeignRevId {
    pub fn new(uuid: impl Into<String>, branch_path: impl Into<String>, revnum: Revnum) -> Self {
        Self { uuid: uuid.into(), branch_path: branch_path.into(), revnum }
    }

    /// The canonical null ancestor: the repository root at revision 0.
    pub fn null_ancestor(uuid: impl Into<String>) -> Self {
        Self::new(uuid, "", 0)
    }
}

impl fmt::Display for ForeignRevId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:/{}@{}", self.uuid, self.branch_path, self.revnum)
    }
}

/// A stable revision identifier in the target history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevisionId(String);

impl RevisionId {
    /// The well-known "no revision" marker.
    pub fn null() -> Self {
        RevisionId("null:".to_string())
    }

    pub fn is_null(&self) -> bool {
        self.0 == "null:"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RevisionId {
    fn from(s: String) -> Self {
        RevisionId(s)
    }
}

impl From<&str> for RevisionId {
    fn from(s: &str) -> Self {
        RevisionId(s.to_string())
    }
}

/// A stable per-path file identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(String);

impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        FileId(s)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        FileId(s.to_string())
    }
}

/// Revision property carrying an explicitly assigned revision id.
pub const REVPROP_REVISION_ID: &str = "svndag:revision-id";
/// Revision property listing merged revision ids, one per line.
pub const REVPROP_MERGE: &str = "svndag:merge";
/// Branch-root property with appended `"<path>\t<id>"` file-id overrides.
pub const FILEPROP_FILE_IDS: &str = "svndag:file-ids";

static V4_GRAMMAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^svndag-v4:([^:]+):(.*):([0-9]+)$").unwrap());
static V3_GRAMMAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^svndag-v3:([^:]+):([^:]*):([0-9]+)$").unwrap());

/// The closed set of identifier encodings. All versions stay readable;
/// derivation targets [`MappingVersion::CURRENT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingVersion {
    /// Legacy encoding with a percent-escaped branch path.
    V3,
    /// Current encoding; the branch path is embedded verbatim.
    V4,
}

/// Lookup table for read paths; decoding tries each entry in order.
pub const ALL_VERSIONS: &[MappingVersion] = &[MappingVersion::V4, MappingVersion::V3];

impl MappingVersion {
    pub const CURRENT: MappingVersion = MappingVersion::V4;

    pub fn name(self) -> &'static str {
        match self {
            MappingVersion::V3 => "v3",
            MappingVersion::V4 => "v4",
        }
    }

    /// Branch-root property with appended `"<revno> <revid>"` lines, the
    /// newest being this revision's explicitly assigned id.
    pub fn revision_id_property(self) -> String {
        format!("svndag:revision-id:{}", self.name())
    }

    /// Branch-root property with appended lines of space-separated merged
    /// revision ids.
    pub fn ancestry_property(self) -> String {
        format!("svndag:ancestry:{}", self.name())
    }

    /// Derive the identifier for a foreign revision. Deterministic and
    /// injective per version; versions never collide with each other
    /// (distinct prefixes).
    pub fn derive(self, foreign: &ForeignRevId) -> RevisionId {
        match self {
            MappingVersion::V4 => RevisionId(format!(
                "svndag-v4:{}:{}:{}",
                foreign.uuid, foreign.branch_path, foreign.revnum
            )),
            MappingVersion::V3 => RevisionId(format!(
                "svndag-v3:{}:{}:{}",
                foreign.uuid,
                escape_branch_path(&foreign.branch_path),
                foreign.revnum
            )),
        }
    }

    /// Inverse of [`MappingVersion::derive`] for this version only.
    pub fn recover(self, identifier: &str) -> Result<ForeignRevId, HistoryError> {
        let unrecognized = || HistoryError::UnrecognizedIdentifier(identifier.to_string());
        let grammar = match self {
            MappingVersion::V4 => &V4_GRAMMAR,
            MappingVersion::V3 => &V3_GRAMMAR,
        };
        let captures = grammar.captures(identifier).ok_or_else(unrecognized)?;
        let revnum: Revnum = captures[3].parse().map_err(|_| unrecognized())?;
        let branch_path = match self {
            MappingVersion::V4 => captures[2].to_string(),
            MappingVersion::V3 => unescape_branch_path(&captures[2]).ok_or_else(unrecognized)?,
        };
        Ok(ForeignRevId::new(captures[1].to_string(), branch_path, revnum))
    }
}

impl fmt::Display for MappingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inverse lookup across every supported version.
pub fn recover_foreign_id(
    identifier: &str,
) -> Result<(ForeignRevId, MappingVersion), HistoryError> {
    for version in ALL_VERSIONS {
        if let Ok(foreign) = version.recover(identifier) {
            return Ok((foreign, *version));
        }
    }
    Err(HistoryError::UnrecognizedIdentifier(identifier.to_string()))
}

fn escape_branch_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for b in path.bytes() {
        match b {
            b':' | b'%' | b'/' => out.push_str(&format!("%{b:02x}")),
            _ => out.push(b as char),
        }
    }
    out
}

fn unescape_branch_path(escaped: &str) -> Option<String> {
    let bytes = escaped.as_bytes();
    let mut out = String::with_capacity(escaped.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = escaped.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()? as char);
            i += 3;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    Some(out)
}

/// Lines present in `new` beyond the append-only prefix `old`. Returns
/// `None` when `new` does not extend `old` (the property was rewritten,
/// not appended to, so nothing can be attributed to this revision).
fn appended_lines<'a>(old: Option<&str>, new: Option<&'a str>) -> Option<Vec<&'a str>> {
    let new = new?;
    let old = old.unwrap_or("");
    let tail = new.strip_prefix(old)?;
    Some(tail.lines().filter(|l| !l.trim().is_empty()).collect())
}

fn changed_value<'a>(diff: &'a PropertyDiff, key: &str) -> (Option<&'a str>, Option<&'a str>) {
    match diff.get(key) {
        Some((old, new)) => (old.as_deref(), new.as_deref()),
        None => (None, None),
    }
}

/// An explicitly assigned revision id found in embedded round-trip
/// metadata, with the recorded distance-to-null when it came from the
/// branch-root property channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitId {
    pub revno: Option<u64>,
    pub revision_id: RevisionId,
}

/// Look for an explicitly assigned revision id. The revision property
/// channel wins over the branch-root property channel; either takes
/// precedence over derivation.
pub fn resolve_explicit_id(
    revprops: &RevisionProperties,
    changed_fileprops: &PropertyDiff,
) -> Option<ExplicitId> {
    if let Some(id) = revprops.extra.get(REVPROP_REVISION_ID) {
        return Some(ExplicitId { revno: None, revision_id: RevisionId::from(id.trim()) });
    }
    for version in ALL_VERSIONS {
        let (old, new) = changed_value(changed_fileprops, &version.revision_id_property());
        let Some(lines) = appended_lines(old, new) else { continue };
        if let Some(line) = lines.last() {
            let mut fields = line.split_whitespace();
            let revno = fields.next()?.parse().ok()?;
            let revision_id = RevisionId::from(fields.next()?);
            return Some(ExplicitId { revno: Some(revno), revision_id });
        }
    }
    None
}

/// Merged revision ids recorded by a prior export, in recorded order.
/// `None` when the revision carries no round-trip merge metadata at all
/// (as opposed to metadata that records no merges).
pub fn roundtrip_rhs_parents(
    revprops: &RevisionProperties,
    changed_fileprops: &PropertyDiff,
) -> Option<Vec<RevisionId>> {
    if let Some(value) = revprops.extra.get(REVPROP_MERGE) {
        return Some(
            value
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(RevisionId::from)
                .collect(),
        );
    }
    for version in ALL_VERSIONS {
        let (old, new) = changed_value(changed_fileprops, &version.ancestry_property());
        let Some(lines) = appended_lines(old, new) else { continue };
        let ids = lines
            .iter()
            .flat_map(|l| l.split_whitespace())
            .map(RevisionId::from)
            .collect();
        return Some(ids);
    }
    None
}

/// File-identity overrides recorded by a prior export: the `"path\tid"`
/// lines appended to the branch-root file-ids property in this revision.
pub fn file_id_overrides(changed_fileprops: &PropertyDiff) -> BTreeMap<String, FileId> {
    let (old, new) = changed_value(changed_fileprops, FILEPROP_FILE_IDS);
    let mut overrides = BTreeMap::new();
    for line in appended_lines(old, new).unwrap_or_default() {
        if let Some((path, id)) = line.split_once('\t') {
            overrides.insert(path.trim_matches('/').to_string(), FileId::from(id));
        }
    }
    overrides
}

/// Longest readable file id; longer derivations are compacted through a
/// digest.
const MAX_FILE_ID_LEN: usize = 150;

/// Deterministic file identity for a path created in `foreign`.
pub fn generate_file_id(foreign: &ForeignRevId, path: &str) -> FileId {
    let full = format!(
        "{}@{}:{}:{}",
        foreign.revnum, foreign.uuid, foreign.branch_path, path
    );
    if full.len() > MAX_FILE_ID_LEN {
        let digest = Sha1::digest(full.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        FileId(format!("sha1:{hex}"))
    } else {
        FileId(full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const UUID: &str = "d1a4b1d2-7f5e-4c9b-8a2e-0123456789ab";

    #[test]
    fn derive_and_recover_round_trip() {
        let foreign = ForeignRevId::new(UUID, "branches/x", 42);
        for version in ALL_VERSIONS {
            let id = version.derive(&foreign);
            assert_eq!(version.recover(id.as_str()).unwrap(), foreign);
            assert_eq!(recover_foreign_id(id.as_str()).unwrap(), (foreign.clone(), *version));
        }
    }

    #[test]
    fn versions_are_namespaced() {
        let foreign = ForeignRevId::new(UUID, "trunk", 1);
        assert_ne!(
            MappingVersion::V3.derive(&foreign),
            MappingVersion::V4.derive(&foreign)
        );
    }

    #[test]
    fn v3_escapes_branch_separators() {
        let foreign = ForeignRevId::new(UUID, "branches/a:b", 7);
        let id = MappingVersion::V3.derive(&foreign);
        assert!(!id.as_str()[format!("svndag-v3:{UUID}:").len()..].contains('/'));
        assert_eq!(MappingVersion::V3.recover(id.as_str()).unwrap(), foreign);
    }

    #[test]
    fn unrecognized_identifiers_are_reported() {
        for bad in ["", "git:abcdef", "svndag-v9:u:p:1", "svndag-v4:u:p:notanumber"] {
            assert!(matches!(
                recover_foreign_id(bad),
                Err(HistoryError::UnrecognizedIdentifier(_))
            ));
        }
    }

    #[test]
    fn explicit_id_prefers_revision_properties() {
        let mut revprops = RevisionProperties::default();
        revprops
            .extra
            .insert(REVPROP_REVISION_ID.to_string(), "custom-id".to_string());
        let mut diff = PropertyDiff::new();
        diff.insert(
            MappingVersion::V4.revision_id_property(),
            (None, Some("3 other-id\n".to_string())),
        );
        let explicit = resolve_explicit_id(&revprops, &diff).unwrap();
        assert_eq!(explicit.revision_id, RevisionId::from("custom-id"));
        assert_eq!(explicit.revno, None);
    }

    #[test]
    fn explicit_id_reads_the_newest_appended_line() {
        let diff = PropertyDiff::from([(
            MappingVersion::V4.revision_id_property(),
            (
                Some("1 old-id\n".to_string()),
                Some("1 old-id\n2 new-id\n".to_string()),
            ),
        )]);
        let explicit = resolve_explicit_id(&RevisionProperties::default(), &diff).unwrap();
        assert_eq!(explicit.revision_id, RevisionId::from("new-id"));
        assert_eq!(explicit.revno, Some(2));
    }

    #[test]
    fn rewritten_id_property_is_ignored() {
        // Not an append: nothing attributable to this revision.
        let diff = PropertyDiff::from([(
            MappingVersion::V4.revision_id_property(),
            (Some("1 old-id\n".to_string()), Some("2 new-id\n".to_string())),
        )]);
        assert_eq!(resolve_explicit_id(&RevisionProperties::default(), &diff), None);
    }

    #[test]
    fn roundtrip_merges_preserve_recorded_order() {
        let diff = PropertyDiff::from([(
            MappingVersion::V4.ancestry_property(),
            (None, Some("zebra-id apple-id\n".to_string())),
        )]);
        let parents = roundtrip_rhs_parents(&RevisionProperties::default(), &diff).unwrap();
        assert_eq!(
            parents,
            vec![RevisionId::from("zebra-id"), RevisionId::from("apple-id")]
        );
    }

    #[test]
    fn file_id_override_lines_decode() {
        let diff = PropertyDiff::from([(
            FILEPROP_FILE_IDS.to_string(),
            (None, Some("doc/book\tbook-id-1\n".to_string())),
        )]);
        let overrides = file_id_overrides(&diff);
        assert_eq!(overrides.get("doc/book"), Some(&FileId::from("book-id-1")));
    }

    #[test]
    fn overlong_file_ids_are_compacted() {
        let foreign = ForeignRevId::new(UUID, "branches/x", 1);
        let id = generate_file_id(&foreign, &"deep/".repeat(60));
        assert!(id.as_str().starts_with("sha1:"));
        assert_eq!(id, generate_file_id(&foreign, &"deep/".repeat(60)));
    }

    proptest! {
        #[test]
        fn derive_is_injective_per_version(
            branch_a in "[a-z/]{0,12}",
            rev_a in 0u64..10_000,
            branch_b in "[a-z/]{0,12}",
            rev_b in 0u64..10_000,
        ) {
            let a = ForeignRevId::new(UUID, branch_a.trim_matches('/'), rev_a);
            let b = ForeignRevId::new(UUID, branch_b.trim_matches('/'), rev_b);
            for version in ALL_VERSIONS {
                if a != b {
                    prop_assert_ne!(version.derive(&a), version.derive(&b));
                } else {
                    prop_assert_eq!(version.derive(&a), version.derive(&b));
                }
            }
        }
    }
}
