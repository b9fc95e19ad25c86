//! End-to-end reconstruction scenarios against in-memory logs.

use std::rc::Rc;

use svndag::areas::fixture::parse_fixture;
use svndag::areas::repository::SourceRepository;
use svndag::artifacts::layout::LayoutSpec;
use svndag::artifacts::mapping::{ALL_VERSIONS, ForeignRevId, MappingVersion, recover_foreign_id};
use svndag::artifacts::revmeta::cursor::AncestryEnd;

mod common;

use common::{UUID, rename_fixture, standard_fixture};

fn open(fixture: &str) -> SourceRepository {
    let parsed = parse_fixture(fixture).unwrap();
    SourceRepository::open(
        parsed.uuid,
        Rc::new(parsed.log),
        "trunk".parse::<LayoutSpec>().unwrap().into_layout(),
        MappingVersion::CURRENT,
    )
    .unwrap()
}

#[test]
fn every_branch_revision_identifier_round_trips() {
    let repo = open(&standard_fixture());
    for (branch, revnum) in [("trunk", 1), ("branches/feature", 3), ("tags/1.0", 5)] {
        for version in ALL_VERSIONS {
            let id = version.derive(&ForeignRevId::new(UUID, branch, revnum));
            let (foreign, recovered) = recover_foreign_id(id.as_str()).unwrap();
            assert_eq!(recovered, *version);
            assert_eq!(foreign, ForeignRevId::new(UUID, branch, revnum));
            assert_eq!(repo.lookup_revision_id(id.as_str()).unwrap().0, foreign);
        }
    }
}

#[test]
fn mainlines_are_strictly_decreasing_and_shared() {
    let repo = open(&standard_fixture());
    let (lineage, end) = repo.mainline("trunk", 5).unwrap();
    let revnums: Vec<u64> = lineage.iter().map(|d| d.revnum).collect();
    assert_eq!(revnums, vec![4, 1]);
    assert_eq!(end, AncestryEnd::Root);

    // Descriptors are interned session-wide: looking the same revision up
    // again yields the very same object.
    let again = repo.provider().get("trunk", 4);
    assert!(Rc::ptr_eq(&lineage[0], &again));
}

#[test]
fn branch_ancestry_crosses_the_creating_copy() {
    let repo = open(&standard_fixture());
    let (lineage, end) = repo.mainline("branches/feature", 5).unwrap();
    let coords: Vec<(&str, u64)> = lineage
        .iter()
        .map(|d| (d.branch_path.as_str(), d.revnum))
        .collect();
    assert_eq!(
        coords,
        vec![("branches/feature", 3), ("branches/feature", 2), ("trunk", 1)]
    );
    assert_eq!(end, AncestryEnd::Root);
}

#[test]
fn renamed_branches_keep_their_history() {
    let repo = open(&rename_fixture());
    let (lineage, _) = repo.mainline("branches/new", 3).unwrap();
    let coords: Vec<(&str, u64)> = lineage
        .iter()
        .map(|d| (d.branch_path.as_str(), d.revnum))
        .collect();
    assert_eq!(
        coords,
        vec![("branches/new", 3), ("branches/new", 2), ("branches/old", 1)]
    );
}

#[test]
fn merge_markers_surface_as_extra_parents() {
    let repo = open(&standard_fixture());
    let descriptor = repo.provider().get("trunk", 4);
    let parents = repo.parent_ids(&descriptor).unwrap();
    assert_eq!(
        parents,
        vec![
            repo.revision_id("trunk", 1).unwrap(),
            repo.revision_id("branches/feature", 3).unwrap(),
        ]
    );
}

#[test]
fn replace_at_root_follows_copy_source() {
    // Reverting trunk to the feature branch via delete-then-add-with-copy
    // in one revision: ancestry ignores the delete and crosses the copy.
    let fixture = format!(
        "uuid {UUID}\n\
         rev 1\n\
         add trunk\n\
         add trunk/f file\n\
         rev 2\n\
         add branches\n\
         copy branches/feature trunk@1\n\
         rev 3\n\
         mod branches/feature/f file\n\
         rev 4\n\
         replace-copy trunk branches/feature@3\n"
    );
    let repo = open(&fixture);
    let (lineage, end) = repo.mainline("trunk", 4).unwrap();
    let coords: Vec<(&str, u64)> = lineage
        .iter()
        .map(|d| (d.branch_path.as_str(), d.revnum))
        .collect();
    assert_eq!(
        coords,
        vec![
            ("trunk", 4),
            ("branches/feature", 3),
            ("branches/feature", 2),
            ("trunk", 1),
        ]
    );
    assert_eq!(end, AncestryEnd::Root);

    // File identities survive the round trip through the branch.
    let map = repo.file_id_map("trunk", 4).unwrap();
    let original = repo.file_id_map("trunk", 1).unwrap();
    assert_eq!(map.file_id("f"), original.file_id("f"));
}

#[test]
fn deleting_and_readding_a_branch_starts_history_over() {
    let fixture = format!(
        "uuid {UUID}\n\
         rev 1\n\
         add trunk\n\
         add trunk/f file\n\
         rev 2\n\
         del trunk\n\
         rev 3\n\
         add trunk\n\
         add trunk/g file\n"
    );
    let repo = open(&fixture);
    let (lineage, end) = repo.mainline("trunk", 3).unwrap();
    let revnums: Vec<u64> = lineage.iter().map(|d| d.revnum).collect();
    assert_eq!(revnums, vec![3]);
    assert_eq!(end, AncestryEnd::Root);
}

#[test]
fn tag_file_ids_match_the_tagged_trunk() {
    let repo = open(&standard_fixture());
    let trunk = repo.file_id_map("trunk", 4).unwrap();
    let tag = repo.file_id_map("tags/1.0", 5).unwrap();
    assert_eq!(trunk.file_id("src/lib.rs"), tag.file_id("src/lib.rs"));
    assert_eq!(trunk.file_id("README"), tag.file_id("README"));
}
