#![allow(dead_code)]

use std::path::PathBuf;

use assert_fs::TempDir;
use assert_fs::prelude::{FileWriteStr, PathChild};

pub const UUID: &str = "6987ef2d-0c8e-4fdb-93f5-a70d3e516e32";

/// A repository exercising the usual constructs: a trunk, a feature
/// branch created by copy, a rename, a merge marker and a tag.
pub fn standard_fixture() -> String {
    format!(
        "uuid {UUID}\n\
         \n\
         rev 1\n\
         author alice\n\
         date 2024-01-10T09:00:00Z\n\
         message create trunk\n\
         add trunk\n\
         add trunk/README file\n\
         add trunk/src\n\
         add trunk/src/lib.rs file\n\
         \n\
         rev 2\n\
         author bob\n\
         date 2024-01-11T10:30:00Z\n\
         message start feature work\n\
         add branches\n\
         copy branches/feature trunk@1\n\
         \n\
         rev 3\n\
         author bob\n\
         date 2024-01-12T08:15:00Z\n\
         message feature hacking\n\
         mod branches/feature/src/lib.rs file\n\
         \n\
         rev 4\n\
         author alice\n\
         date 2024-01-13T16:45:00Z\n\
         message merge the feature\n\
         mod trunk/src/lib.rs file\n\
         pset trunk svk:merge {UUID}:/branches/feature:3\n\
         \n\
         rev 5\n\
         author alice\n\
         date 2024-01-14T11:00:00Z\n\
         message tag the release\n\
         add tags\n\
         copy tags/1.0 trunk@4\n"
    )
}

/// A branch renamed through a copy-and-delete of its root.
pub fn rename_fixture() -> String {
    format!(
        "uuid {UUID}\n\
         rev 1\n\
         message create\n\
         add branches\n\
         add branches/old\n\
         add branches/old/f file\n\
         rev 2\n\
         message rename\n\
         copy branches/new branches/old@1\n\
         del branches/old\n\
         rev 3\n\
         message touch\n\
         mod branches/new/f file\n"
    )
}

pub struct FixtureFile {
    pub dir: TempDir,
    pub path: PathBuf,
}

/// Materialize fixture text as a file the binary can read.
pub fn write_fixture(text: &str) -> Result<FixtureFile, Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let file = dir.child("repo.log");
    file.write_str(text)?;
    let path = file.path().to_path_buf();
    Ok(FixtureFile { dir, path })
}
