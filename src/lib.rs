//! svndag reconstructs DAG-of-revisions semantics from a flat,
//! globally-numbered, copy-based path repository log.
//!
//! The library is split the same way the binary is used:
//!
//! - `areas`: infrastructure — the changed-path log interface, an in-memory
//!   recorded log, fixture loading and the repository session facade
//! - `artifacts`: the reconstruction algorithms and data types — path
//!   layouts, change sets, revision descriptors and ancestry cursors,
//!   identity mapping, merge-parent recovery and file-identity maps
//! - `commands`: writer-injected command implementations used by the CLI

pub mod areas;
pub mod artifacts;
pub mod commands;
