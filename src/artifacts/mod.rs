//! Reconstruction algorithms and data types
//!
//! - `changes`: changed-path sets and the previous-location rules
//! - `errors`: the recoverable/fatal error taxonomy
//! - `fileids`: incremental per-path file-identity map
//! - `layout`: branch/tag path-layout policies
//! - `mapping`: versioned revision-identity generation and round-trip metadata
//! - `merges`: right-hand (merge) parent recovery
//! - `revmeta`: revision descriptors, the descriptor provider and the
//!   per-branch backward history cursor

pub mod changes;
pub mod errors;
pub mod fileids;
pub mod layout;
pub mod mapping;
pub mod merges;
pub mod revmeta;
