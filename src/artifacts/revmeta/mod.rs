//! Revision descriptors and lazy branch-ancestry walking.
//!
//! A [`RevisionDescriptor`](descriptor::RevisionDescriptor) is the unit of
//! history here: one `(branch path, revision number)` pair with lazily
//! fetched log data behind it. The
//! [`RevisionDescriptorProvider`](provider::RevisionDescriptorProvider)
//! interns descriptors so every pair maps to at most one live object, and
//! [`BranchHistoryCursor`](cursor::BranchHistoryCursor) walks a branch's
//! left-hand ancestry backward through renames and copies.

pub mod cursor;
pub mod descriptor;
pub mod provider;
