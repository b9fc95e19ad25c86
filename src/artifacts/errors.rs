use thiserror::Error;

/// Failure taxonomy for history reconstruction.
///
/// `NotABranchPath`, `UnrecognizedIdentifier` and `HistoryIncomplete` are
/// recoverable by the immediate caller. `InconsistentLog` is fatal: the
/// source log is assumed correct and immutable, so a dangling reference
/// means corruption or an unsupported construct and must abort the current
/// reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("path {path:?} is not a branch or tag under the {layout} layout")]
    NotABranchPath { path: String, layout: String },

    #[error("repository log is inconsistent at r{revnum}: {details}")]
    InconsistentLog { revnum: u64, details: String },

    #[error("unrecognized revision identifier {0:?}")]
    UnrecognizedIdentifier(String),

    #[error("history of {path:?} before r{revnum} is not available from this cursor")]
    HistoryIncomplete { path: String, revnum: u64 },

    #[error("no node at {path:?} in r{revnum}")]
    NotFound { path: String, revnum: u64 },

    #[error("node at {path:?} in r{revnum} is not a directory")]
    NotADirectory { path: String, revnum: u64 },
}

impl HistoryError {
    /// Whether an enumeration may silently skip a candidate that failed
    /// with this error (the path simply is not there, or is a file).
    pub fn is_skippable_listing_failure(&self) -> bool {
        matches!(
            self,
            HistoryError::NotFound { .. } | HistoryError::NotADirectory { .. }
        )
    }
}

/// Probe an `anyhow` chain for a skippable listing failure.
pub(crate) fn skippable_listing_failure(err: &anyhow::Error) -> bool {
    err.downcast_ref::<HistoryError>()
        .is_some_and(HistoryError::is_skippable_listing_failure)
}
