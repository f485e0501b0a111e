//! The error taxonomy shared by both tools (§7 of the design). `skip`-class
//! conditions are folded back into the scan loop as a warning; everything
//! else escalates to the shared error flag and a non-zero exit code.

use std::path::PathBuf;

/// One engine-level failure. CLI entry points wrap these in `anyhow::Error`
/// with `.context(..)` at each call site rather than matching on them, except
/// where the skip/fatal split controls control flow.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Unreadable-as-object input, zero-length file, corrupt archive member.
    /// Non-fatal: the scan loop logs and continues.
    #[error("skipping {path}: {reason}")]
    Skip { path: PathBuf, reason: String },

    /// Invalid CLI configuration (bad thread count, conflicting flags).
    /// Reported before the pipeline starts; the pipeline never runs.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A well-formed container violating an invariant the format guarantees,
    /// e.g. a COMDAT group whose section-index table isn't word-aligned.
    #[error("malformed input in {path}: {reason}")]
    FatalParse { path: PathBuf, reason: String },

    /// Output sink open/write failure.
    #[error("I/O failure writing output: {0}")]
    FatalIo(#[source] std::io::Error),

    /// An assertion that should be unreachable given the above checks.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// `true` for the one error class that the scan loop recovers from
    /// locally (log and continue); everything else escalates.
    pub fn is_skip(&self) -> bool {
        matches!(self, ScanError::Skip { .. })
    }
}
