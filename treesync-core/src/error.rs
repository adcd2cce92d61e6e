//! Error taxonomy for a single sync job.
//!
//! Parse failures, fetch failures and unexpected faults all end the job.
//! Branches with an unknown category are not errors at all; they show up as
//! [`SkippedBranch`](crate::download::SkippedBranch) entries in the download report.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for core sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Why a single remote object could not be materialised locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// The object store reported that the key does not exist.
    #[error("object does not exist")]
    Missing,
    /// The existence check or the byte transfer faulted.
    #[error("transfer failed: {0}")]
    Transfer(String),
    /// A file or folder name that would escape its destination folder.
    #[error("invalid name {0:?}")]
    InvalidName(String),
}

/// Job-level failure. Every variant collapses to a failed outcome.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Message body is not a valid tree description.
    #[error("invalid tree description: {0}")]
    Parse(String),
    /// A remote object is missing or its transfer faulted.
    #[error("fetch of {key} failed: {reason}")]
    Fetch {
        /// Remote object key.
        key: String,
        /// What went wrong.
        reason: FetchFailure,
    },
    /// Local filesystem failure while preparing a destination.
    #[error("{operation} failed for {}: {source}", .path.display())]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Anything else that went wrong while processing the message.
    #[error("{0}")]
    Fault(String),
}

impl SyncError {
    pub fn fetch(key: impl Into<String>, reason: FetchFailure) -> Self {
        SyncError::Fetch {
            key: key.into(),
            reason,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Parse(e.to_string())
    }
}
