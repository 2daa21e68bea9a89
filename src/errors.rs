//! Typed error definitions for the eviction core.
//! One variant per failure mode a move task can end in; the orchestrator logs
//! them with `code()` as a structured field and carries on with other tasks.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvictError {
    /// stat/read/write/permission failure. `context` already names the
    /// operation, the path and a platform hint.
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Insufficient space on backing storage for {path}: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    #[error("Size mismatch after staging {path}: expected {expected} bytes, staged {actual} bytes")]
    VerificationMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Cross-device link {src} -> {dest} could not be satisfied on any branch")]
    CrossDeviceLink { src: PathBuf, dest: PathBuf },

    #[error("Could not resolve physical location of {path}: {reason}")]
    Resolution { path: PathBuf, reason: String },

    #[error("Hardlink group (inode {inode}) aborted at {path}: {reason}")]
    PartialGroup {
        inode: u64,
        path: PathBuf,
        reason: String,
    },

    #[error("Operation interrupted by shutdown request")]
    Interrupted,
}

impl EvictError {
    /// Stable short identifier for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            EvictError::Io { .. } => "io",
            EvictError::InsufficientSpace { .. } => "insufficient_space",
            EvictError::VerificationMismatch { .. } => "verification_mismatch",
            EvictError::CrossDeviceLink { .. } => "cross_device_link",
            EvictError::Resolution { .. } => "resolution",
            EvictError::PartialGroup { .. } => "partial_group",
            EvictError::Interrupted => "interrupted",
        }
    }

    /// Wrap a bare io::Error with a plain context string.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        EvictError::Io {
            context: context.into(),
            source,
        }
    }
}
