//! # Build Error Types

use std::path::PathBuf;

use thiserror::Error;
use volviewer_os::OsError;

/// Failures that stop the build tool.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The arena could not be reserved.
    #[error("failed to reserve build arena")]
    ArenaUnavailable,

    /// The running binary's path could not be determined.
    #[error("cannot locate running binary: {0}")]
    CurrentExe(#[source] std::io::Error),

    /// A path is not valid UTF-8 and cannot go on a command line.
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// The binary could not be moved aside before rebuilding.
    #[error("failed to back up {}: {source}", .binary.display())]
    Backup {
        /// The binary being rebuilt.
        binary: PathBuf,
        /// Underlying error.
        #[source]
        source: OsError,
    },

    /// The toolchain failed or produced no binary; the old one was restored.
    #[error("failed to rebuild self: {}", .binary.display())]
    SelfRebuild {
        /// The binary that was restored.
        binary: PathBuf,
    },
}

/// Result type for build operations.
pub type BuildResult<T> = Result<T, BuildError>;
