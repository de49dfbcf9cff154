//! # OS Error Types
//!
//! Every failure here is recoverable; the caller decides what is fatal.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from file and process operations.
#[derive(Error, Debug)]
pub enum OsError {
    /// A filesystem call failed.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// What was being attempted.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A child process could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A command list had no program.
    #[error("empty command")]
    EmptyCommand,

    /// A command line did not fit the platform limit.
    #[error("command line exceeds {limit} bytes")]
    CommandTooLong {
        /// The limit in bytes.
        limit: usize,
    },
}

impl OsError {
    /// Wraps an I/O error with the operation and path it came from.
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Result type for OS operations.
pub type OsResult<T> = Result<T, OsError>;

/// Errors from the file-change watch layer.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The path ends in a separator, so there is no file to watch.
    #[error("watch path has no file name: {path}")]
    EmptyFileName {
        /// The rejected path.
        path: String,
    },

    /// Registrations are stored in the arena, which has no memory.
    #[error("cannot register watches on a disabled arena")]
    ArenaUnavailable,

    /// The notification backend could not be created.
    #[error("failed to start file watcher: {source}")]
    Init {
        /// Underlying error.
        #[source]
        source: notify::Error,
    },

    /// The OS refused to watch a directory.
    #[error("failed to watch directory {directory}: {source}")]
    Directory {
        /// The directory.
        directory: PathBuf,
        /// Underlying error.
        #[source]
        source: notify::Error,
    },

    /// The notification thread went away.
    #[error("file watcher event channel disconnected")]
    Disconnected,
}

/// Result type for watch operations.
pub type WatchResult<T> = Result<T, WatchError>;
