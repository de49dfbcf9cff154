//! Error types for the viewer host.

use thiserror::Error;
use volviewer_os::WatchError;

use crate::config::ConfigError;

/// Errors that stop the viewer.
#[derive(Error, Debug)]
pub enum HostError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// File watching failed.
    #[error("file watch failed: {0}")]
    Watch(#[from] WatchError),

    /// The process arena could not be reserved.
    #[error("failed to reserve a {size} byte arena")]
    ArenaUnavailable {
        /// Requested size.
        size: usize,
    },
}

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;
