//! # Core Error Types

use thiserror::Error;

/// Errors produced when materializing a [`crate::Stream`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// An append did not fit; everything after it was dropped.
    #[error("stream overflow: capacity {capacity} bytes")]
    Overflow {
        /// Capacity of the stream buffer.
        capacity: usize,
    },
}

/// Result type for stream materialization.
pub type StreamResult<T> = Result<T, StreamError>;
