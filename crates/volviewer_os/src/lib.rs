//! # Volviewer OS
//!
//! Everything that touches the operating system:
//! - [`Platform`]: file I/O, timestamps and process spawning, one
//!   implementation per OS family selected at build time as [`NativePlatform`]
//! - [`CommandList`]: argument vectors stored in the arena
//! - [`FileWatchContext`]: directory watches dispatched to per-file callbacks
//! - [`init_logging`]: the stderr subscriber both binaries install
//!
//! ## Architecture Rules
//!
//! 1. **Never unwind** - failures come back as sentinels or [`OsResult`]
//! 2. **Synchronous** - every call blocks; callbacks run on the polling thread
//! 3. **Arena first** - file contents and names live in the caller's arena

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod command;
pub mod error;
pub mod logging;
pub mod platform;
pub mod watch;

pub use command::CommandList;
pub use error::{OsError, OsResult, WatchError, WatchResult};
pub use logging::init_logging;
pub use platform::{FileTime, NativePlatform, Platform};
pub use watch::{
    FileWatchContext, NativeBackend, PollBackend, RawEvent, WatchBackend, WatchHandle,
};
