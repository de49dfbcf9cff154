//! # File-Change Watch Dispatch
//!
//! Maps directory change events to per-file callbacks.
//!
//! ## Tables
//!
//! ```text
//! FileWatchContext
//!   directories: [WatchedDirectory]        one per directory, created lazily
//!     key hash, key span (canonical path), name span, backend handle
//!     registrations: DynArray<Registration> in the arena
//!       name hash, name span, callback slot
//!   callbacks: [Box<dyn FnMut>]            indexed by slot
//! ```
//!
//! Lookups hash first and confirm with an exact name comparison, so two names
//! with the same hash never trigger each other's callbacks. Directories are
//! keyed by their canonical path, so `shaders` and `shaders/.` share one
//! entry and one backend handle.

mod backend;

pub use backend::{NativeBackend, PollBackend, RawEvent, WatchBackend, WatchHandle};

use std::path::{Path, MAIN_SEPARATOR_STR};
use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use tracing::{debug, trace, warn};
use volviewer_core::{hash_bytes, Arena, DynArray, Span, Stream};

use crate::error::{WatchError, WatchResult};

/// Capacity of the stack buffer a dispatched path is built in.
const PATH_CAPACITY: usize = 4096;

/// Callback invoked with the changed file's path and a scratch arena scope.
pub type WatchCallback = Box<dyn FnMut(&Path, &mut Arena)>;

/// One file name bound to one callback.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct Registration {
    name_hash: u64,
    name_offset: u64,
    name_len: u64,
    slot: u64,
}

impl Registration {
    #[allow(clippy::cast_possible_truncation)]
    fn name(&self) -> Span {
        Span::new(self.name_offset as usize, self.name_len as usize)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn slot(&self) -> usize {
        self.slot as usize
    }
}

#[derive(Debug)]
struct WatchedDirectory {
    hash: u64,
    key: Span,
    name: Span,
    handle: WatchHandle,
    registrations: DynArray<Registration>,
}

/// Splits `path` at its last separator into `(directory, file name)`.
///
/// A path without a separator lives in `.`; a separator in first position
/// means the root directory.
fn split_watch_path(path: &str) -> (&str, &str) {
    match path.rfind(std::path::is_separator) {
        None => (".", path),
        Some(0) => (&path[..1], &path[1..]),
        Some(index) => (&path[..index], &path[index + 1..]),
    }
}

/// The registry of watched files and the backend feeding it.
///
/// Owned by the embedding application. Entries are never removed; they live
/// as long as the context.
pub struct FileWatchContext {
    backend: Box<dyn WatchBackend>,
    directories: Vec<WatchedDirectory>,
    callbacks: Vec<WatchCallback>,
}

impl FileWatchContext {
    /// Creates an empty context over `backend`.
    #[must_use]
    pub fn new(backend: Box<dyn WatchBackend>) -> Self {
        Self {
            backend,
            directories: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    /// Creates a context over OS change notifications.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Init`] if the OS facility is unavailable.
    pub fn native() -> WatchResult<Self> {
        Ok(Self::new(Box::new(NativeBackend::new()?)))
    }

    /// Creates a context that rescans every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Init`] if the polling thread cannot start.
    pub fn polling(interval: Duration) -> WatchResult<Self> {
        Ok(Self::new(Box::new(PollBackend::new(interval)?)))
    }

    /// Number of directories being watched.
    #[must_use]
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    /// Number of file registrations across all directories.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Calls `callback` whenever the file at `path` changes.
    ///
    /// The directory is watched on its first registration; later paths that
    /// resolve to the same directory reuse that watch. Several callbacks may
    /// be registered for the same file; all of them run.
    ///
    /// # Errors
    ///
    /// - [`WatchError::EmptyFileName`] if `path` ends in a separator
    /// - [`WatchError::ArenaUnavailable`] on a disabled arena
    /// - [`WatchError::Directory`] if the backend refuses the directory
    pub fn add_watch<F>(&mut self, arena: &mut Arena, path: &str, callback: F) -> WatchResult<()>
    where
        F: FnMut(&Path, &mut Arena) + 'static,
    {
        let (directory, file_name) = split_watch_path(path);
        if file_name.is_empty() {
            return Err(WatchError::EmptyFileName {
                path: path.to_owned(),
            });
        }
        if arena.is_disabled() {
            return Err(WatchError::ArenaUnavailable);
        }

        let canonical = std::fs::canonicalize(directory).ok();
        let key = canonical
            .as_deref()
            .and_then(Path::to_str)
            .unwrap_or(directory);
        let key_hash = hash_bytes(key.as_bytes());
        let index = match self
            .directories
            .iter()
            .position(|dir| dir.hash == key_hash && arena.str(dir.key) == key)
        {
            Some(index) => index,
            None => {
                let handle = self.backend.watch_directory(Path::new(directory))?;
                let key = arena.push_str(key).ok_or(WatchError::ArenaUnavailable)?;
                let name = arena.push_str(directory).ok_or(WatchError::ArenaUnavailable)?;
                debug!(directory, handle = handle.raw(), "watching directory");
                self.directories.push(WatchedDirectory {
                    hash: key_hash,
                    key,
                    name,
                    handle,
                    registrations: DynArray::new(),
                });
                self.directories.len() - 1
            }
        };

        let name = arena.push_str(file_name).ok_or(WatchError::ArenaUnavailable)?;
        let registration = Registration {
            name_hash: hash_bytes(file_name.as_bytes()),
            name_offset: name.offset as u64,
            name_len: name.len as u64,
            slot: self.callbacks.len() as u64,
        };
        self.directories[index]
            .registrations
            .push(arena, registration)
            .ok_or(WatchError::ArenaUnavailable)?;
        self.callbacks.push(Box::new(callback));
        Ok(())
    }

    /// Waits up to `timeout` for changes and dispatches every pending event.
    ///
    /// Callbacks run on this thread, in event order, each inside a scratch
    /// scope of `arena` that is rewound when it returns. Returns the number
    /// of callbacks invoked.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Disconnected`] if the backend's event source died.
    pub fn poll(&mut self, arena: &mut Arena, timeout: Duration) -> WatchResult<usize> {
        let Self {
            backend,
            directories,
            callbacks,
        } = self;

        let mut dispatched = 0;
        backend.poll(timeout, &mut |event: RawEvent| match event {
            RawEvent::Changed {
                directory,
                file_name,
            } => {
                let Some(dir) = directories.iter().find(|dir| dir.handle == directory) else {
                    trace!(handle = directory.raw(), "event for unknown directory");
                    return;
                };
                let Some(file_name) = file_name.to_str() else {
                    trace!(?file_name, "event for non-UTF-8 file name");
                    return;
                };
                dispatched += dispatch(arena, dir, callbacks, file_name);
            }
            RawEvent::Unrecognized { description } => {
                warn!(event = %description, "unknown file watch event");
            }
        })?;
        Ok(dispatched)
    }
}

/// Invokes every callback registered for `file_name` in `dir`.
fn dispatch(
    arena: &mut Arena,
    dir: &WatchedDirectory,
    callbacks: &mut [WatchCallback],
    file_name: &str,
) -> usize {
    let hash = hash_bytes(file_name.as_bytes());
    let mut invoked = 0;
    for i in 0..dir.registrations.len() {
        let Some(registration) = dir.registrations.get(arena, i) else {
            break;
        };
        if registration.name_hash != hash || arena.str(registration.name()) != file_name {
            continue;
        }

        let mut buf = [0u8; PATH_CAPACITY];
        let mut path = Stream::new(&mut buf);
        path.append_str(arena.str(dir.name));
        path.append_str(MAIN_SEPARATOR_STR);
        path.append_str(file_name);
        if path.has_error() {
            warn!(file_name, "watched path too long to dispatch");
            continue;
        }

        let mut scratch = arena.scratch();
        (callbacks[registration.slot()])(Path::new(path.as_str()), &mut *scratch);
        invoked += 1;
    }
    invoked
}
