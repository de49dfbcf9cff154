//! # Watch Backends
//!
//! Sources of raw directory change events. Both implementations run a
//! `notify` watcher whose event thread only forwards into a channel; the
//! channel is drained on the thread that calls [`WatchBackend::poll`].
//!
//! | Backend           | Mechanism                                   | Fires on                 |
//! |-------------------|---------------------------------------------|--------------------------|
//! | [`NativeBackend`] | inotify / ReadDirectoryChangesW / FSEvents  | close-after-write, moved in |
//! | [`PollBackend`]   | modification time scans                     | any modify or create     |

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{trace, warn};

use crate::error::{WatchError, WatchResult};

/// Identifies a watched directory within one backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

impl WatchHandle {
    /// Wraps a raw handle value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A change reported by a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawEvent {
    /// A file inside a watched directory changed.
    Changed {
        /// The directory's handle.
        directory: WatchHandle,
        /// Name of the file within the directory.
        file_name: OsString,
    },
    /// The OS reported something this layer does not understand.
    Unrecognized {
        /// Debug rendering of the event.
        description: String,
    },
}

/// A source of directory change events.
pub trait WatchBackend {
    /// Starts watching `directory` (non-recursively).
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Directory`] if the OS refuses the watch.
    fn watch_directory(&mut self, directory: &Path) -> WatchResult<WatchHandle>;

    /// Waits up to `timeout` for events, then hands every pending one to
    /// `sink` in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Disconnected`] if the event source died.
    fn poll(&mut self, timeout: Duration, sink: &mut dyn FnMut(RawEvent)) -> WatchResult<()>;
}

/// What an event kind means for dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Relevance {
    /// The file's contents are final; dispatch.
    Trigger,
    /// Known but uninteresting.
    Ignore,
    /// Not understood.
    Unknown,
}

/// Only close-after-write and moved-in count, so a file being written in
/// several calls dispatches once.
#[cfg(target_os = "linux")]
fn classify_native(kind: &EventKind) -> Relevance {
    use notify::event::{AccessKind, AccessMode};
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Relevance::Trigger,
        EventKind::Any | EventKind::Other => Relevance::Unknown,
        _ => Relevance::Ignore,
    }
}

#[cfg(not(target_os = "linux"))]
fn classify_native(kind: &EventKind) -> Relevance {
    match kind {
        EventKind::Modify(
            ModifyKind::Any | ModifyKind::Data(_) | ModifyKind::Name(RenameMode::To),
        ) => Relevance::Trigger,
        EventKind::Any | EventKind::Other => Relevance::Unknown,
        _ => Relevance::Ignore,
    }
}

fn classify_poll(kind: &EventKind) -> Relevance {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => Relevance::Trigger,
        EventKind::Any | EventKind::Other => Relevance::Unknown,
        _ => Relevance::Ignore,
    }
}

/// A notify watcher plus the channel its event thread feeds.
struct Forwarder<W> {
    watcher: W,
    events: Receiver<notify::Result<Event>>,
    directories: HashMap<PathBuf, WatchHandle>,
    next_handle: u64,
}

impl<W: Watcher> Forwarder<W> {
    fn new(config: Config) -> WatchResult<Self> {
        let (sender, events) = crossbeam_channel::unbounded();
        let watcher = W::new(
            move |res: notify::Result<Event>| {
                let _ = sender.send(res);
            },
            config,
        )
        .map_err(|source| WatchError::Init { source })?;

        Ok(Self {
            watcher,
            events,
            directories: HashMap::new(),
            next_handle: 0,
        })
    }

    fn watch(&mut self, directory: &Path) -> WatchResult<WatchHandle> {
        self.watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Directory {
                directory: directory.to_path_buf(),
                source,
            })?;

        let handle = WatchHandle(self.next_handle);
        self.next_handle += 1;
        // Event paths come back either as given or fully resolved.
        self.directories.insert(directory.to_path_buf(), handle);
        if let Ok(canonical) = directory.canonicalize() {
            self.directories.insert(canonical, handle);
        }
        Ok(handle)
    }

    fn resolve(&self, directory: &Path) -> Option<WatchHandle> {
        if let Some(handle) = self.directories.get(directory) {
            return Some(*handle);
        }
        let canonical = directory.canonicalize().ok()?;
        self.directories.get(&canonical).copied()
    }

    fn drain(
        &mut self,
        timeout: Duration,
        classify: fn(&EventKind) -> Relevance,
        sink: &mut dyn FnMut(RawEvent),
    ) -> WatchResult<()> {
        let first = match self.events.recv_timeout(timeout) {
            Ok(first) => first,
            Err(RecvTimeoutError::Timeout) => return Ok(()),
            Err(RecvTimeoutError::Disconnected) => return Err(WatchError::Disconnected),
        };
        self.forward(first, classify, sink);
        while let Ok(next) = self.events.try_recv() {
            self.forward(next, classify, sink);
        }
        Ok(())
    }

    fn forward(
        &self,
        event: notify::Result<Event>,
        classify: fn(&EventKind) -> Relevance,
        sink: &mut dyn FnMut(RawEvent),
    ) {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "file watcher error");
                return;
            }
        };

        match classify(&event.kind) {
            Relevance::Trigger => {}
            Relevance::Ignore => {
                trace!(kind = ?event.kind, "ignored file watch event");
                return;
            }
            Relevance::Unknown => {
                sink(RawEvent::Unrecognized {
                    description: format!("{:?}", event.kind),
                });
                return;
            }
        }

        for path in &event.paths {
            let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
                continue;
            };
            // Events for "name" under "." arrive with an empty parent on some backends.
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            match self.resolve(parent) {
                Some(directory) => sink(RawEvent::Changed {
                    directory,
                    file_name: file_name.to_os_string(),
                }),
                None => trace!(path = %path.display(), "event outside watched directories"),
            }
        }
    }
}

/// OS change notifications.
pub struct NativeBackend {
    inner: Forwarder<RecommendedWatcher>,
}

impl NativeBackend {
    /// Starts the platform's notification watcher.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Init`] if the OS facility is unavailable.
    pub fn new() -> WatchResult<Self> {
        Ok(Self {
            inner: Forwarder::new(Config::default())?,
        })
    }
}

impl WatchBackend for NativeBackend {
    fn watch_directory(&mut self, directory: &Path) -> WatchResult<WatchHandle> {
        self.inner.watch(directory)
    }

    fn poll(&mut self, timeout: Duration, sink: &mut dyn FnMut(RawEvent)) -> WatchResult<()> {
        self.inner.drain(timeout, classify_native, sink)
    }
}

/// Modification-time polling, for filesystems without notifications.
pub struct PollBackend {
    inner: Forwarder<PollWatcher>,
}

impl PollBackend {
    /// Starts a polling watcher that rescans every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Init`] if the watcher thread cannot start.
    pub fn new(interval: Duration) -> WatchResult<Self> {
        Ok(Self {
            inner: Forwarder::new(Config::default().with_poll_interval(interval))?,
        })
    }
}

impl WatchBackend for PollBackend {
    fn watch_directory(&mut self, directory: &Path) -> WatchResult<WatchHandle> {
        self.inner.watch(directory)
    }

    fn poll(&mut self, timeout: Duration, sink: &mut dyn FnMut(RawEvent)) -> WatchResult<()> {
        self.inner.drain(timeout, classify_poll, sink)
    }
}
