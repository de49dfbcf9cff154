//! # Platform Layer
//!
//! One capability trait, two implementations chosen at build time:
//!
//! | Operation          | Unix                        | Windows                          |
//! |--------------------|-----------------------------|----------------------------------|
//! | `page_size`        | 4 KiB (16 KiB Apple silicon)| 4 KiB                            |
//! | `write_new_file`   | mode `0600`                 | chunks of at most 2 GiB          |
//! | `file_time`        | `st_mtime` in nanoseconds   | `FILETIME` ticks                 |
//! | `spawn`            | argv                        | one quoted command line          |
//!
//! Failures never unwind. Reads yield an empty span, timestamps yield
//! [`FileTime::UNKNOWN`], everything else returns [`OsResult`].

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::UnixPlatform;
#[cfg(windows)]
pub use windows::WindowsPlatform;

/// The platform implementation for the build target.
#[cfg(unix)]
pub type NativePlatform = UnixPlatform;

/// The platform implementation for the build target.
#[cfg(windows)]
pub type NativePlatform = WindowsPlatform;

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use tracing::{debug, info, warn};
use volviewer_core::{Arena, Span, Stream};

use crate::command::CommandList;
use crate::error::{OsError, OsResult};

/// Capacity of the stack buffer used to render command lines for logs.
const COMMAND_LOG_CAPACITY: usize = 4096;

/// A file modification timestamp in platform ticks.
///
/// Only comparisons between values from the same platform are meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileTime(u64);

impl FileTime {
    /// The file does not exist or could not be inspected.
    pub const UNKNOWN: Self = Self(u64::MAX);

    /// Wraps raw platform ticks.
    #[inline]
    #[must_use]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Raw platform ticks.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Returns true for [`FileTime::UNKNOWN`].
    #[inline]
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 == u64::MAX
    }
}

/// Operating system services used by the viewer and the build tool.
pub trait Platform {
    /// Handle of a spawned child process.
    type Process;

    /// Granularity of memory reservations in bytes.
    fn page_size(&self) -> usize;

    /// Last modification time of `path`, or [`FileTime::UNKNOWN`].
    fn file_time(&self, path: &Path) -> FileTime;

    /// Creates or truncates `path` and writes `bytes` to it.
    ///
    /// # Errors
    ///
    /// Returns [`OsError::Io`] if the file cannot be opened or written.
    fn write_new_file(&self, path: &Path, bytes: &[u8]) -> OsResult<()>;

    /// Like [`Platform::write_new_file`], but the result can be executed.
    ///
    /// The file gets a fresh modification time even when `bytes` equal its
    /// previous contents.
    ///
    /// # Errors
    ///
    /// Returns [`OsError::Io`] if the file cannot be written or marked
    /// executable.
    fn write_executable(&self, path: &Path, bytes: &[u8]) -> OsResult<()>;

    /// Starts `command` without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`OsError::EmptyCommand`] for a command with no program and
    /// [`OsError::Spawn`] if the OS cannot start it.
    fn spawn(&self, arena: &Arena, command: &CommandList) -> OsResult<Self::Process>;

    /// Blocks until `process` exits. Returns true on a zero exit code.
    ///
    /// A nonzero code or a signal is logged and reported as failure.
    fn wait(&self, process: Self::Process) -> bool;

    /// Reserves an arena of at least `capacity` bytes, rounded up to whole
    /// pages. Returns a disabled arena if the OS refuses.
    fn reserve_arena(&self, capacity: usize) -> Arena {
        let page = self.page_size();
        let rounded = capacity.div_ceil(page).saturating_mul(page);
        match Arena::with_capacity(rounded) {
            Ok(arena) => {
                debug!(requested = capacity, reserved = rounded, "arena reserved");
                arena
            }
            Err(err) => {
                warn!(capacity = rounded, error = %err, "arena reservation failed");
                Arena::disabled()
            }
        }
    }

    /// Reads the whole of `path` into the arena.
    ///
    /// Returns an empty span if the file cannot be read or does not fit;
    /// nothing stays allocated in that case.
    fn read_whole_file(&self, arena: &mut Arena, path: &Path) -> Span {
        let save = arena.save();
        let result = (|| -> io::Result<Option<Span>> {
            let mut file = File::open(path)?;
            let len = usize::try_from(file.metadata()?.len())
                .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
            let Some(span) = arena.try_alloc(1, 1, len) else {
                return Ok(None);
            };
            file.read_exact(arena.bytes_mut(span))?;
            Ok(Some(span))
        })();

        match result {
            Ok(Some(span)) => span,
            Ok(None) => {
                if !arena.is_disabled() {
                    warn!(path = %path.display(), remaining = arena.remaining(), "file does not fit in arena");
                }
                arena.restore(save);
                Span::EMPTY
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "read failed");
                arena.restore(save);
                Span::EMPTY
            }
        }
    }

    /// Writes all of `bytes` to `sink`, retrying short writes.
    ///
    /// # Errors
    ///
    /// Returns the first write error, or `WriteZero` if the sink stops
    /// accepting bytes.
    fn write_file(&self, sink: &mut dyn Write, bytes: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            match sink.write(&bytes[written..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(count) => written += count,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        sink.flush()
    }

    /// Renames `from` to `to`, replacing `to` if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`OsError::Io`] on failure.
    fn rename_file(&self, from: &Path, to: &Path) -> OsResult<()> {
        std::fs::rename(from, to).map_err(|err| OsError::io("rename", from, err))
    }

    /// Deletes `path`.
    ///
    /// # Errors
    ///
    /// Returns [`OsError::Io`] on failure.
    fn remove_file(&self, path: &Path) -> OsResult<()> {
        std::fs::remove_file(path).map_err(|err| OsError::io("remove", path, err))
    }

    /// Logs `command`, runs it and waits. Returns true on success.
    fn run_synchronous(&self, arena: &Arena, command: &CommandList) -> bool {
        let mut line = [0u8; COMMAND_LOG_CAPACITY];
        let mut stream = Stream::new(&mut line);
        command.write_display(arena, &mut stream);
        if stream.has_error() {
            info!(program = command.program(arena).unwrap_or(""), "running command");
        } else {
            info!(command = stream.as_str(), "running command");
        }

        match self.spawn(arena, command) {
            Ok(process) => self.wait(process),
            Err(err) => {
                warn!(error = %err, "command failed to start");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_time_ordering() {
        let older = FileTime::from_ticks(10);
        let newer = FileTime::from_ticks(11);
        assert!(newer > older);
        assert!(FileTime::UNKNOWN.is_unknown());
        assert!(!older.is_unknown());
    }

    #[test]
    fn test_reserve_arena_rounds_to_pages() {
        let platform = NativePlatform::default();
        let page = platform.page_size();
        let arena = platform.reserve_arena(page + 1);
        assert_eq!(arena.capacity(), page * 2);
        assert!(platform.reserve_arena(0).is_disabled());
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let platform = NativePlatform::default();
        let mut arena = platform.reserve_arena(4096);
        let span = platform.read_whole_file(&mut arena, Path::new("does/not/exist.glsl"));
        assert!(span.is_empty());
        assert_eq!(arena.cursor(), 0);
    }

    #[test]
    fn test_write_file_retries_short_writes() {
        struct Trickle(Vec<u8>);

        impl Write for Trickle {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                let count = buf.len().min(3);
                self.0.extend_from_slice(&buf[..count]);
                Ok(count)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let platform = NativePlatform::default();
        let mut sink = Trickle(Vec::new());
        platform.write_file(&mut sink, b"volume data").unwrap();
        assert_eq!(sink.0, b"volume data");
    }
}
