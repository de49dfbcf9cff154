//! Unix implementation of [`Platform`].

use std::fs::{OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Child, Command};

use tracing::{debug, warn};
use volviewer_core::Arena;

use super::{FileTime, Platform};
use crate::command::CommandList;
use crate::error::{OsError, OsResult};

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
const PAGE_SIZE: usize = 16 * 1024;
#[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
const PAGE_SIZE: usize = 4 * 1024;

/// Permission bits for files created by [`Platform::write_new_file`].
const NEW_FILE_MODE: u32 = 0o600;

/// Permission bits for files created by [`Platform::write_executable`].
const EXECUTABLE_MODE: u32 = 0o755;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Linux, macOS and the BSDs.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnixPlatform;

impl UnixPlatform {
    fn write_with_mode(self, path: &Path, bytes: &[u8], mode: u32) -> OsResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)
            .map_err(|err| OsError::io("create", path, err))?;
        self.write_file(&mut file, bytes)
            .map_err(|err| OsError::io("write", path, err))
    }
}

impl Platform for UnixPlatform {
    type Process = Child;

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn file_time(&self, path: &Path) -> FileTime {
        match std::fs::metadata(path) {
            Ok(metadata) => {
                // Timestamps before the epoch clamp to zero.
                let seconds = u64::try_from(metadata.mtime()).unwrap_or(0);
                let nanos = u64::try_from(metadata.mtime_nsec()).unwrap_or(0);
                FileTime::from_ticks(seconds * NANOS_PER_SECOND + nanos)
            }
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "stat failed");
                }
                FileTime::UNKNOWN
            }
        }
    }

    fn write_new_file(&self, path: &Path, bytes: &[u8]) -> OsResult<()> {
        self.write_with_mode(path, bytes, NEW_FILE_MODE)
    }

    fn write_executable(&self, path: &Path, bytes: &[u8]) -> OsResult<()> {
        self.write_with_mode(path, bytes, EXECUTABLE_MODE)?;
        // The mode only applies on creation.
        std::fs::set_permissions(path, Permissions::from_mode(EXECUTABLE_MODE))
            .map_err(|err| OsError::io("chmod", path, err))
    }

    fn spawn(&self, arena: &Arena, command: &CommandList) -> OsResult<Child> {
        let mut args = command.args(arena);
        let program = args.next().ok_or(OsError::EmptyCommand)?;
        Command::new(program)
            .args(args)
            .spawn()
            .map_err(|source| OsError::Spawn {
                program: program.to_owned(),
                source,
            })
    }

    fn wait(&self, mut process: Child) -> bool {
        let pid = process.id();
        match process.wait() {
            Ok(status) if status.success() => true,
            Ok(status) => {
                if let Some(code) = status.code() {
                    warn!(pid, code, "child process exited with failure");
                } else if let Some(signal) = status.signal() {
                    warn!(pid, signal, "child process terminated by signal");
                }
                false
            }
            Err(err) => {
                debug!(pid, error = %err, "wait failed");
                false
            }
        }
    }
}
