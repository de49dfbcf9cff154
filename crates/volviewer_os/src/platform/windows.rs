//! Windows implementation of [`Platform`].

use std::fs::OpenOptions;
use std::io;
use std::os::windows::fs::MetadataExt;
use std::os::windows::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command};

use tracing::{debug, warn};
use volviewer_core::{Arena, Stream};

use super::{FileTime, Platform};
use crate::command::CommandList;
use crate::error::{OsError, OsResult};

const PAGE_SIZE: usize = 4 * 1024;

/// Largest single write handed to the OS.
const MAX_WRITE_CHUNK: usize = 2 * 1024 * 1024 * 1024 - 1;

/// `CreateProcess` command line limit in bytes.
const COMMAND_LINE_CAPACITY: usize = 32 * 1024;

/// Windows 10 and later.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowsPlatform;

impl Platform for WindowsPlatform {
    type Process = Child;

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn file_time(&self, path: &Path) -> FileTime {
        match std::fs::metadata(path) {
            Ok(metadata) => FileTime::from_ticks(metadata.last_write_time()),
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "stat failed");
                }
                FileTime::UNKNOWN
            }
        }
    }

    fn write_new_file(&self, path: &Path, bytes: &[u8]) -> OsResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|err| OsError::io("create", path, err))?;
        for chunk in bytes.chunks(MAX_WRITE_CHUNK) {
            self.write_file(&mut file, chunk)
                .map_err(|err| OsError::io("write", path, err))?;
        }
        Ok(())
    }

    fn write_executable(&self, path: &Path, bytes: &[u8]) -> OsResult<()> {
        // Executability follows the file name on Windows.
        self.write_new_file(path, bytes)
    }

    fn spawn(&self, arena: &Arena, command: &CommandList) -> OsResult<Child> {
        let program = command.program(arena).ok_or(OsError::EmptyCommand)?;

        let mut line = vec![0u8; COMMAND_LINE_CAPACITY];
        let mut stream = Stream::new(&mut line);
        let mut first = true;
        for arg in command.args(arena).skip(1).filter(|arg| !arg.is_empty()) {
            if !first {
                stream.append_byte(b' ');
            }
            stream.append_quoted(arg);
            first = false;
        }
        let tail = stream.finish().map_err(|_| OsError::CommandTooLong {
            limit: COMMAND_LINE_CAPACITY,
        })?;
        let tail = std::str::from_utf8(tail).unwrap_or_default();

        Command::new(program)
            .raw_arg(tail)
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
                warn!(pid, code = status.code(), "child process exited with failure");
                false
            }
            Err(err) => {
                debug!(pid, error = %err, "wait failed");
                false
            }
        }
    }
}
