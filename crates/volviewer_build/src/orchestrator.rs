//! # Build Orchestrator
//!
//! The CHECK / REBUILD / RUN state machine, generic over [`Platform`] so the
//! timestamp and process logic can be driven by a scripted platform.
//!
//! ## Backup Protocol
//!
//! ```text
//! rename   binary -> binary.old
//! build    toolchain writes the artifact
//! install  copy artifact -> binary (fresh modification time)
//!   fail:  rename binary.old -> binary, fatal
//!   ok:    remove binary.old, re-exec binary with the original arguments
//! ```
//!
//! Installing by copy makes the binary newer than every source even when the
//! toolchain decides nothing changed and hands back an old artifact. The
//! re-executed child also carries [`REBUILT_ENV`], and a child that still
//! looks stale proceeds instead of rebuilding again.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use volviewer_core::Arena;
use volviewer_os::{CommandList, FileTime, Platform};

use crate::error::{BuildError, BuildResult};
use crate::options::BuildOptions;
use crate::recipe;
use crate::sources::SELF_SOURCES;

/// Suffix of the backup made before rebuilding.
const BACKUP_SUFFIX: &str = ".old";

/// Set in the environment of a freshly rebuilt binary's process.
pub const REBUILT_ENV: &str = "VVBUILD_REBUILT";

/// Why the binary must be rebuilt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RebuildReason {
    /// The binary's timestamp is unavailable.
    BinaryMissing,
    /// A source's timestamp is unavailable.
    DependencyMissing(PathBuf),
    /// A source was modified after the binary was built.
    DependencyNewer(PathBuf),
}

/// Orchestrator state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Comparing timestamps.
    Check,
    /// The binary is stale.
    Rebuild(RebuildReason),
    /// The binary is current; build the viewer.
    Run,
}

/// What the caller should do after the self check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The binary is current; continue to option parsing and RUN.
    Proceed,
    /// A rebuilt binary already ran; exit with this code.
    Exit(i32),
}

impl Outcome {
    /// Maps a child's success to an exit code.
    #[must_use]
    pub const fn from_success(success: bool) -> Self {
        if success {
            Self::Exit(0)
        } else {
            Self::Exit(1)
        }
    }
}

/// Drives one invocation of the build tool.
pub struct Orchestrator<'p, P: Platform> {
    platform: &'p P,
    binary: PathBuf,
    sources: Vec<PathBuf>,
    self_build: Vec<String>,
    artifact: PathBuf,
    rebuilt: bool,
}

impl<'p, P: Platform> Orchestrator<'p, P> {
    /// Creates an orchestrator for `binary` with the compiled-in source list
    /// and the default self-build command.
    #[must_use]
    pub fn new(platform: &'p P, binary: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            binary: binary.into(),
            sources: SELF_SOURCES.iter().map(PathBuf::from).collect(),
            self_build: recipe::self_build_args(),
            artifact: recipe::self_artifact(),
            rebuilt: false,
        }
    }

    /// Replaces the list of sources the binary is checked against.
    #[must_use]
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathBuf>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the command that rebuilds the binary.
    #[must_use]
    pub fn with_self_build<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.self_build = command.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the path the self-build command leaves its output at.
    #[must_use]
    pub fn with_artifact(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.artifact = artifact.into();
        self
    }

    /// Marks this process as the product of a rebuild, which disables
    /// further rebuilds. `vvbuild` sets it from [`REBUILT_ENV`].
    #[must_use]
    pub fn after_rebuild(mut self, rebuilt: bool) -> Self {
        self.rebuilt = rebuilt;
        self
    }

    /// The binary being managed.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// CHECK: decides between REBUILD and RUN from timestamps alone.
    #[must_use]
    pub fn check(&self) -> State {
        let binary_time = self.platform.file_time(&self.binary);
        let mut state = if binary_time.is_unknown() {
            State::Rebuild(RebuildReason::BinaryMissing)
        } else {
            State::Run
        };

        for source in &self.sources {
            if state != State::Run {
                break;
            }
            let time: FileTime = self.platform.file_time(source);
            if time.is_unknown() {
                state = State::Rebuild(RebuildReason::DependencyMissing(source.clone()));
            } else if time > binary_time {
                state = State::Rebuild(RebuildReason::DependencyNewer(source.clone()));
            }
        }
        state
    }

    /// Runs CHECK and, if the binary is stale, REBUILD.
    ///
    /// `args` are the arguments after the program name; a rebuilt binary is
    /// re-executed with them.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Backup`] if the binary cannot be moved aside and
    /// [`BuildError::SelfRebuild`] if the toolchain fails. In the latter case
    /// the original binary has been restored.
    pub fn check_rebuild_self(&self, arena: &mut Arena, args: &[String]) -> BuildResult<Outcome> {
        match self.check() {
            State::Rebuild(reason) if self.rebuilt => {
                warn!(?reason, "still stale after a rebuild, not rebuilding again");
                Ok(Outcome::Proceed)
            }
            State::Rebuild(reason) => self.rebuild(arena, &reason, args),
            State::Check | State::Run => Ok(Outcome::Proceed),
        }
    }

    /// REBUILD: backs up, rebuilds and re-executes the binary.
    fn rebuild(
        &self,
        arena: &mut Arena,
        reason: &RebuildReason,
        args: &[String],
    ) -> BuildResult<Outcome> {
        info!(binary = %self.binary.display(), ?reason, "rebuilding self");
        let binary_str = self
            .binary
            .to_str()
            .ok_or_else(|| BuildError::NonUtf8Path(self.binary.clone()))?;

        let mut backup = OsString::from(self.binary.as_os_str());
        backup.push(BACKUP_SUFFIX);
        let backup = PathBuf::from(backup);

        self.platform
            .rename_file(&self.binary, &backup)
            .map_err(|source| BuildError::Backup {
                binary: self.binary.clone(),
                source,
            })?;

        let rebuilt = {
            let mut scratch = arena.scratch();
            let mut command = CommandList::new();
            let parts: Vec<&str> = self.self_build.iter().map(String::as_str).collect();
            command.append(&mut scratch, &parts).is_some()
                && self.platform.run_synchronous(&scratch, &command)
                && self.install(&mut scratch)
        };

        if !rebuilt {
            if !self.platform.file_time(&self.binary).is_unknown() {
                let _ = self.platform.remove_file(&self.binary);
            }
            if let Err(err) = self.platform.rename_file(&backup, &self.binary) {
                error!(error = %err, "failed to restore backup");
            }
            return Err(BuildError::SelfRebuild {
                binary: self.binary.clone(),
            });
        }

        if let Err(err) = self.platform.remove_file(&backup) {
            warn!(error = %err, "failed to remove backup");
        }

        let mut scratch = arena.scratch();
        let mut command = CommandList::new();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        command
            .append(&mut scratch, &[binary_str])
            .and_then(|()| command.append(&mut scratch, &args))
            .ok_or(BuildError::ArenaUnavailable)?;
        std::env::set_var(REBUILT_ENV, "1");
        Ok(Outcome::from_success(
            self.platform.run_synchronous(&scratch, &command),
        ))
    }

    /// Copies the toolchain's artifact over the binary path.
    fn install(&self, arena: &mut Arena) -> bool {
        let artifact = self.platform.read_whole_file(arena, &self.artifact);
        if artifact.is_empty() {
            error!(artifact = %self.artifact.display(), "toolchain produced no binary");
            return false;
        }
        match self
            .platform
            .write_executable(&self.binary, arena.bytes(artifact))
        {
            Ok(()) => {
                info!(
                    binary = %self.binary.display(),
                    bytes = artifact.len,
                    "installed rebuilt binary"
                );
                true
            }
            Err(err) => {
                error!(error = %err, "failed to install rebuilt binary");
                false
            }
        }
    }

    /// RUN: builds the viewer. Returns the process exit code.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ArenaUnavailable`] on a disabled arena.
    pub fn run(&self, arena: &mut Arena, options: &BuildOptions) -> BuildResult<i32> {
        let mut scratch = arena.scratch();
        let command =
            recipe::viewer_command(&mut scratch, options).ok_or(BuildError::ArenaUnavailable)?;
        let success = self.platform.run_synchronous(&scratch, &command);
        Ok(i32::from(!success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use volviewer_core::Span;
    use volviewer_os::{OsError, OsResult};

    const ARTIFACT: &str = "target/vvbuild";

    /// In-memory filesystem clock and scripted process results.
    #[derive(Default)]
    struct ScriptedPlatform {
        times: RefCell<HashMap<PathBuf, u64>>,
        contents: RefCell<HashMap<PathBuf, Vec<u8>>>,
        results: RefCell<VecDeque<bool>>,
        commands: RefCell<Vec<Vec<String>>>,
        /// Artifact timestamp the self-build leaves when it succeeds.
        produces: Option<u64>,
    }

    impl ScriptedPlatform {
        fn with_times(times: &[(&str, u64)]) -> Self {
            let platform = Self::default();
            for (path, time) in times {
                platform.times.borrow_mut().insert(PathBuf::from(path), *time);
            }
            platform
        }
    }

    impl Platform for ScriptedPlatform {
        type Process = bool;

        fn page_size(&self) -> usize {
            4096
        }

        fn file_time(&self, path: &Path) -> FileTime {
            self.times
                .borrow()
                .get(path)
                .map_or(FileTime::UNKNOWN, |time| FileTime::from_ticks(*time))
        }

        fn write_new_file(&self, _path: &Path, _bytes: &[u8]) -> OsResult<()> {
            Ok(())
        }

        fn write_executable(&self, path: &Path, bytes: &[u8]) -> OsResult<()> {
            let mut times = self.times.borrow_mut();
            let now = times.values().copied().max().unwrap_or(0) + 1;
            times.insert(path.to_path_buf(), now);
            self.contents
                .borrow_mut()
                .insert(path.to_path_buf(), bytes.to_vec());
            Ok(())
        }

        fn read_whole_file(&self, arena: &mut Arena, path: &Path) -> Span {
            match self.contents.borrow().get(path) {
                Some(bytes) => arena.push_bytes(bytes).unwrap_or(Span::EMPTY),
                None => Span::EMPTY,
            }
        }

        fn spawn(&self, arena: &Arena, command: &CommandList) -> OsResult<bool> {
            let args: Vec<String> = command.args(arena).map(str::to_owned).collect();
            let first_run = self.commands.borrow().is_empty();
            self.commands.borrow_mut().push(args);
            let success = self.results.borrow_mut().pop_front().unwrap_or(true);
            if first_run && success {
                if let Some(time) = self.produces {
                    self.times.borrow_mut().insert(PathBuf::from(ARTIFACT), time);
                    self.contents
                        .borrow_mut()
                        .insert(PathBuf::from(ARTIFACT), b"fresh".to_vec());
                }
            }
            Ok(success)
        }

        fn wait(&self, process: bool) -> bool {
            process
        }

        fn rename_file(&self, from: &Path, to: &Path) -> OsResult<()> {
            let mut times = self.times.borrow_mut();
            let time = times.remove(from).ok_or_else(|| {
                OsError::io("rename", from, std::io::ErrorKind::NotFound.into())
            })?;
            times.insert(to.to_path_buf(), time);
            let mut contents = self.contents.borrow_mut();
            if let Some(bytes) = contents.remove(from) {
                contents.insert(to.to_path_buf(), bytes);
            }
            Ok(())
        }

        fn remove_file(&self, path: &Path) -> OsResult<()> {
            self.times.borrow_mut().remove(path);
            self.contents.borrow_mut().remove(path);
            Ok(())
        }
    }

    fn orchestrator(platform: &ScriptedPlatform) -> Orchestrator<'_, ScriptedPlatform> {
        Orchestrator::new(platform, "vvbuild")
            .with_sources(["main.rs", "os.rs"])
            .with_self_build(["cargo", "build"])
            .with_artifact(ARTIFACT)
    }

    #[test]
    fn test_newer_dependency_requires_rebuild() {
        let platform = ScriptedPlatform::with_times(&[("vvbuild", 100), ("main.rs", 100), ("os.rs", 101)]);
        assert_eq!(
            orchestrator(&platform).check(),
            State::Rebuild(RebuildReason::DependencyNewer(PathBuf::from("os.rs")))
        );
    }

    #[test]
    fn test_missing_binary_or_dependency_requires_rebuild() {
        let platform = ScriptedPlatform::with_times(&[("main.rs", 1), ("os.rs", 1)]);
        assert_eq!(
            orchestrator(&platform).check(),
            State::Rebuild(RebuildReason::BinaryMissing)
        );

        let platform = ScriptedPlatform::with_times(&[("vvbuild", 5), ("main.rs", 1)]);
        assert_eq!(
            orchestrator(&platform).check(),
            State::Rebuild(RebuildReason::DependencyMissing(PathBuf::from("os.rs")))
        );
    }

    #[test]
    fn test_current_binary_runs_without_toolchain() {
        let platform = ScriptedPlatform::with_times(&[("vvbuild", 100), ("main.rs", 99), ("os.rs", 100)]);
        let mut arena = Arena::with_capacity(1 << 16).unwrap();
        let orchestrator = orchestrator(&platform);

        assert_eq!(orchestrator.check(), State::Run);
        let outcome = orchestrator.check_rebuild_self(&mut arena, &[]).unwrap();
        assert_eq!(outcome, Outcome::Proceed);
        assert!(platform.commands.borrow().is_empty());
    }

    #[test]
    fn test_failed_rebuild_restores_binary() {
        let platform = ScriptedPlatform::with_times(&[("vvbuild", 100), ("main.rs", 101), ("os.rs", 1)]);
        platform.results.borrow_mut().push_back(false);
        let mut arena = Arena::with_capacity(1 << 16).unwrap();

        let result = orchestrator(&platform).check_rebuild_self(&mut arena, &[]);
        assert!(matches!(result, Err(BuildError::SelfRebuild { .. })));
        assert_eq!(platform.file_time(Path::new("vvbuild")), FileTime::from_ticks(100));
        assert!(platform.file_time(Path::new("vvbuild.old")).is_unknown());
        assert_eq!(platform.commands.borrow().len(), 1);
        assert_eq!(arena.cursor(), 0);
    }

    #[test]
    fn test_successful_toolchain_without_artifact_restores() {
        let platform = ScriptedPlatform::with_times(&[("vvbuild", 100), ("main.rs", 101), ("os.rs", 1)]);
        let mut arena = Arena::with_capacity(1 << 16).unwrap();

        let result = orchestrator(&platform).check_rebuild_self(&mut arena, &[]);
        assert!(matches!(result, Err(BuildError::SelfRebuild { .. })));
        assert_eq!(platform.file_time(Path::new("vvbuild")), FileTime::from_ticks(100));
    }

    #[test]
    fn test_successful_rebuild_reexecutes_with_arguments() {
        let mut platform = ScriptedPlatform::with_times(&[("vvbuild", 100), ("main.rs", 101), ("os.rs", 1)]);
        platform.produces = Some(102);
        platform.results.borrow_mut().extend([true, false]);
        let mut arena = Arena::with_capacity(1 << 16).unwrap();

        let args = vec![String::from("--debug"), String::from("--report")];
        let outcome = orchestrator(&platform)
            .check_rebuild_self(&mut arena, &args)
            .unwrap();

        assert_eq!(outcome, Outcome::Exit(1));
        let commands = platform.commands.borrow();
        assert_eq!(commands[0], ["cargo", "build"]);
        assert_eq!(commands[1], ["vvbuild", "--debug", "--report"]);
        assert!(platform.file_time(Path::new("vvbuild.old")).is_unknown());
        assert_eq!(orchestrator(&platform).check(), State::Run);
    }

    #[test]
    fn test_reused_artifact_is_installed_newer_than_sources() {
        // The toolchain found nothing to compile and handed back an old artifact.
        let mut platform = ScriptedPlatform::with_times(&[("vvbuild", 100), ("main.rs", 101), ("os.rs", 1)]);
        platform.produces = Some(50);
        let mut arena = Arena::with_capacity(1 << 16).unwrap();

        let outcome = orchestrator(&platform).check_rebuild_self(&mut arena, &[]).unwrap();

        assert_eq!(outcome, Outcome::Exit(0));
        let installed = platform.file_time(Path::new("vvbuild"));
        for source in ["main.rs", "os.rs"] {
            assert!(installed > platform.file_time(Path::new(source)));
        }
        assert_eq!(
            platform.contents.borrow().get(Path::new("vvbuild")).map(Vec::as_slice),
            Some(&b"fresh"[..])
        );
        assert_eq!(orchestrator(&platform).check(), State::Run);
        assert_eq!(arena.cursor(), 0);
    }

    #[test]
    fn test_rebuilt_process_never_rebuilds_again() {
        let platform = ScriptedPlatform::with_times(&[("vvbuild", 100), ("main.rs", 101), ("os.rs", 1)]);
        let mut arena = Arena::with_capacity(1 << 16).unwrap();

        let outcome = orchestrator(&platform)
            .after_rebuild(true)
            .check_rebuild_self(&mut arena, &[])
            .unwrap();

        assert_eq!(outcome, Outcome::Proceed);
        assert!(platform.commands.borrow().is_empty());
        assert_eq!(platform.file_time(Path::new("vvbuild")), FileTime::from_ticks(100));
    }

    #[test]
    fn test_run_exit_codes() {
        let platform = ScriptedPlatform::default();
        platform.results.borrow_mut().extend([true, false]);
        let mut arena = Arena::with_capacity(1 << 16).unwrap();
        let orchestrator = orchestrator(&platform);

        assert_eq!(orchestrator.run(&mut arena, &BuildOptions::default()).unwrap(), 0);
        assert_eq!(orchestrator.run(&mut arena, &BuildOptions::default()).unwrap(), 1);
        assert_eq!(arena.cursor(), 0);
    }
}
