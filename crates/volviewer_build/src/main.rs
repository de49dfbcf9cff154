//! `vvbuild`: rebuilds itself when its sources changed, then builds the viewer.
//!
//! ```text
//! vvbuild [--debug] [--generic] [--report] [--sanitize]
//! ```
//!
//! Exit status is 0 when the viewer built, 1 on any failure.

use clap::Parser;
use tracing::error;
use volviewer_build::{BuildError, BuildOptions, BuildResult, Orchestrator, Outcome, REBUILT_ENV};
use volviewer_os::{init_logging, NativePlatform, Platform};

/// Arena for command lines, path scratch and the rebuilt binary's bytes.
const ARENA_SIZE: usize = 128 * 1024 * 1024;

fn run(args: &[String]) -> BuildResult<i32> {
    let platform = NativePlatform::default();
    let mut arena = platform.reserve_arena(ARENA_SIZE);
    if arena.is_disabled() {
        return Err(BuildError::ArenaUnavailable);
    }

    let binary = std::env::current_exe().map_err(BuildError::CurrentExe)?;
    let orchestrator = Orchestrator::new(&platform, binary)
        .after_rebuild(std::env::var_os(REBUILT_ENV).is_some());
    let forwarded = args.get(1..).unwrap_or_default();
    if let Outcome::Exit(code) = orchestrator.check_rebuild_self(&mut arena, forwarded)? {
        return Ok(code);
    }

    let options = match BuildOptions::try_parse_from(args) {
        Ok(options) => options,
        Err(err) => {
            let _ = err.print();
            return Ok(i32::from(err.use_stderr()));
        }
    };
    orchestrator.run(&mut arena, &options)
}

fn main() {
    init_logging();
    let args: Vec<String> = std::env::args().collect();
    let code = match run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "build failed");
            1
        }
    };
    std::process::exit(code);
}
