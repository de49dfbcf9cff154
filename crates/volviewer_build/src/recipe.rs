//! # Build Recipes
//!
//! Toolchain invocations for the viewer and for the build tool itself.
//!
//! | Option       | Effect on `cargo build`                                |
//! |--------------|--------------------------------------------------------|
//! | (none)       | `--release`, `target-cpu=native`                       |
//! | `--debug`    | dev profile                                            |
//! | `--generic`  | `target-cpu=x86-64-v3` on x86-64, ARMv8-A with NEON on aarch64 |
//! | `--report`   | `--timings`                                            |
//! | `--sanitize` | `+nightly`, `-Zsanitizer=address`                      |
//!
//! The tool rebuilds itself into [`SELF_TARGET_DIR`] and the orchestrator
//! copies the artifact over the running binary, wherever that lives.

use std::path::PathBuf;

use volviewer_core::{Arena, Stream};
use volviewer_os::CommandList;

use crate::options::BuildOptions;
use crate::sources::{SELF_TARGET_DIR, WORKSPACE_MANIFEST};

/// Package the viewer is built from.
pub const VIEWER_PACKAGE: &str = "volviewer";

/// Package the build tool is built from.
pub const SELF_PACKAGE: &str = "volviewer_build";

/// Name of the build tool's binary target.
pub const SELF_BINARY: &str = "vvbuild";

/// The cargo executable: `$CARGO` when run under cargo, else `cargo` on `PATH`.
#[must_use]
pub fn cargo_program() -> String {
    std::env::var("CARGO").unwrap_or_else(|_| String::from("cargo"))
}

/// Arguments that rebuild the build tool in release mode.
#[must_use]
pub fn self_build_args() -> Vec<String> {
    [
        cargo_program().as_str(),
        "build",
        "--release",
        "--manifest-path",
        WORKSPACE_MANIFEST,
        "--target-dir",
        SELF_TARGET_DIR,
        "--package",
        SELF_PACKAGE,
        "--bin",
        SELF_BINARY,
    ]
    .iter()
    .map(|arg| (*arg).to_owned())
    .collect()
}

/// Where [`self_build_args`] leaves the rebuilt tool.
#[must_use]
pub fn self_artifact() -> PathBuf {
    let mut path = PathBuf::from(SELF_TARGET_DIR);
    path.push("release");
    path.push(format!("{SELF_BINARY}{}", std::env::consts::EXE_SUFFIX));
    path
}

/// Codegen flags implied by `options`, as a cargo `--config` value.
///
/// Returns `None` when no flags are needed or they do not fit `buf`.
fn rustflags<'b>(options: &BuildOptions, buf: &'b mut [u8]) -> Option<&'b str> {
    let mut flags: Vec<&str> = Vec::new();
    if !options.generic {
        flags.extend(["-C", "target-cpu=native"]);
    } else if cfg!(target_arch = "x86_64") {
        flags.extend(["-C", "target-cpu=x86-64-v3"]);
    } else if cfg!(target_arch = "aarch64") {
        flags.extend(["-C", "target-cpu=generic", "-C", "target-feature=+neon"]);
    }
    if options.sanitize {
        flags.push("-Zsanitizer=address");
    }
    if flags.is_empty() {
        return None;
    }

    // TOML literal strings keep double quotes off the command line.
    let mut stream = Stream::new(buf);
    stream.append_str("build.rustflags=[");
    for (i, flag) in flags.iter().enumerate() {
        if i > 0 {
            stream.append_byte(b',');
        }
        stream.append_strs(&["'", flag, "'"]);
    }
    stream.append_byte(b']');
    std::str::from_utf8(stream.finish().ok()?).ok()
}

/// Builds the cargo invocation for the viewer.
///
/// Returns `None` on a disabled arena.
pub fn viewer_command(arena: &mut Arena, options: &BuildOptions) -> Option<CommandList> {
    let cargo = cargo_program();
    let mut command = CommandList::new();
    command.append(arena, &[cargo.as_str()])?;
    if options.sanitize {
        command.append(arena, &["+nightly"])?;
    }
    command.append(
        arena,
        &["build", "--manifest-path", WORKSPACE_MANIFEST, "--package", VIEWER_PACKAGE],
    )?;
    if !options.debug {
        command.append(arena, &["--release"])?;
    }
    if options.report {
        command.append(arena, &["--timings"])?;
    }

    let mut buf = [0u8; 256];
    if let Some(config) = rustflags(options, &mut buf) {
        command.append(arena, &["--config", config])?;
    }
    Some(command)
}
