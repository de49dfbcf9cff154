//! # Self Sources
//!
//! The files the build tool is compiled from. If any is newer than the
//! running binary, the binary is stale. Only files compiled for the host
//! are listed: a touched source that cargo skips would leave the rebuilt
//! artifact unchanged.

/// The platform implementation compiled into this build.
#[cfg(unix)]
const PLATFORM_SOURCE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../volviewer_os/src/platform/unix.rs"
);
#[cfg(windows)]
const PLATFORM_SOURCE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../volviewer_os/src/platform/windows.rs"
);

/// Absolute paths of every source file `vvbuild` is built from.
pub const SELF_SOURCES: &[&str] = &[
    concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/src/main.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/src/lib.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/src/error.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/src/options.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/src/orchestrator.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/src/recipe.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/src/sources.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../volviewer_os/src/lib.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../volviewer_os/src/error.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../volviewer_os/src/logging.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../volviewer_os/src/platform/mod.rs"),
    PLATFORM_SOURCE,
    concat!(env!("CARGO_MANIFEST_DIR"), "/../volviewer_os/src/command.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../volviewer_core/src/memory/arena.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../volviewer_core/src/memory/dynarray.rs"),
    concat!(env!("CARGO_MANIFEST_DIR"), "/../volviewer_core/src/stream.rs"),
];

/// The workspace manifest the viewer and this tool are built from.
pub const WORKSPACE_MANIFEST: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../Cargo.toml");

/// Target directory reserved for rebuilding this tool.
///
/// Kept apart from the workspace's `target/` so a self-rebuild never races
/// with, or reuses artifacts of, a build the user started.
pub const SELF_TARGET_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../target/vvbuild-self");

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_sources_exist() {
        for source in SELF_SOURCES {
            assert!(Path::new(source).is_file(), "missing self source {source}");
        }
        assert!(Path::new(WORKSPACE_MANIFEST).is_file());
    }

    #[test]
    fn test_only_host_platform_is_listed() {
        let other = if cfg!(windows) { "platform/unix.rs" } else { "platform/windows.rs" };
        assert!(SELF_SOURCES.iter().all(|source| !source.ends_with(other)));
        assert!(SELF_SOURCES.contains(&PLATFORM_SOURCE));
    }
}
