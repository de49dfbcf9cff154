//! # Build Options

use clap::Parser;

/// Flags accepted by `vvbuild`.
#[derive(Parser, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[command(name = "vvbuild", about = "Build volviewer, rebuilding this tool first if needed")]
#[allow(clippy::struct_excessive_bools)]
pub struct BuildOptions {
    /// Unoptimized build with debug assertions
    #[arg(long)]
    pub debug: bool,

    /// Target a generic CPU instead of the build machine
    #[arg(long)]
    pub generic: bool,

    /// Emit cargo's compilation timing report
    #[arg(long)]
    pub report: bool,

    /// Build with the address sanitizer (nightly toolchain)
    #[arg(long)]
    pub sanitize: bool,
}
