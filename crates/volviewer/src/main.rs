//! `volviewer`: runs the headless viewer.
//!
//! ```text
//! volviewer [--config volviewer.toml] [--frames N]
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use volviewer::{HostResult, Viewer, ViewerConfig};
use volviewer_os::init_logging;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "volviewer", about = "Headless volume viewer host")]
struct Args {
    /// Configuration file.
    #[arg(long, default_value = "volviewer.toml")]
    config: PathBuf,

    /// Stop after this many frames, overriding the config file.
    #[arg(long)]
    frames: Option<u64>,
}

fn run(args: &Args) -> HostResult<()> {
    let mut config = ViewerConfig::load(&args.config)?;
    if args.frames.is_some() {
        config.frame_limit = args.frames;
    }
    let mut viewer = Viewer::new(config)?;
    viewer.run()?;
    Ok(())
}

fn main() {
    init_logging();
    let args = Args::parse();
    if let Err(err) = run(&args) {
        error!(error = %err, "viewer failed");
        std::process::exit(1);
    }
}
