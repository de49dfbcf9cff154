//! # Volviewer Host
//!
//! Headless embedding of the volviewer substrate: reads `volviewer.toml`,
//! reserves the process arena, watches shader sources and runs the frame
//! loop that dispatches file changes before every step.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod config;
pub mod error;
pub mod host;

pub use assets::{reload, ShaderLibrary, ShaderSource, SharedShader};
pub use config::{ConfigError, ConfigResult, ShaderConfig, ViewerConfig, WatchConfig, WatchMode};
pub use error::{HostError, HostResult};
pub use host::{FrameStats, FrameStatsAccumulator, Viewer};
