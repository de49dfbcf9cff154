//! # Volviewer Build
//!
//! A build tool that keeps itself current before building the viewer.
//!
//! ## States
//!
//! - **CHECK**: compare the running binary's timestamp with its own sources.
//! - **REBUILD**: move the binary aside, rebuild, copy the artifact over the
//!   binary path, re-execute it with the original arguments and exit with
//!   its result.
//! - **RUN**: build the viewer and exit with the toolchain's result.
//!
//! At most one rebuild happens per invocation: the installed binary is
//! written after every source, so its own CHECK goes straight to RUN, and a
//! process started by a rebuild never rebuilds again.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod options;
pub mod orchestrator;
pub mod recipe;
pub mod sources;

pub use error::{BuildError, BuildResult};
pub use options::BuildOptions;
pub use orchestrator::{Orchestrator, Outcome, RebuildReason, State, REBUILT_ENV};
