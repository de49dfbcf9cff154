//! # Memory Management
//!
//! One arena, reserved at startup, owns every byte the process stores.
//!
//! ## Design Philosophy
//!
//! - No per-object free: scratch work is released by rewinding the cursor
//! - Allocations are [`Span`]s (offset + length), never raw pointers
//! - Growable arrays extend in place while they are the newest allocation

mod arena;
mod dynarray;

pub use arena::{Arena, SavePoint, Scratch, Span, MAX_ALIGN};
pub use dynarray::{DynArray, INITIAL_CAPACITY};
