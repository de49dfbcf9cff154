//! # Volviewer Core
//!
//! The memory substrate every other volviewer crate is built on:
//! - One bump [`Arena`] reserved at startup that owns all downstream storage
//! - [`Stream`] writers with sticky overflow errors
//! - [`DynArray`] growable arrays that grow in place when they can
//!
//! ## Architecture Rules
//!
//! 1. **No per-object free** - memory is released by rewinding the arena
//! 2. **Offsets, not pointers** - allocations are addressed by [`Span`]
//! 3. **Exhaustion is fatal** - running out of arena is a capacity bug
//!
//! ## Example
//!
//! ```rust,ignore
//! use volviewer_core::{Arena, DynArray};
//!
//! let mut arena = Arena::with_capacity(1 << 20)?;
//! let mut values: DynArray<u32> = DynArray::new();
//! values.push(&mut arena, 7);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod hash;
pub mod memory;
pub mod stream;

pub use error::{StreamError, StreamResult};
pub use hash::hash_bytes;
pub use memory::{Arena, DynArray, SavePoint, Scratch, Span};
pub use stream::Stream;
