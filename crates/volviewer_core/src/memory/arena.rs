//! # Arena Allocator
//!
//! A bump allocator over one anonymous memory region. Memory is handed out
//! by advancing a cursor and released by moving it back (LIFO only).

use std::io;
use std::ops::{Deref, DerefMut};

use bytemuck::{Pod, Zeroable};
use memmap2::MmapMut;

use crate::stream::Stream;

/// Largest alignment an allocation may request.
///
/// Regions are page aligned, so any alignment up to the smallest page size
/// holds for absolute addresses as well as for offsets.
pub const MAX_ALIGN: usize = 4096;

/// A contiguous run of arena bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Span {
    /// Offset of the first byte from the start of the region.
    pub offset: usize,
    /// Length in bytes.
    pub len: usize,
}

impl Span {
    /// The empty span at offset zero.
    pub const EMPTY: Self = Self { offset: 0, len: 0 };

    /// Creates a span.
    #[inline]
    #[must_use]
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// One past the last byte.
    #[inline]
    #[must_use]
    pub const fn end(self) -> usize {
        self.offset + self.len
    }

    /// Returns true if the span has no bytes.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// A snapshot of the arena cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SavePoint {
    cursor: usize,
}

impl SavePoint {
    /// The cursor position captured by this save point.
    #[inline]
    #[must_use]
    pub const fn cursor(self) -> usize {
        self.cursor
    }
}

/// A bump-pointer arena allocator.
///
/// Allocations are fast (pad, bounds check, bump). There is no per-object
/// free; memory comes back by [`Arena::pop`] of the most recent span or by
/// restoring a [`SavePoint`].
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. It is owned by the single thread that
/// runs the frame loop.
///
/// # Example
///
/// ```rust,ignore
/// let mut arena = Arena::with_capacity(1024 * 1024)?; // 1MB
///
/// let span = arena.alloc_array::<f32>(1000).unwrap();
///
/// {
///     let mut scratch = arena.scratch();
///     scratch.push_str("temporary");
/// } // rewound here
/// ```
pub struct Arena {
    /// The backing region; `None` for a disabled arena.
    region: Option<MmapMut>,
    /// Current allocation offset.
    cursor: usize,
    /// Highest cursor ever reached.
    peak: usize,
}

impl Arena {
    /// Wraps an already reserved region.
    #[must_use]
    pub fn from_region(region: MmapMut) -> Self {
        Self {
            region: Some(region),
            cursor: 0,
            peak: 0,
        }
    }

    /// Creates an arena with no memory. Every allocation returns `None`.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            region: None,
            cursor: 0,
            peak: 0,
        }
    }

    /// Maps an anonymous region of exactly `capacity` bytes.
    ///
    /// A zero capacity yields a disabled arena.
    ///
    /// # Errors
    ///
    /// Returns the mapping error if the OS refuses the reservation.
    pub fn with_capacity(capacity: usize) -> io::Result<Self> {
        if capacity == 0 {
            return Ok(Self::disabled());
        }
        Ok(Self::from_region(MmapMut::map_anon(capacity)?))
    }

    /// Returns true if the arena has no backing memory.
    #[inline]
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.region.is_none()
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.as_ref().map_or(0, |region| region.len())
    }

    /// Returns the cursor, which is also the number of bytes in use.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.cursor
    }

    /// Returns the highest cursor position reached so far.
    #[inline]
    #[must_use]
    pub const fn peak(&self) -> usize {
        self.peak
    }

    /// Allocates `count` zeroed elements of `elem_size` bytes aligned to `align`.
    ///
    /// Returns `None` only for a disabled arena.
    ///
    /// # Panics
    ///
    /// Panics if the arena cannot satisfy the request. Exhaustion means the
    /// arena was sized wrong; the release profile aborts here.
    pub fn alloc(&mut self, elem_size: usize, align: usize, count: usize) -> Option<Span> {
        if self.is_disabled() {
            return None;
        }
        if let Some(span) = self.try_alloc(elem_size, align, count) {
            return Some(span);
        }
        panic!(
            "arena exhausted: {count} x {elem_size} bytes requested, {} of {} remaining",
            self.remaining(),
            self.capacity()
        );
    }

    /// Like [`Arena::alloc`] but returns `None` instead of aborting when full.
    pub fn try_alloc(&mut self, elem_size: usize, align: usize, count: usize) -> Option<Span> {
        assert!(
            align.is_power_of_two() && align <= MAX_ALIGN,
            "invalid arena alignment {align}"
        );
        let capacity = self.capacity();
        let padding = self.cursor.wrapping_neg() & (align - 1);
        let len = elem_size.checked_mul(count)?;
        let start = self.cursor.checked_add(padding)?;
        let end = start.checked_add(len)?;
        if end > capacity {
            return None;
        }

        let region = self.region.as_mut()?;
        region[start..end].fill(0);
        self.advance_to(end);
        Some(Span::new(start, len))
    }

    /// Allocates a zeroed array of `count` values of `T`.
    ///
    /// # Panics
    ///
    /// Panics on exhaustion, see [`Arena::alloc`].
    pub fn alloc_array<T: Pod>(&mut self, count: usize) -> Option<Span> {
        self.alloc(std::mem::size_of::<T>(), std::mem::align_of::<T>(), count)
    }

    /// Copies `bytes` into the arena.
    ///
    /// # Panics
    ///
    /// Panics on exhaustion, see [`Arena::alloc`].
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Option<Span> {
        let span = self.alloc(1, 1, bytes.len())?;
        self.bytes_mut(span).copy_from_slice(bytes);
        Some(span)
    }

    /// Copies a string into the arena.
    ///
    /// # Panics
    ///
    /// Panics on exhaustion, see [`Arena::alloc`].
    pub fn push_str(&mut self, text: &str) -> Option<Span> {
        self.push_bytes(text.as_bytes())
    }

    /// Advances the cursor over `size` bytes already written at the frontier.
    ///
    /// Returns the offset the committed bytes start at.
    ///
    /// # Panics
    ///
    /// Panics if `size` exceeds the remaining capacity; callers validate
    /// against [`Arena::frontier_mut`] before writing.
    pub fn commit(&mut self, size: usize) -> usize {
        assert!(
            size <= self.remaining(),
            "arena commit of {size} bytes past capacity ({} remaining)",
            self.remaining()
        );
        let start = self.cursor;
        self.advance_to(start + size);
        start
    }

    /// Retreats the cursor by `size` bytes.
    ///
    /// Only valid for the most recently committed span. Popping anything
    /// else hands the same bytes out twice.
    pub fn pop(&mut self, size: usize) {
        debug_assert!(size <= self.cursor, "arena pop past the start of the region");
        self.cursor = self.cursor.saturating_sub(size);
    }

    /// Captures the cursor so scratch work can be released later.
    #[inline]
    #[must_use]
    pub const fn save(&self) -> SavePoint {
        SavePoint {
            cursor: self.cursor,
        }
    }

    /// Rewinds the cursor to a save point, releasing everything after it.
    #[inline]
    pub fn restore(&mut self, save: SavePoint) {
        debug_assert!(save.cursor <= self.capacity());
        self.cursor = save.cursor;
    }

    /// Opens a scratch scope that is rewound when the guard drops.
    ///
    /// The guard dereferences to the arena, so it can be passed anywhere an
    /// `&mut Arena` is expected. Early returns and `?` still release.
    #[must_use]
    pub fn scratch(&mut self) -> Scratch<'_> {
        let save = self.save();
        Scratch { arena: self, save }
    }

    /// The unused bytes after the cursor.
    pub fn frontier_mut(&mut self) -> &mut [u8] {
        let cursor = self.cursor;
        match self.region.as_mut() {
            Some(region) => &mut region[cursor..],
            None => &mut [],
        }
    }

    /// Builds content directly at the frontier and commits what was written.
    ///
    /// Returns `None` (and commits nothing) if the stream overflowed.
    pub fn stream_commit<F>(&mut self, build: F) -> Option<Span>
    where
        F: FnOnce(&mut Stream<'_>),
    {
        let start = self.cursor;
        let written = {
            let mut stream = Stream::new(self.frontier_mut());
            build(&mut stream);
            stream.finish().ok()?.len()
        };
        self.commit(written);
        Some(Span::new(start, written))
    }

    /// Views the bytes of a span.
    ///
    /// # Panics
    ///
    /// Panics if the span lies outside the region.
    #[must_use]
    pub fn bytes(&self, span: Span) -> &[u8] {
        match self.region.as_ref() {
            Some(region) => &region[span.offset..span.end()],
            None => {
                assert!(span.is_empty(), "non-empty span on a disabled arena");
                &[]
            }
        }
    }

    /// Mutably views the bytes of a span.
    ///
    /// # Panics
    ///
    /// Panics if the span lies outside the region.
    pub fn bytes_mut(&mut self, span: Span) -> &mut [u8] {
        match self.region.as_mut() {
            Some(region) => &mut region[span.offset..span.end()],
            None => {
                assert!(span.is_empty(), "non-empty span on a disabled arena");
                &mut []
            }
        }
    }

    /// Views a span as UTF-8 text; invalid text reads as empty.
    #[must_use]
    pub fn str(&self, span: Span) -> &str {
        std::str::from_utf8(self.bytes(span)).unwrap_or("")
    }

    /// Views `count` values of `T` starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range lies outside the region or is misaligned for `T`.
    #[must_use]
    pub fn slice<T: Pod>(&self, offset: usize, count: usize) -> &[T] {
        if count == 0 {
            return &[];
        }
        let span = Span::new(offset, count * std::mem::size_of::<T>());
        bytemuck::cast_slice(self.bytes(span))
    }

    /// Mutably views `count` values of `T` starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range lies outside the region or is misaligned for `T`.
    pub fn slice_mut<T: Pod>(&mut self, offset: usize, count: usize) -> &mut [T] {
        if count == 0 {
            return &mut [];
        }
        let span = Span::new(offset, count * std::mem::size_of::<T>());
        bytemuck::cast_slice_mut(self.bytes_mut(span))
    }

    /// Moves `len` bytes from `src` to `dst` inside the region.
    pub(crate) fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        if let Some(region) = self.region.as_mut() {
            region.copy_within(src..src + len, dst);
        }
    }

    #[inline]
    fn advance_to(&mut self, end: usize) {
        self.cursor = end;
        self.peak = self.peak.max(end);
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("cursor", &self.cursor)
            .field("capacity", &self.capacity())
            .field("peak", &self.peak)
            .finish()
    }
}

/// A scope of temporary arena allocations, released on drop.
pub struct Scratch<'a> {
    arena: &'a mut Arena,
    save: SavePoint,
}

impl Deref for Scratch<'_> {
    type Target = Arena;

    fn deref(&self) -> &Arena {
        self.arena
    }
}

impl DerefMut for Scratch<'_> {
    fn deref_mut(&mut self) -> &mut Arena {
        self.arena
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        self.arena.restore(self.save);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_allocation() {
        let mut arena = Arena::with_capacity(1024).unwrap();
        let span = arena.alloc_array::<f32>(10).unwrap();
        assert_eq!(span.len, 40);
        assert!(arena.slice::<f32>(span.offset, 10).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_alignment_padding() {
        let mut arena = Arena::with_capacity(1024).unwrap();
        let _ = arena.alloc(1, 1, 3).unwrap();
        let span = arena.alloc(8, 8, 2).unwrap();
        assert_eq!(span.offset, 8);
        assert_eq!(arena.cursor(), 24);
    }

    #[test]
    fn test_alloc_zeroes_reused_memory() {
        let mut arena = Arena::with_capacity(64).unwrap();
        let save = arena.save();
        let span = arena.push_bytes(b"dirty").unwrap();
        arena.restore(save);
        let again = arena.alloc(1, 1, 5).unwrap();
        assert_eq!(span, again);
        assert_eq!(arena.bytes(again), &[0; 5]);
    }

    #[test]
    fn test_disabled_arena_returns_none() {
        let mut arena = Arena::disabled();
        assert!(arena.alloc(4, 4, 1).is_none());
        assert!(arena.push_str("x").is_none());
        assert_eq!(arena.capacity(), 0);
        assert!(arena.frontier_mut().is_empty());
    }

    #[test]
    #[should_panic(expected = "arena exhausted")]
    fn test_exhaustion_is_fatal() {
        let mut arena = Arena::with_capacity(16).unwrap();
        let _ = arena.alloc(1, 1, 17);
    }

    #[test]
    fn test_try_alloc_reports_exhaustion() {
        let mut arena = Arena::with_capacity(16).unwrap();
        assert!(arena.try_alloc(1, 1, 17).is_none());
        assert_eq!(arena.cursor(), 0);
    }

    #[test]
    fn test_commit_and_pop() {
        let mut arena = Arena::with_capacity(64).unwrap();
        arena.frontier_mut()[..4].copy_from_slice(b"abcd");
        let start = arena.commit(4);
        assert_eq!(arena.bytes(Span::new(start, 4)), b"abcd");
        arena.pop(2);
        assert_eq!(arena.cursor(), 2);
    }

    #[test]
    fn test_scratch_restores_on_early_return() {
        fn fails(arena: &mut Arena) -> Result<(), ()> {
            let mut scratch = arena.scratch();
            scratch.push_str("temporary").ok_or(())?;
            Err(())
        }

        let mut arena = Arena::with_capacity(64).unwrap();
        let _ = arena.push_str("kept").unwrap();
        assert!(fails(&mut arena).is_err());
        assert_eq!(arena.cursor(), 4);
        assert_eq!(arena.peak(), 13);
    }

    #[test]
    fn test_restore_makes_room_again() {
        let mut arena = Arena::with_capacity(100).unwrap();
        let _ = arena.alloc(1, 1, 20).unwrap();
        let save = arena.save();
        for _ in 0..8 {
            let _ = arena.alloc(1, 1, 10).unwrap();
        }
        // The scratch still committed leaves 0 bytes, so 80 would not fit.
        assert!(arena.try_alloc(1, 1, 80).is_none());
        arena.restore(save);
        assert_eq!(arena.cursor(), 20);
        assert!(arena.try_alloc(1, 1, 80).is_some());
    }

    #[test]
    fn test_stream_commit() {
        let mut arena = Arena::with_capacity(64).unwrap();
        let span = arena
            .stream_commit(|s| {
                s.append_str("volviewer");
                s.append_str(".old");
            })
            .unwrap();
        assert_eq!(arena.str(span), "volviewer.old");
        assert_eq!(arena.cursor(), 13);

        let before = arena.cursor();
        assert!(arena.stream_commit(|s| s.append(&[0; 100])).is_none());
        assert_eq!(arena.cursor(), before);
    }
}
