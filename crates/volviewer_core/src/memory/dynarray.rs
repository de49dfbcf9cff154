//! # Dynamic Arrays
//!
//! Growable arrays whose storage lives in an [`Arena`].
//!
//! Growth doubles capacity from [`INITIAL_CAPACITY`]. While the array's block
//! is the most recent allocation (its end offset equals the arena cursor) it
//! grows in place; otherwise a fresh block is taken and the elements copied,
//! and the old block is simply abandoned. Callers must treat the offset
//! returned by [`DynArray::reserve`] as authoritative after growth.

use std::marker::PhantomData;

use bytemuck::Pod;

use super::arena::Arena;

/// Capacity of the first block an empty array allocates.
pub const INITIAL_CAPACITY: usize = 4;

/// An arena-backed growable array of plain-old-data values.
///
/// The array stores only offsets; it must always be used with the arena it
/// first reserved from.
#[derive(Clone, Copy, Debug)]
pub struct DynArray<T> {
    /// Offset of the first element, `None` until first growth.
    data: Option<usize>,
    /// Number of live elements.
    count: usize,
    /// Number of elements the block can hold.
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T> Default for DynArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DynArray<T> {
    /// Creates an empty array with no backing store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: None,
            count: 0,
            capacity: 0,
            _marker: PhantomData,
        }
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the array holds no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of elements the current block can hold.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Offset of the backing block, if any.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        self.data
    }

    /// Drops all elements, keeping the block.
    #[inline]
    pub fn clear(&mut self) {
        self.count = 0;
    }
}

impl<T: Pod> DynArray<T> {
    /// Ensures room for `extra` more elements.
    ///
    /// Returns the (possibly new) offset of the first element, or `None` on
    /// a disabled arena, in which case nothing changes.
    ///
    /// # Panics
    ///
    /// Panics if the arena is exhausted, or if `T` is zero-sized.
    pub fn reserve(&mut self, arena: &mut Arena, extra: usize) -> Option<usize> {
        assert!(std::mem::size_of::<T>() > 0, "zero-sized elements are not supported");
        if arena.is_disabled() {
            return None;
        }

        let needed = self.count + extra;
        if let Some(offset) = self.data {
            if needed <= self.capacity {
                return Some(offset);
            }
        }

        let size = std::mem::size_of::<T>();
        let align = std::mem::align_of::<T>();
        let data = match self.data {
            Some(offset) if offset + self.capacity * size == arena.cursor() => offset,
            previous => {
                let copy = arena.alloc(size, align, self.capacity)?.offset;
                if let Some(offset) = previous {
                    arena.copy_within(offset, copy, self.count * size);
                }
                copy
            }
        };

        let mut capacity = if self.capacity == 0 {
            INITIAL_CAPACITY
        } else {
            self.capacity
        };
        while capacity < needed {
            capacity *= 2;
        }
        arena.alloc(size, align, capacity - self.capacity)?;

        self.data = Some(data);
        self.capacity = capacity;
        Some(data)
    }

    /// Appends a value, returning its index.
    ///
    /// Returns `None` on a disabled arena.
    pub fn push(&mut self, arena: &mut Arena, value: T) -> Option<usize> {
        let offset = self.reserve(arena, 1)?;
        let index = self.count;
        self.count += 1;
        arena.slice_mut::<T>(offset, self.count)[index] = value;
        Some(index)
    }

    /// Appends every value in `values`, returning the index of the first.
    ///
    /// Returns `None` on a disabled arena.
    pub fn extend_from_slice(&mut self, arena: &mut Arena, values: &[T]) -> Option<usize> {
        let offset = self.reserve(arena, values.len())?;
        let start = self.count;
        self.count += values.len();
        arena.slice_mut::<T>(offset, self.count)[start..].copy_from_slice(values);
        Some(start)
    }

    /// Returns a copy of the element at `index`.
    #[must_use]
    pub fn get(&self, arena: &Arena, index: usize) -> Option<T> {
        self.as_slice(arena).get(index).copied()
    }

    /// Views the elements.
    #[must_use]
    pub fn as_slice<'a>(&self, arena: &'a Arena) -> &'a [T] {
        match self.data {
            Some(offset) => arena.slice(offset, self.count),
            None => &[],
        }
    }

    /// Mutably views the elements.
    pub fn as_mut_slice<'a>(&self, arena: &'a mut Arena) -> &'a mut [T] {
        match self.data {
            Some(offset) => arena.slice_mut(offset, self.count),
            None => &mut [],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_push_allocates_initial_capacity() {
        let mut arena = Arena::with_capacity(4096).unwrap();
        let mut values: DynArray<u32> = DynArray::new();
        assert!(values.offset().is_none());
        values.push(&mut arena, 7).unwrap();
        assert_eq!(values.capacity(), INITIAL_CAPACITY);
        assert_eq!(values.as_slice(&arena), &[7]);
        assert_eq!(arena.cursor(), 16);
    }

    #[test]
    fn test_in_place_growth_keeps_offset() {
        let mut arena = Arena::with_capacity(4096).unwrap();
        let mut values: DynArray<u64> = DynArray::new();
        let first = values.extend_from_slice(&mut arena, &[1, 2, 3, 4]).unwrap();
        assert_eq!(first, 0);
        let before = values.offset();

        values.push(&mut arena, 5).unwrap();
        assert_eq!(values.offset(), before);
        assert_eq!(values.capacity(), 8);
        assert_eq!(values.as_slice(&arena), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_relocation_when_not_most_recent() {
        let mut arena = Arena::with_capacity(4096).unwrap();
        let mut values: DynArray<u64> = DynArray::new();
        values.extend_from_slice(&mut arena, &[1, 2, 3, 4]).unwrap();
        let before = values.offset();

        let _ = arena.push_str("something in the way").unwrap();
        values.push(&mut arena, 5).unwrap();
        assert_ne!(values.offset(), before);
        assert_eq!(values.as_slice(&arena), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_reserve_within_capacity_is_noop() {
        let mut arena = Arena::with_capacity(4096).unwrap();
        let mut values: DynArray<u16> = DynArray::new();
        values.push(&mut arena, 1).unwrap();
        let cursor = arena.cursor();
        let _ = arena.push_str("x").unwrap();
        assert_eq!(values.reserve(&mut arena, 3), values.offset());
        assert_eq!(arena.cursor(), cursor + 1);
    }

    #[test]
    fn test_disabled_arena_reserve_is_noop() {
        let mut arena = Arena::disabled();
        let mut values: DynArray<u32> = DynArray::new();
        assert!(values.reserve(&mut arena, 1).is_none());
        assert!(values.push(&mut arena, 1).is_none());
        assert_eq!(values.len(), 0);
        assert_eq!(values.capacity(), 0);
        assert!(values.as_slice(&arena).is_empty());
    }

    #[test]
    fn test_clear_keeps_block() {
        let mut arena = Arena::with_capacity(4096).unwrap();
        let mut values: DynArray<u32> = DynArray::new();
        values.extend_from_slice(&mut arena, &[1, 2, 3]).unwrap();
        values.clear();
        assert!(values.is_empty());
        assert_eq!(values.capacity(), 4);
        values.push(&mut arena, 9).unwrap();
        assert_eq!(values.get(&arena, 0), Some(9));
        assert_eq!(values.get(&arena, 1), None);
    }
}
