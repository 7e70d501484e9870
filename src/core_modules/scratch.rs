// THEORY:
// The labeler needs two scratch buffers per call: the visited bitmap and the
// span stack. Both are sized from the image dimensions and reserved up front,
// so a call either gets all of its memory before scanning or fails with
// `OutOfMemory` before touching a pixel.
//
// `ScratchArena` is a bump-style budget over those reservations. It does not
// own a backing block; it counts bytes handed out against an optional limit
// and uses fallible reservation so an allocator refusal surfaces as an error
// rather than an abort. Everything handed out is dropped with the call.

use std::mem::size_of;

use crate::core_modules::error::{BlobError, Result};

#[derive(Debug, Clone, Default)]
pub struct ScratchArena {
    limit: Option<usize>,
    used: usize,
}

impl ScratchArena {
    /// No budget beyond what the allocator will give.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// At most `limit` bytes across all reservations.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            used: 0,
        }
    }

    pub fn from_limit(limit: Option<usize>) -> Self {
        Self { limit, used: 0 }
    }

    /// Bytes reserved so far.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_sub(self.used))
    }

    /// A zero-filled buffer of `len` elements.
    pub fn alloc_zeroed<T: Copy + Default>(&mut self, len: usize) -> Result<Vec<T>> {
        let mut buffer = self.alloc_with_capacity(len)?;
        buffer.resize(len, T::default());
        Ok(buffer)
    }

    /// An empty buffer that can hold `capacity` elements without reallocating.
    pub fn alloc_with_capacity<T>(&mut self, capacity: usize) -> Result<Vec<T>> {
        let available = self.remaining().unwrap_or(usize::MAX);
        let requested = capacity
            .checked_mul(size_of::<T>())
            .ok_or(BlobError::OutOfMemory {
                requested: usize::MAX,
                available,
            })?;
        if requested > available {
            return Err(BlobError::OutOfMemory {
                requested,
                available,
            });
        }

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity)
            .map_err(|_| BlobError::OutOfMemory {
                requested,
                available,
            })?;
        self.used += requested;
        Ok(buffer)
    }
}
