// THEORY:
// The flood fill never recurses. When it steps from one row to a neighbouring
// row it pushes the span it is leaving onto this stack, and it pops that span
// back once the new row is exhausted. The stack is reserved once with a fixed
// capacity derived from the image perimeter, so the worst-case memory of a
// call is known before it starts.
//
// Pushing past capacity is a broken contract and panics. The labeler asks
// `has_room` before it descends.

use crate::core_modules::error::Result;
use crate::core_modules::scratch::ScratchArena;

/// A horizontal run `[left, right]` on row `y`, entered at column `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub x: usize,
    pub y: usize,
    pub left: usize,
    pub right: usize,
}

#[derive(Debug, Clone)]
pub struct SpanStack {
    spans: Vec<Span>,
    capacity: usize,
    high_water: usize,
}

impl SpanStack {
    /// `max(2 * (width - 1) + 2 * height, height)`.
    pub fn perimeter_capacity(width: usize, height: usize) -> usize {
        (2 * width.saturating_sub(1) + 2 * height).max(height)
    }

    pub fn allocate(capacity: usize, arena: &mut ScratchArena) -> Result<Self> {
        Ok(Self {
            spans: arena.alloc_with_capacity(capacity)?,
            capacity,
            high_water: 0,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn has_room(&self) -> bool {
        self.spans.len() < self.capacity
    }

    /// Deepest the stack has been since allocation.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    #[inline]
    pub fn push(&mut self, span: Span) {
        assert!(
            self.has_room(),
            "span stack overflow: capacity {} exhausted",
            self.capacity
        );
        self.spans.push(span);
        self.high_water = self.high_water.max(self.spans.len());
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Span> {
        self.spans.pop()
    }
}
