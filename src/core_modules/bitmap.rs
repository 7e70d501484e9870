//! Packed visited set for the flood fill.
//!
//! One bit per image pixel, indexed `y * width + x`. A bit is set exactly when
//! its pixel has been claimed by a finished or in-progress blob.

use crate::core_modules::error::{BlobError, Result};
use crate::core_modules::scratch::ScratchArena;

const BITS_PER_WORD: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
}

impl Bitmap {
    /// A cleared bitmap of `bit_count` bits, reserved from `arena`.
    pub fn allocate(bit_count: usize, arena: &mut ScratchArena) -> Result<Self> {
        let words = arena.alloc_zeroed(bit_count.div_ceil(BITS_PER_WORD))?;
        Ok(Self {
            words,
            len: bit_count,
        })
    }

    pub fn new(bit_count: usize) -> Result<Self> {
        Self::allocate(bit_count, &mut ScratchArena::unbounded())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn check(&self, index: usize) {
        assert!(
            index < self.len,
            "bitmap index {index} out of range for length {}",
            self.len
        );
    }

    #[inline]
    pub fn test(&self, index: usize) -> bool {
        self.check(index);
        (self.words[index / BITS_PER_WORD] >> (index % BITS_PER_WORD)) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        self.check(index);
        self.words[index / BITS_PER_WORD] |= 1 << (index % BITS_PER_WORD);
    }

    /// Sets a bit the caller knows to be clear.
    #[inline]
    pub fn set_known_clear(&mut self, index: usize) {
        debug_assert!(!self.test(index), "bit {index} was already set");
        self.check(index);
        self.words[index / BITS_PER_WORD] |= 1 << (index % BITS_PER_WORD);
    }

    pub fn checked_test(&self, index: usize) -> Result<bool> {
        if index < self.len {
            Ok(self.test(index))
        } else {
            Err(BlobError::IndexOutOfRange {
                index,
                len: self.len,
            })
        }
    }

    pub fn checked_set(&mut self, index: usize) -> Result<()> {
        if index < self.len {
            self.set(index);
            Ok(())
        } else {
            Err(BlobError::IndexOutOfRange {
                index,
                len: self.len,
            })
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        let bitmap = Bitmap::new(130).unwrap();
        assert_eq!(bitmap.len(), 130);
        assert_eq!(bitmap.count_ones(), 0);
        assert!((0..130).all(|i| !bitmap.test(i)));
    }

    #[test]
    fn set_and_test_across_word_boundaries() {
        let mut bitmap = Bitmap::new(200).unwrap();
        for i in [0, 63, 64, 127, 199] {
            bitmap.set(i);
        }
        bitmap.set_known_clear(100);
        assert!(bitmap.test(63) && bitmap.test(64) && bitmap.test(100) && bitmap.test(199));
        assert!(!bitmap.test(65));
        assert_eq!(bitmap.count_ones(), 6);

        bitmap.clear();
        assert_eq!(bitmap.count_ones(), 0);
    }

    #[test]
    fn set_is_idempotent() {
        let mut bitmap = Bitmap::new(8).unwrap();
        bitmap.set(3);
        bitmap.set(3);
        assert_eq!(bitmap.count_ones(), 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_past_the_end_panics_inside_last_word() {
        // 10 bits live in one 64-bit word; index 10 must still be rejected.
        let bitmap = Bitmap::new(10).unwrap();
        bitmap.test(10);
    }

    #[test]
    fn checked_accessors_report_out_of_range() {
        let mut bitmap = Bitmap::new(10).unwrap();
        assert_eq!(
            bitmap.checked_set(10),
            Err(BlobError::IndexOutOfRange { index: 10, len: 10 })
        );
        assert_eq!(bitmap.checked_test(9), Ok(false));
        bitmap.checked_set(9).unwrap();
        assert_eq!(bitmap.checked_test(9), Ok(true));
    }

    #[test]
    fn allocation_respects_the_arena_budget() {
        let mut arena = ScratchArena::with_limit(8);
        assert!(Bitmap::allocate(64, &mut arena).is_ok());
        assert!(matches!(
            Bitmap::allocate(1, &mut arena),
            Err(BlobError::OutOfMemory { .. })
        ));
    }
}
